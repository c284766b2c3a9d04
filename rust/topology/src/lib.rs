// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # NMG-Lite Topology
//!
//! A non-manifold boundary representation built on the radial-edge model,
//! and the tools that draw it.
//!
//! Regions hold shells; shells hold faces, wire loops, wire edges and at
//! most one lone vertex. Every face, loop, edge and vertex is bound into its
//! context through directed *use* records, so one edge can bound any number
//! of faces (the uses around it form a radial ring) and one face is seen
//! from both sides. All entities live in slot maps inside a [`Model`].
//!
//! On top of the model sit:
//!
//! * [`traversal`]: flattening of loops, trimmed curves and parametric
//!   surfaces into drawing commands ([`Vlist`]);
//! * [`fancy`]: offset drawing of edge uses so coincident uses stay apart;
//! * [`classify`]: painting by Boolean classification, frame by frame;
//! * [`triangulate`]: planar polygon triangulation through a one-face model.

pub mod arena;
pub mod classify;
pub mod config;
pub mod construction;
pub mod error;
pub mod fancy;
pub mod geometry;
pub mod index_table;
pub mod keys;
pub mod nurbs;
pub mod serialization;
pub mod sink;
pub mod traversal;
pub mod triangulate;
pub mod vlist;

pub use arena::{
    EdgeCurve, EdgeUseContext, FaceGeometry, LoopContents, Model, Orientation, VertexUseAttribute,
};
pub use classify::{BrokenStyle, BrokenTarget, ClassTable, Classification, ClassifierDisplay};
pub use config::{PlotConfig, Tolerance};
pub use error::{Error, Result};
pub use fancy::{Fancy, FancyPainter};
pub use geometry::Plane;
pub use index_table::IndexTable;
pub use keys::{
    EdgeKey, EdgeUseKey, EntityKind, FaceKey, FaceUseKey, LoopKey, LoopUseKey, RegionKey, ShellKey,
    TopologyKey, VertexKey, VertexUseKey,
};
pub use nurbs::{KnotVector, NurbCurve, NurbSurface, PointSpace};
pub use serialization::ModelSnapshot;
pub use sink::{PauseToken, PlotWriter, VlblockSink};
pub use triangulate::triangulate_points;
pub use vlist::{Command, Rgb, Vlblock, Vlist, VlistStyle};
