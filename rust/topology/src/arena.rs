// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based storage for radial-edge topology entities.
//!
//! The [`Model`] is the central owner of all topology data. Every entity lives
//! inside a slot map with a stable, generational key, and every cross
//! reference (mate, radial, parent) is stored as a key. This replaces the
//! pointer rings of a classic radial-edge structure with plain index links
//! and avoids ownership cycles entirely.
//!
//! ## The use graph
//!
//! Shared identities (face, loop, edge, vertex) are bound into their context
//! by *use* records. A face has two face uses, one per side. Each face use owns
//! loop uses, each loop use owns a cycle of edge uses, and each edge use owns
//! the vertex use at its start. Two links tie the uses of one edge together:
//!
//! * `mate` pairs an edge use with the oppositely directed use on the other
//!   side of the same face (or the other direction of a wire).
//! * `radial` pairs an edge use with its angular neighbour across the gap
//!   between two faces.
//!
//! Both are involutions. Walking `radial(mate(x))` visits one use per face
//! around the edge and returns to `x`.

use nalgebra::{Point2, Point3, Vector3};
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::error::{contract_violation, Error, Result};
use crate::geometry::Plane;
use crate::keys::*;
use crate::nurbs::{NurbCurve, NurbSurface};

/// Orientation of a face or loop use relative to its reference normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Orientation {
    /// Agrees with the surface normal.
    Same,
    /// Opposes the surface normal.
    Opposite,
    /// No reference normal (wire loops).
    Unspecified,
}

impl Orientation {
    /// Returns the orientation seen from the other side.
    pub fn flip(self) -> Self {
        match self {
            Orientation::Same => Orientation::Opposite,
            Orientation::Opposite => Orientation::Same,
            Orientation::Unspecified => Orientation::Unspecified,
        }
    }
}

/// Owner of a vertex use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexUseParent {
    /// The single vertex of a degenerate loop.
    Loop(LoopUseKey),
    /// The start of an edge use.
    EdgeUse(EdgeUseKey),
    /// The lone vertex of a shell.
    Shell(ShellKey),
}

/// Per-use attribute carried independently of the shared vertex geometry.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum VertexUseAttribute {
    /// Shading normal at this use.
    Normal(Vector3<f64>),
    /// Parameter of this use on a parametric face.
    Param(Point2<f64>),
}

/// Geometric carrier of an edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EdgeCurve {
    /// Straight segment between the two vertices.
    #[default]
    Linear,
    /// Trimmed parametric curve, parameterised along the edge's primary use.
    Nurb(NurbCurve),
}

/// Owner of an edge use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeUseParent {
    Loop(LoopUseKey),
    Shell(ShellKey),
}

/// Where an edge use sits, resolved through its parent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeUseContext {
    /// In a loop bounding a face.
    InFaceLoop { loop_use: LoopUseKey, face_use: FaceUseKey },
    /// In a loop owned directly by a shell.
    InWireLoop { loop_use: LoopUseKey, shell: ShellKey },
    /// A bare wire edge owned by a shell.
    BareWire { shell: ShellKey },
}

/// What a loop use is made of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopContents {
    /// Edge uses in traversal order.
    Edges(Vec<EdgeUseKey>),
    /// A single vertex use (degenerate point loop).
    Vertex(VertexUseKey),
}

/// Owner of a loop use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopUseParent {
    FaceUse(FaceUseKey),
    Shell(ShellKey),
}

/// Surface bound to a face.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FaceGeometry {
    #[default]
    None,
    Plane(Plane),
    Nurb(NurbSurface),
}

// --- Entity records ---

#[derive(Debug, Clone)]
pub struct RegionData {
    pub index: usize,
    pub shells: Vec<ShellKey>,
}

#[derive(Debug, Clone)]
pub struct ShellData {
    pub index: usize,
    pub region: RegionKey,
    pub face_uses: Vec<FaceUseKey>,
    /// Loop uses owned directly by the shell, mates included.
    pub wire_loops: Vec<LoopUseKey>,
    /// Bare wire edge uses, mates included.
    pub wire_edges: Vec<EdgeUseKey>,
    pub vertex_use: Option<VertexUseKey>,
}

#[derive(Debug, Clone)]
pub struct FaceData {
    pub index: usize,
    pub geometry: FaceGeometry,
    /// One of the two uses; its mate is the other.
    pub face_use: FaceUseKey,
}

#[derive(Debug, Clone)]
pub struct FaceUseData {
    pub index: usize,
    pub shell: ShellKey,
    pub face: FaceKey,
    pub mate: FaceUseKey,
    pub orientation: Orientation,
    /// Outer loop first, then holes.
    pub loops: Vec<LoopUseKey>,
}

#[derive(Debug, Clone)]
pub struct LoopData {
    pub index: usize,
    pub loop_use: LoopUseKey,
}

#[derive(Debug, Clone)]
pub struct LoopUseData {
    pub index: usize,
    pub parent: LoopUseParent,
    pub lp: LoopKey,
    pub mate: LoopUseKey,
    pub orientation: Orientation,
    pub contents: LoopContents,
}

#[derive(Debug, Clone)]
pub struct EdgeData {
    pub index: usize,
    /// Primary use; the curve parameter runs along it.
    pub edge_use: EdgeUseKey,
    pub curve: EdgeCurve,
}

#[derive(Debug, Clone)]
pub struct EdgeUseData {
    pub index: usize,
    pub parent: EdgeUseParent,
    pub edge: EdgeKey,
    pub mate: EdgeUseKey,
    pub radial: EdgeUseKey,
    /// Vertex use at the start of this directed use.
    pub vertex_use: VertexUseKey,
}

#[derive(Debug, Clone)]
pub struct VertexData {
    pub index: usize,
    pub point: Option<Point3<f64>>,
    pub uses: Vec<VertexUseKey>,
}

#[derive(Debug, Clone)]
pub struct VertexUseData {
    pub index: usize,
    pub vertex: VertexKey,
    pub parent: VertexUseParent,
    pub attribute: Option<VertexUseAttribute>,
}

/// Radial ring of one edge; most edges have one or two faces.
pub type RadialRing = SmallVec<[EdgeUseKey; 4]>;

/// The arena that owns every region, shell and use record of a model.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use nmg_lite_topology::Model;
///
/// let mut model = Model::new();
/// let (_region, shell) = model.add_region();
/// let v: Vec<_> = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
///     .iter()
///     .map(|p| model.add_vertex(Point3::new(p[0], p[1], p[2])))
///     .collect();
/// let fu = model.make_face(shell, &v).unwrap();
///
/// assert_eq!(model.face_use_count(), 2);
/// assert_eq!(model.edge_count(), 3);
/// assert!(model.verify().is_ok());
/// # let _ = fu;
/// ```
#[derive(Debug, Default)]
pub struct Model {
    pub(crate) regions: SlotMap<RegionKey, RegionData>,
    pub(crate) shells: SlotMap<ShellKey, ShellData>,
    pub(crate) faces: SlotMap<FaceKey, FaceData>,
    pub(crate) face_uses: SlotMap<FaceUseKey, FaceUseData>,
    pub(crate) loops: SlotMap<LoopKey, LoopData>,
    pub(crate) loop_uses: SlotMap<LoopUseKey, LoopUseData>,
    pub(crate) edges: SlotMap<EdgeKey, EdgeData>,
    pub(crate) edge_uses: SlotMap<EdgeUseKey, EdgeUseData>,
    pub(crate) vertices: SlotMap<VertexKey, VertexData>,
    pub(crate) vertex_uses: SlotMap<VertexUseKey, VertexUseData>,

    /// Highest index handed out so far. Index 0 is never assigned.
    pub(crate) max_index: usize,
}

impl Model {
    /// Creates a new, empty model.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_index(&mut self) -> usize {
        self.max_index += 1;
        self.max_index
    }

    /// Highest entity index in use. Visited tables need `max_index() + 1` slots.
    pub fn max_index(&self) -> usize {
        self.max_index
    }

    // --- Lookup ---

    pub fn region(&self, key: RegionKey) -> Option<&RegionData> {
        self.regions.get(key)
    }

    pub fn shell(&self, key: ShellKey) -> Option<&ShellData> {
        self.shells.get(key)
    }

    pub fn face(&self, key: FaceKey) -> Option<&FaceData> {
        self.faces.get(key)
    }

    pub fn face_use(&self, key: FaceUseKey) -> Option<&FaceUseData> {
        self.face_uses.get(key)
    }

    pub fn loop_use(&self, key: LoopUseKey) -> Option<&LoopUseData> {
        self.loop_uses.get(key)
    }

    pub fn edge(&self, key: EdgeKey) -> Option<&EdgeData> {
        self.edges.get(key)
    }

    pub fn edge_use(&self, key: EdgeUseKey) -> Option<&EdgeUseData> {
        self.edge_uses.get(key)
    }

    pub fn vertex(&self, key: VertexKey) -> Option<&VertexData> {
        self.vertices.get(key)
    }

    pub fn vertex_use(&self, key: VertexUseKey) -> Option<&VertexUseData> {
        self.vertex_uses.get(key)
    }

    /// Region keys in arena order.
    pub fn region_keys(&self) -> impl Iterator<Item = RegionKey> + '_ {
        self.regions.keys()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn shell_count(&self) -> usize {
        self.shells.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn face_use_count(&self) -> usize {
        self.face_uses.len()
    }

    pub fn loop_use_count(&self) -> usize {
        self.loop_uses.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_use_count(&self) -> usize {
        self.edge_uses.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Dense index of any entity.
    pub fn index_of(&self, key: TopologyKey) -> Option<usize> {
        match key {
            TopologyKey::Region(k) => self.regions.get(k).map(|d| d.index),
            TopologyKey::Shell(k) => self.shells.get(k).map(|d| d.index),
            TopologyKey::Face(k) => self.faces.get(k).map(|d| d.index),
            TopologyKey::FaceUse(k) => self.face_uses.get(k).map(|d| d.index),
            TopologyKey::Loop(k) => self.loops.get(k).map(|d| d.index),
            TopologyKey::LoopUse(k) => self.loop_uses.get(k).map(|d| d.index),
            TopologyKey::Edge(k) => self.edges.get(k).map(|d| d.index),
            TopologyKey::EdgeUse(k) => self.edge_uses.get(k).map(|d| d.index),
            TopologyKey::Vertex(k) => self.vertices.get(k).map(|d| d.index),
            TopologyKey::VertexUse(k) => self.vertex_uses.get(k).map(|d| d.index),
        }
    }

    // --- Contract accessors used by traversals ---
    //
    // A dangling key here means the use graph is corrupt.

    pub(crate) fn r(&self, key: RegionKey) -> &RegionData {
        self.regions
            .get(key)
            .unwrap_or_else(|| contract_violation(format_args!("dangling region {key:?}")))
    }

    pub(crate) fn s(&self, key: ShellKey) -> &ShellData {
        self.shells
            .get(key)
            .unwrap_or_else(|| contract_violation(format_args!("dangling shell {key:?}")))
    }

    pub(crate) fn f(&self, key: FaceKey) -> &FaceData {
        self.faces
            .get(key)
            .unwrap_or_else(|| contract_violation(format_args!("dangling face {key:?}")))
    }

    pub(crate) fn fu(&self, key: FaceUseKey) -> &FaceUseData {
        self.face_uses
            .get(key)
            .unwrap_or_else(|| contract_violation(format_args!("dangling face use {key:?}")))
    }

    pub(crate) fn lu(&self, key: LoopUseKey) -> &LoopUseData {
        self.loop_uses
            .get(key)
            .unwrap_or_else(|| contract_violation(format_args!("dangling loop use {key:?}")))
    }

    pub(crate) fn e(&self, key: EdgeKey) -> &EdgeData {
        self.edges
            .get(key)
            .unwrap_or_else(|| contract_violation(format_args!("dangling edge {key:?}")))
    }

    pub(crate) fn eu(&self, key: EdgeUseKey) -> &EdgeUseData {
        self.edge_uses
            .get(key)
            .unwrap_or_else(|| contract_violation(format_args!("dangling edge use {key:?}")))
    }

    pub(crate) fn v(&self, key: VertexKey) -> &VertexData {
        self.vertices
            .get(key)
            .unwrap_or_else(|| contract_violation(format_args!("dangling vertex {key:?}")))
    }

    pub(crate) fn vu(&self, key: VertexUseKey) -> &VertexUseData {
        self.vertex_uses
            .get(key)
            .unwrap_or_else(|| contract_violation(format_args!("dangling vertex use {key:?}")))
    }

    // --- Use-graph navigation ---

    /// Oppositely directed use of the same edge.
    pub fn mate(&self, eu: EdgeUseKey) -> EdgeUseKey {
        self.eu(eu).mate
    }

    /// Angular neighbour of `eu` across the next face gap.
    pub fn radial(&self, eu: EdgeUseKey) -> EdgeUseKey {
        self.eu(eu).radial
    }

    pub fn loop_use_mate(&self, lu: LoopUseKey) -> LoopUseKey {
        self.lu(lu).mate
    }

    pub fn face_use_mate(&self, fu: FaceUseKey) -> FaceUseKey {
        self.fu(fu).mate
    }

    /// The edge uses of `lu`, or an empty slice for a vertex loop.
    pub fn loop_edge_uses(&self, lu: LoopUseKey) -> &[EdgeUseKey] {
        match &self.lu(lu).contents {
            LoopContents::Edges(eus) => eus,
            LoopContents::Vertex(_) => &[],
        }
    }

    fn position_in_loop(&self, eu: EdgeUseKey) -> Option<(LoopUseKey, usize)> {
        let EdgeUseParent::Loop(lu) = self.eu(eu).parent else {
            return None;
        };
        let eus = self.loop_edge_uses(lu);
        let pos = eus.iter().position(|&k| k == eu).unwrap_or_else(|| {
            contract_violation(format_args!("edge use {eu:?} missing from its loop {lu:?}"))
        });
        Some((lu, pos))
    }

    /// Next edge use around the owning loop, or `None` for a bare wire.
    pub fn next_in_loop(&self, eu: EdgeUseKey) -> Option<EdgeUseKey> {
        let (lu, pos) = self.position_in_loop(eu)?;
        let eus = self.loop_edge_uses(lu);
        Some(eus[(pos + 1) % eus.len()])
    }

    /// Previous edge use around the owning loop, or `None` for a bare wire.
    pub fn prev_in_loop(&self, eu: EdgeUseKey) -> Option<EdgeUseKey> {
        let (lu, pos) = self.position_in_loop(eu)?;
        let eus = self.loop_edge_uses(lu);
        Some(eus[(pos + eus.len() - 1) % eus.len()])
    }

    /// Classifies where an edge use sits.
    pub fn edge_use_context(&self, eu: EdgeUseKey) -> EdgeUseContext {
        match self.eu(eu).parent {
            EdgeUseParent::Shell(shell) => EdgeUseContext::BareWire { shell },
            EdgeUseParent::Loop(loop_use) => match self.lu(loop_use).parent {
                LoopUseParent::FaceUse(face_use) => EdgeUseContext::InFaceLoop { loop_use, face_use },
                LoopUseParent::Shell(shell) => EdgeUseContext::InWireLoop { loop_use, shell },
            },
        }
    }

    /// Shell that ultimately owns an edge use.
    pub fn edge_use_shell(&self, eu: EdgeUseKey) -> ShellKey {
        match self.edge_use_context(eu) {
            EdgeUseContext::InFaceLoop { face_use, .. } => self.fu(face_use).shell,
            EdgeUseContext::InWireLoop { shell, .. } | EdgeUseContext::BareWire { shell } => shell,
        }
    }

    /// Face use owning a loop use, if any.
    pub fn loop_use_face_use(&self, lu: LoopUseKey) -> Option<FaceUseKey> {
        match self.lu(lu).parent {
            LoopUseParent::FaceUse(fu) => Some(fu),
            LoopUseParent::Shell(_) => None,
        }
    }

    pub fn edge_use_start_vertex(&self, eu: EdgeUseKey) -> VertexKey {
        self.vu(self.eu(eu).vertex_use).vertex
    }

    /// End vertex, read from the mate's start.
    pub fn edge_use_end_vertex(&self, eu: EdgeUseKey) -> VertexKey {
        self.edge_use_start_vertex(self.mate(eu))
    }

    pub fn vertex_point(&self, v: VertexKey) -> Option<Point3<f64>> {
        self.v(v).point
    }

    /// Point at the vertex bound by a vertex use.
    pub fn vertex_use_point(&self, vu: VertexUseKey) -> Option<Point3<f64>> {
        self.vertex_point(self.vu(vu).vertex)
    }

    /// Start point of an edge use.
    pub fn edge_use_point(&self, eu: EdgeUseKey) -> Option<Point3<f64>> {
        self.vertex_use_point(self.eu(eu).vertex_use)
    }

    /// Like [`Model::edge_use_point`] for algorithms that cannot proceed
    /// without geometry.
    pub(crate) fn required_point(&self, eu: EdgeUseKey) -> Point3<f64> {
        self.edge_use_point(eu).unwrap_or_else(|| {
            contract_violation(format_args!(
                "vertex of edge use {} has no geometry",
                self.eu(eu).index
            ))
        })
    }

    /// Edge uses visited by walking `radial(mate(x))` from `eu` back to
    /// itself, one per face side around the edge.
    pub fn radial_ring(&self, eu: EdgeUseKey) -> RadialRing {
        let limit = self.edge_uses.len() + 1;
        let mut ring = RadialRing::new();
        let mut cur = eu;
        loop {
            ring.push(cur);
            cur = self.radial(self.mate(cur));
            if cur == eu {
                return ring;
            }
            if ring.len() > limit {
                contract_violation(format_args!(
                    "radial ring of edge use {} does not close",
                    self.eu(eu).index
                ));
            }
        }
    }

    /// Checks every mate, radial and parent invariant.
    ///
    /// Returns the first violation found as [`Error::Contract`].
    pub fn verify(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Contract(msg));

        for (k, eu) in &self.edge_uses {
            let Some(mate) = self.edge_uses.get(eu.mate) else {
                return fail(format!("edge use {} has a dangling mate", eu.index));
            };
            if mate.mate != k {
                return fail(format!("mate of edge use {} is not an involution", eu.index));
            }
            if eu.mate == k {
                return fail(format!("edge use {} is its own mate", eu.index));
            }
            let Some(radial) = self.edge_uses.get(eu.radial) else {
                return fail(format!("edge use {} has a dangling radial", eu.index));
            };
            if radial.radial != k {
                return fail(format!("radial of edge use {} is not an involution", eu.index));
            }
            if mate.edge != eu.edge || radial.edge != eu.edge {
                return fail(format!("edge use {} disagrees with its ring about the edge", eu.index));
            }
            if !self.edges.contains_key(eu.edge) {
                return fail(format!("edge use {} has a dangling edge", eu.index));
            }
            let Some(vu) = self.vertex_uses.get(eu.vertex_use) else {
                return fail(format!("edge use {} has a dangling vertex use", eu.index));
            };
            if vu.parent != VertexUseParent::EdgeUse(k) {
                return fail(format!("vertex use of edge use {} points elsewhere", eu.index));
            }
            match eu.parent {
                EdgeUseParent::Loop(lu) => {
                    let Some(lud) = self.loop_uses.get(lu) else {
                        return fail(format!("edge use {} has a dangling loop", eu.index));
                    };
                    let LoopContents::Edges(eus) = &lud.contents else {
                        return fail(format!("edge use {} is parented to a vertex loop", eu.index));
                    };
                    let Some(pos) = eus.iter().position(|&x| x == k) else {
                        return fail(format!("edge use {} missing from its loop", eu.index));
                    };
                    let next = eus[(pos + 1) % eus.len()];
                    let next_start = self
                        .edge_uses
                        .get(next)
                        .and_then(|n| self.vertex_uses.get(n.vertex_use))
                        .map(|v| v.vertex);
                    let end = self.vertex_uses.get(mate.vertex_use).map(|v| v.vertex);
                    if next_start != end {
                        return fail(format!("loop breaks after edge use {}", eu.index));
                    }
                }
                EdgeUseParent::Shell(s) => {
                    if !self.shells.get(s).is_some_and(|sd| sd.wire_edges.contains(&k)) {
                        return fail(format!("wire edge use {} missing from its shell", eu.index));
                    }
                }
            }
        }

        for (k, e) in &self.edges {
            if self.edge_uses.get(e.edge_use).map(|eu| eu.edge) != Some(k) {
                return fail(format!("edge {} has a foreign primary use", e.index));
            }
            // Bound the ring walk so a broken ring reports instead of spinning.
            let start = e.edge_use;
            let mut cur = start;
            let mut steps = 0;
            loop {
                cur = self.edge_uses[self.edge_uses[cur].mate].radial;
                steps += 1;
                if cur == start {
                    break;
                }
                if steps > self.edge_uses.len() {
                    return fail(format!("radial ring of edge {} does not close", e.index));
                }
            }
        }

        for (k, lu) in &self.loop_uses {
            if self.loop_uses.get(lu.mate).map(|m| m.mate) != Some(k) {
                return fail(format!("mate of loop use {} is not an involution", lu.index));
            }
            let owned = match lu.parent {
                LoopUseParent::FaceUse(fu) => self.face_uses.get(fu).is_some_and(|f| f.loops.contains(&k)),
                LoopUseParent::Shell(s) => self.shells.get(s).is_some_and(|sd| sd.wire_loops.contains(&k)),
            };
            if !owned {
                return fail(format!("loop use {} missing from its parent", lu.index));
            }
            match &lu.contents {
                LoopContents::Edges(eus) if eus.is_empty() => {
                    return fail(format!("loop use {} has no edge uses", lu.index));
                }
                LoopContents::Edges(eus) => {
                    if eus.iter().any(|&eu| self.edge_uses.get(eu).map(|d| d.parent) != Some(EdgeUseParent::Loop(k))) {
                        return fail(format!("loop use {} owns a foreign edge use", lu.index));
                    }
                }
                LoopContents::Vertex(vu) => {
                    if self.vertex_uses.get(*vu).map(|d| d.parent) != Some(VertexUseParent::Loop(k)) {
                        return fail(format!("vertex loop use {} owns a foreign vertex use", lu.index));
                    }
                }
            }
        }

        for (k, fu) in &self.face_uses {
            let Some(mate) = self.face_uses.get(fu.mate) else {
                return fail(format!("face use {} has a dangling mate", fu.index));
            };
            if mate.mate != k || mate.face != fu.face {
                return fail(format!("mate of face use {} is not an involution", fu.index));
            }
            if mate.orientation != fu.orientation.flip() {
                return fail(format!("face use {} and its mate share an orientation", fu.index));
            }
            if !self.shells.get(fu.shell).is_some_and(|s| s.face_uses.contains(&k)) {
                return fail(format!("face use {} missing from its shell", fu.index));
            }
        }

        for (k, vu) in &self.vertex_uses {
            if !self.vertices.get(vu.vertex).is_some_and(|v| v.uses.contains(&k)) {
                return fail(format!("vertex use {} not listed by its vertex", vu.index));
            }
        }

        Ok(())
    }
}
