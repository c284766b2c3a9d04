// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for topology operations.
//!
//! Two tiers exist. Recoverable domain failures (degenerate input, failed
//! plane fit, failed triangulation) are returned as [`Error`] values.
//! Contract violations found while *traversing* a model (a dangling key, a
//! vertex without the geometry an algorithm must read) are not recoverable:
//! they go through [`contract_violation`], which logs and panics.

use crate::keys::TopologyKey;

/// Result type alias for topology operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during topology operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced topology entity was not found in the model.
    #[error("topology entity not found: {0:?}")]
    NotFound(TopologyKey),

    /// A loop needs at least one vertex, a face loop at least three.
    #[error("loop needs at least {needed} vertices, got {got}")]
    DegenerateLoop { needed: usize, got: usize },

    /// Two edge uses being joined do not span the same pair of vertices.
    #[error("edge uses do not share the same two vertices")]
    VertexMismatch,

    /// An edge use being merged into another ring is already part of a
    /// larger radial ring.
    #[error("edge use already belongs to a radial ring of {0} uses")]
    EdgeNotIsolated(usize),

    /// A plane could not be fitted to a face loop.
    #[error("plane fit failed: {0}")]
    PlaneFit(String),

    /// A face could not be triangulated.
    #[error("triangulation failed: {0}")]
    Triangulation(String),

    /// A NURBS curve or surface has inconsistent order, knots or control points.
    #[error("invalid NURBS definition: {0}")]
    InvalidNurb(String),

    /// A mate/radial/parent invariant is broken.
    #[error("topology contract violated: {0}")]
    Contract(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error while writing plot output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reports a broken topology contract and aborts the current traversal.
///
/// Continuing past inconsistent topology yields silently wrong geometry, so
/// this never returns.
#[cold]
#[track_caller]
pub fn contract_violation(message: impl std::fmt::Display) -> ! {
    tracing::error!(%message, "topology contract violated");
    panic!("topology contract violated: {message}");
}
