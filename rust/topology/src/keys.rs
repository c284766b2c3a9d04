// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topology key types for arena-based storage.
//!
//! Every entity of the radial-edge model (shared identities and their uses)
//! gets a type-safe generational key from a `slotmap::SlotMap`. Keys stay
//! valid while other entities are removed, so mate and radial links can be
//! stored as plain keys without forming ownership cycles.

use slotmap::new_key_type;

new_key_type! {
    /// Key for a region (top-level container of shells).
    pub struct RegionKey;

    /// Key for a shell (connected aggregate of faces, wires and points).
    pub struct ShellKey;

    /// Key for a face (shared identity bound to a surface).
    pub struct FaceKey;

    /// Key for one oriented use of a face.
    pub struct FaceUseKey;

    /// Key for a loop (shared identity of a boundary cycle).
    pub struct LoopKey;

    /// Key for one oriented use of a loop.
    pub struct LoopUseKey;

    /// Key for an edge (shared identity of a radial ring).
    pub struct EdgeKey;

    /// Key for one directed use of an edge.
    pub struct EdgeUseKey;

    /// Key for a vertex (point identity).
    pub struct VertexKey;

    /// Key for one use of a vertex.
    pub struct VertexUseKey;
}

/// A key that can reference any topology entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopologyKey {
    Region(RegionKey),
    Shell(ShellKey),
    Face(FaceKey),
    FaceUse(FaceUseKey),
    Loop(LoopKey),
    LoopUse(LoopUseKey),
    Edge(EdgeKey),
    EdgeUse(EdgeUseKey),
    Vertex(VertexKey),
    VertexUse(VertexUseKey),
}

impl TopologyKey {
    /// Returns the entity kind of this key.
    pub fn kind(&self) -> EntityKind {
        match self {
            TopologyKey::Region(_) => EntityKind::Region,
            TopologyKey::Shell(_) => EntityKind::Shell,
            TopologyKey::Face(_) => EntityKind::Face,
            TopologyKey::FaceUse(_) => EntityKind::FaceUse,
            TopologyKey::Loop(_) => EntityKind::Loop,
            TopologyKey::LoopUse(_) => EntityKind::LoopUse,
            TopologyKey::Edge(_) => EntityKind::Edge,
            TopologyKey::EdgeUse(_) => EntityKind::EdgeUse,
            TopologyKey::Vertex(_) => EntityKind::Vertex,
            TopologyKey::VertexUse(_) => EntityKind::VertexUse,
        }
    }
}

/// Discriminant for topology entity kinds, ordered from the containment
/// root down to the point level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Region = 0,
    Shell = 1,
    Face = 2,
    FaceUse = 3,
    Loop = 4,
    LoopUse = 5,
    Edge = 6,
    EdgeUse = 7,
    Vertex = 8,
    VertexUse = 9,
}

impl EntityKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Region => "Region",
            EntityKind::Shell => "Shell",
            EntityKind::Face => "Face",
            EntityKind::FaceUse => "FaceUse",
            EntityKind::Loop => "Loop",
            EntityKind::LoopUse => "LoopUse",
            EntityKind::Edge => "Edge",
            EntityKind::EdgeUse => "EdgeUse",
            EntityKind::Vertex => "Vertex",
            EntityKind::VertexUse => "VertexUse",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! impl_from_key {
    ($($key:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$key> for TopologyKey {
                fn from(k: $key) -> Self {
                    TopologyKey::$variant(k)
                }
            }
        )*
    };
}

impl_from_key! {
    RegionKey => Region,
    ShellKey => Shell,
    FaceKey => Face,
    FaceUseKey => FaceUse,
    LoopKey => Loop,
    LoopUseKey => LoopUse,
    EdgeKey => Edge,
    EdgeUseKey => EdgeUse,
    VertexKey => Vertex,
    VertexUseKey => VertexUse,
}
