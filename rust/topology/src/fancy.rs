// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Offset drawing of directed edge uses.
//!
//! Coincident uses of one edge (both sides of a face, or several faces
//! meeting on a non-manifold edge) would overlap exactly if drawn at their
//! true coordinates. The painter here pulls each face-loop use slightly into
//! its face and off the surface, shortens it, and adds two cues: a stroke
//! from its tip to its radial neighbour and a stroke to the start of the next
//! use in the loop.

use nalgebra::{Point3, Vector3};

use crate::arena::{EdgeUseContext, LoopContents, Model, Orientation};
use crate::config::PlotConfig;
use crate::geometry::newell_normal;
use crate::index_table::IndexTable;
use crate::keys::*;
use crate::vlist::{Rgb, Vlblock};

/// Squared magnitude below which the summed left vectors count as zero.
const DELTA_TOL_SQ: f64 = 1.0e-20;

/// Colour of face-loop edges in shell and face drawings.
pub const FACE_EDGE_COLOR: Rgb = Rgb(80, 100, 170);
/// Wire loops in fancy mode.
pub const WIRE_LOOP_FANCY_COLOR: Rgb = Rgb(255, 0, 0);
/// Wire loops in plain mode.
pub const WIRE_LOOP_COLOR: Rgb = Rgb(200, 0, 0);
/// Bare wire edges.
pub const WIRE_EDGE_COLOR: Rgb = Rgb(200, 200, 0);
/// Left-vector fan drawn by [`FancyPainter::around_edge_use`].
pub const FAN_COLOR: Rgb = Rgb(255, 200, 0);

/// Which face sides get the offset edge-use drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fancy {
    /// Uses in `Same` face uses.
    pub same: bool,
    /// Uses in `Opposite` face uses.
    pub opposite: bool,
}

impl Fancy {
    /// Plain drawing: shortened edges and vertices only.
    pub const NONE: Fancy = Fancy {
        same: false,
        opposite: false,
    };
    /// Offset uses on both sides.
    pub const ALL: Fancy = Fancy {
        same: true,
        opposite: true,
    };

    /// Bit 1 selects `Same`, bit 2 selects `Opposite`.
    pub fn from_bits(bits: u8) -> Self {
        Self {
            same: bits & 1 != 0,
            opposite: bits & 2 != 0,
        }
    }

    pub fn any(self) -> bool {
        self.same || self.opposite
    }

    fn allows(self, face: Orientation) -> bool {
        match face {
            Orientation::Same => self.same,
            Orientation::Opposite => self.opposite,
            Orientation::Unspecified => self.any(),
        }
    }
}

/// Fixed colour for an edge use, keyed by its face use and loop use
/// orientations.
pub fn orientation_color(face: Orientation, lp: Orientation) -> Rgb {
    match (face, lp) {
        (Orientation::Same, Orientation::Same) => Rgb(75, 250, 75),
        (Orientation::Same, Orientation::Opposite) => Rgb(250, 250, 75),
        (Orientation::Same, _) => Rgb(250, 50, 250),
        (Orientation::Opposite, Orientation::Same) => Rgb(100, 100, 250),
        (Orientation::Opposite, Orientation::Opposite) => Rgb(200, 100, 250),
        (Orientation::Opposite, _) => Rgb(125, 0, 125),
        (Orientation::Unspecified, _) => Rgb::WHITE,
    }
}

/// Draws topology into a [`Vlblock`] with offset edge uses.
///
/// All `vlblock`-style calls take the traversal's [`IndexTable`] so each
/// entity is drawn once per pass.
#[derive(Debug, Clone, Copy)]
pub struct FancyPainter<'m> {
    model: &'m Model,
    eue_dist: f64,
}

impl<'m> FancyPainter<'m> {
    pub fn new(model: &'m Model, config: &PlotConfig) -> Self {
        Self::with_eue_dist(model, config.eue_dist)
    }

    pub fn with_eue_dist(model: &'m Model, eue_dist: f64) -> Self {
        Self { model, eue_dist }
    }

    pub fn model(&self) -> &'m Model {
        self.model
    }

    pub fn eue_dist(&self) -> f64 {
        self.eue_dist
    }

    // --- Offset geometry ---

    /// Offset position of the start vertex of `eu`, lifted along `normal`.
    ///
    /// The in-plane direction bisects the left vectors of `eu` and of the
    /// use before it. When those cancel, `tip` picks the previous use's left
    /// vector and `!tip` picks this use's own.
    pub fn offset_eu_vertex(&self, eu: EdgeUseKey, normal: &Vector3<f64>, tip: bool) -> Option<Point3<f64>> {
        let m = self.model;
        let prev = m.prev_in_loop(eu)?;
        let pt = m.edge_use_point(eu)?;
        let mate_pt = m.edge_use_point(m.mate(eu))?;
        let prev_pt = m.edge_use_point(prev)?;

        let unit = |v: Vector3<f64>| v.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
        let eu_left = normal.cross(&unit(mate_pt - pt));
        let prev_left = normal.cross(&unit(pt - prev_pt));
        let delta = prev_left + eu_left;

        let along = if delta.norm_squared() > DELTA_TOL_SQ {
            delta.normalize()
        } else if tip {
            prev_left
        } else {
            eu_left
        };
        Some(pt + along * (self.eue_dist * 1.3) + normal * (self.eue_dist * 0.8))
    }

    /// Normal used to lift the uses of a face use.
    fn face_use_lift_normal(&self, fu: FaceUseKey) -> Vector3<f64> {
        let m = self.model;
        if let Some(n) = m.face_use_normal(fu) {
            return n;
        }
        // Curved or unfitted faces: the winding of the outer loop as used.
        let Some(&outer) = m.fu(fu).loops.first() else {
            return Vector3::zeros();
        };
        let n = m.loop_points(outer).map(|pts| newell_normal(&pts)).unwrap_or_else(Vector3::zeros);
        n.try_normalize(1e-15).unwrap_or_else(Vector3::zeros)
    }

    /// The `(base, tip60)` pair that represents `eu`.
    ///
    /// Wire uses run between their true endpoints. Face-loop uses run from
    /// the offset base of `eu` towards the offset tip at the next use;
    /// `tip60` stops 60% of the way there.
    pub fn edge_use_coords(&self, eu: EdgeUseKey) -> Option<(Point3<f64>, Point3<f64>)> {
        let m = self.model;
        let (base, tip) = match m.edge_use_context(eu) {
            EdgeUseContext::BareWire { .. } | EdgeUseContext::InWireLoop { .. } => {
                (m.edge_use_point(eu)?, m.edge_use_point(m.mate(eu))?)
            }
            EdgeUseContext::InFaceLoop { face_use, .. } => {
                let normal = self.face_use_lift_normal(face_use);
                let next = m.next_in_loop(eu)?;
                (
                    self.offset_eu_vertex(eu, &normal, false)?,
                    self.offset_eu_vertex(next, &normal, true)?,
                )
            }
        };
        Some((base, Point3::from(base.coords * 0.4 + tip.coords * 0.6)))
    }

    /// Point 80% along the drawn part of `radial(eu)`.
    pub fn radial_tip(&self, eu: EdgeUseKey) -> Option<Point3<f64>> {
        let (b2, t2) = self.edge_use_coords(self.model.radial(eu))?;
        Some(Point3::from(t2.coords * 0.8 + b2.coords * 0.2))
    }

    /// Offset base of the use after `eu` in its loop.
    pub fn next_base(&self, eu: EdgeUseKey) -> Option<Point3<f64>> {
        let next = self.model.next_in_loop(eu)?;
        self.edge_use_coords(next).map(|(base, _)| base)
    }

    // --- Block drawing ---

    /// A white point at `v`.
    pub fn vertex(&self, block: &mut Vlblock, tab: &mut IndexTable, v: VertexKey) {
        let data = self.model.v(v);
        if !tab.mark(data.index) {
            return;
        }
        match data.point {
            Some(p) => block.find(Rgb::WHITE).point(p),
            None => tracing::warn!(vertex = data.index, "vertex without geometry not drawn"),
        }
    }

    /// The middle of edge `e` in `color`, plus both of its vertices.
    pub fn edge(&self, block: &mut Vlblock, tab: &mut IndexTable, e: EdgeKey, color: Rgb) {
        let m = self.model;
        let data = m.e(e);
        if !tab.mark(data.index) {
            return;
        }
        let eu = data.edge_use;
        let (v0, v1) = (m.edge_use_start_vertex(eu), m.edge_use_end_vertex(eu));
        match (m.vertex_point(v0), m.vertex_point(v1)) {
            (Some(p0), Some(p1)) => {
                let v = (p1 - p0) * 0.9;
                let vl = block.find(color);
                vl.move_to(p0 + v);
                vl.draw_to(p1 - v);
            }
            _ => tracing::warn!(edge = data.index, "edge without geometry not drawn"),
        }
        self.vertex(block, tab, v0);
        self.vertex(block, tab, v1);
    }

    /// Draws the edge of `eu` and, for face-loop uses selected by `fancy`,
    /// the offset use with its radial and next-use cues.
    pub fn edge_use(&self, block: &mut Vlblock, tab: &mut IndexTable, eu: EdgeUseKey, color: Rgb, fancy: Fancy) {
        let m = self.model;
        let data = m.eu(eu);
        if !tab.mark(data.index) {
            return;
        }
        self.edge(block, tab, data.edge, color);

        if !fancy.any() {
            return;
        }
        let EdgeUseContext::InFaceLoop { loop_use, face_use } = m.edge_use_context(eu) else {
            return;
        };
        let face_orient = m.fu(face_use).orientation;
        if !fancy.allows(face_orient) {
            return;
        }

        let (Some((base, tip)), Some(radial_tip), Some(next_base)) =
            (self.edge_use_coords(eu), self.radial_tip(eu), self.next_base(eu))
        else {
            tracing::warn!(edge_use = data.index, "edge use without geometry not drawn");
            return;
        };
        let color = orientation_color(face_orient, m.lu(loop_use).orientation);

        let vl = block.find(color);
        vl.move_to(base);
        vl.draw_to(tip);

        let vl = block.find(color.offset(0, -20, 0));
        vl.move_to(tip);
        vl.draw_to(radial_tip);

        let vl = block.find(color.half());
        vl.move_to(tip);
        vl.draw_to(next_base);
    }

    pub fn loop_use(&self, block: &mut Vlblock, tab: &mut IndexTable, lu: LoopUseKey, color: Rgb, fancy: Fancy) {
        let data = self.model.lu(lu);
        if !tab.mark(data.index) {
            return;
        }
        match &data.contents {
            LoopContents::Vertex(vu) => self.vertex(block, tab, self.model.vu(*vu).vertex),
            LoopContents::Edges(eus) => {
                for &eu in eus {
                    self.edge_use(block, tab, eu, color, fancy);
                }
            }
        }
    }

    pub fn face_use(&self, block: &mut Vlblock, tab: &mut IndexTable, fu: FaceUseKey, fancy: Fancy) {
        let data = self.model.fu(fu);
        if !tab.mark(data.index) {
            return;
        }
        for &lu in &data.loops {
            self.loop_use(block, tab, lu, FACE_EDGE_COLOR, fancy);
        }
    }

    /// Draws a whole shell with a fresh visited table.
    pub fn shell(&self, block: &mut Vlblock, shell: ShellKey, fancy: Fancy) {
        let mut tab = IndexTable::for_model(self.model);
        let sd = self.model.s(shell);

        for &fu in &sd.face_uses {
            self.face_use(block, &mut tab, fu, fancy);
        }
        let wire_color = if fancy.any() {
            WIRE_LOOP_FANCY_COLOR
        } else {
            WIRE_LOOP_COLOR
        };
        for &lu in &sd.wire_loops {
            self.loop_use(block, &mut tab, lu, wire_color, fancy);
        }
        for &eu in &sd.wire_edges {
            self.edge_use(block, &mut tab, eu, WIRE_EDGE_COLOR, fancy);
        }
        if let Some(vu) = sd.vertex_use {
            self.vertex(block, &mut tab, self.model.vu(vu).vertex);
        }
    }

    pub fn region(&self, block: &mut Vlblock, region: RegionKey, fancy: Fancy) {
        for &shell in &self.model.r(region).shells {
            self.shell(block, shell, fancy);
        }
    }

    pub fn model_block(&self, block: &mut Vlblock, fancy: Fancy) {
        for region in self.model.region_keys() {
            self.region(block, region, fancy);
        }
    }

    /// Draws every use around the edge of `eu`, both directions, with full
    /// offset cues. With `fan`, also strokes each use's left vector out from
    /// the edge midpoint, scaled to a fifth of the edge length.
    pub fn around_edge_use(&self, block: &mut Vlblock, tab: &mut IndexTable, eu: EdgeUseKey, fan: bool) {
        let m = self.model;
        let fan_origin = if fan {
            match (m.edge_use_point(eu), m.edge_use_point(m.mate(eu))) {
                (Some(p0), Some(p1)) => Some((p0 + (p1 - p0) * 0.5, (p1 - p0).norm() * 0.2)),
                _ => None,
            }
        } else {
            None
        };

        for cur in m.radial_ring(m.mate(eu)) {
            if let Some((center, fan_len)) = fan_origin {
                if let Some(left) = m.edge_use_left_vector(cur) {
                    let vl = block.find(FAN_COLOR);
                    vl.move_to(center);
                    vl.draw_to(center + left * fan_len);
                }
            }
            self.edge_use(block, tab, cur, FACE_EDGE_COLOR, Fancy::ALL);
            self.edge_use(block, tab, m.mate(cur), FACE_EDGE_COLOR, Fancy::ALL);
        }
    }

    /// If some use around the edge of face-loop use `eu` belongs to a face
    /// in another shell, draws every use around the edge and returns `true`.
    pub fn edges_in_two_shells(&self, block: &mut Vlblock, tab: &mut IndexTable, eu: EdgeUseKey, fan: bool) -> bool {
        let m = self.model;
        let EdgeUseContext::InFaceLoop { face_use, .. } = m.edge_use_context(eu) else {
            return false;
        };
        let shell = m.fu(face_use).shell;

        let limit = m.edge_use_count();
        let mut cur = eu;
        for _ in 0..limit {
            if let EdgeUseContext::InFaceLoop { face_use, .. } = m.edge_use_context(cur) {
                if m.fu(face_use).shell != shell {
                    self.around_edge_use(block, tab, eu, fan);
                    return true;
                }
            }
            cur = m.mate(m.radial(cur));
            if cur == eu {
                break;
            }
        }
        false
    }
}
