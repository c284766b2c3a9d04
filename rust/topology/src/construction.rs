// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Construction and destruction of topology entities.
//!
//! Every builder goes through the [`Model`], which validates referenced keys,
//! hands out dense indices and keeps the mate/radial links consistent.
//! Vertices are never removed: killing a use detaches it from its vertex but
//! leaves the vertex available for reuse.

use nalgebra::Point3;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::arena::*;
use crate::error::{Error, Result};
use crate::geometry::Plane;
use crate::keys::*;
use crate::nurbs::NurbSurface;

impl Model {
    // --- Containers ---

    /// Creates a region holding one empty shell.
    pub fn add_region(&mut self) -> (RegionKey, ShellKey) {
        let index = self.next_index();
        let region = self.regions.insert(RegionData {
            index,
            shells: Vec::new(),
        });
        let shell = self.insert_shell(region);
        (region, shell)
    }

    /// Adds an empty shell to an existing region.
    pub fn add_shell(&mut self, region: RegionKey) -> Result<ShellKey> {
        if !self.regions.contains_key(region) {
            return Err(Error::NotFound(region.into()));
        }
        Ok(self.insert_shell(region))
    }

    fn insert_shell(&mut self, region: RegionKey) -> ShellKey {
        let index = self.next_index();
        let shell = self.shells.insert(ShellData {
            index,
            region,
            face_uses: Vec::new(),
            wire_loops: Vec::new(),
            wire_edges: Vec::new(),
            vertex_use: None,
        });
        self.regions[region].shells.push(shell);
        shell
    }

    // --- Vertices ---

    /// Adds a vertex at the given point.
    pub fn add_vertex(&mut self, point: Point3<f64>) -> VertexKey {
        let index = self.next_index();
        self.vertices.insert(VertexData {
            index,
            point: Some(point),
            uses: Vec::new(),
        })
    }

    /// Adds a vertex that has no geometry yet.
    pub fn add_vertex_without_geometry(&mut self) -> VertexKey {
        let index = self.next_index();
        self.vertices.insert(VertexData {
            index,
            point: None,
            uses: Vec::new(),
        })
    }

    pub fn set_vertex_point(&mut self, v: VertexKey, point: Point3<f64>) -> Result<()> {
        let data = self.vertices.get_mut(v).ok_or(Error::NotFound(v.into()))?;
        data.point = Some(point);
        Ok(())
    }

    fn check_vertices(&self, verts: &[VertexKey], needed: usize) -> Result<()> {
        if verts.len() < needed {
            return Err(Error::DegenerateLoop {
                needed,
                got: verts.len(),
            });
        }
        if let Some(&missing) = verts.iter().find(|&&v| !self.vertices.contains_key(v)) {
            return Err(Error::NotFound(missing.into()));
        }
        Ok(())
    }

    fn new_vertex_use(&mut self, vertex: VertexKey, parent: VertexUseParent) -> VertexUseKey {
        let index = self.next_index();
        let vu = self.vertex_uses.insert(VertexUseData {
            index,
            vertex,
            parent,
            attribute: None,
        });
        self.vertices[vertex].uses.push(vu);
        vu
    }

    fn kill_vertex_use(&mut self, vu: VertexUseKey) {
        if let Some(data) = self.vertex_uses.remove(vu) {
            if let Some(v) = self.vertices.get_mut(data.vertex) {
                v.uses.retain(|&k| k != vu);
            }
        }
    }

    // --- Edges ---

    /// Creates a new edge used by `a -> b` (in `parent`) and its mate
    /// `b -> a` (in `mate_parent`). The radial ring holds just the pair.
    fn new_edge_use_pair(
        &mut self,
        a: VertexKey,
        b: VertexKey,
        parent: EdgeUseParent,
        mate_parent: EdgeUseParent,
    ) -> (EdgeUseKey, EdgeUseKey) {
        let edge_index = self.next_index();
        let edge = self.edges.insert(EdgeData {
            index: edge_index,
            edge_use: EdgeUseKey::default(),
            curve: EdgeCurve::Linear,
        });

        let make_use = |model: &mut Model, parent: EdgeUseParent| {
            let index = model.next_index();
            model.edge_uses.insert(EdgeUseData {
                index,
                parent,
                edge,
                mate: EdgeUseKey::default(),
                radial: EdgeUseKey::default(),
                vertex_use: VertexUseKey::default(),
            })
        };
        let eu = make_use(self, parent);
        let mate = make_use(self, mate_parent);

        let vu = self.new_vertex_use(a, VertexUseParent::EdgeUse(eu));
        let vu_mate = self.new_vertex_use(b, VertexUseParent::EdgeUse(mate));

        let d = &mut self.edge_uses[eu];
        d.mate = mate;
        d.radial = mate;
        d.vertex_use = vu;
        let d = &mut self.edge_uses[mate];
        d.mate = eu;
        d.radial = eu;
        d.vertex_use = vu_mate;

        self.edges[edge].edge_use = eu;
        (eu, mate)
    }

    /// Builds a loop use over `verts` in `parent` and its reversed mate in
    /// `mate_parent`.
    pub(crate) fn new_edge_loop(
        &mut self,
        verts: &[VertexKey],
        parent: LoopUseParent,
        mate_parent: LoopUseParent,
        orientation: Orientation,
    ) -> (LoopUseKey, LoopUseKey) {
        let (lu, lu_mate) = self.new_loop_use_pair(parent, mate_parent, orientation);

        let n = verts.len();
        let mut eus = Vec::with_capacity(n);
        let mut mates = Vec::with_capacity(n);
        for i in 0..n {
            let (eu, mate) = self.new_edge_use_pair(
                verts[i],
                verts[(i + 1) % n],
                EdgeUseParent::Loop(lu),
                EdgeUseParent::Loop(lu_mate),
            );
            eus.push(eu);
            mates.push(mate);
        }
        mates.reverse();

        self.loop_uses[lu].contents = LoopContents::Edges(eus);
        self.loop_uses[lu_mate].contents = LoopContents::Edges(mates);
        (lu, lu_mate)
    }

    fn new_loop_use_pair(
        &mut self,
        parent: LoopUseParent,
        mate_parent: LoopUseParent,
        orientation: Orientation,
    ) -> (LoopUseKey, LoopUseKey) {
        let index = self.next_index();
        let lp = self.loops.insert(LoopData {
            index,
            loop_use: LoopUseKey::default(),
        });

        let make_use = |model: &mut Model, parent: LoopUseParent| {
            let index = model.next_index();
            model.loop_uses.insert(LoopUseData {
                index,
                parent,
                lp,
                mate: LoopUseKey::default(),
                orientation,
                contents: LoopContents::Edges(Vec::new()),
            })
        };
        let lu = make_use(self, parent);
        let lu_mate = make_use(self, mate_parent);
        self.loop_uses[lu].mate = lu_mate;
        self.loop_uses[lu_mate].mate = lu;
        self.loops[lp].loop_use = lu;
        (lu, lu_mate)
    }

    // --- Faces ---

    /// Creates a face bounded by one loop through `verts`, in order.
    ///
    /// Produces the face, its `Same` and `Opposite` face uses, a loop use in
    /// each, and one new edge per side. Returns the `Same` face use.
    pub fn make_face(&mut self, shell: ShellKey, verts: &[VertexKey]) -> Result<FaceUseKey> {
        if !self.shells.contains_key(shell) {
            return Err(Error::NotFound(shell.into()));
        }
        self.check_vertices(verts, 3)?;

        let index = self.next_index();
        let face = self.faces.insert(FaceData {
            index,
            geometry: FaceGeometry::None,
            face_use: FaceUseKey::default(),
        });

        let make_use = |model: &mut Model, orientation: Orientation| {
            let index = model.next_index();
            model.face_uses.insert(FaceUseData {
                index,
                shell,
                face,
                mate: FaceUseKey::default(),
                orientation,
                loops: Vec::new(),
            })
        };
        let fu = make_use(self, Orientation::Same);
        let fu_mate = make_use(self, Orientation::Opposite);
        self.face_uses[fu].mate = fu_mate;
        self.face_uses[fu_mate].mate = fu;
        self.faces[face].face_use = fu;

        let (lu, lu_mate) = self.new_edge_loop(
            verts,
            LoopUseParent::FaceUse(fu),
            LoopUseParent::FaceUse(fu_mate),
            Orientation::Same,
        );
        self.face_uses[fu].loops.push(lu);
        self.face_uses[fu_mate].loops.push(lu_mate);

        let sd = &mut self.shells[shell];
        sd.face_uses.push(fu);
        sd.face_uses.push(fu_mate);
        Ok(fu)
    }

    /// Adds an inner boundary through `verts` to the face of `fu`.
    ///
    /// The hole's loop uses get `Opposite` orientation on both sides.
    pub fn add_hole(&mut self, fu: FaceUseKey, verts: &[VertexKey]) -> Result<LoopUseKey> {
        let fu_mate = self
            .face_uses
            .get(fu)
            .map(|d| d.mate)
            .ok_or(Error::NotFound(fu.into()))?;
        self.check_vertices(verts, 3)?;

        let (lu, lu_mate) = self.new_edge_loop(
            verts,
            LoopUseParent::FaceUse(fu),
            LoopUseParent::FaceUse(fu_mate),
            Orientation::Opposite,
        );
        self.face_uses[fu].loops.push(lu);
        self.face_uses[fu_mate].loops.push(lu_mate);
        Ok(lu)
    }

    /// Sets the orientation of `fu` and flips its mate to match.
    pub fn set_face_use_orientation(&mut self, fu: FaceUseKey, orientation: Orientation) -> Result<()> {
        let mate = self
            .face_uses
            .get(fu)
            .map(|d| d.mate)
            .ok_or(Error::NotFound(fu.into()))?;
        self.face_uses[fu].orientation = orientation;
        self.face_uses[mate].orientation = orientation.flip();
        Ok(())
    }

    // --- Wires and points ---

    /// Creates a wire edge `a -> b` (and its mate) directly in a shell.
    pub fn make_wire_edge(&mut self, shell: ShellKey, a: VertexKey, b: VertexKey) -> Result<EdgeUseKey> {
        if !self.shells.contains_key(shell) {
            return Err(Error::NotFound(shell.into()));
        }
        self.check_vertices(&[a, b], 2)?;

        let parent = EdgeUseParent::Shell(shell);
        let (eu, mate) = self.new_edge_use_pair(a, b, parent, parent);
        let sd = &mut self.shells[shell];
        sd.wire_edges.push(eu);
        sd.wire_edges.push(mate);
        Ok(eu)
    }

    /// Creates a closed wire loop through `verts` (and its reversed mate)
    /// directly in a shell.
    pub fn make_wire_loop(&mut self, shell: ShellKey, verts: &[VertexKey]) -> Result<LoopUseKey> {
        if !self.shells.contains_key(shell) {
            return Err(Error::NotFound(shell.into()));
        }
        self.check_vertices(verts, 2)?;

        let parent = LoopUseParent::Shell(shell);
        let (lu, lu_mate) = self.new_edge_loop(verts, parent, parent, Orientation::Unspecified);
        let sd = &mut self.shells[shell];
        sd.wire_loops.push(lu);
        sd.wire_loops.push(lu_mate);
        Ok(lu)
    }

    /// Creates a degenerate loop holding the single vertex `v`.
    pub fn make_vertex_loop(&mut self, shell: ShellKey, v: VertexKey) -> Result<LoopUseKey> {
        if !self.shells.contains_key(shell) {
            return Err(Error::NotFound(shell.into()));
        }
        self.check_vertices(&[v], 1)?;

        let parent = LoopUseParent::Shell(shell);
        let (lu, lu_mate) = self.new_loop_use_pair(parent, parent, Orientation::Unspecified);
        let vu = self.new_vertex_use(v, VertexUseParent::Loop(lu));
        let vu_mate = self.new_vertex_use(v, VertexUseParent::Loop(lu_mate));
        self.loop_uses[lu].contents = LoopContents::Vertex(vu);
        self.loop_uses[lu_mate].contents = LoopContents::Vertex(vu_mate);

        let sd = &mut self.shells[shell];
        sd.wire_loops.push(lu);
        sd.wire_loops.push(lu_mate);
        Ok(lu)
    }

    /// Makes `v` the lone vertex of `shell`, replacing any previous one.
    pub fn set_shell_vertex(&mut self, shell: ShellKey, v: VertexKey) -> Result<VertexUseKey> {
        let old = self
            .shells
            .get(shell)
            .map(|s| s.vertex_use)
            .ok_or(Error::NotFound(shell.into()))?;
        self.check_vertices(&[v], 1)?;

        if let Some(old) = old {
            self.kill_vertex_use(old);
        }
        let vu = self.new_vertex_use(v, VertexUseParent::Shell(shell));
        self.shells[shell].vertex_use = Some(vu);
        Ok(vu)
    }

    // --- Geometry binding ---

    pub fn set_face_plane(&mut self, face: FaceKey, plane: Plane) -> Result<()> {
        let data = self.faces.get_mut(face).ok_or(Error::NotFound(face.into()))?;
        data.geometry = FaceGeometry::Plane(plane);
        Ok(())
    }

    pub fn set_face_surface(&mut self, face: FaceKey, surface: NurbSurface) -> Result<()> {
        let data = self.faces.get_mut(face).ok_or(Error::NotFound(face.into()))?;
        data.geometry = FaceGeometry::Nurb(surface);
        Ok(())
    }

    /// Binds a curve to an edge. The curve runs along the edge's primary use.
    pub fn set_edge_curve(&mut self, edge: EdgeKey, curve: EdgeCurve) -> Result<()> {
        let data = self.edges.get_mut(edge).ok_or(Error::NotFound(edge.into()))?;
        data.curve = curve;
        Ok(())
    }

    pub fn set_vertex_use_attribute(
        &mut self,
        vu: VertexUseKey,
        attribute: Option<VertexUseAttribute>,
    ) -> Result<()> {
        let data = self.vertex_uses.get_mut(vu).ok_or(Error::NotFound(vu.into()))?;
        data.attribute = attribute;
        Ok(())
    }

    // --- Radial joins ---

    /// Merges the edge of `eu2` into the radial ring of `eu1`.
    ///
    /// Both uses must span the same two vertices and `eu2`'s edge must not
    /// be shared yet. The new pair is spliced in right after `mate(eu1)`;
    /// callers wanting angular order join faces in that order.
    pub fn join_edge_uses(&mut self, eu1: EdgeUseKey, eu2: EdgeUseKey) -> Result<()> {
        let d1 = self.edge_uses.get(eu1).ok_or(Error::NotFound(eu1.into()))?;
        let d2 = self.edge_uses.get(eu2).ok_or(Error::NotFound(eu2.into()))?;
        let (edge1, edge2) = (d1.edge, d2.edge);
        if edge1 == edge2 {
            return Ok(());
        }

        let ring2 = self.radial_ring(eu2).len();
        if ring2 != 1 {
            return Err(Error::EdgeNotIsolated(ring2));
        }

        let (a1, b1) = (self.edge_use_start_vertex(eu1), self.edge_use_end_vertex(eu1));
        let (a2, b2) = (self.edge_use_start_vertex(eu2), self.edge_use_end_vertex(eu2));
        let x = if (a1, b1) == (a2, b2) {
            eu2
        } else if (a1, b1) == (b2, a2) {
            self.mate(eu2)
        } else {
            return Err(Error::VertexMismatch);
        };
        let x_mate = self.mate(x);

        let p = self.mate(eu1);
        let q = self.radial(p);
        self.edge_uses[p].radial = x;
        self.edge_uses[x].radial = p;
        self.edge_uses[x_mate].radial = q;
        self.edge_uses[q].radial = x_mate;

        self.edge_uses[x].edge = edge1;
        self.edge_uses[x_mate].edge = edge1;
        if let Some(old) = self.edges.remove(edge2) {
            // Keep a curve that only the absorbed edge carried, provided it
            // runs the same way as the surviving primary use.
            let host_is_linear = matches!(self.edges[edge1].curve, EdgeCurve::Linear);
            if let (true, EdgeCurve::Nurb(curve)) = (host_is_linear, old.curve) {
                let primary = self.edges[edge1].edge_use;
                if self.edge_use_start_vertex(primary) == self.edge_use_start_vertex(old.edge_use) {
                    self.edges[edge1].curve = EdgeCurve::Nurb(curve);
                } else {
                    tracing::debug!(edge = self.edges[edge1].index, "dropping reversed curve on join");
                }
            }
        }
        Ok(())
    }

    /// Joins every pair of edges that span the same two vertices.
    ///
    /// Returns the number of joins performed.
    pub fn fuse_shared_edges(&mut self) -> usize {
        let edges: Vec<EdgeKey> = self.edges.keys().collect();
        self.fuse_edges(&edges)
    }

    /// Joins each edge of `candidates` into the first other edge spanning
    /// the same vertex pair.
    pub(crate) fn fuse_edges(&mut self, candidates: &[EdgeKey]) -> usize {
        let mut by_pair: FxHashMap<(VertexKey, VertexKey), EdgeUseKey> = FxHashMap::default();
        let mut joins = 0;
        // Edges outside the candidate set host first.
        let candidate_set: FxHashSet<EdgeKey> = candidates.iter().copied().collect();
        let (mut hosts, rest): (Vec<_>, Vec<_>) = self
            .edges
            .iter()
            .map(|(k, e)| (k, e.edge_use))
            .partition(|(k, _)| !candidate_set.contains(k));
        hosts.extend(rest);
        for (_, eu) in hosts {
            let (a, b) = (self.edge_use_start_vertex(eu), self.edge_use_end_vertex(eu));
            let pair = if a <= b { (a, b) } else { (b, a) };
            by_pair.entry(pair).or_insert(eu);
        }

        let mut pending = Vec::new();
        for &edge in candidates {
            let Some(e) = self.edges.get(edge) else { continue };
            let eu = e.edge_use;
            let (a, b) = (self.edge_use_start_vertex(eu), self.edge_use_end_vertex(eu));
            if a == b {
                continue;
            }
            let pair = if a <= b { (a, b) } else { (b, a) };
            if let Some(&host) = by_pair.get(&pair) {
                if self.edge_uses[host].edge != edge {
                    pending.push((host, eu));
                }
            }
        }

        for (host, eu) in pending {
            match self.join_edge_uses(host, eu) {
                Ok(()) => joins += 1,
                Err(err) => tracing::debug!(%err, "edge join skipped"),
            }
        }
        joins
    }

    // --- Destruction ---

    /// Removes an edge use pair from its radial ring. The edge goes away with
    /// its last pair.
    fn unlink_edge_use_pair(&mut self, eu: EdgeUseKey) {
        let mate = self.edge_uses[eu].mate;
        let edge = self.edge_uses[eu].edge;
        let a = self.edge_uses[eu].radial;
        let b = self.edge_uses[mate].radial;

        if a == mate {
            self.edges.remove(edge);
        } else {
            self.edge_uses[a].radial = b;
            self.edge_uses[b].radial = a;
            // `b` runs the same way as `eu`, `a` the same way as `mate`.
            let primary = self.edges[edge].edge_use;
            if primary == eu {
                self.edges[edge].edge_use = b;
            } else if primary == mate {
                self.edges[edge].edge_use = a;
            }
        }

        for k in [eu, mate] {
            if let Some(d) = self.edge_uses.remove(k) {
                self.kill_vertex_use(d.vertex_use);
            }
        }
    }

    /// Kills a loop use together with its mate and every edge use in both.
    pub fn kill_loop_use(&mut self, lu: LoopUseKey) -> Result<()> {
        if !self.loop_uses.contains_key(lu) {
            return Err(Error::NotFound(lu.into()));
        }
        self.kill_loop_use_unchecked(lu);
        Ok(())
    }

    /// [`Model::kill_loop_use`] for a loop use known to exist.
    fn kill_loop_use_unchecked(&mut self, lu: LoopUseKey) {
        let data = self.lu(lu);
        let (mate, lp) = (data.mate, data.lp);
        let eus = match &data.contents {
            LoopContents::Edges(eus) => eus.clone(),
            LoopContents::Vertex(_) => Vec::new(),
        };

        for eu in eus {
            self.unlink_edge_use_pair(eu);
        }
        for k in [lu, mate] {
            let Some(d) = self.loop_uses.remove(k) else { continue };
            if let LoopContents::Vertex(vu) = d.contents {
                self.kill_vertex_use(vu);
            }
            match d.parent {
                LoopUseParent::FaceUse(fu) => {
                    if let Some(f) = self.face_uses.get_mut(fu) {
                        f.loops.retain(|&x| x != k);
                    }
                }
                LoopUseParent::Shell(s) => {
                    if let Some(sd) = self.shells.get_mut(s) {
                        sd.wire_loops.retain(|&x| x != k);
                    }
                }
            }
        }
        self.loops.remove(lp);
    }

    fn kill_face_use(&mut self, fu: FaceUseKey) {
        let Some(data) = self.face_uses.get(fu) else { return };
        let (mate, face, shell) = (data.mate, data.face, data.shell);
        let loops = data.loops.clone();
        for lu in loops {
            if self.loop_uses.contains_key(lu) {
                self.kill_loop_use_unchecked(lu);
            }
        }
        self.face_uses.remove(fu);
        self.face_uses.remove(mate);
        self.faces.remove(face);
        if let Some(sd) = self.shells.get_mut(shell) {
            sd.face_uses.retain(|&x| x != fu && x != mate);
        }
    }

    fn kill_shell(&mut self, shell: ShellKey) {
        let Some(sd) = self.shells.get(shell) else { return };
        let face_uses = sd.face_uses.clone();
        let wire_loops = sd.wire_loops.clone();
        let wire_edges = sd.wire_edges.clone();
        let vertex_use = sd.vertex_use;

        for fu in face_uses {
            self.kill_face_use(fu);
        }
        for lu in wire_loops {
            if self.loop_uses.contains_key(lu) {
                self.kill_loop_use_unchecked(lu);
            }
        }
        for eu in wire_edges {
            if self.edge_uses.contains_key(eu) {
                self.unlink_edge_use_pair(eu);
            }
        }
        if let Some(vu) = vertex_use {
            self.kill_vertex_use(vu);
        }
        self.shells.remove(shell);
    }

    /// Kills a region and everything below it.
    pub fn kill_region(&mut self, region: RegionKey) -> Result<()> {
        let data = self.regions.remove(region).ok_or(Error::NotFound(region.into()))?;
        for shell in data.shells {
            self.kill_shell(shell);
        }
        Ok(())
    }
}
