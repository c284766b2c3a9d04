// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric queries and the planar face primitives.
//!
//! Computes plane equations, face-use normals and in-face "left" vectors,
//! and triangulates planar face uses by ear clipping in the dominant
//! projection plane.

use nalgebra::{Point3, Vector3};

use crate::arena::*;
use crate::config::Tolerance;
use crate::error::{Error, Result};
use crate::keys::*;

/// Plane `normal · p = d` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Plane {
    pub normal: Vector3<f64>,
    pub d: f64,
}

impl Plane {
    /// Plane through `point` with the given (not necessarily unit) normal.
    pub fn from_point_normal(point: &Point3<f64>, normal: &Vector3<f64>) -> Option<Self> {
        let len = normal.norm();
        if len < 1e-15 {
            return None;
        }
        let normal = normal / len;
        Some(Self {
            normal,
            d: normal.dot(&point.coords),
        })
    }

    /// Signed distance from `p` to the plane.
    pub fn distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&p.coords) - self.d
    }

    /// The same plane facing the other way.
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            d: -self.d,
        }
    }
}

/// Newell's polygon normal: unnormalised, with length twice the area.
pub fn newell_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::zeros();
    let n = points.len();
    for i in 0..n {
        let curr = &points[i];
        let next = &points[(i + 1) % n];
        normal.x += (curr.y - next.y) * (curr.z + next.z);
        normal.y += (curr.z - next.z) * (curr.x + next.x);
        normal.z += (curr.x - next.x) * (curr.y + next.y);
    }
    normal
}

/// Axes of the coordinate plane best aligned with `normal`.
fn dominant_axes(normal: &Vector3<f64>) -> (usize, usize) {
    let abs_n = normal.abs();
    if abs_n.z >= abs_n.x && abs_n.z >= abs_n.y {
        (0, 1) // project onto XY
    } else if abs_n.y >= abs_n.x {
        (0, 2) // project onto XZ
    } else {
        (1, 2) // project onto YZ
    }
}

fn orient2d(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// `p`, already collinear with `a`-`b`, lies within the segment's bounds.
fn within_segment(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> bool {
    p[0] >= a[0].min(b[0]) && p[0] <= a[0].max(b[0]) && p[1] >= a[1].min(b[1]) && p[1] <= a[1].max(b[1])
}

/// Segments `a`-`b` and `c`-`d` cross, touch or overlap.
fn segments_cross(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> bool {
    let o1 = orient2d(a, b, c);
    let o2 = orient2d(a, b, d);
    let o3 = orient2d(c, d, a);
    let o4 = orient2d(c, d, b);
    if o1 * o2 < 0.0 && o3 * o4 < 0.0 {
        return true;
    }
    (o1 == 0.0 && within_segment(a, b, c))
        || (o2 == 0.0 && within_segment(a, b, d))
        || (o3 == 0.0 && within_segment(c, d, a))
        || (o4 == 0.0 && within_segment(c, d, b))
}

/// Returns `true` if any two non-adjacent boundary segments cross or touch.
///
/// `rings` holds each boundary as a closed list of projected points.
fn rings_self_intersect(rings: &[Vec<[f64; 2]>]) -> bool {
    let mut segs = Vec::new();
    for (r, ring) in rings.iter().enumerate() {
        let n = ring.len();
        for i in 0..n {
            segs.push((r, i, n, ring[i], ring[(i + 1) % n]));
        }
    }
    for (i, &(ra, ia, na, a0, a1)) in segs.iter().enumerate() {
        for &(rb, ib, _, b0, b1) in &segs[i + 1..] {
            if ra == rb && (ib == (ia + 1) % na || ia == (ib + 1) % na) {
                continue;
            }
            if segments_cross(a0, a1, b0, b1) {
                return true;
            }
        }
    }
    false
}

impl Model {
    /// Start vertices of a loop's edge uses, in loop order.
    pub fn loop_vertices(&self, lu: LoopUseKey) -> Vec<VertexKey> {
        match &self.lu(lu).contents {
            LoopContents::Edges(eus) => eus.iter().map(|&eu| self.edge_use_start_vertex(eu)).collect(),
            LoopContents::Vertex(vu) => vec![self.vu(*vu).vertex],
        }
    }

    /// Points of a loop in order, or `None` if a vertex lacks geometry.
    pub fn loop_points(&self, lu: LoopUseKey) -> Option<Vec<Point3<f64>>> {
        self.loop_vertices(lu)
            .into_iter()
            .map(|v| self.vertex_point(v))
            .collect()
    }

    /// The `Same` side of a face use pair.
    fn same_side(&self, fu: FaceUseKey) -> FaceUseKey {
        let data = self.fu(fu);
        if data.orientation == Orientation::Opposite {
            data.mate
        } else {
            fu
        }
    }

    /// Fits a plane to the outer loop of the face of `fu`.
    ///
    /// The normal follows the winding of the `Same` side. Fails on a zero
    /// area loop, a vertex without geometry, or a vertex farther than
    /// `tol.dist` from the fitted plane.
    pub fn calc_face_plane(&self, fu: FaceUseKey, tol: &Tolerance) -> Result<Plane> {
        if !self.face_uses.contains_key(fu) {
            return Err(Error::NotFound(fu.into()));
        }
        let fu = self.same_side(fu);
        let data = self.fu(fu);
        let outer = data
            .loops
            .iter()
            .copied()
            .find(|&lu| self.lu(lu).orientation == Orientation::Same)
            .or_else(|| data.loops.first().copied())
            .ok_or_else(|| Error::PlaneFit("face has no loops".into()))?;

        let points = self
            .loop_points(outer)
            .ok_or_else(|| Error::PlaneFit("vertex without geometry".into()))?;
        if points.len() < 3 {
            return Err(Error::PlaneFit(format!("loop has {} vertices", points.len())));
        }

        // |newell| is twice the area; over the perimeter that is the loop's
        // mean width, a length comparable with `tol.dist`.
        let normal = newell_normal(&points);
        let perimeter: f64 = points
            .iter()
            .zip(points.iter().cycle().skip(1))
            .map(|(p, q)| (q - p).norm())
            .sum();
        if normal.norm() < tol.dist * perimeter {
            return Err(Error::PlaneFit("zero area".into()));
        }
        let centroid = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / points.len() as f64;
        let plane = Plane::from_point_normal(&Point3::from(centroid), &normal)
            .ok_or_else(|| Error::PlaneFit("zero area".into()))?;

        for p in &points {
            let dist = plane.distance(p);
            if dist.abs() > tol.dist {
                return Err(Error::PlaneFit(format!("vertex {dist:.3e} off plane")));
            }
        }
        Ok(plane)
    }

    /// Fits and binds a plane to the face of `fu`.
    pub fn fit_face_plane(&mut self, fu: FaceUseKey, tol: &Tolerance) -> Result<Plane> {
        let plane = self.calc_face_plane(fu, tol)?;
        let face = self.fu(fu).face;
        self.set_face_plane(face, plane)?;
        Ok(plane)
    }

    /// Outward normal of a face use: the plane normal, negated on the
    /// `Opposite` side. `None` for non-planar faces.
    pub fn face_use_normal(&self, fu: FaceUseKey) -> Option<Vector3<f64>> {
        let data = self.face_uses.get(fu)?;
        let FaceGeometry::Plane(plane) = &self.faces.get(data.face)?.geometry else {
            return None;
        };
        match data.orientation {
            Orientation::Opposite => Some(-plane.normal),
            _ => Some(plane.normal),
        }
    }

    /// Unit vector in the face plane, perpendicular to `eu`, pointing into
    /// the face the use bounds.
    pub fn edge_use_left_vector(&self, eu: EdgeUseKey) -> Option<Vector3<f64>> {
        let EdgeUseContext::InFaceLoop { face_use, .. } = self.edge_use_context(eu) else {
            return None;
        };
        let normal = self.face_use_normal(face_use)?;
        let start = self.edge_use_point(eu)?;
        let end = self.edge_use_point(self.mate(eu))?;
        let dir = (end - start).try_normalize(1e-15)?;
        normal.cross(&dir).try_normalize(1e-15)
    }

    /// Replaces the loops of a planar face with triangles.
    ///
    /// Ear clipping runs on the face projected to its dominant coordinate
    /// plane, holes included. Every triangle keeps the winding of the face
    /// normal, and edges shared between triangles (or with other faces) are
    /// joined into radial rings. Self-intersecting boundaries are rejected
    /// before any change is made. Returns the number of triangles.
    pub fn triangulate_face_use(&mut self, fu: FaceUseKey, tol: &Tolerance) -> Result<usize> {
        if !self.face_uses.contains_key(fu) {
            return Err(Error::NotFound(fu.into()));
        }
        let fu = self.same_side(fu);
        let fu_mate = self.fu(fu).mate;
        let normal = match self.face_use_normal(fu) {
            Some(n) => n,
            None => self.calc_face_plane(fu, tol)?.normal,
        };
        let (ax_u, ax_v) = dominant_axes(&normal);

        // Outer loop first, holes after, as earcutr expects.
        let mut loops = self.fu(fu).loops.clone();
        loops.sort_by_key(|&lu| self.lu(lu).orientation != Orientation::Same);

        let mut all_verts: Vec<VertexKey> = Vec::new();
        let mut all_points: Vec<Point3<f64>> = Vec::new();
        let mut coords_2d: Vec<f64> = Vec::new();
        let mut hole_indices: Vec<usize> = Vec::new();
        let mut rings: Vec<Vec<[f64; 2]>> = Vec::new();

        for (i, &lu) in loops.iter().enumerate() {
            if matches!(self.lu(lu).contents, LoopContents::Vertex(_)) {
                tracing::debug!(loop_use = self.lu(lu).index, "vertex loop ignored by triangulation");
                continue;
            }
            if i > 0 {
                hole_indices.push(all_verts.len());
            }
            let mut ring = Vec::new();
            for v in self.loop_vertices(lu) {
                let p = self
                    .vertex_point(v)
                    .ok_or_else(|| Error::Triangulation("vertex without geometry".into()))?;
                let c = [p.x, p.y, p.z];
                coords_2d.push(c[ax_u]);
                coords_2d.push(c[ax_v]);
                ring.push([c[ax_u], c[ax_v]]);
                all_verts.push(v);
                all_points.push(p);
            }
            rings.push(ring);
        }

        if all_verts.len() < 3 {
            return Err(Error::Triangulation(format!("{} vertices", all_verts.len())));
        }
        if rings_self_intersect(&rings) {
            return Err(Error::Triangulation("boundary intersects itself".into()));
        }

        let indices = if all_verts.len() == 3 && hole_indices.is_empty() {
            vec![0, 1, 2]
        } else {
            earcutr::earcut(&coords_2d, &hole_indices, 2)
                .map_err(|e| Error::Triangulation(format!("{e:?}")))?
        };
        if indices.len() < 3 {
            return Err(Error::Triangulation("ear clipping produced no triangles".into()));
        }

        let mut triangles = Vec::with_capacity(indices.len() / 3);
        for chunk in indices.chunks_exact(3) {
            let (a, mut b, mut c) = (chunk[0], chunk[1], chunk[2]);
            let tri_normal = (all_points[b] - all_points[a]).cross(&(all_points[c] - all_points[a]));
            if tri_normal.dot(&normal) < 0.0 {
                std::mem::swap(&mut b, &mut c);
            }
            triangles.push([all_verts[a], all_verts[b], all_verts[c]]);
        }

        for lu in loops {
            if self.loop_uses.contains_key(lu) {
                self.kill_loop_use(lu)?;
            }
        }

        let mut new_edges = Vec::with_capacity(triangles.len() * 3);
        for tri in &triangles {
            let (lu, lu_mate) = self.new_edge_loop(
                tri,
                LoopUseParent::FaceUse(fu),
                LoopUseParent::FaceUse(fu_mate),
                Orientation::Same,
            );
            self.face_uses[fu].loops.push(lu);
            self.face_uses[fu_mate].loops.push(lu_mate);
            new_edges.extend(self.loop_edge_uses(lu).iter().map(|&eu| self.eu(eu).edge));
        }
        self.fuse_edges(&new_edges);

        tracing::debug!(face_use = self.fu(fu).index, triangles = triangles.len(), "face triangulated");
        Ok(triangles.len())
    }
}
