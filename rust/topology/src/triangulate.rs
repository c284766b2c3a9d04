// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangulation of a flat polygon given as a bare point array.

use nalgebra::Point3;

use crate::arena::{Model, Orientation};
use crate::config::Tolerance;
use crate::error::{Error, Result};

/// Triangulates the planar polygon `points` (`[x, y, z, ...]`, in boundary
/// order) and returns vertex indices, three per triangle.
///
/// The polygon is built as a one-face model, fitted with a plane and split
/// by [`Model::triangulate_face_use`]. Triangle corners are mapped back to
/// the first input point within `tol.dist`. Returns `None` when the points
/// are not planar, the boundary crosses itself, or a corner cannot be
/// matched; the reason is logged at debug level.
pub fn triangulate_points(points: &[f64], tol: &Tolerance) -> Option<Vec<usize>> {
    match try_triangulate(points, tol) {
        Ok(indices) => Some(indices),
        Err(err) => {
            tracing::debug!(%err, points = points.len() / 3, "point triangulation failed");
            None
        }
    }
}

fn try_triangulate(points: &[f64], tol: &Tolerance) -> Result<Vec<usize>> {
    if points.len() % 3 != 0 {
        return Err(Error::Triangulation(format!(
            "{} coordinates do not form whole points",
            points.len()
        )));
    }
    let pts: Vec<Point3<f64>> = points
        .chunks_exact(3)
        .map(|c| Point3::new(c[0], c[1], c[2]))
        .collect();

    let mut model = Model::new();
    let (_, shell) = model.add_region();
    let verts: Vec<_> = pts.iter().map(|p| model.add_vertex(*p)).collect();
    let fu = model.make_face(shell, &verts)?;
    model.fit_face_plane(fu, tol)?;
    model.set_face_use_orientation(fu, Orientation::Same)?;
    model.triangulate_face_use(fu, tol)?;

    let loops = model.face_use(fu).map(|d| d.loops.clone()).unwrap_or_default();
    let mut out = Vec::with_capacity(loops.len() * 3);
    for lu in loops {
        for &eu in model.loop_edge_uses(lu) {
            let p = model
                .edge_use_point(eu)
                .ok_or_else(|| Error::Triangulation("triangle corner without geometry".into()))?;
            let index = pts
                .iter()
                .position(|q| (q - p).norm_squared() <= tol.dist_sq)
                .ok_or_else(|| Error::Triangulation(format!("corner {p} matches no input point")))?;
            out.push(index);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area2(points: &[f64], tri: &[usize]) -> f64 {
        let p = |i: usize| Point3::new(points[3 * i], points[3 * i + 1], points[3 * i + 2]);
        let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
        (b - a).cross(&(c - a)).z
    }

    #[test]
    fn single_triangle_keeps_order() {
        let pts = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        assert_eq!(triangulate_points(&pts, &Tolerance::default()), Some(vec![0, 1, 2]));
    }

    #[test]
    fn square_gives_two_ccw_triangles() {
        let pts = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];
        let tris = triangulate_points(&pts, &Tolerance::default()).unwrap();
        assert_eq!(tris.len(), 6);
        for tri in tris.chunks(3) {
            assert!(area2(&pts, tri) > 0.0);
        }
        let total: f64 = tris.chunks(3).map(|t| area2(&pts, t)).sum();
        assert!((total - 2.0).abs() < 1e-9);
    }

    #[test]
    fn clockwise_input_stays_clockwise() {
        let pts = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let tris = triangulate_points(&pts, &Tolerance::default()).unwrap();
        assert_eq!(tris.len(), 6);
        for tri in tris.chunks(3) {
            assert!(area2(&pts, tri) < 0.0);
        }
    }

    #[test]
    fn rejects_bad_input() {
        let tol = Tolerance::default();
        // Not planar.
        let warped = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0, 0.0];
        assert_eq!(triangulate_points(&warped, &tol), None);
        // Collinear.
        let line = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 2.0, 0.0, 0.0];
        assert_eq!(triangulate_points(&line, &tol), None);
        // Bow tie.
        let bowtie = [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        assert_eq!(triangulate_points(&bowtie, &tol), None);
        // Too few points, ragged coordinates.
        assert_eq!(triangulate_points(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0], &tol), None);
        assert_eq!(triangulate_points(&[0.0, 0.0], &tol), None);
    }
}
