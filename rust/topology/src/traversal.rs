// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Flattening of topology into draw-command streams.
//!
//! Walks the containment hierarchy (model → region → shell → face use →
//! loop use → edge use → vertex use) and appends [`Command`]s to a
//! [`Vlist`]. Curved edges contribute evaluated interior samples and
//! parametric faces contribute a refined control-net lattice.
//!
//! Output order is fixed: faces, then wire loops, then wire edges, then the
//! lone vertex of each shell.

use nalgebra::{Point3, Vector3};

use crate::arena::*;
use crate::keys::*;
use crate::nurbs::{KnotVector, PointSpace};
use crate::vlist::{Command, Vlist, VlistStyle};

/// Normal handed to loops of faces that carry no usable plane.
const SANITY_NORMAL: Vector3<f64> = Vector3::new(1.0, 0.0, 0.0);

impl Model {
    /// Draws a vertex use as a point, if its vertex has geometry.
    pub fn flatten_vertex_use(&self, vl: &mut Vlist, vu: VertexUseKey) {
        if let Some(p) = self.vertex_use_point(vu) {
            vl.point(p);
        }
    }

    /// Draws each edge use from its start to its mate's start.
    ///
    /// Uses with an endpoint lacking geometry are skipped.
    pub fn flatten_wire_edge_uses(&self, vl: &mut Vlist, eus: &[EdgeUseKey]) {
        for &eu in eus {
            let (Some(start), Some(end)) = (self.edge_use_point(eu), self.edge_use_point(self.mate(eu))) else {
                tracing::warn!(edge_use = self.eu(eu).index, "wire edge without vertex geometry skipped");
                continue;
            };
            vl.move_to(start);
            vl.draw_to(end);
        }
    }

    /// Draws one loop use.
    ///
    /// A vertex loop draws as a point. An edge loop starts with a move (or a
    /// polygon start carrying `normal`), draws through each vertex, injects
    /// interior samples of curved edges, and closes back at the first
    /// vertex. Vertices without geometry are skipped.
    pub fn flatten_loop_use(&self, vl: &mut Vlist, lu: LoopUseKey, style: &VlistStyle, normal: &Vector3<f64>) {
        let eus = match &self.lu(lu).contents {
            LoopContents::Vertex(vu) => {
                self.flatten_vertex_use(vl, *vu);
                return;
            }
            LoopContents::Edges(eus) => eus,
        };

        let vertex_normal = |vu: VertexUseKey| match self.vu(vu).attribute {
            Some(VertexUseAttribute::Normal(n)) if style.polygon && style.use_vertex_normals => Some(n),
            _ => None,
        };

        let mut first: Option<(Point3<f64>, VertexUseKey)> = None;
        let mut centroid = Vector3::zeros();
        let mut npoints = 0usize;

        for &eu in eus {
            let vu = self.eu(eu).vertex_use;
            let Some(p) = self.vertex_use_point(vu) else {
                continue;
            };
            centroid += p.coords;
            npoints += 1;

            if first.is_none() {
                if style.polygon {
                    vl.push(Command::PolyStart(*normal));
                    if let Some(n) = vertex_normal(vu) {
                        vl.push(Command::PolyVertexNormal(n));
                    }
                    vl.push(Command::PolyMove(p));
                } else {
                    vl.move_to(p);
                }
                first = Some((p, vu));
            } else if style.polygon {
                if let Some(n) = vertex_normal(vu) {
                    vl.push(Command::PolyVertexNormal(n));
                }
                vl.push(Command::PolyDraw(p));
            } else {
                vl.draw_to(p);
            }

            for sample in self.edge_use_curve_samples(eu, style.curve_samples) {
                vl.push(if style.polygon {
                    Command::PolyDraw(sample)
                } else {
                    Command::LineDraw(sample)
                });
            }
        }

        let Some((first_p, first_vu)) = first else {
            return;
        };
        if style.polygon {
            if let Some(n) = vertex_normal(first_vu) {
                vl.push(Command::PolyVertexNormal(n));
            }
            vl.push(Command::PolyEnd(first_p));
        } else {
            vl.draw_to(first_p);
        }

        if style.visualize_normals && npoints > 2 {
            let centroid = Point3::from(centroid / npoints as f64);
            let f = (first_p - centroid).norm() * 0.5;

            if let Some(fu) = self.loop_use_face_use(lu) {
                // Parametric faces show their normal with the surface lattice.
                if !matches!(self.f(self.fu(fu).face).geometry, FaceGeometry::Nurb(_)) {
                    vl.move_to(centroid);
                    vl.draw_to(centroid + normal * f);
                }
            }

            for &eu in eus {
                let vu = self.eu(eu).vertex_use;
                let Some(VertexUseAttribute::Normal(n)) = self.vu(vu).attribute else {
                    continue;
                };
                let Some(p) = self.vertex_use_point(vu) else {
                    continue;
                };
                vl.move_to(p);
                vl.draw_to(p + n * f);
            }
        }
    }

    /// Interior points of a curved edge use, in the use's direction.
    ///
    /// Endpoints are never included. Straight edges yield nothing, except
    /// on a parametric face where the segment between the vertex-use
    /// parameters is mapped through the surface.
    pub fn edge_use_curve_samples(&self, eu: EdgeUseKey, n: usize) -> Vec<Point3<f64>> {
        if n == 0 {
            return Vec::new();
        }
        let data = self.eu(eu);
        let edge = self.e(data.edge);
        let surface = match self.edge_use_context(eu) {
            EdgeUseContext::InFaceLoop { face_use, .. } => match &self.f(self.fu(face_use).face).geometry {
                FaceGeometry::Nurb(s) => Some(s),
                _ => None,
            },
            _ => None,
        };

        let mut samples = match &edge.curve {
            EdgeCurve::Linear => {
                let Some(surface) = surface else {
                    return Vec::new();
                };
                let param = |vu: VertexUseKey| match self.vu(vu).attribute {
                    Some(VertexUseAttribute::Param(uv)) => Some(uv),
                    _ => None,
                };
                let (Some(a), Some(b)) = (param(data.vertex_use), param(self.eu(data.mate).vertex_use)) else {
                    tracing::debug!(edge_use = data.index, "edge on parametric face lacks vertex parameters");
                    return Vec::new();
                };
                // Already in the direction of `eu`.
                return KnotVector::uniform_interior(0.0, 1.0, n)
                    .as_slice()
                    .iter()
                    .map(|&t| {
                        let uv = a + (b - a) * t;
                        surface.evaluate(uv.x, uv.y)
                    })
                    .collect();
            }
            EdgeCurve::Nurb(curve) => {
                let params = curve.interior_params(n);
                match (curve.space, surface) {
                    (PointSpace::Parametric, Some(surface)) => params
                        .iter()
                        .map(|&t| {
                            let uv = curve.evaluate(t);
                            surface.evaluate(uv.x, uv.y)
                        })
                        .collect::<Vec<_>>(),
                    (PointSpace::Parametric, None) => {
                        tracing::warn!(edge_use = data.index, "parametric curve outside a parametric face");
                        return Vec::new();
                    }
                    (PointSpace::Model, _) => params.iter().map(|&t| curve.evaluate(t)).collect(),
                }
            }
        };

        if self.edge_use_start_vertex(eu) != self.edge_use_start_vertex(edge.edge_use) {
            samples.reverse();
        }
        samples
    }

    /// Draws the lattice of a parametric face after inserting `n` interior
    /// knots per direction.
    ///
    /// Does nothing for faces without a parametric surface.
    pub fn flatten_surface(&self, vl: &mut Vlist, fu: FaceUseKey, n: usize, style: &VlistStyle) {
        let FaceGeometry::Nurb(surface) = &self.f(self.fu(fu).face).geometry else {
            return;
        };
        let ((u0, u1), (v0, v1)) = surface.domain();

        let tau_u = surface.u_knots.merge(&KnotVector::uniform_interior(u0, u1, n));
        let tau_v = surface.v_knots.merge(&KnotVector::uniform_interior(v0, v1, n));
        let refined = surface.refine_v(&tau_v).refine_u(&tau_u);
        let net = |row: usize, col: usize| {
            crate::nurbs::dehomogenize(refined.ctl_point(row, col), refined.rational)
        };

        for row in 0..refined.rows {
            vl.move_to(net(row, 0));
            for col in 1..refined.cols {
                vl.draw_to(net(row, col));
            }
        }
        for col in 0..refined.cols {
            vl.move_to(net(0, col));
            for row in 1..refined.rows {
                vl.draw_to(net(row, col));
            }
        }

        if style.visualize_normals {
            let (um, vm) = ((u0 + u1) / 2.0, (v0 + v1) / 2.0);
            let mid = surface.evaluate(um, vm);
            let corner = surface.evaluate(u0, v0);
            let f = (corner - mid).norm() * 0.5;
            let Some(mut normal) = surface.normal(um, vm) else {
                tracing::warn!(face_use = self.fu(fu).index, "surface normal undefined at centre");
                return;
            };
            if self.fu(fu).orientation == Orientation::Opposite {
                normal = -normal;
            }
            vl.move_to(mid);
            vl.draw_to(mid + normal * f);
        }
    }

    /// Draws everything in a shell: `Same`-side faces, wire loops, wire
    /// edges and the lone vertex, in that order.
    pub fn flatten_shell(&self, vl: &mut Vlist, shell: ShellKey, style: &VlistStyle) {
        let sd = self.s(shell);

        for &fu in &sd.face_uses {
            let fud = self.fu(fu);
            if fud.orientation != Orientation::Same {
                continue;
            }
            let normal = match &self.f(fud.face).geometry {
                FaceGeometry::Nurb(_) => {
                    if !style.no_surfaces {
                        self.flatten_surface(vl, fu, style.surface_samples, style);
                    }
                    SANITY_NORMAL
                }
                FaceGeometry::Plane(_) => self.face_use_normal(fu).unwrap_or(SANITY_NORMAL),
                FaceGeometry::None => SANITY_NORMAL,
            };
            for &lu in &fud.loops {
                self.flatten_loop_use(vl, lu, style, &normal);
            }
        }

        let wire_style = style.wire();
        for &lu in &sd.wire_loops {
            self.flatten_loop_use(vl, lu, &wire_style, &Vector3::zeros());
        }

        self.flatten_wire_edge_uses(vl, &sd.wire_edges);

        if let Some(vu) = sd.vertex_use {
            self.flatten_vertex_use(vl, vu);
        }
    }

    pub fn flatten_region(&self, vl: &mut Vlist, region: RegionKey, style: &VlistStyle) {
        for &shell in &self.r(region).shells {
            self.flatten_shell(vl, shell, style);
        }
    }

    /// Flattens every region of the model into a new command stream.
    pub fn flatten_model(&self, style: &VlistStyle) -> Vlist {
        let mut vl = Vlist::new();
        for region in self.region_keys() {
            self.flatten_region(&mut vl, region, style);
        }
        vl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tolerance;
    use crate::nurbs::{NurbCurve, NurbSurface};
    use approx::assert_relative_eq;
    use nalgebra::{Point2, Vector4};

    fn square() -> (Model, ShellKey, FaceUseKey) {
        let mut model = Model::new();
        let (_, shell) = model.add_region();
        let verts: Vec<_> = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]]
            .iter()
            .map(|p| model.add_vertex(Point3::new(p[0], p[1], 0.0)))
            .collect();
        let fu = model.make_face(shell, &verts).unwrap();
        model.fit_face_plane(fu, &Tolerance::default()).unwrap();
        (model, shell, fu)
    }

    #[test]
    fn vertex_loop_is_single_point() {
        let mut model = Model::new();
        let (_, shell) = model.add_region();
        let v = model.add_vertex(Point3::new(1.0, 2.0, 3.0));
        let lu = model.make_vertex_loop(shell, v).unwrap();

        let mut vl = Vlist::new();
        model.flatten_loop_use(&mut vl, lu, &VlistStyle::polygons(), &Vector3::z());
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(vl.commands(), &[Command::LineMove(p), Command::LineDraw(p)]);
    }

    #[test]
    fn vertex_without_geometry_draws_nothing() {
        let mut model = Model::new();
        let (_, shell) = model.add_region();
        let v = model.add_vertex_without_geometry();
        let vu = model.set_shell_vertex(shell, v).unwrap();
        let mut vl = Vlist::new();
        model.flatten_vertex_use(&mut vl, vu);
        assert!(vl.is_empty());
    }

    #[test]
    fn polygon_loop_command_sequence() {
        let (model, _, fu) = square();
        let lu = model.face_use(fu).unwrap().loops[0];
        let n = model.face_use_normal(fu).unwrap();

        let mut vl = Vlist::new();
        model.flatten_loop_use(&mut vl, lu, &VlistStyle::polygons(), &n);
        let cmds = vl.commands();
        assert_eq!(cmds.len(), 6);
        assert_eq!(cmds[0], Command::PolyStart(n));
        assert_eq!(cmds[1], Command::PolyMove(Point3::new(0.0, 0.0, 0.0)));
        assert!(matches!(cmds[2], Command::PolyDraw(_)));
        assert_eq!(cmds[5], Command::PolyEnd(Point3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn vector_loop_closes_on_first_vertex() {
        let (model, _, fu) = square();
        let lu = model.face_use(fu).unwrap().loops[0];
        let mut vl = Vlist::new();
        model.flatten_loop_use(&mut vl, lu, &VlistStyle::vectors(), &Vector3::z());
        let cmds = vl.commands();
        assert_eq!(cmds.len(), 5);
        assert_eq!(cmds[0], Command::LineMove(Point3::origin()));
        assert_eq!(cmds[4], Command::LineDraw(Point3::origin()));
    }

    #[test]
    fn vertex_normals_precede_polygon_vertices() {
        let (mut model, _, fu) = square();
        let lu = model.face_use(fu).unwrap().loops[0];
        let eus = model.loop_edge_uses(lu).to_vec();
        let vu0 = model.edge_use(eus[0]).unwrap().vertex_use;
        let vu2 = model.edge_use(eus[2]).unwrap().vertex_use;
        let nz = Vector3::z();
        model.set_vertex_use_attribute(vu0, Some(VertexUseAttribute::Normal(nz))).unwrap();
        model
            .set_vertex_use_attribute(vu2, Some(VertexUseAttribute::Param(Point2::new(0.5, 0.5))))
            .unwrap();

        let mut vl = Vlist::new();
        model.flatten_loop_use(&mut vl, lu, &VlistStyle::polygons(), &nz);
        let cmds = vl.commands();
        // start, vnorm, move, draw, draw, draw, vnorm, end
        assert_eq!(cmds.len(), 8);
        assert_eq!(cmds[1], Command::PolyVertexNormal(nz));
        assert_eq!(cmds[6], Command::PolyVertexNormal(nz));
        assert!(matches!(cmds[7], Command::PolyEnd(_)));
    }

    #[test]
    fn visualized_normal_has_half_radius_length() {
        let (model, _, fu) = square();
        let lu = model.face_use(fu).unwrap().loops[0];
        let style = VlistStyle {
            visualize_normals: true,
            ..VlistStyle::vectors()
        };
        let mut vl = Vlist::new();
        model.flatten_loop_use(&mut vl, lu, &style, &Vector3::z());
        let cmds = vl.commands();
        assert_eq!(cmds.len(), 7);
        assert_eq!(cmds[5], Command::LineMove(Point3::new(1.0, 1.0, 0.0)));
        let Command::LineDraw(tip) = cmds[6] else { panic!("expected draw") };
        assert_relative_eq!(tip, Point3::new(1.0, 1.0, 2.0_f64.sqrt() * 0.5), epsilon = 1e-12);
    }

    #[test]
    fn curved_edge_injects_interior_samples() {
        let (mut model, _, fu) = square();
        let lu = model.face_use(fu).unwrap().loops[0];
        let eu = model.loop_edge_uses(lu)[0];
        let edge = model.edge_use(eu).unwrap().edge;
        // Quadratic bulging below the bottom edge, (0,0) to (2,0).
        let curve = NurbCurve::new(
            3,
            KnotVector::new(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap(),
            vec![
                Vector4::new(0.0, 0.0, 0.0, 1.0),
                Vector4::new(1.0, -1.0, 0.0, 1.0),
                Vector4::new(2.0, 0.0, 0.0, 1.0),
            ],
            false,
            PointSpace::Model,
        )
        .unwrap();
        model.set_edge_curve(edge, EdgeCurve::Nurb(curve)).unwrap();

        let mut vl = Vlist::new();
        model.flatten_loop_use(&mut vl, lu, &VlistStyle::vectors(), &Vector3::z());
        assert_eq!(vl.len(), 5 + 10);
        let cmds = vl.commands();
        let Command::LineDraw(s0) = cmds[1] else { panic!("expected draw") };
        assert!(s0.x > 0.0 && s0.x < 0.3 && s0.y < 0.0);

        // The mate runs the edge backwards, so its samples are reversed.
        let fwd = model.edge_use_curve_samples(eu, 4);
        let back = model.edge_use_curve_samples(model.mate(eu), 4);
        assert_relative_eq!(fwd[0], back[3], epsilon = 1e-12);
    }

    #[test]
    fn surface_lattice_counts() {
        let mut model = Model::new();
        let (_, shell) = model.add_region();
        let verts: Vec<_> = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
            .iter()
            .map(|p| model.add_vertex(Point3::new(p[0], p[1], 0.0)))
            .collect();
        let fu = model.make_face(shell, &verts).unwrap();
        let face = model.face_use(fu).unwrap().face;
        let surface = NurbSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        );
        model.set_face_surface(face, surface).unwrap();

        let mut vl = Vlist::new();
        model.flatten_surface(&mut vl, fu, 3, &VlistStyle::vectors());
        // A 5x5 net: five rows and five columns of five points each.
        assert_eq!(vl.len(), 50);
        assert_eq!(vl.iter().filter(|c| c.is_move()).count(), 10);

        let full = model.flatten_model(&VlistStyle {
            surface_samples: 3,
            ..VlistStyle::vectors()
        });
        // Lattice plus the boundary loop.
        assert_eq!(full.len(), 50 + 5);
        let no_surf = model.flatten_model(&VlistStyle {
            no_surfaces: true,
            ..VlistStyle::vectors()
        });
        assert_eq!(no_surf.len(), 5);
    }

    #[test]
    fn linear_edge_on_surface_uses_vertex_params() {
        let mut model = Model::new();
        let (_, shell) = model.add_region();
        let verts: Vec<_> = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]
            .iter()
            .map(|p| model.add_vertex(Point3::new(p[0], p[1], 0.0)))
            .collect();
        let fu = model.make_face(shell, &verts).unwrap();
        let face = model.face_use(fu).unwrap().face;
        model
            .set_face_surface(
                face,
                NurbSurface::bilinear(
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                    Point3::new(1.0, 1.0, 0.0),
                ),
            )
            .unwrap();
        let lu = model.face_use(fu).unwrap().loops[0];
        let eu = model.loop_edge_uses(lu)[0];
        assert!(model.edge_use_curve_samples(eu, 3).is_empty());

        let vu_a = model.edge_use(eu).unwrap().vertex_use;
        let vu_b = model.edge_use(model.mate(eu)).unwrap().vertex_use;
        model
            .set_vertex_use_attribute(vu_a, Some(VertexUseAttribute::Param(Point2::new(0.0, 0.0))))
            .unwrap();
        model
            .set_vertex_use_attribute(vu_b, Some(VertexUseAttribute::Param(Point2::new(1.0, 0.0))))
            .unwrap();
        let samples = model.edge_use_curve_samples(eu, 3);
        assert_eq!(samples.len(), 3);
        assert_relative_eq!(samples[0], Point3::new(0.25, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(samples[2], Point3::new(0.75, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn reloaded_surface_face_draws_straight_edges() {
        let mut model = Model::new();
        let (_, shell) = model.add_region();
        let verts: Vec<_> = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]
            .iter()
            .map(|p| model.add_vertex(Point3::new(p[0], p[1], 0.0)))
            .collect();
        let fu = model.make_face(shell, &verts).unwrap();
        let face = model.face_use(fu).unwrap().face;
        model
            .set_face_surface(
                face,
                NurbSurface::bilinear(
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                    Point3::new(1.0, 1.0, 0.0),
                ),
            )
            .unwrap();

        // Vertex parameters do not survive a snapshot.
        let reloaded = Model::from_json(&model.to_json().unwrap()).unwrap();
        let style = VlistStyle {
            no_surfaces: true,
            ..VlistStyle::vectors()
        };
        let vl = reloaded.flatten_model(&style);
        assert_eq!(vl.len(), 4);
        assert!(vl.commands()[1..].iter().all(|c| matches!(c, Command::LineDraw(_))));
    }

    #[test]
    fn shell_order_faces_wires_edges_vertex() {
        let (mut model, shell, _) = square();
        let a = model.add_vertex(Point3::new(5.0, 0.0, 0.0));
        let b = model.add_vertex(Point3::new(6.0, 0.0, 0.0));
        let c = model.add_vertex(Point3::new(9.0, 9.0, 9.0));
        model.make_wire_edge(shell, a, b).unwrap();
        model.set_shell_vertex(shell, c).unwrap();

        let mut vl = Vlist::new();
        model.flatten_shell(&mut vl, shell, &VlistStyle::polygons());
        let cmds = vl.commands();
        // Polygon (6), wire edge and its mate (4), lone vertex (2).
        assert_eq!(cmds.len(), 12);
        assert!(matches!(cmds[0], Command::PolyStart(_)));
        assert_eq!(cmds[6], Command::LineMove(Point3::new(5.0, 0.0, 0.0)));
        assert_eq!(cmds[10], Command::LineMove(Point3::new(9.0, 9.0, 9.0)));
    }
}
