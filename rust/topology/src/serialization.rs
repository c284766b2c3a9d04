// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON snapshots of a model.
//!
//! The snapshot stores the region/shell/face hierarchy with loops as vertex
//! id lists; uses, mates and radial rings are rebuilt on load, and face edges
//! spanning the same two vertices are joined again. Face geometry and edge
//! curves travel along. Vertex-use attributes are not persisted.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::arena::*;
use crate::error::{Error, Result};
use crate::geometry::Plane;
use crate::keys::*;
use crate::nurbs::{KnotVector, NurbCurve, NurbSurface};

/// Serializable representation of a whole model.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub vertices: Vec<VertexSnapshot>,
    pub regions: Vec<RegionSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edge_curves: Vec<EdgeCurveSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VertexSnapshot {
    pub id: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<[f64; 3]>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub shells: Vec<ShellSnapshot>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ShellSnapshot {
    #[serde(default)]
    pub faces: Vec<FaceSnapshot>,
    /// Wire loops; a single id is a vertex loop.
    #[serde(default)]
    pub wire_loops: Vec<Vec<usize>>,
    #[serde(default)]
    pub wire_edges: Vec<[usize; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertex: Option<usize>,
}

/// A face seen from its `Same` side. The first loop must be an outer loop.
#[derive(Debug, Serialize, Deserialize)]
pub struct FaceSnapshot {
    pub loops: Vec<LoopSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plane: Option<Plane>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<NurbSurface>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoopSnapshot {
    pub vertices: Vec<usize>,
    #[serde(default)]
    pub hole: bool,
}

/// A curved edge, parameterized from `start` to `end`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EdgeCurveSnapshot {
    pub start: usize,
    pub end: usize,
    pub curve: NurbCurve,
}

fn serialization_error(msg: impl Into<String>) -> Error {
    Error::Serialization(msg.into())
}

impl Model {
    /// Serializes the model to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        let snapshot = self.to_snapshot();
        serde_json::to_string_pretty(&snapshot).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserializes a model from JSON produced by [`Model::to_json`] or
    /// written by hand in the same layout.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: ModelSnapshot =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::from_snapshot(&snapshot)
    }

    /// Creates a serializable snapshot. Vertex keys become sequential ids.
    pub fn to_snapshot(&self) -> ModelSnapshot {
        let mut vertex_ids = FxHashMap::default();
        let vertices: Vec<VertexSnapshot> = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, (k, v))| {
                vertex_ids.insert(k, i);
                VertexSnapshot {
                    id: i,
                    point: v.point.map(|p| [p.x, p.y, p.z]),
                }
            })
            .collect();
        let vid = |v: VertexKey| vertex_ids[&v];

        let mut regions = Vec::with_capacity(self.regions.len());
        for (_, region) in &self.regions {
            let mut shells = Vec::with_capacity(region.shells.len());
            for &shell in &region.shells {
                let sd = self.s(shell);
                let mut snap = ShellSnapshot::default();

                for &fu in &sd.face_uses {
                    let fd = self.fu(fu);
                    if fd.orientation == Orientation::Opposite {
                        continue;
                    }
                    let loops = fd
                        .loops
                        .iter()
                        .filter(|&&lu| matches!(self.lu(lu).contents, LoopContents::Edges(_)))
                        .map(|&lu| LoopSnapshot {
                            vertices: self.loop_vertices(lu).into_iter().map(vid).collect(),
                            hole: self.lu(lu).orientation == Orientation::Opposite,
                        })
                        .collect();
                    let (plane, surface) = match &self.f(fd.face).geometry {
                        FaceGeometry::None => (None, None),
                        FaceGeometry::Plane(p) => (Some(*p), None),
                        FaceGeometry::Nurb(s) => (None, Some(s.clone())),
                    };
                    snap.faces.push(FaceSnapshot { loops, plane, surface });
                }

                for &lu in &sd.wire_loops {
                    let ld = self.lu(lu);
                    if self.loops.get(ld.lp).map(|l| l.loop_use) != Some(lu) {
                        continue;
                    }
                    snap.wire_loops.push(self.loop_vertices(lu).into_iter().map(vid).collect());
                }

                for &eu in &sd.wire_edges {
                    if self.e(self.eu(eu).edge).edge_use != eu {
                        continue;
                    }
                    snap.wire_edges
                        .push([vid(self.edge_use_start_vertex(eu)), vid(self.edge_use_end_vertex(eu))]);
                }

                snap.vertex = sd.vertex_use.map(|vu| vid(self.vu(vu).vertex));
                shells.push(snap);
            }
            regions.push(RegionSnapshot { shells });
        }

        let edge_curves = self
            .edges
            .values()
            .filter_map(|e| match &e.curve {
                EdgeCurve::Nurb(curve) => Some(EdgeCurveSnapshot {
                    start: vid(self.edge_use_start_vertex(e.edge_use)),
                    end: vid(self.edge_use_end_vertex(e.edge_use)),
                    curve: curve.clone(),
                }),
                EdgeCurve::Linear => None,
            })
            .collect();

        ModelSnapshot {
            vertices,
            regions,
            edge_curves,
        }
    }

    /// Rebuilds a model from a snapshot.
    ///
    /// Faces are built first and their shared edges joined; wires follow so
    /// they keep edges of their own.
    pub fn from_snapshot(snap: &ModelSnapshot) -> Result<Self> {
        let mut model = Model::new();

        let mut vertex_map: FxHashMap<usize, VertexKey> = FxHashMap::default();
        for vs in &snap.vertices {
            let key = match vs.point {
                Some([x, y, z]) => model.add_vertex(nalgebra::Point3::new(x, y, z)),
                None => model.add_vertex_without_geometry(),
            };
            if vertex_map.insert(vs.id, key).is_some() {
                return Err(serialization_error(format!("duplicate vertex id {}", vs.id)));
            }
        }

        let mut shell_keys: Vec<Vec<ShellKey>> = Vec::with_capacity(snap.regions.len());
        let mut face_edges = Vec::new();
        for rs in &snap.regions {
            let (region, first) = model.add_region();
            let mut keys = vec![first];
            for _ in 1..rs.shells.len() {
                keys.push(model.add_shell(region)?);
            }

            for (ss, &shell) in rs.shells.iter().zip(&keys) {
                for fs in &ss.faces {
                    let fu = model.load_face(shell, fs, &vertex_map)?;
                    for &lu in &model.fu(fu).loops {
                        face_edges.extend(model.loop_edge_uses(lu).iter().map(|&eu| model.eu(eu).edge));
                    }
                }
            }
            shell_keys.push(keys);
        }
        let joins = model.fuse_edges(&face_edges);
        tracing::debug!(joins, "face edges joined on load");

        for (rs, keys) in snap.regions.iter().zip(&shell_keys) {
            for (ss, &shell) in rs.shells.iter().zip(keys) {
                for ids in &ss.wire_loops {
                    let verts = vertex_keys(&vertex_map, ids)?;
                    if let [v] = verts.as_slice() {
                        model.make_vertex_loop(shell, *v)?;
                    } else {
                        model.make_wire_loop(shell, &verts)?;
                    }
                }
                for &[a, b] in &ss.wire_edges {
                    let verts = vertex_keys(&vertex_map, &[a, b])?;
                    model.make_wire_edge(shell, verts[0], verts[1])?;
                }
                if let Some(id) = ss.vertex {
                    let verts = vertex_keys(&vertex_map, &[id])?;
                    model.set_shell_vertex(shell, verts[0])?;
                }
            }
        }

        for cs in &snap.edge_curves {
            let verts = vertex_keys(&vertex_map, &[cs.start, cs.end])?;
            let curve = validated_curve(&cs.curve)?;
            let edge = model.edges.iter().find_map(|(k, e)| {
                let eu = e.edge_use;
                (model.edge_use_start_vertex(eu) == verts[0] && model.edge_use_end_vertex(eu) == verts[1])
                    .then_some(k)
            });
            match edge {
                Some(edge) => model.set_edge_curve(edge, EdgeCurve::Nurb(curve))?,
                None => tracing::warn!(start = cs.start, end = cs.end, "no edge runs along stored curve"),
            }
        }

        Ok(model)
    }

    fn load_face(
        &mut self,
        shell: ShellKey,
        fs: &FaceSnapshot,
        vertex_map: &FxHashMap<usize, VertexKey>,
    ) -> Result<FaceUseKey> {
        let (outer, rest) = fs
            .loops
            .split_first()
            .ok_or_else(|| serialization_error("face without loops"))?;
        if outer.hole {
            return Err(serialization_error("first face loop is a hole"));
        }
        let fu = self.make_face(shell, &vertex_keys(vertex_map, &outer.vertices)?)?;
        let fu_mate = self.fu(fu).mate;

        for ls in rest {
            let verts = vertex_keys(vertex_map, &ls.vertices)?;
            if verts.len() < 3 {
                return Err(Error::DegenerateLoop {
                    needed: 3,
                    got: verts.len(),
                });
            }
            let orientation = if ls.hole {
                Orientation::Opposite
            } else {
                Orientation::Same
            };
            let (lu, lu_mate) = self.new_edge_loop(
                &verts,
                LoopUseParent::FaceUse(fu),
                LoopUseParent::FaceUse(fu_mate),
                orientation,
            );
            self.face_uses[fu].loops.push(lu);
            self.face_uses[fu_mate].loops.push(lu_mate);
        }

        let face = self.fu(fu).face;
        if let Some(plane) = fs.plane {
            self.set_face_plane(face, plane)?;
        } else if let Some(surface) = &fs.surface {
            self.set_face_surface(face, validated_surface(surface)?)?;
        }
        Ok(fu)
    }
}

fn vertex_keys(map: &FxHashMap<usize, VertexKey>, ids: &[usize]) -> Result<Vec<VertexKey>> {
    ids.iter()
        .map(|id| {
            map.get(id)
                .copied()
                .ok_or_else(|| serialization_error(format!("unknown vertex id {id}")))
        })
        .collect()
}

fn validated_knots(k: &KnotVector) -> Result<KnotVector> {
    KnotVector::new(k.as_slice().to_vec())
}

fn validated_curve(c: &NurbCurve) -> Result<NurbCurve> {
    NurbCurve::new(c.order, validated_knots(&c.knots)?, c.ctl_points.clone(), c.rational, c.space)
}

fn validated_surface(s: &NurbSurface) -> Result<NurbSurface> {
    NurbSurface::new(
        s.u_order,
        s.v_order,
        validated_knots(&s.u_knots)?,
        validated_knots(&s.v_knots)?,
        s.rows,
        s.cols,
        s.ctl_points.clone(),
        s.rational,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tolerance;
    use crate::nurbs::PointSpace;
    use nalgebra::{Point3, Vector4};

    fn roundtrip(model: &Model) -> Model {
        let json = model.to_json().unwrap();
        Model::from_json(&json).unwrap()
    }

    #[test]
    fn roundtrip_empty_model() {
        let model = Model::new();
        let restored = roundtrip(&model);
        assert_eq!(restored.region_count(), 0);
        assert_eq!(restored.vertex_count(), 0);
    }

    #[test]
    fn roundtrip_face_with_hole_and_plane() {
        let mut model = Model::new();
        let (_, shell) = model.add_region();
        let outer: Vec<_> = [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]]
            .iter()
            .map(|p| model.add_vertex(Point3::new(p[0], p[1], 0.0)))
            .collect();
        let inner: Vec<_> = [[1.0, 1.0], [1.0, 3.0], [3.0, 3.0], [3.0, 1.0]]
            .iter()
            .map(|p| model.add_vertex(Point3::new(p[0], p[1], 0.0)))
            .collect();
        let fu = model.make_face(shell, &outer).unwrap();
        model.add_hole(fu, &inner).unwrap();
        model.fit_face_plane(fu, &Tolerance::default()).unwrap();

        let restored = roundtrip(&model);
        restored.verify().unwrap();
        assert_eq!(restored.face_count(), 1);
        assert_eq!(restored.loop_use_count(), 4);
        assert_eq!(restored.edge_count(), 8);

        let fu = restored
            .face_uses
            .iter()
            .find(|(_, d)| d.orientation == Orientation::Same)
            .map(|(k, _)| k)
            .unwrap();
        let orientations: Vec<_> = restored.fu(fu).loops.iter().map(|&lu| restored.lu(lu).orientation).collect();
        assert_eq!(orientations, vec![Orientation::Same, Orientation::Opposite]);
        let n = restored.face_use_normal(fu).unwrap();
        assert!((n.z - 1.0).abs() < 1e-12);
    }

    #[test]
    fn shared_edges_are_joined_on_load() {
        let mut model = Model::new();
        let (_, shell) = model.add_region();
        let a = model.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = model.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let c = model.add_vertex(Point3::new(0.0, 1.0, 0.0));
        let d = model.add_vertex(Point3::new(0.0, 0.0, 1.0));
        model.make_face(shell, &[a, b, c]).unwrap();
        model.make_face(shell, &[b, a, d]).unwrap();
        model.fuse_shared_edges();

        let restored = roundtrip(&model);
        restored.verify().unwrap();
        assert_eq!(restored.edge_count(), 5);
        let widest = restored.edge_uses.keys().map(|k| restored.radial_ring(k).len()).max();
        assert_eq!(widest, Some(2));
    }

    #[test]
    fn wires_keep_their_own_edges() {
        let mut model = Model::new();
        let (region, shell) = model.add_region();
        let second = model.add_shell(region).unwrap();
        let v: Vec<_> = (0..4)
            .map(|i| model.add_vertex(Point3::new(i as f64, 0.0, 0.0)))
            .collect();
        let lone = model.add_vertex_without_geometry();
        model.make_face(shell, &v[..3]).unwrap();
        model.make_wire_edge(shell, v[0], v[1]).unwrap();
        model.make_wire_loop(second, &[v[1], v[2], v[3]]).unwrap();
        model.make_vertex_loop(second, v[3]).unwrap();
        model.set_shell_vertex(second, lone).unwrap();

        let restored = roundtrip(&model);
        restored.verify().unwrap();
        assert_eq!(restored.shell_count(), 2);
        assert_eq!(restored.edge_count(), model.edge_count());
        assert_eq!(restored.edge_use_count(), model.edge_use_count());
        assert_eq!(restored.loop_use_count(), model.loop_use_count());

        let snap = restored.to_snapshot();
        let shells = &snap.regions[0].shells;
        assert_eq!(shells[0].wire_edges.len(), 1);
        assert_eq!(shells[1].wire_loops.len(), 2);
        assert_eq!(shells[1].wire_loops[1].len(), 1);
        let lone_id = shells[1].vertex.unwrap();
        assert!(snap.vertices[lone_id].point.is_none());
    }

    #[test]
    fn triangulated_face_roundtrips() {
        let mut model = Model::new();
        let (_, shell) = model.add_region();
        let v: Vec<_> = [[0.0, 0.0], [2.0, 0.0], [3.0, 1.0], [1.0, 2.0], [-1.0, 1.0]]
            .iter()
            .map(|p| model.add_vertex(Point3::new(p[0], p[1], 0.0)))
            .collect();
        let fu = model.make_face(shell, &v).unwrap();
        let tol = Tolerance::default();
        model.fit_face_plane(fu, &tol).unwrap();
        model.triangulate_face_use(fu, &tol).unwrap();

        let restored = roundtrip(&model);
        restored.verify().unwrap();
        assert_eq!(restored.edge_count(), model.edge_count());
        assert_eq!(restored.loop_use_count(), 6);
    }

    #[test]
    fn surface_and_curve_travel_along() {
        let mut model = Model::new();
        let (_, shell) = model.add_region();
        let v: Vec<_> = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
            .iter()
            .map(|p| model.add_vertex(Point3::new(p[0], p[1], 0.0)))
            .collect();
        let fu = model.make_face(shell, &v).unwrap();
        let surface = NurbSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        );
        let face = model.face_use(fu).unwrap().face;
        model.set_face_surface(face, surface.clone()).unwrap();

        let lu = model.face_use(fu).unwrap().loops[0];
        let eu = model.loop_edge_uses(lu)[0];
        let edge = model.edge_use(eu).unwrap().edge;
        let curve = NurbCurve::new(
            2,
            KnotVector::clamped_uniform(2, 2).unwrap(),
            vec![Vector4::new(0.0, 0.0, 0.0, 1.0), Vector4::new(1.0, 0.0, 0.0, 1.0)],
            false,
            PointSpace::Parametric,
        )
        .unwrap();
        model.set_edge_curve(edge, EdgeCurve::Nurb(curve.clone())).unwrap();

        let restored = roundtrip(&model);
        let face = restored.faces.values().next().unwrap();
        assert!(matches!(&face.geometry, FaceGeometry::Nurb(s) if *s == surface));
        let curved: Vec<_> = restored
            .edges
            .values()
            .filter_map(|e| match &e.curve {
                EdgeCurve::Nurb(c) => Some(c.clone()),
                EdgeCurve::Linear => None,
            })
            .collect();
        assert_eq!(curved, vec![curve]);
    }

    #[test]
    fn rejects_bad_snapshots() {
        assert!(matches!(Model::from_json("not json"), Err(Error::Serialization(_))));

        let unknown = r#"{"vertices":[{"id":0,"point":[0,0,0]}],
            "regions":[{"shells":[{"faces":[{"loops":[{"vertices":[0,1,2]}]}]}]}]}"#;
        assert!(matches!(Model::from_json(unknown), Err(Error::Serialization(_))));

        let hole_first = r#"{"vertices":[{"id":0,"point":[0,0,0]},{"id":1,"point":[1,0,0]},{"id":2,"point":[0,1,0]}],
            "regions":[{"shells":[{"faces":[{"loops":[{"vertices":[0,1,2],"hole":true}]}]}]}]}"#;
        assert!(matches!(Model::from_json(hole_first), Err(Error::Serialization(_))));

        let duplicate = r#"{"vertices":[{"id":0},{"id":0}],"regions":[]}"#;
        assert!(matches!(Model::from_json(duplicate), Err(Error::Serialization(_))));
    }

    #[test]
    fn hand_written_snapshot_loads() {
        let json = r#"{
            "vertices": [
                {"id": 10, "point": [0, 0, 0]},
                {"id": 11, "point": [1, 0, 0]},
                {"id": 12, "point": [1, 1, 0]},
                {"id": 13, "point": [0, 1, 0]}
            ],
            "regions": [{"shells": [{
                "faces": [
                    {"loops": [{"vertices": [10, 11, 12]}]},
                    {"loops": [{"vertices": [10, 12, 13]}]}
                ],
                "vertex": 13
            }]}]
        }"#;
        let model = Model::from_json(json).unwrap();
        model.verify().unwrap();
        assert_eq!(model.face_count(), 2);
        assert_eq!(model.edge_count(), 5);
    }
}
