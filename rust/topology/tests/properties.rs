// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whole-model checks through the public API: use-graph invariants on
//! closed and non-manifold shells, flattening output, offset drawing,
//! classification and point triangulation.

use std::collections::HashSet;

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use nmg_lite_topology::{
    triangulate_points, ClassTable, Classification, Command, EdgeUseKey, Fancy, FancyPainter,
    IndexTable, Model, ShellKey, Tolerance, TopologyKey, VertexKey, Vlblock, VlistStyle,
};

/// Unit cube with outward-wound faces, edges fused.
fn cube() -> (Model, ShellKey, Vec<VertexKey>) {
    let mut model = Model::new();
    let (_, shell) = model.add_region();
    let v: Vec<_> = (0..8)
        .map(|i| {
            let bit = |b: usize| ((i >> b) & 1) as f64;
            model.add_vertex(Point3::new(bit(0), bit(1), bit(2)))
        })
        .collect();
    let faces = [
        [0, 2, 3, 1],
        [4, 5, 7, 6],
        [0, 1, 5, 4],
        [2, 6, 7, 3],
        [0, 4, 6, 2],
        [1, 3, 7, 5],
    ];
    for f in faces {
        let verts: Vec<_> = f.iter().map(|&i| v[i]).collect();
        let fu = model.make_face(shell, &verts).unwrap();
        model.fit_face_plane(fu, &Tolerance::default()).unwrap();
    }
    assert_eq!(model.fuse_shared_edges(), 12);
    (model, shell, v)
}

fn face_edge_uses(model: &Model, shell: ShellKey) -> Vec<EdgeUseKey> {
    let mut out = Vec::new();
    for &fu in &model.shell(shell).unwrap().face_uses {
        for &lu in &model.face_use(fu).unwrap().loops {
            out.extend_from_slice(model.loop_edge_uses(lu));
        }
    }
    out
}

#[test]
fn cube_uses_pair_up() {
    let (model, shell, _) = cube();
    model.verify().unwrap();
    assert_eq!(model.edge_count(), 12);
    assert_eq!(model.face_use_count(), 12);

    let eus = face_edge_uses(&model, shell);
    assert_eq!(eus.len(), 48);
    for eu in eus {
        let mate = model.mate(eu);
        assert_ne!(mate, eu);
        assert_eq!(model.mate(mate), eu);
        assert_eq!(model.radial(model.radial(eu)), eu);
        assert_eq!(model.edge_use_start_vertex(mate), model.edge_use_end_vertex(eu));

        let ring = model.radial_ring(eu);
        assert_eq!(ring.len(), 2);
        let edge = model.edge_use(eu).unwrap().edge;
        assert!(ring.iter().all(|&r| model.edge_use(r).unwrap().edge == edge));
    }
}

#[test]
fn three_faces_on_one_edge() {
    let mut model = Model::new();
    let (_, shell) = model.add_region();
    let a = model.add_vertex(Point3::new(0.0, 0.0, 0.0));
    let b = model.add_vertex(Point3::new(1.0, 0.0, 0.0));
    let fins = [
        Point3::new(0.5, 1.0, 0.0),
        Point3::new(0.5, 0.0, 1.0),
        Point3::new(0.5, -1.0, 0.0),
    ];
    for (i, p) in fins.iter().enumerate() {
        let c = model.add_vertex(*p);
        let verts = if i % 2 == 0 { [a, b, c] } else { [b, a, c] };
        model.make_face(shell, &verts).unwrap();
    }
    assert_eq!(model.fuse_shared_edges(), 2);
    model.verify().unwrap();
    assert_eq!(model.edge_count(), 7);

    let shared: Vec<_> = face_edge_uses(&model, shell)
        .into_iter()
        .filter(|&eu| {
            let ends = [model.edge_use_start_vertex(eu), model.edge_use_end_vertex(eu)];
            ends.contains(&a) && ends.contains(&b)
        })
        .collect();
    assert_eq!(shared.len(), 6);
    for eu in shared {
        assert_eq!(model.radial_ring(eu).len(), 3);
        assert_eq!(model.radial(model.radial(eu)), eu);
    }
}

#[test]
fn vertex_loop_flattens_to_a_point() {
    let mut model = Model::new();
    let (_, shell) = model.add_region();
    let p = Point3::new(3.0, -1.0, 2.5);
    let v = model.add_vertex(p);
    model.make_vertex_loop(shell, v).unwrap();

    let vl = model.flatten_model(&VlistStyle::vectors());
    assert!(!vl.is_empty());
    assert_eq!(vl.len() % 2, 0);
    for pair in vl.commands().chunks(2) {
        assert_eq!(pair, &[Command::LineMove(p), Command::LineDraw(p)]);
    }
}

#[test]
fn square_face_flattens_to_one_polygon() {
    let mut model = Model::new();
    let (_, shell) = model.add_region();
    let pts = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(2.0, 2.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
    ];
    let verts: Vec<_> = pts.iter().map(|p| model.add_vertex(*p)).collect();
    let fu = model.make_face(shell, &verts).unwrap();
    model.fit_face_plane(fu, &Tolerance::default()).unwrap();

    let vl = model.flatten_model(&VlistStyle::polygons());
    let cmds = vl.commands();
    assert_eq!(cmds.len(), 6);
    match cmds[0] {
        Command::PolyStart(n) => assert_relative_eq!(n, Vector3::z(), epsilon = 1e-12),
        other => panic!("expected a polygon start, got {other:?}"),
    }
    assert_eq!(cmds[1], Command::PolyMove(pts[0]));
    assert_eq!(cmds[2], Command::PolyDraw(pts[1]));
    assert_eq!(cmds[3], Command::PolyDraw(pts[2]));
    assert_eq!(cmds[4], Command::PolyDraw(pts[3]));
    assert_eq!(cmds[5], Command::PolyEnd(pts[0]));

    let wire = model.flatten_model(&VlistStyle::vectors());
    assert_eq!(wire.commands().first(), Some(&Command::LineMove(pts[0])));
    assert_eq!(wire.commands().last(), Some(&Command::LineDraw(pts[0])));
    assert_eq!(wire.len(), 5);
}

#[test]
fn fancy_base_sits_inside_the_corner() {
    let mut model = Model::new();
    let (_, shell) = model.add_region();
    let verts: Vec<_> = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]]
        .iter()
        .map(|p| model.add_vertex(Point3::new(p[0], p[1], 0.0)))
        .collect();
    let fu = model.make_face(shell, &verts).unwrap();
    model.fit_face_plane(fu, &Tolerance::default()).unwrap();

    let lu = model.face_use(fu).unwrap().loops[0];
    let eu = model
        .loop_edge_uses(lu)
        .iter()
        .copied()
        .find(|&eu| model.edge_use_start_vertex(eu) == verts[0])
        .unwrap();

    let painter = FancyPainter::with_eue_dist(&model, 0.05);
    let base = painter.offset_eu_vertex(eu, &Vector3::z(), false).unwrap();
    let d = 0.065 / 2f64.sqrt();
    assert_relative_eq!(base, Point3::new(d, d, 0.04), epsilon = 1e-12);

    let (b, tip60) = painter.edge_use_coords(eu).unwrap();
    assert_relative_eq!(b, base, epsilon = 1e-12);
    assert!(tip60.x > b.x && tip60.x < 2.0);
    assert_relative_eq!(tip60.y, d, epsilon = 1e-12);
}

#[test]
fn fancy_cube_draws_every_use() {
    let (model, _, _) = cube();
    let painter = FancyPainter::with_eue_dist(&model, 0.05);

    let mut all = Vlblock::new();
    painter.model_block(&mut all, Fancy::ALL);
    let mut same = Vlblock::new();
    painter.model_block(&mut same, Fancy::from_bits(1));
    let mut none = Vlblock::new();
    painter.model_block(&mut none, Fancy::NONE);

    assert!(!all.is_empty());
    assert!(all.command_count() > same.command_count());
    assert!(same.command_count() > none.command_count());
}

#[test]
fn classification_prefers_the_shared_entity() {
    let (model, shell, v) = cube();
    let eu = face_edge_uses(&model, shell)[0];
    let data = model.edge_use(eu).unwrap();
    let edge_index = model.index_of(TopologyKey::Edge(data.edge)).unwrap();
    let eu_index = model.index_of(TopologyKey::EdgeUse(eu)).unwrap();

    assert_eq!(model.classify_edge_use(None, eu), Classification::Unknown);

    let mut table = ClassTable::new();
    assert_eq!(model.classify_edge_use(Some(&table), eu), Classification::Unclassified);

    table.insert(Classification::InB, eu_index);
    assert_eq!(model.classify_edge_use(Some(&table), eu), Classification::InB);

    table.insert(Classification::OutB, edge_index);
    assert_eq!(model.classify_edge_use(Some(&table), eu), Classification::OutB);

    // Listed twice: the earlier set wins.
    let v_index = model.index_of(TopologyKey::Vertex(v[0])).unwrap();
    table.insert(Classification::OnBAnti, v_index);
    table.insert(Classification::OnBShared, v_index);
    assert_eq!(table.lookup(v_index), Classification::OnBShared);
}

#[test]
fn concave_polygon_indices_come_back() {
    let outline = [
        [0.0, 0.0],
        [2.0, 0.0],
        [2.0, 1.0],
        [1.0, 1.0],
        [1.0, 2.0],
        [0.0, 2.0],
    ];
    let points: Vec<f64> = outline.iter().flat_map(|p| [p[0], p[1], 5.0]).collect();
    let tris = triangulate_points(&points, &Tolerance::default()).unwrap();
    assert_eq!(tris.len(), 12);
    assert!(tris.iter().all(|&i| i < outline.len()));

    let mut total = 0.0;
    for t in tris.chunks(3) {
        let p = |i: usize| Vector3::new(outline[t[i]][0], outline[t[i]][1], 0.0);
        let area2 = (p(1) - p(0)).cross(&(p(2) - p(0))).z;
        assert!(area2 > 0.0);
        total += area2;
    }
    assert_relative_eq!(total, 6.0, epsilon = 1e-9);
}

#[test]
fn index_table_covers_every_entity() {
    let (mut model, shell, v) = cube();
    let mut keys: Vec<TopologyKey> = model.region_keys().map(TopologyKey::Region).collect();
    keys.push(TopologyKey::Shell(shell));
    keys.extend(v.iter().map(|&k| TopologyKey::Vertex(k)));
    for &fu in &model.shell(shell).unwrap().face_uses {
        let fud = model.face_use(fu).unwrap();
        keys.push(TopologyKey::FaceUse(fu));
        keys.push(TopologyKey::Face(fud.face));
        for &lu in &fud.loops {
            keys.push(TopologyKey::LoopUse(lu));
            for &eu in model.loop_edge_uses(lu) {
                let eud = model.edge_use(eu).unwrap();
                keys.push(TopologyKey::EdgeUse(eu));
                keys.push(TopologyKey::VertexUse(eud.vertex_use));
            }
        }
    }

    let tab = IndexTable::for_model(&model);
    assert_eq!(tab.len(), model.max_index() + 1);
    let mut seen = HashSet::new();
    for key in keys {
        let index = model.index_of(key).unwrap();
        assert!(index >= 1 && index < tab.len());
        assert!(seen.insert(index), "index {index} handed out twice");
    }

    let mut tab = tab;
    assert!(tab.mark(1));
    model.add_vertex(Point3::new(9.0, 9.0, 9.0));
    tab.cover(&model);
    assert_eq!(tab.len(), model.max_index() + 1);
    assert!(tab.is_marked(1));
}

#[test]
fn cube_survives_json() {
    let (model, _, _) = cube();
    let json = model.to_json().unwrap();
    let loaded = Model::from_json(&json).unwrap();
    loaded.verify().unwrap();
    assert_eq!(loaded.edge_count(), 12);
    assert_eq!(loaded.face_count(), 6);
    assert_eq!(loaded.vertex_count(), 8);

    let style = VlistStyle::vectors();
    assert_eq!(loaded.flatten_model(&style).len(), model.flatten_model(&style).len());
}
