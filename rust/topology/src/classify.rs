// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Painting topology by Boolean classification.
//!
//! A Boolean evaluator classifies each entity of operand A against operand B
//! and records the result as four sets of entity indices. [`ClassTable`] holds
//! those sets; this module only reads them. [`ClassifierDisplay`] draws the
//! classified entities frame after frame, either into a [`VlblockSink`] or
//! into numbered plot files.

use std::path::PathBuf;

use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashSet;

use crate::arena::{EdgeUseContext, LoopContents, Model, Orientation};
use crate::config::PlotConfig;
use crate::error::Result;
use crate::fancy::FancyPainter;
use crate::index_table::IndexTable;
use crate::keys::*;
use crate::sink::{PauseToken, PlotWriter, VlblockSink};
use crate::vlist::{Rgb, Vlblock, VlistStyle};

/// Half-length of the axis cross drawn at each vertex.
const CROSS_HALF: f64 = 0.05;

/// Colour of the loop-continuity cue on classified edge uses.
const NEXT_CUE_COLOR: Rgb = Rgb(0, 100, 0);

/// Classification of an A entity with respect to B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    InB,
    OnBShared,
    OnBAnti,
    OutB,
    /// No table was supplied.
    Unknown,
    /// A table was supplied but lists the entity nowhere.
    Unclassified,
}

impl Classification {
    /// Colours indexed by [`Classification::palette_index`].
    pub const PALETTE: [Rgb; 6] = [
        Rgb(100, 100, 255),
        Rgb(255, 50, 50),
        Rgb(255, 50, 255),
        Rgb(50, 255, 50),
        Rgb(255, 255, 255),
        Rgb(255, 255, 125),
    ];

    pub fn palette_index(self) -> usize {
        match self {
            Classification::InB => 0,
            Classification::OnBShared => 1,
            Classification::OnBAnti => 2,
            Classification::OutB => 3,
            Classification::Unknown => 4,
            Classification::Unclassified => 5,
        }
    }

    pub fn color(self) -> Rgb {
        Self::PALETTE[self.palette_index()]
    }
}

/// Four sets of entity indices produced by a Boolean classifier.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClassTable {
    pub a_in_b: FxHashSet<usize>,
    pub a_on_b_shared: FxHashSet<usize>,
    pub a_on_b_anti: FxHashSet<usize>,
    pub a_out_b: FxHashSet<usize>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `index` under `class`. `Unknown` and `Unclassified` are not
    /// stored.
    pub fn insert(&mut self, class: Classification, index: usize) {
        let set = match class {
            Classification::InB => &mut self.a_in_b,
            Classification::OnBShared => &mut self.a_on_b_shared,
            Classification::OnBAnti => &mut self.a_on_b_anti,
            Classification::OutB => &mut self.a_out_b,
            Classification::Unknown | Classification::Unclassified => return,
        };
        set.insert(index);
    }

    /// First set containing `index`, in the order in, shared, anti, out.
    pub fn lookup(&self, index: usize) -> Classification {
        if self.a_in_b.contains(&index) {
            Classification::InB
        } else if self.a_on_b_shared.contains(&index) {
            Classification::OnBShared
        } else if self.a_on_b_anti.contains(&index) {
            Classification::OnBAnti
        } else if self.a_out_b.contains(&index) {
            Classification::OutB
        } else {
            Classification::Unclassified
        }
    }
}

/// Looks `index` up in an optional table.
pub fn classify_index(table: Option<&ClassTable>, index: usize) -> Classification {
    match table {
        Some(t) => t.lookup(index),
        None => Classification::Unknown,
    }
}

/// Classifies a shared entity, falling back to one of its uses when the
/// shared entity is listed nowhere.
fn classify_with_use(table: Option<&ClassTable>, shared: usize, use_index: usize) -> Classification {
    match classify_index(table, shared) {
        Classification::Unclassified => classify_index(table, use_index),
        c => c,
    }
}

impl Model {
    /// Classification of the vertex behind `vu`, else of `vu` itself.
    pub fn classify_vertex_use(&self, table: Option<&ClassTable>, vu: VertexUseKey) -> Classification {
        let data = self.vu(vu);
        classify_with_use(table, self.v(data.vertex).index, data.index)
    }

    /// Classification of the edge of `eu`, else of `eu` itself.
    pub fn classify_edge_use(&self, table: Option<&ClassTable>, eu: EdgeUseKey) -> Classification {
        let data = self.eu(eu);
        classify_with_use(table, self.e(data.edge).index, data.index)
    }

    /// Classification of the loop behind `lu`.
    pub fn classify_loop_use(&self, table: Option<&ClassTable>, lu: LoopUseKey) -> Classification {
        let lp = self.lu(lu).lp;
        match self.loops.get(lp) {
            Some(l) => classify_index(table, l.index),
            None => Classification::Unknown,
        }
    }
}

/// What the classifier display draws besides vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BrokenStyle {
    /// Draw shortened edges, and offset edge uses when fancy.
    pub edges: bool,
    /// Draw whole loops in their loop's colour: as wires alone, as
    /// polygons together with `edges`.
    pub loops: bool,
}

/// Entity handed to [`ClassifierDisplay::show`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokenTarget {
    Model,
    Entity(TopologyKey),
}

impl From<TopologyKey> for BrokenTarget {
    fn from(key: TopologyKey) -> Self {
        BrokenTarget::Entity(key)
    }
}

/// One drawing pass over classified entities.
struct BrokenPainter<'a> {
    model: &'a Model,
    table: Option<&'a ClassTable>,
    style: BrokenStyle,
    fancy: bool,
    offsets: FancyPainter<'a>,
}

impl BrokenPainter<'_> {
    fn vertex_use(&self, block: &mut Vlblock, tab: &mut IndexTable, vu: VertexUseKey) {
        let v = self.model.vu(vu).vertex;
        let vd = self.model.v(v);
        if !tab.mark(vd.index) {
            return;
        }
        let Some(p) = vd.point else {
            tracing::warn!(vertex = vd.index, "vertex without geometry not drawn");
            return;
        };
        let color = self.model.classify_vertex_use(self.table, vu).color();
        let vl = block.find(color);
        vl.point(p);
        for (from, to) in vertex_cross(&p) {
            vl.move_to(from);
            vl.draw_to(to);
        }
        vl.move_to(p);
    }

    fn edge(&self, block: &mut Vlblock, tab: &mut IndexTable, eu: EdgeUseKey) {
        let m = self.model;
        let mate = m.mate(eu);
        if !tab.mark(m.e(m.eu(eu).edge).index) {
            return;
        }
        if let (Some(p0), Some(p1)) = (m.edge_use_point(eu), m.edge_use_point(mate)) {
            let v = (p1 - p0) * 0.9;
            let vl = block.find(m.classify_edge_use(self.table, eu).color());
            vl.move_to(p0 + v);
            vl.draw_to(p1 - v);
        } else {
            tracing::warn!(edge_use = m.eu(eu).index, "edge without geometry not drawn");
        }
        self.vertex_use(block, tab, m.eu(eu).vertex_use);
        self.vertex_use(block, tab, m.eu(mate).vertex_use);
    }

    fn edge_use(&self, block: &mut Vlblock, tab: &mut IndexTable, eu: EdgeUseKey) {
        self.edge(block, tab, eu);
        if !self.fancy {
            return;
        }
        let m = self.model;
        let EdgeUseContext::InFaceLoop { face_use, .. } = m.edge_use_context(eu) else {
            return;
        };

        let class_color = m.classify_edge_use(self.table, eu).color();
        let color = match m.fu(face_use).orientation {
            Orientation::Same => class_color.offset(50, 0, 0),
            Orientation::Opposite => class_color.offset(-50, 0, 0),
            Orientation::Unspecified => Rgb::WHITE,
        };
        let (Some((base, tip)), Some(radial_tip), Some(next_base)) = (
            self.offsets.edge_use_coords(eu),
            self.offsets.radial_tip(eu),
            self.offsets.next_base(eu),
        ) else {
            return;
        };

        let vl = block.find(color);
        vl.move_to(base);
        vl.draw_to(tip);
        let vl = block.find(color.offset(0, -20, 0));
        vl.move_to(tip);
        vl.draw_to(radial_tip);
        let vl = block.find(NEXT_CUE_COLOR);
        vl.move_to(tip);
        vl.draw_to(next_base);
    }

    fn loop_use(&self, block: &mut Vlblock, tab: &mut IndexTable, lu: LoopUseKey) {
        let m = self.model;
        let eus = match &m.lu(lu).contents {
            LoopContents::Vertex(vu) => {
                self.vertex_use(block, tab, *vu);
                return;
            }
            LoopContents::Edges(eus) => eus,
        };
        if self.style.edges {
            for &eu in eus {
                self.edge_use(block, tab, eu);
            }
        }
        if !self.style.loops {
            return;
        }

        let normal = match m.loop_use_face_use(lu) {
            Some(fu) => m.face_use_normal(fu).unwrap_or_else(Vector3::z),
            None => Vector3::z(),
        };
        let style = if self.style.edges {
            VlistStyle::polygons()
        } else {
            VlistStyle::vectors()
        };
        let color = m.classify_loop_use(self.table, lu).color();
        m.flatten_loop_use(block.find(color), lu, &style, &normal);
    }

    fn face_use(&self, block: &mut Vlblock, tab: &mut IndexTable, fu: FaceUseKey) {
        for &lu in &self.model.fu(fu).loops {
            self.loop_use(block, tab, lu);
        }
    }

    fn shell(&self, block: &mut Vlblock, tab: &mut IndexTable, shell: ShellKey) {
        let sd = self.model.s(shell);
        for &fu in &sd.face_uses {
            self.face_use(block, tab, fu);
        }
        for &lu in &sd.wire_loops {
            self.loop_use(block, tab, lu);
        }
        for &eu in &sd.wire_edges {
            self.edge_use(block, tab, eu);
        }
        if let Some(vu) = sd.vertex_use {
            self.vertex_use(block, tab, vu);
        }
    }

    fn region(&self, block: &mut Vlblock, tab: &mut IndexTable, region: RegionKey) {
        for &shell in &self.model.r(region).shells {
            self.shell(block, tab, shell);
        }
    }

    fn target(&self, block: &mut Vlblock, tab: &mut IndexTable, target: BrokenTarget) {
        let m = self.model;
        match target {
            BrokenTarget::Model => {
                for region in m.region_keys() {
                    self.region(block, tab, region);
                }
            }
            BrokenTarget::Entity(key) => match key {
                TopologyKey::Region(k) => self.region(block, tab, k),
                TopologyKey::Shell(k) => self.shell(block, tab, k),
                TopologyKey::Face(k) => self.face_use(block, tab, m.f(k).face_use),
                TopologyKey::FaceUse(k) => self.face_use(block, tab, k),
                TopologyKey::LoopUse(k) => self.loop_use(block, tab, k),
                TopologyKey::Edge(k) => self.edge_use(block, tab, m.e(k).edge_use),
                TopologyKey::EdgeUse(k) => self.edge_use(block, tab, k),
                TopologyKey::VertexUse(k) => self.vertex_use(block, tab, k),
                TopologyKey::Loop(_) | TopologyKey::Vertex(_) => {
                    tracing::warn!(kind = %key.kind(), "classifier display cannot draw this entity");
                }
            },
        }
    }
}

/// Accumulating display of classifier results.
///
/// Each [`ClassifierDisplay::show`] call adds the requested entities to a
/// block kept across calls; entities already drawn are skipped until a call
/// passes `all_new`. With a sink attached the block is handed over after
/// every call. Without one, each call writes `cbroke<N>.plot3` into the
/// configured plot directory and starts afresh.
pub struct ClassifierDisplay {
    config: PlotConfig,
    style: BrokenStyle,
    sink: Option<Box<dyn VlblockSink>>,
    pause: PauseToken,
    block: Vlblock,
    tab: IndexTable,
    frame: usize,
}

impl ClassifierDisplay {
    pub fn new(config: PlotConfig, style: BrokenStyle) -> Self {
        Self {
            config,
            style,
            sink: None,
            pause: PauseToken::new(),
            block: Vlblock::new(),
            tab: IndexTable::default(),
            frame: 0,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn VlblockSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Token that releases a labelled [`ClassifierDisplay::show`] call.
    pub fn pause_token(&self) -> PauseToken {
        self.pause.clone()
    }

    /// The block accumulated so far.
    pub fn block(&self) -> &Vlblock {
        &self.block
    }

    /// Draws `target` in classification colours and presents the frame.
    ///
    /// With a sink and a `label`, blocks until the pause token is resumed.
    /// Returns the plot file written when no sink is attached.
    pub fn show(
        &mut self,
        model: &Model,
        table: Option<&ClassTable>,
        target: BrokenTarget,
        all_new: bool,
        fancy: bool,
        label: Option<&str>,
    ) -> Result<Option<PathBuf>> {
        if all_new {
            self.block.clear();
            self.tab.reset();
        }
        if self.tab.is_empty() {
            self.tab = IndexTable::for_model(model);
        } else {
            self.tab.cover(model);
        }

        let painter = BrokenPainter {
            model,
            table,
            style: self.style,
            fancy,
            offsets: FancyPainter::new(model, &self.config),
        };
        painter.target(&mut self.block, &mut self.tab, target);

        let delay = self.config.effective_delay();
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.display(&self.block, delay, true);
            if let Some(label) = label {
                tracing::info!(label, "classifier display paused");
                self.pause.wait(sink);
                tracing::info!(label, "classifier display continuing");
            }
            return Ok(None);
        }

        let path = self.config.plot_dir.join(format!("cbroke{}.plot3", self.frame));
        self.frame += 1;
        let mut writer = PlotWriter::create(&path)?;
        writer.write_block(&self.block)?;
        writer.finish()?;
        tracing::info!(path = %path.display(), label = label.unwrap_or(""), "classifier plot written");

        self.block.clear();
        self.tab = IndexTable::default();
        Ok(Some(path))
    }
}

/// The three axis-aligned strokes of the cross drawn at a vertex.
pub fn vertex_cross(p: &Point3<f64>) -> [(Point3<f64>, Point3<f64>); 3] {
    [Vector3::x(), Vector3::y(), Vector3::z()].map(|axis| (p + axis * CROSS_HALF, p - axis * CROSS_HALF))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vlist::Command;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn triangle(model: &mut Model) -> (ShellKey, FaceUseKey) {
        let (_, shell) = model.add_region();
        let v: Vec<_> = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]
            .iter()
            .map(|p| model.add_vertex(Point3::new(p[0], p[1], 0.0)))
            .collect();
        let fu = model.make_face(shell, &v).unwrap();
        model
            .fit_face_plane(fu, &crate::config::Tolerance::default())
            .unwrap();
        (shell, fu)
    }

    #[test]
    fn palette_and_priority() {
        assert_eq!(Classification::InB.color(), Rgb(100, 100, 255));
        assert_eq!(Classification::Unknown.color(), Rgb::WHITE);
        assert_eq!(Classification::Unclassified.color(), Rgb(255, 255, 125));

        let mut table = ClassTable::new();
        table.insert(Classification::OutB, 7);
        table.insert(Classification::OnBAnti, 7);
        table.insert(Classification::Unknown, 8);
        assert_eq!(table.lookup(7), Classification::OnBAnti);
        table.insert(Classification::InB, 7);
        assert_eq!(table.lookup(7), Classification::InB);
        assert_eq!(table.lookup(8), Classification::Unclassified);
        assert_eq!(classify_index(None, 7), Classification::Unknown);
    }

    #[test]
    fn uses_fall_back_only_when_shared_is_unlisted() {
        let mut model = Model::new();
        let (_, shell) = model.add_region();
        let a = model.add_vertex(Point3::origin());
        let b = model.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let eu = model.make_wire_edge(shell, a, b).unwrap();
        let vu = model.edge_use(eu).unwrap().vertex_use;
        let vu_index = model.vertex_use(vu).unwrap().index;
        let v_index = model.vertex(a).unwrap().index;
        let eu_index = model.edge_use(eu).unwrap().index;

        let mut table = ClassTable::new();
        table.insert(Classification::OutB, vu_index);
        table.insert(Classification::OnBShared, eu_index);
        assert_eq!(model.classify_vertex_use(Some(&table), vu), Classification::OutB);
        assert_eq!(model.classify_edge_use(Some(&table), eu), Classification::OnBShared);

        table.insert(Classification::InB, v_index);
        assert_eq!(model.classify_vertex_use(Some(&table), vu), Classification::InB);
        assert_eq!(model.classify_vertex_use(None, vu), Classification::Unknown);
    }

    #[derive(Default)]
    struct Frames {
        shown: Vec<(usize, bool)>,
    }

    struct Recorder {
        frames: Rc<RefCell<Frames>>,
        resume: Option<PauseToken>,
    }

    impl VlblockSink for Recorder {
        fn display(&mut self, block: &Vlblock, delay: Duration, retain: bool) {
            assert_eq!(delay, Duration::ZERO);
            self.frames.borrow_mut().shown.push((block.command_count(), retain));
            if let Some(token) = &self.resume {
                token.resume();
            }
        }
    }

    #[test]
    fn vertex_cross_layout() {
        let mut model = Model::new();
        let (_, shell) = model.add_region();
        let v = model.add_vertex(Point3::new(1.0, 2.0, 3.0));
        let vu = model.set_shell_vertex(shell, v).unwrap();

        let frames = Rc::new(RefCell::new(Frames::default()));
        let mut display = ClassifierDisplay::new(PlotConfig::builtin(), BrokenStyle::default()).with_sink(Box::new(
            Recorder {
                frames: frames.clone(),
                resume: None,
            },
        ));
        display
            .show(&model, None, TopologyKey::VertexUse(vu).into(), true, false, None)
            .unwrap();

        let vl = display.block().get(Rgb::WHITE).unwrap();
        assert_eq!(vl.len(), 9);
        let p = Point3::new(1.0, 2.0, 3.0);
        let [(x0, x1), ..] = vertex_cross(&p);
        assert_eq!(vl.commands()[2], Command::LineMove(x0));
        assert_eq!(vl.commands()[3], Command::LineDraw(x1));
        assert_eq!(vl.commands()[8], Command::LineMove(p));
        assert_eq!(frames.borrow().shown, vec![(9, true)]);
    }

    #[test]
    fn display_accumulates_until_all_new() {
        let mut model = Model::new();
        let (shell, _) = triangle(&mut model);
        let frames = Rc::new(RefCell::new(Frames::default()));
        let style = BrokenStyle {
            edges: true,
            loops: false,
        };
        let mut display = ClassifierDisplay::new(PlotConfig::builtin(), style).with_sink(Box::new(Recorder {
            frames: frames.clone(),
            resume: None,
        }));

        let table = ClassTable::new();
        let target = BrokenTarget::Entity(shell.into());
        display.show(&model, Some(&table), target, true, false, None).unwrap();
        // Three shortened edges and three vertex crosses, all unlisted.
        let first = 3 * 2 + 3 * 9;
        assert_eq!(display.block().get(Rgb(255, 255, 125)).map(|l| l.len()), Some(first));

        display.show(&model, Some(&table), target, false, false, None).unwrap();
        display.show(&model, Some(&table), target, true, false, None).unwrap();
        assert_eq!(frames.borrow().shown, vec![(first, true), (first, true), (first, true)]);
    }

    #[test]
    fn fancy_uses_shift_red_by_side() {
        let mut model = Model::new();
        let (_, fu) = triangle(&mut model);
        let mut table = ClassTable::new();
        let lu = model.face_use(fu).unwrap().loops[0];
        for &eu in model.loop_edge_uses(lu) {
            let e = model.edge_use(eu).unwrap().edge;
            table.insert(Classification::InB, model.edge(e).unwrap().index);
        }

        let frames = Rc::new(RefCell::new(Frames::default()));
        let style = BrokenStyle {
            edges: true,
            loops: true,
        };
        let mut display = ClassifierDisplay::new(PlotConfig::builtin(), style).with_sink(Box::new(Recorder {
            frames,
            resume: None,
        }));
        display
            .show(&model, Some(&table), BrokenTarget::Model, true, true, None)
            .unwrap();

        let block = display.block();
        assert_eq!(block.get(Rgb(150, 100, 255)).map(|l| l.len()), Some(6));
        assert_eq!(block.get(Rgb(50, 100, 255)).map(|l| l.len()), Some(6));
        assert_eq!(block.get(Rgb(150, 80, 255)).map(|l| l.len()), Some(6));
        assert_eq!(block.get(NEXT_CUE_COLOR).map(|l| l.len()), Some(12));
        // Both loop uses drawn as polygons in the unlisted loop colour.
        let loops = block.get(Rgb(255, 255, 125)).unwrap();
        assert!(loops.iter().any(|c| matches!(c, Command::PolyStart(_))));
    }

    #[test]
    fn labelled_show_waits_for_resume() {
        let mut model = Model::new();
        let (_, fu) = triangle(&mut model);
        let frames = Rc::new(RefCell::new(Frames::default()));
        let mut display = ClassifierDisplay::new(PlotConfig::builtin(), BrokenStyle::default());
        let token = display.pause_token();
        display = display.with_sink(Box::new(Recorder {
            frames: frames.clone(),
            resume: Some(token),
        }));

        let out = display
            .show(&model, None, TopologyKey::FaceUse(fu).into(), true, false, Some("face"))
            .unwrap();
        assert!(out.is_none());
        assert_eq!(frames.borrow().shown.len(), 1);
    }

    #[test]
    fn without_sink_writes_numbered_plots() {
        let mut model = Model::new();
        let (shell, _) = triangle(&mut model);
        let dir = std::env::temp_dir().join(format!("nmg-classify-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut config = PlotConfig::builtin();
        config.plot_dir = dir.clone();
        let style = BrokenStyle {
            edges: true,
            loops: false,
        };
        let mut display = ClassifierDisplay::new(config, style);

        let target = BrokenTarget::Entity(shell.into());
        let first = display.show(&model, None, target, false, false, None).unwrap().unwrap();
        let second = display.show(&model, None, target, false, false, None).unwrap().unwrap();
        assert_eq!(first, dir.join("cbroke0.plot3"));
        assert_eq!(second, dir.join("cbroke1.plot3"));

        // The table is dropped after each file, so both frames are complete.
        let a = std::fs::read_to_string(&first).unwrap();
        let b = std::fs::read_to_string(&second).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("C 255 255 255\n"));
        assert!(display.block().is_empty());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
