// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Draw-command streams ("vlists") and colour-keyed blocks of them.

use nalgebra::{Point3, Vector3};

use crate::config::PlotConfig;

/// One drawing instruction.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub enum Command {
    /// Pen up, move to point.
    LineMove(Point3<f64>),
    /// Pen down, draw to point.
    LineDraw(Point3<f64>),
    /// Begin a polygon with the given face normal.
    PolyStart(Vector3<f64>),
    /// First polygon vertex.
    PolyMove(Point3<f64>),
    /// Further polygon vertex.
    PolyDraw(Point3<f64>),
    /// Close the polygon at the given (first) point.
    PolyEnd(Point3<f64>),
    /// Shading normal for the next polygon vertex.
    PolyVertexNormal(Vector3<f64>),
}

impl Command {
    /// Point carried by the command, if it carries one.
    pub fn point(&self) -> Option<Point3<f64>> {
        match *self {
            Command::LineMove(p)
            | Command::LineDraw(p)
            | Command::PolyMove(p)
            | Command::PolyDraw(p)
            | Command::PolyEnd(p) => Some(p),
            Command::PolyStart(_) | Command::PolyVertexNormal(_) => None,
        }
    }

    /// Whether the command starts a new pen stroke.
    pub fn is_move(&self) -> bool {
        matches!(self, Command::LineMove(_) | Command::PolyMove(_))
    }
}

/// Options that shape how loops and faces are flattened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlistStyle {
    /// Emit face loops as polygons instead of vectors.
    pub polygon: bool,
    /// Emit per-vertex normals ahead of polygon vertices.
    pub use_vertex_normals: bool,
    /// Draw short strokes along face and vertex normals.
    pub visualize_normals: bool,
    /// Skip the lattice of parametric surfaces.
    pub no_surfaces: bool,
    /// Interior samples drawn along each curved edge.
    pub curve_samples: usize,
    /// Knots inserted per direction when drawing a parametric surface.
    pub surface_samples: usize,
}

impl Default for VlistStyle {
    fn default() -> Self {
        Self {
            polygon: false,
            use_vertex_normals: false,
            visualize_normals: false,
            no_surfaces: false,
            curve_samples: 10,
            surface_samples: 10,
        }
    }
}

impl VlistStyle {
    /// Plain wireframe.
    pub fn vectors() -> Self {
        Self::default()
    }

    /// Polygons with vertex normals.
    pub fn polygons() -> Self {
        Self {
            polygon: true,
            use_vertex_normals: true,
            ..Self::default()
        }
    }

    /// Takes the sample counts from `config`.
    pub fn with_config(self, config: &PlotConfig) -> Self {
        Self {
            curve_samples: config.curve_samples,
            surface_samples: config.surface_samples,
            ..self
        }
    }

    /// The style wire loops are drawn with: plain vectors, same sampling.
    pub fn wire(&self) -> Self {
        Self {
            curve_samples: self.curve_samples,
            surface_samples: self.surface_samples,
            ..Self::default()
        }
    }
}

/// An ordered command stream.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct Vlist {
    commands: Vec<Command>,
}

impl Vlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: Command) {
        self.commands.push(cmd);
    }

    pub fn move_to(&mut self, p: Point3<f64>) {
        self.commands.push(Command::LineMove(p));
    }

    pub fn draw_to(&mut self, p: Point3<f64>) {
        self.commands.push(Command::LineDraw(p));
    }

    /// Appends a zero-length move+draw, which renders as a point.
    pub fn point(&mut self, p: Point3<f64>) {
        self.move_to(p);
        self.draw_to(p);
    }

    pub fn extend(&mut self, other: Vlist) {
        self.commands.extend(other.commands);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }
}

impl<'a> IntoIterator for &'a Vlist {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

/// 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// Each channel halved.
    pub fn half(self) -> Rgb {
        Rgb(self.0 / 2, self.1 / 2, self.2 / 2)
    }

    /// Adds signed offsets per channel, clamping to `0..=255`.
    pub fn offset(self, dr: i16, dg: i16, db: i16) -> Rgb {
        let ch = |c: u8, d: i16| (c as i16 + d).clamp(0, 255) as u8;
        Rgb(ch(self.0, dr), ch(self.1, dg), ch(self.2, db))
    }
}

/// Command streams bucketed by colour, in first-use order.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Vlblock {
    lists: Vec<(Rgb, Vlist)>,
}

impl Vlblock {
    pub fn new() -> Self {
        Self::default()
    }

    /// The list for `color`, created empty on first use.
    pub fn find(&mut self, color: Rgb) -> &mut Vlist {
        let pos = match self.lists.iter().position(|(c, _)| *c == color) {
            Some(pos) => pos,
            None => {
                self.lists.push((color, Vlist::new()));
                self.lists.len() - 1
            }
        };
        &mut self.lists[pos].1
    }

    /// The list for `color`, if any commands were drawn in it.
    pub fn get(&self, color: Rgb) -> Option<&Vlist> {
        self.lists.iter().find(|(c, _)| *c == color).map(|(_, l)| l)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Rgb, &Vlist)> {
        self.lists.iter().map(|(c, l)| (*c, l))
    }

    /// Total commands across every colour.
    pub fn command_count(&self) -> usize {
        self.lists.iter().map(|(_, l)| l.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(|(_, l)| l.is_empty())
    }

    pub fn clear(&mut self) {
        self.lists.clear();
    }
}
