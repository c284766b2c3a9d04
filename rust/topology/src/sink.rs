// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Destinations for drawn blocks: interactive displays and plot files.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::vlist::{Command, Rgb, Vlblock, Vlist};

/// Something that can show a [`Vlblock`], typically an interactive viewer.
pub trait VlblockSink {
    /// Shows `block`, waiting `delay` before returning. With `retain` the
    /// sink keeps its own copy; the caller goes on adding to `block`.
    fn display(&mut self, block: &Vlblock, delay: Duration, retain: bool);

    /// Gives the display a chance to redraw and process input while the
    /// caller is waiting.
    fn idle(&mut self) {}
}

/// A cross-thread "continue" signal for paused displays.
///
/// The waiting side calls [`PauseToken::wait`]; any clone may call
/// [`PauseToken::resume`] to release it.
#[derive(Debug, Clone, Default)]
pub struct PauseToken {
    resumed: Arc<AtomicBool>,
}

impl PauseToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases the current or next [`PauseToken::wait`].
    pub fn resume(&self) {
        self.resumed.store(true, Ordering::Release);
    }

    /// Blocks until resumed, letting `sink` idle in between. The token is
    /// re-armed on return.
    pub fn wait(&self, sink: &mut dyn VlblockSink) {
        while !self.resumed.swap(false, Ordering::AcqRel) {
            sink.idle();
            std::thread::yield_now();
        }
    }
}

/// Writes blocks as a text plot: `C r g b` selects a colour, `M x y z`
/// moves the pen and `N x y z` draws to a point.
pub struct PlotWriter<W: Write> {
    out: W,
}

impl PlotWriter<BufWriter<File>> {
    /// Creates (or truncates) the plot file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> PlotWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_color(&mut self, color: Rgb) -> Result<()> {
        writeln!(self.out, "C {} {} {}", color.0, color.1, color.2)?;
        Ok(())
    }

    /// Writes the pen motion of `vl`. Polygon markers and normals carry no
    /// pen motion and are skipped.
    pub fn write_vlist(&mut self, vl: &Vlist) -> Result<()> {
        for cmd in vl {
            let (op, p) = match *cmd {
                Command::LineMove(p) | Command::PolyMove(p) => ('M', p),
                Command::LineDraw(p) | Command::PolyDraw(p) | Command::PolyEnd(p) => ('N', p),
                Command::PolyStart(_) | Command::PolyVertexNormal(_) => continue,
            };
            writeln!(self.out, "{op} {} {} {}", p.x, p.y, p.z)?;
        }
        Ok(())
    }

    /// Every non-empty colour list of `block`, in block order.
    pub fn write_block(&mut self, block: &Vlblock) -> Result<()> {
        for (color, vl) in block.iter() {
            if vl.is_empty() {
                continue;
            }
            self.write_color(color)?;
            self.write_vlist(vl)?;
        }
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};
    use std::thread;

    #[test]
    fn plot_text_format() {
        let mut block = Vlblock::new();
        let vl = block.find(Rgb(1, 2, 3));
        vl.move_to(Point3::new(0.0, 0.0, 0.0));
        vl.draw_to(Point3::new(1.5, 0.0, -2.0));
        let vl = block.find(Rgb::WHITE);
        vl.push(Command::PolyStart(Vector3::z()));
        vl.push(Command::PolyMove(Point3::new(1.0, 1.0, 1.0)));
        vl.push(Command::PolyEnd(Point3::new(1.0, 1.0, 1.0)));
        block.find(Rgb(9, 9, 9));

        let mut writer = PlotWriter::new(Vec::new());
        writer.write_block(&block).unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(
            text,
            "C 1 2 3\nM 0 0 0\nN 1.5 0 -2\nC 255 255 255\nM 1 1 1\nN 1 1 1\n"
        );
    }

    struct Counting {
        idles: usize,
    }

    impl VlblockSink for Counting {
        fn display(&mut self, _block: &Vlblock, _delay: Duration, _retain: bool) {}

        fn idle(&mut self) {
            self.idles += 1;
        }
    }

    #[test]
    fn wait_returns_after_resume_and_rearms() {
        let token = PauseToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || remote.resume());

        let mut sink = Counting { idles: 0 };
        token.wait(&mut sink);
        handle.join().unwrap();
        assert!(!token.resumed.load(Ordering::Acquire));

        token.resume();
        token.wait(&mut sink);
        assert!(!token.resumed.load(Ordering::Acquire));
    }
}
