// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tolerances and plot settings.
//!
//! [`PlotConfig`] is loaded from environment variables so that drawing
//! parameters can be tuned without recompiling.

use std::path::PathBuf;
use std::time::Duration;

/// Distance and angle tolerances used by geometric predicates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Two points closer than this are considered coincident.
    pub dist: f64,
    /// `dist * dist`, cached.
    pub dist_sq: f64,
    /// Cosine tolerance below which two directions are perpendicular.
    pub perp: f64,
    /// `1 - perp`: above this two directions are parallel.
    pub para: f64,
}

impl Tolerance {
    /// Creates a tolerance from a distance and a perpendicularity cosine.
    pub fn new(dist: f64, perp: f64) -> Self {
        Self {
            dist,
            dist_sq: dist * dist,
            perp,
            para: 1.0 - perp,
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::new(0.0005, 1e-6)
    }
}

/// Settings for the drawing routines.
#[derive(Debug, Clone)]
pub struct PlotConfig {
    /// Base offset used by the fancy edge-use drawing.
    pub eue_dist: f64,
    /// Interior samples drawn along each curved edge.
    pub curve_samples: usize,
    /// Knots inserted per parametric direction when drawing a surface.
    pub surface_samples: usize,
    /// Delay between animation frames when slow frames are requested.
    pub frame_delay: Duration,
    /// Whether animation frames use `frame_delay` at all.
    pub slow_frames: bool,
    /// Directory that receives plot files when no display sink is attached.
    pub plot_dir: PathBuf,
}

impl PlotConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            eue_dist: std::env::var("NMG_EUE_DIST")
                .unwrap_or_else(|_| "0.05".into())
                .parse()
                .unwrap_or(0.05),
            curve_samples: std::env::var("NMG_CURVE_SAMPLES")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .unwrap_or(10),
            surface_samples: std::env::var("NMG_SURFACE_SAMPLES")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .unwrap_or(10),
            frame_delay: Duration::from_micros(
                std::env::var("NMG_FRAME_DELAY_US")
                    .unwrap_or_else(|_| "10".into())
                    .parse()
                    .unwrap_or(10),
            ),
            slow_frames: std::env::var("NMG_SLOW_FRAMES")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            plot_dir: std::env::var("NMG_PLOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Fixed defaults, independent of the environment.
    pub fn builtin() -> Self {
        Self {
            eue_dist: 0.05,
            curve_samples: 10,
            surface_samples: 10,
            frame_delay: Duration::from_micros(10),
            slow_frames: false,
            plot_dir: PathBuf::from("."),
        }
    }

    /// Delay to hand to an animation sink for one frame.
    pub fn effective_delay(&self) -> Duration {
        if self.slow_frames {
            self.frame_delay
        } else {
            Duration::ZERO
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
