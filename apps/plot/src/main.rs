// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! NMG-Lite plot tool.
//!
//! Reads models in the JSON snapshot format and draws them:
//!
//! - `plot` - flattened wireframe or polygons
//! - `fancy` - offset edge-use drawing, coloured by orientation
//! - `classify` - classification colours from a table of entity indices
//! - `triangulate` - triangle indices for a flat polygon given as points

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use nmg_lite_topology::{
    BrokenStyle, BrokenTarget, ClassTable, ClassifierDisplay, Fancy, FancyPainter, Model,
    PlotConfig, PlotWriter, Rgb, Tolerance, Vlblock, VlistStyle,
};

#[derive(Parser)]
#[command(name = "nmg-plot")]
#[command(about = "Plot, classify and triangulate NMG-Lite models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the environment-driven plot settings.
#[derive(Args)]
struct Sampling {
    /// Interior samples per curved edge
    #[arg(long)]
    curve_samples: Option<usize>,

    /// Knots inserted per direction when drawing surfaces
    #[arg(long)]
    surface_samples: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten a model into a plot file
    Plot {
        /// Model snapshot (JSON)
        input: PathBuf,

        /// Output plot file
        #[arg(short, long)]
        output: PathBuf,

        /// Draw face loops as polygons
        #[arg(long)]
        polygons: bool,

        /// Draw short strokes along face and vertex normals
        #[arg(long)]
        normals: bool,

        /// Skip parametric surface lattices
        #[arg(long)]
        no_surfaces: bool,

        /// Write the raw command stream as JSON instead of a plot file
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        sampling: Sampling,
    },

    /// Draw edge uses offset from their edges
    Fancy {
        /// Model snapshot (JSON)
        input: PathBuf,

        /// Output plot file
        #[arg(short, long)]
        output: PathBuf,

        /// Orientation bits: 1 = same-side uses, 2 = opposite-side uses
        #[arg(short, long, default_value_t = 3)]
        bits: u8,

        /// Base offset distance
        #[arg(long)]
        eue_dist: Option<f64>,
    },

    /// Draw a model in classification colours
    Classify {
        /// Model snapshot (JSON)
        input: PathBuf,

        /// Classification table (JSON with a_in_b, a_on_b_shared, a_on_b_anti, a_out_b)
        #[arg(short, long)]
        table: Option<PathBuf>,

        /// Directory receiving cbroke<N>.plot3
        #[arg(long)]
        plot_dir: Option<PathBuf>,

        /// Draw edges and edge uses
        #[arg(long)]
        edges: bool,

        /// Draw loops
        #[arg(long)]
        loops: bool,

        /// Offset edge uses from their edges
        #[arg(long)]
        fancy: bool,
    },

    /// Triangulate a flat polygon given as a JSON array [x, y, z, ...]
    Triangulate {
        /// Point file (JSON)
        input: PathBuf,

        /// Distance tolerance
        #[arg(long, default_value_t = 0.0005)]
        tolerance: f64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,nmg_lite_topology=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = PlotConfig::from_env();

    match cli.command {
        Commands::Plot {
            input,
            output,
            polygons,
            normals,
            no_surfaces,
            json,
            sampling,
        } => {
            apply_sampling(&mut config, &sampling);
            let model = load_model(&input)?;
            let base = if polygons {
                VlistStyle::polygons()
            } else {
                VlistStyle::vectors()
            };
            let style = VlistStyle {
                visualize_normals: normals,
                no_surfaces,
                ..base.with_config(&config)
            };
            let vl = model.flatten_model(&style);
            tracing::info!(commands = vl.len(), "model flattened");

            if json {
                let text = serde_json::to_string_pretty(&vl)?;
                fs::write(&output, text).with_context(|| format!("writing {}", output.display()))?;
            } else {
                let mut block = Vlblock::new();
                block.find(Rgb::WHITE).extend(vl);
                write_plot(&output, &block)?;
            }
        }

        Commands::Fancy {
            input,
            output,
            bits,
            eue_dist,
        } => {
            if let Some(d) = eue_dist {
                config.eue_dist = d;
            }
            let fancy = Fancy::from_bits(bits);
            if !fancy.any() {
                bail!("orientation bits {bits} select no edge uses");
            }
            let model = load_model(&input)?;
            let mut block = Vlblock::new();
            FancyPainter::new(&model, &config).model_block(&mut block, fancy);
            tracing::info!(commands = block.command_count(), "fancy block drawn");
            write_plot(&output, &block)?;
        }

        Commands::Classify {
            input,
            table,
            plot_dir,
            edges,
            loops,
            fancy,
        } => {
            if let Some(dir) = plot_dir {
                config.plot_dir = dir;
            }
            let model = load_model(&input)?;
            let table = match table {
                Some(path) => {
                    let text = fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    let table: ClassTable = serde_json::from_str(&text)
                        .with_context(|| format!("parsing classification table {}", path.display()))?;
                    Some(table)
                }
                None => None,
            };
            let mut display = ClassifierDisplay::new(config, BrokenStyle { edges, loops });
            if let Some(path) =
                display.show(&model, table.as_ref(), BrokenTarget::Model, true, fancy, None)?
            {
                println!("{}", path.display());
            }
        }

        Commands::Triangulate { input, tolerance } => {
            let text = fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let points: Vec<f64> = serde_json::from_str(&text)
                .with_context(|| format!("parsing points {}", input.display()))?;
            let tol = Tolerance::new(tolerance, Tolerance::default().perp);
            let Some(indices) = nmg_lite_topology::triangulate_points(&points, &tol) else {
                bail!("{} points could not be triangulated", points.len() / 3);
            };
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer(&mut stdout, &indices)?;
            writeln!(stdout)?;
        }
    }

    Ok(())
}

fn apply_sampling(config: &mut PlotConfig, sampling: &Sampling) {
    if let Some(n) = sampling.curve_samples {
        config.curve_samples = n;
    }
    if let Some(n) = sampling.surface_samples {
        config.surface_samples = n;
    }
}

fn load_model(path: &Path) -> Result<Model> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let model = Model::from_json(&text)
        .with_context(|| format!("loading model {}", path.display()))?;
    tracing::debug!(path = %path.display(), "model loaded");
    Ok(model)
}

fn write_plot(path: &Path, block: &Vlblock) -> Result<()> {
    let mut writer =
        PlotWriter::create(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_block(block)?;
    writer.finish()?;
    tracing::info!(path = %path.display(), "plot written");
    Ok(())
}
