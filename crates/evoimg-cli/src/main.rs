//! `evoimg`: render, generate, mutate and inspect image circuits.

mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use evoimg_core::EvoConfig;
use evoimg_ir::{Circuit, Generator, Mutator};
use evoimg_render::{PixelGrid, Renderer};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "evoimg", version, about = "Evolved procedural images")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render circuits to imgNNNN.png, one per program
    Render {
        /// Image size in pixels
        #[arg(short = 's', long)]
        size: Option<usize>,
        /// Samples per pixel
        #[arg(short = 'k', long)]
        samples: Option<usize>,
        /// Output directory
        #[arg(short = 'o', long, default_value = ".")]
        out_dir: PathBuf,
        /// Program text; read one per line from stdin when absent
        expr: Option<String>,
    },
    /// Print random circuits
    Random {
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
        /// Operator nodes per circuit
        #[arg(short = 'k', long)]
        nodes: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        /// Also render each circuit
        #[arg(long)]
        render: bool,
        #[arg(short = 'o', long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Print a random circuit followed by mutants of it
    Mutants {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
        #[arg(short = 'k', long)]
        nodes: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the graph of each program read from stdin
    Graph {
        /// JSON instead of Graphviz DOT
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_telemetry(cli.log_json)?;

    let mut config = match &cli.config {
        Some(path) => EvoConfig::load(path)
            .with_context(|| format!("cannot load config '{}'", path.display()))?,
        None => EvoConfig::default(),
    };

    match cli.command {
        Command::Render {
            size,
            samples,
            out_dir,
            expr,
        } => {
            if let Some(size) = size {
                config.render.size = size;
            }
            if let Some(samples) = samples {
                config.render.samples = samples;
            }
            config.validate()?;
            let programs = match expr {
                Some(expr) => vec![expr],
                None => read_lines()?,
            };
            render_programs(&config, &programs, &out_dir)
        }
        Command::Random {
            count,
            nodes,
            seed,
            render,
            out_dir,
        } => {
            if let Some(nodes) = nodes {
                config.generator.num_nodes = nodes;
            }
            config.validate()?;
            let mut rng = seeded_rng(seed);
            let generator = Generator::new(config.generator.clone());
            let renderer = Renderer::new(config.render.clone());
            for n in 1..=count {
                let circuit = generator.random_circuit(&mut rng)?;
                println!("{}", circuit);
                if render {
                    save_png(&renderer.render(&circuit)?, &image_path(&out_dir, n))?;
                }
            }
            Ok(())
        }
        Command::Mutants { count, nodes, seed } => {
            if let Some(nodes) = nodes {
                config.generator.num_nodes = nodes;
            }
            config.validate()?;
            let mut rng = seeded_rng(seed);
            let parent = Generator::new(config.generator.clone()).random_circuit(&mut rng)?;
            println!("{}", parent);
            let mutator = Mutator::new(config.mutation.clone());
            for child in mutator.mutants(&parent, count, &mut rng)? {
                println!("{}", child);
            }
            Ok(())
        }
        Command::Graph { json } => {
            for line in read_lines()? {
                let circuit = match Circuit::read(&line) {
                    Ok(circuit) => circuit,
                    Err(e) => {
                        error!("ERROR: {}", e);
                        continue;
                    }
                };
                let graph = circuit.export_graph();
                if json {
                    println!("{}", graph.to_json()?);
                } else {
                    print!("{}", graph.to_dot());
                }
            }
            Ok(())
        }
    }
}

fn render_programs(config: &EvoConfig, programs: &[String], out_dir: &Path) -> Result<()> {
    let renderer = Renderer::new(config.render.clone());
    for (i, text) in programs.iter().enumerate() {
        let circuit = Circuit::read(text).with_context(|| format!("cannot read '{}'", text))?;
        println!("{}", circuit);
        let path = image_path(out_dir, i + 1);
        save_png(&renderer.render(&circuit)?, &path)?;
        info!(path = %path.display(), "image written");
    }
    Ok(())
}

/// Non-empty stdin lines
fn read_lines() -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    let seed = seed.unwrap_or_else(rand::random);
    info!(seed, "random seed");
    ChaCha8Rng::seed_from_u64(seed)
}

fn image_path(dir: &Path, n: usize) -> PathBuf {
    dir.join(format!("img{:04}.png", n))
}

fn save_png(grid: &PixelGrid, path: &Path) -> Result<()> {
    let width = u32::try_from(grid.width)?;
    let height = u32::try_from(grid.height)?;
    let image = image::RgbImage::from_raw(width, height, grid.to_raw())
        .context("pixel buffer does not match image size")?;
    image
        .save(path)
        .with_context(|| format!("cannot write '{}'", path.display()))
}
