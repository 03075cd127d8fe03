// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! pcbsolid CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use pcbsolid::artwork::{copper_stack, discover_inner_layers};
use pcbsolid::board::{RegionCounts, SOLDER_NAME};
use pcbsolid::config::CONFIG_FILENAME;
use pcbsolid::geometry::analyze;
use pcbsolid::{BoardConfig, BoardGenerator, BoardInputs, BoardModel};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "pcbsolid")]
#[command(about = "Generate layered 3D board models from PCB fabrication data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Fabrication data directory (overrides the configuration)
    #[arg(long, value_name = "DIR")]
    fab_dir: Option<PathBuf>,

    /// Build one mesh per stack-up layer
    #[arg(long)]
    stackup: bool,

    /// Add solder bodies on the pads
    #[arg(long)]
    solder: bool,

    /// Debug output
    #[arg(short, long, alias = "debug")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the board model
    Build {
        /// Write the model as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print geometry statistics of the base layer
        #[arg(long)]
        stats: bool,
    },

    /// Show the parsed stack-up
    Stackup,

    /// Show the layer thickness plan
    Plan {
        /// Number of inner layers (defaults to the discovered artwork)
        #[arg(long)]
        inner: Option<usize>,
    },

    /// Write the default configuration file
    GetConfig {
        #[arg(short, long, default_value = CONFIG_FILENAME)]
        output: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<BoardConfig> {
    let mut config = BoardConfig::load(&cli.config)
        .with_context(|| format!("Configuration stage failed ({})", cli.config.display()))?;
    if let Some(fab_dir) = &cli.fab_dir {
        config.settings.fab_dir = fab_dir.clone();
    }
    if cli.stackup {
        config.effects.stackup = true;
    }
    if cli.solder {
        config.effects.solder = true;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Build { output, stats } => {
            let config = load_config(&cli)?;
            build_command(&config, output.as_deref(), *stats)?;
        }
        Commands::Stackup => {
            let config = load_config(&cli)?;
            stackup_command(&config)?;
        }
        Commands::Plan { inner } => {
            let config = load_config(&cli)?;
            plan_command(&config, *inner)?;
        }
        Commands::GetConfig { output } => {
            BoardConfig::default().save(output)?;
            println!("{} {}", "Wrote default configuration to".green(), output.display());
        }
    }

    Ok(())
}

fn build_command(config: &BoardConfig, output: Option<&Path>, stats: bool) -> Result<()> {
    let start = Instant::now();
    let inputs = BoardInputs::load(config).context("Loading board outlines failed")?;
    let model = BoardGenerator::new(config)
        .generate(inputs)
        .context("Board generation failed")?;
    let elapsed = start.elapsed();

    print_summary(&model);
    println!("  {} {:.2?}", "Generated in".bright_black(), elapsed);

    if stats {
        if let Some(base) = model.layers.first() {
            analyze(&base.mesh).print();
        }
    }

    if let Some(path) = output {
        let json = model.to_json().context("Failed to serialize board model")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write board model: {}", path.display()))?;
        println!("{} {}", "Model written to".green(), path.display());
    }

    Ok(())
}

fn print_summary(model: &BoardModel) {
    let [x, y, z] = model.dimensions();
    println!("\n{}", "━".repeat(60).bright_black());
    println!(
        "{} {:.3} × {:.3} × {:.3} mm",
        "Board:".bold(),
        x,
        y,
        z
    );
    println!("{}", "━".repeat(60).bright_black());

    for layer in &model.layers {
        let volume = analyze(&layer.mesh).volume;
        println!(
            "  {:<12} z={:>7.3}  t={:>6.3}  {:>6} verts  {:>6} faces  {:>10.3} mm³",
            layer.name.cyan(),
            layer.z_offset,
            layer.thickness,
            layer.mesh.vertex_count(),
            layer.mesh.face_count(),
            volume
        );
    }

    if let Some(solder) = &model.solder {
        let stats = analyze(solder);
        println!(
            "  {:<12} z={:>7.3}  t={:>6.3}  {:>6} verts  {:>6} faces  {:>10.3} mm³",
            SOLDER_NAME.cyan(),
            stats.bbox[2],
            stats.bbox[5] - stats.bbox[2],
            solder.vertex_count(),
            solder.face_count(),
            stats.volume
        );
    }

    if let Some(base) = model.layers.first() {
        let RegionCounts {
            top,
            bottom,
            plated_edge,
            bare_edge,
            untagged,
        } = base.region_counts();
        println!(
            "\n  {} top {}  bottom {}  plated edge {}  bare edge {}",
            "Faces:".bold(),
            top,
            bottom,
            plated_edge.to_string().yellow(),
            bare_edge
        );
        if untagged > 0 {
            println!("  {} {}", "Untagged faces:".yellow(), untagged);
        }
    }
}

fn stackup_command(config: &BoardConfig) -> Result<()> {
    let info = BoardGenerator::new(config)
        .stackup()
        .context("Stack-up stage failed")?;

    if info.is_empty() {
        println!(
            "{} {:.3} mm",
            "No stack-up layers; board thickness".yellow(),
            info.total_thickness
        );
        return Ok(());
    }

    println!("{}", "Stack-up:".bold());
    for layer in &info.layers {
        let thickness = layer
            .thickness
            .map(|t| format!("{t:.4}"))
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<24} {:>8}  {}", layer.name.cyan(), thickness, layer.user_name.bright_black());
    }
    println!("{} {:.4} mm", "Total thickness:".bold(), info.total_thickness);
    Ok(())
}

fn plan_command(config: &BoardConfig, inner: Option<usize>) -> Result<()> {
    let images = discover_inner_layers(&config.png_dir(), &config.filenames.inner_prefix);
    let inner = inner.unwrap_or(images.len());
    let plan = BoardGenerator::new(config)
        .plan(inner)
        .context("Layer planning failed")?;

    if config.effects.stackup && inner == images.len() {
        println!("{} {}", "Copper:".bold(), copper_stack(&images).join(", "));
    }
    println!("{}", "Layer plan:".bold());
    for slot in &plan.slots {
        println!(
            "  {:<12} z={:>7.4}  t={:>7.4}",
            slot.layer_name.cyan(),
            slot.z_offset,
            slot.thickness
        );
    }
    println!("{} {:.4} mm", "Total:".bold(), plan.total_thickness());
    Ok(())
}
