//! Damage-assessment post-processing CLI
//!
//! **Usage:**
//! ```bash
//! damage-assess --config workspace.toml <normalize|threshold|clean|grid|accuracy|damage|all>
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use damage_assess::{Pipeline, WorkspaceConfig};
use std::path::PathBuf;

/// Post-processing of GLCM texture damage maps
#[derive(Parser, Debug)]
#[clap(name = "damage-assess")]
#[clap(about = "Normalize, threshold, clean and validate texture-based damage maps")]
struct Args {
    /// Workspace configuration (TOML)
    #[clap(long, short, env = "DAMAGE_ASSESS_CONFIG", value_name = "FILE")]
    config: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clip rasters to the AOI and min-max normalize them
    Normalize,
    /// Reclassify normalized rasters into binary damage masks
    Threshold,
    /// Remove isolated damage pixels
    Clean,
    /// Create the random validation grid
    Grid,
    /// Score damage masks against the validation grid
    Accuracy,
    /// Intersect damage with building footprints and camps
    Damage,
    /// Run every stage in order
    All,
}

fn run_accuracy(pipeline: &Pipeline) -> Result<()> {
    let results = pipeline
        .assess_accuracy()
        .context("Accuracy assessment failed")?;
    for result in &results {
        println!("\n{}", result);
    }
    Ok(())
}

fn run_damage(pipeline: &Pipeline) -> Result<()> {
    let counts = pipeline.assess_damage().context("Damage assessment failed")?;
    for entry in &counts {
        println!("{}: {} damaged buildings", entry.camp, entry.damaged_buildings);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = WorkspaceConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let pipeline = Pipeline::new(&config);

    match args.command {
        Command::Normalize => {
            pipeline.normalize_all().context("Normalization failed")?;
            log::info!("Clipping and normalization completed for all rasters.");
        }
        Command::Threshold => {
            pipeline.threshold_all().context("Thresholding failed")?;
            log::info!("Reclassification and binarization completed for all rasters.");
        }
        Command::Clean => {
            let (_, stats) = pipeline.clean().context("Cleaning failed")?;
            println!(
                "Removed {} isolated components ({} pixels)",
                stats.removed_components, stats.removed_pixels
            );
        }
        Command::Grid => {
            let (path, count) = pipeline.generate_grid().context("Grid generation failed")?;
            println!("Selected {} cells into {}", count, path.display());
        }
        Command::Accuracy => run_accuracy(&pipeline)?,
        Command::Damage => run_damage(&pipeline)?,
        Command::All => {
            pipeline.normalize_all().context("Normalization failed")?;
            pipeline.threshold_all().context("Thresholding failed")?;
            pipeline.clean().context("Cleaning failed")?;
            pipeline.generate_grid().context("Grid generation failed")?;
            run_accuracy(&pipeline)?;
            run_damage(&pipeline)?;
        }
    }

    Ok(())
}
