use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use thermalign::{Colormap, Pipeline, PipelineConfig};

/// Pairs thermal grids with visible images by capture time and warps each
/// thermal frame onto its visible partner.
#[derive(Parser, Debug)]
#[command(name = "thermalign", version)]
struct Args {
    /// YAML or JSON run configuration; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of visible-sensor images
    #[arg(long)]
    primary_dir: Option<PathBuf>,

    /// Directory of thermal-sensor grids
    #[arg(long)]
    secondary_dir: Option<PathBuf>,

    /// Directory for aligned images, created if absent
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Largest accepted capture time difference in minutes
    #[arg(long)]
    time_window: Option<u32>,

    /// Best matches used for the homography fit
    #[arg(long)]
    max_correspondences: Option<usize>,

    /// Inlier reprojection threshold in pixels
    #[arg(long)]
    inlier_threshold: Option<f64>,

    /// Write a `primary;secondary` line per resolved pair to this file
    #[arg(long)]
    pairs_report: Option<PathBuf>,

    /// Thermal colormap: jet or thermal_ramp
    #[arg(long)]
    colormap: Option<Colormap>,

    /// Pairs aligned at once, 0 for one per core
    #[arg(long)]
    jobs: Option<usize>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write daily rolling log files here
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(dir) = self.primary_dir {
            config.primary_dir = dir;
        }
        if let Some(dir) = self.secondary_dir {
            config.secondary_dir = dir;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(minutes) = self.time_window {
            config.time_window_minutes = minutes;
        }
        if let Some(limit) = self.max_correspondences {
            config.max_correspondences = limit;
        }
        if let Some(threshold) = self.inlier_threshold {
            config.inlier_threshold = threshold;
        }
        if let Some(path) = self.pairs_report {
            config.pairs_report = Some(path);
        }
        if let Some(colormap) = self.colormap {
            config.colormap = colormap;
        }
        if let Some(jobs) = self.jobs {
            config.max_concurrent = jobs;
        }

        Ok(config)
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    common::log_setup::setup_logging(&args.log_level, args.log_dir.as_deref())
        .context("Failed to set up logging")?;

    let print_config = args.print_config;
    let config = args.into_config()?;
    if print_config {
        let text = common::serialize(&config, common::FileFormat::Yaml)
            .context("Failed to serialize configuration")?;
        print!("{text}");
        return Ok(());
    }

    let report = Pipeline::new(config).run()?;
    println!("{}", report.summary);
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
