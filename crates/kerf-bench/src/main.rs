//! kerf-bench: CLI tool for shape parameter experimentation and diagnostics.
//!
//! Runs the piece-generation pipeline on a scene file with configurable
//! parameters, printing detailed per-stage diagnostics. Useful for:
//!
//! - Tuning gap, corner rounding and noise against a real silhouette
//! - Measuring per-stage durations to identify bottlenecks
//! - Understanding how parameter changes affect piece and point counts
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin kerf-bench -- [OPTIONS] <SCENE_JSON>
//! ```
//!
//! The scene file holds the mask outline, the spines and the connectors:
//!
//! ```json
//! {
//!   "mask": [{"x": 0, "y": 0}, {"x": 600, "y": 0}, {"x": 600, "y": 800}],
//!   "spines": [{"id": 1, "start": {"x": 300, "y": 100}, "end": {"x": 300, "y": 700}}],
//!   "connectors": []
//! }
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use kerf_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use kerf_pipeline::{
    Dimensions, GenerateRequest, LineSegment, MaskPolygon, PipelineConfig, ShapeConfig,
    StagedResult,
};
use serde::Deserialize;

/// Shape parameter experimentation and diagnostics for kerf.
///
/// Runs the piece-generation pipeline on a scene file with configurable
/// parameters and prints detailed per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "kerf-bench", version)]
struct Cli {
    /// Path to the scene JSON file.
    scene_path: PathBuf,

    /// Total spacing between adjacent pieces, in canvas units.
    #[arg(long, default_value_t = ShapeConfig::default().gap)]
    gap: f64,

    /// Corner-rounding radius, in canvas units.
    #[arg(long, default_value_t = ShapeConfig::default().round)]
    round: f64,

    /// Peak edge displacement of the organic noise (0 disables it).
    #[arg(long, default_value_t = ShapeConfig::default().noise_amplitude)]
    noise_amplitude: f64,

    /// Seed of the organic noise field.
    #[arg(long, default_value_t = ShapeConfig::default().noise_seed)]
    noise_seed: u32,

    /// Spine sampling interval, in canvas units.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SPACING)]
    spacing: f64,

    /// Raster width in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_WIDTH, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    width: u32,

    /// Raster height in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_HEIGHT, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    height: u32,

    /// Width of the grout lines between regions.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_STROKE_WIDTH)]
    stroke_width: f32,

    /// RDP simplification tolerance in canvas units.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SIMPLIFY_TOLERANCE)]
    simplify_tolerance: f64,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Write SVG markup of pieces and connectors to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Write the final kept mask as a PNG.
    #[arg(long)]
    png: Option<PathBuf>,
}

/// Contents of a scene file.
#[derive(Debug, Deserialize)]
struct Scene {
    #[serde(default)]
    mask: MaskPolygon,
    #[serde(default)]
    spines: Vec<LineSegment>,
    #[serde(default)]
    connectors: Vec<LineSegment>,
}

/// Build the static [`PipelineConfig`] from CLI arguments.
fn config_from_cli(cli: &Cli) -> PipelineConfig {
    PipelineConfig {
        canvas: Dimensions {
            width: cli.width,
            height: cli.height,
        },
        spacing: cli.spacing,
        stroke_width: cli.stroke_width,
        simplify_tolerance: cli.simplify_tolerance,
        ..PipelineConfig::default()
    }
}

/// Build the per-run request from the scene and the shape flags.
fn request_from_cli(cli: &Cli, scene: Scene) -> GenerateRequest {
    GenerateRequest {
        mask: scene.mask,
        spines: scene.spines,
        connectors: scene.connectors,
        config: ShapeConfig {
            gap: cli.gap,
            round: cli.round,
            noise_amplitude: cli.noise_amplitude,
            noise_seed: cli.noise_seed,
        },
        spacing: Some(cli.spacing),
        ..GenerateRequest::new(0)
    }
}

fn read_scene(path: &Path) -> Result<Scene, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("Error parsing {}: {e}", path.display()))
}

/// Install a stderr `tracing` subscriber honouring `RUST_LOG`.
fn init_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let config = config_from_cli(&cli);
    let scene = match read_scene(&cli.scene_path) {
        Ok(scene) => scene,
        Err(msg) => {
            tracing::error!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let request = request_from_cli(&cli, scene);

    tracing::info!(
        scene = %cli.scene_path.display(),
        spines = request.spines.len(),
        connectors = request.connectors.len(),
        runs = cli.runs,
        "loaded scene"
    );
    tracing::debug!(?config, shape = ?request.config, "configuration");

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match kerf_pipeline::process_staged_with_diagnostics(&request, &config, &StdClock) {
            Ok((staged, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            tracing::error!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Previews from the first run only.
                if run == 0 {
                    if let Some(ref svg_path) = cli.svg {
                        write_svg(&cli, &request, &staged, svg_path);
                    }
                    if let Some(ref png_path) = cli.png {
                        write_png(&staged, png_path);
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                tracing::error!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

fn write_svg(cli: &Cli, request: &GenerateRequest, staged: &StagedResult, path: &Path) {
    let title = cli
        .scene_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("bench");
    let desc = format!(
        "gap={} round={} noise_amplitude={} noise_seed={}",
        request.config.gap,
        request.config.round,
        request.config.noise_amplitude,
        request.config.noise_seed,
    );
    let metadata = kerf_export::SvgMetadata {
        title: Some(title),
        description: Some(&desc),
    };
    let svg = match kerf_export::to_svg(
        &staged.pieces,
        &request.connectors,
        staged.dimensions,
        &metadata,
    ) {
        Ok(svg) => svg,
        Err(e) => {
            tracing::error!("Error rendering SVG: {e}");
            return;
        }
    };
    match std::fs::write(path, &svg) {
        Ok(()) => tracing::info!("SVG written to {} ({} bytes)", path.display(), svg.len()),
        Err(e) => tracing::error!("Error writing SVG to {}: {e}", path.display()),
    }
}

fn write_png(staged: &StagedResult, path: &Path) {
    match staged.final_mask.save(path) {
        Ok(()) => tracing::info!("PNG written to {}", path.display()),
        Err(e) => tracing::error!("Error writing PNG to {}: {e}", path.display()),
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let Some(first) = all_diagnostics.first() else {
        println!("Warning: no diagnostics to summarize");
        return;
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for (index, (name, _)) in first.stages().iter().enumerate() {
        let total: f64 = all_diagnostics
            .iter()
            .map(|d| d.stages()[index].1.duration.as_secs_f64() * 1000.0)
            .sum();
        let stage_mean = total / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
