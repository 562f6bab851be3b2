//! meshlink-bench: CLI tool for link resolution experiments and diagnostics.
//!
//! Reads a JSON link bundle (or generates a synthetic one) and runs the
//! 1D-2D link import with configurable parameters, printing per-stage
//! diagnostics. Useful for:
//!
//! - Comparing spatial index backends (`quadtree` vs `rtree`)
//! - Tuning query windows and quadtree depth
//! - Measuring how resolution scales with worker threads
//! - Checking how many links fall back to chainage or centroids
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin meshlink-bench -- [OPTIONS] [BUNDLE_PATH]
//! cargo run --release --bin meshlink-bench -- --synthetic 100000 --runs 5
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod bundle;
mod synthetic;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use meshlink_engine::diagnostics::{Clock, ReadDiagnostics};
use meshlink_engine::{Diagnostic, DiagnosticSink, Link, ResolveConfig, SpatialIndexKind};
use tracing_subscriber::EnvFilter;

use crate::bundle::LinkBundle;
use crate::synthetic::SyntheticOptions;

/// Link resolution experiments and diagnostics for meshlink.
///
/// Resolves the 1D-2D links of a bundle against its runtime model and
/// prints per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "meshlink-bench", version)]
struct Cli {
    /// Path to a JSON link bundle. Required unless `--synthetic` is given.
    bundle_path: Option<PathBuf>,

    /// Generate a synthetic bundle with this many links instead.
    #[arg(long, conflicts_with = "bundle_path", value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    synthetic: Option<usize>,

    /// Zero the synthetic file coordinates to exercise the fallbacks.
    #[arg(long, requires = "synthetic")]
    zero_coordinates: bool,

    /// Seed for the synthetic runtime numbering.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Spatial index backend.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_INDEX)]
    index: Index,

    /// Half-width of the square searched around a 1D node.
    #[arg(long, default_value_t = ResolveConfig::DEFAULT_QUERY_HALF_WIDTH_1D)]
    query_half_width_1d: f64,

    /// Half-width of the square searched around a 2D face.
    #[arg(long, default_value_t = ResolveConfig::DEFAULT_QUERY_HALF_WIDTH_2D)]
    query_half_width_2d: f64,

    /// Margin added around the 1D index envelope.
    #[arg(long, default_value_t = ResolveConfig::DEFAULT_ENVELOPE_MARGIN_1D)]
    envelope_margin_1d: f64,

    /// Quadtree depth scale (depth = max(1, floor(log2(count) * scale))).
    #[arg(long, default_value_t = ResolveConfig::DEFAULT_DEPTH_SCALE)]
    depth_scale: f64,

    /// Worker threads for resolution (0 = all available cores).
    #[arg(long, default_value_t = ResolveConfig::DEFAULT_MAX_PARALLELISM)]
    threads: usize,

    /// Write the resolved links of the first run as JSON.
    #[arg(long)]
    links_out: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full resolve config as a JSON string.
    ///
    /// When provided, all other resolve parameter flags are ignored.
    /// The JSON must be a valid `ResolveConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Spatial index backend selection.
#[derive(Clone, Copy, ValueEnum)]
enum Index {
    /// Region quadtree with a count-derived depth.
    Quadtree,
    /// Bulk-loaded R*-tree.
    Rtree,
}

/// Maps a [`SpatialIndexKind`] to the local CLI [`Index`] enum.
const fn index_from_engine(kind: SpatialIndexKind) -> Index {
    match kind {
        SpatialIndexKind::QuadTree => Index::Quadtree,
        SpatialIndexKind::RTree => Index::Rtree,
    }
}

/// The CLI default backend, derived from [`ResolveConfig::DEFAULT_SPATIAL_INDEX`].
const CLI_DEFAULT_INDEX: Index = index_from_engine(ResolveConfig::DEFAULT_SPATIAL_INDEX);

/// Build a [`ResolveConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<ResolveConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(ResolveConfig {
        spatial_index: match cli.index {
            Index::Quadtree => SpatialIndexKind::QuadTree,
            Index::Rtree => SpatialIndexKind::RTree,
        },
        envelope_margin_1d: cli.envelope_margin_1d,
        query_half_width_1d: cli.query_half_width_1d,
        query_half_width_2d: cli.query_half_width_2d,
        depth_scale: cli.depth_scale,
        max_parallelism: cli.threads,
        ..ResolveConfig::default()
    })
}

fn load_bundle(cli: &Cli) -> Result<LinkBundle, String> {
    if let Some(size) = cli.synthetic {
        return Ok(synthetic::generate(SyntheticOptions {
            size,
            zero_coordinates: cli.zero_coordinates,
            seed: cli.seed,
        }));
    }
    match cli.bundle_path {
        Some(ref path) => LinkBundle::load(path),
        None => Err("Either a bundle path or --synthetic is required".to_string()),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let bundle = match load_bundle(&cli) {
        Ok(b) => b,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Bundle: {} links, {} calculation points, {} cells",
        bundle.links.len(),
        bundle.discretization.len(),
        bundle.grid.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let import = bundle.import();
    let mut all_diagnostics = Vec::with_capacity(cli.runs);
    let mut links: Vec<Link> = Vec::with_capacity(bundle.links.len());

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        // Only the first run reports its diagnostics through tracing.
        let mut collected: Vec<Diagnostic> = Vec::new();
        let mut tracing_sink = meshlink_engine::TracingSink;
        let sink: &mut dyn DiagnosticSink = if run == 0 {
            &mut tracing_sink
        } else {
            &mut collected
        };

        match meshlink_engine::read_links_with_diagnostics(
            &import, &config, &mut links, sink, &StdClock,
        ) {
            Ok(diagnostics) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                if run > 0 {
                    eprintln!("Diagnostics: {}", collected.len());
                } else {
                    if cli.synthetic.is_some() {
                        let mismatches = synthetic::count_mismatches(&bundle, &links);
                        eprintln!("Misplaced 1D endpoints: {mismatches}");
                    }
                    if let Some(ref path) = cli.links_out {
                        write_links(path, &links);
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Link import error: {e}");
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

fn write_links(path: &std::path::Path, links: &[Link]) {
    let json = match serde_json::to_string_pretty(links) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing links: {e}");
            return;
        }
    };
    match std::fs::write(path, &json) {
        Ok(()) => eprintln!(
            "Links written to {} ({} bytes)",
            path.display(),
            json.len()
        ),
        Err(e) => eprintln!("Error writing links to {}: {e}", path.display()),
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

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&ReadDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[ReadDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Validate", |d| d.validate.duration),
        ("Build 1D Index", |d| d.build_mesh1d.duration),
        ("Build 2D Index", |d| d.build_mesh2d.duration),
        ("Resolve", |d| d.resolve.duration),
        ("Assemble", |d| d.assemble.duration),
        ("Validate Sources", |d| d.validate_sources.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
