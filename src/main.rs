//! Stack Stitcher - view numbered image files as one 5D stack.
//!
//! This binary wires the pattern engine and the stitcher into a small
//! inspection CLI.

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::error;

use stack_stitcher::{
    config::{Cli, Command, ExpandConfig, InferConfig, InfoConfig},
    find_pattern_for, find_series_patterns, FakeReaderSource, FilePattern, FileStitcher,
    PlaneReader, StitchOptions,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Infer(config) => run_infer(config),
        Command::Expand(config) => run_expand(config),
        Command::Info(config) => run_info(config),
    }
}

// =============================================================================
// Infer Command
// =============================================================================

fn run_infer(config: InferConfig) -> ExitCode {
    init_logging(config.verbose);

    if config.series_split {
        let patterns = find_series_patterns(&config.file);
        if patterns.is_empty() {
            eprintln!("No pattern found for {}", config.file.display());
            return ExitCode::FAILURE;
        }
        for pattern in patterns {
            println!("{pattern}");
        }
        return ExitCode::SUCCESS;
    }

    match find_pattern_for(&config.file) {
        Some(pattern) => {
            println!("{pattern}");
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("No pattern found for {}", config.file.display());
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Expand Command
// =============================================================================

#[derive(serde::Serialize)]
struct ExpandReport<'a> {
    pattern: &'a str,
    valid: bool,
    error: Option<&'a str>,
    regex: bool,
    blocks: Vec<&'a str>,
    files: &'a [String],
}

fn run_expand(config: ExpandConfig) -> ExitCode {
    init_logging(config.verbose);

    let fp = FilePattern::new(&config.pattern);

    if config.json {
        let report = ExpandReport {
            pattern: fp.pattern(),
            valid: fp.is_valid(),
            error: fp.error(),
            regex: fp.is_regex(),
            blocks: fp.blocks().iter().map(|b| b.text()).collect(),
            files: fp.files(),
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return if fp.is_valid() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    if !fp.is_valid() {
        eprintln!(
            "Invalid pattern: {}",
            fp.error().unwrap_or("unknown parse failure")
        );
        return ExitCode::FAILURE;
    }

    println!("Pattern: {}", fp.pattern());
    if fp.is_regex() {
        println!("  (interpreted as a regular expression)");
    }
    println!("Files ({}):", fp.files().len());
    for (i, file) in fp.files().iter().enumerate() {
        println!("  #{i}: {file}");
    }
    ExitCode::SUCCESS
}

// =============================================================================
// Info Command
// =============================================================================

#[derive(serde::Serialize)]
struct SeriesReport {
    series: usize,
    size_x: u32,
    size_y: u32,
    size_z: u32,
    size_c: u32,
    size_t: u32,
    image_count: u32,
    planes_per_file: u32,
    pixel_type: &'static str,
    dimension_order: String,
    order_certain: bool,
    rgb_channel_count: u32,
    axis_types: Vec<String>,
    files: Vec<String>,
    routing: Option<Vec<PlaneRoute>>,
}

#[derive(serde::Serialize)]
struct PlaneRoute {
    plane: u32,
    file: String,
    local_plane: Option<u32>,
}

fn run_info(config: InfoConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let options = StitchOptions {
        pattern_ids: config.pattern_id,
        group: !config.no_group,
        max_readers: config.max_readers,
        ..StitchOptions::default()
    };
    let mut stitcher = FileStitcher::with_options(FakeReaderSource, options);

    if let Err(e) = stitcher.set_id(&config.id) {
        error!("Failed to open {}: {}", config.id, e);
        return ExitCode::FAILURE;
    }

    let mut reports = Vec::new();
    for series in 0..stitcher.series_count() {
        stitcher.set_series(series);
        match series_report(&mut stitcher, series, config.routing) {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("Failed to inspect series {}: {}", series, e);
                return ExitCode::FAILURE;
            }
        }
    }

    if config.json {
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    println!("Id: {}", config.id);
    println!(
        "Stitching: {}",
        if stitcher.is_stitching() {
            "active"
        } else {
            "bypassed"
        }
    );
    for report in &reports {
        println!();
        println!("Series #{}", report.series);
        println!("  Plane size: {} x {}", report.size_x, report.size_y);
        println!(
            "  Z x C x T: {} x {} x {} ({} planes, {} per file)",
            report.size_z, report.size_c, report.size_t, report.image_count,
            report.planes_per_file
        );
        println!("  Pixel type: {}", report.pixel_type);
        println!(
            "  Dimension order: {}{}",
            report.dimension_order,
            if report.order_certain { "" } else { " (uncertain)" }
        );
        if !report.axis_types.is_empty() {
            println!("  Block axes: {}", report.axis_types.join(", "));
        }
        println!("  Files ({}):", report.files.len());
        for file in &report.files {
            println!("    {}", display_name(file));
        }
        if let Some(ref routing) = report.routing {
            println!("  Routing:");
            for route in routing {
                match route.local_plane {
                    Some(local) => println!(
                        "    plane {:>4} -> {} [{}]",
                        route.plane,
                        display_name(&route.file),
                        local
                    ),
                    None => println!(
                        "    plane {:>4} -> {} [blank]",
                        route.plane,
                        display_name(&route.file)
                    ),
                }
            }
        }
    }
    ExitCode::SUCCESS
}

fn series_report(
    stitcher: &mut FileStitcher<FakeReaderSource>,
    series: usize,
    with_routing: bool,
) -> Result<SeriesReport, stack_stitcher::StitchError> {
    let files = stitcher.series_files();
    let axis_types = if stitcher.is_stitching() {
        stitcher
            .axis_types()
            .iter()
            .map(|a| a.to_string())
            .collect()
    } else {
        Vec::new()
    };

    let routing = if with_routing {
        let mut routes = Vec::new();
        for plane in 0..stitcher.image_count() {
            let (fno, local) = stitcher.compute_indices(plane)?;
            routes.push(PlaneRoute {
                plane,
                file: files.get(fno).cloned().unwrap_or_default(),
                local_plane: local,
            });
        }
        Some(routes)
    } else {
        None
    };

    Ok(SeriesReport {
        series,
        size_x: stitcher.size_x(),
        size_y: stitcher.size_y(),
        size_z: stitcher.size_z(),
        size_c: stitcher.size_c(),
        size_t: stitcher.size_t(),
        image_count: stitcher.image_count(),
        planes_per_file: stitcher.images_per_file(),
        pixel_type: stitcher.pixel_type().name(),
        dimension_order: stitcher.dimension_order().to_string(),
        order_certain: stitcher.order_certain(),
        rgb_channel_count: stitcher.rgb_channel_count(),
        axis_types,
        files,
        routing,
    })
}

fn display_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

// =============================================================================
// Logging
// =============================================================================

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "stack_stitcher=debug"
    } else {
        "stack_stitcher=info"
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
