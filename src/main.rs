//! Image-Harvest main entry point
//!
//! This is the command-line interface for the Image-Harvest batch downloader.

use anyhow::Context;
use clap::Parser;
use image_harvest::archive::BatchLimits;
use image_harvest::config::{load_config_with_hash, Config};
use image_harvest::harvest::{
    build_http_client, estimate_sizes, extension_distribution, print_estimate, Coordinator,
    Progress,
};
use image_harvest::input::{read_csv, ExtractedSheet};
use image_harvest::output::{export_report, print_summary, uploads_path};
use image_harvest::{build_jobs, RunControl};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Image-Harvest: a batch image downloader and archiver
///
/// Image-Harvest reads a sheet of product codes and image links, downloads
/// the images under per-host limits, packs them into size-bounded zip
/// archives and writes a per-link report.
///
/// While a run is active, type `pause`, `resume` or `cancel` (or `p`, `r`,
/// `c`) followed by Enter. Ctrl-C cancels.
#[derive(Parser, Debug)]
#[command(name = "image-harvest")]
#[command(version)]
#[command(about = "A batch image downloader and archiver", long_about = None)]
struct Cli {
    /// CSV sheet with product codes and image links
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Path to TOML configuration file (defaults are used without one)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show what would be downloaded without touching the network
    #[arg(long, conflicts_with = "estimate")]
    dry_run: bool,

    /// Estimate download and archive sizes with HEAD requests, then exit
    #[arg(long, conflicts_with = "dry_run")]
    estimate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    let sheet = read_csv(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    tracing::info!(
        "Read {} products with links ({} rows, {} links)",
        sheet.records.len(),
        sheet.total_rows,
        sheet.total_links()
    );

    if cli.dry_run {
        handle_dry_run(&config, &sheet);
    } else if cli.estimate {
        handle_estimate(&config, &sheet).await?;
    } else {
        handle_harvest(config, sheet).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("image_harvest=info,warn"),
            1 => EnvFilter::new("image_harvest=debug,info"),
            2 => EnvFilter::new("image_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows configuration and what would be fetched
fn handle_dry_run(config: &Config, sheet: &ExtractedSheet) {
    println!("=== Image-Harvest Dry Run ===\n");

    println!("Download:");
    println!("  Pool size: {}", config.download.pool_size);
    println!("  Per-host limit: {}", config.download.per_host_limit);
    println!("  Retry attempts: {}", config.download.retry_attempts);
    println!("  Timeout: {}ms", config.download.timeout_ms);
    println!("  Require image: {}", config.download.require_image);

    println!("\nArchives:");
    println!("  Output dir: {}", config.archive.output_dir);
    println!(
        "  Limits: {} files / {} MB",
        config.archive.max_files, config.archive.max_megabytes
    );
    println!("  Naming: {}", config.archive.naming_pattern);

    println!("\nHosts:");
    println!("  Allow ({}): {}", config.hosts.allow.len(), config.hosts.allow.join(", "));
    println!("  Deny ({}): {}", config.hosts.deny.len(), config.hosts.deny.join(", "));

    let jobs = build_jobs(
        &sheet.records,
        config.download.max_per_product,
        &config.hosts,
    );
    let coverage = if sheet.total_rows > 0 {
        sheet.records.len() as f64 / sheet.total_rows as f64 * 100.0
    } else {
        0.0
    };

    println!("\nSheet:");
    println!("  Rows: {}", sheet.total_rows);
    println!("  Products with links: {} ({:.0}%)", sheet.records.len(), coverage);
    println!("  Links: {}", sheet.total_links());
    println!("  Jobs after filters: {}", jobs.len());
    println!(
        "  Parts by count: {}",
        jobs.len().div_ceil(config.archive.max_files.max(1))
    );

    println!("\nExtensions:");
    for (ext, count) in extension_distribution(&sheet.records).iter().take(8) {
        println!("  {}: {}", ext, count);
    }

    if let Some(upload) = &config.upload {
        println!("\nUpload:");
        println!("  Endpoint: {}", upload.endpoint);
        println!("  Mode: {:?}", upload.mode);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would download {} images", jobs.len());
}

/// Handles the --estimate mode: HEAD-requests every job's URL
async fn handle_estimate(config: &Config, sheet: &ExtractedSheet) -> anyhow::Result<()> {
    let jobs = build_jobs(
        &sheet.records,
        config.download.max_per_product,
        &config.hosts,
    );
    let client = build_http_client(&config.download.user_agent)?;
    let limits = BatchLimits {
        max_files: config.archive.max_files,
        max_bytes: config.archive.max_bytes(),
    };

    tracing::info!("Estimating sizes of {} links", jobs.len());
    let estimate = estimate_sizes(
        &client,
        jobs.into_iter().map(|j| j.url).collect(),
        config.download.pool_size,
        limits,
        Duration::from_millis(config.download.timeout_ms),
    )
    .await;

    print_estimate(&estimate);
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, sheet: ExtractedSheet) -> anyhow::Result<()> {
    let report_cfg = config.report.clone();
    let coordinator = Coordinator::new(config, sheet.records);

    spawn_control_listeners(coordinator.control());
    spawn_progress_logger(coordinator.subscribe_progress());

    let report = match coordinator.run().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };

    let format = report_cfg.format;
    export_report(Path::new(&report_cfg.path), &report.rows, format, false)?;
    export_report(
        Path::new(&report_cfg.failures_path),
        &report.failures(),
        format,
        false,
    )?;
    if !report.uploads.is_empty() {
        let path = uploads_path(Path::new(&report_cfg.path));
        export_report(&path, &report.uploads, format, true)?;
    }

    println!();
    print_summary(&report.summary, &report.archives);
    Ok(())
}

/// Wires Ctrl-C and stdin commands to the run control
fn spawn_control_listeners(control: RunControl) {
    let on_ctrl_c = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling after in-flight jobs");
            on_ctrl_c.cancel();
        }
    });

    // A plain thread: a blocked stdin read must not hold up runtime shutdown
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match line.trim().to_ascii_lowercase().as_str() {
                "pause" | "p" => {
                    control.pause();
                }
                "resume" | "r" => {
                    control.resume();
                }
                "cancel" | "c" => {
                    control.cancel();
                    break;
                }
                "" => {}
                other => tracing::warn!("Unknown command '{}' (pause, resume, cancel)", other),
            }
        }
    });
}

/// Logs each new status message at debug level
fn spawn_progress_logger(mut rx: watch::Receiver<Progress>) {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let progress = rx.borrow_and_update().clone();
            if progress.total > 0 {
                tracing::debug!(
                    "[{}/{} {:.0}%] {}",
                    progress.completed,
                    progress.total,
                    progress.percent(),
                    progress.message
                );
            }
        }
    });
}
