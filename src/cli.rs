// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanner operations
//!
//! This module provides command-line functionality for:
//! - Listing available capture devices
//! - Headless scanning with results printed to stdout
//! - Launching the terminal view

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use scancam::backends::file::FileBackend;
use scancam::backends::manager::CaptureSessionManager;
use scancam::backends::synthetic::SyntheticBackend;
use scancam::backends::CaptureBackend;
use scancam::constants::timing;
use scancam::registry::{NoopSink, ResultSink};
use scancam::{Config, QrDetector, Scanner};

/// Capture source selection shared by all subcommands
#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// Stream the images of a directory instead of the synthetic source
    #[arg(long, value_name = "DIR")]
    pub images: Option<PathBuf>,

    /// Number of virtual devices for the synthetic source
    #[arg(long, default_value_t = 2)]
    pub cameras: usize,

    /// Source frame rate (overrides the configured value)
    #[arg(long)]
    pub fps: Option<u32>,
}

impl Default for SourceArgs {
    fn default() -> Self {
        Self {
            images: None,
            cameras: 2,
            fps: None,
        }
    }
}

fn build_backend(args: &SourceArgs, config: &Config) -> Box<dyn CaptureBackend> {
    let fps = args.fps.unwrap_or(config.source_fps);
    match &args.images {
        Some(dir) => Box::new(FileBackend::new(dir).with_fps(fps)),
        None => Box::new(SyntheticBackend::new(args.cameras).with_fps(fps)),
    }
}

/// List all available capture devices
pub fn list_devices(args: &SourceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let mut manager = CaptureSessionManager::new(build_backend(args, &config), config.device_policy);

    manager.enumerate_devices()?;

    // Labels are withheld until a stream has been granted; a short
    // acquire/release round makes them available
    if manager.devices().iter().all(|d| d.label.is_empty()) && !manager.devices().is_empty() {
        if manager.acquire(None).is_ok() {
            manager.release();
        }
        manager.enumerate_devices()?;
    }

    let devices = manager.devices();
    if devices.is_empty() {
        println!("No capture devices found.");
        return Ok(());
    }

    println!("Available capture devices:");
    println!();
    for (index, device) in devices.iter().enumerate() {
        println!("  [{}] {} ({})", index, device.display_name(index), device.id);
    }

    Ok(())
}

/// Sink printing newly discovered codes as they appear
struct StdoutSink;

impl ResultSink for StdoutSink {
    fn on_added(&mut self, value: &str, format: &str) {
        println!("{} ({})", value, format);
    }
}

/// Scan headlessly until Ctrl+C or the optional duration elapses, then
/// print the full list
pub fn run_scan(
    args: &SourceArgs,
    duration: Option<u64>,
    interval_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load();
    if let Some(ms) = interval_ms {
        config.detection_interval_ms = ms;
        config = config.sanitized();
    }

    let manager = CaptureSessionManager::new(build_backend(args, &config), config.device_policy);
    let mut scanner = Scanner::new(
        manager,
        Arc::new(QrDetector::new()),
        &config,
        Box::new(StdoutSink),
    );

    // Release the capture session on Ctrl+C via the loop's stop flag
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        stop_flag.store(true, Ordering::SeqCst);
    })?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        scanner.start()?;
        println!("Scanning... (press Ctrl+C to stop)");

        let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
        loop {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            if let Some(deadline) = deadline
                && Instant::now() >= deadline
            {
                break;
            }
            scanner.tick(Instant::now());
            tokio::time::sleep(timing::RENDER_TICK).await;
        }
        Ok::<(), scancam::ScanError>(())
    })?;

    scanner.shutdown();

    println!();
    if scanner.registry().is_empty() {
        println!("No codes scanned.");
    } else {
        println!("{} codes scanned:", scanner.registry().len());
        println!("{}", scanner.export_text());
    }

    Ok(())
}

/// Launch the terminal view
pub fn run_tui(args: &SourceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let manager = CaptureSessionManager::new(build_backend(args, &config), config.device_policy);
    let scanner = Scanner::new(
        manager,
        Arc::new(QrDetector::new()),
        &config,
        Box::new(NoopSink),
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { scancam::terminal::run(scanner) })
}
