// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "scancam")]
#[command(about = "Continuous code scanner for live video feeds")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive terminal view (default)
    Tui {
        #[command(flatten)]
        source: cli::SourceArgs,
    },

    /// Scan headlessly, printing codes as they are discovered
    Scan {
        #[command(flatten)]
        source: cli::SourceArgs,

        /// Stop after this many seconds (default: run until Ctrl+C)
        #[arg(short, long)]
        duration: Option<u64>,

        /// Minimum interval between recognition calls in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// List available capture devices
    List {
        #[command(flatten)]
        source: cli::SourceArgs,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=scancam=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli_args = Cli::parse();

    match cli_args.command {
        Some(Commands::Tui { source }) => cli::run_tui(&source),
        Some(Commands::Scan {
            source,
            duration,
            interval_ms,
        }) => cli::run_scan(&source, duration, interval_ms),
        Some(Commands::List { source }) => cli::list_devices(&source),
        None => cli::run_tui(&cli::SourceArgs::default()),
    }
}
