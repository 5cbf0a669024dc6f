//! Marquee CLI - Playback controller diagnostics
//!
//! Features:
//! - URL classification (progressive / HLS / DASH)
//! - Delivery strategy planning under capability assumptions
//! - Dry-run playback simulation against in-memory doubles

use clap::{Parser, Subcommand};

mod commands;
mod output;

/// Marquee CLI - Playback delivery diagnostics
#[derive(Parser)]
#[command(name = "marquee")]
#[command(version)]
#[command(about = "Playback controller diagnostics", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a media URL into its delivery kind
    Classify {
        /// URL of the media file or manifest
        url: String,
    },

    /// Plan the delivery strategy for a URL under capability assumptions
    Plan {
        /// URL of the media file or manifest
        url: String,

        /// Assume the adaptive-streaming engine is unavailable
        #[arg(long)]
        no_engine: bool,

        /// Assume the surface plays HLS manifests natively
        #[arg(long)]
        native_hls: bool,

        /// Assume the surface cannot play DASH manifests natively
        #[arg(long)]
        no_native_dash: bool,
    },

    /// Simulate a full load against in-memory doubles and print the signals
    Simulate {
        /// URL of the media file or manifest
        url: String,

        /// Assume the adaptive-streaming engine is unavailable
        #[arg(long)]
        no_engine: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .init();

    match cli.command {
        Commands::Classify { url } => {
            commands::classify(&url, &cli.format)?;
        }
        Commands::Plan {
            url,
            no_engine,
            native_hls,
            no_native_dash,
        } => {
            commands::plan(&url, !no_engine, native_hls, !no_native_dash, &cli.format)?;
        }
        Commands::Simulate { url, no_engine } => {
            commands::simulate(&url, !no_engine, &cli.format).await?;
        }
    }

    Ok(())
}
