mod commands;
mod providers;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eventmap_core::config::EventmapConfig;
use tracing_subscriber::EnvFilter;

/// Per-request timeout for every HTTP call.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "eventmap")]
#[command(about = "Geocode event listings and keep an ArcGIS feature layer in sync with them")]
struct Cli {
    /// Config file (defaults to ~/.config/eventmap/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch events, merge them into the local store and geocode new ones
    Fetch,
    /// Delete features for removed events and create features for new ones
    Load,
    /// Run `fetch` then `load`
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let cfg = EventmapConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    match cli.command {
        Commands::Fetch => {
            let processed = commands::fetch::run(&cfg, &client).await?;
            println!("{processed} events processed.");
        }
        Commands::Load => print_load(commands::load::run(&cfg, &client).await?),
        Commands::Sync => {
            let processed = commands::fetch::run(&cfg, &client).await?;
            println!("{processed} events processed.");
            print_load(commands::load::run(&cfg, &client).await?);
        }
    }

    Ok(())
}

fn print_load(summary: commands::load::LoadSummary) {
    println!(
        "{} events processed. {} features created. {} failed.",
        summary.processed, summary.created, summary.failed
    );
}

/// Logs go to stderr so stdout only carries the summary. `RUST_LOG` wins
/// over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,eventmap=debug,eventmap_core=debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}
