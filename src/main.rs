mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use routeguide::config::RouteGuideConfig;
use routeguide::server;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "routeguide", version, about = "Location-based directory service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the RouteGuide server (HTTP + WebSocket)
    Serve,
    /// Look up the feature at a point in the feature database
    Lookup {
        /// Latitude in degrees × 1e7
        #[arg(long, allow_hyphen_values = true)]
        latitude: i32,
        /// Longitude in degrees × 1e7
        #[arg(long, allow_hyphen_values = true)]
        longitude: i32,
    },
    /// List named features inside a rectangle (corners in any order)
    List {
        #[arg(long, allow_hyphen_values = true)]
        lo_lat: i32,
        #[arg(long, allow_hyphen_values = true)]
        lo_lon: i32,
        #[arg(long, allow_hyphen_values = true)]
        hi_lat: i32,
        #[arg(long, allow_hyphen_values = true)]
        hi_lon: i32,
    },
    /// Check configuration and the feature database
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = RouteGuideConfig::load()?;

    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            server::serve(config).await?;
        }
        Command::Lookup {
            latitude,
            longitude,
        } => {
            cli::lookup::lookup(&config, latitude, longitude)?;
        }
        Command::List {
            lo_lat,
            lo_lon,
            hi_lat,
            hi_lon,
        } => {
            cli::list::list(&config, (lo_lat, lo_lon), (hi_lat, hi_lon))?;
        }
        Command::Doctor => {
            cli::doctor::doctor(&config)?;
        }
    }

    Ok(())
}
