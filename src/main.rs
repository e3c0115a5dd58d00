use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use swerve_zenoh_runtime::config::{CMD_TIMEOUT, DriveConfig, LOOP_HZ};
use swerve_zenoh_runtime::runtime::{self, RuntimeOptions};

/// Swerve drive control runtime
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON drive configuration (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Close the steering loop through a simulated plant
    #[arg(long)]
    sim: bool,

    /// Control loop rate in Hz
    #[arg(long, default_value_t = LOOP_HZ)]
    loop_hz: u64,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!("Loading drive config from {}", path.display());
            DriveConfig::load(path)
        }
        None => Ok(DriveConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(1);
        }
    };

    let options = RuntimeOptions {
        loop_hz: args.loop_hz,
        cmd_timeout: CMD_TIMEOUT,
        simulate: args.sim,
    };

    if let Err(e) = runtime::run(config, options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
