//! vizdiff web service entry point

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vizdiff_core::Config;

#[derive(Parser)]
#[command(name = "vizdiff-web")]
#[command(about = "Visual regression comparison service")]
#[command(version)]
struct Cli {
    /// Listen address
    #[arg(short, long, env = "VIZDIFF_LISTEN", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Artifact output directory (overrides config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("vizdiff v{}", vizdiff_core::VERSION);

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }

    vizdiff_web::server::serve(cli.listen, config).await
}
