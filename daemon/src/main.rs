//! drivegated — local bridge exposing Google Drive tools over a Unix socket.
//!
//! Loads service-account credentials, mints tokens on demand, and serves
//! JSON-RPC 2.0 on `~/.drivegate/drivegate.sock`.

mod auth;
mod config;
mod error;
mod google;
mod proxy;

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use proxy::ProxyServer;

#[derive(Parser, Debug)]
#[command(name = "drivegated", about = "Google Drive bridge daemon")]
struct Args {
    /// Path to the service-account credentials JSON
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Unix socket to listen on
    #[arg(long)]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let settings = config::Settings::resolve(args.credentials, args.socket)?;

    // Fail fast on bad credentials instead of surfacing auth errors per request.
    auth::init(&settings.credentials_path).await?;
    info!(
        "Credentials loaded from {}",
        settings.credentials_path.display()
    );

    let server = ProxyServer::new(Some(settings.socket_path));
    info!("Listening on {}", server.socket_path().display());
    server.start().await?;

    Ok(())
}
