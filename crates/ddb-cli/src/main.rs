//! ddb-cli: a thin launcher that mounts the service's single HTTP handler.

mod server;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ddb_service::Service;
use ddb_storage::StorageEngine;

/// Runs a local, in-process document-store emulator over HTTP.
#[derive(Parser)]
#[command(name = "ddb-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to listen on.
    #[arg(short, long, env = "DDB_PORT", default_value_t = 9527)]
    port: u16,

    /// Log verbosity (error, warn, info, debug, trace).
    #[arg(long, env = "DDB_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let engine = StorageEngine::new().await?;
    let service = Service::new(engine);

    server::serve(cli.port, service).await
}
