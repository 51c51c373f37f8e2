//! # Alchemy Play
//!
//! Reads input events as NDJSON from stdin and writes engine events as
//! NDJSON to stdout. Logs go to stderr.

use alchemy_client::{CliArgs, ClientConfig, Session, Synchronizer};
use alchemy_core::{FileStore, KeyValueStore, LocalProgress, MemoryStore};
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured tracing on stderr with optional JSON format.
///
/// Set `RUST_LOG` to control log levels (default: warn,alchemy_client=info).
/// Set `RUST_LOG_FORMAT=json` for JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,alchemy_client=info,alchemy_core=info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ClientConfig::from(CliArgs::parse());
    tracing::info!(
        "Starting alchemy-play ({}x{} viewport)",
        config.engine.viewport.width,
        config.engine.viewport.height
    );
    if let Some(ref url) = config.remote_url {
        tracing::info!("Progress server: {url}");
    }

    match config.data_dir.clone() {
        Some(dir) => {
            tracing::info!("Local progress in {}", dir.display());
            play(&config, FileStore::with_data_dir(dir)?).await
        }
        None => play(&config, MemoryStore::new()).await,
    }
}

async fn play<S: KeyValueStore>(config: &ClientConfig, store: S) -> anyhow::Result<()> {
    let catalog = config.load_catalog()?;
    let sync = Synchronizer::new(config.remote()?, config.sync);
    let session = Session::open(config.engine.clone(), catalog, LocalProgress::new(store), sync);

    session
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    Ok(())
}
