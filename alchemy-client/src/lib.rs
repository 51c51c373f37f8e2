//! # Alchemy Client
//!
//! Hosts an alchemy play session: restores local progress, syncs with the
//! progress server in the background and drives the engine from input events.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p alchemy-client -- --remote-url http://localhost:9474 --user ash < moves.ndjson
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `ClientConfig` - Engine, sync and storage settings
//! - `Session` - Runs the engine, local persistence and the synchronizer
//! - `RemoteApi` - Seam between the synchronizer and the HTTP binding

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod remote;
pub mod session;
pub mod synchronizer;

pub use remote::{HttpRemote, OfflineRemote, RemoteApi, RemoteError, USER_HEADER};
pub use session::Session;
pub use synchronizer::Synchronizer;

use std::path::PathBuf;
use std::sync::Arc;

use alchemy_core::{EngineConfig, RecipeCatalog, SyncConfig, Viewport};
use clap::Parser;

/// Command-line arguments for alchemy-play.
#[derive(Debug, Clone, Parser)]
#[command(name = "alchemy-play")]
#[command(about = "Play the alchemy sandbox from NDJSON input events")]
#[command(version)]
pub struct CliArgs {
    /// Progress server base URL (e.g., <http://localhost:9474>)
    #[arg(long, env = "ALCHEMY_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// User id sent to the progress server
    #[arg(long, env = "ALCHEMY_USER")]
    pub user: Option<String>,

    /// Directory for local progress records (in-memory if unset)
    #[arg(long, env = "ALCHEMY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Recipe table JSON file (built-in recipes if unset)
    #[arg(long, env = "ALCHEMY_RECIPES")]
    pub recipes: Option<PathBuf>,

    /// Viewport width in pixels
    #[arg(long, default_value = "400")]
    pub width: f32,

    /// Viewport height in pixels
    #[arg(long, default_value = "800")]
    pub height: f32,

    /// Quiet period before saving table edits, in milliseconds
    #[arg(long, default_value = "2000")]
    pub debounce_ms: u64,
}

/// Client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Engine tunables.
    pub engine: EngineConfig,
    /// Sync tunables.
    pub sync: SyncConfig,
    /// Progress server base URL.
    pub remote_url: Option<String>,
    /// User id for the progress server.
    pub user: Option<String>,
    /// Directory for local records.
    pub data_dir: Option<PathBuf>,
    /// Recipe table file.
    pub recipes: Option<PathBuf>,
}

impl From<CliArgs> for ClientConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            engine: EngineConfig::default().with_viewport(Viewport::new(args.width, args.height)),
            sync: SyncConfig {
                debounce_ms: args.debounce_ms,
                ..SyncConfig::default()
            },
            remote_url: args.remote_url,
            user: args.user,
            data_dir: args.data_dir,
            recipes: args.recipes,
        }
    }
}

impl ClientConfig {
    /// Load the configured recipe table, or the built-in one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_catalog(&self) -> anyhow::Result<RecipeCatalog> {
        match &self.recipes {
            Some(path) => {
                let json = std::fs::read_to_string(path)?;
                Ok(RecipeCatalog::from_json(&json)?)
            }
            None => Ok(RecipeCatalog::builtin()),
        }
    }

    /// Build the remote for this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote URL is invalid.
    pub fn remote(&self) -> Result<Arc<dyn RemoteApi>, RemoteError> {
        let remote: Arc<dyn RemoteApi> = match &self.remote_url {
            Some(url) => Arc::new(HttpRemote::new(url, self.user.clone())?),
            None => Arc::new(OfflineRemote),
        };
        Ok(remote)
    }
}
