//! # Alchemy Progress Server Library
//!
//! Per-user progress storage behind `GET /api/init` and
//! `POST /api/progress`. Used by the `alchemy-server` binary and by
//! integration tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod health;
pub mod metrics;
pub mod routes;
pub mod store;
pub mod validation;

pub use error::ApiError;
pub use store::{ProgressStore, SaveOutcome, SavedProgress};

use std::future::Future;
use std::path::PathBuf;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Default port for the progress server.
pub const DEFAULT_PORT: u16 = 9474;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Progress records.
    pub store: ProgressStore,
}

impl AppState {
    /// Wrap a store.
    #[must_use]
    pub const fn new(store: ProgressStore) -> Self {
        Self { store }
    }

    /// Get a reference to the progress store.
    #[must_use]
    pub const fn store(&self) -> &ProgressStore {
        &self.store
    }
}

/// Command-line arguments for alchemy-server.
#[derive(Debug, Clone, Parser)]
#[command(name = "alchemy-server")]
#[command(about = "Progress server for the alchemy sandbox")]
#[command(version)]
pub struct CliArgs {
    /// Port to listen on (localhost only)
    #[arg(long, env = "ALCHEMY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory for progress records (in-memory if unset)
    #[arg(long, env = "ALCHEMY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Storage scope, the last segment of every record key
    #[arg(long, env = "ALCHEMY_SCOPE", default_value = "default")]
    pub scope: String,
}

/// API and health routes with their state.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health", get(health::readiness))
        .route("/api/init", get(routes::get_init))
        .route("/api/progress", post(routes::save_progress))
        .with_state(state)
}

/// Add request ids, request tracing and, optionally, CORS.
#[must_use]
pub fn with_layers(app: Router, cors: Option<CorsLayer>) -> Router {
    let app = app
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));
    let app = match cors {
        Some(cors) => app.layer(cors),
        None => app,
    };
    app.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Build a CORS layer that only allows localhost origins.
#[must_use]
pub fn build_cors_layer(port: u16) -> CorsLayer {
    let localhost_origins = [
        format!("http://localhost:{port}"),
        format!("http://127.0.0.1:{port}"),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ];

    let origins: Vec<HeaderValue> = localhost_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(routes::USER_HEADER),
        ])
}

/// Serve the API on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if accepting connections fails.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, with_layers(router(state), None))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Alchemy server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
