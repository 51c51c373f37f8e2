//! Test server harness for integration tests.
//!
//! Spins up a real progress server on a random port.

use std::net::SocketAddr;
use std::path::Path;

use alchemy_core::ProgressLimits;
use alchemy_server::{AppState, ProgressStore};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A test server instance with control handles.
pub struct TestServer {
    addr: SocketAddr,
    store: ProgressStore,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start an in-memory server on a random available port.
    ///
    /// # Panics
    ///
    /// Panics if no port is available or the server fails to bind.
    pub async fn start() -> Self {
        Self::with_store(ProgressStore::new("default", ProgressLimits::default())).await
    }

    /// Start a server persisting under `data_dir`.
    #[allow(dead_code)]
    pub async fn with_data_dir(data_dir: &Path) -> Self {
        let store = ProgressStore::with_data_dir(data_dir, "default", ProgressLimits::default())
            .expect("store");
        Self::with_store(store).await
    }

    /// Start a server around an existing store.
    pub async fn with_store(store: ProgressStore) -> Self {
        let port = portpicker::pick_unused_port().expect("no available port");
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr).await.expect("failed to bind");
        let actual_addr = listener.local_addr().expect("failed to get local addr");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let state = AppState::new(store.clone());
        let handle = tokio::spawn(async move {
            alchemy_server::serve(listener, state, async {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("server error");
        });

        Self {
            addr: actual_addr,
            store,
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    /// Base URL of the server.
    #[allow(dead_code)]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of a path on the server.
    pub fn endpoint(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Access to the store (for test assertions).
    #[allow(dead_code)]
    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    /// Gracefully shut down the server.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(tokio::time::Duration::from_secs(5), self.handle).await;
    }
}
