//! Progress synchronizer - runs the initial fetch and remote saves as tokio
//! tasks, following the core [`SavePolicy`].

use std::sync::Arc;
use std::time::Duration;

use alchemy_core::{
    AlchemyError, Game, InitResponse, SavePolicy, SaveRequest, SaveTrigger, SyncConfig, SyncStatus,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::remote::{RemoteApi, RemoteError};

/// Attempts per save when failures are retryable.
const SAVE_ATTEMPTS: u32 = 3;

/// Delay before the first retry; doubled for each later one.
const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Send one save, retrying transient HTTP failures.
async fn send_save(remote: &dyn RemoteApi, request: &SaveRequest) -> Result<(), RemoteError> {
    let mut delay = RETRY_DELAY;
    let mut attempt = 1;
    loop {
        match remote.save_progress(request).await {
            Ok(_) => return Ok(()),
            Err(e) if e.is_retryable() && attempt < SAVE_ATTEMPTS => {
                tracing::debug!("Save attempt {attempt} failed, retrying in {delay:?}: {e}");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Single worker sending saves in the order they were queued.
struct SaveQueue {
    tx: mpsc::UnboundedSender<SaveRequest>,
    worker: JoinHandle<()>,
}

impl SaveQueue {
    fn spawn(remote: Arc<dyn RemoteApi>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<SaveRequest>();
        let worker = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match send_save(remote.as_ref(), &request).await {
                    Ok(()) => tracing::debug!("Progress saved"),
                    Err(e) => tracing::warn!("Failed to save progress: {e}"),
                }
            }
        });
        Self { tx, worker }
    }
}

/// Owns the remote seam and the save schedule for one session.
pub struct Synchronizer {
    remote: Arc<dyn RemoteApi>,
    policy: SavePolicy,
    fetch: Option<JoinHandle<Result<InitResponse, RemoteError>>>,
    saves: Option<SaveQueue>,
    username: Option<String>,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("status", &self.policy.status())
            .field("fetching", &self.fetch.is_some())
            .field("saving", &self.saves.is_some())
            .finish_non_exhaustive()
    }
}

impl Synchronizer {
    /// Create a synchronizer in the loading state. Call
    /// [`Synchronizer::start`] to launch the fetch.
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteApi>, config: SyncConfig) -> Self {
        Self {
            remote,
            policy: SavePolicy::new(config),
            fetch: None,
            saves: None,
            username: None,
        }
    }

    /// Launch the initial fetch in the background. `game` is the locally
    /// restored state the session opens with.
    pub fn start(&mut self, game: &Game) {
        if self.fetch.is_some() || self.policy.status() != SyncStatus::Loading {
            return;
        }
        self.policy.begin_load(game.table().revision());
        let remote = Arc::clone(&self.remote);
        tracing::info!("Fetching remote progress");
        self.fetch = Some(tokio::spawn(async move { remote.fetch_init().await }));
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.policy.status()
    }

    /// Username reported by the remote, once loaded.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// When a debounced save falls due, on the engine clock.
    #[must_use]
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.policy.next_deadline_ms()
    }

    /// Wait for the initial fetch to settle.
    ///
    /// Pending forever when no fetch is in flight, so it can sit in a
    /// `select!` unconditionally. Cancel safe.
    pub async fn fetched(&mut self) -> Result<InitResponse, RemoteError> {
        let Some(handle) = self.fetch.as_mut() else {
            return std::future::pending().await;
        };
        let result = handle.await;
        self.fetch = None;
        result.map_err(|e| RemoteError::Task(e.to_string()))?
    }

    /// Fold the fetch result into the game and leave the loading state.
    ///
    /// Local progress the remote lacked is pushed right away.
    pub fn apply_init(&mut self, game: &mut Game, result: Result<InitResponse, RemoteError>) {
        self.policy.begin_merge(game.table().revision());
        let report = match result {
            Ok(init) => {
                self.username.clone_from(&init.username);
                Some(game.merge_remote(&init))
            }
            Err(e) => {
                tracing::warn!("Failed to fetch remote progress, continuing locally: {e}");
                None
            }
        };
        let trigger = self.policy.complete_load(
            report.as_ref(),
            game.discovery().len(),
            game.table().revision(),
            game.now_ms(),
        );
        if let Some(trigger) = trigger {
            self.push(game, trigger);
        }
    }

    /// Check the game after an engine step and push if a save is due.
    pub fn observe(&mut self, game: &Game) {
        let trigger = self.policy.observe(
            game.now_ms(),
            game.discovery().len(),
            game.table().revision(),
        );
        if let Some(trigger) = trigger {
            self.push(game, trigger);
        }
    }

    /// Queue a save of the current state. Saves reach the remote in the
    /// order they were queued.
    ///
    /// Oversized payloads are skipped entirely; anything queued is within
    /// the ceiling.
    pub fn push(&mut self, game: &Game, trigger: SaveTrigger) {
        let limits = self.policy.config().limits;
        let request = SaveRequest::new(game.discovery(), game.table(), &limits);
        let size = match request.check_size(&limits) {
            Ok(size) => size,
            Err(AlchemyError::PayloadTooLarge { size, limit }) => {
                tracing::warn!("Skipping save: payload of {size} bytes exceeds {limit}");
                return;
            }
            Err(e) => {
                tracing::warn!("Skipping save: {e}");
                return;
            }
        };

        tracing::debug!(
            "Saving progress ({trigger:?}): {} discovered, {} tokens, {size} bytes",
            request.discovered_names.len(),
            request.table_tokens.len()
        );
        let remote = &self.remote;
        let queue = self
            .saves
            .get_or_insert_with(|| SaveQueue::spawn(Arc::clone(remote)));
        if queue.tx.send(request).is_err() {
            tracing::warn!("Save worker stopped, dropping save");
            self.saves = None;
        }
    }

    /// Push a pending debounced save now instead of at its deadline.
    pub fn push_pending(&mut self, game: &Game) {
        if let Some(trigger) = self.policy.take_pending() {
            self.push(game, trigger);
        }
    }

    /// Wait for every queued save to finish.
    pub async fn flush(&mut self) {
        let Some(SaveQueue { tx, worker }) = self.saves.take() else {
            return;
        };
        drop(tx);
        if let Err(e) = worker.await {
            tracing::warn!("Save worker failed: {e}");
        }
    }
}
