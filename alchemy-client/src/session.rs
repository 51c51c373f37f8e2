//! Session host - drives a [`Game`] from a stream of input events, keeps
//! local records current and hands remote sync to the [`Synchronizer`].

use std::time::Duration;

use alchemy_core::{
    EngineConfig, EngineEvent, Game, InputEvent, KeyValueStore, LocalProgress, RecipeCatalog,
    SyncStatus,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

use crate::synchronizer::Synchronizer;

/// What was last written to each local record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Persisted {
    discovered: usize,
    revision: u64,
    page: usize,
}

/// One play session: engine, local store and remote sync.
#[derive(Debug)]
pub struct Session<S> {
    game: Game,
    local: LocalProgress<S>,
    sync: Synchronizer,
    persisted: Persisted,
}

impl<S: KeyValueStore> Session<S> {
    /// Open a session from local records and launch the remote fetch.
    ///
    /// Local loading is synchronous and never fails; the game is playable
    /// before the fetch settles.
    #[must_use]
    pub fn open(
        config: EngineConfig,
        catalog: RecipeCatalog,
        local: LocalProgress<S>,
        mut sync: Synchronizer,
    ) -> Self {
        let game = Game::restore(config, catalog, local.load());
        sync.start(&game);
        let persisted = Persisted {
            discovered: game.discovery().len(),
            revision: game.table().revision(),
            page: game.palette().active_page(),
        };
        Self {
            game,
            local,
            sync,
            persisted,
        }
    }

    /// The running game.
    #[must_use]
    pub const fn game(&self) -> &Game {
        &self.game
    }

    /// The synchronizer.
    #[must_use]
    pub const fn sync(&self) -> &Synchronizer {
        &self.sync
    }

    /// Apply one input event and return the engine events it produced.
    pub fn apply(&mut self, event: &InputEvent) -> Vec<EngineEvent> {
        self.game.handle(event);
        self.after_step()
    }

    /// Advance the engine clock.
    pub fn tick(&mut self, now_ms: u64) -> Vec<EngineEvent> {
        self.game.tick(now_ms);
        self.after_step()
    }

    /// Wait for the initial fetch and merge its result.
    pub async fn settle_fetch(&mut self) -> Vec<EngineEvent> {
        let result = self.sync.fetched().await;
        self.sync.apply_init(&mut self.game, result);
        self.after_step()
    }

    /// Push any pending debounced save and wait for in-flight saves.
    pub async fn finish(&mut self) {
        self.sync.push_pending(&self.game);
        self.sync.flush().await;
    }

    fn after_step(&mut self) -> Vec<EngineEvent> {
        self.persist_local();
        self.sync.observe(&self.game);
        self.game.drain_events()
    }

    /// Write whichever local records changed since the last write.
    fn persist_local(&mut self) {
        let current = Persisted {
            discovered: self.game.discovery().len(),
            revision: self.game.table().revision(),
            page: self.game.palette().active_page(),
        };
        if current.discovered != self.persisted.discovered {
            if let Err(e) = self.local.save_discovered(self.game.discovery()) {
                tracing::warn!("Failed to persist discoveries: {e}");
            }
        }
        if current.revision != self.persisted.revision {
            if let Err(e) = self.local.save_table(self.game.table()) {
                tracing::warn!("Failed to persist table: {e}");
            }
        }
        if current.page != self.persisted.page {
            if let Err(e) = self.local.save_page(current.page) {
                tracing::warn!("Failed to persist page: {e}");
            }
        }
        self.persisted = current;
    }

    /// Drive the session from NDJSON input events until end of input.
    ///
    /// Each emitted engine event is written as one JSON line. Feedback timers
    /// and debounced saves run on wall-clock time since the session started;
    /// input timestamps can only move the clock forward. In-flight saves are
    /// awaited before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input or writing output fails.
    pub async fn run<R, W>(mut self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let started = Instant::now();
        let mut lines = input.lines();

        loop {
            let wake = self.next_wake(started);
            let events = tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<InputEvent>(line) {
                        Ok(event) => self.apply(&event),
                        Err(e) => {
                            tracing::warn!("Ignoring malformed input line: {e}");
                            continue;
                        }
                    }
                }
                events = self.settle_fetch() => events,
                () = tokio::time::sleep_until(wake) => {
                    self.tick(elapsed_ms(started))
                }
            };
            write_events(&mut output, &events).await?;
        }

        // Let a pending fetch settle so buffered progress still reaches the
        // remote.
        if self.sync.status() != SyncStatus::Idle {
            let events = self.settle_fetch().await;
            write_events(&mut output, &events).await?;
        }
        self.finish().await;
        output.flush().await?;
        tracing::info!("Session ended");
        Ok(())
    }

    /// Next wall-clock instant the session must wake for timers or saves.
    fn next_wake(&self, started: Instant) -> Instant {
        let due = [self.game.next_timer_ms(), self.sync.next_deadline_ms()]
            .into_iter()
            .flatten()
            .min();
        match due {
            Some(ms) => started + Duration::from_millis(ms),
            None => started + Duration::from_secs(3600),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

async fn write_events<W: AsyncWrite + Unpin>(output: &mut W, events: &[EngineEvent]) -> std::io::Result<()> {
    for event in events {
        let mut line = serde_json::to_vec(event).map_err(std::io::Error::other)?;
        line.push(b'\n');
        output.write_all(&line).await?;
    }
    Ok(())
}
