//! Game state - owns every engine component and routes input to them.

use crate::gesture::{GestureEngine, GestureState};
use crate::resolver::ReleaseOutcome;
use crate::timer::{Scheduler, TimedEffect};
use crate::{
    DiscoverySet, ElementName, EngineConfig, EngineEvent, InitResponse, InputEvent, LocalSnapshot,
    MergeReport, Palette, PointerEvent, PointerPhase, RecipeCatalog, Table, TokenId, TokenStatus,
    Viewport,
};

/// Mutable view of the components a gesture or merge step touches.
pub(crate) struct Surface<'a> {
    pub(crate) table: &'a mut Table,
    pub(crate) discovery: &'a mut DiscoverySet,
    pub(crate) catalog: &'a RecipeCatalog,
    pub(crate) palette: &'a mut Palette,
    pub(crate) timers: &'a mut Scheduler,
    pub(crate) events: &'a mut Vec<EngineEvent>,
    pub(crate) viewport: Viewport,
}

/// Everything except the gesture engine, so both can be borrowed at once.
#[derive(Debug, Clone)]
struct Board {
    catalog: RecipeCatalog,
    table: Table,
    discovery: DiscoverySet,
    palette: Palette,
    timers: Scheduler,
    events: Vec<EngineEvent>,
    viewport: Viewport,
}

impl Board {
    fn surface(&mut self) -> Surface<'_> {
        Surface {
            table: &mut self.table,
            discovery: &mut self.discovery,
            catalog: &self.catalog,
            palette: &mut self.palette,
            timers: &mut self.timers,
            events: &mut self.events,
            viewport: self.viewport,
        }
    }
}

/// A single play session.
///
/// All methods are synchronous and total. Feedback delays run on a virtual
/// clock advanced by input timestamps and [`Game::tick`]; emitted
/// [`EngineEvent`]s accumulate until [`Game::drain_events`].
#[derive(Debug, Clone)]
pub struct Game {
    config: EngineConfig,
    board: Board,
    gestures: GestureEngine,
    /// Set by a wipe, cleared by the next remote merge.
    wiped_since_merge: bool,
}

impl Game {
    /// Start a fresh session: primitives only, empty table.
    #[must_use]
    pub fn new(config: EngineConfig, catalog: RecipeCatalog) -> Self {
        Self::restore(config, catalog, LocalSnapshot::default())
    }

    /// Start a session from locally persisted progress.
    #[must_use]
    pub fn restore(config: EngineConfig, catalog: RecipeCatalog, snapshot: LocalSnapshot) -> Self {
        let mut table = Table::new();
        table.replace_all(snapshot.table);
        let discovery = snapshot.discovered;
        let mut palette = Palette::new(config.palette, config.viewport.width, &discovery);
        palette.set_page(snapshot.page);

        Self {
            gestures: GestureEngine::new(config.gesture, config.merge),
            board: Board {
                catalog,
                table,
                discovery,
                palette,
                timers: Scheduler::new(),
                events: Vec::new(),
                viewport: config.viewport,
            },
            config,
            wiped_since_merge: false,
        }
    }

    /// Apply one input event.
    pub fn handle(&mut self, event: &InputEvent) {
        match event {
            InputEvent::Pointer(pointer) => {
                self.pointer(*pointer);
            }
            InputEvent::Filter { ch } => self.set_filter(*ch),
            InputEvent::Resize { width, height } => self.resize(*width, *height),
            InputEvent::Explode { id } => self.explode(id),
            InputEvent::ClearTable => self.clear_table(),
            InputEvent::WipeProgress => self.wipe_progress(),
            InputEvent::Tick { timestamp_ms } => self.tick(*timestamp_ms),
        }
    }

    /// Apply a pointer event. Returns the merge outcome on a drag release.
    pub fn pointer(&mut self, event: PointerEvent) -> Option<ReleaseOutcome> {
        self.tick(event.timestamp_ms);
        let mut surface = self.board.surface();
        match event.phase {
            PointerPhase::Down => {
                self.gestures.pointer_down(&mut surface, event.x, event.y);
                None
            }
            PointerPhase::Move => {
                self.gestures.pointer_move(&mut surface, event.x, event.y);
                None
            }
            PointerPhase::Up => self.gestures.pointer_up(&mut surface, event.x, event.y),
            PointerPhase::Cancel => {
                self.gestures.pointer_cancel(&mut surface);
                None
            }
        }
    }

    /// Advance the clock and run every feedback effect now due.
    pub fn tick(&mut self, now_ms: u64) {
        for effect in self.board.timers.advance(now_ms) {
            match effect {
                TimedEffect::Explode { id } => self.finish_explosion(&id),
                other => {
                    let mut surface = self.board.surface();
                    self.gestures.resolver().apply(&mut surface, other);
                }
            }
        }
    }

    /// Mark a token for removal after the explosion delay.
    ///
    /// Cancels a drag holding the token and any pending bounce or settle of
    /// it. Exploding an exploding or absent token does nothing.
    pub fn explode(&mut self, id: &TokenId) {
        let status = self.board.table.get(id).map(|t| t.status);
        if matches!(status, None | Some(TokenStatus::Exploding)) {
            return;
        }
        let mut surface = self.board.surface();
        self.gestures.cancel_drag_of(&mut surface, id);
        self.board.table.set_status(id, TokenStatus::Exploding);
        self.board.timers.forget_token(id);
        self.board
            .timers
            .schedule(self.config.explode_ms, TimedEffect::Explode { id: id.clone() });
        tracing::debug!("Exploding {id}");
    }

    fn finish_explosion(&mut self, id: &TokenId) {
        let exploding = self
            .board
            .table
            .get(id)
            .is_some_and(|t| t.status == TokenStatus::Exploding);
        if !exploding {
            return;
        }
        self.board.table.remove(std::slice::from_ref(id));
        self.board.events.push(EngineEvent::Exploded { id: id.clone() });
    }

    /// Explode every token on the table.
    pub fn clear_table(&mut self) {
        let ids: Vec<TokenId> = self.board.table.iter().map(|t| t.id.clone()).collect();
        for id in &ids {
            self.explode(id);
        }
    }

    /// Reset discoveries to the primitives and clear the table immediately.
    pub fn wipe_progress(&mut self) {
        self.board.timers.cancel_all();
        self.gestures.reset();
        self.board.table.clear();
        self.board.discovery.wipe();
        let palette = &mut self.board.palette;
        palette.end_swipe(0.0, self.config.gesture.page_flip_threshold);
        palette.refresh(&self.board.discovery);
        palette.set_page(0);
        self.wiped_since_merge = true;
        tracing::info!("Progress wiped");
        self.board.events.push(EngineEvent::Wiped);
    }

    /// Change the viewport. The palette re-pages but never jumps.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.board.viewport = Viewport::new(width, height);
        if let Some(page) = self.board.palette.resize(width, &self.board.discovery) {
            self.board.events.push(EngineEvent::PageChanged { page });
        }
    }

    /// Set or clear the palette filter.
    pub fn set_filter(&mut self, filter: Option<char>) {
        if let Some(page) = self.board.palette.set_filter(filter, &self.board.discovery) {
            self.board.events.push(EngineEvent::PageChanged { page });
        }
    }

    /// Fold remote progress into the session.
    ///
    /// Remote-only names are appended in remote order; local order is kept.
    /// The remote table is adopted only if the local one is empty. After a
    /// wipe nothing is taken from the remote and the report asks for a reset
    /// save instead.
    pub fn merge_remote(&mut self, remote: &InitResponse) -> MergeReport {
        if std::mem::take(&mut self.wiped_since_merge) {
            tracing::info!("Progress wiped before the remote merge; keeping the reset state");
            return MergeReport {
                reset: true,
                ..MergeReport::default()
            };
        }

        let added = self.board.discovery.extend(&remote.discovered_names);
        let local_only: Vec<ElementName> = self
            .board
            .discovery
            .iter()
            .filter(|name| !remote.discovered_names.contains(name))
            .cloned()
            .collect();

        let remote_tokens = remote.table_tokens.as_deref().unwrap_or_default();
        let adopted_table = self.board.table.is_empty() && !remote_tokens.is_empty();
        if adopted_table {
            self.board.table.replace_all(remote_tokens.to_vec());
        }

        if let Some(page) = self.board.palette.refresh(&self.board.discovery) {
            self.board.events.push(EngineEvent::PageChanged { page });
        }
        tracing::info!(
            "Merged remote progress: {} added, {} local only, table adopted: {adopted_table}",
            added.len(),
            local_only.len()
        );
        MergeReport {
            added,
            local_only,
            adopted_table,
            reset: false,
        }
    }

    /// Take every event emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.board.events)
    }

    /// State to persist locally.
    #[must_use]
    pub fn snapshot(&self) -> LocalSnapshot {
        LocalSnapshot {
            discovered: self.board.discovery.clone(),
            table: self.board.table.snapshot().0,
            page: self.board.palette.active_page(),
        }
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Recipe catalog.
    #[must_use]
    pub const fn catalog(&self) -> &RecipeCatalog {
        &self.board.catalog
    }

    /// Live tokens.
    #[must_use]
    pub const fn table(&self) -> &Table {
        &self.board.table
    }

    /// Discovered names.
    #[must_use]
    pub const fn discovery(&self) -> &DiscoverySet {
        &self.board.discovery
    }

    /// Palette paging state.
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.board.palette
    }

    /// Entries on the active palette page.
    #[must_use]
    pub fn palette_entries(&self) -> Vec<&ElementName> {
        self.board.palette.active_entries(&self.board.discovery)
    }

    /// Current gesture state.
    #[must_use]
    pub const fn gesture(&self) -> &GestureState {
        self.gestures.state()
    }

    /// Current viewport.
    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        self.board.viewport
    }

    /// Current clock value.
    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.board.timers.now_ms()
    }

    /// When the next feedback effect falls due.
    #[must_use]
    pub fn next_timer_ms(&self) -> Option<u64> {
        self.board.timers.next_due_ms()
    }
}
