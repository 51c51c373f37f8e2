//! Gesture engine - turns raw pointer input into spawn, drag, swipe and
//! release actions.
//!
//! A gesture starting on the palette is undecided until the pointer has
//! moved far enough to tell a spawn (mostly upward) from a page swipe
//! (mostly horizontal). A gesture starting on a token drags it.

use serde::{Deserialize, Serialize};

use crate::resolver::{MergeResolver, ReleaseOutcome};
use crate::state::Surface;
use crate::{ElementName, EngineEvent, MergeConfig, TokenId, TokenStatus};

/// Pointer-travel thresholds in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Horizontal travel that commits an undecided gesture to a swipe.
    pub swipe_threshold: f32,
    /// Upward travel that commits an undecided gesture to a spawn.
    pub spawn_threshold: f32,
    /// Travel in any direction that spawns when the palette has one page.
    pub single_page_deadzone: f32,
    /// Swipe distance that flips a page on release.
    pub page_flip_threshold: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            swipe_threshold: 10.0,
            spawn_threshold: 20.0,
            single_page_deadzone: 5.0,
            page_flip_threshold: 50.0,
        }
    }
}

/// Current phase of the pointer gesture.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum GestureState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// Pressed on the palette, intent not yet known.
    Undecided {
        /// Press position X.
        start_x: f32,
        /// Press position Y.
        start_y: f32,
        /// Palette entry under the press, if any.
        candidate: Option<ElementName>,
        /// Whether the pointer has left the tap deadzone.
        wandered: bool,
    },
    /// Dragging a token that was already on the table.
    DraggingToken {
        /// Dragged token.
        id: TokenId,
        /// Pointer offset from the token centre, X.
        offset_x: f32,
        /// Pointer offset from the token centre, Y.
        offset_y: f32,
    },
    /// Dragging a token just spawned from the palette.
    DraggingSpawn {
        /// Dragged token.
        id: TokenId,
    },
    /// Swiping between palette pages.
    PaletteSwiping {
        /// Press position X.
        start_x: f32,
        /// Current horizontal travel.
        dx: f32,
    },
}

impl GestureState {
    /// The token being dragged, if any.
    #[must_use]
    pub const fn dragged(&self) -> Option<&TokenId> {
        match self {
            Self::DraggingToken { id, .. } | Self::DraggingSpawn { id } => Some(id),
            _ => None,
        }
    }
}

/// Pointer gesture state machine.
///
/// At most one gesture is active; a pointer-down while another gesture is
/// in progress is ignored.
#[derive(Debug, Clone, Default)]
pub struct GestureEngine {
    config: GestureConfig,
    state: GestureState,
    resolver: MergeResolver,
}

impl GestureEngine {
    /// Create an idle engine.
    #[must_use]
    pub fn new(config: GestureConfig, merge: MergeConfig) -> Self {
        Self {
            config,
            state: GestureState::Idle,
            resolver: MergeResolver::new(merge),
        }
    }

    /// Current gesture state.
    #[must_use]
    pub const fn state(&self) -> &GestureState {
        &self.state
    }

    /// Gesture thresholds.
    #[must_use]
    pub const fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// The merge resolver used on release.
    #[must_use]
    pub const fn resolver(&self) -> &MergeResolver {
        &self.resolver
    }

    pub(crate) fn pointer_down(&mut self, s: &mut Surface<'_>, x: f32, y: f32) {
        if self.state != GestureState::Idle {
            tracing::debug!("Ignoring pointer-down during {:?}", self.state);
            return;
        }

        let grabbed = s
            .table
            .token_at(x, y)
            .filter(|id| s.table.get(id).is_some_and(|t| t.status != TokenStatus::Exploding));
        if let Some(id) = grabbed {
            let Some((tx, ty)) = s.table.position(&id) else {
                return;
            };
            s.table.bring_to_front(&id);
            // Picking a token up ends any pending push on it.
            if s.table.get(&id).map(|t| t.status) == Some(TokenStatus::Shaking) {
                s.table.set_status(&id, TokenStatus::Idle);
            }
            self.state = GestureState::DraggingToken {
                id,
                offset_x: x - tx,
                offset_y: y - ty,
            };
            return;
        }

        if s.palette.contains(y, s.viewport.height) {
            let candidate = s.palette.entry_at(x, y, s.viewport.height, &*s.discovery);
            self.state = GestureState::Undecided {
                start_x: x,
                start_y: y,
                candidate,
                wandered: false,
            };
        }
    }

    pub(crate) fn pointer_move(&mut self, s: &mut Surface<'_>, x: f32, y: f32) {
        match &mut self.state {
            GestureState::Idle => {}
            GestureState::DraggingToken {
                id,
                offset_x,
                offset_y,
            } => {
                s.table.move_to(id, x - *offset_x, y - *offset_y);
                self.resolver.refresh_reactive(s, id);
            }
            GestureState::DraggingSpawn { id } => {
                s.table.move_to(id, x, y);
                self.resolver.refresh_reactive(s, id);
            }
            GestureState::PaletteSwiping { start_x, dx } => {
                *dx = x - *start_x;
                s.palette.swipe_to(*dx);
            }
            GestureState::Undecided {
                start_x,
                start_y,
                candidate,
                wandered,
            } => {
                let (sx, sy) = (*start_x, *start_y);
                if (x - sx).hypot(y - sy) > self.config.single_page_deadzone {
                    *wandered = true;
                }
                let candidate = candidate.clone();
                self.decide(s, x, y, sx, sy, candidate);
            }
        }
    }

    /// Commit an undecided palette gesture once travel makes intent clear.
    #[allow(clippy::too_many_arguments)]
    fn decide(
        &mut self,
        s: &mut Surface<'_>,
        x: f32,
        y: f32,
        start_x: f32,
        start_y: f32,
        candidate: Option<ElementName>,
    ) {
        let dx = x - start_x;
        let dy = y - start_y;

        if s.palette.page_count() <= 1 {
            // Downward travel never spawns.
            let falling = dy > 0.0 && dy >= dx.abs();
            if let Some(name) = candidate {
                if !falling && dx.hypot(dy) > self.config.single_page_deadzone {
                    self.spawn(s, name, x, y);
                }
            }
            return;
        }

        let rising = -dy > self.config.spawn_threshold && -dy > dx.abs();
        match candidate {
            Some(name) if rising => self.spawn(s, name, x, y),
            _ if dx.abs() > self.config.swipe_threshold => {
                s.palette.swipe_to(dx);
                self.state = GestureState::PaletteSwiping { start_x, dx };
            }
            _ => {}
        }
    }

    fn spawn(&mut self, s: &mut Surface<'_>, name: ElementName, x: f32, y: f32) {
        let token = s.table.spawn(name, x, y);
        s.events.push(EngineEvent::Spawned {
            id: token.id.clone(),
            name: token.name,
        });
        self.state = GestureState::DraggingSpawn { id: token.id };
    }

    pub(crate) fn pointer_up(&mut self, s: &mut Surface<'_>, x: f32, y: f32) -> Option<ReleaseOutcome> {
        match std::mem::take(&mut self.state) {
            GestureState::DraggingToken {
                id,
                offset_x,
                offset_y,
            } => {
                s.table.move_to(&id, x - offset_x, y - offset_y);
                Some(self.finish_drag(s, &id, y))
            }
            GestureState::DraggingSpawn { id } => {
                s.table.move_to(&id, x, y);
                Some(self.finish_drag(s, &id, y))
            }
            GestureState::PaletteSwiping { start_x, .. } => {
                let dx = x - start_x;
                if let Some(page) = s.palette.end_swipe(dx, self.config.page_flip_threshold) {
                    s.events.push(EngineEvent::PageChanged { page });
                }
                None
            }
            GestureState::Undecided {
                candidate: Some(name),
                wandered: false,
                ..
            } => {
                s.events.push(EngineEvent::Tapped { name });
                None
            }
            GestureState::Undecided { .. } | GestureState::Idle => None,
        }
    }

    /// Release over the palette discards; anywhere else resolves a merge.
    fn finish_drag(&mut self, s: &mut Surface<'_>, id: &TokenId, pointer_y: f32) -> ReleaseOutcome {
        if !s.table.contains(id) {
            return ReleaseOutcome::Dropped;
        }
        if s.palette.contains(pointer_y, s.viewport.height) {
            s.table.clear_status(TokenStatus::Reactive);
            s.table.remove(std::slice::from_ref(id));
            tracing::debug!("Discarded {id} on the palette");
            s.events.push(EngineEvent::Discarded { id: id.clone() });
            return ReleaseOutcome::Dropped;
        }
        self.resolver.release(s, id)
    }

    /// Abandon the gesture. A dragged token stays where it is with no
    /// merge and no discard; a swipe snaps back.
    pub(crate) fn pointer_cancel(&mut self, s: &mut Surface<'_>) {
        match std::mem::take(&mut self.state) {
            GestureState::DraggingToken { .. } | GestureState::DraggingSpawn { .. } => {
                s.table.clear_status(TokenStatus::Reactive);
            }
            GestureState::PaletteSwiping { .. } => {
                s.palette.end_swipe(0.0, self.config.page_flip_threshold);
            }
            GestureState::Undecided { .. } | GestureState::Idle => {}
        }
    }

    /// End the drag if it holds the given token.
    pub(crate) fn cancel_drag_of(&mut self, s: &mut Surface<'_>, id: &TokenId) {
        if self.state.dragged() == Some(id) {
            self.state = GestureState::Idle;
            s.table.clear_status(TokenStatus::Reactive);
        }
    }

    /// Drop any gesture in progress.
    pub(crate) fn reset(&mut self) {
        self.state = GestureState::Idle;
    }
}
