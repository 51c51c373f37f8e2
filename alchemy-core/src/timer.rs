//! Cancellable scheduled effects on a virtual millisecond clock.
//!
//! The engine never sleeps. Feedback delays are queued here and released
//! when the host advances the clock; each released effect re-validates its
//! targets before touching the table.

use crate::TokenId;

/// Scheduling sequence number; breaks ties between equal due times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TaskId(u64);

/// A deferred state change.
#[derive(Debug, Clone, PartialEq)]
pub enum TimedEffect {
    /// Push a rejected pair apart and clear their shaking status.
    Separate {
        /// The dragged token, moved by `+push`.
        dragged: TokenId,
        /// The target token, moved by `-push`.
        target: TokenId,
        /// Push vector.
        push: (f32, f32),
    },
    /// Move merge outputs to their resting positions around the midpoint.
    Bounce {
        /// Target position per output token.
        placements: Vec<(TokenId, f32, f32)>,
    },
    /// Return pushed-out tokens to idle.
    Settle {
        /// Tokens to settle.
        ids: Vec<TokenId>,
    },
    /// End a success flash.
    ClearFlash {
        /// Flash sequence number.
        flash_id: u64,
    },
    /// Remove an exploding token.
    Explode {
        /// Token to remove.
        id: TokenId,
    },
}

impl TimedEffect {
    /// Drop a token from the tokens this effect moves. Returns `false` when
    /// nothing is left for the effect to do.
    ///
    /// A separation still clears its partner's shaking status and skips
    /// tokens that are no longer shaking, so it is kept whole.
    fn forget(&mut self, id: &TokenId) -> bool {
        match self {
            Self::Bounce { placements } => {
                placements.retain(|(placed, _, _)| placed != id);
                !placements.is_empty()
            }
            Self::Settle { ids } => {
                ids.retain(|settled| settled != id);
                !ids.is_empty()
            }
            Self::Separate { .. } | Self::ClearFlash { .. } | Self::Explode { .. } => true,
        }
    }
}

#[derive(Debug, Clone)]
struct Scheduled {
    id: TaskId,
    due_ms: u64,
    effect: TimedEffect,
}

/// Queue of pending effects ordered by due time.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    now_ms: u64,
    next_id: u64,
    tasks: Vec<Scheduled>,
}

impl Scheduler {
    /// Create an empty scheduler at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current clock value.
    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Schedule an effect `delay_ms` after the current time.
    pub fn schedule(&mut self, delay_ms: u64, effect: TimedEffect) {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push(Scheduled {
            id,
            due_ms: self.now_ms.saturating_add(delay_ms),
            effect,
        });
    }

    /// Cancel every pending task.
    pub fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    /// Stop pending effects from moving a token, cancelling effects left
    /// with nothing to do.
    pub fn forget_token(&mut self, id: &TokenId) {
        self.tasks.retain_mut(|task| task.effect.forget(id));
    }

    /// Move the clock forward and release every effect now due.
    ///
    /// The clock never goes backwards. Effects are released in due-time
    /// order, ties broken by scheduling order.
    pub fn advance(&mut self, now_ms: u64) -> Vec<TimedEffect> {
        self.now_ms = self.now_ms.max(now_ms);
        let now = self.now_ms;
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.tasks.drain(..).partition(|task| task.due_ms <= now);
        self.tasks = pending;
        due.sort_by_key(|task| (task.due_ms, task.id));
        due.into_iter().map(|task| task.effect).collect()
    }

    /// Due time of the earliest pending task.
    #[must_use]
    pub fn next_due_ms(&self) -> Option<u64> {
        self.tasks.iter().map(|task| task.due_ms).min()
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}
