//! Merge resolver - proximity search, merge and rejection feedback.
//!
//! ```text
//! release ──► first token within radius? ──no──► dropped in place
//!                     │ yes
//!                     ▼
//!            catalog has the pair? ──no──► shake ──(delay)──► push apart
//!                     │ yes
//!                     ▼
//!   remove both, spawn outputs at midpoint, discover, flash
//!                     │ more than one output
//!                     ▼
//!            (delay) bounce outputs onto a circle
//! ```

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::state::Surface;
use crate::timer::TimedEffect;
use crate::{ElementName, EngineEvent, Table, Token, TokenId, TokenStatus};

/// Distances and delays used by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Tokens closer than this (strictly) are proximate.
    pub merge_radius: f32,
    /// Radius of the circle multi-output merges bounce onto.
    pub bounce_radius: f32,
    /// Delay before multi-output tokens bounce apart.
    pub bounce_delay_ms: u64,
    /// Lifetime of the success flash.
    pub flash_ms: u64,
    /// Shake time before a rejected pair is pushed apart.
    pub shake_delay_ms: u64,
    /// Length of the push applied to each token of a rejected pair.
    pub push_force: f32,
    /// Time a repositioned token stays marked as pushed out.
    pub settle_ms: u64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            merge_radius: 60.0,
            bounce_radius: 50.0,
            bounce_delay_ms: 50,
            flash_ms: 500,
            shake_delay_ms: 400,
            push_force: 40.0,
            settle_ms: 300,
        }
    }
}

/// Outcome of releasing a dragged token on the table.
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseOutcome {
    /// The pair merged into the listed tokens.
    Merged {
        /// Output token ids, in recipe order.
        outputs: Vec<TokenId>,
    },
    /// The pair had no recipe; feedback was scheduled.
    Rejected {
        /// The token the dragged one was dropped on.
        target: TokenId,
    },
    /// Nothing proximate; the token stays where it was dropped.
    Dropped,
}

/// Midpoint of two token positions.
#[must_use]
pub fn midpoint(a: &Token, b: &Token) -> (f32, f32) {
    ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Resting positions of `count` outputs on a circle around `center`.
///
/// Output `i` sits at angle `2π·i/count`, so ordering alone fixes the layout.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bounce_positions(center: (f32, f32), count: usize, radius: f32) -> Vec<(f32, f32)> {
    (0..count)
        .map(|i| {
            let angle = TAU * i as f32 / count as f32;
            (center.0 + angle.cos() * radius, center.1 + angle.sin() * radius)
        })
        .collect()
}

/// Push applied to `dragged` (and negated for `target`) when a pair is rejected.
///
/// Points from the target towards the dragged token with length `force`;
/// coincident centres push along +x.
#[must_use]
pub fn push_vector(dragged: &Token, target: &Token, force: f32) -> (f32, f32) {
    let dx = dragged.x - target.x;
    let dy = dragged.y - target.y;
    let distance = dx.hypot(dy);
    if distance <= f32::EPSILON {
        return (force, 0.0);
    }
    (dx / distance * force, dy / distance * force)
}

/// Decides merge or rejection for released tokens and applies the
/// deferred feedback effects.
#[derive(Debug, Clone, Default)]
pub struct MergeResolver {
    config: MergeConfig,
    flash_seq: u64,
}

impl MergeResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(config: MergeConfig) -> Self {
        Self {
            config,
            flash_seq: 0,
        }
    }

    /// Resolver configuration.
    #[must_use]
    pub const fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// The first other token, in table order, within the merge radius.
    ///
    /// Deliberately the first match rather than the nearest. Exploding
    /// tokens are never targets.
    #[must_use]
    pub fn find_target(&self, table: &Table, dragged: &TokenId) -> Option<TokenId> {
        let source = table.get(dragged)?;
        table
            .iter()
            .find(|t| {
                t.id != source.id
                    && t.status != TokenStatus::Exploding
                    && t.distance_to(source) < self.config.merge_radius
            })
            .map(|t| t.id.clone())
    }

    /// Mark the dragged token and its target reactive while the pair is
    /// resolvable, clearing stale markers otherwise.
    pub(crate) fn refresh_reactive(&self, s: &mut Surface<'_>, dragged: &TokenId) {
        let pair = self.find_target(s.table, dragged).filter(|target| {
            match (s.table.get(dragged), s.table.get(target)) {
                (Some(a), Some(b)) => s.catalog.can_combine(a.name.as_str(), b.name.as_str()),
                _ => false,
            }
        });

        for id in s.table.ids_with_status(TokenStatus::Reactive) {
            if pair.as_ref() != Some(&id) && &id != dragged {
                s.table.set_status(&id, TokenStatus::Idle);
            }
        }

        match pair {
            Some(target) => {
                for id in [dragged, &target] {
                    let status = s.table.get(id).map(|t| t.status);
                    if matches!(status, Some(TokenStatus::Idle | TokenStatus::PushedOut)) {
                        s.table.set_status(id, TokenStatus::Reactive);
                    }
                }
            }
            None => {
                if s.table.get(dragged).map(|t| t.status) == Some(TokenStatus::Reactive) {
                    s.table.set_status(dragged, TokenStatus::Idle);
                }
            }
        }
    }

    /// Resolve a released drag against the first proximate token.
    pub(crate) fn release(&mut self, s: &mut Surface<'_>, dragged: &TokenId) -> ReleaseOutcome {
        s.table.clear_status(TokenStatus::Reactive);

        let Some(target_id) = self.find_target(s.table, dragged) else {
            return ReleaseOutcome::Dropped;
        };
        let (Some(source), Some(target)) = (
            s.table.get(dragged).cloned(),
            s.table.get(&target_id).cloned(),
        ) else {
            return ReleaseOutcome::Dropped;
        };

        match s.catalog.resolve(source.name.as_str(), target.name.as_str()) {
            Some(outputs) => {
                let outputs = outputs.to_vec();
                self.merge(s, &source, &target, &outputs)
            }
            None => self.reject(s, &source, &target),
        }
    }

    fn merge(
        &mut self,
        s: &mut Surface<'_>,
        source: &Token,
        target: &Token,
        outputs: &[ElementName],
    ) -> ReleaseOutcome {
        let (mx, my) = midpoint(source, target);
        s.table.remove(&[source.id.clone(), target.id.clone()]);

        let spawned: Vec<TokenId> = outputs
            .iter()
            .map(|name| s.table.spawn(name.clone(), mx, my).id)
            .collect();

        for name in s.discovery.extend(outputs) {
            tracing::info!("New discovery: {name}");
            s.events.push(EngineEvent::Discovered { name });
        }
        if let Some(page) = s.palette.refresh(&*s.discovery) {
            s.events.push(EngineEvent::PageChanged { page });
        }

        self.flash_seq += 1;
        s.events.push(EngineEvent::FlashStarted {
            flash_id: self.flash_seq,
            x: mx,
            y: my,
        });
        s.timers.schedule(
            self.config.flash_ms,
            TimedEffect::ClearFlash {
                flash_id: self.flash_seq,
            },
        );

        if spawned.len() > 1 {
            let placements = spawned
                .iter()
                .cloned()
                .zip(bounce_positions((mx, my), spawned.len(), self.config.bounce_radius))
                .map(|(id, (x, y))| (id, x, y))
                .collect();
            s.timers
                .schedule(self.config.bounce_delay_ms, TimedEffect::Bounce { placements });
        }

        tracing::debug!(
            "Merged {} + {} into {:?}",
            source.name,
            target.name,
            outputs
        );
        s.events.push(EngineEvent::Merged {
            sources: [source.id.clone(), target.id.clone()],
            outputs: spawned.clone(),
            x: mx,
            y: my,
        });
        ReleaseOutcome::Merged { outputs: spawned }
    }

    fn reject(&self, s: &mut Surface<'_>, source: &Token, target: &Token) -> ReleaseOutcome {
        s.table.set_status(&source.id, TokenStatus::Shaking);
        s.table.set_status(&target.id, TokenStatus::Shaking);
        let push = push_vector(source, target, self.config.push_force);
        s.timers.schedule(
            self.config.shake_delay_ms,
            TimedEffect::Separate {
                dragged: source.id.clone(),
                target: target.id.clone(),
                push,
            },
        );
        tracing::debug!("No recipe for {} + {}", source.name, target.name);
        s.events.push(EngineEvent::Rejected {
            dragged: source.id.clone(),
            target: target.id.clone(),
        });
        ReleaseOutcome::Rejected {
            target: target.id.clone(),
        }
    }

    /// Apply a released timer effect. Every target is re-validated first;
    /// tokens that vanished or changed state in the meantime are skipped.
    pub(crate) fn apply(&self, s: &mut Surface<'_>, effect: TimedEffect) {
        match effect {
            TimedEffect::Separate {
                dragged,
                target,
                push,
            } => {
                let mut moved = Vec::new();
                for (id, sign) in [(dragged, 1.0), (target, -1.0)] {
                    let Some(token) = s.table.get(&id) else {
                        continue;
                    };
                    if token.status != TokenStatus::Shaking {
                        continue;
                    }
                    let (x, y) = (token.x + sign * push.0, token.y + sign * push.1);
                    s.table.move_to(&id, x, y);
                    s.table.set_status(&id, TokenStatus::PushedOut);
                    moved.push(id);
                }
                self.settle_later(s, moved);
            }
            TimedEffect::Bounce { placements } => {
                let mut moved = Vec::new();
                for (id, x, y) in placements {
                    let live = s
                        .table
                        .get(&id)
                        .is_some_and(|t| t.status != TokenStatus::Exploding);
                    if live {
                        s.table.move_to(&id, x, y);
                        s.table.set_status(&id, TokenStatus::PushedOut);
                        moved.push(id);
                    }
                }
                self.settle_later(s, moved);
            }
            TimedEffect::Settle { ids } => {
                for id in ids {
                    if s.table.get(&id).map(|t| t.status) == Some(TokenStatus::PushedOut) {
                        s.table.set_status(&id, TokenStatus::Idle);
                    }
                }
            }
            TimedEffect::ClearFlash { flash_id } => {
                s.events.push(EngineEvent::FlashCleared { flash_id });
            }
            TimedEffect::Explode { .. } => {
                tracing::warn!("Explosion effect routed to merge resolver; ignoring");
            }
        }
    }

    fn settle_later(&self, s: &mut Surface<'_>, moved: Vec<TokenId>) {
        if moved.is_empty() {
            return;
        }
        s.events.push(EngineEvent::Repositioned { ids: moved.clone() });
        s.timers
            .schedule(self.config.settle_ms, TimedEffect::Settle { ids: moved });
    }
}
