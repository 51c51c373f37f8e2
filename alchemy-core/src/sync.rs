//! Progress synchronization policy.
//!
//! Decides *when* remote saves happen; the client crate decides *how*.
//! The policy runs on the same millisecond clock as the engine, so it is
//! fully deterministic.
//!
//! ```text
//! Loading ──fetch settles──► Merging ──merge applied──► Idle
//!    │                                                   │
//!    └─ no saves; discoveries buffered locally           ├─ discovery growth → save now
//!                                                        ├─ wipe → reset save now
//!                                                        └─ table edit → save after quiet period
//! ```
//!
//! A wipe is an explicit reset: it replaces the remote progress right away,
//! and a wipe made before the initial merge keeps the merge from restoring
//! the wiped names.

use serde::{Deserialize, Serialize};

use crate::{ElementName, ProgressLimits};

/// Remote synchronization status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Initial fetch in flight.
    #[default]
    Loading,
    /// Fetch settled, merge being applied.
    Merging,
    /// Steady state; saves allowed.
    Idle,
}

/// Synchronization tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet period after the last table edit before saving.
    pub debounce_ms: u64,
    /// Caps applied to each save.
    pub limits: ProgressLimits,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            limits: ProgressLimits::default(),
        }
    }
}

/// Why a save is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    /// Local state held names the remote lacked after the initial merge.
    Reconcile,
    /// The discovery set grew.
    Discovery,
    /// The table has been quiet for the debounce period.
    Debounced,
    /// Progress was wiped; the remote is overwritten with the reset state.
    Reset,
}

/// Result of folding remote progress into local state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Remote names that were new locally, in remote order.
    pub added: Vec<ElementName>,
    /// Local names the remote did not have.
    pub local_only: Vec<ElementName>,
    /// Whether the remote table replaced an empty local one.
    pub adopted_table: bool,
    /// Whether a wipe made before the merge overrode the remote progress.
    pub reset: bool,
}

impl MergeReport {
    /// Whether the remote is behind the merged local state.
    #[must_use]
    pub fn needs_push(&self) -> bool {
        self.reset || !self.local_only.is_empty()
    }
}

/// Save scheduling state machine.
///
/// Fed with the discovery count and table revision after every engine
/// step; answers whether a save is due.
#[derive(Debug, Clone)]
pub struct SavePolicy {
    config: SyncConfig,
    status: SyncStatus,
    discovered_len: usize,
    revision: u64,
    deadline_ms: Option<u64>,
    edited_while_loading: bool,
}

impl SavePolicy {
    /// Start in [`SyncStatus::Loading`].
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            status: SyncStatus::Loading,
            discovered_len: 0,
            revision: 0,
            deadline_ms: None,
            edited_while_loading: false,
        }
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> SyncStatus {
        self.status
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Record the table revision the session opened with.
    pub fn begin_load(&mut self, revision: u64) {
        self.revision = revision;
    }

    /// The initial fetch settled; its result is about to be merged.
    ///
    /// `revision` is the table revision before the merge touches it.
    pub fn begin_merge(&mut self, revision: u64) {
        tracing::debug!("Sync status: Merging");
        self.status = SyncStatus::Merging;
        self.edited_while_loading = revision != self.revision;
    }

    /// The merge is applied. Baselines the observed state and reports
    /// whether buffered local progress must be pushed right away.
    ///
    /// Table edits made while loading that need no immediate push start
    /// the quiet period. `report` is `None` when the fetch failed; nothing
    /// is pushed then.
    pub fn complete_load(
        &mut self,
        report: Option<&MergeReport>,
        discovered_len: usize,
        revision: u64,
        now_ms: u64,
    ) -> Option<SaveTrigger> {
        self.status = SyncStatus::Idle;
        self.discovered_len = discovered_len;
        self.revision = revision;
        self.deadline_ms = None;
        tracing::info!("Sync status: Idle ({discovered_len} discovered)");

        let report = report?;
        let trigger = if report.reset {
            Some(SaveTrigger::Reset)
        } else if report.needs_push() {
            Some(SaveTrigger::Reconcile)
        } else {
            None
        };
        if trigger.is_none() && std::mem::take(&mut self.edited_while_loading) {
            self.deadline_ms = Some(now_ms.saturating_add(self.config.debounce_ms));
        }
        trigger
    }

    /// Observe the state after an engine step.
    ///
    /// Discovery growth saves immediately and a shrinking discovery set (a
    /// wipe) saves the reset immediately. Any other table change (re)starts
    /// the quiet period.
    pub fn observe(&mut self, now_ms: u64, discovered_len: usize, revision: u64) -> Option<SaveTrigger> {
        if self.status != SyncStatus::Idle {
            return None;
        }

        if discovered_len != self.discovered_len {
            let trigger = if discovered_len > self.discovered_len {
                SaveTrigger::Discovery
            } else {
                SaveTrigger::Reset
            };
            self.discovered_len = discovered_len;
            self.revision = revision;
            self.deadline_ms = None;
            return Some(trigger);
        }

        if revision != self.revision {
            self.revision = revision;
            self.deadline_ms = Some(now_ms.saturating_add(self.config.debounce_ms));
            return None;
        }

        match self.deadline_ms {
            Some(deadline) if now_ms >= deadline => {
                self.deadline_ms = None;
                Some(SaveTrigger::Debounced)
            }
            _ => None,
        }
    }

    /// Take a pending debounced save early, e.g. when the session ends.
    pub fn take_pending(&mut self) -> Option<SaveTrigger> {
        if self.status != SyncStatus::Idle {
            return None;
        }
        self.deadline_ms.take().map(|_| SaveTrigger::Debounced)
    }

    /// When the pending debounced save falls due.
    #[must_use]
    pub const fn next_deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }
}

impl Default for SavePolicy {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_policy() -> SavePolicy {
        let mut policy = SavePolicy::default();
        policy.begin_merge(0);
        assert_eq!(policy.complete_load(None, 4, 0, 0), None);
        policy
    }

    #[test]
    fn test_no_saves_before_idle() {
        let mut policy = SavePolicy::default();
        assert_eq!(policy.status(), SyncStatus::Loading);
        assert_eq!(policy.observe(0, 5, 1), None);
        assert_eq!(policy.observe(10_000, 6, 2), None);
        assert_eq!(policy.next_deadline_ms(), None);
    }

    #[test]
    fn test_reconcile_push_when_remote_behind() {
        let mut policy = SavePolicy::default();
        policy.begin_merge(0);
        let report = MergeReport {
            local_only: vec!["alcohol".into()],
            ..MergeReport::default()
        };
        assert_eq!(
            policy.complete_load(Some(&report), 5, 3, 0),
            Some(SaveTrigger::Reconcile)
        );
        assert_eq!(policy.status(), SyncStatus::Idle);
        assert_eq!(policy.observe(0, 5, 3), None);
    }

    #[test]
    fn test_discovery_growth_saves_immediately() {
        let mut policy = idle_policy();
        assert_eq!(policy.observe(100, 5, 4), Some(SaveTrigger::Discovery));
        assert_eq!(policy.next_deadline_ms(), None);
    }

    #[test]
    fn test_table_edits_debounce() {
        let mut policy = idle_policy();
        assert_eq!(policy.observe(1000, 4, 1), None);
        assert_eq!(policy.next_deadline_ms(), Some(3000));
        assert_eq!(policy.observe(2500, 4, 2), None);
        assert_eq!(policy.next_deadline_ms(), Some(4500));
        assert_eq!(policy.observe(4499, 4, 2), None);
        assert_eq!(policy.observe(4500, 4, 2), Some(SaveTrigger::Debounced));
        assert_eq!(policy.observe(9000, 4, 2), None);
    }

    #[test]
    fn test_take_pending() {
        let mut policy = idle_policy();
        assert_eq!(policy.take_pending(), None);
        policy.observe(0, 4, 1);
        assert_eq!(policy.take_pending(), Some(SaveTrigger::Debounced));
        assert_eq!(policy.next_deadline_ms(), None);
    }

    #[test]
    fn test_wipe_saves_reset_immediately() {
        let mut policy = idle_policy();
        assert_eq!(policy.observe(0, 7, 1), Some(SaveTrigger::Discovery));
        assert_eq!(policy.observe(100, 7, 2), None);
        assert!(policy.next_deadline_ms().is_some());
        assert_eq!(policy.observe(300, 4, 3), Some(SaveTrigger::Reset));
        assert_eq!(policy.next_deadline_ms(), None);
    }

    #[test]
    fn test_wipe_before_merge_pushes_reset() {
        let mut policy = SavePolicy::default();
        policy.begin_merge(0);
        let report = MergeReport {
            reset: true,
            ..MergeReport::default()
        };
        assert_eq!(
            policy.complete_load(Some(&report), 4, 2, 0),
            Some(SaveTrigger::Reset)
        );
    }

    #[test]
    fn test_edits_while_loading_start_quiet_period() {
        let mut policy = SavePolicy::default();
        policy.begin_load(1);
        assert_eq!(policy.observe(500, 4, 3), None);
        policy.begin_merge(3);
        assert_eq!(
            policy.complete_load(Some(&MergeReport::default()), 4, 3, 1000),
            None
        );
        assert_eq!(policy.next_deadline_ms(), Some(3000));
        assert_eq!(policy.observe(3000, 4, 3), Some(SaveTrigger::Debounced));
    }

    #[test]
    fn test_untouched_table_needs_no_save_after_load() {
        let mut policy = SavePolicy::default();
        policy.begin_load(1);
        policy.begin_merge(1);
        assert_eq!(
            policy.complete_load(Some(&MergeReport::default()), 4, 2, 1000),
            None
        );
        assert_eq!(policy.next_deadline_ms(), None);
    }

    #[test]
    fn test_failed_fetch_pushes_nothing() {
        let mut policy = SavePolicy::default();
        policy.begin_load(1);
        policy.begin_merge(5);
        assert_eq!(policy.complete_load(None, 4, 5, 1000), None);
        assert_eq!(policy.next_deadline_ms(), None);
    }
}
