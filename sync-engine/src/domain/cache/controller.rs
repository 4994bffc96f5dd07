//! Optimistic cache controller.
//!
//! One [`OptimisticAction`] per user gesture walks the phases
//! `Idle -> CancellingReads -> Snapshotting -> Speculating ->
//! Committing | RollingBack -> Idle`. The action holds the per-subject lock
//! for its whole life, so a superseding gesture on the same subject applies
//! its transform only after this one has settled.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::registry::CacheRegistry;
use super::speculation::Speculation;
use super::views::CachedView;
use crate::domain::{Error, OwnerId, SubjectKey, WriteOutcome};

/// Phase of one optimistic mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    /// No mutation in progress.
    Idle,
    /// Aborting in-flight reads of the affected collections.
    CancellingReads,
    /// Capturing the affected collections.
    Snapshotting,
    /// Speculative state applied; waiting for the remote write.
    Speculating,
    /// Clearing pending markers after a successful write.
    Committing,
    /// Restoring the subject's views after a failed write.
    RollingBack,
}

impl fmt::Display for ActionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::CancellingReads => "cancelling_reads",
            Self::Snapshotting => "snapshotting",
            Self::Speculating => "speculating",
            Self::Committing => "committing",
            Self::RollingBack => "rolling_back",
        };
        f.write_str(label)
    }
}

/// How a gesture's speculative state was finalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// The speculative state was kept.
    Committed,
    /// The named collections were restored from their snapshot.
    RolledBack,
    /// No speculative state was applied.
    NotStarted,
}

/// Serialised prior state of the named collections, held for one mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    collections: BTreeMap<String, Vec<u8>>,
}

impl CacheSnapshot {
    /// Names of the captured collections, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// True when no named collection existed at snapshot time.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// Per-`(owner, subject)` mutual exclusion.
#[derive(Default)]
pub struct SubjectLocks {
    locks: DashMap<(OwnerId, SubjectKey), Arc<Mutex<()>>>,
}

impl SubjectLocks {
    /// Wait for and take the lock for `(owner_id, subject)`.
    pub async fn acquire(&self, owner_id: &OwnerId, subject: &SubjectKey) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(
            &self
                .locks
                .entry((owner_id.clone(), subject.clone()))
                .or_default(),
        );
        lock.lock_owned().await
    }
}

/// Applies speculative state to cached collections and settles it.
pub struct OptimisticCacheController {
    registry: Arc<CacheRegistry>,
    locks: SubjectLocks,
}

impl OptimisticCacheController {
    /// Controller over `registry` with no subject locks held.
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        Self {
            registry,
            locks: SubjectLocks::default(),
        }
    }

    /// Registry whose collections this controller mutates.
    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    /// Abort in-flight reads against the named collections.
    pub fn cancel(&self, names: &[String]) {
        let cancelled = self.registry.cancel_reads(names);
        debug!(cancelled, collections = names.len(), "cancelled in-flight reads");
    }

    /// Capture the named collections for a later verbatim restore.
    pub fn snapshot(&self, names: &[String]) -> Result<CacheSnapshot, Error> {
        let mut collections = BTreeMap::new();
        for name in names {
            if let Some(views) = self.registry.get(name) {
                let bytes = serde_json::to_vec(&views).map_err(|err| {
                    Error::internal(format!("failed to snapshot collection {name}: {err}"))
                })?;
                collections.insert(name.clone(), bytes);
            }
        }
        Ok(CacheSnapshot { collections })
    }

    /// Apply `speculation` to every named collection showing `subject`.
    /// Returns the names that changed.
    pub fn speculate(
        &self,
        names: &[String],
        subject: &SubjectKey,
        speculation: &Speculation,
    ) -> Vec<String> {
        names
            .iter()
            .filter(|name| {
                self.registry
                    .update(name, |views| speculation.apply(views, subject))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Keep the speculative state, clearing its pending markers.
    pub fn commit(
        &self,
        names: &[String],
        subject: &SubjectKey,
        speculation: &Speculation,
        outcome: &WriteOutcome,
    ) {
        for name in names {
            self.registry
                .update(name, |views| speculation.settle(views, subject, outcome));
        }
    }

    /// Restore the views of `subject` in every collection in `snapshot`.
    ///
    /// Views of other subjects keep their current state, so a rollback never
    /// undoes a concurrent gesture that has already settled. Restored views
    /// return to their snapshot positions. A collection dropped since the
    /// snapshot is registered again as captured.
    pub fn rollback(&self, snapshot: &CacheSnapshot, subject: &SubjectKey) -> Result<(), Error> {
        for (name, bytes) in &snapshot.collections {
            let saved: Vec<CachedView> = serde_json::from_slice(bytes).map_err(|err| {
                Error::internal(format!("failed to restore collection {name}: {err}"))
            })?;
            let mut saved = Some(saved);
            let restored = self.registry.update(name, |views| {
                if let Some(saved) = saved.take() {
                    restore_subject(views, saved, subject);
                }
            });
            if let (None, Some(saved)) = (restored, saved) {
                self.registry.register(name.clone(), saved);
            }
        }
        Ok(())
    }

    /// Start an optimistic mutation: wait for the subject lock, cancel
    /// overlapping reads, snapshot, then speculate.
    pub async fn begin(
        &self,
        owner_id: &OwnerId,
        subject: SubjectKey,
        speculation: Speculation,
    ) -> Result<OptimisticAction<'_>, Error> {
        let guard = self.locks.acquire(owner_id, &subject).await;
        let mut action = OptimisticAction {
            controller: self,
            subject,
            speculation,
            names: Vec::new(),
            snapshot: CacheSnapshot::default(),
            phase: ActionPhase::Idle,
            _guard: guard,
        };

        action.names = self.registry.names_containing(&action.subject);
        action.enter(ActionPhase::CancellingReads);
        self.cancel(&action.names);

        action.enter(ActionPhase::Snapshotting);
        action.snapshot = match self.snapshot(&action.names) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                action.enter(ActionPhase::Idle);
                return Err(err);
            }
        };

        action.enter(ActionPhase::Speculating);
        let touched = self.speculate(&action.names, &action.subject, &action.speculation);
        debug!(subject = %action.subject, touched = touched.len(), "speculative state applied");
        Ok(action)
    }
}

/// Replace the views of `subject` in `current` with those in `saved`,
/// reinserting each at its saved index.
fn restore_subject(current: &mut Vec<CachedView>, saved: Vec<CachedView>, subject: &SubjectKey) {
    current.retain(|view| !view.matches(subject));
    let matching = saved
        .into_iter()
        .enumerate()
        .filter(|(_, view)| view.matches(subject));
    for (index, view) in matching {
        let at = index.min(current.len());
        current.insert(at, view);
    }
}

/// One in-progress optimistic mutation. Dropping it without settling leaves
/// the speculative state in place.
pub struct OptimisticAction<'a> {
    controller: &'a OptimisticCacheController,
    subject: SubjectKey,
    speculation: Speculation,
    names: Vec<String>,
    snapshot: CacheSnapshot,
    phase: ActionPhase,
    _guard: OwnedMutexGuard<()>,
}

impl OptimisticAction<'_> {
    /// Current phase of the mutation.
    pub fn phase(&self) -> ActionPhase {
        self.phase
    }

    /// Collections this mutation touches.
    pub fn collections(&self) -> &[String] {
        &self.names
    }

    fn enter(&mut self, phase: ActionPhase) {
        debug!(subject = %self.subject, from = %self.phase, to = %phase, "cache phase transition");
        self.phase = phase;
    }

    /// Finalise after the remote write succeeded.
    pub fn commit(mut self, outcome: &WriteOutcome) -> Settlement {
        self.enter(ActionPhase::Committing);
        self.controller
            .commit(&self.names, &self.subject, &self.speculation, outcome);
        self.enter(ActionPhase::Idle);
        Settlement::Committed
    }

    /// Restore the snapshot after the remote write failed.
    pub fn rollback(mut self) -> Result<Settlement, Error> {
        self.enter(ActionPhase::RollingBack);
        let restored = self.controller.rollback(&self.snapshot, &self.subject);
        self.enter(ActionPhase::Idle);
        restored?;
        info!(subject = %self.subject, collections = self.names.len(), "speculative state rolled back");
        Ok(Settlement::RolledBack)
    }
}
