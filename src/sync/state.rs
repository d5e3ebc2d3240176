//! Per-operation synchronization state.
//!
//! ```text
//! Pending ──relational write ok──→ RelationalCommitted ──all documents ok──→ Synchronized
//!                                                     └─any document failed─→ PartiallySynchronized
//! ```
//!
//! A rejected relational write never leaves `Pending`: the caller gets the
//! error and no report.

use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::metrics;

/// One document write that failed after the relational change committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub collection: String,
    pub api_key: String,
    pub action: &'static str,
    pub error: String,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} in {}: {}",
            self.action, self.api_key, self.collection, self.error
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SyncState {
    Pending,
    RelationalCommitted,
    Synchronized,
    PartiallySynchronized(Vec<SyncFailure>),
}

impl SyncState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncState::Synchronized | SyncState::PartiallySynchronized(_)
        )
    }

    /// Metrics label of a terminal state.
    pub fn label(&self) -> &'static str {
        match self {
            SyncState::Pending => "pending",
            SyncState::RelationalCommitted => "relational_committed",
            SyncState::Synchronized => "synchronized",
            SyncState::PartiallySynchronized(_) => "partial",
        }
    }
}

/// Outcome of a synchronized write: the committed value and how far the
/// document mirrors followed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport<T> {
    pub value: T,
    pub state: SyncState,
}

impl<T> SyncReport<T> {
    pub fn is_synchronized(&self) -> bool {
        self.state == SyncState::Synchronized
    }

    pub fn failures(&self) -> &[SyncFailure] {
        match &self.state {
            SyncState::PartiallySynchronized(failures) => failures,
            _ => &[],
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SyncReport<U> {
        SyncReport {
            value: f(self.value),
            state: self.state,
        }
    }
}

/// What a full resynchronization touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResyncSummary {
    /// Documents re-derived and upserted.
    pub written: usize,
    /// Documents removed because their relational row is gone.
    pub removed: u64,
}

/// Drives one operation through its states.
#[derive(Debug)]
pub(crate) struct Tracker {
    entity: &'static str,
    op: &'static str,
    state: SyncState,
    failures: Vec<SyncFailure>,
}

impl Tracker {
    pub(crate) fn new(entity: &'static str, op: &'static str) -> Self {
        Self {
            entity,
            op,
            state: SyncState::Pending,
            failures: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> &SyncState {
        &self.state
    }

    /// Records the outcome of the relational write. On error the operation
    /// is rejected and the error handed back.
    pub(crate) fn commit<T>(&mut self, result: crate::error::Result<T>) -> crate::error::Result<T> {
        debug_assert_eq!(self.state, SyncState::Pending);
        match result {
            Ok(value) => {
                self.state = SyncState::RelationalCommitted;
                Ok(value)
            }
            Err(e) => {
                metrics::record_sync(self.entity, self.op, "rejected");
                Err(e)
            }
        }
    }

    /// Absorbs the outcome of a document operation.
    pub(crate) fn absorb<T>(
        &mut self,
        collection: &str,
        api_key: &str,
        action: &'static str,
        result: crate::error::Result<T>,
    ) -> Option<T> {
        debug_assert_eq!(self.state, SyncState::RelationalCommitted);
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    entity = self.entity,
                    op = self.op,
                    collection,
                    api_key,
                    action,
                    error = %e,
                    "Document mirror out of sync"
                );
                self.failures.push(SyncFailure {
                    collection: collection.to_string(),
                    api_key: api_key.to_string(),
                    action,
                    error: e.to_string(),
                });
                None
            }
        }
    }

    pub(crate) fn finish<T>(self, value: T) -> SyncReport<T> {
        let state = if self.failures.is_empty() {
            SyncState::Synchronized
        } else {
            SyncState::PartiallySynchronized(self.failures)
        };
        metrics::record_sync(self.entity, self.op, state.label());
        SyncReport { value, state }
    }
}
