//! Core data model.
//!
//! Identifiers and snapshots shared by the queues, the telemetry helpers
//! and the CLI.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Queue identity
// ---------------------------------------------------------------------------

/// Newtype for queue IDs. Used only for log and span correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueId(pub Uuid);

impl QueueId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for QueueId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Point-in-time view of a queue's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Maximum number of jobs in flight.
    pub concurrency: usize,
    /// Jobs admitted but not yet dispatched.
    pub pending: usize,
    /// Jobs dispatched whose completion signal has not fired yet.
    pub active: usize,
    /// Highest value `active` has reached over the queue's lifetime.
    pub peak_active: usize,
    pub held: bool,
    /// Total jobs admitted.
    pub admitted: u64,
    /// Total completion signals observed.
    pub completed: u64,
    /// Times the last active job finished with nothing left pending.
    pub drains: u64,
}

// ---------------------------------------------------------------------------
// Collected results
// ---------------------------------------------------------------------------

/// One job's report, as recorded by a `CollectingWorkingQueue`.
///
/// `id` is assigned at submission, starting at 0, so sorting by it
/// restores submission order. The collector never interprets `error`
/// or `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collected<T, E> {
    pub id: u64,
    pub error: Option<E>,
    pub value: Option<T>,
}

impl<T, E> Collected<T, E> {
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}
