//! Diagnostics hooks
//!
//! The ring buffer reports to an injectable `SequenceObserver` at exactly two
//! points: when a caller is about to suspend, and when an operation resolves.
//! Observers never take part in scheduling. `TracingObserver` is the built-in
//! implementation installed by the diagnostics toggle; tests can supply their
//! own to assert on the instrumentation.

use crate::ring::CallerId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// The four core operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    ReserveWrite,
    CommitWrite,
    ReserveRead,
    CommitRead,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::ReserveWrite => "reserve-write",
            Operation::CommitWrite => "commit-write",
            Operation::ReserveRead => "reserve-read",
            Operation::CommitRead => "commit-read",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the four cursors
///
/// The cursors are loaded one by one, downstream first (`read_commit`,
/// `read_reserve`, `write_commit`, `write_reserve`). Since every cursor only
/// grows, this order keeps `read_commit <= read_reserve`,
/// `read_commit <= write_commit` and `write_commit <= write_reserve` true in
/// every snapshot even though the four loads are not one atomic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CursorSnapshot {
    pub read_reserve: u64,
    pub read_commit: u64,
    pub write_reserve: u64,
    pub write_commit: u64,
}

impl CursorSnapshot {
    /// Whether the ordering relations that hold at every instant hold here
    ///
    /// `read_reserve <= write_commit` is not checked: readers bump their
    /// reservation before finding out the buffer is empty.
    pub fn is_ordered(&self) -> bool {
        self.read_commit <= self.read_reserve
            && self.read_commit <= self.write_commit
            && self.write_commit <= self.write_reserve
    }

    /// Slots committed by writers and not yet committed by readers
    pub fn occupied(&self) -> u64 {
        self.write_commit - self.read_commit
    }
}

impl fmt::Display for CursorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rR={} rC={} wR={} wC={}",
            self.read_reserve, self.read_commit, self.write_reserve, self.write_commit
        )
    }
}

/// A caller is about to block
#[derive(Debug, Clone, Copy)]
pub struct Suspension {
    pub operation: Operation,
    pub caller: CallerId,
    pub sequence: u64,
    /// 1-based attempt number of the condition check that failed
    pub attempt: u32,
    /// Wall-clock time the cursors were read
    pub at: DateTime<Utc>,
    pub cursors: CursorSnapshot,
}

/// An operation finished, successfully or by deadline
#[derive(Debug, Clone, Copy)]
pub struct Resolution {
    pub operation: Operation,
    pub caller: CallerId,
    pub sequence: u64,
    pub attempts: u32,
    pub elapsed: Duration,
    pub timed_out: bool,
}

/// Observer invoked at the suspension and resolution points
pub trait SequenceObserver: Send + Sync + fmt::Debug {
    /// Called before each suspension
    fn on_suspend(&self, suspension: &Suspension);

    /// Called once per operation when it returns
    fn on_resolve(&self, resolution: &Resolution);

    /// Accumulated time spent inside observed operations, if tracked
    fn total_wait(&self) -> Option<Duration> {
        None
    }
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl SequenceObserver for NoOpObserver {
    fn on_suspend(&self, _suspension: &Suspension) {}

    fn on_resolve(&self, _resolution: &Resolution) {}
}

/// Emits `tracing` events and accumulates the wall-clock cost of every call
#[derive(Debug, Default)]
pub struct TracingObserver {
    total_wait_nanos: AtomicU64,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceObserver for TracingObserver {
    fn on_suspend(&self, s: &Suspension) {
        tracing::debug!(
            operation = %s.operation,
            caller = s.caller,
            sequence = s.sequence,
            attempt = s.attempt,
            at = %s.at.format("%H:%M:%S%.9f"),
            cursors = %s.cursors,
            "suspending"
        );
    }

    fn on_resolve(&self, r: &Resolution) {
        let nanos = u64::try_from(r.elapsed.as_nanos()).unwrap_or(u64::MAX);
        let total = self
            .total_wait_nanos
            .fetch_add(nanos, Ordering::Relaxed)
            .saturating_add(nanos);

        if r.timed_out {
            tracing::warn!(
                operation = %r.operation,
                caller = r.caller,
                sequence = r.sequence,
                attempts = r.attempts,
                cost = ?r.elapsed,
                "timed out"
            );
        } else {
            tracing::debug!(
                operation = %r.operation,
                caller = r.caller,
                sequence = r.sequence,
                attempts = r.attempts,
                cost = ?r.elapsed,
                total_cost = ?Duration::from_nanos(total),
                "resolved"
            );
        }
    }

    fn total_wait(&self) -> Option<Duration> {
        Some(Duration::from_nanos(
            self.total_wait_nanos.load(Ordering::Relaxed),
        ))
    }
}
