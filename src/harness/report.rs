//! Stress run report

use crate::harness::{Role, WorkerStats};
use crate::ring::CursorSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Outcome of a stress run
#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    pub capacity: usize,
    pub max_sequence: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: f64,
    /// Rough budget of 2ms per sequence, plus one sequence per writer
    pub expected_ms: u64,
    pub cpus: usize,
    pub workers: Vec<WorkerStats>,
    pub cursors: CursorSnapshot,
    pub total_wait_ms: Option<f64>,
    /// Every reservation was committed and worker totals match the cursors
    pub consistent: bool,
}

impl StressReport {
    pub fn new(
        capacity: usize,
        max_sequence: u64,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        workers: Vec<WorkerStats>,
        cursors: CursorSnapshot,
        total_wait: Option<Duration>,
    ) -> Self {
        let finished_at = started_at
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        let writers = workers.iter().filter(|stats| stats.role == Role::Writer).count();
        let expected_ms = (max_sequence + writers as u64) * 2;
        let consistent = Self::check_consistency(&workers, &cursors);

        Self {
            capacity,
            max_sequence,
            started_at,
            finished_at,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            expected_ms,
            cpus: crate::ring::detected_parallelism(),
            workers,
            cursors,
            total_wait_ms: total_wait.map(|wait| wait.as_secs_f64() * 1000.0),
            consistent,
        }
    }

    /// Total operations completed by workers of one role
    pub fn operations(&self, role: Role) -> u64 {
        role_total(&self.workers, role)
    }

    fn check_consistency(workers: &[WorkerStats], cursors: &CursorSnapshot) -> bool {
        cursors.write_commit == cursors.write_reserve
            && cursors.read_commit == cursors.read_reserve
            && role_total(workers, Role::Writer) == cursors.write_commit
            && role_total(workers, Role::Reader) == cursors.read_commit
    }
}

fn role_total(workers: &[WorkerStats], role: Role) -> u64 {
    workers
        .iter()
        .filter(|stats| stats.role == role)
        .map(|stats| stats.operations)
        .sum()
}

impl fmt::Display for StressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}~{} cpus={} capacity={} max_sequence={}",
            self.started_at.format("%Y-%m-%dT%H:%M:%S%.9f"),
            self.finished_at.format("%Y-%m-%dT%H:%M:%S%.9f"),
            self.cpus,
            self.capacity,
            self.max_sequence
        )?;
        for stats in &self.workers {
            writeln!(
                f,
                "  {} {}: {} operations, stopped at {}",
                stats.role, stats.id, stats.operations, stats.last_sequence
            )?;
        }
        writeln!(f, "  cursors {}", self.cursors)?;
        if let Some(wait) = self.total_wait_ms {
            writeln!(f, "  total wait {wait:.3}ms")?;
        }
        write!(
            f,
            "cost {:.3}ms/{}ms consistent={}",
            self.elapsed_ms, self.expected_ms, self.consistent
        )
    }
}
