//! Stress harness
//!
//! Spins up writer and reader workers against one ring buffer, waits for all
//! of them, and reports timing and cursor totals. The ring itself knows
//! nothing about the maximum sequence; termination lives entirely here.

pub mod report;
pub mod worker;

pub use report::StressReport;
pub use worker::{run_worker, spawn_worker, synthetic_work, Role, WorkerSpec, WorkerStats};

use crate::ring::{RingBuffer, RingError};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Stress run settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    pub writers: usize,
    pub readers: usize,
    /// Workers stop once they hold a sequence at or beyond this value;
    /// defaults to `capacity * 100`
    pub max_sequence: Option<u64>,
    /// Multiplier for the synthetic work between reserve and commit
    pub work_factor: u32,
    /// Pin worker threads to CPU cores
    pub pin_cores: bool,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            writers: 5,
            readers: 5,
            max_sequence: None,
            work_factor: 1,
            pin_cores: false,
        }
    }
}

impl StressConfig {
    /// Maximum sequence for a ring of the given capacity
    pub fn max_sequence_for(&self, capacity: usize) -> u64 {
        self.max_sequence.unwrap_or(capacity as u64 * 100)
    }

    /// Reject worker mixes whose stop rule cannot terminate
    ///
    /// Every worker stops on the first sequence at or beyond the maximum, so
    /// writers commit exactly `writers` sequences past it and readers claim
    /// `readers` of them. More readers than writers leaves a reader waiting
    /// on an empty buffer forever; more writers than `readers + capacity`
    /// leaves a writer waiting on a full one.
    pub fn validate(&self, capacity: usize) -> Result<(), RingError> {
        if self.writers == 0 || self.readers == 0 {
            return Err(RingError::InvalidConfig(
                "at least one writer and one reader are required".to_string(),
            ));
        }
        if self.readers > self.writers {
            return Err(RingError::InvalidConfig(format!(
                "readers ({}) must not outnumber writers ({})",
                self.readers, self.writers
            )));
        }
        if self.writers > self.readers + capacity {
            return Err(RingError::InvalidConfig(format!(
                "writers ({}) must not exceed readers plus capacity ({})",
                self.writers,
                self.readers + capacity
            )));
        }
        Ok(())
    }
}

/// Run the stress workload to completion
///
/// # Errors
/// Invalid worker mix, thread spawn failure, a panicked worker, or a commit
/// misuse error reported by a worker.
pub fn run_stress(ring: Arc<RingBuffer>, config: &StressConfig) -> anyhow::Result<StressReport> {
    let capacity = ring.capacity();
    config.validate(capacity)?;
    let max_sequence = config.max_sequence_for(capacity);

    let workers = config.writers + config.readers;
    let cores = if config.pin_cores {
        worker::core_plan(workers)
    } else {
        vec![None; workers]
    };

    let started_at = chrono::Utc::now();
    let started = Instant::now();
    tracing::info!(
        capacity,
        writers = config.writers,
        readers = config.readers,
        max_sequence,
        "starting stress run"
    );

    let specs = (1..=config.writers)
        .map(|id| (Role::Writer, id))
        .chain((1..=config.readers).map(|id| (Role::Reader, id)))
        .zip(cores)
        .map(|((role, id), core)| WorkerSpec {
            role,
            id,
            max_sequence,
            work_factor: config.work_factor,
            core,
        });

    let mut handles = Vec::with_capacity(workers);
    for spec in specs {
        let name = spec.thread_name();
        let handle = spawn_worker(Arc::clone(&ring), spec)
            .with_context(|| format!("failed to spawn {name}"))?;
        handles.push((name, handle));
    }

    let mut stats = Vec::with_capacity(workers);
    for (name, handle) in handles {
        let worker_stats = handle
            .join()
            .map_err(|_| anyhow::anyhow!("{name} panicked"))?
            .with_context(|| format!("{name} failed"))?;
        stats.push(worker_stats);
    }

    let report = StressReport::new(
        capacity,
        max_sequence,
        started_at,
        started.elapsed(),
        stats,
        ring.snapshot(),
        ring.total_wait(),
    );
    tracing::info!(
        elapsed_ms = report.elapsed_ms,
        consistent = report.consistent,
        "stress run finished"
    );
    Ok(report)
}
