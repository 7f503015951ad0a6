//! Stress workers and thread placement
//!
//! Each worker is a named OS thread that loops reserve, synthetic work,
//! commit for its role until it holds a sequence at or beyond the configured
//! maximum. Threads may be pinned to CPU cores round-robin.

use crate::ring::{CallerId, RingBuffer, Result};
use core_affinity::CoreId;
use serde::Serialize;
use std::fmt;
use std::hint::black_box;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Which side of the ring a worker drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Writer,
    Reader,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Writer => f.write_str("writer"),
            Role::Reader => f.write_str("reader"),
        }
    }
}

/// What a worker did before it stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub role: Role,
    pub id: CallerId,
    /// Completed reserve/commit cycles
    pub operations: u64,
    /// The sequence that made the worker stop
    pub last_sequence: u64,
    /// Core the thread was pinned to, if any
    pub core: Option<usize>,
}

/// Static description of one worker thread
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub role: Role,
    pub id: CallerId,
    pub max_sequence: u64,
    pub work_factor: u32,
    pub core: Option<CoreId>,
}

impl WorkerSpec {
    pub fn thread_name(&self) -> String {
        format!("{role}-{id}", role = self.role, id = self.id)
    }
}

/// Busy work that grows with the cube of the worker id
///
/// Faster workers (small ids) overtake slower ones, which is what drives the
/// out-of-order commit path.
pub fn synthetic_work(worker_id: CallerId, work_factor: u32) -> u64 {
    let n = worker_id as u64 * u64::from(work_factor);
    let mut acc = 0u64;
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                acc = acc.wrapping_add((i + 2) * (j + 2) * (k + 2));
            }
        }
    }
    black_box(acc)
}

/// Run the reserve/commit loop for `spec` on the current thread
///
/// # Errors
/// Propagates commit misuse errors, which indicate a bug in the loop itself.
pub fn run_worker(ring: &RingBuffer, spec: &WorkerSpec) -> Result<WorkerStats> {
    let mut operations = 0u64;
    loop {
        let sequence = match spec.role {
            Role::Writer => ring.reserve_write(spec.id),
            Role::Reader => ring.reserve_read(spec.id),
        };
        tracing::trace!(role = %spec.role, worker = spec.id, sequence, "hold");

        synthetic_work(spec.id, spec.work_factor);

        match spec.role {
            Role::Writer => ring.commit_write(spec.id, sequence)?,
            Role::Reader => ring.commit_read(spec.id, sequence)?,
        }
        operations += 1;
        tracing::trace!(role = %spec.role, worker = spec.id, sequence, "commit");

        if sequence >= spec.max_sequence {
            return Ok(WorkerStats {
                role: spec.role,
                id: spec.id,
                operations,
                last_sequence: sequence,
                core: spec.core.map(|core| core.id),
            });
        }
    }
}

/// Spawn a named worker thread
///
/// # Errors
/// Fails if the OS refuses to create the thread.
pub fn spawn_worker(
    ring: Arc<RingBuffer>,
    spec: WorkerSpec,
) -> std::io::Result<JoinHandle<Result<WorkerStats>>> {
    let name = spec.thread_name();
    thread::Builder::new().name(name.clone()).spawn(move || {
        set_affinity_if_defined(spec.core, &name);
        run_worker(&ring, &spec)
    })
}

/// Cores to pin workers to, round-robin; empty if they cannot be listed
pub fn core_plan(workers: usize) -> Vec<Option<CoreId>> {
    let cores = core_affinity::get_core_ids().unwrap_or_default();
    if cores.is_empty() {
        tracing::warn!("CPU cores could not be enumerated, workers will not be pinned");
        return vec![None; workers];
    }
    (0..workers)
        .map(|i| Some(cores[i % cores.len()]))
        .collect()
}

fn set_affinity_if_defined(affinity: Option<CoreId>, thread_name: &str) {
    if let Some(core_id) = affinity {
        if core_affinity::set_for_current(core_id) {
            tracing::debug!(thread = thread_name, core = core_id.id, "pinned worker");
        } else {
            tracing::warn!(
                thread = thread_name,
                core = core_id.id,
                "could not pin worker to core"
            );
        }
    }
}
