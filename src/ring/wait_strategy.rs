//! Wait/wake coordination
//!
//! Callers that cannot proceed (buffer full, buffer empty, or not yet at the
//! head of the commit order) park on a wait channel and are released by the
//! complementary side's progress. A channel is a mutex paired with a condition
//! variable; the mutex guards only the suspend/resume choreography, never the
//! cursors themselves.
//!
//! Two topologies are supported. `FineGrained` gives each of the four wait
//! phases its own channel. `Coarse` folds them into one channel per role, so a
//! writer waiting for space and a writer waiting for its commit turn share a
//! channel and may wake each other spuriously.

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{fence, AtomicUsize, Ordering};
use std::time::Instant;

/// How many distinct wait channels the ring buffer uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitGranularity {
    /// Two channels: one for writers, one for readers
    Coarse,
    /// Four channels: reserve and commit phases are kept apart per role
    #[default]
    FineGrained,
}

impl WaitGranularity {
    /// Number of channels this topology allocates
    pub fn channel_count(self) -> usize {
        match self {
            WaitGranularity::Coarse => 2,
            WaitGranularity::FineGrained => 4,
        }
    }

    /// Channel a caller in `phase` parks on
    pub fn channel_index(self, phase: WaitPhase) -> usize {
        match (self, phase) {
            (WaitGranularity::Coarse, WaitPhase::WriteReserve | WaitPhase::WriteCommit) => 0,
            (WaitGranularity::Coarse, WaitPhase::ReadReserve | WaitPhase::ReadCommit) => 1,
            (WaitGranularity::FineGrained, WaitPhase::WriteReserve) => 0,
            (WaitGranularity::FineGrained, WaitPhase::ReadReserve) => 1,
            (WaitGranularity::FineGrained, WaitPhase::WriteCommit) => 2,
            (WaitGranularity::FineGrained, WaitPhase::ReadCommit) => 3,
        }
    }
}

impl std::str::FromStr for WaitGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coarse" => Ok(WaitGranularity::Coarse),
            "fine" | "fine-grained" | "fine_grained" => Ok(WaitGranularity::FineGrained),
            _ => Err(format!("Invalid wait granularity: {s}")),
        }
    }
}

/// The reason a caller is suspended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    /// Writer waiting for a reader to vacate a slot (buffer full)
    WriteReserve,
    /// Writer waiting for earlier writers to commit
    WriteCommit,
    /// Reader waiting for a writer to commit data (buffer empty)
    ReadReserve,
    /// Reader waiting for earlier readers to commit
    ReadCommit,
}

/// Result of a single park on a wait channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition already held once the channel lock was taken
    Ready,
    /// The caller slept and was notified (possibly spuriously)
    Woken,
    /// The deadline passed while sleeping
    TimedOut,
}

/// A single guarded-wait channel
#[derive(Debug, Default)]
pub struct WaitChannel {
    mutex: Mutex<()>,
    condvar: Condvar,
    waiters: AtomicUsize,
}

impl WaitChannel {
    /// Create an idle wait channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend once unless `ready` already holds
    ///
    /// The condition is evaluated under the channel lock after the caller has
    /// registered as a waiter, so a notifier that advanced a cursor either
    /// becomes visible to `ready` or observes the registration and notifies.
    /// Callers must loop and re-check: `Woken` is not proof of anything.
    pub fn park<F>(&self, deadline: Option<Instant>, ready: F) -> WaitOutcome
    where
        F: Fn() -> bool,
    {
        let mut guard = self.mutex.lock();
        self.waiters.fetch_add(1, Ordering::SeqCst);
        fence(Ordering::SeqCst);

        let outcome = if ready() {
            WaitOutcome::Ready
        } else {
            match deadline {
                None => {
                    self.condvar.wait(&mut guard);
                    WaitOutcome::Woken
                }
                Some(deadline) => {
                    if self.condvar.wait_until(&mut guard, deadline).timed_out() {
                        WaitOutcome::TimedOut
                    } else {
                        WaitOutcome::Woken
                    }
                }
            }
        };

        self.waiters.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    /// Wake every parked caller
    ///
    /// Skips the lock entirely when nobody is registered. The fence pairs with
    /// the one in `park`: the cursor update preceding this call and the waiter
    /// registration cannot both be missed.
    pub fn notify_all(&self) -> bool {
        fence(Ordering::SeqCst);
        if self.waiters.load(Ordering::SeqCst) == 0 {
            return false;
        }
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
        true
    }

    /// Number of callers currently registered on this channel
    pub fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::Acquire)
    }
}

/// The full set of wait channels for one ring buffer
#[derive(Debug)]
pub struct WaitChannels {
    granularity: WaitGranularity,
    channels: Box<[WaitChannel]>,
}

impl WaitChannels {
    /// Allocate the channels for the given topology
    pub fn new(granularity: WaitGranularity) -> Self {
        let channels = (0..granularity.channel_count())
            .map(|_| WaitChannel::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            granularity,
            channels,
        }
    }

    /// The configured topology
    pub fn granularity(&self) -> WaitGranularity {
        self.granularity
    }

    /// Channel used by callers in `phase`
    pub fn channel(&self, phase: WaitPhase) -> &WaitChannel {
        &self.channels[self.granularity.channel_index(phase)]
    }

    /// Park once on the channel for `phase`
    pub fn park<F>(&self, phase: WaitPhase, deadline: Option<Instant>, ready: F) -> WaitOutcome
    where
        F: Fn() -> bool,
    {
        self.channel(phase).park(deadline, ready)
    }

    /// Broadcast to the channels of every listed phase, each channel at most once
    pub fn wake(&self, phases: &[WaitPhase]) {
        let mut notified = [false; 4];
        for &phase in phases {
            let index = self.granularity.channel_index(phase);
            if !notified[index] {
                notified[index] = true;
                self.channels[index].notify_all();
            }
        }
    }
}
