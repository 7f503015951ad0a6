//! Ring Buffer Implementation
//!
//! The `RingBuffer` hands out slot ownership to any number of concurrent
//! writers and readers. It stores no payload: a reservation yields a sequence
//! number, `slot_index` maps it onto the physical slot, and the caller keeps
//! its data wherever it likes.
//!
//! Reservation is a single `fetch_add` on the reserve cursor. Only the
//! boundary check afterwards (full for writers, empty for readers) may block.
//! Commits move the commit cursor with a compare-and-swap from `sequence` to
//! `sequence + 1`, so a caller that finished its work early waits until every
//! smaller sequence of its role has committed.
//!
//! Every reservation granted must be committed eventually. An abandoned
//! reservation stalls the commit cursor of its role for good, and with it
//! every caller on the other side.

use crate::ring::{
    CallerId, CursorSnapshot, Operation, RingBufferBuilder, RingError, Result, Resolution,
    Sequence, SequenceObserver, Suspension, WaitChannels, WaitGranularity, WaitPhase,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fixed-capacity multi-producer multi-consumer sequencer
pub struct RingBuffer {
    capacity: usize,
    write_reserve: Sequence,
    write_commit: Sequence,
    read_reserve: Sequence,
    read_commit: Sequence,
    waits: WaitChannels,
    observer: Option<Arc<dyn SequenceObserver>>,
}

impl RingBuffer {
    /// Create a ring buffer with the default settings and the given capacity
    ///
    /// # Errors
    /// `InvalidCapacity` if `capacity` is zero, `InsufficientParallelism` if
    /// the process has fewer than `MIN_PARALLELISM` execution units.
    pub fn new(capacity: usize) -> Result<Self> {
        RingBufferBuilder::new().capacity(capacity).build()
    }

    /// Start configuring a ring buffer
    pub fn builder() -> RingBufferBuilder {
        RingBufferBuilder::new()
    }

    pub(crate) fn from_parts(
        capacity: usize,
        granularity: WaitGranularity,
        observer: Option<Arc<dyn SequenceObserver>>,
    ) -> Self {
        Self {
            capacity,
            write_reserve: Sequence::default(),
            write_commit: Sequence::default(),
            read_reserve: Sequence::default(),
            read_commit: Sequence::default(),
            waits: WaitChannels::new(granularity),
            observer,
        }
    }

    /// Number of slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Physical slot of a sequence number
    #[inline]
    pub fn slot_index(&self, sequence: u64) -> usize {
        // The remainder is below capacity, which is a usize
        (sequence % self.capacity as u64) as usize
    }

    /// Wait channel topology in use
    pub fn granularity(&self) -> WaitGranularity {
        self.waits.granularity()
    }

    /// Current values of the four cursors
    pub fn snapshot(&self) -> CursorSnapshot {
        let read_commit = self.read_commit.get();
        let read_reserve = self.read_reserve.get();
        let write_commit = self.write_commit.get();
        let write_reserve = self.write_reserve.get();
        CursorSnapshot {
            read_reserve,
            read_commit,
            write_reserve,
            write_commit,
        }
    }

    /// Accumulated cost of observed calls, when the observer tracks it
    pub fn total_wait(&self) -> Option<Duration> {
        self.observer.as_ref().and_then(|observer| observer.total_wait())
    }

    /// Reserve the next write sequence, blocking while the buffer is full
    pub fn reserve_write(&self, caller: CallerId) -> u64 {
        let sequence = self.write_reserve.get_and_increment();
        let granted = self.await_reservable(Operation::ReserveWrite, caller, sequence, None);
        debug_assert!(granted);
        sequence
    }

    /// Reserve the next read sequence, blocking while the buffer is empty
    pub fn reserve_read(&self, caller: CallerId) -> u64 {
        let sequence = self.read_reserve.get_and_increment();
        let granted = self.await_reservable(Operation::ReserveRead, caller, sequence, None);
        debug_assert!(granted);
        sequence
    }

    /// Commit a write, blocking until every earlier write has committed
    ///
    /// # Errors
    /// `AlreadyCommitted` or `NotReserved` when `sequence` did not come from an
    /// outstanding `reserve_write`, `NotGranted` when its reservation timed out
    /// and has not been granted since. No cursor moves in any of these cases.
    pub fn commit_write(&self, caller: CallerId, sequence: u64) -> Result<()> {
        self.commit(Operation::CommitWrite, caller, sequence, None)
    }

    /// Commit a read, blocking until every earlier read has committed
    ///
    /// # Errors
    /// Same misuse errors as `commit_write`.
    pub fn commit_read(&self, caller: CallerId, sequence: u64) -> Result<()> {
        self.commit(Operation::CommitRead, caller, sequence, None)
    }

    /// Reserve a write sequence, giving up on the boundary wait after `timeout`
    ///
    /// # Errors
    /// `Timeout` carries the sequence that was reserved anyway. It stays owned
    /// by the caller, who must finish it with `await_write_slot` and
    /// `commit_write`.
    pub fn reserve_write_timeout(&self, caller: CallerId, timeout: Duration) -> Result<u64> {
        let sequence = self.write_reserve.get_and_increment();
        self.reserved_or_timeout(Operation::ReserveWrite, caller, sequence, timeout)
    }

    /// Reserve a read sequence, giving up on the boundary wait after `timeout`
    ///
    /// # Errors
    /// `Timeout` as for `reserve_write_timeout`; finish with `await_read_slot`.
    pub fn reserve_read_timeout(&self, caller: CallerId, timeout: Duration) -> Result<u64> {
        let sequence = self.read_reserve.get_and_increment();
        self.reserved_or_timeout(Operation::ReserveRead, caller, sequence, timeout)
    }

    /// Keep waiting for a write reservation that previously timed out
    pub fn await_write_slot(
        &self,
        caller: CallerId,
        sequence: u64,
        timeout: Duration,
    ) -> Result<u64> {
        self.ensure_reserved(Operation::ReserveWrite, sequence)?;
        self.reserved_or_timeout(Operation::ReserveWrite, caller, sequence, timeout)
    }

    /// Keep waiting for a read reservation that previously timed out
    pub fn await_read_slot(
        &self,
        caller: CallerId,
        sequence: u64,
        timeout: Duration,
    ) -> Result<u64> {
        self.ensure_reserved(Operation::ReserveRead, sequence)?;
        self.reserved_or_timeout(Operation::ReserveRead, caller, sequence, timeout)
    }

    /// Commit a write, giving up after `timeout` with the cursor untouched
    pub fn commit_write_timeout(
        &self,
        caller: CallerId,
        sequence: u64,
        timeout: Duration,
    ) -> Result<()> {
        self.commit(Operation::CommitWrite, caller, sequence, deadline_after(timeout))
    }

    /// Commit a read, giving up after `timeout` with the cursor untouched
    pub fn commit_read_timeout(
        &self,
        caller: CallerId,
        sequence: u64,
        timeout: Duration,
    ) -> Result<()> {
        self.commit(Operation::CommitRead, caller, sequence, deadline_after(timeout))
    }

    fn reserved_or_timeout(
        &self,
        operation: Operation,
        caller: CallerId,
        sequence: u64,
        timeout: Duration,
    ) -> Result<u64> {
        if self.await_reservable(operation, caller, sequence, deadline_after(timeout)) {
            Ok(sequence)
        } else {
            Err(RingError::Timeout {
                operation,
                sequence,
            })
        }
    }

    fn ensure_reserved(&self, operation: Operation, sequence: u64) -> Result<()> {
        let reserved = self.reserve_cursor(operation).get();
        if sequence >= reserved {
            return Err(RingError::NotReserved {
                operation,
                sequence,
                reserved,
            });
        }
        Ok(())
    }

    /// Whether a reserved sequence has passed, or may now pass, the boundary check
    ///
    /// Cursors only grow, so once this holds for a sequence it holds for good.
    fn is_granted(&self, operation: Operation, sequence: u64) -> bool {
        match operation {
            Operation::ReserveWrite | Operation::CommitWrite => {
                sequence < self.read_commit.get() + self.capacity as u64
            }
            Operation::ReserveRead | Operation::CommitRead => sequence < self.write_commit.get(),
        }
    }

    /// Loop until the boundary check passes; false only when the deadline hits
    fn await_reservable(
        &self,
        operation: Operation,
        caller: CallerId,
        sequence: u64,
        deadline: Option<Instant>,
    ) -> bool {
        let phase = match operation {
            Operation::ReserveWrite | Operation::CommitWrite => WaitPhase::WriteReserve,
            Operation::ReserveRead | Operation::CommitRead => WaitPhase::ReadReserve,
        };
        let started = self.observer.as_ref().map(|_| Instant::now());
        let mut attempt = 0;

        loop {
            attempt += 1;
            if self.is_granted(operation, sequence) {
                self.resolve(operation, caller, sequence, attempt, started, false);
                return true;
            }
            if is_expired(deadline) {
                self.resolve(operation, caller, sequence, attempt, started, true);
                return false;
            }

            self.suspend(operation, caller, sequence, attempt);
            self.waits.park(phase, deadline, || {
                self.is_granted(operation, sequence)
            });
        }
    }

    fn commit(
        &self,
        operation: Operation,
        caller: CallerId,
        sequence: u64,
        deadline: Option<Instant>,
    ) -> Result<()> {
        let (cursor, phase, wake) = match operation {
            Operation::ReserveWrite | Operation::CommitWrite => (
                &self.write_commit,
                WaitPhase::WriteCommit,
                [WaitPhase::ReadReserve, WaitPhase::WriteCommit],
            ),
            Operation::ReserveRead | Operation::CommitRead => (
                &self.read_commit,
                WaitPhase::ReadCommit,
                [WaitPhase::WriteReserve, WaitPhase::ReadCommit],
            ),
        };
        self.ensure_reserved(operation, sequence)?;
        // A reservation whose boundary wait timed out is not committable yet
        if !self.is_granted(operation, sequence) {
            return Err(RingError::NotGranted {
                operation,
                sequence,
            });
        }

        let started = self.observer.as_ref().map(|_| Instant::now());
        let mut attempt = 0;

        loop {
            attempt += 1;
            match cursor.compare_and_set(sequence, sequence + 1) {
                Ok(_) => {
                    self.waits.wake(&wake);
                    self.resolve(operation, caller, sequence, attempt, started, false);
                    return Ok(());
                }
                Err(current) if current > sequence => {
                    return Err(RingError::AlreadyCommitted {
                        operation,
                        sequence,
                        cursor: current,
                    });
                }
                Err(_) => {}
            }

            if is_expired(deadline) {
                self.resolve(operation, caller, sequence, attempt, started, true);
                return Err(RingError::Timeout {
                    operation,
                    sequence,
                });
            }

            // An earlier sequence of this role is still outstanding
            self.suspend(operation, caller, sequence, attempt);
            self.waits.park(phase, deadline, || cursor.get() >= sequence);
        }
    }

    fn reserve_cursor(&self, operation: Operation) -> &Sequence {
        match operation {
            Operation::ReserveWrite | Operation::CommitWrite => &self.write_reserve,
            Operation::ReserveRead | Operation::CommitRead => &self.read_reserve,
        }
    }

    fn suspend(&self, operation: Operation, caller: CallerId, sequence: u64, attempt: u32) {
        if let Some(observer) = &self.observer {
            observer.on_suspend(&Suspension {
                operation,
                caller,
                sequence,
                attempt,
                at: chrono::Utc::now(),
                cursors: self.snapshot(),
            });
        }
    }

    fn resolve(
        &self,
        operation: Operation,
        caller: CallerId,
        sequence: u64,
        attempts: u32,
        started: Option<Instant>,
        timed_out: bool,
    ) {
        if let (Some(observer), Some(started)) = (&self.observer, started) {
            observer.on_resolve(&Resolution {
                operation,
                caller,
                sequence,
                attempts,
                elapsed: started.elapsed(),
                timed_out,
            });
        }
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("granularity", &self.granularity())
            .field("cursors", &self.snapshot())
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

fn is_expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}
