//! Sequence cursor implementation
//!
//! A `Sequence` is one of the four monotonically increasing cursors of the ring
//! buffer. Reserve cursors only ever move through `get_and_increment`, commit
//! cursors only through `compare_and_set`. Each cursor sits on its own cache
//! line.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// A cache-padded, unbounded 64-bit cursor
///
/// The logical sequence space is never wrapped; only the physical slot index
/// is taken modulo the capacity. Exhausting `u64` is out of scope.
pub struct Sequence {
    value: CachePadded<AtomicU64>,
}

impl Sequence {
    /// Create a new sequence with the given initial value
    pub fn new(initial_value: u64) -> Self {
        Self {
            value: CachePadded::new(AtomicU64::new(initial_value)),
        }
    }

    /// Get the current sequence value
    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Get the current value and then increment
    ///
    /// The returned pre-increment value is the caller's reservation.
    #[inline]
    pub fn get_and_increment(&self) -> u64 {
        self.value.fetch_add(1, Ordering::AcqRel)
    }

    /// Atomically move the cursor from `expected` to `new`
    ///
    /// Returns `Ok(expected)` on success and `Err(actual)` with the value
    /// observed otherwise. Never fails spuriously.
    #[inline]
    pub fn compare_and_set(&self, expected: u64, new: u64) -> Result<u64, u64> {
        self.value
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("value", &self.get())
            .finish()
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequence_default_starts_at_zero() {
        let seq = Sequence::default();
        assert_eq!(seq.get(), 0);
    }

    #[test]
    fn test_sequence_get_and_increment() {
        let seq = Sequence::new(7);
        assert_eq!(seq.get_and_increment(), 7);
        assert_eq!(seq.get_and_increment(), 8);
        assert_eq!(seq.get(), 9);
    }

    #[test]
    fn test_sequence_compare_and_set() {
        let seq = Sequence::new(10);

        // Successful CAS
        assert_eq!(seq.compare_and_set(10, 11), Ok(10));
        assert_eq!(seq.get(), 11);

        // Failed CAS reports the current value
        assert_eq!(seq.compare_and_set(10, 12), Err(11));
        assert_eq!(seq.get(), 11);
    }

    #[test]
    fn test_sequence_display() {
        let seq = Sequence::new(42);
        assert_eq!(seq.to_string(), "42");
        assert_eq!(format!("{seq:?}"), "Sequence { value: 42 }");
    }

    #[test]
    fn test_sequence_thread_safety() {
        let seq = Arc::new(Sequence::new(0));
        let mut handles = vec![];

        for _ in 0..10 {
            let seq_clone = Arc::clone(&seq);
            handles.push(thread::spawn(move || {
                (0..1000)
                    .map(|_| seq_clone.get_and_increment())
                    .collect::<Vec<_>>()
            }));
        }

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        all.sort_unstable();

        // Every reservation is handed out exactly once
        assert_eq!(all, (0..10_000).collect::<Vec<u64>>());
        assert_eq!(seq.get(), 10_000);
    }
}
