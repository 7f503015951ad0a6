//! SeqRing reserve/commit ring buffer
//!
//! This module holds the sequencer core: four monotonically increasing cursors,
//! the compare-and-swap commit protocol that keeps commits in reservation
//! order, and the wait/wake channels that park callers on a full or empty
//! buffer.

pub mod config;
pub mod observer;
pub mod ring_buffer;
pub mod sequence;
pub mod wait_strategy;


pub use config::{RingBufferBuilder, RingConfig};
pub use observer::{
    CursorSnapshot, NoOpObserver, Operation, Resolution, SequenceObserver, Suspension,
    TracingObserver,
};
pub use ring_buffer::RingBuffer;
pub use sequence::Sequence;
pub use wait_strategy::{WaitChannel, WaitChannels, WaitGranularity, WaitOutcome, WaitPhase};

/// Opaque caller identifier, used only for diagnostics
pub type CallerId = usize;

/// Parallel execution units the ring buffer requires by default
pub const MIN_PARALLELISM: usize = 4;

/// Errors that can occur in the ring buffer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    #[error("Capacity must be positive, got: {0}")]
    InvalidCapacity(usize),

    #[error("Ring buffer requires parallelism of at least {required}, got: {available}")]
    InsufficientParallelism { required: usize, available: usize },

    #[error("Timeout waiting for {operation} of sequence {sequence}")]
    Timeout { operation: Operation, sequence: u64 },

    #[error("Sequence {sequence} already committed by {operation} (cursor at {cursor})")]
    AlreadyCommitted {
        operation: Operation,
        sequence: u64,
        cursor: u64,
    },

    #[error("Sequence {sequence} was never reserved for {operation} (next reservation is {reserved})")]
    NotReserved {
        operation: Operation,
        sequence: u64,
        reserved: u64,
    },

    #[error("Sequence {sequence} was reserved but never granted for {operation}")]
    NotGranted { operation: Operation, sequence: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RingError>;

/// Parallelism the process can actually use, 1 if it cannot be determined
pub fn detected_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_parallelism_is_positive() {
        assert!(detected_parallelism() >= 1);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            RingError::InvalidCapacity(0).to_string(),
            "Capacity must be positive, got: 0"
        );
        assert_eq!(
            RingError::Timeout {
                operation: Operation::ReserveRead,
                sequence: 4
            }
            .to_string(),
            "Timeout waiting for reserve-read of sequence 4"
        );
    }
}
