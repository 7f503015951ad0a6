//! `SeqRing` - Reserve/Commit Ring Buffer Sequencer
//!
//! A fixed-capacity circular buffer that lets many concurrent writers and
//! many concurrent readers reserve and commit slots independently, without a
//! global lock on the hot path.
//!
//! ## Features
//!
//! - **Lock-free fast path**: reserving is one atomic increment, committing one compare-and-swap
//! - **Ordered commits**: commits of a role become visible in reservation order
//! - **Backpressure**: writers park on a full buffer, readers on an empty one
//! - **Configurable wake topology**: coarse (two channels) or fine-grained (four)
//! - **Observable**: pluggable observer with a `tracing`-based implementation
//!
//! ## Quick Start
//!
//! ```rust
//! use seqring::ring::RingBuffer;
//!
//! let ring = RingBuffer::builder()
//!     .capacity(8)
//!     .parallelism(4)
//!     .build()
//!     .unwrap();
//!
//! // Writer side
//! let write = ring.reserve_write(1);
//! let slot = ring.slot_index(write);
//! // ... fill slot `slot` of your own storage ...
//! ring.commit_write(1, write).unwrap();
//!
//! // Reader side
//! let read = ring.reserve_read(2);
//! assert_eq!(ring.slot_index(read), slot);
//! ring.commit_read(2, read).unwrap();
//! ```
//!
//! ## Architecture
//!
//! - **`Sequence`**: cache-padded atomic cursor
//! - **`RingBuffer`**: the four cursors plus the reserve/commit protocol
//! - **`WaitChannels`**: guarded-wait channels that park callers
//! - **`SequenceObserver`**: diagnostics hook at suspension and resolution points
//! - **`harness`**: multi-threaded stress driver used by the `seqring` binary
//!
//! ## Caveats
//!
//! A granted reservation must always be committed. Abandoning one stalls the
//! commit cursor of that role, and eventually every caller on both sides.
//! Cursors are `u64` and are never wrapped; overflowing them after 2^64
//! operations is not handled.

pub mod harness;
pub mod ring;

// Re-export the main types for convenience
pub use ring::{
    CallerId,
    CursorSnapshot,
    NoOpObserver,
    Operation,
    Result,
    RingBuffer,
    RingBufferBuilder,
    RingConfig,
    RingError,
    Sequence,
    SequenceObserver,
    TracingObserver,
    WaitGranularity,
    MIN_PARALLELISM,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the version of the `SeqRing` library
#[must_use]
pub fn version() -> &'static str {
    VERSION
}
