//! Ring buffer configuration and fluent builder

use crate::ring::{
    detected_parallelism, RingBuffer, RingError, Result, SequenceObserver, TracingObserver,
    WaitGranularity, MIN_PARALLELISM,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Serializable ring buffer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Number of slots
    pub capacity: usize,
    /// Wait channel topology
    pub granularity: WaitGranularity,
    /// Install a `TracingObserver`
    pub diagnostics: bool,
    /// Minimum parallel execution units required at construction
    pub min_parallelism: usize,
    /// Execution units provisioned for the workers; detected when absent
    pub parallelism: Option<usize>,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            granularity: WaitGranularity::default(),
            diagnostics: false,
            min_parallelism: MIN_PARALLELISM,
            parallelism: None,
        }
    }
}

impl RingConfig {
    /// Check the settings, capacity first
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(RingError::InvalidCapacity(self.capacity));
        }

        let available = self.parallelism.unwrap_or_else(detected_parallelism);
        if available < self.min_parallelism {
            return Err(RingError::InsufficientParallelism {
                required: self.min_parallelism,
                available,
            });
        }

        Ok(())
    }
}

/// Fluent builder for `RingBuffer`
///
/// # Examples
///
/// ```rust
/// use seqring::ring::{RingBuffer, WaitGranularity};
///
/// let ring = RingBuffer::builder()
///     .capacity(8)
///     .granularity(WaitGranularity::Coarse)
///     .parallelism(4)
///     .build()
///     .unwrap();
/// assert_eq!(ring.capacity(), 8);
/// ```
#[derive(Debug, Default)]
pub struct RingBufferBuilder {
    config: RingConfig,
    observer: Option<Arc<dyn SequenceObserver>>,
}

impl RingBufferBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration
    pub fn from_config(config: RingConfig) -> Self {
        Self {
            config,
            observer: None,
        }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn granularity(mut self, granularity: WaitGranularity) -> Self {
        self.config.granularity = granularity;
        self
    }

    /// Trace every suspension and resolution and accumulate wait time
    ///
    /// Ignored when an explicit observer is set.
    pub fn diagnostics(mut self, enabled: bool) -> Self {
        self.config.diagnostics = enabled;
        self
    }

    /// Install a custom observer
    pub fn observer(mut self, observer: Arc<dyn SequenceObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Declare how many execution units the workers will run on
    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.config.parallelism = Some(parallelism);
        self
    }

    pub fn min_parallelism(mut self, min_parallelism: usize) -> Self {
        self.config.min_parallelism = min_parallelism;
        self
    }

    /// Validate and construct the ring buffer
    ///
    /// # Errors
    /// `InvalidCapacity` for a zero capacity, `InsufficientParallelism` when
    /// fewer execution units than required are available.
    pub fn build(self) -> Result<RingBuffer> {
        self.config.validate()?;

        let observer = match self.observer {
            Some(observer) => Some(observer),
            None if self.config.diagnostics => {
                Some(Arc::new(TracingObserver::new()) as Arc<dyn SequenceObserver>)
            }
            None => None,
        };

        Ok(RingBuffer::from_parts(
            self.config.capacity,
            self.config.granularity,
            observer,
        ))
    }
}
