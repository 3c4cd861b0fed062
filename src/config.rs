//! Configuration Module - Barrier Tuning Parameters
//!
//! Manages all configuration parameters for the barrier subsystem.
//! Proper configuration balances mutator overhead against refinement and
//! marking latency.

/// Main configuration for the barrier subsystem
///
/// Stores all parameters affecting barrier behavior.
/// Most parameters have sensible defaults.
///
/// # Examples
///
/// ```rust
/// use gc_barrier::BarrierConfig;
///
/// // Use default configuration
/// let config = BarrierConfig::default();
///
/// // Custom configuration for a small simulated heap
/// let config = BarrierConfig {
///     heap_size: 16 * 1024 * 1024,
///     region_size: 1024 * 1024,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct BarrierConfig {
    /// Base address of the covered heap range
    ///
    /// Supplied by the heap allocator. Card indices and region indices are
    /// computed relative to this address.
    pub heap_base: usize,

    /// Size of the covered heap range in bytes
    ///
    /// Must be a multiple of `region_size`.
    /// Default: 64MB
    pub heap_size: usize,

    /// Region size in bytes
    ///
    /// Regions are the unit of remembered-set ownership and of relocation.
    /// Must be a power of two.
    /// Default: 2MB
    pub region_size: usize,

    /// Card shift - log2 of the card size
    ///
    /// A card covers `1 << card_shift` bytes and maps to one byte in the
    /// card table. 9 means 512-byte cards.
    ///
    /// Default: 9
    pub card_shift: u32,

    /// Capacity of each thread-local SATB buffer, in entries
    ///
    /// Larger buffers amortize hand-off cost over more stores at the price
    /// of latency before the marker sees captured pre-images.
    ///
    /// Default: 1024
    pub satb_buffer_capacity: usize,

    /// Capacity of each thread-local dirty-card buffer, in entries
    ///
    /// Default: 256
    pub card_buffer_capacity: usize,

    /// Number of nodes in each global queue-set arena
    ///
    /// Bounds how many full buffers can be pending drain at once. When the
    /// arena is exhausted the enqueuing path falls back to synchronous
    /// processing, so this is a throughput knob, not a correctness one.
    ///
    /// Default: 256
    pub queue_arena_nodes: usize,

    /// Pending-buffer count that signals a refinement burst
    ///
    /// When the dirty-card queue set holds at least this many full buffers,
    /// the subsystem asks for an earlier-than-planned refinement pass.
    ///
    /// Default: 64
    pub refinement_threshold: usize,

    /// Number of concurrent GC worker threads (refinement + marking)
    ///
    /// If None, auto-detects: min(4, num_cpus / 2), at least 1.
    ///
    /// Default: auto-detect
    pub gc_threads: Option<usize>,

    /// Enable verbose barrier logging
    ///
    /// Logs phase transitions, buffer hand-offs and refinement passes.
    /// Default: false
    pub verbose: bool,

    /// Enable barrier statistics collection
    ///
    /// Default: true
    pub stats_enabled: bool,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        let num_cpus = num_cpus::get();

        BarrierConfig {
            heap_base: 0,
            heap_size: 64 * MB,
            region_size: 2 * MB,
            card_shift: 9,
            satb_buffer_capacity: 1024,
            card_buffer_capacity: 256,
            queue_arena_nodes: 256,
            refinement_threshold: 64,
            gc_threads: Some((num_cpus / 2).clamp(1, 4)),
            verbose: false,
            stats_enabled: true,
        }
    }
}

impl BarrierConfig {
    /// Validate configuration
    ///
    /// Checks that all values are in valid ranges.
    /// Returns an error if the configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gc_barrier::BarrierConfig;
    ///
    /// let config = BarrierConfig {
    ///     region_size: 3 * 1024 * 1024, // not a power of two
    ///     ..Default::default()
    /// };
    ///
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heap_size == 0 {
            return Err(ConfigError::InvalidHeapSize(
                "heap_size must be > 0".to_string(),
            ));
        }

        if !self.region_size.is_power_of_two() {
            return Err(ConfigError::InvalidRegionSize(
                "region_size must be a power of two".to_string(),
            ));
        }

        if self.heap_size % self.region_size != 0 {
            return Err(ConfigError::InvalidHeapSize(
                "heap_size must be a multiple of region_size".to_string(),
            ));
        }

        if self.card_shift < 6 || self.card_shift > 12 {
            return Err(ConfigError::InvalidCardShift(
                "card_shift must be between 6 (64B) and 12 (4KB)".to_string(),
            ));
        }

        if (1usize << self.card_shift) > self.region_size {
            return Err(ConfigError::InvalidCardShift(
                "card size cannot exceed region_size".to_string(),
            ));
        }

        if self.satb_buffer_capacity == 0 || self.card_buffer_capacity == 0 {
            return Err(ConfigError::InvalidBufferCapacity(
                "buffer capacities must be > 0".to_string(),
            ));
        }

        if self.queue_arena_nodes < 2 {
            return Err(ConfigError::InvalidArenaSize(
                "queue_arena_nodes must be >= 2".to_string(),
            ));
        }

        if let Some(threads) = self.gc_threads {
            if threads == 0 {
                return Err(ConfigError::InvalidGcThreads(
                    "gc_threads must be > 0".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - GCB_HEAP_SIZE
    /// - GCB_REGION_SIZE
    /// - GCB_CARD_SHIFT
    /// - GCB_GC_THREADS
    /// - GCB_VERBOSE
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GCB_HEAP_SIZE") {
            if let Ok(size) = val.parse::<usize>() {
                config.heap_size = size;
            }
        }

        if let Ok(val) = std::env::var("GCB_REGION_SIZE") {
            if let Ok(size) = val.parse::<usize>() {
                config.region_size = size;
            }
        }

        if let Ok(val) = std::env::var("GCB_CARD_SHIFT") {
            if let Ok(shift) = val.parse::<u32>() {
                config.card_shift = shift;
            }
        }

        if let Ok(val) = std::env::var("GCB_GC_THREADS") {
            if let Ok(threads) = val.parse::<usize>() {
                config.gc_threads = Some(threads);
            }
        }

        if let Ok(val) = std::env::var("GCB_VERBOSE") {
            config.verbose = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }

    /// Card size in bytes
    #[inline]
    pub fn card_size(&self) -> usize {
        1 << self.card_shift
    }

    /// Number of regions covering the heap
    #[inline]
    pub fn region_count(&self) -> usize {
        self.heap_size / self.region_size
    }

    /// Number of cards covering the heap
    #[inline]
    pub fn card_count(&self) -> usize {
        self.heap_size >> self.card_shift
    }

    /// Effective number of GC worker threads
    pub fn effective_gc_threads(&self) -> usize {
        self.gc_threads
            .unwrap_or_else(|| (num_cpus::get() / 2).clamp(1, 4))
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid heap size: {0}")]
    InvalidHeapSize(String),

    #[error("Invalid region size: {0}")]
    InvalidRegionSize(String),

    #[error("Invalid card shift: {0}")]
    InvalidCardShift(String),

    #[error("Invalid buffer capacity: {0}")]
    InvalidBufferCapacity(String),

    #[error("Invalid arena size: {0}")]
    InvalidArenaSize(String),

    #[error("Invalid GC threads: {0}")]
    InvalidGcThreads(String),
}

const MB: usize = 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BarrierConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.card_size(), 512);
        assert_eq!(config.region_count(), 32);
    }

    #[test]
    fn test_invalid_heap_size() {
        let config = BarrierConfig {
            heap_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_region_size_must_be_power_of_two() {
        let config = BarrierConfig {
            region_size: 3 * MB,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_heap_must_be_region_multiple() {
        let config = BarrierConfig {
            heap_size: 3 * MB,
            region_size: 2 * MB,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_card_shift_bounds() {
        let config = BarrierConfig {
            card_shift: 4,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BarrierConfig {
            card_shift: 13,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_gc_threads_never_zero() {
        let config = BarrierConfig {
            gc_threads: None,
            ..Default::default()
        };
        assert!(config.effective_gc_threads() >= 1);
    }

    #[test]
    fn test_card_count() {
        let config = BarrierConfig {
            heap_size: 4 * MB,
            region_size: 2 * MB,
            card_shift: 9,
            ..Default::default()
        };
        assert_eq!(config.card_count(), 4 * MB / 512);
    }
}
