//! Safepoint Management
//!
//! A safepoint is a global synchronization point: mutator threads poll,
//! arrive when requested, and stay blocked until the collector releases
//! them. Phase sync points (final mark) and cycle aborts run inside a
//! safepoint so no barrier executes mid-transition.
//!
//! ## States
//!
//! ```text
//! SAFEPOINT_NONE (0) ─────┐
//!     │                   │
//!     ▼                   │
//! SAFEPOINT_REQUESTED (1) │
//!     │                   │
//!     ▼                   │
//! SAFEPOINT_REACHED (2) ──┘ (after release)
//! ```

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Safepoint state constants
pub const SAFEPOINT_NONE: u8 = 0;
pub const SAFEPOINT_REQUESTED: u8 = 1;
pub const SAFEPOINT_REACHED: u8 = 2;

/// Safepoint - atomic state machine coordinating mutators and collector
///
/// # Thread Safety
///
/// All operations are atomic and lock-free; any number of mutators may
/// arrive concurrently while one collector thread drives request/release.
pub struct Safepoint {
    state: AtomicU8,

    /// Threads currently parked at the safepoint
    paused_threads: AtomicUsize,

    /// Threads expected to arrive
    total_threads: AtomicUsize,
}

impl Safepoint {
    pub fn new(total_threads: usize) -> Self {
        Self {
            state: AtomicU8::new(SAFEPOINT_NONE),
            paused_threads: AtomicUsize::new(0),
            total_threads: AtomicUsize::new(total_threads),
        }
    }

    /// Collector side: signal all mutators to stop at their next poll.
    pub fn request_safepoint(&self) {
        self.state.store(SAFEPOINT_REQUESTED, Ordering::SeqCst);
    }

    /// Collector side: spin until every registered thread has arrived.
    pub fn wait_for_safepoint(&self) {
        let total = self.total_threads.load(Ordering::Acquire);
        while self.paused_threads.load(Ordering::Acquire) < total {
            std::hint::spin_loop();
        }
    }

    /// Mutator side: signal arrival.
    pub fn arrive(&self) {
        self.paused_threads.fetch_add(1, Ordering::AcqRel);
        self.state.store(SAFEPOINT_REACHED, Ordering::Release);
    }

    /// Collector side: resume all mutators and reset for the next request.
    pub fn release_safepoint(&self) {
        self.paused_threads.store(0, Ordering::Release);
        self.state.store(SAFEPOINT_NONE, Ordering::Release);
    }

    /// Mutator poll: should this thread stop?
    pub fn is_requested(&self) -> bool {
        self.state.load(Ordering::Acquire) != SAFEPOINT_NONE
    }

    pub fn get_state(&self) -> u8 {
        self.state.load(Ordering::Acquire)
    }

    pub fn threads_at_safepoint(&self) -> usize {
        self.paused_threads.load(Ordering::Acquire)
    }

    pub fn total_threads(&self) -> usize {
        self.total_threads.load(Ordering::Acquire)
    }

    /// Track thread attach/detach.
    pub fn set_total_threads(&self, count: usize) {
        self.total_threads.store(count, Ordering::Release);
    }

    /// Mutator side: arrive, then spin until the collector releases.
    pub fn block_until_released(&self) {
        self.arrive();
        while self.state.load(Ordering::Acquire) != SAFEPOINT_NONE {
            std::hint::spin_loop();
        }
    }
}

impl Default for Safepoint {
    fn default() -> Self {
        Self::new(1)
    }
}
