//! Barrier Statistics - Performance Monitoring
//!
//! Counters for all three barrier families, used for:
//! - Debugging and profiling
//! - Fast-path health monitoring (the load fast path should dominate)
//! - Sizing the queue arenas and refinement thresholds
//!
//! One atomic collector is shared by every thread; snapshots are plain
//! structs that can be merged across cycles.

use std::sync::atomic::{AtomicU64, Ordering};

/// BarrierStats - thread-safe counters for barrier activity
///
/// # Thread Safety
/// All fields are relaxed atomics; counts are monotone between resets and
/// may be momentarily inconsistent with each other, which is fine for
/// monitoring.
pub struct BarrierStats {
    // Load barrier
    loads_total: AtomicU64,
    loads_slow_path: AtomicU64,
    pointers_healed: AtomicU64,
    marks_enqueued: AtomicU64,
    weak_nulled: AtomicU64,

    // SATB pre-write barrier
    satb_enqueued: AtomicU64,
    satb_filtered: AtomicU64,

    // Post-write barrier and refinement
    cards_dirtied: AtomicU64,
    cards_refined: AtomicU64,
    remset_inserts: AtomicU64,

    // Queue machinery
    buffers_handed_off: AtomicU64,
    sync_fallbacks: AtomicU64,
}

impl BarrierStats {
    pub fn new() -> Self {
        Self {
            loads_total: AtomicU64::new(0),
            loads_slow_path: AtomicU64::new(0),
            pointers_healed: AtomicU64::new(0),
            marks_enqueued: AtomicU64::new(0),
            weak_nulled: AtomicU64::new(0),
            satb_enqueued: AtomicU64::new(0),
            satb_filtered: AtomicU64::new(0),
            cards_dirtied: AtomicU64::new(0),
            cards_refined: AtomicU64::new(0),
            remset_inserts: AtomicU64::new(0),
            buffers_handed_off: AtomicU64::new(0),
            sync_fallbacks: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_load(&self) {
        self.loads_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_slow_path(&self) {
        self.loads_slow_path.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_heal(&self) {
        self.pointers_healed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_mark_enqueued(&self) {
        self.marks_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_weak_nulled(&self) {
        self.weak_nulled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_satb_enqueued(&self) {
        self.satb_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_satb_filtered(&self) {
        self.satb_filtered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_card_dirtied(&self) {
        self.cards_dirtied.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_card_refined(&self) {
        self.cards_refined.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_remset_insert(&self) {
        self.remset_inserts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_hand_off(&self) {
        self.buffers_handed_off.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sync_fallback(&self) {
        self.sync_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            loads_total: self.loads_total.load(Ordering::Relaxed),
            loads_slow_path: self.loads_slow_path.load(Ordering::Relaxed),
            pointers_healed: self.pointers_healed.load(Ordering::Relaxed),
            marks_enqueued: self.marks_enqueued.load(Ordering::Relaxed),
            weak_nulled: self.weak_nulled.load(Ordering::Relaxed),
            satb_enqueued: self.satb_enqueued.load(Ordering::Relaxed),
            satb_filtered: self.satb_filtered.load(Ordering::Relaxed),
            cards_dirtied: self.cards_dirtied.load(Ordering::Relaxed),
            cards_refined: self.cards_refined.load(Ordering::Relaxed),
            remset_inserts: self.remset_inserts.load(Ordering::Relaxed),
            buffers_handed_off: self.buffers_handed_off.load(Ordering::Relaxed),
            sync_fallbacks: self.sync_fallbacks.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters, e.g. at cycle boundaries.
    pub fn reset(&self) {
        self.loads_total.store(0, Ordering::Relaxed);
        self.loads_slow_path.store(0, Ordering::Relaxed);
        self.pointers_healed.store(0, Ordering::Relaxed);
        self.marks_enqueued.store(0, Ordering::Relaxed);
        self.weak_nulled.store(0, Ordering::Relaxed);
        self.satb_enqueued.store(0, Ordering::Relaxed);
        self.satb_filtered.store(0, Ordering::Relaxed);
        self.cards_dirtied.store(0, Ordering::Relaxed);
        self.cards_refined.store(0, Ordering::Relaxed);
        self.remset_inserts.store(0, Ordering::Relaxed);
        self.buffers_handed_off.store(0, Ordering::Relaxed);
        self.sync_fallbacks.store(0, Ordering::Relaxed);
    }
}

impl Default for BarrierStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain snapshot of [`BarrierStats`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub loads_total: u64,
    pub loads_slow_path: u64,
    pub pointers_healed: u64,
    pub marks_enqueued: u64,
    pub weak_nulled: u64,
    pub satb_enqueued: u64,
    pub satb_filtered: u64,
    pub cards_dirtied: u64,
    pub cards_refined: u64,
    pub remset_inserts: u64,
    pub buffers_handed_off: u64,
    pub sync_fallbacks: u64,
}

impl StatsSnapshot {
    /// Combine counts from another snapshot (per-cycle aggregation).
    pub fn merge(&mut self, other: &StatsSnapshot) {
        self.loads_total += other.loads_total;
        self.loads_slow_path += other.loads_slow_path;
        self.pointers_healed += other.pointers_healed;
        self.marks_enqueued += other.marks_enqueued;
        self.weak_nulled += other.weak_nulled;
        self.satb_enqueued += other.satb_enqueued;
        self.satb_filtered += other.satb_filtered;
        self.cards_dirtied += other.cards_dirtied;
        self.cards_refined += other.cards_refined;
        self.remset_inserts += other.remset_inserts;
        self.buffers_handed_off += other.buffers_handed_off;
        self.sync_fallbacks += other.sync_fallbacks;
    }

    /// Share of loads resolved without slow-path work, as a percentage.
    pub fn fast_path_rate(&self) -> f64 {
        if self.loads_total == 0 {
            100.0
        } else {
            let fast = self.loads_total - self.loads_slow_path;
            (fast as f64 / self.loads_total as f64) * 100.0
        }
    }
}
