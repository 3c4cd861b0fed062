//! Self-Healing Load Barrier
//!
//! Runs on every reference load under the relocating flavor. The single
//! published word that drives it is the *bad-bit mask*: a pointer whose raw
//! word has no bad bit set is current, and the fast path is one AND and one
//! branch. Everything else drops into the slow path, which produces a good
//! pointer, writes it back into the source slot (self-healing) and returns
//! it, so each stale pointer pays the slow path at most once.
//!
//! Slow-path pseudocode:
//! ```text
//! fn load_barrier(slot):
//!     raw = *slot
//!     if raw & bad_mask == 0: return raw          // fast path
//!     match phase:
//!         Marking:    mark-and-color, CAS back
//!         Relocating: forward-and-remap, CAS back
//! ```
//!
//! Heal races are benign: two threads racing to heal the same slot write
//! the same healed word, and a CAS that fails because the other side
//! already installed it simply adopts the winner's value.

use crate::barrier::colored_ptr::ColoredPointer;
use crate::heap::HeapLayout;
use crate::marker::MarkWorklist;
use crate::phase::{GcPhase, PhaseCell};
use crate::relocate::ForwardingTable;
use crate::stats::BarrierStats;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Bounded retries for CAS and generation-validation loops.
const MAX_RETRIES: u32 = 100;

/// LoadBarrier - colored-pointer read barrier with self-healing
///
/// Thread Safety:
/// Fully lock-free. The bad mask, parity and phase are published by the
/// coordinator with release stores; the barrier reads them with acquire
/// loads and never blocks a mutator.
pub struct LoadBarrier {
    /// A raw word with any of these bits set needs slow-path processing.
    /// Zero while the collector is idle, so every load takes the fast path.
    bad_mask: AtomicUsize,

    /// Mark-bit parity of the current cycle (false = MARKED0).
    mark_parity: AtomicBool,

    phase: Arc<PhaseCell>,
    worklist: Arc<MarkWorklist>,
    forwarding: Arc<ForwardingTable>,
    layout: Arc<HeapLayout>,
    stats: Arc<BarrierStats>,

    /// Barrier can be switched off for debugging.
    enabled: AtomicBool,
}

impl LoadBarrier {
    pub fn new(
        phase: Arc<PhaseCell>,
        worklist: Arc<MarkWorklist>,
        forwarding: Arc<ForwardingTable>,
        layout: Arc<HeapLayout>,
        stats: Arc<BarrierStats>,
    ) -> Self {
        Self {
            bad_mask: AtomicUsize::new(0),
            mark_parity: AtomicBool::new(false),
            phase,
            worklist,
            forwarding,
            layout,
            stats,
            enabled: AtomicBool::new(true),
        }
    }

    /// Strong reference load. Never nulls a previously non-null pointer.
    pub fn load(&self, slot: &AtomicUsize) -> usize {
        self.load_internal(slot, false, true)
    }

    /// Weak reference load. Resolves to null when the referent sits in a
    /// relocated region, is unforwarded and is unmarked this cycle.
    pub fn load_weak(&self, slot: &AtomicUsize) -> usize {
        self.load_internal(slot, true, true)
    }

    /// Native-handle resolution: heals like a strong load but never feeds
    /// the marker.
    pub fn resolve_native(&self, slot: &AtomicUsize) -> usize {
        self.load_internal(slot, false, false)
    }

    /// Heal every slot of a range before a bulk copy reads it.
    pub fn heal_range(&self, slots: &[AtomicUsize]) {
        for slot in slots {
            self.load(slot);
        }
    }

    fn load_internal(&self, slot: &AtomicUsize, weak: bool, allow_mark: bool) -> usize {
        self.stats.record_load();

        let raw = slot.load(Ordering::Acquire);
        if raw == 0 {
            return 0;
        }
        // Dominant fast path: no bad bit set means the word is current.
        if !self.enabled.load(Ordering::Relaxed)
            || raw & self.bad_mask.load(Ordering::Acquire) == 0
        {
            return raw;
        }

        self.stats.record_slow_path();
        match self.phase.load() {
            GcPhase::Marking | GcPhase::FinalMark => self.slow_path_mark(slot, raw, allow_mark),
            GcPhase::Relocating => self.slow_path_relocate(slot, raw, weak),
            GcPhase::Idle | GcPhase::Cleanup => raw,
        }
    }

    /// Marking slow path: feed the marker and color the slot with the
    /// current mark bit.
    fn slow_path_mark(&self, slot: &AtomicUsize, raw: usize, allow_mark: bool) -> usize {
        let pointer = ColoredPointer::from_raw(raw);
        let mark_mask = self.mark_mask();
        if raw & mark_mask != 0 {
            return raw;
        }

        // Replace whatever stale color the word carries with the current
        // mark bit. fetch-or then fetch-and keeps this convergent under
        // racing healers: both end at the same colored word, and the
        // fetch-or elects exactly one thread to feed the marker.
        let old = slot.fetch_or(mark_mask, Ordering::AcqRel);
        if allow_mark && old & mark_mask == 0 {
            self.worklist.push(pointer.address());
            self.stats.record_mark_enqueued();
        }
        let stale = ColoredPointer::COLOR_MASK & !mark_mask;
        let healed = slot.fetch_and(!stale, Ordering::AcqRel) & !stale;
        healed
    }

    /// Relocating slow path: resolve the canonical address, remap the slot.
    fn slow_path_relocate(&self, slot: &AtomicUsize, raw: usize, weak: bool) -> usize {
        let pointer = ColoredPointer::from_raw(raw);
        let address = pointer.address();
        let mut retries = 0u32;

        loop {
            if retries >= MAX_RETRIES {
                log::warn!("forwarding lookup starved after {} retries", retries);
                return raw;
            }

            let entry = self.forwarding.lookup_with_generation(address);

            // Validate the generation: a mutation during the read means the
            // result may be stale, retry.
            if let Some((_, generation)) = entry {
                if self.forwarding.generation() != generation {
                    retries += 1;
                    std::hint::spin_loop();
                    continue;
                }
            }

            let healed_raw = match entry {
                Some((new_address, _)) => {
                    let mut healed = ColoredPointer::new(new_address);
                    healed.set_remapped();
                    healed.raw()
                },
                None => {
                    if weak && self.is_dead_weak_referent(address, raw) {
                        return self.null_weak_slot(slot, raw);
                    }
                    // Not relocated: the address is already canonical, only
                    // the color is stale.
                    let mut healed = ColoredPointer::new(address);
                    healed.set_remapped();
                    healed.raw()
                },
            };

            return self.install_healed(slot, raw, healed_raw);
        }
    }

    /// Weak referent is dead when its region is being evacuated, it has no
    /// forwarding entry and no thread marked it this cycle.
    fn is_dead_weak_referent(&self, address: usize, raw: usize) -> bool {
        let Some(region) = self.layout.region_for(address) else {
            return false;
        };
        region.is_in_relocation_set() && raw & self.mark_mask() == 0
    }

    fn null_weak_slot(&self, slot: &AtomicUsize, raw: usize) -> usize {
        self.stats.record_weak_nulled();
        // Benign race: if someone else healed or nulled first, keep theirs.
        let _ = slot.compare_exchange(raw, 0, Ordering::AcqRel, Ordering::Acquire);
        0
    }

    /// CAS the healed word into the source slot, tolerating racing heals.
    fn install_healed(&self, slot: &AtomicUsize, raw: usize, healed_raw: usize) -> usize {
        let healed_address = ColoredPointer::from_raw(healed_raw).address();
        let mut current = raw;
        let mut retries = 0u32;

        loop {
            if retries >= MAX_RETRIES {
                log::warn!("heal CAS starved after {} retries", retries);
                return healed_raw;
            }

            match slot.compare_exchange_weak(current, healed_raw, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    if healed_address != ColoredPointer::from_raw(raw).address() {
                        self.stats.record_heal();
                    }
                    return healed_raw;
                },
                Err(actual) => {
                    let actual_ptr = ColoredPointer::from_raw(actual);
                    // Someone else healed (or nulled) the slot: adopt it.
                    if actual_ptr.is_remapped()
                        || actual_ptr.address() == healed_address
                        || actual == 0
                    {
                        return actual;
                    }
                    current = actual;
                    retries += 1;
                },
            }
        }
    }

    // ------------------------------------------------------------------
    // Coordinator-facing publication
    // ------------------------------------------------------------------

    /// Mark-bit mask of the current cycle.
    #[inline]
    pub fn mark_mask(&self) -> usize {
        ColoredPointer::mark_mask(self.mark_parity.load(Ordering::Acquire))
    }

    /// Flip parity for a new cycle; returns the new mask.
    pub fn flip_mark_parity(&self) -> usize {
        let parity = !self.mark_parity.load(Ordering::Acquire);
        self.mark_parity.store(parity, Ordering::Release);
        ColoredPointer::mark_mask(parity)
    }

    /// Publish the marking-phase bad mask: anything not carrying the
    /// current mark bit is bad.
    pub fn publish_marking_mask(&self) {
        let bad = ColoredPointer::COLOR_MASK & !self.mark_mask();
        self.bad_mask.store(bad, Ordering::Release);
    }

    /// Publish the relocation-phase bad mask: anything not remapped is bad.
    pub fn publish_remap_mask(&self) {
        let bad = ColoredPointer::COLOR_MASK & !ColoredPointer::REMAPPED_MASK;
        self.bad_mask.store(bad, Ordering::Release);
    }

    /// Clear the mask: every load takes the fast path (Idle/Cleanup).
    pub fn clear_mask(&self) {
        self.bad_mask.store(0, Ordering::Release);
    }

    pub fn bad_mask(&self) -> usize {
        self.bad_mask.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BarrierConfig;

    const BASE: usize = 0x100_0000;
    const REGION: usize = 2 * 1024 * 1024;

    struct Harness {
        phase: Arc<PhaseCell>,
        worklist: Arc<MarkWorklist>,
        forwarding: Arc<ForwardingTable>,
        layout: Arc<HeapLayout>,
        barrier: LoadBarrier,
    }

    fn harness() -> Harness {
        let config = BarrierConfig {
            heap_base: BASE,
            heap_size: 4 * REGION,
            region_size: REGION,
            ..Default::default()
        };
        let phase = Arc::new(PhaseCell::new());
        let worklist = Arc::new(MarkWorklist::new());
        let forwarding = Arc::new(ForwardingTable::new(BASE, 4 * REGION));
        let layout = Arc::new(HeapLayout::new(&config).unwrap());
        let barrier = LoadBarrier::new(
            Arc::clone(&phase),
            Arc::clone(&worklist),
            Arc::clone(&forwarding),
            Arc::clone(&layout),
            Arc::new(BarrierStats::new()),
        );
        Harness {
            phase,
            worklist,
            forwarding,
            layout,
            barrier,
        }
    }

    fn start_marking(h: &Harness) -> usize {
        h.phase.store(GcPhase::Marking);
        let mask = h.barrier.flip_mark_parity();
        h.barrier.publish_marking_mask();
        mask
    }

    fn start_relocating(h: &Harness) {
        h.phase.store(GcPhase::Relocating);
        h.barrier.publish_remap_mask();
    }

    // ========================================================================
    // Fast Path
    // ========================================================================

    #[test]
    fn test_idle_loads_are_untouched() {
        let h = harness();
        let slot = AtomicUsize::new(BASE + 0x100);
        assert_eq!(h.barrier.load(&slot), BASE + 0x100);
        assert!(h.worklist.is_empty());
    }

    #[test]
    fn test_null_load_is_null() {
        let h = harness();
        start_relocating(&h);
        let slot = AtomicUsize::new(0);
        assert_eq!(h.barrier.load(&slot), 0);
    }

    #[test]
    fn test_good_color_takes_fast_path() {
        let h = harness();
        let mask = start_marking(&h);
        let slot = AtomicUsize::new((BASE + 0x100) | mask);

        let before = h.worklist.enqueued_count();
        assert_eq!(h.barrier.load(&slot), (BASE + 0x100) | mask);
        assert_eq!(h.worklist.enqueued_count(), before);
    }

    // ========================================================================
    // Marking Slow Path
    // ========================================================================

    #[test]
    fn test_unmarked_load_feeds_marker_and_colors_slot() {
        let h = harness();
        let mask = start_marking(&h);

        // Stale color from the previous cycle.
        let stale = ColoredPointer::mark_mask(false); // MARKED0, parity now true
        let addr = BASE + 0x100;
        let slot = AtomicUsize::new(addr | stale);

        let healed = h.barrier.load(&slot);
        assert_eq!(healed & ColoredPointer::ADDRESS_MASK, addr);
        assert_ne!(healed & mask, 0, "current mark bit installed");
        assert_eq!(healed & stale, 0, "stale mark bit stripped");
        assert_eq!(h.worklist.pop(), Some(addr));
    }

    #[test]
    fn test_second_load_after_heal_is_fast() {
        let h = harness();
        start_marking(&h);
        let slot = AtomicUsize::new((BASE + 0x100) | ColoredPointer::mark_mask(false));

        h.barrier.load(&slot);
        let first_enqueued = h.worklist.enqueued_count();
        h.barrier.load(&slot);
        assert_eq!(h.worklist.enqueued_count(), first_enqueued, "healed slot not re-enqueued");
    }

    #[test]
    fn test_native_resolution_skips_marking() {
        let h = harness();
        start_marking(&h);
        let slot = AtomicUsize::new((BASE + 0x100) | ColoredPointer::mark_mask(false));

        h.barrier.resolve_native(&slot);
        assert!(h.worklist.is_empty(), "native resolution has no marking side effects");
    }

    // ========================================================================
    // Relocating Slow Path
    // ========================================================================

    #[test]
    fn test_forwarded_load_heals_slot() {
        let h = harness();
        let old = BASE + 0x100;
        let new = BASE + REGION + 0x40;
        h.forwarding.add_entry(old, new).unwrap();
        start_relocating(&h);

        let slot = AtomicUsize::new(old | ColoredPointer::MARKED0_MASK);
        let healed = h.barrier.load(&slot);

        assert_eq!(healed & ColoredPointer::ADDRESS_MASK, new);
        assert_ne!(healed & ColoredPointer::REMAPPED_MASK, 0);
        // Self-healing: the slot itself now carries the healed word.
        assert_eq!(slot.load(Ordering::Relaxed), healed);
    }

    #[test]
    fn test_unforwarded_strong_load_is_remapped_in_place() {
        let h = harness();
        start_relocating(&h);
        let addr = BASE + 0x100;
        let slot = AtomicUsize::new(addr | ColoredPointer::MARKED1_MASK);

        let healed = h.barrier.load(&slot);
        assert_eq!(healed & ColoredPointer::ADDRESS_MASK, addr, "strong load keeps address");
        assert_ne!(healed & ColoredPointer::REMAPPED_MASK, 0);
    }

    #[test]
    fn test_weak_load_nulls_dead_referent() {
        let h = harness();
        start_relocating(&h);
        h.layout.region(0).unwrap().set_in_relocation_set(true);

        // Unmarked, unforwarded, region in relocation set: dead.
        let slot = AtomicUsize::new((BASE + 0x100) | ColoredPointer::MARKED0_MASK);
        // Current parity still false, so MARKED0 is the current bit; use the
        // stale bit instead to model "unmarked this cycle".
        h.barrier.flip_mark_parity(); // parity true, current bit MARKED1

        assert_eq!(h.barrier.load_weak(&slot), 0);
        assert_eq!(slot.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_weak_load_keeps_live_referent() {
        let h = harness();
        start_relocating(&h);
        h.layout.region(0).unwrap().set_in_relocation_set(true);

        let old = BASE + 0x100;
        let new = BASE + 2 * REGION + 0x40;
        h.forwarding.add_entry(old, new).unwrap();

        let slot = AtomicUsize::new(old | ColoredPointer::MARKED0_MASK);
        let healed = h.barrier.load_weak(&slot);
        assert_eq!(healed & ColoredPointer::ADDRESS_MASK, new, "forwarded weak referent survives");
    }

    // ========================================================================
    // Races and Ranges
    // ========================================================================

    #[test]
    fn test_racing_heals_converge() {
        use std::thread;

        let h = Arc::new({
            let h = harness();
            let old = BASE + 0x100;
            h.forwarding.add_entry(old, BASE + REGION + 0x80).unwrap();
            start_relocating(&h);
            h
        });
        let slot = Arc::new(AtomicUsize::new((BASE + 0x100) | ColoredPointer::MARKED0_MASK));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let h = Arc::clone(&h);
            let slot = Arc::clone(&slot);
            handles.push(thread::spawn(move || h.barrier.load(&slot)));
        }
        let results: Vec<usize> = handles.into_iter().map(|j| j.join().unwrap()).collect();

        let expected_addr = BASE + REGION + 0x80;
        for raw in results {
            assert_eq!(raw & ColoredPointer::ADDRESS_MASK, expected_addr);
        }
        assert_eq!(
            slot.load(Ordering::Relaxed) & ColoredPointer::ADDRESS_MASK,
            expected_addr
        );
    }

    #[test]
    fn test_heal_range() {
        let h = harness();
        let old = BASE + 0x100;
        let new = BASE + REGION + 0x80;
        h.forwarding.add_entry(old, new).unwrap();
        start_relocating(&h);

        let slots = [
            AtomicUsize::new(old | ColoredPointer::MARKED0_MASK),
            AtomicUsize::new(0),
            AtomicUsize::new((BASE + 0x300) | ColoredPointer::REMAPPED_MASK),
        ];
        h.barrier.heal_range(&slots);

        assert_eq!(slots[0].load(Ordering::Relaxed) & ColoredPointer::ADDRESS_MASK, new);
        assert_eq!(slots[1].load(Ordering::Relaxed), 0);
        assert_eq!(
            slots[2].load(Ordering::Relaxed),
            (BASE + 0x300) | ColoredPointer::REMAPPED_MASK
        );
    }
}
