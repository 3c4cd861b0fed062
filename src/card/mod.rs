//! Card / Remembered-Set Manager
//!
//! The post-write side of the regional collector. A reference store into the
//! heap dirties the card covering the *field* address; dirty cards flow
//! through thread-local buffers into the global dirty-card queue set, and
//! refinement turns them into remembered-set entries.
//!
//! Flow:
//! ```text
//! store ──► mark_dirty ──► thread buffer ──► BufferStack ──► Refiner ──► RememberedSet
//!            (dedup via       (bounded)        (lock-free)    (rescans
//!             card byte)                                       the card)
//! ```

pub mod refine;
pub mod remset;
pub mod table;

pub use refine::Refiner;
pub use remset::{CardRef, RememberedSet};
pub use table::{CardTable, CARD_CLEAN, CARD_DIRTY, CARD_YOUNG};

use crate::config::BarrierConfig;
use crate::heap::{HeapLayout, ObjectModel};
use crate::logging::{log_event, GcEvent};
use crate::queue::{BufferStack, PtrBuffer};
use crate::stats::BarrierStats;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Summary of one drain pass over the queue set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub buffers: usize,
    pub entries: usize,
    pub remset_inserts: usize,
}

/// DirtyCardQueueSet - global sink for dirty-card buffers
///
/// Mutators call [`mark_dirty`](Self::mark_dirty) with their thread-local
/// buffer; refinement (a collector thread, or the mutator itself when the
/// arena is exhausted) consumes through [`drain`](Self::drain).
pub struct DirtyCardQueueSet {
    table: Arc<CardTable>,
    refiner: Refiner,
    stack: BufferStack,
    buffer_capacity: usize,
    refinement_threshold: usize,
    /// Latched when the backlog crosses the threshold; cleared by drain.
    refinement_requested: AtomicBool,
    stats: Arc<BarrierStats>,
}

impl DirtyCardQueueSet {
    pub fn new(
        layout: Arc<HeapLayout>,
        table: Arc<CardTable>,
        model: Arc<dyn ObjectModel>,
        stats: Arc<BarrierStats>,
        config: &BarrierConfig,
    ) -> Self {
        Self {
            refiner: Refiner::new(layout, Arc::clone(&table), model, Arc::clone(&stats)),
            table,
            stack: BufferStack::new(config.queue_arena_nodes),
            buffer_capacity: config.card_buffer_capacity,
            refinement_threshold: config.refinement_threshold,
            refinement_requested: AtomicBool::new(false),
            stats,
        }
    }

    /// A fresh thread-local buffer sized for this queue set.
    pub fn new_buffer(&self) -> PtrBuffer {
        PtrBuffer::new(self.buffer_capacity)
    }

    /// The shared card table.
    pub fn table(&self) -> &Arc<CardTable> {
        &self.table
    }

    /// Post-write barrier slow path for a single reference store.
    ///
    /// `field_addr` is the address of the *field written*, not the value
    /// stored. Stores outside the covered heap, into already-dirty cards or
    /// into young cards all return without enqueueing; only the thread that
    /// wins the clean-to-dirty transition enqueues, which is the dedup the
    /// remembered sets rely on.
    pub fn mark_dirty(&self, field_addr: usize, buffer: &mut PtrBuffer) {
        let Some(card) = self.table.card_index(field_addr) else {
            return;
        };
        if self.table.is_exempt(card) {
            return;
        }
        if !self.table.try_dirty(card) {
            // Lost the race; the winner enqueues.
            return;
        }
        self.stats.record_card_dirtied();
        self.enqueue(card, buffer);
    }

    /// Bulk-dirty every trackable card covering `[start, end)`.
    ///
    /// Used after operations that write many fields without individual
    /// barriers, e.g. deoptimization rewriting a frame's objects.
    pub fn invalidate(&self, start: usize, end: usize, buffer: &mut PtrBuffer) {
        if start >= end {
            return;
        }
        let Some(first) = self.table.card_index(start) else {
            return;
        };
        let last = self.table.card_index(end - 1).unwrap_or(first);

        for card in first..=last {
            if self.table.is_exempt(card) {
                continue;
            }
            if self.table.try_dirty(card) {
                self.stats.record_card_dirtied();
                self.enqueue(card, buffer);
            }
        }
    }

    fn enqueue(&self, card: usize, buffer: &mut PtrBuffer) {
        if buffer.push(card) {
            self.hand_off(buffer);
        }
    }

    /// Hand the thread's buffer to the global stack, installing a fresh one.
    ///
    /// Arena exhaustion falls back to refining the buffer's cards inline on
    /// the calling thread; entries are never dropped.
    pub fn hand_off(&self, buffer: &mut PtrBuffer) -> usize {
        let entries = buffer.len();
        let full = mem::replace(buffer, PtrBuffer::new(self.buffer_capacity));

        match self.stack.push(full) {
            Ok(()) => {
                self.stats.record_hand_off();
                log_event(GcEvent::BufferHandOff {
                    queue: "dirty-card",
                    entries,
                });
            },
            Err(mut rejected) => {
                self.stats.record_sync_fallback();
                log::warn!(
                    "dirty-card arena exhausted, refining {} cards inline",
                    entries
                );
                log_event(GcEvent::SyncFallback {
                    queue: "dirty-card",
                    entries,
                });
                self.refiner.refine_entries(rejected.entries());
                rejected.reset();
            },
        }

        let pending = self.stack.pending();
        if pending >= self.refinement_threshold
            && !self.refinement_requested.swap(true, Ordering::Relaxed)
        {
            log::debug!("refinement burst requested ({} buffers pending)", pending);
            log_event(GcEvent::RefinementBurst {
                pending_buffers: pending,
            });
        }

        entries
    }

    /// Detach-time flush: hand off the buffer even when empty, so the
    /// draining side observes every detached thread's hand-off.
    pub fn flush(&self, buffer: &mut PtrBuffer) -> usize {
        self.hand_off(buffer)
    }

    /// Drain every pending buffer through the refiner.
    ///
    /// Single consumer at a time per the queue-set contract.
    pub fn drain(&self) -> DrainSummary {
        let mut summary = DrainSummary::default();
        while let Some(buffer) = self.stack.pop() {
            summary.buffers += 1;
            summary.entries += buffer.len();
            summary.remset_inserts += self.refiner.refine_entries(buffer.entries());
        }
        self.refinement_requested.store(false, Ordering::Relaxed);

        if summary.buffers > 0 {
            log_event(GcEvent::QueueDrained {
                queue: "dirty-card",
                buffers: summary.buffers,
                entries: summary.entries,
            });
            log_event(GcEvent::RefineStats {
                cards_refined: summary.entries as u64,
                remset_inserts: summary.remset_inserts as u64,
            });
        }
        summary
    }

    /// Buffers awaiting refinement.
    pub fn pending(&self) -> usize {
        self.stack.pending()
    }

    /// True once the backlog crossed the refinement threshold, until the
    /// next drain.
    pub fn refinement_requested(&self) -> bool {
        self.refinement_requested.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapLayout;
    use parking_lot::Mutex;

    struct ScriptedModel {
        refs: Mutex<Vec<(usize, usize)>>,
    }

    impl ObjectModel for ScriptedModel {
        fn for_each_ref_slot(
            &self,
            range_start: usize,
            range_end: usize,
            visit: &mut dyn FnMut(usize, usize),
        ) {
            for &(slot, target) in self.refs.lock().iter() {
                if slot >= range_start && slot < range_end {
                    visit(slot, target);
                }
            }
        }
    }

    const BASE: usize = 0x100_0000;
    const REGION: usize = 2 * 1024 * 1024;

    fn queue_set(refs: Vec<(usize, usize)>) -> (Arc<HeapLayout>, DirtyCardQueueSet) {
        let config = BarrierConfig {
            heap_base: BASE,
            heap_size: 4 * REGION,
            region_size: REGION,
            card_shift: 9,
            card_buffer_capacity: 4,
            queue_arena_nodes: 8,
            refinement_threshold: 2,
            ..Default::default()
        };
        let layout = Arc::new(HeapLayout::new(&config).unwrap());
        let table = Arc::new(CardTable::new(BASE, 4 * REGION, 9));
        let set = DirtyCardQueueSet::new(
            Arc::clone(&layout),
            table,
            Arc::new(ScriptedModel {
                refs: Mutex::new(refs),
            }),
            Arc::new(BarrierStats::new()),
            &config,
        );
        (layout, set)
    }

    #[test]
    fn test_repeated_stores_enqueue_once() {
        let (_layout, set) = queue_set(vec![]);
        let mut buffer = set.new_buffer();

        for _ in 0..10 {
            set.mark_dirty(BASE + 0x200, &mut buffer);
        }
        assert_eq!(buffer.len(), 1, "one card entry for ten stores");
    }

    #[test]
    fn test_out_of_heap_store_ignored() {
        let (_layout, set) = queue_set(vec![]);
        let mut buffer = set.new_buffer();
        set.mark_dirty(0x10, &mut buffer);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_full_buffer_hands_off() {
        let (_layout, set) = queue_set(vec![]);
        let mut buffer = set.new_buffer();

        // Capacity is 4: four distinct cards trigger exactly one hand-off.
        for i in 0..4 {
            set.mark_dirty(BASE + i * 512, &mut buffer);
        }
        assert!(buffer.is_empty(), "fresh buffer installed after hand-off");
        assert_eq!(set.pending(), 1);
    }

    #[test]
    fn test_invalidate_dirties_range() {
        let (_layout, set) = queue_set(vec![]);
        let mut buffer = set.new_buffer();

        // Pre-dirty one card in the middle; invalidate must skip it.
        set.mark_dirty(BASE + 512, &mut buffer);
        let before = buffer.len();

        set.invalidate(BASE, BASE + 3 * 512, &mut buffer);
        // Cards 0 and 2 newly dirtied, card 1 already dirty.
        assert_eq!(buffer.len(), before + 2);
    }

    #[test]
    fn test_drain_populates_remset() {
        let store_addr = BASE + 0x200;
        let target = BASE + REGION + 0x40;
        let (layout, set) = queue_set(vec![(store_addr, target)]);
        let mut buffer = set.new_buffer();

        set.mark_dirty(store_addr, &mut buffer);
        set.flush(&mut buffer);

        let summary = set.drain();
        assert_eq!(summary.buffers, 1);
        assert_eq!(summary.entries, 1);
        assert_eq!(summary.remset_inserts, 1);

        let card = layout.card_for(store_addr).unwrap();
        assert!(layout.region(1).unwrap().remembered_set().contains_card(card));
    }

    #[test]
    fn test_refinement_burst_latch() {
        let (_layout, set) = queue_set(vec![]);
        let mut buffer = set.new_buffer();

        assert!(!set.refinement_requested());
        // Threshold is 2 buffers.
        for i in 0..8 {
            set.mark_dirty(BASE + i * 512, &mut buffer);
        }
        assert!(set.refinement_requested());

        set.drain();
        assert!(!set.refinement_requested());
        assert_eq!(set.pending(), 0);
    }

    #[test]
    fn test_arena_exhaustion_refines_inline() {
        let store_addr = BASE + 0x200;
        let target = BASE + REGION + 0x40;
        let (layout, set) = queue_set(vec![(store_addr, target)]);

        // Fill the whole arena with empty hand-offs.
        for _ in 0..8 {
            let mut b = set.new_buffer();
            set.flush(&mut b);
        }
        assert_eq!(set.pending(), 8);

        // Next hand-off cannot park; its card must still reach the remset.
        let mut buffer = set.new_buffer();
        set.mark_dirty(store_addr, &mut buffer);
        set.flush(&mut buffer);

        let card = layout.card_for(store_addr).unwrap();
        assert!(layout.region(1).unwrap().remembered_set().contains_card(card));
    }
}
