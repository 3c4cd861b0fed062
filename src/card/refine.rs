//! Card Refinement - Turning Dirty Cards Into Remembered-Set Entries
//!
//! Refinement consumes card indices from the dirty-card queue set, rescans
//! the 512-byte ranges they name, and records every cross-region reference
//! found there in the target region's remembered set.
//!
//! Ordering invariant per card: the card byte is reset to clean *before* the
//! scan. A mutator storing into the card mid-scan therefore sees clean,
//! re-dirties, and re-enqueues, so the new reference is picked up by a later
//! pass. Delivery is at-least-once; remembered-set insertion is idempotent.

use crate::card::table::CardTable;
use crate::heap::{HeapLayout, ObjectModel};
use crate::stats::BarrierStats;
use std::sync::Arc;

/// Refiner - rescans dirty cards and populates remembered sets
pub struct Refiner {
    layout: Arc<HeapLayout>,
    table: Arc<CardTable>,
    model: Arc<dyn ObjectModel>,
    stats: Arc<BarrierStats>,
}

impl Refiner {
    pub fn new(
        layout: Arc<HeapLayout>,
        table: Arc<CardTable>,
        model: Arc<dyn ObjectModel>,
        stats: Arc<BarrierStats>,
    ) -> Self {
        Self {
            layout,
            table,
            model,
            stats,
        }
    }

    /// Refine one card by global index. Returns the number of
    /// remembered-set entries inserted.
    ///
    /// Safe to call with any card in any state: a clean or young card is a
    /// no-op, which makes duplicate deliveries from the queue set harmless.
    pub fn refine_card(&self, card_index: usize) -> usize {
        // Reset before scanning so a concurrent store re-dirties.
        if !self.table.try_clean(card_index) {
            return 0;
        }

        let start = self.layout.card_start(card_index);
        let end = start + self.table.card_size();
        let source_region = self.layout.region_for_card(card_index);

        let mut inserted = 0usize;
        self.model.for_each_ref_slot(start, end, &mut |_slot, target| {
            let Some(target_region) = self.layout.region_for(target) else {
                return;
            };
            if target_region.index() == source_region {
                return;
            }
            if target_region
                .remembered_set()
                .insert(source_region, card_index)
            {
                inserted += 1;
            }
        });

        self.stats.record_card_refined();
        for _ in 0..inserted {
            self.stats.record_remset_insert();
        }
        inserted
    }

    /// Refine a batch of card indices, e.g. one drained buffer.
    pub fn refine_entries(&self, cards: &[usize]) -> usize {
        cards.iter().map(|&card| self.refine_card(card)).sum()
    }
}
