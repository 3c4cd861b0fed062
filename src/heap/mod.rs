//! Heap Layout - Region Boundaries and Address Queries
//!
//! The barrier subsystem does not own the allocator. It consumes region
//! boundaries and the card-shift constant from it, wrapped here as a
//! `HeapLayout` built once at init. All address-to-region and
//! address-to-card arithmetic lives in this module so the barriers stay
//! branch-cheap.

pub mod region;

pub use region::Region;

use crate::config::BarrierConfig;
use crate::error::{GcError, Result};
use std::sync::Arc;

/// HeapLayout - fixed map of the covered heap range
///
/// Constructed once from the allocator-provided configuration. Regions are
/// created here and never move.
pub struct HeapLayout {
    base: usize,
    size: usize,
    region_size: usize,
    card_shift: u32,
    regions: Vec<Arc<Region>>,
}

impl HeapLayout {
    /// Build the layout from a validated configuration.
    pub fn new(config: &BarrierConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| GcError::Configuration(e.to_string()))?;

        let region_count = config.region_count();
        let regions = (0..region_count)
            .map(|i| {
                Arc::new(Region::new(
                    i,
                    config.heap_base + i * config.region_size,
                    config.region_size,
                ))
            })
            .collect();

        Ok(Self {
            base: config.heap_base,
            size: config.heap_size,
            region_size: config.region_size,
            card_shift: config.card_shift,
            regions,
        })
    }

    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn card_shift(&self) -> u32 {
        self.card_shift
    }

    #[inline]
    pub fn region_size(&self) -> usize {
        self.region_size
    }

    /// True if `addr` falls inside the covered heap range.
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.base + self.size
    }

    /// The region covering `addr`, or None outside the heap.
    #[inline]
    pub fn region_for(&self, addr: usize) -> Option<&Arc<Region>> {
        if !self.contains(addr) {
            return None;
        }
        let index = (addr - self.base) / self.region_size;
        self.regions.get(index)
    }

    /// Global card index covering `addr`, or None outside the heap.
    #[inline]
    pub fn card_for(&self, addr: usize) -> Option<usize> {
        if !self.contains(addr) {
            return None;
        }
        Some((addr - self.base) >> self.card_shift)
    }

    /// Start address of the card with index `card_index`.
    #[inline]
    pub fn card_start(&self, card_index: usize) -> usize {
        self.base + (card_index << self.card_shift)
    }

    /// Region index owning the card with index `card_index`.
    #[inline]
    pub fn region_for_card(&self, card_index: usize) -> usize {
        (card_index << self.card_shift) / self.region_size
    }

    /// All regions, in index order.
    pub fn regions(&self) -> &[Arc<Region>] {
        &self.regions
    }

    /// Region by index.
    pub fn region(&self, index: usize) -> Option<&Arc<Region>> {
        self.regions.get(index)
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}

/// Object model seam
///
/// The barrier subsystem does not know object shapes. Refinement asks the
/// embedding runtime to walk the reference slots of live objects on a card,
/// and the runtime reports each slot address together with the reference
/// value currently stored there.
pub trait ObjectModel: Send + Sync {
    /// Invoke `visit(slot_addr, target_addr)` for every live reference slot
    /// in `[range_start, range_end)` whose value is non-null.
    fn for_each_ref_slot(
        &self,
        range_start: usize,
        range_end: usize,
        visit: &mut dyn FnMut(usize, usize),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> HeapLayout {
        let config = BarrierConfig {
            heap_base: 0x10_0000,
            heap_size: 8 * 1024 * 1024,
            region_size: 2 * 1024 * 1024,
            card_shift: 9,
            ..Default::default()
        };
        HeapLayout::new(&config).unwrap()
    }

    #[test]
    fn test_region_count_and_bounds() {
        let layout = layout();
        assert_eq!(layout.region_count(), 4);
        assert!(layout.contains(0x10_0000));
        assert!(!layout.contains(0x10_0000 - 1));
        assert!(!layout.contains(0x10_0000 + 8 * 1024 * 1024));
    }

    #[test]
    fn test_region_for_addr() {
        let layout = layout();
        let region = layout.region_for(0x10_0000 + 2 * 1024 * 1024 + 64).unwrap();
        assert_eq!(region.index(), 1);
        assert!(layout.region_for(0x0).is_none());
    }

    #[test]
    fn test_card_mapping_round_trip() {
        let layout = layout();
        let addr = 0x10_0000 + 5 * 512 + 17;
        let card = layout.card_for(addr).unwrap();
        assert_eq!(card, 5);
        assert_eq!(layout.card_start(card), 0x10_0000 + 5 * 512);
    }

    #[test]
    fn test_region_for_card() {
        let layout = layout();
        let cards_per_region = (2 * 1024 * 1024) >> 9;
        assert_eq!(layout.region_for_card(0), 0);
        assert_eq!(layout.region_for_card(cards_per_region), 1);
        assert_eq!(layout.region_for_card(3 * cards_per_region + 7), 3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BarrierConfig {
            heap_size: 3 * 1024 * 1024,
            region_size: 2 * 1024 * 1024,
            ..Default::default()
        };
        assert!(HeapLayout::new(&config).is_err());
    }
}
