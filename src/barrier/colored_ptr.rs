//! Colored Pointer Implementation
//!
//! Metadata bits 44-47 of a heap reference word; the address occupies bits
//! 0-43. The mark bits alternate between cycles (MARKED0/MARKED1) so stale
//! marks from the previous cycle are distinguishable without a sweep.

use crate::phase::GcPhase;
use std::sync::atomic::{AtomicUsize, Ordering};

/// ColoredPointer - wrapper for a pointer word with metadata bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColoredPointer {
    raw: usize,
}

impl ColoredPointer {
    pub const MARKED0_MASK: usize = 1 << 44;
    pub const MARKED1_MASK: usize = 1 << 45;
    pub const REMAPPED_MASK: usize = 1 << 46;
    pub const FINALIZABLE_MASK: usize = 1 << 47;
    pub const COLOR_MASK: usize =
        Self::MARKED0_MASK | Self::MARKED1_MASK | Self::REMAPPED_MASK | Self::FINALIZABLE_MASK;
    pub const ADDRESS_MASK: usize = (1 << 44) - 1;

    pub fn new(address: usize) -> Self {
        Self {
            raw: address & Self::ADDRESS_MASK,
        }
    }

    pub fn from_raw(raw: usize) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> usize {
        self.raw
    }

    pub fn address(&self) -> usize {
        self.raw & Self::ADDRESS_MASK
    }

    pub fn is_null(&self) -> bool {
        self.raw == 0
    }

    pub fn is_marked0(&self) -> bool {
        (self.raw & Self::MARKED0_MASK) != 0
    }

    pub fn is_marked1(&self) -> bool {
        (self.raw & Self::MARKED1_MASK) != 0
    }

    pub fn is_marked(&self) -> bool {
        self.is_marked0() || self.is_marked1()
    }

    pub fn is_remapped(&self) -> bool {
        (self.raw & Self::REMAPPED_MASK) != 0
    }

    pub fn is_finalizable(&self) -> bool {
        (self.raw & Self::FINALIZABLE_MASK) != 0
    }

    pub fn set_marked0(&mut self) {
        self.raw |= Self::MARKED0_MASK;
    }

    pub fn set_marked1(&mut self) {
        self.raw |= Self::MARKED1_MASK;
    }

    pub fn set_remapped(&mut self) {
        self.raw |= Self::REMAPPED_MASK;
    }

    pub fn set_finalizable(&mut self) {
        self.raw |= Self::FINALIZABLE_MASK;
    }

    pub fn clear_color(&mut self) {
        self.raw &= Self::ADDRESS_MASK;
    }

    /// The mark-bit mask for a given cycle parity.
    ///
    /// Parity `false` selects MARKED0, `true` selects MARKED1; the
    /// coordinator flips parity at the start of every marking phase.
    #[inline]
    pub fn mark_mask(parity: bool) -> usize {
        if parity {
            Self::MARKED1_MASK
        } else {
            Self::MARKED0_MASK
        }
    }

    /// True if this pointer still needs slow-path work in `phase`.
    pub fn needs_processing(&self, phase: GcPhase) -> bool {
        match phase {
            GcPhase::Marking | GcPhase::FinalMark => !self.is_marked(),
            GcPhase::Relocating => !self.is_remapped(),
            GcPhase::Idle | GcPhase::Cleanup => false,
        }
    }

    // Atomic helpers operating on in-memory slots.

    pub fn set_marked0_atomic(slot: &AtomicUsize) {
        slot.fetch_or(Self::MARKED0_MASK, Ordering::AcqRel);
    }

    pub fn set_marked1_atomic(slot: &AtomicUsize) {
        slot.fetch_or(Self::MARKED1_MASK, Ordering::AcqRel);
    }

    pub fn set_remapped_atomic(slot: &AtomicUsize) {
        slot.fetch_or(Self::REMAPPED_MASK, Ordering::AcqRel);
    }

    pub fn clear_color_atomic(slot: &AtomicUsize) {
        slot.fetch_and(Self::ADDRESS_MASK, Ordering::Release);
    }

    /// Test-and-set of the mark bit selected by `parity`.
    ///
    /// Returns `true` if the bit was already set; exactly one caller per
    /// slot observes `false` per cycle, which elects the marker.
    pub fn test_and_set_mark(slot: &AtomicUsize, parity: bool) -> bool {
        let mask = Self::mark_mask(parity);
        let old = slot.fetch_or(mask, Ordering::AcqRel);
        (old & mask) != 0
    }

    pub fn load_atomic(slot: &AtomicUsize) -> usize {
        slot.load(Ordering::Acquire)
    }

    pub fn store_atomic(slot: &AtomicUsize, value: usize) {
        slot.store(value, Ordering::Release);
    }

    /// Single CAS attempt; the failing value is handed back for the caller's
    /// retry loop.
    pub fn cas_atomic(slot: &AtomicUsize, expected: usize, new: usize) -> Result<usize, usize> {
        slot.compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
    }
}
