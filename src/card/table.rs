//! Card Table - Byte-Per-Range Dirty Tracking
//!
//! The heap is covered by a flat table with one byte per fixed-size card
//! (512 bytes by default). The post-write barrier flips a card's byte from
//! clean to dirty the first time a reference store lands in the card;
//! refinement flips it back. Young cards are pre-exempted: stores into them
//! never enqueue because the whole young region is scanned at the next
//! collection anyway.
//!
//! State machine per byte:
//! ```text
//!          store            refine
//! CLEAN ──────────► DIRTY ──────────► CLEAN
//!
//! YOUNG: terminal until the region is promoted/reset
//! ```

use std::sync::atomic::{fence, AtomicU8, Ordering};

/// Card state values.
pub const CARD_CLEAN: u8 = 0;
pub const CARD_DIRTY: u8 = 1;
pub const CARD_YOUNG: u8 = 2;

/// CardTable - flat atomic byte table covering the heap
///
/// Thread Safety:
/// Bytes are mutated by any mutator thread (clean to dirty) and by
/// refinement threads (dirty to clean) with plain atomic ops; no locks.
pub struct CardTable {
    cards: Box<[AtomicU8]>,
    base: usize,
    card_shift: u32,
}

impl CardTable {
    /// Create a table covering `size` bytes starting at `base`.
    pub fn new(base: usize, size: usize, card_shift: u32) -> Self {
        let card_size = 1usize << card_shift;
        let num_cards = (size + card_size - 1) >> card_shift;
        let cards: Box<[AtomicU8]> = (0..num_cards).map(|_| AtomicU8::new(CARD_CLEAN)).collect();

        Self {
            cards,
            base,
            card_shift,
        }
    }

    /// Card index covering `addr`, or None outside the covered range.
    #[inline]
    pub fn card_index(&self, addr: usize) -> Option<usize> {
        if addr < self.base {
            return None;
        }
        let index = (addr - self.base) >> self.card_shift;
        if index < self.cards.len() {
            Some(index)
        } else {
            None
        }
    }

    /// Current state byte of a card.
    #[inline]
    pub fn read(&self, index: usize) -> u8 {
        self.cards[index].load(Ordering::Relaxed)
    }

    /// The dominant fast-path test: true if a store to this card needs no
    /// further barrier work (already dirty, or young and pre-exempted).
    #[inline]
    pub fn is_exempt(&self, index: usize) -> bool {
        let state = self.read(index);
        state == CARD_DIRTY || state == CARD_YOUNG
    }

    /// Slow-path transition: dirty the card if it is still clean.
    ///
    /// Returns `true` exactly once per clean-to-dirty transition; the caller
    /// enqueues the card only on `true`, which is what deduplicates repeated
    /// stores into the same card between refinements.
    ///
    /// A store-load fence separates the reference store (done by the caller
    /// just before the barrier) from the re-read of the card byte, matching
    /// the ordering the refinement scan relies on.
    #[inline]
    pub fn try_dirty(&self, index: usize) -> bool {
        fence(Ordering::SeqCst);
        self.cards[index]
            .compare_exchange(CARD_CLEAN, CARD_DIRTY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Refinement-side transition: reset the card to clean if it was dirty.
    ///
    /// Returns `false` for clean or young cards, making re-refinement of an
    /// already-clean card a safe no-op.
    #[inline]
    pub fn try_clean(&self, index: usize) -> bool {
        self.cards[index]
            .compare_exchange(CARD_DIRTY, CARD_CLEAN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Exempt a card range from refinement (young region allocation).
    pub fn set_young(&self, from_index: usize, to_index: usize) {
        for index in from_index..to_index.min(self.cards.len()) {
            self.cards[index].store(CARD_YOUNG, Ordering::Relaxed);
        }
    }

    /// Return a card range to clean (young region promoted or reclaimed).
    pub fn clear_young(&self, from_index: usize, to_index: usize) {
        for index in from_index..to_index.min(self.cards.len()) {
            let _ = self.cards[index].compare_exchange(
                CARD_YOUNG,
                CARD_CLEAN,
                Ordering::AcqRel,
                Ordering::Relaxed,
            );
        }
    }

    /// Reset every card to clean. Used at cycle teardown.
    pub fn clear_all(&self) {
        for card in self.cards.iter() {
            card.store(CARD_CLEAN, Ordering::Relaxed);
        }
    }

    /// Count of dirty cards (diagnostic).
    pub fn dirty_count(&self) -> usize {
        self.cards
            .iter()
            .filter(|c| c.load(Ordering::Relaxed) == CARD_DIRTY)
            .count()
    }

    /// Total number of cards.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Card size in bytes.
    #[inline]
    pub fn card_size(&self) -> usize {
        1 << self.card_shift
    }
}
