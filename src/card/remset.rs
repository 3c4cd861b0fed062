//! Remembered Set - Per-Region Incoming-Reference Index
//!
//! Every region owns a remembered set: the collection of cards elsewhere in
//! the heap that were observed to contain references *into* this region.
//! During an incremental collection of the region, the remembered set is the
//! root set that replaces a full-heap scan.
//!
//! Ownership model: remembered sets are mutated only by refinement threads
//! (one consumer drains the dirty-card queue set at a time), so a short
//! mutex around an index set is sufficient. Insertion is idempotent; the
//! at-least-once delivery of cards from the queue set relies on that.

use indexmap::IndexSet;
use parking_lot::Mutex;

/// A remembered-set entry: a card, and the region that card lives in
///
/// The card is identified by its global index in the card table, so the
/// entry pins down both the 512-byte source range and (redundantly, for
/// cheap per-region filtering) the source region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CardRef {
    /// Index of the region the referencing card belongs to
    pub source_region: usize,
    /// Global card index of the referencing range
    pub card_index: usize,
}

/// Remembered set for one region
///
/// Deduplicated set of cards referencing into the owning region.
pub struct RememberedSet {
    entries: Mutex<IndexSet<CardRef>>,
}

impl RememberedSet {
    /// Create an empty remembered set.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(IndexSet::new()),
        }
    }

    /// Record that `card_index` (inside `source_region`) holds a reference
    /// into the owning region.
    ///
    /// Idempotent: refinement may deliver the same card more than once.
    /// Returns `true` if the entry was newly inserted.
    pub fn insert(&self, source_region: usize, card_index: usize) -> bool {
        self.entries.lock().insert(CardRef {
            source_region,
            card_index,
        })
    }

    /// True if the set contains an entry for `card_index`.
    pub fn contains_card(&self, card_index: usize) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|e| e.card_index == card_index)
    }

    /// Snapshot all entries, e.g. for a collection of the owning region.
    pub fn entries(&self) -> Vec<CardRef> {
        self.entries.lock().iter().copied().collect()
    }

    /// Number of distinct cards recorded.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if no cards are recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop all entries. Called when the owning region is reclaimed.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for RememberedSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_query() {
        let rset = RememberedSet::new();
        assert!(rset.is_empty());

        assert!(rset.insert(2, 17));
        assert!(rset.contains_card(17));
        assert_eq!(rset.len(), 1);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let rset = RememberedSet::new();
        assert!(rset.insert(1, 5));
        assert!(!rset.insert(1, 5));
        assert_eq!(rset.len(), 1);
    }

    #[test]
    fn test_same_card_different_region_is_distinct() {
        // A card index pins the region in practice, but the set must not
        // conflate entries if a caller disagrees about the mapping.
        let rset = RememberedSet::new();
        rset.insert(1, 5);
        rset.insert(2, 5);
        assert_eq!(rset.len(), 2);
    }

    #[test]
    fn test_clear() {
        let rset = RememberedSet::new();
        for card in 0..10 {
            rset.insert(0, card);
        }
        assert_eq!(rset.len(), 10);

        rset.clear();
        assert!(rset.is_empty());
        assert!(!rset.contains_card(3));
    }

    #[test]
    fn test_entries_snapshot() {
        let rset = RememberedSet::new();
        rset.insert(0, 1);
        rset.insert(3, 9);

        let entries = rset.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&CardRef {
            source_region: 3,
            card_index: 9
        }));
    }
}
