//! Region - Unit of Heap Subdivision
//!
//! A region is a fixed-size slice of the covered heap range. Regions are
//! created once at heap init, never move, and are reused after reclamation.
//! Each region owns its remembered set and a relocation flag consulted by
//! the weak-load barrier.

use crate::card::remset::RememberedSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Region - fixed address range owning a remembered set
///
/// Thread Safety:
/// The address fields are immutable after construction. The remembered set
/// and the relocation flag carry their own synchronization.
pub struct Region {
    /// Region index within the heap layout
    index: usize,

    /// Start address (inclusive)
    start: usize,

    /// Size in bytes
    size: usize,

    /// Cards referencing into this region
    remembered_set: RememberedSet,

    /// Region is part of the current cycle's relocation set
    ///
    /// Set by the coordinator entering Relocating, cleared at Cleanup.
    /// The weak-load barrier reads it to decide whether an unforwarded
    /// referent is dead.
    in_relocation_set: AtomicBool,
}

impl Region {
    /// Create a region covering `[start, start + size)`.
    pub fn new(index: usize, start: usize, size: usize) -> Self {
        Self {
            index,
            start,
            size,
            remembered_set: RememberedSet::new(),
            in_relocation_set: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.size
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// True if `addr` falls inside this region.
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.start && addr < self.end()
    }

    /// The region's remembered set.
    #[inline]
    pub fn remembered_set(&self) -> &RememberedSet {
        &self.remembered_set
    }

    /// Mark or unmark this region as a relocation target source.
    pub fn set_in_relocation_set(&self, value: bool) {
        self.in_relocation_set.store(value, Ordering::Release);
    }

    /// True while the region's objects are being evacuated.
    #[inline]
    pub fn is_in_relocation_set(&self) -> bool {
        self.in_relocation_set.load(Ordering::Acquire)
    }

    /// Reset the region for reuse after reclamation.
    ///
    /// Clears the remembered set and the relocation flag. The address range
    /// stays fixed for the lifetime of the heap.
    pub fn reset(&self) {
        self.remembered_set.clear();
        self.in_relocation_set.store(false, Ordering::Release);
    }
}
