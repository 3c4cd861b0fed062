//! Forwarding Table - Address Mapping During Relocation
//!
//! Maps old object addresses to their post-relocation addresses. The
//! relocation machinery fills it while copying; load barriers consult it
//! for pointer healing.
//!
//! A generation counter is bumped on every modification. A load barrier
//! captures the generation with its lookup and verifies it afterwards, so
//! a lookup that raced a table mutation is retried rather than trusted.

use crate::error::{GcError, Result};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// ForwardingTable - old-to-new address mapping for one heap range
///
/// Entries are keyed by offset from `range_start`, which keeps the map
/// compact and makes out-of-range addresses unrepresentable.
pub struct ForwardingTable {
    /// Covered range start address
    range_start: usize,

    /// Covered range size in bytes
    range_size: usize,

    /// old_offset -> new_address
    entries: RwLock<IndexMap<usize, usize>>,

    /// Table is complete, no more additions this cycle
    complete: AtomicBool,

    entry_count: AtomicUsize,

    /// Bumped on every mutation; guards in-flight lookups
    generation: AtomicU64,
}

impl ForwardingTable {
    /// Create a table covering `[range_start, range_start + range_size)`.
    pub fn new(range_start: usize, range_size: usize) -> Self {
        Self {
            range_start,
            range_size,
            entries: RwLock::new(IndexMap::new()),
            complete: AtomicBool::new(false),
            entry_count: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Current generation counter.
    ///
    /// Capture together with a lookup result and re-check before trusting
    /// the result.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn offset_of(&self, old_address: usize) -> Option<usize> {
        let offset = old_address.checked_sub(self.range_start)?;
        if offset >= self.range_size {
            return None;
        }
        Some(offset)
    }

    /// Record that the object at `old_address` now lives at `new_address`.
    ///
    /// Called by the relocation driver, never from a barrier. Rejects null,
    /// misaligned and out-of-range addresses.
    pub fn add_entry(&self, old_address: usize, new_address: usize) -> Result<()> {
        if new_address == 0 {
            return Err(GcError::InvalidArgument(format!(
                "forwarding target for {:#x} is null",
                old_address
            )));
        }
        if new_address % std::mem::align_of::<usize>() != 0 {
            return Err(GcError::InvalidArgument(format!(
                "forwarding target {:#x} is misaligned",
                new_address
            )));
        }
        let offset = self.offset_of(old_address).ok_or_else(|| {
            GcError::InvalidArgument(format!(
                "address {:#x} outside forwarded range {:#x}+{:#x}",
                old_address, self.range_start, self.range_size
            ))
        })?;

        self.entries.write().insert(offset, new_address);
        self.entry_count.fetch_add(1, Ordering::Relaxed);
        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// New address for `old_address`, or None if not forwarded.
    pub fn lookup(&self, old_address: usize) -> Option<usize> {
        let offset = self.offset_of(old_address)?;
        self.entries.read().get(&offset).copied()
    }

    /// Lookup returning the generation the result was read under.
    ///
    /// The generation is captured *before* the map read, so a concurrent
    /// mutation is always visible as a generation change afterwards.
    pub fn lookup_with_generation(&self, old_address: usize) -> Option<(usize, u64)> {
        let offset = self.offset_of(old_address)?;
        let generation = self.generation.load(Ordering::Acquire);
        let new_address = self.entries.read().get(&offset).copied()?;
        Some((new_address, generation))
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Relaxed)
    }

    /// All objects of the cycle's relocation set are forwarded.
    pub fn set_complete(&self) {
        self.complete.store(true, Ordering::SeqCst);
    }

    /// Drop all entries at cycle cleanup or abort.
    pub fn clear(&self) {
        self.entries.write().clear();
        self.entry_count.store(0, Ordering::Relaxed);
        self.complete.store(false, Ordering::Relaxed);
        self.generation.fetch_add(1, Ordering::Release);
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count.load(Ordering::Relaxed)
    }

    pub fn range_start(&self) -> usize {
        self.range_start
    }

    pub fn range_size(&self) -> usize {
        self.range_size
    }
}
