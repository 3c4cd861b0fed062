//! Shared fixture for barrier integration tests
//!
//! Provides a simulated heap (`SimHeap`) implementing the `ObjectModel`
//! trait plus a fully wired `BarrierSubsystem` over it. The heap range is
//! virtual: tests work in addresses and slot words, never real memory.

#![allow(dead_code)]

use gc_barrier::{
    BarrierConfig, BarrierSubsystem, CollectorFlavor, ColoredPointer, ObjectModel,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Simulated heap base (region 0 starts here)
pub const HEAP_BASE: usize = 0x1000_0000;

/// 8MB covered range = 4 regions of 2MB
pub const HEAP_SIZE: usize = 8 * 1024 * 1024;

pub const REGION_SIZE: usize = 2 * 1024 * 1024;

/// 512-byte cards (card_shift 9)
pub const CARD_SIZE: usize = 512;

/// SimHeap - reference-slot map standing in for the object model
///
/// Records `slot address -> target address` pairs; refinement enumerates
/// them through `for_each_ref_slot`.
pub struct SimHeap {
    slots: Mutex<BTreeMap<usize, usize>>,
}

impl SimHeap {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record a reference field at `slot` pointing at `target`.
    pub fn store(&self, slot: usize, target: usize) {
        self.slots.lock().unwrap().insert(slot, target);
    }

    pub fn clear(&self) {
        self.slots.lock().unwrap().clear();
    }
}

impl ObjectModel for SimHeap {
    fn for_each_ref_slot(
        &self,
        range_start: usize,
        range_end: usize,
        visit: &mut dyn FnMut(usize, usize),
    ) {
        let slots = self.slots.lock().unwrap();
        for (&slot, &target) in slots.range(range_start..range_end) {
            if target != 0 {
                visit(slot, target);
            }
        }
    }
}

/// Fully wired subsystem over a SimHeap, with small buffers so hand-off
/// and refinement paths are exercised by short tests.
pub struct BarrierFixture {
    pub subsystem: BarrierSubsystem,
    pub heap: Arc<SimHeap>,
}

impl BarrierFixture {
    pub fn new() -> Self {
        Self::with_flavor(CollectorFlavor::Relocating)
    }

    pub fn regional() -> Self {
        Self::with_flavor(CollectorFlavor::Regional)
    }

    pub fn with_flavor(flavor: CollectorFlavor) -> Self {
        let config = BarrierConfig {
            heap_base: HEAP_BASE,
            heap_size: HEAP_SIZE,
            region_size: REGION_SIZE,
            card_shift: 9,
            satb_buffer_capacity: 4,
            card_buffer_capacity: 4,
            queue_arena_nodes: 16,
            refinement_threshold: 4,
            gc_threads: Some(2),
            ..Default::default()
        };
        let heap = Arc::new(SimHeap::new());
        let subsystem = BarrierSubsystem::new(config, Arc::clone(&heap) as _, flavor)
            .expect("fixture subsystem should build");
        Self { subsystem, heap }
    }

    /// An address `offset` bytes into region `region`.
    pub fn addr(&self, region: usize, offset: usize) -> usize {
        assert!(offset < REGION_SIZE);
        HEAP_BASE + region * REGION_SIZE + offset
    }

    /// Card index covering `addr`.
    pub fn card_of(&self, addr: usize) -> usize {
        (addr - HEAP_BASE) / CARD_SIZE
    }

    /// A reference word carrying the current good mark color for `addr`.
    pub fn marked_ref(&self, addr: usize) -> usize {
        addr | self.subsystem.load_barrier().mark_mask()
    }

    /// A reference word carrying the remapped color for `addr`.
    pub fn remapped_ref(&self, addr: usize) -> usize {
        addr | ColoredPointer::REMAPPED_MASK
    }
}
