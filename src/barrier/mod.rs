//! Barrier Module - Colored Pointers, Load Barrier, Dispatch
//!
//! The mutator-facing surface of the barrier subsystem. Access sites go
//! through `BarrierSet`, which resolves decorator bits against the
//! configured collector flavor and invokes the right combination of:
//!
//! - the colored-pointer load barrier (read side, self-healing),
//! - the SATB pre-write barrier (old value capture during marking),
//! - the dirty-card post-write barrier (cross-region tracking).
//!
//! Colored pointers keep GC metadata in bits 44-47 of the reference word,
//! so barrier state travels with the pointer and healing is a single CAS
//! on the slot.

pub mod colored_ptr;
pub mod dispatch;
pub mod load_barrier;

pub use colored_ptr::ColoredPointer;
pub use dispatch::{
    BarrierDispatch, BarrierOps, CollectorFlavor, AS_ARRAY, DEST_UNINITIALIZED, IN_HEAP,
    IN_NATIVE, ON_WEAK_REF,
};
pub use load_barrier::LoadBarrier;

use crate::error::{GcError, Result};
use crate::runtime::ThreadGcState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// BarrierSet - the four access entry points
///
/// Decorator resolution is table-driven and happens per call here; a code
/// generator embedding these barriers would resolve `BarrierOps` once per
/// access site instead.
pub struct BarrierSet {
    dispatch: BarrierDispatch,
    load_barrier: Arc<LoadBarrier>,
}

impl BarrierSet {
    pub fn new(flavor: CollectorFlavor, load_barrier: Arc<LoadBarrier>) -> Self {
        Self {
            dispatch: BarrierDispatch::new(flavor),
            load_barrier,
        }
    }

    pub fn dispatch(&self) -> &BarrierDispatch {
        &self.dispatch
    }

    pub fn load_barrier(&self) -> &Arc<LoadBarrier> {
        &self.load_barrier
    }

    /// Reference load.
    #[inline]
    pub fn read_ref(&self, slot: &AtomicUsize, decorators: u8) -> usize {
        let ops = self.dispatch.ops(decorators);
        if ops.native_resolve {
            self.load_barrier.resolve_native(slot)
        } else if ops.weak_load {
            self.load_barrier.load_weak(slot)
        } else if ops.load_barrier {
            self.load_barrier.load(slot)
        } else {
            slot.load(Ordering::Acquire)
        }
    }

    /// Reference store.
    ///
    /// The swap yields the pre-image atomically with the store, so a racing
    /// writer cannot make an old value vanish uncaptured.
    #[inline]
    pub fn write_ref(&self, thread: &ThreadGcState, slot: &AtomicUsize, new_raw: usize, decorators: u8) {
        let ops = self.dispatch.ops(decorators);
        let old = slot.swap(new_raw, Ordering::AcqRel);
        if ops.satb_pre {
            thread.satb_enqueue(old);
        }
        if ops.card_post {
            thread.card_enqueue(slot.as_ptr() as usize);
        }
    }

    /// Array-range reference copy.
    ///
    /// Heals the source range first so only good pointers are copied,
    /// captures destination pre-images unless the destination is fresh,
    /// then dirties the destination cards in one sweep.
    pub fn copy_ref_array(
        &self,
        thread: &ThreadGcState,
        src: &[AtomicUsize],
        dst: &[AtomicUsize],
        decorators: u8,
    ) -> Result<()> {
        if src.len() != dst.len() {
            return Err(GcError::InvalidArgument(format!(
                "array copy length mismatch: src {} vs dst {}",
                src.len(),
                dst.len()
            )));
        }
        if dst.is_empty() {
            return Ok(());
        }
        let ops = self.dispatch.ops(decorators | AS_ARRAY);

        if ops.load_barrier {
            self.load_barrier.heal_range(src);
        }

        if ops.satb_pre {
            let old_values: Vec<usize> =
                dst.iter().map(|slot| slot.load(Ordering::Acquire)).collect();
            thread.satb_enqueue_array(&old_values, false);
        }

        for (from, to) in src.iter().zip(dst.iter()) {
            to.store(from.load(Ordering::Acquire), Ordering::Release);
        }

        if ops.card_post {
            let start = dst[0].as_ptr() as usize;
            let end = start + dst.len() * std::mem::size_of::<usize>();
            thread.card_invalidate(start, end);
        }
        Ok(())
    }

    /// Native-handle resolution: heal without marking side effects.
    #[inline]
    pub fn resolve_native(&self, slot: &AtomicUsize) -> usize {
        self.load_barrier.resolve_native(slot)
    }
}
