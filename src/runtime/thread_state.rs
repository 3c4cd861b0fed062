//! Thread-Local GC State
//!
//! Every mutator thread carries a `ThreadGcState`: its SATB and dirty-card
//! buffers plus a private copy of the SATB active flag. The lifecycle is
//! strictly linear and enforced:
//!
//! ```text
//! Created ──► Attached ──► Detached ──► Destroyed
//! ```
//!
//! Attach and detach go through the phase coordinator, which serializes
//! them against phase transitions under its publication lock; this module
//! only provides the per-thread mechanics.

use crate::card::DirtyCardQueueSet;
use crate::error::{GcError, Result};
use crate::queue::PtrBuffer;
use crate::satb::SatbQueueSet;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Thread lifecycle states
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadLifecycle {
    Created = 0,
    Attached = 1,
    Detached = 2,
    Destroyed = 3,
}

impl ThreadLifecycle {
    fn from_u8(value: u8) -> ThreadLifecycle {
        match value {
            1 => ThreadLifecycle::Attached,
            2 => ThreadLifecycle::Detached,
            3 => ThreadLifecycle::Destroyed,
            _ => ThreadLifecycle::Created,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ThreadLifecycle::Created => "Created",
            ThreadLifecycle::Attached => "Attached",
            ThreadLifecycle::Detached => "Detached",
            ThreadLifecycle::Destroyed => "Destroyed",
        }
    }
}

/// ThreadGcState - per-thread barrier state and buffers
///
/// # Thread Safety
///
/// The owning thread drives the barrier entry points; the coordinator
/// touches the SATB flag and (at publication) the buffers. The buffer
/// mutexes are uncontended in steady state - the coordinator only takes
/// them inside its publication lock while mutators are quiesced.
pub struct ThreadGcState {
    /// Stable id for logs and the registry
    id: u64,

    lifecycle: AtomicU8,

    /// Thread-private copy of the global SATB active flag
    satb_active: AtomicBool,

    satb_buffer: Mutex<PtrBuffer>,
    card_buffer: Mutex<PtrBuffer>,

    satb_set: Arc<SatbQueueSet>,
    card_set: Arc<DirtyCardQueueSet>,
}

impl ThreadGcState {
    /// `on_create`: allocate both buffers; both queues start inactive.
    pub fn new(id: u64, satb_set: Arc<SatbQueueSet>, card_set: Arc<DirtyCardQueueSet>) -> Self {
        Self {
            id,
            lifecycle: AtomicU8::new(ThreadLifecycle::Created as u8),
            satb_active: AtomicBool::new(false),
            satb_buffer: Mutex::new(satb_set.new_buffer()),
            card_buffer: Mutex::new(card_set.new_buffer()),
            satb_set,
            card_set,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn lifecycle(&self) -> ThreadLifecycle {
        ThreadLifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    /// One linear lifecycle step; anything else is a caller bug.
    pub(crate) fn transition(
        &self,
        from: ThreadLifecycle,
        to: ThreadLifecycle,
    ) -> Result<()> {
        self.lifecycle
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|actual| GcError::InvalidState {
                expected: from.name().to_string(),
                actual: ThreadLifecycle::from_u8(actual).name().to_string(),
            })?;
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.lifecycle() == ThreadLifecycle::Attached
    }

    /// Coordinator only: publish the SATB flag to this thread.
    pub(crate) fn set_satb_active(&self, active: bool) {
        self.satb_active.store(active, Ordering::Release);
    }

    #[inline]
    pub fn satb_is_active(&self) -> bool {
        self.satb_active.load(Ordering::Acquire)
    }

    /// SATB pre-write barrier entry: capture `old_raw` before a store
    /// overwrites it.
    #[inline]
    pub fn satb_enqueue(&self, old_raw: usize) {
        // Thread-private flag gates the whole path; off means marking is
        // not running and the load below is the only cost.
        if !self.satb_is_active() || !self.is_attached() {
            return;
        }
        let mut buffer = self.satb_buffer.lock();
        self.satb_set.pre_write(old_raw, &mut buffer);
    }

    /// Array-store prologue: capture the about-to-be-overwritten slots.
    pub fn satb_enqueue_array(&self, old_values: &[usize], dest_uninitialized: bool) {
        if !self.satb_is_active() || !self.is_attached() {
            return;
        }
        let mut buffer = self.satb_buffer.lock();
        self.satb_set
            .write_ref_array_pre(old_values, dest_uninitialized, &mut buffer);
    }

    /// Post-write barrier entry: dirty the card covering `field_addr`.
    ///
    /// The dirty-card queue is always active while attached.
    #[inline]
    pub fn card_enqueue(&self, field_addr: usize) {
        if !self.is_attached() {
            return;
        }
        let mut buffer = self.card_buffer.lock();
        self.card_set.mark_dirty(field_addr, &mut buffer);
    }

    /// Bulk-dirty a written range (frame rewrites, cloned objects).
    pub fn card_invalidate(&self, start: usize, end: usize) {
        if !self.is_attached() {
            return;
        }
        let mut buffer = self.card_buffer.lock();
        self.card_set.invalidate(start, end, &mut buffer);
    }

    /// Hand off both buffers unconditionally, even when empty.
    ///
    /// Returns (satb entries, card entries) flushed. Used at detach and at
    /// phase sync points.
    pub fn flush(&self) -> (usize, usize) {
        let satb_flushed = {
            let mut buffer = self.satb_buffer.lock();
            self.satb_set.flush(&mut buffer)
        };
        let cards_flushed = {
            let mut buffer = self.card_buffer.lock();
            self.card_set.flush(&mut buffer)
        };
        (satb_flushed, cards_flushed)
    }

    /// `on_destroy`: release the buffers. Only legal after detach.
    pub fn destroy(&self) -> Result<()> {
        self.transition(ThreadLifecycle::Detached, ThreadLifecycle::Destroyed)?;
        // Shrink the parked buffers to nothing; the state object itself may
        // outlive this call in the registry history.
        *self.satb_buffer.lock() = PtrBuffer::new(1);
        *self.card_buffer.lock() = PtrBuffer::new(1);
        Ok(())
    }
}
