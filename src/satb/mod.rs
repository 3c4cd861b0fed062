//! SATB Queue Set - Snapshot-At-The-Beginning Pre-Write Barrier
//!
//! During concurrent marking, overwriting a reference field can hide the
//! old referent from the marker. The pre-write barrier captures that old
//! value (the pre-image) before the store, preserving the snapshot: every
//! object reachable when marking started is either still reachable or
//! sitting in an SATB buffer.
//!
//! The global `active` flag is toggled only by the phase coordinator under
//! its publication lock; each thread carries a copy so the barrier fast
//! path never touches shared state when marking is off.

use crate::barrier::colored_ptr::ColoredPointer;
use crate::config::BarrierConfig;
use crate::logging::{log_event, GcEvent};
use crate::marker::MarkWorklist;
use crate::queue::{BufferStack, PtrBuffer};
use crate::stats::BarrierStats;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// SatbQueueSet - global sink for SATB pre-image buffers
pub struct SatbQueueSet {
    /// Marking is on; threads copy this at attach and at phase transitions.
    active: AtomicBool,

    /// Mark-bit mask of the current cycle; pre-images already carrying it
    /// are filtered (the marker has them already).
    mark_mask: AtomicUsize,

    stack: BufferStack,
    worklist: Arc<MarkWorklist>,
    buffer_capacity: usize,
    stats: Arc<BarrierStats>,
}

impl SatbQueueSet {
    pub fn new(
        worklist: Arc<MarkWorklist>,
        stats: Arc<BarrierStats>,
        config: &BarrierConfig,
    ) -> Self {
        Self {
            active: AtomicBool::new(false),
            mark_mask: AtomicUsize::new(ColoredPointer::MARKED0_MASK),
            stack: BufferStack::new(config.queue_arena_nodes),
            worklist,
            buffer_capacity: config.satb_buffer_capacity,
            stats,
        }
    }

    /// A fresh thread-local buffer sized for this queue set.
    pub fn new_buffer(&self) -> PtrBuffer {
        PtrBuffer::new(self.buffer_capacity)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Coordinator only, under the publication lock.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Coordinator only: the mark-bit mask of the cycle being started.
    pub fn set_mark_mask(&self, mask: usize) {
        self.mark_mask.store(mask, Ordering::Release);
    }

    /// Capture one pre-image before a reference store.
    ///
    /// Filters null and already-marked words; neither can hide a snapshot
    /// object. The caller holds the thread's SATB buffer.
    pub fn pre_write(&self, old_raw: usize, buffer: &mut PtrBuffer) {
        if !self.is_active() {
            return;
        }
        if old_raw == 0 {
            self.stats.record_satb_filtered();
            return;
        }
        if old_raw & self.mark_mask.load(Ordering::Acquire) != 0 {
            self.stats.record_satb_filtered();
            return;
        }

        self.stats.record_satb_enqueued();
        if buffer.push(old_raw) {
            self.hand_off(buffer);
        }
    }

    /// Array-store prologue: capture the pre-image of every destination
    /// slot about to be overwritten.
    ///
    /// Skipped entirely when the destination is freshly allocated and holds
    /// no references yet (`dest_uninitialized`).
    pub fn write_ref_array_pre(
        &self,
        old_values: &[usize],
        dest_uninitialized: bool,
        buffer: &mut PtrBuffer,
    ) {
        if dest_uninitialized || !self.is_active() {
            return;
        }
        for &old_raw in old_values {
            self.pre_write(old_raw, buffer);
        }
    }

    /// Hand the thread's buffer to the global stack, installing a fresh one.
    ///
    /// Arena exhaustion degrades to pushing the captured addresses straight
    /// onto the mark worklist; a pre-image is never dropped.
    pub fn hand_off(&self, buffer: &mut PtrBuffer) -> usize {
        let entries = buffer.len();
        let full = mem::replace(buffer, PtrBuffer::new(self.buffer_capacity));

        match self.stack.push(full) {
            Ok(()) => {
                self.stats.record_hand_off();
                log_event(GcEvent::BufferHandOff {
                    queue: "satb",
                    entries,
                });
            },
            Err(mut rejected) => {
                self.stats.record_sync_fallback();
                log::warn!(
                    "satb arena exhausted, pushing {} pre-images to worklist inline",
                    entries
                );
                log_event(GcEvent::SyncFallback {
                    queue: "satb",
                    entries,
                });
                for &raw in rejected.entries() {
                    self.worklist.push(ColoredPointer::from_raw(raw).address());
                    self.stats.record_mark_enqueued();
                }
                rejected.reset();
            },
        }
        entries
    }

    /// Detach-time flush: unconditional hand-off, even when empty.
    pub fn flush(&self, buffer: &mut PtrBuffer) -> usize {
        self.hand_off(buffer)
    }

    /// Drain every pending buffer onto the mark worklist.
    ///
    /// Returns (buffers, entries) drained. Called by marking threads and
    /// at the final-mark sync point.
    pub fn drain(&self) -> (usize, usize) {
        let mut buffers = 0usize;
        let mut entries = 0usize;

        while let Some(buffer) = self.stack.pop() {
            buffers += 1;
            for &raw in buffer.entries() {
                self.worklist.push(ColoredPointer::from_raw(raw).address());
                self.stats.record_mark_enqueued();
                entries += 1;
            }
        }

        if buffers > 0 {
            log_event(GcEvent::QueueDrained {
                queue: "satb",
                buffers,
                entries,
            });
        }
        (buffers, entries)
    }

    /// Discard pending buffers without marking, e.g. on cycle abort.
    pub fn discard(&self) -> usize {
        let mut buffers = 0usize;
        while self.stack.pop().is_some() {
            buffers += 1;
        }
        buffers
    }

    /// Buffers awaiting drain.
    pub fn pending(&self) -> usize {
        self.stack.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_set() -> (Arc<MarkWorklist>, SatbQueueSet) {
        let worklist = Arc::new(MarkWorklist::new());
        let config = BarrierConfig {
            satb_buffer_capacity: 4,
            queue_arena_nodes: 4,
            ..Default::default()
        };
        let set = SatbQueueSet::new(
            Arc::clone(&worklist),
            Arc::new(BarrierStats::new()),
            &config,
        );
        (worklist, set)
    }

    #[test]
    fn test_inactive_is_noop() {
        let (_worklist, set) = queue_set();
        let mut buffer = set.new_buffer();

        set.pre_write(0x1000, &mut buffer);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_null_and_marked_filtered() {
        let (_worklist, set) = queue_set();
        set.set_active(true);
        set.set_mark_mask(ColoredPointer::MARKED0_MASK);
        let mut buffer = set.new_buffer();

        set.pre_write(0, &mut buffer);
        set.pre_write(0x1000 | ColoredPointer::MARKED0_MASK, &mut buffer);
        assert!(buffer.is_empty());

        // Stale mark bit from the previous cycle is not current: captured.
        set.pre_write(0x1000 | ColoredPointer::MARKED1_MASK, &mut buffer);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_overflow_hands_off_exactly_once() {
        let (_worklist, set) = queue_set();
        set.set_active(true);
        let mut buffer = set.new_buffer();

        // Capacity 4: five captures leave one hand-off and one entry local.
        for i in 1..=5 {
            set.pre_write(i * 0x100, &mut buffer);
        }
        assert_eq!(set.pending(), 1);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_drain_feeds_worklist() {
        let (worklist, set) = queue_set();
        set.set_active(true);
        let mut buffer = set.new_buffer();

        set.pre_write(0x1100 | ColoredPointer::MARKED1_MASK, &mut buffer);
        set.pre_write(0x2200, &mut buffer);
        set.flush(&mut buffer);

        let (buffers, entries) = set.drain();
        assert_eq!(buffers, 1);
        assert_eq!(entries, 2);

        // Addresses only; color bits stripped on the worklist.
        let mut addrs = vec![worklist.pop().unwrap(), worklist.pop().unwrap()];
        addrs.sort_unstable();
        assert_eq!(addrs, vec![0x1100, 0x2200]);
    }

    #[test]
    fn test_array_pre_skips_uninitialized_dest() {
        let (_worklist, set) = queue_set();
        set.set_active(true);
        let mut buffer = set.new_buffer();

        let olds = [0x1000, 0x2000, 0x3000];
        set.write_ref_array_pre(&olds, true, &mut buffer);
        assert!(buffer.is_empty());

        set.write_ref_array_pre(&olds, false, &mut buffer);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_exhaustion_pushes_to_worklist() {
        let (worklist, set) = queue_set();
        set.set_active(true);

        // Fill the arena.
        for _ in 0..4 {
            let mut b = set.new_buffer();
            b.push(0xAAAA);
            set.flush(&mut b);
        }

        // Fifth hand-off cannot park; its pre-image goes straight to
        // the worklist.
        let mut buffer = set.new_buffer();
        buffer.push(0xBBBB);
        set.flush(&mut buffer);

        let mut found = false;
        while let Some(addr) = worklist.pop() {
            if addr == 0xBBBB {
                found = true;
            }
        }
        assert!(found, "pre-image survived arena exhaustion");
    }

    #[test]
    fn test_discard_on_abort() {
        let (worklist, set) = queue_set();
        set.set_active(true);
        let mut buffer = set.new_buffer();
        set.pre_write(0x1000, &mut buffer);
        set.flush(&mut buffer);

        assert_eq!(set.discard(), 1);
        assert!(worklist.is_empty(), "aborted pre-images are not marked");
    }
}
