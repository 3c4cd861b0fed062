//! Mark Worklist - Lock-Free Producer Side of Marking
//!
//! Multiple producers (every mutator running a barrier, plus the SATB
//! drain) push object addresses; marking threads steal them. Backed by a
//! `crossbeam_deque::Injector` so a barrier push never takes a lock.

use crossbeam_deque::{Injector, Steal};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// MarkWorklist - global injector of addresses awaiting marking
///
/// Thread Safety:
/// Push and steal are lock-free and may run from any thread concurrently.
pub struct MarkWorklist {
    queue: Injector<usize>,

    enqueued_count: AtomicUsize,
    processed_count: AtomicUsize,

    /// Closed after final mark; late pushes are dropped.
    closed: AtomicBool,
}

impl MarkWorklist {
    pub fn new() -> Self {
        Self {
            queue: Injector::new(),
            enqueued_count: AtomicUsize::new(0),
            processed_count: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Push an object address for marking.
    pub fn push(&self, address: usize) {
        if self.closed.load(Ordering::Relaxed) {
            return;
        }
        self.queue.push(address);
        self.enqueued_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Take one address, retrying through the injector's transient states.
    pub fn pop(&self) -> Option<usize> {
        loop {
            match self.queue.steal() {
                Steal::Success(address) => {
                    self.processed_count.fetch_add(1, Ordering::Relaxed);
                    return Some(address);
                },
                Steal::Empty => return None,
                Steal::Retry => continue,
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Approximate number of pending addresses.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// No more pushes accepted. Set at the final-mark sync point.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Reopen for the next cycle.
    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Discard pending work, e.g. on cycle abort.
    pub fn clear(&self) {
        while let Some(_) = self.pop() {}
    }

    pub fn enqueued_count(&self) -> usize {
        self.enqueued_count.load(Ordering::Relaxed)
    }

    pub fn processed_count(&self) -> usize {
        self.processed_count.load(Ordering::Relaxed)
    }
}

impl Default for MarkWorklist {
    fn default() -> Self {
        Self::new()
    }
}
