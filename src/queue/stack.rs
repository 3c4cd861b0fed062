//! Buffer Stack - Arena-Backed Lock-Free Stack of Full Buffers
//!
//! The global queue sets hand full buffers between mutator threads and
//! collector threads through this stack. Producers are the mutators: any
//! thread may push a full buffer at any time with no coordination beyond a
//! CAS on the head word. Consumers are collector threads, one draining at a
//! time per queue set.
//!
//! Layout:
//! ```text
//!            free_head ──► node ──► node ──► node ──► NIL
//!            full_head ──► node ──► node ──► NIL
//!
//!  push(buf):  pop node off free list, store buf, CAS onto full list
//!  pop():      CAS node off full list, take buf, CAS onto free list
//! ```
//!
//! Nodes live in a fixed arena allocated at construction, so a push never
//! allocates. Both head words pack a 32-bit generation tag next to the node
//! index; the tag is bumped on every successful swing, which defeats ABA
//! when two threads race to pop the same free node.
//!
//! Exhaustion (empty free list) is reported to the caller, who processes the
//! triggering item synchronously instead - entries are never dropped.

use crate::queue::buffer::PtrBuffer;
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// Sentinel index for "end of list".
const NIL: u32 = u32::MAX;

/// Pack a (tag, index) pair into one CAS-able word.
#[inline]
fn pack(tag: u32, index: u32) -> u64 {
    ((tag as u64) << 32) | index as u64
}

#[inline]
fn unpack(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, word as u32)
}

/// One arena slot: an intrusive next link plus the parked buffer.
struct Node {
    next: AtomicU32,
    /// Only the thread that currently holds the node exclusively (popped it
    /// off one list, not yet pushed it onto the other) touches the cell.
    slot: UnsafeCell<Option<PtrBuffer>>,
}

/// BufferStack - lock-free multi-producer stack of buffer nodes
///
/// # Thread Safety
///
/// Push is wait-free-bounded for any number of producers; pop assumes one
/// draining consumer at a time per the queue-set contract, though concurrent
/// pops are still memory-safe thanks to the tagged heads.
pub struct BufferStack {
    nodes: Box<[Node]>,
    // The two heads are the only contended words; keep them off each
    // other's cache line.
    free_head: CachePadded<AtomicU64>,
    full_head: CachePadded<AtomicU64>,
    /// Approximate count of buffers awaiting drain.
    pending: AtomicUsize,
}

// The UnsafeCell is only dereferenced by the node's exclusive holder; the
// lists transfer that exclusivity with Acquire/Release CAS pairs.
unsafe impl Send for BufferStack {}
unsafe impl Sync for BufferStack {}

impl BufferStack {
    /// Create a stack whose arena holds `node_count` buffer slots.
    pub fn new(node_count: usize) -> Self {
        debug_assert!(node_count >= 2, "arena must hold at least two nodes");
        let nodes: Box<[Node]> = (0..node_count)
            .map(|i| Node {
                // Initially every node sits on the free list, linked in
                // index order.
                next: AtomicU32::new(if i + 1 < node_count {
                    (i + 1) as u32
                } else {
                    NIL
                }),
                slot: UnsafeCell::new(None),
            })
            .collect();

        Self {
            nodes,
            free_head: CachePadded::new(AtomicU64::new(pack(0, 0))),
            full_head: CachePadded::new(AtomicU64::new(pack(0, NIL))),
            pending: AtomicUsize::new(0),
        }
    }

    /// Pop a node index off `head`, or None if the list is empty.
    fn pop_node(&self, head: &AtomicU64) -> Option<u32> {
        let mut current = head.load(Ordering::Acquire);
        loop {
            let (tag, index) = unpack(current);
            if index == NIL {
                return None;
            }
            let next = self.nodes[index as usize].next.load(Ordering::Acquire);
            match head.compare_exchange_weak(
                current,
                pack(tag.wrapping_add(1), next),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(index),
                Err(actual) => current = actual,
            }
        }
    }

    /// Push node `index` onto `head`.
    fn push_node(&self, head: &AtomicU64, index: u32) {
        let mut current = head.load(Ordering::Acquire);
        loop {
            let (tag, top) = unpack(current);
            self.nodes[index as usize].next.store(top, Ordering::Relaxed);
            match head.compare_exchange_weak(
                current,
                pack(tag.wrapping_add(1), index),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Hand a full buffer to the stack.
    ///
    /// On success the buffer is owned by the stack until a consumer pops it.
    /// If the arena is exhausted the buffer is returned to the caller, who
    /// must process its contents synchronously.
    pub fn push(&self, buffer: PtrBuffer) -> Result<(), PtrBuffer> {
        let Some(index) = self.pop_node(&self.free_head) else {
            return Err(buffer);
        };

        // Exclusive: the node is off both lists.
        unsafe {
            *self.nodes[index as usize].slot.get() = Some(buffer);
        }

        self.push_node(&self.full_head, index);
        self.pending.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Take one pending buffer, LIFO order.
    pub fn pop(&self) -> Option<PtrBuffer> {
        let index = self.pop_node(&self.full_head)?;

        // Exclusive again: off both lists.
        let buffer = unsafe { (*self.nodes[index as usize].slot.get()).take() };

        self.push_node(&self.free_head, index);
        self.pending.fetch_sub(1, Ordering::Relaxed);

        debug_assert!(buffer.is_some(), "full-list node without a buffer");
        buffer
    }

    /// Approximate number of buffers awaiting drain.
    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Arena capacity in nodes.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn full_buffer(tagged: usize) -> PtrBuffer {
        let mut buf = PtrBuffer::new(4);
        for i in 0..4 {
            buf.push(tagged * 100 + i);
        }
        buf
    }

    #[test]
    fn test_push_pop_round_trip() {
        let stack = BufferStack::new(4);
        stack.push(full_buffer(1)).unwrap();
        assert_eq!(stack.pending(), 1);

        let buf = stack.pop().unwrap();
        assert_eq!(buf.entries(), &[100, 101, 102, 103]);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_lifo_order() {
        let stack = BufferStack::new(4);
        stack.push(full_buffer(1)).unwrap();
        stack.push(full_buffer(2)).unwrap();

        assert_eq!(stack.pop().unwrap().entries()[0], 200);
        assert_eq!(stack.pop().unwrap().entries()[0], 100);
        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_exhaustion_returns_buffer() {
        let stack = BufferStack::new(2);
        stack.push(full_buffer(1)).unwrap();
        stack.push(full_buffer(2)).unwrap();

        // Arena full: the third push must hand the buffer back intact.
        let rejected = stack.push(full_buffer(3)).unwrap_err();
        assert_eq!(rejected.entries(), &[300, 301, 302, 303]);

        // Draining frees a node for reuse.
        stack.pop().unwrap();
        assert!(stack.push(full_buffer(3)).is_ok());
    }

    #[test]
    fn test_nodes_recycle() {
        let stack = BufferStack::new(2);
        for round in 0..100 {
            stack.push(full_buffer(round)).unwrap();
            let buf = stack.pop().unwrap();
            assert_eq!(buf.entries()[0], round * 100);
        }
        assert!(stack.is_empty());
    }

    #[test]
    fn test_concurrent_producers() {
        let stack = Arc::new(BufferStack::new(64));
        let mut handles = Vec::new();

        for t in 0..8 {
            let stack = Arc::clone(&stack);
            handles.push(thread::spawn(move || {
                for i in 0..8 {
                    let mut buf = PtrBuffer::new(1);
                    buf.push(t * 1000 + i);
                    stack.push(buf).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stack.pending(), 64);
        let mut seen = Vec::new();
        while let Some(buf) = stack.pop() {
            seen.extend_from_slice(buf.entries());
        }
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 64, "every pushed entry drained exactly once");
    }

    #[test]
    fn test_concurrent_push_pop_churn() {
        let stack = Arc::new(BufferStack::new(8));
        let producer = {
            let stack = Arc::clone(&stack);
            thread::spawn(move || {
                let mut synchronous = 0usize;
                for i in 0..1000 {
                    let mut buf = PtrBuffer::new(1);
                    buf.push(i);
                    if stack.push(buf).is_err() {
                        // Arena momentarily full; the real barrier would
                        // process the entry synchronously here.
                        synchronous += 1;
                    }
                }
                synchronous
            })
        };

        let mut drained = 0usize;
        while !producer.is_finished() || !stack.is_empty() {
            if stack.pop().is_some() {
                drained += 1;
            }
        }
        let synchronous = producer.join().unwrap();
        assert_eq!(drained + synchronous, 1000, "no entry lost or duplicated");
    }
}
