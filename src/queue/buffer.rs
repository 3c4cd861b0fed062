//! Pointer Buffer - Bounded Thread-Owned Entry Array
//!
//! Both barrier queues (SATB pre-images and dirty cards) buffer entries in
//! the same shape: a bounded array of word-sized slots plus a write cursor,
//! owned exclusively by one thread at a time. Hand-off to a global queue set
//! moves the whole buffer; entries are never shared while buffered.

/// PtrBuffer - bounded array of word entries with a write cursor
///
/// Exclusive ownership: only the owning mutator thread pushes, and only the
/// draining collector thread reads, never both at once. The hand-off through
/// `BufferStack` is the ownership transfer point.
#[derive(Debug)]
pub struct PtrBuffer {
    entries: Box<[usize]>,
    cursor: usize,
}

impl PtrBuffer {
    /// Create an empty buffer with room for `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "buffer capacity must be positive");
        Self {
            entries: vec![0usize; capacity].into_boxed_slice(),
            cursor: 0,
        }
    }

    /// Append an entry.
    ///
    /// Returns `true` if the buffer is full after the push and must be
    /// handed off before the next entry. Pushing into a full buffer is a
    /// caller bug and panics in debug builds.
    #[inline]
    pub fn push(&mut self, entry: usize) -> bool {
        debug_assert!(self.cursor < self.entries.len(), "push into full buffer");
        self.entries[self.cursor] = entry;
        self.cursor += 1;
        self.cursor == self.entries.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.cursor == self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// The filled prefix of the buffer.
    #[inline]
    pub fn entries(&self) -> &[usize] {
        &self.entries[..self.cursor]
    }

    /// Reset the cursor, keeping the storage for reuse.
    #[inline]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Move all entries out, leaving the buffer empty but allocated.
    pub fn take_entries(&mut self) -> Vec<usize> {
        let drained = self.entries[..self.cursor].to_vec();
        self.cursor = 0;
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut buf = PtrBuffer::new(3);
        assert!(!buf.push(10));
        assert!(!buf.push(20));
        assert!(buf.push(30)); // full signal on the last slot
        assert!(buf.is_full());
        assert_eq!(buf.entries(), &[10, 20, 30]);
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut buf = PtrBuffer::new(2);
        buf.push(1);
        buf.push(2);
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 2);
    }

    #[test]
    fn test_take_entries_drains() {
        let mut buf = PtrBuffer::new(4);
        buf.push(7);
        buf.push(8);
        let drained = buf.take_entries();
        assert_eq!(drained, vec![7, 8]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_buffer() {
        let buf = PtrBuffer::new(1);
        assert!(buf.is_empty());
        assert!(!buf.is_full());
        assert_eq!(buf.entries(), &[] as &[usize]);
    }
}
