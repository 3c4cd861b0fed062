//! Queue Machinery - Buffers and Global Queue Sets
//!
//! Shared shape for both barrier queues: a thread-exclusive bounded buffer
//! ([`buffer::PtrBuffer`]) handed off, when full or at thread detach, to an
//! arena-backed lock-free stack ([`stack::BufferStack`]). The SATB queue set
//! and the dirty-card queue set are thin policy layers over these two types.

pub mod buffer;
pub mod stack;

pub use buffer::PtrBuffer;
pub use stack::BufferStack;
