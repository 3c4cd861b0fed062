//! Relocation Interface - Forwarding Lookups for Pointer Healing
//!
//! Relocation proper (object copying) is owned by the collector; the
//! barrier subsystem only consumes the forwarding table it publishes.

pub mod forwarding;

pub use forwarding::ForwardingTable;
