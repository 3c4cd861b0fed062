//! Marking Side - Concurrent Mark Worklist
//!
//! The barrier subsystem does not traverse the heap; it only feeds the
//! marking threads. Everything the barriers discover (unmarked loads during
//! Marking, SATB pre-images at drain) lands on this worklist.

pub mod worklist;

pub use worklist::MarkWorklist;
