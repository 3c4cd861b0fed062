//! Runtime coordination: safepoints and per-thread GC state.

pub mod safepoint;
pub mod thread_state;

pub use safepoint::{Safepoint, SAFEPOINT_NONE, SAFEPOINT_REACHED, SAFEPOINT_REQUESTED};
pub use thread_state::{ThreadGcState, ThreadLifecycle};
