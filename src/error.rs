//! Error Module - Barrier Subsystem Error Types
//!
//! Defines all error types used by the barrier subsystem.
//!
//! # Error Categories
//!
//! ## Cycle Errors
//! - `RelocationFailed` - An object could not be evacuated mid-cycle
//! - `CycleAborted` - The concurrent cycle was abandoned at a sync point
//!
//! ## State Errors
//! - `InvalidState` - Lifecycle or phase machine violation
//! - `Configuration` - Invalid configuration
//! - `InvalidArgument` - Invalid function argument
//!
//! ## Resource Errors
//! - `ResourceExhausted` - Buffer pool or queue-set arena depleted
//!
//! Note that barriers themselves never return errors to the mutator. Every
//! error here flows between the coordinator, the cycle driver and the
//! embedding runtime; in-barrier failures recover synchronously instead.

use thiserror::Error;

/// Main error type for all barrier-subsystem operations
///
/// # Examples
///
/// ```rust
/// use gc_barrier::error::GcError;
///
/// fn handle_error(err: GcError) {
///     match err {
///         GcError::RelocationFailed(reason) => {
///             eprintln!("cycle must fall back to full collection: {}", reason);
///         }
///         GcError::InvalidState { expected, actual } => {
///             eprintln!("state machine violation: expected {}, got {}", expected, actual);
///         }
///         _ => {
///             eprintln!("other error: {}", err);
///         }
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum GcError {
    /// Relocation phase failed
    ///
    /// **When returned:** The collector could not evacuate an object, e.g.
    /// heap exhaustion mid-cycle.
    ///
    /// **Recovery strategy:** Fatal to the concurrent cycle; the driver falls
    /// back to a full stop-the-world collection. Never surfaced from inside a
    /// barrier.
    #[error("Relocation phase failed: {0}")]
    RelocationFailed(String),

    /// Concurrent cycle aborted
    ///
    /// **When returned:** `PhaseCoordinator::abort_cycle` tore the cycle down
    /// at a global synchronization point.
    ///
    /// **Recovery strategy:** Run a synchronous full collection, then restart.
    #[error("Concurrent cycle aborted: {0}")]
    CycleAborted(String),

    /// Invalid state
    ///
    /// **When returned:** Phase machine or thread-lifecycle violation, e.g.
    /// `Relocating` requested while `Idle`, or attach after detach.
    ///
    /// **Recovery strategy:** Cannot recover - indicates a bug in the caller.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Configuration error
    ///
    /// **When returned:** Invalid barrier configuration detected.
    ///
    /// **Recovery strategy:** Use default configuration or fail fast.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid argument
    ///
    /// **When returned:** Function argument fails validation, e.g. an address
    /// outside the covered heap range.
    ///
    /// **Recovery strategy:** Fix caller to provide valid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Resource exhausted
    ///
    /// **When returned:** The buffer arena has no free nodes left. The barrier
    /// paths never observe this directly; they fall back to synchronous
    /// processing of the single item that triggered it.
    ///
    /// **Recovery strategy:** Trigger an early refinement burst or pause-time
    /// flush, then retry.
    #[error("Resource exhausted: {resource}")]
    ResourceExhausted { resource: String },

    /// Internal error - indicates a bug in the barrier subsystem
    ///
    /// **When returned:** Invariant violation or unexpected internal state.
    ///
    /// **Recovery strategy:** Cannot recover - this is a bug.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GcError {
    /// Check if this error is recoverable by retrying or collecting
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GcError::ResourceExhausted { .. } | GcError::CycleAborted(_)
        )
    }

    /// Check if this error forces the cycle to fall back to a full collection
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(self, GcError::RelocationFailed(_) | GcError::CycleAborted(_))
    }

    /// Check if this error indicates a bug in the code
    pub fn is_bug(&self) -> bool {
        matches!(self, GcError::InvalidState { .. } | GcError::Internal(_))
    }
}

/// Result type alias for barrier-subsystem operations
pub type Result<T> = std::result::Result<T, GcError>;
