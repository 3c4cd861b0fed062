//! GC Phase - Global Collection State Machine
//!
//! The phase is published process-wide by the Phase Coordinator and read by
//! every barrier. Transitions form a linear cycle:
//!
//! ```text
//! Idle ──► Marking ──► FinalMark ──► Relocating ──► Cleanup ──► Idle
//! ```
//!
//! FinalMark is a brief global synchronization point. It is not a
//! suspend-everything pause proper, but the invariants treat it as one:
//! SATB buffers are drained there and the snapshot is sealed.

use std::sync::atomic::{AtomicU8, Ordering};

/// Global collection phase
///
/// Only one phase is active VM-wide at a time; transitions are serialized by
/// the Phase Coordinator.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcPhase {
    /// No concurrent collection in progress. All barriers disabled.
    Idle = 0,
    /// Concurrent marking. SATB pre-write barrier active; loads assist
    /// marking.
    Marking = 1,
    /// Final mark synchronization point. SATB still active while remaining
    /// buffers drain.
    FinalMark = 2,
    /// Concurrent relocation. Load barrier heals stale pointers.
    Relocating = 3,
    /// Reclaiming regions, clearing remembered sets, resetting queue sets.
    Cleanup = 4,
}

impl GcPhase {
    /// Decode a phase from its wire value.
    ///
    /// Values outside the enum range fall back to `Idle`; the only writer is
    /// the coordinator, so this path is unreachable in practice.
    #[inline]
    pub fn from_u8(value: u8) -> GcPhase {
        match value {
            1 => GcPhase::Marking,
            2 => GcPhase::FinalMark,
            3 => GcPhase::Relocating,
            4 => GcPhase::Cleanup,
            _ => GcPhase::Idle,
        }
    }

    /// The phase that legally follows this one in the cycle.
    #[inline]
    pub fn successor(self) -> GcPhase {
        match self {
            GcPhase::Idle => GcPhase::Marking,
            GcPhase::Marking => GcPhase::FinalMark,
            GcPhase::FinalMark => GcPhase::Relocating,
            GcPhase::Relocating => GcPhase::Cleanup,
            GcPhase::Cleanup => GcPhase::Idle,
        }
    }

    /// True while SATB pre-write capture is required.
    #[inline]
    pub fn marking_active(self) -> bool {
        matches!(self, GcPhase::Marking | GcPhase::FinalMark)
    }

    /// Human-readable phase name for logs.
    pub fn name(self) -> &'static str {
        match self {
            GcPhase::Idle => "Idle",
            GcPhase::Marking => "Marking",
            GcPhase::FinalMark => "FinalMark",
            GcPhase::Relocating => "Relocating",
            GcPhase::Cleanup => "Cleanup",
        }
    }
}

/// Published phase cell
///
/// A single atomic byte read on barrier slow paths. Stores use `Release` so
/// that everything the coordinator prepared for the new phase (masks, flags)
/// is visible to a thread that observes the phase.
pub struct PhaseCell {
    value: AtomicU8,
}

impl PhaseCell {
    pub fn new() -> Self {
        Self {
            value: AtomicU8::new(GcPhase::Idle as u8),
        }
    }

    #[inline]
    pub fn load(&self) -> GcPhase {
        GcPhase::from_u8(self.value.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, phase: GcPhase) {
        self.value.store(phase as u8, Ordering::Release);
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successor_cycle_is_linear() {
        let mut phase = GcPhase::Idle;
        let expected = [
            GcPhase::Marking,
            GcPhase::FinalMark,
            GcPhase::Relocating,
            GcPhase::Cleanup,
            GcPhase::Idle,
        ];
        for want in expected {
            phase = phase.successor();
            assert_eq!(phase, want);
        }
    }

    #[test]
    fn test_marking_active_window() {
        assert!(!GcPhase::Idle.marking_active());
        assert!(GcPhase::Marking.marking_active());
        assert!(GcPhase::FinalMark.marking_active());
        assert!(!GcPhase::Relocating.marking_active());
        assert!(!GcPhase::Cleanup.marking_active());
    }

    #[test]
    fn test_from_u8_round_trip() {
        for phase in [
            GcPhase::Idle,
            GcPhase::Marking,
            GcPhase::FinalMark,
            GcPhase::Relocating,
            GcPhase::Cleanup,
        ] {
            assert_eq!(GcPhase::from_u8(phase as u8), phase);
        }
    }

    #[test]
    fn test_phase_cell_publish() {
        let cell = PhaseCell::new();
        assert_eq!(cell.load(), GcPhase::Idle);
        cell.store(GcPhase::Relocating);
        assert_eq!(cell.load(), GcPhase::Relocating);
    }
}
