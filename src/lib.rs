//! # gc-barrier - Concurrent GC Barrier Subsystem
//!
//! The write/read barrier machinery of a concurrent, region-based garbage
//! collector, extracted as a standalone subsystem: the pieces that sit
//! between mutator heap accesses and the collector.
//!
//! ## Components
//!
//! - **Colored-pointer load barrier**: GC metadata lives in bits 44-47 of
//!   the reference word; a load whose word intersects the published bad
//!   mask takes a slow path that marks or heals and writes the good
//!   pointer back (self-healing).
//! - **SATB queue set**: snapshot-at-the-beginning pre-write capture during
//!   concurrent marking.
//! - **Dirty-card queue set**: card table plus refinement feeding per-region
//!   remembered sets for cross-region pointer tracking.
//! - **Thread-local GC state**: per-mutator buffers and flags with an
//!   enforced attach/detach lifecycle.
//! - **Phase coordinator**: publishes phase, masks and flags as one unit so
//!   barriers never observe a half-configured cycle.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gc_barrier::{BarrierConfig, BarrierSubsystem, CollectorFlavor, ObjectModel};
//! use std::sync::Arc;
//!
//! struct MyModel;
//! impl ObjectModel for MyModel {
//!     fn for_each_ref_slot(&self, _: usize, _: usize, _: &mut dyn FnMut(usize, usize)) {}
//! }
//!
//! fn main() -> Result<(), gc_barrier::GcError> {
//!     let config = BarrierConfig::default();
//!     let subsystem =
//!         BarrierSubsystem::new(config, Arc::new(MyModel), CollectorFlavor::Relocating)?;
//!
//!     let thread = subsystem.attach_thread()?;
//!     subsystem.coordinator().start_marking()?;
//!     // mutator loads/stores go through subsystem.barriers() ...
//!     subsystem.detach_thread(&thread)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Pointer Layout
//!
//! ```text
//! 64-bit Reference Word:
//! ┌────────────┬─────┬─────┬─────┬─────┬──────────────────────┐
//! │  Unused    │ Fin │ Rem │ M1  │ M0  │     Address          │
//! │  63-48     │ 47  │ 46  │ 45  │ 44  │       43-0           │
//! └────────────┴─────┴─────┴─────┴─────┴──────────────────────┘
//! ```
//!
//! Exactly one color bit is set on any non-null published reference; the
//! coordinator chooses which bit is "good" per phase and the barrier fast
//! path is a single AND against the complementary bad mask.
//!
//! ## Modules
//!
//! - [`barrier`]: colored pointers, load barrier, decorator dispatch
//! - [`card`]: card table, dirty-card queue set, refinement, remembered sets
//! - [`config`]: subsystem configuration and validation
//! - [`coordinator`]: phase transitions and thread lifecycle
//! - [`error`]: error types
//! - [`heap`]: heap layout, regions, object-model trait
//! - [`marker`]: mark worklist fed by barriers and SATB drains
//! - [`phase`]: the published phase cell
//! - [`queue`]: pointer buffers and the global buffer stack
//! - [`relocate`]: forwarding table for pointer healing
//! - [`runtime`]: safepoints and thread-local GC state
//! - [`satb`]: SATB pre-write queue set
//! - [`stats`]: barrier counters

pub mod config;
pub mod coordinator;
pub mod error;
pub mod phase;

pub mod card;
pub mod heap;
pub mod queue;
pub mod relocate;

pub mod barrier;
pub mod marker;
pub mod satb;

pub mod logging;
pub mod runtime;
pub mod stats;

pub use barrier::{
    BarrierDispatch, BarrierOps, BarrierSet, CollectorFlavor, ColoredPointer, LoadBarrier,
    AS_ARRAY, DEST_UNINITIALIZED, IN_HEAP, IN_NATIVE, ON_WEAK_REF,
};
pub use card::{CardTable, DirtyCardQueueSet, RememberedSet};
pub use config::BarrierConfig;
pub use coordinator::PhaseCoordinator;
pub use error::{GcError, Result};
pub use heap::{HeapLayout, ObjectModel, Region};
pub use marker::MarkWorklist;
pub use phase::{GcPhase, PhaseCell};
pub use relocate::ForwardingTable;
pub use runtime::{Safepoint, ThreadGcState, ThreadLifecycle};
pub use satb::SatbQueueSet;
pub use stats::{BarrierStats, StatsSnapshot};

use std::sync::Arc;

/// Crate version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// BarrierSubsystem - fully wired barrier stack
///
/// Owns one instance of every component, wired together the way a runtime
/// embedding this subsystem would wire them. Tests and the cycle driver go
/// through this.
pub struct BarrierSubsystem {
    config: BarrierConfig,
    layout: Arc<HeapLayout>,
    phase: Arc<PhaseCell>,
    worklist: Arc<MarkWorklist>,
    forwarding: Arc<ForwardingTable>,
    stats: Arc<BarrierStats>,
    satb: Arc<SatbQueueSet>,
    cards: Arc<DirtyCardQueueSet>,
    load_barrier: Arc<LoadBarrier>,
    barriers: BarrierSet,
    coordinator: PhaseCoordinator,
}

impl BarrierSubsystem {
    /// Build the subsystem from a validated configuration and the host
    /// runtime's object model.
    pub fn new(
        config: BarrierConfig,
        model: Arc<dyn ObjectModel>,
        flavor: CollectorFlavor,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| GcError::Configuration(e.to_string()))?;

        let layout = Arc::new(HeapLayout::new(&config)?);
        let phase = Arc::new(PhaseCell::new());
        let worklist = Arc::new(MarkWorklist::new());
        let forwarding = Arc::new(ForwardingTable::new(config.heap_base, config.heap_size));
        let stats = Arc::new(BarrierStats::new());
        let table = Arc::new(CardTable::new(
            config.heap_base,
            config.heap_size,
            config.card_shift,
        ));

        let satb = Arc::new(SatbQueueSet::new(
            Arc::clone(&worklist),
            Arc::clone(&stats),
            &config,
        ));
        let cards = Arc::new(DirtyCardQueueSet::new(
            Arc::clone(&layout),
            table,
            model,
            Arc::clone(&stats),
            &config,
        ));
        let load_barrier = Arc::new(LoadBarrier::new(
            Arc::clone(&phase),
            Arc::clone(&worklist),
            Arc::clone(&forwarding),
            Arc::clone(&layout),
            Arc::clone(&stats),
        ));
        let barriers = BarrierSet::new(flavor, Arc::clone(&load_barrier));
        let coordinator = PhaseCoordinator::new(
            Arc::clone(&phase),
            Arc::clone(&load_barrier),
            Arc::clone(&satb),
            Arc::clone(&cards),
            Arc::clone(&worklist),
            Arc::clone(&forwarding),
            Arc::clone(&layout),
            Arc::new(Safepoint::new(0)),
        );

        Ok(Self {
            config,
            layout,
            phase,
            worklist,
            forwarding,
            stats,
            satb,
            cards,
            load_barrier,
            barriers,
            coordinator,
        })
    }

    /// Attach the calling thread as a mutator.
    pub fn attach_thread(&self) -> Result<Arc<ThreadGcState>> {
        self.coordinator
            .attach_thread(Arc::clone(&self.satb), Arc::clone(&self.cards))
    }

    /// Detach a previously attached mutator thread.
    pub fn detach_thread(&self, thread: &Arc<ThreadGcState>) -> Result<()> {
        self.coordinator.detach_thread(thread)
    }

    pub fn config(&self) -> &BarrierConfig {
        &self.config
    }

    pub fn layout(&self) -> &Arc<HeapLayout> {
        &self.layout
    }

    pub fn phase(&self) -> GcPhase {
        self.phase.load()
    }

    pub fn coordinator(&self) -> &PhaseCoordinator {
        &self.coordinator
    }

    pub fn barriers(&self) -> &BarrierSet {
        &self.barriers
    }

    pub fn load_barrier(&self) -> &Arc<LoadBarrier> {
        &self.load_barrier
    }

    pub fn satb(&self) -> &Arc<SatbQueueSet> {
        &self.satb
    }

    pub fn cards(&self) -> &Arc<DirtyCardQueueSet> {
        &self.cards
    }

    pub fn worklist(&self) -> &Arc<MarkWorklist> {
        &self.worklist
    }

    pub fn forwarding(&self) -> &Arc<ForwardingTable> {
        &self.forwarding
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
