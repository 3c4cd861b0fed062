//! Phase Coordinator - GC Cycle Phase Management
//!
//! Drives the barrier subsystem through the cycle phases:
//!
//! ```text
//! Idle -> Marking -> FinalMark -> Relocating -> Cleanup -> Idle
//! ```
//!
//! All phase transitions and thread attach/detach run under one publication
//! lock, so a mutator thread can never observe a half-published barrier
//! configuration: SATB flag, mark parity and bad mask change together.
//!
//! The coordinator owns no collection policy. It flips the switches the
//! collector needs flipped and leaves marking, relocation and reclamation
//! to the machinery behind the worklist and forwarding table.

use crate::barrier::LoadBarrier;
use crate::card::DirtyCardQueueSet;
use crate::error::{GcError, Result};
use crate::logging::{log_event, GcEvent};
use crate::marker::MarkWorklist;
use crate::phase::{GcPhase, PhaseCell};
use crate::relocate::ForwardingTable;
use crate::runtime::{Safepoint, ThreadGcState, ThreadLifecycle};
use crate::satb::SatbQueueSet;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// PhaseCoordinator - serializes phase transitions and thread lifecycle
///
/// ## Thread Safety
///
/// Transition methods and attach/detach take the publication lock; the
/// barrier hot paths never do. Mutators read the published state through
/// atomics inside `LoadBarrier`, `SatbQueueSet` and their own
/// `ThreadGcState`.
pub struct PhaseCoordinator {
    phase: Arc<PhaseCell>,
    load_barrier: Arc<LoadBarrier>,
    satb: Arc<SatbQueueSet>,
    cards: Arc<DirtyCardQueueSet>,
    worklist: Arc<MarkWorklist>,
    forwarding: Arc<ForwardingTable>,
    layout: Arc<crate::heap::HeapLayout>,
    safepoint: Arc<Safepoint>,

    /// Publication lock: phase transitions, attach, detach.
    publication: Mutex<()>,

    /// Registered mutator threads.
    threads: Mutex<Vec<Arc<ThreadGcState>>>,

    cycle: AtomicU64,
    next_thread_id: AtomicU64,
}

impl PhaseCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        phase: Arc<PhaseCell>,
        load_barrier: Arc<LoadBarrier>,
        satb: Arc<SatbQueueSet>,
        cards: Arc<DirtyCardQueueSet>,
        worklist: Arc<MarkWorklist>,
        forwarding: Arc<ForwardingTable>,
        layout: Arc<crate::heap::HeapLayout>,
        safepoint: Arc<Safepoint>,
    ) -> Self {
        Self {
            phase,
            load_barrier,
            satb,
            cards,
            worklist,
            forwarding,
            layout,
            safepoint,
            publication: Mutex::new(()),
            threads: Mutex::new(Vec::new()),
            cycle: AtomicU64::new(0),
            next_thread_id: AtomicU64::new(1),
        }
    }

    pub fn phase(&self) -> GcPhase {
        self.phase.load()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle.load(Ordering::Relaxed)
    }

    pub fn safepoint(&self) -> &Arc<Safepoint> {
        &self.safepoint
    }

    fn expect_phase(&self, expected: GcPhase) -> Result<()> {
        let actual = self.phase.load();
        if actual != expected {
            return Err(GcError::InvalidState {
                expected: expected.name().to_string(),
                actual: actual.name().to_string(),
            });
        }
        Ok(())
    }

    fn publish_phase(&self, from: GcPhase, to: GcPhase) {
        let cycle = self.cycle.load(Ordering::Relaxed);
        self.phase.store(to);
        log::info!("phase {} -> {} (cycle {})", from.name(), to.name(), cycle);
        log_event(GcEvent::PhaseTransition {
            from: from.name(),
            to: to.name(),
            cycle,
        });
    }

    // ========================================================================
    // Phase transitions
    // ========================================================================

    /// Idle -> Marking.
    ///
    /// Flips mark parity, arms SATB on every registered thread and publishes
    /// the marking bad mask, all under the publication lock.
    pub fn start_marking(&self) -> Result<()> {
        let _guard = self.publication.lock();
        self.expect_phase(GcPhase::Idle)?;

        self.cycle.fetch_add(1, Ordering::Relaxed);
        self.worklist.reopen();

        let mark_mask = self.load_barrier.flip_mark_parity();
        self.satb.set_mark_mask(mark_mask);
        self.satb.set_active(true);
        for thread in self.threads.lock().iter() {
            thread.set_satb_active(true);
        }
        self.load_barrier.publish_marking_mask();

        self.publish_phase(GcPhase::Idle, GcPhase::Marking);
        Ok(())
    }

    /// Marking -> FinalMark.
    ///
    /// Sync point: flushes every thread's SATB buffer and drains the queue
    /// set into the worklist, so the marker sees the complete snapshot.
    /// Returns the number of pre-images drained.
    pub fn final_mark(&self) -> Result<usize> {
        let _guard = self.publication.lock();
        self.expect_phase(GcPhase::Marking)?;

        for thread in self.threads.lock().iter() {
            thread.flush();
        }
        let (_buffers, entries) = self.satb.drain();

        self.publish_phase(GcPhase::Marking, GcPhase::FinalMark);
        Ok(entries)
    }

    /// FinalMark -> Relocating.
    ///
    /// The caller has already selected the relocation set (regions flagged
    /// via `Region::set_in_relocation_set`) and primed the forwarding table
    /// driver. SATB goes quiet; the remap bad mask makes every subsequent
    /// load heal.
    pub fn start_relocating(&self) -> Result<()> {
        let _guard = self.publication.lock();
        self.expect_phase(GcPhase::FinalMark)?;

        self.satb.set_active(false);
        for thread in self.threads.lock().iter() {
            thread.set_satb_active(false);
        }
        self.worklist.close();
        self.load_barrier.publish_remap_mask();

        self.publish_phase(GcPhase::FinalMark, GcPhase::Relocating);
        Ok(())
    }

    /// Relocating -> Cleanup.
    ///
    /// Requires the forwarding table to be complete; half-relocated cycles
    /// must abort instead.
    pub fn start_cleanup(&self) -> Result<()> {
        let _guard = self.publication.lock();
        self.expect_phase(GcPhase::Relocating)?;

        if !self.forwarding.is_complete() {
            return Err(GcError::RelocationFailed(
                "forwarding table incomplete at cleanup".to_string(),
            ));
        }

        self.publish_phase(GcPhase::Relocating, GcPhase::Cleanup);
        Ok(())
    }

    /// Cleanup -> Idle.
    ///
    /// Tears the cycle down: masks cleared, queue sets drained, forwarding
    /// dropped, relocation-set flags and remembered sets of relocated
    /// regions reset.
    pub fn finish_cycle(&self) -> Result<()> {
        let _guard = self.publication.lock();
        self.expect_phase(GcPhase::Cleanup)?;

        self.load_barrier.clear_mask();
        self.satb.drain();
        self.cards.drain();
        self.forwarding.clear();
        for region in self.layout.regions() {
            if region.is_in_relocation_set() {
                region.reset();
            }
        }

        self.publish_phase(GcPhase::Cleanup, GcPhase::Idle);
        Ok(())
    }

    /// Abort the in-flight cycle at a safepoint.
    ///
    /// Quiesces mutators, throws away captured SATB pre-images, drains the
    /// dirty-card queue (refinement is idempotent, so applying it is safe),
    /// and resets masks and phase as one unit under the publication lock.
    ///
    /// The caller is responsible for having mutators poll the safepoint;
    /// detached test drivers with zero registered threads pass straight
    /// through the wait.
    pub fn abort_cycle(&self, reason: &str) -> Result<()> {
        let _guard = self.publication.lock();

        let from = self.phase.load();
        if from == GcPhase::Idle {
            return Err(GcError::InvalidState {
                expected: "an active cycle".to_string(),
                actual: "Idle".to_string(),
            });
        }
        let cycle = self.cycle.load(Ordering::Relaxed);
        log::warn!("aborting cycle {} in {}: {}", cycle, from.name(), reason);

        self.safepoint.request_safepoint();
        self.safepoint.wait_for_safepoint();

        self.satb.set_active(false);
        for thread in self.threads.lock().iter() {
            thread.set_satb_active(false);
            thread.flush();
        }
        self.satb.discard();
        self.cards.drain();
        self.worklist.clear();
        self.worklist.close();
        self.load_barrier.clear_mask();
        self.forwarding.clear();
        for region in self.layout.regions() {
            region.set_in_relocation_set(false);
        }

        self.phase.store(GcPhase::Idle);
        log_event(GcEvent::CycleAbort {
            phase: from.name(),
            cycle,
        });

        self.safepoint.release_safepoint();
        Ok(())
    }

    // ========================================================================
    // Thread lifecycle
    // ========================================================================

    /// Attach a mutator thread: register it and publish the current SATB
    /// flag to it. Dirty-card enqueueing is active from this point on.
    pub fn attach_thread(
        &self,
        satb: Arc<SatbQueueSet>,
        cards: Arc<DirtyCardQueueSet>,
    ) -> Result<Arc<ThreadGcState>> {
        let _guard = self.publication.lock();

        let id = self.next_thread_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(ThreadGcState::new(id, satb, cards));
        state.transition(ThreadLifecycle::Created, ThreadLifecycle::Attached)?;

        let satb_active = self.satb.is_active();
        state.set_satb_active(satb_active);

        let mut threads = self.threads.lock();
        threads.push(Arc::clone(&state));
        self.safepoint.set_total_threads(threads.len());

        log_event(GcEvent::ThreadAttached {
            thread_id: id,
            satb_active,
        });
        Ok(state)
    }

    /// Detach a mutator thread: flush both buffers unconditionally and
    /// deregister it.
    pub fn detach_thread(&self, state: &Arc<ThreadGcState>) -> Result<()> {
        let _guard = self.publication.lock();

        let (satb_flushed, cards_flushed) = state.flush();
        state.transition(ThreadLifecycle::Attached, ThreadLifecycle::Detached)?;

        let mut threads = self.threads.lock();
        threads.retain(|t| t.id() != state.id());
        self.safepoint.set_total_threads(threads.len());

        log_event(GcEvent::ThreadDetached {
            thread_id: state.id(),
            satb_flushed,
            cards_flushed,
        });
        Ok(())
    }

    pub fn thread_count(&self) -> usize {
        self.threads.lock().len()
    }
}
