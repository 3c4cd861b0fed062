//! Barrier Logging and Tracing
//!
//! Structured event log for the barrier subsystem, useful for:
//! - Phase-transition audits
//! - Debugging queue-set pressure (hand-offs, synchronous fallbacks)
//! - Production monitoring
//!
//! Log Levels:
//! - ERROR: aborted cycles, invalid transitions
//! - WARN: arena exhaustion, synchronous fallbacks
//! - INFO: phase transitions, thread lifecycle
//! - DEBUG: drains, refinement bursts
//! - TRACE: per-buffer hand-offs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Log level for barrier events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

/// Barrier event types
#[derive(Debug, Clone)]
pub enum GcEvent {
    /// Phase transition committed by the coordinator
    PhaseTransition {
        from: &'static str,
        to: &'static str,
        cycle: u64,
    },

    /// Cycle aborted at a safepoint
    CycleAbort { phase: &'static str, cycle: u64 },

    /// Mutator thread attached to the barrier subsystem
    ThreadAttached { thread_id: u64, satb_active: bool },

    /// Mutator thread detached and flushed its buffers
    ThreadDetached {
        thread_id: u64,
        satb_flushed: usize,
        cards_flushed: usize,
    },

    /// A full buffer was handed to a global queue set
    BufferHandOff { queue: &'static str, entries: usize },

    /// Queue arena exhausted; entries processed synchronously
    SyncFallback { queue: &'static str, entries: usize },

    /// Dirty-card backlog crossed the refinement threshold
    RefinementBurst { pending_buffers: usize },

    /// A queue set was drained
    QueueDrained {
        queue: &'static str,
        buffers: usize,
        entries: usize,
    },

    /// Refinement pass statistics
    RefineStats {
        cards_refined: u64,
        remset_inserts: u64,
    },
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct GcLoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Enable console output
    pub console: bool,

    /// Enable JSON format
    pub json: bool,

    /// Enable timestamps
    pub timestamps: bool,
}

impl Default for GcLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: false,
            json: false,
            timestamps: true,
        }
    }
}

/// GcLogger - centralized event log for the barrier subsystem
pub struct GcLogger {
    config: GcLoggerConfig,
    events: Mutex<Vec<(Instant, GcEvent)>>,
    enabled: AtomicBool,
}

impl GcLogger {
    pub fn new(config: GcLoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Record an event and emit it per the configured sinks.
    pub fn log(&self, event: GcEvent) {
        if !self.is_enabled() {
            return;
        }

        if self.event_level(&event) > self.config.level {
            return;
        }

        if let Ok(mut events) = self.events.lock() {
            events.push((Instant::now(), event.clone()));
        }

        if self.config.console {
            self.output_console(&event);
        }
    }

    fn event_level(&self, event: &GcEvent) -> LogLevel {
        match event {
            GcEvent::CycleAbort { .. } => LogLevel::Error,
            GcEvent::SyncFallback { .. } => LogLevel::Warn,
            GcEvent::PhaseTransition { .. }
            | GcEvent::ThreadAttached { .. }
            | GcEvent::ThreadDetached { .. } => LogLevel::Info,
            GcEvent::RefinementBurst { .. }
            | GcEvent::QueueDrained { .. }
            | GcEvent::RefineStats { .. } => LogLevel::Debug,
            GcEvent::BufferHandOff { .. } => LogLevel::Trace,
        }
    }

    fn output_console(&self, event: &GcEvent) {
        if self.config.timestamps {
            let now = chrono::Local::now();
            print!("[{}] ", now.format("%Y-%m-%d %H:%M:%S%.3f"));
        }

        if self.config.json {
            self.output_json(event);
        } else {
            self.output_human(event);
        }
    }

    fn output_human(&self, event: &GcEvent) {
        match event {
            GcEvent::PhaseTransition { from, to, cycle } => {
                println!("[GC] Cycle {}: phase {} -> {}", cycle, from, to);
            },
            GcEvent::CycleAbort { phase, cycle } => {
                eprintln!("[GC] Cycle {} aborted during {}", cycle, phase);
            },
            GcEvent::ThreadAttached {
                thread_id,
                satb_active,
            } => {
                println!(
                    "[GC] Thread {} attached (satb_active={})",
                    thread_id, satb_active
                );
            },
            GcEvent::ThreadDetached {
                thread_id,
                satb_flushed,
                cards_flushed,
            } => {
                println!(
                    "[GC] Thread {} detached ({} satb entries, {} cards flushed)",
                    thread_id, satb_flushed, cards_flushed
                );
            },
            GcEvent::BufferHandOff { queue, entries } => {
                println!("[GC] {} buffer handed off ({} entries)", queue, entries);
            },
            GcEvent::SyncFallback { queue, entries } => {
                println!(
                    "[GC] {} arena exhausted, {} entries processed inline",
                    queue, entries
                );
            },
            GcEvent::RefinementBurst { pending_buffers } => {
                println!(
                    "[GC] Refinement burst requested ({} buffers pending)",
                    pending_buffers
                );
            },
            GcEvent::QueueDrained {
                queue,
                buffers,
                entries,
            } => {
                println!(
                    "[GC] {} drained: {} buffers, {} entries",
                    queue, buffers, entries
                );
            },
            GcEvent::RefineStats {
                cards_refined,
                remset_inserts,
            } => {
                println!(
                    "[GC] Refined {} cards ({} remembered-set inserts)",
                    cards_refined, remset_inserts
                );
            },
        }
    }

    fn output_json(&self, event: &GcEvent) {
        let json = match event {
            GcEvent::PhaseTransition { from, to, cycle } => serde_json::json!({
                "type": "phase_transition",
                "cycle": cycle,
                "from": from,
                "to": to
            }),
            GcEvent::CycleAbort { phase, cycle } => serde_json::json!({
                "type": "cycle_abort",
                "cycle": cycle,
                "phase": phase
            }),
            GcEvent::ThreadAttached {
                thread_id,
                satb_active,
            } => serde_json::json!({
                "type": "thread_attached",
                "thread_id": thread_id,
                "satb_active": satb_active
            }),
            GcEvent::ThreadDetached {
                thread_id,
                satb_flushed,
                cards_flushed,
            } => serde_json::json!({
                "type": "thread_detached",
                "thread_id": thread_id,
                "satb_flushed": satb_flushed,
                "cards_flushed": cards_flushed
            }),
            GcEvent::BufferHandOff { queue, entries } => serde_json::json!({
                "type": "buffer_hand_off",
                "queue": queue,
                "entries": entries
            }),
            GcEvent::SyncFallback { queue, entries } => serde_json::json!({
                "type": "sync_fallback",
                "queue": queue,
                "entries": entries
            }),
            GcEvent::RefinementBurst { pending_buffers } => serde_json::json!({
                "type": "refinement_burst",
                "pending_buffers": pending_buffers
            }),
            GcEvent::QueueDrained {
                queue,
                buffers,
                entries,
            } => serde_json::json!({
                "type": "queue_drained",
                "queue": queue,
                "buffers": buffers,
                "entries": entries
            }),
            GcEvent::RefineStats {
                cards_refined,
                remset_inserts,
            } => serde_json::json!({
                "type": "refine_stats",
                "cards_refined": cards_refined,
                "remset_inserts": remset_inserts
            }),
        };

        if let Ok(json_str) = serde_json::to_string(&json) {
            println!("{}", json_str);
        }
    }

    /// Get all recorded events.
    pub fn get_events(&self) -> Vec<(Instant, GcEvent)> {
        if let Ok(events) = self.events.lock() {
            events.clone()
        } else {
            Vec::new()
        }
    }

    pub fn clear_events(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    pub fn event_count(&self) -> usize {
        if let Ok(events) = self.events.lock() {
            events.len()
        } else {
            0
        }
    }
}

impl Default for GcLogger {
    fn default() -> Self {
        Self::new(GcLoggerConfig::default())
    }
}

/// Global barrier logger
lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<GcLogger> = Mutex::new(GcLogger::default());
}

/// Log an event to the global logger.
pub fn log_event(event: GcEvent) {
    if let Ok(logger) = GLOBAL_LOGGER.lock() {
        logger.log(event);
    }
}

/// Replace the global logger configuration.
pub fn configure_logger(config: GcLoggerConfig) {
    if let Ok(mut logger) = GLOBAL_LOGGER.lock() {
        *logger = GcLogger::new(config);
    }
}

/// Event count in the global logger.
pub fn get_event_count() -> usize {
    if let Ok(logger) = GLOBAL_LOGGER.lock() {
        logger.event_count()
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_records_events() {
        let logger = GcLogger::default();

        logger.log(GcEvent::PhaseTransition {
            from: "Idle",
            to: "Marking",
            cycle: 1,
        });

        assert_eq!(logger.event_count(), 1);
    }

    #[test]
    fn test_logger_disable() {
        let logger = GcLogger::default();

        logger.disable();
        logger.log(GcEvent::PhaseTransition {
            from: "Idle",
            to: "Marking",
            cycle: 1,
        });

        assert_eq!(logger.event_count(), 0);
    }

    #[test]
    fn test_level_filtering() {
        let logger = GcLogger::new(GcLoggerConfig {
            level: LogLevel::Warn,
            ..Default::default()
        });

        // Trace-level event filtered out.
        logger.log(GcEvent::BufferHandOff {
            queue: "satb",
            entries: 8,
        });
        assert_eq!(logger.event_count(), 0);

        // Warn-level event kept.
        logger.log(GcEvent::SyncFallback {
            queue: "dirty-card",
            entries: 8,
        });
        assert_eq!(logger.event_count(), 1);
    }

    #[test]
    fn test_global_logger() {
        log_event(GcEvent::ThreadAttached {
            thread_id: 7,
            satb_active: false,
        });

        assert!(get_event_count() > 0);
    }
}
