//! Engine event vocabulary and handler fan-out
//!
//! Transport notifications are re-typed into [`TransferEvent`]s and delivered
//! to registered handlers from the engine's delivery path. Handlers run one
//! at a time in registration order; a panicking handler is contained and
//! logged so it can never abort a transfer or starve the handlers after it.

use airlift_types::{
    LogLevel, LogRecord, Percentage, Throughput, TransferError, TransferPhase, TransferProgress,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, trace, warn};

/// Everything the engine reports to its observers
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// A transfer attempt started moving bytes
    Started {
        /// Canonical path of the affected resource
        resource: String,
    },
    /// The lifecycle phase changed, transport-reported or synthesized
    StateChanged {
        /// Canonical path of the affected resource
        resource: String,
        /// Phase that was left
        old: TransferPhase,
        /// Phase that was entered
        new: TransferPhase,
    },
    /// Progress advanced for the ongoing attempt
    ProgressChanged {
        /// Canonical path of the affected resource
        resource: String,
        /// Progress snapshot
        progress: TransferProgress,
    },
    /// Forward progress was suspended
    Paused {
        /// Canonical path of the affected resource
        resource: String,
    },
    /// Forward progress picked back up
    Resumed {
        /// Canonical path of the affected resource
        resource: String,
    },
    /// The transfer finished successfully
    Completed {
        /// Canonical path of the affected resource
        resource: String,
    },
    /// An attempt died with the given classified error
    FatalError {
        /// Canonical path of the affected resource
        resource: String,
        /// The classified failure
        error: TransferError,
    },
    /// Cancellation completed, acknowledged or synthesized
    Cancelled {
        /// Reason given with the cancellation request, when any
        reason: Option<String>,
    },
    /// The transport got busy or went idle
    BusyChanged {
        /// Whether the transport is now busy
        busy: bool,
    },
    /// A log line from the transport or the engine itself
    Log(LogRecord),
}

type Handler = dyn Fn(&TransferEvent) + Send + Sync;

/// Registry of caller-supplied event handlers
///
/// Cheap to share behind an `Arc`. Emission snapshots the handler list, so a
/// handler that registers further handlers never deadlocks the bus.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<Vec<Arc<Handler>>>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler invoked for every emitted event
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&TransferEvent) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver one event to every handler, containing panics per handler
    pub fn emit(&self, event: TransferEvent) {
        let snapshot: Vec<Arc<Handler>> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                warn!(?event, "event handler panicked, continuing with the rest");
            }
        }
    }

    /// Emit a `Started` event
    pub fn started<S: Into<String>>(&self, resource: S) {
        self.emit(TransferEvent::Started {
            resource: resource.into(),
        });
    }

    /// Emit a `StateChanged` event
    pub fn state_changed<S: Into<String>>(&self, resource: S, old: TransferPhase, new: TransferPhase) {
        self.emit(TransferEvent::StateChanged {
            resource: resource.into(),
            old,
            new,
        });
    }

    /// Emit a `ProgressChanged` event
    pub fn progress_changed<S: Into<String>>(
        &self,
        resource: S,
        percentage: Percentage,
        avg_throughput: Throughput,
    ) {
        self.emit(TransferEvent::ProgressChanged {
            resource: resource.into(),
            progress: TransferProgress::new(percentage, avg_throughput),
        });
    }

    /// Emit a `Paused` event
    pub fn paused<S: Into<String>>(&self, resource: S) {
        self.emit(TransferEvent::Paused {
            resource: resource.into(),
        });
    }

    /// Emit a `Resumed` event
    pub fn resumed<S: Into<String>>(&self, resource: S) {
        self.emit(TransferEvent::Resumed {
            resource: resource.into(),
        });
    }

    /// Emit a `Completed` event
    pub fn completed<S: Into<String>>(&self, resource: S) {
        self.emit(TransferEvent::Completed {
            resource: resource.into(),
        });
    }

    /// Emit a `FatalError` event
    pub fn fatal_error<S: Into<String>>(&self, resource: S, error: TransferError) {
        self.emit(TransferEvent::FatalError {
            resource: resource.into(),
            error,
        });
    }

    /// Emit a `Cancelled` event
    pub fn cancelled(&self, reason: Option<String>) {
        self.emit(TransferEvent::Cancelled { reason });
    }

    /// Emit a `BusyChanged` event
    pub fn busy_changed(&self, busy: bool) {
        self.emit(TransferEvent::BusyChanged { busy });
    }

    /// Emit a `Log` event, mirroring it onto the tracing subscriber
    pub fn log(&self, record: LogRecord) {
        match record.level {
            LogLevel::Trace => trace!(
                category = %record.category,
                resource = %record.resource,
                "{}",
                record.message
            ),
            LogLevel::Debug => debug!(
                category = %record.category,
                resource = %record.resource,
                "{}",
                record.message
            ),
            LogLevel::Info => info!(
                category = %record.category,
                resource = %record.resource,
                "{}",
                record.message
            ),
            LogLevel::Warning => warn!(
                category = %record.category,
                resource = %record.resource,
                "{}",
                record.message
            ),
            LogLevel::Error => error!(
                category = %record.category,
                resource = %record.resource,
                "{}",
                record.message
            ),
        }
        self.emit(TransferEvent::Log(record));
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_events_reach_handlers_in_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        bus.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        bus.started("/a.bin");
        bus.progress_changed("/a.bin", 10, 4.2);
        bus.completed("/a.bin");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(matches!(seen[0], TransferEvent::Started { .. }));
        assert!(matches!(seen[1], TransferEvent::ProgressChanged { .. }));
        assert!(matches!(seen[2], TransferEvent::Completed { .. }));
    }

    #[test]
    fn test_panicking_handler_does_not_starve_the_rest() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.subscribe(|_| panic!("handler blew up"));
        let counter = Arc::clone(&calls);
        bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.busy_changed(true);
        bus.busy_changed(false);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_bus_survives_repeated_panics() {
        let bus = EventBus::new();
        bus.subscribe(|_| panic!("always"));

        for _ in 0..5 {
            bus.cancelled(None);
        }
        assert_eq!(bus.handler_count(), 1);
    }

    #[test]
    fn test_handler_registered_during_emit_does_not_deadlock() {
        let bus = Arc::new(EventBus::new());
        let clone = Arc::clone(&bus);

        bus.subscribe(move |_| {
            clone.subscribe(|_| {});
        });
        bus.started("/a.bin");

        assert_eq!(bus.handler_count(), 2);
    }

    #[test]
    fn test_progress_helper_clamps() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        bus.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        bus.progress_changed("/a.bin", 250, 1.0);

        match &seen.lock().unwrap()[0] {
            TransferEvent::ProgressChanged { progress, .. } => {
                assert_eq!(progress.percentage, 100);
            }
            other => panic!("unexpected event {other:?}"),
        };
    }
}
