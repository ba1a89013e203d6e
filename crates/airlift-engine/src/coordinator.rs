//! Cooperative cancellation, pause and exclusivity coordination
//!
//! One [`Coordinator`] lives per engine instance. It owns three pieces of
//! shared state: the pause gate (a watch channel the retry loop waits on at
//! checkpoints), the cancellation latch (sticky per top-level operation, with
//! an optional caller-supplied reason), and the exclusivity flag that forbids
//! concurrent top-level operations against the same engine.
//!
//! The coordinator only holds state; it never talks to the transport. The
//! engine facade forwards the matching fire-and-forget transport calls, and
//! the retry loop consults the coordinator at its checkpoints.

use airlift_types::{Result, TransferError};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::trace;

#[derive(Debug, Default)]
struct Flags {
    operation_ongoing: bool,
    cancel_reason: Option<String>,
}

/// Shared cancellation/pause state for one engine instance
#[derive(Debug)]
pub struct Coordinator {
    flags: Mutex<Flags>,
    // true = open (work may proceed), false = paused
    gate: watch::Sender<bool>,
    // true once cancellation has been requested for the current operation
    cancel: watch::Sender<bool>,
}

impl Coordinator {
    /// Create a coordinator with the gate open and nothing cancelled
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        let (cancel, _) = watch::channel(false);
        Self {
            flags: Mutex::new(Flags::default()),
            gate,
            cancel,
        }
    }

    fn flags(&self) -> std::sync::MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the engine for one top-level operation
    ///
    /// Fails with `InvalidOperation` when another operation is still in
    /// flight. On success the cancellation latch and reason are reset and the
    /// gate is reopened; the claim is released when the returned permit is
    /// dropped.
    pub fn begin_operation(self: &Arc<Self>) -> Result<OperationPermit> {
        {
            let mut flags = self.flags();
            if flags.operation_ongoing {
                return Err(TransferError::invalid_operation(
                    "a transfer operation is already running - cannot start another one",
                ));
            }
            flags.operation_ongoing = true;
            flags.cancel_reason = None;
        }
        self.cancel.send_replace(false);
        self.gate.send_replace(true);
        Ok(OperationPermit {
            coordinator: Arc::clone(self),
        })
    }

    /// Whether a top-level operation is currently in flight
    pub fn is_operation_ongoing(&self) -> bool {
        self.flags().operation_ongoing
    }

    /// Request that the current operation pause at its next checkpoint
    ///
    /// Returns false when there is nothing to pause (no operation in flight)
    /// or the operation is already being cancelled. Requesting a pause that
    /// is already in effect is accepted again.
    pub fn try_pause(&self) -> bool {
        {
            let flags = self.flags();
            if !flags.operation_ongoing || *self.cancel.borrow() {
                return false;
            }
        }
        trace!("pause requested, lowering the gate");
        self.gate.send_replace(false);
        true
    }

    /// Request that a paused operation resume
    ///
    /// Guarded like [`try_pause`](Self::try_pause); resuming an operation
    /// that is not paused is accepted again.
    pub fn try_resume(&self) -> bool {
        {
            let flags = self.flags();
            if !flags.operation_ongoing || *self.cancel.borrow() {
                return false;
            }
        }
        trace!("resume requested, raising the gate");
        self.gate.send_replace(true);
        true
    }

    /// Whether the gate is currently lowered
    pub fn is_paused(&self) -> bool {
        !*self.gate.borrow()
    }

    /// Latch cancellation for the current operation
    ///
    /// Also reopens the gate so a paused operation wakes up and observes the
    /// latch instead of sleeping forever.
    pub fn request_cancel(&self, reason: Option<String>) {
        self.flags().cancel_reason = reason;
        self.cancel.send_replace(true);
        self.gate.send_replace(true);
    }

    /// Latch cancellation observed from the transport side
    ///
    /// Keeps an already-recorded reason, since the transport's own state
    /// report carries none.
    pub(crate) fn observe_cancelling(&self, reason: Option<String>) {
        {
            let mut flags = self.flags();
            if flags.cancel_reason.is_none() {
                flags.cancel_reason = reason;
            }
        }
        self.cancel.send_replace(true);
        self.gate.send_replace(true);
    }

    /// Whether cancellation has been requested for the current operation
    pub fn is_cancel_requested(&self) -> bool {
        *self.cancel.borrow()
    }

    /// The reason recorded with the cancellation request, when any
    pub fn cancel_reason(&self) -> Option<String> {
        self.flags().cancel_reason.clone()
    }

    /// A receiver observing gate movements
    pub(crate) fn gate_changes(&self) -> watch::Receiver<bool> {
        self.gate.subscribe()
    }

    /// A receiver observing the cancellation latch
    pub(crate) fn cancel_changes(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }

    fn end_operation(&self) {
        self.flags().operation_ongoing = false;
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive claim on the engine for one top-level operation
///
/// Dropping the permit releases the claim, whatever path the operation took
/// to its end.
#[derive(Debug)]
pub struct OperationPermit {
    coordinator: Arc<Coordinator>,
}

impl Drop for OperationPermit {
    fn drop(&mut self) {
        self.coordinator.end_operation();
    }
}
