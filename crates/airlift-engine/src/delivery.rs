//! Per-attempt notification delivery
//!
//! One attempt owns one notification channel. The pump drains it on the
//! engine's delivery task, re-types transport notifications into engine
//! events in arrival order, and resolves the attempt at its first terminal
//! notification. Everything after that first terminal resolution is dropped
//! with the channel, which is what makes terminal delivery exactly-once even
//! against duplicated or late native callbacks.
//!
//! The pump also owns the two clocks an attempt can die by: the cancellation
//! grace window (soft landing when the transport never acknowledges) and the
//! optional overall session deadline.

use crate::coordinator::Coordinator;
use crate::events::EventBus;
use airlift_types::{Direction, LogLevel, LogRecord, Percentage, Result, TransferError, TransferPhase};
use airlift_transport::TransportNotification;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

// Stand-in for "no deadline armed" in the select arms
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Everything one attempt's pump needs to know
pub(crate) struct DeliveryContext<'a> {
    pub resource: &'a str,
    pub direction: Direction,
    pub events: &'a EventBus,
    pub coordinator: &'a Coordinator,
    pub grace_window: Duration,
    pub deadline: Option<Instant>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
struct PhaseTracker {
    phase: TransferPhase,
    last_percentage: Option<Percentage>,
}

enum Step {
    Continue,
    Done(Result<Option<Vec<u8>>>),
}

impl DeliveryContext<'_> {
    /// Drain notifications until the attempt resolves
    ///
    /// Returns the payload on completion (bytes for downloads, `None` for
    /// uploads) or the classified terminal error.
    pub(crate) async fn pump(
        &self,
        rx: &mut mpsc::UnboundedReceiver<TransportNotification>,
    ) -> Result<Option<Vec<u8>>> {
        let mut tracker = PhaseTracker {
            phase: TransferPhase::Idle,
            last_percentage: None,
        };
        let mut grace_deadline: Option<Instant> = None;
        let mut cancel_watch_dead = false;
        let mut cancel_rx = self.coordinator.cancel_changes();

        loop {
            let far = Instant::now() + FAR_FUTURE;
            let grace_at = grace_deadline.unwrap_or(far);
            let deadline_at = self.deadline.unwrap_or(far);

            tokio::select! {
                biased;

                maybe = rx.recv() => match maybe {
                    Some(notification) => {
                        match self.process(&mut tracker, &mut grace_deadline, notification) {
                            Step::Continue => {}
                            Step::Done(outcome) => return outcome,
                        }
                    }
                    None => {
                        return Err(TransferError::internal(format!(
                            "transport dropped its notification sink for '{}' without a terminal report",
                            self.resource
                        )));
                    }
                },

                observed = cancel_rx.wait_for(|&cancelled| cancelled),
                        if grace_deadline.is_none() && !cancel_watch_dead => {
                    if observed.is_ok() {
                        debug!(resource = self.resource, "cancellation observed, arming the grace window");
                        grace_deadline = Some(Instant::now() + self.grace_window);
                    } else {
                        cancel_watch_dead = true;
                    }
                },

                () = time::sleep_until(grace_at), if grace_deadline.is_some() => {
                    return Err(self.soft_land(&tracker));
                },

                () = time::sleep_until(deadline_at), if self.deadline.is_some() => {
                    return Err(self.expire(&tracker));
                },
            }
        }
    }

    fn process(
        &self,
        tracker: &mut PhaseTracker,
        grace_deadline: &mut Option<Instant>,
        notification: TransportNotification,
    ) -> Step {
        match notification {
            TransportNotification::StateChanged { resource, old, new } => {
                if resource != self.resource {
                    warn!(
                        expected = self.resource,
                        reported = %resource,
                        "state change for a foreign resource ignored"
                    );
                    return Step::Continue;
                }
                self.enter_phase(tracker, grace_deadline, old, new);
                Step::Continue
            }
            TransportNotification::ProgressChanged {
                resource,
                percentage,
                avg_throughput,
            } => {
                if resource != self.resource {
                    debug!(reported = %resource, "progress for a foreign resource ignored");
                    return Step::Continue;
                }
                if tracker.phase == TransferPhase::Idle {
                    // The transfer has not observably started yet
                    debug!(resource = %resource, percentage, "early progress report suppressed");
                    return Step::Continue;
                }
                tracker.last_percentage = Some(percentage.min(100));
                self.events.progress_changed(resource, percentage, avg_throughput);
                Step::Continue
            }
            TransportNotification::Completed { resource, payload } => {
                if resource != self.resource {
                    warn!(reported = %resource, "completion for a foreign resource ignored");
                    return Step::Continue;
                }
                if tracker.phase != TransferPhase::Complete {
                    // Sloppy transports skip the state report and only send
                    // the completion itself
                    let current = tracker.phase;
                    self.enter_phase(tracker, grace_deadline, current, TransferPhase::Complete);
                }
                self.events.completed(resource);
                Step::Done(Ok(payload))
            }
            TransportNotification::FatalError {
                resource,
                message,
                code,
            } => {
                if resource != self.resource {
                    warn!(reported = %resource, "fatal error for a foreign resource ignored");
                    return Step::Continue;
                }
                let error =
                    TransferError::from_remote_failure(&resource, message, code, self.direction);
                self.events.fatal_error(resource, error.clone());
                Step::Done(Err(error))
            }
            TransportNotification::Cancelled { reason } => {
                let reason = reason.or_else(|| self.coordinator.cancel_reason());
                self.events.cancelled(reason.clone());
                Step::Done(Err(TransferError::cancelled(reason)))
            }
            TransportNotification::BusyChanged { busy } => {
                self.events.busy_changed(busy);
                Step::Continue
            }
            TransportNotification::Log(record) => {
                self.events.log(record);
                Step::Continue
            }
        }
    }

    // Re-emits the transition first, then synthesizes whatever companion
    // events the entered phase calls for.
    fn enter_phase(
        &self,
        tracker: &mut PhaseTracker,
        grace_deadline: &mut Option<Instant>,
        old: TransferPhase,
        new: TransferPhase,
    ) {
        self.events.state_changed(self.resource, old, new);

        match new {
            TransferPhase::Transferring => {
                if matches!(old, TransferPhase::Paused | TransferPhase::Resuming) {
                    self.events.resumed(self.resource);
                } else {
                    if old != TransferPhase::Idle {
                        self.fishy(format!(
                            "transfer for '{}' reported as starting out of the {old:?} phase",
                            self.resource
                        ));
                    }
                    self.events.started(self.resource);
                }
            }
            TransferPhase::Paused => self.events.paused(self.resource),
            TransferPhase::Cancelling => {
                self.coordinator.observe_cancelling(None);
                if grace_deadline.is_none() {
                    *grace_deadline = Some(Instant::now() + self.grace_window);
                }
            }
            TransferPhase::Complete => {
                if old != TransferPhase::Transferring {
                    self.fishy(format!(
                        "transfer for '{}' reported as completing out of the {old:?} phase",
                        self.resource
                    ));
                }
                if matches!(old, TransferPhase::Paused | TransferPhase::Resuming) {
                    // Surface the resume the transport skipped on its way out
                    self.events.resumed(self.resource);
                }
                if tracker.last_percentage != Some(100) {
                    self.events.progress_changed(self.resource, 100, 0.0);
                    tracker.last_percentage = Some(100);
                }
            }
            TransferPhase::Idle
            | TransferPhase::Resuming
            | TransferPhase::Cancelled
            | TransferPhase::Error => {}
        }

        tracker.phase = new;
    }

    // The grace window ran out without a transport acknowledgment
    fn soft_land(&self, tracker: &PhaseTracker) -> TransferError {
        let reason = self.coordinator.cancel_reason();
        debug!(
            resource = self.resource,
            "grace window elapsed, declaring the transfer cancelled"
        );
        self.events
            .state_changed(self.resource, tracker.phase, TransferPhase::Cancelled);
        self.events.cancelled(reason.clone());
        TransferError::cancelled(reason)
    }

    // The overall session deadline elapsed mid-attempt
    fn expire(&self, tracker: &PhaseTracker) -> TransferError {
        let seconds = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
        self.events
            .state_changed(self.resource, tracker.phase, TransferPhase::Error);
        TransferError::timed_out(self.resource, seconds)
    }

    fn fishy(&self, message: String) {
        self.events.log(LogRecord::new(
            message,
            "engine",
            LogLevel::Warning,
            self.resource,
        ));
    }
}
