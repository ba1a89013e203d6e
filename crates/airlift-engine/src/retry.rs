//! Session retry loop with failsafe parameter fallback
//!
//! A session is the full lifecycle of one resource: up to `max_tries`
//! transport attempts, a fresh notification channel per attempt, and the
//! failsafe parameter substitution on the final attempt. Verdicts and
//! classified errors decide between retrying and failing fast; the retry
//! budget is only ever spent on recoverable transfer faults.

use crate::coordinator::Coordinator;
use crate::delivery::DeliveryContext;
use crate::events::EventBus;
use crate::session::TransferRequest;
use airlift_config::Config;
use airlift_transport::{NotificationSink, Transport, Verdict};
use airlift_types::{
    AttemptOutcome, AttemptRecord, Direction, LogLevel, LogRecord, NegotiationParams,
    PlatformFamily, Result, TransferError, TransferPhase,
};
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::debug;

/// Resolved inputs for one resource's session
///
/// All defaulting and override resolution has already happened by the time a
/// plan is built; the loop itself never consults the configuration.
#[derive(Debug, Clone)]
pub(crate) struct SessionPlan {
    pub resource: String,
    pub direction: Direction,
    pub payload: Option<Vec<u8>>,
    pub params: NegotiationParams,
    pub max_tries: u32,
    pub sleep_between_retries: Duration,
    pub timeout: Option<Duration>,
    pub failsafe_from_start: bool,
    pub family: PlatformFamily,
}

impl SessionPlan {
    /// Resolve a request against the configured defaults
    ///
    /// The `resource` is the already-normalized canonical path; request-level
    /// overrides win over the configuration where present.
    pub(crate) fn resolve(
        request: TransferRequest,
        resource: String,
        config: &Config,
        failsafe_from_start: bool,
        family: PlatformFamily,
    ) -> Self {
        Self {
            resource,
            direction: request.direction,
            payload: request.payload,
            params: request.params,
            max_tries: request.max_tries.unwrap_or(config.transfer.max_tries),
            sleep_between_retries: request
                .sleep_between_retries
                .unwrap_or_else(|| config.transfer.sleep_between_retries()),
            timeout: request.timeout.or_else(|| config.transfer.timeout()),
            failsafe_from_start,
            family,
        }
    }

    // Decides the parameter set advertised for the given 1-based attempt.
    // Returns the set and whether a failsafe substitution took place.
    fn params_for(&self, attempt: u32) -> (NegotiationParams, bool) {
        if self.failsafe_from_start {
            // Known-problematic host: the whole set is replaced, pinned
            // values included
            (NegotiationParams::failsafe(self.family), true)
        } else if attempt == self.max_tries && attempt > 1 {
            // Last chance: fill the unpinned fields with the failsafe
            // values, keep what the caller pinned
            (self.params.or_failsafe(self.family), true)
        } else {
            (self.params, false)
        }
    }
}

/// What a finished session looked like
pub(crate) struct SessionRun {
    pub attempts: Vec<AttemptRecord>,
    pub outcome: Result<Option<Vec<u8>>>,
}

/// Run one resource's session to its terminal outcome
pub(crate) async fn run_session(
    transport: &dyn Transport,
    events: &EventBus,
    coordinator: &Coordinator,
    grace_window: Duration,
    plan: SessionPlan,
) -> SessionRun {
    let deadline = plan.timeout.map(|t| Instant::now() + t);
    let mut attempts: Vec<AttemptRecord> = Vec::new();

    if plan.failsafe_from_start {
        events.log(LogRecord::new(
            format!(
                "known-problematic host, using the failsafe parameter set for '{}' from the first attempt",
                plan.resource
            ),
            "engine",
            LogLevel::Info,
            &plan.resource,
        ));
    }

    for attempt in 1..=plan.max_tries {
        if let Err(error) = checkpoint(coordinator, events, &plan.resource).await {
            return SessionRun {
                attempts,
                outcome: Err(error),
            };
        }

        let (params, failsafe) = plan.params_for(attempt);
        if failsafe && !plan.failsafe_from_start {
            events.log(LogRecord::new(
                format!(
                    "final attempt for '{}', substituting failsafe values for the unpinned parameters ({params:?})",
                    plan.resource
                ),
                "engine",
                LogLevel::Warning,
                &plan.resource,
            ));
        }

        let mut record = AttemptRecord::started(attempt, params, failsafe);

        let (sink, mut rx) = NotificationSink::channel();
        transport.attach(sink);

        let verdict = match transport.begin_transfer(
            plan.direction,
            &plan.resource,
            plan.payload.as_deref(),
            &params,
        ) {
            Ok(verdict) => verdict,
            Err(error) => {
                // The call itself blew up before anything moved; treat the
                // link as unusable rather than burning the retry budget
                events.state_changed(&plan.resource, TransferPhase::Idle, TransferPhase::Error);
                let error = TransferError::internal(format!(
                    "transport failed synchronously while starting '{}': {error}",
                    plan.resource
                ));
                record.finish(AttemptOutcome::Failed(error.kind()));
                attempts.push(record);
                return SessionRun {
                    attempts,
                    outcome: Err(error),
                };
            }
        };

        if let Verdict::Rejected { reason } = verdict {
            // The request was unacceptable as given; resubmitting it
            // verbatim cannot change the answer
            let error = TransferError::invalid_argument(format!(
                "transport rejected the request for '{}': {reason}",
                plan.resource
            ));
            record.finish(AttemptOutcome::Failed(error.kind()));
            attempts.push(record);
            return SessionRun {
                attempts,
                outcome: Err(error),
            };
        }

        let ctx = DeliveryContext {
            resource: &plan.resource,
            direction: plan.direction,
            events,
            coordinator,
            grace_window,
            deadline,
            timeout: plan.timeout,
        };

        match ctx.pump(&mut rx).await {
            Ok(payload) => {
                record.finish(AttemptOutcome::Succeeded);
                attempts.push(record);
                return SessionRun {
                    attempts,
                    outcome: Ok(payload),
                };
            }
            Err(error) => {
                record.finish(AttemptOutcome::Failed(error.kind()));
                attempts.push(record);

                if !error.should_retry() {
                    return SessionRun {
                        attempts,
                        outcome: Err(error),
                    };
                }
                if attempt == plan.max_tries {
                    return SessionRun {
                        attempts,
                        outcome: Err(TransferError::all_attempts_failed(
                            &plan.resource,
                            plan.max_tries,
                            error,
                        )),
                    };
                }

                debug!(
                    resource = %plan.resource,
                    attempt,
                    budget = plan.max_tries,
                    "attempt failed with a recoverable error, retrying"
                );
                if plan.sleep_between_retries > Duration::ZERO {
                    time::sleep(plan.sleep_between_retries).await;
                }
            }
        }
    }

    // Only reachable with a zero budget
    SessionRun {
        attempts,
        outcome: Err(TransferError::invalid_argument(
            "the retry budget must allow at least one attempt",
        )),
    }
}

/// Honor a pending pause or cancellation before touching the transport
///
/// Called at the top of every attempt and between batch entries. A pause
/// parks the session on the gate and surfaces the synthetic
/// `Paused`/`Resumed` pair; a latched cancellation resolves the session
/// without another transport call.
pub(crate) async fn checkpoint(
    coordinator: &Coordinator,
    events: &EventBus,
    resource: &str,
) -> Result<()> {
    if coordinator.is_cancel_requested() {
        let reason = coordinator.cancel_reason();
        events.cancelled(reason.clone());
        return Err(TransferError::cancelled(reason));
    }

    if coordinator.is_paused() {
        events.state_changed(resource, TransferPhase::Idle, TransferPhase::Paused);
        events.paused(resource);

        let mut gate = coordinator.gate_changes();
        if gate.wait_for(|&open| open).await.is_err() {
            return Err(TransferError::internal(
                "the pause gate closed while a session was parked on it",
            ));
        }

        // A cancellation may be what opened the gate
        if coordinator.is_cancel_requested() {
            let reason = coordinator.cancel_reason();
            events.cancelled(reason.clone());
            return Err(TransferError::cancelled(reason));
        }

        events.state_changed(resource, TransferPhase::Paused, TransferPhase::Idle);
        events.resumed(resource);
    }

    Ok(())
}
