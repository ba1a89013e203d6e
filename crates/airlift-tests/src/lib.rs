//! Shared test support for the airlift workspace
//!
//! The integration tests and benchmarks drive the real engine against
//! [`ScriptedTransport`], a deterministic in-memory transport that replays a
//! queue of per-attempt scripts and records every call it receives.

#![warn(missing_docs)]
#![warn(clippy::all)]

use airlift_engine::{TransferEngine, TransferEvent};
use airlift_transport::{NotificationSink, Transport, Verdict};
use airlift_types::{
    Direction, NegotiationParams, Percentage, PlatformFamily, RemoteErrorCode, TransferError,
    TransferPhase,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// What the transport should do for one attempt
#[derive(Debug, Clone)]
pub enum AttemptScript {
    /// Report progress and complete with the given payload
    Complete {
        /// Progress percentages reported before completion
        progress: Vec<Percentage>,
        /// Payload delivered with the completion
        payload: Option<Vec<u8>>,
    },
    /// Fail with a fatal error report
    Fail {
        /// Error message the remote reports
        message: String,
        /// Remote error code accompanying the message
        code: RemoteErrorCode,
    },
    /// Fail unless the advertised parameters equal the family's failsafe set
    FailUnlessFailsafe {
        /// Family whose failsafe set unlocks the attempt
        family: PlatformFamily,
        /// Payload delivered when the failsafe set is presented
        payload: Option<Vec<u8>>,
    },
    /// Decline the transfer without starting it
    Reject {
        /// Reason reported with the rejection
        reason: String,
    },
    /// Fail synchronously from `begin_transfer`
    SyncError,
    /// Accept the transfer, report it as started and then go quiet
    Silent,
}

impl AttemptScript {
    /// A successful attempt with a midway progress report
    pub fn complete(payload: Option<Vec<u8>>) -> Self {
        Self::Complete {
            progress: vec![50],
            payload,
        }
    }

    /// A successful attempt with explicit progress reports
    pub fn complete_with_progress(progress: Vec<Percentage>, payload: Option<Vec<u8>>) -> Self {
        Self::Complete { progress, payload }
    }

    /// A fatal failure with the given message and code
    pub fn fail(message: impl Into<String>, code: RemoteErrorCode) -> Self {
        Self::Fail {
            message: message.into(),
            code,
        }
    }

    /// A generic recoverable failure
    pub fn recoverable() -> Self {
        Self::fail("link reset by peer", RemoteErrorCode::None)
    }
}

/// A control call the engine made on the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCall {
    /// `cancel` with the forwarded reason
    Cancel(String),
    /// `pause`
    Pause,
    /// `resume`
    Resume,
    /// `disconnect`
    Disconnect,
}

/// Deterministic in-memory transport replaying scripted attempts
///
/// Scripts are consumed in order, one per `begin_transfer` call; an attempt
/// without a script is rejected so a miscounted test fails fast. All
/// notifications are delivered synchronously from within `begin_transfer`,
/// before the engine's pump runs, which exercises the engine's ordering
/// guarantees rather than relying on them.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<AttemptScript>>,
    sink: Mutex<Option<NotificationSink>>,
    active_resource: Mutex<Option<String>>,
    acknowledge_cancels: AtomicBool,
    advertised: Mutex<Vec<NegotiationParams>>,
    controls: Mutex<Vec<ControlCall>>,
    transfers: Mutex<Vec<(Direction, String)>>,
}

impl ScriptedTransport {
    /// An empty transport; queue attempts with [`push`](Self::push)
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport preloaded with the given scripts
    pub fn scripted<I: IntoIterator<Item = AttemptScript>>(scripts: I) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Acknowledge cancellation requests by reporting the cancelled phases
    #[must_use]
    pub fn acknowledging_cancels(self) -> Self {
        self.acknowledge_cancels.store(true, Ordering::SeqCst);
        self
    }

    /// Queue another attempt script
    pub fn push(&self, script: AttemptScript) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// Parameter sets advertised so far, one per attempt
    pub fn advertised(&self) -> Vec<NegotiationParams> {
        self.advertised.lock().unwrap().clone()
    }

    /// Control calls received so far
    pub fn controls(&self) -> Vec<ControlCall> {
        self.controls.lock().unwrap().clone()
    }

    /// Transfers started so far, in order
    pub fn transfers(&self) -> Vec<(Direction, String)> {
        self.transfers.lock().unwrap().clone()
    }

    /// Number of `begin_transfer` calls received
    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }

    fn run_completion(
        sink: &NotificationSink,
        resource: &str,
        progress: Vec<Percentage>,
        payload: Option<Vec<u8>>,
    ) {
        sink.state_changed(resource, TransferPhase::Idle, TransferPhase::Transferring);
        for percentage in progress {
            sink.progress_changed(resource, percentage, 32.0);
        }
        sink.state_changed(resource, TransferPhase::Transferring, TransferPhase::Complete);
        sink.completed(resource, payload);
    }

    fn run_failure(sink: &NotificationSink, resource: &str, message: &str, code: RemoteErrorCode) {
        sink.state_changed(resource, TransferPhase::Idle, TransferPhase::Transferring);
        sink.state_changed(resource, TransferPhase::Transferring, TransferPhase::Error);
        sink.fatal_error(resource, message, code);
    }
}

impl Transport for ScriptedTransport {
    fn attach(&self, sink: NotificationSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    fn begin_transfer(
        &self,
        direction: Direction,
        resource: &str,
        _payload: Option<&[u8]>,
        params: &NegotiationParams,
    ) -> Result<Verdict, TransferError> {
        self.transfers
            .lock()
            .unwrap()
            .push((direction, resource.to_string()));
        self.advertised.lock().unwrap().push(*params);
        *self.active_resource.lock().unwrap() = Some(resource.to_string());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(AttemptScript::Reject {
                reason: "unscripted attempt".to_string(),
            });
        debug!(?direction, resource, ?script, "replaying scripted attempt");

        match script {
            AttemptScript::Complete { progress, payload } => {
                let sink = self.sink.lock().unwrap().take().unwrap();
                Self::run_completion(&sink, resource, progress, payload);
                Ok(Verdict::Success)
            }
            AttemptScript::Fail { message, code } => {
                let sink = self.sink.lock().unwrap().take().unwrap();
                Self::run_failure(&sink, resource, &message, code);
                Ok(Verdict::Success)
            }
            AttemptScript::FailUnlessFailsafe { family, payload } => {
                let sink = self.sink.lock().unwrap().take().unwrap();
                if *params == NegotiationParams::failsafe(family) {
                    Self::run_completion(&sink, resource, vec![50], payload);
                } else {
                    Self::run_failure(
                        &sink,
                        resource,
                        "negotiation failed",
                        RemoteErrorCode::None,
                    );
                }
                Ok(Verdict::Success)
            }
            AttemptScript::Reject { reason } => Ok(Verdict::rejected(reason)),
            AttemptScript::SyncError => {
                Err(TransferError::internal("scripted synchronous fault"))
            }
            AttemptScript::Silent => {
                // Keep the sink so the channel stays open
                if let Some(sink) = self.sink.lock().unwrap().as_ref() {
                    sink.state_changed(resource, TransferPhase::Idle, TransferPhase::Transferring);
                }
                Ok(Verdict::Success)
            }
        }
    }

    fn cancel(&self, reason: &str) {
        self.controls
            .lock()
            .unwrap()
            .push(ControlCall::Cancel(reason.to_string()));

        if self.acknowledge_cancels.load(Ordering::SeqCst) {
            let sink = self.sink.lock().unwrap().take();
            let resource = self.active_resource.lock().unwrap().clone();
            if let (Some(sink), Some(resource)) = (sink, resource) {
                sink.state_changed(
                    &resource,
                    TransferPhase::Transferring,
                    TransferPhase::Cancelling,
                );
                sink.state_changed(&resource, TransferPhase::Cancelling, TransferPhase::Cancelled);
                let reason = if reason.is_empty() {
                    None
                } else {
                    Some(reason.to_string())
                };
                sink.cancelled(reason);
            }
        }
    }

    fn pause(&self) {
        self.controls.lock().unwrap().push(ControlCall::Pause);
    }

    fn resume(&self) {
        self.controls.lock().unwrap().push(ControlCall::Resume);
    }

    fn disconnect(&self) {
        self.controls.lock().unwrap().push(ControlCall::Disconnect);
    }
}

/// Ordered capture of every event an engine emits
#[derive(Clone)]
pub struct EventLog {
    events: Arc<Mutex<Vec<TransferEvent>>>,
}

impl EventLog {
    /// Subscribe a fresh log to the engine's event bus
    pub fn attach(engine: &TransferEngine) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        engine.on_event(move |event| sink.lock().unwrap().push(event.clone()));
        Self { events }
    }

    /// Everything captured so far, in emission order
    pub fn snapshot(&self) -> Vec<TransferEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of captured events matching `predicate`
    pub fn count_matching<F: Fn(&TransferEvent) -> bool>(&self, predicate: F) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| predicate(event))
            .count()
    }

    /// Whether any captured event matches `predicate`
    pub fn any_matching<F: Fn(&TransferEvent) -> bool>(&self, predicate: F) -> bool {
        self.count_matching(predicate) > 0
    }

    /// Total number of captured events
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Whether nothing has been captured yet
    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }
}

/// Install a fmt subscriber honoring `RUST_LOG` for test diagnostics
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
