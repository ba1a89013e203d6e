//! The transfer engine facade
//!
//! `TransferEngine` ties the pieces together: it guards the single-operation
//! invariant through the coordinator, resolves requests into session plans,
//! runs them through the retry loop and hands observers a shared event bus.
//! One engine instance wraps one transport link to one remote device.

use crate::batch::{run_batch, BatchContext};
use crate::coordinator::Coordinator;
use crate::events::{EventBus, TransferEvent};
use crate::path;
use crate::retry::{run_session, SessionPlan};
use crate::session::{BatchReport, TransferId, TransferReceipt, TransferRequest};
use airlift_config::Config;
use airlift_transport::Transport;
use airlift_types::{DeviceSignature, Direction, PlatformFamily, Result, TransferError};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Transfer orchestration engine for one transport link
///
/// The engine is cheap to share behind an [`Arc`] and all of its methods
/// take `&self`; the single-operation invariant is enforced internally, so a
/// second concurrent transfer fails with
/// [`TransferError::InvalidOperation`] instead of interleaving.
pub struct TransferEngine {
    transport: Arc<dyn Transport>,
    config: Config,
    host: DeviceSignature,
    family: PlatformFamily,
    events: Arc<EventBus>,
    coordinator: Arc<Coordinator>,
}

impl TransferEngine {
    /// Start building an engine
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Run a single transfer to its terminal outcome
    ///
    /// Claims the engine for the duration of the call, normalizes the
    /// requested path and drives the session through the retry loop. On
    /// success the receipt carries the downloaded payload (if any) and the
    /// full per-attempt history.
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt> {
        let _permit = self.coordinator.begin_operation()?;
        let started_at = Utc::now();

        let resource = path::normalize(&request.resource)?;
        if request.direction == Direction::Upload && request.payload.is_none() {
            return Err(TransferError::invalid_argument(format!(
                "upload for '{resource}' carries no payload"
            )));
        }
        if let Err(message) = request.params.validate() {
            return Err(TransferError::invalid_argument(format!(
                "invalid negotiation parameters for '{resource}': {message}"
            )));
        }

        let direction = request.direction;
        info!(%resource, ?direction, "transfer accepted");

        let plan = SessionPlan::resolve(
            request,
            resource.clone(),
            &self.config,
            self.config.failsafe.is_problematic(&self.host),
            self.family,
        );
        let run = run_session(
            self.transport.as_ref(),
            &self.events,
            &self.coordinator,
            self.config.cancellation.grace_window(),
            plan,
        )
        .await;

        let payload = run.outcome?;
        debug!(%resource, attempts = run.attempts.len(), "transfer finished");
        Ok(TransferReceipt {
            id: TransferId::new(),
            resource,
            direction,
            payload,
            attempts: run.attempts,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Download a resource and return its bytes
    pub async fn download(&self, resource: impl Into<String>) -> Result<Vec<u8>> {
        let receipt = self.transfer(TransferRequest::download(resource)).await?;
        receipt
            .payload
            .ok_or_else(|| TransferError::internal("download completed without a payload"))
    }

    /// Upload the given bytes to a resource
    pub async fn upload(&self, resource: impl Into<String>, payload: Vec<u8>) -> Result<()> {
        self.transfer(TransferRequest::upload(resource, payload))
            .await?;
        Ok(())
    }

    /// Run a batch of transfers sequentially
    ///
    /// The whole batch counts as one engine operation. See
    /// [`BatchReport`] for how per-resource outcomes are reported.
    pub async fn transfer_many(&self, requests: Vec<TransferRequest>) -> Result<BatchReport> {
        let _permit = self.coordinator.begin_operation()?;
        info!(requests = requests.len(), "batch accepted");

        run_batch(
            BatchContext {
                transport: self.transport.as_ref(),
                events: &self.events,
                coordinator: &self.coordinator,
                config: &self.config,
                failsafe_from_start: self.config.failsafe.is_problematic(&self.host),
                family: self.family,
            },
            requests,
        )
        .await
    }

    /// Ask the running operation to pause
    ///
    /// Returns `false` without side effects when nothing is running or a
    /// cancellation is already pending.
    pub fn try_pause(&self) -> bool {
        if !self.coordinator.try_pause() {
            return false;
        }
        self.transport.pause();
        true
    }

    /// Ask a paused operation to continue
    ///
    /// Returns `false` without side effects when nothing is running or a
    /// cancellation is already pending.
    pub fn try_resume(&self) -> bool {
        if !self.coordinator.try_resume() {
            return false;
        }
        self.transport.resume();
        true
    }

    /// Request cancellation of the running operation
    ///
    /// Cooperative and idempotent: the engine latches the request, forwards
    /// it to the transport and resolves the operation either on the
    /// transport's acknowledgment or when the grace window runs out.
    pub fn cancel(&self, reason: Option<&str>) {
        let reason = reason.map(String::from);
        self.coordinator.request_cancel(reason.clone());
        self.transport.cancel(reason.as_deref().unwrap_or(""));
    }

    /// Tear down the underlying link
    pub fn disconnect(&self) {
        self.transport.disconnect();
    }

    /// Register an event handler
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(&TransferEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler);
    }

    /// The engine's event bus
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Whether an operation currently holds the engine
    pub fn is_busy(&self) -> bool {
        self.coordinator.is_operation_ongoing()
    }

    /// Whether the pause gate is currently down
    pub fn is_paused(&self) -> bool {
        self.coordinator.is_paused()
    }

    /// The remote device signature this engine was built for
    pub fn host(&self) -> &DeviceSignature {
        &self.host
    }
}

impl fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferEngine")
            .field("host", &self.host)
            .field("family", &self.family)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

/// Builder for [`TransferEngine`]
///
/// The transport, host signature and platform family are mandatory; the
/// configuration falls back to [`Config::default`] when not provided.
#[derive(Default)]
pub struct EngineBuilder {
    transport: Option<Arc<dyn Transport>>,
    config: Config,
    host: Option<DeviceSignature>,
    family: Option<PlatformFamily>,
}

impl EngineBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transport the engine drives
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the default configuration
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the remote device signature
    #[must_use]
    pub fn host(mut self, host: DeviceSignature) -> Self {
        self.host = Some(host);
        self
    }

    /// Set the platform family of the transport stack
    #[must_use]
    pub fn family(mut self, family: PlatformFamily) -> Self {
        self.family = Some(family);
        self
    }

    /// Validate the inputs and build the engine
    pub fn build(self) -> Result<TransferEngine> {
        let transport = self
            .transport
            .ok_or_else(|| TransferError::invalid_argument("a transport must be provided"))?;
        let host = self
            .host
            .ok_or_else(|| TransferError::invalid_argument("a host signature must be provided"))?;
        if host.manufacturer().is_empty() {
            return Err(TransferError::invalid_argument(
                "the host manufacturer must not be blank",
            ));
        }
        if host.model().is_empty() {
            return Err(TransferError::invalid_argument(
                "the host model must not be blank",
            ));
        }
        let family = self
            .family
            .ok_or_else(|| TransferError::invalid_argument("a platform family must be provided"))?;
        if self.config.transfer.max_tries == 0 {
            return Err(TransferError::invalid_argument(
                "the configured retry budget must allow at least one attempt",
            ));
        }

        Ok(TransferEngine {
            transport,
            config: self.config,
            host,
            family,
            events: Arc::new(EventBus::new()),
            coordinator: Arc::new(Coordinator::new()),
        })
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("transport", &self.transport.is_some())
            .field("host", &self.host)
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}
