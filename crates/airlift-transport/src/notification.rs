//! Notification channel between a transport and the engine

use airlift_types::{LogRecord, Percentage, RemoteErrorCode, Throughput, TransferPhase};
use tokio::sync::mpsc;
use tracing::debug;

/// Everything a transport can report back about an ongoing transfer
#[derive(Debug, Clone, PartialEq)]
pub enum TransportNotification {
    /// The transport-side state machine moved between phases
    StateChanged {
        /// Remote path of the affected resource
        resource: String,
        /// Phase the transport left
        old: TransferPhase,
        /// Phase the transport entered
        new: TransferPhase,
    },
    /// Progress advanced for the ongoing transfer
    ProgressChanged {
        /// Remote path of the affected resource
        resource: String,
        /// Cumulative progress, 0 through 100
        percentage: Percentage,
        /// Average throughput so far, in kilobytes per second
        avg_throughput: Throughput,
    },
    /// The transfer finished successfully
    Completed {
        /// Remote path of the affected resource
        resource: String,
        /// Received bytes for inbound transfers, `None` for outbound ones
        payload: Option<Vec<u8>>,
    },
    /// The transfer died and will not make further progress
    FatalError {
        /// Remote path of the affected resource
        resource: String,
        /// Transport-supplied description of the failure
        message: String,
        /// Remote error code extracted from the device response, when present
        code: RemoteErrorCode,
    },
    /// The transport acknowledged a cancellation request
    Cancelled {
        /// Reason given with the original cancellation request, when any
        reason: Option<String>,
    },
    /// The transport got busy with a transfer, or went idle again
    BusyChanged {
        /// Whether the transport is now busy
        busy: bool,
    },
    /// A log line advertised by the transport
    Log(LogRecord),
}

/// Sending half of the notification channel, handed to a transport through
/// [`Transport::attach`](crate::Transport::attach)
///
/// Cloneable and cheap; a transport may fan it out to callbacks on foreign
/// threads. Sends never block and never fail loudly: once the receiving side
/// is gone the transfer is over and late notifications are simply dropped.
#[derive(Debug, Clone)]
pub struct NotificationSink {
    tx: mpsc::UnboundedSender<TransportNotification>,
}

impl NotificationSink {
    /// Create a fresh channel, returning the sink and its receiving half
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver a notification
    pub fn notify(&self, notification: TransportNotification) {
        if self.tx.send(notification).is_err() {
            debug!("notification dropped, the receiving side is gone");
        }
    }

    /// Report a phase transition
    pub fn state_changed<S: Into<String>>(&self, resource: S, old: TransferPhase, new: TransferPhase) {
        self.notify(TransportNotification::StateChanged {
            resource: resource.into(),
            old,
            new,
        });
    }

    /// Report a progress update
    pub fn progress_changed<S: Into<String>>(
        &self,
        resource: S,
        percentage: Percentage,
        avg_throughput: Throughput,
    ) {
        self.notify(TransportNotification::ProgressChanged {
            resource: resource.into(),
            percentage,
            avg_throughput,
        });
    }

    /// Report successful completion
    pub fn completed<S: Into<String>>(&self, resource: S, payload: Option<Vec<u8>>) {
        self.notify(TransportNotification::Completed {
            resource: resource.into(),
            payload,
        });
    }

    /// Report a fatal transfer failure
    pub fn fatal_error(
        &self,
        resource: impl Into<String>,
        message: impl Into<String>,
        code: RemoteErrorCode,
    ) {
        self.notify(TransportNotification::FatalError {
            resource: resource.into(),
            message: message.into(),
            code,
        });
    }

    /// Acknowledge a cancellation request
    pub fn cancelled(&self, reason: Option<String>) {
        self.notify(TransportNotification::Cancelled { reason });
    }

    /// Report a busy-state flip
    pub fn busy_changed(&self, busy: bool) {
        self.notify(TransportNotification::BusyChanged { busy });
    }

    /// Advertise a log line
    pub fn log(&self, record: LogRecord) {
        self.notify(TransportNotification::Log(record));
    }
}
