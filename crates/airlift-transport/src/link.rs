//! The transport trait the engine drives transfers through

use crate::NotificationSink;
use airlift_types::{Direction, NegotiationParams, TransferError};

/// Immediate verdict of a request to commence a transfer
///
/// The verdict only covers commencement. Everything that happens after a
/// successful launch arrives through the attached [`NotificationSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The transport accepted the request and took ownership of the link.
    /// Progress, completion and failure will be reported through the sink.
    Success,
    /// The transport declined to start. The link stays untouched; the
    /// request was unacceptable for this link as given, so resubmitting it
    /// verbatim is pointless.
    Rejected {
        /// Transport-supplied explanation for the refusal
        reason: String,
    },
}

impl Verdict {
    /// Build a rejection verdict
    pub fn rejected<S: Into<String>>(reason: S) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// A medium that can move resource payloads to and from a remote device
///
/// Implementations wrap the actual link technology. All methods are
/// synchronous and must return promptly; long-running work happens on the
/// transport's own terms and is reported through the sink passed to
/// [`Transport::attach`].
///
/// The control methods ([`cancel`](Transport::cancel),
/// [`pause`](Transport::pause), [`resume`](Transport::resume) and
/// [`disconnect`](Transport::disconnect)) are fire-and-forget requests. A
/// transport is free to ignore them when they make no sense in its current
/// state, and acknowledges the ones it honors through notifications.
pub trait Transport: Send + Sync {
    /// Attach the sink all subsequent notifications are delivered through
    fn attach(&self, sink: NotificationSink);

    /// Ask the transport to commence a transfer
    ///
    /// `payload` carries the bytes to push for outbound transfers and is
    /// `None` for inbound ones. `params` holds the negotiation parameters the
    /// engine settled on for this attempt; unspecified fields leave the
    /// transport's own defaults in place.
    ///
    /// An `Err` means the transport itself is broken (rather than the remote
    /// declining), and the engine treats it as fatal.
    fn begin_transfer(
        &self,
        direction: Direction,
        resource: &str,
        payload: Option<&[u8]>,
        params: &NegotiationParams,
    ) -> Result<Verdict, TransferError>;

    /// Request cancellation of the ongoing transfer
    fn cancel(&self, reason: &str);

    /// Request that the ongoing transfer be paused
    fn pause(&self);

    /// Request that a paused transfer be resumed
    fn resume(&self);

    /// Tear the link down
    fn disconnect(&self);
}
