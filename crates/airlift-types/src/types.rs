//! Core data types for airlift
//!
//! This module provides the fundamental data types used throughout the airlift
//! ecosystem: transfer lifecycle phases, directions, progress and log
//! vocabulary, and per-attempt bookkeeping records.

use crate::params::NegotiationParams;
use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Progress percentage, 0 to 100
pub type Percentage = u8;

/// Average throughput reported by the transport, in kilobytes per second
pub type Throughput = f64;

/// Lifecycle phase of a resource transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TransferPhase {
    /// No transfer has been started yet
    #[default]
    Idle,
    /// Bytes are moving across the link
    Transferring,
    /// Forward progress is suspended without aborting the attempt
    Paused,
    /// The transport reported an intermediate state on the way back to
    /// `Transferring`; some transports skip it entirely
    Resuming,
    /// Cancellation was requested and awaits acknowledgment
    Cancelling,
    /// The transfer finished successfully
    Complete,
    /// The transfer was cancelled (acknowledged or synthesized)
    Cancelled,
    /// The transfer failed
    Error,
}

impl TransferPhase {
    /// Check if this phase is terminal (no further transitions possible)
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled | Self::Error)
    }

    /// Check if this phase represents in-flight work
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Transferring | Self::Paused | Self::Resuming | Self::Cancelling
        )
    }
}

/// Direction of a resource transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    /// Push a payload from the host to the remote peer
    Upload,
    /// Pull a payload from the remote peer to the host
    Download,
}

/// Progress snapshot for an in-flight transfer
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransferProgress {
    /// Completed portion of the transfer, 0 to 100
    pub percentage: Percentage,
    /// Average throughput reported by the transport, in KB/s
    pub avg_throughput: Throughput,
}

impl TransferProgress {
    /// Create a new progress snapshot, clamping the percentage to 100
    pub fn new(percentage: Percentage, avg_throughput: Throughput) -> Self {
        Self {
            percentage: percentage.min(100),
            avg_throughput,
        }
    }

    /// A finished progress snapshot (100%)
    pub fn complete(avg_throughput: Throughput) -> Self {
        Self {
            percentage: 100,
            avg_throughput,
        }
    }

    /// Check whether this snapshot reports a finished transfer
    pub fn is_complete(self) -> bool {
        self.percentage >= 100
    }
}

/// Log verbosity level for transport and engine log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LogLevel {
    /// Fine-grained plumbing detail
    Trace,
    /// Diagnostic detail
    Debug,
    /// Normal operational messages
    Info,
    /// Something looks off but the operation continues
    Warning,
    /// An operation failed
    Error,
}

/// A structured log message raised by the transport or synthesized by the
/// engine
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogRecord {
    /// Human-readable message text
    pub message: String,
    /// Originating component, e.g. `"transport"` or `"engine"`
    pub category: String,
    /// Verbosity level
    pub level: LogLevel,
    /// Canonical resource path the message relates to, empty when global
    pub resource: String,
}

impl LogRecord {
    /// Create a new log record
    pub fn new(
        message: impl Into<String>,
        category: impl Into<String>,
        level: LogLevel,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            category: category.into(),
            level,
            resource: resource.into(),
        }
    }
}

/// Terminal outcome of a single transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AttemptOutcome {
    /// The attempt completed successfully
    Succeeded,
    /// The attempt failed with the given error kind
    Failed(crate::error::ErrorKind),
}

/// Bookkeeping record for one transport invocation within a session
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AttemptRecord {
    /// 1-based attempt index within the session
    pub index: u32,
    /// Negotiation parameters presented to the transport for this attempt
    pub params: NegotiationParams,
    /// Whether the failsafe parameter set was substituted for this attempt
    pub failsafe: bool,
    /// Wall-clock time the attempt was started
    pub started_at: DateTime<Utc>,
    /// Terminal outcome, `None` while the attempt is in flight
    pub outcome: Option<AttemptOutcome>,
}

impl AttemptRecord {
    /// Create a record for an attempt that is about to start
    pub fn started(index: u32, params: NegotiationParams, failsafe: bool) -> Self {
        Self {
            index,
            params,
            failsafe,
            started_at: Utc::now(),
            outcome: None,
        }
    }

    /// Mark the attempt as finished with the given outcome
    pub fn finish(&mut self, outcome: AttemptOutcome) {
        self.outcome = Some(outcome);
    }
}
