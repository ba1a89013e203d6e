//! Transfer requests, session identifiers and outcome reporting

use airlift_types::{AttemptRecord, Direction, NegotiationParams, TransferError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier of one orchestrated transfer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransferId(Uuid);

impl TransferId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single-resource transfer request
///
/// The resource path may arrive raw; the engine canonicalizes it before any
/// transport activity. Per-request overrides take precedence over the
/// engine's configuration where set.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransferRequest {
    /// Which way the payload moves
    pub direction: Direction,
    /// Raw resource path as the caller supplied it
    pub resource: String,
    /// Bytes to push for uploads, `None` for downloads
    pub payload: Option<Vec<u8>>,
    /// Negotiation parameters for the transfer, unpinned fields left to the
    /// transport (or to a failsafe substitution)
    pub params: NegotiationParams,
    /// Override for the configured retry budget
    pub max_tries: Option<u32>,
    /// Override for the configured pause between attempts
    pub sleep_between_retries: Option<Duration>,
    /// Override for the configured overall per-resource deadline
    pub timeout: Option<Duration>,
}

impl TransferRequest {
    /// Request a download of `resource`
    pub fn download<S: Into<String>>(resource: S) -> Self {
        Self {
            direction: Direction::Download,
            resource: resource.into(),
            payload: None,
            params: NegotiationParams::default(),
            max_tries: None,
            sleep_between_retries: None,
            timeout: None,
        }
    }

    /// Request an upload of `payload` to `resource`
    pub fn upload<S: Into<String>>(resource: S, payload: Vec<u8>) -> Self {
        Self {
            direction: Direction::Upload,
            resource: resource.into(),
            payload: Some(payload),
            params: NegotiationParams::default(),
            max_tries: None,
            sleep_between_retries: None,
            timeout: None,
        }
    }

    /// Pin negotiation parameters for this request
    pub fn with_params(mut self, params: NegotiationParams) -> Self {
        self.params = params;
        self
    }

    /// Override the configured retry budget for this request
    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = Some(max_tries);
        self
    }

    /// Override the configured pause between attempts for this request
    pub fn with_sleep_between_retries(mut self, sleep: Duration) -> Self {
        self.sleep_between_retries = Some(sleep);
        self
    }

    /// Override the configured overall deadline for this request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Everything known about a successfully finished single-resource session
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransferReceipt {
    /// Session identifier
    pub id: TransferId,
    /// Canonical resource path
    pub resource: String,
    /// Which way the payload moved
    pub direction: Direction,
    /// Received bytes for downloads, `None` for uploads
    pub payload: Option<Vec<u8>>,
    /// Every attempt the session made, in order
    pub attempts: Vec<AttemptRecord>,
    /// Wall-clock time the session was accepted
    pub started_at: DateTime<Utc>,
    /// Wall-clock time the session reached its terminal outcome
    pub finished_at: DateTime<Utc>,
}

/// Terminal outcome of one resource within a batch
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferOutcome {
    /// The resource transferred successfully
    Succeeded {
        /// Received bytes for downloads, `None` for uploads
        payload: Option<Vec<u8>>,
        /// Every attempt made for this resource, in order
        attempts: Vec<AttemptRecord>,
    },
    /// The resource failed terminally
    Failed {
        /// The classified failure
        error: TransferError,
        /// Every attempt made for this resource, in order
        attempts: Vec<AttemptRecord>,
    },
}

impl TransferOutcome {
    /// Whether this outcome is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// The success payload, when there is one
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::Succeeded {
                payload: Some(bytes),
                ..
            } => Some(bytes),
            _ => None,
        }
    }

    /// The failure, when this outcome is one
    pub fn error(&self) -> Option<&TransferError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Succeeded { .. } => None,
        }
    }

    /// The attempts made for this resource, in order
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::Succeeded { attempts, .. } | Self::Failed { attempts, .. } => attempts,
        }
    }
}

/// Per-resource outcomes of one batch call
///
/// Holds exactly one entry per distinct canonical resource, keyed by the
/// canonical path, in path order.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchReport {
    entries: BTreeMap<String, TransferOutcome>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl BatchReport {
    pub(crate) fn begin() -> Self {
        Self {
            entries: BTreeMap::new(),
            started_at: Some(Utc::now()),
            finished_at: None,
        }
    }

    pub(crate) fn record<S: Into<String>>(&mut self, resource: S, outcome: TransferOutcome) {
        self.entries.insert(resource.into(), outcome);
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// Number of distinct resources covered
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch covered no resources at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outcome for one canonical resource path
    pub fn get(&self, resource: &str) -> Option<&TransferOutcome> {
        self.entries.get(resource)
    }

    /// Number of resources that transferred successfully
    pub fn succeeded(&self) -> usize {
        self.entries.values().filter(|o| o.is_success()).count()
    }

    /// Number of resources that failed terminally
    pub fn failed(&self) -> usize {
        self.entries.values().filter(|o| !o.is_success()).count()
    }

    /// Iterate over all outcomes in canonical path order
    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &TransferOutcome)> {
        self.entries.iter().map(|(path, o)| (path.as_str(), o))
    }

    /// Iterate over the failed resources and their errors
    pub fn failures(&self) -> impl Iterator<Item = (&str, &TransferError)> {
        self.entries
            .iter()
            .filter_map(|(path, o)| o.error().map(|e| (path.as_str(), e)))
    }

    /// Wall-clock time the batch was accepted
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Wall-clock time the batch finished
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }
}
