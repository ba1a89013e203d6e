//! Error types and handling for airlift
//!
//! This module provides the transfer error taxonomy together with the
//! classifier that turns raw transport failure reports (error text plus an
//! optional remote error code) into typed, retry-aware errors.

use crate::types::Direction;

// Serde is imported conditionally through cfg_attr

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - operation can continue
    Low,
    /// Medium severity - operation should be retried
    Medium,
    /// High severity - operation should be aborted
    High,
    /// Critical severity - entire engine instance is suspect
    Critical,
}

/// Error code reported by the remote peer's management protocol
///
/// The raw code space encodes a subsystem group and a return code; only the
/// values the engine classifies on are named here, everything else passes
/// through as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RemoteErrorCode {
    /// No code was supplied alongside the error text
    None,
    /// The peer reported a generic, unspecified failure
    Unknown,
    /// The peer denied access to the resource
    AccessDenied,
    /// The peer could not find the requested resource
    NotFound,
    /// The requested resource designates a directory
    IsDirectory,
    /// Any other raw code
    Other(i32),
}

impl RemoteErrorCode {
    /// Map a raw protocol code to the named vocabulary
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Unknown,
            11 => Self::AccessDenied,
            9003 => Self::NotFound,
            9004 => Self::IsDirectory,
            other => Self::Other(other),
        }
    }
}

impl From<i32> for RemoteErrorCode {
    fn from(raw: i32) -> Self {
        Self::from_raw(raw)
    }
}

/// Main error type for airlift transfer operations
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferError {
    /// A caller-supplied argument was rejected before any transport activity
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument
        message: String,
    },

    /// A top-level operation was started while another is still in flight
    #[error("Invalid operation: {message}")]
    InvalidOperation {
        /// Description of the conflicting operation
        message: String,
    },

    /// A transfer attempt failed in a way that is worth retrying
    #[error("Transfer attempt failed for '{resource}': {message}")]
    Transfer {
        /// Canonical resource path of the failed attempt
        resource: String,
        /// Error text reported by the transport, possibly empty
        message: String,
        /// Remote error code reported alongside the text
        code: RemoteErrorCode,
    },

    /// The remote peer does not have the requested resource
    #[error("Remote resource not found: {resource}")]
    ResourceNotFound {
        /// Canonical resource path that was not found
        resource: String,
    },

    /// The remote parent folder of the resource does not exist
    #[error("Remote container not found for: {resource}")]
    ContainerNotFound {
        /// Canonical resource path whose container is missing
        resource: String,
    },

    /// The remote path designates a directory, not a transferable file
    #[error("Remote path is not a file: {resource}")]
    NotAFile {
        /// Canonical resource path that is a directory
        resource: String,
    },

    /// The remote peer denied access to the resource
    #[error("Access denied to remote resource: {resource}")]
    Unauthorized {
        /// Canonical resource path access was denied to
        resource: String,
    },

    /// Cancellation completed, acknowledged by the transport or synthesized
    /// after the grace window
    #[error("Transfer was cancelled")]
    Cancelled {
        /// Caller-supplied cancellation reason, if any
        reason: Option<String>,
    },

    /// The overall deadline elapsed without a terminal transport notification
    #[error("Transfer timed out after {seconds} seconds for '{resource}'")]
    TimedOut {
        /// Canonical resource path of the timed-out session
        resource: String,
        /// Number of seconds after which the session timed out
        seconds: u64,
    },

    /// Every attempt in the retry budget failed
    #[error("All {attempts} transfer attempts failed for '{resource}'")]
    AllAttemptsFailed {
        /// Canonical resource path of the exhausted session
        resource: String,
        /// Number of attempts that were made
        attempts: u32,
        /// The last attempt's error
        #[source]
        last: Box<TransferError>,
    },

    /// The transport failed synchronously instead of reporting asynchronously
    #[error("Internal transport failure: {message}")]
    Internal {
        /// Description of the unexpected failure
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// Rejected caller argument
    InvalidArgument,
    /// Conflicting top-level operation
    InvalidOperation,
    /// Recoverable transfer failure
    Transfer,
    /// Remote resource missing
    ResourceNotFound,
    /// Remote container missing
    ContainerNotFound,
    /// Remote path is a directory
    NotAFile,
    /// Remote access denied
    Unauthorized,
    /// Cancellation
    Cancelled,
    /// Deadline elapsed
    TimedOut,
    /// Retry budget exhausted
    AllAttemptsFailed,
    /// Unexpected synchronous transport failure
    Internal,
}

impl TransferError {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            Self::Transfer { .. } => ErrorKind::Transfer,
            Self::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            Self::ContainerNotFound { .. } => ErrorKind::ContainerNotFound,
            Self::NotAFile { .. } => ErrorKind::NotAFile,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::TimedOut { .. } => ErrorKind::TimedOut,
            Self::AllAttemptsFailed { .. } => ErrorKind::AllAttemptsFailed,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidArgument { .. } => ErrorSeverity::High,
            Self::InvalidOperation { .. } => ErrorSeverity::Medium,
            Self::Transfer { .. } => ErrorSeverity::Medium,
            Self::ResourceNotFound { .. }
            | Self::ContainerNotFound { .. }
            | Self::NotAFile { .. }
            | Self::Unauthorized { .. } => ErrorSeverity::High,
            Self::Cancelled { .. } => ErrorSeverity::Low,
            Self::TimedOut { .. } => ErrorSeverity::Medium,
            Self::AllAttemptsFailed { .. } => ErrorSeverity::High,
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transfer { .. })
    }

    /// Check if this error should trigger a retry
    pub fn should_retry(&self) -> bool {
        self.is_recoverable() && self.severity() <= ErrorSeverity::Medium
    }

    /// The canonical resource path this error relates to, when it has one
    pub fn resource(&self) -> Option<&str> {
        match self {
            Self::Transfer { resource, .. }
            | Self::ResourceNotFound { resource }
            | Self::ContainerNotFound { resource }
            | Self::NotAFile { resource }
            | Self::Unauthorized { resource }
            | Self::TimedOut { resource, .. }
            | Self::AllAttemptsFailed { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// Classify a raw transport failure report into a typed error
    ///
    /// Named remote codes win over text sniffing; sniffing is
    /// case-insensitive and covers the legacy wire forms some peers still
    /// emit ("NO ENTRY (5)", "UNRECOGNIZED (11)", "UNKNOWN (1)"). Rogue,
    /// empty or unrecognizable reports fall back to the recoverable
    /// `Transfer` variant so a flaky link keeps its retry budget.
    pub fn from_remote_failure(
        resource: impl Into<String>,
        message: impl Into<String>,
        code: RemoteErrorCode,
        direction: Direction,
    ) -> Self {
        let resource = resource.into();
        let message = message.into();

        match code {
            RemoteErrorCode::NotFound => return Self::missing_entry(resource, direction),
            RemoteErrorCode::IsDirectory => return Self::NotAFile { resource },
            RemoteErrorCode::AccessDenied => return Self::Unauthorized { resource },
            // On uploads the generic code stands for missing parent
            // directories in the remote path
            RemoteErrorCode::Unknown if direction == Direction::Upload => {
                return Self::ContainerNotFound { resource };
            }
            _ => {}
        }

        let lowered = message.to_lowercase();
        if lowered.contains("not found")
            || lowered.contains("no such file")
            || lowered.contains("no entry")
            || lowered.contains("no_entry")
        {
            return Self::missing_entry(resource, direction);
        }
        if lowered.contains("is a directory") {
            return Self::NotAFile { resource };
        }
        if lowered.contains("access denied")
            || lowered.contains("permission denied")
            || lowered.contains("unauthorized")
            || lowered.contains("unrecognized (11)")
        {
            return Self::Unauthorized { resource };
        }
        if direction == Direction::Upload && lowered.contains("unknown (1)") {
            return Self::ContainerNotFound { resource };
        }

        Self::Transfer {
            resource,
            message,
            code,
        }
    }

    // On a download the missing entry is the file itself; on an upload the
    // file does not exist remotely yet, so the miss is the parent folder.
    fn missing_entry(resource: String, direction: Direction) -> Self {
        match direction {
            Direction::Download => Self::ResourceNotFound { resource },
            Direction::Upload => Self::ContainerNotFound { resource },
        }
    }

    /// Create a new invalid-argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a new invalid-operation error
    pub fn invalid_operation<S: Into<String>>(message: S) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Create a new recoverable transfer error
    pub fn transfer(
        resource: impl Into<String>,
        message: impl Into<String>,
        code: RemoteErrorCode,
    ) -> Self {
        Self::Transfer {
            resource: resource.into(),
            message: message.into(),
            code,
        }
    }

    /// Create a new resource-not-found error
    pub fn resource_not_found<S: Into<String>>(resource: S) -> Self {
        Self::ResourceNotFound {
            resource: resource.into(),
        }
    }

    /// Create a new container-not-found error
    pub fn container_not_found<S: Into<String>>(resource: S) -> Self {
        Self::ContainerNotFound {
            resource: resource.into(),
        }
    }

    /// Create a new not-a-file error
    pub fn not_a_file<S: Into<String>>(resource: S) -> Self {
        Self::NotAFile {
            resource: resource.into(),
        }
    }

    /// Create a new unauthorized error
    pub fn unauthorized<S: Into<String>>(resource: S) -> Self {
        Self::Unauthorized {
            resource: resource.into(),
        }
    }

    /// Create a new cancellation error
    pub fn cancelled(reason: Option<String>) -> Self {
        Self::Cancelled { reason }
    }

    /// Create a new timed-out error
    pub fn timed_out<S: Into<String>>(resource: S, seconds: u64) -> Self {
        Self::TimedOut {
            resource: resource.into(),
            seconds,
        }
    }

    /// Create a new exhausted-budget error wrapping the last attempt's error
    pub fn all_attempts_failed<S: Into<String>>(
        resource: S,
        attempts: u32,
        last: TransferError,
    ) -> Self {
        Self::AllAttemptsFailed {
            resource: resource.into(),
            attempts,
            last: Box::new(last),
        }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
