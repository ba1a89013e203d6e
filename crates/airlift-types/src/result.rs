//! Result type alias for airlift operations

use crate::TransferError;

/// Result type alias for airlift operations
pub type Result<T> = std::result::Result<T, TransferError>;
