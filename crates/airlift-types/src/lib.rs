//! Core type system and error taxonomy for airlift
//!
//! This crate provides the foundational types and shared vocabulary used
//! throughout the airlift ecosystem. It includes:
//!
//! - **Error handling**: the transfer error taxonomy with severity levels,
//!   retry gating and remote-failure classification
//! - **Core types**: transfer phases, directions, progress and log records,
//!   per-attempt bookkeeping
//! - **Negotiation parameters**: platform-tagged link tuning values with
//!   failsafe fallbacks and normalized device signatures
//!
//! # Features
//!
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use airlift_types::{NegotiationParams, PlatformFamily, TransferPhase};
//!
//! let params = NegotiationParams::failsafe(PlatformFamily::Android);
//! assert_eq!(params.initial_mtu_size, Some(23));
//! assert!(!TransferPhase::Transferring.is_terminal());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod params;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use error::{ErrorKind, ErrorSeverity, RemoteErrorCode, TransferError};
pub use params::{DeviceSignature, NegotiationParams, PlatformFamily};
pub use result::Result;
pub use types::*;
