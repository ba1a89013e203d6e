//! Transfer orchestration engine for Airlift
//!
//! This crate provides the transfer engine that drives resource uploads and
//! downloads over an attached transport link, from path normalization to the
//! terminal outcome.
//!
//! # Features
//!
//! - **Unified API**: One request type for uploads and downloads
//! - **Retry Policy**: Bounded retries with failsafe parameter fallback
//! - **Batch Scheduling**: Sequential multi-resource runs with isolated outcomes
//! - **Event Stream**: Ordered lifecycle events on a shared bus
//! - **Cooperative Control**: Pause, resume and cancellation with a grace window
//!
//! # Examples
//!
//! ```rust
//! use airlift_engine::{
//!     DeviceSignature, Direction, NegotiationParams, NotificationSink, PlatformFamily,
//!     Transport, TransferEngine, TransferError, Verdict,
//! };
//! use std::sync::Arc;
//!
//! struct NullLink;
//!
//! impl Transport for NullLink {
//!     fn attach(&self, _sink: NotificationSink) {}
//!     fn begin_transfer(
//!         &self,
//!         _direction: Direction,
//!         _resource: &str,
//!         _payload: Option<&[u8]>,
//!         _params: &NegotiationParams,
//!     ) -> Result<Verdict, TransferError> {
//!         Ok(Verdict::Success)
//!     }
//!     fn cancel(&self, _reason: &str) {}
//!     fn pause(&self) {}
//!     fn resume(&self) {}
//!     fn disconnect(&self) {}
//! }
//!
//! # fn main() -> Result<(), TransferError> {
//! let engine = TransferEngine::builder()
//!     .transport(Arc::new(NullLink))
//!     .host(DeviceSignature::new("Acme", "Widget 9"))
//!     .family(PlatformFamily::Android)
//!     .build()?;
//!
//! // Nothing is running yet, so there is nothing to pause
//! assert!(!engine.try_pause());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod coordinator;
pub mod engine;
pub mod events;
pub mod path;
pub mod session;

mod batch;
mod delivery;
mod retry;

pub use coordinator::{Coordinator, OperationPermit};
pub use engine::{EngineBuilder, TransferEngine};
pub use events::{EventBus, TransferEvent};
pub use session::{BatchReport, TransferId, TransferOutcome, TransferReceipt, TransferRequest};

pub use airlift_config::Config;
pub use airlift_transport::{NotificationSink, Transport, TransportNotification, Verdict};
pub use airlift_types::{
    DeviceSignature, Direction, ErrorKind, NegotiationParams, PlatformFamily, RemoteErrorCode,
    Result, TransferError, TransferPhase, TransferProgress,
};
