//! Transport abstraction for the airlift transfer engine
//!
//! This crate defines the seam between the engine and whatever medium
//! actually moves bytes: a BLE link, a serial bridge, or a scripted double in
//! tests. A transport is driven through synchronous calls and reports
//! everything that happens afterwards through a [`NotificationSink`].
//!
//! # Examples
//!
//! ```rust
//! use airlift_transport::{NotificationSink, TransportNotification};
//! use airlift_types::TransferPhase;
//!
//! let (sink, mut notifications) = NotificationSink::channel();
//! sink.state_changed("/logs/boot.bin", TransferPhase::Idle, TransferPhase::Transferring);
//!
//! match notifications.try_recv() {
//!     Ok(TransportNotification::StateChanged { new, .. }) => {
//!         assert_eq!(new, TransferPhase::Transferring);
//!     }
//!     other => panic!("unexpected notification: {other:?}"),
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod link;
pub mod notification;

pub use link::{Transport, Verdict};
pub use notification::{NotificationSink, TransportNotification};
