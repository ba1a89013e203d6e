//! Configuration management for the airlift transfer engine
//!
//! This crate provides the configuration layer for airlift, supporting
//! multiple configuration formats (YAML, TOML, JSON), validation, and
//! environment variable overrides.
//!
//! # Features
//!
//! - **Multiple formats**: Support for YAML, TOML and JSON configuration files
//! - **Validation**: Type-safe configuration with validation at load time
//! - **Environment overrides**: Override configuration values with `AIRLIFT_*`
//!   environment variables
//! - **Defaults**: Sensible default values for every option
//!
//! # Examples
//!
//! ```rust
//! use airlift_config::{Config, ConfigBuilder};
//!
//! // Load configuration from file, with environment overrides on top
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("airlift.yaml")
//!     .add_env_prefix("AIRLIFT")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Max tries: {}", config.transfer.max_tries);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use airlift_types::DeviceSignature;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Main configuration structure for the transfer engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Retry and pacing configuration
    pub transfer: TransferConfig,
    /// Cancellation configuration
    pub cancellation: CancellationConfig,
    /// Failsafe negotiation configuration
    pub failsafe: FailsafeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transfer: TransferConfig::default(),
            cancellation: CancellationConfig::default(),
            failsafe: FailsafeConfig::default(),
        }
    }
}

/// Retry and pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Maximum number of delivery attempts per resource (must be at least 1)
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,
    /// Pause between consecutive attempts at the same resource, in
    /// milliseconds. Negative values in configuration files clamp to zero.
    #[serde(
        default = "default_sleep_between_retries_ms",
        deserialize_with = "clamped_millis"
    )]
    pub sleep_between_retries_ms: u64,
    /// Pause between consecutive resources of a batch, in milliseconds.
    /// Negative values in configuration files clamp to zero.
    #[serde(default, deserialize_with = "clamped_millis")]
    pub sleep_between_transfers_ms: u64,
    /// Overall deadline for a single resource across all of its attempts, in
    /// milliseconds. Zero or negative values mean no deadline.
    #[serde(
        default,
        deserialize_with = "positive_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout_ms: Option<u64>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_tries: default_max_tries(),
            sleep_between_retries_ms: default_sleep_between_retries_ms(),
            sleep_between_transfers_ms: 0,
            timeout_ms: None,
        }
    }
}

impl TransferConfig {
    /// Pause between consecutive attempts at the same resource
    pub fn sleep_between_retries(&self) -> Duration {
        Duration::from_millis(self.sleep_between_retries_ms)
    }

    /// Pause between consecutive resources of a batch
    pub fn sleep_between_transfers(&self) -> Duration {
        Duration::from_millis(self.sleep_between_transfers_ms)
    }

    /// Overall per-resource deadline, if one is configured
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Cancellation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationConfig {
    /// How long to wait for the transport to acknowledge a cancellation
    /// request before the engine declares the transfer cancelled on its own,
    /// in milliseconds
    #[serde(
        default = "default_grace_window_ms",
        deserialize_with = "clamped_millis"
    )]
    pub grace_window_ms: u64,
}

impl Default for CancellationConfig {
    fn default() -> Self {
        Self {
            grace_window_ms: default_grace_window_ms(),
        }
    }
}

impl CancellationConfig {
    /// Grace window granted to the transport after a cancellation request
    pub fn grace_window(&self) -> Duration {
        Duration::from_millis(self.grace_window_ms)
    }
}

/// Failsafe negotiation configuration
///
/// Some devices are known to misbehave under aggressive transfer parameters.
/// Transfers to a device whose signature appears in this registry negotiate
/// with the conservative failsafe parameter set from the very first attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailsafeConfig {
    /// Device signatures that always negotiate with failsafe parameters
    #[serde(default = "default_problematic_devices")]
    pub problematic_devices: Vec<DeviceSignature>,
}

impl Default for FailsafeConfig {
    fn default() -> Self {
        Self {
            problematic_devices: default_problematic_devices(),
        }
    }
}

impl FailsafeConfig {
    /// An empty registry, with the built-in known-problematic devices removed
    pub fn without_known_devices() -> Self {
        Self {
            problematic_devices: Vec::new(),
        }
    }

    /// Whether `signature` matches a registered problematic device
    pub fn is_problematic(&self, signature: &DeviceSignature) -> bool {
        self.problematic_devices.contains(signature)
    }

    /// Register an additional problematic device
    #[must_use]
    pub fn with_device(mut self, signature: DeviceSignature) -> Self {
        self.problematic_devices.push(signature);
        self
    }
}

// Default value functions for serde

fn default_max_tries() -> u32 {
    10
}

fn default_sleep_between_retries_ms() -> u64 {
    1_000
}

fn default_grace_window_ms() -> u64 {
    2_500
}

fn default_problematic_devices() -> Vec<DeviceSignature> {
    // Galaxy Tab A8 tablets keep dropping the link when the window capacity
    // is raised above one.
    vec![DeviceSignature::new("samsung", "sm-x200")]
}

/// Deserialize a millisecond count, clamping negative values to zero
fn clamped_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(u64::try_from(raw).unwrap_or(0))
}

/// Deserialize an optional millisecond count where zero or negative values
/// mean "not configured"
fn positive_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|ms| u64::try_from(ms).ok())
        .filter(|&ms| ms > 0))
}
