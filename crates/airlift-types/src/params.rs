//! Negotiation parameters and device signatures
//!
//! This module provides the platform-tagged link tuning vocabulary: the
//! optional negotiation hints handed to the transport, the failsafe fallback
//! sets for each platform family, and the normalized device signatures used
//! to recognize known-problematic hosts.

// Serde is imported conditionally through cfg_attr
use std::fmt;

/// Platform family of the host side of the link
///
/// Each family tunes a different subset of the negotiation parameters:
/// `Android` stacks honor the initial MTU size, window capacity and memory
/// alignment, while `Apple` stacks honor the pipeline depth and byte
/// alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlatformFamily {
    /// Android-style transport stack
    Android,
    /// iOS / macOS-style transport stack
    Apple,
}

/// Optional link tuning hints presented to the transport for one attempt
///
/// Every field is optional; an unset field is "unpinned" and the transport
/// (or a failsafe substitution) picks the value. Values the caller sets
/// explicitly are "pinned" and survive the deferred failsafe substitution on
/// the final retry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NegotiationParams {
    /// Initial ATT MTU size requested for the connection
    pub initial_mtu_size: Option<u16>,
    /// Number of buffers used for windowed uploads
    pub window_capacity: Option<u8>,
    /// Memory alignment of transfer buffers
    pub memory_alignment: Option<u8>,
    /// Number of pipelined chunks kept in flight
    pub pipeline_depth: Option<u8>,
    /// Byte alignment of chunk payloads
    pub byte_alignment: Option<u8>,
}

impl NegotiationParams {
    /// Smallest MTU any stack must accept; also the failsafe MTU
    pub const FAILSAFE_MTU_SIZE: u16 = 23;
    /// Largest MTU accepted by the transports this engine targets
    pub const MAX_MTU_SIZE: u16 = 517;
    /// Failsafe window capacity
    pub const FAILSAFE_WINDOW_CAPACITY: u8 = 1;
    /// Failsafe memory alignment
    pub const FAILSAFE_MEMORY_ALIGNMENT: u8 = 1;
    /// Failsafe pipeline depth
    pub const FAILSAFE_PIPELINE_DEPTH: u8 = 1;
    /// Failsafe byte alignment
    pub const FAILSAFE_BYTE_ALIGNMENT: u8 = 1;

    /// Create an empty parameter set (everything unpinned)
    pub fn new() -> Self {
        Self::default()
    }

    /// The known-safe parameter set for the given platform family
    ///
    /// Only the fields the family actually honors are set; the rest stay
    /// unpinned.
    pub fn failsafe(family: PlatformFamily) -> Self {
        match family {
            PlatformFamily::Android => Self {
                initial_mtu_size: Some(Self::FAILSAFE_MTU_SIZE),
                window_capacity: Some(Self::FAILSAFE_WINDOW_CAPACITY),
                memory_alignment: Some(Self::FAILSAFE_MEMORY_ALIGNMENT),
                pipeline_depth: None,
                byte_alignment: None,
            },
            PlatformFamily::Apple => Self {
                initial_mtu_size: None,
                window_capacity: None,
                memory_alignment: None,
                pipeline_depth: Some(Self::FAILSAFE_PIPELINE_DEPTH),
                byte_alignment: Some(Self::FAILSAFE_BYTE_ALIGNMENT),
            },
        }
    }

    /// Fill every unpinned field from the family's failsafe set
    ///
    /// Pinned fields survive untouched; fields the failsafe set leaves
    /// unspecified also survive.
    pub fn or_failsafe(self, family: PlatformFamily) -> Self {
        let safe = Self::failsafe(family);
        Self {
            initial_mtu_size: self.initial_mtu_size.or(safe.initial_mtu_size),
            window_capacity: self.window_capacity.or(safe.window_capacity),
            memory_alignment: self.memory_alignment.or(safe.memory_alignment),
            pipeline_depth: self.pipeline_depth.or(safe.pipeline_depth),
            byte_alignment: self.byte_alignment.or(safe.byte_alignment),
        }
    }

    /// Check whether no field is pinned
    pub fn is_unspecified(&self) -> bool {
        self.initial_mtu_size.is_none()
            && self.window_capacity.is_none()
            && self.memory_alignment.is_none()
            && self.pipeline_depth.is_none()
            && self.byte_alignment.is_none()
    }

    /// Validate the pinned values against the ranges the transports accept
    pub fn validate(&self) -> Result<(), String> {
        if let Some(mtu) = self.initial_mtu_size {
            if mtu < Self::FAILSAFE_MTU_SIZE || mtu > Self::MAX_MTU_SIZE {
                return Err(format!(
                    "MTU size {} is outside the accepted range [{}, {}]",
                    mtu,
                    Self::FAILSAFE_MTU_SIZE,
                    Self::MAX_MTU_SIZE
                ));
            }
        }
        if let Some(window) = self.window_capacity {
            if window == 0 {
                return Err("Window capacity must be at least 1".to_string());
            }
        }
        if let Some(depth) = self.pipeline_depth {
            if depth == 0 {
                return Err("Pipeline depth must be at least 1".to_string());
            }
        }
        if let Some(alignment) = self.memory_alignment {
            if alignment == 0 {
                return Err("Memory alignment must be at least 1".to_string());
            }
        }
        if let Some(alignment) = self.byte_alignment {
            if alignment == 0 {
                return Err("Byte alignment must be at least 1".to_string());
            }
        }
        Ok(())
    }

    /// Pin the initial MTU size
    pub fn with_initial_mtu_size(mut self, mtu: u16) -> Self {
        self.initial_mtu_size = Some(mtu);
        self
    }

    /// Pin the window capacity
    pub fn with_window_capacity(mut self, capacity: u8) -> Self {
        self.window_capacity = Some(capacity);
        self
    }

    /// Pin the memory alignment
    pub fn with_memory_alignment(mut self, alignment: u8) -> Self {
        self.memory_alignment = Some(alignment);
        self
    }

    /// Pin the pipeline depth
    pub fn with_pipeline_depth(mut self, depth: u8) -> Self {
        self.pipeline_depth = Some(depth);
        self
    }

    /// Pin the byte alignment
    pub fn with_byte_alignment(mut self, alignment: u8) -> Self {
        self.byte_alignment = Some(alignment);
        self
    }
}

/// Normalized identity of a host device, used to match known-problematic
/// hardware
///
/// Manufacturer and model are trimmed and lowercased at construction so
/// equality and hashing never depend on the casing or padding the platform
/// reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "RawDeviceSignature"))]
pub struct DeviceSignature {
    manufacturer: String,
    model: String,
}

/// Raw signature as it appears in configuration files, before normalization
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawDeviceSignature {
    manufacturer: String,
    model: String,
}

#[cfg(feature = "serde")]
impl From<RawDeviceSignature> for DeviceSignature {
    fn from(raw: RawDeviceSignature) -> Self {
        Self::new(raw.manufacturer, raw.model)
    }
}

impl DeviceSignature {
    /// Create a normalized signature from raw platform-reported strings
    pub fn new(manufacturer: impl AsRef<str>, model: impl AsRef<str>) -> Self {
        Self {
            manufacturer: manufacturer.as_ref().trim().to_lowercase(),
            model: model.as_ref().trim().to_lowercase(),
        }
    }

    /// The normalized manufacturer string
    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    /// The normalized model string
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl fmt::Display for DeviceSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.manufacturer, self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_failsafe_android_values() {
        let params = NegotiationParams::failsafe(PlatformFamily::Android);
        assert_eq!(params.initial_mtu_size, Some(23));
        assert_eq!(params.window_capacity, Some(1));
        assert_eq!(params.memory_alignment, Some(1));
        assert_eq!(params.pipeline_depth, None);
        assert_eq!(params.byte_alignment, None);
    }

    #[test]
    fn test_failsafe_apple_values() {
        let params = NegotiationParams::failsafe(PlatformFamily::Apple);
        assert_eq!(params.pipeline_depth, Some(1));
        assert_eq!(params.byte_alignment, Some(1));
        assert_eq!(params.initial_mtu_size, None);
    }

    #[test]
    fn test_or_failsafe_keeps_pinned_values() {
        let params = NegotiationParams::new()
            .with_initial_mtu_size(498)
            .or_failsafe(PlatformFamily::Android);

        assert_eq!(params.initial_mtu_size, Some(498));
        assert_eq!(params.window_capacity, Some(1));
        assert_eq!(params.memory_alignment, Some(1));
    }

    #[test]
    fn test_or_failsafe_fills_everything_when_unpinned() {
        let params = NegotiationParams::new().or_failsafe(PlatformFamily::Android);
        assert_eq!(
            params,
            NegotiationParams::failsafe(PlatformFamily::Android)
        );
    }

    #[test]
    fn test_unspecified_detection() {
        assert!(NegotiationParams::new().is_unspecified());
        assert!(!NegotiationParams::new().with_window_capacity(4).is_unspecified());
    }

    #[rstest]
    #[case(NegotiationParams::new(), true)]
    #[case(NegotiationParams::new().with_initial_mtu_size(23), true)]
    #[case(NegotiationParams::new().with_initial_mtu_size(517), true)]
    #[case(NegotiationParams::new().with_initial_mtu_size(22), false)]
    #[case(NegotiationParams::new().with_initial_mtu_size(518), false)]
    #[case(NegotiationParams::new().with_window_capacity(0), false)]
    #[case(NegotiationParams::new().with_pipeline_depth(0), false)]
    #[case(NegotiationParams::new().with_memory_alignment(0), false)]
    #[case(NegotiationParams::new().with_byte_alignment(0), false)]
    fn test_param_validation(#[case] params: NegotiationParams, #[case] valid: bool) {
        assert_eq!(params.validate().is_ok(), valid);
    }

    #[test]
    fn test_signature_normalization() {
        let left = DeviceSignature::new("  Samsung ", " SM-X200  ");
        let right = DeviceSignature::new("samsung", "sm-x200");
        assert_eq!(left, right);
        assert_eq!(left.manufacturer(), "samsung");
        assert_eq!(left.model(), "sm-x200");
    }

    #[test]
    fn test_signature_display() {
        let signature = DeviceSignature::new("Acme", "Widget-9");
        assert_eq!(signature.to_string(), "acme widget-9");
    }
}
