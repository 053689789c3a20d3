//! Publish-status bitmask and platform definitions

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// PLATFORMS
// ============================================================================

/// Distribution platform, one power-of-two bit each.
///
/// Bit presence in [`PublishStatus`] is the sole source of truth for "is this
/// bot live on platform P"; the numeric values are stored in the durable
/// record, carried on the wire, and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Platform {
    /// Bot marketplace.
    Market,
    /// Open API platform.
    OpenApi,
    /// Voice assistant platform.
    Voice,
}

impl Platform {
    /// All known platforms, in bit order.
    pub const ALL: [Platform; 3] = [Platform::Market, Platform::OpenApi, Platform::Voice];

    /// The bitmask bit for this platform.
    pub fn bit(self) -> i64 {
        match self {
            Platform::Market => 1,
            Platform::OpenApi => 4,
            Platform::Voice => 16,
        }
    }

    /// Resolve a platform from its bit value.
    pub fn from_bit(bit: i64) -> Option<Platform> {
        Platform::ALL.into_iter().find(|p| p.bit() == bit)
    }
}

impl TryFrom<i64> for Platform {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Platform::from_bit(value).ok_or_else(|| format!("invalid platform bit: {}", value))
    }
}

impl From<Platform> for i64 {
    fn from(platform: Platform) -> i64 {
        platform.bit()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Market => write!(f, "market"),
            Platform::OpenApi => write!(f, "open_api"),
            Platform::Voice => write!(f, "voice"),
        }
    }
}

/// Requested publish operation on the wire: 1 = publish, 0 = unpublish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PublishOperation {
    Unpublish,
    Publish,
}

impl TryFrom<u8> for PublishOperation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PublishOperation::Unpublish),
            1 => Ok(PublishOperation::Publish),
            other => Err(format!("invalid publish operation: {}", other)),
        }
    }
}

impl From<PublishOperation> for u8 {
    fn from(op: PublishOperation) -> u8 {
        match op {
            PublishOperation::Unpublish => 0,
            PublishOperation::Publish => 1,
        }
    }
}

// ============================================================================
// PUBLISH STATUS BITMASK
// ============================================================================

/// Integer bitmask over [`Platform`] bits.
///
/// Serialized transparently as the raw integer, matching the durable-store
/// column and the wire format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PublishStatus(i64);

impl PublishStatus {
    /// No platform bits set.
    pub fn empty() -> Self {
        PublishStatus(0)
    }

    /// Wrap a raw bitmask value. Unknown bits are preserved as-is.
    pub fn from_bits(bits: i64) -> Self {
        PublishStatus(bits)
    }

    /// The raw bitmask value.
    pub fn bits(self) -> i64 {
        self.0
    }

    /// Whether no platform bit is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether the bot is live on any platform.
    pub fn is_published(self) -> bool {
        self.0 > 0
    }

    /// Whether the bit for `platform` is set.
    pub fn contains(self, platform: Platform) -> bool {
        self.0 & platform.bit() != 0
    }

    /// This status with the bit for `platform` set.
    pub fn with(self, platform: Platform) -> Self {
        PublishStatus(self.0 | platform.bit())
    }

    /// This status with the bit for `platform` cleared.
    pub fn without(self, platform: Platform) -> Self {
        PublishStatus(self.0 & !platform.bit())
    }

    /// The known platforms whose bits are set, in bit order.
    pub fn platforms(self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.contains(*p))
            .collect()
    }
}

// Display the raw integer; callers format platform lists themselves.
impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn platform_bits_are_stable() {
        assert_eq!(Platform::Market.bit(), 1);
        assert_eq!(Platform::OpenApi.bit(), 4);
        assert_eq!(Platform::Voice.bit(), 16);
    }

    #[test]
    fn with_accumulates_bits() {
        let status = PublishStatus::empty()
            .with(Platform::Market)
            .with(Platform::Voice);
        assert_eq!(status.bits(), 17);
        assert!(status.contains(Platform::Market));
        assert!(status.contains(Platform::Voice));
        assert!(!status.contains(Platform::OpenApi));
    }

    #[test]
    fn without_clears_only_named_bit() {
        let status = PublishStatus::from_bits(17).without(Platform::Market);
        assert_eq!(status.bits(), 16);
        assert_eq!(status.platforms(), vec![Platform::Voice]);
    }

    #[test]
    fn serializes_as_raw_integer() {
        let status = PublishStatus::from_bits(17);
        assert_eq!(serde_json::to_string(&status).expect("serialize"), "17");
        let parsed: PublishStatus = serde_json::from_str("17").expect("parse");
        assert_eq!(parsed, status);
    }

    #[test]
    fn platform_wire_values_are_bits() {
        let platform: Platform = serde_json::from_str("1").expect("parse");
        assert_eq!(platform, Platform::Market);
        let platform: Platform = serde_json::from_str("4").expect("parse");
        assert_eq!(platform, Platform::OpenApi);
        let platform: Platform = serde_json::from_str("16").expect("parse");
        assert_eq!(platform, Platform::Voice);
        assert_eq!(serde_json::to_string(&Platform::Voice).expect("serialize"), "16");
        assert!(serde_json::from_str::<Platform>("2").is_err());
        assert!(serde_json::from_str::<Platform>("\"market\"").is_err());
    }

    #[test]
    fn publish_operation_wire_values() {
        let op: PublishOperation = serde_json::from_str("1").expect("parse");
        assert_eq!(op, PublishOperation::Publish);
        let op: PublishOperation = serde_json::from_str("0").expect("parse");
        assert_eq!(op, PublishOperation::Unpublish);
        assert!(serde_json::from_str::<PublishOperation>("2").is_err());
    }

    fn arb_platform() -> impl Strategy<Value = Platform> {
        prop::sample::select(Platform::ALL.to_vec())
    }

    proptest! {
        // Setting a bit twice is the same as setting it once.
        #[test]
        fn publish_is_idempotent(bits in 0i64..32, platform in arb_platform()) {
            let status = PublishStatus::from_bits(bits);
            prop_assert_eq!(status.with(platform).with(platform), status.with(platform));
        }

        // Publish then unpublish restores the prior mask when the bit was
        // not already set.
        #[test]
        fn publish_unpublish_round_trips(bits in 0i64..32, platform in arb_platform()) {
            let status = PublishStatus::from_bits(bits);
            prop_assume!(!status.contains(platform));
            prop_assert_eq!(status.with(platform).without(platform), status);
        }

        // No platform bit implies any other platform bit.
        #[test]
        fn bits_are_independent(platform in arb_platform(), other in arb_platform()) {
            prop_assume!(platform != other);
            let status = PublishStatus::empty().with(platform);
            prop_assert!(!status.contains(other));
        }
    }
}
