//! Domain primitives: ChainId, PositionVersion, PositionId, PositionKey, TxHash.

use super::amount::{parse_u256, AmountError};
use alloy::primitives::U256;
use std::fmt;
use std::str::FromStr;

/// EVM chain identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainId(pub u64);

impl ChainId {
    pub fn new(id: u64) -> Self {
        ChainId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deployed protocol generation a position lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PositionVersion {
    V1,
    V2,
    V3,
    V4,
}

impl PositionVersion {
    pub const ALL: [PositionVersion; 4] = [
        PositionVersion::V1,
        PositionVersion::V2,
        PositionVersion::V3,
        PositionVersion::V4,
    ];

    pub fn as_u8(&self) -> u8 {
        match self {
            PositionVersion::V1 => 1,
            PositionVersion::V2 => 2,
            PositionVersion::V3 => 3,
            PositionVersion::V4 => 4,
        }
    }
}

impl fmt::Display for PositionVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionParseError(pub String);

impl fmt::Display for VersionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown position version: {}", self.0)
    }
}

impl std::error::Error for VersionParseError {}

impl FromStr for PositionVersion {
    type Err = VersionParseError;

    /// Accepts `4`, `v4` or `V4`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        match digits {
            "1" => Ok(PositionVersion::V1),
            "2" => Ok(PositionVersion::V2),
            "3" => Ok(PositionVersion::V3),
            "4" => Ok(PositionVersion::V4),
            _ => Err(VersionParseError(s.to_string())),
        }
    }
}

/// Protocol-assigned position id (the position NFT token id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PositionId(pub U256);

impl PositionId {
    pub fn new(id: U256) -> Self {
        PositionId(id)
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl From<u64> for PositionId {
    fn from(value: u64) -> Self {
        PositionId(U256::from(value))
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PositionId {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_u256(s).map(PositionId)
    }
}

/// Transaction hash as reported by the broadcast collaborator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        TxHash(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store key of a tracked position.
///
/// Position ids are only unique within a protocol version, so the version is
/// always part of the key. Optimistically created positions have no id yet and
/// are keyed by the creating transaction instead.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PositionKey {
    Onchain {
        id: PositionId,
        version: PositionVersion,
    },
    PendingCreation {
        hash: TxHash,
        version: PositionVersion,
    },
}

impl PositionKey {
    pub fn onchain(id: impl Into<PositionId>, version: PositionVersion) -> Self {
        PositionKey::Onchain {
            id: id.into(),
            version,
        }
    }

    pub fn pending_creation(hash: TxHash, version: PositionVersion) -> Self {
        PositionKey::PendingCreation { hash, version }
    }

    pub fn version(&self) -> PositionVersion {
        match self {
            PositionKey::Onchain { version, .. } => *version,
            PositionKey::PendingCreation { version, .. } => *version,
        }
    }

    pub fn position_id(&self) -> Option<PositionId> {
        match self {
            PositionKey::Onchain { id, .. } => Some(*id),
            PositionKey::PendingCreation { .. } => None,
        }
    }

    pub fn is_pending_creation(&self) -> bool {
        matches!(self, PositionKey::PendingCreation { .. })
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionKey::Onchain { id, version } => write!(f, "{}-v{}", id, version),
            PositionKey::PendingCreation { hash, version } => {
                write!(f, "pending-transaction-{}-v{}", hash, version)
            }
        }
    }
}
