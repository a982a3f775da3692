//! Position-affecting transactions tracked by the optimistic overlay.

use super::{
    ChainId, Position, PositionId, PositionKey, PositionPermission, PositionVersion, Token,
    TxHash, MAX_SWAPS,
};
use crate::error::EngineError;
use alloy::primitives::{Address, U256};

/// Reject swap counts the protocol's `uint32` field cannot hold.
pub fn check_swap_count(swaps: u64) -> Result<u64, EngineError> {
    if swaps > MAX_SWAPS {
        return Err(EngineError::InvalidSwapCount(swaps));
    }
    Ok(swaps)
}

/// Locally known inputs of a position creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPositionRequest {
    pub version: PositionVersion,
    pub owner: Address,
    pub from: Token,
    pub to: Token,
    /// Human-entered deposit in `from` units, e.g. "20".
    pub from_value: String,
    /// Seconds between swaps.
    pub frequency_type: u64,
    /// Number of swaps.
    pub frequency_value: u64,
    pub started_at: u64,
    pub permissions: Vec<PositionPermission>,
}

/// One variant per transaction type. Variants carry only what their
/// transition needs; amounts are base units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKind {
    NewPosition(NewPositionRequest),
    Withdraw {
        position: PositionKey,
    },
    AddFunds {
        position: PositionKey,
        new_funds: U256,
    },
    ResetPosition {
        position: PositionKey,
        new_funds: U256,
        new_swaps: u64,
    },
    RemoveFunds {
        position: PositionKey,
        amount: U256,
    },
    ModifySwaps {
        position: PositionKey,
        new_swaps: u64,
    },
    ModifyRateAndSwaps {
        position: PositionKey,
        new_rate: U256,
        new_swaps: u64,
        /// New rate expressed in the underlying asset, when `from` is a wrapper.
        new_rate_underlying: Option<U256>,
    },
    WithdrawFunds {
        position: PositionKey,
    },
    Terminate {
        position: PositionKey,
    },
    TransferOwnership {
        position: PositionKey,
        to: Address,
    },
    ModifyPermissions {
        position: PositionKey,
        permissions: Vec<PositionPermission>,
    },
    Migrate {
        position: PositionKey,
        new_version: PositionVersion,
        /// Replacement wrapper metadata when the migration changed yield routing.
        from_underlying: Option<Vec<Token>>,
        to_underlying: Option<Vec<Token>>,
    },
    TerminateMany {
        positions: Vec<PositionKey>,
    },
    GivePermissionToMultiplePositions {
        positions: Vec<PositionKey>,
        permissions: Vec<PositionPermission>,
    },
    Swap,
    NewPair,
    ApproveToken {
        token: Address,
        spender: Address,
    },
}

impl TransactionKind {
    /// Swap count this transaction sets, if any.
    pub fn requested_swaps(&self) -> Option<u64> {
        match self {
            TransactionKind::NewPosition(request) => Some(request.frequency_value),
            TransactionKind::ResetPosition { new_swaps, .. }
            | TransactionKind::ModifySwaps { new_swaps, .. }
            | TransactionKind::ModifyRateAndSwaps { new_swaps, .. } => Some(*new_swaps),
            _ => None,
        }
    }

    pub fn is_creation(&self) -> bool {
        matches!(self, TransactionKind::NewPosition(_))
    }

    /// Transactions that never touch position state.
    pub fn is_position_neutral(&self) -> bool {
        matches!(
            self,
            TransactionKind::Swap | TransactionKind::NewPair | TransactionKind::ApproveToken { .. }
        )
    }

    pub fn is_bulk(&self) -> bool {
        matches!(
            self,
            TransactionKind::TerminateMany { .. }
                | TransactionKind::GivePermissionToMultiplePositions { .. }
        )
    }

    /// Keys of the existing positions this transaction mutates.
    pub fn targets(&self) -> Vec<PositionKey> {
        match self {
            TransactionKind::Withdraw { position }
            | TransactionKind::AddFunds { position, .. }
            | TransactionKind::ResetPosition { position, .. }
            | TransactionKind::RemoveFunds { position, .. }
            | TransactionKind::ModifySwaps { position, .. }
            | TransactionKind::ModifyRateAndSwaps { position, .. }
            | TransactionKind::WithdrawFunds { position }
            | TransactionKind::Terminate { position }
            | TransactionKind::TransferOwnership { position, .. }
            | TransactionKind::ModifyPermissions { position, .. }
            | TransactionKind::Migrate { position, .. } => vec![position.clone()],
            TransactionKind::TerminateMany { positions }
            | TransactionKind::GivePermissionToMultiplePositions { positions, .. } => {
                positions.clone()
            }
            TransactionKind::NewPosition(_)
            | TransactionKind::Swap
            | TransactionKind::NewPair
            | TransactionKind::ApproveToken { .. } => Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransactionKind::NewPosition(_) => "NEW_POSITION",
            TransactionKind::Withdraw { .. } => "WITHDRAW_POSITION",
            TransactionKind::AddFunds { .. } => "ADD_FUNDS_POSITION",
            TransactionKind::ResetPosition { .. } => "RESET_POSITION",
            TransactionKind::RemoveFunds { .. } => "REMOVE_FUNDS",
            TransactionKind::ModifySwaps { .. } => "MODIFY_SWAPS_POSITION",
            TransactionKind::ModifyRateAndSwaps { .. } => "MODIFY_RATE_AND_SWAPS_POSITION",
            TransactionKind::WithdrawFunds { .. } => "WITHDRAW_FUNDS",
            TransactionKind::Terminate { .. } => "TERMINATE_POSITION",
            TransactionKind::TransferOwnership { .. } => "TRANSFER_POSITION",
            TransactionKind::ModifyPermissions { .. } => "MODIFY_PERMISSIONS",
            TransactionKind::Migrate { .. } => "MIGRATE_POSITION",
            TransactionKind::TerminateMany { .. } => "TERMINATE_MANY_POSITIONS",
            TransactionKind::GivePermissionToMultiplePositions { .. } => {
                "GIVE_PERMISSION_TO_MULTIPLE_POSITIONS"
            }
            TransactionKind::Swap => "SWAP",
            TransactionKind::NewPair => "NEW_PAIR",
            TransactionKind::ApproveToken { .. } => "APPROVE_TOKEN",
        }
    }
}

/// A submitted transaction as the overlay sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub hash: TxHash,
    pub chain_id: ChainId,
    pub kind: TransactionKind,
    /// Best-effort copies of targeted positions the store may not hold yet.
    pub snapshots: Vec<Position>,
}

impl TransactionRecord {
    pub fn new(hash: TxHash, chain_id: ChainId, kind: TransactionKind) -> Self {
        Self {
            hash,
            chain_id,
            kind,
            snapshots: Vec::new(),
        }
    }

    pub fn with_snapshot(mut self, position: Position) -> Self {
        self.snapshots.push(position);
        self
    }

    pub fn snapshot_for(&self, key: &PositionKey) -> Option<&Position> {
        self.snapshots.iter().find(|p| &p.key == key)
    }

    /// Key an optimistic creation lives under until confirmed or rejected.
    pub fn pending_creation_key(&self) -> Option<PositionKey> {
        match &self.kind {
            TransactionKind::NewPosition(request) => Some(PositionKey::pending_creation(
                self.hash.clone(),
                request.version,
            )),
            _ => None,
        }
    }
}

/// Facts only known once the transaction is mined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Id assigned to a created or migrated position.
    pub new_position_id: Option<PositionId>,
}

impl TransactionReceipt {
    pub fn with_position_id(id: impl Into<PositionId>) -> Self {
        Self {
            new_position_id: Some(id.into()),
        }
    }
}
