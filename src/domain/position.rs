//! The canonical position record and its satellite types.

use super::{ChainId, PositionId, PositionKey, PositionVersion, Token, TxHash};
use crate::error::EngineError;
use alloy::primitives::{Address, U256};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionStatus {
    Active,
    Completed,
    Terminated,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Active => "ACTIVE",
            PositionStatus::Completed => "COMPLETED",
            PositionStatus::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(PositionStatus::Active),
            "COMPLETED" => Ok(PositionStatus::Completed),
            "TERMINATED" => Ok(PositionStatus::Terminated),
            other => Err(format!("unknown position status: {}", other)),
        }
    }
}

/// An underlying-denominated amount.
///
/// `NotApplicable` means neither relevant side is a yield-bearing wrapper.
/// `Unknown` means it applies but has not been resolved (yet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Underlying<T> {
    #[default]
    NotApplicable,
    Unknown,
    Known(T),
}

impl<T> Underlying<T> {
    /// Starting state for a field whose side may or may not carry a wrapper.
    pub fn for_side(applicable: bool) -> Self {
        if applicable {
            Underlying::Unknown
        } else {
            Underlying::NotApplicable
        }
    }

    pub fn is_applicable(&self) -> bool {
        !matches!(self, Underlying::NotApplicable)
    }

    pub fn known(&self) -> Option<&T> {
        match self {
            Underlying::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Replace the value, keeping `NotApplicable` as is.
    pub fn set_if_applicable(&mut self, value: T) {
        if self.is_applicable() {
            *self = Underlying::Known(value);
        }
    }
}

/// Capability a delegate operator may hold over a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    Increase,
    Reduce,
    Withdraw,
    Terminate,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::Increase,
        Permission::Reduce,
        Permission::Withdraw,
        Permission::Terminate,
    ];

    /// On-chain enum ordinal.
    pub fn as_u8(&self) -> u8 {
        match self {
            Permission::Increase => 0,
            Permission::Reduce => 1,
            Permission::Withdraw => 2,
            Permission::Terminate => 3,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_u8() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Increase => "INCREASE",
            Permission::Reduce => "REDUCE",
            Permission::Withdraw => "WITHDRAW",
            Permission::Terminate => "TERMINATE",
        }
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown permission: {}", s))
    }
}

/// Capabilities granted to one operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionPermission {
    pub operator: Address,
    pub permissions: Vec<Permission>,
}

impl PositionPermission {
    pub fn new(operator: Address, permissions: Vec<Permission>) -> Self {
        Self {
            operator,
            permissions,
        }
    }
}

/// A recurring-investment position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub key: PositionKey,
    pub chain_id: ChainId,
    /// Owner account.
    pub user: Address,
    pub from: Token,
    pub to: Token,

    /// Seconds between swaps.
    pub swap_interval: u64,
    /// `from` units swapped per interval.
    pub rate: U256,
    pub remaining_swaps: u64,
    pub total_swaps: u64,
    pub total_executed_swaps: u64,

    pub remaining_liquidity: U256,
    pub total_deposited: U256,
    pub swapped: U256,
    pub withdrawn: U256,
    pub to_withdraw: U256,

    pub remaining_liquidity_underlying: Underlying<U256>,
    pub to_withdraw_underlying: Underlying<U256>,
    pub deposited_rate_underlying: Underlying<U256>,
    pub total_swapped_underlying_accum: Underlying<U256>,
    pub to_withdraw_underlying_accum: Underlying<U256>,

    pub status: PositionStatus,
    /// Unix seconds.
    pub started_at: u64,
    /// Hash of the in-flight transaction, empty when none.
    pub pending_transaction: TxHash,
    pub permissions: Vec<PositionPermission>,

    pub pair_last_swapped_at: Option<u64>,
    pub pair_next_swap_available_at: Option<u64>,
}

impl Position {
    pub fn version(&self) -> PositionVersion {
        self.key.version()
    }

    /// Protocol id, or `NotOnchain` for an unconfirmed creation.
    pub fn onchain_id(&self) -> Result<PositionId, EngineError> {
        self.key
            .position_id()
            .ok_or_else(|| EngineError::NotOnchain(self.key.clone()))
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_transaction.is_empty()
    }

    pub fn clear_pending(&mut self) {
        self.pending_transaction = TxHash::default();
    }

    pub fn has_yield_side(&self) -> bool {
        self.from.has_underlying() || self.to.has_underlying()
    }

    /// `remainingLiquidity == rate × remainingSwaps`.
    pub fn liquidity_matches_schedule(&self) -> bool {
        self.rate
            .checked_mul(U256::from(self.remaining_swaps))
            .map(|expected| expected == self.remaining_liquidity)
            .unwrap_or(false)
    }

    /// Re-derive which underlying fields apply after the token sides change.
    pub fn reset_underlying_applicability(&mut self) {
        let from_wrapped = self.from.has_underlying();
        let to_wrapped = self.to.has_underlying();
        self.remaining_liquidity_underlying = Underlying::for_side(from_wrapped);
        self.deposited_rate_underlying = Underlying::for_side(from_wrapped);
        self.to_withdraw_underlying = Underlying::for_side(to_wrapped);
        self.total_swapped_underlying_accum = Underlying::for_side(to_wrapped);
        self.to_withdraw_underlying_accum = Underlying::for_side(to_wrapped);
    }
}

/// Check that every position lives on the same chain and protocol version.
///
/// Returns the shared pair, or `None` for an empty input.
pub fn ensure_consistent_chain_set<'a, I>(
    positions: I,
) -> Result<Option<(ChainId, PositionVersion)>, EngineError>
where
    I: IntoIterator<Item = &'a Position>,
{
    let mut shared: Option<(ChainId, PositionVersion)> = None;
    for position in positions {
        let pair = (position.chain_id, position.version());
        match shared {
            None => shared = Some(pair),
            Some(existing) if existing != pair => {
                return Err(EngineError::InconsistentChainSet {
                    first: existing,
                    second: pair,
                })
            }
            Some(_) => {}
        }
    }
    Ok(shared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_ordinals_round_trip() {
        for permission in Permission::ALL {
            assert_eq!(Permission::from_u8(permission.as_u8()), Some(permission));
            assert_eq!(permission.as_str().parse::<Permission>(), Ok(permission));
        }
        assert_eq!(Permission::from_u8(9), None);
    }

    #[test]
    fn test_underlying_set_if_applicable() {
        let mut na: Underlying<U256> = Underlying::NotApplicable;
        na.set_if_applicable(U256::from(5u64));
        assert_eq!(na, Underlying::NotApplicable);

        let mut unknown: Underlying<U256> = Underlying::for_side(true);
        unknown.set_if_applicable(U256::from(5u64));
        assert_eq!(unknown.known(), Some(&U256::from(5u64)));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("ACTIVE".parse::<PositionStatus>(), Ok(PositionStatus::Active));
        assert!("active".parse::<PositionStatus>().is_err());
    }
}
