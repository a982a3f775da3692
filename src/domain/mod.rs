//! Domain types for recurring-investment positions.
//!
//! This module provides:
//! - Identity primitives: ChainId, PositionVersion, PositionId, PositionKey, TxHash
//! - Integer amount parsing (no floating point anywhere)
//! - Token descriptors and the canonical Position record
//! - The closed set of position-affecting transactions

pub mod amount;
pub mod contracts;
pub mod position;
pub mod primitives;
pub mod token;
pub mod transaction;

pub use amount::{div_or_zero, parse_u256, parse_u64, parse_units, AmountError};
pub use contracts::{AddressBook, ProtocolContracts};
pub use position::{
    ensure_consistent_chain_set, Permission, Position, PositionPermission, PositionStatus,
    Underlying,
};
pub use primitives::{ChainId, PositionId, PositionKey, PositionVersion, TxHash, VersionParseError};
pub use token::{lowercase_address, Token, TokenKind, PROTOCOL_TOKEN_ADDRESS};
pub use transaction::{
    check_swap_count, NewPositionRequest, TransactionKind, TransactionReceipt,
    TransactionRecord,
};

/// Largest swap count the protocol accepts (`uint32`).
pub const MAX_SWAPS: u64 = u32::MAX as u64;
