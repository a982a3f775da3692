//! Token descriptors for the two sides of a position.

use super::ChainId;
use alloy::primitives::{address, Address};
use std::fmt;

/// Pseudo-address used for a chain's native asset.
pub const PROTOCOL_TOKEN_ADDRESS: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// How the protocol treats a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Chain native asset (never held by a position directly).
    Native,
    /// Plain ERC-20.
    Base,
    /// Wrapped form of the native asset.
    WrappedProtocolToken,
    /// Yield-bearing vault share.
    YieldBearingShare,
}

impl TokenKind {
    /// Parse the indexer's `type` tag. Unknown tags degrade to `Base`.
    pub fn from_indexer_tag(tag: &str) -> Self {
        match tag {
            "PROTOCOL_TOKEN" => TokenKind::Native,
            "WRAPPED_PROTOCOL_TOKEN" => TokenKind::WrappedProtocolToken,
            "YIELD_BEARING_SHARE" => TokenKind::YieldBearingShare,
            _ => TokenKind::Base,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub chain_id: ChainId,
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
    pub name: String,
    pub kind: TokenKind,
    /// Non-empty iff this token is a yield-bearing wrapper.
    pub underlying_tokens: Vec<Token>,
}

impl Token {
    pub fn new(
        chain_id: ChainId,
        address: Address,
        decimals: u8,
        symbol: impl Into<String>,
        kind: TokenKind,
    ) -> Self {
        let symbol = symbol.into();
        Self {
            chain_id,
            address,
            decimals,
            name: symbol.clone(),
            symbol,
            kind,
            underlying_tokens: Vec::new(),
        }
    }

    /// The native asset of `chain_id`.
    pub fn native(chain_id: ChainId, symbol: impl Into<String>) -> Self {
        Self::new(chain_id, PROTOCOL_TOKEN_ADDRESS, 18, symbol, TokenKind::Native)
    }

    pub fn with_underlying(mut self, underlying: Vec<Token>) -> Self {
        self.underlying_tokens = underlying;
        self
    }

    pub fn has_underlying(&self) -> bool {
        !self.underlying_tokens.is_empty()
    }

    /// The token amounts are resolved into when this side is a wrapper.
    pub fn primary_underlying(&self) -> Option<&Token> {
        self.underlying_tokens.first()
    }

    pub fn is_native(&self) -> bool {
        self.kind == TokenKind::Native || self.address == PROTOCOL_TOKEN_ADDRESS
    }

    pub fn is_wrapped_protocol_token(&self) -> bool {
        self.kind == TokenKind::WrappedProtocolToken
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.symbol, self.address)
    }
}

/// Lowercase `0x`-prefixed hex, the form the indexer and resolver key on.
pub fn lowercase_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}
