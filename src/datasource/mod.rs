//! Collaborator abstractions for the per-chain indexing services and the
//! backend underlying-amount resolver.

use crate::domain::{lowercase_address, ChainId, PositionStatus, Token};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

pub mod graphql;
pub(crate) mod http;
pub mod mock;
pub mod record;
pub mod underlying;

pub use graphql::GraphQlIndexer;
pub use mock::{MockIndexer, MockUnderlyingResolver};
pub use record::{IndexerPair, IndexerPermission, IndexerPosition, IndexerSwapInterval, IndexerToken};
pub use underlying::HttpUnderlyingResolver;

/// Filter for one paginated positions query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionQuery {
    /// Lowercased account address.
    pub address: String,
    pub statuses: Vec<PositionStatus>,
}

impl PositionQuery {
    pub fn new(account: &Address, statuses: &[PositionStatus]) -> Self {
        Self {
            address: lowercase_address(account),
            statuses: statuses.to_vec(),
        }
    }

    pub fn status_tags(&self) -> Vec<&'static str> {
        self.statuses.iter().map(|s| s.as_str()).collect()
    }
}

/// One indexing endpoint (a single chain × protocol version).
///
/// Implementations return one page per call; the caller keeps paging until a
/// page comes back shorter than `first`.
#[async_trait]
pub trait IndexerSource: Send + Sync + fmt::Debug {
    async fn fetch_positions(
        &self,
        query: &PositionQuery,
        first: usize,
        skip: usize,
    ) -> Result<Vec<IndexerPosition>, DataSourceError>;
}

/// One wrapped amount to translate into its underlying asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnderlyingRequest {
    pub chain_id: ChainId,
    /// The underlying token the amount is resolved into.
    pub token: Token,
    pub amount: U256,
}

impl UnderlyingRequest {
    pub fn key(&self) -> String {
        underlying_key(self.chain_id, &self.token.address, self.amount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnderlyingAmount {
    pub underlying_amount: U256,
}

/// Resolver response key: `{chainId}-{underlyingTokenAddress}-{amount}`.
pub fn underlying_key(chain_id: ChainId, token: &Address, amount: U256) -> String {
    format!("{}-{}-{}", chain_id, lowercase_address(token), amount)
}

/// Batched wrapped → underlying amount translation.
#[async_trait]
pub trait UnderlyingResolver: Send + Sync + fmt::Debug {
    async fn resolve(
        &self,
        requests: &[UnderlyingRequest],
    ) -> Result<HashMap<String, UnderlyingAmount>, DataSourceError>;
}

/// Error type for data source operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded (caller should implement backoff)
    RateLimited,
    /// Other error
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}
