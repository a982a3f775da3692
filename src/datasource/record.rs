//! Wire shape of indexer position records and their mapping onto [`Position`].

use crate::domain::{
    parse_u256, parse_u64, ChainId, Permission, Position, PositionId, PositionKey, PositionPermission,
    PositionStatus, PositionVersion, Token, TokenKind, TxHash, Underlying,
};
use alloy::primitives::{Address, U256};
use serde::Deserialize;

use super::DataSourceError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerToken {
    pub address: String,
    pub decimals: u8,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub underlying_tokens: Vec<IndexerToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerSwapInterval {
    pub interval: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerPair {
    #[serde(default)]
    pub last_swapped_at: Option<String>,
    #[serde(default)]
    pub next_swap_available_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerPermission {
    pub operator: String,
    pub permissions: Vec<String>,
}

/// A position as served by an indexing endpoint. Big numbers are decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerPosition {
    pub id: String,
    pub user: String,
    pub status: String,
    pub created_at_timestamp: String,
    pub from: IndexerToken,
    pub to: IndexerToken,
    pub swap_interval: IndexerSwapInterval,
    pub rate: String,
    pub remaining_liquidity: String,
    pub remaining_swaps: String,
    pub to_withdraw: String,
    pub total_deposited: String,
    pub total_swapped: String,
    pub total_withdrawn: String,
    pub total_swaps: String,
    pub total_executed_swaps: String,
    #[serde(default)]
    pub deposited_rate_underlying: Option<String>,
    #[serde(default)]
    pub total_swapped_underlying_accum: Option<String>,
    #[serde(default)]
    pub to_withdraw_underlying_accum: Option<String>,
    #[serde(default)]
    pub permissions: Vec<IndexerPermission>,
    #[serde(default)]
    pub pair: Option<IndexerPair>,
}

fn parse_err(field: &str, err: impl std::fmt::Display) -> DataSourceError {
    DataSourceError::ParseError(format!("Invalid {}: {}", field, err))
}

fn parse_address(field: &str, value: &str) -> Result<Address, DataSourceError> {
    value.trim().parse::<Address>().map_err(|e| parse_err(field, e))
}

fn amount(field: &str, value: &str) -> Result<U256, DataSourceError> {
    parse_u256(value).map_err(|e| parse_err(field, e))
}

fn counter(field: &str, value: &str) -> Result<u64, DataSourceError> {
    parse_u64(value).map_err(|e| parse_err(field, e))
}

/// Remote accumulators are only meaningful when the side carries a wrapper.
fn underlying_field(
    field: &str,
    applicable: bool,
    value: Option<&str>,
) -> Result<Underlying<U256>, DataSourceError> {
    if !applicable {
        return Ok(Underlying::NotApplicable);
    }
    match value {
        Some(v) => amount(field, v).map(Underlying::Known),
        None => Ok(Underlying::Unknown),
    }
}

impl IndexerToken {
    pub fn to_token(&self, chain_id: ChainId) -> Result<Token, DataSourceError> {
        let underlying_tokens = self
            .underlying_tokens
            .iter()
            .map(|t| t.to_token(chain_id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Token {
            chain_id,
            address: parse_address("token address", &self.address)?,
            decimals: self.decimals,
            symbol: self.symbol.clone(),
            name: if self.name.is_empty() {
                self.symbol.clone()
            } else {
                self.name.clone()
            },
            kind: TokenKind::from_indexer_tag(&self.kind),
            underlying_tokens,
        })
    }
}

impl IndexerPosition {
    /// Map into the canonical shape. Underlying twins of live balances start
    /// as `Unknown` when applicable; the aggregator resolves them afterwards.
    pub fn to_position(
        &self,
        chain_id: ChainId,
        version: PositionVersion,
    ) -> Result<Position, DataSourceError> {
        let id = self
            .id
            .parse::<PositionId>()
            .map_err(|e| parse_err("id", e))?;
        let from = self.from.to_token(chain_id)?;
        let to = self.to.to_token(chain_id)?;
        let status = self
            .status
            .parse::<PositionStatus>()
            .map_err(|e| parse_err("status", e))?;

        let permissions = self
            .permissions
            .iter()
            .map(|p| {
                let operator = parse_address("operator", &p.operator)?;
                let permissions = p
                    .permissions
                    .iter()
                    .map(|name| name.parse::<Permission>().map_err(|e| parse_err("permission", e)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(PositionPermission::new(operator, permissions))
            })
            .collect::<Result<Vec<_>, DataSourceError>>()?;

        let (pair_last_swapped_at, pair_next_swap_available_at) = match &self.pair {
            Some(pair) => (
                pair.last_swapped_at
                    .as_deref()
                    .map(|v| counter("lastSwappedAt", v))
                    .transpose()?,
                pair.next_swap_available_at
                    .as_deref()
                    .map(|v| counter("nextSwapAvailableAt", v))
                    .transpose()?,
            ),
            None => (None, None),
        };

        let from_wrapped = from.has_underlying();
        let to_wrapped = to.has_underlying();

        Ok(Position {
            key: PositionKey::Onchain { id, version },
            chain_id,
            user: parse_address("user", &self.user)?,
            swap_interval: counter("swapInterval", &self.swap_interval.interval)?,
            rate: amount("rate", &self.rate)?,
            remaining_swaps: counter("remainingSwaps", &self.remaining_swaps)?,
            total_swaps: counter("totalSwaps", &self.total_swaps)?,
            total_executed_swaps: counter("totalExecutedSwaps", &self.total_executed_swaps)?,
            remaining_liquidity: amount("remainingLiquidity", &self.remaining_liquidity)?,
            total_deposited: amount("totalDeposited", &self.total_deposited)?,
            swapped: amount("totalSwapped", &self.total_swapped)?,
            withdrawn: amount("totalWithdrawn", &self.total_withdrawn)?,
            to_withdraw: amount("toWithdraw", &self.to_withdraw)?,
            remaining_liquidity_underlying: Underlying::for_side(from_wrapped),
            to_withdraw_underlying: Underlying::for_side(to_wrapped),
            deposited_rate_underlying: underlying_field(
                "depositedRateUnderlying",
                from_wrapped,
                self.deposited_rate_underlying.as_deref(),
            )?,
            total_swapped_underlying_accum: underlying_field(
                "totalSwappedUnderlyingAccum",
                to_wrapped,
                self.total_swapped_underlying_accum.as_deref(),
            )?,
            to_withdraw_underlying_accum: underlying_field(
                "toWithdrawUnderlyingAccum",
                to_wrapped,
                self.to_withdraw_underlying_accum.as_deref(),
            )?,
            status,
            started_at: counter("createdAtTimestamp", &self.created_at_timestamp)?,
            pending_transaction: TxHash::default(),
            permissions,
            pair_last_swapped_at,
            pair_next_swap_available_at,
            from,
            to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_json() -> serde_json::Value {
        serde_json::json!({
            "id": "15",
            "user": "0x00000000000000000000000000000000000000aa",
            "status": "ACTIVE",
            "createdAtTimestamp": "1700000000",
            "from": {
                "address": "0x00000000000000000000000000000000000000f1",
                "decimals": 6,
                "symbol": "yvUSDC",
                "type": "YIELD_BEARING_SHARE",
                "underlyingTokens": [{
                    "address": "0x00000000000000000000000000000000000000f0",
                    "decimals": 6,
                    "symbol": "USDC",
                    "type": "BASE"
                }]
            },
            "to": {
                "address": "0x00000000000000000000000000000000000000e1",
                "decimals": 18,
                "symbol": "WETH",
                "type": "WRAPPED_PROTOCOL_TOKEN"
            },
            "swapInterval": { "interval": "86400" },
            "rate": "10",
            "remainingLiquidity": "100",
            "remainingSwaps": "10",
            "toWithdraw": "3",
            "totalDeposited": "120",
            "totalSwapped": "7",
            "totalWithdrawn": "4",
            "totalSwaps": "12",
            "totalExecutedSwaps": "2",
            "depositedRateUnderlying": "11",
            "totalSwappedUnderlyingAccum": "99",
            "permissions": [
                { "operator": "0x00000000000000000000000000000000000000cc", "permissions": ["INCREASE", "WITHDRAW"] }
            ],
            "pair": { "lastSwappedAt": "1700086400", "nextSwapAvailableAt": "1700172800" }
        })
    }

    #[test]
    fn test_maps_record_into_position() {
        let record: IndexerPosition = serde_json::from_value(record_json()).unwrap();
        let position = record.to_position(ChainId(10), PositionVersion::V4).unwrap();

        assert_eq!(position.key, PositionKey::onchain(15u64, PositionVersion::V4));
        assert_eq!(position.remaining_liquidity, U256::from(100u64));
        assert_eq!(position.remaining_swaps, 10);
        assert_eq!(position.swapped, U256::from(7u64));
        assert_eq!(position.from.kind, TokenKind::YieldBearingShare);
        assert!(position.from.has_underlying());
        assert_eq!(position.to.kind, TokenKind::WrappedProtocolToken);

        assert_eq!(position.remaining_liquidity_underlying, Underlying::Unknown);
        assert_eq!(position.deposited_rate_underlying, Underlying::Known(U256::from(11u64)));
        // `to` has no wrapper, so its accumulators are not applicable even if sent.
        assert_eq!(position.total_swapped_underlying_accum, Underlying::NotApplicable);
        assert_eq!(position.to_withdraw_underlying, Underlying::NotApplicable);

        assert_eq!(position.permissions.len(), 1);
        assert_eq!(
            position.permissions[0].permissions,
            vec![Permission::Increase, Permission::Withdraw]
        );
        assert_eq!(position.pair_next_swap_available_at, Some(1700172800));
        assert!(!position.has_pending());
    }

    #[test]
    fn test_rejects_malformed_amount() {
        let mut json = record_json();
        json["rate"] = serde_json::json!("1.5");
        let record: IndexerPosition = serde_json::from_value(json).unwrap();
        let err = record.to_position(ChainId(10), PositionVersion::V4).unwrap_err();
        assert!(matches!(err, DataSourceError::ParseError(_)));
    }
}
