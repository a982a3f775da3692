use crate::api::AppState;
use crate::domain::{lowercase_address, Position, PositionPermission, Token, Underlying};
use crate::error::AppError;
use alloy::primitives::{Address, U256};
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsQuery {
    pub account: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsResponse {
    pub positions: Vec<PositionDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDto {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub underlying_tokens: Vec<TokenDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDto {
    pub operator: String,
    pub permissions: Vec<&'static str>,
}

/// Amounts are decimal strings. Underlying twins are `null` unless known.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDto {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,
    pub version: u8,
    pub chain_id: u64,
    pub user: String,
    pub from: TokenDto,
    pub to: TokenDto,
    pub swap_interval: u64,
    pub rate: String,
    pub remaining_swaps: u64,
    pub total_swaps: u64,
    pub total_executed_swaps: u64,
    pub remaining_liquidity: String,
    pub total_deposited: String,
    pub swapped: String,
    pub withdrawn: String,
    pub to_withdraw: String,
    pub remaining_liquidity_underlying: Option<String>,
    pub to_withdraw_underlying: Option<String>,
    pub deposited_rate_underlying: Option<String>,
    pub total_swapped_underlying_accum: Option<String>,
    pub to_withdraw_underlying_accum: Option<String>,
    pub status: &'static str,
    pub started_at: u64,
    pub pending_transaction: String,
    pub permissions: Vec<PermissionDto>,
    pub pair_last_swapped_at: Option<u64>,
    pub pair_next_swap_available_at: Option<u64>,
}

fn underlying_str(value: &Underlying<U256>) -> Option<String> {
    value.known().map(|v| v.to_string())
}

impl From<&Token> for TokenDto {
    fn from(token: &Token) -> Self {
        Self {
            address: lowercase_address(&token.address),
            symbol: token.symbol.clone(),
            decimals: token.decimals,
            underlying_tokens: token.underlying_tokens.iter().map(TokenDto::from).collect(),
        }
    }
}

impl From<&PositionPermission> for PermissionDto {
    fn from(permission: &PositionPermission) -> Self {
        Self {
            operator: lowercase_address(&permission.operator),
            permissions: permission.permissions.iter().map(|p| p.as_str()).collect(),
        }
    }
}

impl From<&Position> for PositionDto {
    fn from(p: &Position) -> Self {
        Self {
            id: p.key.to_string(),
            position_id: p.key.position_id().map(|id| id.to_string()),
            version: p.version().as_u8(),
            chain_id: p.chain_id.as_u64(),
            user: lowercase_address(&p.user),
            from: TokenDto::from(&p.from),
            to: TokenDto::from(&p.to),
            swap_interval: p.swap_interval,
            rate: p.rate.to_string(),
            remaining_swaps: p.remaining_swaps,
            total_swaps: p.total_swaps,
            total_executed_swaps: p.total_executed_swaps,
            remaining_liquidity: p.remaining_liquidity.to_string(),
            total_deposited: p.total_deposited.to_string(),
            swapped: p.swapped.to_string(),
            withdrawn: p.withdrawn.to_string(),
            to_withdraw: p.to_withdraw.to_string(),
            remaining_liquidity_underlying: underlying_str(&p.remaining_liquidity_underlying),
            to_withdraw_underlying: underlying_str(&p.to_withdraw_underlying),
            deposited_rate_underlying: underlying_str(&p.deposited_rate_underlying),
            total_swapped_underlying_accum: underlying_str(&p.total_swapped_underlying_accum),
            to_withdraw_underlying_accum: underlying_str(&p.to_withdraw_underlying_accum),
            status: p.status.as_str(),
            started_at: p.started_at,
            pending_transaction: p.pending_transaction.to_string(),
            permissions: p.permissions.iter().map(PermissionDto::from).collect(),
            pair_last_swapped_at: p.pair_last_swapped_at,
            pair_next_swap_available_at: p.pair_next_swap_available_at,
        }
    }
}

fn parse_account(params: &PositionsQuery) -> Result<Option<Address>, AppError> {
    match params.account.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Address::from_str(raw)
            .map(Some)
            .map_err(|_| AppError::BadRequest("Invalid account address".into())),
    }
}

fn owned_by(positions: Vec<Position>, account: &Address) -> Vec<PositionDto> {
    positions
        .iter()
        .filter(|p| &p.user == account)
        .map(PositionDto::from)
        .collect()
}

pub async fn get_current_positions(
    Query(params): Query<PositionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<PositionsResponse>, AppError> {
    let Some(account) = parse_account(&params)? else {
        return Ok(Json(PositionsResponse { positions: vec![] }));
    };

    state.tracker.refresh_current(&account).await?;
    Ok(Json(PositionsResponse {
        positions: owned_by(state.tracker.current_sorted(&account), &account),
    }))
}

pub async fn get_past_positions(
    Query(params): Query<PositionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<PositionsResponse>, AppError> {
    let Some(account) = parse_account(&params)? else {
        return Ok(Json(PositionsResponse { positions: vec![] }));
    };

    state.tracker.refresh_past(&account).await?;
    Ok(Json(PositionsResponse {
        positions: owned_by(state.tracker.past_sorted(&account), &account),
    }))
}
