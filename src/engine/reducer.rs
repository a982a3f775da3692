//! Canonical state transitions applied when a transaction is confirmed.
//!
//! Every arm clears the pending hash of the positions it touches. Amount
//! arithmetic is `U256` only; subtraction saturates at zero so an accumulator
//! can never go negative.

use super::store::PositionBook;
use crate::domain::{
    check_swap_count, div_or_zero, ensure_consistent_chain_set, parse_units, NewPositionRequest,
    Position, PositionKey, PositionPermission, PositionStatus, TransactionKind,
    TransactionReceipt, TransactionRecord, TxHash, Underlying,
};
use crate::error::EngineError;
use alloy::primitives::U256;
use tracing::debug;

/// Build the optimistic position for a creation from local inputs only.
pub(crate) fn synthesize_creation(
    record: &TransactionRecord,
    request: &NewPositionRequest,
    key: PositionKey,
) -> Result<Position, EngineError> {
    let swaps = check_swap_count(request.frequency_value)?;
    if swaps == 0 {
        return Err(EngineError::InvalidSwapCount(swaps));
    }
    let remaining_liquidity = parse_units(&request.from_value, request.from.decimals)?;

    let mut position = Position {
        key,
        chain_id: record.chain_id,
        user: request.owner,
        from: request.from.clone(),
        to: request.to.clone(),
        swap_interval: request.frequency_type,
        rate: div_or_zero(remaining_liquidity, swaps),
        remaining_swaps: swaps,
        total_swaps: swaps,
        total_executed_swaps: 0,
        remaining_liquidity,
        total_deposited: remaining_liquidity,
        swapped: U256::ZERO,
        withdrawn: U256::ZERO,
        to_withdraw: U256::ZERO,
        remaining_liquidity_underlying: Underlying::NotApplicable,
        to_withdraw_underlying: Underlying::NotApplicable,
        deposited_rate_underlying: Underlying::NotApplicable,
        total_swapped_underlying_accum: Underlying::NotApplicable,
        to_withdraw_underlying_accum: Underlying::NotApplicable,
        status: PositionStatus::Active,
        started_at: request.started_at,
        pending_transaction: record.hash.clone(),
        permissions: request.permissions.clone(),
        pair_last_swapped_at: None,
        pair_next_swap_available_at: None,
    };
    position.reset_underlying_applicability();
    zero_to_side_underlying(&mut position);
    position.total_swapped_underlying_accum.set_if_applicable(U256::ZERO);
    Ok(position)
}

/// Apply the confirmed effect of `record` to `book`.
///
/// Preconditions are checked before the first write, so an error leaves the
/// book untouched.
pub fn apply(
    book: &mut PositionBook,
    record: &TransactionRecord,
    receipt: &TransactionReceipt,
) -> Result<(), EngineError> {
    if let Some(swaps) = record.kind.requested_swaps() {
        check_swap_count(swaps)?;
    }

    match &record.kind {
        TransactionKind::NewPosition(request) => confirm_creation(book, record, request, receipt),
        TransactionKind::Withdraw { position } => update(book, position, |p| {
            p.withdrawn = p.swapped;
            zero_to_side_underlying(p);
        }),
        TransactionKind::AddFunds {
            position,
            new_funds,
        } => update(book, position, |p| {
            p.remaining_liquidity = p.remaining_liquidity.saturating_add(*new_funds);
            p.rate = div_or_zero(p.remaining_liquidity, p.remaining_swaps);
            invalidate_liquidity_underlying(p);
        }),
        TransactionKind::ResetPosition {
            position,
            new_funds,
            new_swaps,
        } => update(book, position, |p| {
            p.total_swaps = shift_total_swaps(p.total_swaps, p.remaining_swaps, *new_swaps);
            p.remaining_liquidity = p.remaining_liquidity.saturating_add(*new_funds);
            p.remaining_swaps = p.remaining_swaps.saturating_add(*new_swaps);
            p.rate = div_or_zero(p.remaining_liquidity, p.remaining_swaps);
            invalidate_liquidity_underlying(p);
        }),
        TransactionKind::RemoveFunds { position, amount } => update(book, position, |p| {
            let emptied = *amount == p.remaining_liquidity;
            let delta = if emptied { p.remaining_swaps } else { 0 };
            p.total_swaps = p.total_swaps.saturating_sub(delta);
            p.remaining_liquidity = p.remaining_liquidity.saturating_sub(*amount);
            if emptied {
                p.remaining_swaps = 0;
            }
            p.rate = div_or_zero(p.remaining_liquidity, p.remaining_swaps);
            invalidate_liquidity_underlying(p);
        }),
        TransactionKind::ModifySwaps {
            position,
            new_swaps,
        } => update(book, position, |p| {
            p.remaining_swaps = *new_swaps;
            p.rate = div_or_zero(p.remaining_liquidity, p.remaining_swaps);
        }),
        TransactionKind::ModifyRateAndSwaps {
            position,
            new_rate,
            new_swaps,
            new_rate_underlying,
        } => update(book, position, |p| {
            p.total_swaps = shift_total_swaps(p.total_swaps, p.remaining_swaps, *new_swaps);
            p.rate = *new_rate;
            p.remaining_swaps = *new_swaps;
            p.remaining_liquidity = p.rate.saturating_mul(U256::from(p.remaining_swaps));
            if p.deposited_rate_underlying.is_applicable() {
                p.deposited_rate_underlying = match new_rate_underlying {
                    Some(rate) => Underlying::Known(*rate),
                    None => Underlying::Unknown,
                };
            }
            if p.remaining_liquidity_underlying.is_applicable() {
                p.remaining_liquidity_underlying = match new_rate_underlying {
                    Some(rate) => {
                        Underlying::Known(rate.saturating_mul(U256::from(p.remaining_swaps)))
                    }
                    None => Underlying::Unknown,
                };
            }
        }),
        TransactionKind::WithdrawFunds { position } => update(book, position, |p| {
            p.total_swaps = p.total_swaps.saturating_sub(p.remaining_swaps);
            p.rate = U256::ZERO;
            p.remaining_swaps = 0;
            p.remaining_liquidity = U256::ZERO;
            // Only a rate that was already known is zeroed.
            if p.deposited_rate_underlying.known().is_some() {
                p.deposited_rate_underlying = Underlying::Known(U256::ZERO);
            }
            p.remaining_liquidity_underlying.set_if_applicable(U256::ZERO);
        }),
        TransactionKind::Terminate { position } => {
            require_present(book, position)?;
            archive_terminated(book, position);
            Ok(())
        }
        TransactionKind::TransferOwnership { position, .. } => {
            require_present(book, position)?;
            book.remove(position);
            Ok(())
        }
        TransactionKind::ModifyPermissions {
            position,
            permissions,
        } => update(book, position, |p| {
            merge_permissions(&mut p.permissions, permissions)
        }),
        TransactionKind::Migrate {
            position,
            new_version,
            from_underlying,
            to_underlying,
        } => {
            let old = require_present(book, position)?.clone();
            let id = receipt
                .new_position_id
                .ok_or(EngineError::MissingConfirmationData("new position id"))?;

            let mut migrated = old;
            migrated.key = PositionKey::onchain(id, *new_version);
            migrated.status = PositionStatus::Active;
            migrated.clear_pending();
            migrated.permissions.clear();
            migrated.swapped = U256::ZERO;
            migrated.withdrawn = U256::ZERO;
            migrated.to_withdraw = U256::ZERO;
            migrated.total_executed_swaps = 0;
            migrated.total_swaps = migrated.remaining_swaps;
            migrated.total_deposited = migrated.remaining_liquidity;
            let retagged = from_underlying.is_some() || to_underlying.is_some();
            if let Some(tokens) = from_underlying {
                migrated.from.underlying_tokens = tokens.clone();
            }
            if let Some(tokens) = to_underlying {
                migrated.to.underlying_tokens = tokens.clone();
            }
            if retagged {
                migrated.reset_underlying_applicability();
            }
            zero_to_side_underlying(&mut migrated);
            migrated.total_swapped_underlying_accum.set_if_applicable(U256::ZERO);

            book.move_to_archive(position, |p| p.clear_pending());
            book.upsert(migrated);
            Ok(())
        }
        TransactionKind::TerminateMany { positions } => {
            let targets = require_bulk(book, positions)?;
            for key in &targets {
                archive_terminated(book, key);
            }
            Ok(())
        }
        TransactionKind::GivePermissionToMultiplePositions {
            positions,
            permissions,
        } => {
            let targets = require_bulk(book, positions)?;
            for key in &targets {
                if let Some(p) = book.get_mut(key) {
                    merge_permissions(&mut p.permissions, permissions);
                    p.clear_pending();
                }
            }
            Ok(())
        }
        TransactionKind::Swap | TransactionKind::NewPair | TransactionKind::ApproveToken { .. } => {
            debug!("Ignoring position-neutral transaction {}", record.kind.name());
            Ok(())
        }
    }
}

fn confirm_creation(
    book: &mut PositionBook,
    record: &TransactionRecord,
    request: &NewPositionRequest,
    receipt: &TransactionReceipt,
) -> Result<(), EngineError> {
    let id = receipt
        .new_position_id
        .ok_or(EngineError::MissingConfirmationData("new position id"))?;
    let pending_key = PositionKey::pending_creation(record.hash.clone(), request.version);
    let final_key = PositionKey::onchain(id, request.version);

    let mut position = match book.get(&pending_key) {
        Some(p) => p.clone(),
        None => synthesize_creation(record, request, pending_key.clone())?,
    };
    position.key = final_key;
    position.swapped = U256::ZERO;
    position.withdrawn = U256::ZERO;
    position.total_executed_swaps = 0;
    position.remaining_swaps = request.frequency_value;
    position.total_swaps = request.frequency_value;
    position.clear_pending();

    book.remove(&pending_key);
    book.upsert(position);
    Ok(())
}

fn require_present<'a>(
    book: &'a PositionBook,
    key: &PositionKey,
) -> Result<&'a Position, EngineError> {
    book.get(key)
        .ok_or_else(|| EngineError::PositionNotFound(key.clone()))
}

/// All bulk targets must be present and share one chain and version.
fn require_bulk(
    book: &PositionBook,
    keys: &[PositionKey],
) -> Result<Vec<PositionKey>, EngineError> {
    if keys.is_empty() {
        return Err(EngineError::EmptyBulkOperation);
    }
    let positions = keys
        .iter()
        .map(|k| require_present(book, k))
        .collect::<Result<Vec<_>, _>>()?;
    ensure_consistent_chain_set(positions)?;
    Ok(keys.to_vec())
}

fn update<F>(book: &mut PositionBook, key: &PositionKey, mutate: F) -> Result<(), EngineError>
where
    F: FnOnce(&mut Position),
{
    let position = book
        .get_mut(key)
        .ok_or_else(|| EngineError::PositionNotFound(key.clone()))?;
    mutate(position);
    position.clear_pending();
    Ok(())
}

fn archive_terminated(book: &mut PositionBook, key: &PositionKey) {
    book.move_to_archive(key, |p| {
        p.to_withdraw = U256::ZERO;
        p.remaining_liquidity = U256::ZERO;
        p.remaining_swaps = 0;
        p.to_withdraw_underlying.set_if_applicable(U256::ZERO);
        p.remaining_liquidity_underlying.set_if_applicable(U256::ZERO);
        p.status = PositionStatus::Terminated;
        p.pending_transaction = TxHash::default();
    });
}

/// Move `total` by `|new - remaining|` in the direction the swap count moved.
fn shift_total_swaps(total: u64, remaining: u64, new_swaps: u64) -> u64 {
    if new_swaps >= remaining {
        total.saturating_add(new_swaps - remaining)
    } else {
        total.saturating_sub(remaining - new_swaps)
    }
}

fn zero_to_side_underlying(position: &mut Position) {
    position.to_withdraw = U256::ZERO;
    position.to_withdraw_underlying.set_if_applicable(U256::ZERO);
    position.to_withdraw_underlying_accum.set_if_applicable(U256::ZERO);
}

/// A locally changed balance has no known underlying value until the next fetch.
fn invalidate_liquidity_underlying(position: &mut Position) {
    if position.remaining_liquidity_underlying.is_applicable() {
        position.remaining_liquidity_underlying = Underlying::Unknown;
    }
}

/// Replace entries whose operator is already present, append the rest.
fn merge_permissions(existing: &mut Vec<PositionPermission>, updates: &[PositionPermission]) {
    for update in updates {
        match existing.iter_mut().find(|p| p.operator == update.operator) {
            Some(current) => current.permissions = update.permissions.clone(),
            None => existing.push(update.clone()),
        }
    }
}
