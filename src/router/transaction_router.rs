use super::{BackendTxBuilder, BackendTxRequest, ContractCall, ContractProxy, UnsignedTx};
use crate::domain::{
    check_swap_count, ensure_consistent_chain_set, parse_units, AmountError, ChainId,
    NewPositionRequest, Permission, Position, PositionId, PositionPermission, Underlying,
};
use crate::error::EngineError;
use crate::permissions::PermissionAuthority;
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentDirection {
    Increase,
    Decrease,
}

impl AdjustmentDirection {
    /// Capability the companion needs to perform the adjustment.
    pub fn capability(&self) -> Permission {
        match self {
            AdjustmentDirection::Increase => Permission::Increase,
            AdjustmentDirection::Decrease => Permission::Reduce,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    pub direction: AdjustmentDirection,
    /// Absolute difference between the new and current funds.
    pub delta: U256,
    pub new_amount: U256,
}

/// Compare `new_rate × new_swaps` against the funds left in the position.
///
/// When `from` is a yield-bearing wrapper the rate is underlying-denominated,
/// so the comparison uses the underlying twin of the remaining liquidity. A tie
/// counts as an increase.
pub fn classify_adjustment(
    position: &Position,
    new_rate: U256,
    new_swaps: u64,
) -> Result<Adjustment, EngineError> {
    let new_amount = new_rate
        .checked_mul(U256::from(new_swaps))
        .ok_or_else(|| AmountError::Overflow(format!("{} x {}", new_rate, new_swaps)))?;

    let current = if position.from.has_underlying() {
        match position.remaining_liquidity_underlying {
            Underlying::Known(amount) => amount,
            _ => {
                return Err(EngineError::UnderlyingResolutionFailure(format!(
                    "remaining liquidity of {} in underlying is not known",
                    position.key
                )))
            }
        }
    } else {
        position.remaining_liquidity
    };

    let adjustment = if new_amount >= current {
        Adjustment {
            direction: AdjustmentDirection::Increase,
            delta: new_amount - current,
            new_amount,
        }
    } else {
        Adjustment {
            direction: AdjustmentDirection::Decrease,
            delta: current - new_amount,
            new_amount,
        }
    };
    Ok(adjustment)
}

/// Operation requested on an existing position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationParams {
    ModifyRateAndSwaps {
        new_rate: U256,
        new_swaps: u64,
        /// Fund or refund in the native asset instead of its wrapped form.
        use_native: bool,
    },
    Withdraw {
        use_native: bool,
    },
    Terminate {
        use_native: bool,
    },
}

#[derive(Debug, Clone)]
pub struct TransactionRouter {
    authority: PermissionAuthority,
    proxy: Arc<dyn ContractProxy>,
    backend: Arc<dyn BackendTxBuilder>,
}

impl TransactionRouter {
    pub fn new(
        authority: PermissionAuthority,
        proxy: Arc<dyn ContractProxy>,
        backend: Arc<dyn BackendTxBuilder>,
    ) -> Self {
        Self {
            authority,
            proxy,
            backend,
        }
    }

    /// Build the transaction for `params` on `position`.
    ///
    /// Swap counts are validated before any remote call.
    pub async fn build_operation_tx(
        &self,
        position: &Position,
        params: OperationParams,
    ) -> Result<UnsignedTx, EngineError> {
        if let OperationParams::ModifyRateAndSwaps { new_swaps, .. } = params {
            check_swap_count(new_swaps)?;
        }

        let position_id = position.onchain_id()?;
        let recipient = position.user;
        let (call, use_native, via_companion, capability) = match params {
            OperationParams::ModifyRateAndSwaps {
                new_rate,
                new_swaps,
                use_native,
            } => {
                if use_native && !position.from.is_wrapped_protocol_token() {
                    return Err(EngineError::ProtocolTokenMismatch(format!(
                        "{} is not the wrapped protocol token",
                        position.from.symbol
                    )));
                }
                let adjustment = classify_adjustment(position, new_rate, new_swaps)?;
                debug!(
                    "Adjusting {} by {:?} {}",
                    position.key, adjustment.direction, adjustment.delta
                );
                let call = match adjustment.direction {
                    AdjustmentDirection::Increase => ContractCall::IncreasePosition {
                        position_id,
                        amount: adjustment.delta,
                        new_swaps,
                    },
                    AdjustmentDirection::Decrease => ContractCall::ReducePosition {
                        position_id,
                        amount: adjustment.delta,
                        new_swaps,
                        recipient,
                    },
                };
                (
                    call,
                    use_native,
                    use_native || position.from.has_underlying(),
                    adjustment.direction.capability(),
                )
            }
            OperationParams::Withdraw { use_native } => {
                if use_native && !position.to.is_wrapped_protocol_token() {
                    return Err(EngineError::ProtocolTokenMismatch(format!(
                        "{} is not the wrapped protocol token",
                        position.to.symbol
                    )));
                }
                (
                    ContractCall::Withdraw {
                        position_id,
                        recipient,
                    },
                    use_native,
                    use_native || position.to.has_underlying(),
                    Permission::Withdraw,
                )
            }
            OperationParams::Terminate { use_native } => {
                if use_native
                    && !position.from.is_wrapped_protocol_token()
                    && !position.to.is_wrapped_protocol_token()
                {
                    return Err(EngineError::ProtocolTokenMismatch(format!(
                        "neither {} nor {} is the wrapped protocol token",
                        position.from.symbol, position.to.symbol
                    )));
                }
                (
                    ContractCall::Terminate {
                        position_id,
                        recipient,
                    },
                    use_native,
                    use_native || position.has_yield_side(),
                    Permission::Terminate,
                )
            }
        };

        let contracts = self
            .authority
            .contracts()
            .get(position.chain_id, position.version())?
            .clone();
        if !via_companion {
            return Ok(self
                .proxy
                .populate(position.chain_id, contracts.hub, &call)
                .await?);
        }

        let permits = match self.missing_grant(position, contracts.companion, capability).await? {
            Some(grant) => vec![grant],
            None => Vec::new(),
        };
        let request = BackendTxRequest {
            chain_id: position.chain_id,
            companion: contracts.companion,
            call,
            use_native,
            permits,
        };
        info!(
            "Routing {} on {} through the companion ({} permit(s))",
            request.call.action(),
            position.key,
            request.permits.len()
        );
        Ok(self.backend.build(&request).await?)
    }

    /// Build the creation transaction for a new position.
    pub async fn build_deposit_tx(
        &self,
        chain_id: ChainId,
        request: &NewPositionRequest,
    ) -> Result<UnsignedTx, EngineError> {
        let swaps = check_swap_count(request.frequency_value)?;
        if swaps == 0 {
            return Err(EngineError::InvalidSwapCount(swaps));
        }
        let amount = parse_units(&request.from_value, request.from.decimals)?;
        let contracts = self.authority.contracts().get(chain_id, request.version)?;

        let call = ContractCall::Deposit {
            from: request.from.address,
            to: request.to.address,
            amount,
            swaps,
            swap_interval: request.frequency_type,
            owner: request.owner,
            permissions: request.permissions.clone(),
        };

        let needs_backend =
            request.from.is_native() || request.from.has_underlying() || request.to.has_underlying();
        if !needs_backend {
            return Ok(self.proxy.populate(chain_id, contracts.hub, &call).await?);
        }
        let backend_request = BackendTxRequest {
            chain_id,
            companion: contracts.companion,
            call,
            use_native: request.from.is_native(),
            permits: Vec::new(),
        };
        Ok(self.backend.build(&backend_request).await?)
    }

    /// Terminate every position in one transaction.
    ///
    /// All positions must share chain and version; nothing is called otherwise.
    pub async fn build_terminate_many_tx(
        &self,
        positions: &[Position],
        use_native: bool,
    ) -> Result<UnsignedTx, EngineError> {
        let (chain_id, version) =
            ensure_consistent_chain_set(positions)?.ok_or(EngineError::EmptyBulkOperation)?;
        let position_ids = onchain_ids(positions)?;
        let contracts = self.authority.contracts().get(chain_id, version)?.clone();
        let recipient = positions[0].user;

        let mut permits = Vec::new();
        for position in positions {
            if let Some(grant) = self
                .missing_grant(position, contracts.companion, Permission::Terminate)
                .await?
            {
                permits.push(grant);
            }
        }

        let call = ContractCall::TerminateMany {
            hub: contracts.hub,
            position_ids,
            recipient,
        };
        let needs_backend =
            use_native || !permits.is_empty() || positions.iter().any(Position::has_yield_side);
        if !needs_backend {
            return Ok(self
                .proxy
                .populate(chain_id, contracts.companion, &call)
                .await?);
        }
        let request = BackendTxRequest {
            chain_id,
            companion: contracts.companion,
            call,
            use_native,
            permits,
        };
        Ok(self.backend.build(&request).await?)
    }

    /// Give the same operator capabilities on every position.
    pub async fn build_give_permission_many_tx(
        &self,
        positions: &[Position],
        permissions: Vec<PositionPermission>,
    ) -> Result<UnsignedTx, EngineError> {
        let (chain_id, version) =
            ensure_consistent_chain_set(positions)?.ok_or(EngineError::EmptyBulkOperation)?;
        let position_ids = onchain_ids(positions)?;
        let manager = self
            .authority
            .contracts()
            .get(chain_id, version)?
            .permission_manager;

        let call = ContractCall::ModifyPermissionsMany {
            position_ids,
            permissions,
        };
        Ok(self.proxy.populate(chain_id, manager, &call).await?)
    }

    /// A fresh grant when `companion` lacks `capability`, none otherwise.
    async fn missing_grant(
        &self,
        position: &Position,
        companion: Address,
        capability: Permission,
    ) -> Result<Option<crate::permissions::PermissionGrant>, EngineError> {
        if self
            .authority
            .has_capability(position, companion, capability)
            .await?
        {
            return Ok(None);
        }
        self.authority
            .build_permission_grant(position, companion, capability, None, None)
            .await
            .map(Some)
    }
}

fn onchain_ids(positions: &[Position]) -> Result<Vec<PositionId>, EngineError> {
    positions.iter().map(Position::onchain_id).collect()
}
