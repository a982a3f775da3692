//! Local ABI encoding of protocol calls.

use super::{ContractCall, ContractProxy, UnsignedTx};
use crate::datasource::DataSourceError;
use crate::domain::{ChainId, PositionPermission};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;

sol! {
    struct PermissionSet {
        address operator;
        uint8[] permissions;
    }

    struct PositionPermissions {
        uint256 tokenId;
        PermissionSet[] permissionSets;
    }

    interface IDCAHub {
        function deposit(address from, address to, uint256 amount, uint32 amountOfSwaps, uint32 swapInterval, address owner, PermissionSet[] permissions) external returns (uint256);
        function increasePosition(uint256 positionId, uint256 amount, uint32 newSwaps) external;
        function reducePosition(uint256 positionId, uint256 amount, uint32 newSwaps, address recipient) external;
        function withdrawSwapped(uint256 positionId, address recipient) external returns (uint256);
        function terminate(uint256 positionId, address recipientUnswapped, address recipientSwapped) external returns (uint256, uint256);
    }

    interface IDCAHubCompanion {
        function terminate(address hub, uint256 positionId, address recipientUnswapped, address recipientSwapped) external returns (uint256, uint256);
        function multicall(bytes[] data) external returns (bytes[]);
    }

    interface IDCAPermissionManager {
        function modifyMany(PositionPermissions[] permissions) external;
    }
}

/// Encodes calls in-process; never touches the network.
#[derive(Debug, Clone, Default)]
pub struct AbiContractProxy;

impl AbiContractProxy {
    pub fn new() -> Self {
        Self
    }
}

fn to_u32(value: u64, field: &str) -> Result<u32, DataSourceError> {
    u32::try_from(value)
        .map_err(|_| DataSourceError::Other(format!("{} {} does not fit uint32", field, value)))
}

fn permission_sets(permissions: &[PositionPermission]) -> Vec<PermissionSet> {
    permissions
        .iter()
        .map(|p| PermissionSet {
            operator: p.operator,
            permissions: p.permissions.iter().map(|x| x.as_u8()).collect(),
        })
        .collect()
}

/// Calldata for `call`.
pub fn encode_call(call: &ContractCall) -> Result<Vec<u8>, DataSourceError> {
    let data = match call {
        ContractCall::Deposit {
            from,
            to,
            amount,
            swaps,
            swap_interval,
            owner,
            permissions,
        } => IDCAHub::depositCall {
            from: *from,
            to: *to,
            amount: *amount,
            amountOfSwaps: to_u32(*swaps, "swaps")?,
            swapInterval: to_u32(*swap_interval, "swap interval")?,
            owner: *owner,
            permissions: permission_sets(permissions),
        }
        .abi_encode(),
        ContractCall::IncreasePosition {
            position_id,
            amount,
            new_swaps,
        } => IDCAHub::increasePositionCall {
            positionId: position_id.as_u256(),
            amount: *amount,
            newSwaps: to_u32(*new_swaps, "swaps")?,
        }
        .abi_encode(),
        ContractCall::ReducePosition {
            position_id,
            amount,
            new_swaps,
            recipient,
        } => IDCAHub::reducePositionCall {
            positionId: position_id.as_u256(),
            amount: *amount,
            newSwaps: to_u32(*new_swaps, "swaps")?,
            recipient: *recipient,
        }
        .abi_encode(),
        ContractCall::Withdraw {
            position_id,
            recipient,
        } => IDCAHub::withdrawSwappedCall {
            positionId: position_id.as_u256(),
            recipient: *recipient,
        }
        .abi_encode(),
        ContractCall::Terminate {
            position_id,
            recipient,
        } => IDCAHub::terminateCall {
            positionId: position_id.as_u256(),
            recipientUnswapped: *recipient,
            recipientSwapped: *recipient,
        }
        .abi_encode(),
        ContractCall::TerminateMany {
            hub,
            position_ids,
            recipient,
        } => {
            let data = position_ids
                .iter()
                .map(|id| {
                    Bytes::from(
                        IDCAHubCompanion::terminateCall {
                            hub: *hub,
                            positionId: id.as_u256(),
                            recipientUnswapped: *recipient,
                            recipientSwapped: *recipient,
                        }
                        .abi_encode(),
                    )
                })
                .collect();
            IDCAHubCompanion::multicallCall { data }.abi_encode()
        }
        ContractCall::ModifyPermissionsMany {
            position_ids,
            permissions,
        } => {
            let sets = permission_sets(permissions);
            IDCAPermissionManager::modifyManyCall {
                permissions: position_ids
                    .iter()
                    .map(|id| PositionPermissions {
                        tokenId: id.as_u256(),
                        permissionSets: sets.clone(),
                    })
                    .collect(),
            }
            .abi_encode()
        }
    };
    Ok(data)
}

#[async_trait]
impl ContractProxy for AbiContractProxy {
    async fn populate(
        &self,
        chain_id: ChainId,
        target: Address,
        call: &ContractCall,
    ) -> Result<UnsignedTx, DataSourceError> {
        Ok(UnsignedTx {
            chain_id,
            to: target,
            data: Bytes::from(encode_call(call)?),
            value: U256::ZERO,
        })
    }
}
