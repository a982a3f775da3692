//! Unsigned transaction construction for position operations.
//!
//! Plain operations are populated directly against the core contract. Anything
//! involving the native asset or a yield-bearing side goes through the backend,
//! which encodes the wrap/convert steps run by the companion contract.

use crate::datasource::DataSourceError;
use crate::domain::{ChainId, PositionId, PositionPermission};
use crate::permissions::PermissionGrant;
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use std::fmt;

pub mod abi;
pub mod backend;
pub mod mock;
pub mod transaction_router;

pub use abi::AbiContractProxy;
pub use backend::HttpBackendTxBuilder;
pub use mock::{MockBackendTxBuilder, MockContractProxy};
pub use transaction_router::{
    classify_adjustment, Adjustment, AdjustmentDirection, OperationParams, TransactionRouter,
};

/// A protocol call before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    Deposit {
        from: Address,
        to: Address,
        amount: U256,
        swaps: u64,
        swap_interval: u64,
        owner: Address,
        permissions: Vec<PositionPermission>,
    },
    IncreasePosition {
        position_id: PositionId,
        amount: U256,
        new_swaps: u64,
    },
    ReducePosition {
        position_id: PositionId,
        amount: U256,
        new_swaps: u64,
        recipient: Address,
    },
    Withdraw {
        position_id: PositionId,
        recipient: Address,
    },
    Terminate {
        position_id: PositionId,
        recipient: Address,
    },
    /// Batched through the companion, which needs terminate rights on every id.
    TerminateMany {
        hub: Address,
        position_ids: Vec<PositionId>,
        recipient: Address,
    },
    ModifyPermissionsMany {
        position_ids: Vec<PositionId>,
        permissions: Vec<PositionPermission>,
    },
}

impl ContractCall {
    /// Backend action path segment.
    pub fn action(&self) -> &'static str {
        match self {
            ContractCall::Deposit { .. } => "deposit",
            ContractCall::IncreasePosition { .. } => "increase-position",
            ContractCall::ReducePosition { .. } => "reduce-position",
            ContractCall::Withdraw { .. } => "withdraw",
            ContractCall::Terminate { .. } => "terminate",
            ContractCall::TerminateMany { .. } => "terminate-many",
            ContractCall::ModifyPermissionsMany { .. } => "modify-permissions",
        }
    }
}

/// Transaction ready for the wallet to sign and broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTx {
    pub chain_id: ChainId,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// Populates a call against a deployed contract.
#[async_trait]
pub trait ContractProxy: Send + Sync + fmt::Debug {
    async fn populate(
        &self,
        chain_id: ChainId,
        target: Address,
        call: &ContractCall,
    ) -> Result<UnsignedTx, DataSourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTxRequest {
    pub chain_id: ChainId,
    pub companion: Address,
    pub call: ContractCall,
    /// Wrap or unwrap the native asset along the way.
    pub use_native: bool,
    pub permits: Vec<PermissionGrant>,
}

/// Backend API that builds companion transactions.
#[async_trait]
pub trait BackendTxBuilder: Send + Sync + fmt::Debug {
    async fn build(&self, request: &BackendTxRequest) -> Result<UnsignedTx, DataSourceError>;
}
