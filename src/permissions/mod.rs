//! Delegate permission checks and signed permission grants.

use crate::datasource::DataSourceError;
use crate::domain::{ChainId, Permission, PositionId};
use alloy::primitives::{Address, U256};
use alloy::sol_types::Eip712Domain;
use async_trait::async_trait;
use std::fmt;

pub mod authority;
pub mod mock;
pub mod rpc;
pub mod signer;
pub mod typed_data;

pub use authority::PermissionAuthority;
pub use mock::{MockPermissionRegistry, MockTypedDataSigner};
pub use rpc::RpcPermissionRegistry;
pub use signer::LocalTypedDataSigner;
pub use typed_data::{
    permit_domain, split_signature, PermissionPermit, PermissionSet, SplitSignature,
    DEFAULT_PERMIT_DOMAIN_NAME,
};

/// Remote permission registry of one protocol deployment.
#[async_trait]
pub trait PermissionRegistry: Send + Sync + fmt::Debug {
    async fn has_permission(
        &self,
        chain_id: ChainId,
        manager: Address,
        token_id: PositionId,
        operator: Address,
        permission: Permission,
    ) -> Result<bool, DataSourceError>;

    async fn has_permissions(
        &self,
        chain_id: ChainId,
        manager: Address,
        token_id: PositionId,
        operator: Address,
        permissions: &[Permission],
    ) -> Result<Vec<bool>, DataSourceError>;

    /// Replay-protection nonce of `signer`.
    async fn nonces(
        &self,
        chain_id: ChainId,
        manager: Address,
        signer: Address,
    ) -> Result<U256, DataSourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// The user refused to sign.
    Declined,
    Failed(String),
}

impl fmt::Display for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerError::Declined => write!(f, "Signature declined"),
            SignerError::Failed(msg) => write!(f, "Signing failed: {}", msg),
        }
    }
}

impl std::error::Error for SignerError {}

/// Structured-data signing primitive held by the position owner.
#[async_trait]
pub trait TypedDataSigner: Send + Sync + fmt::Debug {
    fn address(&self) -> Address;

    /// Returns a `0x`-prefixed 65-byte signature.
    async fn sign_permission_permit(
        &self,
        domain: &Eip712Domain,
        permit: &PermissionPermit,
    ) -> Result<String, SignerError>;
}

/// A signed authorization ready to be attached to a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    pub token_id: PositionId,
    pub operator: Address,
    /// Previously held capabilities plus the requested one, ascending.
    pub permissions: Vec<Permission>,
    pub nonce: U256,
    pub deadline: U256,
    pub signature: SplitSignature,
}
