//! Permission registry read through an alloy provider per chain.

use super::PermissionRegistry;
use crate::datasource::DataSourceError;
use crate::domain::{ChainId, Permission, PositionId};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IPermissionManager {
        function hasPermission(uint256 id, address account, uint8 permission) external view returns (bool);
        function hasPermissions(uint256 id, address account, uint8[] permissions) external view returns (bool[]);
        function nonces(address account) external view returns (uint256);
    }
}

#[derive(Clone)]
pub struct RpcPermissionRegistry {
    providers: HashMap<ChainId, DynProvider>,
}

impl fmt::Debug for RpcPermissionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chains: Vec<_> = self.providers.keys().collect();
        chains.sort();
        f.debug_struct("RpcPermissionRegistry")
            .field("chains", &chains)
            .finish()
    }
}

impl RpcPermissionRegistry {
    /// Connects one HTTP provider per chain. Fails on the first malformed URL.
    pub fn new(endpoints: HashMap<ChainId, String>) -> Result<Self, DataSourceError> {
        let mut providers = HashMap::with_capacity(endpoints.len());
        for (chain_id, endpoint) in endpoints {
            let rpc_url = endpoint.parse().map_err(|e| {
                DataSourceError::Other(format!("Invalid RPC URL for chain {}: {}", chain_id, e))
            })?;
            let provider = ProviderBuilder::new().connect_http(rpc_url).erased();
            providers.insert(chain_id, provider);
        }
        Ok(Self { providers })
    }

    fn manager(
        &self,
        chain_id: ChainId,
        manager: Address,
    ) -> Result<IPermissionManager::IPermissionManagerInstance<DynProvider>, DataSourceError> {
        let provider = self
            .providers
            .get(&chain_id)
            .ok_or_else(|| DataSourceError::Other(format!("No RPC endpoint for chain {}", chain_id)))?;
        debug!("permission manager call chain={} manager={}", chain_id, manager);
        Ok(IPermissionManager::new(manager, provider.clone()))
    }
}

fn contract_error(e: alloy::contract::Error) -> DataSourceError {
    match e {
        alloy::contract::Error::TransportError(e) => DataSourceError::NetworkError(e.to_string()),
        other => DataSourceError::ParseError(other.to_string()),
    }
}

#[async_trait]
impl PermissionRegistry for RpcPermissionRegistry {
    async fn has_permission(
        &self,
        chain_id: ChainId,
        manager: Address,
        token_id: PositionId,
        operator: Address,
        permission: Permission,
    ) -> Result<bool, DataSourceError> {
        self.manager(chain_id, manager)?
            .hasPermission(token_id.as_u256(), operator, permission.as_u8())
            .call()
            .await
            .map_err(contract_error)
    }

    async fn has_permissions(
        &self,
        chain_id: ChainId,
        manager: Address,
        token_id: PositionId,
        operator: Address,
        permissions: &[Permission],
    ) -> Result<Vec<bool>, DataSourceError> {
        let wanted = permissions.iter().map(|p| p.as_u8()).collect();
        self.manager(chain_id, manager)?
            .hasPermissions(token_id.as_u256(), operator, wanted)
            .call()
            .await
            .map_err(contract_error)
    }

    async fn nonces(
        &self,
        chain_id: ChainId,
        manager: Address,
        signer: Address,
    ) -> Result<U256, DataSourceError> {
        self.manager(chain_id, manager)?
            .nonces(signer)
            .call()
            .await
            .map_err(contract_error)
    }
}
