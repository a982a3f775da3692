use super::typed_data::{permit_domain, permit_message, split_signature};
use super::{PermissionGrant, PermissionRegistry, SignerError, TypedDataSigner};
use crate::domain::{AddressBook, Permission, Position};
use crate::error::EngineError;
use alloy::primitives::{Address, U256};
use chrono::Utc;
use futures::try_join;
use crate::datasource::DataSourceError;
use std::sync::Arc;
use tracing::{debug, info};

/// Default validity of a signed permit.
pub const DEFAULT_PERMIT_DEADLINE_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct PermissionAuthority {
    registry: Arc<dyn PermissionRegistry>,
    signer: Arc<dyn TypedDataSigner>,
    contracts: AddressBook,
    domain_name: String,
    deadline_secs: u64,
}

impl PermissionAuthority {
    pub fn new(
        registry: Arc<dyn PermissionRegistry>,
        signer: Arc<dyn TypedDataSigner>,
        contracts: AddressBook,
        domain_name: String,
    ) -> Self {
        Self {
            registry,
            signer,
            contracts,
            domain_name,
            deadline_secs: DEFAULT_PERMIT_DEADLINE_SECS,
        }
    }

    pub fn with_deadline_secs(mut self, deadline_secs: u64) -> Self {
        self.deadline_secs = deadline_secs;
        self
    }

    pub fn contracts(&self) -> &AddressBook {
        &self.contracts
    }

    /// Whether `operator` already holds `capability` over `position`.
    pub async fn has_capability(
        &self,
        position: &Position,
        operator: Address,
        capability: Permission,
    ) -> Result<bool, EngineError> {
        let token_id = position.onchain_id()?;
        let manager = self
            .contracts
            .get(position.chain_id, position.version())?
            .permission_manager;
        let held = self
            .registry
            .has_permission(position.chain_id, manager, token_id, operator, capability)
            .await?;
        debug!(
            "Operator {} {} {} on {}",
            operator,
            if held { "holds" } else { "lacks" },
            capability.as_str(),
            position.key
        );
        Ok(held)
    }

    /// Sign a permit giving `delegate` `capability` on top of whatever it holds.
    ///
    /// Registry failures propagate unchanged; a declined signature is
    /// [`EngineError::PermissionSignatureDeclined`].
    pub async fn build_permission_grant(
        &self,
        position: &Position,
        delegate: Address,
        capability: Permission,
        manager_override: Option<Address>,
        domain_override: Option<&str>,
    ) -> Result<PermissionGrant, EngineError> {
        let token_id = position.onchain_id()?;
        let chain_id = position.chain_id;
        let (manager, deployment_domain) = match manager_override {
            Some(manager) => (manager, None),
            None => {
                let contracts = self.contracts.get(chain_id, position.version())?;
                (
                    contracts.permission_manager,
                    contracts.permit_domain_name.clone(),
                )
            }
        };
        let domain_name = domain_override
            .map(str::to_string)
            .or(deployment_domain)
            .unwrap_or_else(|| self.domain_name.clone());

        let (held, nonce) = try_join!(
            self.registry
                .has_permissions(chain_id, manager, token_id, delegate, &Permission::ALL),
            self.registry.nonces(chain_id, manager, self.signer.address()),
        )?;
        if held.len() != Permission::ALL.len() {
            return Err(DataSourceError::ParseError(format!(
                "expected {} permission flags, got {}",
                Permission::ALL.len(),
                held.len()
            ))
            .into());
        }
        let permissions: Vec<Permission> = Permission::ALL
            .into_iter()
            .zip(held)
            .filter(|(permission, held)| *held || *permission == capability)
            .map(|(permission, _)| permission)
            .collect();

        let deadline = U256::from(now_secs().saturating_add(self.deadline_secs));

        let domain = permit_domain(&domain_name, chain_id, manager);
        let message = permit_message(delegate, &permissions, token_id, nonce, deadline);
        let signature = self
            .signer
            .sign_permission_permit(&domain, &message)
            .await
            .map_err(|e| match e {
                SignerError::Declined => EngineError::PermissionSignatureDeclined,
                SignerError::Failed(msg) => EngineError::Signing(msg),
            })?;

        info!(
            "Signed permit for {} on {}: {:?}",
            delegate, position.key, permissions
        );
        Ok(PermissionGrant {
            token_id,
            operator: delegate,
            permissions,
            nonce,
            deadline,
            signature: split_signature(&signature)?,
        })
    }
}

fn now_secs() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}
