//! In-memory registry and signer for tests.

use super::{PermissionPermit, PermissionRegistry, SignerError, TypedDataSigner};
use crate::datasource::DataSourceError;
use crate::domain::{ChainId, Permission, PositionId};
use alloy::primitives::{Address, U256};
use alloy::sol_types::Eip712Domain;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct MockPermissionRegistry {
    held: HashMap<(PositionId, Address), Vec<Permission>>,
    nonce: U256,
    failure: Option<DataSourceError>,
    calls: Arc<AtomicUsize>,
}

impl MockPermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_permission(
        mut self,
        token_id: impl Into<PositionId>,
        operator: Address,
        permission: Permission,
    ) -> Self {
        self.held
            .entry((token_id.into(), operator))
            .or_default()
            .push(permission);
        self
    }

    pub fn with_nonce(mut self, nonce: U256) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn failing(mut self, error: DataSourceError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Total remote reads served (permission checks and nonces).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn holds(&self, token_id: PositionId, operator: Address, permission: Permission) -> bool {
        self.held
            .get(&(token_id, operator))
            .map(|held| held.contains(&permission))
            .unwrap_or(false)
    }

    fn record_call(&self) -> Result<(), DataSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PermissionRegistry for MockPermissionRegistry {
    async fn has_permission(
        &self,
        _chain_id: ChainId,
        _manager: Address,
        token_id: PositionId,
        operator: Address,
        permission: Permission,
    ) -> Result<bool, DataSourceError> {
        self.record_call()?;
        Ok(self.holds(token_id, operator, permission))
    }

    async fn has_permissions(
        &self,
        _chain_id: ChainId,
        _manager: Address,
        token_id: PositionId,
        operator: Address,
        permissions: &[Permission],
    ) -> Result<Vec<bool>, DataSourceError> {
        self.record_call()?;
        Ok(permissions
            .iter()
            .map(|p| self.holds(token_id, operator, *p))
            .collect())
    }

    async fn nonces(
        &self,
        _chain_id: ChainId,
        _manager: Address,
        _signer: Address,
    ) -> Result<U256, DataSourceError> {
        self.record_call()?;
        Ok(self.nonce)
    }
}

/// Signer returning a fixed signature (`r = 0x11..`, `s = 0x22..`, `v = 27`).
#[derive(Debug, Clone)]
pub struct MockTypedDataSigner {
    address: Address,
    outcome: Option<SignerError>,
    calls: Arc<AtomicUsize>,
    signed: Arc<Mutex<Vec<(Eip712Domain, PermissionPermit)>>>,
}

impl MockTypedDataSigner {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            outcome: None,
            calls: Arc::new(AtomicUsize::new(0)),
            signed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Simulate the user rejecting the signature prompt.
    pub fn declining(mut self) -> Self {
        self.outcome = Some(SignerError::Declined);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every (domain, permit) pair presented for signing.
    pub fn signed(&self) -> Vec<(Eip712Domain, PermissionPermit)> {
        self.signed
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TypedDataSigner for MockTypedDataSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_permission_permit(
        &self,
        domain: &Eip712Domain,
        permit: &PermissionPermit,
    ) -> Result<String, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut signed) = self.signed.lock() {
            signed.push((domain.clone(), permit.clone()));
        }
        if let Some(err) = &self.outcome {
            return Err(err.clone());
        }
        Ok(format!("0x{}{}1b", "11".repeat(32), "22".repeat(32)))
    }
}
