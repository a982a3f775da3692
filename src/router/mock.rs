//! Recording proxy and backend builder for tests.

use super::{BackendTxBuilder, BackendTxRequest, ContractCall, ContractProxy, UnsignedTx};
use crate::datasource::DataSourceError;
use crate::domain::ChainId;
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct MockContractProxy {
    calls: Arc<AtomicUsize>,
    populated: Arc<Mutex<Vec<(Address, ContractCall)>>>,
}

impl MockContractProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// (target, call) pairs in the order received.
    pub fn populated(&self) -> Vec<(Address, ContractCall)> {
        self.populated
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ContractProxy for MockContractProxy {
    async fn populate(
        &self,
        chain_id: ChainId,
        target: Address,
        call: &ContractCall,
    ) -> Result<UnsignedTx, DataSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut populated) = self.populated.lock() {
            populated.push((target, call.clone()));
        }
        Ok(UnsignedTx {
            chain_id,
            to: target,
            data: Bytes::from(call.action().as_bytes().to_vec()),
            value: U256::ZERO,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockBackendTxBuilder {
    failure: Option<DataSourceError>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<BackendTxRequest>>>,
}

impl MockBackendTxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, error: DataSourceError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<BackendTxRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BackendTxBuilder for MockBackendTxBuilder {
    async fn build(&self, request: &BackendTxRequest) -> Result<UnsignedTx, DataSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(UnsignedTx {
            chain_id: request.chain_id,
            to: request.companion,
            data: Bytes::from(request.call.action().as_bytes().to_vec()),
            value: U256::ZERO,
        })
    }
}
