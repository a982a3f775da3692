//! Deployed contract addresses per chain and protocol version.

use super::{ChainId, PositionVersion};
use crate::error::EngineError;
use alloy::primitives::Address;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolContracts {
    /// Core DCA contract.
    pub hub: Address,
    /// Permission registry; also the EIP-712 verifying contract.
    pub permission_manager: Address,
    /// Delegate relay that performs wrap/unwrap and native-asset steps.
    pub companion: Address,
    /// Signing domain name for versions that predate the current one.
    pub permit_domain_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    entries: HashMap<(ChainId, PositionVersion), ProtocolContracts>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        chain_id: ChainId,
        version: PositionVersion,
        contracts: ProtocolContracts,
    ) -> Self {
        self.entries.insert((chain_id, version), contracts);
        self
    }

    pub fn get(
        &self,
        chain_id: ChainId,
        version: PositionVersion,
    ) -> Result<&ProtocolContracts, EngineError> {
        self.entries
            .get(&(chain_id, version))
            .ok_or(EngineError::MissingContracts { chain_id, version })
    }
}
