//! EIP-712 payload of a permission permit and signature splitting.

use crate::domain::{ChainId, Permission, PositionId};
use crate::error::EngineError;
use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use alloy::sol_types::Eip712Domain;
use std::borrow::Cow;

/// Domain name used by every current deployment.
pub const DEFAULT_PERMIT_DOMAIN_NAME: &str = "Mean Finance - DCA Position";
pub const PERMIT_DOMAIN_VERSION: &str = "1";

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct PermissionSet {
        address operator;
        uint8[] permissions;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct PermissionPermit {
        PermissionSet[] permissions;
        uint256 tokenId;
        uint256 nonce;
        uint256 deadline;
    }
}

/// Signing domain bound to the permission manager of one chain.
pub fn permit_domain(name: &str, chain_id: ChainId, permission_manager: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some(Cow::Owned(name.to_string())),
        Some(Cow::Borrowed(PERMIT_DOMAIN_VERSION)),
        Some(U256::from(chain_id.as_u64())),
        Some(permission_manager),
        None,
    )
}

pub fn permit_message(
    operator: Address,
    permissions: &[Permission],
    token_id: PositionId,
    nonce: U256,
    deadline: U256,
) -> PermissionPermit {
    PermissionPermit {
        permissions: vec![PermissionSet {
            operator,
            permissions: permissions.iter().map(|p| p.as_u8()).collect(),
        }],
        tokenId: token_id.as_u256(),
        nonce,
        deadline,
    }
}

/// `(v, r, s)` form of a 65-byte signature, as the contracts take it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSignature {
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

/// Split a `0x`-prefixed hex signature. `v` is normalized to 27/28.
pub fn split_signature(signature: &str) -> Result<SplitSignature, EngineError> {
    let raw = hex::decode(signature.trim_start_matches("0x"))
        .map_err(|e| EngineError::Signing(format!("signature is not hex: {}", e)))?;
    if raw.len() != 65 {
        return Err(EngineError::Signing(format!(
            "signature must be 65 bytes, got {}",
            raw.len()
        )));
    }

    let v = raw[64];
    Ok(SplitSignature {
        v: if v < 27 { v + 27 } else { v },
        r: B256::from_slice(&raw[..32]),
        s: B256::from_slice(&raw[32..64]),
    })
}
