use super::{PermissionPermit, SignerError, TypedDataSigner};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use alloy::sol_types::{Eip712Domain, SolStruct};
use async_trait::async_trait;
use std::fmt;

/// Signs permits with an in-process private key.
#[derive(Clone)]
pub struct LocalTypedDataSigner {
    inner: PrivateKeySigner,
}

impl LocalTypedDataSigner {
    pub fn new(inner: PrivateKeySigner) -> Self {
        Self { inner }
    }

    pub fn from_private_key(private_key: &str) -> Result<Self, SignerError> {
        private_key
            .trim_start_matches("0x")
            .parse::<PrivateKeySigner>()
            .map(Self::new)
            .map_err(|e| SignerError::Failed(format!("Invalid private key: {}", e)))
    }

    pub fn random() -> Self {
        Self::new(PrivateKeySigner::random())
    }
}

impl fmt::Debug for LocalTypedDataSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTypedDataSigner")
            .field("address", &self.inner.address())
            .finish()
    }
}

#[async_trait]
impl TypedDataSigner for LocalTypedDataSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn sign_permission_permit(
        &self,
        domain: &Eip712Domain,
        permit: &PermissionPermit,
    ) -> Result<String, SignerError> {
        let hash = permit.eip712_signing_hash(domain);
        let signature = self
            .inner
            .sign_hash(&hash)
            .await
            .map_err(|e| SignerError::Failed(e.to_string()))?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }
}
