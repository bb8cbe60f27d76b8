//! Signing seam.
//!
//! The engine borrows a [`RequestSigner`] for the duration of one sign call and never
//! holds key material itself; wallets, HSMs and browser bridges implement the trait.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;

use crate::{errors::SignerError, utils::crypto::address_of};

#[async_trait]
pub trait RequestSigner: Send + Sync {
    /// Account whose key backs this signer.
    fn address(&self) -> Address;

    /// Sign a 32-byte typed-data digest, returning `r || s || v` with v in {27, 28}.
    async fn sign_digest(&self, digest: B256) -> Result<[u8; 65], SignerError>;
}

/// In-process secp256k1 key, for operator tooling and tests.
pub struct LocalKeySigner {
    key: SigningKey,
    address: Address,
}

impl LocalKeySigner {
    pub fn new(key: SigningKey) -> Self {
        let address = address_of(key.verifying_key());
        Self { key, address }
    }

    /// Parse a 32-byte hex private key (with or without `0x`).
    pub fn from_hex(raw: &str) -> Result<Self, SignerError> {
        let trimmed = raw.trim();
        let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(stripped).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        let key = SigningKey::from_slice(&bytes).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self::new(key))
    }
}

#[async_trait]
impl RequestSigner for LocalKeySigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_digest(&self, digest: B256) -> Result<[u8; 65], SignerError> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| SignerError::Signing(e.to_string()))?;

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = 27 + recovery_id.to_byte();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, keccak256};

    use crate::utils::crypto::recover_signer;

    #[test]
    fn parses_prefixed_and_bare_keys() {
        let expected = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let prefixed = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        assert_eq!(LocalKeySigner::from_hex(prefixed).unwrap().address(), expected);
        assert_eq!(LocalKeySigner::from_hex(&prefixed[2..]).unwrap().address(), expected);
    }

    #[test]
    fn rejects_garbage_keys() {
        assert!(matches!(LocalKeySigner::from_hex("0x1234"), Err(SignerError::InvalidKey(_))));
        assert!(matches!(LocalKeySigner::from_hex("not hex"), Err(SignerError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn signature_uses_27_28_and_recovers() {
        let signer = LocalKeySigner::from_hex(
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        let digest = keccak256(b"forward");
        let sig = signer.sign_digest(digest).await.unwrap();
        assert!(sig[64] == 27 || sig[64] == 28);
        assert_eq!(recover_signer(digest, &sig).unwrap(), signer.address());
    }
}
