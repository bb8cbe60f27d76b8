//! EIP-712 domain separation and `ForwardRequest` hashing, signing and verification.
//!
//! The encoding is written out word by word so that the field order, which the
//! forwarder re-derives on-chain, is visible in one place.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use serde::Serialize;
use vault_relay_types::ForwardRequest;

use crate::{
    config::VaultConfig, errors::SignerError, signer::RequestSigner, utils::crypto::recover_signer,
};

pub const DOMAIN_TYPE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

pub const FORWARD_REQUEST_TYPE: &[u8] = b"ForwardRequest(address from,address to,uint256 value,uint256 gas,uint256 nonce,uint256 deadline,bytes data)";

/// Outcome of a signature check; never an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub valid: bool,
    /// Recovered signer, or the zero address when recovery failed.
    pub signer: Address,
}

/// Typed-data codec bound to one forwarder domain (name, version, verifying contract).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedDataCodec {
    name: String,
    version: String,
    verifying_contract: Address,
}

impl TypedDataCodec {
    pub fn new(name: impl Into<String>, version: impl Into<String>, verifying_contract: Address) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            verifying_contract,
        }
    }

    pub fn from_config(config: &VaultConfig) -> Self {
        Self::new(&config.domain_name, &config.domain_version, config.forwarder)
    }

    pub fn verifying_contract(&self) -> Address {
        self.verifying_contract
    }

    /// Domain separator for `chain_id`. Recomputed on every call.
    pub fn domain_hash(&self, chain_id: u64) -> B256 {
        let mut buf = Vec::with_capacity(32 * 5);
        buf.extend_from_slice(keccak256(DOMAIN_TYPE).as_slice());
        buf.extend_from_slice(keccak256(self.name.as_bytes()).as_slice());
        buf.extend_from_slice(keccak256(self.version.as_bytes()).as_slice());
        buf.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
        buf.extend_from_slice(&address_word(self.verifying_contract));
        keccak256(buf)
    }

    /// `hashStruct(ForwardRequest)`; words follow the declared field order.
    pub fn struct_hash(request: &ForwardRequest) -> B256 {
        let mut buf = Vec::with_capacity(32 * 8);
        buf.extend_from_slice(keccak256(FORWARD_REQUEST_TYPE).as_slice());
        buf.extend_from_slice(&address_word(request.from));
        buf.extend_from_slice(&address_word(request.to));
        buf.extend_from_slice(&request.value.to_be_bytes::<32>());
        buf.extend_from_slice(&request.gas.to_be_bytes::<32>());
        buf.extend_from_slice(&request.nonce.to_be_bytes::<32>());
        buf.extend_from_slice(&U256::from(request.deadline).to_be_bytes::<32>());
        // Dynamic `bytes` are hashed in place.
        buf.extend_from_slice(keccak256(&request.data).as_slice());
        keccak256(buf)
    }

    /// keccak256("\x19\x01" || domainSeparator || structHash)
    pub fn digest(&self, chain_id: u64, request: &ForwardRequest) -> B256 {
        let mut buf = Vec::with_capacity(2 + 32 + 32);
        buf.extend_from_slice(b"\x19\x01");
        buf.extend_from_slice(self.domain_hash(chain_id).as_slice());
        buf.extend_from_slice(Self::struct_hash(request).as_slice());
        keccak256(buf)
    }

    /// Sign `request` for `chain_id` with a borrowed signer.
    pub async fn sign(
        &self,
        request: &ForwardRequest,
        chain_id: u64,
        signer: &dyn RequestSigner,
    ) -> Result<Bytes, SignerError> {
        let digest = self.digest(chain_id, request);
        let signature = signer.sign_digest(digest).await?;
        Ok(Bytes::copy_from_slice(&signature))
    }

    /// Recover the signer of `request` and compare it with `expected`.
    ///
    /// Addresses are compared as bytes, so hex casing of the inputs is irrelevant.
    pub fn verify(
        &self,
        chain_id: u64,
        request: &ForwardRequest,
        signature: &[u8],
        expected: Address,
    ) -> Verification {
        let digest = self.digest(chain_id, request);
        match recover_signer(digest, signature) {
            Ok(signer) => Verification {
                valid: signer == expected,
                signer,
            },
            Err(_) => Verification {
                valid: false,
                signer: Address::ZERO,
            },
        }
    }
}

fn address_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}
