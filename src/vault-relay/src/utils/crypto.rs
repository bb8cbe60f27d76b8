//! secp256k1 helpers: key-to-address derivation and signer recovery.

use alloy_primitives::{Address, B256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverError {
    /// Signature is not 65 bytes.
    Length(usize),
    /// `r`/`s` are not valid scalars.
    Malformed,
    /// No recovery id produced a public key.
    NoMatch,
}

/// EOA address of a public key: low 20 bytes of keccak256 over the uncompressed point.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Recover the EOA that signed a 32-byte digest from an `r || s || v` signature.
///
/// Notes:
/// - v is accepted in {0,1,27,28}. If v is not recognised, we try both parities.
/// - The first recovery id that yields a key wins.
pub fn recover_signer(digest: B256, sig: &[u8]) -> Result<Address, RecoverError> {
    if sig.len() != 65 {
        return Err(RecoverError::Length(sig.len()));
    }
    let signature = Signature::from_slice(&sig[..64]).map_err(|_| RecoverError::Malformed)?;

    let candidates: &[u8] = match sig[64] {
        0 | 27 => &[0],
        1 | 28 => &[1],
        _ => &[0, 1],
    };

    for parity in candidates {
        let Some(recovery_id) = RecoveryId::from_byte(*parity) else {
            continue;
        };
        if let Ok(key) = VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recovery_id) {
            return Ok(address_of(&key));
        }
    }

    Err(RecoverError::NoMatch)
}
