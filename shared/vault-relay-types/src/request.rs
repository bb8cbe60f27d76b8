use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::ser::{decimal_u256, decimal_u64};

/// Meta-transaction request as hashed and executed by the trusted forwarder.
///
/// Field order mirrors the `ForwardRequest` typed-data struct; it is part of the
/// signing contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRequest {
    /// Signer on whose behalf the call is executed.
    pub from: Address,
    /// Target contract (the vault).
    pub to: Address,
    #[serde(with = "decimal_u256")]
    pub value: U256,
    /// Gas forwarded to the inner call.
    #[serde(with = "decimal_u256")]
    pub gas: U256,
    /// Forwarder sequence number of `from`; consumed on execution.
    #[serde(with = "decimal_u256")]
    pub nonce: U256,
    /// Unix timestamp (seconds) after which the request is void.
    #[serde(with = "decimal_u64")]
    pub deadline: u64,
    /// Vault call data (selector + ABI arguments).
    pub data: Bytes,
}

impl ForwardRequest {
    /// `true` once `now` reaches the deadline.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.deadline
    }
}

/// JSON envelope exchanged between the signer side and the relayer.
///
/// Any change to the embedded request after signing invalidates `signature`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayedRequestData {
    #[serde(flatten)]
    pub request: ForwardRequest,
    /// 65-byte `r || s || v` signature over the typed-data digest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Bytes>,
}

impl RelayedRequestData {
    pub fn unsigned(request: ForwardRequest) -> Self {
        Self { request, signature: None }
    }

    pub fn signed(request: ForwardRequest, signature: Bytes) -> Self {
        Self { request, signature: Some(signature) }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn sample() -> ForwardRequest {
        ForwardRequest {
            from: address!("00000000000000000000000000000000000000a1"),
            to: address!("00000000000000000000000000000000000000b2"),
            value: U256::ZERO,
            // Larger than 2^53 on purpose.
            gas: U256::from(18_014_398_509_481_985u64),
            nonce: U256::from(7u64),
            deadline: 1_900_000_000,
            data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
        }
    }

    #[test]
    fn numbers_are_decimal_strings() {
        let json = serde_json::to_value(RelayedRequestData::unsigned(sample())).unwrap();
        assert_eq!(json["gas"], "18014398509481985");
        assert_eq!(json["nonce"], "7");
        assert_eq!(json["deadline"], "1900000000");
        assert_eq!(json["data"], "0xdeadbeef");
        assert!(json.get("signature").is_none());
    }

    #[test]
    fn envelope_parses_from_relay_json() {
        let raw = r#"{
            "from": "0x00000000000000000000000000000000000000A1",
            "to": "0x00000000000000000000000000000000000000b2",
            "value": "0",
            "gas": "18014398509481985",
            "nonce": "7",
            "deadline": "1900000000",
            "data": "0xdeadbeef",
            "signature": "0x0102"
        }"#;
        let parsed: RelayedRequestData = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.request, sample());
        assert_eq!(parsed.signature, Some(Bytes::from(vec![1u8, 2])));
    }

    #[test]
    fn rejects_non_decimal_numbers() {
        let raw = r#"{
            "from": "0x00000000000000000000000000000000000000a1",
            "to": "0x00000000000000000000000000000000000000b2",
            "value": "0",
            "gas": "lots",
            "nonce": "7",
            "deadline": "1900000000",
            "data": "0x"
        }"#;
        assert!(serde_json::from_str::<RelayedRequestData>(raw).is_err());
    }

    #[test]
    fn expiry_is_inclusive_of_deadline() {
        let req = sample();
        assert!(!req.is_expired(req.deadline - 1));
        assert!(req.is_expired(req.deadline));
    }
}
