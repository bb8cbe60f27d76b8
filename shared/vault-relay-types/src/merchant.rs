use core::{convert::Infallible, fmt, str::FromStr};

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Fixed-width (32-byte) merchant identifier used as a ledger lookup key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerchantId(pub B256);

impl MerchantId {
    pub const ZERO: Self = Self(B256::ZERO);

    /// Derive an id from a human-readable name: UTF-8 bytes, right zero-padded
    /// (or truncated) to 32 bytes.
    pub fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let len = bytes.len().min(32);
        let mut buf = [0u8; 32];
        buf[..len].copy_from_slice(&bytes[..len]);
        Self(B256::from(buf))
    }

    /// Accept either a pre-formatted `0x` + 64 hex id or a name.
    pub fn parse(input: &str) -> Self {
        if is_formatted_id(input) {
            if let Ok(id) = input.parse::<B256>() {
                return Self(id);
            }
        }
        Self::from_name(input)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == B256::ZERO
    }
}

fn is_formatted_id(input: &str) -> bool {
    input.len() == 66
        && (input.starts_with("0x") || input.starts_with("0X"))
        && input[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

impl FromStr for MerchantId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for MerchantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<B256> for MerchantId {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<MerchantId> for B256 {
    fn from(value: MerchantId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_right_padded() {
        let id = MerchantId::from_name("coffee");
        assert_eq!(&id.0[..6], b"coffee");
        assert!(id.0[6..].iter().all(|b| *b == 0));
    }

    #[test]
    fn long_names_are_truncated() {
        let name = "a-merchant-name-that-is-longer-than-thirty-two-bytes";
        let id = MerchantId::from_name(name);
        assert_eq!(id.0.as_slice(), &name.as_bytes()[..32]);
    }

    #[test]
    fn formatted_ids_are_taken_verbatim() {
        let hex = format!("0x{}", "ab".repeat(32));
        let id = MerchantId::parse(&hex);
        assert_eq!(id.0, B256::repeat_byte(0xab));
        assert_eq!(id.to_string(), hex);
    }

    #[test]
    fn short_hex_is_treated_as_a_name() {
        let id = MerchantId::parse("0xabcd");
        assert_eq!(id, MerchantId::from_name("0xabcd"));
    }
}
