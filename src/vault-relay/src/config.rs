//! Engine configuration.
//!
//! Loaded once at startup and shared read-only (behind an `Arc`) by every component.

use std::{path::Path, time::Duration};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Deployment and timing parameters for one vault on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default = "defaults::rpc_url")]
    pub rpc_url: String,

    pub chain_id: u64,

    /// Consume vault; the `to` of every relayed request.
    pub vault: Address,

    /// Trusted forwarder; the EIP-712 verifying contract.
    pub forwarder: Address,

    #[serde(default = "defaults::domain_name")]
    pub domain_name: String,

    #[serde(default = "defaults::domain_version")]
    pub domain_version: String,

    /// Upper bound for each ledger read (nonce, tier, voucher, balances).
    #[serde(default = "defaults::read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Upper bound for handing a transaction to the node.
    #[serde(default = "defaults::submit_timeout_ms")]
    pub submit_timeout_ms: u64,

    /// How long to wait for a receipt before reporting the request as submitted.
    #[serde(default = "defaults::confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,

    #[serde(default = "defaults::default_gas")]
    pub default_gas: u64,

    /// Deadline offset applied when a request is prepared without one.
    #[serde(default = "defaults::request_ttl_secs")]
    pub request_ttl_secs: u64,

    /// Check `pay` sequence values against the vault's replay table.
    #[serde(default = "defaults::check_pay_seq")]
    pub check_pay_seq: bool,
}

impl VaultConfig {
    pub fn new(chain_id: u64, vault: Address, forwarder: Address) -> Self {
        Self {
            rpc_url: defaults::rpc_url(),
            chain_id,
            vault,
            forwarder,
            domain_name: defaults::domain_name(),
            domain_version: defaults::domain_version(),
            read_timeout_ms: defaults::read_timeout_ms(),
            submit_timeout_ms: defaults::submit_timeout_ms(),
            confirmation_timeout_ms: defaults::confirmation_timeout_ms(),
            default_gas: defaults::default_gas(),
            request_ttl_secs: defaults::request_ttl_secs(),
            check_pay_seq: defaults::check_pay_seq(),
        }
    }

    /// Load from an optional file (TOML/JSON/YAML by extension) overlaid with
    /// `VAULT_RELAY_*` environment variables.
    ///
    /// Without an explicit path, `./vault-relay.{toml,json,...}` is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder();
        let builder = match path {
            Some(p) => builder.add_source(config::File::from(p)),
            None => builder.add_source(config::File::with_name("vault-relay").required(false)),
        };
        builder
            .add_source(config::Environment::with_prefix("VAULT_RELAY").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }
}

mod defaults {
    use crate::nonce::DEFAULT_NONCE_TIMEOUT;

    pub fn rpc_url() -> String {
        "http://127.0.0.1:8545".into()
    }

    pub fn domain_name() -> String {
        "VaultForwarder".into()
    }

    pub fn domain_version() -> String {
        "1".into()
    }

    pub fn read_timeout_ms() -> u64 {
        DEFAULT_NONCE_TIMEOUT.as_millis() as u64
    }

    pub fn submit_timeout_ms() -> u64 {
        30_000
    }

    pub fn confirmation_timeout_ms() -> u64 {
        120_000
    }

    pub fn default_gas() -> u64 {
        500_000
    }

    pub fn request_ttl_secs() -> u64 {
        3_600
    }

    pub fn check_pay_seq() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_values_fill_in_defaults() {
        let dir = std::env::temp_dir().join(format!("vault-relay-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("relay.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
chain_id = 31337
vault = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
forwarder = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"
read_timeout_ms = 750
"#
        )
        .unwrap();

        let config = VaultConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.chain_id, 31337);
        assert_eq!(config.read_timeout(), Duration::from_millis(750));
        assert_eq!(config.domain_name, "VaultForwarder");
        assert_eq!(config.default_gas, 500_000);
        assert!(config.check_pay_seq);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn read_timeout_default_is_explicit() {
        let config = VaultConfig::new(1, Address::ZERO, Address::ZERO);
        assert_eq!(config.read_timeout(), Duration::from_millis(5_000));
    }
}
