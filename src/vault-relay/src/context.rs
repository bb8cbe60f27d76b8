//! Shared per-deployment context handed to every operation by reference.

use std::{future::Future, sync::Arc};

use time::OffsetDateTime;

use crate::{
    config::VaultConfig,
    errors::{LedgerError, RelayError},
    ledger::{bounded, LedgerReader},
    typed_data::TypedDataCodec,
};
use vault_relay_types::LedgerRoles;

/// Source of "now" in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        OffsetDateTime::now_utc().unix_timestamp().max(0) as u64
    }
}

/// Frozen clock for deterministic validation (tests, replays).
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

/// Immutable configuration plus the ledger collaborator and a clock.
pub struct RelayContext<L> {
    pub config: Arc<VaultConfig>,
    pub ledger: L,
    clock: Arc<dyn Clock>,
}

impl<L> RelayContext<L> {
    pub fn new(config: impl Into<Arc<VaultConfig>>, ledger: L) -> Self {
        Self {
            config: config.into(),
            ledger,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn codec(&self) -> TypedDataCodec {
        TypedDataCodec::from_config(&self.config)
    }

    /// Run one ledger read under the configured read timeout.
    pub async fn read<T, F>(&self, call: &'static str, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        bounded(call, self.config.read_timeout(), fut).await
    }
}

impl<L: LedgerReader> RelayContext<L> {
    /// Read the vault's privileged addresses and check that it trusts the
    /// configured forwarder.
    pub async fn preflight(&self) -> Result<LedgerRoles, RelayError> {
        let roles = self.read("roles", self.ledger.roles()).await?;
        if roles.trusted_forwarder != self.config.forwarder {
            return Err(RelayError::ForwarderMismatch {
                configured: self.config.forwarder,
                on_ledger: roles.trusted_forwarder,
            });
        }
        tracing::info!(
            owner = %roles.owner,
            fee_receiver = %roles.fee_receiver,
            fee_rule_provider = %roles.fee_rule_provider,
            forwarder = %roles.trusted_forwarder,
            "vault roles verified"
        );
        Ok(roles)
    }
}
