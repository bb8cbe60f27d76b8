//! Forwarder nonce lookups.

use std::time::Duration;

use alloy_primitives::{Address, U256};

use crate::{context::RelayContext, errors::NonceError, ledger::{bounded, LedgerReader}};

pub const DEFAULT_NONCE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Fetches the next forwarder nonce of an account. Always a fresh remote read.
pub struct NonceSource<'a, L> {
    ledger: &'a L,
    default_timeout: Duration,
}

impl<'a, L: LedgerReader> NonceSource<'a, L> {
    pub fn new(ledger: &'a L, default_timeout: Duration) -> Self {
        Self {
            ledger,
            default_timeout,
        }
    }

    pub fn from_context(ctx: &'a RelayContext<L>) -> Self {
        Self::new(&ctx.ledger, ctx.config.read_timeout())
    }

    /// `timeout` overrides the default for this call only.
    pub async fn get_nonce(&self, account: Address, timeout: Option<Duration>) -> Result<U256, NonceError> {
        let limit = timeout.unwrap_or(self.default_timeout);
        match bounded("getNonce", limit, self.ledger.nonce_of(account)).await {
            Ok(nonce) => {
                tracing::debug!(%account, %nonce, "nonce fetched");
                Ok(nonce)
            }
            Err(reason) => {
                tracing::warn!(%account, error = %reason, "nonce unavailable");
                Err(NonceError::Unavailable { account, reason })
            }
        }
    }
}
