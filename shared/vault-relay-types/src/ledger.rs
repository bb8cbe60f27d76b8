//! Read-only snapshots of ledger state.
//!
//! The engine never caches these beyond a single validation call.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{merchant::MerchantId, ser::decimal_u256};

/// Merchant-configured discount/reward bracket, addressed by `(merchantId, idx)`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoTier {
    #[serde(with = "decimal_u256")]
    pub min_amount: U256,
    /// Fraction of the amount actually charged, over the ledger's discount base.
    #[serde(with = "decimal_u256")]
    pub discount_rate: U256,
    #[serde(with = "decimal_u256")]
    pub voucher_amount: U256,
    #[serde(with = "decimal_u256")]
    pub point_amount: U256,
    /// Zero means unbounded.
    pub start_time: u64,
    /// Zero means unbounded.
    pub end_time: u64,
    pub voucher_expire_period: u64,
    pub enabled: bool,
}

/// Position of `now` relative to a tier's time bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TierWindow {
    NotStarted,
    Open,
    Ended,
}

impl PromoTier {
    pub fn window_at(&self, now: u64) -> TierWindow {
        if self.start_time != 0 && now < self.start_time {
            TierWindow::NotStarted
        } else if self.end_time != 0 && now > self.end_time {
            TierWindow::Ended
        } else {
            TierWindow::Open
        }
    }
}

/// Single-use, merchant- and token-scoped credit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub merchant_id: MerchantId,
    pub token: Address,
    #[serde(with = "decimal_u256")]
    pub amount: U256,
    pub used: bool,
    pub expire_at: u64,
}

impl Voucher {
    /// Unknown ids read back as the zero struct.
    pub fn exists(&self) -> bool {
        !self.merchant_id.is_zero()
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expire_at <= now
    }
}

/// Privileged addresses configured on the vault.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRoles {
    pub owner: Address,
    pub fee_receiver: Address,
    pub fee_rule_provider: Address,
    pub trusted_forwarder: Address,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bounds_are_open() {
        let tier = PromoTier::default();
        assert_eq!(tier.window_at(0), TierWindow::Open);
        assert_eq!(tier.window_at(u64::MAX), TierWindow::Open);
    }

    #[test]
    fn window_edges_are_inclusive() {
        let tier = PromoTier { start_time: 100, end_time: 200, ..Default::default() };
        assert_eq!(tier.window_at(99), TierWindow::NotStarted);
        assert_eq!(tier.window_at(100), TierWindow::Open);
        assert_eq!(tier.window_at(200), TierWindow::Open);
        assert_eq!(tier.window_at(201), TierWindow::Ended);
    }

    #[test]
    fn voucher_expires_at_its_timestamp() {
        let voucher = Voucher { expire_at: 50, ..Default::default() };
        assert!(!voucher.is_expired(49));
        assert!(voucher.is_expired(50));
        assert!(!voucher.exists());
    }
}
