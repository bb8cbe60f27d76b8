//! Off-chain re-derivation of what the vault computes for a relayed call.
//!
//! Consumption follows the vault's own check order and short-circuits at the first
//! failing precondition. Nothing here writes to the ledger; results are advisory and
//! every input is re-read for each validation.

use alloy_primitives::{Address, U256};
use serde::Serialize;
use vault_relay_types::{
    ser::option_decimal_u256, ConsumeParams, OperationCall, PaymentParams, PromoTier, TierWindow,
    VaultTransferParams,
};

use crate::{
    context::RelayContext,
    errors::{LedgerError, Precondition},
    ledger::LedgerReader,
};

/// Predicted outcome of a vault call. Amount fields are only set on success.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "option_decimal_u256", skip_serializing_if = "Option::is_none")]
    pub fee: Option<U256>,
    #[serde(with = "option_decimal_u256", skip_serializing_if = "Option::is_none")]
    pub to_amount: Option<U256>,
    #[serde(with = "option_decimal_u256", skip_serializing_if = "Option::is_none")]
    pub reward_amount: Option<U256>,
    #[serde(with = "option_decimal_u256", skip_serializing_if = "Option::is_none")]
    pub merchant_amount: Option<U256>,
    #[serde(with = "option_decimal_u256", skip_serializing_if = "Option::is_none")]
    pub voucher_reward: Option<U256>,
    #[serde(with = "option_decimal_u256", skip_serializing_if = "Option::is_none")]
    pub discounted_amount: Option<U256>,
    #[serde(with = "option_decimal_u256", skip_serializing_if = "Option::is_none")]
    pub points_used: Option<U256>,
    #[serde(with = "option_decimal_u256", skip_serializing_if = "Option::is_none")]
    pub voucher_used: Option<U256>,
    #[serde(with = "option_decimal_u256", skip_serializing_if = "Option::is_none")]
    pub spend_amount: Option<U256>,
    /// Expiry of the voucher the vault would mint, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher_expire_at: Option<u64>,
    #[serde(skip)]
    pub rejection: Option<Precondition>,
}

impl ValidationResult {
    pub fn rejected(reason: Precondition) -> Self {
        Self {
            success: false,
            error: Some(reason.to_string()),
            rejection: Some(reason),
            ..Default::default()
        }
    }

    /// Payment and vault transfers move `amount` unchanged.
    fn transfer(amount: U256) -> Self {
        Self {
            success: true,
            to_amount: Some(amount),
            spend_amount: Some(amount),
            ..Default::default()
        }
    }
}

/// Why a check sequence stopped early.
enum Halt {
    Reject(Precondition),
    Ledger(LedgerError),
}

impl From<Precondition> for Halt {
    fn from(p: Precondition) -> Self {
        Halt::Reject(p)
    }
}

impl From<LedgerError> for Halt {
    fn from(e: LedgerError) -> Self {
        Halt::Ledger(e)
    }
}

fn settle(outcome: Result<ValidationResult, Halt>) -> Result<ValidationResult, LedgerError> {
    match outcome {
        Ok(result) => Ok(result),
        Err(Halt::Reject(reason)) => {
            tracing::warn!(%reason, "validation rejected");
            Ok(ValidationResult::rejected(reason))
        }
        Err(Halt::Ledger(e)) => Err(e),
    }
}

fn ensure(condition: bool, reason: Precondition) -> Result<(), Halt> {
    if condition {
        Ok(())
    } else {
        Err(Halt::Reject(reason))
    }
}

/// `value * numerator / base`, truncating. `base` is non-zero.
fn scale(value: U256, numerator: U256, base: U256, what: &'static str) -> Result<U256, Halt> {
    value
        .checked_mul(numerator)
        .map(|product| product / base)
        .ok_or(Halt::Reject(Precondition::ArithmeticOverflow(what)))
}

pub struct EconomicValidator<'a, L> {
    ctx: &'a RelayContext<L>,
}

impl<'a, L: LedgerReader> EconomicValidator<'a, L> {
    pub fn new(ctx: &'a RelayContext<L>) -> Self {
        Self { ctx }
    }

    /// Validate any operation on behalf of `sender`.
    pub async fn validate(&self, sender: Address, call: &OperationCall) -> Result<ValidationResult, LedgerError> {
        match call {
            OperationCall::Payment(p) => self.validate_payment(sender, p).await,
            OperationCall::Consume(p) => self.validate_consume(sender, p).await,
            OperationCall::Deposit(p) | OperationCall::Withdraw(p) => Ok(self.validate_transfer(p)),
        }
    }

    pub async fn validate_payment(
        &self,
        sender: Address,
        params: &PaymentParams,
    ) -> Result<ValidationResult, LedgerError> {
        settle(self.payment(sender, params).await)
    }

    /// Deposit and withdraw only need well-formed arguments.
    pub fn validate_transfer(&self, params: &VaultTransferParams) -> ValidationResult {
        let reason = if params.amount.is_zero() {
            Precondition::ZeroAmount
        } else if params.token.is_zero() {
            Precondition::ZeroAddress("token")
        } else if params.merchant_id.is_zero() {
            Precondition::ZeroMerchant
        } else {
            return ValidationResult::transfer(params.amount);
        };
        tracing::warn!(%reason, "validation rejected");
        ValidationResult::rejected(reason)
    }

    pub async fn validate_consume(
        &self,
        sender: Address,
        params: &ConsumeParams,
    ) -> Result<ValidationResult, LedgerError> {
        settle(self.consume(sender, params).await)
    }

    async fn payment(&self, sender: Address, p: &PaymentParams) -> Result<ValidationResult, Halt> {
        let ctx = self.ctx;
        ensure(!p.amount.is_zero(), Precondition::ZeroAmount)?;
        ensure(!p.token.is_zero(), Precondition::ZeroAddress("token"))?;
        ensure(!p.to.is_zero(), Precondition::ZeroAddress("to"))?;
        if ctx.config.check_pay_seq {
            let used = ctx
                .read("isSeqUsed", ctx.ledger.is_seq_used(sender, p.seq))
                .await?;
            ensure(!used, Precondition::SeqAlreadyUsed { sender, seq: p.seq })?;
        }
        Ok(ValidationResult::transfer(p.amount))
    }

    async fn consume(&self, sender: Address, p: &ConsumeParams) -> Result<ValidationResult, Halt> {
        let ctx = self.ctx;
        let ledger = &ctx.ledger;
        let now = ctx.now();

        ensure(!p.amount.is_zero(), Precondition::ZeroAmount)?;
        ensure(!p.recipient.is_zero(), Precondition::ZeroAddress("recipient"))?;

        let whitelisted = ctx
            .read("isTokenWhitelisted", ledger.is_token_whitelisted(p.token))
            .await?;
        ensure(whitelisted, Precondition::TokenNotWhitelisted(p.token))?;

        let recipient = ctx
            .read("merchantRecipient", ledger.merchant_recipient(p.merchant_id))
            .await?;
        ensure(
            !recipient.is_zero(),
            Precondition::MerchantRecipientMissing(p.merchant_id),
        )?;

        let seq_used = ctx.read("isSeqUsed", ledger.is_seq_used(sender, p.seq)).await?;
        ensure(!seq_used, Precondition::SeqAlreadyUsed { sender, seq: p.seq })?;

        let voucher_used = if p.voucher_id.is_zero() {
            U256::ZERO
        } else {
            let voucher = ctx.read("getVoucher", ledger.voucher(p.voucher_id)).await?;
            ensure(voucher.exists(), Precondition::VoucherNotFound(p.voucher_id))?;
            ensure(
                voucher.merchant_id == p.merchant_id && voucher.token == p.token,
                Precondition::VoucherMismatch(p.voucher_id),
            )?;
            ensure(!voucher.used, Precondition::VoucherUsed(p.voucher_id))?;
            ensure(
                !voucher.is_expired(now),
                Precondition::VoucherExpired {
                    id: p.voucher_id,
                    expire_at: voucher.expire_at,
                },
            )?;
            voucher.amount
        };

        // A tier slot that was never written reads back as all zeroes.
        let tier = match ctx
            .read("getPromoTier", ledger.promo_tier(p.merchant_id, p.idx))
            .await
        {
            Ok(tier) if tier != PromoTier::default() => tier,
            Ok(_) | Err(LedgerError::Reverted { .. }) => {
                return Err(Precondition::TierNotFound(p.idx).into())
            }
            Err(e) => return Err(e.into()),
        };
        ensure(tier.enabled, Precondition::TierDisabled(p.idx))?;
        ensure(
            p.amount >= tier.min_amount,
            Precondition::BelowTierMinimum {
                amount: p.amount,
                min_amount: tier.min_amount,
            },
        )?;
        match tier.window_at(now) {
            TierWindow::Open => {}
            TierWindow::NotStarted => {
                return Err(Precondition::TierNotStarted {
                    idx: p.idx,
                    start_time: tier.start_time,
                }
                .into())
            }
            TierWindow::Ended => {
                return Err(Precondition::TierEnded {
                    idx: p.idx,
                    end_time: tier.end_time,
                }
                .into())
            }
        }

        let base = ctx.read("DISCOUNT_BASE", ledger.discount_base()).await?;
        ensure(
            !base.is_zero() && tier.discount_rate <= base,
            Precondition::InvalidDiscountRate {
                rate: tier.discount_rate,
                base,
            },
        )?;
        let discounted = scale(p.amount, tier.discount_rate, base, "discountedAmount")?;

        let voucher_reward = tier.voucher_amount;
        let reward_amount = scale(discounted, tier.point_amount, base, "rewardAmount")?;
        let voucher_expire_at =
            (!voucher_reward.is_zero()).then(|| now.saturating_add(tier.voucher_expire_period));

        let fee = ctx
            .read("calculateFee", ledger.fee_for(p.merchant_id, p.token, discounted))
            .await?;
        ensure(
            fee <= discounted,
            Precondition::FeeExceedsAmount {
                fee,
                amount: discounted,
            },
        )?;
        let merchant_amount = discounted - fee;

        let points_used = p.point_to_use;
        if !points_used.is_zero() {
            let available = ctx
                .read("pointBalance", ledger.point_balance(p.merchant_id, sender))
                .await?;
            ensure(
                points_used <= available,
                Precondition::InsufficientPoints {
                    requested: points_used,
                    available,
                },
            )?;
        }

        let credits = voucher_used
            .checked_add(points_used)
            .ok_or(Halt::Reject(Precondition::ArithmeticOverflow("credits")))?;
        ensure(
            credits <= discounted,
            Precondition::CreditsExceedAmount {
                credits,
                amount: discounted,
            },
        )?;
        let spend = discounted - credits;

        if !spend.is_zero() {
            let balance = ctx
                .read("balanceOf", ledger.token_balance(p.token, sender))
                .await?;
            ensure(
                balance >= spend,
                Precondition::InsufficientBalance {
                    required: spend,
                    available: balance,
                },
            )?;
            let allowance = ctx
                .read(
                    "allowance",
                    ledger.token_allowance(p.token, sender, ctx.config.vault),
                )
                .await?;
            ensure(
                allowance >= spend,
                Precondition::InsufficientAllowance {
                    required: spend,
                    available: allowance,
                },
            )?;
        }

        tracing::debug!(
            %sender,
            merchant = %p.merchant_id,
            %discounted,
            %fee,
            %spend,
            "consumption validated"
        );

        Ok(ValidationResult {
            success: true,
            error: None,
            fee: Some(fee),
            to_amount: Some(merchant_amount),
            reward_amount: Some(reward_amount),
            merchant_amount: Some(merchant_amount),
            voucher_reward: Some(voucher_reward),
            discounted_amount: Some(discounted),
            points_used: Some(points_used),
            voucher_used: Some(voucher_used),
            spend_amount: Some(spend),
            voucher_expire_at,
            rejection: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_relay_types::{MerchantId, Voucher};

    use crate::{
        context::FixedClock,
        ledger::{FeeRule, InMemoryLedger},
        test_support::{config, consume_params, seeded_ledger, tier, MERCHANT, NOW, TOKEN, USER, VAULT},
    };

    fn context(ledger: InMemoryLedger) -> RelayContext<InMemoryLedger> {
        RelayContext::new(config(), ledger).with_clock(FixedClock(NOW))
    }

    async fn consume(ctx: &RelayContext<InMemoryLedger>, params: &ConsumeParams) -> ValidationResult {
        EconomicValidator::new(ctx)
            .validate_consume(USER, params)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn discount_and_fee() {
        let ctx = context(seeded_ledger());
        let result = consume(&ctx, &consume_params(100, 0)).await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.discounted_amount, Some(U256::from(90u64)));
        assert_eq!(result.fee, Some(U256::from(1u64)));
        assert_eq!(result.merchant_amount, Some(U256::from(89u64)));
        assert_eq!(result.to_amount, Some(U256::from(89u64)));
        assert_eq!(result.spend_amount, Some(U256::from(90u64)));
        assert_eq!(result.reward_amount, Some(U256::from(9u64)));
        assert_eq!(result.voucher_reward, Some(U256::from(5u64)));
        assert_eq!(result.voucher_expire_at, Some(NOW + 86_400));
    }

    #[tokio::test]
    async fn zero_beneficiary_is_refused() {
        let ctx = context(seeded_ledger());
        let params = ConsumeParams {
            recipient: Address::ZERO,
            ..consume_params(100, 0)
        };
        let result = consume(&ctx, &params).await;
        assert!(!result.success);
        assert_eq!(result.rejection, Some(Precondition::ZeroAddress("recipient")));
        assert_eq!(result.reward_amount, None);
    }

    #[tokio::test]
    async fn discount_truncates() {
        let ctx = context(seeded_ledger());
        // 333 * 90 / 100 = 299.7
        let result = consume(&ctx, &consume_params(333, 0)).await;
        assert_eq!(result.discounted_amount, Some(U256::from(299u64)));
        assert_eq!(result.merchant_amount, Some(U256::from(298u64)));
    }

    #[tokio::test]
    async fn below_tier_minimum() {
        let ctx = context(seeded_ledger());
        let result = consume(&ctx, &consume_params(9, 0)).await;
        assert!(!result.success);
        assert_eq!(
            result.rejection,
            Some(Precondition::BelowTierMinimum {
                amount: U256::from(9u64),
                min_amount: U256::from(10u64),
            })
        );
        assert!(result.fee.is_none());
    }

    #[tokio::test]
    async fn zero_amount_short_circuits() {
        let ledger = seeded_ledger();
        ledger.set_offline(true);
        let ctx = context(ledger);
        // Rejected before any ledger read, so the offline ledger is never touched.
        let result = consume(&ctx, &consume_params(0, 0)).await;
        assert_eq!(result.rejection, Some(Precondition::ZeroAmount));
    }

    #[tokio::test]
    async fn token_and_merchant_checks() {
        let ctx = context(seeded_ledger());
        let mut params = consume_params(100, 0);
        params.token = VAULT;
        assert_eq!(
            consume(&ctx, &params).await.rejection,
            Some(Precondition::TokenNotWhitelisted(VAULT))
        );

        let mut params = consume_params(100, 0);
        params.merchant_id = MerchantId::from_name("unknown");
        assert_eq!(
            consume(&ctx, &params).await.rejection,
            Some(Precondition::MerchantRecipientMissing(params.merchant_id))
        );
    }

    #[tokio::test]
    async fn used_seq_is_replay() {
        let ctx = context(seeded_ledger());
        let params = consume_params(100, 0);
        assert!(consume(&ctx, &params).await.success);

        ctx.ledger.mark_seq_used(USER, params.seq);
        assert_eq!(
            consume(&ctx, &params).await.rejection,
            Some(Precondition::SeqAlreadyUsed {
                sender: USER,
                seq: params.seq
            })
        );
    }

    #[tokio::test]
    async fn voucher_checks() {
        let ctx = context(seeded_ledger());
        let id = U256::from(77u64);
        let mut voucher = Voucher {
            merchant_id: MERCHANT,
            token: TOKEN,
            amount: U256::from(20u64),
            used: false,
            expire_at: NOW + 10,
        };

        assert_eq!(
            consume(&ctx, &consume_params(100, 77)).await.rejection,
            Some(Precondition::VoucherNotFound(id))
        );

        ctx.ledger.set_voucher(id, voucher.clone());
        let ok = consume(&ctx, &consume_params(100, 77)).await;
        assert_eq!(ok.voucher_used, Some(U256::from(20u64)));
        assert_eq!(ok.spend_amount, Some(U256::from(70u64)));

        voucher.used = true;
        ctx.ledger.set_voucher(id, voucher.clone());
        let used = consume(&ctx, &consume_params(100, 77)).await;
        assert!(!used.success);
        assert_eq!(used.rejection, Some(Precondition::VoucherUsed(id)));

        voucher.used = false;
        voucher.expire_at = NOW;
        ctx.ledger.set_voucher(id, voucher.clone());
        assert_eq!(
            consume(&ctx, &consume_params(100, 77)).await.rejection,
            Some(Precondition::VoucherExpired {
                id,
                expire_at: NOW
            })
        );

        voucher.expire_at = NOW + 10;
        voucher.token = VAULT;
        ctx.ledger.set_voucher(id, voucher);
        assert_eq!(
            consume(&ctx, &consume_params(100, 77)).await.rejection,
            Some(Precondition::VoucherMismatch(id))
        );
    }

    #[tokio::test]
    async fn tier_checks() {
        let ctx = context(seeded_ledger());
        let mut params = consume_params(100, 0);
        params.idx = U256::from(5u64);
        assert_eq!(
            consume(&ctx, &params).await.rejection,
            Some(Precondition::TierNotFound(U256::from(5u64)))
        );

        let mut disabled = tier();
        disabled.enabled = false;
        ctx.ledger.set_promo_tier(MERCHANT, U256::ZERO, disabled);
        assert_eq!(
            consume(&ctx, &consume_params(100, 0)).await.rejection,
            Some(Precondition::TierDisabled(U256::ZERO))
        );

        let mut later = tier();
        later.start_time = NOW + 1;
        ctx.ledger.set_promo_tier(MERCHANT, U256::ZERO, later);
        assert_eq!(
            consume(&ctx, &consume_params(100, 0)).await.rejection,
            Some(Precondition::TierNotStarted {
                idx: U256::ZERO,
                start_time: NOW + 1
            })
        );

        let mut over = tier();
        over.end_time = NOW - 1;
        ctx.ledger.set_promo_tier(MERCHANT, U256::ZERO, over);
        assert_eq!(
            consume(&ctx, &consume_params(100, 0)).await.rejection,
            Some(Precondition::TierEnded {
                idx: U256::ZERO,
                end_time: NOW - 1
            })
        );

        let mut generous = tier();
        generous.discount_rate = U256::from(101u64);
        ctx.ledger.set_promo_tier(MERCHANT, U256::ZERO, generous);
        assert!(matches!(
            consume(&ctx, &consume_params(100, 0)).await.rejection,
            Some(Precondition::InvalidDiscountRate { .. })
        ));
    }

    #[tokio::test]
    async fn fee_above_discounted_amount() {
        let ctx = context(seeded_ledger());
        ctx.ledger.set_fee_rule(FeeRule::Flat(U256::from(91u64)));
        assert_eq!(
            consume(&ctx, &consume_params(100, 0)).await.rejection,
            Some(Precondition::FeeExceedsAmount {
                fee: U256::from(91u64),
                amount: U256::from(90u64)
            })
        );
    }

    #[tokio::test]
    async fn points_balance_and_allowance() {
        let ctx = context(seeded_ledger());
        let mut params = consume_params(100, 0);
        params.point_to_use = U256::from(30u64);
        assert_eq!(
            consume(&ctx, &params).await.rejection,
            Some(Precondition::InsufficientPoints {
                requested: U256::from(30u64),
                available: U256::from(25u64)
            })
        );

        params.point_to_use = U256::from(25u64);
        let ok = consume(&ctx, &params).await;
        assert_eq!(ok.points_used, Some(U256::from(25u64)));
        assert_eq!(ok.spend_amount, Some(U256::from(65u64)));

        ctx.ledger.set_token_allowance(TOKEN, USER, VAULT, U256::from(64u64));
        assert_eq!(
            consume(&ctx, &params).await.rejection,
            Some(Precondition::InsufficientAllowance {
                required: U256::from(65u64),
                available: U256::from(64u64)
            })
        );

        ctx.ledger.set_token_balance(TOKEN, USER, U256::ZERO);
        assert!(matches!(
            consume(&ctx, &params).await.rejection,
            Some(Precondition::InsufficientBalance { .. })
        ));
    }

    #[tokio::test]
    async fn ledger_failures_propagate() {
        let ctx = context(seeded_ledger());
        ctx.ledger.set_offline(true);
        let err = EconomicValidator::new(&ctx)
            .validate_consume(USER, &consume_params(100, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Transport { .. }));
    }

    #[tokio::test]
    async fn payment_and_transfer_checks() {
        let ctx = context(seeded_ledger());
        let validator = EconomicValidator::new(&ctx);
        let payment = PaymentParams {
            token: TOKEN,
            to: VAULT,
            amount: U256::from(5u64),
            seq: U256::from(1u64),
        };
        assert!(validator.validate_payment(USER, &payment).await.unwrap().success);

        ctx.ledger.mark_seq_used(USER, U256::from(1u64));
        assert!(matches!(
            validator.validate_payment(USER, &payment).await.unwrap().rejection,
            Some(Precondition::SeqAlreadyUsed { .. })
        ));

        let zero_to = PaymentParams {
            to: Address::ZERO,
            seq: U256::from(2u64),
            ..payment
        };
        assert_eq!(
            validator.validate_payment(USER, &zero_to).await.unwrap().rejection,
            Some(Precondition::ZeroAddress("to"))
        );

        let transfer = VaultTransferParams {
            merchant_id: MerchantId::ZERO,
            token: TOKEN,
            amount: U256::from(1u64),
        };
        assert_eq!(
            validator.validate_transfer(&transfer).rejection,
            Some(Precondition::ZeroMerchant)
        );
    }

    #[test]
    fn rejection_json_omits_amounts() {
        let json = serde_json::to_value(ValidationResult::rejected(Precondition::ZeroAmount)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "amount must be greater than zero");
        assert!(json.get("fee").is_none());
        assert!(json.get("rejection").is_none());
    }
}
