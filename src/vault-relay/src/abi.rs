//! Solidity ABI bindings for the vault, its trusted forwarder, and the collaborators
//! the relayer reads from.
//!
//! These bindings are the only call shapes the engine encodes or decodes; the
//! typed-data hashing in [`crate::typed_data`] is written out by hand and checked
//! against the `ForwardRequest` struct below.

use alloy_sol_types::sol;
use vault_relay_types as types;

sol! {
    /// Forwarder request; identical to the EIP-712 `ForwardRequest` type users sign.
    #[derive(Debug, PartialEq, Eq)]
    struct ForwardRequest {
        address from;
        address to;
        uint256 value;
        uint256 gas;
        uint256 nonce;
        uint256 deadline;
        bytes data;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct PromoTierData {
        uint256 minAmount;
        uint256 discountRate;
        uint256 voucherAmount;
        uint256 pointAmount;
        uint256 startTime;
        uint256 endTime;
        uint256 voucherExpirePeriod;
        bool enabled;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct VoucherData {
        bytes32 merchantId;
        address token;
        uint256 amount;
        bool used;
        uint256 expireAt;
    }

    #[derive(Debug)]
    interface IConsumeVault {
        function pay(address token, address to, uint256 amount, uint256 seq) external;
        function consume(
            bytes32 merchantId,
            address token,
            uint256 amount,
            uint256 voucherId,
            uint256 pointToUse,
            uint256 idx,
            uint256 seq,
            address recipient
        ) external;
        function deposit(bytes32 merchantId, address token, uint256 amount) external;
        function withdraw(bytes32 merchantId, address token, uint256 amount) external;

        function getPromoTier(bytes32 merchantId, uint256 idx) external view returns (PromoTierData memory);
        function getVoucher(uint256 voucherId) external view returns (VoucherData memory);
        function isSeqUsed(address sender, uint256 seq) external view returns (bool);
        function isTokenWhitelisted(address token) external view returns (bool);
        function merchantRecipient(bytes32 merchantId) external view returns (address);
        function pointBalance(bytes32 merchantId, address account) external view returns (uint256);
        function DISCOUNT_BASE() external view returns (uint256);

        function getOwner() external view returns (address);
        function getFeeReceiver() external view returns (address);
        function getFeeRuleProvider() external view returns (address);
        function getTrustedForwarder() external view returns (address);
    }

    #[derive(Debug)]
    interface IFeeRuleProvider {
        function calculateFee(bytes32 merchantId, address token, uint256 amount) external view returns (uint256);
    }

    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
    }

    #[derive(Debug)]
    interface ITrustedForwarder {
        function getNonce(address from) external view returns (uint256);
        function execute(ForwardRequest calldata req, bytes calldata signature)
            external
            payable
            returns (bool, bytes memory);
    }
}

impl From<&types::ForwardRequest> for ForwardRequest {
    fn from(req: &types::ForwardRequest) -> Self {
        Self {
            from: req.from,
            to: req.to,
            value: req.value,
            gas: req.gas,
            nonce: req.nonce,
            deadline: alloy_primitives::U256::from(req.deadline),
            data: req.data.clone(),
        }
    }
}

impl From<PromoTierData> for types::PromoTier {
    fn from(raw: PromoTierData) -> Self {
        Self {
            min_amount: raw.minAmount,
            discount_rate: raw.discountRate,
            voucher_amount: raw.voucherAmount,
            point_amount: raw.pointAmount,
            start_time: raw.startTime.saturating_to(),
            end_time: raw.endTime.saturating_to(),
            voucher_expire_period: raw.voucherExpirePeriod.saturating_to(),
            enabled: raw.enabled,
        }
    }
}

impl From<VoucherData> for types::Voucher {
    fn from(raw: VoucherData) -> Self {
        Self {
            merchant_id: types::MerchantId(raw.merchantId),
            token: raw.token,
            amount: raw.amount,
            used: raw.used,
            expire_at: raw.expireAt.saturating_to(),
        }
    }
}
