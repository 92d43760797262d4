//! Core data types for the lending contract.

use soroban_sdk::{contracterror, contracttype, Address};

/// Basis-point denominator (100%).
pub const BPS: u32 = 10_000;
/// Upper bound of every credit score scale.
pub const MAX_CREDIT_SCORE: u32 = 850;
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

#[contracterror]
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    InvalidAmount = 3,
    InvalidConfig = 4,
    Overflow = 5,
    Reentrancy = 6,

    ReplayedProof = 10,
    InvalidProof = 11,
    MalformedJournal = 12,
    AccountMismatch = 13,
    UntrustedSource = 14,
    ExpiredAttestation = 15,
    ProofTypeNotConfigured = 16,

    NotEligible = 20,
    InsufficientCollateral = 21,
    InsufficientLiquidity = 22,
    WithdrawalWouldUndercollateralize = 23,
    PositionHealthy = 24,
    NoDebt = 25,

    TokenNotAllowed = 30,
    StalePrice = 31,
    OracleUnavailable = 32,
    InsufficientBalance = 33,

    InsufficientPoolLiquidity = 40,
    NothingToClaim = 41,
}

/// Proof families accepted by the credit score aggregator.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ProofType {
    /// On-chain account state proof.
    Account = 0,
    /// Notarised traditional-finance bureau score.
    TradFi = 1,
    /// Recursive proof nesting an account and a tradfi proof.
    Nesting = 2,
}

/// Why a verified-stage proof submission was turned down.
///
/// Codes match the corresponding [`Error`] variants.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ProofRejection {
    InvalidProof = 11,
    MalformedJournal = 12,
    AccountMismatch = 13,
    UntrustedSource = 14,
    ExpiredAttestation = 15,
}

impl From<ProofRejection> for Error {
    fn from(rejection: ProofRejection) -> Self {
        match rejection {
            ProofRejection::InvalidProof => Error::InvalidProof,
            ProofRejection::MalformedJournal => Error::MalformedJournal,
            ProofRejection::AccountMismatch => Error::AccountMismatch,
            ProofRejection::UntrustedSource => Error::UntrustedSource,
            ProofRejection::ExpiredAttestation => Error::ExpiredAttestation,
        }
    }
}

/// Per-account credit profile owned by the aggregator.
#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreditProfile {
    pub has_account_proof: bool,
    pub has_tradfi_proof: bool,
    pub has_nesting_proof: bool,
    pub account_score: u32,
    pub tradfi_score: u32,
    pub hybrid_score: u32,
    pub final_score: u32,
    pub eligible: bool,
    pub updated_at: u64,
}

/// Outcome of a proof submission that got past the nullifier check.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProofVerdict {
    Accepted(CreditProfile),
    Rejected(ProofRejection),
}

/// Price reported by an external feed.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PriceData {
    pub price: i128,
    pub decimals: u32,
    pub updated_at: u64,
}

/// Admin-managed settings for one collateral token.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CollateralTokenConfig {
    pub allowed: bool,
    pub price_feed: Address,
    /// Minimum raw collateral-to-debt ratio, e.g. 13_000 = 130%.
    pub liquidation_threshold_bps: u32,
    /// Borrowing-capacity discount, e.g. 8_000 = 80%.
    pub ltv_bps: u32,
}

/// Global ledger settings.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LedgerConfig {
    pub liquidity_token: Address,
    pub min_credit_score: u32,
    pub required_collateral_ratio_bps: u32,
    pub min_multiplier_bps: u32,
    pub max_multiplier_bps: u32,
    pub liquidation_penalty_bps: u32,
    /// Seconds after a lender deposit during which withdrawals are penalised.
    pub lockup_period: u64,
    pub early_withdrawal_penalty_bps: u32,
    /// Hard ceiling on collateral price age; older prices are refused.
    pub max_price_age: u64,
    /// Maximum age of a notarised tradfi attestation.
    pub max_attestation_age: u64,
}

/// Interest curve, fixed per deployment until the admin replaces it.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RateModelParameters {
    pub base_rate_bps: u32,
    pub kink_utilization_bps: u32,
    pub slope_below_kink_bps: u32,
    pub slope_above_kink_bps: u32,
    pub reserve_factor_bps: u32,
    pub max_rate_bps: u32,
    pub max_rate_change_bps: u32,
    pub risk_premium_bps: u32,
    pub volatility_threshold_bps: u32,
    pub oracle_staleness_window: u64,
}

/// Last committed output of the rate model.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RateState {
    pub borrow_rate_bps: u32,
    /// Price of the risk-signal asset at the last commit (0 = none seen).
    pub last_price: i128,
    pub updated_at: u64,
}

/// Feed and asset whose price drives the rate model's risk premium.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RiskSignalSource {
    pub feed: Address,
    pub asset: Address,
}

/// Outstanding loan for one account.
#[contracttype]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LoanData {
    /// Principal still owed to the pool.
    pub principal: i128,
    /// Principal plus accrued interest as of `borrow_index`.
    pub debt: i128,
    /// Global borrow index when `debt` was last re-based.
    pub borrow_index: i128,
}

/// Global compounding index shared by all loans.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BorrowIndex {
    pub value: i128,
    pub updated_at: u64,
}

/// Append-only per-account counters.
#[contracttype]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AccountHistory {
    /// Zero until the first borrow.
    pub first_interaction_timestamp: u64,
    pub successful_payments: u32,
    pub liquidation_count: u32,
}

/// Result of a collateralization check.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CollateralHealth {
    pub healthy: bool,
    /// Raw collateral value over debt; `u32::MAX` when there is no debt.
    pub ratio_bps: u32,
    /// Value-weighted liquidation threshold of the held collateral.
    pub threshold_bps: u32,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RepaymentReceipt {
    pub paid: i128,
    pub interest_paid: i128,
    pub principal_paid: i128,
    pub remaining_debt: i128,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LiquidationReceipt {
    pub debt_repaid: i128,
    pub value_seized: i128,
}

/// Aggregate liquidity supplied by lenders.
#[contracttype]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PoolState {
    pub total_supplied: i128,
    /// Outstanding principal lent to borrowers.
    pub total_borrowed: i128,
    pub reserves: i128,
    /// Cumulative interest per supplied unit, scaled by 1e18.
    pub interest_index: i128,
    pub total_interest_collected: i128,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LenderRecord {
    pub balance: i128,
    pub pending_interest: i128,
    pub earned_interest: i128,
    pub last_distribution_time: u64,
    pub penalty_free_withdrawal_time: u64,
    /// Pool interest index at the last distribution to this lender.
    pub interest_index: i128,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LenderWithdrawal {
    pub requested: i128,
    pub penalty: i128,
    pub received: i128,
    /// Pending interest paid out alongside a full withdrawal.
    pub interest_paid: i128,
}
