//! Event payloads published by the lending contract. Topics are always a
//! `(subject, action)` pair of short symbols, e.g. `("loan", "repay")`.

use soroban_sdk::{contracttype, symbol_short, Address, BytesN, Env, Symbol};

use crate::types::{ProofRejection, ProofType};

/// Emitted when a proof is accepted and the account's profile is updated.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProofAcceptedEvent {
    pub account: Address,
    pub proof_type: ProofType,
    pub sub_score: u32,
    pub final_score: u32,
    pub eligible: bool,
}

/// Emitted when a proof is turned down after its nullifier was burned.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProofRejectedEvent {
    pub account: Address,
    pub proof_type: ProofType,
    pub nullifier: BytesN<32>,
    pub reason: ProofRejection,
}

/// Collateral deposit or withdrawal.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CollateralEvent {
    pub account: Address,
    pub token: Address,
    pub amount: i128,
    pub new_balance: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BorrowEvent {
    pub account: Address,
    pub amount: i128,
    pub new_debt: i128,
    pub borrow_rate_bps: u32,
    pub timestamp: u64,
}

/// Used for indexing and analytics (account, amounts split, remaining debt, timestamp).
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RepaymentEvent {
    pub account: Address,
    pub amount: i128,
    pub interest_paid: i128,
    pub remaining_debt: i128,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LiquidationEvent {
    pub account: Address,
    pub liquidator: Address,
    pub debt_repaid: i128,
    pub value_seized: i128,
    pub ratio_bps: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RateUpdatedEvent {
    pub old_rate_bps: u32,
    pub new_rate_bps: u32,
    pub utilization_bps: u32,
    pub timestamp: u64,
}

/// Lender deposit, withdrawal or interest claim.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LenderEvent {
    pub lender: Address,
    pub amount: i128,
    pub penalty: i128,
    pub new_balance: i128,
}

pub fn publish_proof_accepted(env: &Env, event: ProofAcceptedEvent) {
    env.events()
        .publish((symbol_short!("proof"), symbol_short!("accepted")), event);
}

pub fn publish_proof_rejected(env: &Env, event: ProofRejectedEvent) {
    env.events()
        .publish((symbol_short!("proof"), symbol_short!("rejected")), event);
}

/// Publish a collateral event under `(collat, <action>)`.
pub fn publish_collateral_event(env: &Env, action: Symbol, event: CollateralEvent) {
    env.events().publish((symbol_short!("collat"), action), event);
}

pub fn publish_borrow_event(env: &Env, event: BorrowEvent) {
    env.events()
        .publish((symbol_short!("loan"), symbol_short!("borrow")), event);
}

pub fn publish_repayment_event(env: &Env, event: RepaymentEvent) {
    env.events()
        .publish((symbol_short!("loan"), symbol_short!("repay")), event);
}

pub fn publish_liquidation_event(env: &Env, event: LiquidationEvent) {
    env.events()
        .publish((symbol_short!("loan"), symbol_short!("liquidate")), event);
}

pub fn publish_rate_updated(env: &Env, event: RateUpdatedEvent) {
    env.events()
        .publish((symbol_short!("rate"), symbol_short!("updated")), event);
}

/// Publish a lender event under `(pool, <action>)`.
pub fn publish_lender_event(env: &Env, action: Symbol, event: LenderEvent) {
    env.events().publish((symbol_short!("pool"), action), event);
}

/// Admin configuration change; the payload is whatever was set.
pub fn publish_config_event<T>(env: &Env, what: Symbol, value: T)
where
    T: soroban_sdk::IntoVal<Env, soroban_sdk::Val>,
{
    env.events().publish((symbol_short!("config"), what), value);
}
