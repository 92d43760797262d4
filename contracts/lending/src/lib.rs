#![no_std]

//! zk-credit lending contract: proof-backed credit scores, collateralized
//! borrowing against a shared lender pool, utilization-driven rates.
//!
//! # Guarded entry points
//! Collateral, loan and pool operations call out to token contracts and price
//! feeds. They run inside [`guarded`], which sets an instance flag for the
//! duration of the call, so a nested call into any of them fails with
//! `Error::Reentrancy`.
//!
//! # Proof submission
//! `submit_proof` returns `Ok(ProofVerdict::Rejected(_))` for proofs that fail
//! verification or decoding, so the consumed nullifier is kept. Every other
//! error reverts the whole call.

mod credit;
mod events;
mod ledger;
mod nullifier;
mod oracle;
mod pool;
mod rate_model;
mod storage;
mod types;
mod vault;

use soroban_sdk::{contract, contractimpl, symbol_short, Address, Bytes, BytesN, Env};

use events::publish_config_event;

pub use credit::{ProofVerifier, VerifierClient};
pub use oracle::{PriceFeed, PriceFeedClient};
pub use types::*;

const DEFAULT_MIN_CREDIT_SCORE: u32 = 600;
const DEFAULT_COLLATERAL_RATIO_BPS: u32 = 15_000;
const DEFAULT_MIN_MULTIPLIER_BPS: u32 = 10_000;
const DEFAULT_MAX_MULTIPLIER_BPS: u32 = 12_000;
const DEFAULT_LIQUIDATION_PENALTY_BPS: u32 = 500;
/// One week.
const DEFAULT_LOCKUP_PERIOD: u64 = 604_800;
const DEFAULT_EARLY_WITHDRAWAL_PENALTY_BPS: u32 = 200;
const DEFAULT_MAX_PRICE_AGE: u64 = 86_400;
/// Thirty days.
const DEFAULT_MAX_ATTESTATION_AGE: u64 = 2_592_000;

fn validate_config(config: &LedgerConfig) -> Result<(), Error> {
    let ok = config.min_credit_score <= MAX_CREDIT_SCORE
        && config.required_collateral_ratio_bps > 0
        && config.min_multiplier_bps > 0
        && config.min_multiplier_bps <= config.max_multiplier_bps
        && config.liquidation_penalty_bps <= BPS
        && config.early_withdrawal_penalty_bps <= BPS
        && config.max_price_age > 0;
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidConfig)
    }
}

/// Runs `f` under the reentrancy guard. On error the host rolls the flag back
/// with the rest of the invocation.
fn guarded<T>(env: &Env, f: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
    storage::enter_guard(env)?;
    let result = f()?;
    storage::exit_guard(env);
    Ok(result)
}

#[contract]
pub struct ZkLending;

#[contractimpl]
impl ZkLending {
    /// Initialize with admin, the token lent and borrowed, and the proof verifier.
    pub fn init(
        env: Env,
        admin: Address,
        liquidity_token: Address,
        verifier: Address,
    ) -> Result<(), Error> {
        if storage::is_initialized(&env) {
            return Err(Error::AlreadyInitialized);
        }
        storage::write_admin(&env, &admin);
        storage::write_verifier(&env, &verifier);
        storage::write_config(
            &env,
            &LedgerConfig {
                liquidity_token,
                min_credit_score: DEFAULT_MIN_CREDIT_SCORE,
                required_collateral_ratio_bps: DEFAULT_COLLATERAL_RATIO_BPS,
                min_multiplier_bps: DEFAULT_MIN_MULTIPLIER_BPS,
                max_multiplier_bps: DEFAULT_MAX_MULTIPLIER_BPS,
                liquidation_penalty_bps: DEFAULT_LIQUIDATION_PENALTY_BPS,
                lockup_period: DEFAULT_LOCKUP_PERIOD,
                early_withdrawal_penalty_bps: DEFAULT_EARLY_WITHDRAWAL_PENALTY_BPS,
                max_price_age: DEFAULT_MAX_PRICE_AGE,
                max_attestation_age: DEFAULT_MAX_ATTESTATION_AGE,
            },
        );
        ledger::init_index(&env);
        storage::bump_instance(&env);
        Ok(())
    }

    // --- administration ---

    pub fn set_admin(env: Env, new_admin: Address) -> Result<(), Error> {
        storage::require_admin_auth(&env)?;
        storage::write_admin(&env, &new_admin);
        storage::bump_instance(&env);
        publish_config_event(&env, symbol_short!("admin"), new_admin);
        Ok(())
    }

    pub fn get_admin(env: Env) -> Result<Address, Error> {
        storage::read_admin(&env)
    }

    /// Replace the whole ledger configuration (admin only).
    pub fn set_ledger_config(env: Env, config: LedgerConfig) -> Result<(), Error> {
        storage::require_admin_auth(&env)?;
        validate_config(&config)?;
        storage::write_config(&env, &config);
        storage::bump_instance(&env);
        publish_config_event(&env, symbol_short!("ledger"), config);
        Ok(())
    }

    pub fn set_min_credit_score(env: Env, min_credit_score: u32) -> Result<(), Error> {
        storage::require_admin_auth(&env)?;
        let mut config = storage::read_config(&env)?;
        config.min_credit_score = min_credit_score;
        validate_config(&config)?;
        storage::write_config(&env, &config);
        storage::bump_instance(&env);
        publish_config_event(&env, symbol_short!("min_score"), min_credit_score);
        Ok(())
    }

    pub fn get_config(env: Env) -> Result<LedgerConfig, Error> {
        storage::read_config(&env)
    }

    /// Replace the interest curve (admin only). Accrues at the old rate first,
    /// then commits a rate under the new curve.
    pub fn set_rate_params(env: Env, params: RateModelParameters) -> Result<(), Error> {
        storage::require_admin_auth(&env)?;
        ledger::accrue_index(&env)?;
        rate_model::write_params(&env, &params)?;
        ledger::refresh_rate(&env);
        storage::bump_instance(&env);
        publish_config_event(&env, symbol_short!("rates"), params);
        Ok(())
    }

    pub fn get_rate_params(env: Env) -> RateModelParameters {
        rate_model::read_params(&env)
    }

    /// Wire the price feed and asset whose price drives the rate risk premium.
    pub fn set_risk_feed(env: Env, feed: Address, asset: Address) -> Result<(), Error> {
        storage::require_admin_auth(&env)?;
        let source = RiskSignalSource { feed, asset };
        rate_model::write_risk_signal(&env, &source);
        storage::bump_instance(&env);
        publish_config_event(&env, symbol_short!("risk_feed"), source);
        Ok(())
    }

    /// Configure a collateral token; setting `allowed = false` stops new
    /// deposits but keeps existing positions valued and withdrawable.
    pub fn set_collateral_token(
        env: Env,
        token: Address,
        config: CollateralTokenConfig,
    ) -> Result<(), Error> {
        storage::require_admin_auth(&env)?;
        vault::validate_token_config(&config)?;
        storage::write_token_config(&env, &token, &config);
        storage::bump_instance(&env);
        publish_config_event(&env, symbol_short!("collat"), (token, config));
        Ok(())
    }

    pub fn get_collateral_token(env: Env, token: Address) -> Option<CollateralTokenConfig> {
        storage::read_token_config(&env, &token)
    }

    pub fn set_verifier(env: Env, verifier: Address) -> Result<(), Error> {
        storage::require_admin_auth(&env)?;
        storage::write_verifier(&env, &verifier);
        storage::bump_instance(&env);
        publish_config_event(&env, symbol_short!("verifier"), verifier);
        Ok(())
    }

    /// Register the program image a proof type must be verified against.
    pub fn set_image_id(env: Env, proof_type: ProofType, image_id: BytesN<32>) -> Result<(), Error> {
        storage::require_admin_auth(&env)?;
        credit::write_image_id(&env, proof_type, &image_id);
        storage::bump_instance(&env);
        publish_config_event(&env, symbol_short!("image_id"), (proof_type, image_id));
        Ok(())
    }

    /// Trust or distrust a tradfi data source (hash of its notarised server identity).
    pub fn set_trusted_source(env: Env, source: BytesN<32>, trusted: bool) -> Result<(), Error> {
        storage::require_admin_auth(&env)?;
        credit::write_trusted_source(&env, &source, trusted);
        storage::bump_instance(&env);
        publish_config_event(&env, symbol_short!("source"), (source, trusted));
        Ok(())
    }

    // --- credit ---

    /// Submit a verified credit proof. The nullifier is consumed even when the
    /// proof is rejected; only a replayed nullifier fails the call.
    pub fn submit_proof(
        env: Env,
        account: Address,
        proof_type: ProofType,
        seal: Bytes,
        journal: Bytes,
        nullifier: BytesN<32>,
    ) -> Result<ProofVerdict, Error> {
        account.require_auth();
        storage::bump_instance(&env);
        credit::submit_proof(&env, &account, proof_type, &seal, &journal, &nullifier)
    }

    pub fn get_user_credit_profile(env: Env, account: Address) -> Result<CreditProfile, Error> {
        credit::profile(&env, &account)
    }

    /// Identity a journal must commit to for `account`.
    pub fn account_id(env: Env, account: Address) -> BytesN<32> {
        credit::account_id(&env, &account)
    }

    pub fn is_nullifier_used(env: Env, nullifier: BytesN<32>) -> bool {
        nullifier::is_consumed(&env, &nullifier)
    }

    // --- collateral ---

    pub fn deposit_collateral(
        env: Env,
        account: Address,
        token: Address,
        amount: i128,
    ) -> Result<i128, Error> {
        account.require_auth();
        storage::bump_instance(&env);
        guarded(&env, || vault::deposit(&env, &account, &token, amount))
    }

    pub fn withdraw_collateral(
        env: Env,
        account: Address,
        token: Address,
        amount: i128,
    ) -> Result<i128, Error> {
        account.require_auth();
        storage::bump_instance(&env);
        guarded(&env, || {
            ledger::withdraw_collateral(&env, &account, &token, amount)
        })
    }

    pub fn get_collateral(env: Env, account: Address, token: Address) -> i128 {
        storage::read_collateral(&env, &account, &token)
    }

    /// LTV-discounted value of all collateral, in liquidity token units.
    pub fn total_collateral_value(env: Env, account: Address) -> Result<i128, Error> {
        let config = storage::read_config(&env)?;
        Ok(vault::valuation(&env, &config, &account)?.discounted)
    }

    pub fn raw_collateral_value(env: Env, account: Address) -> Result<i128, Error> {
        let config = storage::read_config(&env)?;
        Ok(vault::valuation(&env, &config, &account)?.raw)
    }

    // --- loans ---

    /// Borrow `amount` of the liquidity token. Returns the new debt.
    pub fn borrow(
        env: Env,
        account: Address,
        amount: i128,
        nullifier: BytesN<32>,
    ) -> Result<i128, Error> {
        account.require_auth();
        storage::bump_instance(&env);
        guarded(&env, || ledger::borrow(&env, &account, amount, &nullifier))
    }

    /// Repay up to `amount`; anything above the outstanding debt is not taken.
    pub fn repay(env: Env, account: Address, amount: i128) -> Result<RepaymentReceipt, Error> {
        account.require_auth();
        storage::bump_instance(&env);
        guarded(&env, || ledger::repay(&env, &account, amount))
    }

    pub fn liquidate(
        env: Env,
        liquidator: Address,
        account: Address,
    ) -> Result<LiquidationReceipt, Error> {
        liquidator.require_auth();
        storage::bump_instance(&env);
        guarded(&env, || ledger::liquidate(&env, &liquidator, &account))
    }

    pub fn check_collateralization(env: Env, account: Address) -> Result<CollateralHealth, Error> {
        ledger::check_collateralization(&env, &account)
    }

    pub fn max_borrowable(env: Env, account: Address) -> Result<i128, Error> {
        ledger::max_borrowable(&env, &account)
    }

    /// Debt including interest accrued up to now.
    pub fn get_debt(env: Env, account: Address) -> Result<i128, Error> {
        ledger::debt(&env, &account)
    }

    pub fn get_loan(env: Env, account: Address) -> Result<LoanData, Error> {
        ledger::loan(&env, &account)
    }

    pub fn get_history(env: Env, account: Address) -> AccountHistory {
        storage::read_history(&env, &account)
    }

    // --- rates ---

    /// Rate `update_borrow_rate` would commit now.
    pub fn preview_borrow_rate(env: Env) -> u32 {
        let pool = pool::read_pool(&env);
        rate_model::preview(
            &env,
            rate_model::utilization_bps(pool.total_borrowed, pool.total_supplied),
        )
    }

    /// Accrue interest at the current rate, then recommit it. Callable by anyone.
    pub fn update_borrow_rate(env: Env) -> Result<u32, Error> {
        storage::bump_instance(&env);
        ledger::accrue_index(&env)?;
        Ok(ledger::refresh_rate(&env))
    }

    pub fn get_borrow_rate(env: Env) -> u32 {
        rate_model::read_state(&env).borrow_rate_bps
    }

    pub fn utilization(env: Env) -> u32 {
        let pool = pool::read_pool(&env);
        rate_model::utilization_bps(pool.total_borrowed, pool.total_supplied)
    }

    // --- lender pool ---

    pub fn deposit_funds(env: Env, lender: Address, amount: i128) -> Result<LenderRecord, Error> {
        lender.require_auth();
        storage::bump_instance(&env);
        guarded(&env, || {
            ledger::accrue_index(&env)?;
            let record = pool::deposit_funds(&env, &lender, amount)?;
            ledger::refresh_rate(&env);
            Ok(record)
        })
    }

    pub fn withdraw_funds(
        env: Env,
        lender: Address,
        amount: i128,
    ) -> Result<LenderWithdrawal, Error> {
        lender.require_auth();
        storage::bump_instance(&env);
        guarded(&env, || {
            ledger::accrue_index(&env)?;
            let withdrawal = pool::withdraw_funds(&env, &lender, amount)?;
            ledger::refresh_rate(&env);
            Ok(withdrawal)
        })
    }

    pub fn claim_interest(env: Env, lender: Address) -> Result<i128, Error> {
        lender.require_auth();
        storage::bump_instance(&env);
        guarded(&env, || pool::claim_interest(&env, &lender))
    }

    /// Lender record with interest distributed up to now.
    pub fn get_lender(env: Env, lender: Address) -> Result<Option<LenderRecord>, Error> {
        pool::lender(&env, &lender)
    }

    pub fn get_pool_state(env: Env) -> PoolState {
        pool::read_pool(&env)
    }

    /// Move protocol reserves out of the pool (admin only).
    pub fn withdraw_reserves(env: Env, to: Address, amount: i128) -> Result<(), Error> {
        storage::require_admin_auth(&env)?;
        storage::bump_instance(&env);
        guarded(&env, || pool::withdraw_reserves(&env, &to, amount))
    }
}
