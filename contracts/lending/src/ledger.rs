//! Borrow, repay and liquidation state machine.
//!
//! Debt compounds through a single global [`BorrowIndex`]. Each loan stores the
//! index it was last re-based at; its current debt is
//! `debt * index / loan.borrow_index`. The index grows at the committed borrow
//! rate before anything touches a loan, and the rate is recommitted after
//! every operation that moves utilization.

use soroban_sdk::{token, Address, BytesN, Env};

use crate::credit;
use crate::events::{
    publish_borrow_event, publish_liquidation_event, publish_repayment_event, BorrowEvent,
    LiquidationEvent, RepaymentEvent,
};
use crate::nullifier;
use crate::pool;
use crate::rate_model;
use crate::storage::{self, DataKey};
use crate::types::{
    AccountHistory, BorrowIndex, CollateralHealth, Error, LedgerConfig, LiquidationReceipt,
    LoanData, RepaymentReceipt, BPS,
};
use crate::vault::{self, Valuation};

/// Fixed-point scale of [`BorrowIndex::value`].
pub const INDEX_SCALE: i128 = 1_000_000_000_000_000_000;

pub fn init_index(env: &Env) {
    let index = BorrowIndex {
        value: INDEX_SCALE,
        updated_at: env.ledger().timestamp(),
    };
    env.storage().instance().set(&DataKey::BorrowIndex, &index);
}

fn read_index(env: &Env) -> Result<BorrowIndex, Error> {
    env.storage()
        .instance()
        .get(&DataKey::BorrowIndex)
        .ok_or(Error::NotInitialized)
}

/// Index as of now at the committed rate, without writing it.
pub fn preview_index(env: &Env) -> Result<BorrowIndex, Error> {
    let index = read_index(env)?;
    let now = env.ledger().timestamp();
    if now <= index.updated_at {
        return Ok(index);
    }
    let rate = rate_model::read_state(env).borrow_rate_bps;
    Ok(BorrowIndex {
        value: rate_model::accrue(index.value, rate, now - index.updated_at)?,
        updated_at: now,
    })
}

pub fn accrue_index(env: &Env) -> Result<BorrowIndex, Error> {
    let index = preview_index(env)?;
    env.storage().instance().set(&DataKey::BorrowIndex, &index);
    Ok(index)
}

/// `loan` re-based onto `index`.
fn rebase(loan: LoanData, index: &BorrowIndex) -> Result<LoanData, Error> {
    if loan.debt == 0 || loan.borrow_index == index.value {
        return Ok(LoanData {
            borrow_index: index.value,
            ..loan
        });
    }
    let debt = loan
        .debt
        .checked_mul(index.value)
        .ok_or(Error::Overflow)?
        / loan.borrow_index;
    Ok(LoanData {
        principal: loan.principal,
        debt,
        borrow_index: index.value,
    })
}

fn current_loan(env: &Env, account: &Address, index: &BorrowIndex) -> Result<LoanData, Error> {
    let loan = storage::read_loan(env, account).unwrap_or(LoanData {
        principal: 0,
        debt: 0,
        borrow_index: index.value,
    });
    rebase(loan, index)
}

/// Recommits the borrow rate for the pool's current utilization.
pub fn refresh_rate(env: &Env) -> u32 {
    let pool = pool::read_pool(env);
    let utilization = rate_model::utilization_bps(pool.total_borrowed, pool.total_supplied);
    rate_model::commit(env, utilization)
}

/// Total debt the collateral and score allow, before subtracting existing debt.
fn capacity(config: &LedgerConfig, valuation: &Valuation, score: u32) -> Result<i128, Error> {
    if config.required_collateral_ratio_bps == 0 {
        return Err(Error::InvalidConfig);
    }
    let multiplier = credit::credit_multiplier_bps(score, config);
    let credit_bound = valuation
        .discounted
        .checked_mul(multiplier as i128)
        .ok_or(Error::Overflow)?
        / config.required_collateral_ratio_bps as i128;
    Ok(credit_bound.min(valuation.health_cap()))
}

/// Additional amount `account` could borrow right now.
pub fn max_borrowable(env: &Env, account: &Address) -> Result<i128, Error> {
    let config = storage::read_config(env)?;
    let profile = credit::profile(env, account)?;
    if !profile.eligible {
        return Ok(0);
    }
    let index = preview_index(env)?;
    let loan = current_loan(env, account, &index)?;
    let valuation = vault::valuation(env, &config, account)?;
    let cap = capacity(&config, &valuation, profile.final_score)?;
    Ok((cap - loan.debt).max(0))
}

pub fn debt(env: &Env, account: &Address) -> Result<i128, Error> {
    let index = preview_index(env)?;
    Ok(current_loan(env, account, &index)?.debt)
}

pub fn loan(env: &Env, account: &Address) -> Result<LoanData, Error> {
    let index = preview_index(env)?;
    current_loan(env, account, &index)
}

/// Read-only; debt is taken as of now.
pub fn check_collateralization(env: &Env, account: &Address) -> Result<CollateralHealth, Error> {
    let config = storage::read_config(env)?;
    let debt = debt(env, account)?;
    let valuation = vault::valuation(env, &config, account)?;
    Ok(vault::health(debt, &valuation))
}

/// Withdraws collateral against the account's accrued debt.
pub fn withdraw_collateral(
    env: &Env,
    account: &Address,
    token: &Address,
    amount: i128,
) -> Result<i128, Error> {
    let config = storage::read_config(env)?;
    let index = accrue_index(env)?;
    let loan = current_loan(env, account, &index)?;
    vault::withdraw(env, &config, account, token, amount, loan.debt)
}

pub fn borrow(
    env: &Env,
    account: &Address,
    amount: i128,
    borrow_nullifier: &BytesN<32>,
) -> Result<i128, Error> {
    if amount <= 0 {
        return Err(Error::InvalidAmount);
    }
    let config = storage::read_config(env)?;
    nullifier::consume(env, borrow_nullifier)?;

    let profile = credit::profile(env, account)?;
    if !profile.eligible {
        return Err(Error::NotEligible);
    }

    let index = accrue_index(env)?;
    let mut loan = current_loan(env, account, &index)?;
    let new_debt = loan.debt.checked_add(amount).ok_or(Error::Overflow)?;

    let valuation = vault::valuation(env, &config, account)?;
    if new_debt > capacity(&config, &valuation, profile.final_score)? {
        return Err(Error::InsufficientCollateral);
    }

    let mut pool = pool::read_pool(env);
    pool::draw_liquidity(&mut pool, amount)?;
    pool::write_pool(env, &pool);

    loan.debt = new_debt;
    loan.principal += amount;
    storage::write_loan(env, account, &loan);

    let now = env.ledger().timestamp();
    let mut history = storage::read_history(env, account);
    if history.first_interaction_timestamp == 0 {
        history.first_interaction_timestamp = now;
        storage::write_history(env, account, &history);
    }

    token::Client::new(env, &config.liquidity_token).transfer(
        &env.current_contract_address(),
        account,
        &amount,
    );

    let rate = refresh_rate(env);
    publish_borrow_event(
        env,
        BorrowEvent {
            account: account.clone(),
            amount,
            new_debt,
            borrow_rate_bps: rate,
            timestamp: now,
        },
    );
    Ok(new_debt)
}

/// Splits a payment against `loan` into (interest, principal), interest first.
fn apply_payment(loan: &mut LoanData, paid: i128) -> (i128, i128) {
    let outstanding_interest = (loan.debt - loan.principal).max(0);
    let interest = paid.min(outstanding_interest);
    let principal = paid - interest;
    loan.debt -= paid;
    loan.principal = (loan.principal - principal).max(0);
    if loan.debt == 0 {
        loan.principal = 0;
    }
    (interest, principal)
}

/// Books a payment into the pool: principal back to idle liquidity, interest
/// to reserves and lenders.
fn settle(env: &Env, interest: i128, principal: i128) -> Result<(), Error> {
    let params = rate_model::read_params(env);
    let mut pool = pool::read_pool(env);
    pool::return_principal(&mut pool, principal);
    pool::collect_interest(&mut pool, interest, params.reserve_factor_bps)?;
    pool::write_pool(env, &pool);
    Ok(())
}

pub fn repay(env: &Env, account: &Address, amount: i128) -> Result<RepaymentReceipt, Error> {
    if amount <= 0 {
        return Err(Error::InvalidAmount);
    }
    let config = storage::read_config(env)?;
    let index = accrue_index(env)?;
    let mut loan = current_loan(env, account, &index)?;
    if loan.debt == 0 {
        return Err(Error::NoDebt);
    }

    let paid = amount.min(loan.debt);
    let (interest_paid, principal_paid) = apply_payment(&mut loan, paid);
    storage::write_loan(env, account, &loan);
    settle(env, interest_paid, principal_paid)?;

    if loan.debt == 0 {
        let mut history = storage::read_history(env, account);
        history.successful_payments += 1;
        storage::write_history(env, account, &history);
    }

    token::Client::new(env, &config.liquidity_token).transfer(
        account,
        &env.current_contract_address(),
        &paid,
    );

    refresh_rate(env);
    publish_repayment_event(
        env,
        RepaymentEvent {
            account: account.clone(),
            amount: paid,
            interest_paid,
            remaining_debt: loan.debt,
            timestamp: env.ledger().timestamp(),
        },
    );
    Ok(RepaymentReceipt {
        paid,
        interest_paid,
        principal_paid,
        remaining_debt: loan.debt,
    })
}

/// Repays an unhealthy position in full on the account's behalf and hands
/// the liquidator collateral worth the debt plus the liquidation penalty.
pub fn liquidate(
    env: &Env,
    liquidator: &Address,
    account: &Address,
) -> Result<LiquidationReceipt, Error> {
    let config = storage::read_config(env)?;
    let index = accrue_index(env)?;
    let mut loan = current_loan(env, account, &index)?;

    let valuation = vault::valuation(env, &config, account)?;
    let health = vault::health(loan.debt, &valuation);
    if health.healthy {
        return Err(Error::PositionHealthy);
    }

    let debt_repaid = loan.debt;
    let (interest, principal) = apply_payment(&mut loan, debt_repaid);
    storage::write_loan(env, account, &loan);
    settle(env, interest, principal)?;

    let mut history: AccountHistory = storage::read_history(env, account);
    history.liquidation_count += 1;
    storage::write_history(env, account, &history);

    token::Client::new(env, &config.liquidity_token).transfer(
        liquidator,
        &env.current_contract_address(),
        &debt_repaid,
    );

    let target = debt_repaid
        .checked_mul((BPS + config.liquidation_penalty_bps) as i128)
        .ok_or(Error::Overflow)?
        / BPS as i128;
    let value_seized = vault::seize(env, &config, account, liquidator, target)?;

    refresh_rate(env);
    publish_liquidation_event(
        env,
        LiquidationEvent {
            account: account.clone(),
            liquidator: liquidator.clone(),
            debt_repaid,
            value_seized,
            ratio_bps: health.ratio_bps,
        },
    );
    Ok(LiquidationReceipt {
        debt_repaid,
        value_seized,
    })
}
