//! Lender pool: supplied liquidity, interest distribution and early-exit penalties.
//!
//! Collected interest is spread through a per-unit index instead of walking
//! every lender: each lender's `pending_interest` catches up with
//! `balance * (pool.interest_index - record.interest_index)` whenever an
//! operation touches it.

use soroban_sdk::{symbol_short, token, Address, Env};

use crate::events::{publish_lender_event, LenderEvent};
use crate::storage::{self, DataKey};
use crate::types::{Error, LenderRecord, LenderWithdrawal, PoolState, BPS};

/// Fixed-point scale of `PoolState::interest_index`.
pub const INTEREST_SCALE: i128 = 1_000_000_000_000_000_000;

pub fn read_pool(env: &Env) -> PoolState {
    env.storage()
        .instance()
        .get(&DataKey::Pool)
        .unwrap_or_default()
}

pub fn write_pool(env: &Env, pool: &PoolState) {
    env.storage().instance().set(&DataKey::Pool, pool);
}

/// Principal not currently lent out.
pub fn idle_liquidity(pool: &PoolState) -> i128 {
    pool.total_supplied - pool.total_borrowed
}

/// Moves `amount` of idle principal to a borrower.
pub fn draw_liquidity(pool: &mut PoolState, amount: i128) -> Result<(), Error> {
    if amount > idle_liquidity(pool) {
        return Err(Error::InsufficientLiquidity);
    }
    pool.total_borrowed = pool
        .total_borrowed
        .checked_add(amount)
        .ok_or(Error::Overflow)?;
    Ok(())
}

pub fn return_principal(pool: &mut PoolState, amount: i128) {
    pool.total_borrowed = (pool.total_borrowed - amount).max(0);
}

/// Spreads `amount` over current suppliers; rounding dust goes to reserves.
fn distribute(pool: &mut PoolState, amount: i128) -> Result<(), Error> {
    if amount <= 0 {
        return Ok(());
    }
    if pool.total_supplied <= 0 {
        pool.reserves = pool.reserves.checked_add(amount).ok_or(Error::Overflow)?;
        return Ok(());
    }
    let scaled = amount.checked_mul(INTEREST_SCALE).ok_or(Error::Overflow)?;
    let per_unit = scaled / pool.total_supplied;
    let distributed = per_unit * pool.total_supplied / INTEREST_SCALE;
    pool.interest_index = pool
        .interest_index
        .checked_add(per_unit)
        .ok_or(Error::Overflow)?;
    pool.reserves = pool
        .reserves
        .checked_add(amount - distributed)
        .ok_or(Error::Overflow)?;
    Ok(())
}

/// Books borrower interest: the reserve factor share to reserves, the rest to lenders.
pub fn collect_interest(
    pool: &mut PoolState,
    interest: i128,
    reserve_factor_bps: u32,
) -> Result<(), Error> {
    if interest <= 0 {
        return Ok(());
    }
    let reserve_cut = interest
        .checked_mul(reserve_factor_bps as i128)
        .ok_or(Error::Overflow)?
        / BPS as i128;
    pool.reserves = pool.reserves.checked_add(reserve_cut).ok_or(Error::Overflow)?;
    pool.total_interest_collected = pool
        .total_interest_collected
        .checked_add(interest)
        .ok_or(Error::Overflow)?;
    distribute(pool, interest - reserve_cut)
}

fn sync(pool: &PoolState, record: &mut LenderRecord, now: u64) -> Result<(), Error> {
    let delta = pool.interest_index - record.interest_index;
    if delta > 0 && record.balance > 0 {
        let accrued = record
            .balance
            .checked_mul(delta)
            .ok_or(Error::Overflow)?
            / INTEREST_SCALE;
        record.pending_interest = record
            .pending_interest
            .checked_add(accrued)
            .ok_or(Error::Overflow)?;
    }
    record.interest_index = pool.interest_index;
    record.last_distribution_time = now;
    Ok(())
}

/// Lender record with interest distributed up to now, without writing it.
pub fn lender(env: &Env, lender: &Address) -> Result<Option<LenderRecord>, Error> {
    let Some(mut record) = storage::read_lender(env, lender) else {
        return Ok(None);
    };
    sync(&read_pool(env), &mut record, env.ledger().timestamp())?;
    Ok(Some(record))
}

fn liquidity_token(env: &Env) -> Result<token::Client<'_>, Error> {
    let config = storage::read_config(env)?;
    Ok(token::Client::new(env, &config.liquidity_token))
}

pub fn deposit_funds(env: &Env, lender: &Address, amount: i128) -> Result<LenderRecord, Error> {
    if amount <= 0 {
        return Err(Error::InvalidAmount);
    }
    let config = storage::read_config(env)?;
    let now = env.ledger().timestamp();
    let mut pool = read_pool(env);
    let mut record = storage::read_lender(env, lender).unwrap_or(LenderRecord {
        interest_index: pool.interest_index,
        ..LenderRecord::default()
    });
    sync(&pool, &mut record, now)?;

    record.balance = record.balance.checked_add(amount).ok_or(Error::Overflow)?;
    record.penalty_free_withdrawal_time = now.saturating_add(config.lockup_period);
    pool.total_supplied = pool
        .total_supplied
        .checked_add(amount)
        .ok_or(Error::Overflow)?;

    storage::write_lender(env, lender, &record);
    write_pool(env, &pool);

    token::Client::new(env, &config.liquidity_token).transfer(
        lender,
        &env.current_contract_address(),
        &amount,
    );

    publish_lender_event(
        env,
        symbol_short!("deposit"),
        LenderEvent {
            lender: lender.clone(),
            amount,
            penalty: 0,
            new_balance: record.balance,
        },
    );
    Ok(record)
}

/// Withdraws principal. Before `penalty_free_withdrawal_time` the early
/// withdrawal penalty is kept back and handed to the remaining lenders. A
/// full withdrawal also pays out pending interest and drops the record.
pub fn withdraw_funds(
    env: &Env,
    lender: &Address,
    amount: i128,
) -> Result<LenderWithdrawal, Error> {
    if amount <= 0 {
        return Err(Error::InvalidAmount);
    }
    let config = storage::read_config(env)?;
    let now = env.ledger().timestamp();
    let mut pool = read_pool(env);
    let mut record = storage::read_lender(env, lender).ok_or(Error::InsufficientBalance)?;
    sync(&pool, &mut record, now)?;

    if amount > record.balance {
        return Err(Error::InsufficientBalance);
    }
    if amount > idle_liquidity(&pool) {
        return Err(Error::InsufficientPoolLiquidity);
    }

    let penalty = if now < record.penalty_free_withdrawal_time {
        amount
            .checked_mul(config.early_withdrawal_penalty_bps as i128)
            .ok_or(Error::Overflow)?
            / BPS as i128
    } else {
        0
    };

    record.balance -= amount;
    pool.total_supplied -= amount;
    distribute(&mut pool, penalty)?;

    let mut interest_paid = 0;
    if record.balance == 0 {
        interest_paid = record.pending_interest;
        record.earned_interest = record
            .earned_interest
            .checked_add(interest_paid)
            .ok_or(Error::Overflow)?;
        storage::remove_lender(env, lender);
    } else {
        storage::write_lender(env, lender, &record);
    }
    write_pool(env, &pool);

    let received = amount - penalty;
    token::Client::new(env, &config.liquidity_token).transfer(
        &env.current_contract_address(),
        lender,
        &(received + interest_paid),
    );

    publish_lender_event(
        env,
        symbol_short!("withdraw"),
        LenderEvent {
            lender: lender.clone(),
            amount: received,
            penalty,
            new_balance: record.balance,
        },
    );
    Ok(LenderWithdrawal {
        requested: amount,
        penalty,
        received,
        interest_paid,
    })
}

pub fn claim_interest(env: &Env, lender: &Address) -> Result<i128, Error> {
    let pool = read_pool(env);
    let mut record = storage::read_lender(env, lender).ok_or(Error::NothingToClaim)?;
    sync(&pool, &mut record, env.ledger().timestamp())?;

    let amount = record.pending_interest;
    if amount <= 0 {
        return Err(Error::NothingToClaim);
    }
    record.pending_interest = 0;
    record.earned_interest = record.earned_interest.checked_add(amount).ok_or(Error::Overflow)?;
    storage::write_lender(env, lender, &record);

    liquidity_token(env)?.transfer(&env.current_contract_address(), lender, &amount);

    publish_lender_event(
        env,
        symbol_short!("claim"),
        LenderEvent {
            lender: lender.clone(),
            amount,
            penalty: 0,
            new_balance: record.balance,
        },
    );
    Ok(amount)
}

pub fn withdraw_reserves(env: &Env, to: &Address, amount: i128) -> Result<(), Error> {
    if amount <= 0 {
        return Err(Error::InvalidAmount);
    }
    let mut pool = read_pool(env);
    if amount > pool.reserves {
        return Err(Error::InsufficientBalance);
    }
    pool.reserves -= amount;
    write_pool(env, &pool);
    liquidity_token(env)?.transfer(&env.current_contract_address(), to, &amount);
    Ok(())
}
