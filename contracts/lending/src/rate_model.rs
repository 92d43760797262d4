//! Utilization-driven borrow rate with oracle risk premia.
//!
//! The curve is piecewise linear around a kink. Two premia stack on top of it:
//! one when the risk-signal price is stale (or unreadable), one when it moved
//! more than `volatility_threshold_bps` since the last commit. The result is
//! clamped to `±max_rate_change_bps` around the previously committed rate and
//! never exceeds `max_rate_bps`, even when the previous rate was above it.
//!
//! [`preview`] and [`commit`] share [`target_rate`]; only `commit` writes.

use soroban_sdk::Env;

use crate::events::{publish_rate_updated, RateUpdatedEvent};
use crate::oracle;
use crate::storage::DataKey;
use crate::types::{
    Error, PriceData, RateModelParameters, RateState, RiskSignalSource, BPS, SECONDS_PER_YEAR,
};

pub const DEFAULT_PARAMS: RateModelParameters = RateModelParameters {
    base_rate_bps: 200,
    kink_utilization_bps: 8_000,
    slope_below_kink_bps: 1_000,
    slope_above_kink_bps: 6_000,
    reserve_factor_bps: 1_000,
    max_rate_bps: 10_000,
    max_rate_change_bps: 500,
    risk_premium_bps: 200,
    volatility_threshold_bps: 1_000,
    oracle_staleness_window: 3_600,
};

pub fn validate(params: &RateModelParameters) -> Result<(), Error> {
    let ok = params.base_rate_bps <= params.max_rate_bps
        && params.max_rate_bps <= BPS
        && params.kink_utilization_bps <= BPS
        && params.reserve_factor_bps <= BPS
        && params.max_rate_change_bps > 0;
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidConfig)
    }
}

/// `total_borrowed / total_supplied` in bps, 0 without supply, capped at 100%.
pub fn utilization_bps(total_borrowed: i128, total_supplied: i128) -> u32 {
    if total_supplied <= 0 || total_borrowed <= 0 {
        return 0;
    }
    let u = total_borrowed.saturating_mul(BPS as i128) / total_supplied;
    u.min(BPS as i128) as u32
}

/// Base curve, before premia and clamps.
pub fn curve_rate(params: &RateModelParameters, utilization_bps: u32) -> u64 {
    let base = params.base_rate_bps as u64;
    let below = params.slope_below_kink_bps as u64;
    let above = params.slope_above_kink_bps as u64;
    let kink = params.kink_utilization_bps as u64;
    let u = utilization_bps as u64;
    if u <= kink {
        base + below * u / BPS as u64
    } else {
        base + below * kink / BPS as u64 + above * (u - kink) / BPS as u64
    }
}

/// Whether the signal moved more than the volatility threshold since `last_price`.
fn is_volatile(params: &RateModelParameters, last_price: i128, price: i128) -> bool {
    if last_price <= 0 {
        return false;
    }
    let moved = (price - last_price)
        .unsigned_abs()
        .saturating_mul(BPS as u128)
        / last_price as u128;
    moved > params.volatility_threshold_bps as u128
}

/// Rate the model would commit now. Pure.
pub fn target_rate(
    params: &RateModelParameters,
    state: &RateState,
    utilization_bps: u32,
    signal: Option<&PriceData>,
    now: u64,
) -> u32 {
    let mut rate = curve_rate(params, utilization_bps);
    let premium = params.risk_premium_bps as u64;

    match signal {
        Some(data) => {
            if now.saturating_sub(data.updated_at) > params.oracle_staleness_window {
                rate += premium;
            }
            if is_volatile(params, state.last_price, data.price) {
                rate += premium;
            }
        }
        // an unreadable feed is priced like a stale one
        None => rate += premium,
    }

    let rate = rate.min(params.max_rate_bps as u64) as u32;
    let previous = state.borrow_rate_bps;
    let step = params.max_rate_change_bps;
    rate.clamp(previous.saturating_sub(step), previous.saturating_add(step))
        .min(params.max_rate_bps)
}

/// `amount * (1 + rate * elapsed / year)`.
pub fn accrue(amount: i128, rate_bps: u32, elapsed: u64) -> Result<i128, Error> {
    if amount == 0 || rate_bps == 0 || elapsed == 0 {
        return Ok(amount);
    }
    let denominator = BPS as i128 * SECONDS_PER_YEAR as i128;
    let interest = amount
        .checked_mul(rate_bps as i128)
        .and_then(|v| v.checked_mul(elapsed as i128))
        .ok_or(Error::Overflow)?
        / denominator;
    amount.checked_add(interest).ok_or(Error::Overflow)
}

pub fn read_params(env: &Env) -> RateModelParameters {
    env.storage()
        .instance()
        .get(&DataKey::RateParams)
        .unwrap_or(DEFAULT_PARAMS)
}

pub fn write_params(env: &Env, params: &RateModelParameters) -> Result<(), Error> {
    validate(params)?;
    env.storage().instance().set(&DataKey::RateParams, params);
    Ok(())
}

pub fn read_state(env: &Env) -> RateState {
    env.storage()
        .instance()
        .get(&DataKey::RateState)
        .unwrap_or(RateState {
            borrow_rate_bps: read_params(env).base_rate_bps,
            last_price: 0,
            updated_at: 0,
        })
}

pub fn write_risk_signal(env: &Env, source: &RiskSignalSource) {
    env.storage().instance().set(&DataKey::RiskSignal, source);
}

fn read_signal(env: &Env) -> Option<PriceData> {
    let source: Option<RiskSignalSource> = env.storage().instance().get(&DataKey::RiskSignal);
    match source {
        Some(source) => oracle::try_fetch_signal(env, &source.feed, &source.asset),
        None => None,
    }
}

/// Whether a risk feed is wired; without one the model runs on the bare curve.
fn has_signal_source(env: &Env) -> bool {
    env.storage().instance().has(&DataKey::RiskSignal)
}

fn evaluate(env: &Env, utilization_bps: u32) -> (u32, Option<PriceData>) {
    let params = read_params(env);
    let state = read_state(env);
    let now = env.ledger().timestamp();
    if !has_signal_source(env) {
        let free = RateModelParameters {
            risk_premium_bps: 0,
            ..params
        };
        return (target_rate(&free, &state, utilization_bps, None, now), None);
    }
    let signal = read_signal(env);
    (
        target_rate(&params, &state, utilization_bps, signal.as_ref(), now),
        signal,
    )
}

/// Read-only rate at the given utilization.
pub fn preview(env: &Env, utilization_bps: u32) -> u32 {
    evaluate(env, utilization_bps).0
}

/// Recomputes and persists the borrow rate.
pub fn commit(env: &Env, utilization_bps: u32) -> u32 {
    let old = read_state(env);
    let (rate, signal) = evaluate(env, utilization_bps);
    let now = env.ledger().timestamp();
    let state = RateState {
        borrow_rate_bps: rate,
        last_price: signal.map(|s| s.price).unwrap_or(old.last_price),
        updated_at: now,
    };
    env.storage().instance().set(&DataKey::RateState, &state);

    if rate != old.borrow_rate_bps {
        publish_rate_updated(
            env,
            RateUpdatedEvent {
                old_rate_bps: old.borrow_rate_bps,
                new_rate_bps: rate,
                utilization_bps,
                timestamp: now,
            },
        );
    }
    rate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> RateModelParameters {
        RateModelParameters {
            max_rate_change_bps: 10_000,
            ..DEFAULT_PARAMS
        }
    }

    fn state(rate: u32, last_price: i128) -> RateState {
        RateState {
            borrow_rate_bps: rate,
            last_price,
            updated_at: 0,
        }
    }

    fn fresh(price: i128) -> PriceData {
        PriceData {
            price,
            decimals: 7,
            updated_at: 1_000,
        }
    }

    #[test]
    fn utilization_handles_empty_pool() {
        assert_eq!(utilization_bps(0, 0), 0);
        assert_eq!(utilization_bps(500, 0), 0);
        assert_eq!(utilization_bps(250, 1_000), 2_500);
        assert_eq!(utilization_bps(1_000, 1_000), 10_000);
    }

    #[test]
    fn curve_is_continuous_at_kink() {
        let p = params();
        let at_kink = curve_rate(&p, p.kink_utilization_bps);
        let expected = p.base_rate_bps as u64
            + p.slope_below_kink_bps as u64 * p.kink_utilization_bps as u64 / 10_000;
        assert_eq!(at_kink, expected);
        assert_eq!(curve_rate(&p, p.kink_utilization_bps - 1), 999);
        assert_eq!(curve_rate(&p, p.kink_utilization_bps + 10), 1_006);
    }

    #[test]
    fn curve_steepens_above_kink() {
        let p = params();
        assert_eq!(curve_rate(&p, 0), 200);
        assert_eq!(curve_rate(&p, 4_000), 600);
        assert_eq!(curve_rate(&p, 8_000), 1_000);
        assert_eq!(curve_rate(&p, 9_000), 1_600);
        assert_eq!(curve_rate(&p, 10_000), 2_200);
    }

    #[test]
    fn stale_signal_adds_premium() {
        let p = params();
        let s = state(200, 0);
        let now = 1_000 + p.oracle_staleness_window + 1;
        assert_eq!(target_rate(&p, &s, 0, Some(&fresh(100)), 1_000), 200);
        assert_eq!(target_rate(&p, &s, 0, Some(&fresh(100)), now), 400);
        assert_eq!(target_rate(&p, &s, 0, None, 1_000), 400);
    }

    #[test]
    fn volatility_premium_stacks_with_staleness() {
        let p = params();
        let s = state(200, 100);
        // 20% move > 10% threshold
        assert_eq!(target_rate(&p, &s, 0, Some(&fresh(120)), 1_000), 400);
        let now = 1_000 + p.oracle_staleness_window + 1;
        assert_eq!(target_rate(&p, &s, 0, Some(&fresh(80)), now), 600);
        // 5% move is tolerated
        assert_eq!(target_rate(&p, &s, 0, Some(&fresh(105)), 1_000), 200);
    }

    #[test]
    fn rate_is_capped_at_max() {
        let p = RateModelParameters {
            max_rate_bps: 1_500,
            ..params()
        };
        let s = state(1_500, 100);
        assert_eq!(target_rate(&p, &s, 10_000, Some(&fresh(200)), 1_000), 1_500);
    }

    #[test]
    fn rate_change_is_clamped_per_update() {
        let p = RateModelParameters {
            max_rate_change_bps: 100,
            ..DEFAULT_PARAMS
        };
        assert_eq!(target_rate(&p, &state(200, 0), 10_000, Some(&fresh(1)), 1_000), 300);
        assert_eq!(target_rate(&p, &state(2_000, 0), 0, Some(&fresh(1)), 1_000), 1_900);
    }

    #[test]
    fn lowered_max_wins_over_step_clamp() {
        let p = RateModelParameters {
            max_rate_bps: 500,
            max_rate_change_bps: 500,
            ..DEFAULT_PARAMS
        };
        assert_eq!(target_rate(&p, &state(1_700, 0), 10_000, Some(&fresh(1)), 1_000), 500);
    }

    #[test]
    fn accrue_is_identity_without_elapsed_time() {
        assert_eq!(accrue(1_000, 500, 0).unwrap(), 1_000);
        assert_eq!(accrue(0, 500, 1_000).unwrap(), 0);
    }

    #[test]
    fn accrue_simple_interest_over_a_year() {
        assert_eq!(accrue(1_000_000, 1_000, SECONDS_PER_YEAR).unwrap(), 1_100_000);
        assert_eq!(
            accrue(1_000_000, 1_000, SECONDS_PER_YEAR / 2).unwrap(),
            1_050_000
        );
    }

    #[test]
    fn invalid_params_are_rejected() {
        let bad = RateModelParameters {
            base_rate_bps: 2_000,
            max_rate_bps: 1_000,
            ..DEFAULT_PARAMS
        };
        assert_eq!(validate(&bad), Err(Error::InvalidConfig));
        assert_eq!(validate(&DEFAULT_PARAMS), Ok(()));
    }
}
