//! Per-account collateral balances and their valuation.

use soroban_sdk::{symbol_short, token, Address, Env};

use crate::events::{publish_collateral_event, CollateralEvent};
use crate::oracle;
use crate::storage;
use crate::types::{CollateralHealth, CollateralTokenConfig, Error, LedgerConfig, BPS};

/// Collateral of one account, priced at the current oracle prices.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Valuation {
    /// Market value, no discount.
    pub raw: i128,
    /// LTV-discounted value, used for borrowing capacity.
    pub discounted: i128,
    /// Σ raw value × liquidation threshold, for the weighted threshold.
    weighted_threshold: i128,
}

impl Valuation {
    /// Value-weighted liquidation threshold (0 without collateral).
    pub fn threshold_bps(&self) -> u32 {
        if self.raw <= 0 {
            return 0;
        }
        (self.weighted_threshold / self.raw) as u32
    }

    /// Largest debt that keeps the position at or above the liquidation threshold.
    pub fn health_cap(&self) -> i128 {
        let threshold = self.threshold_bps();
        if threshold == 0 {
            return 0;
        }
        self.raw.saturating_mul(BPS as i128) / threshold as i128
    }
}

pub fn validate_token_config(config: &CollateralTokenConfig) -> Result<(), Error> {
    if config.ltv_bps == 0 || config.ltv_bps > BPS || config.liquidation_threshold_bps < BPS {
        return Err(Error::InvalidConfig);
    }
    Ok(())
}

pub fn valuation(env: &Env, config: &LedgerConfig, account: &Address) -> Result<Valuation, Error> {
    let mut v = Valuation::default();
    for token in storage::read_collateral_tokens(env).iter() {
        let balance = storage::read_collateral(env, account, &token);
        if balance == 0 {
            continue;
        }
        let token_config = storage::read_token_config(env, &token).ok_or(Error::TokenNotAllowed)?;
        let price = oracle::fetch_price(env, config, &token, &token_config)?;
        let value = oracle::value_of(balance, &price)?;

        v.raw = v.raw.checked_add(value).ok_or(Error::Overflow)?;
        v.discounted = value
            .checked_mul(token_config.ltv_bps as i128)
            .map(|d| d / BPS as i128)
            .and_then(|d| d.checked_add(v.discounted))
            .ok_or(Error::Overflow)?;
        v.weighted_threshold = value
            .checked_mul(token_config.liquidation_threshold_bps as i128)
            .and_then(|w| w.checked_add(v.weighted_threshold))
            .ok_or(Error::Overflow)?;
    }
    Ok(v)
}

/// Health of a position owing `debt` against `valuation`.
pub fn health(debt: i128, valuation: &Valuation) -> CollateralHealth {
    let threshold_bps = valuation.threshold_bps();
    if debt <= 0 {
        return CollateralHealth {
            healthy: true,
            ratio_bps: u32::MAX,
            threshold_bps,
        };
    }
    let ratio = valuation.raw.saturating_mul(BPS as i128) / debt;
    let ratio_bps = ratio.min(u32::MAX as i128 - 1) as u32;
    CollateralHealth {
        healthy: valuation.raw > 0 && ratio_bps >= threshold_bps,
        ratio_bps,
        threshold_bps,
    }
}

pub fn deposit(env: &Env, account: &Address, token: &Address, amount: i128) -> Result<i128, Error> {
    if amount <= 0 {
        return Err(Error::InvalidAmount);
    }
    match storage::read_token_config(env, token) {
        Some(config) if config.allowed => {}
        _ => return Err(Error::TokenNotAllowed),
    }

    let balance = storage::read_collateral(env, account, token)
        .checked_add(amount)
        .ok_or(Error::Overflow)?;
    storage::write_collateral(env, account, token, balance);

    token::Client::new(env, token).transfer(account, &env.current_contract_address(), &amount);

    publish_collateral_event(
        env,
        symbol_short!("deposit"),
        CollateralEvent {
            account: account.clone(),
            token: token.clone(),
            amount,
            new_balance: balance,
        },
    );
    Ok(balance)
}

/// Withdraws collateral; with outstanding `debt` the remaining position must
/// stay at or above its liquidation threshold.
pub fn withdraw(
    env: &Env,
    config: &LedgerConfig,
    account: &Address,
    token: &Address,
    amount: i128,
    debt: i128,
) -> Result<i128, Error> {
    if amount <= 0 {
        return Err(Error::InvalidAmount);
    }
    let held = storage::read_collateral(env, account, token);
    if amount > held {
        return Err(Error::InsufficientBalance);
    }
    let balance = held - amount;
    storage::write_collateral(env, account, token, balance);

    if debt > 0 && !health(debt, &valuation(env, config, account)?).healthy {
        return Err(Error::WithdrawalWouldUndercollateralize);
    }

    token::Client::new(env, token).transfer(&env.current_contract_address(), account, &amount);

    publish_collateral_event(
        env,
        symbol_short!("withdraw"),
        CollateralEvent {
            account: account.clone(),
            token: token.clone(),
            amount,
            new_balance: balance,
        },
    );
    Ok(balance)
}

/// Hands collateral worth at least `value` (or everything, if less) to
/// `liquidator`, walking tokens in configuration order. Returns the value moved.
pub fn seize(
    env: &Env,
    config: &LedgerConfig,
    account: &Address,
    liquidator: &Address,
    value: i128,
) -> Result<i128, Error> {
    let mut remaining = value;
    let mut seized: i128 = 0;
    for token in storage::read_collateral_tokens(env).iter() {
        if remaining <= 0 {
            break;
        }
        let held = storage::read_collateral(env, account, &token);
        if held == 0 {
            continue;
        }
        let token_config = storage::read_token_config(env, &token).ok_or(Error::TokenNotAllowed)?;
        let price = oracle::fetch_price(env, config, &token, &token_config)?;
        let take = oracle::amount_for_value(remaining, &price)?.min(held);
        let taken_value = oracle::value_of(take, &price)?;

        storage::write_collateral(env, account, &token, held - take);
        token::Client::new(env, &token).transfer(&env.current_contract_address(), liquidator, &take);

        remaining -= taken_value;
        seized = seized.checked_add(taken_value).ok_or(Error::Overflow)?;
    }
    Ok(seized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valuation(raw: i128, threshold: u32) -> Valuation {
        Valuation {
            raw,
            discounted: raw * 8 / 10,
            weighted_threshold: raw * threshold as i128,
        }
    }

    #[test]
    fn no_debt_is_always_healthy() {
        let h = health(0, &Valuation::default());
        assert!(h.healthy);
        assert_eq!(h.ratio_bps, u32::MAX);
    }

    #[test]
    fn ratio_compares_against_threshold() {
        let v = valuation(150, 13_000);
        let h = health(100, &v);
        assert_eq!(h.ratio_bps, 15_000);
        assert_eq!(h.threshold_bps, 13_000);
        assert!(h.healthy);

        let h = health(100, &valuation(120, 13_000));
        assert_eq!(h.ratio_bps, 12_000);
        assert!(!h.healthy);

        // exactly at the threshold counts as healthy
        assert!(health(100, &valuation(130, 13_000)).healthy);
    }

    #[test]
    fn debt_without_collateral_is_unhealthy() {
        assert!(!health(1, &Valuation::default()).healthy);
    }

    #[test]
    fn health_cap_keeps_threshold() {
        let v = valuation(1_300, 13_000);
        assert_eq!(v.health_cap(), 1_000);
        assert!(health(v.health_cap(), &v).healthy);
        assert!(!health(v.health_cap() + 1, &v).healthy);
    }

    #[test]
    fn token_config_bounds() {
        let env = soroban_sdk::Env::default();
        let feed = <Address as soroban_sdk::testutils::Address>::generate(&env);
        let mut config = CollateralTokenConfig {
            allowed: true,
            price_feed: feed,
            liquidation_threshold_bps: 13_000,
            ltv_bps: 8_000,
        };
        assert_eq!(validate_token_config(&config), Ok(()));
        config.liquidation_threshold_bps = 9_000;
        assert_eq!(validate_token_config(&config), Err(Error::InvalidConfig));
    }
}
