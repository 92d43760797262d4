//! Price oracle adapter.
//!
//! Wraps the external price feeds configured per collateral token. Collateral
//! valuation refuses prices older than `LedgerConfig::max_price_age`; the
//! rate model reads through [`try_fetch_signal`], which never fails.

use soroban_sdk::{contractclient, Address, Env};

use crate::types::{CollateralTokenConfig, Error, LedgerConfig, PriceData};

/// External price feed boundary.
#[allow(dead_code)]
#[contractclient(name = "PriceFeedClient")]
pub trait PriceFeed {
    fn get_price(env: Env, asset: Address) -> PriceData;
}

/// Raw feed read; `None` if the feed call fails or reports a non-positive price.
pub fn try_fetch_signal(env: &Env, feed: &Address, asset: &Address) -> Option<PriceData> {
    match PriceFeedClient::new(env, feed).try_get_price(asset) {
        Ok(Ok(data)) if data.price > 0 => Some(data),
        _ => None,
    }
}

/// Price used for collateral valuation.
pub fn fetch_price(
    env: &Env,
    config: &LedgerConfig,
    token: &Address,
    token_config: &CollateralTokenConfig,
) -> Result<PriceData, Error> {
    let data =
        try_fetch_signal(env, &token_config.price_feed, token).ok_or(Error::OracleUnavailable)?;
    let age = env.ledger().timestamp().saturating_sub(data.updated_at);
    if age > config.max_price_age {
        return Err(Error::StalePrice);
    }
    Ok(data)
}

/// `amount * price / 10^decimals`, in liquidity token units.
pub fn value_of(amount: i128, price: &PriceData) -> Result<i128, Error> {
    let scale = 10_i128
        .checked_pow(price.decimals)
        .ok_or(Error::Overflow)?;
    amount
        .checked_mul(price.price)
        .map(|v| v / scale)
        .ok_or(Error::Overflow)
}

/// Token amount worth at least `value` (rounded up).
pub fn amount_for_value(value: i128, price: &PriceData) -> Result<i128, Error> {
    let scale = 10_i128
        .checked_pow(price.decimals)
        .ok_or(Error::Overflow)?;
    let numerator = value.checked_mul(scale).ok_or(Error::Overflow)?;
    Ok((numerator + price.price - 1) / price.price)
}
