//! Storage keys, TTL policy and admin/config access.

use soroban_sdk::{contracttype, Address, BytesN, Env, Vec};

use crate::types::{
    AccountHistory, CollateralTokenConfig, CreditProfile, Error, LedgerConfig, LenderRecord,
    LoanData, ProofType,
};

pub(crate) const DAY_IN_LEDGERS: u32 = 17280;
pub(crate) const INSTANCE_BUMP_AMOUNT: u32 = 7 * DAY_IN_LEDGERS;
pub(crate) const INSTANCE_LIFETIME_THRESHOLD: u32 = INSTANCE_BUMP_AMOUNT - DAY_IN_LEDGERS;

pub(crate) const ACCOUNT_BUMP_AMOUNT: u32 = 30 * DAY_IN_LEDGERS;
pub(crate) const ACCOUNT_LIFETIME_THRESHOLD: u32 = ACCOUNT_BUMP_AMOUNT - DAY_IN_LEDGERS;

/// Nullifiers outlive every other entry; an archived one still blocks reuse
/// because it has to be restored before it can be read again.
pub(crate) const NULLIFIER_BUMP_AMOUNT: u32 = 120 * DAY_IN_LEDGERS;
pub(crate) const NULLIFIER_LIFETIME_THRESHOLD: u32 = NULLIFIER_BUMP_AMOUNT - DAY_IN_LEDGERS;

#[derive(Clone)]
#[contracttype]
pub enum DataKey {
    // instance
    Admin,
    Config,
    RateParams,
    RateState,
    RiskSignal,
    Verifier,
    CollateralTokens,
    BorrowIndex,
    Pool,
    Reentrancy,
    // persistent
    TokenConfig(Address),
    ImageId(ProofType),
    TrustedSource(BytesN<32>),
    Nullifier(BytesN<32>),
    Collateral(Address, Address),
    Loan(Address),
    History(Address),
    Profile(Address),
    Lender(Address),
}

pub fn bump_instance(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
}

pub fn is_initialized(env: &Env) -> bool {
    env.storage().instance().has(&DataKey::Admin)
}

pub fn read_admin(env: &Env) -> Result<Address, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Admin)
        .ok_or(Error::NotInitialized)
}

pub fn write_admin(env: &Env, admin: &Address) {
    env.storage().instance().set(&DataKey::Admin, admin);
}

/// Loads the admin and requires its authorization.
pub fn require_admin_auth(env: &Env) -> Result<Address, Error> {
    let admin = read_admin(env)?;
    admin.require_auth();
    Ok(admin)
}

pub fn read_config(env: &Env) -> Result<LedgerConfig, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Config)
        .ok_or(Error::NotInitialized)
}

pub fn write_config(env: &Env, config: &LedgerConfig) {
    env.storage().instance().set(&DataKey::Config, config);
}

pub fn read_verifier(env: &Env) -> Result<Address, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Verifier)
        .ok_or(Error::NotInitialized)
}

pub fn write_verifier(env: &Env, verifier: &Address) {
    env.storage().instance().set(&DataKey::Verifier, verifier);
}

/// Collateral tokens in the order they were first configured.
pub fn read_collateral_tokens(env: &Env) -> Vec<Address> {
    env.storage()
        .instance()
        .get(&DataKey::CollateralTokens)
        .unwrap_or_else(|| Vec::new(env))
}

pub fn read_token_config(env: &Env, token: &Address) -> Option<CollateralTokenConfig> {
    env.storage()
        .persistent()
        .get(&DataKey::TokenConfig(token.clone()))
}

pub fn write_token_config(env: &Env, token: &Address, config: &CollateralTokenConfig) {
    let key = DataKey::TokenConfig(token.clone());
    env.storage().persistent().set(&key, config);
    env.storage()
        .persistent()
        .extend_ttl(&key, ACCOUNT_LIFETIME_THRESHOLD, ACCOUNT_BUMP_AMOUNT);

    let mut tokens = read_collateral_tokens(env);
    if !tokens.contains(token) {
        tokens.push_back(token.clone());
        env.storage()
            .instance()
            .set(&DataKey::CollateralTokens, &tokens);
    }
}

fn read_persistent<T>(env: &Env, key: &DataKey) -> Option<T>
where
    T: soroban_sdk::TryFromVal<Env, soroban_sdk::Val>,
{
    let value = env.storage().persistent().get(key);
    if value.is_some() {
        env.storage()
            .persistent()
            .extend_ttl(key, ACCOUNT_LIFETIME_THRESHOLD, ACCOUNT_BUMP_AMOUNT);
    }
    value
}

fn write_persistent<T>(env: &Env, key: &DataKey, value: &T)
where
    T: soroban_sdk::IntoVal<Env, soroban_sdk::Val>,
{
    env.storage().persistent().set(key, value);
    env.storage()
        .persistent()
        .extend_ttl(key, ACCOUNT_LIFETIME_THRESHOLD, ACCOUNT_BUMP_AMOUNT);
}

pub fn read_collateral(env: &Env, account: &Address, token: &Address) -> i128 {
    read_persistent(env, &DataKey::Collateral(account.clone(), token.clone())).unwrap_or(0)
}

pub fn write_collateral(env: &Env, account: &Address, token: &Address, amount: i128) {
    let key = DataKey::Collateral(account.clone(), token.clone());
    if amount == 0 {
        env.storage().persistent().remove(&key);
    } else {
        write_persistent(env, &key, &amount);
    }
}

pub fn read_loan(env: &Env, account: &Address) -> Option<LoanData> {
    read_persistent(env, &DataKey::Loan(account.clone()))
}

pub fn write_loan(env: &Env, account: &Address, loan: &LoanData) {
    let key = DataKey::Loan(account.clone());
    if loan.debt == 0 {
        env.storage().persistent().remove(&key);
    } else {
        write_persistent(env, &key, loan);
    }
}

pub fn read_history(env: &Env, account: &Address) -> AccountHistory {
    read_persistent(env, &DataKey::History(account.clone())).unwrap_or_default()
}

pub fn write_history(env: &Env, account: &Address, history: &AccountHistory) {
    write_persistent(env, &DataKey::History(account.clone()), history);
}

pub fn read_profile(env: &Env, account: &Address) -> CreditProfile {
    read_persistent(env, &DataKey::Profile(account.clone())).unwrap_or_default()
}

pub fn write_profile(env: &Env, account: &Address, profile: &CreditProfile) {
    write_persistent(env, &DataKey::Profile(account.clone()), profile);
}

pub fn read_lender(env: &Env, lender: &Address) -> Option<LenderRecord> {
    read_persistent(env, &DataKey::Lender(lender.clone()))
}

pub fn write_lender(env: &Env, lender: &Address, record: &LenderRecord) {
    write_persistent(env, &DataKey::Lender(lender.clone()), record);
}

pub fn remove_lender(env: &Env, lender: &Address) {
    env.storage()
        .persistent()
        .remove(&DataKey::Lender(lender.clone()));
}

/// Marks the start of a token-moving operation.
///
/// Token contracts used here never call back, so the guard only trips if a
/// future integration does. A failed invocation rolls the flag back together
/// with everything else, so only the success path needs to clear it.
pub fn enter_guard(env: &Env) -> Result<(), Error> {
    let busy: bool = env
        .storage()
        .instance()
        .get(&DataKey::Reentrancy)
        .unwrap_or(false);
    if busy {
        return Err(Error::Reentrancy);
    }
    env.storage().instance().set(&DataKey::Reentrancy, &true);
    Ok(())
}

pub fn exit_guard(env: &Env) {
    env.storage().instance().set(&DataKey::Reentrancy, &false);
}
