//! One-shot nullifier registry.
//!
//! A single global set shared by proof submissions and borrow calls. There is
//! no removal path.

use soroban_sdk::{BytesN, Env};

use crate::storage::{DataKey, NULLIFIER_BUMP_AMOUNT, NULLIFIER_LIFETIME_THRESHOLD};
use crate::types::Error;

pub fn is_consumed(env: &Env, nullifier: &BytesN<32>) -> bool {
    env.storage()
        .persistent()
        .has(&DataKey::Nullifier(nullifier.clone()))
}

/// Marks `nullifier` as used; fails if it already was.
pub fn consume(env: &Env, nullifier: &BytesN<32>) -> Result<(), Error> {
    let key = DataKey::Nullifier(nullifier.clone());
    if env.storage().persistent().has(&key) {
        return Err(Error::ReplayedProof);
    }
    env.storage().persistent().set(&key, &true);
    env.storage()
        .persistent()
        .extend_ttl(&key, NULLIFIER_LIFETIME_THRESHOLD, NULLIFIER_BUMP_AMOUNT);
    Ok(())
}
