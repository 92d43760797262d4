//! Credit score aggregation over verified zero-knowledge attestations.
//!
//! Each [`ProofType`] has a fixed big-endian journal layout. A submission burns
//! its nullifier first; everything after that (verifier call, decoding,
//! identity binding, source checks) produces a [`ProofVerdict`] instead of an
//! error so the burned nullifier is persisted either way.
//!
//! Blend policy: the final score is the strongest verified sub-score plus
//! [`CORROBORATION_BONUS`] for every additional verified proof type, capped at
//! [`MAX_CREDIT_SCORE`]. Missing proof types carry no weight, and adding one
//! can never lower the result.

use soroban_sdk::{contractclient, xdr::ToXdr, Address, Bytes, BytesN, Env};

use crate::events::{
    publish_proof_accepted, publish_proof_rejected, ProofAcceptedEvent, ProofRejectedEvent,
};
use crate::nullifier;
use crate::storage::{self, DataKey, ACCOUNT_BUMP_AMOUNT, ACCOUNT_LIFETIME_THRESHOLD};
use crate::types::{
    CreditProfile, Error, LedgerConfig, ProofRejection, ProofType, ProofVerdict,
    MAX_CREDIT_SCORE,
};

/// Verification engine boundary.
#[allow(dead_code)]
#[contractclient(name = "VerifierClient")]
pub trait ProofVerifier {
    fn verify(env: Env, seal: Bytes, image_id: BytesN<32>, journal_digest: BytesN<32>) -> bool;
}

pub const CORROBORATION_BONUS: u32 = 25;

const ACCOUNT_SCORE_BASE: u32 = 300;
const ACCOUNT_ACTIVITY_CAP: u64 = 250;
const ACCOUNT_BALANCE_CAP: u128 = 300;
/// 0.1 ether in wei per balance point.
const BALANCE_POINT: u128 = 100_000_000_000_000_000;

/// What every journal schema must yield.
struct JournalClaims {
    account_id: BytesN<32>,
    score: u32,
}

struct ProofSchema {
    journal_len: u32,
    decode: fn(&Env, &Bytes) -> Result<JournalClaims, ProofRejection>,
}

/// Indexed by `ProofType as usize`.
static SCHEMAS: [ProofSchema; 3] = [
    ProofSchema {
        journal_len: 160,
        decode: decode_account,
    },
    ProofSchema {
        journal_len: 76,
        decode: decode_tradfi,
    },
    ProofSchema {
        journal_len: 100,
        decode: decode_nesting,
    },
];

fn schema(proof_type: ProofType) -> &'static ProofSchema {
    &SCHEMAS[proof_type as usize]
}

/// Sequential big-endian reader over a journal.
struct JournalReader<'a> {
    env: &'a Env,
    bytes: &'a Bytes,
    offset: u32,
}

impl<'a> JournalReader<'a> {
    fn new(env: &'a Env, bytes: &'a Bytes) -> Self {
        JournalReader {
            env,
            bytes,
            offset: 0,
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProofRejection> {
        let end = self
            .offset
            .checked_add(N as u32)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(ProofRejection::MalformedJournal)?;
        let mut buf = [0u8; N];
        self.bytes.slice(self.offset..end).copy_into_slice(&mut buf);
        self.offset = end;
        Ok(buf)
    }

    fn digest(&mut self) -> Result<BytesN<32>, ProofRejection> {
        let raw = self.take::<32>()?;
        Ok(BytesN::from_array(self.env, &raw))
    }

    fn u32(&mut self) -> Result<u32, ProofRejection> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    fn u64(&mut self) -> Result<u64, ProofRejection> {
        Ok(u64::from_be_bytes(self.take()?))
    }

    fn u128(&mut self) -> Result<u128, ProofRejection> {
        Ok(u128::from_be_bytes(self.take()?))
    }
}

fn is_zero(digest: &BytesN<32>) -> bool {
    digest.to_array() == [0u8; 32]
}

fn bounded_score(score: u32) -> Result<u32, ProofRejection> {
    if score > MAX_CREDIT_SCORE {
        return Err(ProofRejection::MalformedJournal);
    }
    Ok(score)
}

/// Score derived from proven on-chain activity and balance.
pub fn account_score(nonce: u64, balance: u128) -> u32 {
    let activity = nonce.saturating_mul(2).min(ACCOUNT_ACTIVITY_CAP) as u32;
    let wealth = (balance / BALANCE_POINT).min(ACCOUNT_BALANCE_CAP) as u32;
    (ACCOUNT_SCORE_BASE + activity + wealth).min(MAX_CREDIT_SCORE)
}

// account_id | nonce | balance | storage_root | code_hash | block_number | state_root
fn decode_account(env: &Env, bytes: &Bytes) -> Result<JournalClaims, ProofRejection> {
    let mut r = JournalReader::new(env, bytes);
    let account_id = r.digest()?;
    let nonce = r.u64()?;
    let balance = r.u128()?;
    let _storage_root = r.digest()?;
    let _code_hash = r.digest()?;
    let block_number = r.u64()?;
    let state_root = r.digest()?;
    if block_number == 0 || is_zero(&state_root) {
        return Err(ProofRejection::MalformedJournal);
    }
    Ok(JournalClaims {
        account_id,
        score: account_score(nonce, balance),
    })
}

// account_id | credit_score | source | attested_at
fn decode_tradfi(env: &Env, bytes: &Bytes) -> Result<JournalClaims, ProofRejection> {
    let mut r = JournalReader::new(env, bytes);
    let account_id = r.digest()?;
    let score = bounded_score(r.u32()?)?;
    let source = r.digest()?;
    let attested_at = r.u64()?;

    if !is_trusted_source(env, &source) {
        return Err(ProofRejection::UntrustedSource);
    }
    let max_age = storage::read_config(env)
        .map(|c| c.max_attestation_age)
        .unwrap_or(0);
    if env.ledger().timestamp().saturating_sub(attested_at) > max_age {
        return Err(ProofRejection::ExpiredAttestation);
    }
    Ok(JournalClaims { account_id, score })
}

// account_id | hybrid_score | inner_account_digest | inner_tradfi_digest
fn decode_nesting(env: &Env, bytes: &Bytes) -> Result<JournalClaims, ProofRejection> {
    let mut r = JournalReader::new(env, bytes);
    let account_id = r.digest()?;
    let score = bounded_score(r.u32()?)?;
    let inner_account = r.digest()?;
    let inner_tradfi = r.digest()?;
    if is_zero(&inner_account) || is_zero(&inner_tradfi) {
        return Err(ProofRejection::MalformedJournal);
    }
    Ok(JournalClaims { account_id, score })
}

/// Identity a journal must carry to be credited to `account`.
pub fn account_id(env: &Env, account: &Address) -> BytesN<32> {
    env.crypto()
        .sha256(&account.clone().to_xdr(env))
        .to_bytes()
}

/// See the module docs for the policy.
pub fn blend(profile: &CreditProfile) -> u32 {
    let components = [
        (profile.has_account_proof, profile.account_score),
        (profile.has_tradfi_proof, profile.tradfi_score),
        (profile.has_nesting_proof, profile.hybrid_score),
    ];
    let mut best: u32 = 0;
    let mut present: u32 = 0;
    for (has, score) in components {
        if has {
            best = best.max(score);
            present += 1;
        }
    }
    if present == 0 {
        return 0;
    }
    (best + CORROBORATION_BONUS * (present - 1)).min(MAX_CREDIT_SCORE)
}

/// Borrowing-power multiplier: `min_multiplier_bps` at the eligibility floor,
/// `max_multiplier_bps` at [`MAX_CREDIT_SCORE`], linear in between.
pub fn credit_multiplier_bps(score: u32, config: &LedgerConfig) -> u32 {
    if score >= MAX_CREDIT_SCORE {
        return config.max_multiplier_bps;
    }
    if score <= config.min_credit_score {
        return config.min_multiplier_bps;
    }
    let span = (MAX_CREDIT_SCORE - config.min_credit_score) as u64;
    let spread = (config.max_multiplier_bps - config.min_multiplier_bps) as u64;
    let above = (score - config.min_credit_score) as u64;
    config.min_multiplier_bps + (spread * above / span) as u32
}

pub fn read_image_id(env: &Env, proof_type: ProofType) -> Result<BytesN<32>, Error> {
    env.storage()
        .persistent()
        .get(&DataKey::ImageId(proof_type))
        .ok_or(Error::ProofTypeNotConfigured)
}

pub fn write_image_id(env: &Env, proof_type: ProofType, image_id: &BytesN<32>) {
    let key = DataKey::ImageId(proof_type);
    env.storage().persistent().set(&key, image_id);
    env.storage()
        .persistent()
        .extend_ttl(&key, ACCOUNT_LIFETIME_THRESHOLD, ACCOUNT_BUMP_AMOUNT);
}

pub fn is_trusted_source(env: &Env, source: &BytesN<32>) -> bool {
    env.storage()
        .persistent()
        .has(&DataKey::TrustedSource(source.clone()))
}

pub fn write_trusted_source(env: &Env, source: &BytesN<32>, trusted: bool) {
    let key = DataKey::TrustedSource(source.clone());
    if trusted {
        env.storage().persistent().set(&key, &true);
        env.storage()
            .persistent()
            .extend_ttl(&key, ACCOUNT_LIFETIME_THRESHOLD, ACCOUNT_BUMP_AMOUNT);
    } else {
        env.storage().persistent().remove(&key);
    }
}

/// Profile with `eligible` evaluated against the current minimum score.
pub fn profile(env: &Env, account: &Address) -> Result<CreditProfile, Error> {
    let config = storage::read_config(env)?;
    let mut profile = storage::read_profile(env, account);
    profile.eligible = profile.final_score >= config.min_credit_score;
    Ok(profile)
}

fn check(
    env: &Env,
    account: &Address,
    proof_type: ProofType,
    image_id: &BytesN<32>,
    seal: &Bytes,
    journal: &Bytes,
) -> Result<u32, ProofRejection> {
    let verifier = storage::read_verifier(env).map_err(|_| ProofRejection::InvalidProof)?;
    let digest = env.crypto().sha256(journal).to_bytes();
    let verified = matches!(
        VerifierClient::new(env, &verifier).try_verify(seal, image_id, &digest),
        Ok(Ok(true))
    );
    if !verified {
        return Err(ProofRejection::InvalidProof);
    }

    let schema = schema(proof_type);
    if journal.len() != schema.journal_len {
        return Err(ProofRejection::MalformedJournal);
    }
    let claims = (schema.decode)(env, journal)?;
    if claims.account_id != account_id(env, account) {
        return Err(ProofRejection::AccountMismatch);
    }
    Ok(claims.score)
}

fn record(
    env: &Env,
    config: &LedgerConfig,
    account: &Address,
    proof_type: ProofType,
    score: u32,
) -> CreditProfile {
    let mut profile = storage::read_profile(env, account);
    match proof_type {
        ProofType::Account => {
            profile.has_account_proof = true;
            profile.account_score = score;
        }
        ProofType::TradFi => {
            profile.has_tradfi_proof = true;
            profile.tradfi_score = score;
        }
        ProofType::Nesting => {
            profile.has_nesting_proof = true;
            profile.hybrid_score = score;
        }
    }
    profile.final_score = blend(&profile);
    profile.eligible = profile.final_score >= config.min_credit_score;
    profile.updated_at = env.ledger().timestamp();
    storage::write_profile(env, account, &profile);
    profile
}

/// Burns `nullifier`, then verifies and records the proof.
pub fn submit_proof(
    env: &Env,
    account: &Address,
    proof_type: ProofType,
    seal: &Bytes,
    journal: &Bytes,
    nullifier: &BytesN<32>,
) -> Result<ProofVerdict, Error> {
    let config = storage::read_config(env)?;
    let image_id = read_image_id(env, proof_type)?;
    nullifier::consume(env, nullifier)?;

    match check(env, account, proof_type, &image_id, seal, journal) {
        Ok(score) => {
            let profile = record(env, &config, account, proof_type, score);
            publish_proof_accepted(
                env,
                ProofAcceptedEvent {
                    account: account.clone(),
                    proof_type,
                    sub_score: score,
                    final_score: profile.final_score,
                    eligible: profile.eligible,
                },
            );
            Ok(ProofVerdict::Accepted(profile))
        }
        Err(reason) => {
            publish_proof_rejected(
                env,
                ProofRejectedEvent {
                    account: account.clone(),
                    proof_type,
                    nullifier: nullifier.clone(),
                    reason,
                },
            );
            Ok(ProofVerdict::Rejected(reason))
        }
    }
}
