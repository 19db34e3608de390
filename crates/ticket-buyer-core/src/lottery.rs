//! Commit-reveal voter lottery.
//!
//! Every participant commits to the hash of a locally generated secret number
//! before the shared ticket is built. The voter is then drawn from a
//! commitment over the ordered participant data and the mainchain tip, so any
//! participant can recompute the draw and check the matcher did not cheat.

use bdk_wallet::bitcoin::{hashes::Hash, Amount, BlockHash};
use blake2::{digest::consts::U32, Blake2b, Digest};
use rand::Rng;
use std::fmt;

use crate::CoreError;

type Blake2b256 = Blake2b<U32>;

/// Secret number generated locally by each participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SecretNumber(u64);

impl SecretNumber {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.random())
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Hash sent to the matcher as the commitment to this number.
    pub fn hash(&self) -> SecretNumberHash {
        let digest = Blake2b256::digest(self.0.to_be_bytes());
        SecretNumberHash(digest.into())
    }
}

impl fmt::Display for SecretNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SecretNumberHash([u8; 32]);

impl SecretNumberHash {
    pub fn from_byte_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for SecretNumberHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Outcome of the voter lottery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoterSelection {
    /// Coin drawn in the range `[0, total contributed amount)`
    pub coin: Amount,
    /// Participant whose contribution range contains the coin
    pub index: usize,
}

/// Hash over the ordered lottery inputs.
///
/// Order matters: reordering participants after the secret hashes were
/// committed produces a different commitment.
pub fn lottery_commitment_hash(
    secret_hashes: &[SecretNumberHash],
    amounts: &[Amount],
    vote_addresses: &[String],
    mainchain_hash: &BlockHash,
) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for hash in secret_hashes {
        hasher.update(hash.as_bytes());
    }
    for amount in amounts {
        hasher.update(amount.to_sat().to_be_bytes());
    }
    for address in vote_addresses {
        // length prefix keeps adjacent addresses from running together
        hasher.update((address.len() as u32).to_be_bytes());
        hasher.update(address.as_bytes());
    }
    hasher.update(mainchain_hash.as_byte_array());
    hasher.finalize().into()
}

/// Deterministically draws the voter for a session.
pub fn select_voter(
    secret_hashes: &[SecretNumberHash],
    amounts: &[Amount],
    vote_addresses: &[String],
    mainchain_hash: &BlockHash,
) -> Result<VoterSelection, CoreError> {
    if secret_hashes.len() != amounts.len() || amounts.len() != vote_addresses.len() {
        return Err(CoreError::LotteryInputMismatch {
            hashes: secret_hashes.len(),
            amounts: amounts.len(),
            addresses: vote_addresses.len(),
        });
    }
    if amounts.is_empty() {
        return Err(CoreError::EmptyLottery);
    }

    let total = amounts
        .iter()
        .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(*amount))
        .ok_or(CoreError::InvalidLotteryTotal(Amount::MAX))?;
    if total == Amount::ZERO {
        return Err(CoreError::InvalidLotteryTotal(total));
    }

    let commitment =
        lottery_commitment_hash(secret_hashes, amounts, vote_addresses, mainchain_hash);
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&commitment[..8]);
    let coin = u64::from_be_bytes(seed) % total.to_sat();

    let index = amounts
        .iter()
        .scan(0u64, |upper, amount| {
            *upper += amount.to_sat();
            Some(*upper)
        })
        .position(|upper| coin < upper)
        .ok_or(CoreError::InvalidLotteryTotal(total))?;

    Ok(VoterSelection {
        coin: Amount::from_sat(coin),
        index,
    })
}
