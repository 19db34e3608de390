//! Shared error types

use bdk_wallet::bitcoin::{Amount, OutPoint};
use thiserror::Error;

/// Errors raised when a session or its lottery inputs break an invariant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("participant list has {actual} entries but the session expects {expected}")]
    ParticipantCount { expected: usize, actual: usize },

    #[error("own participant index already assigned to {current}, refusing to change it to {requested}")]
    IndexAlreadyAssigned { current: usize, requested: usize },

    #[error("participant index {index} out of range for {count} participants")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("secret number cannot be revealed before its hash was sent to the matcher")]
    RevealBeforeCommit,

    #[error("lottery inputs have mismatched lengths: {hashes} hashes, {amounts} amounts, {addresses} vote addresses")]
    LotteryInputMismatch {
        hashes: usize,
        amounts: usize,
        addresses: usize,
    },

    #[error("lottery requires at least one participant")]
    EmptyLottery,

    #[error("total lottery amount must be positive, got {0}")]
    InvalidLotteryTotal(Amount),

    #[error("session is missing its {0}")]
    MissingArtifact(&'static str),

    #[error("split input {0} not found in the utxo map")]
    UnresolvedSplitInput(OutPoint),

    #[error("expected {expected} ticket signatures, found {actual}")]
    IncompleteSignatures { expected: usize, actual: usize },

    #[error("participant {0} has not revealed its secret number")]
    SecretNotRevealed(usize),

    #[error("secret number of participant {0} does not match its committed hash")]
    SecretHashMismatch(usize),

    #[error("recorded voter index {recorded} differs from recomputed index {computed}")]
    VoterIndexMismatch { recorded: usize, computed: usize },

    #[error("recorded selected coin {recorded} differs from recomputed coin {computed}")]
    SelectedCoinMismatch { recorded: Amount, computed: Amount },
}
