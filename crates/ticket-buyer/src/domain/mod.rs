mod coordinator;
mod executor;
mod publication_watcher;
mod reporter;
mod scope;
mod sync_monitor;
mod waiter;

pub use coordinator::SessionCoordinator;
pub use executor::PurchaseExecutor;
pub use publication_watcher::PublicationWatcher;
pub use reporter::{LogReporter, Progress, Reporter};
pub use scope::{Scope, ScopeEnd};
pub use sync_monitor::{JitterSource, SyncMonitor};
pub use waiter::{MatchedSession, SessionWaiter};

use bdk_wallet::bitcoin::{Amount, BlockHash, Txid};
use std::fmt;
use thiserror::Error;
use ticket_buyer_core::CoreError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("timeout while waiting for session in matcher")]
    MatchTimeout,
    #[error("all session watchers stopped without a result")]
    WatchersExhausted,
    #[error("matcher mainchain hash ({matcher}) different than wallet mainchain hash ({wallet})")]
    OutOfSync { matcher: BlockHash, wallet: BlockHash },
    #[error("mainchain tip of wallet ({wallet}) not the same as matcher ({matcher})")]
    TipHashMismatch { wallet: BlockHash, matcher: BlockHash },
    #[error("mainchain height of wallet ({wallet}) not the same as matcher ({matcher})")]
    TipHeightMismatch { wallet: u32, matcher: u32 },
    #[error("ticket price of wallet ({wallet}) not the same as matcher ({matcher})")]
    TicketPriceMismatch { wallet: Amount, matcher: Amount },
    #[error("wrong ticket {published} published to the network, expected {expected}")]
    WrongTicketPublished { expected: Txid, published: Txid },
    #[error("canceled while waiting for published transactions")]
    PublicationWaitCancelled,
    #[error("timed out while waiting for published transactions")]
    PublicationWaitExpired,
    #[error("found {0} running wallets, expected exactly one")]
    WalletDiscovery(usize),
    #[error("no wallet host configured and wallet discovery is unavailable")]
    NoWalletHost,
    #[error("{0}")]
    Scope(#[from] ScopeEnd),
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Outcome of a failed purchase attempt.
///
/// Failures the matcher is already aware of, or caused by it, are
/// unreportable and never sent back to it.
#[derive(Debug)]
pub enum BuyError {
    Reportable(anyhow::Error),
    Unreportable(anyhow::Error),
    Cancelled,
}

impl BuyError {
    pub fn reportable(err: impl Into<anyhow::Error>) -> Self {
        Self::Reportable(err.into())
    }

    pub fn unreportable(err: impl Into<anyhow::Error>) -> Self {
        Self::Unreportable(err.into())
    }

    pub fn is_reportable(&self) -> bool {
        matches!(self, Self::Reportable(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Adds context to the underlying error, keeping its classification.
    pub fn context(self, context: &'static str) -> Self {
        match self {
            Self::Reportable(err) => Self::Reportable(err.context(context)),
            Self::Unreportable(err) => Self::Unreportable(err.context(context)),
            Self::Cancelled => Self::Cancelled,
        }
    }

    /// Underlying error, `None` for cancellations.
    pub fn inner(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Reportable(err) | Self::Unreportable(err) => Some(err),
            Self::Cancelled => None,
        }
    }
}

impl fmt::Display for BuyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reportable(err) | Self::Unreportable(err) => write!(f, "{:#}", err),
            Self::Cancelled => write!(f, "purchase canceled by caller"),
        }
    }
}

impl std::error::Error for BuyError {}
