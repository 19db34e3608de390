//! ticket-buyer: buyer side of a split stake ticket purchase
//!
//! Connects to the local wallet, a utxo source and the remote matcher, waits
//! to be matched with other buyers and then walks the shared session through
//! ticket generation, signing and funding until the ticket is published.

pub mod config;
pub mod domain;
pub mod infra;

pub use config::*;
pub use domain::{
    BuyError, Error as BuyerError, JitterSource, LogReporter, MatchedSession, Progress,
    PublicationWatcher, PurchaseExecutor, Reporter, Scope, ScopeEnd, SessionCoordinator,
    SessionWaiter, SyncMonitor,
};
pub use infra::*;
pub use ticket_buyer_core::{Session, Stage};
