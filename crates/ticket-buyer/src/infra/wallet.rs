use async_trait::async_trait;
use bdk_wallet::bitcoin::{Amount, BlockHash, Network, Txid};
use secrecy::SecretString;
use std::sync::Arc;
use ticket_buyer_core::Session;
use tokio::sync::Notify;

use crate::{config::BuyerSettings, domain::Scope};

/// Chain view of the local wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainInfo {
    pub best_block_hash: BlockHash,
    pub best_block_height: u32,
    pub ticket_price: Amount,
}

#[async_trait]
pub trait Wallet: Send + Sync {
    async fn check_network(&self, scope: &Scope, network: Network) -> Result<(), anyhow::Error>;

    async fn test_vote_address(
        &self,
        scope: &Scope,
        settings: &BuyerSettings,
    ) -> Result<(), anyhow::Error>;

    async fn test_passphrase(
        &self,
        scope: &Scope,
        passphrase: &SecretString,
    ) -> Result<(), anyhow::Error>;

    async fn test_funds(&self, scope: &Scope, settings: &BuyerSettings)
        -> Result<(), anyhow::Error>;

    /// Watches the wallet while a match is pending. Returns `Ok(())` once the
    /// scope ends and an error as soon as the wallet can't take part in a
    /// session anymore.
    async fn wait_ready_for_session(&self, scope: &Scope) -> Result<(), anyhow::Error>;

    async fn current_chain_info(&self, scope: &Scope) -> Result<ChainInfo, anyhow::Error>;

    async fn generate_outputs(
        &self,
        scope: &Scope,
        session: &mut Session,
        settings: &BuyerSettings,
    ) -> Result<(), anyhow::Error>;

    async fn sign_transactions(
        &self,
        scope: &Scope,
        session: &mut Session,
        settings: &BuyerSettings,
        passphrase: &SecretString,
    ) -> Result<(), anyhow::Error>;

    /// Starts watching the network for the session transactions and returns
    /// without waiting for them.
    async fn monitor_session(&self, scope: &Scope, session: &Session)
        -> Result<(), anyhow::Error>;

    fn published_split_tx(&self) -> bool;

    /// Hash of the ticket published for the monitored session, if any.
    fn published_ticket_tx(&self) -> Option<Txid>;

    /// Notified whenever monitoring observes a new transaction. Wallets
    /// without push notifications are polled instead.
    fn publication_notifier(&self) -> Option<Arc<Notify>> {
        None
    }

    async fn close(&self);
}
