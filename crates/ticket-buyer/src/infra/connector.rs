use async_trait::async_trait;
use bdk_wallet::bitcoin::Network;
use std::sync::Arc;

use crate::{
    config::{MatcherSettings, UtxoSettings, WalletSettings},
    domain::Scope,
    infra::{ChainNode, Matcher, UtxoSource, Wallet},
};

/// Opens the connections a purchase needs. The transports themselves live
/// behind this trait.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect_wallet(
        &self,
        scope: &Scope,
        host: &str,
        settings: &WalletSettings,
    ) -> Result<Arc<dyn Wallet>, anyhow::Error>;

    async fn connect_node(
        &self,
        scope: &Scope,
        settings: &UtxoSettings,
        network: Network,
    ) -> Result<Arc<dyn ChainNode>, anyhow::Error>;

    /// Returns the indexer once it answered as online.
    async fn connect_indexer(
        &self,
        scope: &Scope,
        settings: &UtxoSettings,
        network: Network,
    ) -> Result<Arc<dyn UtxoSource>, anyhow::Error>;

    async fn connect_matcher(
        &self,
        scope: &Scope,
        settings: &MatcherSettings,
        utxos: Arc<dyn UtxoSource>,
    ) -> Result<Arc<dyn Matcher>, anyhow::Error>;
}

/// Finds wallets listening on the local machine.
#[async_trait]
pub trait WalletDiscovery: Send + Sync {
    async fn find_listening_wallets(
        &self,
        cert_file: Option<String>,
        network: Network,
    ) -> Result<Vec<String>, anyhow::Error>;
}
