use async_trait::async_trait;
use bdk_wallet::bitcoin::Amount;
use std::sync::Arc;
use ticket_buyer_core::UtxoMap;

use crate::domain::Scope;

/// Source of the funding outputs the matcher needs to build a split
/// transaction.
#[async_trait]
pub trait UtxoSource: Send + Sync {
    async fn candidate_utxos(&self, target: Amount) -> Result<UtxoMap, anyhow::Error>;
}

/// Connection to a full validating node.
#[async_trait]
pub trait ChainNode: Send + Sync {
    /// Same contract as [`crate::Wallet::wait_ready_for_session`].
    async fn wait_ready_for_session(&self, scope: &Scope) -> Result<(), anyhow::Error>;

    async fn candidate_utxos(&self, target: Amount) -> Result<UtxoMap, anyhow::Error>;
}

/// Serves utxos straight from a connected node.
pub struct NodeUtxoSource {
    node: Arc<dyn ChainNode>,
}

impl NodeUtxoSource {
    pub fn new(node: Arc<dyn ChainNode>) -> Self {
        Self { node }
    }
}

#[async_trait]
impl UtxoSource for NodeUtxoSource {
    async fn candidate_utxos(&self, target: Amount) -> Result<UtxoMap, anyhow::Error> {
        self.node.candidate_utxos(target).await
    }
}
