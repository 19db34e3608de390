use async_trait::async_trait;
use bdk_wallet::bitcoin::{Amount, BlockHash, Network};
use ticket_buyer_core::{ParticipantId, Session};

use crate::{config::BuyerSettings, domain::Scope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherStatus {
    pub mainchain_hash: BlockHash,
    pub mainchain_height: u32,
    pub ticket_price: Amount,
    pub version: String,
}

/// Parameters sent to the matcher when asking to join a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipateRequest {
    pub max_amount: Amount,
    pub session_name: String,
    pub vote_address: String,
    pub pool_address: String,
    pub pool_fee_rate: f64,
    pub network: Network,
}

impl From<&BuyerSettings> for ParticipateRequest {
    fn from(settings: &BuyerSettings) -> Self {
        Self {
            max_amount: settings.max_amount(),
            session_name: settings.session_name.clone(),
            vote_address: settings.vote_address.clone(),
            pool_address: settings.pool_address.clone(),
            pool_fee_rate: settings.pool_fee_rate,
            network: settings.network,
        }
    }
}

/// Connection to the remote matchmaking service.
///
/// Every method receives the scope it must run under and is expected to give
/// up once that scope ends.
#[async_trait]
pub trait Matcher: Send + Sync {
    async fn status(&self, scope: &Scope) -> Result<MatcherStatus, anyhow::Error>;

    /// Blocks until the matcher pairs this buyer with other participants.
    async fn participate(
        &self,
        scope: &Scope,
        request: ParticipateRequest,
    ) -> Result<Session, anyhow::Error>;

    async fn generate_ticket(
        &self,
        scope: &Scope,
        session: &mut Session,
        settings: &BuyerSettings,
    ) -> Result<(), anyhow::Error>;

    async fn fund_ticket(
        &self,
        scope: &Scope,
        session: &mut Session,
        settings: &BuyerSettings,
    ) -> Result<(), anyhow::Error>;

    async fn fund_split_tx(
        &self,
        scope: &Scope,
        session: &mut Session,
        settings: &BuyerSettings,
    ) -> Result<(), anyhow::Error>;

    /// Best effort report of a failed session. Must not block the caller.
    fn send_error_report(&self, session_id: ParticipantId, error: String);

    async fn close(&self);
}
