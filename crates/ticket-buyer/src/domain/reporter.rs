use bdk_wallet::bitcoin::Txid;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, PoisonError};
use ticket_buyer_core::{Session, Stage};

use crate::{config::BuyerSettings, domain::BuyError, infra::MatcherStatus};

/// Receives progress events of a purchase. Implementations must return
/// quickly, they are called inline by the purchase flow.
pub trait Reporter: Send + Sync {
    fn report_stage(&self, stage: Stage, session: Option<&Session>, settings: &BuyerSettings);
    fn report_matcher_status(&self, status: &MatcherStatus);
    fn report_saved_session(&self, location: &str);
    fn report_wallet_discovered(&self, host: &str);
    fn report_wallet_discovery_error(&self, error: &anyhow::Error);
    fn report_split_published(&self);
    fn report_right_ticket_published(&self);
    fn report_wrong_ticket_published(&self, published: &Txid, session: &Session);
    fn report_buying_error(&self, error: &BuyError);
}

/// Reporter writing every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report_stage(&self, stage: Stage, session: Option<&Session>, settings: &BuyerSettings) {
        match (stage, session) {
            (Stage::Starting, _) => info!(
                "Starting purchase of split ticket in session '{}' (max amount {})",
                settings.session_name,
                settings.max_amount()
            ),
            (Stage::MatchesFound, Some(session)) => info!(
                "Matched in session {} with {} participants at height {}, contributing {}",
                session.id,
                session.nb_participants(),
                session.mainchain_height(),
                session.amount
            ),
            (_, Some(session)) => info!("Session {}: {}", session.id, stage),
            (_, None) => info!("Purchase stage: {}", stage),
        }
    }

    fn report_matcher_status(&self, status: &MatcherStatus) {
        info!(
            "Matcher {} at height {} ({}), ticket price {}",
            status.version, status.mainchain_height, status.mainchain_hash, status.ticket_price
        );
    }

    fn report_saved_session(&self, location: &str) {
        info!("Saved session at {}", location);
    }

    fn report_wallet_discovered(&self, host: &str) {
        info!("Found running wallet at {}", host);
    }

    fn report_wallet_discovery_error(&self, error: &anyhow::Error) {
        warn!("Failed to discover running wallet: {:#}", error);
    }

    fn report_split_published(&self) {
        info!("Split transaction published to the network");
    }

    fn report_right_ticket_published(&self) {
        info!("Correct ticket published to the network");
    }

    fn report_wrong_ticket_published(&self, published: &Txid, session: &Session) {
        error!(
            "Wrong ticket {} published for session {}, expected {}",
            published,
            session.id,
            session
                .selected_ticket
                .as_ref()
                .map(|tx| tx.compute_txid().to_string())
                .unwrap_or_default()
        );
    }

    fn report_buying_error(&self, error: &BuyError) {
        error!("Error buying split ticket: {}", error);
    }
}

/// Forwards stages to a [`Reporter`], dropping any stage that does not come
/// strictly after the last one reported.
#[derive(Clone)]
pub struct Progress {
    reporter: Arc<dyn Reporter>,
    last: Arc<Mutex<Option<Stage>>>,
}

impl Progress {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter,
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    pub fn last_stage(&self) -> Option<Stage> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stage(&self, stage: Stage, session: Option<&Session>, settings: &BuyerSettings) {
        {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = *last {
                if previous >= stage {
                    warn!("Dropping stage {} reported after {}", stage, previous);
                    return;
                }
            }
            *last = Some(stage);
        }
        debug!("Reporting stage {}", stage);
        self.reporter.report_stage(stage, session, settings);
    }
}
