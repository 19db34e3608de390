use futures::future::pending;
use log::{debug, info};
use std::{sync::Arc, time::Duration};
use ticket_buyer_core::{CoreError, Session};
use tokio::time::sleep;

use crate::{
    domain::{Error, Reporter, Scope, ScopeEnd},
    infra::Wallet,
};

/// Waits until the split transaction and a ticket of the session show up on
/// the network.
pub struct PublicationWatcher {
    wallet: Arc<dyn Wallet>,
    reporter: Arc<dyn Reporter>,
    poll_interval: Duration,
}

impl PublicationWatcher {
    pub fn new(wallet: Arc<dyn Wallet>, reporter: Arc<dyn Reporter>, poll_interval: Duration) -> Self {
        Self {
            wallet,
            reporter,
            poll_interval,
        }
    }

    /// Each publication is reported once. A ticket other than the selected
    /// one is reported as wrong and fails the wait once the split was also
    /// seen.
    pub async fn watch(&self, scope: &Scope, session: &Session) -> Result<(), Error> {
        let expected = session
            .selected_ticket
            .as_ref()
            .map(|ticket| ticket.compute_txid())
            .ok_or(CoreError::MissingArtifact("selected ticket"))?;
        let notifier = self.wallet.publication_notifier();
        info!("Waiting for split tx and ticket {} to be published", expected);

        let mut split_seen = false;
        let mut published_ticket = None;

        loop {
            if let Some(end) = scope.end_reason() {
                return Err(Self::interrupted(end));
            }

            if !split_seen && self.wallet.published_split_tx() {
                split_seen = true;
                self.reporter.report_split_published();
            }

            if published_ticket.is_none() {
                if let Some(published) = self.wallet.published_ticket_tx() {
                    if published == expected {
                        self.reporter.report_right_ticket_published();
                    } else {
                        self.reporter
                            .report_wrong_ticket_published(&published, session);
                    }
                    published_ticket = Some(published);
                }
            }

            if let (true, Some(published)) = (split_seen, published_ticket) {
                if published != expected {
                    return Err(Error::WrongTicketPublished {
                        expected,
                        published,
                    });
                }
                debug!("Session {} transactions published", session.id);
                return Ok(());
            }

            let wake = async {
                match &notifier {
                    Some(notify) => notify.notified().await,
                    None => pending::<()>().await,
                }
            };
            tokio::select! {
                end = scope.ended() => return Err(Self::interrupted(end)),
                _ = wake => {}
                _ = sleep(self.poll_interval) => {}
            }
        }
    }

    fn interrupted(end: ScopeEnd) -> Error {
        match end {
            ScopeEnd::Cancelled => Error::PublicationWaitCancelled,
            ScopeEnd::DeadlineExceeded => Error::PublicationWaitExpired,
        }
    }
}
