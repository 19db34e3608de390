use anyhow::Context;
use log::{debug, info, warn};
use secrecy::SecretString;
use std::{fmt, future::Future, sync::Arc};
use ticket_buyer_core::{Session, Stage};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

use crate::{
    config::{Settings, UtxoSourceKind},
    domain::{BuyError, Error, JitterSource, Progress, Scope, ScopeEnd, SyncMonitor},
    infra::{ChainNode, Connector, Matcher, NodeUtxoSource, ParticipateRequest, UtxoSource, Wallet},
};

/// Session matched by the matcher together with the connections that will
/// carry it to completion.
pub struct MatchedSession {
    pub session: Session,
    pub matcher: Arc<dyn Matcher>,
    pub wallet: Arc<dyn Wallet>,
}

impl fmt::Debug for MatchedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchedSession")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

enum WaitEvent {
    Matched(Session),
    Failed(anyhow::Error),
}

/// Connects to the collaborators, checks the wallet can buy a ticket and
/// waits for the matcher to pair this buyer into a session.
pub struct SessionWaiter {
    settings: Settings,
    passphrase: SecretString,
    connector: Arc<dyn Connector>,
    progress: Progress,
    jitter: Arc<JitterSource>,
    wallet: Option<Arc<dyn Wallet>>,
    matcher: Option<Arc<dyn Matcher>>,
}

impl SessionWaiter {
    pub fn new(
        settings: Settings,
        passphrase: SecretString,
        connector: Arc<dyn Connector>,
        progress: Progress,
        jitter: Arc<JitterSource>,
    ) -> Self {
        Self {
            settings,
            passphrase,
            connector,
            progress,
            jitter,
            wallet: None,
            matcher: None,
        }
    }

    /// Uses an already open wallet connection instead of connecting to one.
    pub fn with_wallet(mut self, wallet: Arc<dyn Wallet>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    /// Uses an already open matcher connection. The utxo source is then
    /// whatever that connection was built with.
    pub fn with_matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Connections held by the waiter are closed when this fails. On success
    /// they are handed over to the caller.
    pub async fn wait_for_session(mut self, parent: &Scope) -> Result<MatchedSession, BuyError> {
        match self.run(parent).await {
            Ok(matched) => Ok(matched),
            Err(e) => {
                if let Some(matcher) = self.matcher.take() {
                    matcher.close().await;
                }
                if let Some(wallet) = self.wallet.take() {
                    wallet.close().await;
                }
                Err(e)
            }
        }
    }

    async fn run(&mut self, parent: &Scope) -> Result<MatchedSession, BuyError> {
        let setup = parent.with_timeout(self.settings.timing_settings.setup_timeout());
        let buyer = &self.settings.buyer_settings;

        let wallet = match self.wallet.clone() {
            Some(wallet) => wallet,
            None => {
                self.progress.stage(Stage::ConnectingToWallet, None, buyer);
                let host = self
                    .settings
                    .wallet_settings
                    .host
                    .clone()
                    .ok_or_else(|| BuyError::reportable(Error::NoWalletHost))?;
                let wallet = in_setup(
                    &setup,
                    "error trying to connect to wallet",
                    self.connector
                        .connect_wallet(&setup, &host, &self.settings.wallet_settings),
                )
                .await?;
                self.wallet = Some(wallet.clone());
                wallet
            }
        };

        in_setup(
            &setup,
            "error checking for wallet network",
            wallet.check_network(&setup, buyer.network),
        )
        .await?;
        in_setup(
            &setup,
            "error testing buyer vote address",
            wallet.test_vote_address(&setup, buyer),
        )
        .await?;
        in_setup(
            &setup,
            "error testing wallet passphrase",
            wallet.test_passphrase(&setup, &self.passphrase),
        )
        .await?;
        in_setup(
            &setup,
            "error testing wallet funds",
            wallet.test_funds(&setup, buyer),
        )
        .await?;

        let mut node = None;
        let matcher = match self.matcher.clone() {
            Some(matcher) => matcher,
            None => {
                let utxo_settings = &self.settings.utxo_settings;
                let utxos: Arc<dyn UtxoSource> = match utxo_settings.source {
                    UtxoSourceKind::Node => {
                        self.progress.stage(Stage::ConnectingToNode, None, buyer);
                        let connected = in_setup(
                            &setup,
                            "error connecting to node",
                            self.connector
                                .connect_node(&setup, utxo_settings, buyer.network),
                        )
                        .await?;
                        node = Some(connected.clone());
                        Arc::new(NodeUtxoSource::new(connected))
                    }
                    UtxoSourceKind::Indexer => {
                        self.progress.stage(Stage::ConnectingToIndexer, None, buyer);
                        in_setup(
                            &setup,
                            "error checking if indexer is online",
                            self.connector
                                .connect_indexer(&setup, utxo_settings, buyer.network),
                        )
                        .await?
                    }
                };

                self.progress.stage(Stage::ConnectingToMatcher, None, buyer);
                let matcher = in_setup(
                    &setup,
                    "error connecting to matcher",
                    self.connector
                        .connect_matcher(&setup, &self.settings.matcher_settings, utxos),
                )
                .await?;
                self.matcher = Some(matcher.clone());
                matcher
            }
        };

        let status = in_setup(
            &setup,
            "error getting status from matcher",
            matcher.status(&setup),
        )
        .await?;
        self.progress.reporter().report_matcher_status(&status);

        let session = self
            .wait_for_match(parent, matcher.clone(), wallet.clone(), node)
            .await?;
        self.progress
            .stage(Stage::MatchesFound, Some(&session), buyer);

        Ok(MatchedSession {
            session,
            matcher,
            wallet,
        })
    }

    /// Runs the participate request next to the watchdogs. The first of them
    /// to report decides the outcome, the rest are stopped and awaited before
    /// returning.
    async fn wait_for_match(
        &self,
        parent: &Scope,
        matcher: Arc<dyn Matcher>,
        wallet: Arc<dyn Wallet>,
        node: Option<Arc<dyn ChainNode>>,
    ) -> Result<Session, BuyError> {
        let buyer = &self.settings.buyer_settings;
        self.progress.stage(Stage::FindingMatches, None, buyer);

        let wait = match buyer.max_wait_time() {
            Some(max_wait) => parent.with_timeout(max_wait),
            None => parent.child(),
        };
        let (tx, mut rx) = mpsc::channel::<WaitEvent>(4);
        let tracker = TaskTracker::new();

        {
            let (wallet, scope, tx) = (wallet.clone(), wait.clone(), tx.clone());
            tracker.spawn(async move {
                if let Err(e) = wallet.wait_ready_for_session(&scope).await {
                    let _ = tx
                        .send(WaitEvent::Failed(e.context("wallet is not ready for session")))
                        .await;
                }
            });
        }

        if let Some(node) = node {
            let (scope, tx) = (wait.clone(), tx.clone());
            tracker.spawn(async move {
                if let Err(e) = node.wait_ready_for_session(&scope).await {
                    let _ = tx
                        .send(WaitEvent::Failed(e.context("node is not ready for session")))
                        .await;
                }
            });
        }

        {
            let monitor = SyncMonitor::new(
                matcher.clone(),
                wallet,
                &self.settings.timing_settings,
                self.jitter.clone(),
            );
            let (scope, tx) = (wait.clone(), tx.clone());
            tracker.spawn(async move {
                if let Err(e) = monitor.watch(&scope).await {
                    let _ = tx
                        .send(WaitEvent::Failed(e.context(
                            "error while checking matcher and wallet sync to the network",
                        )))
                        .await;
                }
            });
        }

        {
            let request = ParticipateRequest::from(buyer);
            let scope = wait.clone();
            tracker.spawn(async move {
                let event = match matcher.participate(&scope, request).await {
                    Ok(session) => WaitEvent::Matched(session),
                    Err(e) => {
                        WaitEvent::Failed(e.context("error while waiting to participate in session"))
                    }
                };
                let _ = tx.send(event).await;
            });
        }
        tracker.close();

        info!("Waiting for session in matcher");
        let outcome = tokio::select! {
            biased;
            end = wait.ended() => match end {
                ScopeEnd::Cancelled => Err(BuyError::Cancelled),
                ScopeEnd::DeadlineExceeded => Err(BuyError::reportable(Error::MatchTimeout)),
            },
            event = rx.recv() => match event {
                Some(WaitEvent::Matched(session)) => Ok(session),
                Some(WaitEvent::Failed(e)) => Err(BuyError::Reportable(e)),
                None => Err(BuyError::reportable(Error::WatchersExhausted)),
            },
        };

        wait.cancel();
        rx.close();
        tracker.wait().await;
        debug!("Session watchers stopped");

        if let Err(BuyError::Reportable(e)) = &outcome {
            warn!("Stopped waiting for session: {:#}", e);
        }
        outcome
    }
}

/// Runs a setup step under the setup scope, telling an expired setup apart
/// from a cancelled purchase.
async fn in_setup<T>(
    setup: &Scope,
    context: &'static str,
    step: impl Future<Output = Result<T, anyhow::Error>>,
) -> Result<T, BuyError> {
    match setup.run(step).await {
        Ok(result) => result.context(context).map_err(BuyError::Reportable),
        Err(ScopeEnd::Cancelled) => Err(BuyError::Cancelled),
        Err(ScopeEnd::DeadlineExceeded) => Err(BuyError::reportable(
            anyhow::Error::new(Error::Scope(ScopeEnd::DeadlineExceeded)).context(context),
        )),
    }
}
