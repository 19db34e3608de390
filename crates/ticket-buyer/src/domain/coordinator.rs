use anyhow::Context;
use log::{debug, error, info};
use secrecy::SecretString;
use std::sync::Arc;
use ticket_buyer_core::Stage;

use crate::{
    config::{read_passphrase, Settings},
    domain::{
        BuyError, Error, JitterSource, MatchedSession, Progress, PurchaseExecutor, Reporter,
        Scope, ScopeEnd, SessionWaiter,
    },
    infra::{Connector, FileSessionWriter, Matcher, SessionWriter, Wallet, WalletDiscovery},
};

/// Runs one split ticket purchase attempt from start to end and owns the
/// collaborator connections while doing so.
pub struct SessionCoordinator {
    settings: Settings,
    connector: Arc<dyn Connector>,
    reporter: Arc<dyn Reporter>,
    discovery: Option<Arc<dyn WalletDiscovery>>,
    wallet: Option<Arc<dyn Wallet>>,
    matcher: Option<Arc<dyn Matcher>>,
    session_writer: Option<Box<dyn SessionWriter>>,
    jitter: Arc<JitterSource>,
}

impl SessionCoordinator {
    pub fn new(
        settings: Settings,
        connector: Arc<dyn Connector>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            settings,
            connector,
            reporter,
            discovery: None,
            wallet: None,
            matcher: None,
            session_writer: None,
            jitter: Arc::new(JitterSource::from_entropy()),
        }
    }

    /// Used to find the wallet when no wallet host is configured.
    pub fn with_wallet_discovery(mut self, discovery: Arc<dyn WalletDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn with_wallet(mut self, wallet: Arc<dyn Wallet>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Replaces the default archive at `<data_dir>/sessions`.
    pub fn with_session_writer(mut self, writer: Box<dyn SessionWriter>) -> Self {
        self.session_writer = Some(writer);
        self
    }

    pub fn with_jitter_source(mut self, jitter: JitterSource) -> Self {
        self.jitter = Arc::new(jitter);
        self
    }

    /// Buys a single split ticket.
    ///
    /// Cancelling `caller` aborts the attempt while waiting for a match. Once
    /// a session is matched the purchase runs to completion under its own
    /// time bound, and only then is the cancellation returned.
    pub async fn buy_split_ticket(self, caller: &Scope) -> Result<(), BuyError> {
        let reporter = self.reporter.clone();
        let progress = Progress::new(reporter.clone());
        progress.stage(Stage::Starting, None, &self.settings.buyer_settings);

        let result = self.run(caller, progress).await;
        if let Err(e) = &result {
            error!("Split ticket purchase failed: {}", e);
            reporter.report_buying_error(e);
        }
        result
    }

    async fn run(mut self, caller: &Scope, progress: Progress) -> Result<(), BuyError> {
        let passphrase = match self.prepare(caller).await {
            Ok(passphrase) => passphrase,
            Err(e) => {
                self.close_supplied_connections().await;
                return Err(e);
            }
        };

        let mut waiter = SessionWaiter::new(
            self.settings.clone(),
            passphrase.clone(),
            self.connector.clone(),
            progress.clone(),
            self.jitter.clone(),
        );
        if let Some(wallet) = self.wallet.take() {
            waiter = waiter.with_wallet(wallet);
        }
        if let Some(matcher) = self.matcher.take() {
            waiter = waiter.with_matcher(matcher);
        }

        let MatchedSession {
            mut session,
            matcher,
            wallet,
        } = waiter
            .wait_for_session(caller)
            .await
            .map_err(|e| e.context("error waiting for session"))?;

        let buyer = &self.settings.buyer_settings;
        let session_writer = self
            .session_writer
            .take()
            .unwrap_or_else(|| Box::new(FileSessionWriter::new(&buyer.data_dir)));
        let mut executor = PurchaseExecutor::new(
            buyer.clone(),
            self.settings.timing_settings.clone(),
            passphrase,
            matcher.clone(),
            wallet.clone(),
            progress,
            session_writer,
        );

        // independent of the caller so a funded session is never abandoned
        let bound = Scope::new().with_timeout(buyer.max_time());
        let session_id = session.id;

        let result = {
            let purchase = executor.execute(&bound, &mut session);
            tokio::pin!(purchase);

            let finished = tokio::select! {
                biased;
                result = &mut purchase => Some(result),
                _ = caller.done() => None,
            };
            match finished {
                Some(result) => result,
                None => {
                    info!(
                        "Purchase canceled, waiting for session {} to finish",
                        session_id
                    );
                    if let Err(e) = purchase.await {
                        debug!("Session {} ended after cancellation: {}", session_id, e);
                    }
                    Err(BuyError::Cancelled)
                }
            }
        };

        if let Err(e) = &result {
            if e.is_reportable() && !buyer.skip_report_errors_to_svc {
                matcher.send_error_report(session_id, e.to_string());
            }
        }

        matcher.close().await;
        wallet.close().await;

        result.map_err(|e| e.context("error buying split ticket in session"))
    }

    async fn prepare(&mut self, caller: &Scope) -> Result<SecretString, BuyError> {
        self.resolve_wallet_host(caller).await?;
        self.passphrase()
    }

    /// Connections handed in by the caller are owned from the start, so they
    /// are closed even when the waiter never got them.
    async fn close_supplied_connections(&mut self) {
        if let Some(matcher) = self.matcher.take() {
            matcher.close().await;
        }
        if let Some(wallet) = self.wallet.take() {
            wallet.close().await;
        }
    }

    async fn resolve_wallet_host(&mut self, caller: &Scope) -> Result<(), BuyError> {
        if self.wallet.is_some() || self.settings.wallet_settings.host.is_some() {
            return Ok(());
        }
        let discovery = self
            .discovery
            .clone()
            .ok_or_else(|| BuyError::reportable(Error::NoWalletHost))?;

        let wallet_settings = &self.settings.wallet_settings;
        let found = caller
            .run(discovery.find_listening_wallets(
                wallet_settings.cert_file.clone(),
                self.settings.buyer_settings.network,
            ))
            .await;

        let mut hosts = match found {
            Ok(Ok(hosts)) => hosts,
            Err(ScopeEnd::Cancelled) => return Err(BuyError::Cancelled),
            Err(ScopeEnd::DeadlineExceeded) => {
                let err = anyhow::Error::new(Error::Scope(ScopeEnd::DeadlineExceeded))
                    .context("error finding running wallet");
                self.reporter.report_wallet_discovery_error(&err);
                return Err(BuyError::Reportable(err));
            }
            Ok(Err(e)) => {
                self.reporter.report_wallet_discovery_error(&e);
                return Err(BuyError::Reportable(
                    e.context("error finding running wallet"),
                ));
            }
        };
        if hosts.len() != 1 {
            let err = anyhow::Error::new(Error::WalletDiscovery(hosts.len()));
            self.reporter.report_wallet_discovery_error(&err);
            return Err(BuyError::Reportable(err));
        }

        let host = hosts.remove(0);
        self.reporter.report_wallet_discovered(&host);
        self.settings.wallet_settings.host = Some(host);
        Ok(())
    }

    /// Passphrase from the configured file, empty when none is set.
    fn passphrase(&self) -> Result<SecretString, BuyError> {
        match &self.settings.wallet_settings.passphrase_file {
            Some(path) => read_passphrase(path)
                .context("error reading wallet passphrase")
                .map_err(BuyError::Reportable),
            None => Ok(SecretString::from(String::new())),
        }
    }
}
