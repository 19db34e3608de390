use anyhow::Context;
use log::{debug, info};
use secrecy::SecretString;
use std::{future::Future, sync::Arc};
use ticket_buyer_core::{CoreError, Session, Stage};
use time::OffsetDateTime;

use crate::{
    config::{BuyerSettings, TimingSettings},
    domain::{BuyError, Error, Progress, PublicationWatcher, Scope},
    infra::{write_session_archive, ChainInfo, Matcher, SessionArchive, SessionWriter, Wallet},
};

/// Drives a matched session from output generation to the published ticket.
///
/// Failures of matcher operations are unreportable, the matcher already knows
/// about them. Everything else is reportable.
pub struct PurchaseExecutor {
    settings: BuyerSettings,
    timing: TimingSettings,
    passphrase: SecretString,
    matcher: Arc<dyn Matcher>,
    wallet: Arc<dyn Wallet>,
    progress: Progress,
    session_writer: Box<dyn SessionWriter>,
}

impl PurchaseExecutor {
    pub fn new(
        settings: BuyerSettings,
        timing: TimingSettings,
        passphrase: SecretString,
        matcher: Arc<dyn Matcher>,
        wallet: Arc<dyn Wallet>,
        progress: Progress,
        session_writer: Box<dyn SessionWriter>,
    ) -> Self {
        Self {
            settings,
            timing,
            passphrase,
            matcher,
            wallet,
            progress,
            session_writer,
        }
    }

    fn stage(&self, stage: Stage, session: &Session) {
        self.progress.stage(stage, Some(session), &self.settings);
    }

    pub async fn execute(&mut self, scope: &Scope, session: &mut Session) -> Result<(), BuyError> {
        info!("Buying split ticket in session {}", session.id);

        let chain = bounded(scope, self.wallet.current_chain_info(scope))
            .await
            .context("error obtaining wallet chain info")
            .map_err(BuyError::Reportable)?;
        check_chain_agreement(&chain, session).map_err(BuyError::reportable)?;

        self.stage(Stage::GeneratingOutputs, session);
        bounded(
            scope,
            self.wallet.generate_outputs(scope, session, &self.settings),
        )
        .await
        .context("error generating session outputs")
        .map_err(BuyError::Reportable)?;
        self.stage(Stage::OutputsGenerated, session);

        self.stage(Stage::GeneratingTicket, session);
        bounded(
            scope,
            self.matcher.generate_ticket(scope, session, &self.settings),
        )
        .await
        .context("error generating ticket")
        .map_err(BuyError::Unreportable)?;
        session
            .check_split_inputs_resolved()
            .context("matcher sent an invalid split transaction")
            .map_err(BuyError::Reportable)?;
        self.stage(Stage::TicketGenerated, session);

        self.stage(Stage::SigningTicket, session);
        bounded(
            scope,
            self.wallet
                .sign_transactions(scope, session, &self.settings, &self.passphrase),
        )
        .await
        .context("error signing transactions")
        .map_err(BuyError::Reportable)?;
        self.stage(Stage::TicketSigned, session);

        // funding the ticket reveals the secret numbers
        if !session.secret_hash_sent() {
            return Err(BuyError::reportable(Error::from(
                CoreError::RevealBeforeCommit,
            )));
        }
        self.stage(Stage::FundingTicket, session);
        bounded(
            scope,
            self.matcher.fund_ticket(scope, session, &self.settings),
        )
        .await
        .context("error funding ticket")
        .map_err(BuyError::Unreportable)?;
        verify_funded_ticket(session)
            .context("matcher sent an invalid funded ticket")
            .map_err(BuyError::Reportable)?;
        self.stage(Stage::TicketFunded, session);

        bounded(scope, self.wallet.monitor_session(scope, session))
            .await
            .context("error when trying to start monitoring for session transactions")
            .map_err(BuyError::Reportable)?;

        self.stage(Stage::FundingSplitTx, session);
        bounded(
            scope,
            self.matcher.fund_split_tx(scope, session, &self.settings),
        )
        .await
        .context("error funding split tx")
        .map_err(BuyError::Unreportable)?;
        self.stage(Stage::SplitTxFunded, session);

        self.save_session(session)
            .context("error saving session")
            .map_err(BuyError::Reportable)?;

        if self.settings.skip_wait_published_txs {
            self.stage(Stage::SkippedWaiting, session);
        } else {
            self.stage(Stage::WaitingPublishedTxs, session);
            let watcher = PublicationWatcher::new(
                self.wallet.clone(),
                self.progress.reporter().clone(),
                self.timing.publish_poll_interval(),
            );
            watcher
                .watch(scope, session)
                .await
                .context("error waiting for txs to be published")
                .map_err(BuyError::Unreportable)?;
        }

        self.stage(Stage::SessionEndedSuccessfully, session);
        Ok(())
    }

    fn save_session(&mut self, session: &Session) -> Result<(), anyhow::Error> {
        let ticket_hash = session
            .selected_ticket
            .as_ref()
            .map(|ticket| ticket.compute_txid().to_string())
            .ok_or(CoreError::MissingArtifact("selected ticket"))?;

        let mut archive = SessionArchive::begin(self.session_writer.as_mut(), &ticket_hash)?;
        write_session_archive(
            &mut archive,
            session,
            &self.settings,
            OffsetDateTime::now_utc(),
        )?;
        match archive.finish()? {
            Some(location) => self.progress.reporter().report_saved_session(&location),
            None => debug!("Session {} archived", session.id),
        }
        Ok(())
    }
}

/// Runs a collaborator call, failing it if the scope ends first.
async fn bounded<T>(
    scope: &Scope,
    call: impl Future<Output = Result<T, anyhow::Error>>,
) -> Result<T, anyhow::Error> {
    match scope.run(call).await {
        Ok(result) => result,
        Err(end) => Err(Error::Scope(end).into()),
    }
}

/// The wallet must see the chain exactly as it was when the session was
/// matched.
fn check_chain_agreement(chain: &ChainInfo, session: &Session) -> Result<(), Error> {
    if chain.best_block_hash != *session.mainchain_hash() {
        return Err(Error::TipHashMismatch {
            wallet: chain.best_block_hash,
            matcher: *session.mainchain_hash(),
        });
    }
    if chain.best_block_height != session.mainchain_height() {
        return Err(Error::TipHeightMismatch {
            wallet: chain.best_block_height,
            matcher: session.mainchain_height(),
        });
    }
    if chain.ticket_price != session.ticket_price {
        return Err(Error::TicketPriceMismatch {
            wallet: chain.ticket_price,
            matcher: session.ticket_price,
        });
    }
    Ok(())
}

/// Checks the lottery outcome the matcher sent before any split funds are
/// released.
fn verify_funded_ticket(session: &Session) -> Result<(), Error> {
    session.check_signatures_complete()?;
    session.verify_secret_numbers()?;
    session.verify_voter_selection()?;
    if session.selected_ticket.is_none() {
        return Err(CoreError::MissingArtifact("selected ticket").into());
    }
    Ok(())
}
