#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use bdk_wallet::bitcoin::{
    absolute::LockTime, hashes::Hash, transaction::Version, Amount, BlockHash, Network, OutPoint,
    ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use mockall::mock;
use secrecy::SecretString;
use std::{
    collections::VecDeque,
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, Once,
    },
    time::Duration,
};
use ticket_buyer::{
    BuyError, BuyerSettings, ChainInfo, ChainNode, Connector, JitterSource, Matcher,
    MatcherSettings, MatcherStatus, ParticipateRequest, Progress, PurchaseExecutor, Reporter,
    Scope, SessionCoordinator, SessionWriter, Settings, UtxoSettings, UtxoSource, Wallet,
    WalletDiscovery, WalletSettings,
};
use ticket_buyer_core::{
    ChainContext, Participant, ParticipantId, SecretNumber, Session, Stage, UtxoEntry, UtxoMap,
};
use tokio::{sync::Notify, time::sleep};

static INIT_LOGGER: Once = Once::new();

pub fn setup_static_logger() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

mock! {
    #[derive(Send, Sync)]
    pub Discovery { }

    #[async_trait]
    impl WalletDiscovery for Discovery {
        async fn find_listening_wallets(
            &self,
            cert_file: Option<String>,
            network: Network,
        ) -> Result<Vec<String>, anyhow::Error>;
    }
}

pub const SESSION_ID: ParticipantId = 77;
pub const TIP_HEIGHT: u32 = 120_000;
pub const TICKET_PRICE: u64 = 10_000_000;
pub const SECRET_NUMBERS: [u64; 3] = [101, 202, 303];
pub const MY_INDEX: usize = 1;
const AMOUNTS: [u64; 3] = [3_500_000, 3_000_000, 3_450_000];

pub fn tip() -> BlockHash {
    BlockHash::from_byte_array([42u8; 32])
}

pub fn other_tip() -> BlockHash {
    BlockHash::from_byte_array([43u8; 32])
}

pub fn outpoint(byte: u8) -> OutPoint {
    OutPoint {
        txid: Txid::from_byte_array([byte; 32]),
        vout: 0,
    }
}

fn spending(outpoints: &[OutPoint], outputs: &[u64]) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: outpoints
            .iter()
            .map(|previous_output| TxIn {
                previous_output: *previous_output,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect(),
        output: outputs
            .iter()
            .map(|value| TxOut {
                value: Amount::from_sat(*value),
                script_pubkey: ScriptBuf::new(),
            })
            .collect(),
    }
}

/// Ticket candidate of the participant at `index`. Each one has its own txid.
pub fn ticket_tx(index: u8) -> Transaction {
    spending(&[outpoint(200)], &[TICKET_PRICE + index as u64])
}

pub fn chain_info() -> ChainInfo {
    ChainInfo {
        best_block_hash: tip(),
        best_block_height: TIP_HEIGHT,
        ticket_price: Amount::from_sat(TICKET_PRICE),
    }
}

/// Session as the matcher hands it over after pairing three buyers.
pub fn matched_session() -> Session {
    let chain = ChainContext {
        mainchain_hash: tip(),
        mainchain_height: TIP_HEIGHT,
        nb_participants: 3,
    };
    let mut session = Session::new(
        SESSION_ID,
        vec![0xab; 8],
        chain,
        SecretNumber::new(SECRET_NUMBERS[MY_INDEX]),
    );
    session.amount = Amount::from_sat(AMOUNTS[MY_INDEX]);
    session.fee = Amount::from_sat(2_000);
    session.pool_fee = Amount::from_sat(50_000);
    session.ticket_price = Amount::from_sat(TICKET_PRICE);
    session.vote_address = String::from("TsVoteBuyer");
    session.pool_address = String::from("TsPoolAddress");
    session
        .set_participants(
            SECRET_NUMBERS
                .iter()
                .zip(AMOUNTS)
                .enumerate()
                .map(|(i, (number, amount))| Participant {
                    secret_hash: SecretNumber::new(*number).hash(),
                    amount: Amount::from_sat(amount),
                    vote_address: format!("TsVote{}", i),
                    vote_script: vec![0x76, i as u8],
                    pool_script: vec![0xa9, i as u8],
                    ..Default::default()
                })
                .collect(),
        )
        .unwrap();
    session.assign_my_index(MY_INDEX).unwrap();
    session
}

/// Session with the selected ticket set, ready for publication watching.
pub fn funded_session() -> Session {
    let mut session = matched_session();
    session.selected_ticket = Some(ticket_tx(0));
    session
}

pub fn test_settings() -> Settings {
    Settings {
        buyer_settings: BuyerSettings {
            max_amount_sats: 5_000_000,
            session_name: String::from("test-session"),
            vote_address: String::from("TsVoteBuyer"),
            pool_address: String::from("TsPoolAddress"),
            ..Default::default()
        },
        wallet_settings: WalletSettings {
            host: Some(String::from("127.0.0.1:19558")),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn passphrase() -> SecretString {
    SecretString::from(String::from("wallet passphrase"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishPlan {
    /// Publishes the split and the ticket selected by the lottery
    Selected,
    /// Publishes the split and a ticket from another participant
    Other,
}

pub struct FakeWallet {
    pub chain: Mutex<ChainInfo>,
    /// Tips served by `current_chain_info` before falling back to `chain`
    pub chain_tips: Mutex<VecDeque<BlockHash>>,
    pub calls: Mutex<Vec<&'static str>>,
    pub failing_call: Mutex<Option<&'static str>>,
    pub not_ready_after: Mutex<Option<Duration>>,
    pub split_published: AtomicBool,
    pub ticket_published: Mutex<Option<Txid>>,
    pub publish_on_monitor: Mutex<Option<PublishPlan>>,
    pub notifier: Option<Arc<Notify>>,
    pub split_probes: AtomicUsize,
    pub closes: AtomicUsize,
}

impl Default for FakeWallet {
    fn default() -> Self {
        Self {
            chain: Mutex::new(chain_info()),
            chain_tips: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            failing_call: Mutex::new(None),
            not_ready_after: Mutex::new(None),
            split_published: AtomicBool::new(false),
            ticket_published: Mutex::new(None),
            publish_on_monitor: Mutex::new(None),
            notifier: None,
            split_probes: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }
}

impl FakeWallet {
    pub fn with_notifier() -> Self {
        Self {
            notifier: Some(Arc::new(Notify::new())),
            ..Default::default()
        }
    }

    pub fn fail_on(&self, call: &'static str) {
        *self.failing_call.lock().unwrap() = Some(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn publish_split(&self) {
        self.split_published.store(true, Ordering::SeqCst);
    }

    pub fn publish_ticket(&self, txid: Txid) {
        *self.ticket_published.lock().unwrap() = Some(txid);
    }

    fn call(&self, name: &'static str) -> Result<(), anyhow::Error> {
        self.calls.lock().unwrap().push(name);
        if *self.failing_call.lock().unwrap() == Some(name) {
            return Err(anyhow!("wallet rejected {}", name));
        }
        Ok(())
    }
}

#[async_trait]
impl Wallet for FakeWallet {
    async fn check_network(&self, _scope: &Scope, _network: Network) -> Result<(), anyhow::Error> {
        self.call("check_network")
    }

    async fn test_vote_address(
        &self,
        _scope: &Scope,
        _settings: &BuyerSettings,
    ) -> Result<(), anyhow::Error> {
        self.call("test_vote_address")
    }

    async fn test_passphrase(
        &self,
        _scope: &Scope,
        _passphrase: &SecretString,
    ) -> Result<(), anyhow::Error> {
        self.call("test_passphrase")
    }

    async fn test_funds(
        &self,
        _scope: &Scope,
        _settings: &BuyerSettings,
    ) -> Result<(), anyhow::Error> {
        self.call("test_funds")
    }

    async fn wait_ready_for_session(&self, scope: &Scope) -> Result<(), anyhow::Error> {
        let not_ready_after = *self.not_ready_after.lock().unwrap();
        match not_ready_after {
            Some(delay) => match scope.run(sleep(delay)).await {
                Ok(()) => Err(anyhow!("wallet lost its connection to the network")),
                Err(_) => Ok(()),
            },
            None => {
                scope.done().await;
                Ok(())
            }
        }
    }

    async fn current_chain_info(&self, _scope: &Scope) -> Result<ChainInfo, anyhow::Error> {
        let mut info = *self.chain.lock().unwrap();
        if let Some(tip) = self.chain_tips.lock().unwrap().pop_front() {
            info.best_block_hash = tip;
        }
        Ok(info)
    }

    async fn generate_outputs(
        &self,
        _scope: &Scope,
        session: &mut Session,
        _settings: &BuyerSettings,
    ) -> Result<(), anyhow::Error> {
        self.call("generate_outputs")?;
        session.split_output_address = Some(String::from("TsSplitOutput"));
        session.ticket_output_address = Some(String::from("TsCommitment"));
        Ok(())
    }

    async fn sign_transactions(
        &self,
        _scope: &Scope,
        session: &mut Session,
        _settings: &BuyerSettings,
        _passphrase: &SecretString,
    ) -> Result<(), anyhow::Error> {
        self.call("sign_transactions")?;
        session.revocation_signature = Some(vec![0x30, 0x01]);
        Ok(())
    }

    async fn monitor_session(
        &self,
        _scope: &Scope,
        session: &Session,
    ) -> Result<(), anyhow::Error> {
        self.call("monitor_session")?;
        let plan = *self.publish_on_monitor.lock().unwrap();
        if let Some(plan) = plan {
            let selected = session
                .selected_ticket
                .as_ref()
                .map(|tx| tx.compute_txid())
                .ok_or_else(|| anyhow!("no selected ticket to monitor"))?;
            let published = match plan {
                PublishPlan::Selected => selected,
                PublishPlan::Other => ticket_tx(9).compute_txid(),
            };
            self.publish_split();
            self.publish_ticket(published);
        }
        Ok(())
    }

    fn published_split_tx(&self) -> bool {
        self.split_probes.fetch_add(1, Ordering::SeqCst);
        self.split_published.load(Ordering::SeqCst)
    }

    fn published_ticket_tx(&self) -> Option<Txid> {
        *self.ticket_published.lock().unwrap()
    }

    fn publication_notifier(&self) -> Option<Arc<Notify>> {
        self.notifier.clone()
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeMatcher {
    pub status_tips: Mutex<VecDeque<BlockHash>>,
    pub status_calls: AtomicUsize,
    pub session: Mutex<Option<Session>>,
    pub failing_step: Mutex<Option<&'static str>>,
    /// Cancelled from inside ticket generation, once the purchase is underway
    pub cancel_on_generate: Mutex<Option<Scope>>,
    pub unresolved_split_input: AtomicBool,
    pub tamper_voter_index: AtomicBool,
    /// Generates the ticket without ever receiving the buyer's secret hash
    pub skip_secret_hash: AtomicBool,
    pub calls: Mutex<Vec<&'static str>>,
    pub error_reports: Mutex<Vec<(ParticipantId, String)>>,
    pub closes: AtomicUsize,
}

impl Default for FakeMatcher {
    fn default() -> Self {
        Self {
            status_tips: Mutex::new(VecDeque::new()),
            status_calls: AtomicUsize::new(0),
            session: Mutex::new(Some(matched_session())),
            failing_step: Mutex::new(None),
            cancel_on_generate: Mutex::new(None),
            unresolved_split_input: AtomicBool::new(false),
            tamper_voter_index: AtomicBool::new(false),
            skip_secret_hash: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            error_reports: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        }
    }
}

impl FakeMatcher {
    /// Matcher that never pairs the buyer.
    pub fn without_match() -> Self {
        Self {
            session: Mutex::new(None),
            ..Default::default()
        }
    }

    pub fn fail_on(&self, step: &'static str) {
        *self.failing_step.lock().unwrap() = Some(step);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn error_reports(&self) -> Vec<(ParticipantId, String)> {
        self.error_reports.lock().unwrap().clone()
    }

    fn step(&self, name: &'static str) -> Result<(), anyhow::Error> {
        self.calls.lock().unwrap().push(name);
        if *self.failing_step.lock().unwrap() == Some(name) {
            return Err(anyhow!("matcher aborted session during {}", name));
        }
        Ok(())
    }
}

#[async_trait]
impl Matcher for FakeMatcher {
    async fn status(&self, _scope: &Scope) -> Result<MatcherStatus, anyhow::Error> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mainchain_hash = self
            .status_tips
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(tip);
        Ok(MatcherStatus {
            mainchain_hash,
            mainchain_height: TIP_HEIGHT,
            ticket_price: Amount::from_sat(TICKET_PRICE),
            version: String::from("test-matcher"),
        })
    }

    async fn participate(
        &self,
        scope: &Scope,
        _request: ParticipateRequest,
    ) -> Result<Session, anyhow::Error> {
        self.step("participate")?;
        let session = self.session.lock().unwrap().take();
        match session {
            Some(session) => Ok(session),
            None => {
                scope.done().await;
                Err(anyhow!("participation canceled"))
            }
        }
    }

    async fn generate_ticket(
        &self,
        _scope: &Scope,
        session: &mut Session,
        _settings: &BuyerSettings,
    ) -> Result<(), anyhow::Error> {
        self.step("generate_ticket")?;
        let cancel = self.cancel_on_generate.lock().unwrap().take();
        if let Some(caller) = cancel {
            caller.cancel();
            sleep(Duration::from_millis(10)).await;
        }

        if !self.skip_secret_hash.load(Ordering::SeqCst) {
            session.mark_secret_hash_sent();
        }
        let inputs = [outpoint(1), outpoint(2), outpoint(3)];
        session.split_tx = Some(spending(&inputs, &[9_950_000, 150_000]));
        session.split_inputs = vec![inputs[MY_INDEX]];
        let resolved = if self.unresolved_split_input.load(Ordering::SeqCst) {
            &inputs[..2]
        } else {
            &inputs[..]
        };
        session.split_utxos = resolved
            .iter()
            .map(|outpoint| {
                (
                    *outpoint,
                    UtxoEntry {
                        value: Amount::from_sat(3_600_000),
                        script: vec![0x51],
                    },
                )
            })
            .collect();
        session.ticket_template = Some(ticket_tx(0));
        Ok(())
    }

    async fn fund_ticket(
        &self,
        _scope: &Scope,
        session: &mut Session,
        _settings: &BuyerSettings,
    ) -> Result<(), anyhow::Error> {
        self.step("fund_ticket")?;
        for (participant, number) in session.participants_mut().iter_mut().zip(SECRET_NUMBERS) {
            participant.secret_number = Some(SecretNumber::new(number));
        }
        session.ticket_signatures = (0..3u8).map(|i| vec![0x30, i]).collect();

        let selection = session.voter_selection()?;
        let index = if self.tamper_voter_index.load(Ordering::SeqCst) {
            (selection.index + 1) % 3
        } else {
            selection.index
        };
        session.voter_index = Some(index);
        session.selected_coin = Some(selection.coin);
        session.selected_ticket = Some(ticket_tx(index as u8));
        session.selected_revocation = Some(spending(&[outpoint(201)], &[TICKET_PRICE - 1_000]));
        Ok(())
    }

    async fn fund_split_tx(
        &self,
        _scope: &Scope,
        session: &mut Session,
        _settings: &BuyerSettings,
    ) -> Result<(), anyhow::Error> {
        self.step("fund_split_tx")?;
        session.funded_split_tx = session.split_tx.clone();
        Ok(())
    }

    fn send_error_report(&self, session_id: ParticipantId, error: String) {
        self.error_reports.lock().unwrap().push((session_id, error));
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeNode {
    pub not_ready_after: Mutex<Option<Duration>>,
}

#[async_trait]
impl ChainNode for FakeNode {
    async fn wait_ready_for_session(&self, scope: &Scope) -> Result<(), anyhow::Error> {
        let not_ready_after = *self.not_ready_after.lock().unwrap();
        match not_ready_after {
            Some(delay) => match scope.run(sleep(delay)).await {
                Ok(()) => Err(anyhow!("node stopped syncing")),
                Err(_) => Ok(()),
            },
            None => {
                scope.done().await;
                Ok(())
            }
        }
    }

    async fn candidate_utxos(&self, _target: Amount) -> Result<UtxoMap, anyhow::Error> {
        Ok(UtxoMap::new())
    }
}

pub struct FakeConnector {
    pub wallet: Arc<FakeWallet>,
    pub matcher: Arc<FakeMatcher>,
    pub node: Arc<FakeNode>,
    pub connections: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn connections(&self) -> Vec<String> {
        self.connections.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect_wallet(
        &self,
        _scope: &Scope,
        host: &str,
        _settings: &WalletSettings,
    ) -> Result<Arc<dyn Wallet>, anyhow::Error> {
        self.connections
            .lock()
            .unwrap()
            .push(format!("wallet {}", host));
        Ok(self.wallet.clone())
    }

    async fn connect_node(
        &self,
        _scope: &Scope,
        _settings: &UtxoSettings,
        _network: Network,
    ) -> Result<Arc<dyn ChainNode>, anyhow::Error> {
        self.connections.lock().unwrap().push(String::from("node"));
        Ok(self.node.clone())
    }

    async fn connect_indexer(
        &self,
        _scope: &Scope,
        settings: &UtxoSettings,
        _network: Network,
    ) -> Result<Arc<dyn UtxoSource>, anyhow::Error> {
        self.connections
            .lock()
            .unwrap()
            .push(format!("indexer {}", settings.indexer_url));
        Err(anyhow!("indexer {} is offline", settings.indexer_url))
    }

    async fn connect_matcher(
        &self,
        _scope: &Scope,
        settings: &MatcherSettings,
        _utxos: Arc<dyn UtxoSource>,
    ) -> Result<Arc<dyn Matcher>, anyhow::Error> {
        self.connections
            .lock()
            .unwrap()
            .push(format!("matcher {}", settings.host));
        Ok(self.matcher.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Stage(Stage),
    MatcherStatus,
    SavedSession(String),
    WalletDiscovered(String),
    WalletDiscoveryError,
    SplitPublished,
    RightTicket,
    WrongTicket(Txid),
    BuyingError { reportable: bool },
}

#[derive(Default)]
pub struct RecordingReporter {
    pub events: Mutex<Vec<Event>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Stage(stage) => Some(stage),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.events().iter().filter(|event| *event == wanted).count()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Reporter for RecordingReporter {
    fn report_stage(&self, stage: Stage, _session: Option<&Session>, _settings: &BuyerSettings) {
        self.push(Event::Stage(stage));
    }

    fn report_matcher_status(&self, _status: &MatcherStatus) {
        self.push(Event::MatcherStatus);
    }

    fn report_saved_session(&self, location: &str) {
        self.push(Event::SavedSession(location.to_string()));
    }

    fn report_wallet_discovered(&self, host: &str) {
        self.push(Event::WalletDiscovered(host.to_string()));
    }

    fn report_wallet_discovery_error(&self, _error: &anyhow::Error) {
        self.push(Event::WalletDiscoveryError);
    }

    fn report_split_published(&self) {
        self.push(Event::SplitPublished);
    }

    fn report_right_ticket_published(&self) {
        self.push(Event::RightTicket);
    }

    fn report_wrong_ticket_published(&self, published: &Txid, _session: &Session) {
        self.push(Event::WrongTicket(*published));
    }

    fn report_buying_error(&self, error: &BuyError) {
        self.push(Event::BuyingError {
            reportable: error.is_reportable(),
        });
    }
}

#[derive(Default)]
pub struct MemoryArchive {
    pub begun: Vec<String>,
    pub finished: usize,
    pub open: bool,
    pub contents: Vec<u8>,
}

/// Session writer keeping archives in memory. Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemorySessionWriter(pub Arc<Mutex<MemoryArchive>>);

impl MemorySessionWriter {
    pub fn begun(&self) -> Vec<String> {
        self.0.lock().unwrap().begun.clone()
    }

    pub fn finished(&self) -> usize {
        self.0.lock().unwrap().finished
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().contents.clone()).unwrap()
    }
}

impl Write for MemorySessionWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut archive = self.0.lock().unwrap();
        if !archive.open {
            return Err(io::Error::other("archive not open"));
        }
        archive.contents.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SessionWriter for MemorySessionWriter {
    fn start_writing_session(&mut self, ticket_hash: &str) -> io::Result<()> {
        let mut archive = self.0.lock().unwrap();
        archive.begun.push(ticket_hash.to_string());
        archive.open = true;
        Ok(())
    }

    fn session_writing_finished(&mut self) -> io::Result<Option<String>> {
        let mut archive = self.0.lock().unwrap();
        archive.finished += 1;
        archive.open = false;
        Ok(archive.begun.last().map(|hash| format!("memory:{}", hash)))
    }
}

/// Fake collaborators wired together for a single purchase.
pub struct TestWorld {
    pub settings: Settings,
    pub wallet: Arc<FakeWallet>,
    pub matcher: Arc<FakeMatcher>,
    pub node: Arc<FakeNode>,
    pub connector: Arc<FakeConnector>,
    pub reporter: Arc<RecordingReporter>,
    pub writer: MemorySessionWriter,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_collaborators(FakeWallet::default(), FakeMatcher::default())
    }

    pub fn with_collaborators(wallet: FakeWallet, matcher: FakeMatcher) -> Self {
        setup_static_logger();
        *wallet.publish_on_monitor.lock().unwrap() = Some(PublishPlan::Selected);
        let wallet = Arc::new(wallet);
        let matcher = Arc::new(matcher);
        let node = Arc::new(FakeNode::default());
        let connector = Arc::new(FakeConnector {
            wallet: wallet.clone(),
            matcher: matcher.clone(),
            node: node.clone(),
            connections: Mutex::new(Vec::new()),
        });
        Self {
            settings: test_settings(),
            wallet,
            matcher,
            node,
            connector,
            reporter: Arc::new(RecordingReporter::default()),
            writer: MemorySessionWriter::default(),
        }
    }

    pub fn coordinator(&self) -> SessionCoordinator {
        SessionCoordinator::new(
            self.settings.clone(),
            self.connector.clone(),
            self.reporter.clone(),
        )
        .with_session_writer(Box::new(self.writer.clone()))
        .with_jitter_source(JitterSource::seeded(7))
    }

    pub fn executor(&self) -> PurchaseExecutor {
        PurchaseExecutor::new(
            self.settings.buyer_settings.clone(),
            self.settings.timing_settings.clone(),
            passphrase(),
            self.matcher.clone(),
            self.wallet.clone(),
            Progress::new(self.reporter.clone()),
            Box::new(self.writer.clone()),
        )
    }
}
