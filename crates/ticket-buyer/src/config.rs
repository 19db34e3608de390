use anyhow::Context;
use bdk_wallet::bitcoin::{Amount, Network};
use clap::Parser;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use time::{format_description::well_known::Iso8601, OffsetDateTime};

/// Settings file used when `--config` is not given. Created with defaults on
/// first run.
pub const DEFAULT_CONFIG_PATH: &str = "./config/local.toml";

#[derive(Parser, Debug)]
#[command(author, version, about = "Buys split stake tickets", long_about = None)]
pub struct Cli {
    /// Path to the buyer's TOML settings file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level to run the buyer with (default: info)
    #[arg(short, long)]
    pub level: Option<String>,

    /// Directory where finished sessions are archived
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Return as soon as the split transaction is funded
    #[arg(long)]
    pub skip_wait_published_txs: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Settings {
    pub config: Option<String>,
    pub level: Option<String>,
    pub buyer_settings: BuyerSettings,
    pub wallet_settings: WalletSettings,
    pub matcher_settings: MatcherSettings,
    pub utxo_settings: UtxoSettings,
    #[serde(default)]
    pub timing_settings: TimingSettings,
}

impl Settings {
    /// Flags given on the command line win over the settings file.
    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(level) = &cli.level {
            self.level = Some(level.clone());
        }
        if let Some(data_dir) = &cli.data_dir {
            self.buyer_settings.data_dir = data_dir.clone();
        }
        if cli.skip_wait_published_txs {
            self.buyer_settings.skip_wait_published_txs = true;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuyerSettings {
    /// Maximum amount in sats to commit to a single split ticket
    pub max_amount_sats: u64,
    /// Name of the matcher session to join, buyers only match within the same name
    pub session_name: String,
    /// Address that will receive the voting rights of the ticket
    pub vote_address: String,
    /// Address of the voting pool receiving the pool fee
    pub pool_address: String,
    /// Percentage of the ticket reward paid to the voting pool
    pub pool_fee_rate: f64,
    /// On-chain network the wallet and matcher must be on
    pub network: Network,
    /// Folder where finished sessions are archived
    pub data_dir: String,
    /// Maximum time in seconds a matched session may take to complete
    pub max_time_secs: u64,
    /// Maximum time in seconds to wait for a match, 0 waits indefinitely
    pub max_wait_time_secs: u64,
    /// Stop after funding instead of waiting for the transactions to be published
    #[serde(default)]
    pub skip_wait_published_txs: bool,
    /// Do not send failures back to the matcher for diagnostics
    #[serde(default)]
    pub skip_report_errors_to_svc: bool,
}

impl BuyerSettings {
    pub fn max_amount(&self) -> Amount {
        Amount::from_sat(self.max_amount_sats)
    }

    pub fn max_time(&self) -> Duration {
        Duration::from_secs(self.max_time_secs)
    }

    pub fn max_wait_time(&self) -> Option<Duration> {
        if self.max_wait_time_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.max_wait_time_secs))
        }
    }
}

impl Default for BuyerSettings {
    fn default() -> Self {
        BuyerSettings {
            max_amount_sats: 0,
            session_name: String::from("default"),
            vote_address: String::new(),
            pool_address: String::new(),
            pool_fee_rate: 5.0,
            network: Network::Regtest,
            data_dir: String::from("./data"),
            max_time_secs: 120,
            max_wait_time_secs: 0,
            skip_wait_published_txs: false,
            skip_report_errors_to_svc: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct WalletSettings {
    /// Host of the wallet rpc, the buyer searches for a single local wallet when empty
    pub host: Option<String>,
    /// Optional file path to the wallet rpc tls cert
    pub cert_file: Option<String>,
    /// File holding the wallet passphrase
    pub passphrase_file: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatcherSettings {
    pub host: String,
    /// Optional file path to the matcher tls cert (self signed matchers)
    pub cert_file: Option<String>,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        MatcherSettings {
            host: String::from("127.0.0.1:8475"),
            cert_file: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UtxoSourceKind {
    /// Fetch utxos from a full validating node
    Node,
    /// Fetch utxos from an external block indexer
    Indexer,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UtxoSettings {
    pub source: UtxoSourceKind,
    pub node_host: String,
    pub node_user: String,
    pub node_cert_file: Option<String>,
    pub indexer_url: String,
}

impl Default for UtxoSettings {
    fn default() -> Self {
        UtxoSettings {
            source: UtxoSourceKind::Node,
            node_host: String::from("127.0.0.1:19556"),
            node_user: String::new(),
            node_cert_file: None,
            indexer_url: String::from("http://localhost:7777"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Timeout in seconds for connecting to the collaborators and checking preconditions
    pub setup_timeout_secs: u64,
    /// Interval in seconds between matcher/wallet chain tip comparisons while waiting
    pub sync_check_interval_secs: u64,
    /// Lower bound in seconds of the pause before re-checking a tip mismatch
    pub sync_jitter_min_secs: u64,
    /// Upper bound in seconds of the pause before re-checking a tip mismatch
    pub sync_jitter_max_secs: u64,
    /// Interval in milliseconds between checks for published session transactions
    pub publish_poll_interval_ms: u64,
}

impl TimingSettings {
    pub fn setup_timeout(&self) -> Duration {
        Duration::from_secs(self.setup_timeout_secs)
    }

    pub fn sync_check_interval(&self) -> Duration {
        Duration::from_secs(self.sync_check_interval_secs)
    }

    pub fn sync_jitter_bounds(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.sync_jitter_min_secs),
            Duration::from_secs(self.sync_jitter_max_secs),
        )
    }

    pub fn publish_poll_interval(&self) -> Duration {
        Duration::from_millis(self.publish_poll_interval_ms)
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        TimingSettings {
            setup_timeout_secs: 60,
            sync_check_interval_secs: 300, // 5 minutes
            sync_jitter_min_secs: 10,
            sync_jitter_max_secs: 20,
            publish_poll_interval_ms: 250,
        }
    }
}

/// Parses the process arguments and loads the settings they point at.
pub fn get_settings() -> Result<Settings, anyhow::Error> {
    load_settings(Cli::parse(), Path::new(DEFAULT_CONFIG_PATH))
}

/// Loads settings from `--config`, or from `default_path` when no config was
/// given. A missing default file is created holding the default settings; a
/// missing explicit file is an error.
pub fn load_settings(cli: Cli, default_path: &Path) -> Result<Settings, anyhow::Error> {
    let mut settings = match &cli.config {
        Some(config) => {
            let path = PathBuf::from(config);
            let path = if path.is_absolute() {
                path
            } else {
                env::current_dir()?.join(path)
            };
            let mut settings = read_settings_file(&path)?;
            settings.config = Some(path.to_string_lossy().to_string());
            settings
        }
        None if default_path.exists() => read_settings_file(default_path)?,
        None => {
            let settings = Settings::default();
            write_settings_file(default_path, &settings)?;
            settings
        }
    };

    settings.apply_cli(&cli);
    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<Settings, anyhow::Error> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("failed to parse settings file {}", path.display()))
}

fn write_settings_file(path: &Path, settings: &Settings) -> Result<(), anyhow::Error> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }
    let content = toml::to_string(settings).context("failed to serialize default settings")?;
    fs::write(path, content)
        .with_context(|| format!("failed to write default settings to {}", path.display()))
}

/// Reads the wallet passphrase, ignoring a trailing newline.
pub fn read_passphrase(file_path: &str) -> Result<SecretString, anyhow::Error> {
    let contents = fs::read_to_string(file_path)
        .with_context(|| format!("failed to read passphrase file {}", file_path))?;
    Ok(SecretString::from(
        contents.trim_end_matches(['\r', '\n']).to_string(),
    ))
}

/// Installs the buyer's logger on stdout. Records from any target starting
/// with one of `filter_targets` are dropped.
pub fn setup_logger(
    level: Option<String>,
    filter_targets: Vec<String>,
) -> Result<(), fern::InitError> {
    log_dispatch(level, filter_targets).apply()?;
    Ok(())
}

fn log_dispatch(level: Option<String>, filter_targets: Vec<String>) -> fern::Dispatch {
    let colors = ColoredLevelConfig::new()
        .trace(Color::White)
        .debug(Color::Cyan)
        .info(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            let now = OffsetDateTime::now_utc()
                .format(&Iso8601::DEFAULT)
                .unwrap_or_default();
            out.finish(format_args!(
                "[{} {}] {}: {}",
                now,
                colors.color(record.level()),
                record.target(),
                message
            ));
        })
        .level(get_log_level(level))
        .filter(move |metadata| {
            !filter_targets
                .iter()
                .any(|filter| metadata.target().starts_with(filter.as_str()))
        })
        .chain(std::io::stdout())
}

pub fn get_log_level(level: Option<String>) -> LevelFilter {
    let level = level.unwrap_or_else(|| env::var("RUST_LOG").unwrap_or_default());
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}
