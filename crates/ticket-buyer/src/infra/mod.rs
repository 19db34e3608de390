mod archive;
mod chain;
mod connector;
mod matcher;
mod session_writer;
mod wallet;

pub use archive::write_session_archive;
pub use chain::{ChainNode, NodeUtxoSource, UtxoSource};
pub use connector::{Connector, WalletDiscovery};
pub use matcher::{Matcher, MatcherStatus, ParticipateRequest};
pub use session_writer::{FileSessionWriter, SessionArchive, SessionWriter};
pub use wallet::{ChainInfo, Wallet};
