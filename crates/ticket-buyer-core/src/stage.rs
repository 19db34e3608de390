use std::fmt;

/// Progress stages of a split ticket purchase, in the order they are reached.
///
/// ```text
/// Starting
///     ↓
/// ConnectingToWallet → ConnectingToNode | ConnectingToIndexer → ConnectingToMatcher
///     ↓
/// FindingMatches → MatchesFound
///     ↓
/// GeneratingOutputs → OutputsGenerated
///     ↓
/// GeneratingTicket → TicketGenerated
///     ↓
/// SigningTicket → TicketSigned
///     ↓
/// FundingTicket → TicketFunded
///     ↓
/// FundingSplitTx → SplitTxFunded
///     ↓
/// SkippedWaiting | WaitingPublishedTxs
///     ↓
/// SessionEndedSuccessfully
/// ```
///
/// The derived ordering follows declaration order, so a well behaved session
/// only ever reports increasing stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Starting,
    ConnectingToWallet,
    ConnectingToNode,
    ConnectingToIndexer,
    ConnectingToMatcher,
    FindingMatches,
    MatchesFound,
    GeneratingOutputs,
    OutputsGenerated,
    GeneratingTicket,
    TicketGenerated,
    SigningTicket,
    TicketSigned,
    FundingTicket,
    TicketFunded,
    FundingSplitTx,
    SplitTxFunded,
    SkippedWaiting,
    WaitingPublishedTxs,
    SessionEndedSuccessfully,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::ConnectingToWallet => "connecting_to_wallet",
            Self::ConnectingToNode => "connecting_to_node",
            Self::ConnectingToIndexer => "connecting_to_indexer",
            Self::ConnectingToMatcher => "connecting_to_matcher",
            Self::FindingMatches => "finding_matches",
            Self::MatchesFound => "matches_found",
            Self::GeneratingOutputs => "generating_outputs",
            Self::OutputsGenerated => "outputs_generated",
            Self::GeneratingTicket => "generating_ticket",
            Self::TicketGenerated => "ticket_generated",
            Self::SigningTicket => "signing_ticket",
            Self::TicketSigned => "ticket_signed",
            Self::FundingTicket => "funding_ticket",
            Self::TicketFunded => "ticket_funded",
            Self::FundingSplitTx => "funding_split_tx",
            Self::SplitTxFunded => "split_tx_funded",
            Self::SkippedWaiting => "skipped_waiting",
            Self::WaitingPublishedTxs => "waiting_published_txs",
            Self::SessionEndedSuccessfully => "session_ended_successfully",
        }
    }

    /// Stages reached after a session was matched.
    pub fn has_session(&self) -> bool {
        *self >= Self::MatchesFound
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SessionEndedSuccessfully)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
