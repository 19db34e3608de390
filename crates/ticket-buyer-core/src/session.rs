use bdk_wallet::bitcoin::{Amount, BlockHash, OutPoint, Transaction, TxOut};
use std::collections::BTreeMap;

use crate::{select_voter, CoreError, SecretNumber, SecretNumberHash, VoterSelection};

/// Identifier the matcher assigns to a buyer inside a session.
pub type ParticipantId = u32;

/// Funding output referenced by one of the split transaction inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoEntry {
    pub value: Amount,
    pub script: Vec<u8>,
}

pub type UtxoMap = BTreeMap<OutPoint, UtxoEntry>;

/// Chain state every participant of a session agreed on at match time.
///
/// The lottery is only reproducible if all participants evaluate it over the
/// same tip, so this is fixed when the session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainContext {
    pub mainchain_hash: BlockHash,
    pub mainchain_height: u32,
    pub nb_participants: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Participant {
    pub secret_hash: SecretNumberHash,
    pub secret_number: Option<SecretNumber>,
    pub vote_script: Vec<u8>,
    pub pool_script: Vec<u8>,
    pub amount: Amount,
    pub ticket: Option<Transaction>,
    pub revocation: Option<Transaction>,
    pub vote_address: String,
}

#[derive(Debug, Clone)]
struct LocalSecret {
    number: SecretNumber,
    hash: SecretNumberHash,
    hash_sent: bool,
}

/// State of a single split ticket purchase in progress.
///
/// Created by the matcher connection once a set of participants is paired and
/// then mutated stage by stage by the purchase flow that owns it.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: ParticipantId,
    pub amount: Amount,
    pub fee: Amount,
    pub pool_fee: Amount,
    pub ticket_price: Amount,
    session_token: Vec<u8>,

    chain: ChainContext,
    secret: LocalSecret,

    pub vote_address: String,
    pub pool_address: String,
    pub split_output_address: Option<String>,
    pub ticket_output_address: Option<String>,
    pub split_change: Option<TxOut>,
    /// Outpoints this buyer contributes to the split transaction
    pub split_inputs: Vec<OutPoint>,
    participants: Vec<Participant>,
    pub split_utxos: UtxoMap,
    my_index: Option<usize>,

    pub ticket_template: Option<Transaction>,
    pub split_tx: Option<Transaction>,

    /// One entry per participant once signing completes
    pub ticket_signatures: Vec<Vec<u8>>,
    pub revocation_signature: Option<Vec<u8>>,

    pub selected_ticket: Option<Transaction>,
    pub funded_split_tx: Option<Transaction>,
    pub selected_revocation: Option<Transaction>,
    pub voter_index: Option<usize>,
    pub selected_coin: Option<Amount>,
}

impl Session {
    pub fn new(
        id: ParticipantId,
        session_token: Vec<u8>,
        chain: ChainContext,
        secret_number: SecretNumber,
    ) -> Self {
        Self {
            id,
            amount: Amount::ZERO,
            fee: Amount::ZERO,
            pool_fee: Amount::ZERO,
            ticket_price: Amount::ZERO,
            session_token,
            chain,
            secret: LocalSecret {
                number: secret_number,
                hash: secret_number.hash(),
                hash_sent: false,
            },
            vote_address: String::new(),
            pool_address: String::new(),
            split_output_address: None,
            ticket_output_address: None,
            split_change: None,
            split_inputs: Vec::new(),
            participants: Vec::new(),
            split_utxos: UtxoMap::new(),
            my_index: None,
            ticket_template: None,
            split_tx: None,
            ticket_signatures: Vec::new(),
            revocation_signature: None,
            selected_ticket: None,
            funded_split_tx: None,
            selected_revocation: None,
            voter_index: None,
            selected_coin: None,
        }
    }

    pub fn session_token(&self) -> &[u8] {
        &self.session_token
    }

    pub fn chain(&self) -> &ChainContext {
        &self.chain
    }

    pub fn mainchain_hash(&self) -> &BlockHash {
        &self.chain.mainchain_hash
    }

    pub fn mainchain_height(&self) -> u32 {
        self.chain.mainchain_height
    }

    pub fn nb_participants(&self) -> usize {
        self.chain.nb_participants as usize
    }

    pub fn secret_number_hash(&self) -> SecretNumberHash {
        self.secret.hash
    }

    /// Local secret number, for archival. Use [`Session::reveal_secret_number`]
    /// when sending it to the matcher.
    pub fn local_secret_number(&self) -> SecretNumber {
        self.secret.number
    }

    /// Records that the secret number hash reached the matcher.
    pub fn mark_secret_hash_sent(&mut self) {
        self.secret.hash_sent = true;
    }

    pub fn secret_hash_sent(&self) -> bool {
        self.secret.hash_sent
    }

    /// Returns the secret number for revealing it to the matcher.
    pub fn reveal_secret_number(&self) -> Result<SecretNumber, CoreError> {
        if !self.secret.hash_sent {
            return Err(CoreError::RevealBeforeCommit);
        }
        Ok(self.secret.number)
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Mutable access to the participants. The list length can't change.
    pub fn participants_mut(&mut self) -> &mut [Participant] {
        &mut self.participants
    }

    pub fn set_participants(&mut self, participants: Vec<Participant>) -> Result<(), CoreError> {
        if participants.len() != self.nb_participants() {
            return Err(CoreError::ParticipantCount {
                expected: self.nb_participants(),
                actual: participants.len(),
            });
        }
        self.participants = participants;
        Ok(())
    }

    pub fn my_index(&self) -> Option<usize> {
        self.my_index
    }

    /// Assigns the buyer's position in the participant list. Once set it may
    /// only be re-assigned to the same value.
    pub fn assign_my_index(&mut self, index: usize) -> Result<(), CoreError> {
        if index >= self.nb_participants() {
            return Err(CoreError::IndexOutOfRange {
                index,
                count: self.nb_participants(),
            });
        }
        match self.my_index {
            Some(current) if current != index => Err(CoreError::IndexAlreadyAssigned {
                current,
                requested: index,
            }),
            _ => {
                self.my_index = Some(index);
                Ok(())
            }
        }
    }

    pub fn secret_hashes(&self) -> Vec<SecretNumberHash> {
        self.participants.iter().map(|p| p.secret_hash).collect()
    }

    pub fn secret_numbers(&self) -> Vec<Option<SecretNumber>> {
        self.participants.iter().map(|p| p.secret_number).collect()
    }

    pub fn amounts(&self) -> Vec<Amount> {
        self.participants.iter().map(|p| p.amount).collect()
    }

    pub fn vote_scripts(&self) -> Vec<Vec<u8>> {
        self.participants
            .iter()
            .map(|p| p.vote_script.clone())
            .collect()
    }

    pub fn vote_addresses(&self) -> Vec<String> {
        self.participants
            .iter()
            .map(|p| p.vote_address.clone())
            .collect()
    }

    /// Outpoints spent by the split transaction, preferring the funded one.
    pub fn split_input_outpoints(&self) -> Vec<OutPoint> {
        self.funded_split_tx
            .as_ref()
            .or(self.split_tx.as_ref())
            .map(|tx| tx.input.iter().map(|input| input.previous_output).collect())
            .unwrap_or_default()
    }

    /// Sum of this buyer's split inputs that resolve in the utxo map.
    pub fn my_total_amount_in(&self) -> Amount {
        self.split_inputs
            .iter()
            .filter_map(|outpoint| self.split_utxos.get(outpoint))
            .fold(Amount::ZERO, |total, entry| total + entry.value)
    }

    pub fn check_split_inputs_resolved(&self) -> Result<(), CoreError> {
        if self.funded_split_tx.is_none() && self.split_tx.is_none() {
            return Err(CoreError::MissingArtifact("split transaction"));
        }
        match self
            .split_input_outpoints()
            .into_iter()
            .find(|outpoint| !self.split_utxos.contains_key(outpoint))
        {
            Some(outpoint) => Err(CoreError::UnresolvedSplitInput(outpoint)),
            None => Ok(()),
        }
    }

    pub fn check_signatures_complete(&self) -> Result<(), CoreError> {
        if self.ticket_signatures.len() != self.nb_participants() {
            return Err(CoreError::IncompleteSignatures {
                expected: self.nb_participants(),
                actual: self.ticket_signatures.len(),
            });
        }
        Ok(())
    }

    /// Checks every revealed secret number against the hash its owner
    /// committed to.
    pub fn verify_secret_numbers(&self) -> Result<(), CoreError> {
        for (index, participant) in self.participants.iter().enumerate() {
            let number = participant
                .secret_number
                .ok_or(CoreError::SecretNotRevealed(index))?;
            if number.hash() != participant.secret_hash {
                return Err(CoreError::SecretHashMismatch(index));
            }
        }
        Ok(())
    }

    /// Recomputes the voter lottery from the session data.
    pub fn voter_selection(&self) -> Result<VoterSelection, CoreError> {
        select_voter(
            &self.secret_hashes(),
            &self.amounts(),
            &self.vote_addresses(),
            &self.chain.mainchain_hash,
        )
    }

    /// Checks the voter index and coin recorded in the session against an
    /// independent recomputation of the lottery.
    pub fn verify_voter_selection(&self) -> Result<VoterSelection, CoreError> {
        let computed = self.voter_selection()?;
        let recorded = self
            .voter_index
            .ok_or(CoreError::MissingArtifact("voter index"))?;
        if recorded != computed.index {
            return Err(CoreError::VoterIndexMismatch {
                recorded,
                computed: computed.index,
            });
        }
        if let Some(coin) = self.selected_coin {
            if coin != computed.coin {
                return Err(CoreError::SelectedCoinMismatch {
                    recorded: coin,
                    computed: computed.coin,
                });
            }
        }
        Ok(computed)
    }
}
