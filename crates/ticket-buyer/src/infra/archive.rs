//! Human readable record of a funded session.
//!
//! The archive holds everything needed to audit the voter lottery and to
//! rebuild or re-broadcast the session transactions by hand.

use bdk_wallet::bitcoin::{consensus::encode::serialize, Transaction};
use itertools::Itertools;
use std::io::Write;
use ticket_buyer_core::{lottery_commitment_hash, CoreError, Session};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::config::BuyerSettings;

fn tx_hex(tx: Option<&Transaction>) -> String {
    tx.map(|tx| hex::encode(serialize(tx)))
        .unwrap_or_else(|| String::from("[none]"))
}

fn or_none<T: ToString>(value: Option<T>) -> String {
    value
        .map(|value| value.to_string())
        .unwrap_or_else(|| String::from("[none]"))
}

/// Writes the archive of a session whose split transaction was funded.
pub fn write_session_archive(
    out: &mut impl Write,
    session: &Session,
    settings: &BuyerSettings,
    ended_at: OffsetDateTime,
) -> Result<(), anyhow::Error> {
    let ticket = session
        .selected_ticket
        .as_ref()
        .ok_or(CoreError::MissingArtifact("selected ticket"))?;
    let split = session
        .funded_split_tx
        .as_ref()
        .ok_or(CoreError::MissingArtifact("funded split transaction"))?;
    let revocation = session
        .selected_revocation
        .as_ref()
        .ok_or(CoreError::MissingArtifact("selected revocation"))?;

    let total_pool_fee = or_none(split.output.get(1).map(|output| output.value));
    let contribution = if session.ticket_price.to_sat() == 0 {
        0.0
    } else {
        (session.amount + session.pool_fee).to_sat() as f64 / session.ticket_price.to_sat() as f64
            * 100.0
    };
    let total_fee = session
        .fee
        .checked_mul(session.nb_participants() as u64)
        .map(|fee| fee.to_string())
        .unwrap_or_else(|| String::from("[overflow]"));

    writeln!(out, "====== General Info ======")?;
    writeln!(out, "Session ID = {}", session.id)?;
    writeln!(out, "Ending Time = {}", ended_at.format(&Rfc3339)?)?;
    writeln!(out, "Mainchain Hash = {}", session.mainchain_hash())?;
    writeln!(out, "Mainchain Height = {}", session.mainchain_height())?;
    writeln!(out, "Ticket Price = {}", session.ticket_price)?;
    writeln!(out, "Number of Participants = {}", session.nb_participants())?;
    writeln!(out, "My Index = {}", or_none(session.my_index()))?;
    writeln!(out, "My Secret Number = {}", session.local_secret_number())?;
    writeln!(out, "My Secret Hash = {}", session.secret_number_hash())?;
    writeln!(
        out,
        "Commitment Amount = {} ({:.2}%)",
        session.amount, contribution
    )?;
    writeln!(out, "Ticket Fee = {} (total = {})", session.fee, total_fee)?;
    writeln!(
        out,
        "Pool Fee = {} (total = {})",
        session.pool_fee, total_pool_fee
    )?;
    writeln!(out, "Split Transaction hash = {}", split.compute_txid())?;
    writeln!(out, "Final Ticket Hash = {}", ticket.compute_txid())?;
    writeln!(out, "Final Revocation Hash = {}", revocation.compute_txid())?;

    let commitment = lottery_commitment_hash(
        &session.secret_hashes(),
        &session.amounts(),
        &session.vote_addresses(),
        session.mainchain_hash(),
    );
    writeln!(out)?;
    writeln!(out, "====== Voter Selection ======")?;
    writeln!(
        out,
        "Participant Amounts = [{}]",
        session.amounts().iter().join(", ")
    )?;
    writeln!(
        out,
        "Secret Hashes = [{}]",
        session.secret_hashes().iter().join(", ")
    )?;
    writeln!(
        out,
        "Voter Addresses = [{}]",
        session.vote_addresses().iter().join(", ")
    )?;
    writeln!(
        out,
        "Voter Lottery Commitment Hash = {}",
        hex::encode(commitment)
    )?;
    writeln!(
        out,
        "Secret Numbers = [{}]",
        session
            .secret_numbers()
            .into_iter()
            .map(or_none)
            .join(", ")
    )?;
    writeln!(out, "Selected Coin = {}", or_none(session.selected_coin))?;
    writeln!(out, "Selected Voter Index = {}", or_none(session.voter_index))?;

    writeln!(out)?;
    writeln!(out, "====== My Participation Info ======")?;
    writeln!(out, "Total input amount: {}", session.my_total_amount_in())?;
    writeln!(
        out,
        "Change amount: {}",
        or_none(session.split_change.as_ref().map(|change| change.value))
    )?;
    writeln!(
        out,
        "Commitment Address: {}",
        or_none(session.ticket_output_address.as_ref())
    )?;
    writeln!(
        out,
        "Split Output Address: {}",
        or_none(session.split_output_address.as_ref())
    )?;
    writeln!(out, "Vote Address: {}", settings.vote_address)?;
    writeln!(out, "Pool Fee Address: {}", settings.pool_address)?;

    writeln!(out)?;
    writeln!(out, "====== Final Transactions ======")?;
    writeln!(out, "== Split Transaction ==")?;
    writeln!(out, "{}", hex::encode(serialize(split)))?;
    writeln!(out)?;
    writeln!(out, "== Ticket ==")?;
    writeln!(out, "{}", hex::encode(serialize(ticket)))?;
    writeln!(out)?;
    writeln!(out, "== Revocation ==")?;
    writeln!(out, "{}", hex::encode(serialize(revocation)))?;
    writeln!(out)?;

    writeln!(out)?;
    writeln!(out, "====== My Split Inputs ======")?;
    for (i, outpoint) in session.split_inputs.iter().enumerate() {
        writeln!(out, "Outpoint {} = {}", i, outpoint)?;
    }

    writeln!(out)?;
    writeln!(out, "====== Participant Intermediate Information ======")?;
    for (i, participant) in session.participants().iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "== Participant {} ==", i)?;
        writeln!(out, "Amount = {}", participant.amount)?;
        writeln!(out, "Secret Hash = {}", participant.secret_hash)?;
        writeln!(out, "Secret Number = {}", or_none(participant.secret_number))?;
        writeln!(out, "Vote Address = {}", participant.vote_address)?;
        writeln!(out, "Vote PkScript = {}", hex::encode(&participant.vote_script))?;
        writeln!(out, "Pool PkScript = {}", hex::encode(&participant.pool_script))?;
        writeln!(out, "Ticket = {}", tx_hex(participant.ticket.as_ref()))?;
        writeln!(out, "Revocation = {}", tx_hex(participant.revocation.as_ref()))?;
    }

    out.flush()?;
    Ok(())
}
