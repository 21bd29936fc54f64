//! # Transfer
//!
//! Moves an amount from the caller's balance to another holder's and
//! publishes a payment notification to the recipient's topic.
//!
//! The debit and credit are two writes in the same invocation; the commit
//! layer applies both or neither. A recipient without a ledger entry for
//! the token gets one on first credit.

use ledger_protocol::config::{payment_topic, EVENT_PAYMENT};
use ledger_protocol::context::TxContext;
use ledger_protocol::directory::Directory;
use ledger_protocol::identity::same_identity;
use ledger_protocol::Amount;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger_entry::LedgerEntry;
use crate::request::TransferRequest;

/// Payload of the payment notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LedgerEvent {
    #[serde(rename = "Type")]
    pub event_type: String,
    pub tx_id: String,
    /// Transaction time, unix seconds.
    pub time: i64,
    pub from: String,
    pub to: String,
    /// Amount with two decimals, e.g. `"30.00"`.
    pub amount: String,
    pub token: String,
}

/// Debits `request.from`, credits `request.to`, emits the payment event.
pub fn transfer(
    ctx: &mut dyn TxContext,
    directory: &dyn Directory,
    request: &TransferRequest,
) -> LedgerResult<Vec<u8>> {
    let caller = ctx.caller().name.clone();
    if !same_identity(&caller, &request.from) {
        return Err(LedgerError::PermissionDenied(format!(
            "{} is not the current user {caller}",
            request.from
        )));
    }

    let from_account = directory.account(ctx, &request.from)?;
    let to_account = directory.account(ctx, &request.to)?;
    if from_account.did_name == to_account.did_name {
        return Err(LedgerError::PermissionDenied(format!(
            "{} cannot transfer to itself",
            request.from
        )));
    }
    if !from_account.status {
        return Err(LedgerError::AccountLocked(from_account.did_name));
    }
    if !to_account.status {
        return Err(LedgerError::AccountLocked(to_account.did_name));
    }

    let token = directory.token(ctx, &request.token)?;
    if !token.status {
        return Err(LedgerError::TokenLocked(token.name));
    }

    let desc = format!(
        "from {} transfer to {}, value: {}",
        from_account.did_name, to_account.did_name, request.amount
    );

    // Debit.
    let from_key = LedgerEntry::key(&token.name, &from_account.did_name)?;
    let mut from_entry =
        LedgerEntry::load(ctx, &from_key)?.ok_or_else(|| LedgerError::LedgerEntryNotFound {
            token: token.name.clone(),
            holder: from_account.did_name.clone(),
        })?;
    if from_entry.amount < request.amount {
        return Err(LedgerError::InsufficientBalance {
            holder: from_account.did_name,
            token: token.name,
            balance: from_entry.amount,
            requested: request.amount,
        });
    }
    from_entry.amount = from_entry.amount.checked_sub(request.amount)?;
    from_entry.desc = desc.clone();
    from_entry.save(ctx, &from_key)?;

    // Credit.
    let to_key = LedgerEntry::key(&token.name, &to_account.did_name)?;
    let mut to_entry = LedgerEntry::load(ctx, &to_key)?.unwrap_or_else(|| {
        LedgerEntry::new(
            token.name.to_uppercase(),
            to_account.did_name.to_uppercase(),
            Amount::ZERO,
        )
    });
    to_entry.amount = to_entry.amount.checked_add(request.amount)?;
    to_entry.desc = desc;
    to_entry.save(ctx, &to_key)?;

    let event = LedgerEvent {
        event_type: EVENT_PAYMENT.to_string(),
        tx_id: ctx.tx_id().to_string(),
        time: ctx.tx_timestamp().timestamp(),
        from: request.from.clone(),
        to: request.to.clone(),
        amount: request.amount.to_string(),
        token: request.token.clone(),
    };
    ctx.set_event(&payment_topic(&request.to), serde_json::to_vec(&event)?)?;

    info!(
        token = %token.name,
        from = %from_account.did_name,
        to = %to_account.did_name,
        amount = %request.amount,
        "transfer applied"
    );
    Ok(Vec::new())
}
