//! # Balance & History Queries
//!
//! Read-only projections of one ledger entry. Both queries resolve the
//! holder through the account directory, so the key is always built
//! from the canonical account name rather than whatever spelling the
//! client sent.

use chrono::{DateTime, Local, Utc};
use ledger_protocol::context::TxContext;
use ledger_protocol::directory::Directory;
use ledger_protocol::storage::KeyModification;
use serde::Serialize;
use serde_json::value::RawValue;
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger_entry::LedgerEntry;
use crate::request::AccountQuery;

/// Timestamp layout of history records, in the host's local zone.
const HISTORY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f %z";

/// One element of the history array.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct HistoryRecord<'a> {
    tx_id: &'a str,
    /// The stored JSON verbatim, or `null` for a deletion.
    value: Option<&'a RawValue>,
    timestamp: String,
    /// `"true"` or `"false"`.
    is_delete: &'static str,
}

/// Resolves and checks the account and token, returning the entry key.
fn resolve_entry_key(
    ctx: &mut dyn TxContext,
    directory: &dyn Directory,
    query: &AccountQuery,
) -> LedgerResult<String> {
    let account = directory.account(ctx, &query.holder)?;
    let token = directory.token(ctx, &query.token)?;

    if !account.status {
        return Err(LedgerError::AccountDisabled(account.did_name));
    }
    if !token.status {
        return Err(LedgerError::TokenLocked(token.name));
    }

    LedgerEntry::key(&token.name, &account.did_name)
}

/// Returns the stored entry bytes unchanged, or an empty payload when the
/// holder has no entry for the token.
pub fn balance(
    ctx: &mut dyn TxContext,
    directory: &dyn Directory,
    query: &AccountQuery,
) -> LedgerResult<Vec<u8>> {
    let key = resolve_entry_key(ctx, directory, query)?;
    Ok(LedgerEntry::load_raw(ctx, &key)?.unwrap_or_default())
}

/// Formats a history timestamp in local time.
pub fn format_history_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format(HISTORY_TIME_FORMAT).to_string()
}

/// Returns every committed version of the entry as a JSON array, in the
/// order the store yields them.
///
/// A version that fails to load, or whose value is not valid JSON, is
/// left out of the array rather than failing the query.
pub fn history(
    ctx: &mut dyn TxContext,
    directory: &dyn Directory,
    query: &AccountQuery,
) -> LedgerResult<Vec<u8>> {
    let key = resolve_entry_key(ctx, directory, query)?;

    let mut versions: Vec<KeyModification> = Vec::new();
    for record in ctx.history_for_key(&key)? {
        match record {
            Ok(modification) => versions.push(modification),
            Err(e) => warn!(%key, error = %e, "skipping unreadable history record"),
        }
    }

    let mut records = Vec::with_capacity(versions.len());
    for version in &versions {
        let value = match (&version.value, version.is_delete) {
            (Some(bytes), false) => {
                let parsed = std::str::from_utf8(bytes)
                    .ok()
                    .and_then(|s| serde_json::from_str::<&RawValue>(s).ok());
                match parsed {
                    Some(raw) => Some(raw),
                    None => {
                        warn!(%key, tx_id = %version.tx_id, "skipping history record with invalid value");
                        continue;
                    }
                }
            }
            _ => None,
        };
        records.push(HistoryRecord {
            tx_id: &version.tx_id,
            value,
            timestamp: format_history_timestamp(version.timestamp),
            is_delete: if version.is_delete { "true" } else { "false" },
        });
    }

    debug!(%key, versions = records.len(), "history loaded");
    Ok(serde_json::to_vec(&records)?)
}
