//! # Rescale
//!
//! Splits or merges a token: every holder's balance and every pending
//! sign request amount is multiplied by the same factor. Sign requests
//! in any other status keep their amounts but still count toward the
//! reported total.
//!
//! Both passes are prefix scans, so the commit layer also checks that no
//! entry was added under the token while the rescale was simulated.

use ledger_protocol::context::TxContext;
use ledger_protocol::directory::{Directory, SignRequest, SignStatus};
use ledger_protocol::identity::Role;
use ledger_protocol::{keys, Scale};
use tracing::{debug, info};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger_entry::LedgerEntry;
use crate::request::RescaleRequest;

/// Audit note for a rescale by `scale`.
pub fn rescale_desc(token: &str, scale: Scale) -> String {
    if scale.is_split() {
        format!("{token} token split, split scale {scale}")
    } else {
        format!("{token} token merge, merge scale {scale}")
    }
}

/// Rescales all balances and pending sign requests of `request.token`.
///
/// Returns `"had scale {i} token holders, had scale {j} pending for sign tx"`,
/// where `j` is every sign request scanned under the token.
pub fn rescale(
    ctx: &mut dyn TxContext,
    directory: &dyn Directory,
    request: &RescaleRequest,
) -> LedgerResult<Vec<u8>> {
    let token = directory.token(ctx, &request.token)?;
    if !token.status {
        return Err(LedgerError::TokenLocked(token.name));
    }
    if !Role::resolve(ctx.caller(), Some(&token.issuer), None).can_rescale() {
        return Err(LedgerError::PermissionDenied(
            "only super admin can split or merge a token".into(),
        ));
    }

    let scale = request.scale;
    let desc = rescale_desc(&request.token, scale);

    let mut holders = 0usize;
    for item in ctx.state_by_prefix(&keys::ledger_prefix(&token.name)?)? {
        let item = item?;
        let mut entry: LedgerEntry = serde_json::from_slice(&item.value)?;
        let before = entry.amount;
        entry.amount = entry.amount.rescale(scale)?;
        entry.desc = desc.clone();
        entry.save(ctx, &item.key)?;
        debug!(holder = %entry.holder, %before, after = %entry.amount, "balance rescaled");
        holders += 1;
    }

    let mut sign_requests = 0usize;
    for item in ctx.state_by_prefix(&keys::sign_request_prefix(&token.name)?)? {
        let item = item?;
        sign_requests += 1;
        let mut sign_request: SignRequest = serde_json::from_slice(&item.value)?;
        if sign_request.status != SignStatus::Pending {
            continue;
        }
        sign_request.amount = sign_request.amount.rescale(scale)?;
        sign_request.desc = desc.clone();
        ctx.put_state(&item.key, serde_json::to_vec(&sign_request)?)?;
    }

    info!(token = %token.name, %scale, holders, sign_requests, "token rescaled");
    Ok(format!(
        "had scale {holders} token holders, had scale {sign_requests} pending for sign tx"
    )
    .into_bytes())
}
