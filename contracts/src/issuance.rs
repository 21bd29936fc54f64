//! # Issuance
//!
//! Records a holder's balance of a token. Only a super-administrator or
//! the token's registered issuer may issue. An issuer always issues to
//! itself; an administrator must name an enabled holder account.
//!
//! Issuance sets the balance to the requested amount. It does not add
//! to an existing balance.

use ledger_protocol::context::TxContext;
use ledger_protocol::directory::Directory;
use ledger_protocol::identity::Role;
use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger_entry::LedgerEntry;
use crate::request::IssueRequest;

/// Writes the holder's ledger entry with `request.amount`.
pub fn issue(
    ctx: &mut dyn TxContext,
    directory: &dyn Directory,
    request: &IssueRequest,
) -> LedgerResult<Vec<u8>> {
    let token = directory.token(ctx, &request.token)?;

    let role = Role::resolve(ctx.caller(), Some(&token.issuer), None);
    if !role.can_issue() {
        return Err(LedgerError::PermissionDenied(
            "only super admin and token issuer can issue the token".into(),
        ));
    }
    if !token.status {
        return Err(LedgerError::TokenLocked(token.name));
    }

    let caller = ctx.caller().name.clone();
    let holder = if role == Role::SuperAdmin {
        let name = request
            .holder
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                LedgerError::MalformedRequest("the token holder must not be empty".into())
            })?;
        let account = directory.account(ctx, name)?;
        if !account.status {
            return Err(LedgerError::AccountDisabled(account.did_name));
        }
        account.did_name
    } else {
        caller.clone()
    };

    let key = LedgerEntry::key(&token.name, &holder)?;
    let mut entry = LedgerEntry::new(token.name.clone(), holder.clone(), request.amount);
    entry.desc = format!(
        "{caller} issue {} token amount:{}",
        token.name, request.amount
    );
    entry.save(ctx, &key)?;

    info!(token = %token.name, %holder, amount = %request.amount, "token issued");
    Ok(Vec::new())
}
