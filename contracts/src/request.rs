//! # Request Decoding
//!
//! Every ledger function takes exactly one argument: a JSON object whose
//! fields may be spelled in lowercase (`token`) or PascalCase (`Token`).
//! [`LedgerRequest::decode`] turns a function name and argument list into
//! a typed request or a [`LedgerError::MalformedRequest`]; nothing past
//! this point ever sees raw JSON.

use ledger_protocol::{Amount, Scale};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Issue `amount` of `token`. `holder` is required when the caller is a
/// super-administrator and ignored otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRequest {
    #[serde(alias = "Token")]
    pub token: String,
    #[serde(default, alias = "Holder")]
    pub holder: Option<String>,
    #[serde(alias = "Amount")]
    pub amount: Amount,
}

/// Identifies one ledger entry for balance and history queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountQuery {
    #[serde(alias = "Token")]
    pub token: String,
    #[serde(alias = "Holder")]
    pub holder: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    #[serde(alias = "From")]
    pub from: String,
    #[serde(alias = "To")]
    pub to: String,
    #[serde(alias = "Token")]
    pub token: String,
    #[serde(alias = "Amount")]
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescaleRequest {
    #[serde(alias = "Token")]
    pub token: String,
    #[serde(alias = "Scale")]
    pub scale: Scale,
}

/// A decoded ledger invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerRequest {
    Issue(IssueRequest),
    GetBalance(AccountQuery),
    GetHistory(AccountQuery),
    Transfer(TransferRequest),
    Rescale(RescaleRequest),
}

fn parse<T: DeserializeOwned>(arg: &str) -> LedgerResult<T> {
    serde_json::from_str(arg).map_err(|e| LedgerError::MalformedRequest(e.to_string()))
}

fn require(field: &str, value: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::MalformedRequest(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

/// The functions the ledger exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerFunction {
    Issue,
    GetBalance,
    GetHistory,
    Transfer,
    Rescale,
}

impl LedgerFunction {
    /// Matches `name` case-insensitively. The `Ledger*` names of earlier
    /// deployments are accepted as aliases.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "issue" | "ledgerissue" => Some(Self::Issue),
            "getbalance" | "ledgergetbalance" => Some(Self::GetBalance),
            "gethistory" | "ledgergethistory" => Some(Self::GetHistory),
            "transfer" | "ledgertransfer" => Some(Self::Transfer),
            "rescale" | "ledgerrescale" | "ledgerscale" => Some(Self::Rescale),
            _ => None,
        }
    }

    /// Canonical name, used as a log field and metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::GetBalance => "getBalance",
            Self::GetHistory => "getHistory",
            Self::Transfer => "transfer",
            Self::Rescale => "rescale",
        }
    }
}

impl LedgerRequest {
    /// Decodes `function(args)`; see [`LedgerFunction::parse`] for the
    /// accepted names.
    pub fn decode(function: &str, args: &[String]) -> LedgerResult<Self> {
        let [arg] = args else {
            return Err(LedgerError::MalformedRequest(format!(
                "{function} expects exactly 1 argument, got {}",
                args.len()
            )));
        };

        let parsed = LedgerFunction::parse(function).ok_or_else(|| {
            LedgerError::MalformedRequest(format!("unknown function: {function}"))
        })?;

        let request = match parsed {
            LedgerFunction::Issue => {
                let req: IssueRequest = parse(arg)?;
                require("token", &req.token)?;
                LedgerRequest::Issue(req)
            }
            LedgerFunction::GetBalance => {
                let req: AccountQuery = parse(arg)?;
                require("token", &req.token)?;
                require("holder", &req.holder)?;
                LedgerRequest::GetBalance(req)
            }
            LedgerFunction::GetHistory => {
                let req: AccountQuery = parse(arg)?;
                require("token", &req.token)?;
                require("holder", &req.holder)?;
                LedgerRequest::GetHistory(req)
            }
            LedgerFunction::Transfer => {
                let req: TransferRequest = parse(arg)?;
                require("token", &req.token)?;
                require("from", &req.from)?;
                require("to", &req.to)?;
                if req.amount.is_zero() {
                    return Err(LedgerError::MalformedRequest(
                        "transfer amount must be positive".into(),
                    ));
                }
                LedgerRequest::Transfer(req)
            }
            LedgerFunction::Rescale => {
                let req: RescaleRequest = parse(arg)?;
                require("token", &req.token)?;
                LedgerRequest::Rescale(req)
            }
        };
        Ok(request)
    }

    pub fn function(&self) -> LedgerFunction {
        match self {
            LedgerRequest::Issue(_) => LedgerFunction::Issue,
            LedgerRequest::GetBalance(_) => LedgerFunction::GetBalance,
            LedgerRequest::GetHistory(_) => LedgerFunction::GetHistory,
            LedgerRequest::Transfer(_) => LedgerFunction::Transfer,
            LedgerRequest::Rescale(_) => LedgerFunction::Rescale,
        }
    }

    /// `true` for functions that never write state.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            LedgerRequest::GetBalance(_) | LedgerRequest::GetHistory(_)
        )
    }
}
