//! # Ledger Configuration & Constants
//!
//! Every key namespace, event name and precision constant used by the
//! ledger lives here. The composite-key index names are part of the
//! persisted layout: changing one after data has been written orphans
//! every record stored under the old name.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Version of the ledger state layout and request format.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Composite Key Namespaces
// ---------------------------------------------------------------------------

/// Object type for ledger balance records: `(LEDGER, token, holder)`.
pub const LEDGER_INDEX: &str = "ledger~token~holder";

/// Leading key part for ledger balance records.
pub const LEDGER_PREFIX: &str = "LEDGER";

/// Object type for pending multi-signature transfer requests:
/// `(SIGN, token, request_id)`.
pub const SIGN_REQUEST_INDEX: &str = "sign~token~request";

/// Leading key part for sign requests.
pub const SIGN_PREFIX: &str = "SIGN";

/// Object type for token master data: `(TOKEN, name)`.
pub const TOKEN_INDEX: &str = "token~name";

/// Leading key part for token master data.
pub const TOKEN_PREFIX: &str = "TOKEN";

/// Object type for account master data: `(ACCOUNT, name)`.
pub const ACCOUNT_INDEX: &str = "account~name";

/// Leading key part for account master data.
pub const ACCOUNT_PREFIX: &str = "ACCOUNT";

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// `Type` field of the notification emitted by a successful transfer.
pub const EVENT_PAYMENT: &str = "payment";

/// Topic prefix for payment notifications. The recipient identifier is
/// appended, so wallets subscribe to `payment.<their name>`.
pub const PAYMENT_TOPIC_PREFIX: &str = "payment.";

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Fixed-point precision of every stored amount.
pub const AMOUNT_DECIMALS: u32 = 8;

/// Number of smallest units in one whole token (10^AMOUNT_DECIMALS).
pub const UNITS_PER_TOKEN: u64 = 100_000_000;

/// Decimal places used when amounts are rendered in audit strings and
/// notifications.
pub const DISPLAY_DECIMALS: u32 = 2;

// ---------------------------------------------------------------------------
// Host Defaults
// ---------------------------------------------------------------------------

/// Default HTTP API port for the node binary.
pub const DEFAULT_API_PORT: u16 = 9841;

/// Default Prometheus metrics port for the node binary.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Topic on which the payment notification for `recipient` is published.
pub fn payment_topic(recipient: &str) -> String {
    format!("{PAYMENT_TOPIC_PREFIX}{recipient}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_names_are_distinct() {
        let names = [LEDGER_INDEX, SIGN_REQUEST_INDEX, TOKEN_INDEX, ACCOUNT_INDEX];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_prefixes_are_upper_case() {
        // Key parts are upper-cased before composition, so a lower-case
        // prefix constant could never match a stored key.
        for p in [LEDGER_PREFIX, SIGN_PREFIX, TOKEN_PREFIX, ACCOUNT_PREFIX] {
            assert_eq!(p, p.to_uppercase());
        }
    }

    #[test]
    fn test_units_match_decimals() {
        assert_eq!(UNITS_PER_TOKEN, 10u64.pow(AMOUNT_DECIMALS));
        assert!(DISPLAY_DECIMALS < AMOUNT_DECIMALS);
    }

    #[test]
    fn test_payment_topic_format() {
        assert_eq!(payment_topic("bob"), "payment.bob");
    }
}
