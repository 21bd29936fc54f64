//! # Composite Key Codec
//!
//! Every record in world state is addressed by a composite key built from
//! an object type and an ordered list of parts:
//!
//! ```text
//! \0 <object_type> \0 <PART_1> \0 <PART_2> \0 ... <PART_N> \0
//! ```
//!
//! Parts are upper-cased before composition, so `("gld", "alice")` and
//! `("GLD", "Alice")` address the same record. Because every component is
//! terminated by a NUL and no component may contain one, distinct tuples
//! always produce distinct keys, and a key built from a prefix of the parts
//! is a byte prefix of every key that extends it. Range scans over a
//! partial key therefore return exactly the records under that prefix.

use thiserror::Error;

use crate::config::{
    ACCOUNT_INDEX, ACCOUNT_PREFIX, LEDGER_INDEX, LEDGER_PREFIX, SIGN_PREFIX, SIGN_REQUEST_INDEX,
    TOKEN_INDEX, TOKEN_PREFIX,
};

/// Component delimiter.
const DELIMITER: char = '\u{0}';

/// Largest Unicode scalar; reserved as an upper range bound, never allowed
/// inside a component.
const MAX_UNICODE_RUNE: char = '\u{10FFFF}';

/// Errors produced while composing or splitting keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The object type or a part contains a reserved character, or the
    /// object type is empty.
    #[error("could not create a composite key for {object_type} {parts:?}: {reason}")]
    InvalidAttribute {
        /// Object type the key was being built for.
        object_type: String,
        /// The normalized parts that were rejected.
        parts: Vec<String>,
        /// Which rule was violated.
        reason: String,
    },

    /// A string that is not a composite key was passed to the splitter.
    #[error("malformed composite key: {0:?}")]
    Malformed(String),
}

fn check_component(component: &str) -> Result<(), &'static str> {
    if component.contains(DELIMITER) {
        return Err("contains a NUL delimiter");
    }
    if component.contains(MAX_UNICODE_RUNE) {
        return Err("contains U+10FFFF");
    }
    Ok(())
}

fn normalize<S: AsRef<str>>(parts: &[S]) -> Vec<String> {
    parts.iter().map(|p| p.as_ref().to_uppercase()).collect()
}

fn compose(object_type: &str, parts: Vec<String>) -> Result<String, KeyError> {
    let reject = |reason: &str, parts: Vec<String>| KeyError::InvalidAttribute {
        object_type: object_type.to_string(),
        parts,
        reason: reason.to_string(),
    };

    if object_type.is_empty() {
        return Err(reject("empty object type", parts));
    }
    if let Err(reason) = check_component(object_type) {
        return Err(reject(reason, parts));
    }
    if let Some(reason) = parts.iter().find_map(|p| check_component(p).err()) {
        return Err(reject(reason, parts));
    }

    let mut key = String::with_capacity(
        2 + object_type.len() + parts.iter().map(|p| p.len() + 1).sum::<usize>(),
    );
    key.push(DELIMITER);
    key.push_str(object_type);
    key.push(DELIMITER);
    for part in &parts {
        key.push_str(part);
        key.push(DELIMITER);
    }
    Ok(key)
}

/// Builds the composite key for `(object_type, parts...)`.
///
/// # Errors
///
/// Returns [`KeyError::InvalidAttribute`] carrying the offending parts if
/// any component contains `U+0000` or `U+10FFFF`, or if `object_type` is
/// empty.
pub fn composite_key<S: AsRef<str>>(object_type: &str, parts: &[S]) -> Result<String, KeyError> {
    compose(object_type, normalize(parts))
}

/// Builds a partial key for prefix scans. Identical layout to
/// [`composite_key`]; named separately to make scan call sites obvious.
pub fn partial_key<S: AsRef<str>>(object_type: &str, parts: &[S]) -> Result<String, KeyError> {
    composite_key(object_type, parts)
}

/// Splits a composite key back into its object type and parts.
pub fn split_composite_key(key: &str) -> Result<(String, Vec<String>), KeyError> {
    let body = key
        .strip_prefix(DELIMITER)
        .and_then(|k| k.strip_suffix(DELIMITER))
        .ok_or_else(|| KeyError::Malformed(key.to_string()))?;

    let mut components = body.split(DELIMITER);
    let object_type = components
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| KeyError::Malformed(key.to_string()))?;

    Ok((
        object_type.to_string(),
        components.map(str::to_string).collect(),
    ))
}

/// Key of the ledger balance record for `(token, holder)`.
pub fn ledger_key(token: &str, holder: &str) -> Result<String, KeyError> {
    composite_key(LEDGER_INDEX, &[LEDGER_PREFIX, token, holder])
}

/// Prefix covering every ledger balance record of `token`.
pub fn ledger_prefix(token: &str) -> Result<String, KeyError> {
    partial_key(LEDGER_INDEX, &[LEDGER_PREFIX, token])
}

/// Key of a pending sign request for `token`.
pub fn sign_request_key(token: &str, request_id: &str) -> Result<String, KeyError> {
    composite_key(SIGN_REQUEST_INDEX, &[SIGN_PREFIX, token, request_id])
}

/// Prefix covering every sign request of `token`.
pub fn sign_request_prefix(token: &str) -> Result<String, KeyError> {
    partial_key(SIGN_REQUEST_INDEX, &[SIGN_PREFIX, token])
}

/// Key of the master-data record for token `name`.
pub fn token_key(name: &str) -> Result<String, KeyError> {
    composite_key(TOKEN_INDEX, &[TOKEN_PREFIX, name])
}

/// Key of the master-data record for account `name`.
pub fn account_key(name: &str) -> Result<String, KeyError> {
    composite_key(ACCOUNT_INDEX, &[ACCOUNT_PREFIX, name])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_and_case_normalization() {
        let key = composite_key("idx", &["gld", "Alice"]).unwrap();
        assert_eq!(key, "\u{0}idx\u{0}GLD\u{0}ALICE\u{0}");
        assert_eq!(key, composite_key("idx", &["GLD", "alice"]).unwrap());
    }

    #[test]
    fn keys_are_stable() {
        let a = ledger_key("gld", "alice").unwrap();
        let b = ledger_key("gld", "alice").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_tuples_give_distinct_keys() {
        // Naive concatenation would collide on these.
        let a = composite_key("idx", &["AB", "C"]).unwrap();
        let b = composite_key("idx", &["A", "BC"]).unwrap();
        assert_ne!(a, b);

        let ledger = ledger_key("gld", "alice").unwrap();
        let sign = sign_request_key("gld", "alice").unwrap();
        assert_ne!(ledger, sign);
    }

    #[test]
    fn partial_key_prefixes_full_key() {
        let full = ledger_key("gld", "alice").unwrap();
        assert!(full.starts_with(&ledger_prefix("gld").unwrap()));
        // A token whose name extends another must not fall under its prefix.
        let other = ledger_key("gldx", "alice").unwrap();
        assert!(!other.starts_with(&ledger_prefix("gld").unwrap()));
    }

    #[test]
    fn reserved_characters_rejected_with_parts() {
        let err = composite_key("idx", &["ok", "bad\u{0}part"]).unwrap_err();
        match err {
            KeyError::InvalidAttribute { parts, .. } => {
                assert_eq!(parts, vec!["OK".to_string(), "BAD\u{0}PART".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(composite_key("idx", &["\u{10FFFF}"]).is_err());
        assert!(composite_key("", &["a"]).is_err());
        assert!(composite_key("i\u{0}dx", &["a"]).is_err());
    }

    #[test]
    fn split_round_trip() {
        let key = ledger_key("gld", "bob").unwrap();
        let (object_type, parts) = split_composite_key(&key).unwrap();
        assert_eq!(object_type, LEDGER_INDEX);
        assert_eq!(parts, vec!["LEDGER", "GLD", "BOB"]);
        assert!(split_composite_key("plain").is_err());
    }
}
