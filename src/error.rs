//! Error types for the lending-orderbook crate.
//!
//! Every fallible operation in the book returns [`Error`]. Validation errors
//! are raised before any mutation happens, so an `Err` never leaves a side's
//! index half-updated. Running out of work budget during a match is not an
//! error: the walk simply stops and returns the partial result.

use thiserror::Error;

use crate::types::{AccountId, OrderingKey, Side};

/// The main error type for this crate
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected argument (zero amount or rate, LTV out of range, bad batch)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Entry index past the end of a node's entry set
    #[error("Entry index {index} out of range for key {key:#x} ({len} entries)")]
    IndexOutOfRange {
        /// Ordering key of the node
        key: OrderingKey,
        /// Requested entry index
        index: usize,
        /// Number of entries at the key (0 if the node does not exist)
        len: usize,
    },

    /// Best-rate query against an empty side
    #[error("No liquidity on the {0} side")]
    NoMatch(Side),

    /// Account holds no entry at the given key
    #[error("No entry for account {account} at key {key:#x}")]
    NotFound {
        /// Ordering key that was searched
        key: OrderingKey,
        /// Account that was searched for
        account: AccountId,
    },

    /// The node's entry set is at capacity
    #[error("Entry set at key {key:#x} is full ({capacity} entries)")]
    EntrySetFull {
        /// Ordering key of the full node
        key: OrderingKey,
        /// Configured per-key capacity
        capacity: usize,
    },

    /// Market ticker not registered with the manager
    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    /// External counterparty preview query failed
    #[error("Counterparty query failed: {0}")]
    Counterparty(String),

    /// Invalid configuration (bad bounds, zero caps)
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON deserialization error while loading configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Index structure failed an invariant check
    #[error("Index invariant violated: {0}")]
    Corrupted(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidInput`]
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Check if this error was raised by argument validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_) | Error::IndexOutOfRange { .. } | Error::EntrySetFull { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_out_of_range_display() {
        let err = Error::IndexOutOfRange {
            key: 0xff,
            index: 3,
            len: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("0xff"));
        assert!(msg.contains('3'));
        assert!(msg.contains("2 entries"));
    }

    #[test]
    fn test_no_match_names_side() {
        let err = Error::NoMatch(Side::Borrower);
        assert!(err.to_string().contains("borrower"));
    }

    #[test]
    fn test_json_conversion() {
        let parse: std::result::Result<u64, _> = serde_json::from_str("nope");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_is_validation() {
        assert!(Error::invalid("zero amount").is_validation());
        assert!(Error::EntrySetFull {
            key: 1,
            capacity: 4
        }
        .is_validation());
        assert!(!Error::UnknownMarket("X".into()).is_validation());
    }
}
