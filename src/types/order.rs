//! Order-related types.
//!
//! This module contains the book sides, the opaque account identity and the
//! [`Entry`] record that rests in a node's entry set.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Amount, Timestamp};

/// Book side
///
/// Lenders supply liquidity at a rate and a maximum LTV they accept;
/// borrowers request liquidity at a rate they will pay and the LTV they need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Liquidity suppliers
    Lender,
    /// Liquidity takers
    Borrower,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(self) -> Self {
        match self {
            Side::Lender => Side::Borrower,
            Side::Borrower => Side::Lender,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Lender => f.write_str("lender"),
            Side::Borrower => f.write_str("borrower"),
        }
    }
}

/// Opaque account identity
///
/// The book only compares identities for equality; what the number refers
/// to (a pool, a vault, a user) is up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct:{}", self.0)
    }
}

impl From<u64> for AccountId {
    fn from(id: u64) -> Self {
        AccountId(id)
    }
}

/// One account's live quantity at a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Owner of the liquidity
    pub account: AccountId,
    /// Remaining quantity, always > 0 while resting
    pub amount: Amount,
    /// Insertion time supplied by the caller
    pub timestamp: Timestamp,
}

impl Entry {
    /// Create a new entry
    pub fn new(account: AccountId, amount: Amount, timestamp: Timestamp) -> Self {
        Self {
            account,
            amount,
            timestamp,
        }
    }

    /// Priority comparison: larger amount first, then earlier timestamp.
    ///
    /// `Ordering::Greater` means `self` is served before `other`.
    pub fn priority_cmp(&self, other: &Entry) -> Ordering {
        self.amount
            .cmp(&other.amount)
            .then_with(|| other.timestamp.cmp(&self.timestamp))
    }

    /// True if `self` must be served strictly before `other`
    #[inline]
    pub fn outranks(&self, other: &Entry) -> bool {
        self.priority_cmp(other) == Ordering::Greater
    }
}
