//! Core value types for the lending order book.
//!
//! - [`order`] - Sides, account identities and resting entries
//! - [`results`] - Match, preview and snapshot records returned by the book

pub mod order;
pub mod results;

pub use order::{AccountId, Entry, Side};
pub use results::{MatchResult, NodeSnapshot, PreviewMatchResult, TreeState};

/// Interest rate per unit time, WAD-scaled (1e18 = 100%)
///
/// Must be non-zero for a resting order.
pub type Rate = u64;

/// Loan-to-value ratio, WAD-scaled (1e18 = 100%)
pub type Ltv = u64;

/// Token quantity
///
/// `u128` so raw token units with 18 decimals never overflow in sums.
pub type Amount = u128;

/// Caller-supplied insertion time used to break ties between equal amounts
pub type Timestamp = u64;

/// Composite (rate, LTV) key
///
/// Field 1 lives in the high 64 bits and field 2 in the low 64 bits, so
/// numeric order is lexicographic order over the two side-adjusted fields.
pub type OrderingKey = u128;
