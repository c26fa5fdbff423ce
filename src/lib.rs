//! # lending-orderbook
//!
//! A rate/LTV order book that aggregates independent lending pools into one
//! priced book and matches them against borrow requests.
//!
//! ## Features
//!
//! - **Composite Keys** - (rate, LTV) packed into one integer, best terms first per side
//! - **Red-Black Index** - Arena-backed, O(log n) insert/delete/successor, O(log n) pagination
//! - **Entry Priority** - Largest amount first, earliest timestamp among equals
//! - **Budgeted Matching** - Walks stop softly on an explicit work budget
//! - **Previews** - Side-effect-free estimates in loan or collateral terms
//!
//! ## Quick Start
//!
//! ```rust
//! use lending_orderbook::config::{BookConfig, WAD};
//! use lending_orderbook::orderbook::LendingBook;
//! use lending_orderbook::types::{AccountId, Side};
//!
//! # fn main() -> lending_orderbook::Result<()> {
//! let mut book = LendingBook::new("USDC/WETH", BookConfig::default())?;
//!
//! // A lender offers 1,000 at 1% up to 60% LTV
//! book.insert_order(Side::Lender, WAD / 100, WAD / 10 * 6, 1_000, AccountId(7), 1)?;
//!
//! // A borrower asks for 250 at up to 2% and needs 50% LTV
//! let result = book.match_order(Side::Borrower, WAD / 50, WAD / 2, 250, 100)?;
//! assert_eq!(result.total_matched, 250);
//! assert_eq!(result.counterparties, vec![AccountId(7)]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Units
//!
//! Rates and LTVs are WAD-scaled `u64` (1e18 = 100%):
//! - `WAD / 100` = 1%
//! - `WAD / 2` = 50%
//!
//! Amounts are raw token units (`u128`).
//!
//! ## Architecture
//!
//! This crate is organized into several modules:
//!
//! - [`orderbook`] - Key codec, entry sets, the red-black index, the book and its manager
//! - [`types`] - Sides, entries and result records
//! - [`counterparty`] - External pool queries and fill aggregation
//! - [`config`] - Book configuration
//! - [`error`] - Error types for the crate

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod counterparty;
pub mod error;
pub mod orderbook;
pub mod types;

// Re-export main types at crate root for convenience
pub use config::BookConfig;
pub use error::Error;
pub use orderbook::{BookManager, LendingBook};

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_book() {
        let book = LendingBook::default();
        assert!(book.is_empty());
        assert_eq!(book.config(), &BookConfig::default());
    }
}
