//! Rate/LTV order book implementation.
//!
//! This module provides the lending order book, built bottom-up:
//!
//! - [`key`] - Composite (rate, LTV) ordering keys, best terms first per side
//! - [`entry_set`] - Per-key max-heap of competing entries
//! - [`tree`] - Red-black index of entry sets with subtree sizes
//! - [`book`] - Two-sided book with budgeted matching, previews and snapshots
//! - [`manager`] - Thread-safe registry of books by market
//!
//! # Example
//!
//! ```rust
//! use lending_orderbook::config::{BookConfig, WAD};
//! use lending_orderbook::orderbook::LendingBook;
//! use lending_orderbook::types::{AccountId, Side};
//!
//! let pct = WAD / 100;
//! let mut book = LendingBook::new("USDC/WETH", BookConfig::default()).unwrap();
//!
//! // Two lenders at different terms
//! book.insert_order(Side::Lender, pct, 60 * pct, 100, AccountId(1), 1).unwrap();
//! book.insert_order(Side::Lender, 2 * pct, 70 * pct, 50, AccountId(2), 2).unwrap();
//!
//! // Borrow 120 at up to 2% with at least 50% LTV
//! let result = book.match_order(Side::Borrower, 2 * pct, 50 * pct, 120, 1_000).unwrap();
//! assert_eq!(result.amounts, vec![100, 20]);
//! ```

pub mod book;
pub mod entry_set;
pub mod key;
pub mod manager;
pub mod tree;

pub use book::LendingBook;
pub use entry_set::EntrySet;
pub use manager::BookManager;
pub use tree::{NodeHandle, OrderIndex};
