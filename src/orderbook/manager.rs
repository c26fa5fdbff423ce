//! Book manager for handling multiple lending markets.
//!
//! This module provides [`BookManager`], a thread-safe container of
//! [`LendingBook`]s keyed by market ticker.
//!
//! # Design
//!
//! The manager uses `parking_lot::RwLock` for each book, so every mutating
//! operation on a market runs with exclusive access and readers never see a
//! half-rebalanced index. Different markets do not block each other.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::config::BookConfig;
use crate::counterparty::CounterpartyRegistry;
use crate::error::Error;
use crate::types::{
    AccountId, Amount, Ltv, MatchResult, OrderingKey, PreviewMatchResult, Rate, Side, Timestamp,
    TreeState,
};
use crate::Result;

use super::LendingBook;

/// Manager for multiple lending books.
///
/// # Thread Safety
///
/// The manager is safe to share across threads via `Arc<BookManager>`.
/// Individual books are protected by `RwLock`: one writer per market, any
/// number of concurrent readers.
///
/// # Example
///
/// ```rust
/// use lending_orderbook::config::{BookConfig, WAD};
/// use lending_orderbook::orderbook::BookManager;
/// use lending_orderbook::types::{AccountId, Side};
///
/// let manager = BookManager::new(BookConfig::default()).unwrap();
/// manager.add_market("USDC/WETH").unwrap();
///
/// manager
///     .insert_order("USDC/WETH", Side::Lender, WAD / 100, WAD / 2, 1_000, AccountId(1), 1)
///     .unwrap();
///
/// let fill = manager
///     .match_order("USDC/WETH", Side::Borrower, WAD / 50, WAD / 2, 400, 100)
///     .unwrap();
/// assert_eq!(fill.total_matched, 400);
/// ```
#[derive(Debug)]
pub struct BookManager {
    /// Configuration applied to newly added markets
    config: BookConfig,
    /// Books by market ticker
    books: RwLock<FxHashMap<String, RwLock<LendingBook>>>,
}

impl BookManager {
    /// Create a new manager
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` fails validation.
    pub fn new(config: BookConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            books: RwLock::new(FxHashMap::default()),
        })
    }

    /// Add a market to track
    ///
    /// Creates an empty book with the manager's configuration. Adding an
    /// existing market leaves its book untouched.
    pub fn add_market(&self, market_ticker: impl Into<String>) -> Result<()> {
        self.add_market_with_config(market_ticker, self.config.clone())
    }

    /// Add a market with its own configuration
    pub fn add_market_with_config(
        &self,
        market_ticker: impl Into<String>,
        config: BookConfig,
    ) -> Result<()> {
        let ticker = market_ticker.into();
        let mut books = self.books.write();
        if !books.contains_key(&ticker) {
            let book = LendingBook::new(ticker.clone(), config)?;
            books.insert(ticker, RwLock::new(book));
        }
        Ok(())
    }

    /// Remove a market, returning its book
    pub fn remove_market(&self, market_ticker: &str) -> Option<LendingBook> {
        let mut books = self.books.write();
        books.remove(market_ticker).map(|book| book.into_inner())
    }

    /// Check if a market is tracked
    pub fn contains(&self, market_ticker: &str) -> bool {
        self.books.read().contains_key(market_ticker)
    }

    /// Get number of tracked markets
    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    /// Check if manager has no markets
    pub fn is_empty(&self) -> bool {
        self.books.read().is_empty()
    }

    /// Get all tracked market tickers
    pub fn market_tickers(&self) -> Vec<String> {
        self.books.read().keys().cloned().collect()
    }

    /// Run `f` with shared access to a market's book
    pub fn with_book<T>(
        &self,
        market_ticker: &str,
        f: impl FnOnce(&LendingBook) -> T,
    ) -> Result<T> {
        let books = self.books.read();
        let entry = books
            .get(market_ticker)
            .ok_or_else(|| Error::UnknownMarket(market_ticker.to_string()))?;
        let book = entry.read();
        Ok(f(&*book))
    }

    /// Run `f` with exclusive access to a market's book
    pub fn with_book_mut<T>(
        &self,
        market_ticker: &str,
        f: impl FnOnce(&mut LendingBook) -> T,
    ) -> Result<T> {
        let books = self.books.read();
        let entry = books
            .get(market_ticker)
            .ok_or_else(|| Error::UnknownMarket(market_ticker.to_string()))?;
        let mut book = entry.write();
        Ok(f(&mut *book))
    }

    /// Get a cloned copy of a market's book
    pub fn get_book(&self, market_ticker: &str) -> Option<LendingBook> {
        self.with_book(market_ticker, LendingBook::clone).ok()
    }

    /// See [`LendingBook::insert_order`]
    #[allow(clippy::too_many_arguments)]
    pub fn insert_order(
        &self,
        market_ticker: &str,
        side: Side,
        rate: Rate,
        ltv: Ltv,
        amount: Amount,
        account: AccountId,
        timestamp: Timestamp,
    ) -> Result<OrderingKey> {
        self.with_book_mut(market_ticker, |book| {
            book.insert_order(side, rate, ltv, amount, account, timestamp)
        })?
    }

    /// See [`LendingBook::cancel_order`]
    pub fn cancel_order(
        &self,
        market_ticker: &str,
        side: Side,
        key: OrderingKey,
        entry_index: usize,
    ) -> Result<Amount> {
        self.with_book_mut(market_ticker, |book| {
            book.cancel_order(side, key, entry_index)
        })?
    }

    /// See [`LendingBook::cancel_account_order`]
    pub fn cancel_account_order(
        &self,
        market_ticker: &str,
        side: Side,
        rate: Rate,
        ltv: Ltv,
        account: AccountId,
    ) -> Result<Amount> {
        self.with_book_mut(market_ticker, |book| {
            book.cancel_account_order(side, rate, ltv, account)
        })?
    }

    /// See [`LendingBook::match_order`]
    pub fn match_order(
        &self,
        market_ticker: &str,
        side: Side,
        rate: Rate,
        ltv: Ltv,
        amount: Amount,
        budget: u64,
    ) -> Result<MatchResult> {
        self.with_book_mut(market_ticker, |book| {
            book.match_order(side, rate, ltv, amount, budget)
        })?
    }

    /// See [`LendingBook::preview_match`]
    pub fn preview_match(
        &self,
        market_ticker: &str,
        side: Side,
        rate: Rate,
        ltv: Ltv,
        amount: Amount,
        budget: u64,
    ) -> Result<PreviewMatchResult> {
        self.with_book(market_ticker, |book| {
            book.preview_match(side, rate, ltv, amount, budget)
        })?
    }

    /// See [`LendingBook::preview_match_by_collateral`]
    #[allow(clippy::too_many_arguments)]
    pub fn preview_match_by_collateral<R>(
        &self,
        market_ticker: &str,
        rate: Rate,
        ltv: Ltv,
        collateral: Amount,
        ltv_buffer: Ltv,
        budget: u64,
        registry: &R,
    ) -> Result<PreviewMatchResult>
    where
        R: CounterpartyRegistry + ?Sized,
    {
        self.with_book(market_ticker, |book| {
            book.preview_match_by_collateral(rate, ltv, collateral, ltv_buffer, budget, registry)
        })?
    }

    /// See [`LendingBook::best_rate`]
    pub fn best_rate(&self, market_ticker: &str, side: Side) -> Result<(Rate, Ltv)> {
        self.with_book(market_ticker, |book| book.best_rate(side))?
    }

    /// See [`LendingBook::tree_state`]
    pub fn tree_state(
        &self,
        market_ticker: &str,
        side: Side,
        offset: usize,
        limit: usize,
    ) -> Result<TreeState> {
        self.with_book(market_ticker, |book| book.tree_state(side, offset, limit))
    }

    /// Node count of one side of a market
    pub fn size(&self, market_ticker: &str, side: Side) -> Result<usize> {
        self.with_book(market_ticker, |book| book.len(side))
    }

    /// Clear all books
    pub fn clear(&self) {
        self.books.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WAD;

    const PCT: u64 = WAD / 100;

    #[test]
    fn test_add_market() {
        let manager = BookManager::new(BookConfig::default()).unwrap();
        manager.add_market("TEST").unwrap();
        manager.add_market("TEST").unwrap();

        assert_eq!(manager.len(), 1);
        assert!(manager.contains("TEST"));
        assert_eq!(manager.market_tickers(), vec!["TEST".to_string()]);
    }

    #[test]
    fn test_add_market_with_bad_config() {
        let manager = BookManager::new(BookConfig::default()).unwrap();
        let bad = BookConfig::default().with_max_entries_per_key(0);
        assert!(matches!(
            manager.add_market_with_config("BAD", bad),
            Err(Error::Config(_))
        ));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_unknown_market() {
        let manager = BookManager::new(BookConfig::default()).unwrap();
        let err = manager
            .insert_order("NOPE", Side::Lender, PCT, 50 * PCT, 1, AccountId(1), 1)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownMarket(ref t) if t == "NOPE"));
        assert!(manager.get_book("NOPE").is_none());
    }

    #[test]
    fn test_round_trip_through_manager() {
        let manager = BookManager::new(BookConfig::default()).unwrap();
        manager.add_market("M").unwrap();

        let key = manager
            .insert_order("M", Side::Lender, PCT, 50 * PCT, 100, AccountId(1), 1)
            .unwrap();
        assert_eq!(manager.size("M", Side::Lender).unwrap(), 1);
        assert_eq!(manager.best_rate("M", Side::Lender).unwrap(), (PCT, 50 * PCT));

        let preview = manager
            .preview_match("M", Side::Borrower, PCT, 50 * PCT, 60, 10)
            .unwrap();
        assert_eq!(preview.total_matched, 60);

        let result = manager
            .match_order("M", Side::Borrower, PCT, 50 * PCT, 60, 10)
            .unwrap();
        assert_eq!(result.total_matched, 60);

        assert_eq!(manager.cancel_order("M", Side::Lender, key, 0).unwrap(), 40);
        assert_eq!(manager.size("M", Side::Lender).unwrap(), 0);
        assert_eq!(manager.tree_state("M", Side::Lender, 0, 10).unwrap().total_nodes, 0);
    }

    #[test]
    fn test_remove_market() {
        let manager = BookManager::new(BookConfig::default()).unwrap();
        manager.add_market("M").unwrap();
        manager
            .insert_order("M", Side::Borrower, PCT, 50 * PCT, 5, AccountId(1), 1)
            .unwrap();

        let book = manager.remove_market("M").unwrap();
        assert_eq!(book.total_liquidity(Side::Borrower), 5);
        assert!(manager.is_empty());

        manager.add_market("N").unwrap();
        manager.clear();
        assert!(manager.is_empty());
    }
}
