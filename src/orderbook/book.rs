//! Two-sided lending book.
//!
//! [`LendingBook`] owns one [`OrderIndex`] per side and is the only way to
//! mutate them. A match walks the opposite side from its best end, consuming
//! entries that satisfy the request's rate/LTV bound until the request is
//! filled, the side is exhausted, or the work budget runs out.
//!
//! # Work budget
//!
//! Every walk takes a budget in abstract work units. Each visited node costs
//! [`CostModel::node_visit`] and each fill costs [`CostModel::fill`]. When
//! the next charge cannot be paid the walk stops and returns what it has
//! accumulated; fills made up to that point are committed. Running out of
//! budget is not reported separately.

use tracing::{debug, trace};

use crate::config::{BookConfig, CostModel};
use crate::counterparty::CounterpartyRegistry;
use crate::error::Error;
use crate::types::{
    AccountId, Amount, Entry, Ltv, MatchResult, NodeSnapshot, OrderingKey, PreviewMatchResult,
    Rate, Side, Timestamp, TreeState,
};
use crate::Result;

use super::key::{self, MatchBound};
use super::tree::{NodeHandle, OrderIndex};

/// Remaining work units for one walk
#[derive(Debug, Clone, Copy)]
struct WorkBudget {
    remaining: u64,
    cost: CostModel,
}

impl WorkBudget {
    fn new(remaining: u64, cost: CostModel) -> Self {
        Self { remaining, cost }
    }

    fn charge(&mut self, units: u64) -> bool {
        match self.remaining.checked_sub(units) {
            Some(left) => {
                self.remaining = left;
                true
            }
            None => false,
        }
    }

    fn visit_node(&mut self) -> bool {
        self.charge(self.cost.node_visit)
    }

    fn fill(&mut self) -> bool {
        self.charge(self.cost.fill)
    }
}

/// Rate/LTV order book for a single lending market.
///
/// # Design Decisions
///
/// 1. **Composite keys**: each side's index is keyed by one integer that
///    encodes (rate, LTV) so ascending order is best terms first. Matching
///    never needs a second comparator.
///
/// 2. **Entry sets**: competing entries at an identical (rate, LTV) share a
///    node and are served largest first, earliest first among equals.
///
/// 3. **Bounded walks**: matches take an explicit work budget and stop
///    softly, leaving the index consistent at every step.
///
/// # Thread Safety
///
/// This struct is `Send + Sync` but not internally synchronized. For
/// concurrent access use [`BookManager`](super::BookManager), which wraps
/// each book in a `parking_lot::RwLock`.
#[derive(Debug, Clone)]
pub struct LendingBook {
    /// Market ticker
    market_ticker: String,

    /// Bounds, caps and cost model
    config: BookConfig,

    /// Lender liquidity, lowest rate / highest LTV first
    lenders: OrderIndex,

    /// Borrower demand, highest rate / lowest LTV first
    borrowers: OrderIndex,
}

impl LendingBook {
    /// Create an empty book for the given market
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` fails validation.
    pub fn new(market_ticker: impl Into<String>, config: BookConfig) -> Result<Self> {
        config.validate()?;
        let capacity = config.max_entries_per_key();
        Ok(Self {
            market_ticker: market_ticker.into(),
            config,
            lenders: OrderIndex::new(capacity),
            borrowers: OrderIndex::new(capacity),
        })
    }

    /// Get the market ticker
    #[must_use]
    pub fn market_ticker(&self) -> &str {
        &self.market_ticker
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    /// Read-only view of one side's index
    #[must_use]
    pub fn index(&self, side: Side) -> &OrderIndex {
        match side {
            Side::Lender => &self.lenders,
            Side::Borrower => &self.borrowers,
        }
    }

    fn index_mut(&mut self, side: Side) -> &mut OrderIndex {
        match side {
            Side::Lender => &mut self.lenders,
            Side::Borrower => &mut self.borrowers,
        }
    }

    /// Number of distinct (rate, LTV) nodes on a side
    #[must_use]
    pub fn len(&self, side: Side) -> usize {
        self.index(side).len()
    }

    /// Check if both sides are empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lenders.is_empty() && self.borrowers.is_empty()
    }

    /// Sum of every resting amount on a side
    #[must_use]
    pub fn total_liquidity(&self, side: Side) -> Amount {
        self.index(side).total_amount()
    }

    /// Ordering key of (rate, LTV) on a side
    #[must_use]
    pub fn ordering_key(side: Side, rate: Rate, ltv: Ltv) -> OrderingKey {
        key::encode(side, rate, ltv)
    }

    /// Raw (rate, LTV) of a key on a side
    #[must_use]
    pub fn decode_key(side: Side, key: OrderingKey) -> (Rate, Ltv) {
        key::decode(side, key)
    }

    fn validate_order(&self, rate: Rate, ltv: Ltv, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(Error::invalid("amount must be non-zero"));
        }
        if rate == 0 {
            return Err(Error::invalid("rate must be non-zero"));
        }
        if ltv < self.config.min_ltv() || ltv > self.config.max_safe_ltv() {
            return Err(Error::invalid(format!(
                "ltv {} outside [{}, {}]",
                ltv,
                self.config.min_ltv(),
                self.config.max_safe_ltv()
            )));
        }
        Ok(())
    }

    /// Rest `amount` for `account` at (rate, LTV) on `side`
    ///
    /// Returns the ordering key the entry was stored under.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a zero amount, zero rate, out-of-range
    /// LTV or an amount that would overflow the side's resting total;
    /// [`Error::EntrySetFull`] if the key is at capacity.
    pub fn insert_order(
        &mut self,
        side: Side,
        rate: Rate,
        ltv: Ltv,
        amount: Amount,
        account: AccountId,
        timestamp: Timestamp,
    ) -> Result<OrderingKey> {
        self.validate_order(rate, ltv, amount)?;
        let key = key::encode(side, rate, ltv);
        self.index_mut(side)
            .insert(key, Entry::new(account, amount, timestamp))?;
        debug!(market = %self.market_ticker, %side, rate, ltv, %amount, %account, "order inserted");
        Ok(key)
    }

    /// Rest several orders for one account in a single all-or-nothing step
    ///
    /// `rates`, `ltvs` and `amounts` are parallel; rates must be strictly
    /// increasing. Nothing is inserted unless every element validates and
    /// every target key has room.
    pub fn insert_orders(
        &mut self,
        side: Side,
        rates: &[Rate],
        ltvs: &[Ltv],
        amounts: &[Amount],
        account: AccountId,
        timestamp: Timestamp,
    ) -> Result<Vec<OrderingKey>> {
        if rates.len() != ltvs.len() || rates.len() != amounts.len() {
            return Err(Error::invalid(format!(
                "batch length mismatch: {} rates, {} ltvs, {} amounts",
                rates.len(),
                ltvs.len(),
                amounts.len()
            )));
        }
        if rates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::invalid("batch rates must be strictly increasing"));
        }

        let index = self.index(side);
        let mut keys = Vec::with_capacity(rates.len());
        let mut total = index.total_amount();
        for ((&rate, &ltv), &amount) in rates.iter().zip(ltvs).zip(amounts) {
            self.validate_order(rate, ltv, amount)?;
            total = total
                .checked_add(amount)
                .ok_or_else(|| Error::invalid("batch overflows resting total"))?;
            let key = key::encode(side, rate, ltv);
            if index.entry_count(key) >= index.entry_capacity() {
                return Err(Error::EntrySetFull {
                    key,
                    capacity: index.entry_capacity(),
                });
            }
            keys.push(key);
        }

        let index = self.index_mut(side);
        for (&key, &amount) in keys.iter().zip(amounts) {
            index.insert(key, Entry::new(account, amount, timestamp))?;
        }
        debug!(market = %self.market_ticker, %side, count = keys.len(), %account, "batch inserted");
        Ok(keys)
    }

    /// Remove entry `entry_index` at `key` and return its amount for refund
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if the key holds fewer entries.
    pub fn cancel_order(
        &mut self,
        side: Side,
        key: OrderingKey,
        entry_index: usize,
    ) -> Result<Amount> {
        let removed = self.index_mut(side).remove_entry(key, entry_index)?;
        debug!(
            market = %self.market_ticker,
            %side,
            %key,
            amount = %removed.amount,
            account = %removed.account,
            "order cancelled"
        );
        Ok(removed.amount)
    }

    /// Remove `account`'s entry at (rate, LTV) and return its amount
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the account has no entry at that key.
    pub fn cancel_account_order(
        &mut self,
        side: Side,
        rate: Rate,
        ltv: Ltv,
        account: AccountId,
    ) -> Result<Amount> {
        let key = key::encode(side, rate, ltv);
        let position = self
            .index(side)
            .position_of(key, account)
            .ok_or(Error::NotFound { key, account })?;
        self.cancel_order(side, key, position)
    }

    /// Fill a request from `side` against the opposite side's liquidity
    ///
    /// Nodes are visited best-first; a node is consumed only if it satisfies
    /// the request's (rate, LTV) bound. Entries within a node are consumed
    /// largest-first, earliest-first among equal amounts. Consumed entries
    /// shrink or disappear; emptied nodes are deleted.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if `amount` is zero. Budget exhaustion is not
    /// an error.
    pub fn match_order(
        &mut self,
        side: Side,
        rate: Rate,
        ltv: Ltv,
        amount: Amount,
        budget: u64,
    ) -> Result<MatchResult> {
        if amount == 0 {
            return Err(Error::invalid("match amount must be non-zero"));
        }

        let book_side = side.opposite();
        let bound = MatchBound::new(side, rate, ltv);
        let cap = self.config.attribution_cap();
        let mut budget = WorkBudget::new(budget, self.config.cost_model());
        let index = self.index_mut(book_side);

        let mut result = MatchResult::default();
        let mut remaining = amount;
        let mut out_of_budget = false;
        let mut cursor = index.first();

        'walk: while remaining > 0 {
            let Some(node) = cursor else { break };
            if !budget.visit_node() {
                out_of_budget = true;
                break;
            }
            let node_key = index.key(node);
            if bound.exhausted_at(node_key) {
                break;
            }
            // Captured before any mutation; only valid while the node lives.
            let successor = index.successor(node);

            if bound.accepts(node_key) {
                let mut i = 0;
                while remaining > 0 && i < index.entry_count(node_key) {
                    if !budget.fill() {
                        out_of_budget = true;
                        break 'walk;
                    }
                    let entry = *index.entry_at(node_key, i)?;
                    let fill = entry.amount.min(remaining);
                    result.record(entry.account, fill, cap);
                    remaining -= fill;
                    trace!(account = %entry.account, %fill, %remaining, "fill");

                    if fill == entry.amount {
                        index.remove_entry(node_key, i)?;
                    } else {
                        index.decrease_entry(node_key, i, fill)?;
                        i += 1;
                    }
                }
                if index.entry_count(node_key) == 0 {
                    cursor = index.nearest_after(node_key);
                    continue;
                }
            }
            cursor = successor;
        }

        if out_of_budget {
            debug!(market = %self.market_ticker, %side, %remaining, "match stopped: budget exhausted");
        }
        debug!(
            market = %self.market_ticker,
            %side,
            requested = %amount,
            matched = %result.total_matched,
            fills = result.total_count,
            "match complete"
        );
        Ok(result)
    }

    /// Estimate [`match_order`](Self::match_order) without touching the book
    ///
    /// Walks and charges the budget exactly like the mutating match and
    /// additionally reports the rate and LTV of each attributed fill.
    pub fn preview_match(
        &self,
        side: Side,
        rate: Rate,
        ltv: Ltv,
        amount: Amount,
        budget: u64,
    ) -> Result<PreviewMatchResult> {
        if amount == 0 {
            return Err(Error::invalid("preview amount must be non-zero"));
        }

        let book_side = side.opposite();
        let index = self.index(book_side);
        let bound = MatchBound::new(side, rate, ltv);
        let cap = self.config.attribution_cap();
        let mut budget = WorkBudget::new(budget, self.config.cost_model());

        let mut result = PreviewMatchResult::default();
        let mut remaining = amount;

        'walk: for node in index.iter() {
            if remaining == 0 || !budget.visit_node() {
                break;
            }
            let node_key = index.key(node);
            if bound.exhausted_at(node_key) {
                break;
            }
            if !bound.accepts(node_key) {
                continue;
            }
            let (node_rate, node_ltv) = key::decode(book_side, node_key);
            for entry in index.entries(node).in_priority_order() {
                if remaining == 0 {
                    break;
                }
                if !budget.fill() {
                    break 'walk;
                }
                let fill = entry.amount.min(remaining);
                result.record(entry.account, fill, node_rate, node_ltv, cap);
                remaining -= fill;
            }
        }
        Ok(result)
    }

    /// Estimate how much a borrower posting `collateral` could draw
    ///
    /// Walks the lender side as a borrower request at (rate, LTV). For each
    /// eligible lender entry the registry converts between loan and
    /// collateral terms for that counterparty: if the collateral left covers
    /// the whole entry it is taken in full, otherwise the remaining
    /// collateral is converted into the loan it can secure. `ltv_buffer` is
    /// passed through to the registry unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if `collateral` is zero; registry failures
    /// propagate.
    pub fn preview_match_by_collateral<R>(
        &self,
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
        if collateral == 0 {
            return Err(Error::invalid("collateral must be non-zero"));
        }

        let index = &self.lenders;
        let bound = MatchBound::new(Side::Borrower, rate, ltv);
        let cap = self.config.attribution_cap();
        let mut budget = WorkBudget::new(budget, self.config.cost_model());

        let mut result = PreviewMatchResult::default();
        let mut remaining = collateral;

        'walk: for node in index.iter() {
            if remaining == 0 || !budget.visit_node() {
                break;
            }
            let node_key = index.key(node);
            if bound.exhausted_at(node_key) {
                break;
            }
            if !bound.accepts(node_key) {
                continue;
            }
            let (node_rate, node_ltv) = key::decode(Side::Lender, node_key);
            for entry in index.entries(node).in_priority_order() {
                if remaining == 0 {
                    break;
                }
                if !budget.fill() {
                    break 'walk;
                }
                let required = registry.preview_borrow(entry.account, entry.amount, ltv_buffer)?;
                let (loan, used) = if required <= remaining {
                    (entry.amount, required)
                } else {
                    let loan = registry.preview_borrow_with_exact_collateral(
                        entry.account,
                        remaining,
                        ltv_buffer,
                    )?;
                    (loan.min(entry.amount), remaining)
                };
                if loan == 0 {
                    continue;
                }
                result.record_collateral(entry.account, loan, used, node_rate, node_ltv, cap);
                remaining -= used;
            }
        }
        Ok(result)
    }

    /// Highest rate resting on a side, with its LTV
    ///
    /// Reads the lender side's last node and the borrower side's first node.
    ///
    /// # Errors
    ///
    /// [`Error::NoMatch`] if the side is empty.
    pub fn best_rate(&self, side: Side) -> Result<(Rate, Ltv)> {
        let index = self.index(side);
        let node = match side {
            Side::Lender => index.last(),
            Side::Borrower => index.first(),
        }
        .ok_or(Error::NoMatch(side))?;
        Ok(key::decode(side, index.key(node)))
    }

    /// Terms of the node a match against `side` would consume first
    ///
    /// # Errors
    ///
    /// [`Error::NoMatch`] if the side is empty.
    pub fn best_offer(&self, side: Side) -> Result<(Rate, Ltv)> {
        let index = self.index(side);
        let node = index.first().ok_or(Error::NoMatch(side))?;
        Ok(key::decode(side, index.key(node)))
    }

    /// Paginated snapshot of a side in traversal order
    ///
    /// Skips `offset` nodes (via subtree ranks, not a linear scan) and
    /// returns up to `limit` nodes.
    #[must_use]
    pub fn tree_state(&self, side: Side, offset: usize, limit: usize) -> TreeState {
        let index = self.index(side);
        let nodes = std::iter::successors(index.select(offset), |&node| index.successor(node))
            .take(limit)
            .map(|node| self.snapshot(side, node))
            .collect();
        TreeState {
            side,
            total_nodes: index.len(),
            offset,
            nodes,
        }
    }

    fn snapshot(&self, side: Side, node: NodeHandle) -> NodeSnapshot {
        let index = self.index(side);
        let node_key = index.key(node);
        let (rate, ltv) = key::decode(side, node_key);
        let entries = index.entries(node);
        NodeSnapshot {
            key: node_key,
            rate,
            ltv,
            entry_count: entries.len(),
            entries: entries.in_priority_order(),
            total_amount: entries.total_amount(),
        }
    }
}

impl Default for LendingBook {
    fn default() -> Self {
        let config = BookConfig::default();
        let capacity = config.max_entries_per_key();
        Self {
            market_ticker: String::new(),
            config,
            lenders: OrderIndex::new(capacity),
            borrowers: OrderIndex::new(capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WAD;

    const PCT: u64 = WAD / 100;

    fn book() -> LendingBook {
        LendingBook::new("USDC/WETH", BookConfig::default()).unwrap()
    }

    #[test]
    fn test_new_book() {
        let book = book();
        assert_eq!(book.market_ticker(), "USDC/WETH");
        assert!(book.is_empty());
        assert_eq!(book.len(Side::Lender), 0);
        assert!(LendingBook::new("X", BookConfig::default().with_attribution_cap(0)).is_err());
    }

    #[test]
    fn test_insert_validation() {
        let mut book = book();
        let a = AccountId(1);

        assert!(matches!(
            book.insert_order(Side::Lender, PCT, 50 * PCT, 0, a, 1),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            book.insert_order(Side::Lender, 0, 50 * PCT, 10, a, 1),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            book.insert_order(Side::Lender, PCT, 96 * PCT, 10, a, 1),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            book.insert_order(Side::Lender, PCT, PCT / 2, 10, a, 1),
            Err(Error::InvalidInput(_))
        ));
        assert!(book.is_empty());

        // Bounds are inclusive
        book.insert_order(Side::Lender, PCT, PCT, 10, a, 1).unwrap();
        book.insert_order(Side::Lender, PCT, 95 * PCT, 10, a, 1).unwrap();
        assert_eq!(book.len(Side::Lender), 2);
    }

    #[test]
    fn test_insert_returns_key() {
        let mut book = book();
        let key = book
            .insert_order(Side::Borrower, 3 * PCT, 40 * PCT, 7, AccountId(2), 5)
            .unwrap();
        assert_eq!(key, LendingBook::ordering_key(Side::Borrower, 3 * PCT, 40 * PCT));
        assert_eq!(LendingBook::decode_key(Side::Borrower, key), (3 * PCT, 40 * PCT));
        assert_eq!(book.index(Side::Borrower).entry_count(key), 1);
    }

    #[test]
    fn test_cancel_order() {
        let mut book = book();
        let key = book
            .insert_order(Side::Lender, PCT, 60 * PCT, 100, AccountId(1), 1)
            .unwrap();

        assert!(matches!(
            book.cancel_order(Side::Lender, key, 1),
            Err(Error::IndexOutOfRange { index: 1, len: 1, .. })
        ));
        assert_eq!(book.cancel_order(Side::Lender, key, 0).unwrap(), 100);
        assert_eq!(book.len(Side::Lender), 0);
        assert_eq!(book.index(Side::Lender).entry_count(key), 0);
    }

    #[test]
    fn test_cancel_account_order() {
        let mut book = book();
        book.insert_order(Side::Lender, PCT, 60 * PCT, 100, AccountId(1), 1)
            .unwrap();
        book.insert_order(Side::Lender, PCT, 60 * PCT, 300, AccountId(2), 2)
            .unwrap();

        assert_eq!(
            book.cancel_account_order(Side::Lender, PCT, 60 * PCT, AccountId(1))
                .unwrap(),
            100
        );
        assert!(matches!(
            book.cancel_account_order(Side::Lender, PCT, 60 * PCT, AccountId(1)),
            Err(Error::NotFound { .. })
        ));
        assert_eq!(book.total_liquidity(Side::Lender), 300);
    }

    #[test]
    fn test_batch_insert() {
        let mut book = book();
        let keys = book
            .insert_orders(
                Side::Lender,
                &[PCT, 2 * PCT, 3 * PCT],
                &[50 * PCT, 60 * PCT, 70 * PCT],
                &[10, 20, 30],
                AccountId(9),
                1,
            )
            .unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(book.total_liquidity(Side::Lender), 60);
    }

    #[test]
    fn test_batch_insert_rejected_atomically() {
        let mut book = book();
        let a = AccountId(9);

        assert!(matches!(
            book.insert_orders(Side::Lender, &[PCT, 2 * PCT], &[50 * PCT], &[1, 2], a, 1),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            book.insert_orders(
                Side::Lender,
                &[2 * PCT, 2 * PCT],
                &[50 * PCT, 60 * PCT],
                &[1, 2],
                a,
                1
            ),
            Err(Error::InvalidInput(_))
        ));
        // Last element invalid: nothing from the batch may land
        assert!(matches!(
            book.insert_orders(
                Side::Lender,
                &[PCT, 2 * PCT],
                &[50 * PCT, 60 * PCT],
                &[1, 0],
                a,
                1
            ),
            Err(Error::InvalidInput(_))
        ));
        assert!(book.is_empty());
    }

    #[test]
    fn test_batch_insert_respects_capacity() {
        let config = BookConfig::default().with_max_entries_per_key(1);
        let mut book = LendingBook::new("M", config).unwrap();
        book.insert_order(Side::Lender, 2 * PCT, 60 * PCT, 5, AccountId(1), 1)
            .unwrap();

        let err = book
            .insert_orders(
                Side::Lender,
                &[PCT, 2 * PCT],
                &[50 * PCT, 60 * PCT],
                &[1, 2],
                AccountId(2),
                2,
            )
            .unwrap_err();
        assert!(matches!(err, Error::EntrySetFull { capacity: 1, .. }));
        assert_eq!(book.len(Side::Lender), 1);
    }

    #[test]
    fn test_match_zero_amount() {
        let mut book = book();
        assert!(matches!(
            book.match_order(Side::Borrower, PCT, 50 * PCT, 0, 100),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_match_respects_bound() {
        let mut book = book();
        // Too expensive for the borrower
        book.insert_order(Side::Lender, 5 * PCT, 80 * PCT, 100, AccountId(1), 1)
            .unwrap();
        // LTV too low for the borrower
        book.insert_order(Side::Lender, PCT, 30 * PCT, 100, AccountId(2), 1)
            .unwrap();
        // Acceptable
        book.insert_order(Side::Lender, 2 * PCT, 60 * PCT, 100, AccountId(3), 1)
            .unwrap();

        let result = book
            .match_order(Side::Borrower, 3 * PCT, 50 * PCT, 500, 1_000)
            .unwrap();
        assert_eq!(result.counterparties, vec![AccountId(3)]);
        assert_eq!(result.total_matched, 100);
        assert_eq!(book.len(Side::Lender), 2);
    }

    #[test]
    fn test_lender_request_matches_borrowers() {
        let mut book = book();
        book.insert_order(Side::Borrower, 4 * PCT, 50 * PCT, 40, AccountId(1), 1)
            .unwrap();
        book.insert_order(Side::Borrower, 6 * PCT, 40 * PCT, 30, AccountId(2), 2)
            .unwrap();
        book.insert_order(Side::Borrower, 2 * PCT, 40 * PCT, 30, AccountId(3), 3)
            .unwrap();

        let result = book
            .match_order(Side::Lender, 3 * PCT, 60 * PCT, 100, 1_000)
            .unwrap();
        // Highest-paying borrower first; the 2% borrower pays too little
        assert_eq!(result.counterparties, vec![AccountId(2), AccountId(1)]);
        assert_eq!(result.amounts, vec![30, 40]);
        assert_eq!(result.total_matched, 70);
        assert_eq!(book.total_liquidity(Side::Borrower), 30);
    }

    #[test]
    fn test_partial_fill_keeps_node() {
        let mut book = book();
        let key = book
            .insert_order(Side::Lender, PCT, 60 * PCT, 100, AccountId(1), 1)
            .unwrap();

        let result = book
            .match_order(Side::Borrower, PCT, 60 * PCT, 30, 1_000)
            .unwrap();
        assert_eq!(result.total_matched, 30);
        assert_eq!(book.index(Side::Lender).entry_at(key, 0).unwrap().amount, 70);
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let mut book = book();
        book.insert_order(Side::Lender, PCT, 60 * PCT, 100, AccountId(1), 1)
            .unwrap();
        book.insert_order(Side::Lender, 2 * PCT, 70 * PCT, 50, AccountId(2), 2)
            .unwrap();
        let before = book.tree_state(Side::Lender, 0, 10);

        let preview = book
            .preview_match(Side::Borrower, 2 * PCT, 50 * PCT, 120, 1_000)
            .unwrap();
        assert_eq!(book.tree_state(Side::Lender, 0, 10), before);
        assert_eq!(preview.amounts, vec![100, 20]);
        assert_eq!(preview.rates, vec![PCT, 2 * PCT]);
        assert_eq!(preview.ltvs, vec![60 * PCT, 70 * PCT]);

        let actual = book
            .match_order(Side::Borrower, 2 * PCT, 50 * PCT, 120, 1_000)
            .unwrap();
        assert_eq!(actual.counterparties, preview.counterparties);
        assert_eq!(actual.amounts, preview.amounts);
        assert_eq!(actual.total_matched, preview.total_matched);
    }

    #[test]
    fn test_preview_matches_match_on_full_ties() {
        let mut book = book();
        for account in 1..=3 {
            book.insert_order(Side::Lender, PCT, 60 * PCT, 10, AccountId(account), 7)
                .unwrap();
        }
        let state = book.tree_state(Side::Lender, 0, 1);

        let preview = book
            .preview_match(Side::Borrower, PCT, 60 * PCT, 25, 1_000)
            .unwrap();
        let actual = book
            .match_order(Side::Borrower, PCT, 60 * PCT, 25, 1_000)
            .unwrap();

        assert_eq!(preview.counterparties, actual.counterparties);
        assert_eq!(preview.amounts, actual.amounts);
        assert_eq!(actual.amounts, vec![10, 10, 5]);
        let snapshot: Vec<_> = state.nodes[0].entries.iter().map(|e| e.account).collect();
        assert_eq!(snapshot, actual.counterparties);
    }

    #[test]
    fn test_insert_overflowing_total() {
        let mut book = book();
        book.insert_order(Side::Lender, PCT, 60 * PCT, Amount::MAX, AccountId(1), 1)
            .unwrap();

        assert!(matches!(
            book.insert_order(Side::Lender, PCT, 60 * PCT, Amount::MAX, AccountId(2), 2),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            book.insert_orders(Side::Lender, &[2 * PCT], &[60 * PCT], &[1], AccountId(3), 3),
            Err(Error::InvalidInput(_))
        ));
        // Sides are accounted separately
        book.insert_order(Side::Borrower, PCT, 60 * PCT, Amount::MAX, AccountId(4), 4)
            .unwrap();

        let state = book.tree_state(Side::Lender, 0, 1);
        assert_eq!(state.nodes[0].total_amount, Amount::MAX);
        assert_eq!(book.total_liquidity(Side::Lender), Amount::MAX);
        assert_eq!(book.index(Side::Lender).entry_count(state.nodes[0].key), 1);
    }

    #[test]
    fn test_best_rate() {
        let mut book = book();
        assert!(matches!(
            book.best_rate(Side::Lender),
            Err(Error::NoMatch(Side::Lender))
        ));

        book.insert_order(Side::Lender, PCT, 60 * PCT, 1, AccountId(1), 1)
            .unwrap();
        book.insert_order(Side::Lender, 4 * PCT, 30 * PCT, 1, AccountId(1), 1)
            .unwrap();
        book.insert_order(Side::Borrower, 2 * PCT, 40 * PCT, 1, AccountId(2), 1)
            .unwrap();
        book.insert_order(Side::Borrower, 5 * PCT, 20 * PCT, 1, AccountId(2), 1)
            .unwrap();

        assert_eq!(book.best_rate(Side::Lender).unwrap(), (4 * PCT, 30 * PCT));
        assert_eq!(book.best_rate(Side::Borrower).unwrap(), (5 * PCT, 20 * PCT));
        assert_eq!(book.best_offer(Side::Lender).unwrap(), (PCT, 60 * PCT));
        assert_eq!(book.best_offer(Side::Borrower).unwrap(), (5 * PCT, 20 * PCT));
    }

    #[test]
    fn test_tree_state() {
        let mut book = book();
        for i in 1..=5u64 {
            book.insert_order(Side::Lender, i * PCT, 50 * PCT, i as Amount, AccountId(i), i)
                .unwrap();
        }
        book.insert_order(Side::Lender, 2 * PCT, 50 * PCT, 7, AccountId(9), 9)
            .unwrap();

        let state = book.tree_state(Side::Lender, 1, 2);
        assert_eq!(state.total_nodes, 5);
        assert_eq!(state.nodes.len(), 2);
        assert_eq!(state.nodes[0].rate, 2 * PCT);
        assert_eq!(state.nodes[0].entry_count, 2);
        assert_eq!(state.nodes[0].total_amount, 9);
        assert_eq!(state.nodes[0].entries[0].account, AccountId(9));
        assert_eq!(state.nodes[1].rate, 3 * PCT);

        assert!(book.tree_state(Side::Lender, 5, 3).nodes.is_empty());
        assert_eq!(book.tree_state(Side::Lender, 3, 10).nodes.len(), 2);
    }
}
