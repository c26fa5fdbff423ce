//! External counterparty collaborator.
//!
//! The book never talks to lending pools directly. Collateral-denominated
//! previews and settlement-side aggregation go through
//! [`CounterpartyRegistry`], which the embedding application implements on
//! top of its pool adapters.

use rustc_hash::FxHashMap;

use crate::types::{AccountId, Amount, Ltv, MatchResult};
use crate::Result;

/// Per-counterparty queries the book needs from the outside world
pub trait CounterpartyRegistry {
    /// Collateral required to borrow `assets` from `account`'s pool
    fn preview_borrow(
        &self,
        account: AccountId,
        assets: Amount,
        ltv_buffer: Ltv,
    ) -> Result<Amount>;

    /// Loan obtainable from `account`'s pool against exactly `collateral`
    fn preview_borrow_with_exact_collateral(
        &self,
        account: AccountId,
        collateral: Amount,
        ltv_buffer: Ltv,
    ) -> Result<Amount>;

    /// Whether `account` is currently unavailable for settlement
    fn is_paused(&self, _account: AccountId) -> bool {
        false
    }
}

/// Group attributed fills by counterparty, dropping paused ones
///
/// Accounts keep the order of their first fill. Only the attributed arrays
/// of `result` are considered.
pub fn aggregate_fills<R>(result: &MatchResult, registry: &R) -> Vec<(AccountId, Amount)>
where
    R: CounterpartyRegistry + ?Sized,
{
    let mut slots: FxHashMap<AccountId, usize> = FxHashMap::default();
    let mut grouped: Vec<(AccountId, Amount)> = Vec::new();

    for (&account, &amount) in result.counterparties.iter().zip(&result.amounts) {
        if registry.is_paused(account) {
            continue;
        }
        match slots.get(&account) {
            Some(&slot) => grouped[slot].1 += amount,
            None => {
                slots.insert(account, grouped.len());
                grouped.push((account, amount));
            }
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Paused(AccountId);

    impl CounterpartyRegistry for Paused {
        fn preview_borrow(&self, _: AccountId, assets: Amount, _: Ltv) -> Result<Amount> {
            Ok(assets)
        }

        fn preview_borrow_with_exact_collateral(
            &self,
            _: AccountId,
            collateral: Amount,
            _: Ltv,
        ) -> Result<Amount> {
            Ok(collateral)
        }

        fn is_paused(&self, account: AccountId) -> bool {
            account == self.0
        }
    }

    #[test]
    fn test_aggregate_fills() {
        let result = MatchResult {
            counterparties: vec![AccountId(1), AccountId(2), AccountId(1), AccountId(3)],
            amounts: vec![10, 20, 5, 7],
            total_matched: 42,
            total_count: 4,
        };

        let grouped = aggregate_fills(&result, &Paused(AccountId(3)));
        assert_eq!(grouped, vec![(AccountId(1), 15), (AccountId(2), 20)]);
    }

    #[test]
    fn test_aggregate_empty() {
        let grouped = aggregate_fills(&MatchResult::default(), &Paused(AccountId(0)));
        assert!(grouped.is_empty());
    }
}
