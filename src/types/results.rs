//! Records returned by matching, previews and snapshots.

use serde::Serialize;

use super::{AccountId, Amount, Entry, Ltv, OrderingKey, Rate, Side};

/// Outcome of a mutating match walk
///
/// `counterparties` and `amounts` are parallel and hold at most the
/// configured attribution cap. `total_matched` and `total_count` keep
/// counting fills past the cap, so `total_matched` can exceed the sum of
/// `amounts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// Attributed counterparties in fill order
    pub counterparties: Vec<AccountId>,
    /// Attributed fill amounts, parallel to `counterparties`
    pub amounts: Vec<Amount>,
    /// Sum of every fill, attributed or not
    pub total_matched: Amount,
    /// Number of fills, attributed or not
    pub total_count: usize,
}

impl MatchResult {
    pub(crate) fn record(&mut self, account: AccountId, fill: Amount, cap: usize) {
        if self.counterparties.len() < cap {
            self.counterparties.push(account);
            self.amounts.push(fill);
        }
        self.total_matched += fill;
        self.total_count += 1;
    }

    /// Sum of the attributed amounts
    pub fn attributed_total(&self) -> Amount {
        self.amounts.iter().sum()
    }

    /// Matched quantity not reflected in the attributed arrays
    pub fn unattributed(&self) -> Amount {
        self.total_matched - self.attributed_total()
    }

    /// Check if nothing was matched
    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }
}

/// Outcome of a side-effect-free match estimate
///
/// Same accounting as [`MatchResult`], with the rate and LTV of each
/// attributed fill. For collateral-denominated previews `collaterals` holds
/// the collateral consumed per attributed fill and `total_collateral` the
/// collateral consumed overall; both stay empty/zero for loan-denominated
/// previews.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreviewMatchResult {
    /// Attributed counterparties in fill order
    pub counterparties: Vec<AccountId>,
    /// Attributed fill amounts in loan-token terms
    pub amounts: Vec<Amount>,
    /// Rate of the node each attributed fill came from
    pub rates: Vec<Rate>,
    /// LTV of the node each attributed fill came from
    pub ltvs: Vec<Ltv>,
    /// Collateral consumed per attributed fill (collateral previews only)
    pub collaterals: Vec<Amount>,
    /// Sum of every fill, attributed or not
    pub total_matched: Amount,
    /// Number of fills, attributed or not
    pub total_count: usize,
    /// Collateral consumed by every fill (collateral previews only)
    pub total_collateral: Amount,
}

impl PreviewMatchResult {
    pub(crate) fn record(
        &mut self,
        account: AccountId,
        fill: Amount,
        rate: Rate,
        ltv: Ltv,
        cap: usize,
    ) {
        if self.counterparties.len() < cap {
            self.counterparties.push(account);
            self.amounts.push(fill);
            self.rates.push(rate);
            self.ltvs.push(ltv);
        }
        self.total_matched += fill;
        self.total_count += 1;
    }

    pub(crate) fn record_collateral(
        &mut self,
        account: AccountId,
        fill: Amount,
        collateral: Amount,
        rate: Rate,
        ltv: Ltv,
        cap: usize,
    ) {
        if self.counterparties.len() < cap {
            self.collaterals.push(collateral);
        }
        self.record(account, fill, rate, ltv, cap);
        self.total_collateral += collateral;
    }
}

/// One node of a paginated side snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    /// Composite key of the node
    pub key: OrderingKey,
    /// Decoded rate
    pub rate: Rate,
    /// Decoded LTV
    pub ltv: Ltv,
    /// Number of resting entries
    pub entry_count: usize,
    /// Entries in consumption order
    pub entries: Vec<Entry>,
    /// Sum of entry amounts
    pub total_amount: Amount,
}

/// Paginated view of one side's index in traversal order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeState {
    /// Side the snapshot was taken from
    pub side: Side,
    /// Node count of the whole side at snapshot time
    pub total_nodes: usize,
    /// Rank of the first returned node
    pub offset: usize,
    /// Up to `limit` nodes starting at `offset`
    pub nodes: Vec<NodeSnapshot>,
}
