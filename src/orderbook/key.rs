//! Composite (rate, LTV) ordering keys.
//!
//! Both sides share one key layout: field 1 in the high half, field 2 in the
//! low half. What changes per side is which raw value is complemented before
//! packing, so that ascending key order is always "best terms first":
//!
//! | side     | field 1           | field 2          | ascending order            |
//! |----------|-------------------|------------------|----------------------------|
//! | lender   | `rate`            | `MAX - ltv`      | lowest rate, highest LTV   |
//! | borrower | `MAX - rate`      | `ltv`            | highest rate, lowest LTV   |

use crate::types::{Ltv, OrderingKey, Rate, Side};

/// Largest value of a single key field
pub const FIELD_MAX: u64 = u64::MAX;

const FIELD_BITS: u32 = u64::BITS;
const LOW_MASK: OrderingKey = FIELD_MAX as OrderingKey;

/// Pack two side-adjusted fields into one key
#[inline]
pub const fn pack(field1: u64, field2: u64) -> OrderingKey {
    ((field1 as OrderingKey) << FIELD_BITS) | field2 as OrderingKey
}

/// Split a key back into its two fields
#[inline]
pub const fn unpack(key: OrderingKey) -> (u64, u64) {
    ((key >> FIELD_BITS) as u64, (key & LOW_MASK) as u64)
}

/// Apply the side's transform to a raw (rate, LTV) pair
#[inline]
pub const fn to_ordering_fields(side: Side, rate: Rate, ltv: Ltv) -> (u64, u64) {
    match side {
        Side::Lender => (rate, FIELD_MAX - ltv),
        Side::Borrower => (FIELD_MAX - rate, ltv),
    }
}

/// Invert [`to_ordering_fields`]
#[inline]
pub const fn from_ordering_fields(side: Side, field1: u64, field2: u64) -> (Rate, Ltv) {
    match side {
        Side::Lender => (field1, FIELD_MAX - field2),
        Side::Borrower => (FIELD_MAX - field1, field2),
    }
}

/// Ordering key of a raw (rate, LTV) pair on `side`
#[inline]
pub const fn encode(side: Side, rate: Rate, ltv: Ltv) -> OrderingKey {
    let (f1, f2) = to_ordering_fields(side, rate, ltv);
    pack(f1, f2)
}

/// Raw (rate, LTV) pair of a key on `side`
#[inline]
pub const fn decode(side: Side, key: OrderingKey) -> (Rate, Ltv) {
    let (f1, f2) = unpack(key);
    from_ordering_fields(side, f1, f2)
}

/// Price predicate evaluated in field space.
///
/// A request at `(rate, ltv)` from `requester` is encoded with the
/// opposite (book) side's transform. A resting node with fields `(f1, f2)`
/// is acceptable iff both fields are no greater than the request's.
/// For a borrower request against lenders this reads
/// `node_rate <= rate && node_ltv >= ltv`; for a lender request against
/// borrowers `node_rate >= rate && node_ltv <= ltv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchBound {
    field1: u64,
    field2: u64,
}

impl MatchBound {
    /// Bound for a request from `requester`
    pub fn new(requester: Side, rate: Rate, ltv: Ltv) -> Self {
        let (field1, field2) = to_ordering_fields(requester.opposite(), rate, ltv);
        Self { field1, field2 }
    }

    /// True if the node at `key` satisfies the request
    #[inline]
    pub const fn accepts(&self, key: OrderingKey) -> bool {
        let (f1, f2) = unpack(key);
        f1 <= self.field1 && f2 <= self.field2
    }

    /// True if no node at or after `key` can satisfy the request
    ///
    /// Field 1 is the primary sort field, so once it exceeds the bound every
    /// later key does too.
    #[inline]
    pub const fn exhausted_at(&self, key: OrderingKey) -> bool {
        unpack(key).0 > self.field1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WAD;
    use proptest::prelude::*;

    #[test]
    fn test_pack_layout() {
        let key = pack(1, 2);
        assert_eq!(key, (1u128 << 64) | 2);
        assert_eq!(unpack(key), (1, 2));
        assert_eq!(unpack(pack(FIELD_MAX, 0)), (FIELD_MAX, 0));
    }

    #[test]
    fn test_lender_order_best_first() {
        // Lower rate first
        assert!(encode(Side::Lender, 1, WAD / 2) < encode(Side::Lender, 2, WAD / 2));
        // Same rate: higher LTV first
        assert!(encode(Side::Lender, 1, WAD / 2) < encode(Side::Lender, 1, WAD / 4));
    }

    #[test]
    fn test_borrower_order_best_first() {
        // Higher rate first
        assert!(encode(Side::Borrower, 2, WAD / 2) < encode(Side::Borrower, 1, WAD / 2));
        // Same rate: lower LTV first
        assert!(encode(Side::Borrower, 1, WAD / 4) < encode(Side::Borrower, 1, WAD / 2));
    }

    #[test]
    fn test_borrower_request_bound() {
        let rate = 2 * WAD / 100;
        let bound = MatchBound::new(Side::Borrower, rate, WAD / 2);

        assert!(bound.accepts(encode(Side::Lender, rate, WAD / 2)));
        assert!(bound.accepts(encode(Side::Lender, rate / 2, WAD / 10 * 6)));
        // Rate too high
        assert!(!bound.accepts(encode(Side::Lender, rate + 1, WAD / 2)));
        assert!(bound.exhausted_at(encode(Side::Lender, rate + 1, WAD)));
        // LTV too low
        assert!(!bound.accepts(encode(Side::Lender, rate, WAD / 4)));
        assert!(!bound.exhausted_at(encode(Side::Lender, rate, WAD / 4)));
    }

    #[test]
    fn test_lender_request_bound() {
        let rate = 3 * WAD / 100;
        let bound = MatchBound::new(Side::Lender, rate, WAD / 2);

        assert!(bound.accepts(encode(Side::Borrower, rate, WAD / 2)));
        assert!(bound.accepts(encode(Side::Borrower, rate * 2, WAD / 4)));
        // Borrower pays too little
        assert!(!bound.accepts(encode(Side::Borrower, rate - 1, WAD / 4)));
        assert!(bound.exhausted_at(encode(Side::Borrower, rate - 1, WAD / 4)));
        // Borrower needs too much LTV
        assert!(!bound.accepts(encode(Side::Borrower, rate, WAD / 10 * 6)));
    }

    proptest! {
        #[test]
        fn prop_fields_round_trip(rate in any::<u64>(), ltv in any::<u64>()) {
            for side in [Side::Lender, Side::Borrower] {
                let (f1, f2) = to_ordering_fields(side, rate, ltv);
                prop_assert_eq!(from_ordering_fields(side, f1, f2), (rate, ltv));
                prop_assert_eq!(decode(side, encode(side, rate, ltv)), (rate, ltv));
            }
        }

        #[test]
        fn prop_unpack_inverts_pack(f1 in any::<u64>(), f2 in any::<u64>()) {
            prop_assert_eq!(unpack(pack(f1, f2)), (f1, f2));
        }
    }
}
