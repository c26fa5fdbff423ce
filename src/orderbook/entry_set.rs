//! Per-key priority structure.
//!
//! An [`EntrySet`] is a binary max-heap over [`Entry`] stored in a plain
//! `Vec`. The root (index 0) is always the next entry to be served: the
//! largest amount, ties broken by the earliest timestamp.
//!
//! Index arithmetic is the usual one: children of `i` are `2i + 1` and
//! `2i + 2`, the parent of `i` is `(i - 1) / 2`.

use serde::Serialize;

use crate::types::{AccountId, Amount, Entry};

/// Heap of competing entries resting at one ordering key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EntrySet {
    heap: Vec<Entry>,
}

impl EntrySet {
    /// Create an empty set
    pub fn new() -> Self {
        Self { heap: Vec::new() }
    }

    /// Number of entries
    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Check if the set holds no entries
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Entry at heap index `i`
    pub fn get(&self, i: usize) -> Option<&Entry> {
        self.heap.get(i)
    }

    /// Next entry to be served
    pub fn peek(&self) -> Option<&Entry> {
        self.heap.first()
    }

    /// Entries in heap (storage) order
    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.heap.iter()
    }

    /// Entries in the order a match would consume them
    ///
    /// Drains a copy of the heap from the root, so entries tied on both
    /// amount and timestamp come out exactly as repeated root removal
    /// would serve them.
    pub fn in_priority_order(&self) -> Vec<Entry> {
        let mut scratch = self.clone();
        let mut ordered = Vec::with_capacity(self.len());
        while let Some(entry) = scratch.remove_at(0) {
            ordered.push(entry);
        }
        ordered
    }

    /// Sum of all entry amounts, saturating at `Amount::MAX`
    pub fn total_amount(&self) -> Amount {
        self.heap
            .iter()
            .fold(0, |acc: Amount, e| acc.saturating_add(e.amount))
    }

    /// Heap index of the first entry owned by `account`
    pub fn position(&self, account: AccountId) -> Option<usize> {
        self.heap.iter().position(|e| e.account == account)
    }

    /// Insert an entry and restore heap order
    pub(crate) fn push(&mut self, entry: Entry) {
        self.heap.push(entry);
        self.sift_up(self.heap.len() - 1);
    }

    /// Remove the entry at `i`
    ///
    /// The last entry takes its slot and is sifted whichever way the heap
    /// order requires. Returns `None` if `i` is out of range.
    pub(crate) fn remove_at(&mut self, i: usize) -> Option<Entry> {
        if i >= self.heap.len() {
            return None;
        }
        let removed = self.heap.swap_remove(i);
        if i < self.heap.len() {
            if i > 0 && self.heap[i].outranks(&self.heap[(i - 1) / 2]) {
                self.sift_up(i);
            } else {
                self.sift_down(i);
            }
        }
        Some(removed)
    }

    /// Lower the amount at `i` by `by` and restore heap order
    ///
    /// Returns the new amount, or `None` if `i` is out of range. Callers
    /// remove the entry instead when the decrease would reach zero.
    pub(crate) fn decrease(&mut self, i: usize, by: Amount) -> Option<Amount> {
        let entry = self.heap.get_mut(i)?;
        entry.amount = entry.amount.saturating_sub(by);
        let left = entry.amount;
        self.sift_down(i);
        Some(left)
    }

    /// Restore heap order below `i` after its amount shrank in place
    pub(crate) fn heapify_down(&mut self, i: usize) -> bool {
        if i >= self.heap.len() {
            return false;
        }
        self.sift_down(i);
        true
    }

    /// Check the max-heap property over the whole set
    pub fn is_heap(&self) -> bool {
        (1..self.heap.len()).all(|i| !self.heap[i].outranks(&self.heap[(i - 1) / 2]))
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !self.heap[i].outranks(&self.heap[parent]) {
                break;
            }
            self.heap.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * i + 1;
            let right = left + 1;
            let mut best = i;
            if left < len && self.heap[left].outranks(&self.heap[best]) {
                best = left;
            }
            if right < len && self.heap[right].outranks(&self.heap[best]) {
                best = right;
            }
            if best == i {
                break;
            }
            self.heap.swap(i, best);
            i = best;
        }
    }
}
