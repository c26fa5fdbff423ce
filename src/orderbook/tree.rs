//! Order-statistic red-black tree keyed by [`OrderingKey`].
//!
//! Nodes live in a `Vec` arena and link to each other by index. Slot 0 is a
//! permanent black sentinel standing in for every leaf, which keeps the
//! delete fixup free of special cases. Freed slots are recycled through a
//! free list, so a [`NodeHandle`] is only meaningful until the node it names
//! is removed; callers that mutate while walking re-derive their position
//! from keys (see [`OrderIndex::nearest_after`]).
//!
//! Every node carries its subtree size, which gives O(log n)
//! [`select`](OrderIndex::select) and [`rank`](OrderIndex::rank) for
//! pagination.

use crate::error::Error;
use crate::types::{AccountId, Amount, Entry, OrderingKey};
use crate::Result;

use super::entry_set::EntrySet;

const NIL: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug, Clone)]
struct Node {
    key: OrderingKey,
    parent: usize,
    left: usize,
    right: usize,
    color: Color,
    size: usize,
    entries: EntrySet,
}

impl Node {
    fn sentinel() -> Self {
        Self {
            key: 0,
            parent: NIL,
            left: NIL,
            right: NIL,
            color: Color::Black,
            size: 0,
            entries: EntrySet::new(),
        }
    }
}

/// Opaque reference to a live node
///
/// A handle names an arena slot, not a key. It stays valid across inserts
/// and rebalancing, but once its node is deleted the slot may be reused by
/// an unrelated key. Holders that delete while walking must re-derive their
/// position from a key instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(usize);

/// Balanced index of entry sets for one side of the book
///
/// # Thread Safety
///
/// This struct is `Send + Sync` but not internally synchronized. The book
/// that owns it is the only writer; see
/// [`BookManager`](crate::orderbook::BookManager) for shared access.
#[derive(Debug, Clone)]
pub struct OrderIndex {
    nodes: Vec<Node>,
    free: Vec<usize>,
    root: usize,
    len: usize,
    total: Amount,
    entry_capacity: usize,
}

impl OrderIndex {
    /// Create an empty index whose nodes hold at most `entry_capacity` entries
    pub fn new(entry_capacity: usize) -> Self {
        Self {
            nodes: vec![Node::sentinel()],
            free: Vec::new(),
            root: NIL,
            len: 0,
            total: 0,
            entry_capacity,
        }
    }

    /// Number of nodes (distinct keys)
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the index holds no nodes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum entries per node
    pub fn entry_capacity(&self) -> usize {
        self.entry_capacity
    }

    /// Sum of every resting amount, maintained on each mutation
    #[inline]
    pub fn total_amount(&self) -> Amount {
        self.total
    }

    // ---- navigation -----------------------------------------------------

    /// Node with the smallest key
    pub fn first(&self) -> Option<NodeHandle> {
        self.handle(self.minimum(self.root))
    }

    /// Node with the largest key
    pub fn last(&self) -> Option<NodeHandle> {
        self.handle(self.maximum(self.root))
    }

    /// In-order next node
    pub fn successor(&self, node: NodeHandle) -> Option<NodeHandle> {
        let mut x = node.0;
        if self.nodes[x].right != NIL {
            return self.handle(self.minimum(self.nodes[x].right));
        }
        let mut y = self.nodes[x].parent;
        while y != NIL && x == self.nodes[y].right {
            x = y;
            y = self.nodes[y].parent;
        }
        self.handle(y)
    }

    /// In-order previous node
    pub fn predecessor(&self, node: NodeHandle) -> Option<NodeHandle> {
        let mut x = node.0;
        if self.nodes[x].left != NIL {
            return self.handle(self.maximum(self.nodes[x].left));
        }
        let mut y = self.nodes[x].parent;
        while y != NIL && x == self.nodes[y].left {
            x = y;
            y = self.nodes[y].parent;
        }
        self.handle(y)
    }

    /// Node holding `key`
    pub fn find(&self, key: OrderingKey) -> Option<NodeHandle> {
        self.handle(self.locate(key))
    }

    /// Node with the smallest key strictly greater than `key`
    ///
    /// `key` itself need not be present, which makes this the safe way to
    /// resume a walk after the current node was deleted.
    pub fn nearest_after(&self, key: OrderingKey) -> Option<NodeHandle> {
        let mut candidate = NIL;
        let mut x = self.root;
        while x != NIL {
            if key < self.nodes[x].key {
                candidate = x;
                x = self.nodes[x].left;
            } else {
                x = self.nodes[x].right;
            }
        }
        self.handle(candidate)
    }

    /// Node at zero-based in-order position `rank`
    pub fn select(&self, mut rank: usize) -> Option<NodeHandle> {
        if rank >= self.len {
            return None;
        }
        let mut x = self.root;
        while x != NIL {
            let left_size = self.nodes[self.nodes[x].left].size;
            if rank < left_size {
                x = self.nodes[x].left;
            } else if rank == left_size {
                return self.handle(x);
            } else {
                rank -= left_size + 1;
                x = self.nodes[x].right;
            }
        }
        None
    }

    /// Zero-based in-order position of `key`, if present
    pub fn rank(&self, key: OrderingKey) -> Option<usize> {
        let mut rank = 0;
        let mut x = self.root;
        while x != NIL {
            let node = &self.nodes[x];
            if key < node.key {
                x = node.left;
            } else if key > node.key {
                rank += self.nodes[node.left].size + 1;
                x = node.right;
            } else {
                return Some(rank + self.nodes[node.left].size);
            }
        }
        None
    }

    /// Iterate nodes in ascending key order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            index: self,
            next: self.first(),
        }
    }

    // ---- node accessors -------------------------------------------------

    /// Key of a live node
    ///
    /// `node` must not have been deleted since it was obtained. A stale
    /// handle reads whatever node now occupies its slot.
    pub fn key(&self, node: NodeHandle) -> OrderingKey {
        self.live(node).key
    }

    /// Entry set of a live node
    ///
    /// Same liveness requirement as [`key`](Self::key).
    pub fn entries(&self, node: NodeHandle) -> &EntrySet {
        &self.live(node).entries
    }

    /// Number of entries at `key` (0 if the key is absent)
    pub fn entry_count(&self, key: OrderingKey) -> usize {
        match self.locate(key) {
            NIL => 0,
            x => self.nodes[x].entries.len(),
        }
    }

    /// Entry `i` (heap order) at `key`
    pub fn entry_at(&self, key: OrderingKey, i: usize) -> Result<&Entry> {
        let x = self.locate(key);
        if x == NIL {
            return Err(out_of_range(key, i, 0));
        }
        let entries = &self.nodes[x].entries;
        entries
            .get(i)
            .ok_or_else(|| out_of_range(key, i, entries.len()))
    }

    /// Heap index of `account`'s entry at `key`
    pub fn position_of(&self, key: OrderingKey, account: AccountId) -> Option<usize> {
        match self.locate(key) {
            NIL => None,
            x => self.nodes[x].entries.position(account),
        }
    }

    // ---- mutation -------------------------------------------------------

    /// Add `entry` at `key`, creating and balancing in a node if needed
    ///
    /// # Errors
    ///
    /// [`Error::EntrySetFull`] if the node already holds `entry_capacity`
    /// entries; [`Error::InvalidInput`] if the index total would exceed
    /// `Amount::MAX`. The index is unchanged in both cases.
    pub fn insert(&mut self, key: OrderingKey, entry: Entry) -> Result<()> {
        let total = self.total.checked_add(entry.amount).ok_or_else(|| {
            Error::invalid(format!(
                "amount {} overflows resting total {}",
                entry.amount, self.total
            ))
        })?;

        let mut parent = NIL;
        let mut x = self.root;
        while x != NIL {
            parent = x;
            let node_key = self.nodes[x].key;
            if key == node_key {
                let entries = &mut self.nodes[x].entries;
                if entries.len() >= self.entry_capacity {
                    return Err(Error::EntrySetFull {
                        key,
                        capacity: self.entry_capacity,
                    });
                }
                entries.push(entry);
                self.total = total;
                return Ok(());
            }
            x = if key < node_key {
                self.nodes[x].left
            } else {
                self.nodes[x].right
            };
        }

        if self.entry_capacity == 0 {
            return Err(Error::EntrySetFull { key, capacity: 0 });
        }

        let mut entries = EntrySet::new();
        entries.push(entry);
        let z = self.alloc(Node {
            key,
            parent,
            left: NIL,
            right: NIL,
            color: Color::Red,
            size: 1,
            entries,
        });

        if parent == NIL {
            self.root = z;
        } else if key < self.nodes[parent].key {
            self.nodes[parent].left = z;
        } else {
            self.nodes[parent].right = z;
        }

        let mut p = parent;
        while p != NIL {
            self.nodes[p].size += 1;
            p = self.nodes[p].parent;
        }

        self.len += 1;
        self.total = total;
        self.insert_fixup(z);
        Ok(())
    }

    /// Remove entry `i` at `key`, deleting the node if it empties
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if `i >= entry_count(key)`.
    pub fn remove_entry(&mut self, key: OrderingKey, i: usize) -> Result<Entry> {
        let x = self.locate(key);
        if x == NIL {
            return Err(out_of_range(key, i, 0));
        }
        let len = self.nodes[x].entries.len();
        let removed = self.nodes[x]
            .entries
            .remove_at(i)
            .ok_or_else(|| out_of_range(key, i, len))?;
        self.total -= removed.amount;
        if self.nodes[x].entries.is_empty() {
            self.delete(x);
        }
        Ok(removed)
    }

    /// Lower entry `i` at `key` by `by` in place and re-heapify
    ///
    /// Returns the entry's new amount. A decrease that reaches zero removes
    /// the entry (and the node, if it was the last one).
    pub fn decrease_entry(
        &mut self,
        key: OrderingKey,
        i: usize,
        by: Amount,
    ) -> Result<Amount> {
        let amount = self.entry_at(key, i)?.amount;
        if by >= amount {
            self.remove_entry(key, i)?;
            return Ok(0);
        }
        let x = self.locate(key);
        let len = self.nodes[x].entries.len();
        let left = self.nodes[x]
            .entries
            .decrease(i, by)
            .ok_or_else(|| out_of_range(key, i, len))?;
        self.total -= by;
        Ok(left)
    }

    /// Re-establish heap order below entry `i` at `key`
    pub fn heapify_down(&mut self, key: OrderingKey, i: usize) -> Result<()> {
        let x = self.locate(key);
        if x == NIL {
            return Err(out_of_range(key, i, 0));
        }
        let len = self.nodes[x].entries.len();
        if self.nodes[x].entries.heapify_down(i) {
            Ok(())
        } else {
            Err(out_of_range(key, i, len))
        }
    }

    // ---- invariants -----------------------------------------------------

    /// Verify red-black rules, key order, subtree sizes, the node count and
    /// every node's entry-set heap order
    pub fn check_invariants(&self) -> Result<()> {
        if self.nodes[NIL].color != Color::Black || self.nodes[NIL].size != 0 {
            return Err(Error::Corrupted("sentinel modified".into()));
        }
        if self.root != NIL {
            if self.nodes[self.root].color != Color::Black {
                return Err(Error::Corrupted("root is red".into()));
            }
            if self.nodes[self.root].parent != NIL {
                return Err(Error::Corrupted("root has a parent".into()));
            }
        }
        self.check_subtree(self.root, None, None)?;
        let size = self.nodes[self.root].size;
        if size != self.len {
            return Err(Error::Corrupted(format!(
                "root size {} but len {}",
                size, self.len
            )));
        }
        if self.nodes.len() - 1 - self.free.len() != self.len {
            return Err(Error::Corrupted("arena slot accounting drifted".into()));
        }
        let summed = self
            .iter()
            .flat_map(|node| self.entries(node).iter())
            .try_fold(0 as Amount, |acc, e| acc.checked_add(e.amount));
        if summed != Some(self.total) {
            return Err(Error::Corrupted(format!(
                "entry sum {:?} but total {}",
                summed, self.total
            )));
        }
        Ok(())
    }

    /// Returns the black height of the subtree at `x`
    fn check_subtree(
        &self,
        x: usize,
        lower: Option<OrderingKey>,
        upper: Option<OrderingKey>,
    ) -> Result<usize> {
        if x == NIL {
            return Ok(1);
        }
        let node = &self.nodes[x];
        if lower.is_some_and(|lo| node.key <= lo) || upper.is_some_and(|hi| node.key >= hi) {
            return Err(Error::Corrupted(format!("key {:#x} out of order", node.key)));
        }
        if node.entries.is_empty() {
            return Err(Error::Corrupted(format!("key {:#x} has no entries", node.key)));
        }
        if !node.entries.is_heap() {
            return Err(Error::Corrupted(format!("key {:#x} heap order broken", node.key)));
        }
        if node.color == Color::Red
            && (self.nodes[node.left].color == Color::Red
                || self.nodes[node.right].color == Color::Red)
        {
            return Err(Error::Corrupted(format!("red-red at key {:#x}", node.key)));
        }
        for child in [node.left, node.right] {
            if child != NIL && self.nodes[child].parent != x {
                return Err(Error::Corrupted(format!("broken parent link under {:#x}", node.key)));
            }
        }
        if node.size != self.nodes[node.left].size + self.nodes[node.right].size + 1 {
            return Err(Error::Corrupted(format!("size mismatch at key {:#x}", node.key)));
        }
        let left = self.check_subtree(node.left, lower, Some(node.key))?;
        let right = self.check_subtree(node.right, Some(node.key), upper)?;
        if left != right {
            return Err(Error::Corrupted(format!("black height differs at key {:#x}", node.key)));
        }
        Ok(left + usize::from(node.color == Color::Black))
    }

    // ---- internals ------------------------------------------------------

    fn live(&self, node: NodeHandle) -> &Node {
        let slot = &self.nodes[node.0];
        debug_assert!(slot.size > 0, "stale node handle {}", node.0);
        slot
    }

    fn handle(&self, x: usize) -> Option<NodeHandle> {
        (x != NIL).then_some(NodeHandle(x))
    }

    fn locate(&self, key: OrderingKey) -> usize {
        let mut x = self.root;
        while x != NIL {
            let node_key = self.nodes[x].key;
            if key == node_key {
                return x;
            }
            x = if key < node_key {
                self.nodes[x].left
            } else {
                self.nodes[x].right
            };
        }
        NIL
    }

    fn minimum(&self, mut x: usize) -> usize {
        if x == NIL {
            return NIL;
        }
        while self.nodes[x].left != NIL {
            x = self.nodes[x].left;
        }
        x
    }

    fn maximum(&self, mut x: usize) -> usize {
        if x == NIL {
            return NIL;
        }
        while self.nodes[x].right != NIL {
            x = self.nodes[x].right;
        }
        x
    }

    fn alloc(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn color(&self, x: usize) -> Color {
        self.nodes[x].color
    }

    fn set_color(&mut self, x: usize, color: Color) {
        self.nodes[x].color = color;
    }

    fn update_size(&mut self, x: usize) {
        let node = &self.nodes[x];
        let size = self.nodes[node.left].size + self.nodes[node.right].size + 1;
        self.nodes[x].size = size;
    }

    fn rotate_left(&mut self, x: usize) {
        let y = self.nodes[x].right;
        let y_left = self.nodes[y].left;
        self.nodes[x].right = y_left;
        if y_left != NIL {
            self.nodes[y_left].parent = x;
        }
        let x_parent = self.nodes[x].parent;
        self.nodes[y].parent = x_parent;
        if x_parent == NIL {
            self.root = y;
        } else if x == self.nodes[x_parent].left {
            self.nodes[x_parent].left = y;
        } else {
            self.nodes[x_parent].right = y;
        }
        self.nodes[y].left = x;
        self.nodes[x].parent = y;
        self.nodes[y].size = self.nodes[x].size;
        self.update_size(x);
    }

    fn rotate_right(&mut self, x: usize) {
        let y = self.nodes[x].left;
        let y_right = self.nodes[y].right;
        self.nodes[x].left = y_right;
        if y_right != NIL {
            self.nodes[y_right].parent = x;
        }
        let x_parent = self.nodes[x].parent;
        self.nodes[y].parent = x_parent;
        if x_parent == NIL {
            self.root = y;
        } else if x == self.nodes[x_parent].right {
            self.nodes[x_parent].right = y;
        } else {
            self.nodes[x_parent].left = y;
        }
        self.nodes[y].right = x;
        self.nodes[x].parent = y;
        self.nodes[y].size = self.nodes[x].size;
        self.update_size(x);
    }

    fn insert_fixup(&mut self, mut z: usize) {
        while self.color(self.nodes[z].parent) == Color::Red {
            let parent = self.nodes[z].parent;
            let grandparent = self.nodes[parent].parent;
            if parent == self.nodes[grandparent].left {
                let uncle = self.nodes[grandparent].right;
                if self.color(uncle) == Color::Red {
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    z = grandparent;
                } else {
                    if z == self.nodes[parent].right {
                        z = parent;
                        self.rotate_left(z);
                    }
                    let parent = self.nodes[z].parent;
                    let grandparent = self.nodes[parent].parent;
                    self.set_color(parent, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    self.rotate_right(grandparent);
                }
            } else {
                let uncle = self.nodes[grandparent].left;
                if self.color(uncle) == Color::Red {
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    z = grandparent;
                } else {
                    if z == self.nodes[parent].left {
                        z = parent;
                        self.rotate_right(z);
                    }
                    let parent = self.nodes[z].parent;
                    let grandparent = self.nodes[parent].parent;
                    self.set_color(parent, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    self.rotate_left(grandparent);
                }
            }
        }
        let root = self.root;
        self.set_color(root, Color::Black);
    }

    /// Replace the subtree at `u` with the one at `v`. `v` may be the
    /// sentinel, whose parent is then set for the delete fixup.
    fn transplant(&mut self, u: usize, v: usize) {
        let u_parent = self.nodes[u].parent;
        if u_parent == NIL {
            self.root = v;
        } else if u == self.nodes[u_parent].left {
            self.nodes[u_parent].left = v;
        } else {
            self.nodes[u_parent].right = v;
        }
        self.nodes[v].parent = u_parent;
    }

    fn delete(&mut self, z: usize) {
        let z_left = self.nodes[z].left;
        let z_right = self.nodes[z].right;

        // The physically removed position is z itself, or its in-order
        // successor when z has two children. Every ancestor of that position
        // loses one node.
        let spliced = if z_left == NIL || z_right == NIL {
            z
        } else {
            self.minimum(z_right)
        };
        let mut p = self.nodes[spliced].parent;
        while p != NIL {
            self.nodes[p].size -= 1;
            p = self.nodes[p].parent;
        }

        let mut removed_color = self.color(z);
        let x;
        if z_left == NIL {
            x = z_right;
            self.transplant(z, z_right);
        } else if z_right == NIL {
            x = z_left;
            self.transplant(z, z_left);
        } else {
            let y = spliced;
            removed_color = self.color(y);
            x = self.nodes[y].right;
            if self.nodes[y].parent == z {
                self.nodes[x].parent = y;
            } else {
                self.transplant(y, x);
                let z_right = self.nodes[z].right;
                self.nodes[y].right = z_right;
                self.nodes[z_right].parent = y;
            }
            self.transplant(z, y);
            let z_left = self.nodes[z].left;
            self.nodes[y].left = z_left;
            self.nodes[z_left].parent = y;
            self.nodes[y].color = self.nodes[z].color;
            self.nodes[y].size = self.nodes[z].size;
        }

        if removed_color == Color::Black {
            self.delete_fixup(x);
        }

        // Sentinel links may have been borrowed during the fixup.
        self.nodes[NIL].parent = NIL;
        self.nodes[z] = Node::sentinel();
        self.free.push(z);
        self.len -= 1;
    }

    fn delete_fixup(&mut self, mut x: usize) {
        while x != self.root && self.color(x) == Color::Black {
            let parent = self.nodes[x].parent;
            if x == self.nodes[parent].left {
                let mut w = self.nodes[parent].right;
                if self.color(w) == Color::Red {
                    self.set_color(w, Color::Black);
                    self.set_color(parent, Color::Red);
                    self.rotate_left(parent);
                    w = self.nodes[self.nodes[x].parent].right;
                }
                if self.color(self.nodes[w].left) == Color::Black
                    && self.color(self.nodes[w].right) == Color::Black
                {
                    self.set_color(w, Color::Red);
                    x = self.nodes[x].parent;
                } else {
                    if self.color(self.nodes[w].right) == Color::Black {
                        let w_left = self.nodes[w].left;
                        self.set_color(w_left, Color::Black);
                        self.set_color(w, Color::Red);
                        self.rotate_right(w);
                        w = self.nodes[self.nodes[x].parent].right;
                    }
                    let parent = self.nodes[x].parent;
                    self.set_color(w, self.color(parent));
                    self.set_color(parent, Color::Black);
                    let w_right = self.nodes[w].right;
                    self.set_color(w_right, Color::Black);
                    self.rotate_left(parent);
                    x = self.root;
                }
            } else {
                let mut w = self.nodes[parent].left;
                if self.color(w) == Color::Red {
                    self.set_color(w, Color::Black);
                    self.set_color(parent, Color::Red);
                    self.rotate_right(parent);
                    w = self.nodes[self.nodes[x].parent].left;
                }
                if self.color(self.nodes[w].right) == Color::Black
                    && self.color(self.nodes[w].left) == Color::Black
                {
                    self.set_color(w, Color::Red);
                    x = self.nodes[x].parent;
                } else {
                    if self.color(self.nodes[w].left) == Color::Black {
                        let w_right = self.nodes[w].right;
                        self.set_color(w_right, Color::Black);
                        self.set_color(w, Color::Red);
                        self.rotate_left(w);
                        w = self.nodes[self.nodes[x].parent].left;
                    }
                    let parent = self.nodes[x].parent;
                    self.set_color(w, self.color(parent));
                    self.set_color(parent, Color::Black);
                    let w_left = self.nodes[w].left;
                    self.set_color(w_left, Color::Black);
                    self.rotate_right(parent);
                    x = self.root;
                }
            }
        }
        self.set_color(x, Color::Black);
    }
}

impl Default for OrderIndex {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_ENTRIES_PER_KEY)
    }
}

fn out_of_range(key: OrderingKey, index: usize, len: usize) -> Error {
    Error::IndexOutOfRange { key, index, len }
}

/// In-order iterator over node handles
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    index: &'a OrderIndex,
    next: Option<NodeHandle>,
}

impl Iterator for Iter<'_> {
    type Item = NodeHandle;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.index.successor(current);
        Some(current)
    }
}
