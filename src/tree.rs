//! Filepath: src/tree.rs
//!
//! `BTree` - a concurrent B+tree using optimistic lock coupling.
//!
//! This module provides the main `BTree<K, V, C>` type: lookup, insert, and
//! range scan implemented as restart-on-conflict traversals over
//! [`LeafNode`]/[`InnerNode`] graphs protected by per-node
//! [`VersionLock`](crate::version::VersionLock)s.
//!
//! # Concurrency Protocol
//!
//! - **Lookups** hold no locks at all: each node on the root-to-leaf path is
//!   read under a captured version that is validated after the child has
//!   been version-captured in turn (lock coupling, optimistic flavor). Any
//!   validation failure restarts the traversal from the root.
//! - **Inserts** descend the same way while recording the ancestors a leaf
//!   split could touch: the deepest node with room for one more separator
//!   plus every at-capacity node below it. If the leaf has room the
//!   ancestors are merely re-validated; if the leaf must split, the whole
//!   recorded chain is upgraded to write locks top-down and the split is
//!   propagated bottom-up along it, growing a new root if the chain is
//!   exhausted.
//! - Locks are only ever taken parent before child along one root-to-leaf
//!   path, so the protocol cannot deadlock; contention degrades to
//!   spin-and-restart.
//!
//! Splits only ever allocate: the split node keeps its lower half and stays
//! linked, so no node is freed before the tree itself is dropped and stale
//! optimistic readers can never touch freed memory.

use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize};

use crate::inner::InnerNode;
use crate::leaf::LeafNode;
use crate::node::{NodeHeader, Pod};
use crate::ordering::{READ_ORD, RELAXED, WRITE_ORD};
use crate::tracing_helpers::{debug_log, trace_log};
use crate::version::Restart;

// ============================================================================
//  LockChain
// ============================================================================

/// Ancestors retained during an insert descent, top-down: the deepest node
/// that can absorb one more separator, then every at-capacity node below it.
///
/// Entries are `(node, captured version)` pairs. They stay optimistic until
/// a leaf split actually needs them, at which point each is upgraded to a
/// write lock via its captured version. One chain is reused across all
/// restarts of a single insert, so its backing storage is allocated at most
/// once per call and grows with the retained run, not the tree height.
struct LockChain {
    entries: Vec<(*mut NodeHeader, u64)>,
}

impl LockChain {
    const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[inline]
    fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    fn push(&mut self, node: *mut NodeHeader, version: u64) {
        self.entries.push((node, version));
    }

    #[inline]
    fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    fn get(&self, i: usize) -> (*mut NodeHeader, u64) {
        self.entries[i]
    }
}

// ============================================================================
//  BTree
// ============================================================================

/// A concurrent ordered map over fixed-capacity B+tree nodes.
///
/// `C` is the leaf capacity in entries (inner nodes route through `C` child
/// slots); it defaults to 64 and must be at least 2, which is enforced at
/// compile time when the tree is instantiated.
///
/// All operations take `&self` and may be called from any number of threads
/// simultaneously. Version-lock conflicts are resolved internally by
/// restarting the affected operation; callers never observe them.
///
/// Duplicate-key policy: inserting a key that is already present
/// overwrites its value.
///
/// # Example
///
/// ```rust
/// use btree_olc::BTree;
///
/// let tree: BTree<u64, u64> = BTree::new();
/// tree.insert(7, 70);
/// tree.insert(7, 71);
///
/// assert_eq!(tree.lookup(&7), Some(71));
/// assert_eq!(tree.len(), 1);
/// ```
pub struct BTree<K: Ord + Pod, V: Pod, const C: usize = 64> {
    root: AtomicPtr<NodeHeader>,
    len: AtomicUsize,
    _marker: PhantomData<(K, V)>,
}

// SAFETY: the node graph is shared through atomics and every access follows
// the version-lock protocol; `Pod` already requires `Send + Sync` contents.
unsafe impl<K: Ord + Pod, V: Pod, const C: usize> Send for BTree<K, V, C> {}
unsafe impl<K: Ord + Pod, V: Pod, const C: usize> Sync for BTree<K, V, C> {}

impl<K, V, const C: usize> BTree<K, V, C>
where
    K: Ord + Pod,
    V: Pod,
{
    /// Create an empty tree whose root is a single empty leaf.
    #[must_use]
    pub fn new() -> Self {
        const { assert!(C >= 2, "BTree node capacity must be at least 2") };
        let root = Box::into_raw(LeafNode::<K, V, C>::new()).cast::<NodeHeader>();
        Self {
            root: AtomicPtr::new(root),
            len: AtomicUsize::new(0),
            _marker: PhantomData,
        }
    }

    /// Number of distinct keys in the tree.
    ///
    /// Exact once all concurrent writers have returned; a racing reader may
    /// see any value between the counts before and after in-flight inserts.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(RELAXED)
    }

    /// Whether the tree holds no keys.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    //  Pointer plumbing
    // ========================================================================

    /// Borrow the header behind a node pointer.
    #[inline]
    fn header<'a>(node: *mut NodeHeader) -> &'a NodeHeader {
        // SAFETY: node pointers come from the tree's own graph and nothing
        // is freed before the tree drops.
        unsafe { &*node }
    }

    /// Borrow a node known to be a leaf.
    #[inline]
    fn as_leaf<'a>(node: *mut NodeHeader) -> &'a LeafNode<K, V, C> {
        debug_assert!(Self::header(node).is_leaf());
        // SAFETY: layouts are #[repr(C)] with the header first; the kind
        // discriminant was checked.
        unsafe { &*node.cast::<LeafNode<K, V, C>>() }
    }

    /// Borrow a node known to be inner.
    #[inline]
    fn as_inner<'a>(node: *mut NodeHeader) -> &'a InnerNode<K, C> {
        debug_assert!(!Self::header(node).is_leaf());
        // SAFETY: as `as_leaf`.
        unsafe { &*node.cast::<InnerNode<K, C>>() }
    }

    /// Load the root and capture its version, restarting if the root was
    /// replaced between the load and the capture.
    #[inline]
    fn read_root(&self) -> Result<(*mut NodeHeader, u64), Restart> {
        let node = self.root.load(READ_ORD);
        let version = Self::header(node).lock.read_lock()?;
        if ptr::eq(node, self.root.load(READ_ORD)) {
            Ok((node, version))
        } else {
            Err(Restart)
        }
    }

    // ========================================================================
    //  Lookup
    // ========================================================================

    /// Look up the value stored under `key`.
    ///
    /// Purely optimistic: no lock is ever held, concurrent writers only
    /// cost the occasional internal restart.
    #[must_use]
    pub fn lookup(&self, key: &K) -> Option<V> {
        loop {
            match self.try_lookup(key) {
                Ok(found) => return found,
                Err(Restart) => {
                    trace_log!("lookup restart");
                }
            }
        }
    }

    fn try_lookup(&self, key: &K) -> Result<Option<V>, Restart> {
        let (mut node, mut version) = self.read_root()?;

        while !Self::header(node).is_leaf() {
            let inner = Self::as_inner(node);
            let idx = inner.find_child_index(key);
            let child = inner.child(idx);

            // Capture the child before validating the node we are leaving;
            // a stale route is caught here, before it can be acted on.
            let child_version = Self::header(child).lock.read_lock()?;
            inner.header().lock.check(version)?;

            node = child;
            version = child_version;
        }

        let leaf = Self::as_leaf(node);
        let result = leaf.lookup(key);
        leaf.header().lock.read_unlock(version)?;
        Ok(result)
    }

    // ========================================================================
    //  Insert
    // ========================================================================

    /// Insert `key` with `value`, overwriting the value if the key is
    /// already present.
    pub fn insert(&self, key: K, value: V) {
        let mut chain = LockChain::new();
        loop {
            match self.try_insert(&mut chain, key, value) {
                Ok(()) => return,
                Err(Restart) => {
                    trace_log!("insert restart");
                }
            }
        }
    }

    fn try_insert(&self, chain: &mut LockChain, key: K, value: V) -> Result<(), Restart> {
        chain.clear();
        let (mut node, mut version) = self.read_root()?;

        while !Self::header(node).is_leaf() {
            let inner = Self::as_inner(node);
            if !inner.is_full() {
                // A split below cannot propagate past a node with room for
                // one more separator; everything retained above this level
                // can no longer be touched.
                chain.clear();
            }
            chain.push(node, version);

            let idx = inner.find_child_index(&key);
            let child = inner.child(idx);
            let child_version = Self::header(child).lock.read_lock()?;
            inner.header().lock.check(version)?;

            node = child;
            version = child_version;
        }

        let leaf = Self::as_leaf(node);
        match leaf.search(&key) {
            Ok(pos) => {
                // Duplicate key: overwrite in place, no structural change.
                leaf.header().lock.upgrade_to_write_lock(version)?;
                if let Err(e) = self.validate_chain(&chain) {
                    leaf.header().lock.write_unlock();
                    return Err(e);
                }
                // SAFETY: write lock held; the upgrade proved the leaf is
                // exactly as searched, so `pos` is still the key's slot.
                unsafe { leaf.set_value(pos, value) };
                leaf.header().lock.write_unlock();
                Ok(())
            }
            Err(pos) if !leaf.is_full() => {
                leaf.header().lock.upgrade_to_write_lock(version)?;
                if let Err(e) = self.validate_chain(&chain) {
                    leaf.header().lock.write_unlock();
                    return Err(e);
                }
                // SAFETY: write lock held; the upgrade proved the leaf is
                // exactly as searched, so `pos` is the insert slot and the
                // leaf has room.
                unsafe { leaf.insert_at(pos, key, value) };
                self.len.fetch_add(1, RELAXED);
                leaf.header().lock.write_unlock();
                Ok(())
            }
            Err(_) => self.split_insert(node, version, &chain, key, value),
        }
    }

    /// Re-validate every retained ancestor before mutating anything, so a
    /// failure can still restart cleanly.
    fn validate_chain(&self, chain: &LockChain) -> Result<(), Restart> {
        for i in 0..chain.len() {
            let (node, version) = chain.get(i);
            Self::header(node).lock.check(version)?;
        }
        Ok(())
    }

    /// Insert into a full leaf: lock the retained chain and the leaf, split
    /// the leaf, and propagate the separator up the chain.
    fn split_insert(
        &self,
        leaf_ptr: *mut NodeHeader,
        leaf_version: u64,
        chain: &LockChain,
        key: K,
        value: V,
    ) -> Result<(), Restart> {
        // Upgrade the whole modification set top-down. A failed CAS means
        // something changed underneath; back out in reverse order.
        for i in 0..chain.len() {
            let (node, version) = chain.get(i);
            if let Err(e) = Self::header(node).lock.upgrade_to_write_lock(version) {
                for j in (0..i).rev() {
                    Self::header(chain.get(j).0).lock.write_unlock();
                }
                return Err(e);
            }
        }
        if let Err(e) = Self::header(leaf_ptr).lock.upgrade_to_write_lock(leaf_version) {
            for j in (0..chain.len()).rev() {
                Self::header(chain.get(j).0).lock.write_unlock();
            }
            return Err(e);
        }

        // Every lock is held; nothing can fail from here on.
        let leaf = Self::as_leaf(leaf_ptr);
        let right_ptr = Box::into_raw(LeafNode::<K, V, C>::new()).cast::<NodeHeader>();
        let right = Self::as_leaf(right_ptr);
        // SAFETY: leaf write-locked and full; right is fresh and unpublished.
        let separator = unsafe { leaf.split_into(right) };
        debug_log!(chain = chain.len(), "leaf split");

        // The new pair goes into whichever half now covers its key.
        let target = if key < separator { leaf } else { right };
        match target.search(&key) {
            // The key was absent under the version the upgrade revalidated;
            // a hit here is unreachable, but overwriting stays correct.
            Ok(pos) => unsafe { target.set_value(pos, value) },
            Err(pos) => {
                // SAFETY: write-locked (left) or unpublished (right); both
                // halves have room after the split.
                unsafe { target.insert_at(pos, key, value) };
                self.len.fetch_add(1, RELAXED);
            }
        }

        // Climb the chain, deepest ancestor first, until one absorbs the
        // pending separator.
        let mut pending_sep = separator;
        let mut pending_child = right_ptr;
        let mut absorbed = false;
        for i in (0..chain.len()).rev() {
            let inner = Self::as_inner(chain.get(i).0);
            if !inner.is_full() {
                // SAFETY: write lock held, room checked.
                unsafe { inner.insert_separator(pending_sep, pending_child) };
                absorbed = true;
                break;
            }

            let new_right_ptr = Box::into_raw(InnerNode::<K, C>::new()).cast::<NodeHeader>();
            let new_right = Self::as_inner(new_right_ptr);
            // SAFETY: write lock held, node full, sibling fresh.
            let up = unsafe { inner.split_into(new_right) };
            let target = if pending_sep < up { inner } else { new_right };
            // SAFETY: write-locked (left) or unpublished (right); both
            // halves have room after the split.
            unsafe { target.insert_separator(pending_sep, pending_child) };
            pending_sep = up;
            pending_child = new_right_ptr;
        }

        if !absorbed {
            // The split consumed the entire chain, which can only happen
            // when the chain head (or the leaf itself, in a single-node
            // tree) is the root: its successful upgrade proved it unchanged
            // since the descent validated it as the root. Swap the root
            // pointer while its write lock is still held; the old root
            // stays live as the left child and gets a normal unlock below.
            let old_root = if chain.len() > 0 {
                chain.get(0).0
            } else {
                leaf_ptr
            };
            let new_root = InnerNode::<K, C>::new_root(pending_sep, old_root, pending_child);
            self.root
                .store(Box::into_raw(new_root).cast::<NodeHeader>(), WRITE_ORD);
            debug_log!("root split, tree grows one level");
        }

        // Unwind: release everything in reverse acquisition order.
        Self::header(leaf_ptr).lock.write_unlock();
        for j in (0..chain.len()).rev() {
            Self::header(chain.get(j).0).lock.write_unlock();
        }
        Ok(())
    }

    // ========================================================================
    //  Range Scan
    // ========================================================================

    /// Collect up to `max_results` key/value pairs with keys at or above
    /// `start`, in ascending key order.
    ///
    /// Each visited leaf is copied under a validated version, but the scan
    /// as a whole is not a snapshot: concurrent inserts may or may not
    /// appear in the result. Cross-leaf continuation re-descends from the
    /// consumed leaf's upper fence, so no sibling links are required.
    #[must_use]
    pub fn range_scan(&self, start: &K, max_results: usize) -> Vec<(K, V)> {
        loop {
            match self.try_range_scan(start, max_results) {
                Ok(results) => return results,
                Err(Restart) => {
                    trace_log!("range scan restart");
                }
            }
        }
    }

    fn try_range_scan(&self, start: &K, max_results: usize) -> Result<Vec<(K, V)>, Restart> {
        let mut results: Vec<(K, V)> = Vec::new();
        if max_results == 0 {
            return Ok(results);
        }

        // Inclusive lower bound of the next leaf visit; advances to the
        // consumed leaf's fence after each round.
        let mut cursor: K = *start;
        loop {
            let (mut node, mut version) = self.read_root()?;
            // Exclusive upper bound of the current subtree; `None` on the
            // rightmost spine.
            let mut fence: Option<K> = None;

            while !Self::header(node).is_leaf() {
                let inner = Self::as_inner(node);
                let idx = inner.find_child_index(&cursor);
                let next_fence = if idx < inner.count() {
                    Some(inner.key_at(idx))
                } else {
                    fence
                };
                let child = inner.child(idx);
                let child_version = Self::header(child).lock.read_lock()?;
                inner.header().lock.check(version)?;

                fence = next_fence;
                node = child;
                version = child_version;
            }

            let leaf = Self::as_leaf(node);
            let begin = match leaf.search(&cursor) {
                Ok(i) | Err(i) => i,
            };
            for i in begin..leaf.count() {
                if results.len() == max_results {
                    break;
                }
                results.push(leaf.entry_at(i));
            }
            // A failure discards every partial result, not just this
            // leaf's; the caller restarts the whole scan.
            leaf.header().lock.read_unlock(version)?;

            if results.len() == max_results {
                return Ok(results);
            }
            match fence {
                Some(f) => cursor = f,
                None => return Ok(results),
            }
        }
    }

    // ========================================================================
    //  Introspection
    // ========================================================================

    /// Number of levels from the root to the leaves; 1 while the root is
    /// still a leaf.
    #[must_use]
    pub fn height(&self) -> usize {
        loop {
            if let Ok(height) = self.try_height() {
                return height;
            }
        }
    }

    fn try_height(&self) -> Result<usize, Restart> {
        let (mut node, mut version) = self.read_root()?;
        let mut height = 1;

        while !Self::header(node).is_leaf() {
            let inner = Self::as_inner(node);
            let child = inner.child(0);
            let child_version = Self::header(child).lock.read_lock()?;
            inner.header().lock.check(version)?;

            node = child;
            version = child_version;
            height += 1;
        }
        Self::header(node).lock.read_unlock(version)?;
        Ok(height)
    }
}

impl<K: Ord + Pod, V: Pod, const C: usize> Default for BTree<K, V, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Pod, V: Pod, const C: usize> fmt::Debug for BTree<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BTree")
            .field("len", &self.len())
            .field("capacity", &C)
            .finish_non_exhaustive()
    }
}

impl<K: Ord + Pod, V: Pod, const C: usize> Drop for BTree<K, V, C> {
    fn drop(&mut self) {
        // `&mut self` guarantees exclusive access; free the whole graph.
        Self::free_node(self.root.load(RELAXED));
    }
}

impl<K: Ord + Pod, V: Pod, const C: usize> BTree<K, V, C> {
    fn free_node(node: *mut NodeHeader) {
        // SAFETY: called only from `drop` with exclusive access; the kind
        // discriminant identifies the allocation's real layout.
        unsafe {
            if (*node).is_leaf() {
                drop(Box::from_raw(node.cast::<LeafNode<K, V, C>>()));
            } else {
                let inner = node.cast::<InnerNode<K, C>>();
                for i in 0..=(*inner).count() {
                    Self::free_node((*inner).child(i));
                }
                drop(Box::from_raw(inner));
            }
        }
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
impl<K, V, const C: usize> BTree<K, V, C>
where
    K: Ord + Pod,
    V: Pod,
{
    /// Walk the whole tree (single-threaded) asserting the structural
    /// invariants: sorted unique keys, separator/range consistency,
    /// occupancy limits, and equal leaf depth.
    fn check_invariants(&self) {
        let mut leaf_depth: Option<usize> = None;
        Self::check_node(
            self.root.load(READ_ORD),
            None,
            None,
            1,
            &mut leaf_depth,
        );
    }

    fn check_node(
        node: *mut NodeHeader,
        lower: Option<K>,
        upper: Option<K>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
    ) {
        if Self::header(node).is_leaf() {
            let leaf = Self::as_leaf(node);
            let n = leaf.count();
            assert!(n <= C, "leaf occupancy above capacity");
            assert!(n >= 1 || depth == 1, "empty non-root leaf");

            for i in 0..n {
                let (k, _) = leaf.entry_at(i);
                if i > 0 {
                    assert!(leaf.entry_at(i - 1).0 < k, "leaf keys not increasing");
                }
                if let Some(lo) = lower {
                    assert!(k >= lo, "leaf key below subtree range");
                }
                if let Some(hi) = upper {
                    assert!(k < hi, "leaf key above subtree range");
                }
            }

            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(d) => assert!(d == depth, "leaves at unequal depths"),
            }
        } else {
            let inner = Self::as_inner(node);
            let n = inner.count();
            assert!(n <= C - 1, "inner occupancy above capacity");

            for i in 0..n {
                let k = inner.key_at(i);
                if i > 0 {
                    assert!(inner.key_at(i - 1) < k, "separators not increasing");
                }
                if let Some(lo) = lower {
                    assert!(k > lo, "separator at or below subtree range");
                }
                if let Some(hi) = upper {
                    assert!(k < hi, "separator above subtree range");
                }
            }

            for i in 0..=n {
                assert!(!inner.child(i).is_null(), "owned child slot is null");
                let child_lower = if i == 0 { lower } else { Some(inner.key_at(i - 1)) };
                let child_upper = if i == n { upper } else { Some(inner.key_at(i)) };
                Self::check_node(inner.child(i), child_lower, child_upper, depth + 1, leaf_depth);
            }
        }
    }

    /// Root separator count, for the split scenarios.
    fn root_separators(&self) -> usize {
        let root = self.root.load(READ_ORD);
        assert!(!Self::header(root).is_leaf(), "root is still a leaf");
        Self::as_inner(root).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tree() {
        let tree: BTree<u64, u64, 4> = BTree::new();
        assert_eq!(tree.lookup(&1), None);
        assert_eq!(tree.len(), 0);
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 1);
        assert!(tree.range_scan(&0, 10).is_empty());
        tree.check_invariants();
    }

    #[test]
    fn insert_then_lookup_within_one_leaf() {
        let tree: BTree<u64, u64, 4> = BTree::new();
        tree.insert(2, 20);
        tree.insert(1, 10);
        tree.insert(3, 30);

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.height(), 1);
        for k in 1..=3 {
            assert_eq!(tree.lookup(&k), Some(k * 10));
        }
        assert_eq!(tree.lookup(&4), None);
        tree.check_invariants();
    }

    #[test]
    fn fifth_insert_splits_capacity_four_leaf() {
        let tree: BTree<u64, u64, 4> = BTree::new();
        for k in 1..=4 {
            tree.insert(k, k);
            assert_eq!(tree.height(), 1);
        }

        // The 5th insert overflows the root leaf: exactly one split, and
        // the root becomes an inner node with a single separator.
        tree.insert(5, 5);
        assert_eq!(tree.height(), 2);
        assert_eq!(tree.root_separators(), 1);

        assert_eq!(tree.lookup(&3), Some(3));
        let scanned: Vec<u64> = tree.range_scan(&1, 5).into_iter().map(|(k, _)| k).collect();
        assert_eq!(scanned, vec![1, 2, 3, 4, 5]);
        tree.check_invariants();
    }

    #[test]
    fn duplicate_insert_overwrites() {
        let tree: BTree<u64, u64, 4> = BTree::new();
        tree.insert(9, 1);
        assert_eq!(tree.lookup(&9), Some(1));

        tree.insert(9, 2);
        assert_eq!(tree.lookup(&9), Some(2));
        assert_eq!(tree.len(), 1);
        tree.check_invariants();
    }

    #[test]
    fn overwrite_in_full_leaf_does_not_split() {
        let tree: BTree<u64, u64, 4> = BTree::new();
        for k in 1..=4 {
            tree.insert(k, k);
        }
        assert_eq!(tree.height(), 1);

        tree.insert(2, 22);
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.lookup(&2), Some(22));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn sequential_inserts_stay_balanced() {
        let tree: BTree<u64, u64, 4> = BTree::new();
        for k in 0..1000 {
            tree.insert(k, k * 2);
            tree.check_invariants();
        }

        assert_eq!(tree.len(), 1000);
        for k in 0..1000 {
            assert_eq!(tree.lookup(&k), Some(k * 2));
        }
    }

    #[test]
    fn shuffled_inserts_stay_balanced() {
        // Multiplicative-hash ordering scatters inserts across the key
        // space without a dependency on an RNG in unit tests.
        let tree: BTree<u64, u64, 8> = BTree::new();
        let keys: Vec<u64> = (0..2000u64)
            .map(|i| i.wrapping_mul(0x9e37_79b9_7f4a_7c15))
            .collect();

        for &k in &keys {
            tree.insert(k, !k);
        }
        tree.check_invariants();

        assert_eq!(tree.len(), keys.len());
        for &k in &keys {
            assert_eq!(tree.lookup(&k), Some(!k));
        }

        let mut sorted = keys.clone();
        sorted.sort_unstable();
        let scanned: Vec<u64> = tree
            .range_scan(&0, usize::MAX)
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(scanned, sorted);
    }

    #[test]
    fn minimum_capacity_tree_works() {
        let tree: BTree<u64, u64, 2> = BTree::new();
        for k in 0..64 {
            tree.insert(k, k);
            tree.check_invariants();
        }
        for k in 0..64 {
            assert_eq!(tree.lookup(&k), Some(k));
        }
        assert!(tree.height() > 2);
    }

    #[test]
    fn range_scan_honors_start_and_limit() {
        let tree: BTree<u64, u64, 4> = BTree::new();
        for k in (0..100).map(|k| k * 2) {
            tree.insert(k, k);
        }

        // Start between keys: first result is the next present key.
        let scanned: Vec<u64> = tree.range_scan(&31, 3).into_iter().map(|(k, _)| k).collect();
        assert_eq!(scanned, vec![32, 34, 36]);

        // Start on a key: inclusive.
        let scanned: Vec<u64> = tree.range_scan(&32, 2).into_iter().map(|(k, _)| k).collect();
        assert_eq!(scanned, vec![32, 34]);

        // Fewer keys remain than requested.
        let scanned: Vec<u64> = tree.range_scan(&196, 10).into_iter().map(|(k, _)| k).collect();
        assert_eq!(scanned, vec![196, 198]);

        // Start past the largest key.
        assert!(tree.range_scan(&199, 10).is_empty());

        // Zero results requested.
        assert!(tree.range_scan(&0, 0).is_empty());
    }

    #[test]
    fn values_survive_deep_split_cascades() {
        // Capacity 2 forces splits on nearly every insert, exercising
        // multi-level propagation and repeated root growth.
        let tree: BTree<u64, u64, 2> = BTree::new();
        let keys: Vec<u64> = (0..256u64)
            .map(|i| i.wrapping_mul(0xbf58_476d_1ce4_e5b9))
            .collect();

        for &k in &keys {
            tree.insert(k, k ^ 0xffff);
            tree.check_invariants();
        }
        for &k in &keys {
            assert_eq!(tree.lookup(&k), Some(k ^ 0xffff));
        }
    }

    #[test]
    fn debug_format_reports_len() {
        let tree: BTree<u64, u64, 4> = BTree::new();
        tree.insert(1, 1);
        let text = format!("{tree:?}");
        assert!(text.contains("len: 1"));
    }
}
