//! # `btree-olc`
//!
//! A concurrent ordered map: a B+tree protected by optimistic lock coupling.
//!
//! Every node carries a [`VersionLock`](version::VersionLock) - a spin lock
//! fused with a version counter. Readers never block: they traverse
//! root-to-leaf validating captured versions and restart on interference.
//! Writers take brief per-node locks only around the structural change they
//! actually perform, so unrelated inserts proceed in parallel and no
//! tree-wide lock ever exists.
//!
//! | Feature | Status |
//! |---------|--------|
//! | Concurrent lookup | Lock-free, version-validated |
//! | Concurrent insert | Lock-coupled; splits localized to the affected path |
//! | Range scan | Per-leaf consistency, re-descent between leaves |
//! | Deletion | Not implemented (insert-only workload) |
//!
//! ## Thread Safety
//!
//! `BTree<K, V, C>` is `Send + Sync`; all operations take `&self`:
//!
//! ```rust
//! use btree_olc::BTree;
//! use std::thread;
//!
//! let tree: BTree<u64, u64> = BTree::new();
//!
//! thread::scope(|s| {
//!     for t in 0..4u64 {
//!         let tree = &tree;
//!         s.spawn(move || {
//!             for k in (t * 100)..(t * 100 + 100) {
//!                 tree.insert(k, k);
//!             }
//!         });
//!     }
//! });
//!
//! assert_eq!(tree.len(), 400);
//! assert_eq!(tree.lookup(&250), Some(250));
//! ```
//!
//! ## Key and Value Constraints
//!
//! Optimistic readers copy node slots before validating, so a copy may be
//! torn by a concurrent writer. Keys and values are therefore bound by the
//! [`Pod`](node::Pod) marker ("any bit pattern is a valid value"): the
//! primitive integers, floats, and fixed-size arrays of them. Keys
//! additionally need `Ord`.
//!
//! ## Capacity
//!
//! The node capacity is the const generic `C` (default 64). `C < 2` is
//! rejected at compile time when the tree is instantiated.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod inner;
pub mod leaf;
pub mod node;
pub mod ordering;
pub mod tree;
pub mod version;

mod tracing_helpers;

// Re-export main types for convenience
pub use node::Pod;
pub use tree::BTree;
pub use version::{Restart, VersionLock};
