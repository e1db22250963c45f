//! # B+ Tree Index
//!
//! The disk-resident B+ tree behind the table. All rows live in leaf
//! nodes, chained left-to-right for ordered scans; internal nodes hold
//! separator keys equal to the maximum key of each child's subtree.
//!
//! ## Module organization
//!
//! - [`leaf`]: typed views over leaf pages (fixed 295-byte cells)
//! - [`interior`]: typed views over internal pages (8-byte routing cells)
//! - [`tree`]: the algorithms: find, cursor traversal, insert with leaf
//!   and internal splits, root creation, and the partial delete path
//!
//! Nodes reference each other by page number only; every access goes
//! through the pager, which keeps ownership of page buffers simple: one
//! borrow per operation, nothing outliving a statement.

pub mod interior;
pub mod leaf;
pub mod tree;

pub use interior::{InternalNode, InternalNodeMut};
pub use leaf::{LeafNode, LeafNodeMut};
pub use tree::{BTree, Cursor};
