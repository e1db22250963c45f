//! # Storage Layout Constants
//!
//! This module centralizes every on-disk layout constant. Constants that
//! depend on each other are co-located and guarded by compile-time
//! assertions so a change to one cannot silently invalidate another.
//!
//! ## Page layout
//!
//! The database file is a flat array of 4096-byte pages. Every page holds
//! exactly one B+ tree node, and every node starts with a 6-byte common
//! header:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----------------------------------------
//! 0       1     node type (0 = internal, 1 = leaf)
//! 1       1     is-root flag (0/1)
//! 2       4     parent page number (unused for the root)
//! ```
//!
//! ## Leaf node
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----------------------------------------
//! 6       4     number of cells
//! 10      4     next-leaf page number (0 = no sibling)
//! 14      ...   cells: [key u32][row 291B] x num_cells
//! ```
//!
//! Page 0 is the permanent root, so 0 can double as the "no sibling"
//! sentinel: the root is never linked into the leaf chain.
//!
//! ## Internal node
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----------------------------------------
//! 6       4     number of keys
//! 10      4     right-child page number (0xFFFFFFFF = uninitialized)
//! 14      ...   cells: [child u32][key u32] x num_keys
//! ```
//!
//! The separator key at index `i` equals the maximum key in the subtree of
//! child `i`. An internal node with `k` keys has `k + 1` children; the last
//! one lives in the right-child header slot.
//!
//! ## Capacity
//!
//! A leaf cell is 4 + 291 = 295 bytes, so a leaf holds
//! `(4096 - 14) / 295 = 13` cells. `INTERNAL_NODE_MAX_KEYS` is kept far
//! below what a page could hold so that internal splits happen after a
//! handful of leaf splits and stay continuously exercised by the tests.

/// Size of a database page in bytes. The fundamental unit of I/O.
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of pages one database file may hold (caps the file at
/// 400 KiB). Allocating past this limit is a `table full` error.
pub const TABLE_MAX_PAGES: usize = 100;

/// The root always lives on page 0, for the life of the database.
pub const ROOT_PAGE_NUM: u32 = 0;

/// Sentinel page number marking an internal node's right child as
/// uninitialized. Never a valid page.
pub const INVALID_PAGE_NUM: u32 = u32::MAX;

// ============================================================================
// ROW LAYOUT
// ============================================================================

/// Serialized size of the row id (u32, little-endian).
pub const ID_SIZE: usize = 4;

/// Fixed width of the username field; shorter strings are NUL-padded.
pub const USERNAME_SIZE: usize = 32;

/// Fixed width of the email field; shorter strings are NUL-padded.
pub const EMAIL_SIZE: usize = 255;

pub const ID_OFFSET: usize = 0;
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

/// Serialized size of one row.
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

const _: () = assert!(ROW_SIZE == 291, "row layout drifted from 4 + 32 + 255");

// ============================================================================
// NODE HEADER LAYOUT
// ============================================================================

pub const NODE_TYPE_SIZE: usize = 1;
pub const NODE_TYPE_OFFSET: usize = 0;
pub const IS_ROOT_SIZE: usize = 1;
pub const IS_ROOT_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
pub const PARENT_POINTER_SIZE: usize = 4;
pub const PARENT_POINTER_OFFSET: usize = IS_ROOT_OFFSET + IS_ROOT_SIZE;

/// Size of the header shared by leaf and internal nodes.
pub const COMMON_NODE_HEADER_SIZE: usize =
    NODE_TYPE_SIZE + IS_ROOT_SIZE + PARENT_POINTER_SIZE;

// ============================================================================
// LEAF NODE LAYOUT
// ============================================================================

pub const LEAF_NODE_NUM_CELLS_SIZE: usize = 4;
pub const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const LEAF_NODE_NEXT_LEAF_SIZE: usize = 4;
pub const LEAF_NODE_NEXT_LEAF_OFFSET: usize =
    LEAF_NODE_NUM_CELLS_OFFSET + LEAF_NODE_NUM_CELLS_SIZE;

pub const LEAF_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + LEAF_NODE_NUM_CELLS_SIZE + LEAF_NODE_NEXT_LEAF_SIZE;

pub const LEAF_NODE_KEY_SIZE: usize = 4;
pub const LEAF_NODE_VALUE_SIZE: usize = ROW_SIZE;
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;

/// How many cells fit in one leaf page.
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;

/// Cell counts after a leaf split distributes `LEAF_NODE_MAX_CELLS + 1`
/// logical cells (the full leaf plus the incoming one) across two leaves.
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize =
    LEAF_NODE_MAX_CELLS + 1 - LEAF_NODE_RIGHT_SPLIT_COUNT;

const _: () = assert!(LEAF_NODE_HEADER_SIZE == 14, "leaf header layout drifted");
const _: () = assert!(LEAF_NODE_MAX_CELLS == 13, "leaf capacity drifted");
const _: () = assert!(
    LEAF_NODE_LEFT_SPLIT_COUNT + LEAF_NODE_RIGHT_SPLIT_COUNT == LEAF_NODE_MAX_CELLS + 1,
    "leaf split counts must cover every logical cell exactly once"
);
const _: () = assert!(
    LEAF_NODE_HEADER_SIZE + LEAF_NODE_MAX_CELLS * LEAF_NODE_CELL_SIZE <= PAGE_SIZE,
    "a full leaf must fit in one page"
);

// ============================================================================
// INTERNAL NODE LAYOUT
// ============================================================================

pub const INTERNAL_NODE_NUM_KEYS_SIZE: usize = 4;
pub const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const INTERNAL_NODE_RIGHT_CHILD_SIZE: usize = 4;
pub const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize =
    INTERNAL_NODE_NUM_KEYS_OFFSET + INTERNAL_NODE_NUM_KEYS_SIZE;

pub const INTERNAL_NODE_HEADER_SIZE: usize = COMMON_NODE_HEADER_SIZE
    + INTERNAL_NODE_NUM_KEYS_SIZE
    + INTERNAL_NODE_RIGHT_CHILD_SIZE;

pub const INTERNAL_NODE_CHILD_SIZE: usize = 4;
pub const INTERNAL_NODE_KEY_SIZE: usize = 4;
pub const INTERNAL_NODE_CELL_SIZE: usize =
    INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;

/// Maximum separator keys per internal node. Deliberately tiny so that
/// multi-level trees and internal splits appear after a few dozen inserts.
pub const INTERNAL_NODE_MAX_KEYS: usize = 3;

const _: () = assert!(INTERNAL_NODE_HEADER_SIZE == 14, "internal header layout drifted");
const _: () = assert!(
    INTERNAL_NODE_HEADER_SIZE + INTERNAL_NODE_MAX_KEYS * INTERNAL_NODE_CELL_SIZE <= PAGE_SIZE,
    "a full internal node must fit in one page"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_split_counts_partition_fourteen_cells() {
        assert_eq!(LEAF_NODE_LEFT_SPLIT_COUNT, 7);
        assert_eq!(LEAF_NODE_RIGHT_SPLIT_COUNT, 7);
    }

    #[test]
    fn max_database_size_is_400_kib() {
        assert_eq!(PAGE_SIZE * TABLE_MAX_PAGES, 400 * 1024);
    }
}
