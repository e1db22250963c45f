//! # B+ Tree Algorithms
//!
//! This module ties the node accessors and the pager together into the
//! tree operations: point lookup, ordered traversal, insertion with leaf
//! and internal splits, root creation, separator maintenance, and the
//! partial delete path.
//!
//! ## Page-based structure
//!
//! Nodes reference each other exclusively by page number; every hop goes
//! back through the pager. A [`Cursor`] is likewise just a
//! `(page, cell, end)` triple with no borrow attached, so any operation
//! that might allocate pages can safely refetch whatever it needs.
//!
//! ```text
//!                 [page 0: internal, root]
//!                 /          |           \
//!        [leaf 2]       [leaf 3]       [leaf 1]
//!            |--------------->|------------->|      next-leaf chain
//! ```
//!
//! Page 0 stays the root forever. When the root overflows, its contents
//! move to a freshly allocated page and page 0 is rebuilt as an internal
//! node over the two halves, so the tree grows a level without anyone
//! having to update a "root pointer".
//!
//! ## Insert algorithm
//!
//! ```text
//! 1. Descend from the root comparing separators until a leaf is reached
//! 2. If the leaf has room: shift cells right of the insertion point, done
//! 3. Otherwise split: partition the 14 logical cells (13 + incoming) into
//!    7 left / 7 right, splice the new leaf into the sibling chain, then
//!    refresh the parent's separator for the left half and insert the new
//!    leaf into the parent
//! 4. A full parent splits in turn; a full root is rebuilt via the
//!    relocation described above
//! ```
//!
//! Splits allocate pages mid-flight, so [`BTree::insert`] first counts how
//! many pages the cascade will need and refuses with `table full` while
//! the tree is still untouched.
//!
//! ## Delete algorithm
//!
//! Deletion removes the cell and, when the removed key was the leaf's
//! maximum, walks up the parent chain rewriting separators that still
//! carry it. There is no underflow handling: leaves never merge and pages
//! are never reclaimed.

use eyre::{ensure, Result};

use crate::btree::interior::{InternalNode, InternalNodeMut};
use crate::btree::leaf::{LeafNode, LeafNodeMut};
use crate::config::{
    INTERNAL_NODE_MAX_KEYS, INVALID_PAGE_NUM, LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_MAX_CELLS,
    LEAF_NODE_RIGHT_SPLIT_COUNT, TABLE_MAX_PAGES,
};
use crate::error::ExecError;
use crate::row::Row;
use crate::storage::page::{NodeHeader, NodeType};
use crate::storage::pager::{PageNum, Pager};

/// A position within the tree: a leaf page and a cell index. Only leaf
/// positions are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub page_num: PageNum,
    pub cell_num: u32,
    pub end_of_table: bool,
}

pub struct BTree<'a> {
    pager: &'a mut Pager,
    root_page: PageNum,
}

impl<'a> BTree<'a> {
    pub fn new(pager: &'a mut Pager, root_page: PageNum) -> Self {
        Self { pager, root_page }
    }

    /// Descend to the leaf covering `key`. The cursor lands on the cell
    /// holding `key`, or on the first cell with a greater key (possibly
    /// one past the end of the leaf).
    pub fn find(&mut self, key: u32) -> Result<Cursor> {
        let mut page_num = self.root_page;
        loop {
            let page = self.pager.page(page_num)?;
            match NodeHeader::from_page(page)?.node_type()? {
                NodeType::Leaf => {
                    let leaf = LeafNode::from_page(page)?;
                    return Ok(Cursor {
                        page_num,
                        cell_num: leaf.search(key),
                        end_of_table: false,
                    });
                }
                NodeType::Internal => {
                    let node = InternalNode::from_page(page)?;
                    page_num = node.child_at(node.find_child(key))?;
                }
            }
        }
    }

    /// Cursor at the smallest key in the table. `end_of_table` is set when
    /// the tree is empty.
    pub fn start(&mut self) -> Result<Cursor> {
        let mut cursor = self.find(0)?;
        let leaf = LeafNode::from_page(self.pager.page(cursor.page_num)?)?;
        cursor.end_of_table = leaf.num_cells() == 0;
        Ok(cursor)
    }

    /// Step to the next cell, following the sibling chain across leaves.
    /// Leaves emptied by deletion are skipped over.
    pub fn advance(&mut self, cursor: &mut Cursor) -> Result<()> {
        let leaf = LeafNode::from_page(self.pager.page(cursor.page_num)?)?;
        cursor.cell_num += 1;
        if cursor.cell_num < leaf.num_cells() {
            return Ok(());
        }
        let mut next = leaf.next_leaf();
        loop {
            if next == 0 {
                cursor.end_of_table = true;
                return Ok(());
            }
            cursor.page_num = next;
            cursor.cell_num = 0;
            let leaf = LeafNode::from_page(self.pager.page(next)?)?;
            if leaf.num_cells() > 0 {
                return Ok(());
            }
            next = leaf.next_leaf();
        }
    }

    /// Deserialize the row under the cursor.
    pub fn row_at(&mut self, cursor: &Cursor) -> Result<Row> {
        let leaf = LeafNode::from_page(self.pager.page(cursor.page_num)?)?;
        Ok(Row::read_from(leaf.value_at(cursor.cell_num)?))
    }

    /// The key under the cursor, or `None` when the cursor sits one past
    /// the leaf's last cell.
    pub fn leaf_key_at(&mut self, cursor: &Cursor) -> Result<Option<u32>> {
        let leaf = LeafNode::from_page(self.pager.page(cursor.page_num)?)?;
        if cursor.cell_num < leaf.num_cells() {
            Ok(Some(leaf.key_at(cursor.cell_num)?))
        } else {
            Ok(None)
        }
    }

    /// Insert `key` at the cursor position, splitting as needed. The
    /// cursor must come from [`find`](Self::find) for the same key.
    pub fn insert(&mut self, cursor: &Cursor, key: u32, row: &Row) -> Result<()> {
        let num_cells = LeafNode::from_page(self.pager.page(cursor.page_num)?)?.num_cells();

        if num_cells >= LEAF_NODE_MAX_CELLS as u32 {
            // Refuse while nothing has been touched: a split cascade
            // allocates pages midway and must not run out halfway through.
            let needed = self.split_allocations_required(cursor.page_num)?;
            if self.pager.num_pages() + needed > TABLE_MAX_PAGES as u32 {
                return Err(ExecError::TableFull.into());
            }
            return self.split_leaf_and_insert(cursor, key, row);
        }

        let page = self.pager.page_mut(cursor.page_num)?;
        let mut leaf = LeafNodeMut::from_page(page)?;
        let mut cell = num_cells;
        while cell > cursor.cell_num {
            leaf.copy_cell(cell - 1, cell)?;
            cell -= 1;
        }
        leaf.write_cell(cursor.cell_num, key, row)?;
        leaf.set_num_cells(num_cells + 1);
        Ok(())
    }

    /// Pages a split starting at `leaf_page` will allocate: one for the
    /// new leaf, one per full internal ancestor, and one extra when the
    /// topmost split reaches the root (whose contents move to a fresh
    /// page).
    fn split_allocations_required(&mut self, leaf_page: PageNum) -> Result<u32> {
        let mut needed = 1;
        let header = NodeHeader::from_page(self.pager.page(leaf_page)?)?;
        if header.is_root() {
            return Ok(needed + 1);
        }
        let mut page_num = header.parent();
        loop {
            let node = InternalNode::from_page(self.pager.page(page_num)?)?;
            let (num_keys, is_root, parent) = (node.num_keys(), node.is_root(), node.parent());
            if (num_keys as usize) < INTERNAL_NODE_MAX_KEYS {
                break;
            }
            needed += 1;
            if is_root {
                needed += 1;
                break;
            }
            page_num = parent;
        }
        Ok(needed)
    }

    /// Split a full leaf and insert the pending cell. The 14 logical cells
    /// are partitioned in key order: the lower half stays, the upper half
    /// moves to a new right sibling spliced into the leaf chain.
    fn split_leaf_and_insert(&mut self, cursor: &Cursor, key: u32, row: &Row) -> Result<()> {
        let old_max = self.max_key(cursor.page_num)?;
        let new_page_num = self.pager.unused_page_num()?;

        let old_page = *self.pager.page(cursor.page_num)?;
        let old_leaf = LeafNode::from_page(&old_page)?;
        let parent_page = old_leaf.parent();
        let was_root = old_leaf.is_root();
        let old_next_leaf = old_leaf.next_leaf();

        let left_count = LEAF_NODE_LEFT_SPLIT_COUNT as u32;

        {
            let page = self.pager.page_mut(new_page_num)?;
            let mut new_leaf = LeafNodeMut::init(page)?;
            new_leaf.set_parent(parent_page);
            new_leaf.set_next_leaf(old_next_leaf);
            for logical in left_count..=LEAF_NODE_MAX_CELLS as u32 {
                let dst = logical - left_count;
                if logical == cursor.cell_num {
                    new_leaf.write_cell(dst, key, row)?;
                } else if logical > cursor.cell_num {
                    new_leaf.copy_cell_from(&old_leaf, logical - 1, dst)?;
                } else {
                    new_leaf.copy_cell_from(&old_leaf, logical, dst)?;
                }
            }
            new_leaf.set_num_cells(LEAF_NODE_RIGHT_SPLIT_COUNT as u32);
        }

        {
            let page = self.pager.page_mut(cursor.page_num)?;
            let mut leaf = LeafNodeMut::from_page(page)?;
            for logical in 0..left_count {
                if logical == cursor.cell_num {
                    leaf.write_cell(logical, key, row)?;
                } else if logical > cursor.cell_num {
                    leaf.copy_cell_from(&old_leaf, logical - 1, logical)?;
                }
                // cells below the insertion point are already in place
            }
            leaf.set_num_cells(left_count);
            leaf.set_next_leaf(new_page_num);
        }

        if was_root {
            self.create_new_root(new_page_num)
        } else {
            let new_max = self.max_key(cursor.page_num)?;
            self.update_internal_node_key(parent_page, old_max, new_max)?;
            self.internal_node_insert(parent_page, new_page_num)
        }
    }

    /// Rebuild page 0 as an internal root over its former contents (moved
    /// to a fresh left-child page) and `right_child_page`.
    fn create_new_root(&mut self, right_child_page: PageNum) -> Result<()> {
        // Materialize the right child before allocating, so the left child
        // gets the next page number after it.
        self.pager.page(right_child_page)?;
        let left_child_page = self.pager.unused_page_num()?;

        let root_bytes = *self.pager.page(self.root_page)?;
        let root_was_internal =
            NodeHeader::from_page(&root_bytes)?.node_type()? == NodeType::Internal;

        if root_was_internal {
            // Splitting an internal root: the right child is a brand-new
            // page that still needs its header stamped.
            InternalNodeMut::init(self.pager.page_mut(right_child_page)?)?;
        }

        {
            let page = self.pager.page_mut(left_child_page)?;
            page.copy_from_slice(&root_bytes);
            NodeHeader::from_page_mut(page)?.set_root(false);
        }

        if root_was_internal {
            // The copied node's children still point at page 0 as their
            // parent; re-aim them at the relocated copy.
            let children: Vec<PageNum> = {
                let node = InternalNode::from_page(self.pager.page(left_child_page)?)?;
                (0..=node.num_keys())
                    .map(|i| node.child_at(i))
                    .collect::<Result<_>>()?
            };
            for child in children {
                NodeHeader::from_page_mut(self.pager.page_mut(child)?)?
                    .set_parent(left_child_page);
            }
        }

        let left_max = self.max_key(left_child_page)?;
        {
            let page = self.pager.page_mut(self.root_page)?;
            let mut root = InternalNodeMut::init(page)?;
            root.set_root(true);
            root.set_num_keys(1);
            root.set_cell(0, left_child_page, left_max)?;
            root.set_right_child(right_child_page);
        }
        NodeHeader::from_page_mut(self.pager.page_mut(left_child_page)?)?
            .set_parent(self.root_page);
        NodeHeader::from_page_mut(self.pager.page_mut(right_child_page)?)?
            .set_parent(self.root_page);
        Ok(())
    }

    /// Register `child_page` under `parent_page`, keyed by the child's
    /// maximum key. The child's parent pointer is rewritten by whichever
    /// node actually ends up holding it, splits included; keeping that
    /// bookkeeping here is what keeps parent pointers true through
    /// cascading splits.
    fn internal_node_insert(&mut self, parent_page: PageNum, child_page: PageNum) -> Result<()> {
        let child_max = self.max_key(child_page)?;
        let (num_keys, right_child, index) = {
            let node = InternalNode::from_page(self.pager.page(parent_page)?)?;
            (node.num_keys(), node.right_child(), node.find_child(child_max))
        };

        if num_keys >= INTERNAL_NODE_MAX_KEYS as u32 {
            return self.internal_node_split_and_insert(parent_page, child_page);
        }

        if right_child == INVALID_PAGE_NUM {
            // Freshly initialized, empty node.
            InternalNodeMut::from_page(self.pager.page_mut(parent_page)?)?
                .set_right_child(child_page);
            NodeHeader::from_page_mut(self.pager.page_mut(child_page)?)?
                .set_parent(parent_page);
            return Ok(());
        }

        let right_max = self.max_key(right_child)?;
        {
            let page = self.pager.page_mut(parent_page)?;
            let mut node = InternalNodeMut::from_page(page)?;
            node.set_num_keys(num_keys + 1);
            if child_max > right_max {
                // The new child supersedes the right child, which moves
                // into the body under its own maximum key.
                node.set_cell(num_keys, right_child, right_max)?;
                node.set_right_child(child_page);
            } else {
                let mut cell = num_keys;
                while cell > index {
                    node.copy_cell(cell - 1, cell)?;
                    cell -= 1;
                }
                node.set_cell(index, child_page, child_max)?;
            }
        }
        NodeHeader::from_page_mut(self.pager.page_mut(child_page)?)?.set_parent(parent_page);
        Ok(())
    }

    /// Split a full internal node while inserting `child_page`. Four cases
    /// interleave here: the node may or may not be the root, and the
    /// pending child may belong to either half after redistribution.
    fn internal_node_split_and_insert(
        &mut self,
        parent_page: PageNum,
        child_page: PageNum,
    ) -> Result<()> {
        let mut old_page_num = parent_page;
        let old_max = self.max_key(old_page_num)?;
        let child_max = self.max_key(child_page)?;
        let new_page_num = self.pager.unused_page_num()?;
        let splitting_root =
            NodeHeader::from_page(self.pager.page(old_page_num)?)?.is_root();

        let grandparent_page;
        if splitting_root {
            self.create_new_root(new_page_num)?;
            grandparent_page = self.root_page;
            // The old node's contents now live in the new root's first
            // child; new_page_num is already its right child.
            old_page_num =
                InternalNode::from_page(self.pager.page(self.root_page)?)?.child_at(0)?;
        } else {
            grandparent_page =
                NodeHeader::from_page(self.pager.page(old_page_num)?)?.parent();
            InternalNodeMut::init(self.pager.page_mut(new_page_num)?)?;
        }

        // Move the old right child over first, then detach it.
        let old_right = {
            let node = InternalNode::from_page(self.pager.page(old_page_num)?)?;
            node.child_at(node.num_keys())?
        };
        self.internal_node_insert(new_page_num, old_right)?;
        InternalNodeMut::from_page(self.pager.page_mut(old_page_num)?)?
            .set_right_child(INVALID_PAGE_NUM);

        // Move the cells above the midpoint across, one at a time.
        let mut cell = INTERNAL_NODE_MAX_KEYS as u32 - 1;
        while cell > INTERNAL_NODE_MAX_KEYS as u32 / 2 {
            let moved = InternalNode::from_page(self.pager.page(old_page_num)?)?.child_at(cell)?;
            self.internal_node_insert(new_page_num, moved)?;

            let num_keys =
                InternalNode::from_page(self.pager.page(old_page_num)?)?.num_keys();
            InternalNodeMut::from_page(self.pager.page_mut(old_page_num)?)?
                .set_num_keys(num_keys - 1);
            cell -= 1;
        }

        // The highest remaining cell's child is promoted to right child.
        {
            let node = InternalNode::from_page(self.pager.page(old_page_num)?)?;
            let num_keys = node.num_keys();
            let promoted = node.child_at(num_keys - 1)?;
            let mut node = InternalNodeMut::from_page(self.pager.page_mut(old_page_num)?)?;
            node.set_right_child(promoted);
            node.set_num_keys(num_keys - 1);
        }

        // Insert the pending child into whichever half now covers it.
        let max_after_split = self.max_key(old_page_num)?;
        let destination = if child_max < max_after_split {
            old_page_num
        } else {
            new_page_num
        };
        self.internal_node_insert(destination, child_page)?;

        let old_node_new_max = self.max_key(old_page_num)?;
        self.update_internal_node_key(grandparent_page, old_max, old_node_new_max)?;

        if !splitting_root {
            let gp = NodeHeader::from_page(self.pager.page(old_page_num)?)?.parent();
            self.internal_node_insert(gp, new_page_num)?;
        }
        Ok(())
    }

    /// Rewrite the separator that carried `old_key`, if one does. A node
    /// whose right child owned `old_key` stores no separator for it.
    fn update_internal_node_key(
        &mut self,
        page_num: PageNum,
        old_key: u32,
        new_key: u32,
    ) -> Result<()> {
        let page = self.pager.page_mut(page_num)?;
        let mut node = InternalNodeMut::from_page(page)?;
        let index = node.find_child(old_key);
        if index < node.num_keys() {
            node.set_key(index, new_key)?;
        }
        Ok(())
    }

    /// Maximum key of the subtree rooted at `page_num`: a leaf's last
    /// cell, reached by chasing right children.
    fn max_key(&mut self, page_num: PageNum) -> Result<u32> {
        let node_type = NodeHeader::from_page(self.pager.page(page_num)?)?.node_type()?;
        match node_type {
            NodeType::Leaf => {
                let leaf = LeafNode::from_page(self.pager.page(page_num)?)?;
                let num_cells = leaf.num_cells();
                ensure!(num_cells > 0, "max key of empty leaf page {}", page_num);
                leaf.key_at(num_cells - 1)
            }
            NodeType::Internal => {
                let right = {
                    let node = InternalNode::from_page(self.pager.page(page_num)?)?;
                    node.child_at(node.num_keys())?
                };
                self.max_key(right)
            }
        }
    }

    /// Remove `key` from the tree. When the removed cell was the leaf's
    /// maximum, ancestors still carrying it as a separator are rewritten
    /// to the leaf's new maximum. No rebalancing happens.
    pub fn delete(&mut self, key: u32) -> Result<()> {
        let cursor = self.find(key)?;

        let (num_cells, found) = {
            let leaf = LeafNode::from_page(self.pager.page(cursor.page_num)?)?;
            let n = leaf.num_cells();
            let found = cursor.cell_num < n && leaf.key_at(cursor.cell_num)? == key;
            (n, found)
        };
        if !found {
            return Err(ExecError::KeyNotFound(key).into());
        }

        let was_max = cursor.cell_num == num_cells - 1;
        let (parent_page, leaf_is_root) = {
            let page = self.pager.page_mut(cursor.page_num)?;
            let mut leaf = LeafNodeMut::from_page(page)?;
            for cell in cursor.cell_num + 1..num_cells {
                leaf.copy_cell(cell, cell - 1)?;
            }
            leaf.set_num_cells(num_cells - 1);
            (leaf.parent(), leaf.is_root())
        };

        if !was_max || leaf_is_root || num_cells == 1 {
            return Ok(());
        }

        let new_max = {
            let leaf = LeafNode::from_page(self.pager.page(cursor.page_num)?)?;
            leaf.key_at(num_cells - 2)?
        };

        let mut page_num = parent_page;
        loop {
            let (replaced, at_root, next_parent) = {
                let page = self.pager.page_mut(page_num)?;
                let mut node = InternalNodeMut::from_page(page)?;
                let index = node.find_child(key);
                let hit = index < node.num_keys() && node.as_read().key_at(index)? == key;
                if hit {
                    node.set_key(index, new_max)?;
                }
                (hit, node.is_root(), node.parent())
            };
            if !replaced || at_root {
                break;
            }
            page_num = next_parent;
        }
        Ok(())
    }

    /// Indented structural dump of the whole tree, used by the shell's
    /// `.btree` meta-command.
    pub fn format(&mut self) -> Result<String> {
        let mut out = String::new();
        self.format_node(self.root_page, 0, &mut out)?;
        while out.ends_with('\n') {
            out.pop();
        }
        Ok(out)
    }

    fn format_node(&mut self, page_num: PageNum, depth: usize, out: &mut String) -> Result<()> {
        let indent = "  ".repeat(depth);
        let node_type = NodeHeader::from_page(self.pager.page(page_num)?)?.node_type()?;
        match node_type {
            NodeType::Leaf => {
                let keys: Vec<u32> = {
                    let leaf = LeafNode::from_page(self.pager.page(page_num)?)?;
                    (0..leaf.num_cells())
                        .map(|cell| leaf.key_at(cell))
                        .collect::<Result<_>>()?
                };
                out.push_str(&format!("{}- leaf (size {})\n", indent, keys.len()));
                for key in keys {
                    out.push_str(&format!("{}  - {}\n", indent, key));
                }
            }
            NodeType::Internal => {
                let (cells, right) = {
                    let node = InternalNode::from_page(self.pager.page(page_num)?)?;
                    let cells: Vec<(PageNum, u32)> = (0..node.num_keys())
                        .map(|i| Ok((node.child_at(i)?, node.key_at(i)?)))
                        .collect::<Result<_>>()?;
                    (cells, node.child_at(node.num_keys())?)
                };
                out.push_str(&format!("{}- internal (size {})\n", indent, cells.len()));
                for (child, key) in cells {
                    self.format_node(child, depth + 1, out)?;
                    out.push_str(&format!("{}  - key {}\n", indent, key));
                }
                self.format_node(right, depth + 1, out)?;
            }
        }
        Ok(())
    }
}
