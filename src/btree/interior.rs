//! # B+ Tree Internal Node
//!
//! Internal nodes route searches. After the 14-byte header the body is a
//! packed array of 8-byte cells, each a child page number followed by a
//! separator key:
//!
//! ```text
//! +------------------------+
//! | Common header (6B)     |
//! | num_keys (4B)          |
//! | right_child (4B)       |
//! +------------------------+
//! | Cell 0: child | key    |  8 bytes
//! | Cell 1: child | key    |
//! | ...         (max 3)    |
//! +------------------------+
//! ```
//!
//! A node with `k` keys has `k + 1` children: children `0..k` live in the
//! body, child `k` in the right-child header slot. The separator key at
//! index `i` equals the maximum key in the subtree of child `i`, so the
//! right child covers everything greater than the last separator.
//!
//! `right_child == INVALID_PAGE_NUM` marks a freshly initialized, empty
//! node; reading a child through [`InternalNode::child_at`] refuses to
//! hand that sentinel out.

use std::mem::size_of;

use eyre::{ensure, Result};
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{
    INTERNAL_NODE_CELL_SIZE, INTERNAL_NODE_CHILD_SIZE, INTERNAL_NODE_HEADER_SIZE,
    INTERNAL_NODE_KEY_SIZE, INTERNAL_NODE_MAX_KEYS, INVALID_PAGE_NUM, PAGE_SIZE,
};
use crate::storage::page::{NodeHeader, NodeType};

#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct InternalHeader {
    node: NodeHeader,
    num_keys: U32<LittleEndian>,
    right_child: U32<LittleEndian>,
}

const _: () = assert!(size_of::<InternalHeader>() == INTERNAL_NODE_HEADER_SIZE);

fn cell_offset(cell: u32) -> usize {
    INTERNAL_NODE_HEADER_SIZE + cell as usize * INTERNAL_NODE_CELL_SIZE
}

fn key_offset(cell: u32) -> usize {
    cell_offset(cell) + INTERNAL_NODE_CHILD_SIZE
}

#[derive(Debug)]
pub struct InternalNode<'a> {
    data: &'a [u8],
}

impl<'a> InternalNode<'a> {
    pub fn from_page(data: &'a [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        let header = NodeHeader::from_page(data)?;
        ensure!(
            header.node_type()? == NodeType::Internal,
            "expected internal page, got {:?}",
            header.node_type()?
        );
        Ok(Self { data })
    }

    fn header(&self) -> &InternalHeader {
        InternalHeader::ref_from_bytes(&self.data[..INTERNAL_NODE_HEADER_SIZE]).unwrap()
    }

    pub fn num_keys(&self) -> u32 {
        self.header().num_keys.get()
    }

    /// The raw right-child slot, which may still hold the uninitialized
    /// sentinel. Use [`child_at`](Self::child_at) for validated access.
    pub fn right_child(&self) -> u32 {
        self.header().right_child.get()
    }

    pub fn parent(&self) -> u32 {
        self.header().node.parent()
    }

    pub fn is_root(&self) -> bool {
        self.header().node.is_root()
    }

    fn key(&self, cell: u32) -> u32 {
        let offset = key_offset(cell);
        let mut bytes = [0u8; INTERNAL_NODE_KEY_SIZE];
        bytes.copy_from_slice(&self.data[offset..offset + INTERNAL_NODE_KEY_SIZE]);
        u32::from_le_bytes(bytes)
    }

    pub fn key_at(&self, index: u32) -> Result<u32> {
        ensure!(
            index < self.num_keys(),
            "key index {} out of bounds (num_keys={})",
            index,
            self.num_keys()
        );
        Ok(self.key(index))
    }

    /// Child `index`, where `index == num_keys` names the right child.
    pub fn child_at(&self, index: u32) -> Result<u32> {
        let num_keys = self.num_keys();
        ensure!(
            index <= num_keys,
            "tried to access child {} of a node with {} keys",
            index,
            num_keys
        );

        let child = if index == num_keys {
            self.right_child()
        } else {
            let offset = cell_offset(index);
            let mut bytes = [0u8; INTERNAL_NODE_CHILD_SIZE];
            bytes.copy_from_slice(&self.data[offset..offset + INTERNAL_NODE_CHILD_SIZE]);
            u32::from_le_bytes(bytes)
        };
        ensure!(
            child != INVALID_PAGE_NUM,
            "child {} holds the invalid page number sentinel",
            index
        );
        Ok(child)
    }

    /// Binary search over the separators: the smallest index whose key is
    /// `>= key`, possibly `num_keys` (the right child).
    pub fn find_child(&self, key: u32) -> u32 {
        let mut min = 0;
        let mut max = self.num_keys();
        while min != max {
            let mid = (max - min) / 2 + min;
            if self.key(mid) >= key {
                max = mid;
            } else {
                min = mid + 1;
            }
        }
        min
    }
}

pub struct InternalNodeMut<'a> {
    data: &'a mut [u8],
}

impl<'a> InternalNodeMut<'a> {
    /// Stamp a fresh, empty internal node onto a page. The right child
    /// starts as the invalid sentinel, which is how the insert path
    /// recognizes an empty node.
    pub fn init(data: &'a mut [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        {
            let header =
                InternalHeader::mut_from_bytes(&mut data[..INTERNAL_NODE_HEADER_SIZE]).unwrap();
            header.node.set_node_type(NodeType::Internal);
            header.node.set_root(false);
            header.node.set_parent(0);
            header.num_keys.set(0);
            header.right_child.set(INVALID_PAGE_NUM);
        }
        Ok(Self { data })
    }

    pub fn from_page(data: &'a mut [u8]) -> Result<Self> {
        InternalNode::from_page(data)?;
        Ok(Self { data })
    }

    pub fn as_read(&self) -> InternalNode<'_> {
        InternalNode { data: &*self.data }
    }

    fn header_mut(&mut self) -> &mut InternalHeader {
        InternalHeader::mut_from_bytes(&mut self.data[..INTERNAL_NODE_HEADER_SIZE]).unwrap()
    }

    pub fn num_keys(&self) -> u32 {
        self.as_read().num_keys()
    }

    pub fn right_child(&self) -> u32 {
        self.as_read().right_child()
    }

    pub fn parent(&self) -> u32 {
        self.as_read().parent()
    }

    pub fn is_root(&self) -> bool {
        self.as_read().is_root()
    }

    pub fn find_child(&self, key: u32) -> u32 {
        self.as_read().find_child(key)
    }

    pub fn set_num_keys(&mut self, num_keys: u32) {
        self.header_mut().num_keys.set(num_keys);
    }

    pub fn set_right_child(&mut self, page_num: u32) {
        self.header_mut().right_child.set(page_num);
    }

    pub fn set_parent(&mut self, page_num: u32) {
        self.header_mut().node.set_parent(page_num);
    }

    pub fn set_root(&mut self, is_root: bool) {
        self.header_mut().node.set_root(is_root);
    }

    /// Write a `(child, key)` cell. Checked against the body capacity, not
    /// `num_keys`: inserts stage cells around count updates.
    pub fn set_cell(&mut self, index: u32, child: u32, key: u32) -> Result<()> {
        ensure!(
            (index as usize) < INTERNAL_NODE_MAX_KEYS,
            "cell index {} exceeds internal capacity {}",
            index,
            INTERNAL_NODE_MAX_KEYS
        );
        let offset = cell_offset(index);
        self.data[offset..offset + INTERNAL_NODE_CHILD_SIZE]
            .copy_from_slice(&child.to_le_bytes());
        self.data[key_offset(index)..key_offset(index) + INTERNAL_NODE_KEY_SIZE]
            .copy_from_slice(&key.to_le_bytes());
        Ok(())
    }

    pub fn set_key(&mut self, index: u32, key: u32) -> Result<()> {
        ensure!(
            (index as usize) < INTERNAL_NODE_MAX_KEYS,
            "key index {} exceeds internal capacity {}",
            index,
            INTERNAL_NODE_MAX_KEYS
        );
        self.data[key_offset(index)..key_offset(index) + INTERNAL_NODE_KEY_SIZE]
            .copy_from_slice(&key.to_le_bytes());
        Ok(())
    }

    /// Move one `(child, key)` cell within this page.
    pub fn copy_cell(&mut self, src: u32, dst: u32) -> Result<()> {
        ensure!(
            (src as usize) < INTERNAL_NODE_MAX_KEYS && (dst as usize) < INTERNAL_NODE_MAX_KEYS,
            "cell copy {} -> {} exceeds internal capacity {}",
            src,
            dst,
            INTERNAL_NODE_MAX_KEYS
        );
        let src_offset = cell_offset(src);
        self.data.copy_within(
            src_offset..src_offset + INTERNAL_NODE_CELL_SIZE,
            cell_offset(dst),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn internal_page() -> [u8; PAGE_SIZE] {
        let mut data = [0u8; PAGE_SIZE];
        InternalNodeMut::init(&mut data).unwrap();
        data
    }

    #[test]
    fn init_marks_the_right_child_invalid() {
        let data = internal_page();
        let node = InternalNode::from_page(&data).unwrap();

        assert_eq!(node.num_keys(), 0);
        assert_eq!(node.right_child(), INVALID_PAGE_NUM);
        assert!(node.child_at(0).is_err());
    }

    #[test]
    fn from_page_rejects_leaf_nodes() {
        let mut data = [0u8; PAGE_SIZE];
        data[0] = 1;
        assert!(InternalNode::from_page(&data).is_err());
    }

    #[test]
    fn child_at_aliases_the_right_child_slot() {
        let mut data = internal_page();
        {
            let mut node = InternalNodeMut::from_page(&mut data).unwrap();
            node.set_cell(0, 2, 7).unwrap();
            node.set_num_keys(1);
            node.set_right_child(1);
        }

        let node = InternalNode::from_page(&data).unwrap();
        assert_eq!(node.child_at(0).unwrap(), 2);
        assert_eq!(node.child_at(1).unwrap(), 1);
        assert_eq!(node.key_at(0).unwrap(), 7);
    }

    #[test]
    fn child_at_past_num_keys_fails() {
        let mut data = internal_page();
        {
            let mut node = InternalNodeMut::from_page(&mut data).unwrap();
            node.set_cell(0, 2, 7).unwrap();
            node.set_num_keys(1);
            node.set_right_child(1);
        }

        let node = InternalNode::from_page(&data).unwrap();
        assert!(node.child_at(2).is_err());
        assert!(node.key_at(1).is_err());
    }

    #[test]
    fn find_child_picks_the_covering_subtree() {
        let mut data = internal_page();
        {
            let mut node = InternalNodeMut::from_page(&mut data).unwrap();
            node.set_cell(0, 2, 7).unwrap();
            node.set_cell(1, 3, 15).unwrap();
            node.set_num_keys(2);
            node.set_right_child(1);
        }

        let node = InternalNode::from_page(&data).unwrap();
        assert_eq!(node.find_child(1), 0);
        assert_eq!(node.find_child(7), 0);
        assert_eq!(node.find_child(8), 1);
        assert_eq!(node.find_child(15), 1);
        assert_eq!(node.find_child(16), 2);
    }

    #[test]
    fn cell_writes_are_capacity_checked() {
        let mut data = internal_page();
        let mut node = InternalNodeMut::from_page(&mut data).unwrap();

        assert!(node
            .set_cell(INTERNAL_NODE_MAX_KEYS as u32, 1, 1)
            .is_err());
        assert!(node.set_key(INTERNAL_NODE_MAX_KEYS as u32, 1).is_err());
    }

    #[test]
    fn copy_cell_moves_child_and_key() {
        let mut data = internal_page();
        {
            let mut node = InternalNodeMut::from_page(&mut data).unwrap();
            node.set_cell(0, 5, 9).unwrap();
            node.copy_cell(0, 2).unwrap();
            node.set_num_keys(3);
            node.set_right_child(1);
        }

        let node = InternalNode::from_page(&data).unwrap();
        assert_eq!(node.child_at(2).unwrap(), 5);
        assert_eq!(node.key_at(2).unwrap(), 9);
    }
}
