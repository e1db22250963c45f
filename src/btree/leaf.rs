//! # B+ Tree Leaf Node
//!
//! Leaf nodes hold the actual rows. After the 14-byte header the body is a
//! packed array of fixed-size cells, each a 4-byte little-endian key
//! followed by a 291-byte serialized row:
//!
//! ```text
//! +------------------------+
//! | Common header (6B)     |
//! | num_cells (4B)         |
//! | next_leaf (4B)         |
//! +------------------------+
//! | Cell 0: key | row      |  295 bytes
//! | Cell 1: key | row      |
//! | ...        (max 13)    |
//! +------------------------+
//! ```
//!
//! Keys are strictly increasing by cell index. Leaves are chained
//! left-to-right through `next_leaf` (0 = rightmost), which lets a full
//! scan walk the bottom of the tree without touching internal nodes.
//!
//! [`LeafNode`] borrows a page for reading, [`LeafNodeMut`] for writing;
//! both validate the node-type byte on construction so a page can never be
//! misread as the wrong node kind.

use std::mem::size_of;

use eyre::{ensure, Result};
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{
    LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE, LEAF_NODE_KEY_SIZE, LEAF_NODE_MAX_CELLS,
    PAGE_SIZE, ROW_SIZE,
};
use crate::row::Row;
use crate::storage::page::{NodeHeader, NodeType};

#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct LeafHeader {
    node: NodeHeader,
    num_cells: U32<LittleEndian>,
    next_leaf: U32<LittleEndian>,
}

const _: () = assert!(size_of::<LeafHeader>() == LEAF_NODE_HEADER_SIZE);

fn cell_offset(cell: u32) -> usize {
    LEAF_NODE_HEADER_SIZE + cell as usize * LEAF_NODE_CELL_SIZE
}

fn value_offset(cell: u32) -> usize {
    cell_offset(cell) + LEAF_NODE_KEY_SIZE
}

#[derive(Debug)]
pub struct LeafNode<'a> {
    data: &'a [u8],
}

impl<'a> LeafNode<'a> {
    pub fn from_page(data: &'a [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        let header = NodeHeader::from_page(data)?;
        ensure!(
            header.node_type()? == NodeType::Leaf,
            "expected leaf page, got {:?}",
            header.node_type()?
        );
        Ok(Self { data })
    }

    fn header(&self) -> &LeafHeader {
        LeafHeader::ref_from_bytes(&self.data[..LEAF_NODE_HEADER_SIZE]).unwrap()
    }

    pub fn num_cells(&self) -> u32 {
        self.header().num_cells.get()
    }

    pub fn next_leaf(&self) -> u32 {
        self.header().next_leaf.get()
    }

    pub fn parent(&self) -> u32 {
        self.header().node.parent()
    }

    pub fn is_root(&self) -> bool {
        self.header().node.is_root()
    }

    fn key(&self, cell: u32) -> u32 {
        let offset = cell_offset(cell);
        let mut bytes = [0u8; LEAF_NODE_KEY_SIZE];
        bytes.copy_from_slice(&self.data[offset..offset + LEAF_NODE_KEY_SIZE]);
        u32::from_le_bytes(bytes)
    }

    pub fn key_at(&self, cell: u32) -> Result<u32> {
        ensure!(
            cell < self.num_cells(),
            "cell index {} out of bounds (num_cells={})",
            cell,
            self.num_cells()
        );
        Ok(self.key(cell))
    }

    pub fn value_at(&self, cell: u32) -> Result<&'a [u8]> {
        ensure!(
            cell < self.num_cells(),
            "cell index {} out of bounds (num_cells={})",
            cell,
            self.num_cells()
        );
        let offset = value_offset(cell);
        Ok(&self.data[offset..offset + ROW_SIZE])
    }

    /// Raw key + value bytes of one cell, for moving cells between pages.
    pub fn cell_bytes(&self, cell: u32) -> Result<&'a [u8]> {
        ensure!(
            cell < self.num_cells(),
            "cell index {} out of bounds (num_cells={})",
            cell,
            self.num_cells()
        );
        let offset = cell_offset(cell);
        Ok(&self.data[offset..offset + LEAF_NODE_CELL_SIZE])
    }

    /// Binary search for `key`. Returns the index of the matching cell, or
    /// of the first cell whose key is greater (possibly `num_cells`).
    pub fn search(&self, key: u32) -> u32 {
        let mut min = 0;
        let mut one_past_max = self.num_cells();
        while one_past_max != min {
            let mid = (one_past_max - min) / 2 + min;
            let key_at_mid = self.key(mid);
            if key == key_at_mid {
                return mid;
            }
            if key < key_at_mid {
                one_past_max = mid;
            } else {
                min = mid + 1;
            }
        }
        min
    }
}

pub struct LeafNodeMut<'a> {
    data: &'a mut [u8],
}

impl<'a> LeafNodeMut<'a> {
    /// Stamp a fresh, empty leaf onto a page.
    pub fn init(data: &'a mut [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        {
            let header =
                LeafHeader::mut_from_bytes(&mut data[..LEAF_NODE_HEADER_SIZE]).unwrap();
            header.node.set_node_type(NodeType::Leaf);
            header.node.set_root(false);
            header.node.set_parent(0);
            header.num_cells.set(0);
            header.next_leaf.set(0);
        }
        Ok(Self { data })
    }

    pub fn from_page(data: &'a mut [u8]) -> Result<Self> {
        LeafNode::from_page(data)?;
        Ok(Self { data })
    }

    pub fn as_read(&self) -> LeafNode<'_> {
        LeafNode { data: &*self.data }
    }

    fn header_mut(&mut self) -> &mut LeafHeader {
        LeafHeader::mut_from_bytes(&mut self.data[..LEAF_NODE_HEADER_SIZE]).unwrap()
    }

    pub fn num_cells(&self) -> u32 {
        self.as_read().num_cells()
    }

    pub fn next_leaf(&self) -> u32 {
        self.as_read().next_leaf()
    }

    pub fn parent(&self) -> u32 {
        self.as_read().parent()
    }

    pub fn is_root(&self) -> bool {
        self.as_read().is_root()
    }

    pub fn set_num_cells(&mut self, num_cells: u32) {
        self.header_mut().num_cells.set(num_cells);
    }

    pub fn set_next_leaf(&mut self, page_num: u32) {
        self.header_mut().next_leaf.set(page_num);
    }

    pub fn set_parent(&mut self, page_num: u32) {
        self.header_mut().node.set_parent(page_num);
    }

    pub fn set_root(&mut self, is_root: bool) {
        self.header_mut().node.set_root(is_root);
    }

    /// Write a key and serialized row into cell `cell`. The index is
    /// checked against the page's capacity, not `num_cells`: inserts stage
    /// the new cell before bumping the count.
    pub fn write_cell(&mut self, cell: u32, key: u32, row: &Row) -> Result<()> {
        ensure!(
            (cell as usize) < LEAF_NODE_MAX_CELLS,
            "cell index {} exceeds leaf capacity {}",
            cell,
            LEAF_NODE_MAX_CELLS
        );
        let offset = cell_offset(cell);
        self.data[offset..offset + LEAF_NODE_KEY_SIZE].copy_from_slice(&key.to_le_bytes());
        row.write_to(&mut self.data[value_offset(cell)..value_offset(cell) + ROW_SIZE]);
        Ok(())
    }

    /// Move one cell within this page.
    pub fn copy_cell(&mut self, src: u32, dst: u32) -> Result<()> {
        ensure!(
            (src as usize) < LEAF_NODE_MAX_CELLS && (dst as usize) < LEAF_NODE_MAX_CELLS,
            "cell copy {} -> {} exceeds leaf capacity {}",
            src,
            dst,
            LEAF_NODE_MAX_CELLS
        );
        let src_offset = cell_offset(src);
        self.data
            .copy_within(src_offset..src_offset + LEAF_NODE_CELL_SIZE, cell_offset(dst));
        Ok(())
    }

    /// Copy one cell out of another leaf into this page.
    pub fn copy_cell_from(&mut self, src: &LeafNode<'_>, src_cell: u32, dst: u32) -> Result<()> {
        ensure!(
            (dst as usize) < LEAF_NODE_MAX_CELLS,
            "cell index {} exceeds leaf capacity {}",
            dst,
            LEAF_NODE_MAX_CELLS
        );
        let offset = cell_offset(dst);
        self.data[offset..offset + LEAF_NODE_CELL_SIZE]
            .copy_from_slice(src.cell_bytes(src_cell)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_page() -> [u8; PAGE_SIZE] {
        let mut data = [0u8; PAGE_SIZE];
        LeafNodeMut::init(&mut data).unwrap();
        data
    }

    fn row(id: u32) -> Row {
        Row::new(id, &format!("user{id}"), &format!("person{id}@example.com")).unwrap()
    }

    #[test]
    fn init_writes_an_empty_leaf_header() {
        let data = leaf_page();
        let leaf = LeafNode::from_page(&data).unwrap();

        assert_eq!(leaf.num_cells(), 0);
        assert_eq!(leaf.next_leaf(), 0);
        assert_eq!(leaf.parent(), 0);
        assert!(!leaf.is_root());
    }

    #[test]
    fn from_page_rejects_internal_nodes() {
        let mut data = [0u8; PAGE_SIZE];
        // node type byte 0 = internal
        assert!(LeafNode::from_page(&data).is_err());
        assert!(LeafNodeMut::from_page(&mut data).is_err());
    }

    #[test]
    fn cells_round_trip() {
        let mut data = leaf_page();
        {
            let mut leaf = LeafNodeMut::from_page(&mut data).unwrap();
            leaf.write_cell(0, 3, &row(3)).unwrap();
            leaf.write_cell(1, 8, &row(8)).unwrap();
            leaf.set_num_cells(2);
        }

        let leaf = LeafNode::from_page(&data).unwrap();
        assert_eq!(leaf.key_at(0).unwrap(), 3);
        assert_eq!(leaf.key_at(1).unwrap(), 8);
        assert_eq!(Row::read_from(leaf.value_at(1).unwrap()), row(8));
        assert!(leaf.key_at(2).is_err());
    }

    #[test]
    fn write_cell_rejects_out_of_capacity_index() {
        let mut data = leaf_page();
        let mut leaf = LeafNodeMut::from_page(&mut data).unwrap();

        assert!(leaf
            .write_cell(LEAF_NODE_MAX_CELLS as u32, 1, &row(1))
            .is_err());
    }

    #[test]
    fn copy_cell_moves_key_and_value() {
        let mut data = leaf_page();
        {
            let mut leaf = LeafNodeMut::from_page(&mut data).unwrap();
            leaf.write_cell(0, 5, &row(5)).unwrap();
            leaf.copy_cell(0, 1).unwrap();
            leaf.set_num_cells(2);
        }

        let leaf = LeafNode::from_page(&data).unwrap();
        assert_eq!(leaf.key_at(1).unwrap(), 5);
        assert_eq!(Row::read_from(leaf.value_at(1).unwrap()), row(5));
    }

    #[test]
    fn search_finds_existing_and_insertion_points() {
        let mut data = leaf_page();
        {
            let mut leaf = LeafNodeMut::from_page(&mut data).unwrap();
            for (cell, key) in [2u32, 4, 6, 8].iter().enumerate() {
                leaf.write_cell(cell as u32, *key, &row(*key)).unwrap();
            }
            leaf.set_num_cells(4);
        }

        let leaf = LeafNode::from_page(&data).unwrap();
        assert_eq!(leaf.search(4), 1);
        assert_eq!(leaf.search(1), 0);
        assert_eq!(leaf.search(5), 2);
        assert_eq!(leaf.search(9), 4);
    }

    #[test]
    fn a_full_leaf_fits_exactly() {
        let mut data = leaf_page();
        let mut leaf = LeafNodeMut::from_page(&mut data).unwrap();
        for cell in 0..LEAF_NODE_MAX_CELLS as u32 {
            leaf.write_cell(cell, cell, &row(cell)).unwrap();
        }
        leaf.set_num_cells(LEAF_NODE_MAX_CELLS as u32);

        assert_eq!(leaf.num_cells(), 13);
    }
}
