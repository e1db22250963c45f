//! # Node Type and Common Header
//!
//! Every 4096-byte page holds exactly one B+ tree node, and every node
//! begins with the same 6-byte header:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----------------------------------------
//! 0       1     node type (0 = internal, 1 = leaf)
//! 1       1     is-root flag (0/1)
//! 2       4     parent page number (little-endian)
//! ```
//!
//! The header is overlaid on page bytes with `zerocopy`, so reads and
//! writes go straight through the page buffer without copying. The fields
//! sit at odd offsets, hence the `Unaligned` byte-order types.

use eyre::{bail, ensure, Result};
use std::mem::size_of;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::COMMON_NODE_HEADER_SIZE;

/// Discriminates the two node kinds stored in a page.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Internal = 0,
    Leaf = 1,
}

impl NodeType {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(NodeType::Internal),
            1 => Ok(NodeType::Leaf),
            _ => bail!("invalid node type byte: {:#04x}", b),
        }
    }
}

/// The header shared by leaf and internal nodes.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct NodeHeader {
    node_type: u8,
    is_root: u8,
    parent: U32<LittleEndian>,
}

impl NodeHeader {
    pub fn from_page(data: &[u8]) -> Result<&Self> {
        ensure!(
            data.len() >= size_of::<Self>(),
            "buffer too small for NodeHeader: {} < {}",
            data.len(),
            size_of::<Self>()
        );

        Self::ref_from_bytes(&data[..size_of::<Self>()])
            .map_err(|e| eyre::eyre!("failed to read NodeHeader: {:?}", e))
    }

    pub fn from_page_mut(data: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            data.len() >= size_of::<Self>(),
            "buffer too small for NodeHeader: {} < {}",
            data.len(),
            size_of::<Self>()
        );

        Self::mut_from_bytes(&mut data[..size_of::<Self>()])
            .map_err(|e| eyre::eyre!("failed to read NodeHeader: {:?}", e))
    }

    pub fn node_type(&self) -> Result<NodeType> {
        NodeType::from_byte(self.node_type)
    }

    pub fn set_node_type(&mut self, node_type: NodeType) {
        self.node_type = node_type as u8;
    }

    pub fn is_root(&self) -> bool {
        self.is_root == 1
    }

    pub fn set_root(&mut self, is_root: bool) {
        self.is_root = if is_root { 1 } else { 0 };
    }

    pub fn parent(&self) -> u32 {
        self.parent.get()
    }

    pub fn set_parent(&mut self, page_num: u32) {
        self.parent.set(page_num);
    }
}

const _: () = assert!(size_of::<NodeHeader>() == COMMON_NODE_HEADER_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_from_byte() {
        assert_eq!(NodeType::from_byte(0).unwrap(), NodeType::Internal);
        assert_eq!(NodeType::from_byte(1).unwrap(), NodeType::Leaf);
        assert!(NodeType::from_byte(2).is_err());
        assert!(NodeType::from_byte(0xFF).is_err());
    }

    #[test]
    fn header_overlays_first_six_bytes() {
        let mut data = [0u8; 64];
        data[0] = 1;
        data[1] = 1;
        data[2..6].copy_from_slice(&7u32.to_le_bytes());

        let header = NodeHeader::from_page(&data).unwrap();
        assert_eq!(header.node_type().unwrap(), NodeType::Leaf);
        assert!(header.is_root());
        assert_eq!(header.parent(), 7);
    }

    #[test]
    fn header_mutations_hit_page_bytes() {
        let mut data = [0u8; 64];

        {
            let header = NodeHeader::from_page_mut(&mut data).unwrap();
            header.set_node_type(NodeType::Leaf);
            header.set_root(true);
            header.set_parent(0x01020304);
        }

        assert_eq!(data[0], 1);
        assert_eq!(data[1], 1);
        assert_eq!(&data[2..6], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn header_from_short_buffer_fails() {
        let data = [0u8; 4];
        assert!(NodeHeader::from_page(&data).is_err());
    }
}
