//! # Engine Facade
//!
//! [`Database`] owns the pager and executes parsed statements against the
//! B+ tree. Opening bootstraps an empty database by stamping page 0 as an
//! empty leaf root; closing flushes every cached page back to the file.
//!
//! The facade is where statement-level policy lives: duplicate-key
//! rejection on insert, and the `key does not exist` check on delete. Row
//! data flows back out through [`ExecuteResult`] so the shell decides how
//! to print.

use std::path::Path;

use eyre::Result;

use crate::btree::{BTree, LeafNodeMut};
use crate::config::ROOT_PAGE_NUM;
use crate::error::ExecError;
use crate::row::Row;
use crate::statement::Statement;
use crate::storage::pager::{PageNum, Pager};

#[derive(Debug, PartialEq, Eq)]
pub enum ExecuteResult {
    Inserted,
    Rows(Vec<Row>),
    Deleted,
}

pub struct Database {
    pager: Pager,
    root_page_num: PageNum,
}

impl Database {
    /// Open a database file, creating and bootstrapping it if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut pager = Pager::open(path)?;
        if pager.num_pages() == 0 {
            // New database: page 0 becomes an empty leaf root.
            let mut root = LeafNodeMut::init(pager.page_mut(ROOT_PAGE_NUM)?)?;
            root.set_root(true);
        }
        Ok(Self {
            pager,
            root_page_num: ROOT_PAGE_NUM,
        })
    }

    /// Flush all cached pages. Call once on clean shutdown.
    pub fn close(&mut self) -> Result<()> {
        self.pager.close()
    }

    pub fn execute(&mut self, statement: Statement) -> Result<ExecuteResult> {
        match statement {
            Statement::Insert { row } => self.execute_insert(row),
            Statement::Select => self.execute_select(),
            Statement::Delete { key } => self.execute_delete(key),
        }
    }

    fn execute_insert(&mut self, row: Row) -> Result<ExecuteResult> {
        let key = row.id;
        let mut tree = BTree::new(&mut self.pager, self.root_page_num);
        let cursor = tree.find(key)?;
        if tree.leaf_key_at(&cursor)? == Some(key) {
            return Err(ExecError::DuplicateKey.into());
        }
        tree.insert(&cursor, key, &row)?;
        Ok(ExecuteResult::Inserted)
    }

    fn execute_select(&mut self) -> Result<ExecuteResult> {
        let mut tree = BTree::new(&mut self.pager, self.root_page_num);
        let mut cursor = tree.start()?;
        let mut rows = Vec::new();
        while !cursor.end_of_table {
            rows.push(tree.row_at(&cursor)?);
            tree.advance(&mut cursor)?;
        }
        Ok(ExecuteResult::Rows(rows))
    }

    fn execute_delete(&mut self, key: u32) -> Result<ExecuteResult> {
        BTree::new(&mut self.pager, self.root_page_num).delete(key)?;
        Ok(ExecuteResult::Deleted)
    }

    /// Structural dump of the tree for the `.btree` meta-command.
    pub fn format_tree(&mut self) -> Result<String> {
        BTree::new(&mut self.pager, self.root_page_num).format()
    }
}
