//! # simpledb - a single-file B+ tree storage engine
//!
//! One file, one table, one fixed row type: `(id: u32, username: [u8; 32],
//! email: [u8; 255])`, keyed by id and stored in a disk-resident B+ tree.
//! A small interactive shell (`simpledb <file>`) drives it with `insert`,
//! `select`, `delete`, and a handful of `.` meta-commands.
//!
//! ## Architecture
//!
//! ```text
//! +------------------------------------+
//! |        Shell (cli::Repl)           |
//! +------------------------------------+
//! |   Parser (statement::Statement)    |
//! +------------------------------------+
//! |   Engine facade (database)         |
//! +------------------------------------+
//! |   Tree algorithms (btree::tree)    |
//! |   Node accessors (leaf, interior)  |
//! +------------------------------------+
//! |   Pager (storage::pager)           |
//! +------------------------------------+
//! |   One file of 4096-byte pages      |
//! +------------------------------------+
//! ```
//!
//! Everything is single-threaded and synchronous: one statement runs to
//! completion before the shell reads the next line, and all page borrows
//! end when the statement does.
//!
//! ## Module overview
//!
//! - [`config`]: on-disk layout constants with compile-time guards
//! - [`storage`]: node headers and the page cache over the backing file
//! - [`btree`]: leaf/internal accessors and the tree algorithms
//! - [`row`]: the fixed-width record and its 291-byte serialization
//! - [`statement`]: text line -> typed statement
//! - [`database`]: open/close and statement execution
//! - [`cli`]: the interactive shell and meta-commands

pub mod btree;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod row;
pub mod statement;
pub mod storage;

pub use database::{Database, ExecuteResult};
pub use error::{ExecError, ParseError};
pub use row::Row;
pub use statement::Statement;
