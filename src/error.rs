//! Statement-level error types.
//!
//! These are the errors a shell session survives: the loop reports them and
//! keeps reading input. Everything else (I/O failures, violated structural
//! invariants) travels as a plain `eyre` report and is fatal. The shell
//! tells the two apart by downcasting.

use thiserror::Error;

/// Errors from executing a well-formed statement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecError {
    #[error("duplicate key")]
    DuplicateKey,
    #[error("key {0} does not exist")]
    KeyNotFound(u32),
    #[error("table full")]
    TableFull,
}

/// Errors from turning an input line into a statement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("string is too long")]
    StringTooLong,
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("expected {expected} arguments for {statement}, but got {got}")]
    WrongArgumentCount {
        statement: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("unknown statement: {0}")]
    UnknownStatement(String),
}
