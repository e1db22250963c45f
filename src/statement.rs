//! The command parser: one input line in, one typed statement out.
//!
//! Grammar, keywords case-insensitive:
//!
//! ```text
//! insert <id> <username> <email>
//! select
//! delete <id>
//! ```
//!
//! `id` must parse as an unsigned 32-bit integer; `username` and `email`
//! are capped at 32 and 255 bytes. Trailing tokens after a complete
//! `insert` are ignored, matching scanf-style parsing.

use crate::error::ParseError;
use crate::row::Row;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert { row: Row },
    Select,
    Delete { key: u32 },
}

impl Statement {
    pub fn parse(input: &str) -> Result<Statement, ParseError> {
        let mut parts = parts(input);
        let keyword = parts.next().unwrap_or("");

        if keyword.eq_ignore_ascii_case("insert") {
            let args: Vec<&str> = parts.by_ref().take(3).collect();
            if args.len() < 3 {
                return Err(ParseError::WrongArgumentCount {
                    statement: "insert",
                    expected: 3,
                    got: args.len(),
                });
            }
            let id = parse_id(args[0])?;
            let row = Row::new(id, args[1], args[2])?;
            return Ok(Statement::Insert { row });
        }

        if keyword.eq_ignore_ascii_case("select") && parts.next().is_none() {
            return Ok(Statement::Select);
        }

        if keyword.eq_ignore_ascii_case("delete") {
            let args: Vec<&str> = parts.collect();
            if args.len() != 1 {
                return Err(ParseError::WrongArgumentCount {
                    statement: "delete",
                    expected: 1,
                    got: args.len(),
                });
            }
            return Ok(Statement::Delete {
                key: parse_id(args[0])?,
            });
        }

        Err(ParseError::UnknownStatement(input.trim().to_string()))
    }
}

fn parts(input: &str) -> impl Iterator<Item = &str> {
    input.split_whitespace()
}

fn parse_id(token: &str) -> Result<u32, ParseError> {
    token
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidId(token.to_string()))
}
