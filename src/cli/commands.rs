//! Meta-command handler.
//!
//! Any input line beginning with `.` is a meta-command rather than a
//! statement. Command names match case-insensitively; unknown commands
//! are echoed back with an `Unknown command:` prefix and the session
//! continues.

use std::process::Command;

use eyre::Result;

use crate::config::{
    COMMON_NODE_HEADER_SIZE, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE, LEAF_NODE_MAX_CELLS,
    LEAF_NODE_SPACE_FOR_CELLS, ROW_SIZE,
};
use crate::database::Database;

#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// Terminate the session (flushes and exits cleanly).
    Exit,
    /// Text to print before the next prompt.
    Output(String),
    /// The command did its work through a side effect.
    Continue,
}

pub struct CommandHandler;

impl CommandHandler {
    pub fn is_command(input: &str) -> bool {
        input.trim().starts_with('.')
    }

    pub fn execute(input: &str, db: &mut Database) -> Result<CommandResult> {
        let line = input.trim();
        let name = line.split_whitespace().next().unwrap_or("").to_lowercase();

        match name.as_str() {
            ".exit" => Ok(CommandResult::Exit),
            ".help" => Ok(CommandResult::Output(help_text())),
            ".clear" => {
                clear_screen();
                Ok(CommandResult::Continue)
            }
            ".btree" => Ok(CommandResult::Output(format!(
                "Tree:\n{}",
                db.format_tree()?
            ))),
            ".constants" => Ok(CommandResult::Output(constants_text())),
            _ => Ok(CommandResult::Output(format!("Unknown command: {}", line))),
        }
    }
}

fn help_text() -> String {
    "Welcome to simpleDB! These are the available commands:\n\
     .help       - Show available commands\n\
     .clear      - Clear the terminal screen\n\
     .btree      - Print the structure of the B+ tree\n\
     .constants  - Print the storage layout constants\n\
     .exit       - Close the database and exit"
        .to_string()
}

fn constants_text() -> String {
    format!(
        "Constants:\n\
         ROW_SIZE: {}\n\
         COMMON_NODE_HEADER_SIZE: {}\n\
         LEAF_NODE_HEADER_SIZE: {}\n\
         LEAF_NODE_CELL_SIZE: {}\n\
         LEAF_NODE_SPACE_FOR_CELLS: {}\n\
         LEAF_NODE_MAX_CELLS: {}",
        ROW_SIZE,
        COMMON_NODE_HEADER_SIZE,
        LEAF_NODE_HEADER_SIZE,
        LEAF_NODE_CELL_SIZE,
        LEAF_NODE_SPACE_FOR_CELLS,
        LEAF_NODE_MAX_CELLS
    )
}

fn clear_screen() {
    let _ = Command::new("clear").status();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_db(dir: &tempfile::TempDir) -> Database {
        Database::open(dir.path().join("test.db")).unwrap()
    }

    #[test]
    fn is_command_checks_the_dot_prefix() {
        assert!(CommandHandler::is_command(".exit"));
        assert!(CommandHandler::is_command("  .btree"));
        assert!(!CommandHandler::is_command("select"));
        assert!(!CommandHandler::is_command(""));
    }

    #[test]
    fn exit_terminates_the_session() {
        let dir = tempdir().unwrap();
        let mut db = open_db(&dir);

        assert_eq!(
            CommandHandler::execute(".exit", &mut db).unwrap(),
            CommandResult::Exit
        );
        assert_eq!(
            CommandHandler::execute(".EXIT", &mut db).unwrap(),
            CommandResult::Exit
        );
    }

    #[test]
    fn help_lists_every_command() {
        let dir = tempdir().unwrap();
        let mut db = open_db(&dir);

        let CommandResult::Output(text) = CommandHandler::execute(".help", &mut db).unwrap()
        else {
            panic!("expected output");
        };
        for name in [".help", ".clear", ".btree", ".constants", ".exit"] {
            assert!(text.contains(name), "help is missing {name}");
        }
    }

    #[test]
    fn constants_reports_the_leaf_geometry() {
        let dir = tempdir().unwrap();
        let mut db = open_db(&dir);

        let CommandResult::Output(text) =
            CommandHandler::execute(".constants", &mut db).unwrap()
        else {
            panic!("expected output");
        };
        assert!(text.starts_with("Constants:"));
        assert!(text.contains("ROW_SIZE: 291"));
        assert!(text.contains("LEAF_NODE_MAX_CELLS: 13"));
    }

    #[test]
    fn btree_prints_the_tree_header() {
        let dir = tempdir().unwrap();
        let mut db = open_db(&dir);

        let CommandResult::Output(text) = CommandHandler::execute(".btree", &mut db).unwrap()
        else {
            panic!("expected output");
        };
        assert_eq!(text, "Tree:\n- leaf (size 0)");
    }

    #[test]
    fn unknown_command_is_echoed() {
        let dir = tempdir().unwrap();
        let mut db = open_db(&dir);

        assert_eq!(
            CommandHandler::execute(".frobnicate", &mut db).unwrap(),
            CommandResult::Output("Unknown command: .frobnicate".to_string())
        );
    }
}
