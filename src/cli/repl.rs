//! # Shell Loop
//!
//! The interactive read-eval-print loop. Each iteration prints the
//! `simpleDB> ` prompt, reads one line, and dispatches it:
//!
//! - lines starting with `.` go to the meta-command handler
//! - anything else is parsed as a statement and executed
//!
//! Parse errors print as `Error: <msg>.` and execution errors as
//! `Error: <msg>`; both leave the session running. Anything that is not a
//! statement-level error (an I/O failure, a broken structural invariant)
//! propagates out and terminates the process.
//!
//! rustyline supplies history and line editing on a terminal. On a piped
//! stdin it falls back to direct reads with the prompt written to stdout,
//! so scripted sessions produce the same transcript an interactive one
//! would.

use eyre::{Result, WrapErr};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::cli::commands::{CommandHandler, CommandResult};
use crate::database::{Database, ExecuteResult};
use crate::error::ExecError;
use crate::statement::Statement;

const PROMPT: &str = "simpleDB> ";

pub struct Repl {
    db: Database,
    editor: DefaultEditor,
}

impl Repl {
    pub fn new(db: Database) -> Result<Self> {
        let editor = DefaultEditor::new().wrap_err("failed to initialize line editor")?;
        Ok(Self { db, editor })
    }

    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    if !self.handle_line(&line)? {
                        break;
                    }
                }
                // EOF or ^C: shut down as cleanly as `.exit` would.
                Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
                Err(err) => return Err(err).wrap_err("failed to read input"),
            }
        }
        self.db.close()
    }

    /// Returns `false` when the session should end.
    fn handle_line(&mut self, line: &str) -> Result<bool> {
        let input = line.trim();
        if input.is_empty() {
            return Ok(true);
        }
        self.editor.add_history_entry(input).ok();

        if CommandHandler::is_command(input) {
            return match CommandHandler::execute(input, &mut self.db)? {
                CommandResult::Exit => Ok(false),
                CommandResult::Output(text) => {
                    println!("{}", text);
                    Ok(true)
                }
                CommandResult::Continue => Ok(true),
            };
        }

        match Statement::parse(input) {
            Err(err) => println!("Error: {}.", err),
            Ok(statement) => match self.db.execute(statement) {
                Ok(ExecuteResult::Rows(rows)) => {
                    for row in &rows {
                        println!("{}", row);
                    }
                    println!("Executed.");
                }
                Ok(_) => println!("Executed."),
                Err(err) => {
                    if err.downcast_ref::<ExecError>().is_some() {
                        println!("Error: {}", err);
                    } else {
                        return Err(err);
                    }
                }
            },
        }
        Ok(true)
    }
}
