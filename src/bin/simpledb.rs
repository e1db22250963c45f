//! Shell entry point.
//!
//! ```bash
//! simpledb <database-file>
//! ```
//!
//! Opens (or creates) the database file and runs the interactive loop.
//! Statement-level errors are reported inside the loop; anything fatal
//! lands here and exits non-zero.

use eyre::{bail, Result, WrapErr};
use simpledb::cli::Repl;
use simpledb::Database;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let filename = match args.next() {
        Some(filename) => filename,
        None => bail!("must supply a database filename"),
    };

    let db = Database::open(&filename)
        .wrap_err_with(|| format!("failed to open database '{}'", filename))?;
    let mut repl = Repl::new(db)?;
    repl.run()
}
