//! Interactive shell: the prompt loop and the `.`-prefixed meta-commands.
//!
//! The shell is a thin, synchronous layer over [`crate::database`]: it
//! parses, dispatches, and prints. Engine correctness is tested at the
//! tree and facade layers; the shell itself is covered by process-level
//! transcript tests.

pub mod commands;
pub mod repl;

pub use repl::Repl;
