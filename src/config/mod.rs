//! Engine configuration.
//!
//! Everything layout-defining lives in [`constants`]; the rest of the crate
//! imports from here rather than defining sizes locally.

pub mod constants;

pub use constants::*;
