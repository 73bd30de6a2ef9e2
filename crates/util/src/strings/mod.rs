//! String utilities.

mod escape;

pub use escape::{escape, quote};
