//! Command-line interface for listing-history.

mod commands;
pub mod helpers;
pub mod progress;

pub use commands::{is_verbose, run};
