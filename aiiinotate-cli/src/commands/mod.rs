//! Subcommand implementations.

pub mod import;
pub mod migrate;
