//! CLI command implementations.

pub mod list;
pub mod prune;
pub mod write;
