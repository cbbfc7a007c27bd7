//! Command implementations

pub mod completions;
pub mod merge;
pub mod package;
