//! Shared utilities

pub mod config;
pub mod fs;
pub mod hash;
pub mod interrupt;
pub mod output;
pub mod process;

pub use config::Config;
pub use hash::HashKind;
pub use interrupt::{Interrupt, Interrupted};
pub use output::{open_sink, OutputSink};
