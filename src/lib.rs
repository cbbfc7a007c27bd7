//! HuruDist - asset packaging for a modular virtual-world client
//!
//! This crate provides the core library functionality for HuruDist,
//! including page scanning, dependency closure, manifest reduction and
//! package output.

pub mod core;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod util;

pub use crate::core::{AssetCategory, AssetKey, AssetRecord, Bundle, Dataset, Distribute, Manifest};
pub use util::interrupt::{Interrupt, Interrupted};
