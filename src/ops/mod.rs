//! High-level operations.
//!
//! This module contains the implementation of HuruDist commands and the
//! stages they are built from.

pub mod hurudist_merge;
pub mod hurudist_package;
pub mod merge;
pub mod reduce;
pub mod workers;

pub use hurudist_merge::{merge, MergeOptions, MergeReport};
pub use hurudist_package::{package, AgeSelection, PackageOptions, PackageReport};
pub use merge::{merge_fragment, merge_fragments};
pub use reduce::{reduce_manifests, reduce_records, Reduction, SanityError};
pub use workers::{StageSummary, WorkerPool};
