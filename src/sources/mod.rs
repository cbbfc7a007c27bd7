//! Content sources.
//!
//! Everything that reads the client content tree lives here: the layout of
//! the tree, world descriptors, page references and client binaries.

pub mod age;
pub mod client;
pub mod crypt;
pub mod layout;
pub mod page;

pub use age::{AgeError, AgeInfo, PageInfo};
pub use client::{client_artifacts, engine_scripts, intro_videos, CLIENT_PACKAGE};
pub use layout::{ContentLayout, LayoutError};
pub use page::{scan_page, ExternalPageReader, PageReader};
