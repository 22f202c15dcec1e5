//! Keeps a local mirror of antivirus and repair tools up to date.
//!
//! Catalogue entries either point straight at a file or at a vendor page
//! that is crawled through a chain of CSS selectors until file links turn
//! up. Files are only transferred when the local copy is missing or its
//! size differs from what the server advertises.

pub mod archive;
pub mod catalogue;
pub mod cli;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod logging;
pub mod models;
pub mod naming;
pub mod pipeline;
pub mod resolver;

pub use config::{CategoryFilter, Config};
pub use downloader::{Downloader, FetchOutcome};
pub use error::{Error, Result};
pub use models::Descriptor;
pub use pipeline::{Pipeline, Summary};
