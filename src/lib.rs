//! Imageboard thread archiver library.
//!
//! Fetches thread metadata, downloads every attached file with resumable
//! range requests over a reused connection, and optionally collects the URLs
//! posted in the thread into a link file.

pub mod archive;
pub mod config;
pub mod constants;
pub mod downloader;
pub mod error;
pub mod fs_utils;
pub mod links;
pub mod thread;

pub use error::{ArchiveError, Result};
