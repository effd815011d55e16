//! Thread identity, metadata, and download task derivation.

pub mod models;
pub mod state;
pub mod url;

pub use models::{Post, ThreadResponse};
pub use state::{DownloadTask, ThreadState, ThreadStatus};
pub use url::{parse_thread_url, ThreadUrl};
