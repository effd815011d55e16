//! Per-thread archiving state: identity, metadata refresh, and the derived
//! list of files to download.

use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::error::{ArchiveError, Result};
use crate::links;
use crate::thread::models::{Post, ThreadResponse};
use crate::thread::url::parse_thread_url;

/// Liveness of a thread as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadStatus {
    /// Not refreshed yet.
    #[default]
    Unknown,
    Alive,
    /// Metadata fetch returned 404. Never reverts.
    Dead,
}

/// A single file to fetch from the media host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Server-relative path, `/<board>/<tim><ext>`.
    pub remote_path: String,
    pub local_path: PathBuf,
    pub expected_size: Option<u64>,
}

/// One discussion thread being archived.
#[derive(Debug, Clone)]
pub struct ThreadState {
    board: String,
    thread_id: String,
    secure: bool,
    archive_dir: PathBuf,
    link_file: Option<PathBuf>,
    status: ThreadStatus,
    posts: Vec<Post>,
}

impl ThreadState {
    /// Build the state for `thread_url`, archiving under `download_dir`
    /// (or `download_dir/<threadId>` when `make_subdir` is set).
    ///
    /// No network I/O is performed.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::InvalidUrl`] if `thread_url` is not a thread URL.
    pub fn new(
        thread_url: &str,
        download_dir: &Path,
        make_subdir: bool,
        link_file: Option<PathBuf>,
    ) -> Result<Self> {
        let parsed = parse_thread_url(thread_url)?;

        let archive_dir = if make_subdir {
            download_dir.join(&parsed.thread_id)
        } else {
            download_dir.to_path_buf()
        };

        Ok(Self {
            board: parsed.board,
            thread_id: parsed.thread_id,
            secure: parsed.secure,
            archive_dir,
            link_file,
            status: ThreadStatus::Unknown,
            posts: Vec::new(),
        })
    }

    /// `(board, threadId)`, used to deduplicate inputs.
    #[must_use]
    pub fn identity(&self) -> (&str, &str) {
        (&self.board, &self.thread_id)
    }

    #[must_use]
    pub fn board(&self) -> &str {
        &self.board
    }

    #[must_use]
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    #[must_use]
    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    #[must_use]
    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.status == ThreadStatus::Dead
    }

    #[must_use]
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Metadata URL on `api_host`, using this thread's scheme.
    #[must_use]
    pub fn metadata_url(&self, api_host: &str) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!(
            "{scheme}://{api_host}/{}/thread/{}.json",
            self.board, self.thread_id
        )
    }

    /// Fetch the thread metadata and replace the post list.
    ///
    /// A 404 marks the thread dead and is not an error. Once dead, further
    /// calls return immediately.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, any other non-success status,
    /// or a malformed body.
    pub async fn refresh(&mut self, client: &reqwest::Client, api_host: &str) -> Result<()> {
        if self.is_dead() {
            debug!(board = %self.board, thread = %self.thread_id, "Thread already dead, not refreshing");
            return Ok(());
        }

        let url = self.metadata_url(api_host);
        debug!(board = %self.board, thread = %self.thread_id, url = %url, "Fetching thread JSON");

        let response = client.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            info!(board = %self.board, thread = %self.thread_id, "Thread 404'd");
            self.status = ThreadStatus::Dead;
            self.posts.clear();
            return Ok(());
        }
        if !status.is_success() {
            return Err(ArchiveError::HttpStatus { url, status });
        }

        let body = response.bytes().await?;
        let thread: ThreadResponse = serde_json::from_slice(&body)
            .map_err(|source| ArchiveError::Metadata { url: url.clone(), source })?;

        debug!(
            board = %self.board,
            thread = %self.thread_id,
            posts = thread.posts.len(),
            "Thread metadata refreshed"
        );
        self.posts = thread.posts;
        self.status = ThreadStatus::Alive;
        Ok(())
    }

    /// Files to download, in post order. Empty for a dead thread.
    #[must_use]
    pub fn download_tasks(&self) -> Vec<DownloadTask> {
        if self.is_dead() {
            info!(board = %self.board, thread = %self.thread_id, "Skipping dead thread");
            return Vec::new();
        }

        self.posts
            .iter()
            .filter(|post| post.has_file())
            .filter_map(|post| {
                let Some(filename) = post.filename() else {
                    warn!(
                        board = %self.board,
                        thread = %self.thread_id,
                        post = ?post.no,
                        "Post has a file but no timestamp id, skipping"
                    );
                    return None;
                };
                Some(DownloadTask {
                    remote_path: format!("/{}/{filename}", self.board),
                    local_path: self.archive_dir.join(&filename),
                    expected_size: post.fsize,
                })
            })
            .collect()
    }

    /// Merge every URL in the post bodies into the configured link file.
    ///
    /// Returns the number of URLs not previously present. Does nothing for a
    /// dead thread or when no link file is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the link file cannot be read or written.
    pub async fn scrape_links(&self) -> Result<usize> {
        let Some(link_file) = self.link_file.as_deref() else {
            return Ok(0);
        };
        if self.is_dead() {
            info!(board = %self.board, thread = %self.thread_id, "Not scraping links from dead thread");
            return Ok(0);
        }

        let bodies = self.posts.iter().filter_map(|p| p.com.as_deref());
        let added = links::merge_into_file(link_file, bodies).await?;
        debug!(
            board = %self.board,
            thread = %self.thread_id,
            added,
            path = %link_file.display(),
            "Links scraped"
        );
        Ok(added)
    }
}
