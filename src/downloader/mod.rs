//! Resumable, connection-reusing file downloads from a single media host.
//!
//! Files are fetched one at a time with `Range: bytes=<n>-` requests, where
//! `n` is the current length of the local file, so an interrupted transfer
//! picks up where it stopped on the next attempt or the next run.

mod retry;

use std::path::Path;
use std::time::Duration;

use reqwest::header::{CONNECTION, RANGE};
use reqwest::StatusCode;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::constants::{DOWNLOAD_CHUNK_SIZE, USER_AGENT};
use crate::error::{ArchiveError, Result};
use crate::fs_utils::ensure_parent_dir;

pub use retry::RetryPolicy;

/// How the media host is reached. Chosen once per target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Plain,
    Tls,
}

impl Transport {
    #[must_use]
    pub fn from_secure(secure: bool) -> Self {
        if secure {
            Self::Tls
        } else {
            Self::Plain
        }
    }

    #[must_use]
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Plain => "http",
            Self::Tls => "https",
        }
    }
}

/// Result of a single [`ResumableDownloader::download`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The local file was already complete; nothing was written.
    AlreadyComplete,
    /// `bytes` were written to the local file.
    Downloaded { bytes: u64 },
}

enum Transfer {
    Finished,
    RangeNotSatisfiable,
}

/// Downloads files from one host over a single reusable connection.
///
/// The connection is opened lazily on the first download and kept until
/// [`close`](Self::close), [`reset`](Self::reset), or drop.
#[derive(Debug)]
pub struct ResumableDownloader {
    host: String,
    transport: Transport,
    timeout: Duration,
    retry: RetryPolicy,
    client: Option<reqwest::Client>,
}

impl ResumableDownloader {
    #[must_use]
    pub fn new(host: impl Into<String>, secure: bool, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            host: host.into(),
            transport: Transport::from_secure(secure),
            timeout,
            retry,
            client: None,
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn transport(&self) -> Transport {
        self.transport
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Close any open connection and retarget to `host`.
    pub fn reset(&mut self, host: impl Into<String>, secure: bool) {
        self.close();
        self.host = host.into();
        self.transport = Transport::from_secure(secure);
    }

    /// Close the open connection, if any.
    pub fn close(&mut self) {
        if self.client.take().is_some() {
            debug!(host = %self.host, "Closing connection");
        }
    }

    fn connection(&mut self) -> Result<reqwest::Client> {
        if let Some(client) = &self.client {
            debug!(host = %self.host, "Reusing existing connection");
            return Ok(client.clone());
        }

        debug!(host = %self.host, scheme = self.transport.scheme(), "Opening connection");
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(self.timeout)
            .read_timeout(self.timeout)
            .pool_max_idle_per_host(1)
            .https_only(self.transport == Transport::Tls)
            .no_gzip()
            .build()?;
        self.client = Some(client.clone());
        Ok(client)
    }

    fn url_for(&self, remote_path: &str) -> String {
        format!("{}://{}{remote_path}", self.transport.scheme(), self.host)
    }

    /// Download `remote_path` into `local_path`, resuming from the local
    /// file's current length.
    ///
    /// When `expected_size` is known and already met, no request is made. A
    /// local file longer than `expected_size` is truncated and fetched again.
    /// Read timeouts are retried from the current offset according to the
    /// retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error on local I/O failure, an unexpected HTTP status, or a
    /// transport failure that is not a timeout (or a timeout once retries are
    /// exhausted).
    pub async fn download(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        expected_size: Option<u64>,
    ) -> Result<DownloadOutcome> {
        ensure_parent_dir(local_path).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(local_path)
            .await
            .map_err(|e| ArchiveError::io(local_path, e))?;

        let result = self
            .download_into(remote_path, local_path, &mut file, expected_size)
            .await;
        let flushed = file
            .flush()
            .await
            .map_err(|e| ArchiveError::io(local_path, e));
        let outcome = result?;
        flushed?;

        if let (Some(expected), DownloadOutcome::Downloaded { .. }) = (expected_size, outcome) {
            let actual = tokio::fs::metadata(local_path)
                .await
                .map_err(|e| ArchiveError::io(local_path, e))?
                .len();
            if actual != expected {
                warn!(
                    path = %local_path.display(),
                    expected,
                    actual,
                    "Downloaded size differs from reported size"
                );
            }
        }

        Ok(outcome)
    }

    async fn download_into(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        file: &mut File,
        expected_size: Option<u64>,
    ) -> Result<DownloadOutcome> {
        let mut offset = file
            .metadata()
            .await
            .map_err(|e| ArchiveError::io(local_path, e))?
            .len();

        if let Some(expected) = expected_size {
            if offset == expected {
                debug!(path = %local_path.display(), size = offset, "File already downloaded");
                return Ok(DownloadOutcome::AlreadyComplete);
            }
            if offset > expected {
                warn!(
                    path = %local_path.display(),
                    local = offset,
                    expected,
                    "Local file larger than reported size, starting over"
                );
                file.set_len(0)
                    .await
                    .map_err(|e| ArchiveError::io(local_path, e))?;
                offset = 0;
            }
        }

        let mut written = 0u64;
        let mut received = 0u64;
        let mut retries = 0u32;
        let mut delay = self.retry.initial_delay;

        loop {
            let attempt_start = received;
            let result = self
                .transfer(
                    remote_path,
                    local_path,
                    file,
                    &mut offset,
                    &mut written,
                    &mut received,
                )
                .await;

            match result {
                Ok(Transfer::Finished) => break,
                Ok(Transfer::RangeNotSatisfiable) => {
                    debug!(path = %local_path.display(), offset, "Range not satisfiable, file already downloaded");
                    break;
                }
                Err(e) if e.is_transient() => {
                    if received > attempt_start {
                        // Progress: the budget only counts stalled attempts.
                        retries = 0;
                        delay = self.retry.initial_delay;
                    } else if retries >= self.retry.max_retries {
                        warn!(
                            path = %local_path.display(),
                            offset,
                            retries,
                            "Transfer timed out, retries exhausted"
                        );
                        return Err(e);
                    } else {
                        retries += 1;
                    }
                    warn!(
                        path = %local_path.display(),
                        offset,
                        attempt = retries,
                        max_retries = self.retry.max_retries,
                        error = %e,
                        "Transfer timed out, retrying from current offset"
                    );
                    // The stalled connection is not reused.
                    self.close();
                    tokio::time::sleep(self.retry.sleep_for(delay)).await;
                    delay = self.retry.next_delay(delay);
                }
                Err(e) => return Err(e),
            }
        }

        if written == 0 {
            Ok(DownloadOutcome::AlreadyComplete)
        } else {
            debug!(path = %local_path.display(), bytes = written, "File download completed");
            Ok(DownloadOutcome::Downloaded { bytes: written })
        }
    }

    async fn within_timeout<F: std::future::Future>(&self, url: &str, fut: F) -> Result<F::Output> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ArchiveError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            })
    }

    /// One request/response cycle starting at `offset`.
    ///
    /// `written` is the net number of bytes this download added to the file;
    /// `received` counts every body byte and never goes down.
    async fn transfer(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        file: &mut File,
        offset: &mut u64,
        written: &mut u64,
        received: &mut u64,
    ) -> Result<Transfer> {
        let client = self.connection()?;
        let url = self.url_for(remote_path);

        let request = client
            .get(&url)
            .header(CONNECTION, "keep-alive")
            .header(RANGE, format!("bytes={offset}-"))
            .send();
        let mut response = self.within_timeout(&url, request).await??;

        match response.status() {
            StatusCode::RANGE_NOT_SATISFIABLE => {
                // Drain so the connection can be reused.
                self.within_timeout(&url, response.bytes()).await??;
                return Ok(Transfer::RangeNotSatisfiable);
            }
            StatusCode::PARTIAL_CONTENT => {}
            StatusCode::OK if *offset > 0 => {
                warn!(
                    path = %local_path.display(),
                    offset,
                    "Server ignored range request, restarting from the beginning"
                );
                file.set_len(0)
                    .await
                    .map_err(|e| ArchiveError::io(local_path, e))?;
                *offset = 0;
                // Whatever this download wrote so far was just discarded.
                *written = 0;
            }
            StatusCode::OK => {}
            status => return Err(ArchiveError::HttpStatus { url, status }),
        }

        debug!(url = %url, path = %local_path.display(), offset = *offset, "Downloading");

        while let Some(chunk) = self.within_timeout(&url, response.chunk()).await?? {
            for piece in chunk.chunks(DOWNLOAD_CHUNK_SIZE) {
                file.write_all(piece)
                    .await
                    .map_err(|e| ArchiveError::io(local_path, e))?;
                let len = piece.len() as u64;
                *offset += len;
                *written += len;
                *received += len;
            }
        }

        Ok(Transfer::Finished)
    }
}

impl Drop for ResumableDownloader {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloader(host: &str, secure: bool) -> ResumableDownloader {
        ResumableDownloader::new(host, secure, Duration::from_secs(5), RetryPolicy::none())
    }

    #[test]
    fn test_transport_selection() {
        assert_eq!(Transport::from_secure(true).scheme(), "https");
        assert_eq!(Transport::from_secure(false).scheme(), "http");
    }

    #[test]
    fn test_url_for() {
        let d = downloader("i.4cdn.org", true);
        assert_eq!(d.url_for("/g/1.png"), "https://i.4cdn.org/g/1.png");
        let d = downloader("127.0.0.1:8080", false);
        assert_eq!(d.url_for("/g/1.png"), "http://127.0.0.1:8080/g/1.png");
    }

    #[test]
    fn test_lazy_connection_and_close() {
        let mut d = downloader("i.4cdn.org", false);
        assert!(!d.is_connected());
        d.connection().unwrap();
        assert!(d.is_connected());
        d.close();
        assert!(!d.is_connected());
        // Closing twice is fine
        d.close();
        assert!(!d.is_connected());
    }

    #[test]
    fn test_reset_closes_and_retargets() {
        let mut d = downloader("i.4cdn.org", false);
        d.connection().unwrap();
        d.reset("mirror.example", true);
        assert!(!d.is_connected());
        assert_eq!(d.host(), "mirror.example");
        assert_eq!(d.transport(), Transport::Tls);
    }
}
