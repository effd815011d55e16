use std::sync::LazyLock;

use regex::Regex;

use crate::constants::THREAD_URL_FORMAT;
use crate::error::{ArchiveError, Result};

static THREAD_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^http(s?)://boards\.4chan\.org/([^/]+)/thread/([0-9]+)(?:[/?#].*)?$").unwrap()
});

/// Components of a thread URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadUrl {
    pub secure: bool,
    pub board: String,
    pub thread_id: String,
}

/// Parse a thread URL of the form `http(s)://boards.4chan.org/<board>/thread/<number>`.
///
/// A trailing slug, query or fragment (`/title`, `#p123`) is accepted and ignored.
///
/// # Errors
///
/// Returns [`ArchiveError::InvalidUrl`] if the URL does not match.
pub fn parse_thread_url(url: &str) -> Result<ThreadUrl> {
    let trimmed = url.trim();
    let caps = THREAD_URL
        .captures(trimmed)
        .ok_or_else(|| ArchiveError::InvalidUrl {
            url: trimmed.to_string(),
            expected: THREAD_URL_FORMAT.to_string(),
        })?;

    Ok(ThreadUrl {
        secure: &caps[1] == "s",
        board: caps[2].to_string(),
        thread_id: caps[3].to_string(),
    })
}
