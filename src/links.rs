//! Best-effort URL scraping from post bodies.
//!
//! This is a regex heuristic over HTML fragments, not a parser: URLs adjacent
//! to entity-escaped punctuation may pick up trailing characters, and URLs
//! split by markup other than `<wbr>` are not reassembled.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::fs_utils::{read_line_set, write_line_set};

/// Inline word-break markup the board inserts into long words, including URLs.
static WORD_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<wbr\s*/?>").unwrap());

/// Scheme, then unreserved / reserved URL characters or percent-escapes.
static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:https?|ftp)://(?:[A-Za-z0-9\-._~:/?#\[\]@!$&'()*+,;=]|%[0-9A-Fa-f]{2})+")
        .unwrap()
});

/// Extract URLs from a post body, in order of appearance.
#[must_use]
pub fn extract_urls(body: &str) -> Vec<String> {
    let joined = WORD_BREAK.replace_all(body, "");
    URL.find_iter(&joined)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Union the URLs found in `bodies` with those already in `link_file` and
/// rewrite it sorted, one per line.
///
/// Returns the number of URLs added.
///
/// # Errors
///
/// Returns an error if the link file cannot be read or written.
pub async fn merge_into_file<'a, I>(link_file: &Path, bodies: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut links = read_line_set(link_file).await?;
    let before = links.len();

    links.extend(collect_urls(bodies));

    write_line_set(link_file, &links).await?;
    Ok(links.len() - before)
}

/// Collect the distinct URLs of `bodies` in sorted order.
#[must_use]
pub fn collect_urls<'a, I>(bodies: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    bodies.into_iter().flat_map(extract_urls).collect()
}
