use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::error::{ArchiveError, Result};

/// Create the parent directory of `path` if it does not exist yet.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if tokio::fs::try_exists(parent).await.unwrap_or(false) {
        return Ok(());
    }
    debug!(path = %parent.display(), "Creating directory");
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| ArchiveError::io(parent, e))
}

/// Read the non-empty lines of `path` into a sorted set. A missing file is empty.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub async fn read_line_set(path: &Path) -> Result<BTreeSet<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
        Err(e) => Err(ArchiveError::io(path, e)),
    }
}

/// Overwrite `path` with one line per entry, in the set's (ascending) order.
///
/// # Errors
///
/// Returns an error if the parent directory or the file cannot be written.
pub async fn write_line_set(path: &Path, lines: &BTreeSet<String>) -> Result<()> {
    ensure_parent_dir(path).await?;
    let mut contents = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        contents.push_str(line);
        contents.push('\n');
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| ArchiveError::io(path, e))
}

/// Read a thread list: one URL per line, skipping blanks and `#` comments.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub async fn read_thread_list(path: &Path) -> Result<Vec<String>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ArchiveError::io(path, e))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(ToString::to_string)
        .collect())
}
