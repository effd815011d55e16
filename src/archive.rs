//! Run driver: collects threads from the configured inputs and archives them
//! one after another.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::config::Config;
use crate::constants::USER_AGENT;
use crate::downloader::{DownloadOutcome, ResumableDownloader, Transport};
use crate::error::Result;
use crate::fs_utils::read_thread_list;
use crate::thread::ThreadState;

/// Totals for a single thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadSummary {
    pub dead: bool,
    pub files_downloaded: usize,
    pub files_complete: usize,
    pub bytes: u64,
    pub links_added: usize,
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub threads: usize,
    pub dead_threads: usize,
    pub files_downloaded: usize,
    pub files_complete: usize,
    pub bytes: u64,
    pub links_added: usize,
}

impl RunSummary {
    fn add(&mut self, thread: &ThreadSummary) {
        self.threads += 1;
        self.dead_threads += usize::from(thread.dead);
        self.files_downloaded += thread.files_downloaded;
        self.files_complete += thread.files_complete;
        self.bytes += thread.bytes;
        self.links_added += thread.links_added;
    }
}

/// Build the thread list from list files, then direct URLs.
///
/// Every input is parsed before anything is fetched, so one bad URL aborts the
/// run up front. Threads with the same board and id are kept once, first seen
/// wins.
///
/// # Errors
///
/// Returns an error if a list file cannot be read or any URL is invalid.
pub async fn collect_threads(config: &Config) -> Result<Vec<ThreadState>> {
    let mut urls = Vec::new();
    for path in &config.thread_files {
        let listed = read_thread_list(path).await?;
        debug!(path = %path.display(), count = listed.len(), "Read thread list");
        urls.extend(listed);
    }
    urls.extend(
        config
            .thread_urls
            .iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty()),
    );

    let mut seen = HashSet::new();
    let mut threads = Vec::with_capacity(urls.len());
    for url in &urls {
        let thread = ThreadState::new(
            url,
            &config.download_dir,
            config.make_subdir,
            config.link_file.clone(),
        )?;
        let (board, id) = thread.identity();
        if !seen.insert((board.to_string(), id.to_string())) {
            info!(board, thread = id, url = %url, "Duplicate thread, skipping");
            continue;
        }
        threads.push(thread);
    }

    Ok(threads)
}

/// Archive each thread in order.
///
/// # Errors
///
/// Stops at the first thread that fails and returns its error.
pub async fn archive_all(config: &Config, threads: &mut [ThreadState]) -> Result<RunSummary> {
    let api = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(config.timeout)
        .read_timeout(config.timeout)
        .build()?;

    let mut downloader: Option<ResumableDownloader> = None;
    let mut summary = RunSummary::default();

    for thread in threads.iter_mut() {
        let transport = Transport::from_secure(thread.is_secure());
        if let Some(d) = downloader.as_mut() {
            if d.host() != config.media_host || d.transport() != transport {
                d.reset(config.media_host.clone(), thread.is_secure());
            }
        }
        let active = downloader.get_or_insert_with(|| {
            ResumableDownloader::new(
                config.media_host.clone(),
                thread.is_secure(),
                config.timeout,
                config.retry.clone(),
            )
        });

        let thread_summary = archive_thread(thread, &api, &config.api_host, active).await?;
        summary.add(&thread_summary);
    }

    info!(
        threads = summary.threads,
        dead = summary.dead_threads,
        downloaded = summary.files_downloaded,
        complete = summary.files_complete,
        bytes = summary.bytes,
        links = summary.links_added,
        "Completed all downloads"
    );
    Ok(summary)
}

/// Refresh one thread, download its files, then scrape its links.
///
/// The downloader's connection is closed before returning, whether or not the
/// downloads succeeded.
///
/// # Errors
///
/// Returns the first refresh, download or link-file error.
pub async fn archive_thread(
    thread: &mut ThreadState,
    api: &reqwest::Client,
    api_host: &str,
    downloader: &mut ResumableDownloader,
) -> Result<ThreadSummary> {
    thread.refresh(api, api_host).await?;

    let mut summary = ThreadSummary {
        dead: thread.is_dead(),
        ..ThreadSummary::default()
    };

    if !summary.dead {
        info!(
            board = thread.board(),
            thread = thread.thread_id(),
            dir = %thread.archive_dir().display(),
            "Downloading thread"
        );
    }

    let result = download_files(thread, downloader, &mut summary).await;
    downloader.close();
    result?;

    summary.links_added = thread.scrape_links().await?;

    info!(
        board = thread.board(),
        thread = thread.thread_id(),
        dead = summary.dead,
        downloaded = summary.files_downloaded,
        complete = summary.files_complete,
        links = summary.links_added,
        "Thread finished"
    );
    Ok(summary)
}

async fn download_files(
    thread: &ThreadState,
    downloader: &mut ResumableDownloader,
    summary: &mut ThreadSummary,
) -> Result<()> {
    for task in thread.download_tasks() {
        match downloader
            .download(&task.remote_path, &task.local_path, task.expected_size)
            .await?
        {
            DownloadOutcome::AlreadyComplete => summary.files_complete += 1,
            DownloadOutcome::Downloaded { bytes } => {
                summary.files_downloaded += 1;
                summary.bytes += bytes;
            }
        }
    }
    Ok(())
}
