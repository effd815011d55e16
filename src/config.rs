use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::constants::{
    DEFAULT_API_HOST, DEFAULT_MAX_RETRIES, DEFAULT_MEDIA_HOST, DEFAULT_TIMEOUT_SECS,
};
use crate::downloader::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

/// Command-line arguments. Most options can also be set from the environment.
#[derive(Debug, Parser)]
#[command(
    name = "chan-archiver",
    version,
    about = "Download the files of 4chan threads, resuming partial downloads"
)]
pub struct Args {
    /// Thread URLs
    #[arg(value_name = "THREAD")]
    pub threads: Vec<String>,

    /// File with one thread URL per line (may be given multiple times)
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// Download directory
    #[arg(short, long, env = "CHANARCH_DIRECTORY", default_value = ".")]
    pub directory: String,

    /// Download directly into the download directory instead of a per-thread subdirectory
    #[arg(long)]
    pub no_subdir: bool,

    /// Collect every URL found in post bodies into this file
    #[arg(short = 'l', long = "links", env = "CHANARCH_LINK_FILE", value_name = "PATH")]
    pub link_file: Option<String>,

    /// Connect and read timeout in seconds
    #[arg(short, long, env = "CHANARCH_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS, value_name = "SECS")]
    pub timeout: u64,

    /// Retries of a timed-out file transfer before giving up
    #[arg(long, env = "CHANARCH_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Host serving thread JSON
    #[arg(long, env = "CHANARCH_API_HOST", default_value = DEFAULT_API_HOST)]
    pub api_host: String,

    /// Host serving media files
    #[arg(long, env = "CHANARCH_MEDIA_HOST", default_value = DEFAULT_MEDIA_HOST)]
    pub media_host: String,

    /// Be quiet
    #[arg(short, long, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,

    /// Increase verbosity
    #[arg(short, long, conflicts_with = "debug")]
    pub verbose: bool,

    /// Debug-level verbosity
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    /// Default tracing filter directive when `RUST_LOG` is not set.
    #[must_use]
    pub fn filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "warn,chan_archiver=info",
            Self::Debug => "info,chan_archiver=debug",
        }
    }
}

/// Resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Inputs
    pub thread_urls: Vec<String>,
    pub thread_files: Vec<PathBuf>,

    // Output
    pub download_dir: PathBuf,
    pub make_subdir: bool,
    pub link_file: Option<PathBuf>,

    // Network
    pub api_host: String,
    pub media_host: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Args {
    /// Verbosity selected by `--quiet`, `--verbose` or `--debug`.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.debug {
            Verbosity::Debug
        } else if self.verbose {
            Verbosity::Verbose
        } else if self.quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }

    /// Resolve arguments into a validated [`Config`].
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let config = Config {
            thread_urls: self.threads,
            thread_files: self.files,
            download_dir: expand_tilde(&self.directory),
            make_subdir: !self.no_subdir,
            link_file: self.link_file.as_deref().map(expand_tilde),
            api_host: self.api_host,
            media_host: self.media_host,
            timeout: Duration::from_secs(self.timeout),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                ..RetryPolicy::default()
            },
        };
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Configuration with defaults and no inputs, for tests and embedding.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            thread_urls: Vec::new(),
            thread_files: Vec::new(),
            download_dir: PathBuf::from("."),
            make_subdir: true,
            link_file: None,
            api_host: DEFAULT_API_HOST.to_string(),
            media_host: DEFAULT_MEDIA_HOST.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }

    /// Whether any thread source was supplied.
    #[must_use]
    pub fn has_inputs(&self) -> bool {
        !self.thread_urls.is_empty() || !self.thread_files.is_empty()
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "CHANARCH_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.api_host.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "CHANARCH_API_HOST".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.media_host.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "CHANARCH_MEDIA_HOST".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME").filter(|h| !h.is_empty());
    match (path, home) {
        ("~", Some(home)) => PathBuf::from(home),
        (p, Some(home)) if p.starts_with("~/") => PathBuf::from(home).join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}
