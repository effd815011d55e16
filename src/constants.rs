//! Shared constants used across the application.

/// Host serving thread metadata (`/<board>/thread/<id>.json`).
pub const DEFAULT_API_HOST: &str = "a.4cdn.org";

/// Host serving post media (`/<board>/<tim><ext>`).
pub const DEFAULT_MEDIA_HOST: &str = "i.4cdn.org";

/// Human-readable thread URL format, used in error messages.
pub const THREAD_URL_FORMAT: &str = "http(s)://boards.4chan.org/<board>/thread/<number>";

/// Size of each write while streaming a file body to disk.
pub const DOWNLOAD_CHUNK_SIZE: usize = 16 * 1024;

/// Default connect/read timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default number of retries for a timed-out file transfer.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// User agent string sent with every request.
pub const USER_AGENT: &str = concat!("chan-archiver/", env!("CARGO_PKG_VERSION"));
