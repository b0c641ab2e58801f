use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use hls::Resolution;
use url::Url;

use crate::DownloaderConfig;
use crate::hls::HlsDownloaderError;

// --- Top-Level Configuration ---
#[derive(Debug, Clone, Default)]
pub struct HlsConfig {
    /// Base downloader configuration
    pub base: DownloaderConfig,
    pub playlist_config: HlsPlaylistConfig,
    pub scheduler_config: HlsSchedulerConfig,
    pub fetcher_config: HlsFetcherConfig,
    pub decryption_config: HlsDecryptionConfig,
    pub output_config: HlsOutputConfig,
}

// --- Playlist Configuration ---
#[derive(Debug, Clone)]
pub struct HlsPlaylistConfig {
    pub initial_playlist_fetch_timeout: Duration,
    pub variant_selection_policy: HlsVariantSelectionPolicy,
    /// Base for relative URIs; defaults to the playlist's own URL.
    /// Required for relative URIs in a playlist read from disk.
    pub base_url: Option<Url>,
}

impl Default for HlsPlaylistConfig {
    fn default() -> Self {
        Self {
            initial_playlist_fetch_timeout: Duration::from_secs(15),
            variant_selection_policy: Default::default(),
            base_url: None,
        }
    }
}

/// Which variant of a master playlist gets downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HlsVariantSelectionPolicy {
    /// Tallest resolution
    #[default]
    Best,
    /// Shortest resolution
    Worst,
    /// First variant whose resolution has this width
    MatchingWidth(u64),
}

impl FromStr for HlsVariantSelectionPolicy {
    type Err = HlsDownloaderError;

    /// Accepts `best`, `worst`, `WIDTHxHEIGHT` or a bare width.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("best") {
            return Ok(Self::Best);
        }
        if s.eq_ignore_ascii_case("worst") {
            return Ok(Self::Worst);
        }
        if let Ok(resolution) = s.parse::<Resolution>() {
            return Ok(Self::MatchingWidth(resolution.width));
        }
        s.parse::<u64>().map(Self::MatchingWidth).map_err(|_| {
            HlsDownloaderError::ConfigError(format!(
                "invalid quality {s:?}, expected best, worst or WIDTHxHEIGHT"
            ))
        })
    }
}

// --- Scheduler Configuration ---
#[derive(Debug, Clone)]
pub struct HlsSchedulerConfig {
    /// Number of concurrent segment workers
    pub download_concurrency: usize,
    /// Failed attempts tolerated per segment before the whole download fails.
    /// `None` requeues failed segments forever.
    pub max_segment_retries: Option<u32>,
    /// Pause before a failed segment goes back on the queue
    pub segment_retry_delay: Duration,
}

impl Default for HlsSchedulerConfig {
    fn default() -> Self {
        Self {
            download_concurrency: 4,
            max_segment_retries: Some(5),
            segment_retry_delay: Duration::from_millis(500),
        }
    }
}

// --- Fetcher Configuration ---
#[derive(Debug, Clone)]
pub struct HlsFetcherConfig {
    pub segment_download_timeout: Duration,
    pub key_download_timeout: Duration,
}

impl Default for HlsFetcherConfig {
    fn default() -> Self {
        Self {
            segment_download_timeout: Duration::from_secs(30),
            key_download_timeout: Duration::from_secs(10),
        }
    }
}

/// How the AES-128 IV is derived when a key carries no explicit `IV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IvDerivation {
    /// The playlist's media sequence number as 16 zero-padded ASCII decimal
    /// digits, shared by every segment. Some servers encrypt this way.
    #[default]
    AsciiSequence,
    /// The segment's own media sequence number as a 128-bit big-endian
    /// integer (RFC 8216 section 5.2).
    BinarySequence,
}

// --- Decryption Configuration ---
#[derive(Debug, Clone, Default)]
pub struct HlsDecryptionConfig {
    pub iv_derivation: IvDerivation,
    /// Whether to run AES on the blocking thread pool
    pub offload_decryption_to_cpu_pool: bool,
}

/// What to do when the progress callback returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressErrorPolicy {
    /// Log it and keep downloading
    #[default]
    Ignore,
    /// Stop all workers and fail the download
    Abort,
}

#[derive(Debug, Clone, Default)]
pub struct HlsOutputConfig {
    /// Parent directory of the per-download working directory.
    /// Defaults to the system temp dir.
    pub temp_root: Option<PathBuf>,
    pub progress_error_policy: ProgressErrorPolicy,
}
