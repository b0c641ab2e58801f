//! # Protocol Builders
//!
//! Fluent builder API for creating an HLS downloader with a specific
//! configuration.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::hls::config::{HlsConfig, HlsVariantSelectionPolicy, IvDerivation, ProgressErrorPolicy};
use crate::hls::HlsDownloader;
use crate::{DownloadError, DownloaderConfig};

/// Generic protocol builder trait
pub trait ProtocolBuilder {
    /// The protocol implementation type being built
    type Protocol;

    /// Build the protocol implementation
    fn build(self) -> Result<Self::Protocol, DownloadError>;
}

/// Builder for HLS downloaders
pub struct HlsProtocolBuilder {
    config: HlsConfig,
}

impl HlsProtocolBuilder {
    /// Create a new HLS protocol builder with default configuration
    pub fn new() -> Self {
        Self {
            config: HlsConfig::default(),
        }
    }

    pub fn with_base_config(mut self, base_config: DownloaderConfig) -> Self {
        self.config.base = base_config;
        self
    }

    // --- Base DownloaderConfig methods ---

    /// Set user agent for HTTP requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.base.user_agent = user_agent.into();
        self
    }

    /// Set overall HTTP timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.base.timeout = timeout;
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.base.connect_timeout = timeout;
        self
    }

    /// Set HTTP headers
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.config.base.headers = headers;
        self
    }

    /// Add a single HTTP header. Invalid names or values are skipped.
    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.config.base.headers.insert(name, value);
        }
        self
    }

    // --- HLS PlaylistConfig methods ---

    /// Set timeout for fetching playlists.
    pub fn playlist_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.playlist_config.initial_playlist_fetch_timeout = timeout;
        self
    }

    /// Set the variant selection policy.
    pub fn variant_selection_policy(mut self, policy: HlsVariantSelectionPolicy) -> Self {
        self.config.playlist_config.variant_selection_policy = policy;
        self
    }

    /// Resolve relative URIs against `base_url` instead of the playlist's
    /// own location.
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.config.playlist_config.base_url = Some(base_url);
        self
    }

    // --- HLS SchedulerConfig methods ---

    /// Set the number of concurrent segment workers.
    pub fn download_concurrency(mut self, concurrency: usize) -> Self {
        self.config.scheduler_config.download_concurrency = concurrency;
        self
    }

    /// Set the number of retries per segment; `None` retries forever.
    pub fn max_segment_retries(mut self, retries: Option<u32>) -> Self {
        self.config.scheduler_config.max_segment_retries = retries;
        self
    }

    /// Set the pause before a failed segment is retried.
    pub fn segment_retry_delay(mut self, delay: Duration) -> Self {
        self.config.scheduler_config.segment_retry_delay = delay;
        self
    }

    // --- HLS FetcherConfig methods ---

    /// Set timeout for downloading a single segment.
    pub fn segment_download_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher_config.segment_download_timeout = timeout;
        self
    }

    /// Set timeout for downloading a decryption key.
    pub fn key_download_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher_config.key_download_timeout = timeout;
        self
    }

    // --- HLS DecryptionConfig methods ---

    pub fn iv_derivation(mut self, derivation: IvDerivation) -> Self {
        self.config.decryption_config.iv_derivation = derivation;
        self
    }

    /// Set whether to use a separate thread pool for decryption.
    pub fn offload_decryption_to_cpu_pool(mut self, offload: bool) -> Self {
        self.config.decryption_config.offload_decryption_to_cpu_pool = offload;
        self
    }

    // --- HLS OutputConfig methods ---

    /// Set the parent directory of the per-download working directory.
    pub fn temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.output_config.temp_root = Some(root.into());
        self
    }

    pub fn progress_error_policy(mut self, policy: ProgressErrorPolicy) -> Self {
        self.config.output_config.progress_error_policy = policy;
        self
    }

    // --- General Builder Methods ---

    /// Access the raw HLS configuration for more advanced customization.
    pub fn with_config<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut HlsConfig),
    {
        f(&mut self.config);
        self
    }

    /// Get a copy of the current HLS configuration.
    pub fn get_config(&self) -> HlsConfig {
        self.config.clone()
    }
}

impl ProtocolBuilder for HlsProtocolBuilder {
    type Protocol = HlsDownloader;

    fn build(self) -> Result<Self::Protocol, DownloadError> {
        HlsDownloader::with_config(self.config)
    }
}

impl Default for HlsProtocolBuilder {
    fn default() -> Self {
        Self::new()
    }
}
