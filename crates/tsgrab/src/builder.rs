//! # Builder for DownloaderConfig
//!
//! Fluent construction of the HTTP client options used by the downloader.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tsgrab_engine::DownloaderConfig;
//!
//! let config = DownloaderConfig::builder()
//!     .with_timeout(Duration::from_secs(60))
//!     .with_connect_timeout(Duration::from_secs(15))
//!     .with_user_agent("MyApp/1.0")
//!     .with_header("Referer", "https://example.com/")
//!     .with_follow_redirects(true)
//!     .build();
//! assert_eq!(config.user_agent, "MyApp/1.0");
//! ```

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::DownloaderConfig;

/// Builder for creating DownloaderConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct DownloaderConfigBuilder {
    config: DownloaderConfig,
}

impl DownloaderConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: DownloaderConfig::default(),
        }
    }

    /// Set the overall timeout for the entire HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the idle timeout of pooled connections
    pub fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header. Invalid names or values are skipped.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match (
            name.as_ref().parse::<HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.config.headers.insert(name, value);
            }
            _ => warn!(header = name.as_ref(), "Ignoring invalid HTTP header"),
        }
        self
    }

    /// Set all HTTP headers, replacing any existing headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.headers = headers;
        self
    }

    /// Build the DownloaderConfig instance
    pub fn build(self) -> DownloaderConfig {
        self.config
    }
}

impl Default for DownloaderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
