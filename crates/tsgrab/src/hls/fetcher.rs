// HLS resource fetcher: plain GET requests for playlists, keys and segments.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::hls::HlsDownloaderError;
use crate::hls::config::HlsConfig;

/// What a request is for. Selects the timeout and the error reported on
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Playlist,
    Key,
    Segment,
}

impl ResourceKind {
    pub(crate) fn error(self, message: String) -> HlsDownloaderError {
        match self {
            ResourceKind::Playlist => HlsDownloaderError::PlaylistError(message),
            ResourceKind::Key => HlsDownloaderError::DecryptionError(message),
            ResourceKind::Segment => HlsDownloaderError::SegmentFetchError(message),
        }
    }
}

/// Absolute byte span of a request: `(start, length)`.
pub type ByteSpan = (u64, u64);

/// Performs one GET and returns the full body.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn fetch(
        &self,
        kind: ResourceKind,
        url: &Url,
        range: Option<ByteSpan>,
    ) -> Result<Bytes, HlsDownloaderError>;
}

/// `Range` header value for an absolute span. `None` when the last byte
/// lies past `u64::MAX`.
pub fn range_header((start, length): ByteSpan) -> Option<String> {
    let end = start.checked_add(length.saturating_sub(1))?;
    Some(format!("bytes={start}-{end}"))
}

pub struct ReqwestFetcher {
    http_client: Client,
    config: Arc<HlsConfig>,
}

impl ReqwestFetcher {
    pub fn new(http_client: Client, config: Arc<HlsConfig>) -> Self {
        Self {
            http_client,
            config,
        }
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn fetch(
        &self,
        kind: ResourceKind,
        url: &Url,
        range: Option<ByteSpan>,
    ) -> Result<Bytes, HlsDownloaderError> {
        let timeout = match kind {
            ResourceKind::Playlist => self.config.playlist_config.initial_playlist_fetch_timeout,
            ResourceKind::Key => self.config.fetcher_config.key_download_timeout,
            ResourceKind::Segment => self.config.fetcher_config.segment_download_timeout,
        };

        let mut request_builder = self.http_client.get(url.clone()).timeout(timeout);
        if let Some(span) = range {
            let value = range_header(span).ok_or_else(|| {
                kind.error(format!("Byte range {span:?} for {url} overflows"))
            })?;
            request_builder = request_builder.header(reqwest::header::RANGE, value);
        }

        let response = request_builder
            .send()
            .await
            .map_err(|e| kind.error(format!("Request for {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(kind.error(format!("HTTP {} fetching {url}", response.status())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| kind.error(format!("Reading body of {url} failed: {e}")))?;
        debug!(?kind, %url, bytes = body.len(), "Fetched resource");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_header() {
        assert_eq!(range_header((0, 100)).as_deref(), Some("bytes=0-99"));
        assert_eq!(
            range_header((1720, 500)).as_deref(),
            Some("bytes=1720-2219")
        );
        assert_eq!(
            range_header((u64::MAX, 1)),
            Some(format!("bytes={0}-{0}", u64::MAX))
        );
        assert_eq!(range_header((u64::MAX, 2)), None);
    }

    #[test]
    fn test_error_kind_mapping() {
        assert!(matches!(
            ResourceKind::Playlist.error("x".into()),
            HlsDownloaderError::PlaylistError(_)
        ));
        assert!(matches!(
            ResourceKind::Key.error("x".into()),
            HlsDownloaderError::DecryptionError(_)
        ));
        assert!(matches!(
            ResourceKind::Segment.error("x".into()),
            HlsDownloaderError::SegmentFetchError(_)
        ));
    }
}
