use std::sync::Arc;

#[derive(Debug, thiserror::Error, Clone)]
pub enum HlsDownloaderError {
    #[error("Playlist decode error: {0}")]
    Decode(#[from] hls::PlaylistError),
    #[error("Playlist error: {0}")]
    PlaylistError(String),
    #[error("Segment fetch error: {0}")]
    SegmentFetchError(String),
    #[error("Segment processing error: {0}")]
    SegmentProcessError(String),
    #[error("Decryption error: {0}")]
    DecryptionError(String),
    #[error("Network error: {source}")]
    NetworkError {
        #[from]
        source: Arc<reqwest::Error>,
    },
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: Arc<std::io::Error>,
    },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Segment {index} failed after {attempts} attempts: {last_error}")]
    SegmentExhausted {
        index: usize,
        attempts: u32,
        last_error: Box<HlsDownloaderError>,
    },
    #[error("Progress callback aborted the download: {0}")]
    ProgressAborted(String),
    #[error("Reassembly failed: {0}")]
    ReassemblyError(String),
}

// Manual implementation of From<reqwest::Error> for HlsDownloaderError
// because of the Arc wrapping.
impl From<reqwest::Error> for HlsDownloaderError {
    fn from(err: reqwest::Error) -> Self {
        HlsDownloaderError::NetworkError {
            source: Arc::new(err),
        }
    }
}

impl From<std::io::Error> for HlsDownloaderError {
    fn from(err: std::io::Error) -> Self {
        HlsDownloaderError::IoError {
            source: Arc::new(err),
        }
    }
}
