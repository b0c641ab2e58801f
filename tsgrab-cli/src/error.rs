use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download error: {0}")]
    Download(#[from] tsgrab_engine::DownloadError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),
}

impl From<tsgrab_engine::hls::HlsDownloaderError> for AppError {
    fn from(error: tsgrab_engine::hls::HlsDownloaderError) -> Self {
        AppError::Download(error.into())
    }
}
