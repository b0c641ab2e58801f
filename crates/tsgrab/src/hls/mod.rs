// HLS downloader: playlist loading, key resolution, concurrent segment
// acquisition and reassembly.

pub mod config;
pub mod decryption;
pub mod error;
pub mod fetcher;
pub mod hls_downloader;
pub mod output;
pub mod playlist;
pub mod processor;
pub mod scheduler;
pub mod workdir;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for easier access
pub use config::{
    HlsConfig, HlsVariantSelectionPolicy, IvDerivation, ProgressErrorPolicy,
};
pub use error::HlsDownloaderError;
pub use fetcher::{HttpFetch, ReqwestFetcher, ResourceKind};
pub use hls_downloader::{DownloadSummary, HlsDownloader};
pub use output::{ByteConcat, FfmpegConcat, Reassembler};
pub use scheduler::{BoxError, ProgressCallback};
