//! # tsgrab engine
//!
//! Downloads an HLS stream into a single file.
//!
//! The playlist is decoded with the `hls` crate. A master playlist is
//! followed to one variant, keys are resolved once, and segments are fetched
//! by a pool of concurrent workers that decrypt (AES-128-CBC), realign on the
//! transport stream sync byte and store each segment by index. The stored
//! segments are then joined by a [`hls::Reassembler`].

pub mod builder;
pub mod config;
pub mod downloader;
pub mod error;
pub mod hls;
pub mod protocol_builder;
pub mod source;

pub use builder::DownloaderConfigBuilder;
pub use config::DownloaderConfig;
pub use downloader::create_client;
pub use error::DownloadError;
pub use protocol_builder::HlsProtocolBuilder;
pub use source::PlaylistSource;
