use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hls::{KeyMaterial, MediaPlaylist};
use tracing::{info, warn};
use url::Url;

use crate::hls::decryption::{KeyResolver, SegmentDecryption, segment_iv};
use crate::hls::fetcher::{HttpFetch, ReqwestFetcher};
use crate::hls::output::{Reassembler, verify_parts};
use crate::hls::playlist::{MediaPlaylistDetails, PlaylistEngine, resolve_uri};
use crate::hls::processor::SegmentProcessor;
use crate::hls::scheduler::{ProgressCallback, SchedulerStats, SegmentJob, SegmentScheduler};
use crate::hls::workdir::WorkDir;
use crate::source::PlaylistSource;
use crate::{DownloadError, create_client};

use super::{HlsConfig, HlsDownloaderError};

/// Outcome of a finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub segments: usize,
    /// Bytes stored across all segment files.
    pub bytes: u64,
    pub output: PathBuf,
    pub elapsed: Duration,
}

pub struct HlsDownloader {
    config: Arc<HlsConfig>,
    fetcher: Arc<dyn HttpFetch>,
}

impl HlsDownloader {
    pub fn new(config: HlsConfig) -> Result<Self, DownloadError> {
        Self::with_config(config)
    }

    /// Create a new HlsDownloader backed by a reqwest client built from
    /// `config.base`
    pub fn with_config(config: HlsConfig) -> Result<Self, DownloadError> {
        let client = create_client(&config.base)?;
        let config = Arc::new(config);
        let fetcher = Arc::new(ReqwestFetcher::new(client, config.clone()));
        Ok(Self { config, fetcher })
    }

    /// Uses `fetcher` for every playlist, key and segment request.
    pub fn with_fetcher(config: HlsConfig, fetcher: Arc<dyn HttpFetch>) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
        }
    }

    pub fn config(&self) -> &HlsConfig {
        &self.config
    }

    /// Downloads the stream behind `source` into `destination`.
    ///
    /// Segments are stored in a fresh working directory that is removed on
    /// every exit path, including when the returned future is dropped.
    pub async fn download(
        &self,
        source: &PlaylistSource,
        destination: &Path,
        reassembler: &dyn Reassembler,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadSummary, DownloadError> {
        let start_time = Instant::now();

        let MediaPlaylistDetails {
            mut playlist,
            base_url,
        } = PlaylistEngine::new(self.fetcher.clone(), self.config.clone())
            .load_media_playlist(source)
            .await?;
        if playlist.segments.is_empty() {
            return Err(HlsDownloaderError::PlaylistError(format!(
                "Media playlist {source} has no segments"
            ))
            .into());
        }
        if !playlist.end_list {
            warn!(%source, "Playlist has no ENDLIST, downloading the segments listed so far");
        }
        if playlist.segments.iter().any(|s| s.map.is_some()) {
            warn!("Playlist declares EXT-X-MAP init sections, which are not downloaded");
        }

        KeyResolver::new(self.fetcher.clone())
            .resolve_all(&mut playlist, base_url.as_ref())
            .await?;
        let jobs = self.build_jobs(&playlist, base_url.as_ref())?;
        info!(
            %source,
            segments = jobs.len(),
            duration = playlist.total_duration(),
            encrypted = jobs.iter().filter(|j| j.decryption.is_some()).count(),
            "Media playlist ready"
        );

        let workdir = WorkDir::create(self.config.output_config.temp_root.as_deref())?;
        let result = self
            .acquire_and_reassemble(jobs, &workdir, destination, reassembler, progress)
            .await;
        workdir.close();
        let (stats, bytes) = result?;

        let summary = DownloadSummary {
            segments: stats.completed,
            bytes,
            output: destination.to_path_buf(),
            elapsed: start_time.elapsed(),
        };
        info!(
            segments = summary.segments,
            bytes = summary.bytes,
            output = %summary.output.display(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Download complete"
        );
        Ok(summary)
    }

    async fn acquire_and_reassemble(
        &self,
        jobs: Vec<SegmentJob>,
        workdir: &WorkDir,
        destination: &Path,
        reassembler: &dyn Reassembler,
        progress: Option<ProgressCallback>,
    ) -> Result<(SchedulerStats, u64), HlsDownloaderError> {
        let parts = workdir.segment_paths(jobs.len());
        let processor = Arc::new(SegmentProcessor::new(self.config.clone()));
        let stats = SegmentScheduler::new(self.config.clone(), self.fetcher.clone(), processor)
            .run(jobs, parts.clone(), progress)
            .await?;

        let bytes = verify_parts(&parts).await?;
        info!(reassembler = reassembler.name(), parts = parts.len(), "Reassembling segments");
        reassembler
            .reassemble(&parts, workdir.path(), destination)
            .await?;
        Ok((stats, bytes))
    }

    /// One job per segment, with its absolute URL, byte span and key.
    fn build_jobs(
        &self,
        playlist: &MediaPlaylist,
        base_url: Option<&Url>,
    ) -> Result<Vec<SegmentJob>, HlsDownloaderError> {
        let derivation = self.config.decryption_config.iv_derivation;

        playlist
            .segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                let url = resolve_uri(base_url, &segment.uri)?;
                let decryption = match playlist.key_for(index) {
                    None => None,
                    Some(key) => match &key.material {
                        Some(KeyMaterial::Clear) => None,
                        Some(KeyMaterial::Aes128(bytes)) => Some(SegmentDecryption {
                            key: bytes.clone(),
                            iv: segment_iv(key, playlist.media_sequence, index, derivation)?,
                        }),
                        None => {
                            return Err(HlsDownloaderError::DecryptionError(format!(
                                "Key for segment {index} was never resolved"
                            )));
                        }
                    },
                };
                let range = playlist.byte_range_of(index).map_err(|e| {
                    HlsDownloaderError::PlaylistError(format!("Segment {}: {e}", segment.uri))
                })?;
                Ok(SegmentJob {
                    index,
                    url,
                    range,
                    decryption,
                })
            })
            .collect()
    }
}
