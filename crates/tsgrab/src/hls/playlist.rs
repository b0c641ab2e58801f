// HLS playlist engine: loads the top-level playlist and follows a master
// playlist to the media playlist that gets downloaded.

use std::sync::Arc;

use hls::{MasterPlaylist, MediaPlaylist, Playlist, Variant};
use tracing::{debug, info};
use url::Url;

use crate::hls::HlsDownloaderError;
use crate::hls::config::{HlsConfig, HlsVariantSelectionPolicy};
use crate::hls::fetcher::{HttpFetch, ResourceKind};
use crate::source::PlaylistSource;

/// Resolves a playlist URI against `base`. Absolute URIs are taken as is.
pub fn resolve_uri(base: Option<&Url>, uri: &str) -> Result<Url, HlsDownloaderError> {
    match Url::parse(uri) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| {
                HlsDownloaderError::ConfigError(format!(
                    "Relative URI {uri} needs a base URL (set one for local playlists)"
                ))
            })?;
            base.join(uri).map_err(|e| {
                HlsDownloaderError::PlaylistError(format!("Failed to resolve {uri} against {base}: {e}"))
            })
        }
        Err(e) => Err(HlsDownloaderError::PlaylistError(format!(
            "Invalid URI {uri}: {e}"
        ))),
    }
}

/// Picks the variant named by `policy`.
///
/// Ties on height go to the higher (for `Best`) or lower (for `Worst`)
/// bandwidth.
pub fn select_variant<'a>(
    master: &'a MasterPlaylist,
    policy: HlsVariantSelectionPolicy,
) -> Result<&'a Variant, HlsDownloaderError> {
    if master.variants.is_empty() {
        return Err(HlsDownloaderError::PlaylistError(
            "Master playlist has no variants".to_string(),
        ));
    }
    let selected = match policy {
        HlsVariantSelectionPolicy::Best => master
            .variants
            .iter()
            .max_by_key(|v| (v.height(), v.bandwidth)),
        HlsVariantSelectionPolicy::Worst => master
            .variants
            .iter()
            .min_by_key(|v| (v.height(), v.bandwidth)),
        HlsVariantSelectionPolicy::MatchingWidth(width) => {
            master.variants.iter().find(|v| v.width() == width)
        }
    };
    selected.ok_or_else(|| {
        HlsDownloaderError::ConfigError(format!("No variant matches quality {policy:?}"))
    })
}

/// The playlist as first loaded, with the base for its relative URIs.
#[derive(Debug, Clone)]
pub enum InitialPlaylist {
    Master(MasterPlaylist, Option<Url>),
    Media(MediaPlaylist, Option<Url>),
}

#[derive(Debug, Clone)]
pub struct MediaPlaylistDetails {
    pub playlist: MediaPlaylist,
    /// Base for the playlist's segment and key URIs.
    pub base_url: Option<Url>,
}

pub struct PlaylistEngine {
    fetcher: Arc<dyn HttpFetch>,
    config: Arc<HlsConfig>,
}

impl PlaylistEngine {
    pub fn new(fetcher: Arc<dyn HttpFetch>, config: Arc<HlsConfig>) -> Self {
        Self { fetcher, config }
    }

    /// Fetches or reads the playlist and decodes it.
    ///
    /// A configured base URL overrides the playlist's own location.
    pub async fn load_initial_playlist(
        &self,
        source: &PlaylistSource,
    ) -> Result<InitialPlaylist, HlsDownloaderError> {
        let raw = match source {
            PlaylistSource::Url(url) => {
                self.fetcher
                    .fetch(ResourceKind::Playlist, url, None)
                    .await?
            }
            PlaylistSource::Path(path) => tokio::fs::read(path).await?.into(),
        };
        let base_url = self
            .config
            .playlist_config
            .base_url
            .clone()
            .or_else(|| source.url().cloned());

        let playlist = Playlist::decode_bytes(&raw)?;
        debug!(%source, kind = %playlist.kind(), entries = playlist.count(), "Decoded playlist");
        Ok(match playlist {
            Playlist::Master(master) => InitialPlaylist::Master(master, base_url),
            Playlist::Media(media) => InitialPlaylist::Media(media, base_url),
        })
    }

    /// Follows the selected variant of a master playlist. A media playlist
    /// is returned unchanged.
    pub async fn select_media_playlist(
        &self,
        initial: InitialPlaylist,
    ) -> Result<MediaPlaylistDetails, HlsDownloaderError> {
        let (master, master_base) = match initial {
            InitialPlaylist::Media(playlist, base_url) => {
                return Ok(MediaPlaylistDetails { playlist, base_url });
            }
            InitialPlaylist::Master(master, base_url) => (master, base_url),
        };

        let policy = self.config.playlist_config.variant_selection_policy;
        let variant = select_variant(&master, policy)?;
        let url = resolve_uri(master_base.as_ref(), &variant.uri)?;
        info!(
            %url,
            bandwidth = variant.bandwidth,
            resolution = ?variant.resolution,
            "Selected variant"
        );

        let raw = self
            .fetcher
            .fetch(ResourceKind::Playlist, &url, None)
            .await?;
        match Playlist::decode_bytes(&raw)? {
            Playlist::Media(playlist) => Ok(MediaPlaylistDetails {
                playlist,
                base_url: Some(url),
            }),
            Playlist::Master(_) => Err(HlsDownloaderError::PlaylistError(format!(
                "Variant {url} is a master playlist, expected a media playlist"
            ))),
        }
    }

    pub async fn load_media_playlist(
        &self,
        source: &PlaylistSource,
    ) -> Result<MediaPlaylistDetails, HlsDownloaderError> {
        let initial = self.load_initial_playlist(source).await?;
        self.select_media_playlist(initial).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::test_support::FakeFetcher;
    use hls::Resolution;

    const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
low/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
http://other/high/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720
mid/index.m3u8
";

    const MEDIA: &str = "#EXTM3U
#EXT-X-TARGETDURATION:10
#EXTINF:10,
a.ts
#EXT-X-ENDLIST
";

    fn variant(width: u64, height: u64, bandwidth: u64) -> Variant {
        Variant {
            uri: format!("{width}x{height}.m3u8"),
            bandwidth,
            resolution: Some(Resolution { width, height }),
            ..Default::default()
        }
    }

    fn engine(fetcher: FakeFetcher, config: HlsConfig) -> PlaylistEngine {
        PlaylistEngine::new(Arc::new(fetcher), Arc::new(config))
    }

    #[test]
    fn test_resolve_uri() {
        let base = Url::parse("http://cdn/live/index.m3u8").unwrap();
        assert_eq!(
            resolve_uri(Some(&base), "seg1.ts").unwrap().as_str(),
            "http://cdn/live/seg1.ts"
        );
        assert_eq!(
            resolve_uri(Some(&base), "/root.ts").unwrap().as_str(),
            "http://cdn/root.ts"
        );
        assert_eq!(
            resolve_uri(None, "https://x/a.ts").unwrap().as_str(),
            "https://x/a.ts"
        );
        assert!(matches!(
            resolve_uri(None, "seg1.ts"),
            Err(HlsDownloaderError::ConfigError(_))
        ));
    }

    #[test]
    fn test_select_variant_by_height() {
        let master = MasterPlaylist {
            variants: vec![
                variant(1280, 720, 2_500_000),
                variant(1920, 1080, 5_000_000),
                variant(640, 360, 800_000),
                variant(1920, 1080, 6_000_000),
            ],
            ..Default::default()
        };

        let best = select_variant(&master, HlsVariantSelectionPolicy::Best).unwrap();
        assert_eq!(best.bandwidth, 6_000_000);
        let worst = select_variant(&master, HlsVariantSelectionPolicy::Worst).unwrap();
        assert_eq!(worst.height(), 360);
        let matching =
            select_variant(&master, HlsVariantSelectionPolicy::MatchingWidth(1920)).unwrap();
        assert_eq!(matching.bandwidth, 5_000_000);

        assert!(matches!(
            select_variant(&master, HlsVariantSelectionPolicy::MatchingWidth(854)),
            Err(HlsDownloaderError::ConfigError(_))
        ));
        assert!(matches!(
            select_variant(&MasterPlaylist::default(), HlsVariantSelectionPolicy::Best),
            Err(HlsDownloaderError::PlaylistError(_))
        ));
    }

    #[tokio::test]
    async fn test_media_playlist_from_url_uses_own_base() {
        let fetcher = FakeFetcher::new().with_body("http://cdn/live/index.m3u8", MEDIA);
        let engine = engine(fetcher, HlsConfig::default());
        let source = PlaylistSource::parse("http://cdn/live/index.m3u8").unwrap();

        let details = engine.load_media_playlist(&source).await.unwrap();
        assert_eq!(details.playlist.count(), 1);
        assert_eq!(
            details.base_url.map(String::from).as_deref(),
            Some("http://cdn/live/index.m3u8")
        );
    }

    #[tokio::test]
    async fn test_master_playlist_follows_selected_variant() {
        let fetcher = Arc::new(
            FakeFetcher::new()
                .with_body("http://cdn/master.m3u8", MASTER)
                .with_body("http://cdn/low/index.m3u8", MEDIA)
                .with_body("http://other/high/index.m3u8", MEDIA),
        );

        let mut config = HlsConfig::default();
        config.playlist_config.variant_selection_policy = HlsVariantSelectionPolicy::Worst;
        let engine = PlaylistEngine::new(fetcher.clone(), Arc::new(config));
        let source = PlaylistSource::parse("http://cdn/master.m3u8").unwrap();
        let details = engine.load_media_playlist(&source).await.unwrap();
        assert_eq!(
            details.base_url.unwrap().as_str(),
            "http://cdn/low/index.m3u8"
        );

        let engine = PlaylistEngine::new(fetcher.clone(), Arc::new(HlsConfig::default()));
        let details = engine.load_media_playlist(&source).await.unwrap();
        assert_eq!(
            details.base_url.unwrap().as_str(),
            "http://other/high/index.m3u8"
        );
        assert_eq!(fetcher.request_count("http://other/high/index.m3u8"), 1);
    }

    #[tokio::test]
    async fn test_local_playlist_with_base_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.m3u8");
        tokio::fs::write(&path, MASTER).await.unwrap();

        let fetcher = FakeFetcher::new().with_body("http://mirror/mid/index.m3u8", MEDIA);
        let mut config = HlsConfig::default();
        config.playlist_config.base_url = Some(Url::parse("http://mirror/").unwrap());
        config.playlist_config.variant_selection_policy =
            HlsVariantSelectionPolicy::MatchingWidth(1280);

        let details = engine(fetcher, config)
            .load_media_playlist(&PlaylistSource::Path(path))
            .await
            .unwrap();
        assert_eq!(details.playlist.segments[0].uri, "a.ts");
    }

    #[tokio::test]
    async fn test_load_failures() {
        let fetcher = FakeFetcher::new()
            .with_body("http://cdn/bad.m3u8", "not a playlist")
            .failing_forever("http://cdn/down.m3u8");
        let engine = engine(fetcher, HlsConfig::default());

        let bad = PlaylistSource::parse("http://cdn/bad.m3u8").unwrap();
        assert!(matches!(
            engine.load_initial_playlist(&bad).await,
            Err(HlsDownloaderError::Decode(_))
        ));
        let down = PlaylistSource::parse("http://cdn/down.m3u8").unwrap();
        assert!(matches!(
            engine.load_initial_playlist(&down).await,
            Err(HlsDownloaderError::PlaylistError(_))
        ));
        let missing = PlaylistSource::Path("/nonexistent/tsgrab/index.m3u8".into());
        assert!(matches!(
            engine.load_initial_playlist(&missing).await,
            Err(HlsDownloaderError::IoError { .. })
        ));
    }
}
