use std::fmt;

use crate::decoder;
use crate::error::PlaylistError;
use crate::master::MasterPlaylist;
use crate::media::MediaPlaylist;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaylistKind {
    Master,
    Media,
}

impl fmt::Display for PlaylistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaylistKind::Master => f.write_str("master"),
            PlaylistKind::Media => f.write_str("media"),
        }
    }
}

/// A decoded playlist document.
#[derive(Debug, Clone, PartialEq)]
pub enum Playlist {
    Master(MasterPlaylist),
    Media(MediaPlaylist),
}

impl Playlist {
    /// Decodes a playlist, detecting whether it is a master or media playlist.
    pub fn decode(raw: &str) -> Result<Self, PlaylistError> {
        decoder::decode(raw)
    }

    pub fn decode_bytes(raw: &[u8]) -> Result<Self, PlaylistError> {
        let text =
            std::str::from_utf8(raw).map_err(|e| PlaylistError::Encoding(e.to_string()))?;
        Self::decode(text)
    }

    pub fn kind(&self) -> PlaylistKind {
        match self {
            Playlist::Master(_) => PlaylistKind::Master,
            Playlist::Media(_) => PlaylistKind::Media,
        }
    }

    /// Variant count for master playlists, segment count for media playlists.
    pub fn count(&self) -> usize {
        match self {
            Playlist::Master(master) => master.count(),
            Playlist::Media(media) => media.count(),
        }
    }
}
