//! Master playlist document model.

use crate::media::{Key, StartPoint};
use crate::resolution::Resolution;

/// `HDCP-LEVEL` enumerated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdcpLevel {
    Type0,
    None,
}

impl HdcpLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            // Older playlists spell it without the dash.
            "TYPE-0" | "TYPE0" => Some(Self::Type0),
            "NONE" => Some(Self::None),
            _ => None,
        }
    }
}

/// `CLOSED-CAPTIONS` on a variant: either a rendition group or `NONE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosedCaptions {
    None,
    Group(String),
}

/// `EXT-X-STREAM-INF` plus the URI line that follows it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Variant {
    pub uri: String,
    pub bandwidth: u64,
    pub average_bandwidth: Option<u64>,
    pub codecs: Option<String>,
    pub resolution: Option<Resolution>,
    pub frame_rate: Option<f64>,
    pub hdcp_level: Option<HdcpLevel>,
    pub audio: Option<String>,
    pub video: Option<String>,
    pub subtitles: Option<String>,
    pub closed_captions: Option<ClosedCaptions>,
    /// Removed in protocol version 6 but still seen in the wild.
    pub program_id: Option<u64>,
}

impl Variant {
    pub fn height(&self) -> u64 {
        self.resolution.map_or(0, |r| r.height)
    }

    pub fn width(&self) -> u64 {
        self.resolution.map_or(0, |r| r.width)
    }
}

/// `EXT-X-I-FRAME-STREAM-INF`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IFrameVariant {
    pub uri: String,
    pub bandwidth: u64,
    pub average_bandwidth: Option<u64>,
    pub codecs: Option<String>,
    pub resolution: Option<Resolution>,
    pub hdcp_level: Option<HdcpLevel>,
    pub video: Option<String>,
}

/// `TYPE` of an `EXT-X-MEDIA` rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaType {
    #[default]
    Audio,
    Video,
    Subtitles,
    ClosedCaptions,
}

impl MediaType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "AUDIO" => Some(Self::Audio),
            "VIDEO" => Some(Self::Video),
            "SUBTITLES" => Some(Self::Subtitles),
            "CLOSED-CAPTIONS" => Some(Self::ClosedCaptions),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "AUDIO",
            Self::Video => "VIDEO",
            Self::Subtitles => "SUBTITLES",
            Self::ClosedCaptions => "CLOSED-CAPTIONS",
        }
    }
}

/// `EXT-X-MEDIA`: an alternate rendition of the content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rendition {
    pub media_type: MediaType,
    pub uri: Option<String>,
    pub group_id: String,
    pub language: Option<String>,
    pub assoc_language: Option<String>,
    pub name: String,
    pub default: bool,
    pub autoselect: bool,
    pub forced: bool,
    /// `CC1`..`CC4` or `SERVICE1`..`SERVICE63`; only for closed captions.
    pub instream_id: Option<String>,
    pub characteristics: Option<String>,
    pub channels: Option<String>,
}

/// Payload of `EXT-X-SESSION-DATA`: exactly one of `VALUE` or `URI`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionValue {
    Value(String),
    Uri(String),
}

/// `EXT-X-SESSION-DATA`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub data_id: String,
    pub value: SessionValue,
    pub language: Option<String>,
}

/// A playlist listing alternative variant streams of the same content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MasterPlaylist {
    pub variants: Vec<Variant>,
    pub i_frame_variants: Vec<IFrameVariant>,
    pub renditions: Vec<Rendition>,
    pub session_data: Vec<SessionData>,
    pub session_key: Option<Key>,
    pub independent_segments: bool,
    pub start: Option<StartPoint>,
    pub version: Option<u64>,
}

impl MasterPlaylist {
    /// Number of variant streams.
    pub fn count(&self) -> usize {
        self.variants.len()
    }

    /// Renditions belonging to `group_id`.
    pub fn renditions_in<'a>(&'a self, group_id: &'a str) -> impl Iterator<Item = &'a Rendition> {
        self.renditions.iter().filter(move |r| r.group_id == group_id)
    }
}
