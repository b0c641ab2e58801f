//! Playlist classification and decoding.

mod master;
mod media;

pub use master::decode_master;
pub use media::decode_media;

use crate::attributes::{Rule, Setter, decode_attributes, parse_integer};
use crate::error::PlaylistError;
use crate::lexer::{parse_attribute_list, split_lines};
use crate::media::{Key, KeyMethod, StartPoint};
use crate::playlist::{Playlist, PlaylistKind};

/// Directive names, without the leading `#`.
pub mod tag {
    pub const EXTINF: &str = "EXTINF";
    pub const BYTERANGE: &str = "EXT-X-BYTERANGE";
    pub const DISCONTINUITY: &str = "EXT-X-DISCONTINUITY";
    pub const KEY: &str = "EXT-X-KEY";
    pub const MAP: &str = "EXT-X-MAP";
    pub const PROGRAM_DATE_TIME: &str = "EXT-X-PROGRAM-DATE-TIME";
    pub const TARGET_DURATION: &str = "EXT-X-TARGETDURATION";
    pub const MEDIA_SEQUENCE: &str = "EXT-X-MEDIA-SEQUENCE";
    pub const DISCONTINUITY_SEQUENCE: &str = "EXT-X-DISCONTINUITY-SEQUENCE";
    pub const ENDLIST: &str = "EXT-X-ENDLIST";
    pub const PLAYLIST_TYPE: &str = "EXT-X-PLAYLIST-TYPE";
    pub const I_FRAMES_ONLY: &str = "EXT-X-I-FRAMES-ONLY";
    pub const MEDIA: &str = "EXT-X-MEDIA";
    pub const STREAM_INF: &str = "EXT-X-STREAM-INF";
    pub const I_FRAME_STREAM_INF: &str = "EXT-X-I-FRAME-STREAM-INF";
    pub const SESSION_DATA: &str = "EXT-X-SESSION-DATA";
    pub const SESSION_KEY: &str = "EXT-X-SESSION-KEY";
    pub const INDEPENDENT_SEGMENTS: &str = "EXT-X-INDEPENDENT-SEGMENTS";
    pub const START: &str = "EXT-X-START";
    pub const VERSION: &str = "EXT-X-VERSION";
}

const MEDIA_ONLY_TAGS: &[&str] = &[
    tag::EXTINF,
    tag::BYTERANGE,
    tag::DISCONTINUITY,
    tag::KEY,
    tag::MAP,
    tag::PROGRAM_DATE_TIME,
    tag::TARGET_DURATION,
    tag::MEDIA_SEQUENCE,
    tag::DISCONTINUITY_SEQUENCE,
    tag::ENDLIST,
    tag::PLAYLIST_TYPE,
    tag::I_FRAMES_ONLY,
];

const MASTER_ONLY_TAGS: &[&str] = &[
    tag::MEDIA,
    tag::STREAM_INF,
    tag::I_FRAME_STREAM_INF,
    tag::SESSION_DATA,
    tag::SESSION_KEY,
];

/// Decides whether the playlist body describes a media or a master playlist.
///
/// Any `EXT-X-TARGETDURATION` line makes it a media playlist. Master
/// playlists are assumed to carry at least one variant directive instead.
pub fn classify(lines: &[&str]) -> PlaylistKind {
    let is_media = lines.iter().any(|line| {
        line.strip_prefix('#')
            .is_some_and(|directive| directive.starts_with(tag::TARGET_DURATION))
    });
    if is_media {
        PlaylistKind::Media
    } else {
        PlaylistKind::Master
    }
}

/// Splits, classifies and decodes a playlist.
pub fn decode(raw: &str) -> Result<Playlist, PlaylistError> {
    let lines = split_lines(raw)?;
    match classify(&lines) {
        PlaylistKind::Media => decode_media(&lines).map(Playlist::Media),
        PlaylistKind::Master => decode_master(&lines).map(Playlist::Master),
    }
}

fn wrong_kind(name: &str, kind: PlaylistKind) -> PlaylistError {
    PlaylistError::WrongPlaylistKind {
        tag: name.to_string(),
        kind,
    }
}

/// Value of a directive that must carry one, e.g. `EXT-X-TARGETDURATION:10`.
fn required_value<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str, PlaylistError> {
    value.ok_or_else(|| PlaylistError::missing(name, "value"))
}

fn decimal_value(name: &str, value: Option<&str>) -> Result<u64, PlaylistError> {
    let raw = required_value(name, value)?;
    parse_integer(raw).ok_or_else(|| PlaylistError::invalid(name, "value", raw))
}

fn set_version(
    name: &str,
    value: Option<&str>,
    version: &mut Option<u64>,
) -> Result<(), PlaylistError> {
    if version.is_some() {
        return Err(PlaylistError::DuplicateTag(name.to_string()));
    }
    *version = Some(decimal_value(name, value)?);
    Ok(())
}

const START_RULES: &[Rule<StartPoint>] = &[
    Rule::required("TIME-OFFSET", Setter::Float(|s, v| s.time_offset = v)),
    Rule::optional("PRECISE", Setter::YesNo(|s, v| s.precise = v)),
];

fn parse_start(name: &str, value: Option<&str>) -> Result<StartPoint, PlaylistError> {
    let attributes = parse_attribute_list(name, required_value(name, value)?)?;
    let mut start = StartPoint::default();
    decode_attributes(name, &attributes, START_RULES, &mut start)?;
    Ok(start)
}

const KEY_RULES: &[Rule<Key>] = &[
    Rule::required(
        "METHOD",
        Setter::Enumerated(|k, v| KeyMethod::parse(v).map(|m| k.method = m).is_some()),
    ),
    Rule::optional("URI", Setter::Quoted(|k, v| k.uri = Some(v))),
    Rule::optional(
        "IV",
        Setter::Hex(|k, v| <[u8; 16]>::try_from(v).map(|iv| k.iv = Some(iv)).is_ok()),
    ),
    Rule::optional("KEYFORMAT", Setter::Quoted(|k, v| k.keyformat = Some(v))),
    Rule::optional(
        "KEYFORMATVERSIONS",
        Setter::Quoted(|k, v| k.keyformat_versions = Some(v)),
    ),
];

/// Shared by `EXT-X-KEY` and `EXT-X-SESSION-KEY`.
fn parse_key(name: &str, value: Option<&str>) -> Result<Key, PlaylistError> {
    let attributes = parse_attribute_list(name, required_value(name, value)?)?;
    let mut key = Key::default();
    decode_attributes(name, &attributes, KEY_RULES, &mut key)?;

    match key.method {
        KeyMethod::SampleAes if key.uri.is_some() => Err(PlaylistError::UnsupportedKeyMethod {
            tag: name.to_string(),
            method: key.method.to_string(),
        }),
        KeyMethod::Aes128 | KeyMethod::SampleAes if key.uri.is_none() => {
            Err(PlaylistError::missing(name, "URI"))
        }
        _ => Ok(key),
    }
}
