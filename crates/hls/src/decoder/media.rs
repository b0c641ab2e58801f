use tracing::trace;

use super::{
    MASTER_ONLY_TAGS, decimal_value, parse_key, parse_start, required_value, set_version, tag,
    wrong_kind,
};
use crate::attributes::{Rule, Setter, decode_attributes, parse_float};
use crate::error::PlaylistError;
use crate::lexer::{Line, match_directive, parse_attribute_list};
use crate::media::{ByteRange, InitMap, MediaPlaylist, PlaylistType, Segment};
use crate::playlist::PlaylistKind;

/// Decodes the body of a media playlist (header already removed).
///
/// Segment-scoped directives accumulate on a pending segment that is closed
/// by the next URI line. Parsing stops at `EXT-X-ENDLIST`.
pub fn decode_media(lines: &[&str]) -> Result<MediaPlaylist, PlaylistError> {
    let mut playlist = MediaPlaylist::default();
    let mut pending = Segment::default();
    let mut current_key: Option<usize> = None;
    let mut has_target_duration = false;

    for line in lines {
        let (name, value) = match match_directive(line) {
            Line::Comment(_) => continue,
            Line::Uri(uri) => {
                let mut segment = std::mem::take(&mut pending);
                segment.uri = uri.to_string();
                segment.key_index = current_key;
                playlist.segments.push(segment);
                continue;
            }
            Line::Tag { name, value } => (name, value),
        };

        match name {
            tag::EXTINF => parse_extinf(value, &mut pending)?,
            tag::BYTERANGE => pending.byte_range = Some(parse_byte_range(name, value)?),
            tag::DISCONTINUITY => pending.discontinuity = true,
            tag::MAP => pending.map = Some(parse_map(name, value)?),
            tag::PROGRAM_DATE_TIME => {
                pending.program_date_time = Some(required_value(name, value)?.to_string())
            }
            tag::KEY => {
                playlist.keys.push(parse_key(name, value)?);
                current_key = Some(playlist.keys.len() - 1);
            }
            tag::TARGET_DURATION => {
                playlist.target_duration = decimal_value(name, value)?;
                has_target_duration = true;
            }
            tag::MEDIA_SEQUENCE => playlist.media_sequence = decimal_value(name, value)?,
            tag::DISCONTINUITY_SEQUENCE => {
                playlist.discontinuity_sequence = decimal_value(name, value)?
            }
            tag::PLAYLIST_TYPE => {
                let raw = required_value(name, value)?;
                let kind = PlaylistType::parse(raw)
                    .ok_or_else(|| PlaylistError::invalid(name, "value", raw))?;
                playlist.playlist_type = Some(kind);
            }
            tag::I_FRAMES_ONLY => playlist.i_frames_only = true,
            tag::INDEPENDENT_SEGMENTS => playlist.independent_segments = true,
            tag::START => playlist.start = Some(parse_start(name, value)?),
            tag::VERSION => set_version(name, value, &mut playlist.version)?,
            tag::ENDLIST => {
                playlist.end_list = true;
                break;
            }
            _ if MASTER_ONLY_TAGS.contains(&name) => {
                return Err(wrong_kind(name, PlaylistKind::Media));
            }
            _ => trace!(tag = name, "Skipping unrecognized tag"),
        }
    }

    if !has_target_duration {
        return Err(PlaylistError::MissingTargetDuration);
    }
    Ok(playlist)
}

/// `#EXTINF:<duration>,[<title>]`
fn parse_extinf(value: Option<&str>, segment: &mut Segment) -> Result<(), PlaylistError> {
    let raw = required_value(tag::EXTINF, value)?;
    let (duration, title) = match raw.split_once(',') {
        Some((duration, title)) => (duration.trim(), title.trim()),
        None => (raw.trim(), ""),
    };
    segment.duration = parse_float(duration)
        .ok_or_else(|| PlaylistError::invalid(tag::EXTINF, "duration", duration))?;
    segment.title = (!title.is_empty()).then(|| title.to_string());
    Ok(())
}

fn parse_byte_range(name: &str, value: Option<&str>) -> Result<ByteRange, PlaylistError> {
    let raw = required_value(name, value)?;
    raw.parse()
        .map_err(|_| PlaylistError::invalid(name, "value", raw))
}

const MAP_RULES: &[Rule<InitMap>] = &[
    Rule::required("URI", Setter::Quoted(|m, v| m.uri = v)),
    Rule::optional(
        "BYTERANGE",
        Setter::Enumerated(|m, v| {
            let range = crate::lexer::unquote(v).and_then(|inner| inner.parse().ok());
            m.byte_range = range;
            range.is_some()
        }),
    ),
];

fn parse_map(name: &str, value: Option<&str>) -> Result<InitMap, PlaylistError> {
    let attributes = parse_attribute_list(name, required_value(name, value)?)?;
    let mut map = InitMap::default();
    decode_attributes(name, &attributes, MAP_RULES, &mut map)?;
    Ok(map)
}
