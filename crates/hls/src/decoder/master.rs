use tracing::{debug, trace};

use super::{MEDIA_ONLY_TAGS, parse_key, parse_start, required_value, set_version, tag, wrong_kind};
use crate::attributes::{Rule, Setter, decode_attributes};
use crate::error::PlaylistError;
use crate::lexer::{Line, match_directive, parse_attribute_list, unquote};
use crate::master::{
    ClosedCaptions, HdcpLevel, IFrameVariant, MasterPlaylist, MediaType, Rendition, SessionData,
    SessionValue, Variant,
};
use crate::playlist::PlaylistKind;

/// Decodes the body of a master playlist (header already removed).
///
/// Every `EXT-X-STREAM-INF` must be followed by its URI line before the next
/// directive.
pub fn decode_master(lines: &[&str]) -> Result<MasterPlaylist, PlaylistError> {
    let mut playlist = MasterPlaylist::default();
    let mut pending: Option<Variant> = None;

    for line in lines {
        let line = match_directive(line);

        if let Some(variant) = pending.take() {
            match line {
                Line::Uri(uri) => {
                    playlist.variants.push(Variant {
                        uri: uri.to_string(),
                        ..variant
                    });
                    continue;
                }
                Line::Comment(_) => {
                    pending = Some(variant);
                    continue;
                }
                Line::Tag { .. } => {
                    return Err(PlaylistError::MissingVariantUri(tag::STREAM_INF.into()));
                }
            }
        }

        let (name, value) = match line {
            Line::Comment(_) => continue,
            Line::Uri(uri) => {
                debug!(uri, "Ignoring URI line without a preceding EXT-X-STREAM-INF");
                continue;
            }
            Line::Tag { name, value } => (name, value),
        };

        match name {
            tag::STREAM_INF => pending = Some(parse_variant(name, value)?),
            tag::I_FRAME_STREAM_INF => playlist
                .i_frame_variants
                .push(parse_i_frame_variant(name, value)?),
            tag::MEDIA => playlist.renditions.push(parse_rendition(name, value)?),
            tag::SESSION_DATA => playlist
                .session_data
                .push(parse_session_data(name, value)?),
            tag::SESSION_KEY => {
                if playlist.session_key.is_some() {
                    return Err(PlaylistError::DuplicateTag(name.to_string()));
                }
                playlist.session_key = Some(parse_key(name, value)?);
            }
            tag::INDEPENDENT_SEGMENTS => playlist.independent_segments = true,
            tag::START => playlist.start = Some(parse_start(name, value)?),
            tag::VERSION => set_version(name, value, &mut playlist.version)?,
            _ if MEDIA_ONLY_TAGS.contains(&name) => {
                return Err(wrong_kind(name, PlaylistKind::Master));
            }
            _ => trace!(tag = name, "Skipping unrecognized tag"),
        }
    }

    if pending.is_some() {
        return Err(PlaylistError::MissingVariantUri(tag::STREAM_INF.into()));
    }
    Ok(playlist)
}

fn parse_closed_captions(value: &str) -> Option<ClosedCaptions> {
    match value {
        "NONE" => Some(ClosedCaptions::None),
        quoted => unquote(quoted).map(|group| ClosedCaptions::Group(group.to_string())),
    }
}

const VARIANT_RULES: &[Rule<Variant>] = &[
    Rule::required("BANDWIDTH", Setter::Integer(|v, x| v.bandwidth = x)),
    Rule::optional(
        "AVERAGE-BANDWIDTH",
        Setter::Integer(|v, x| v.average_bandwidth = Some(x)),
    ),
    Rule::optional("CODECS", Setter::Quoted(|v, x| v.codecs = Some(x))),
    Rule::optional("RESOLUTION", Setter::Resolution(|v, x| v.resolution = Some(x))),
    Rule::optional("FRAME-RATE", Setter::Float(|v, x| v.frame_rate = Some(x))),
    Rule::optional(
        "HDCP-LEVEL",
        Setter::Enumerated(|v, x| {
            v.hdcp_level = HdcpLevel::parse(x);
            v.hdcp_level.is_some()
        }),
    ),
    Rule::optional("AUDIO", Setter::Quoted(|v, x| v.audio = Some(x))),
    Rule::optional("VIDEO", Setter::Quoted(|v, x| v.video = Some(x))),
    Rule::optional("SUBTITLES", Setter::Quoted(|v, x| v.subtitles = Some(x))),
    Rule::optional(
        "CLOSED-CAPTIONS",
        Setter::Enumerated(|v, x| {
            v.closed_captions = parse_closed_captions(x);
            v.closed_captions.is_some()
        }),
    ),
    Rule::optional("PROGRAM-ID", Setter::Integer(|v, x| v.program_id = Some(x))),
];

fn parse_variant(name: &str, value: Option<&str>) -> Result<Variant, PlaylistError> {
    let attributes = parse_attribute_list(name, required_value(name, value)?)?;
    let mut variant = Variant::default();
    decode_attributes(name, &attributes, VARIANT_RULES, &mut variant)?;
    Ok(variant)
}

const I_FRAME_RULES: &[Rule<IFrameVariant>] = &[
    Rule::required("BANDWIDTH", Setter::Integer(|v, x| v.bandwidth = x)),
    Rule::required("URI", Setter::Quoted(|v, x| v.uri = x)),
    Rule::optional(
        "AVERAGE-BANDWIDTH",
        Setter::Integer(|v, x| v.average_bandwidth = Some(x)),
    ),
    Rule::optional("CODECS", Setter::Quoted(|v, x| v.codecs = Some(x))),
    Rule::optional("RESOLUTION", Setter::Resolution(|v, x| v.resolution = Some(x))),
    Rule::optional(
        "HDCP-LEVEL",
        Setter::Enumerated(|v, x| {
            v.hdcp_level = HdcpLevel::parse(x);
            v.hdcp_level.is_some()
        }),
    ),
    Rule::optional("VIDEO", Setter::Quoted(|v, x| v.video = Some(x))),
];

fn parse_i_frame_variant(name: &str, value: Option<&str>) -> Result<IFrameVariant, PlaylistError> {
    let attributes = parse_attribute_list(name, required_value(name, value)?)?;
    let mut variant = IFrameVariant::default();
    decode_attributes(name, &attributes, I_FRAME_RULES, &mut variant)?;
    Ok(variant)
}

/// `CC1`..`CC4` or `SERVICE1`..`SERVICE63`.
fn is_valid_instream_id(id: &str) -> bool {
    if let Some(channel) = id.strip_prefix("CC") {
        return matches!(channel, "1" | "2" | "3" | "4");
    }
    id.strip_prefix("SERVICE")
        .filter(|n| !n.starts_with('0') && n.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|n| n.parse::<u8>().ok())
        .is_some_and(|n| (1..=63).contains(&n))
}

const RENDITION_RULES: &[Rule<Rendition>] = &[
    Rule::required(
        "TYPE",
        Setter::Enumerated(|r, x| MediaType::parse(x).map(|t| r.media_type = t).is_some()),
    ),
    Rule::required("GROUP-ID", Setter::Quoted(|r, x| r.group_id = x)),
    Rule::required("NAME", Setter::Quoted(|r, x| r.name = x)),
    Rule::optional("URI", Setter::Quoted(|r, x| r.uri = Some(x))),
    Rule::optional("LANGUAGE", Setter::Quoted(|r, x| r.language = Some(x))),
    Rule::optional(
        "ASSOC-LANGUAGE",
        Setter::Quoted(|r, x| r.assoc_language = Some(x)),
    ),
    Rule::optional("DEFAULT", Setter::YesNo(|r, x| r.default = x)),
    Rule::optional("AUTOSELECT", Setter::YesNo(|r, x| r.autoselect = x)),
    Rule::optional("FORCED", Setter::YesNo(|r, x| r.forced = x)),
    Rule::optional(
        "INSTREAM-ID",
        Setter::Enumerated(|r, x| {
            r.instream_id = unquote(x)
                .filter(|id| is_valid_instream_id(id))
                .map(str::to_string);
            r.instream_id.is_some()
        }),
    ),
    Rule::optional(
        "CHARACTERISTICS",
        Setter::Quoted(|r, x| r.characteristics = Some(x)),
    ),
    Rule::optional("CHANNELS", Setter::Quoted(|r, x| r.channels = Some(x))),
];

fn parse_rendition(name: &str, value: Option<&str>) -> Result<Rendition, PlaylistError> {
    let attributes = parse_attribute_list(name, required_value(name, value)?)?;
    let mut rendition = Rendition::default();
    decode_attributes(name, &attributes, RENDITION_RULES, &mut rendition)?;

    let exclusive = |first: String, second: &str| PlaylistError::MutuallyExclusive {
        tag: name.to_string(),
        first,
        second: second.to_string(),
    };
    let type_attr = format!("TYPE={}", rendition.media_type.as_str());

    if rendition.media_type == MediaType::ClosedCaptions {
        if rendition.instream_id.is_none() {
            return Err(PlaylistError::missing(name, "INSTREAM-ID"));
        }
        if rendition.uri.is_some() {
            return Err(exclusive(type_attr, "URI"));
        }
    } else if rendition.instream_id.is_some() {
        return Err(exclusive(type_attr, "INSTREAM-ID"));
    }
    Ok(rendition)
}

#[derive(Default)]
struct SessionDataAttributes {
    data_id: String,
    value: Option<String>,
    uri: Option<String>,
    language: Option<String>,
}

const SESSION_DATA_RULES: &[Rule<SessionDataAttributes>] = &[
    Rule::required("DATA-ID", Setter::Quoted(|s, x| s.data_id = x)),
    Rule::optional("VALUE", Setter::Quoted(|s, x| s.value = Some(x))),
    Rule::optional("URI", Setter::Quoted(|s, x| s.uri = Some(x))),
    Rule::optional("LANGUAGE", Setter::Quoted(|s, x| s.language = Some(x))),
];

fn parse_session_data(name: &str, value: Option<&str>) -> Result<SessionData, PlaylistError> {
    let attributes = parse_attribute_list(name, required_value(name, value)?)?;
    let mut raw = SessionDataAttributes::default();
    decode_attributes(name, &attributes, SESSION_DATA_RULES, &mut raw)?;

    let value = match (raw.value, raw.uri) {
        (Some(value), None) => SessionValue::Value(value),
        (None, Some(uri)) => SessionValue::Uri(uri),
        (Some(_), Some(_)) => {
            return Err(PlaylistError::MutuallyExclusive {
                tag: name.to_string(),
                first: "VALUE".into(),
                second: "URI".into(),
            });
        }
        (None, None) => return Err(PlaylistError::missing(name, "VALUE")),
    };

    Ok(SessionData {
        data_id: raw.data_id,
        value,
        language: raw.language,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::split_lines;
    use crate::media::KeyMethod;
    use crate::resolution::Resolution;

    fn decode(raw: &str) -> Result<MasterPlaylist, PlaylistError> {
        decode_master(&split_lines(raw)?)
    }

    const MASTER: &str = r#"#EXTM3U
#EXT-X-VERSION:6
#EXT-X-INDEPENDENT-SEGMENTS
#EXT-X-SESSION-DATA:DATA-ID="com.example.title",VALUE="Example",LANGUAGE="en"
#EXT-X-SESSION-DATA:DATA-ID="com.example.lyrics",URI="lyrics.json"
#EXT-X-SESSION-KEY:METHOD=AES-128,URI="https://k/session"
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID="aac",NAME="English",LANGUAGE="en",DEFAULT=YES,AUTOSELECT=YES,URI="audio/en.m3u8"
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID="aac",NAME="Deutsch",LANGUAGE="de",DEFAULT=NO,URI="audio/de.m3u8"
#EXT-X-MEDIA:TYPE=CLOSED-CAPTIONS,GROUP-ID="cc",NAME="CC",INSTREAM-ID="CC1"
#EXT-X-STREAM-INF:BANDWIDTH=1280000,AVERAGE-BANDWIDTH=1000000,CODECS="avc1.4d401f,mp4a.40.2",RESOLUTION=1280x720,FRAME-RATE=29.970,AUDIO="aac",CLOSED-CAPTIONS="cc"
# low latency rendition below
http://example.com/720.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2560000,RESOLUTION=1920x1080,HDCP-LEVEL=TYPE-0,CLOSED-CAPTIONS=NONE,PROGRAM-ID=1
http://example.com/1080.m3u8
#EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=86000,URI="iframe/720.m3u8",RESOLUTION=1280x720
"#;

    #[test]
    fn test_full_master_playlist() {
        let playlist = decode(MASTER).unwrap();

        assert_eq!(playlist.version, Some(6));
        assert!(playlist.independent_segments);
        assert_eq!(playlist.count(), 2);

        let first = &playlist.variants[0];
        assert_eq!(first.uri, "http://example.com/720.m3u8");
        assert_eq!(first.bandwidth, 1_280_000);
        assert_eq!(first.average_bandwidth, Some(1_000_000));
        assert_eq!(first.codecs.as_deref(), Some("avc1.4d401f,mp4a.40.2"));
        assert_eq!(first.resolution, Some(Resolution::new(1280, 720)));
        assert_eq!(first.frame_rate, Some(29.97));
        assert_eq!(first.audio.as_deref(), Some("aac"));
        assert_eq!(
            first.closed_captions,
            Some(ClosedCaptions::Group("cc".into()))
        );

        let second = &playlist.variants[1];
        assert_eq!(second.height(), 1080);
        assert_eq!(second.hdcp_level, Some(HdcpLevel::Type0));
        assert_eq!(second.closed_captions, Some(ClosedCaptions::None));
        assert_eq!(second.program_id, Some(1));

        assert_eq!(playlist.i_frame_variants.len(), 1);
        assert_eq!(playlist.i_frame_variants[0].uri, "iframe/720.m3u8");

        assert_eq!(playlist.renditions.len(), 3);
        assert_eq!(playlist.renditions_in("aac").count(), 2);
        let english = &playlist.renditions[0];
        assert!(english.default && english.autoselect && !english.forced);
        assert_eq!(english.uri.as_deref(), Some("audio/en.m3u8"));
        assert_eq!(playlist.renditions[2].instream_id.as_deref(), Some("CC1"));

        assert_eq!(
            playlist.session_data[0].value,
            SessionValue::Value("Example".into())
        );
        assert_eq!(
            playlist.session_data[1].value,
            SessionValue::Uri("lyrics.json".into())
        );
        assert_eq!(
            playlist.session_key.as_ref().map(|k| k.method),
            Some(KeyMethod::Aes128)
        );
    }

    #[test]
    fn test_stream_inf_requires_bandwidth() {
        assert_eq!(
            decode("#EXTM3U\n#EXT-X-STREAM-INF:RESOLUTION=1x1\na.m3u8"),
            Err(PlaylistError::MissingAttribute {
                tag: "EXT-X-STREAM-INF".into(),
                attribute: "BANDWIDTH".into()
            })
        );
    }

    #[test]
    fn test_stream_inf_requires_uri_line() {
        assert_eq!(
            decode("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\n#EXT-X-STREAM-INF:BANDWIDTH=2\nb.m3u8"),
            Err(PlaylistError::MissingVariantUri("EXT-X-STREAM-INF".into()))
        );
        assert_eq!(
            decode("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1"),
            Err(PlaylistError::MissingVariantUri("EXT-X-STREAM-INF".into()))
        );
    }

    #[test]
    fn test_media_tags_rejected() {
        assert_eq!(
            decode("#EXTM3U\n#EXT-X-MEDIA-SEQUENCE:1\n#EXT-X-STREAM-INF:BANDWIDTH=1\na.m3u8"),
            Err(PlaylistError::WrongPlaylistKind {
                tag: "EXT-X-MEDIA-SEQUENCE".into(),
                kind: PlaylistKind::Master
            })
        );
    }

    #[test]
    fn test_closed_caption_rendition_rules() {
        let missing = decode("#EXTM3U\n#EXT-X-MEDIA:TYPE=CLOSED-CAPTIONS,GROUP-ID=\"cc\",NAME=\"x\"");
        assert_eq!(
            missing,
            Err(PlaylistError::MissingAttribute {
                tag: "EXT-X-MEDIA".into(),
                attribute: "INSTREAM-ID".into()
            })
        );

        let with_uri = decode(
            "#EXTM3U\n#EXT-X-MEDIA:TYPE=CLOSED-CAPTIONS,GROUP-ID=\"cc\",NAME=\"x\",INSTREAM-ID=\"CC2\",URI=\"a\"",
        );
        assert!(matches!(
            with_uri,
            Err(PlaylistError::MutuallyExclusive { .. })
        ));

        let on_audio = decode(
            "#EXTM3U\n#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"a\",NAME=\"x\",INSTREAM-ID=\"CC1\"",
        );
        assert!(matches!(
            on_audio,
            Err(PlaylistError::MutuallyExclusive { .. })
        ));

        for bad in ["CC5", "SERVICE0", "SERVICE64", "SERVICE07", "cc1"] {
            let raw = format!(
                "#EXTM3U\n#EXT-X-MEDIA:TYPE=CLOSED-CAPTIONS,GROUP-ID=\"cc\",NAME=\"x\",INSTREAM-ID=\"{bad}\""
            );
            assert!(
                matches!(decode(&raw), Err(PlaylistError::InvalidValue { .. })),
                "{bad} should be rejected"
            );
        }
        assert!(is_valid_instream_id("SERVICE63"));
        assert!(is_valid_instream_id("CC4"));
    }

    #[test]
    fn test_session_data_value_xor_uri() {
        assert_eq!(
            decode("#EXTM3U\n#EXT-X-SESSION-DATA:DATA-ID=\"d\",VALUE=\"v\",URI=\"u\""),
            Err(PlaylistError::MutuallyExclusive {
                tag: "EXT-X-SESSION-DATA".into(),
                first: "VALUE".into(),
                second: "URI".into()
            })
        );
        assert!(matches!(
            decode("#EXTM3U\n#EXT-X-SESSION-DATA:DATA-ID=\"d\""),
            Err(PlaylistError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn test_stray_uri_ignored() {
        let playlist = decode("#EXTM3U\nstray.m3u8\n#EXT-X-STREAM-INF:BANDWIDTH=1\na.m3u8").unwrap();
        assert_eq!(playlist.count(), 1);
        assert_eq!(playlist.variants[0].uri, "a.m3u8");
    }
}
