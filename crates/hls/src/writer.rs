//! Serialization of media playlists back to the text format.
//!
//! Only directives the decoder understands are written, so decoding the
//! output yields an equal [`MediaPlaylist`].

use std::fmt::{self, Display, Formatter};

use crate::decoder::tag;
use crate::lexer::HEADER;
use crate::media::{InitMap, Key, MediaPlaylist, Segment, StartPoint};

struct KeyAttributes<'a>(&'a Key);

impl Display for KeyAttributes<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let key = self.0;
        write!(f, "METHOD={}", key.method)?;
        if let Some(uri) = &key.uri {
            write!(f, ",URI=\"{uri}\"")?;
        }
        if let Some(iv) = &key.iv {
            write!(f, ",IV=0x{}", hex::encode_upper(iv))?;
        }
        if let Some(format) = &key.keyformat {
            write!(f, ",KEYFORMAT=\"{format}\"")?;
        }
        if let Some(versions) = &key.keyformat_versions {
            write!(f, ",KEYFORMATVERSIONS=\"{versions}\"")?;
        }
        Ok(())
    }
}

fn write_start(f: &mut Formatter<'_>, start: &StartPoint) -> fmt::Result {
    write!(f, "#{}:TIME-OFFSET={}", tag::START, start.time_offset)?;
    if start.precise {
        f.write_str(",PRECISE=YES")?;
    }
    writeln!(f)
}

fn write_map(f: &mut Formatter<'_>, map: &InitMap) -> fmt::Result {
    write!(f, "#{}:URI=\"{}\"", tag::MAP, map.uri)?;
    if let Some(range) = &map.byte_range {
        write!(f, ",BYTERANGE=\"{range}\"")?;
    }
    writeln!(f)
}

fn write_segment(f: &mut Formatter<'_>, segment: &Segment) -> fmt::Result {
    if segment.discontinuity {
        writeln!(f, "#{}", tag::DISCONTINUITY)?;
    }
    if let Some(map) = &segment.map {
        write_map(f, map)?;
    }
    if let Some(date_time) = &segment.program_date_time {
        writeln!(f, "#{}:{date_time}", tag::PROGRAM_DATE_TIME)?;
    }
    writeln!(
        f,
        "#{}:{},{}",
        tag::EXTINF,
        segment.duration,
        segment.title.as_deref().unwrap_or_default()
    )?;
    if let Some(range) = &segment.byte_range {
        writeln!(f, "#{}:{range}", tag::BYTERANGE)?;
    }
    writeln!(f, "{}", segment.uri)
}

impl Display for MediaPlaylist {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{HEADER}")?;
        if let Some(version) = self.version {
            writeln!(f, "#{}:{version}", tag::VERSION)?;
        }
        writeln!(f, "#{}:{}", tag::TARGET_DURATION, self.target_duration)?;
        if self.media_sequence != 0 {
            writeln!(f, "#{}:{}", tag::MEDIA_SEQUENCE, self.media_sequence)?;
        }
        if self.discontinuity_sequence != 0 {
            writeln!(
                f,
                "#{}:{}",
                tag::DISCONTINUITY_SEQUENCE,
                self.discontinuity_sequence
            )?;
        }
        if let Some(kind) = self.playlist_type {
            writeln!(f, "#{}:{}", tag::PLAYLIST_TYPE, kind.as_str())?;
        }
        if self.i_frames_only {
            writeln!(f, "#{}", tag::I_FRAMES_ONLY)?;
        }
        if self.independent_segments {
            writeln!(f, "#{}", tag::INDEPENDENT_SEGMENTS)?;
        }
        if let Some(start) = &self.start {
            write_start(f, start)?;
        }

        // Keys are emitted in declaration order, right before the first
        // segment they govern.
        let mut keys_written = 0;
        let mut write_keys_through = |f: &mut Formatter<'_>, last: usize| -> fmt::Result {
            while keys_written <= last && keys_written < self.keys.len() {
                let key = &self.keys[keys_written];
                writeln!(f, "#{}:{}", tag::KEY, KeyAttributes(key))?;
                keys_written += 1;
            }
            Ok(())
        };

        for segment in &self.segments {
            if let Some(index) = segment.key_index {
                write_keys_through(f, index)?;
            }
            write_segment(f, segment)?;
        }
        if let Some(last) = self.keys.len().checked_sub(1) {
            write_keys_through(f, last)?;
        }

        if self.end_list {
            writeln!(f, "#{}", tag::ENDLIST)?;
        }
        Ok(())
    }
}
