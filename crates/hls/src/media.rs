//! Media playlist document model.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::PlaylistError;

/// Encryption method declared by `EXT-X-KEY` / `EXT-X-SESSION-KEY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyMethod {
    #[default]
    None,
    Aes128,
    SampleAes,
}

impl KeyMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NONE" => Some(Self::None),
            "AES-128" => Some(Self::Aes128),
            "SAMPLE-AES" => Some(Self::SampleAes),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Aes128 => "AES-128",
            Self::SampleAes => "SAMPLE-AES",
        }
    }
}

impl fmt::Display for KeyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key bytes loaded for a [`Key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// The key declares `METHOD=NONE`; segments pass through untouched.
    Clear,
    /// Raw AES-128 key as served by the key URI.
    Aes128(Bytes),
}

/// Decryption descriptor, active for every following segment until the next
/// key directive.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Key {
    pub method: KeyMethod,
    pub uri: Option<String>,
    pub iv: Option<[u8; 16]>,
    pub keyformat: Option<String>,
    pub keyformat_versions: Option<String>,
    /// Filled in once by a key resolver before any segment is fetched.
    pub material: Option<KeyMaterial>,
}

impl Key {
    pub fn requires_decryption(&self) -> bool {
        self.method != KeyMethod::None
    }
}

/// `EXT-X-BYTERANGE` / `BYTERANGE` value: `length[@offset]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub length: u64,
    pub offset: Option<u64>,
}

impl FromStr for ByteRange {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (length, offset) = match s.split_once('@') {
            Some((length, offset)) => (length, Some(offset.trim().parse().map_err(|_| ())?)),
            None => (s, None),
        };
        Ok(Self {
            length: length.trim().parse().map_err(|_| ())?,
            offset,
        })
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{}@{}", self.length, offset),
            None => write!(f, "{}", self.length),
        }
    }
}

/// `EXT-X-MAP`: media initialization section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InitMap {
    pub uri: String,
    pub byte_range: Option<ByteRange>,
}

/// One media segment (chunk).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Segment {
    /// Absolute or playlist-relative URI.
    pub uri: String,
    /// Seconds, from `EXTINF`.
    pub duration: f64,
    pub title: Option<String>,
    pub byte_range: Option<ByteRange>,
    pub discontinuity: bool,
    pub map: Option<InitMap>,
    pub program_date_time: Option<String>,
    /// Index into [`MediaPlaylist::keys`]; `None` when no key is active.
    pub key_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistType {
    Vod,
    Event,
}

impl PlaylistType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "VOD" => Some(Self::Vod),
            "EVENT" => Some(Self::Event),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vod => "VOD",
            Self::Event => "EVENT",
        }
    }
}

/// `EXT-X-START`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StartPoint {
    pub time_offset: f64,
    pub precise: bool,
}

/// A playlist listing the ordered segments of one stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaPlaylist {
    pub segments: Vec<Segment>,
    /// Keys in the order they were declared.
    pub keys: Vec<Key>,
    pub target_duration: u64,
    pub media_sequence: u64,
    pub discontinuity_sequence: u64,
    pub playlist_type: Option<PlaylistType>,
    pub i_frames_only: bool,
    pub independent_segments: bool,
    pub end_list: bool,
    pub start: Option<StartPoint>,
    pub version: Option<u64>,
}

impl MediaPlaylist {
    /// Number of segments.
    pub fn count(&self) -> usize {
        self.segments.len()
    }

    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Key governing the segment at `index`, if any.
    pub fn key_for(&self, index: usize) -> Option<&Key> {
        let key_index = self.segments.get(index)?.key_index?;
        self.keys.get(key_index)
    }

    /// Absolute `(start, length)` of the segment's byte range.
    ///
    /// A range without an explicit offset continues right after the previous
    /// segment's range when both address the same URI, and starts at 0
    /// otherwise. Fails when the span does not fit in a `u64`.
    pub fn byte_range_of(&self, index: usize) -> Result<Option<(u64, u64)>, PlaylistError> {
        let Some(range) = self.segments.get(index).and_then(|s| s.byte_range) else {
            return Ok(None);
        };
        let overflow = || PlaylistError::ByteRangeOverflow(index);

        let mut start = 0u64;
        let mut preceding = 0u64;
        let mut cursor = index;
        let mut current = range;
        loop {
            if let Some(offset) = current.offset {
                start = offset;
                break;
            }
            let Some(prev_index) = cursor.checked_sub(1) else {
                break;
            };
            let (prev, this) = (&self.segments[prev_index], &self.segments[cursor]);
            match prev.byte_range {
                Some(prev_range) if prev.uri == this.uri => {
                    preceding = preceding
                        .checked_add(prev_range.length)
                        .ok_or_else(overflow)?;
                    current = prev_range;
                    cursor = prev_index;
                }
                _ => break,
            }
        }

        let start = start.checked_add(preceding).ok_or_else(overflow)?;
        start.checked_add(range.length).ok_or_else(overflow)?;
        Ok(Some((start, range.length)))
    }
}
