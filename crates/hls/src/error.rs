use thiserror::Error;

use crate::PlaylistKind;

/// Errors that can occur while decoding a playlist.
///
/// Decoding stops at the first violation, so a playlist that produced an
/// error never yields a partially populated document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaylistError {
    #[error("playlist does not start with the #EXTM3U header")]
    MissingHeader,

    #[error("malformed attribute list in {tag}: {reason}")]
    MalformedAttributes { tag: String, reason: String },

    #[error("{tag} repeats attribute {attribute}")]
    DuplicateAttribute { tag: String, attribute: String },

    #[error("{tag} is missing required attribute {attribute}")]
    MissingAttribute { tag: String, attribute: String },

    #[error("{tag} has invalid {attribute} value {value:?}")]
    InvalidValue {
        tag: String,
        attribute: String,
        value: String,
    },

    #[error("{0} may appear at most once per playlist")]
    DuplicateTag(String),

    #[error("{tag} cannot carry both {first} and {second}")]
    MutuallyExclusive {
        tag: String,
        first: String,
        second: String,
    },

    #[error("{tag} is not allowed in a {kind} playlist")]
    WrongPlaylistKind { tag: String, kind: PlaylistKind },

    #[error("#EXT-X-TARGETDURATION is required in a media playlist")]
    MissingTargetDuration,

    #[error("{0} is not followed by a URI line")]
    MissingVariantUri(String),

    #[error("{tag} uses unsupported encryption method {method}")]
    UnsupportedKeyMethod { tag: String, method: String },

    #[error("byte range of segment {0} overflows a 64-bit offset")]
    ByteRangeOverflow(usize),

    #[error("playlist is not valid UTF-8: {0}")]
    Encoding(String),
}

impl PlaylistError {
    pub(crate) fn invalid(tag: &str, attribute: &str, value: &str) -> Self {
        PlaylistError::InvalidValue {
            tag: tag.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    pub(crate) fn missing(tag: &str, attribute: &str) -> Self {
        PlaylistError::MissingAttribute {
            tag: tag.to_string(),
            attribute: attribute.to_string(),
        }
    }
}
