// HLS (HTTP Live Streaming) playlist decoding
mod attributes;
pub mod decoder;
pub mod error;
pub mod lexer;
pub mod master;
pub mod media;
pub mod playlist;
pub mod resolution;
mod writer;

// Export common types for ease of use
pub use decoder::{classify, decode_master, decode_media};
pub use error::PlaylistError;
pub use lexer::{AttributeList, Line, match_directive, parse_attribute_list, split_lines};
pub use master::{
    ClosedCaptions, HdcpLevel, IFrameVariant, MasterPlaylist, MediaType, Rendition, SessionData,
    SessionValue, Variant,
};
pub use media::{
    ByteRange, InitMap, Key, KeyMaterial, KeyMethod, MediaPlaylist, PlaylistType, Segment,
    StartPoint,
};
pub use playlist::{Playlist, PlaylistKind};
pub use resolution::Resolution;
