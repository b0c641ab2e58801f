mod headers;
pub mod progress;
mod size;

pub use self::headers::parse_headers;
pub use self::size::format_bytes;
