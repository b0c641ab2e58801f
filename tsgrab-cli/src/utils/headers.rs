use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{info, warn};

/// Parse a header string in format "Name: Value" and add it to the HeaderMap
pub fn parse_and_add_header(headers: &mut HeaderMap, header_str: &str) {
    let Some((name, value)) = header_str.split_once(':') else {
        warn!(header = header_str, "Invalid header format, expected 'Name: Value'");
        return;
    };
    let (name, value) = (name.trim(), value.trim());

    let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
        warn!(name, "Invalid header name");
        return;
    };
    let Ok(header_value) = HeaderValue::from_str(value) else {
        warn!(value, "Invalid header value");
        return;
    };

    info!("Adding header: {}: {}", name, value);
    headers.insert(header_name, header_value);
}

/// Adds every "Name: Value" string to `base`. Later entries win.
pub fn parse_headers(mut base: HeaderMap, header_strings: &[String]) -> HeaderMap {
    for header_str in header_strings {
        parse_and_add_header(&mut base, header_str);
    }
    base
}
