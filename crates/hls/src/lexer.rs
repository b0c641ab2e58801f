//! Line and attribute-list tokenizer for the playlist text format.
//!
//! The lexer knows nothing about individual directives. It only splits a
//! playlist into lines, tells directives apart from URI lines, and breaks an
//! attribute list into `NAME=value` pairs without interpreting the values.

use crate::error::PlaylistError;

/// Header every playlist must start with.
pub const HEADER: &str = "#EXTM3U";

/// Splits a playlist into trimmed, non-empty lines.
///
/// The first retained line must be the `#EXTM3U` header. The header itself is
/// not part of the returned body.
pub fn split_lines(raw: &str) -> Result<Vec<&str>, PlaylistError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut lines = raw.lines().map(str::trim).filter(|line| !line.is_empty());

    match lines.next() {
        Some(HEADER) => Ok(lines.collect()),
        _ => Err(PlaylistError::MissingHeader),
    }
}

/// One classified playlist line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// `#EXT…[:value]`. The name excludes the leading `#`.
    Tag { name: &'a str, value: Option<&'a str> },
    /// Anything not starting with `#`: a variant or segment URI.
    Uri(&'a str),
    /// A `#` line that is not a directive.
    Comment(&'a str),
}

/// Classifies a single trimmed line.
pub fn match_directive(line: &str) -> Line<'_> {
    let Some(body) = line.strip_prefix('#') else {
        return Line::Uri(line);
    };

    let name_len = body
        .bytes()
        .take_while(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || *b == b'-')
        .count();
    let (name, rest) = body.split_at(name_len);

    if !name.starts_with("EXT") {
        return Line::Comment(line);
    }

    if rest.is_empty() {
        return Line::Tag { name, value: None };
    }

    match rest.strip_prefix(':') {
        Some(value) => Line::Tag {
            name,
            value: (!value.is_empty()).then_some(value),
        },
        None => Line::Comment(line),
    }
}

/// Ordered `NAME=value` pairs of one directive.
///
/// Values are kept verbatim (quotes included); typing happens in the
/// decoder. Unknown names are preserved so callers may inspect them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeList<'a> {
    entries: Vec<(&'a str, &'a str)>,
}

impl<'a> AttributeList<'a> {
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tokenizes an attribute list.
///
/// Quoted strings are consumed as a whole before looking for the next comma,
/// so `CODECS="avc1.4d401f,mp4a.40.2"` stays one value.
pub fn parse_attribute_list<'a>(
    tag: &str,
    text: &'a str,
) -> Result<AttributeList<'a>, PlaylistError> {
    let malformed = |reason: String| PlaylistError::MalformedAttributes {
        tag: tag.to_string(),
        reason,
    };

    let mut list = AttributeList::default();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let eq = rest
            .find('=')
            .ok_or_else(|| malformed(format!("expected NAME=value near {rest:?}")))?;
        let name = rest[..eq].trim();
        if name.is_empty()
            || !name
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(malformed(format!("invalid attribute name {name:?}")));
        }

        let after = rest[eq + 1..].trim_start();
        let (value, remainder) = if let Some(quoted) = after.strip_prefix('"') {
            let close = quoted
                .find('"')
                .ok_or_else(|| malformed(format!("unterminated quoted string for {name}")))?;
            after.split_at(close + 2)
        } else {
            match after.find(',') {
                Some(comma) => after.split_at(comma),
                None => (after, ""),
            }
        };

        let value = value.trim_end();
        if value.is_empty() {
            return Err(malformed(format!("empty value for {name}")));
        }
        if list.contains(name) {
            return Err(PlaylistError::DuplicateAttribute {
                tag: tag.to_string(),
                attribute: name.to_string(),
            });
        }
        list.entries.push((name, value));

        rest = remainder.trim_start();
        if let Some(next) = rest.strip_prefix(',') {
            rest = next.trim_start();
        } else if !rest.is_empty() {
            return Err(malformed(format!("expected ',' after {name}")));
        }
    }

    Ok(list)
}

/// Strips the surrounding double quotes of a quoted-string value.
pub fn unquote(value: &str) -> Option<&str> {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
}
