//! Typed attribute decoding.
//!
//! Each directive that carries an attribute list describes its attributes
//! once, as a table of [`Rule`]s. A rule pairs the attribute name with the
//! value kind it expects and the setter that stores the coerced value, so the
//! master and media decoders share one coercion path and one set of error
//! messages.

use crate::error::PlaylistError;
use crate::lexer::{AttributeList, unquote};
use crate::resolution::Resolution;

/// Expected value kind of an attribute, together with its setter.
pub(crate) enum Setter<T> {
    /// decimal-integer
    Integer(fn(&mut T, u64)),
    /// signed-decimal-floating-point
    Float(fn(&mut T, f64)),
    /// quoted-string, stored without the quotes
    Quoted(fn(&mut T, String)),
    /// hexadecimal-sequence; the setter rejects sequences of the wrong size
    Hex(fn(&mut T, Vec<u8>) -> bool),
    /// enumerated-string; the setter rejects unknown tokens
    Enumerated(fn(&mut T, &str) -> bool),
    /// decimal-resolution
    Resolution(fn(&mut T, Resolution)),
    /// `YES` / `NO`
    YesNo(fn(&mut T, bool)),
}

pub(crate) struct Rule<T> {
    pub name: &'static str,
    pub required: bool,
    pub setter: Setter<T>,
}

impl<T> Rule<T> {
    pub const fn required(name: &'static str, setter: Setter<T>) -> Self {
        Self {
            name,
            required: true,
            setter,
        }
    }

    pub const fn optional(name: &'static str, setter: Setter<T>) -> Self {
        Self {
            name,
            required: false,
            setter,
        }
    }
}

/// Applies `rules` to `attributes`, populating `target`.
///
/// Attributes without a rule are ignored.
pub(crate) fn decode_attributes<T>(
    tag: &str,
    attributes: &AttributeList<'_>,
    rules: &[Rule<T>],
    target: &mut T,
) -> Result<(), PlaylistError> {
    for rule in rules {
        let Some(raw) = attributes.get(rule.name) else {
            if rule.required {
                return Err(PlaylistError::missing(tag, rule.name));
            }
            continue;
        };
        let invalid = || PlaylistError::invalid(tag, rule.name, raw);

        match &rule.setter {
            Setter::Integer(set) => set(target, parse_integer(raw).ok_or_else(invalid)?),
            Setter::Float(set) => set(target, parse_float(raw).ok_or_else(invalid)?),
            Setter::Quoted(set) => set(target, unquote(raw).ok_or_else(invalid)?.to_string()),
            Setter::Hex(set) => {
                let bytes = parse_hex(raw).ok_or_else(invalid)?;
                if !set(target, bytes) {
                    return Err(invalid());
                }
            }
            Setter::Enumerated(set) => {
                if !set(target, raw) {
                    return Err(invalid());
                }
            }
            Setter::Resolution(set) => set(target, raw.parse().map_err(|_| invalid())?),
            Setter::YesNo(set) => match raw {
                "YES" => set(target, true),
                "NO" => set(target, false),
                _ => return Err(invalid()),
            },
        }
    }
    Ok(())
}

pub(crate) fn parse_integer(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

pub(crate) fn parse_float(raw: &str) -> Option<f64> {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    raw.parse().ok()
}

pub(crate) fn parse_hex(raw: &str) -> Option<Vec<u8>> {
    let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
    if digits.is_empty() {
        return None;
    }
    if digits.len() % 2 == 1 {
        hex::decode(format!("0{digits}")).ok()
    } else {
        hex::decode(digits).ok()
    }
}
