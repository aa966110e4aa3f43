//! Java's modified UTF-8, the string encoding of tag names and string tags.
//!
//! It differs from UTF-8 in two places: NUL is written as `C0 80`, and a
//! character outside the Basic Multilingual Plane is written as its two UTF-16
//! surrogates, three bytes each. Every other string encodes identically.

use std::borrow::Cow;

/// Decodes modified UTF-8, also accepting plain UTF-8. Returns `None` for bytes
/// that are neither.
pub(super) fn decode(bytes: &[u8]) -> Option<String> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(text.to_owned());
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while pos < bytes.len() {
        let lead = bytes[pos];
        let (unit, width) = match lead {
            0x00..=0x7f => (u16::from(lead), 1),
            0xc0..=0xdf => {
                let low = continuation(bytes, pos + 1)?;
                ((u16::from(lead & 0x1f) << 6) | low, 2)
            }
            0xe0..=0xef => {
                let mid = continuation(bytes, pos + 1)?;
                let low = continuation(bytes, pos + 2)?;
                ((u16::from(lead & 0x0f) << 12) | (mid << 6) | low, 3)
            }
            _ => return None,
        };
        units.push(unit);
        pos += width;
    }
    String::from_utf16(&units).ok()
}

fn continuation(bytes: &[u8], pos: usize) -> Option<u16> {
    bytes
        .get(pos)
        .filter(|byte| *byte & 0xc0 == 0x80)
        .map(|byte| u16::from(byte & 0x3f))
}

/// Encodes `text`, borrowing its UTF-8 bytes when they are already valid
/// modified UTF-8.
pub(super) fn encode(text: &str) -> Cow<'_, [u8]> {
    if !text.chars().any(|ch| ch == '\0' || u32::from(ch) > 0xffff) {
        return Cow::Borrowed(text.as_bytes());
    }

    let mut out = Vec::with_capacity(text.len() + 8);
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    Cow::Owned(out)
}
