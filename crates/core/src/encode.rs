//! Escaping of the characters that carry meaning inside an encoded template.
//!
//! `/`, `=` and `:` inside a value are written as `\/`, `\=` and `\:`. A backslash
//! only escapes the character after it when that character is one of the three;
//! any other backslash is literal.

use std::borrow::Cow;

#[inline]
pub(crate) fn is_special(b: u8) -> bool {
    matches!(b, b'/' | b'=' | b':')
}

/// Encode a raw value for use inside an encoded template.
pub fn encode_value(value: &str) -> Cow<'_, str> {
    if !value.bytes().any(is_special) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        if c.is_ascii() && is_special(c as u8) {
            out.push('\\');
        }
        out.push(c);
    }
    Cow::Owned(out)
}

/// Decode the escape sequences produced by [`encode_value`].
pub fn decode_value(value: &str) -> Cow<'_, str> {
    if !value.contains('\\') {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii() && is_special(next as u8) {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    Cow::Owned(out)
}

/// Byte offsets of every `delim` in `s` that is not escaped.
///
/// All special characters are ASCII, so byte offsets are always char boundaries.
pub(crate) fn unescaped_positions(s: &str, delim: u8) -> Vec<usize> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() && is_special(bytes[i + 1]) {
            i += 2;
            continue;
        }
        if bytes[i] == delim {
            out.push(i);
        }
        i += 1;
    }
    out
}

/// Split `s` on every unescaped `delim`, keeping escape sequences intact.
pub(crate) fn split_unescaped(s: &str, delim: u8) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for pos in unescaped_positions(s, delim) {
        parts.push(&s[start..pos]);
        start = pos + 1;
    }
    parts.push(&s[start..]);
    parts
}
