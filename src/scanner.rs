//! Markup scanning using memchr
//!
//! A cursor over decoded document text. Delimiter search runs on the raw
//! bytes; every delimiter is ASCII, so the positions it returns are always
//! valid `str` boundaries.

use memchr::{memchr, memchr2, memmem};
use std::borrow::Cow;

/// Cursor over a decoded document
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Scanner { input, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    #[inline]
    pub fn input(&self) -> &'a str {
        self.input
    }

    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    #[inline]
    pub fn starts_with(&self, needle: &str) -> bool {
        self.input[self.pos..].starts_with(needle)
    }

    /// Skip whitespace characters (space, tab, newline, carriage return)
    #[inline]
    pub fn skip_whitespace(&mut self) {
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    /// Consume text up to the next '<' (or end of input)
    pub fn take_text(&mut self) -> &'a str {
        let start = self.pos;
        let end = memchr(b'<', &self.input.as_bytes()[start..])
            .map(|i| start + i)
            .unwrap_or(self.input.len());
        self.pos = end;
        &self.input[start..end]
    }

    /// Consume everything up to `terminator`, then step past it.
    ///
    /// Returns `None` (cursor untouched) when the terminator never appears.
    pub fn take_until(&mut self, terminator: &str) -> Option<&'a str> {
        let start = self.pos;
        let found = memmem::find(&self.input.as_bytes()[start..], terminator.as_bytes())?;
        self.pos = start + found + terminator.len();
        Some(&self.input[start..start + found])
    }

    /// Skip a DOCTYPE body up to its closing '>', stepping over any
    /// bracketed internal subset.
    pub fn skip_doctype(&mut self) -> bool {
        let bytes = self.input.as_bytes();
        let mut depth = 0usize;
        while let Some(i) = memchr2(b'[', b']', &bytes[self.pos..])
            .into_iter()
            .chain(memchr(b'>', &bytes[self.pos..]))
            .min()
        {
            let at = self.pos + i;
            self.pos = at + 1;
            match bytes[at] {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                _ if depth == 0 => return true,
                _ => {}
            }
        }
        self.pos = bytes.len();
        false
    }

    /// Read an XML name (letters, digits, `-`, `_`, `.`, `:` and any non-ASCII)
    pub fn read_name(&mut self) -> Option<&'a str> {
        let bytes = self.input.as_bytes();
        let start = self.pos;

        if !bytes.get(start).copied().is_some_and(is_name_start_char) {
            return None;
        }
        self.pos += 1;
        while self.pos < bytes.len() && is_name_char(bytes[self.pos]) {
            self.pos += 1;
        }

        Some(&self.input[start..self.pos])
    }

    /// Read a quoted attribute value, returning the raw text between quotes
    pub fn read_quoted(&mut self) -> Option<&'a str> {
        let quote = self.peek().filter(|q| *q == b'"' || *q == b'\'')?;
        let start = self.pos + 1;
        let len = memchr(quote, &self.input.as_bytes()[start..])?;
        self.pos = start + len + 1;
        Some(&self.input[start..start + len])
    }
}

#[inline]
fn is_name_start_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

#[inline]
fn is_name_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':') || b >= 0x80
}

/// A reference that cannot be decoded, `offset` bytes into the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityError {
    pub offset: usize,
    pub message: String,
}

/// Decode predefined entities and numeric character references.
///
/// A bare `&`, an undefined entity or an invalid character reference is an
/// error. Borrows when the input holds no '&'.
pub fn decode_entities(input: &str) -> Result<Cow<'_, str>, EntityError> {
    if memchr(b'&', input.as_bytes()).is_none() {
        return Ok(Cow::Borrowed(input));
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = memchr(b'&', rest.as_bytes()) {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let offset = input.len() - rest.len();

        let reference = memchr(b';', rest.as_bytes())
            .map(|semi| &rest[1..semi])
            .filter(|name| !name.is_empty() && name.bytes().all(|b| is_name_char(b) || b == b'#'));
        let Some(name) = reference else {
            return Err(EntityError {
                offset,
                message: "'&' must start an entity reference (use &amp;)".to_string(),
            });
        };

        let decoded = decode_entity(name).ok_or_else(|| EntityError {
            offset,
            message: if name.starts_with('#') {
                format!("invalid character reference '&{};'", name)
            } else {
                format!("undefined entity '&{};'", name)
            },
        })?;
        out.push(decoded);
        rest = &rest[name.len() + 2..];
    }
    out.push_str(rest);

    Ok(Cow::Owned(out))
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let numeric = entity.strip_prefix('#')?;
            let code = match numeric.strip_prefix('x').or_else(|| numeric.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
