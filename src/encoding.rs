//! Input Encoding Detection
//!
//! Detects UTF-8 / UTF-16 from the byte order mark or the first bytes of the
//! document, converts UTF-16 to UTF-8, and rejects declared encodings the
//! builder does not read or that contradict the detected one.

use std::borrow::Cow;

use crate::error::ParseError;

/// Encoding detected from the leading bytes of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl DocumentEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        if input.len() < 2 {
            return DocumentEncoding::Utf8;
        }

        match (input[0], input[1]) {
            (0xFF, 0xFE) => DocumentEncoding::Utf16Le,
            (0xFE, 0xFF) => DocumentEncoding::Utf16Be,
            // No BOM: the first code unit is `<` or whitespace, and the
            // side its NUL byte sits on gives the byte order away
            (0x00, b) if opens_document(b) => DocumentEncoding::Utf16Be,
            (b, 0x00) if opens_document(b) => DocumentEncoding::Utf16Le,
            _ => DocumentEncoding::Utf8,
        }
    }

    pub fn is_utf16(self) -> bool {
        matches!(self, DocumentEncoding::Utf16Le | DocumentEncoding::Utf16Be)
    }

    fn label(self) -> &'static str {
        match self {
            DocumentEncoding::Utf8 => "UTF-8",
            DocumentEncoding::Utf16Le => "UTF-16LE",
            DocumentEncoding::Utf16Be => "UTF-16BE",
        }
    }
}

fn opens_document(b: u8) -> bool {
    matches!(b, b'<' | b' ' | b'\t' | b'\r' | b'\n')
}

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Declared encodings read as UTF-8
const DECLARED_UTF8: &[&str] = &["utf-8", "utf8", "us-ascii", "ascii"];
/// Declared encodings read as UTF-16
const DECLARED_UTF16: &[&str] = &["utf-16", "utf16", "utf-16le", "utf-16be"];

/// Decode raw document bytes into UTF-8 text.
///
/// Borrows the input when it is already UTF-8 (minus any BOM).
pub fn decode(input: &[u8]) -> Result<Cow<'_, str>, ParseError> {
    let encoding = DocumentEncoding::detect(input);
    let text = match encoding {
        DocumentEncoding::Utf8 => {
            let bytes = input.strip_prefix(&UTF8_BOM[..]).unwrap_or(input);
            let text = std::str::from_utf8(bytes).map_err(|e| {
                ParseError::Encoding(format!(
                    "invalid UTF-8 at byte {}",
                    e.valid_up_to() + (input.len() - bytes.len())
                ))
            })?;
            Cow::Borrowed(text)
        }
        DocumentEncoding::Utf16Le => Cow::Owned(decode_utf16(input, [0xFF, 0xFE], u16::from_le_bytes, "LE")?),
        DocumentEncoding::Utf16Be => Cow::Owned(decode_utf16(input, [0xFE, 0xFF], u16::from_be_bytes, "BE")?),
    };

    check_declared_encoding(&text, encoding)?;
    Ok(text)
}

fn decode_utf16(
    input: &[u8],
    bom: [u8; 2],
    to_unit: fn([u8; 2]) -> u16,
    label: &str,
) -> Result<String, ParseError> {
    let bytes = input.strip_prefix(&bom[..]).unwrap_or(input);

    if bytes.len() % 2 != 0 {
        return Err(ParseError::Encoding(format!(
            "invalid UTF-16 {}: odd number of bytes",
            label
        )));
    }

    let code_units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| to_unit([chunk[0], chunk[1]]))
        .collect();

    String::from_utf16(&code_units)
        .map_err(|e| ParseError::Encoding(format!("invalid UTF-16 {}: {}", label, e)))
}

/// Reject an XML declaration that names an encoding we never decode, or one
/// whose width disagrees with the bytes actually read.
fn check_declared_encoding(text: &str, detected: DocumentEncoding) -> Result<(), ParseError> {
    let Some(rest) = text.trim_start().strip_prefix("<?xml") else {
        return Ok(());
    };
    let Some(end) = rest.find("?>") else {
        // Unterminated declaration is a syntax problem, reported by the builder
        return Ok(());
    };
    let declaration = &rest[..end];

    let Some(idx) = declaration.find("encoding") else {
        return Ok(());
    };
    let after = declaration[idx + "encoding".len()..].trim_start();
    let Some(after) = after.strip_prefix('=') else {
        return Ok(());
    };
    let after = after.trim_start();
    let Some(quote) = after.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        return Ok(());
    };
    let value: String = after[1..].chars().take_while(|c| *c != quote).collect();

    let declared = value.to_ascii_lowercase();
    let declares_utf16 = if DECLARED_UTF16.contains(&declared.as_str()) {
        true
    } else if DECLARED_UTF8.contains(&declared.as_str()) {
        false
    } else {
        return Err(ParseError::Encoding(format!(
            "unsupported declared encoding: {}",
            value
        )));
    };

    if declares_utf16 != detected.is_utf16() {
        return Err(ParseError::Encoding(format!(
            "document declares {} but is encoded as {}",
            value,
            detected.label()
        )));
    }
    Ok(())
}
