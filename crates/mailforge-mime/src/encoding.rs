//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header encoding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Default charset for message text.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Converts text to bytes in the given charset.
///
/// Only UTF-8, US-ASCII and ISO-8859-1 are understood.
///
/// # Errors
///
/// Returns an error if the charset is unknown or cannot represent `text`.
pub fn encode_charset(text: &str, charset: &str) -> Result<Vec<u8>> {
    match normalize_charset(charset).as_str() {
        "utf-8" => Ok(text.as_bytes().to_vec()),
        "us-ascii" if text.is_ascii() => Ok(text.as_bytes().to_vec()),
        "iso-8859-1" => text
            .chars()
            .map(|c| u8::try_from(u32::from(c)).ok())
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| {
                Error::InvalidEncoding(format!("Text not representable in {charset}"))
            }),
        "us-ascii" => Err(Error::InvalidEncoding(format!(
            "Text not representable in {charset}"
        ))),
        _ => Err(Error::InvalidEncoding(format!("Unsupported charset: {charset}"))),
    }
}

/// Converts bytes in the given charset to text.
///
/// # Errors
///
/// Returns an error if the charset is unknown or the bytes are malformed.
pub fn decode_charset(bytes: Vec<u8>, charset: &str) -> Result<String> {
    match normalize_charset(charset).as_str() {
        "utf-8" | "us-ascii" => String::from_utf8(bytes).map_err(Into::into),
        "iso-8859-1" => Ok(bytes.into_iter().map(char::from).collect()),
        _ => Err(Error::InvalidEncoding(format!("Unsupported charset: {charset}"))),
    }
}

fn normalize_charset(charset: &str) -> String {
    match charset.trim().to_ascii_lowercase().as_str() {
        "utf8" | "utf-8" => "utf-8".to_string(),
        "ascii" | "us-ascii" => "us-ascii".to_string(),
        "latin1" | "iso8859-1" | "iso-8859-1" => "iso-8859-1".to_string(),
        other => other.to_string(),
    }
}

/// Maximum line length for Quoted-Printable encoding.
const MAX_LINE_LENGTH: usize = 76;

/// Encodes bytes using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input are kept as CRLF hard breaks; long lines get
/// soft breaks.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> String {
    let mut result = String::new();

    for (index, line) in data.split(|b| *b == b'\n').enumerate() {
        if index > 0 {
            result.push_str("\r\n");
        }
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        encode_qp_line(line, &mut result);
    }

    result
}

fn encode_qp_line(line: &[u8], out: &mut String) {
    let mut line_length = 0;

    for (pos, byte) in line.iter().enumerate() {
        let is_last = pos + 1 == line.len();
        let literal = match byte {
            b'!'..=b'<' | b'>'..=b'~' => true,
            // Trailing whitespace must be encoded
            b' ' | b'\t' => !is_last,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        if line_length + width > MAX_LINE_LENGTH - 1 {
            out.push_str("=\r\n");
            line_length = 0;
        }

        if literal {
            out.push(char::from(*byte));
        } else {
            let _ = write!(out, "={byte:02X}");
        }
        line_length += width;
    }
}

/// Decodes Quoted-Printable text (RFC 2045) into raw bytes.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }

        // Soft line break
        match bytes.get(i + 1..) {
            Some([b'\r', b'\n', ..]) => {
                i += 3;
                continue;
            }
            Some([b'\n', ..]) => {
                i += 2;
                continue;
            }
            _ => {}
        }

        let hex = bytes
            .get(i + 1..i + 3)
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        if !hex.iter().all(u8::is_ascii_hexdigit) {
            return Err(Error::InvalidEncoding(format!(
                "Invalid escape sequence: ={}",
                String::from_utf8_lossy(hex)
            )));
        }
        let hex = std::str::from_utf8(hex)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        let byte = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        result.push(byte);
        i += 3;
    }

    Ok(result)
}

/// Longest encoded word allowed by RFC 2047.
const MAX_ENCODED_WORD: usize = 75;

/// Encodes a header value using RFC 2047 encoding.
///
/// Format: `=?charset?B?encoded-text?=`. Text that needs no encoding is
/// returned unchanged; long text is split into several encoded words
/// separated by a space so the header can be folded between them.
///
/// # Errors
///
/// Returns an error if the charset cannot represent the text.
pub fn encode_rfc2047(text: &str, charset: &str) -> Result<String> {
    // Only encode if necessary (non-ASCII, controls, or text that would
    // read as an encoded word)
    if text.chars().all(|c| c.is_ascii_graphic() || c == ' ') && !text.contains("=?") {
        return Ok(text.to_string());
    }

    let overhead = "=?".len() + charset.len() + "?B?".len() + "?=".len();
    let max_bytes = (MAX_ENCODED_WORD.saturating_sub(overhead) / 4).max(1) * 3;

    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in text.chars() {
        let mut candidate = chunk.clone();
        candidate.push(c);
        if !chunk.is_empty() && encode_charset(&candidate, charset)?.len() > max_bytes {
            words.push(encoded_word(&chunk, charset)?);
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(encoded_word(&chunk, charset)?);
    }

    Ok(words.join(" "))
}

fn encoded_word(text: &str, charset: &str) -> Result<String> {
    let encoded = encode_base64(&encode_charset(text, charset)?);
    Ok(format!("=?{charset}?B?{encoded}?="))
}

/// Decodes an RFC 2047 encoded header value.
///
/// Plain text passes through unchanged. Whitespace between adjacent encoded
/// words is dropped.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut result = String::new();
    let mut rest = text;
    let mut pending_space = String::new();
    let mut previous_was_word = false;

    while let Some(start) = rest.find("=?") {
        let before = &rest[..start];
        let Some(word_len) = find_word_end(&rest[start..]) else {
            break;
        };

        if previous_was_word && before.chars().all(char::is_whitespace) {
            pending_space.clear();
        } else {
            result.push_str(&pending_space);
            pending_space.clear();
            result.push_str(before);
        }

        result.push_str(&decode_word(&rest[start..start + word_len])?);
        previous_was_word = true;
        rest = &rest[start + word_len..];
        let trailing = rest.len() - rest.trim_start().len();
        pending_space.push_str(&rest[..trailing]);
        rest = &rest[trailing..];
    }

    result.push_str(&pending_space);
    result.push_str(rest);
    Ok(result)
}

/// Length of the encoded word at the start of `text`, including delimiters.
fn find_word_end(text: &str) -> Option<usize> {
    // =?charset?X?payload?=
    let mut question_marks = 0;
    for (i, c) in text.char_indices().skip(2) {
        if c == '?' {
            question_marks += 1;
            if question_marks >= 3 && text[i..].starts_with("?=") {
                return Some(i + 2);
            }
        }
    }
    None
}

fn decode_word(word: &str) -> Result<String> {
    let inner = &word[2..word.len() - 2];
    let parts: Vec<&str> = inner.splitn(3, '?').collect();

    let [charset, encoding, encoded_text] = parts.as_slice() else {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    };

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => decode_base64(encoded_text)?,
        // Quoted-Printable with underscore for space
        "Q" => decode_quoted_printable(&encoded_text.replace('_', " "))?,
        other => {
            return Err(Error::InvalidEncoding(format!(
                "Unknown encoding: {other}"
            )));
        }
    };

    decode_charset(bytes, charset)
}
