//! Decoding of CEL literal tokens into runtime values.
//!
//! The parser is an external collaborator, out of scope for this crate,
//! and is assumed to hand this crate raw lexeme text exactly as written in
//! source -- `r"\n"`, `b"\x00"`, `0x2Au`, and so on. This module is where
//! that text actually turns into a `String`, `Vec<u8>`, `i64`, `u64`, or
//! `f64`.
//!
//! Grounded in the original implementation's `celstr`/`celbytes` helpers
//! (`original_source/src/celpy/evaluation.py` lines 3765-3869), which share
//! one escape grammar between the string and bytes paths; this module keeps
//! that split, redone with `regex` instead of Python's `re.finditer`.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{EvalError, EvalErrorKind};

fn escape_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\\[abfnrtv"'\\]|\\[0-7]{3}|\\x[0-9a-fA-F]{2}|\\u[0-9a-fA-F]{4}|\\U[0-9a-fA-F]{8}|."#)
            .expect("escape grammar is valid")
    })
}

fn simple_escape(text: &str) -> Option<char> {
    Some(match text {
        r"\a" => '\u{07}',
        r"\b" => '\u{08}',
        r"\f" => '\u{0C}',
        r"\n" => '\n',
        r"\r" => '\r',
        r"\t" => '\t',
        r"\v" => '\u{0B}',
        "\\\"" => '"',
        "\\'" => '\'',
        r"\\" => '\\',
        _ => return None,
    })
}

/// Expands one escape-grammar match into its code point, or `None` if the
/// match is a literal (non-backslash) run that should pass through as-is.
fn expand_one(m: &str) -> Result<u32, EvalError> {
    if let Some(c) = simple_escape(m) {
        return Ok(c as u32);
    }
    let bad = || EvalError::new(EvalErrorKind::InvalidArgument);
    if let Some(hex) = m.strip_prefix("\\x") {
        u32::from_str_radix(hex, 16).map_err(|_| bad())
    } else if let Some(hex) = m.strip_prefix("\\u") {
        u32::from_str_radix(hex, 16).map_err(|_| bad())
    } else if let Some(hex) = m.strip_prefix("\\U") {
        u32::from_str_radix(hex, 16).map_err(|_| bad())
    } else if let Some(oct) = m.strip_prefix('\\') {
        u32::from_str_radix(oct, 8).map_err(|_| bad())
    } else {
        bad_escape_to_char(m)
    }
}

fn bad_escape_to_char(m: &str) -> Result<u32, EvalError> {
    // A plain character matched by the trailing `.` alternative: pass through verbatim.
    m.chars().next().map(|c| c as u32).ok_or_else(|| EvalError::new(EvalErrorKind::InvalidArgument))
}

/// Strips the quote delimiters (and `r`/`R` prefix, if present) from a
/// string-literal lexeme, reporting whether escapes should be expanded.
fn strip_string_delimiters(raw: &str) -> (bool, &str) {
    let (raw_prefix, body) = match raw.as_bytes().first() {
        Some(b'r' | b'R') => (true, &raw[1..]),
        _ => (false, raw),
    };
    let stripped = if body.starts_with("\"\"\"") || body.starts_with("'''") {
        &body[3..body.len() - 3]
    } else {
        &body[1..body.len() - 1]
    };
    (raw_prefix, stripped)
}

/// Decodes a CEL `STRING_LIT`/`MLSTRING_LIT` lexeme, including its quote
/// delimiters and optional `r`/`R` raw prefix, into a Rust `String`.
pub fn decode_string(raw: &str) -> Result<String, EvalError> {
    let (is_raw, body) = strip_string_delimiters(raw);
    if is_raw {
        return Ok(body.to_string());
    }
    let mut out = String::with_capacity(body.len());
    for m in escape_pattern().find_iter(body) {
        let text = m.as_str();
        if text.len() == 1 && !text.starts_with('\\') {
            out.push_str(text);
            continue;
        }
        let code = expand_one(text)?;
        let ch = char::from_u32(code).ok_or_else(|| EvalError::new(EvalErrorKind::InvalidUtf8))?;
        out.push(ch);
    }
    Ok(out)
}

/// Decodes a CEL `BYTES_LIT` lexeme (`b"..."`, `B"..."`, `br"..."`, `rb"..."`,
/// and their case variants) into raw bytes. Escapes that denote a code point
/// above `0xFF` are rejected, matching the original implementation's
/// `ord()`-based byte expansion.
pub fn decode_bytes(raw: &str) -> Result<Vec<u8>, EvalError> {
    let lower = raw.to_ascii_lowercase();
    let is_raw = lower.starts_with("br") || lower.starts_with("rb");
    let prefix_len = if is_raw { 2 } else { 1 };
    let body_with_quotes = &raw[prefix_len..];
    let body = if body_with_quotes.starts_with("\"\"\"") || body_with_quotes.starts_with("'''") {
        &body_with_quotes[3..body_with_quotes.len() - 3]
    } else {
        &body_with_quotes[1..body_with_quotes.len() - 1]
    };
    if is_raw {
        return Ok(body.bytes().collect());
    }
    let mut out = Vec::with_capacity(body.len());
    for m in escape_pattern().find_iter(body) {
        let text = m.as_str();
        if text.len() == 1 && !text.starts_with('\\') {
            out.extend(text.bytes());
            continue;
        }
        let code = expand_one(text)?;
        let byte: u8 = code.try_into().map_err(|_| EvalError::new(EvalErrorKind::RangeError))?;
        out.push(byte);
    }
    Ok(out)
}

/// Parses an `INT_LIT` lexeme (decimal or `0x`/`0X`-prefixed hex, optionally
/// negative).
pub fn parse_int(text: &str) -> Result<i64, EvalError> {
    let bad = || EvalError::new(EvalErrorKind::InvalidArgument);
    let (negative, rest) = text.strip_prefix('-').map_or((false, text), |r| (true, r));
    let magnitude: i64 = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).map_err(|_| bad())?
    } else {
        rest.parse().map_err(|_| bad())?
    };
    if negative { magnitude.checked_neg().ok_or_else(|| EvalError::new(EvalErrorKind::Overflow)) } else { Ok(magnitude) }
}

/// Parses a `UINT_LIT` lexeme, stripping the trailing `u`/`U` suffix.
pub fn parse_uint(text: &str) -> Result<u64, EvalError> {
    let bad = || EvalError::new(EvalErrorKind::InvalidArgument);
    let body = text.strip_suffix(['u', 'U']).ok_or_else(bad)?;
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|_| bad())
    } else {
        body.parse().map_err(|_| bad())
    }
}

/// Parses a `FLOAT_LIT` lexeme.
pub fn parse_float(text: &str) -> Result<f64, EvalError> {
    text.parse().map_err(|_| EvalError::new(EvalErrorKind::InvalidArgument))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_escapes_round_trip() {
        assert_eq!(decode_string(r#""a\nb""#).unwrap(), "a\nb");
        assert_eq!(decode_string(r#""\x41""#).unwrap(), "A");
        assert_eq!(decode_string(r#""A""#).unwrap(), "A");
    }

    #[test]
    fn raw_string_ignores_escapes() {
        assert_eq!(decode_string(r#"r"a\nb""#).unwrap(), r"a\nb");
    }

    #[test]
    fn triple_quoted_strips_three_quotes() {
        assert_eq!(decode_string(r#""""hello""""#).unwrap(), "hello");
    }

    #[test]
    fn bytes_literal_decodes_hex_escape() {
        assert_eq!(decode_bytes(r#"b"\x00\x01""#).unwrap(), vec![0u8, 1u8]);
    }

    #[test]
    fn raw_bytes_literal_ignores_escapes() {
        assert_eq!(decode_bytes(r#"br"\x00""#).unwrap(), br"\x00".to_vec());
    }

    #[test]
    fn hex_int_literal() {
        assert_eq!(parse_int("0x2A").unwrap(), 42);
        assert_eq!(parse_int("-5").unwrap(), -5);
    }

    #[test]
    fn uint_literal_strips_suffix() {
        assert_eq!(parse_uint("42u").unwrap(), 42);
        assert_eq!(parse_uint("0x2Au").unwrap(), 42);
    }
}
