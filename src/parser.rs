//! PDF object parser.
//!
//! Combines tokens from the lexer into complete objects using recursive
//! descent: read a token, decide how to parse, recurse for composite types
//! (arrays, dictionaries). Indirect references ("10 0 R") are recognized by
//! two-token lookahead after an integer.
//!
//! All parsing functions return `IResult` from nom so callers can compose
//! them and report the offset where parsing stopped.

use crate::lexer::{skip_ws, token, Token};
use crate::object::{Object, ObjectRef};
use crate::error::{Error, Result};
use nom::IResult;
use std::collections::HashMap;

fn parse_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))
}

/// Decode escape sequences in PDF literal strings (ISO 32000-1, 7.3.4.2).
///
/// Handles `\n \r \t \b \f \( \) \\`, octal `\ddd` (1-3 digits), and
/// line-continuation (`\` before a newline, which is dropped).
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == b'\\' && i + 1 < raw.len() {
            match raw[i + 1] {
                b'n' => {
                    result.push(b'\n');
                    i += 2;
                },
                b'r' => {
                    result.push(b'\r');
                    i += 2;
                },
                b't' => {
                    result.push(b'\t');
                    i += 2;
                },
                b'b' => {
                    result.push(0x08);
                    i += 2;
                },
                b'f' => {
                    result.push(0x0C);
                    i += 2;
                },
                b'(' | b')' | b'\\' => {
                    result.push(raw[i + 1]);
                    i += 2;
                },
                b'\r' => {
                    // line continuation; \r\n counts as one newline
                    i += 2;
                    if i < raw.len() && raw[i] == b'\n' {
                        i += 1;
                    }
                },
                b'\n' => i += 2,
                b'0'..=b'7' => {
                    let mut value: u32 = 0;
                    let mut digits = 0;
                    i += 1;
                    while digits < 3 && i < raw.len() && (b'0'..=b'7').contains(&raw[i]) {
                        value = value * 8 + (raw[i] - b'0') as u32;
                        digits += 1;
                        i += 1;
                    }
                    result.push(value as u8);
                },
                other => {
                    // unknown escape: PDF spec says ignore the backslash
                    result.push(other);
                    i += 2;
                },
            }
        } else {
            result.push(raw[i]);
            i += 1;
        }
    }

    result
}

/// Decode a hex string body (whitespace allowed, odd length padded with 0).
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let mut digits: Vec<u8> = hex_bytes
        .iter()
        .copied()
        .filter(|b| !crate::lexer::is_whitespace(*b))
        .collect();
    if digits.len() % 2 != 0 {
        digits.push(b'0');
    }
    let mut out = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks(2) {
        let hi = hex_value(pair[0]).ok_or_else(|| Error::Decode("invalid hex digit".to_string()))?;
        let lo = hex_value(pair[1]).ok_or_else(|| Error::Decode("invalid hex digit".to_string()))?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Parse a single PDF object from the input.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (rest, tok) = token(input)?;
    match tok {
        Token::Integer(value) => {
            // Lookahead for "gen R" to form an indirect reference
            if value >= 0 {
                if let Ok((rest2, Token::Integer(gen))) = token(rest) {
                    if (0..=u16::MAX as i64).contains(&gen) {
                        if let Ok((rest3, Token::R)) = token(rest2) {
                            return Ok((
                                rest3,
                                Object::Reference(ObjectRef::new(value as u32, gen as u16)),
                            ));
                        }
                    }
                }
            }
            Ok((rest, Object::Integer(value)))
        },
        Token::Real(value) => Ok((rest, Object::Real(value))),
        Token::LiteralString(raw) => {
            Ok((rest, Object::String(decode_literal_string_escapes(raw))))
        },
        Token::HexString(raw) => {
            let decoded = decode_hex(raw).map_err(|_| parse_error(input))?;
            Ok((rest, Object::String(decoded)))
        },
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Null => Ok((rest, Object::Null)),
        Token::ArrayStart => parse_array(rest),
        Token::DictStart => parse_dictionary(rest),
        _ => Err(parse_error(input)),
    }
}

/// Parse array items up to the closing `]`.
fn parse_array(mut input: &[u8]) -> IResult<&[u8], Object> {
    let mut items = Vec::new();
    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(input) {
            return Ok((rest, Object::Array(items)));
        }
        let (rest, obj) = parse_object(input)?;
        items.push(obj);
        input = rest;
    }
}

/// Parse dictionary entries up to `>>`, then capture stream data if a
/// `stream` keyword follows.
fn parse_dictionary(mut input: &[u8]) -> IResult<&[u8], Object> {
    let mut dict = HashMap::new();
    loop {
        let (rest, tok) = token(input)?;
        match tok {
            Token::DictEnd => {
                input = rest;
                break;
            },
            Token::Name(key) => {
                let (rest, value) = parse_object(rest)?;
                dict.insert(key, value);
                input = rest;
            },
            _ => return Err(parse_error(input)),
        }
    }

    // A stream keyword directly after the dictionary makes this a stream object.
    if let Ok((rest, Token::StreamStart)) = token(input) {
        return parse_stream_data(rest, dict);
    }

    Ok((input, Object::Dictionary(dict)))
}

/// Capture stream data following the `stream` keyword.
///
/// Uses a direct integer `/Length` when present; otherwise (or when the
/// declared length does not land on `endstream`) falls back to scanning
/// for the `endstream` keyword.
fn parse_stream_data(
    input: &[u8],
    dict: HashMap<String, Object>,
) -> IResult<&[u8], Object> {
    // The stream keyword is followed by CRLF or LF (ISO 32000-1, 7.3.8.1)
    let data_start = if input.starts_with(b"\r\n") {
        2
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        1
    } else {
        0
    };
    let body = &input[data_start..];

    if let Some(Object::Integer(len)) = dict.get("Length") {
        let len = *len as usize;
        if len <= body.len() {
            let after = skip_ws(&body[len..]);
            if after.starts_with(b"endstream") {
                return Ok((
                    &after[b"endstream".len()..],
                    Object::Stream {
                        dict,
                        data: bytes::Bytes::copy_from_slice(&body[..len]),
                    },
                ));
            }
        }
        log::debug!("stream /Length {} did not land on endstream, scanning", len);
    }

    // Fallback: scan for the endstream keyword and trim the trailing EOL.
    let pos = find_endstream(body).ok_or_else(|| parse_error(input))?;
    let mut end = pos;
    if end > 0 && body[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && body[end - 1] == b'\r' {
        end -= 1;
    }
    Ok((
        &body[pos + b"endstream".len()..],
        Object::Stream {
            dict,
            data: bytes::Bytes::copy_from_slice(&body[..end]),
        },
    ))
}

/// Find the byte offset of the `endstream` keyword.
fn find_endstream(input: &[u8]) -> Option<usize> {
    let needle = b"endstream";
    input
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse_object(b"42 ").unwrap().1, Object::Integer(42));
        assert_eq!(parse_object(b"3.5 ").unwrap().1, Object::Real(3.5));
        assert_eq!(parse_object(b"true ").unwrap().1, Object::Boolean(true));
        assert_eq!(parse_object(b"null ").unwrap().1, Object::Null);
        assert_eq!(
            parse_object(b"/Catalog ").unwrap().1,
            Object::Name("Catalog".to_string())
        );
    }

    #[test]
    fn test_parse_reference_lookahead() {
        assert_eq!(
            parse_object(b"10 0 R ").unwrap().1,
            Object::Reference(ObjectRef::new(10, 0))
        );
        // Two integers without R stay separate
        let (rest, obj) = parse_object(b"10 0 obj").unwrap();
        assert_eq!(obj, Object::Integer(10));
        assert!(rest.starts_with(b" 0 obj"));
    }

    #[test]
    fn test_parse_strings() {
        assert_eq!(
            parse_object(b"(Hello \\(World\\)) ").unwrap().1,
            Object::String(b"Hello (World)".to_vec())
        );
        assert_eq!(
            parse_object(b"(Section \\247) ").unwrap().1,
            Object::String(b"Section \xa7".to_vec())
        );
        assert_eq!(
            parse_object(b"<48656C6C6F> ").unwrap().1,
            Object::String(b"Hello".to_vec())
        );
        // odd digit count padded with zero
        assert_eq!(parse_object(b"<48F> ").unwrap().1, Object::String(vec![0x48, 0xF0]));
    }

    #[test]
    fn test_parse_array() {
        let (_, obj) = parse_object(b"[1 2 /Three (four)] ").unwrap();
        let arr = obj.as_array().unwrap();
        assert_eq!(arr.len(), 4);
        assert_eq!(arr[0], Object::Integer(1));
        assert_eq!(arr[2], Object::Name("Three".to_string()));
    }

    #[test]
    fn test_parse_dictionary() {
        let (_, obj) = parse_object(b"<< /Type /Page /Parent 2 0 R /Count 3 >> ").unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Type").and_then(|o| o.as_name()), Some("Page"));
        assert_eq!(
            dict.get("Parent").and_then(|o| o.as_reference()),
            Some(ObjectRef::new(2, 0))
        );
        assert_eq!(dict.get("Count").and_then(|o| o.as_integer()), Some(3));
    }

    #[test]
    fn test_parse_stream_with_length() {
        let input = b"<< /Length 5 >>\nstream\nHello\nendstream ";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { dict, data } => {
                assert_eq!(dict.get("Length").and_then(|o| o.as_integer()), Some(5));
                assert_eq!(&data[..], b"Hello");
            },
            other => panic!("expected stream, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_parse_stream_endstream_scan() {
        // /Length missing entirely: scan fallback
        let input = b"<< /Type /XObject >>\nstream\nabcdef\nendstream ";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"abcdef"),
            other => panic!("expected stream, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_nested_structures() {
        let (_, obj) = parse_object(b"<< /Kids [3 0 R] /Nested << /A [1 [2]] >> >> ").unwrap();
        let dict = obj.as_dict().unwrap();
        let kids = dict.get("Kids").and_then(|o| o.as_array()).unwrap();
        assert_eq!(kids[0].as_reference(), Some(ObjectRef::new(3, 0)));
        assert!(dict.get("Nested").and_then(|o| o.as_dict()).is_some());
    }
}
