//! PDF lexer (tokenizer).
//!
//! Low-level tokenization of PDF byte streams: numbers, strings, names,
//! keywords, and delimiters. Whitespace (space, \t, \r, \n, \0, \f) and
//! comments (% to EOL) are skipped before each token.
//!
//! Escape sequences in literal strings are NOT decoded here; the parser
//! decodes them. `#` escapes in names ARE decoded here, per the PDF spec.

use nom::bytes::complete::take_while1;
use nom::IResult;

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real (floating-point) number (e.g., 3.14, -2.5, .5)
    Real(f64),
    /// Literal string bytes (content of "(Hello)", escapes undecoded)
    LiteralString(&'a [u8]),
    /// Hexadecimal string bytes (content of "<48656C6C6F>")
    HexString(&'a [u8]),
    /// Name (e.g., "Type" from "/Type"), # escapes decoded
    Name(String),
    /// Boolean true keyword
    True,
    /// Boolean false keyword
    False,
    /// Null keyword
    Null,
    /// Array start delimiter [
    ArrayStart,
    /// Array end delimiter ]
    ArrayEnd,
    /// Dictionary start delimiter <<
    DictStart,
    /// Dictionary end delimiter >>
    DictEnd,
    /// Indirect object start keyword "obj"
    ObjStart,
    /// Indirect object end keyword "endobj"
    ObjEnd,
    /// Stream start keyword "stream"
    StreamStart,
    /// Stream end keyword "endstream"
    StreamEnd,
    /// Reference keyword "R" (used in "10 0 R")
    R,
}

/// PDF whitespace characters (ISO 32000-1, Table 1).
pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters (ISO 32000-1, Table 2).
pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// Skip whitespace and comments, returning the remaining input.
pub fn skip_ws(mut input: &[u8]) -> &[u8] {
    loop {
        let before = input.len();
        while let Some(&b) = input.first() {
            if is_whitespace(b) {
                input = &input[1..];
            } else {
                break;
            }
        }
        if input.first() == Some(&b'%') {
            while let Some(&b) = input.first() {
                if b == b'\r' || b == b'\n' {
                    break;
                }
                input = &input[1..];
            }
        }
        if input.len() == before {
            return input;
        }
    }
}

fn lex_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))
}

/// Parse the next token from the input.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);
    let first = *input.first().ok_or_else(|| lex_error(input))?;

    match first {
        b'[' => Ok((&input[1..], Token::ArrayStart)),
        b']' => Ok((&input[1..], Token::ArrayEnd)),
        b'<' => {
            if input.get(1) == Some(&b'<') {
                Ok((&input[2..], Token::DictStart))
            } else {
                hex_string(input)
            }
        },
        b'>' => {
            if input.get(1) == Some(&b'>') {
                Ok((&input[2..], Token::DictEnd))
            } else {
                Err(lex_error(input))
            }
        },
        b'(' => literal_string(input),
        b'/' => name(input),
        b'+' | b'-' | b'.' | b'0'..=b'9' => number(input),
        _ => keyword(input),
    }
}

/// Lex a literal string "(...)"; parens nest, backslash escapes the next byte.
fn literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    debug_assert_eq!(input[0], b'(');
    let mut depth = 1usize;
    let mut i = 1;
    while i < input.len() {
        match input[i] {
            b'\\' => i += 1, // skip escaped byte
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[i + 1..], Token::LiteralString(&input[1..i])));
                }
            },
            _ => {},
        }
        i += 1;
    }
    Err(lex_error(input))
}

/// Lex a hex string "<...>".
fn hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    debug_assert_eq!(input[0], b'<');
    for i in 1..input.len() {
        match input[i] {
            b'>' => return Ok((&input[i + 1..], Token::HexString(&input[1..i]))),
            c if c.is_ascii_hexdigit() || is_whitespace(c) => {},
            _ => return Err(lex_error(input)),
        }
    }
    Err(lex_error(input))
}

/// Lex a name "/..."; decodes #xx escapes.
fn name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    debug_assert_eq!(input[0], b'/');
    let rest = &input[1..];
    let end = rest.iter().position(|&b| !is_regular(b)).unwrap_or(rest.len());
    let raw = &rest[..end];

    let mut decoded = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' {
            if let Some(hex) = raw.get(i + 1..i + 3) {
                if let Ok(v) = u8::from_str_radix(std::str::from_utf8(hex).unwrap_or(""), 16) {
                    decoded.push(v as char);
                    i += 3;
                    continue;
                }
            }
        }
        decoded.push(raw[i] as char);
        i += 1;
    }

    Ok((&rest[end..], Token::Name(decoded)))
}

/// Lex a number (integer or real).
fn number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let mut end = 0;
    if matches!(input[0], b'+' | b'-') {
        end = 1;
    }
    let mut seen_dot = false;
    while end < input.len() {
        match input[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            },
            _ => break,
        }
    }
    let text = std::str::from_utf8(&input[..end]).map_err(|_| lex_error(input))?;
    if seen_dot {
        let v: f64 = text.parse().map_err(|_| lex_error(input))?;
        Ok((&input[end..], Token::Real(v)))
    } else {
        let v: i64 = text.parse().map_err(|_| lex_error(input))?;
        Ok((&input[end..], Token::Integer(v)))
    }
}

/// Lex a bare keyword (true, false, null, obj, endobj, stream, endstream, R).
fn keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, word) = take_while1(is_regular)(input)?;
    let tok = match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        b"obj" => Token::ObjStart,
        b"endobj" => Token::ObjEnd,
        b"stream" => Token::StreamStart,
        b"endstream" => Token::StreamEnd,
        b"R" => Token::R,
        _ => return Err(lex_error(input)),
    };
    Ok((rest, tok))
}
