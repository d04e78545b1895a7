//! Object stream parsing (PDF 1.5+).
//!
//! Object streams (/Type /ObjStm) hold multiple compressed objects in one
//! stream. The decoded payload starts with /N pairs of integers
//! (object number, byte offset relative to /First), followed by the
//! objects themselves.

use crate::decoders::decode_stream;
use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;

/// Parse an object stream and extract all contained objects.
///
/// Returns a map from object number to parsed object. Streams are not
/// permitted inside object streams, so every entry is a direct object.
pub fn parse_object_stream(stream_obj: &Object) -> Result<HashMap<u32, Object>> {
    let (dict, data) = match stream_obj {
        Object::Stream { dict, data } => (dict, data),
        other => {
            return Err(Error::Decode(format!(
                "expected object stream, got {}",
                other.type_name()
            )));
        },
    };

    if dict.get("Type").and_then(|o| o.as_name()) != Some("ObjStm") {
        return Err(Error::Decode("stream is not /Type /ObjStm".to_string()));
    }

    let count = dict
        .get("N")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::Decode("object stream missing /N".to_string()))? as usize;
    let first = dict
        .get("First")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::Decode("object stream missing /First".to_string()))?
        as usize;

    let decoded = decode_stream(dict, data)?;
    if first > decoded.len() {
        return Err(Error::Decode("object stream /First beyond data".to_string()));
    }

    // Header: N pairs of "obj_num offset"
    let mut header = &decoded[..first];
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let (rest, num_tok) = token(header)
            .map_err(|_| Error::Decode("object stream header truncated".to_string()))?;
        let (rest, off_tok) = token(rest)
            .map_err(|_| Error::Decode("object stream header truncated".to_string()))?;
        match (num_tok, off_tok) {
            (Token::Integer(num), Token::Integer(off)) if num >= 0 && off >= 0 => {
                pairs.push((num as u32, off as usize));
            },
            _ => return Err(Error::Decode("invalid object stream header pair".to_string())),
        }
        header = rest;
    }

    let body = &decoded[first..];
    let mut objects = HashMap::with_capacity(count);
    for (obj_num, offset) in pairs {
        if offset > body.len() {
            return Err(Error::Decode(format!(
                "object {} offset {} beyond object stream data",
                obj_num, offset
            )));
        }
        let (_, obj) = parse_object(&body[offset..]).map_err(|_| Error::ParseError {
            offset: first + offset,
            reason: format!("object {} in object stream", obj_num),
        })?;
        objects.insert(obj_num, obj);
    }

    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn objstm(count: i64, first: i64, payload: &[u8]) -> Object {
        let mut dict = HashMap::new();
        dict.insert("Type".to_string(), Object::Name("ObjStm".to_string()));
        dict.insert("N".to_string(), Object::Integer(count));
        dict.insert("First".to_string(), Object::Integer(first));
        Object::Stream {
            dict,
            data: Bytes::copy_from_slice(payload),
        }
    }

    #[test]
    fn test_extract_objects() {
        // header: "10 0 11 10", first = 11, objects at offsets 0 and 10
        let payload = b"10 0 11 10 << /A 1 >>[1 2 3]";
        let first = 11;
        let objects = parse_object_stream(&objstm(2, first, payload)).unwrap();
        assert_eq!(objects.len(), 2);
        assert!(objects.get(&10).and_then(|o| o.as_dict()).is_some());
        assert_eq!(objects.get(&11).and_then(|o| o.as_array()).map(|a| a.len()), Some(3));
    }

    #[test]
    fn test_rejects_non_objstm() {
        let mut dict = HashMap::new();
        dict.insert("Type".to_string(), Object::Name("XRef".to_string()));
        let obj = Object::Stream {
            dict,
            data: Bytes::new(),
        };
        assert!(parse_object_stream(&obj).is_err());
    }
}
