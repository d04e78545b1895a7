//! Stream decoding for cross-reference and object streams.
//!
//! The signing path only ever decodes FlateDecode streams (optionally with
//! a PNG predictor, which cross-reference streams almost always use).
//! Other filters are reported as unsupported.

use crate::error::{Error, Result};
use crate::object::Object;
use flate2::read::ZlibDecoder;
use std::collections::HashMap;
use std::io::Read;

/// Decode parameters extracted from /DecodeParms.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 10-15 = PNG filters)
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Extract decode parameters from a /DecodeParms object (dictionary or
    /// array of dictionaries; only the first entry is consulted).
    pub fn from_object(obj: &Object) -> Option<Self> {
        let dict = match obj {
            Object::Dictionary(d) => d,
            Object::Array(arr) => match arr.first() {
                Some(Object::Dictionary(d)) => d,
                _ => return None,
            },
            _ => return None,
        };

        Some(Self {
            predictor: dict.get("Predictor").and_then(|o| o.as_integer()).unwrap_or(1),
            columns: dict.get("Columns").and_then(|o| o.as_integer()).unwrap_or(1) as usize,
            colors: dict.get("Colors").and_then(|o| o.as_integer()).unwrap_or(1) as usize,
            bits_per_component: dict
                .get("BitsPerComponent")
                .and_then(|o| o.as_integer())
                .unwrap_or(8) as usize,
        })
    }
}

/// Decode a stream's data according to its dictionary (/Filter, /DecodeParms).
pub fn decode_stream(dict: &HashMap<String, Object>, data: &[u8]) -> Result<Vec<u8>> {
    let filter = match dict.get("Filter") {
        None => return Ok(data.to_vec()),
        Some(Object::Name(name)) => name.clone(),
        Some(Object::Array(arr)) => {
            if arr.len() != 1 {
                return Err(Error::Unsupported("filter chains".to_string()));
            }
            match arr.first() {
                Some(Object::Name(name)) => name.clone(),
                _ => return Err(Error::Decode("invalid /Filter array".to_string())),
            }
        },
        Some(_) => return Err(Error::Decode("invalid /Filter".to_string())),
    };

    if filter != "FlateDecode" {
        return Err(Error::Unsupported(format!("filter /{}", filter)));
    }

    let inflated = inflate(data)?;

    let params = dict
        .get("DecodeParms")
        .and_then(DecodeParams::from_object)
        .unwrap_or_default();

    match params.predictor {
        1 => Ok(inflated),
        10..=15 => unfilter_png(&inflated, &params),
        other => Err(Error::Unsupported(format!("predictor {}", other))),
    }
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Decode(format!("FlateDecode: {}", e)))?;
    Ok(out)
}

/// Reverse PNG row filtering (predictors 10-15).
///
/// Each row is prefixed with one filter-type byte; bytes-per-pixel for the
/// Sub/Average/Paeth filters is colors * bits_per_component / 8 (minimum 1).
fn unfilter_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let bpp = (params.colors * params.bits_per_component).div_ceil(8).max(1);
    let row_len = (params.columns * params.colors * params.bits_per_component).div_ceil(8);
    let stride = row_len + 1;
    if row_len == 0 || data.len() % stride != 0 {
        return Err(Error::Decode("PNG predictor: bad row stride".to_string()));
    }

    let mut out = Vec::with_capacity((data.len() / stride) * row_len);
    let mut prev_row = vec![0u8; row_len];

    for chunk in data.chunks(stride) {
        let filter_type = chunk[0];
        let mut row = chunk[1..].to_vec();
        match filter_type {
            0 => {},
            1 => {
                for i in bpp..row_len {
                    row[i] = row[i].wrapping_add(row[i - bpp]);
                }
            },
            2 => {
                for i in 0..row_len {
                    row[i] = row[i].wrapping_add(prev_row[i]);
                }
            },
            3 => {
                for i in 0..row_len {
                    let left = if i >= bpp { row[i - bpp] as u16 } else { 0 };
                    let up = prev_row[i] as u16;
                    row[i] = row[i].wrapping_add(((left + up) / 2) as u8);
                }
            },
            4 => {
                for i in 0..row_len {
                    let left = if i >= bpp { row[i - bpp] } else { 0 };
                    let up = prev_row[i];
                    let up_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    row[i] = row[i].wrapping_add(paeth(left, up, up_left));
                }
            },
            other => {
                return Err(Error::Decode(format!("PNG predictor: filter type {}", other)));
            },
        }
        out.extend_from_slice(&row);
        prev_row = row;
    }

    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
