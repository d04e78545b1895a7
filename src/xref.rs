//! Cross-reference table and stream parsing.
//!
//! PDFs locate indirect objects through a cross-reference section at the
//! end of the file: either a traditional `xref` table (PDF 1.0+) or a
//! cross-reference stream (/Type /XRef, PDF 1.5+). Revisions chain through
//! the trailer's /Prev entry; hybrid files additionally point at a stream
//! via /XRefStm. This module parses the whole chain into one table, with
//! entries from newer revisions taking precedence.

use crate::decoders::decode_stream;
use crate::error::{Error, Result};
use crate::lexer::{skip_ws, token, Token};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::{HashMap, HashSet};

/// A single cross-reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free entry (object number unused in this revision)
    Free {
        /// Next free object number
        next_free: u64,
        /// Generation to use if the number is reused
        generation: u16,
    },
    /// Object stored uncompressed at a byte offset
    Uncompressed {
        /// Byte offset of "N G obj" from the start of the file
        offset: u64,
        /// Generation number
        generation: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing /ObjStm
        stream_obj: u32,
        /// Index of this object within the stream
        index: u16,
    },
}

/// Merged cross-reference table for a document.
#[derive(Debug, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Option<HashMap<String, Object>>,
}

impl CrossRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the entry for an object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// The trailer dictionary of the newest revision.
    pub fn trailer(&self) -> Option<&HashMap<String, Object>> {
        self.trailer.as_ref()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add an entry unless a newer revision already defined this number.
    fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.entry(object_number).or_insert(entry);
    }

    /// Keep the trailer of the first (newest) section seen.
    fn adopt_trailer(&mut self, trailer: HashMap<String, Object>) {
        if self.trailer.is_none() {
            self.trailer = Some(trailer);
        }
    }
}

/// Find the offset announced by the final `startxref` keyword.
///
/// Searches the last kilobyte of the file for the keyword, then reads the
/// decimal offset on the following line.
pub fn find_startxref(data: &[u8]) -> Result<u64> {
    let tail_start = data.len().saturating_sub(1024);
    let tail = &data[tail_start..];
    let needle = b"startxref";

    let pos = tail
        .windows(needle.len())
        .rposition(|w| w == needle)
        .ok_or(Error::InvalidXref)?;

    let after = &tail[pos + needle.len()..];
    let digits: String = after
        .iter()
        .skip_while(|&&b| crate::lexer::is_whitespace(b))
        .take_while(|&&b| b.is_ascii_digit())
        .map(|&b| b as char)
        .collect();

    digits.parse::<u64>().map_err(|_| Error::InvalidXref)
}

/// Parse the full cross-reference chain starting at `start`.
pub fn load_xref_chain(data: &[u8], start: u64) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::new();
    let mut next = Some(start);
    let mut visited = HashSet::new();

    while let Some(offset) = next {
        if !visited.insert(offset) {
            log::warn!("cross-reference chain loops at offset {}", offset);
            return Err(Error::InvalidXref);
        }
        let trailer = parse_section(data, offset, &mut table)?;

        // Hybrid-reference files carry additional compressed entries in a
        // cross-reference stream named by /XRefStm.
        if let Some(stm_off) = trailer.get("XRefStm").and_then(|o| o.as_integer()) {
            log::debug!("hybrid xref: merging /XRefStm at {}", stm_off);
            parse_stream_section(data, stm_off as u64, &mut table)?;
        }

        next = trailer
            .get("Prev")
            .and_then(|o| o.as_integer())
            .map(|v| v as u64);
        table.adopt_trailer(trailer);
    }

    if table.trailer().is_none() || table.is_empty() {
        return Err(Error::InvalidXref);
    }
    Ok(table)
}

/// Parse one cross-reference section (table or stream), merging entries.
/// Returns the section's trailer dictionary.
fn parse_section(
    data: &[u8],
    offset: u64,
    table: &mut CrossRefTable,
) -> Result<HashMap<String, Object>> {
    let start = offset as usize;
    if start >= data.len() {
        return Err(Error::InvalidXref);
    }
    let section = skip_ws(&data[start..]);
    if section.starts_with(b"xref") {
        parse_table_section(section)
            .map(|(entries, trailer)| {
                for (num, entry) in entries {
                    table.add_entry(num, entry);
                }
                trailer
            })
    } else {
        parse_stream_section(data, offset, table)
    }
}

/// Parse a traditional `xref` table followed by its `trailer` dictionary.
fn parse_table_section(
    section: &[u8],
) -> Result<(Vec<(u32, XRefEntry)>, HashMap<String, Object>)> {
    let mut input = &section[b"xref".len()..];
    let mut entries = Vec::new();

    loop {
        input = skip_ws(input);
        if input.starts_with(b"trailer") {
            input = &input[b"trailer".len()..];
            break;
        }

        // Subsection header: "first count"
        let (rest, first_tok) = token(input).map_err(|_| Error::InvalidXref)?;
        let (rest, count_tok) = token(rest).map_err(|_| Error::InvalidXref)?;
        let (first, count) = match (first_tok, count_tok) {
            (Token::Integer(f), Token::Integer(c)) if f >= 0 && c >= 0 => (f as u32, c as u64),
            _ => return Err(Error::InvalidXref),
        };
        if count > 1_000_000 {
            return Err(Error::InvalidXref);
        }

        input = rest;
        for i in 0..count {
            input = skip_ws(input);
            // Entry: "nnnnnnnnnn ggggg n" (20 bytes nominally, parsed leniently)
            let fields: Vec<&[u8]> = input
                .get(..20.min(input.len()))
                .unwrap_or(&[])
                .split(|b| crate::lexer::is_whitespace(*b))
                .filter(|s| !s.is_empty())
                .collect();
            if fields.len() < 3 {
                return Err(Error::InvalidXref);
            }
            let offset: u64 = parse_ascii_number(fields[0]).ok_or(Error::InvalidXref)?;
            let generation: u16 =
                parse_ascii_number(fields[1]).ok_or(Error::InvalidXref)? as u16;
            let entry = match fields[2] {
                b"n" => XRefEntry::Uncompressed { offset, generation },
                b"f" => XRefEntry::Free {
                    next_free: offset,
                    generation,
                },
                other => {
                    log::warn!(
                        "invalid xref type flag {:?} for object {}",
                        String::from_utf8_lossy(other),
                        first + i as u32
                    );
                    return Err(Error::InvalidXref);
                },
            };
            entries.push((first + i as u32, entry));

            // Advance past the three fields we consumed
            let consumed = (fields[2].as_ptr() as usize - input.as_ptr() as usize)
                + fields[2].len();
            input = &input[consumed..];
        }
    }

    // Trailer dictionary
    let (_, trailer_obj) = parse_object(input).map_err(|_| Error::InvalidXref)?;
    match trailer_obj {
        Object::Dictionary(dict) => Ok((entries, dict)),
        _ => Err(Error::InvalidXref),
    }
}

/// Parse a cross-reference stream section and merge its entries.
/// Returns the stream dictionary, which doubles as the trailer.
fn parse_stream_section(
    data: &[u8],
    offset: u64,
    table: &mut CrossRefTable,
) -> Result<HashMap<String, Object>> {
    let start = offset as usize;
    if start >= data.len() {
        return Err(Error::InvalidXref);
    }
    let input = &data[start..];

    // Indirect wrapper: "N G obj"
    let (rest, _num) = token(input).map_err(|_| Error::InvalidXref)?;
    let (rest, _gen) = token(rest).map_err(|_| Error::InvalidXref)?;
    let (rest, kw) = token(rest).map_err(|_| Error::InvalidXref)?;
    if kw != Token::ObjStart {
        return Err(Error::InvalidXref);
    }

    let (_, obj) = parse_object(rest).map_err(|_| Error::InvalidXref)?;
    let (dict, stream_data) = match obj {
        Object::Stream { dict, data } => (dict, data),
        _ => return Err(Error::InvalidXref),
    };
    if dict.get("Type").and_then(|o| o.as_name()) != Some("XRef") {
        return Err(Error::InvalidXref);
    }

    let widths = dict
        .get("W")
        .and_then(|o| o.as_array())
        .ok_or(Error::InvalidXref)?;
    if widths.len() != 3 {
        return Err(Error::InvalidXref);
    }
    let w: Vec<usize> = widths
        .iter()
        .map(|o| o.as_integer().map(|v| v as usize))
        .collect::<Option<_>>()
        .ok_or(Error::InvalidXref)?;
    let entry_size = w[0] + w[1] + w[2];
    if entry_size == 0 {
        return Err(Error::InvalidXref);
    }

    let size = dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .ok_or(Error::InvalidXref)? as u32;

    let index_ranges: Vec<(u32, u32)> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(arr) => {
            let nums: Vec<i64> = arr
                .iter()
                .map(|o| o.as_integer())
                .collect::<Option<_>>()
                .ok_or(Error::InvalidXref)?;
            nums.chunks(2)
                .map(|pair| match pair {
                    [s, c] => Ok((*s as u32, *c as u32)),
                    _ => Err(Error::InvalidXref),
                })
                .collect::<Result<_>>()?
        },
        None => vec![(0, size)],
    };

    let decoded = decode_stream(&dict, &stream_data)?;

    let mut pos = 0;
    for (first, count) in index_ranges {
        for i in 0..count {
            if pos + entry_size > decoded.len() {
                return Err(Error::InvalidXref);
            }
            let entry_data = &decoded[pos..pos + entry_size];
            pos += entry_size;

            // Field 1 defaults to type 1 when its width is zero
            let entry_type = if w[0] > 0 { read_int(&entry_data[..w[0]]) } else { 1 };
            let field2 = read_int(&entry_data[w[0]..w[0] + w[1]]);
            let field3 = read_int(&entry_data[w[0] + w[1]..]);

            let entry = match entry_type {
                0 => XRefEntry::Free {
                    next_free: field2,
                    generation: field3 as u16,
                },
                1 => XRefEntry::Uncompressed {
                    offset: field2,
                    generation: field3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_obj: field2 as u32,
                    index: field3 as u16,
                },
                other => {
                    log::warn!("invalid xref stream entry type {}", other);
                    return Err(Error::InvalidXref);
                },
            };
            table.add_entry(first + i, entry);
        }
    }

    Ok(dict)
}

/// Read a big-endian integer from up to 8 bytes.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn parse_ascii_number(bytes: &[u8]) -> Option<u64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_TAIL: &[u8] = b"xref\n0 3\n0000000000 65535 f \n0000000010 00000 n \n0000000100 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n0\n%%EOF\n";

    #[test]
    fn test_find_startxref() {
        let data = b"%PDF-1.4\n...\nstartxref\n12345\n%%EOF\n";
        assert_eq!(find_startxref(data).unwrap(), 12345);
    }

    #[test]
    fn test_find_startxref_missing() {
        assert!(matches!(find_startxref(b"no marker here"), Err(Error::InvalidXref)));
    }

    #[test]
    fn test_parse_table_section() {
        let table = load_xref_chain(SIMPLE_TAIL, 0).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.get(1),
            Some(&XRefEntry::Uncompressed {
                offset: 10,
                generation: 0
            })
        );
        assert!(matches!(table.get(0), Some(XRefEntry::Free { .. })));
        let trailer = table.trailer().unwrap();
        assert_eq!(trailer.get("Size").and_then(|o| o.as_integer()), Some(3));
    }

    #[test]
    fn test_prev_chain_newest_wins() {
        // Older section at 0 maps object 1 to offset 100; newer section
        // re-maps it to offset 200 and links back via /Prev.
        let older = b"xref\n0 2\n0000000000 65535 f \n0000000100 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\n";
        let mut data = older.to_vec();
        let newer_off = data.len();
        data.extend_from_slice(
            b"xref\n1 1\n0000000200 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R /Prev 0 >>\n",
        );

        let table = load_xref_chain(&data, newer_off as u64).unwrap();
        assert_eq!(
            table.get(1),
            Some(&XRefEntry::Uncompressed {
                offset: 200,
                generation: 0
            })
        );
    }

    #[test]
    fn test_chain_loop_detected() {
        let looping =
            b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 0 >>\n";
        assert!(matches!(load_xref_chain(looping, 0), Err(Error::InvalidXref)));
    }
}
