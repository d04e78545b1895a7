//! In-memory PDF document for signature preparation.
//!
//! A `PdfDocument` is loaded from a complete byte buffer, resolves indirect
//! objects through the cross-reference chain (including compressed objects
//! in object streams), and exposes the handful of lookups the signing path
//! needs: trailer, catalog, first page, next free object number.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::parse_object;
use crate::xref::{find_startxref, load_xref_chain, CrossRefTable, XRefEntry};
use std::collections::HashMap;

const MAX_PAGE_TREE_DEPTH: u32 = 50;

/// A parsed PDF document held in memory.
pub struct PdfDocument {
    data: Vec<u8>,
    version: (u8, u8),
    xref: CrossRefTable,
    trailer: HashMap<String, Object>,
    last_xref_offset: u64,
    cache: HashMap<u32, Object>,
    objstm_cache: HashMap<u32, HashMap<u32, Object>>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("size", &self.data.len())
            .field("xref_entries", &self.xref.len())
            .finish()
    }
}

impl PdfDocument {
    /// Load a document from a complete byte buffer.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let version = parse_header(&data)?;
        let last_xref_offset = find_startxref(&data)?;
        let xref = load_xref_chain(&data, last_xref_offset)?;
        let trailer = xref.trailer().cloned().ok_or(Error::InvalidXref)?;
        log::debug!(
            "loaded PDF {}.{}: {} bytes, {} xref entries",
            version.0,
            version.1,
            data.len(),
            xref.len()
        );
        Ok(Self {
            data,
            version,
            xref,
            trailer,
            last_xref_offset,
            cache: HashMap::new(),
            objstm_cache: HashMap::new(),
        })
    }

    /// The raw document bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// PDF version from the header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Byte offset of the newest cross-reference section.
    pub fn last_xref_offset(&self) -> u64 {
        self.last_xref_offset
    }

    /// Trailer dictionary of the newest revision.
    pub fn trailer(&self) -> &HashMap<String, Object> {
        &self.trailer
    }

    /// Whether the document declares an /Encrypt dictionary.
    pub fn is_encrypted(&self) -> bool {
        self.trailer().contains_key("Encrypt")
    }

    /// First object number not used by any revision (trailer /Size).
    pub fn next_object_id(&self) -> Result<u32> {
        self.trailer()
            .get("Size")
            .and_then(|o| o.as_integer())
            .map(|v| v as u32)
            .ok_or_else(|| Error::ParseError {
                offset: self.last_xref_offset as usize,
                reason: "trailer missing /Size".to_string(),
            })
    }

    /// Reference to the document catalog (trailer /Root).
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.trailer()
            .get("Root")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::ParseError {
                offset: self.last_xref_offset as usize,
                reason: "trailer missing /Root reference".to_string(),
            })
    }

    /// Load the document catalog.
    pub fn catalog(&mut self) -> Result<Object> {
        let root = self.catalog_ref()?;
        self.load_object(root)
    }

    /// The generation number recorded for an object, 0 when unknown.
    pub fn generation_of(&self, id: u32) -> u16 {
        match self.xref.get(id) {
            Some(XRefEntry::Uncompressed { generation, .. }) => *generation,
            _ => 0,
        }
    }

    /// Load an indirect object by reference.
    pub fn load_object(&mut self, reference: ObjectRef) -> Result<Object> {
        if let Some(obj) = self.cache.get(&reference.id) {
            return Ok(obj.clone());
        }

        let entry = *self
            .xref
            .get(reference.id)
            .ok_or(Error::ObjectNotFound(reference.id, reference.gen))?;

        let obj = match entry {
            XRefEntry::Free { .. } => {
                return Err(Error::ObjectNotFound(reference.id, reference.gen));
            },
            XRefEntry::Uncompressed { offset, .. } => {
                self.parse_indirect_at(offset as usize, reference.id)?
            },
            XRefEntry::Compressed { stream_obj, .. } => {
                self.load_from_object_stream(stream_obj, reference.id)?
            },
        };

        self.cache.insert(reference.id, obj.clone());
        Ok(obj)
    }

    /// Resolve one level of indirection: references load, everything else clones.
    pub fn resolve(&mut self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(r) => self.load_object(*r),
            other => Ok(other.clone()),
        }
    }

    /// Reference to the first page of the document.
    pub fn first_page_ref(&mut self) -> Result<ObjectRef> {
        let catalog = self.catalog()?;
        let mut node_ref = catalog
            .as_dict()
            .and_then(|d| d.get("Pages"))
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::ParseError {
                offset: 0,
                reason: "catalog missing /Pages reference".to_string(),
            })?;

        for _ in 0..MAX_PAGE_TREE_DEPTH {
            let node = self.load_object(node_ref)?;
            let dict = node.as_dict().ok_or_else(|| Error::ParseError {
                offset: 0,
                reason: format!("page tree node {} is not a dictionary", node_ref),
            })?;

            match dict.get("Type").and_then(|o| o.as_name()) {
                Some("Page") => return Ok(node_ref),
                _ => {
                    // Intermediate /Pages node: descend into the first kid
                    node_ref = dict
                        .get("Kids")
                        .and_then(|o| o.as_array())
                        .and_then(|kids| kids.first())
                        .and_then(|o| o.as_reference())
                        .ok_or_else(|| Error::ParseError {
                            offset: 0,
                            reason: "page tree node without usable /Kids".to_string(),
                        })?;
                },
            }
        }

        Err(Error::ParseError {
            offset: 0,
            reason: "page tree deeper than supported".to_string(),
        })
    }

    /// Parse "N G obj <object> endobj" at a byte offset.
    fn parse_indirect_at(&self, offset: usize, expected_id: u32) -> Result<Object> {
        if offset >= self.data.len() {
            return Err(Error::UnexpectedEof);
        }
        let input = &self.data[offset..];

        let (rest, num_tok) = token(input).map_err(|_| Error::ParseError {
            offset,
            reason: "expected object number".to_string(),
        })?;
        let (rest, _gen_tok) = token(rest).map_err(|_| Error::ParseError {
            offset,
            reason: "expected generation number".to_string(),
        })?;
        let (rest, kw) = token(rest).map_err(|_| Error::ParseError {
            offset,
            reason: "expected obj keyword".to_string(),
        })?;

        match num_tok {
            Token::Integer(num) if num as u32 == expected_id => {},
            Token::Integer(num) => {
                log::warn!(
                    "xref points object {} at offset {} holding object {}",
                    expected_id,
                    offset,
                    num
                );
                return Err(Error::ObjectNotFound(expected_id, 0));
            },
            _ => {
                return Err(Error::ParseError {
                    offset,
                    reason: "expected object number".to_string(),
                });
            },
        }
        if kw != Token::ObjStart {
            return Err(Error::ParseError {
                offset,
                reason: "expected obj keyword".to_string(),
            });
        }

        let (_, obj) = parse_object(rest).map_err(|_| Error::ParseError {
            offset,
            reason: format!("object {} body", expected_id),
        })?;
        Ok(obj)
    }

    /// Load an object stored inside an object stream.
    fn load_from_object_stream(&mut self, stream_obj: u32, id: u32) -> Result<Object> {
        if !self.objstm_cache.contains_key(&stream_obj) {
            let container = self.load_object(ObjectRef::new(stream_obj, 0))?;
            let objects = parse_object_stream(&container)?;
            self.objstm_cache.insert(stream_obj, objects);
        }
        self.objstm_cache
            .get(&stream_obj)
            .and_then(|objects| objects.get(&id))
            .cloned()
            .ok_or(Error::ObjectNotFound(id, 0))
    }
}

/// Parse the %PDF-M.N header.
fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let prefix = b"%PDF-";
    if !data.starts_with(prefix) {
        let found: String = data
            .iter()
            .take(8)
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        return Err(Error::InvalidHeader(found));
    }
    let rest = &data[prefix.len()..];
    let major = rest.first().copied().filter(u8::is_ascii_digit);
    let minor = rest.get(2).copied().filter(u8::is_ascii_digit);
    match (major, rest.get(1), minor) {
        (Some(maj), Some(b'.'), Some(min)) => Ok((maj - b'0', min - b'0')),
        _ => Err(Error::InvalidHeader(
            String::from_utf8_lossy(&rest[..rest.len().min(3)]).to_string(),
        )),
    }
}

/// Tiny one-page document assembled with correct xref offsets, shared by
/// the unit tests of the PDF modules.
#[cfg(test)]
pub(crate) fn minimal_pdf() -> Vec<u8> {
    let header = b"%PDF-1.4\n".to_vec();
    let mut data = header;
    let mut offsets = Vec::new();

    let objects: Vec<String> = vec![
        "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n".to_string(),
        "2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n".to_string(),
        "3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>\nendobj\n".to_string(),
    ];
    for obj in &objects {
        offsets.push(data.len());
        data.extend_from_slice(obj.as_bytes());
    }

    let xref_offset = data.len();
    data.extend_from_slice(b"xref\n0 4\n0000000000 65535 f \n");
    for off in &offsets {
        data.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    data.extend_from_slice(b"trailer\n<< /Size 4 /Root 1 0 R >>\nstartxref\n");
    data.extend_from_slice(format!("{}\n%%EOF\n", xref_offset).as_bytes());
    data
}
