//! Two-phase PDF signature embedding.
//!
//! Adding a signature to a PDF must not rewrite the document: prior bytes
//! (and any prior signatures) are preserved verbatim and everything new is
//! appended as an incremental update. The flow is explicit two-phase:
//!
//! 1. [`reserve_signature_field`] assembles the complete updated byte
//!    sequence (signature dictionary with a zeroed `/Contents`
//!    placeholder and final `/ByteRange`, the field widget, the updated
//!    first page and catalog, a cross-reference section and trailer) and
//!    reports the exact byte ranges the signature must cover.
//! 2. [`finalize_signature`] pads the DER signature into the placeholder.
//!
//! The caller computes the signature over [`PreparedPdf::signed_bytes`]
//! between the two phases.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::serialize::ObjectSerializer;
use crate::signatures::byterange;
use crate::signatures::types::SignOptions;
use chrono::Utc;
use std::collections::HashMap;
use std::io::Write;

/// Signature handler name required by Adobe-compatible viewers.
pub const FILTER_ADOBE_PPKLITE: &str = "Adobe.PPKLite";
/// Detached PKCS#7 sub-filter.
pub const SUBFILTER_ADBE_PKCS7_DETACHED: &str = "adbe.pkcs7.detached";

const SIGNATURE_FIELD_NAME: &str = "Signature1";
// Annotation flags: Print (4) + Locked (128)
const WIDGET_FLAGS: i64 = 132;
// SignaturesExist (1) + AppendOnly (2)
const SIG_FLAGS: i64 = 3;

/// A document with a reserved signature field, ready to be signed.
#[derive(Debug)]
pub struct PreparedPdf {
    bytes: Vec<u8>,
    byte_range: [i64; 4],
    contents_offset: usize,
    placeholder: usize,
}

impl PreparedPdf {
    /// The assembled (not yet signed) document bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The byte ranges the signature covers.
    pub fn byte_range(&self) -> &[i64; 4] {
        &self.byte_range
    }

    /// The exact bytes to sign: the document minus the placeholder.
    pub fn signed_bytes(&self) -> Result<Vec<u8>> {
        byterange::extract(&self.bytes, &self.byte_range)
    }
}

/// Reserve a signature field in the document, appending an incremental
/// update. The input bytes are preserved unchanged as a prefix of the
/// result.
pub fn reserve_signature_field(pdf_bytes: &[u8], options: &SignOptions) -> Result<PreparedPdf> {
    let mut doc = PdfDocument::from_bytes(pdf_bytes.to_vec())?;
    if doc.is_encrypted() {
        return Err(Error::Unsupported(
            "signing encrypted documents".to_string(),
        ));
    }

    let catalog_ref = doc.catalog_ref()?;
    let page_ref = doc.first_page_ref()?;
    let next_id = doc.next_object_id()?;
    let sig_id = next_id;
    let field_id = next_id + 1;
    let field_ref = ObjectSerializer::reference(field_id, 0);

    // Objects rewritten (or created) by this revision, beside the
    // signature dictionary itself
    let mut updates: Vec<(u32, u16, Object)> = Vec::new();

    // Merged signature field + widget annotation, invisible (zero rect)
    updates.push((
        field_id,
        0,
        ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Annot")),
            ("Subtype", ObjectSerializer::name("Widget")),
            ("FT", ObjectSerializer::name("Sig")),
            ("T", ObjectSerializer::string(SIGNATURE_FIELD_NAME)),
            ("V", ObjectSerializer::reference(sig_id, 0)),
            ("F", ObjectSerializer::integer(WIDGET_FLAGS)),
            (
                "Rect",
                ObjectSerializer::array(vec![
                    ObjectSerializer::integer(0),
                    ObjectSerializer::integer(0),
                    ObjectSerializer::integer(0),
                    ObjectSerializer::integer(0),
                ]),
            ),
            ("P", Object::Reference(page_ref)),
        ]),
    ));

    attach_widget_to_page(&mut doc, page_ref, field_ref.clone(), &mut updates)?;
    attach_field_to_acroform(&mut doc, catalog_ref, field_ref, &mut updates)?;

    assemble_update(&doc, pdf_bytes, options, sig_id, field_id, catalog_ref, updates)
}

/// Fill the reserved placeholder with the hex-encoded signature and return
/// the final document bytes.
pub fn finalize_signature(mut prepared: PreparedPdf, signature_der: &[u8]) -> Result<Vec<u8>> {
    byterange::insert_signature(
        &mut prepared.bytes,
        prepared.contents_offset,
        prepared.placeholder,
        signature_der,
    )?;
    log::debug!(
        "embedded {}-byte signature, byte range {:?}",
        signature_der.len(),
        prepared.byte_range
    );
    Ok(prepared.bytes)
}

/// Add the widget to the first page's /Annots, rewriting the page or the
/// referenced annotation array, whichever owns the list.
fn attach_widget_to_page(
    doc: &mut PdfDocument,
    page_ref: ObjectRef,
    widget_ref: Object,
    updates: &mut Vec<(u32, u16, Object)>,
) -> Result<()> {
    let page = doc.load_object(page_ref)?;
    let mut page_dict = page
        .as_dict()
        .cloned()
        .ok_or_else(|| Error::MalformedPdf("first page is not a dictionary".to_string()))?;

    match page_dict.get("Annots").cloned() {
        Some(Object::Reference(annots_ref)) => {
            let annots = doc.load_object(annots_ref)?;
            let mut items = annots.as_array().cloned().ok_or_else(|| {
                Error::MalformedPdf("page /Annots reference is not an array".to_string())
            })?;
            items.push(widget_ref);
            updates.push((
                annots_ref.id,
                doc.generation_of(annots_ref.id),
                Object::Array(items),
            ));
        },
        Some(Object::Array(mut items)) => {
            items.push(widget_ref);
            page_dict.insert("Annots".to_string(), Object::Array(items));
            updates.push((
                page_ref.id,
                doc.generation_of(page_ref.id),
                Object::Dictionary(page_dict),
            ));
        },
        None => {
            page_dict.insert("Annots".to_string(), Object::Array(vec![widget_ref]));
            updates.push((
                page_ref.id,
                doc.generation_of(page_ref.id),
                Object::Dictionary(page_dict),
            ));
        },
        Some(other) => {
            return Err(Error::MalformedPdf(format!(
                "page /Annots is {}",
                other.type_name()
            )));
        },
    }
    Ok(())
}

/// Register the field in the catalog's /AcroForm, creating the form
/// dictionary when absent and following references when present.
fn attach_field_to_acroform(
    doc: &mut PdfDocument,
    catalog_ref: ObjectRef,
    field_ref: Object,
    updates: &mut Vec<(u32, u16, Object)>,
) -> Result<()> {
    let catalog = doc.catalog()?;
    let mut catalog_dict = catalog
        .as_dict()
        .cloned()
        .ok_or_else(|| Error::MalformedPdf("catalog is not a dictionary".to_string()))?;

    match catalog_dict.get("AcroForm").cloned() {
        None => {
            catalog_dict.insert(
                "AcroForm".to_string(),
                ObjectSerializer::dict(vec![
                    ("Fields", Object::Array(vec![field_ref])),
                    ("SigFlags", ObjectSerializer::integer(SIG_FLAGS)),
                ]),
            );
            updates.push((
                catalog_ref.id,
                doc.generation_of(catalog_ref.id),
                Object::Dictionary(catalog_dict),
            ));
        },
        Some(Object::Dictionary(mut form)) => {
            add_field(doc, &mut form, field_ref, updates)?;
            catalog_dict.insert("AcroForm".to_string(), Object::Dictionary(form));
            updates.push((
                catalog_ref.id,
                doc.generation_of(catalog_ref.id),
                Object::Dictionary(catalog_dict),
            ));
        },
        Some(Object::Reference(form_ref)) => {
            let form_obj = doc.load_object(form_ref)?;
            let mut form = form_obj.as_dict().cloned().ok_or_else(|| {
                Error::MalformedPdf("/AcroForm reference is not a dictionary".to_string())
            })?;
            add_field(doc, &mut form, field_ref, updates)?;
            updates.push((
                form_ref.id,
                doc.generation_of(form_ref.id),
                Object::Dictionary(form),
            ));
        },
        Some(other) => {
            return Err(Error::MalformedPdf(format!(
                "catalog /AcroForm is {}",
                other.type_name()
            )));
        },
    }
    Ok(())
}

/// Append the field to a form dictionary's /Fields and force SigFlags.
fn add_field(
    doc: &mut PdfDocument,
    form: &mut HashMap<String, Object>,
    field_ref: Object,
    updates: &mut Vec<(u32, u16, Object)>,
) -> Result<()> {
    match form.get("Fields").cloned() {
        Some(Object::Reference(fields_ref)) => {
            let fields_obj = doc.load_object(fields_ref)?;
            let mut fields = fields_obj.as_array().cloned().ok_or_else(|| {
                Error::MalformedPdf("/AcroForm /Fields reference is not an array".to_string())
            })?;
            fields.push(field_ref);
            updates.push((
                fields_ref.id,
                doc.generation_of(fields_ref.id),
                Object::Array(fields),
            ));
        },
        Some(Object::Array(mut fields)) => {
            fields.push(field_ref);
            form.insert("Fields".to_string(), Object::Array(fields));
        },
        None => {
            form.insert("Fields".to_string(), Object::Array(vec![field_ref]));
        },
        Some(other) => {
            return Err(Error::MalformedPdf(format!(
                "/AcroForm /Fields is {}",
                other.type_name()
            )));
        },
    }
    form.insert("SigFlags".to_string(), ObjectSerializer::integer(SIG_FLAGS));
    Ok(())
}

/// Append the incremental section and patch the final byte range.
fn assemble_update(
    doc: &PdfDocument,
    pdf_bytes: &[u8],
    options: &SignOptions,
    sig_id: u32,
    field_id: u32,
    catalog_ref: ObjectRef,
    updates: Vec<(u32, u16, Object)>,
) -> Result<PreparedPdf> {
    let placeholder = byterange::placeholder_size(options.estimated_size);
    let serializer = ObjectSerializer::new();

    let mut out = pdf_bytes.to_vec();
    if out.last() != Some(&b'\n') {
        out.push(b'\n');
    }

    let mut xref_entries: Vec<(u32, u64, u16)> = Vec::new();

    // Signature dictionary with tracked placeholder offsets
    let sig_offset = out.len();
    let (sig_bytes, contents_rel, byterange_rel) =
        build_signature_object(sig_id, options, placeholder);
    xref_entries.push((sig_id, sig_offset as u64, 0));
    out.extend_from_slice(&sig_bytes);
    let contents_offset = sig_offset + contents_rel;
    let byterange_offset = sig_offset + byterange_rel;

    for (id, gen, obj) in &updates {
        xref_entries.push((*id, out.len() as u64, *gen));
        out.extend_from_slice(&serializer.serialize_indirect(*id, *gen, obj));
    }

    // Cross-reference section for this revision
    let xref_offset = out.len();
    out.extend_from_slice(b"xref\n");
    xref_entries.sort_by_key(|(id, _, _)| *id);
    let mut i = 0;
    while i < xref_entries.len() {
        let mut j = i + 1;
        while j < xref_entries.len() && xref_entries[j].0 == xref_entries[j - 1].0 + 1 {
            j += 1;
        }
        let _ = write!(out, "{} {}\n", xref_entries[i].0, j - i);
        for (_, offset, gen) in &xref_entries[i..j] {
            let _ = write!(out, "{:010} {:05} n \n", offset, gen);
        }
        i = j;
    }

    // Trailer chains back to the previous cross-reference section
    let mut trailer = HashMap::new();
    trailer.insert(
        "Size".to_string(),
        ObjectSerializer::integer((field_id + 1) as i64),
    );
    trailer.insert("Root".to_string(), Object::Reference(catalog_ref));
    trailer.insert(
        "Prev".to_string(),
        ObjectSerializer::integer(doc.last_xref_offset() as i64),
    );
    for key in ["ID", "Info"] {
        if let Some(value) = doc.trailer().get(key) {
            trailer.insert(key.to_string(), value.clone());
        }
    }

    out.extend_from_slice(b"trailer\n");
    out.extend_from_slice(&serializer.serialize(&Object::Dictionary(trailer)));
    let _ = write!(out, "\nstartxref\n{}\n%%EOF\n", xref_offset);

    // Patch the byte range now that the total size is known
    let byte_range = byterange::compute(out.len(), contents_offset, placeholder);
    let patch = format!(
        "[0 {:010} {:010} {:010}]",
        byte_range[1], byte_range[2], byte_range[3]
    );
    if patch.len() != BYTERANGE_REGION.len() {
        return Err(Error::MalformedPdf(
            "document too large for signature byte range".to_string(),
        ));
    }
    out[byterange_offset..byterange_offset + patch.len()].copy_from_slice(patch.as_bytes());
    byterange::validate(&byte_range, out.len())?;

    log::debug!(
        "reserved signature field: objects {} and {}, update of {} bytes",
        sig_id,
        field_id,
        out.len() - pdf_bytes.len()
    );

    Ok(PreparedPdf {
        bytes: out,
        byte_range,
        contents_offset,
        placeholder,
    })
}

// Fixed-width placeholder patched in place once the file size is known
const BYTERANGE_REGION: &[u8] = b"[0 0000000000 0000000000 0000000000]";

/// Serialize the signature dictionary, returning the bytes plus the
/// relative offsets of the `/Contents` placeholder and `/ByteRange` array.
fn build_signature_object(
    sig_id: u32,
    options: &SignOptions,
    placeholder: usize,
) -> (Vec<u8>, usize, usize) {
    let serializer = ObjectSerializer::new();
    let mut buf = Vec::new();
    let _ = write!(
        buf,
        "{} 0 obj\n<< /Type /Sig /Filter /{} /SubFilter /{}\n",
        sig_id, FILTER_ADOBE_PPKLITE, SUBFILTER_ADBE_PKCS7_DETACHED
    );

    let text_fields = [
        ("Name", &options.name),
        ("Reason", &options.reason),
        ("Location", &options.location),
        ("ContactInfo", &options.contact_info),
    ];
    for (key, value) in text_fields {
        if let Some(value) = value {
            let _ = write!(buf, "/{} ", key);
            buf.extend_from_slice(&serializer.serialize(&ObjectSerializer::string(value)));
            buf.push(b'\n');
        }
    }

    let _ = write!(buf, "/M ({})\n", pdf_date_now());

    buf.extend_from_slice(b"/ByteRange ");
    let byterange_rel = buf.len();
    buf.extend_from_slice(BYTERANGE_REGION);
    buf.push(b'\n');

    buf.extend_from_slice(b"/Contents ");
    let contents_rel = buf.len();
    buf.push(b'<');
    buf.resize(buf.len() + placeholder - 2, b'0');
    buf.push(b'>');
    buf.extend_from_slice(b"\n>>\nendobj\n");

    (buf, contents_rel, byterange_rel)
}

/// Current time as a PDF date string (ISO 32000-1, 7.9.4).
fn pdf_date_now() -> String {
    format!("D:{}+00'00'", Utc::now().format("%Y%m%d%H%M%S"))
}
