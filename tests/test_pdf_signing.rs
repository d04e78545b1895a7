//! Integration tests for PDF incremental-update signing.

mod common;

use common::{der_element_len, minimal_pdf, test_pki, PASSPHRASE};
use siae_sign::certstore::CertificateStore;
use siae_sign::signatures::{byterange, verify_detached, SignatureEngine};
use siae_sign::{Error, Object, PdfDocument};
use std::sync::Arc;
use tempfile::TempDir;

fn engine_with_credential() -> (TempDir, SignatureEngine) {
    let pki = test_pki();
    let dir = TempDir::new().expect("create temp dir");
    let store = Arc::new(CertificateStore::new(dir.path().join("certs")).expect("create store"));
    store.configure(&pki.bundle, PASSPHRASE).expect("configure");
    (dir, SignatureEngine::new(store))
}

/// Walk catalog → AcroForm → field → /V to the signature dictionary of the
/// newest revision.
fn signature_dictionary(signed: &[u8]) -> (PdfDocument, Object) {
    let mut doc = PdfDocument::from_bytes(signed.to_vec()).expect("signed PDF parses");
    let catalog = doc.catalog().expect("catalog");
    let field_ref = catalog
        .as_dict()
        .and_then(|d| d.get("AcroForm"))
        .and_then(|o| o.as_dict())
        .and_then(|form| form.get("Fields"))
        .and_then(|o| o.as_array())
        .and_then(|fields| fields.first())
        .and_then(|o| o.as_reference())
        .expect("signature field reference");
    let field = doc.load_object(field_ref).expect("field object");
    let sig_ref = field
        .as_dict()
        .and_then(|d| d.get("V"))
        .and_then(|o| o.as_reference())
        .expect("/V reference");
    let sig = doc.load_object(sig_ref).expect("signature dictionary");
    (doc, sig)
}

#[test]
fn test_signed_pdf_preserves_original_bytes() {
    let (_dir, engine) = engine_with_credential();
    let original = minimal_pdf();

    let signed = engine.sign_pdf(&original).expect("sign");
    assert!(signed.len() > original.len());
    assert_eq!(
        &signed[..original.len()],
        &original[..],
        "incremental update must be append-only"
    );
}

#[test]
fn test_embedded_signature_validates_against_byte_range() {
    let (_dir, engine) = engine_with_credential();
    let signed = engine.sign_pdf(&minimal_pdf()).expect("sign");

    let (_doc, sig) = signature_dictionary(&signed);
    let sig_dict = sig.as_dict().expect("signature is a dictionary");

    assert_eq!(
        sig_dict.get("Filter").and_then(|o| o.as_name()),
        Some("Adobe.PPKLite")
    );
    assert_eq!(
        sig_dict.get("SubFilter").and_then(|o| o.as_name()),
        Some("adbe.pkcs7.detached")
    );
    assert_eq!(
        sig_dict.get("Name").and_then(|o| o.as_string()),
        Some(b"SIAE - Sistema Integrado".as_slice())
    );

    // Declared byte range covers the whole file minus the placeholder
    let range_values: Vec<i64> = sig_dict
        .get("ByteRange")
        .and_then(|o| o.as_array())
        .expect("/ByteRange array")
        .iter()
        .filter_map(|o| o.as_integer())
        .collect();
    let range: [i64; 4] = range_values.as_slice().try_into().expect("four integers");
    byterange::validate(&range, signed.len()).expect("byte range consistent");

    // The hex /Contents holds the DER signature plus zero padding
    let contents = sig_dict
        .get("Contents")
        .and_then(|o| o.as_string())
        .expect("/Contents string");
    let der_len = der_element_len(contents);
    assert!(der_len <= contents.len());
    assert!(
        contents[der_len..].iter().all(|&b| b == 0),
        "placeholder tail is zero padding"
    );

    let covered = byterange::extract(&signed, &range).expect("extract covered bytes");
    assert!(
        verify_detached(&contents[..der_len], &covered).expect("verify"),
        "embedded signature must validate over the declared byte range"
    );
}

#[test]
fn test_signature_panel_metadata_reaches_the_document() {
    let pki = test_pki();
    let dir = TempDir::new().expect("create temp dir");
    let store = Arc::new(CertificateStore::new(dir.path().join("certs")).expect("create store"));
    store.configure(&pki.bundle, PASSPHRASE).expect("configure");

    let options = siae_sign::SignOptions::default()
        .with_reason("Despacho final")
        .with_location("Setor Jurídico");
    let engine = SignatureEngine::with_options(store, options);

    let signed = engine.sign_pdf(&minimal_pdf()).expect("sign");
    let (_doc, sig) = signature_dictionary(&signed);
    let sig_dict = sig.as_dict().expect("dictionary");

    assert_eq!(
        sig_dict.get("Reason").and_then(|o| o.as_string()),
        Some(b"Despacho final".as_slice())
    );
    assert_eq!(
        sig_dict.get("Location").and_then(|o| o.as_string()),
        Some("Setor Jurídico".as_bytes())
    );
    // Signing time in PDF date format
    let date = sig_dict.get("M").and_then(|o| o.as_string()).expect("/M");
    assert!(date.starts_with(b"D:20"));
}

#[test]
fn test_sign_twice_keeps_first_signature_bytes() {
    let (_dir, engine) = engine_with_credential();
    let once = engine.sign_pdf(&minimal_pdf()).expect("first signature");
    let twice = engine.sign_pdf(&once).expect("second signature");

    assert_eq!(
        &twice[..once.len()],
        &once[..],
        "second signature must not disturb the first revision"
    );

    // Newest revision sees both fields
    let mut doc = PdfDocument::from_bytes(twice).expect("parse");
    let catalog = doc.catalog().expect("catalog");
    let fields = catalog
        .as_dict()
        .and_then(|d| d.get("AcroForm"))
        .and_then(|o| o.as_dict())
        .and_then(|form| form.get("Fields"))
        .and_then(|o| o.as_array())
        .cloned()
        .expect("fields");
    assert_eq!(fields.len(), 2);
}

#[test]
fn test_malformed_input_is_rejected() {
    let (_dir, engine) = engine_with_credential();

    let err = engine.sign_pdf(b"this is not a pdf").unwrap_err();
    assert!(matches!(err, Error::MalformedPdf(_)), "got {:?}", err);

    // Structurally broken xref
    let err = engine
        .sign_pdf(b"%PDF-1.4\ngarbage\nstartxref\n2\n%%EOF\n")
        .unwrap_err();
    assert!(matches!(err, Error::MalformedPdf(_)), "got {:?}", err);
}

#[test]
fn test_signing_without_credential_fails_before_parsing() {
    let dir = TempDir::new().expect("create temp dir");
    let store = Arc::new(CertificateStore::new(dir.path().join("certs")).expect("create store"));
    let engine = SignatureEngine::new(store);

    // Even an unparseable input reports the missing credential first
    assert!(matches!(
        engine.sign_pdf(b"not a pdf"),
        Err(Error::NotConfigured)
    ));
}
