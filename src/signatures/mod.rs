//! Digital-signature pipeline.
//!
//! Two byte-level concerns live here, both consumed by the document
//! workflow whenever a process transitions to a state requiring the
//! institutional signature:
//!
//! - **Detached CMS/PKCS#7 signing** of arbitrary content: SHA-256 digest,
//!   RSA PKCS#1 v1.5, signer identified by issuer + serial, certificate
//!   chain embedded, content itself never included (detached).
//! - **PDF signature embedding**: a reserved signature field appended as
//!   an incremental update whose `/ByteRange` excludes exactly the
//!   `/Contents` placeholder, so the output validates in standard PDF
//!   viewers and prior revisions (including prior signatures) survive
//!   byte-for-byte.
//!
//! The PDF path is an explicit two-phase API, reserve then finalize,
//! with the bytes to sign handed back between the phases.
//!
//! ## Interoperability constants
//!
//! - Filter `/Adobe.PPKLite`, sub-filter `/adbe.pkcs7.detached`
//! - Digest SHA-256, signature sha256WithRSAEncryption
//!
//! ISO 32000-1:2008 Section 12.8; RFC 5652.

pub mod byterange;
mod cms;
mod engine;
mod prepare;
mod types;

pub use cms::{sign_detached, verify_detached};
pub use engine::SignatureEngine;
pub use prepare::{
    finalize_signature, reserve_signature_field, PreparedPdf, FILTER_ADOBE_PPKLITE,
    SUBFILTER_ADBE_PKCS7_DETACHED,
};
pub use types::{DigestAlgorithm, SignOptions};
