// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::write_with_newline)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::match_like_matches_macro)]

//! # SIAE Sign
//!
//! Institutional digital-signature core for the SIAE document workflow.
//!
//! Two components, the second depending on the first:
//!
//! - [`certstore::CertificateStore`] owns the lifecycle of the one
//!   institutional PKCS#12 credential: upload + passphrase validation,
//!   durable persistence in an injected directory, status queries,
//!   revocation, and fully-validated reloads for signing.
//! - [`signatures::SignatureEngine`] produces detached CMS/PKCS#7
//!   signatures over arbitrary bytes and embeds them into PDFs as
//!   incremental-update signature fields that validate in standard
//!   viewers.
//!
//! The PDF foundation modules ([`document`], [`parser`], [`xref`], ...)
//! carry just enough of the format to locate the catalog and first page
//! and to append a well-formed incremental update; they are not a general
//! PDF toolkit.
//!
//! ## Quick Start
//!
//! ```ignore
//! use siae_sign::certstore::CertificateStore;
//! use siae_sign::signatures::SignatureEngine;
//! use std::sync::Arc;
//!
//! # fn main() -> siae_sign::Result<()> {
//! let store = Arc::new(CertificateStore::new("/var/lib/siae/certs")?);
//! store.configure(&std::fs::read("institucional.pfx")?, "secret1")?;
//!
//! let engine = SignatureEngine::new(store);
//! let signed_pdf = engine.sign_pdf(&std::fs::read("processo.pdf")?)?;
//! std::fs::write("processo-assinado.pdf", signed_pdf)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Specification references
//!
//! - ISO 32000-1:2008 Section 12.8 - PDF digital signatures
//! - RFC 5652 - Cryptographic Message Syntax
//! - RFC 7292 - PKCS #12

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF parsing
pub mod decoders;
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod serialize;
pub mod xref;

// Credential lifecycle
pub mod certstore;

// Signing
pub mod signatures;

pub use certstore::{CertificateStore, CertificateSummary, Credential};
pub use document::PdfDocument;
pub use error::{Error, Result};
pub use object::{Object, ObjectRef};
pub use signatures::{DigestAlgorithm, SignOptions, SignatureEngine};
