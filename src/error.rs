//! Error types for the signing core.
//!
//! This module defines all error types that can occur while managing the
//! institutional credential, building CMS signatures, and preparing PDF
//! incremental updates.

/// Result type alias for signing-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during credential handling and signing.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "Invalid" prefix is intentional for clarity
pub enum Error {
    /// No credential has been configured in the store
    #[error("No signing credential configured")]
    NotConfigured,

    /// The PKCS#12 bundle cannot be opened with the given passphrase
    #[error("PKCS#12 bundle cannot be opened with the given passphrase")]
    InvalidPassphrase,

    /// The uploaded bytes are not a valid PKCS#12 structure
    #[error("Malformed PKCS#12 bundle: {0}")]
    MalformedBundle(String),

    /// The bundle parsed but contains no usable private-key entry
    #[error("PKCS#12 bundle contains no private-key entry")]
    NoKeyEntry,

    /// Input bytes are not a parseable/signable PDF document
    #[error("Malformed PDF: {0}")]
    MalformedPdf(String),

    /// Cryptographic or encoding failure during CMS construction
    #[error("Signature generation failed: {0}")]
    Signing(String),

    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a PDF-layer error into the `MalformedPdf` category reported to
    /// callers of the signing API. Credential and signing failures pass
    /// through unchanged so callers can still tell the remediations apart.
    pub(crate) fn into_malformed_pdf(self) -> Error {
        match self {
            e @ (Error::NotConfigured
            | Error::InvalidPassphrase
            | Error::MalformedBundle(_)
            | Error::NoKeyEntry
            | Error::Signing(_)
            | Error::MalformedPdf(_)) => e,
            other => Error::MalformedPdf(other.to_string()),
        }
    }
}

impl From<der::Error> for Error {
    fn from(e: der::Error) -> Self {
        Error::Signing(format!("DER encoding: {e}"))
    }
}

impl From<cms::builder::Error> for Error {
    fn from(e: cms::builder::Error) -> Self {
        Error::Signing(format!("CMS builder: {e}"))
    }
}

impl From<rsa::Error> for Error {
    fn from(e: rsa::Error) -> Self {
        Error::Signing(format!("RSA: {e}"))
    }
}
