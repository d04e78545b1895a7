//! Signing engine over the configured institutional credential.

use crate::certstore::CertificateStore;
use crate::error::{Error, Result};
use crate::signatures::prepare::{finalize_signature, reserve_signature_field};
use crate::signatures::types::SignOptions;
use crate::signatures::cms;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::sync::Arc;

/// Produces detached CMS signatures and signed PDFs using the credential
/// held by a [`CertificateStore`].
///
/// Every call reloads the credential from durable storage: calls are
/// independently re-entrant and decrypted key material never outlives a
/// single operation.
pub struct SignatureEngine {
    store: Arc<CertificateStore>,
    options: SignOptions,
}

impl SignatureEngine {
    /// Create an engine with the institutional default options.
    pub fn new(store: Arc<CertificateStore>) -> Self {
        Self::with_options(store, SignOptions::default())
    }

    /// Create an engine with explicit options.
    pub fn with_options(store: Arc<CertificateStore>, options: SignOptions) -> Self {
        Self { store, options }
    }

    /// The signing options in effect.
    pub fn options(&self) -> &SignOptions {
        &self.options
    }

    /// Sign arbitrary content, returning the DER-encoded detached CMS
    /// structure. Fails with [`Error::NotConfigured`] when no credential
    /// is present.
    pub fn sign_detached(&self, content: &[u8]) -> Result<Vec<u8>> {
        let credential = self.store.load_credential()?;
        let signature = cms::sign_detached(&credential, content, self.options.digest_algorithm)
            .map_err(|e| {
                log::error!("detached signature failed: {}", e);
                e
            })?;
        log::debug!(
            "produced {} detached signature: {} bytes over {} content bytes",
            self.options.digest_algorithm.name(),
            signature.len(),
            content.len()
        );
        Ok(signature)
    }

    /// Sign arbitrary content and return the signature base64-encoded for
    /// transport.
    pub fn sign_detached_base64(&self, content: &[u8]) -> Result<String> {
        Ok(BASE64.encode(self.sign_detached(content)?))
    }

    /// Sign a PDF document, returning the complete signed byte sequence.
    ///
    /// The original bytes are preserved unchanged; the signature is
    /// embedded through an appended incremental update. Structure and
    /// preparation failures surface as [`Error::MalformedPdf`]; signing
    /// failures keep their own categories.
    pub fn sign_pdf(&self, pdf_bytes: &[u8]) -> Result<Vec<u8>> {
        // Credential problems are reported before the document is touched
        let credential = self.store.load_credential()?;

        let prepared = reserve_signature_field(pdf_bytes, &self.options)
            .map_err(Error::into_malformed_pdf)?;
        let to_sign = prepared.signed_bytes().map_err(Error::into_malformed_pdf)?;

        let signature = cms::sign_detached(&credential, &to_sign, self.options.digest_algorithm)
            .map_err(|e| {
                log::error!("PDF signature failed: {}", e);
                e
            })?;

        finalize_signature(prepared, &signature).map_err(Error::into_malformed_pdf)
    }
}

impl std::fmt::Debug for SignatureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureEngine")
            .field("store", &self.store)
            .field("options", &self.options)
            .finish()
    }
}
