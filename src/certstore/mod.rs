//! Institutional signing-credential lifecycle.
//!
//! This module owns the one PKCS#12 credential the system signs with:
//! accepting an uploaded bundle + passphrase, validating it, persisting it
//! to an injected storage directory, answering status queries, and handing
//! the decrypted key material to the signing engine on demand.
//!
//! The credential is either fully present (bundle + passphrase + metadata,
//! all load-verified) or absent; no partial state is ever persisted. Two
//! access tiers are deliberate: [`CertificateStore::has_valid_credential`]
//! is a cheap existence probe for hot paths, while
//! [`CertificateStore::load_credential`] re-opens and fully re-validates
//! the bundle on every signing call so decrypted key material never stays
//! resident between calls.

mod bundle;
mod metadata;
mod store;

pub use bundle::Credential;
pub(crate) use bundle::certificate_public_key;
pub use metadata::{CertificateSummary, CredentialRecord};
pub use store::CertificateStore;
