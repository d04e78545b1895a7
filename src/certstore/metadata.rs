//! Cached certificate metadata: the persisted record and the derived
//! status summary.

use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use x509_parser::prelude::*;

/// Point-in-time view of the configured certificate, derived from the
/// persisted record whenever status is queried. Validity is computed at
/// query time, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    /// Common name of the certificate subject
    pub subject_common_name: String,
    /// Common name of the issuing authority
    pub issuer_common_name: String,
    /// Expiry of the leaf certificate
    pub not_after: DateTime<Utc>,
    /// Whether the credential is usable right now (present and unexpired)
    pub currently_valid: bool,
}

/// Durable metadata record persisted beside the encrypted bundle so the
/// status query never has to reopen the PKCS#12 file.
///
/// The passphrase is stored in the clear so signing can reopen the bundle
/// without operator input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Bundle passphrase
    pub passphrase: String,
    /// Subject common name of the leaf certificate
    pub subject_cn: String,
    /// Issuer common name of the leaf certificate
    pub issuer_cn: String,
    /// Leaf certificate expiry, seconds since the Unix epoch
    pub not_after_epoch: i64,
}

impl CredentialRecord {
    /// Derive a record from the leaf certificate of a freshly-opened bundle.
    pub fn from_leaf(leaf_der: &[u8], passphrase: &str) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(leaf_der)
            .map_err(|e| Error::MalformedBundle(format!("leaf certificate: {}", e)))?;

        Ok(Self {
            passphrase: passphrase.to_string(),
            subject_cn: common_name(cert.subject()),
            issuer_cn: common_name(cert.issuer()),
            not_after_epoch: cert.validity().not_after.timestamp(),
        })
    }

    /// Compute the status summary as of `now`.
    pub fn summary_at(&self, now: DateTime<Utc>) -> CertificateSummary {
        let not_after = Utc
            .timestamp_opt(self.not_after_epoch, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        CertificateSummary {
            subject_common_name: self.subject_cn.clone(),
            issuer_common_name: self.issuer_cn.clone(),
            not_after,
            currently_valid: now < not_after,
        }
    }
}

/// First CN attribute of a distinguished name, falling back to the full DN
/// when no CN is present.
fn common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| name.to_string())
}
