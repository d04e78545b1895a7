//! PKCS#12 bundle opening and key/chain extraction.

use crate::error::{Error, Result};
use p12::PFX;
use pkcs1::DecodeRsaPrivateKey;
use pkcs8::DecodePrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_parser::prelude::*;

/// A fully-loaded signing credential: private key plus certificate chain,
/// leaf first. The key is never serialized; `Debug` redacts it.
#[derive(Clone)]
pub struct Credential {
    private_key: RsaPrivateKey,
    chain: Vec<Vec<u8>>,
}

impl Credential {
    /// The RSA private key.
    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// DER-encoded certificate chain, leaf first.
    pub fn chain(&self) -> &[Vec<u8>] {
        &self.chain
    }

    /// DER bytes of the leaf certificate.
    pub fn leaf(&self) -> &[u8] {
        &self.chain[0]
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("private_key", &"[REDACTED]")
            .field("chain", &format!("{} certificates", self.chain.len()))
            .finish()
    }
}

/// Open a PKCS#12 bundle with the given passphrase.
///
/// Fails fast with no side effects: a wrong passphrase is detected through
/// the bundle MAC before any bag is decrypted, a corrupt structure fails
/// parsing, and a bundle without a private-key entry is rejected. The
/// chain is reordered leaf first, where the leaf is the certificate whose
/// public key matches the extracted private key.
pub fn open_bundle(bundle: &[u8], passphrase: &str) -> Result<Credential> {
    let pfx = PFX::parse(bundle)
        .map_err(|e| Error::MalformedBundle(format!("not a PKCS#12 structure: {:?}", e)))?;

    if !pfx.verify_mac(passphrase) {
        return Err(Error::InvalidPassphrase);
    }

    let key_bags = pfx
        .key_bags(passphrase)
        .map_err(|e| Error::MalformedBundle(format!("key bags: {:?}", e)))?;
    // First key entry wins when the bundle holds several
    let key_der = key_bags.first().ok_or(Error::NoKeyEntry)?;

    let private_key = RsaPrivateKey::from_pkcs8_der(key_der)
        .or_else(|_| RsaPrivateKey::from_pkcs1_der(key_der))
        .map_err(|e| Error::MalformedBundle(format!("private key: {}", e)))?;

    let certs = pfx
        .cert_x509_bags(passphrase)
        .map_err(|e| Error::MalformedBundle(format!("certificate bags: {:?}", e)))?;
    if certs.is_empty() {
        return Err(Error::MalformedBundle(
            "bundle contains no certificates".to_string(),
        ));
    }

    let public_key = RsaPublicKey::from(&private_key);
    let leaf_index = certs
        .iter()
        .position(|der| {
            certificate_public_key(der)
                .map(|pk| pk == public_key)
                .unwrap_or(false)
        })
        .ok_or_else(|| {
            Error::MalformedBundle("no certificate matches the private key".to_string())
        })?;

    let mut chain = Vec::with_capacity(certs.len());
    chain.push(certs[leaf_index].clone());
    for (i, der) in certs.into_iter().enumerate() {
        if i != leaf_index {
            chain.push(der);
        }
    }

    log::debug!("opened PKCS#12 bundle: {} certificate(s) in chain", chain.len());
    Ok(Credential { private_key, chain })
}

/// Extract the RSA public key from a DER certificate.
pub(crate) fn certificate_public_key(cert_der: &[u8]) -> Result<RsaPublicKey> {
    use pkcs1::DecodeRsaPublicKey;

    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| Error::MalformedBundle(format!("certificate: {}", e)))?;
    RsaPublicKey::from_pkcs1_der(&cert.public_key().subject_public_key.data)
        .map_err(|e| Error::MalformedBundle(format!("certificate public key: {}", e)))
}
