//! Shared test fixtures: a throwaway PKI (RSA key, self-signed
//! certificate, PKCS#12 bundle) and a minimal one-page PDF.
#![allow(dead_code)] // not every test crate uses every fixture

use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use sha2::Sha256;
use spki::EncodePublicKey;
use std::str::FromStr;
use std::time::Duration;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::Encode;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;

pub const PASSPHRASE: &str = "secret1";
pub const SUBJECT_CN: &str = "SIAE Institucional";

/// Generated signing material for one test run.
pub struct TestPki {
    /// DER-encoded PKCS#12 bundle protected by [`PASSPHRASE`]
    pub bundle: Vec<u8>,
    /// DER-encoded self-signed certificate
    pub cert_der: Vec<u8>,
    /// The RSA private key backing the certificate
    pub key: RsaPrivateKey,
}

/// Generate an RSA-2048 key, a self-signed certificate with the
/// institutional subject CN, and a PKCS#12 bundle wrapping both.
pub fn test_pki() -> TestPki {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, 2048).expect("generate RSA key");

    let subject =
        Name::from_str(&format!("CN={},O=MGC Tecnologia", SUBJECT_CN)).expect("parse subject DN");
    let serial = SerialNumber::from(42u32);
    let validity =
        Validity::from_now(Duration::from_secs(365 * 24 * 3600)).expect("build validity window");

    let public_der = key
        .to_public_key()
        .to_public_key_der()
        .expect("encode public key");
    let spki =
        SubjectPublicKeyInfoOwned::try_from(public_der.as_bytes()).expect("parse public key");

    let signer = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone());
    let builder = CertificateBuilder::new(Profile::Root, serial, validity, subject, spki, &signer)
        .expect("create certificate builder");
    let cert = builder
        .build::<rsa::pkcs1v15::Signature>()
        .expect("self-sign certificate");
    let cert_der = cert.to_der().expect("encode certificate");

    let key_der = key.to_pkcs8_der().expect("encode private key");
    let bundle = p12::PFX::new(&cert_der, key_der.as_bytes(), None, PASSPHRASE, "siae")
        .expect("assemble PKCS#12 bundle")
        .to_der();

    TestPki {
        bundle,
        cert_der,
        key,
    }
}

/// Minimal one-page PDF with a correct cross-reference table.
pub fn minimal_pdf() -> Vec<u8> {
    let mut data = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();

    let objects = [
        "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n",
        "2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n",
        "3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>\nendobj\n",
    ];
    for obj in objects {
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

/// Total encoded length of the DER element starting at `data[0]`,
/// header included. Used to strip placeholder padding off an embedded
/// signature.
pub fn der_element_len(data: &[u8]) -> usize {
    assert!(data.len() >= 2, "truncated DER element");
    let first_len_byte = data[1] as usize;
    if first_len_byte < 0x80 {
        2 + first_len_byte
    } else {
        let num_bytes = first_len_byte & 0x7F;
        assert!(num_bytes > 0 && num_bytes <= 4, "unsupported DER length");
        let mut len = 0usize;
        for &b in &data[2..2 + num_bytes] {
            len = (len << 8) | b as usize;
        }
        2 + num_bytes + len
    }
}
