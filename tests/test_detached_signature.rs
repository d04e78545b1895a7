//! Integration tests for detached CMS signing.

mod common;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use common::{test_pki, PASSPHRASE, SUBJECT_CN};
use siae_sign::certstore::CertificateStore;
use siae_sign::signatures::{verify_detached, SignatureEngine};
use siae_sign::Error;
use std::sync::Arc;
use tempfile::TempDir;

fn engine_with_credential() -> (TempDir, SignatureEngine) {
    let pki = test_pki();
    let dir = TempDir::new().expect("create temp dir");
    let store = Arc::new(CertificateStore::new(dir.path().join("certs")).expect("create store"));
    store.configure(&pki.bundle, PASSPHRASE).expect("configure");
    (dir, SignatureEngine::new(store))
}

#[test]
fn test_detached_signature_verifies() {
    let (_dir, engine) = engine_with_credential();
    let content = b"conteudo do processo digital";

    let signature = engine.sign_detached(content).expect("sign");
    assert!(!signature.is_empty());
    // DER SEQUENCE tag of the ContentInfo wrapper
    assert_eq!(signature[0], 0x30);

    assert!(verify_detached(&signature, content).expect("verify"));
}

#[test]
fn test_detached_signature_rejects_mutated_content() {
    let (_dir, engine) = engine_with_credential();
    let content = b"conteudo do processo digital".to_vec();
    let signature = engine.sign_detached(&content).expect("sign");

    for index in [0, content.len() / 2, content.len() - 1] {
        let mut mutated = content.clone();
        mutated[index] ^= 0x01;
        assert!(
            !verify_detached(&signature, &mutated).expect("verify runs"),
            "mutation at byte {} must invalidate the signature",
            index
        );
    }
}

#[test]
fn test_signature_is_detached_not_embedding_content() {
    let (_dir, engine) = engine_with_credential();
    let content = b"SEGREDO-INSTITUCIONAL-9174";
    let signature = engine.sign_detached(content).expect("sign");

    assert!(
        !signature
            .windows(content.len())
            .any(|w| w == content.as_slice()),
        "detached signature must not embed the content"
    );
}

#[test]
fn test_base64_variant_encodes_same_structure() {
    let (_dir, engine) = engine_with_credential();
    let content = b"hello";

    let encoded = engine.sign_detached_base64(content).expect("sign");
    let decoded = BASE64.decode(encoded).expect("valid base64");
    assert_eq!(decoded[0], 0x30);
    assert!(verify_detached(&decoded, content).expect("verify"));
}

#[test]
fn test_full_lifecycle_scenario() {
    let pki = test_pki();
    let dir = TempDir::new().expect("create temp dir");
    let store = Arc::new(CertificateStore::new(dir.path().join("certs")).expect("create store"));

    // configure → status reports the institutional subject, valid
    store.configure(&pki.bundle, PASSPHRASE).expect("configure");
    let status = store.status().expect("status present");
    assert_eq!(status.subject_common_name, SUBJECT_CN);
    assert!(status.currently_valid);

    // sign → non-empty bytes that verify against the certificate
    let engine = SignatureEngine::new(Arc::clone(&store));
    let signature = engine.sign_detached(b"hello").expect("sign");
    assert!(!signature.is_empty());
    assert!(verify_detached(&signature, b"hello").expect("verify"));

    // revoke → status absent → signing reports the missing credential
    store.revoke().expect("revoke");
    assert!(store.status().is_none());
    assert!(matches!(
        engine.sign_detached(b"hello"),
        Err(Error::NotConfigured)
    ));
}
