//! Detached CMS/PKCS#7 `SignedData` construction and verification.
//!
//! The produced structure is detached: the encapsulated content stays
//! absent and only its digest is referenced through the message-digest
//! signed attribute. The signer is identified by issuer + serial number
//! of the leaf certificate and the full chain is embedded so third-party
//! verifiers need no side channel.

use crate::certstore::{certificate_public_key, Credential};
use crate::error::{Error, Result};
use crate::signatures::types::DigestAlgorithm;
use cms::builder::{SignedDataBuilder, SignerInfoBuilder};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::ContentInfo;
use cms::signed_data::{EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo};
use const_oid::db::rfc5911::{ID_DATA, ID_MESSAGE_DIGEST, ID_SIGNED_DATA};
use const_oid::db::rfc5912::{ID_SHA_256, ID_SHA_384, ID_SHA_512};
use const_oid::{AssociatedOid, ObjectIdentifier};
use der::asn1::OctetString;
use der::{Decode, Encode};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256, Sha384, Sha512};
use signature::{Keypair, Signer, Verifier};
use spki::{AlgorithmIdentifierOwned, DynSignatureAlgorithmIdentifier, EncodePublicKey};
use x509_cert::Certificate;

/// Produce a DER-encoded detached `SignedData` over `content`.
pub fn sign_detached(
    credential: &Credential,
    content: &[u8],
    algorithm: DigestAlgorithm,
) -> Result<Vec<u8>> {
    match algorithm {
        DigestAlgorithm::Sha256 => sign_with::<Sha256>(credential, content, ID_SHA_256),
        DigestAlgorithm::Sha384 => sign_with::<Sha384>(credential, content, ID_SHA_384),
        DigestAlgorithm::Sha512 => sign_with::<Sha512>(credential, content, ID_SHA_512),
    }
}

fn sign_with<D>(
    credential: &Credential,
    content: &[u8],
    digest_oid: ObjectIdentifier,
) -> Result<Vec<u8>>
where
    D: Digest + AssociatedOid,
    SigningKey<D>: Keypair + DynSignatureAlgorithmIdentifier + Signer<Signature>,
    <SigningKey<D> as Keypair>::VerifyingKey: EncodePublicKey,
{
    let message_digest = D::digest(content).to_vec();

    let leaf = Certificate::from_der(credential.leaf())?;
    let signer_id = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
        issuer: leaf.tbs_certificate.issuer.clone(),
        serial_number: leaf.tbs_certificate.serial_number.clone(),
    });
    let digest_algorithm = AlgorithmIdentifierOwned {
        oid: digest_oid,
        parameters: None,
    };

    // Detached: econtent absent, only the digest is carried
    let encap = EncapsulatedContentInfo {
        econtent_type: ID_DATA,
        econtent: None,
    };

    let signing_key = SigningKey::<D>::new(credential.private_key().clone());
    let signer_info = SignerInfoBuilder::new(
        &signing_key,
        signer_id,
        digest_algorithm.clone(),
        &encap,
        Some(&message_digest),
    )?;

    let mut builder = SignedDataBuilder::new(&encap);
    builder.add_digest_algorithm(digest_algorithm)?;
    for cert_der in credential.chain() {
        let cert = Certificate::from_der(cert_der)?;
        builder.add_certificate(CertificateChoices::Certificate(cert))?;
    }
    builder.add_signer_info::<SigningKey<D>, Signature>(signer_info)?;

    let content_info = builder.build()?;
    Ok(content_info.to_der()?)
}

/// Verify a detached `SignedData` against the content it claims to cover,
/// using the signer certificate embedded in the structure.
///
/// Returns `Ok(false)` when the structure is sound but the digest or the
/// RSA signature does not match; structural problems are errors.
pub fn verify_detached(signature_der: &[u8], content: &[u8]) -> Result<bool> {
    let content_info = ContentInfo::from_der(signature_der)
        .map_err(|e| Error::Signing(format!("not a CMS structure: {}", e)))?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(Error::Signing("not a CMS SignedData structure".to_string()));
    }
    let signed_data: SignedData = content_info
        .content
        .decode_as()
        .map_err(|e| Error::Signing(format!("SignedData: {}", e)))?;

    let signer_info = signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .ok_or_else(|| Error::Signing("no signer info present".to_string()))?;

    match signer_info.digest_alg.oid {
        oid if oid == ID_SHA_256 => verify_with::<Sha256>(&signed_data, signer_info, content),
        oid if oid == ID_SHA_384 => verify_with::<Sha384>(&signed_data, signer_info, content),
        oid if oid == ID_SHA_512 => verify_with::<Sha512>(&signed_data, signer_info, content),
        other => Err(Error::Signing(format!("unsupported digest algorithm {}", other))),
    }
}

fn verify_with<D>(signed_data: &SignedData, signer_info: &SignerInfo, content: &[u8]) -> Result<bool>
where
    D: Digest + AssociatedOid,
    VerifyingKey<D>: Verifier<Signature>,
{
    let signed_attrs = signer_info.signed_attrs.as_ref().ok_or_else(|| {
        Error::Signing("detached signature without signed attributes".to_string())
    })?;

    // The message-digest attribute must match the digest of the content
    let declared = signed_attrs
        .iter()
        .find(|attr| attr.oid == ID_MESSAGE_DIGEST)
        .and_then(|attr| attr.values.iter().next())
        .ok_or_else(|| Error::Signing("missing message-digest attribute".to_string()))?;
    let declared: OctetString = declared
        .decode_as()
        .map_err(|e| Error::Signing(format!("message-digest attribute: {}", e)))?;
    if declared.as_bytes() != D::digest(content).as_slice() {
        return Ok(false);
    }

    // The signature covers the signed attributes re-encoded as SET OF
    let attrs_der = signed_attrs.to_der()?;
    let public_key = signer_public_key(signed_data, &signer_info.sid)?;
    let verifying_key = VerifyingKey::<D>::new(public_key);
    let signature = Signature::try_from(signer_info.signature.as_bytes())
        .map_err(|e| Error::Signing(format!("signature value: {}", e)))?;

    Ok(verifying_key.verify(&attrs_der, &signature).is_ok())
}

/// Find the embedded certificate matching the signer identifier and return
/// its RSA public key.
fn signer_public_key(signed_data: &SignedData, sid: &SignerIdentifier) -> Result<RsaPublicKey> {
    let certs = signed_data
        .certificates
        .as_ref()
        .ok_or_else(|| Error::Signing("signature embeds no certificates".to_string()))?;

    for choice in certs.0.iter() {
        let CertificateChoices::Certificate(cert) = choice else {
            continue;
        };
        let matches = match sid {
            SignerIdentifier::IssuerAndSerialNumber(isn) => {
                cert.tbs_certificate.serial_number == isn.serial_number
                    && cert.tbs_certificate.issuer == isn.issuer
            },
            SignerIdentifier::SubjectKeyIdentifier(_) => false,
        };
        if matches {
            let der = cert.to_der()?;
            return certificate_public_key(&der).map_err(|e| Error::Signing(e.to_string()));
        }
    }

    Err(Error::Signing(
        "signer certificate not embedded in signature".to_string(),
    ))
}
