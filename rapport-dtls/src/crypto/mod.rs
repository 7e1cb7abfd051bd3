#[cfg(test)]
mod crypto_test;

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{DerSignature, Signature, SigningKey, VerifyingKey};
use p256::pkcs8::DecodePrivateKey;
use ring::digest;
use shared::error::{Error, Result};

/// Default validity window for generated certificates.
const CERTIFICATE_VALIDITY_DAYS: i64 = 365;

/// A DTLS identity: an X.509 certificate plus the P-256 key that signs the
/// handshake. The raw DER is kept verbatim so the SDP fingerprint matches
/// what goes on the wire.
#[derive(Clone)]
pub struct DtlsIdentity {
    pub certificate_der: Vec<u8>,
    pub signing_key: SigningKey,
}

impl DtlsIdentity {
    /// Generates a self-signed ECDSA P-256 certificate valid for 365 days.
    pub fn generate_self_signed(common_name: &str) -> Result<Self> {
        let key_pair = rcgen::KeyPair::generate()
            .map_err(|e| Error::Other(format!("keypair generation: {e}")))?;
        let mut params = rcgen::CertificateParams::new(vec![common_name.to_owned()])
            .map_err(|e| Error::Other(format!("certificate params: {e}")))?;
        let now = time::OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + time::Duration::days(CERTIFICATE_VALIDITY_DAYS);

        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| Error::Other(format!("self-sign: {e}")))?;
        let signing_key = SigningKey::from_pkcs8_der(&key_pair.serialize_der())
            .map_err(|_| Error::ErrInvalidPrivateKey)?;

        Ok(DtlsIdentity {
            certificate_der: cert.der().to_vec(),
            signing_key,
        })
    }

    /// Loads an identity from PEM-encoded certificate and PKCS#8 key. The
    /// certificate DER is preserved byte for byte.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        let (_, pem) = x509_parser::pem::parse_x509_pem(cert_pem.as_bytes())
            .map_err(|_| Error::ErrInvalidCertificate)?;
        let signing_key =
            SigningKey::from_pkcs8_pem(key_pem).map_err(|_| Error::ErrInvalidPrivateKey)?;
        Ok(DtlsIdentity {
            certificate_der: pem.contents,
            signing_key,
        })
    }

    /// SHA-256 fingerprint in the SDP colon-hex form.
    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.certificate_der)
    }

    /// ECDSA-SHA256 signature over `message`, DER encoded as TLS expects.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: DerSignature = self.signing_key.sign(message);
        signature.as_bytes().to_vec()
    }
}

/// SHA-256 fingerprint of a DER certificate, upper-case colon-hex.
pub fn fingerprint_of(der: &[u8]) -> String {
    let digest = digest::digest(&digest::SHA256, der);
    digest
        .as_ref()
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Compares two colon-hex fingerprints, ignoring case.
pub fn fingerprints_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Verifies a DER ECDSA-SHA256 signature against the public key carried in
/// `certificate_der`'s SubjectPublicKeyInfo.
pub fn verify_signature(certificate_der: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    let (_, cert) = x509_parser::parse_x509_certificate(certificate_der)
        .map_err(|_| Error::ErrInvalidCertificate)?;
    let spki = &cert.tbs_certificate.subject_pki.subject_public_key.data;
    let verifying_key = VerifyingKey::from_sec1_bytes(spki.as_ref())
        .map_err(|_| Error::ErrInvalidCertificate)?;
    let signature = Signature::from_der(signature).map_err(|_| Error::ErrKeySignatureMismatch)?;
    verifying_key
        .verify(message, &signature)
        .map_err(|_| Error::ErrKeySignatureMismatch)
}
