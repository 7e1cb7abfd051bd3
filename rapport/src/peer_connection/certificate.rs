use dtls::crypto::DtlsIdentity;
use shared::error::Result;

/// The DTLS identity of a peer connection: generated on demand or loaded
/// from user-provided PEM. The SHA-256 fingerprint is what SDP pins.
#[derive(Clone)]
pub struct RTCCertificate {
    identity: DtlsIdentity,
}

impl RTCCertificate {
    /// Generates a fresh self-signed ECDSA P-256 certificate.
    pub fn generate() -> Result<Self> {
        Ok(RTCCertificate {
            identity: DtlsIdentity::generate_self_signed("rapport")?,
        })
    }

    /// Loads a certificate and PKCS#8 key from PEM, keeping the DER exactly
    /// as provided so the fingerprint matches external signaling.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        Ok(RTCCertificate {
            identity: DtlsIdentity::from_pem(cert_pem, key_pem)?,
        })
    }

    pub fn fingerprint(&self) -> String {
        self.identity.fingerprint()
    }

    pub(crate) fn identity(&self) -> DtlsIdentity {
        self.identity.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_certificates_are_unique() {
        let a = RTCCertificate::generate().unwrap();
        let b = RTCCertificate::generate().unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_format() {
        let cert = RTCCertificate::generate().unwrap();
        let fp = cert.fingerprint();
        assert_eq!(fp.split(':').count(), 32);
    }
}
