use p256::ecdh::EphemeralSecret;
use p256::{EncodedPoint, PublicKey};
use rand::rngs::OsRng;
use shared::error::{Error, Result};

/// Elliptic curve registry values (RFC 8422).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NamedCurve {
    #[default]
    Unsupported = 0x0000,
    P256 = 0x0017,
}

impl From<u16> for NamedCurve {
    fn from(v: u16) -> Self {
        match v {
            0x0017 => NamedCurve::P256,
            _ => NamedCurve::Unsupported,
        }
    }
}

/// ECDHE curve point format: uncompressed only (RFC 8422 Section 5.1.2).
pub const ELLIPTIC_CURVE_TYPE_NAMED_CURVE: u8 = 0x03;

/// An ephemeral ECDHE keypair on P-256.
pub struct EcdheKeypair {
    secret: EphemeralSecret,
    /// SEC1 uncompressed point, 65 bytes.
    pub public: Vec<u8>,
}

impl EcdheKeypair {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random(&mut OsRng);
        let public = EncodedPoint::from(secret.public_key()).as_bytes().to_vec();
        EcdheKeypair { secret, public }
    }

    /// Computes the shared secret with the peer's uncompressed public point.
    /// The x-coordinate is the TLS pre-master secret (RFC 8422 Section 5.10).
    pub fn diffie_hellman(&self, peer_public: &[u8]) -> Result<Vec<u8>> {
        let peer = PublicKey::from_sec1_bytes(peer_public)
            .map_err(|_| Error::ErrInvalidClientKeyExchange)?;
        let shared = self.secret.diffie_hellman(&peer);
        Ok(shared.raw_secret_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecdhe_agreement() {
        let a = EcdheKeypair::generate();
        let b = EcdheKeypair::generate();
        assert_eq!(a.public.len(), 65);
        assert_eq!(a.public[0], 0x04, "uncompressed point");

        let s1 = a.diffie_hellman(&b.public).unwrap();
        let s2 = b.diffie_hellman(&a.public).unwrap();
        assert_eq!(s1, s2);
        assert_eq!(s1.len(), 32);
    }

    #[test]
    fn test_bad_peer_point_rejected() {
        let a = EcdheKeypair::generate();
        assert!(a.diffie_hellman(&[0u8; 65]).is_err());
    }
}
