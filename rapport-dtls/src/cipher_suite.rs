use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use shared::error::{Error, Result};

use crate::prf::EncryptionKeys;
use crate::record::RecordHeader;

/// TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 (RFC 5289).
pub const TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256: u16 = 0xC02B;

pub const GCM_KEY_LENGTH: usize = 16;
pub const GCM_IMPLICIT_IV_LENGTH: usize = 4;
pub const GCM_EXPLICIT_NONCE_LENGTH: usize = 8;
pub const GCM_TAG_LENGTH: usize = 16;

/// Record protection for AES-128-GCM (RFC 5288 applied to DTLS).
///
/// The 12-byte nonce is the 4-byte implicit write IV followed by the 8-byte
/// explicit part carried on the wire (epoch + 48-bit sequence number). The
/// AAD is the record header with the plaintext length.
pub struct CipherSuiteAes128Gcm {
    local_cipher: Aes128Gcm,
    remote_cipher: Aes128Gcm,
    local_write_iv: Vec<u8>,
    remote_write_iv: Vec<u8>,
}

impl CipherSuiteAes128Gcm {
    pub fn new(keys: &EncryptionKeys, is_client: bool) -> Result<Self> {
        let (local_key, local_iv, remote_key, remote_iv) = if is_client {
            (
                &keys.client_write_key,
                &keys.client_write_iv,
                &keys.server_write_key,
                &keys.server_write_iv,
            )
        } else {
            (
                &keys.server_write_key,
                &keys.server_write_iv,
                &keys.client_write_key,
                &keys.client_write_iv,
            )
        };
        let local_cipher =
            Aes128Gcm::new_from_slice(local_key).map_err(|_| Error::ErrInvalidCipherSuite)?;
        let remote_cipher =
            Aes128Gcm::new_from_slice(remote_key).map_err(|_| Error::ErrInvalidCipherSuite)?;
        Ok(CipherSuiteAes128Gcm {
            local_cipher,
            remote_cipher,
            local_write_iv: local_iv.clone(),
            remote_write_iv: remote_iv.clone(),
        })
    }

    fn aad(header: &RecordHeader, plaintext_len: usize) -> [u8; 13] {
        let mut aad = [0u8; 13];
        aad[..2].copy_from_slice(&header.epoch.to_be_bytes());
        aad[2..8].copy_from_slice(&header.sequence_number.to_be_bytes()[2..]);
        aad[8] = header.content_type as u8;
        aad[9..11].copy_from_slice(&header.version.to_be_bytes());
        aad[11..13].copy_from_slice(&(plaintext_len as u16).to_be_bytes());
        aad
    }

    fn explicit_nonce(header: &RecordHeader) -> [u8; GCM_EXPLICIT_NONCE_LENGTH] {
        let mut explicit = [0u8; GCM_EXPLICIT_NONCE_LENGTH];
        explicit[..2].copy_from_slice(&header.epoch.to_be_bytes());
        explicit[2..].copy_from_slice(&header.sequence_number.to_be_bytes()[2..]);
        explicit
    }

    /// Returns the protected record payload: explicit nonce + ciphertext +
    /// tag.
    pub fn encrypt(&self, header: &RecordHeader, plaintext: &[u8]) -> Result<Vec<u8>> {
        let explicit = Self::explicit_nonce(header);
        let mut nonce = self.local_write_iv.clone();
        nonce.extend_from_slice(&explicit);

        let aad = Self::aad(header, plaintext.len());
        let ciphertext = self
            .local_cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|_| Error::ErrInvalidMac)?;

        let mut out = explicit.to_vec();
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Strips the explicit nonce, authenticates and decrypts.
    pub fn decrypt(&self, header: &RecordHeader, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() < GCM_EXPLICIT_NONCE_LENGTH + GCM_TAG_LENGTH {
            return Err(Error::ErrNotEnoughRoomForNonce);
        }
        let mut nonce = self.remote_write_iv.clone();
        nonce.extend_from_slice(&payload[..GCM_EXPLICIT_NONCE_LENGTH]);
        let ciphertext = &payload[GCM_EXPLICIT_NONCE_LENGTH..];

        let plaintext_len = ciphertext.len() - GCM_TAG_LENGTH;
        let aad = Self::aad(header, plaintext_len);
        self.remote_cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| Error::ErrInvalidMac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ContentType;
    use crate::PROTOCOL_VERSION;

    fn keys() -> EncryptionKeys {
        EncryptionKeys {
            client_write_key: vec![1u8; 16],
            server_write_key: vec![2u8; 16],
            client_write_iv: vec![3u8; 4],
            server_write_iv: vec![4u8; 4],
        }
    }

    fn header(seq: u64) -> RecordHeader {
        RecordHeader {
            content_type: ContentType::ApplicationData,
            version: PROTOCOL_VERSION,
            epoch: 1,
            sequence_number: seq,
            length: 0,
        }
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let client = CipherSuiteAes128Gcm::new(&keys(), true).unwrap();
        let server = CipherSuiteAes128Gcm::new(&keys(), false).unwrap();

        let h = header(7);
        let protected = client.encrypt(&h, b"hello dtls").unwrap();
        assert_ne!(&protected[GCM_EXPLICIT_NONCE_LENGTH..], b"hello dtls");
        let plain = server.decrypt(&h, &protected).unwrap();
        assert_eq!(plain, b"hello dtls");
    }

    #[test]
    fn test_tampered_record_fails_auth() {
        let client = CipherSuiteAes128Gcm::new(&keys(), true).unwrap();
        let server = CipherSuiteAes128Gcm::new(&keys(), false).unwrap();

        let h = header(8);
        let mut protected = client.encrypt(&h, b"payload").unwrap();
        let last = protected.len() - 1;
        protected[last] ^= 0xff;
        assert_eq!(
            server.decrypt(&h, &protected),
            Err(Error::ErrInvalidMac)
        );
    }

    #[test]
    fn test_header_is_authenticated() {
        let client = CipherSuiteAes128Gcm::new(&keys(), true).unwrap();
        let server = CipherSuiteAes128Gcm::new(&keys(), false).unwrap();

        let protected = client.encrypt(&header(9), b"payload").unwrap();
        let mut wrong = header(9);
        wrong.content_type = ContentType::Handshake;
        assert!(server.decrypt(&wrong, &protected).is_err());
    }
}
