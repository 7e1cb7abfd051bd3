use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use bytes::{Bytes, BytesMut};
use shared::error::{Error, Result};

use super::{rtp_header_len, Cipher};
use crate::key_derivation::{
    aes_cm_key_derivation, LABEL_SRTCP_ENCRYPTION, LABEL_SRTCP_SALT, LABEL_SRTP_ENCRYPTION,
    LABEL_SRTP_SALT,
};

pub const RTCP_ENCRYPTION_FLAG: u32 = 0x8000_0000;
const TAG_LEN: usize = 16;
const SALT_LEN: usize = 12;

/// AEAD AES-128-GCM protection (RFC 7714). The RTP header doubles as AAD;
/// SRTCP appends the E-flagged 31-bit index after the ciphertext.
pub struct CipherAeadAesGcm {
    srtp_cipher: Aes128Gcm,
    srtcp_cipher: Aes128Gcm,
    srtp_session_salt: Vec<u8>,
    srtcp_session_salt: Vec<u8>,
}

impl CipherAeadAesGcm {
    pub fn new(master_key: &[u8], master_salt: &[u8]) -> Result<Self> {
        let srtp_key = aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, master_key, master_salt, 16)?;
        let srtcp_key = aes_cm_key_derivation(LABEL_SRTCP_ENCRYPTION, master_key, master_salt, 16)?;
        let srtp_session_salt =
            aes_cm_key_derivation(LABEL_SRTP_SALT, master_key, master_salt, SALT_LEN)?;
        let srtcp_session_salt =
            aes_cm_key_derivation(LABEL_SRTCP_SALT, master_key, master_salt, SALT_LEN)?;

        Ok(CipherAeadAesGcm {
            srtp_cipher: Aes128Gcm::new_from_slice(&srtp_key)
                .map_err(|_| Error::ErrShortSrtpMasterKey)?,
            srtcp_cipher: Aes128Gcm::new_from_slice(&srtcp_key)
                .map_err(|_| Error::ErrShortSrtpMasterKey)?,
            srtp_session_salt,
            srtcp_session_salt,
        })
    }

    /// RFC 7714 Section 8.1: IV = (00 00 || SSRC || ROC || SEQ) XOR salt.
    fn rtp_iv(&self, ssrc: u32, roc: u32, sequence_number: u16) -> [u8; SALT_LEN] {
        let mut iv = [0u8; SALT_LEN];
        iv[2..6].copy_from_slice(&ssrc.to_be_bytes());
        iv[6..10].copy_from_slice(&roc.to_be_bytes());
        iv[10..12].copy_from_slice(&sequence_number.to_be_bytes());
        for (b, salt) in iv.iter_mut().zip(&self.srtp_session_salt) {
            *b ^= salt;
        }
        iv
    }

    /// RFC 7714 Section 9.1: IV = (00 00 || SSRC || 00 00 || index) XOR salt.
    fn rtcp_iv(&self, ssrc: u32, srtcp_index: u32) -> [u8; SALT_LEN] {
        let mut iv = [0u8; SALT_LEN];
        iv[2..6].copy_from_slice(&ssrc.to_be_bytes());
        iv[8..12].copy_from_slice(&srtcp_index.to_be_bytes());
        for (b, salt) in iv.iter_mut().zip(&self.srtcp_session_salt) {
            *b ^= salt;
        }
        iv
    }
}

impl Cipher for CipherAeadAesGcm {
    fn rtp_auth_tag_len(&self) -> usize {
        TAG_LEN
    }

    fn rtcp_overhead(&self) -> usize {
        TAG_LEN + 4
    }

    fn encrypt_rtp(&mut self, plaintext: &[u8], roc: u32) -> Result<Bytes> {
        let header_len = rtp_header_len(plaintext)?;
        let ssrc = u32::from_be_bytes([plaintext[8], plaintext[9], plaintext[10], plaintext[11]]);
        let seq = u16::from_be_bytes([plaintext[2], plaintext[3]]);

        let iv = self.rtp_iv(ssrc, roc, seq);
        let ciphertext = self
            .srtp_cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: &plaintext[header_len..],
                    aad: &plaintext[..header_len],
                },
            )
            .map_err(|_| Error::ErrFailedToVerifyAuthTag)?;

        let mut out = BytesMut::with_capacity(header_len + ciphertext.len());
        out.extend_from_slice(&plaintext[..header_len]);
        out.extend_from_slice(&ciphertext);
        Ok(out.freeze())
    }

    fn decrypt_rtp(&mut self, encrypted: &[u8], roc: u32) -> Result<Bytes> {
        let header_len = rtp_header_len(encrypted)?;
        if encrypted.len() < header_len + TAG_LEN {
            return Err(Error::ErrTooShortRtp);
        }
        let ssrc = u32::from_be_bytes([encrypted[8], encrypted[9], encrypted[10], encrypted[11]]);
        let seq = u16::from_be_bytes([encrypted[2], encrypted[3]]);

        let iv = self.rtp_iv(ssrc, roc, seq);
        let plaintext = self
            .srtp_cipher
            .decrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: &encrypted[header_len..],
                    aad: &encrypted[..header_len],
                },
            )
            .map_err(|_| Error::ErrFailedToVerifyAuthTag)?;

        let mut out = BytesMut::with_capacity(header_len + plaintext.len());
        out.extend_from_slice(&encrypted[..header_len]);
        out.extend_from_slice(&plaintext);
        Ok(out.freeze())
    }

    fn encrypt_rtcp(&mut self, plaintext: &[u8], srtcp_index: u32, ssrc: u32) -> Result<Bytes> {
        if plaintext.len() < 8 {
            return Err(Error::ErrTooShortRtcp);
        }
        let iv = self.rtcp_iv(ssrc, srtcp_index);
        let e_and_index = (srtcp_index | RTCP_ENCRYPTION_FLAG).to_be_bytes();

        let mut aad = [0u8; 12];
        aad[..8].copy_from_slice(&plaintext[..8]);
        aad[8..].copy_from_slice(&e_and_index);

        let ciphertext = self
            .srtcp_cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: &plaintext[8..],
                    aad: &aad,
                },
            )
            .map_err(|_| Error::ErrFailedToVerifyAuthTag)?;

        let mut out = BytesMut::with_capacity(8 + ciphertext.len() + 4);
        out.extend_from_slice(&plaintext[..8]);
        out.extend_from_slice(&ciphertext);
        out.extend_from_slice(&e_and_index);
        Ok(out.freeze())
    }

    fn decrypt_rtcp(&mut self, encrypted: &[u8], srtcp_index: u32, ssrc: u32) -> Result<Bytes> {
        if encrypted.len() < 8 + TAG_LEN + 4 {
            return Err(Error::ErrTooShortRtcp);
        }
        let iv = self.rtcp_iv(ssrc, srtcp_index);

        let mut aad = [0u8; 12];
        aad[..8].copy_from_slice(&encrypted[..8]);
        aad[8..].copy_from_slice(&encrypted[encrypted.len() - 4..]);

        let plaintext = self
            .srtcp_cipher
            .decrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: &encrypted[8..encrypted.len() - 4],
                    aad: &aad,
                },
            )
            .map_err(|_| Error::ErrFailedToVerifyAuthTag)?;

        let mut out = BytesMut::with_capacity(8 + plaintext.len());
        out.extend_from_slice(&encrypted[..8]);
        out.extend_from_slice(&plaintext);
        Ok(out.freeze())
    }
}
