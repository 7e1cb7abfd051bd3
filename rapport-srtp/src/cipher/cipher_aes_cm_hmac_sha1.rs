use aes::Aes128;
use bytes::{Bytes, BytesMut};
use ctr::cipher::{KeyIvInit, StreamCipher};
use ring::hmac;
use shared::error::{Error, Result};
use subtle::ConstantTimeEq;

use super::{rtp_header_len, Cipher};
use crate::key_derivation::{derive_session_keys, SessionKeys};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

pub const RTCP_ENCRYPTION_FLAG: u32 = 0x8000_0000;
const TAG_LEN: usize = 10;

/// AES-CM keystream encryption with truncated HMAC-SHA1 authentication
/// (RFC 3711).
pub struct CipherAesCmHmacSha1 {
    keys: SessionKeys,
    srtp_auth: hmac::Key,
    srtcp_auth: hmac::Key,
}

impl CipherAesCmHmacSha1 {
    pub fn new(master_key: &[u8], master_salt: &[u8]) -> Result<Self> {
        let keys = derive_session_keys(master_key, master_salt, 16, 14, 20)?;
        let srtp_auth = hmac::Key::new(
            hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            &keys.srtp_session_auth_key,
        );
        let srtcp_auth = hmac::Key::new(
            hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            &keys.srtcp_session_auth_key,
        );
        Ok(CipherAesCmHmacSha1 {
            keys,
            srtp_auth,
            srtcp_auth,
        })
    }

    /// Counter block (RFC 3711 Section 4.1.1):
    /// (salt * 2^16) XOR (SSRC * 2^64) XOR (index * 2^16).
    fn counter(session_salt: &[u8], ssrc: u32, roc: u32, sequence_number: u16) -> [u8; 16] {
        let mut counter = [0u8; 16];
        counter[..14].copy_from_slice(session_salt);
        for (i, b) in ssrc.to_be_bytes().iter().enumerate() {
            counter[4 + i] ^= b;
        }
        for (i, b) in roc.to_be_bytes().iter().enumerate() {
            counter[8 + i] ^= b;
        }
        for (i, b) in sequence_number.to_be_bytes().iter().enumerate() {
            counter[12 + i] ^= b;
        }
        counter
    }

    fn rtp_auth_tag(&self, packet: &[u8], roc: u32) -> Vec<u8> {
        let mut ctx = hmac::Context::with_key(&self.srtp_auth);
        ctx.update(packet);
        ctx.update(&roc.to_be_bytes());
        ctx.sign().as_ref()[..TAG_LEN].to_vec()
    }

    fn rtcp_auth_tag(&self, packet: &[u8]) -> Vec<u8> {
        hmac::sign(&self.srtcp_auth, packet).as_ref()[..TAG_LEN].to_vec()
    }
}

impl Cipher for CipherAesCmHmacSha1 {
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

        let mut out = BytesMut::with_capacity(plaintext.len() + TAG_LEN);
        out.extend_from_slice(plaintext);
        let counter = Self::counter(&self.keys.srtp_session_salt, ssrc, roc, seq);
        let mut cipher = Aes128Ctr::new_from_slices(&self.keys.srtp_session_key, &counter)
            .map_err(|_| Error::ErrShortSrtpMasterKey)?;
        cipher.apply_keystream(&mut out[header_len..]);

        let tag = self.rtp_auth_tag(&out, roc);
        out.extend_from_slice(&tag);
        Ok(out.freeze())
    }

    fn decrypt_rtp(&mut self, encrypted: &[u8], roc: u32) -> Result<Bytes> {
        if encrypted.len() < TAG_LEN {
            return Err(Error::ErrTooShortRtp);
        }
        let (body, tag) = encrypted.split_at(encrypted.len() - TAG_LEN);
        let header_len = rtp_header_len(body)?;

        let expected = self.rtp_auth_tag(body, roc);
        if expected.as_slice().ct_eq(tag).unwrap_u8() != 1 {
            return Err(Error::ErrFailedToVerifyAuthTag);
        }

        let ssrc = u32::from_be_bytes([body[8], body[9], body[10], body[11]]);
        let seq = u16::from_be_bytes([body[2], body[3]]);

        let mut out = BytesMut::from(body);
        let counter = Self::counter(&self.keys.srtp_session_salt, ssrc, roc, seq);
        let mut cipher = Aes128Ctr::new_from_slices(&self.keys.srtp_session_key, &counter)
            .map_err(|_| Error::ErrShortSrtpMasterKey)?;
        cipher.apply_keystream(&mut out[header_len..]);
        Ok(out.freeze())
    }

    fn encrypt_rtcp(&mut self, plaintext: &[u8], srtcp_index: u32, ssrc: u32) -> Result<Bytes> {
        if plaintext.len() < 8 {
            return Err(Error::ErrTooShortRtcp);
        }
        let mut out = BytesMut::with_capacity(plaintext.len() + 4 + TAG_LEN);
        out.extend_from_slice(plaintext);

        // The SRTCP index seeds the counter where RTP uses ROC || SEQ.
        let counter = Self::counter(
            &self.keys.srtcp_session_salt,
            ssrc,
            srtcp_index >> 16,
            srtcp_index as u16,
        );
        let mut cipher = Aes128Ctr::new_from_slices(&self.keys.srtcp_session_key, &counter)
            .map_err(|_| Error::ErrShortSrtpMasterKey)?;
        cipher.apply_keystream(&mut out[8..]);

        out.extend_from_slice(&(srtcp_index | RTCP_ENCRYPTION_FLAG).to_be_bytes());
        let tag = self.rtcp_auth_tag(&out);
        out.extend_from_slice(&tag);
        Ok(out.freeze())
    }

    fn decrypt_rtcp(&mut self, encrypted: &[u8], srtcp_index: u32, ssrc: u32) -> Result<Bytes> {
        if encrypted.len() < 8 + 4 + TAG_LEN {
            return Err(Error::ErrTooShortRtcp);
        }
        let (body, tag) = encrypted.split_at(encrypted.len() - TAG_LEN);
        let expected = self.rtcp_auth_tag(body);
        if expected.as_slice().ct_eq(tag).unwrap_u8() != 1 {
            return Err(Error::ErrFailedToVerifyAuthTag);
        }

        let mut out = BytesMut::from(&body[..body.len() - 4]);
        let counter = Self::counter(
            &self.keys.srtcp_session_salt,
            ssrc,
            srtcp_index >> 16,
            srtcp_index as u16,
        );
        let mut cipher = Aes128Ctr::new_from_slices(&self.keys.srtcp_session_key, &counter)
            .map_err(|_| Error::ErrShortSrtpMasterKey)?;
        cipher.apply_keystream(&mut out[8..]);
        Ok(out.freeze())
    }
}
