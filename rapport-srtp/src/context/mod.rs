#[cfg(test)]
mod context_test;

use std::collections::HashMap;

use bytes::Bytes;
use shared::error::{Error, Result};
use shared::replay_detector::{ReplayDetector, SlidingWindowDetector};

use crate::cipher::cipher_aead_aes_gcm::CipherAeadAesGcm;
use crate::cipher::cipher_aes_cm_hmac_sha1::CipherAesCmHmacSha1;
use crate::cipher::Cipher;
use crate::protection_profile::ProtectionProfile;

/// SRTP replay protection window (RFC 3711 Section 3.3.2).
pub const SRTP_REPLAY_WINDOW: usize = 128;
/// Maximum SRTCP index (31 bits).
pub const MAX_SRTCP_INDEX: u32 = 0x7FFF_FFFF;

/// Per-SSRC SRTP receive/send state: rollover counter, highest sequence
/// and replay window.
struct SrtpSsrcState {
    rollover_counter: u32,
    highest_sequence: u16,
    started: bool,
    replay: SlidingWindowDetector,
}

impl SrtpSsrcState {
    fn new() -> Self {
        SrtpSsrcState {
            rollover_counter: 0,
            highest_sequence: 0,
            started: false,
            replay: SlidingWindowDetector::new(SRTP_REPLAY_WINDOW, (1 << 48) - 1),
        }
    }

    /// Estimates the ROC for an incoming sequence number
    /// (RFC 3711 Appendix A).
    fn estimate_roc(&self, seq: u16) -> u32 {
        if !self.started {
            return 0;
        }
        let s_l = self.highest_sequence;
        if s_l < 0x8000 {
            if seq > s_l && seq.wrapping_sub(s_l) > 0x8000 {
                return self.rollover_counter.wrapping_sub(1);
            }
        } else if s_l.wrapping_sub(0x8000) > seq {
            return self.rollover_counter.wrapping_add(1);
        }
        self.rollover_counter
    }

    fn commit(&mut self, seq: u16, roc: u32) {
        if !self.started {
            self.started = true;
            self.highest_sequence = seq;
            self.rollover_counter = roc;
            return;
        }
        if roc > self.rollover_counter
            || (roc == self.rollover_counter && seq > self.highest_sequence)
        {
            self.rollover_counter = roc;
            self.highest_sequence = seq;
        }
    }
}

/// Per-SSRC SRTCP state.
struct SrtcpSsrcState {
    index: u32,
    replay: SlidingWindowDetector,
}

impl SrtcpSsrcState {
    fn new() -> Self {
        SrtcpSsrcState {
            index: 0,
            replay: SlidingWindowDetector::new(SRTP_REPLAY_WINDOW, u64::from(MAX_SRTCP_INDEX)),
        }
    }
}

/// One direction of SRTP/SRTCP protection, derived from DTLS-SRTP keying
/// material. A connection holds two: one keyed for sending, one for
/// receiving.
pub struct Context {
    cipher: Box<dyn Cipher + Send>,
    srtp_states: HashMap<u32, SrtpSsrcState>,
    srtcp_states: HashMap<u32, SrtcpSsrcState>,
}

impl Context {
    pub fn new(
        master_key: &[u8],
        master_salt: &[u8],
        profile: ProtectionProfile,
    ) -> Result<Self> {
        if master_key.len() != profile.key_len() {
            return Err(Error::ErrShortSrtpMasterKey);
        }
        if master_salt.len() != profile.salt_len() {
            return Err(Error::ErrShortSrtpMasterSalt);
        }
        let cipher: Box<dyn Cipher + Send> = match profile {
            ProtectionProfile::AeadAes128Gcm => {
                Box::new(CipherAeadAesGcm::new(master_key, master_salt)?)
            }
            ProtectionProfile::Aes128CmHmacSha1_80 => {
                Box::new(CipherAesCmHmacSha1::new(master_key, master_salt)?)
            }
        };
        Ok(Context {
            cipher,
            srtp_states: HashMap::new(),
            srtcp_states: HashMap::new(),
        })
    }

    /// Splits keying material exported by DTLS into (client, server) halves
    /// per RFC 5764 Section 4.2.
    pub fn split_keying_material(
        profile: ProtectionProfile,
        material: &[u8],
    ) -> Result<((Vec<u8>, Vec<u8>), (Vec<u8>, Vec<u8>))> {
        let key_len = profile.key_len();
        let salt_len = profile.salt_len();
        if material.len() < 2 * (key_len + salt_len) {
            return Err(Error::ErrShortSrtpMasterKey);
        }
        let mut offset = 0;
        let client_key = material[offset..offset + key_len].to_vec();
        offset += key_len;
        let server_key = material[offset..offset + key_len].to_vec();
        offset += key_len;
        let client_salt = material[offset..offset + salt_len].to_vec();
        offset += salt_len;
        let server_salt = material[offset..offset + salt_len].to_vec();
        Ok(((client_key, client_salt), (server_key, server_salt)))
    }

    /// Protects an outbound RTP packet.
    pub fn encrypt_rtp(&mut self, plaintext: &[u8]) -> Result<Bytes> {
        if plaintext.len() < 12 {
            return Err(Error::ErrTooShortRtp);
        }
        let ssrc = u32::from_be_bytes([plaintext[8], plaintext[9], plaintext[10], plaintext[11]]);
        let seq = u16::from_be_bytes([plaintext[2], plaintext[3]]);

        let state = self.srtp_states.entry(ssrc).or_insert_with(SrtpSsrcState::new);
        // Outbound: ROC increments when the sequence wraps.
        if state.started && seq < state.highest_sequence && state.highest_sequence > 0xFF00 && seq < 0x100 {
            state.rollover_counter = state.rollover_counter.wrapping_add(1);
        }
        let roc = state.rollover_counter;
        state.started = true;
        state.highest_sequence = seq;

        self.cipher.encrypt_rtp(plaintext, roc)
    }

    /// Unprotects an inbound SRTP packet, enforcing the replay window.
    pub fn decrypt_rtp(&mut self, encrypted: &[u8]) -> Result<Bytes> {
        if encrypted.len() < 12 {
            return Err(Error::ErrTooShortRtp);
        }
        let ssrc = u32::from_be_bytes([encrypted[8], encrypted[9], encrypted[10], encrypted[11]]);
        let seq = u16::from_be_bytes([encrypted[2], encrypted[3]]);

        let state = self.srtp_states.entry(ssrc).or_insert_with(SrtpSsrcState::new);
        let roc = state.estimate_roc(seq);
        let index = (u64::from(roc) << 16) | u64::from(seq);
        if !state.replay.check(index) {
            return Err(Error::SrtpSsrcDuplicated(ssrc, seq));
        }

        let plaintext = self.cipher.decrypt_rtp(encrypted, roc)?;

        // Only authenticated packets advance the window.
        let state = self
            .srtp_states
            .get_mut(&ssrc)
            .expect("state inserted above");
        state.replay.accept();
        state.commit(seq, roc);
        Ok(plaintext)
    }

    /// Protects an outbound RTCP compound packet.
    pub fn encrypt_rtcp(&mut self, plaintext: &[u8]) -> Result<Bytes> {
        if plaintext.len() < 8 {
            return Err(Error::ErrTooShortRtcp);
        }
        let ssrc = u32::from_be_bytes([plaintext[4], plaintext[5], plaintext[6], plaintext[7]]);
        let state = self
            .srtcp_states
            .entry(ssrc)
            .or_insert_with(SrtcpSsrcState::new);
        state.index = (state.index + 1) & MAX_SRTCP_INDEX;
        let index = state.index;
        self.cipher.encrypt_rtcp(plaintext, index, ssrc)
    }

    /// Unprotects an inbound SRTCP packet.
    pub fn decrypt_rtcp(&mut self, encrypted: &[u8]) -> Result<Bytes> {
        if encrypted.len() < 8 + self.cipher.rtcp_overhead() {
            return Err(Error::ErrTooShortRtcp);
        }
        let ssrc = u32::from_be_bytes([encrypted[4], encrypted[5], encrypted[6], encrypted[7]]);
        let tag_len = self.cipher.rtcp_overhead() - 4;
        let index_offset = match self.is_gcm() {
            // GCM: ... ciphertext+tag || E+index
            true => encrypted.len() - 4,
            // CM: ... ciphertext || E+index || tag
            false => encrypted.len() - tag_len - 4,
        };
        let e_and_index = u32::from_be_bytes([
            encrypted[index_offset],
            encrypted[index_offset + 1],
            encrypted[index_offset + 2],
            encrypted[index_offset + 3],
        ]);
        let index = e_and_index & MAX_SRTCP_INDEX;

        let state = self
            .srtcp_states
            .entry(ssrc)
            .or_insert_with(SrtcpSsrcState::new);
        if !state.replay.check(u64::from(index)) {
            return Err(Error::SrtcpSsrcDuplicated(ssrc, index as usize));
        }

        let plaintext = self.cipher.decrypt_rtcp(encrypted, index, ssrc)?;
        let state = self
            .srtcp_states
            .get_mut(&ssrc)
            .expect("state inserted above");
        state.replay.accept();
        Ok(plaintext)
    }

    fn is_gcm(&self) -> bool {
        self.cipher.rtp_auth_tag_len() == 16
    }
}
