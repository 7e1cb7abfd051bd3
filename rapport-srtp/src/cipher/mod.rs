pub mod cipher_aead_aes_gcm;
pub mod cipher_aes_cm_hmac_sha1;

use bytes::Bytes;
use shared::error::Result;

/// The cipher contract both protection profiles implement. All methods take
/// the full packet bytes; RTP methods additionally need the rollover count
/// that extends the 16-bit sequence number.
pub trait Cipher {
    /// Authentication overhead appended to an RTP payload.
    fn rtp_auth_tag_len(&self) -> usize;

    /// Authentication and index overhead appended to an RTCP packet.
    fn rtcp_overhead(&self) -> usize;

    fn encrypt_rtp(&mut self, plaintext: &[u8], roc: u32) -> Result<Bytes>;
    fn decrypt_rtp(&mut self, encrypted: &[u8], roc: u32) -> Result<Bytes>;

    fn encrypt_rtcp(&mut self, plaintext: &[u8], srtcp_index: u32, ssrc: u32) -> Result<Bytes>;
    fn decrypt_rtcp(&mut self, encrypted: &[u8], srtcp_index: u32, ssrc: u32) -> Result<Bytes>;
}

/// Locates the RTP payload offset (header + extensions) without fully
/// validating the packet.
pub(crate) fn rtp_header_len(packet: &[u8]) -> Result<usize> {
    use shared::error::Error;
    if packet.len() < 12 {
        return Err(Error::ErrTooShortRtp);
    }
    let cc = (packet[0] & 0x0F) as usize;
    let has_extension = packet[0] & 0x10 != 0;
    let mut offset = 12 + cc * 4;
    if has_extension {
        if packet.len() < offset + 4 {
            return Err(Error::ErrTooShortRtp);
        }
        let ext_words =
            u16::from_be_bytes([packet[offset + 2], packet[offset + 3]]) as usize;
        offset += 4 + ext_words * 4;
    }
    if packet.len() < offset {
        return Err(Error::ErrTooShortRtp);
    }
    Ok(offset)
}
