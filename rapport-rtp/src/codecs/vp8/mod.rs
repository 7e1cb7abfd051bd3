#[cfg(test)]
mod vp8_test;

use bytes::{BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};

use crate::packetizer::{Depacketizer, Payloader};

pub const VP8_HEADER_SIZE: usize = 1;

/// Packetizes VP8 frames (RFC 7741). Emits a minimal payload descriptor
/// with the S bit on the first fragment and a 15-bit picture id.
#[derive(Default, Debug, Clone)]
pub struct Vp8Payloader {
    pub enable_picture_id: bool,
    picture_id: u16,
}

impl Payloader for Vp8Payloader {
    fn payload(&mut self, mtu: usize, data: &Bytes) -> Result<Vec<Bytes>> {
        if data.is_empty() || mtu == 0 {
            return Ok(vec![]);
        }

        // Descriptor: first octet (X|S|PID), optionally X-byte + I-bytes.
        let using_header_size = if self.enable_picture_id {
            VP8_HEADER_SIZE + 3
        } else {
            VP8_HEADER_SIZE
        };
        let max_fragment_size = mtu as isize - using_header_size as isize;
        if max_fragment_size <= 0 {
            return Err(Error::ErrBufferTooSmall);
        }

        let mut payloads = vec![];
        let mut offset = 0usize;
        let mut first = true;
        while offset < data.len() {
            let fragment = (data.len() - offset).min(max_fragment_size as usize);
            let mut out = BytesMut::with_capacity(using_header_size + fragment);
            let mut b0 = 0u8;
            if first {
                b0 |= 0x10; // S bit
                first = false;
            }
            if self.enable_picture_id {
                b0 |= 0x80; // X bit
                out.put_u8(b0);
                out.put_u8(0x80); // I bit
                out.put_u8(0x80 | (self.picture_id >> 8) as u8 & 0x7F);
                out.put_u8(self.picture_id as u8);
            } else {
                out.put_u8(b0);
            }
            out.extend_from_slice(&data[offset..offset + fragment]);
            payloads.push(out.freeze());
            offset += fragment;
        }
        self.picture_id = (self.picture_id + 1) & 0x7FFF;

        Ok(payloads)
    }
}

/// Parses the VP8 payload descriptor, returning the codec bytes.
#[derive(Default, Debug, Clone)]
pub struct Vp8Packet {
    pub x: u8,
    pub n: u8,
    pub s: u8,
    pub pid: u8,
    pub picture_id: u16,
}

impl Depacketizer for Vp8Packet {
    fn depacketize(&mut self, packet: &Bytes) -> Result<Bytes> {
        let payload_len = packet.len();
        if payload_len < 4 {
            return Err(Error::ErrShortPacket);
        }

        let mut payload_index = 0;
        let b0 = packet[payload_index];
        payload_index += 1;

        self.x = (b0 & 0x80) >> 7;
        self.n = (b0 & 0x20) >> 5;
        self.s = (b0 & 0x10) >> 4;
        self.pid = b0 & 0x07;

        let mut i = 0u8;
        let mut l = 0u8;
        let mut t = 0u8;
        let mut k = 0u8;
        if self.x == 1 {
            let xb = packet[payload_index];
            payload_index += 1;
            i = (xb & 0x80) >> 7;
            l = (xb & 0x40) >> 6;
            t = (xb & 0x20) >> 5;
            k = (xb & 0x10) >> 4;
        }

        if i == 1 {
            if packet[payload_index] & 0x80 > 0 {
                // 15-bit picture id
                self.picture_id = ((packet[payload_index] as u16 & 0x7F) << 8)
                    | packet[payload_index + 1] as u16;
                payload_index += 2;
            } else {
                self.picture_id = packet[payload_index] as u16;
                payload_index += 1;
            }
        }
        if l == 1 {
            payload_index += 1;
        }
        if t == 1 || k == 1 {
            payload_index += 1;
        }

        if payload_index >= payload_len {
            return Err(Error::ErrShortPacket);
        }
        Ok(packet.slice(payload_index..))
    }

    fn is_partition_head(&self, payload: &[u8]) -> bool {
        if payload.is_empty() {
            false
        } else {
            (payload[0] & 0x10) != 0
        }
    }
}
