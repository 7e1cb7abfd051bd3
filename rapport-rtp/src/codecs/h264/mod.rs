#[cfg(test)]
mod h264_test;

use bytes::{BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};

use crate::packetizer::{Depacketizer, Payloader};

pub const STAPA_NALU_TYPE: u8 = 24;
pub const FUA_NALU_TYPE: u8 = 28;

pub const FUA_HEADER_SIZE: usize = 2;
pub const STAPA_HEADER_SIZE: usize = 1;
pub const STAPA_NALU_LENGTH_SIZE: usize = 2;

pub const NALU_TYPE_BITMASK: u8 = 0x1F;
pub const NALU_REF_IDC_BITMASK: u8 = 0x60;
pub const FU_START_BITMASK: u8 = 0x80;
pub const FU_END_BITMASK: u8 = 0x40;

const ANNEXB_NALUSTART_CODE: &[u8] = &[0x00, 0x00, 0x00, 0x01];

fn next_ind(nalu: &Bytes, start: usize) -> (isize, isize) {
    let mut zero_count = 0;

    for (i, &b) in nalu[start..].iter().enumerate() {
        if b == 0 {
            zero_count += 1;
            continue;
        } else if b == 1 && zero_count >= 2 {
            return ((start + i - zero_count) as isize, zero_count as isize + 1);
        }
        zero_count = 0;
    }
    (-1, -1)
}

/// Packetizes H.264 Annex-B streams into single NALs and FU-A fragments
/// (RFC 6184).
#[derive(Default, Debug, Clone)]
pub struct H264Payloader;

impl H264Payloader {
    fn emit(&mut self, nalu: &Bytes, mtu: usize, payloads: &mut Vec<Bytes>) {
        if nalu.is_empty() {
            return;
        }

        let nalu_type = nalu[0] & NALU_TYPE_BITMASK;
        let nalu_ref_idc = nalu[0] & NALU_REF_IDC_BITMASK;
        // Access unit delimiters and fillers are not packetized.
        if nalu_type == 9 || nalu_type == 12 {
            return;
        }

        if nalu.len() <= mtu {
            payloads.push(nalu.clone());
            return;
        }

        // FU-A fragmentation (RFC 6184 Section 5.8).
        let max_fragment_size = mtu as isize - FUA_HEADER_SIZE as isize;
        if max_fragment_size <= 0 {
            return;
        }

        let nalu_data = nalu;
        // The NAL header octet is replaced by the FU indicator/header pair.
        let mut nalu_data_index = 1;
        let nalu_data_length = nalu.len() as isize - nalu_data_index as isize;
        let mut nalu_data_remaining = nalu_data_length;

        while nalu_data_remaining > 0 {
            let current_fragment_size = max_fragment_size.min(nalu_data_remaining);
            let mut out = BytesMut::with_capacity(FUA_HEADER_SIZE + current_fragment_size as usize);
            // FU indicator: original NRI, type 28.
            out.put_u8(nalu_ref_idc | FUA_NALU_TYPE);
            // FU header: S/E bits around the original type.
            let mut b1 = nalu_type;
            if nalu_data_remaining == nalu_data_length {
                b1 |= FU_START_BITMASK;
            }
            if nalu_data_remaining - current_fragment_size == 0 {
                b1 |= FU_END_BITMASK;
            }
            out.put_u8(b1);

            out.extend_from_slice(
                &nalu_data[nalu_data_index..nalu_data_index + current_fragment_size as usize],
            );
            payloads.push(out.freeze());

            nalu_data_remaining -= current_fragment_size;
            nalu_data_index += current_fragment_size as usize;
        }
    }
}

impl Payloader for H264Payloader {
    fn payload(&mut self, mtu: usize, data: &Bytes) -> Result<Vec<Bytes>> {
        let mut payloads = vec![];
        if data.is_empty() || mtu == 0 {
            return Ok(payloads);
        }

        let (mut next_ind_start, mut next_ind_len) = next_ind(data, 0);
        if next_ind_start == -1 {
            self.emit(data, mtu, &mut payloads);
        } else {
            while next_ind_start != -1 {
                let prev_start = (next_ind_start + next_ind_len) as usize;
                let (n_start, n_len) = next_ind(data, prev_start);
                next_ind_start = n_start;
                next_ind_len = n_len;
                let nalu = if next_ind_start != -1 {
                    data.slice(prev_start..next_ind_start as usize)
                } else {
                    data.slice(prev_start..)
                };
                self.emit(&nalu, mtu, &mut payloads);
            }
        }

        Ok(payloads)
    }
}

/// Depacketizes RFC 6184 payloads back into Annex-B NAL units.
///
/// FU-A fragments are buffered until the end bit arrives, then emitted as
/// one reassembled NAL.
#[derive(Default, Debug, Clone)]
pub struct H264Packet {
    /// Prefix NALs with the Annex-B start code.
    pub is_avc: bool,
    fua_buffer: Option<BytesMut>,
}

impl Depacketizer for H264Packet {
    fn depacketize(&mut self, packet: &Bytes) -> Result<Bytes> {
        if packet.len() <= 2 {
            return Err(Error::ErrShortPacket);
        }

        let mut payload = BytesMut::new();
        let nalu_type = packet[0] & NALU_TYPE_BITMASK;
        match nalu_type {
            1..=23 => {
                // Single NAL unit packet.
                if self.is_avc {
                    payload.put_u32(packet.len() as u32);
                } else {
                    payload.extend_from_slice(ANNEXB_NALUSTART_CODE);
                }
                payload.extend_from_slice(packet);
                Ok(payload.freeze())
            }
            STAPA_NALU_TYPE => {
                let mut curr_offset = STAPA_HEADER_SIZE;
                while curr_offset < packet.len() {
                    if packet.len() < curr_offset + STAPA_NALU_LENGTH_SIZE {
                        return Err(Error::ErrShortPacket);
                    }
                    let nalu_size = ((packet[curr_offset] as usize) << 8)
                        | packet[curr_offset + 1] as usize;
                    curr_offset += STAPA_NALU_LENGTH_SIZE;

                    if packet.len() < curr_offset + nalu_size {
                        return Err(Error::StapASizeLargerThanBuffer(
                            nalu_size,
                            packet.len() - curr_offset,
                        ));
                    }
                    if self.is_avc {
                        payload.put_u32(nalu_size as u32);
                    } else {
                        payload.extend_from_slice(ANNEXB_NALUSTART_CODE);
                    }
                    payload.extend_from_slice(&packet[curr_offset..curr_offset + nalu_size]);
                    curr_offset += nalu_size;
                }
                Ok(payload.freeze())
            }
            FUA_NALU_TYPE => {
                if packet.len() < FUA_HEADER_SIZE {
                    return Err(Error::ErrShortPacket);
                }
                if self.fua_buffer.is_none() || packet[1] & FU_START_BITMASK != 0 {
                    self.fua_buffer = Some(BytesMut::new());
                }
                if let Some(fua_buffer) = &mut self.fua_buffer {
                    fua_buffer.extend_from_slice(&packet[FUA_HEADER_SIZE..]);
                }

                if packet[1] & FU_END_BITMASK != 0 {
                    let fua_buffer = self.fua_buffer.take().unwrap_or_default();
                    let nalu_ref_idc = packet[0] & NALU_REF_IDC_BITMASK;
                    let fragmented_nalu_type = packet[1] & NALU_TYPE_BITMASK;

                    if self.is_avc {
                        payload.put_u32(fua_buffer.len() as u32 + 1);
                    } else {
                        payload.extend_from_slice(ANNEXB_NALUSTART_CODE);
                    }
                    payload.put_u8(nalu_ref_idc | fragmented_nalu_type);
                    payload.extend_from_slice(&fua_buffer);
                    Ok(payload.freeze())
                } else {
                    // Mid-reassembly; nothing to hand to the decoder yet.
                    Ok(Bytes::new())
                }
            }
            _ => Err(Error::NaluTypeIsNotHandled(nalu_type)),
        }
    }

    fn is_partition_head(&self, payload: &[u8]) -> bool {
        if payload.len() < 2 {
            return false;
        }
        if payload[0] & NALU_TYPE_BITMASK == FUA_NALU_TYPE {
            payload[1] & FU_START_BITMASK != 0
        } else {
            true
        }
    }
}
