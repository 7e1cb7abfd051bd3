#[cfg(test)]
mod packet_test;

use bytes::{Buf, BufMut, BytesMut};
use crc::{Crc, CRC_32_ISCSI};
use shared::error::{Error, Result};

use crate::chunk::Chunk;

pub const PACKET_HEADER_SIZE: usize = 12;

const CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// An SCTP packet: common header plus bundled chunks, protected by a
/// CRC-32c checksum (RFC 4960 Section 3.1).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Packet {
    pub source_port: u16,
    pub destination_port: u16,
    pub verification_tag: u32,
    pub chunks: Vec<Chunk>,
}

impl Packet {
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = BytesMut::new();
        out.put_u16(self.source_port);
        out.put_u16(self.destination_port);
        out.put_u32(self.verification_tag);
        // Checksum placeholder.
        out.put_u32(0);
        for chunk in &self.chunks {
            chunk.marshal_to(&mut out);
        }
        let checksum = CASTAGNOLI.checksum(&out).to_le_bytes();
        out[8..12].copy_from_slice(&checksum);
        out.to_vec()
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.len() < PACKET_HEADER_SIZE {
            return Err(Error::ErrPacketRawTooSmall);
        }
        let mut buf = raw;
        let source_port = buf.get_u16();
        let destination_port = buf.get_u16();
        if source_port == 0 {
            return Err(Error::ErrSctpPacketSourcePortZero);
        }
        if destination_port == 0 {
            return Err(Error::ErrSctpPacketDestinationPortZero);
        }
        let verification_tag = buf.get_u32();
        let checksum = buf.get_u32_le();

        // Verify CRC-32c over the packet with a zeroed checksum field.
        let mut zeroed = raw.to_vec();
        zeroed[8..12].fill(0);
        if CASTAGNOLI.checksum(&zeroed) != checksum {
            return Err(Error::ErrChecksumMismatch);
        }

        let mut chunks = vec![];
        while buf.remaining() >= crate::chunk::CHUNK_HEADER_SIZE {
            chunks.push(Chunk::unmarshal(&mut buf)?);
        }

        Ok(Packet {
            source_port,
            destination_port,
            verification_tag,
            chunks,
        })
    }
}
