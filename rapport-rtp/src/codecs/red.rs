use bytes::{BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};

use crate::packetizer::{Depacketizer, Payloader};

/// One redundant block: the original payload type plus a timestamp offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedBlock {
    pub payload_type: u8,
    pub timestamp_offset: u16,
    pub payload: Bytes,
}

/// RED (RFC 2198) encoder: redundant blocks first, primary last.
#[derive(Default, Debug, Clone)]
pub struct RedPayloader {
    pub primary_payload_type: u8,
    /// Older encodings paired with their timestamp offsets, most recent
    /// first.
    pub redundant: Vec<RedBlock>,
}

impl Payloader for RedPayloader {
    fn payload(&mut self, _mtu: usize, data: &Bytes) -> Result<Vec<Bytes>> {
        let mut out = BytesMut::new();
        for block in &self.redundant {
            if block.payload.len() > 0x3FF {
                return Err(Error::ErrBufferTooSmall);
            }
            // F=1, block PT, 14-bit offset, 10-bit length.
            out.put_u8(0x80 | block.payload_type);
            out.put_u16(
                (block.timestamp_offset << 2) | (block.payload.len() as u16 >> 8),
            );
            out.put_u8(block.payload.len() as u8);
        }
        // Final header: F=0, primary PT only.
        out.put_u8(self.primary_payload_type);
        for block in &self.redundant {
            out.extend_from_slice(&block.payload);
        }
        out.extend_from_slice(data);
        Ok(vec![out.freeze()])
    }
}

/// RED decoder returning the primary encoding; redundant blocks are
/// retained for the caller to inspect.
#[derive(Default, Debug, Clone)]
pub struct RedPacket {
    pub blocks: Vec<RedBlock>,
    pub primary_payload_type: u8,
}

impl Depacketizer for RedPacket {
    fn depacketize(&mut self, packet: &Bytes) -> Result<Bytes> {
        self.blocks.clear();
        let mut header_end = 0usize;
        let mut block_meta = vec![];

        loop {
            if header_end >= packet.len() {
                return Err(Error::ErrShortPacket);
            }
            let b = packet[header_end];
            if b & 0x80 == 0 {
                self.primary_payload_type = b & 0x7F;
                header_end += 1;
                break;
            }
            if packet.len() < header_end + 4 {
                return Err(Error::ErrShortPacket);
            }
            let payload_type = b & 0x7F;
            let offset_and_len =
                ((packet[header_end + 1] as u32) << 16
                    | (packet[header_end + 2] as u32) << 8
                    | packet[header_end + 3] as u32)
                    & 0xFF_FFFF;
            let timestamp_offset = (offset_and_len >> 10) as u16;
            let block_length = (offset_and_len & 0x3FF) as usize;
            block_meta.push((payload_type, timestamp_offset, block_length));
            header_end += 4;
        }

        let mut offset = header_end;
        for (payload_type, timestamp_offset, block_length) in block_meta {
            if packet.len() < offset + block_length {
                return Err(Error::ErrShortPacket);
            }
            self.blocks.push(RedBlock {
                payload_type,
                timestamp_offset,
                payload: packet.slice(offset..offset + block_length),
            });
            offset += block_length;
        }

        if offset > packet.len() {
            return Err(Error::ErrShortPacket);
        }
        Ok(packet.slice(offset..))
    }

    fn is_partition_head(&self, _payload: &[u8]) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_red_primary_only_round_trip() {
        let mut payloader = RedPayloader {
            primary_payload_type: 111,
            redundant: vec![],
        };
        let frame = Bytes::from_static(&[1, 2, 3]);
        let payloads = payloader.payload(1200, &frame).unwrap();
        assert_eq!(payloads.len(), 1);

        let mut depacketizer = RedPacket::default();
        let primary = depacketizer.depacketize(&payloads[0]).unwrap();
        assert_eq!(primary, frame);
        assert_eq!(depacketizer.primary_payload_type, 111);
        assert!(depacketizer.blocks.is_empty());
    }

    #[test]
    fn test_red_with_redundancy_round_trip() {
        let old = Bytes::from_static(&[9, 9]);
        let mut payloader = RedPayloader {
            primary_payload_type: 111,
            redundant: vec![RedBlock {
                payload_type: 111,
                timestamp_offset: 960,
                payload: old.clone(),
            }],
        };
        let frame = Bytes::from_static(&[1, 2, 3]);
        let payloads = payloader.payload(1200, &frame).unwrap();

        let mut depacketizer = RedPacket::default();
        let primary = depacketizer.depacketize(&payloads[0]).unwrap();
        assert_eq!(primary, frame);
        assert_eq!(depacketizer.blocks.len(), 1);
        assert_eq!(depacketizer.blocks[0].payload, old);
        assert_eq!(depacketizer.blocks[0].timestamp_offset, 960);
        assert_eq!(depacketizer.blocks[0].payload_type, 111);
    }

    #[test]
    fn test_red_truncated_rejected() {
        let mut depacketizer = RedPacket::default();
        assert!(depacketizer.depacketize(&Bytes::from_static(&[0x80, 0x00])).is_err());
    }
}
