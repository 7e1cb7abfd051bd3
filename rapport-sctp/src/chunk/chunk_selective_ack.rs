use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

/// One gap ack block, offsets relative to the cumulative TSN ack.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GapAckBlock {
    pub start: u16,
    pub end: u16,
}

/// SACK chunk (RFC 4960 Section 3.3.4).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkSelectiveAck {
    pub cumulative_tsn_ack: u32,
    pub advertised_receiver_window_credit: u32,
    pub gap_ack_blocks: Vec<GapAckBlock>,
    pub duplicate_tsns: Vec<u32>,
}

impl ChunkSelectiveAck {
    pub(crate) fn marshal_value(&self, out: &mut BytesMut) {
        out.put_u32(self.cumulative_tsn_ack);
        out.put_u32(self.advertised_receiver_window_credit);
        out.put_u16(self.gap_ack_blocks.len() as u16);
        out.put_u16(self.duplicate_tsns.len() as u16);
        for block in &self.gap_ack_blocks {
            out.put_u16(block.start);
            out.put_u16(block.end);
        }
        for tsn in &self.duplicate_tsns {
            out.put_u32(*tsn);
        }
    }

    pub(crate) fn unmarshal_value<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 12 {
            return Err(Error::ErrSackSizeNotLargeEnoughInfo);
        }
        let cumulative_tsn_ack = buf.get_u32();
        let advertised_receiver_window_credit = buf.get_u32();
        let gap_count = buf.get_u16() as usize;
        let dup_count = buf.get_u16() as usize;
        if buf.remaining() < gap_count * 4 + dup_count * 4 {
            return Err(Error::ErrSackSizeNotLargeEnoughInfo);
        }
        let mut gap_ack_blocks = Vec::with_capacity(gap_count);
        for _ in 0..gap_count {
            gap_ack_blocks.push(GapAckBlock {
                start: buf.get_u16(),
                end: buf.get_u16(),
            });
        }
        let mut duplicate_tsns = Vec::with_capacity(dup_count);
        for _ in 0..dup_count {
            duplicate_tsns.push(buf.get_u32());
        }
        Ok(ChunkSelectiveAck {
            cumulative_tsn_ack,
            advertised_receiver_window_credit,
            gap_ack_blocks,
            duplicate_tsns,
        })
    }
}
