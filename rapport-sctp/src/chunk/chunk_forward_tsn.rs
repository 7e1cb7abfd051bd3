use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

/// Per-stream entry of a FORWARD-TSN chunk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkForwardTsnStream {
    pub identifier: u16,
    pub sequence: u16,
}

/// FORWARD-TSN (RFC 3758 Section 3.2): moves the peer's cumulative ack past
/// abandoned messages.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkForwardTsn {
    pub new_cumulative_tsn: u32,
    pub streams: Vec<ChunkForwardTsnStream>,
}

impl ChunkForwardTsn {
    pub(crate) fn marshal_value(&self, out: &mut BytesMut) {
        out.put_u32(self.new_cumulative_tsn);
        for stream in &self.streams {
            out.put_u16(stream.identifier);
            out.put_u16(stream.sequence);
        }
    }

    pub(crate) fn unmarshal_value<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(Error::ErrChunkTooShort);
        }
        let new_cumulative_tsn = buf.get_u32();
        let mut streams = vec![];
        while buf.remaining() >= 4 {
            streams.push(ChunkForwardTsnStream {
                identifier: buf.get_u16(),
                sequence: buf.get_u16(),
            });
        }
        Ok(ChunkForwardTsn {
            new_cumulative_tsn,
            streams,
        })
    }
}
