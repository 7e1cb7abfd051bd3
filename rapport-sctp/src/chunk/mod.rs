#[cfg(test)]
mod chunk_test;

pub mod chunk_forward_tsn;
pub mod chunk_init;
pub mod chunk_misc;
pub mod chunk_payload_data;
pub mod chunk_reconfig;
pub mod chunk_selective_ack;

use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

use chunk_forward_tsn::ChunkForwardTsn;
use chunk_init::ChunkInit;
use chunk_misc::{
    ChunkAbort, ChunkCookieAck, ChunkCookieEcho, ChunkHeartbeat, ChunkHeartbeatAck,
    ChunkShutdown, ChunkShutdownAck, ChunkShutdownComplete,
};
use chunk_payload_data::ChunkPayloadData;
use chunk_reconfig::ChunkReconfig;
use chunk_selective_ack::ChunkSelectiveAck;

pub const CHUNK_HEADER_SIZE: usize = 4;

/// SCTP chunk types (RFC 4960 Section 3.2 plus RFC 3758/6525).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkType {
    PayloadData = 0,
    Init = 1,
    InitAck = 2,
    SelectiveAck = 3,
    Heartbeat = 4,
    HeartbeatAck = 5,
    Abort = 6,
    Shutdown = 7,
    ShutdownAck = 8,
    CookieEcho = 10,
    CookieAck = 11,
    ShutdownComplete = 14,
    Reconfig = 130,
    ForwardTsn = 192,
}

/// A parsed SCTP chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    PayloadData(ChunkPayloadData),
    Init(ChunkInit),
    InitAck(ChunkInit),
    SelectiveAck(ChunkSelectiveAck),
    Heartbeat(ChunkHeartbeat),
    HeartbeatAck(ChunkHeartbeatAck),
    Abort(ChunkAbort),
    Shutdown(ChunkShutdown),
    ShutdownAck(ChunkShutdownAck),
    CookieEcho(ChunkCookieEcho),
    CookieAck(ChunkCookieAck),
    ShutdownComplete(ChunkShutdownComplete),
    Reconfig(ChunkReconfig),
    ForwardTsn(ChunkForwardTsn),
}

impl Chunk {
    pub fn typ(&self) -> ChunkType {
        match self {
            Chunk::PayloadData(_) => ChunkType::PayloadData,
            Chunk::Init(_) => ChunkType::Init,
            Chunk::InitAck(_) => ChunkType::InitAck,
            Chunk::SelectiveAck(_) => ChunkType::SelectiveAck,
            Chunk::Heartbeat(_) => ChunkType::Heartbeat,
            Chunk::HeartbeatAck(_) => ChunkType::HeartbeatAck,
            Chunk::Abort(_) => ChunkType::Abort,
            Chunk::Shutdown(_) => ChunkType::Shutdown,
            Chunk::ShutdownAck(_) => ChunkType::ShutdownAck,
            Chunk::CookieEcho(_) => ChunkType::CookieEcho,
            Chunk::CookieAck(_) => ChunkType::CookieAck,
            Chunk::ShutdownComplete(_) => ChunkType::ShutdownComplete,
            Chunk::Reconfig(_) => ChunkType::Reconfig,
            Chunk::ForwardTsn(_) => ChunkType::ForwardTsn,
        }
    }

    fn flags(&self) -> u8 {
        match self {
            Chunk::PayloadData(data) => data.flags(),
            _ => 0,
        }
    }

    fn value(&self) -> Vec<u8> {
        let mut out = BytesMut::new();
        match self {
            Chunk::PayloadData(c) => c.marshal_value(&mut out),
            Chunk::Init(c) | Chunk::InitAck(c) => c.marshal_value(&mut out),
            Chunk::SelectiveAck(c) => c.marshal_value(&mut out),
            Chunk::Heartbeat(c) => c.marshal_value(&mut out),
            Chunk::HeartbeatAck(c) => c.marshal_value(&mut out),
            Chunk::Abort(c) => c.marshal_value(&mut out),
            Chunk::Shutdown(c) => c.marshal_value(&mut out),
            Chunk::ShutdownAck(_) | Chunk::CookieAck(_) | Chunk::ShutdownComplete(_) => {}
            Chunk::CookieEcho(c) => c.marshal_value(&mut out),
            Chunk::Reconfig(c) => c.marshal_value(&mut out),
            Chunk::ForwardTsn(c) => c.marshal_value(&mut out),
        }
        out.to_vec()
    }

    /// Serializes the chunk with header and trailing padding.
    pub fn marshal_to(&self, out: &mut BytesMut) {
        let value = self.value();
        out.put_u8(self.typ() as u8);
        out.put_u8(self.flags());
        out.put_u16((CHUNK_HEADER_SIZE + value.len()) as u16);
        out.extend_from_slice(&value);
        let padding = (4 - value.len() % 4) % 4;
        for _ in 0..padding {
            out.put_u8(0);
        }
    }

    pub fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < CHUNK_HEADER_SIZE {
            return Err(Error::ErrChunkHeaderTooSmall);
        }
        let typ = buf.get_u8();
        let flags = buf.get_u8();
        let length = buf.get_u16() as usize;
        if length < CHUNK_HEADER_SIZE {
            return Err(Error::ErrChunkHeaderInvalidLength);
        }
        let value_len = length - CHUNK_HEADER_SIZE;
        if buf.remaining() < value_len {
            return Err(Error::ErrChunkHeaderNotEnoughSpace);
        }
        let mut value = vec![0u8; value_len];
        buf.copy_to_slice(&mut value);
        let padding = (4 - value_len % 4) % 4;
        for _ in 0..padding.min(buf.remaining()) {
            buf.get_u8();
        }

        let mut v = &value[..];
        Ok(match typ {
            0 => Chunk::PayloadData(ChunkPayloadData::unmarshal_value(flags, &mut v)?),
            1 => Chunk::Init(ChunkInit::unmarshal_value(&mut v)?),
            2 => Chunk::InitAck(ChunkInit::unmarshal_value(&mut v)?),
            3 => Chunk::SelectiveAck(ChunkSelectiveAck::unmarshal_value(&mut v)?),
            4 => Chunk::Heartbeat(ChunkHeartbeat::unmarshal_value(&mut v)?),
            5 => Chunk::HeartbeatAck(ChunkHeartbeatAck::unmarshal_value(&mut v)?),
            6 => Chunk::Abort(ChunkAbort::unmarshal_value(&mut v)?),
            7 => Chunk::Shutdown(ChunkShutdown::unmarshal_value(&mut v)?),
            8 => Chunk::ShutdownAck(ChunkShutdownAck),
            10 => Chunk::CookieEcho(ChunkCookieEcho { cookie: value }),
            11 => Chunk::CookieAck(ChunkCookieAck),
            14 => Chunk::ShutdownComplete(ChunkShutdownComplete),
            130 => Chunk::Reconfig(ChunkReconfig::unmarshal_value(&mut v)?),
            192 => Chunk::ForwardTsn(ChunkForwardTsn::unmarshal_value(&mut v)?),
            _ => return Err(Error::ErrUnmarshalUnknownChunkType),
        })
    }
}
