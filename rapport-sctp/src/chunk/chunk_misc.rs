use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

/// COOKIE-ECHO (RFC 4960 Section 3.3.11); the value is the opaque cookie.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkCookieEcho {
    pub cookie: Vec<u8>,
}

impl ChunkCookieEcho {
    pub(crate) fn marshal_value(&self, out: &mut BytesMut) {
        out.extend_from_slice(&self.cookie);
    }
}

/// COOKIE-ACK, an empty chunk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCookieAck;

/// HEARTBEAT with its info parameter kept opaque (RFC 4960 Section 3.3.5).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkHeartbeat {
    pub info: Vec<u8>,
}

const PARAM_HEARTBEAT_INFO: u16 = 1;

impl ChunkHeartbeat {
    pub(crate) fn marshal_value(&self, out: &mut BytesMut) {
        out.put_u16(PARAM_HEARTBEAT_INFO);
        out.put_u16((4 + self.info.len()) as u16);
        out.extend_from_slice(&self.info);
        let padding = (4 - self.info.len() % 4) % 4;
        for _ in 0..padding {
            out.put_u8(0);
        }
    }

    pub(crate) fn unmarshal_value<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(Error::ErrHeartbeatNotLongEnoughInfo);
        }
        let _typ = buf.get_u16();
        let length = buf.get_u16() as usize;
        if length < 4 || buf.remaining() < length - 4 {
            return Err(Error::ErrHeartbeatNotLongEnoughInfo);
        }
        let mut info = vec![0u8; length - 4];
        buf.copy_to_slice(&mut info);
        Ok(ChunkHeartbeat { info })
    }
}

/// HEARTBEAT-ACK echoing the info parameter.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkHeartbeatAck {
    pub info: Vec<u8>,
}

impl ChunkHeartbeatAck {
    pub(crate) fn marshal_value(&self, out: &mut BytesMut) {
        out.put_u16(PARAM_HEARTBEAT_INFO);
        out.put_u16((4 + self.info.len()) as u16);
        out.extend_from_slice(&self.info);
        let padding = (4 - self.info.len() % 4) % 4;
        for _ in 0..padding {
            out.put_u8(0);
        }
    }

    pub(crate) fn unmarshal_value<B: Buf>(buf: &mut B) -> Result<Self> {
        let hb = ChunkHeartbeat::unmarshal_value(buf)?;
        Ok(ChunkHeartbeatAck { info: hb.info })
    }
}

/// ABORT; error causes are carried opaquely.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkAbort {
    pub error_causes: Vec<u8>,
}

impl ChunkAbort {
    pub(crate) fn marshal_value(&self, out: &mut BytesMut) {
        out.extend_from_slice(&self.error_causes);
    }

    pub(crate) fn unmarshal_value<B: Buf>(buf: &mut B) -> Result<Self> {
        let mut error_causes = vec![0u8; buf.remaining()];
        buf.copy_to_slice(&mut error_causes);
        Ok(ChunkAbort { error_causes })
    }
}

/// SHUTDOWN carrying the last cumulative TSN ack.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkShutdown {
    pub cumulative_tsn_ack: u32,
}

impl ChunkShutdown {
    pub(crate) fn marshal_value(&self, out: &mut BytesMut) {
        out.put_u32(self.cumulative_tsn_ack);
    }

    pub(crate) fn unmarshal_value<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(Error::ErrChunkTooShort);
        }
        Ok(ChunkShutdown {
            cumulative_tsn_ack: buf.get_u32(),
        })
    }
}

/// SHUTDOWN-ACK, empty.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkShutdownAck;

/// SHUTDOWN-COMPLETE, empty.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkShutdownComplete;
