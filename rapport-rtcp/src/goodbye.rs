use bytes::{Buf, BufMut};
use shared::error::{Error, Result};
use shared::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::header::{Header, PacketType, COUNT_MAX, HEADER_LENGTH};

/// Goodbye (RFC 3550 Section 6.6): leaving SSRCs and an optional reason.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Goodbye {
    pub sources: Vec<u32>,
    pub reason: String,
}

impl MarshalSize for Goodbye {
    fn marshal_size(&self) -> usize {
        let mut size = HEADER_LENGTH + self.sources.len() * 4;
        if !self.reason.is_empty() {
            size += (1 + self.reason.len() + 3) / 4 * 4;
        }
        size
    }
}

impl Marshal for Goodbye {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        if self.sources.len() > COUNT_MAX as usize {
            return Err(Error::TooManySources);
        }
        if self.reason.len() > 255 {
            return Err(Error::ReasonTooLong);
        }
        let size = self.marshal_size();
        if buf.len() < size {
            return Err(Error::ErrBufferTooSmall);
        }
        let header = Header {
            padding: false,
            count: self.sources.len() as u8,
            packet_type: PacketType::Goodbye,
            length: ((size - HEADER_LENGTH) / 4) as u16,
        };
        let n = header.marshal_to(buf)?;
        buf = &mut buf[n..];
        for source in &self.sources {
            buf.put_u32(*source);
        }
        if !self.reason.is_empty() {
            buf.put_u8(self.reason.len() as u8);
            buf.put_slice(self.reason.as_bytes());
            let mut written = 1 + self.reason.len();
            while written % 4 != 0 {
                buf.put_u8(0);
                written += 1;
            }
        }
        Ok(size)
    }
}

impl Unmarshal for Goodbye {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let header = Header::unmarshal(raw_packet)?;
        if header.packet_type != PacketType::Goodbye {
            return Err(Error::WrongType);
        }
        if raw_packet.remaining() < header.count as usize * 4 {
            return Err(Error::PacketTooShort);
        }
        let mut sources = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            sources.push(raw_packet.get_u32());
        }
        let mut reason = String::new();
        if raw_packet.remaining() > 0 {
            let len = raw_packet.get_u8() as usize;
            if raw_packet.remaining() < len {
                return Err(Error::PacketTooShort);
            }
            let mut text = vec![0u8; len];
            raw_packet.copy_to_slice(&mut text);
            reason = String::from_utf8(text)?;
        }
        Ok(Goodbye { sources, reason })
    }
}
