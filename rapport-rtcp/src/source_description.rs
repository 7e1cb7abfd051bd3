use bytes::{Buf, BufMut};
use shared::error::{Error, Result};
use shared::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::header::{Header, PacketType, COUNT_MAX, HEADER_LENGTH};

/// SDES item types (RFC 3550 Section 12.2).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SdesType {
    #[default]
    SdesEnd = 0,
    SdesCname = 1,
    SdesName = 2,
    SdesEmail = 3,
    SdesPhone = 4,
    SdesLocation = 5,
    SdesTool = 6,
    SdesNote = 7,
    SdesPrivate = 8,
}

impl From<u8> for SdesType {
    fn from(b: u8) -> Self {
        match b {
            1 => SdesType::SdesCname,
            2 => SdesType::SdesName,
            3 => SdesType::SdesEmail,
            4 => SdesType::SdesPhone,
            5 => SdesType::SdesLocation,
            6 => SdesType::SdesTool,
            7 => SdesType::SdesNote,
            8 => SdesType::SdesPrivate,
            _ => SdesType::SdesEnd,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceDescriptionItem {
    pub sdes_type: SdesType,
    pub text: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceDescriptionChunk {
    pub source: u32,
    pub items: Vec<SourceDescriptionItem>,
}

impl SourceDescriptionChunk {
    /// Item bytes plus the END octet, padded to a word boundary.
    fn raw_len(&self) -> usize {
        let len: usize = 4
            + self
                .items
                .iter()
                .map(|item| 2 + item.text.len())
                .sum::<usize>()
            + 1;
        (len + 3) / 4 * 4
    }
}

/// SourceDescription (RFC 3550 Section 6.5); in practice one CNAME chunk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceDescription {
    pub chunks: Vec<SourceDescriptionChunk>,
}

impl SourceDescription {
    pub fn cname(ssrc: u32, cname: &str) -> Self {
        SourceDescription {
            chunks: vec![SourceDescriptionChunk {
                source: ssrc,
                items: vec![SourceDescriptionItem {
                    sdes_type: SdesType::SdesCname,
                    text: cname.to_owned(),
                }],
            }],
        }
    }
}

impl MarshalSize for SourceDescription {
    fn marshal_size(&self) -> usize {
        HEADER_LENGTH + self.chunks.iter().map(|c| c.raw_len()).sum::<usize>()
    }
}

impl Marshal for SourceDescription {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        if self.chunks.len() > COUNT_MAX as usize {
            return Err(Error::TooManyChunks);
        }
        let size = self.marshal_size();
        if buf.len() < size {
            return Err(Error::ErrBufferTooSmall);
        }
        let header = Header {
            padding: false,
            count: self.chunks.len() as u8,
            packet_type: PacketType::SourceDescription,
            length: ((size - HEADER_LENGTH) / 4) as u16,
        };
        let n = header.marshal_to(buf)?;
        buf = &mut buf[n..];

        for chunk in &self.chunks {
            buf.put_u32(chunk.source);
            let mut written = 4;
            for item in &chunk.items {
                if item.text.len() > 255 {
                    return Err(Error::SdesTextTooLong);
                }
                buf.put_u8(item.sdes_type as u8);
                buf.put_u8(item.text.len() as u8);
                buf.put_slice(item.text.as_bytes());
                written += 2 + item.text.len();
            }
            buf.put_u8(SdesType::SdesEnd as u8);
            written += 1;
            while written % 4 != 0 {
                buf.put_u8(0);
                written += 1;
            }
        }
        Ok(size)
    }
}

impl Unmarshal for SourceDescription {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let header = Header::unmarshal(raw_packet)?;
        if header.packet_type != PacketType::SourceDescription {
            return Err(Error::WrongType);
        }

        let mut chunks = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            if raw_packet.remaining() < 4 {
                return Err(Error::PacketTooShort);
            }
            let source = raw_packet.get_u32();
            let mut items = vec![];
            let mut consumed = 4;
            loop {
                if raw_packet.remaining() < 1 {
                    return Err(Error::PacketTooShort);
                }
                let sdes_type = SdesType::from(raw_packet.get_u8());
                consumed += 1;
                if sdes_type == SdesType::SdesEnd {
                    // skip padding to the word boundary
                    while consumed % 4 != 0 {
                        if raw_packet.remaining() < 1 {
                            return Err(Error::PacketTooShort);
                        }
                        raw_packet.get_u8();
                        consumed += 1;
                    }
                    break;
                }
                if raw_packet.remaining() < 1 {
                    return Err(Error::PacketTooShort);
                }
                let len = raw_packet.get_u8() as usize;
                consumed += 1;
                if raw_packet.remaining() < len {
                    return Err(Error::PacketTooShort);
                }
                let mut text = vec![0u8; len];
                raw_packet.copy_to_slice(&mut text);
                consumed += len;
                items.push(SourceDescriptionItem {
                    sdes_type,
                    text: String::from_utf8(text)?,
                });
            }
            chunks.push(SourceDescriptionChunk { source, items });
        }
        Ok(SourceDescription { chunks })
    }
}
