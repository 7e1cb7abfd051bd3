#[cfg(test)]
mod record_test;

use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

use crate::PROTOCOL_VERSION;

/// Record layer content types (RFC 5246 Section 6.2.1).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
    #[default]
    Invalid = 0,
}

impl ContentType {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            20 => Ok(ContentType::ChangeCipherSpec),
            21 => Ok(ContentType::Alert),
            22 => Ok(ContentType::Handshake),
            23 => Ok(ContentType::ApplicationData),
            _ => Err(Error::ErrInvalidContentType),
        }
    }
}

/// Fixed record header size: type(1) + version(2) + epoch(2) + seq(6) +
/// length(2).
pub const RECORD_HEADER_SIZE: usize = 13;

/// Maximum plaintext we place in one record; conservative for UDP MTUs.
pub const MAX_RECORD_PAYLOAD: usize = 1200;

/// A DTLS record header (RFC 6347 Section 4.1).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: u16,
    pub epoch: u16,
    /// 48-bit sequence number, monotonic per epoch.
    pub sequence_number: u64,
    pub length: u16,
}

impl RecordHeader {
    pub fn marshal_to(&self, out: &mut BytesMut) {
        out.put_u8(self.content_type as u8);
        out.put_u16(self.version);
        out.put_u16(self.epoch);
        // 48-bit sequence number.
        out.put_uint(self.sequence_number, 6);
        out.put_u16(self.length);
    }

    pub fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < RECORD_HEADER_SIZE {
            return Err(Error::ErrDtlsPacketInvalidLength);
        }
        let content_type = ContentType::from_u8(buf.get_u8())?;
        let version = buf.get_u16();
        let epoch = buf.get_u16();
        let sequence_number = buf.get_uint(6);
        let length = buf.get_u16();
        Ok(RecordHeader {
            content_type,
            version,
            epoch,
            sequence_number,
            length,
        })
    }
}

/// One plaintext record ready for (optional) protection and transmission.
#[derive(Debug, Clone)]
pub struct Record {
    pub header: RecordHeader,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(content_type: ContentType, epoch: u16, sequence_number: u64, payload: Vec<u8>) -> Self {
        Record {
            header: RecordHeader {
                content_type,
                version: PROTOCOL_VERSION,
                epoch,
                sequence_number,
                length: payload.len() as u16,
            },
            payload,
        }
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut out = BytesMut::with_capacity(RECORD_HEADER_SIZE + self.payload.len());
        let mut header = self.header.clone();
        header.length = self.payload.len() as u16;
        header.marshal_to(&mut out);
        out.extend_from_slice(&self.payload);
        out.to_vec()
    }
}

/// Splits a datagram into raw records, each returned as (header, payload).
pub fn split_records(datagram: &[u8]) -> Result<Vec<(RecordHeader, Vec<u8>)>> {
    let mut records = Vec::new();
    let mut buf = datagram;
    while !buf.is_empty() {
        let mut cursor = buf;
        let header = RecordHeader::unmarshal(&mut cursor)?;
        let body_len = header.length as usize;
        if cursor.remaining() < body_len {
            return Err(Error::ErrInvalidPacketLength);
        }
        records.push((header, cursor[..body_len].to_vec()));
        buf = &buf[RECORD_HEADER_SIZE + body_len..];
    }
    Ok(records)
}
