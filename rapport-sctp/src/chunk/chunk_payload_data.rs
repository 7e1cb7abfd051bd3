use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};

/// Payload protocol identifiers used by the DataChannel layer (RFC 8831).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PayloadProtocolIdentifier {
    #[default]
    Unknown = 0,
    Dcep = 50,
    String = 51,
    Binary = 53,
    StringEmpty = 56,
    BinaryEmpty = 57,
}

impl From<u32> for PayloadProtocolIdentifier {
    fn from(v: u32) -> Self {
        match v {
            50 => PayloadProtocolIdentifier::Dcep,
            51 => PayloadProtocolIdentifier::String,
            53 => PayloadProtocolIdentifier::Binary,
            56 => PayloadProtocolIdentifier::StringEmpty,
            57 => PayloadProtocolIdentifier::BinaryEmpty,
            _ => PayloadProtocolIdentifier::Unknown,
        }
    }
}

const FLAG_ENDING: u8 = 1;
const FLAG_BEGINNING: u8 = 2;
const FLAG_UNORDERED: u8 = 4;
const FLAG_IMMEDIATE: u8 = 8;

/// DATA chunk (RFC 4960 Section 3.3.1). Fragments of one user message share
/// a stream sequence number and are delimited by the B/E flags.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChunkPayloadData {
    pub unordered: bool,
    pub beginning_fragment: bool,
    pub ending_fragment: bool,
    pub immediate_sack: bool,

    pub tsn: u32,
    pub stream_identifier: u16,
    pub stream_sequence_number: u16,
    pub payload_type: PayloadProtocolIdentifier,
    pub user_data: Bytes,
}

impl ChunkPayloadData {
    pub(crate) fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.ending_fragment {
            flags |= FLAG_ENDING;
        }
        if self.beginning_fragment {
            flags |= FLAG_BEGINNING;
        }
        if self.unordered {
            flags |= FLAG_UNORDERED;
        }
        if self.immediate_sack {
            flags |= FLAG_IMMEDIATE;
        }
        flags
    }

    pub(crate) fn marshal_value(&self, out: &mut BytesMut) {
        out.put_u32(self.tsn);
        out.put_u16(self.stream_identifier);
        out.put_u16(self.stream_sequence_number);
        out.put_u32(self.payload_type as u32);
        out.extend_from_slice(&self.user_data);
    }

    pub(crate) fn unmarshal_value<B: Buf>(flags: u8, buf: &mut B) -> Result<Self> {
        if buf.remaining() < 12 {
            return Err(Error::ErrChunkPayloadSmall);
        }
        let tsn = buf.get_u32();
        let stream_identifier = buf.get_u16();
        let stream_sequence_number = buf.get_u16();
        let payload_type = PayloadProtocolIdentifier::from(buf.get_u32());
        let user_data = buf.copy_to_bytes(buf.remaining());

        Ok(ChunkPayloadData {
            unordered: flags & FLAG_UNORDERED != 0,
            beginning_fragment: flags & FLAG_BEGINNING != 0,
            ending_fragment: flags & FLAG_ENDING != 0,
            immediate_sack: flags & FLAG_IMMEDIATE != 0,
            tsn,
            stream_identifier,
            stream_sequence_number,
            payload_type,
            user_data,
        })
    }
}
