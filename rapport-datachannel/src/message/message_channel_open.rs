use bytes::{Buf, BufMut};
use shared::error::{Error, Result};
use shared::marshal::{Marshal, MarshalSize, Unmarshal};

const CHANNEL_TYPE_LEN: usize = 1;
const PRIORITY_LEN: usize = 2;
const RELIABILITY_PARAMETER_LEN: usize = 4;
const LABEL_LENGTH_LEN: usize = 2;
const PROTOCOL_LENGTH_LEN: usize = 2;
const OPEN_HEADER_LEN: usize = CHANNEL_TYPE_LEN
    + PRIORITY_LEN
    + RELIABILITY_PARAMETER_LEN
    + LABEL_LENGTH_LEN
    + PROTOCOL_LENGTH_LEN;

/// Channel types (RFC 8832 Section 5.1). The high bit marks unordered
/// delivery.
#[derive(Eq, PartialEq, Copy, Clone, Debug, Default)]
#[repr(u8)]
pub enum ChannelType {
    #[default]
    Reliable = 0x00,
    ReliableUnordered = 0x80,
    PartialReliableRexmit = 0x01,
    PartialReliableRexmitUnordered = 0x81,
    PartialReliableTimed = 0x02,
    PartialReliableTimedUnordered = 0x82,
}

impl ChannelType {
    pub fn is_ordered(&self) -> bool {
        (*self as u8) & 0x80 == 0
    }

    fn from_u8(v: u8) -> Result<Self> {
        Ok(match v {
            0x00 => ChannelType::Reliable,
            0x80 => ChannelType::ReliableUnordered,
            0x01 => ChannelType::PartialReliableRexmit,
            0x81 => ChannelType::PartialReliableRexmitUnordered,
            0x02 => ChannelType::PartialReliableTimed,
            0x82 => ChannelType::PartialReliableTimedUnordered,
            other => return Err(Error::InvalidChannelType(other)),
        })
    }
}

/// DATA_CHANNEL_OPEN (RFC 8832 Section 5.1).
#[derive(Eq, PartialEq, Clone, Debug, Default)]
pub struct DataChannelOpen {
    pub channel_type: ChannelType,
    pub priority: u16,
    /// Retransmit budget or lifetime in milliseconds for the
    /// partial-reliability channel types, otherwise 0.
    pub reliability_parameter: u32,
    pub label: Vec<u8>,
    pub protocol: Vec<u8>,
}

impl MarshalSize for DataChannelOpen {
    fn marshal_size(&self) -> usize {
        OPEN_HEADER_LEN + self.label.len() + self.protocol.len()
    }
}

impl Marshal for DataChannelOpen {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        let size = self.marshal_size();
        if buf.len() < size {
            return Err(Error::ErrBufferTooSmall);
        }
        buf.put_u8(self.channel_type as u8);
        buf.put_u16(self.priority);
        buf.put_u32(self.reliability_parameter);
        buf.put_u16(self.label.len() as u16);
        buf.put_u16(self.protocol.len() as u16);
        buf.put_slice(&self.label);
        buf.put_slice(&self.protocol);
        Ok(size)
    }
}

impl Unmarshal for DataChannelOpen {
    fn unmarshal<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        if buf.remaining() < OPEN_HEADER_LEN {
            return Err(Error::UnexpectedEndOfBuffer {
                expected: OPEN_HEADER_LEN,
                actual: buf.remaining(),
            });
        }
        let channel_type = ChannelType::from_u8(buf.get_u8())?;
        let priority = buf.get_u16();
        let reliability_parameter = buf.get_u32();
        let label_len = buf.get_u16() as usize;
        let protocol_len = buf.get_u16() as usize;

        if buf.remaining() < label_len + protocol_len {
            return Err(Error::UnexpectedEndOfBuffer {
                expected: label_len + protocol_len,
                actual: buf.remaining(),
            });
        }
        let mut label = vec![0u8; label_len];
        buf.copy_to_slice(&mut label);
        let mut protocol = vec![0u8; protocol_len];
        buf.copy_to_slice(&mut protocol);

        Ok(DataChannelOpen {
            channel_type,
            priority,
            reliability_parameter,
            label,
            protocol,
        })
    }
}
