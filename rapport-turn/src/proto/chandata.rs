use shared::error::{Error, Result};

use super::{MAX_CHANNEL_NUMBER, MIN_CHANNEL_NUMBER};

pub const CHANNEL_DATA_HEADER_SIZE: usize = 4;
const PADDING: usize = 4;

/// ChannelData message (RFC 5766 Section 11.4): 2-byte channel number,
/// 2-byte length, then the application data padded to a 4-byte boundary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelData {
    pub number: u16,
    pub data: Vec<u8>,
}

impl ChannelData {
    pub fn encode(&self) -> Vec<u8> {
        let padded = nearest_padded_length(self.data.len());
        let mut raw = Vec::with_capacity(CHANNEL_DATA_HEADER_SIZE + padded);
        raw.extend_from_slice(&self.number.to_be_bytes());
        raw.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
        raw.extend_from_slice(&self.data);
        raw.resize(CHANNEL_DATA_HEADER_SIZE + padded, 0);
        raw
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < CHANNEL_DATA_HEADER_SIZE {
            return Err(Error::ErrUnexpectedEof);
        }
        let number = u16::from_be_bytes([raw[0], raw[1]]);
        if !(MIN_CHANNEL_NUMBER..=MAX_CHANNEL_NUMBER).contains(&number) {
            return Err(Error::ErrInvalidChannelNumber);
        }
        let length = u16::from_be_bytes([raw[2], raw[3]]) as usize;
        if raw.len() < CHANNEL_DATA_HEADER_SIZE + length {
            return Err(Error::ErrBadChannelDataLength);
        }
        Ok(ChannelData {
            number,
            data: raw[CHANNEL_DATA_HEADER_SIZE..CHANNEL_DATA_HEADER_SIZE + length].to_vec(),
        })
    }

    /// Reports whether `b` plausibly starts a ChannelData message; used by
    /// the transport demuxer for the 64..=79 first-byte range.
    pub fn is_channel_data(b: &[u8]) -> bool {
        if b.len() < CHANNEL_DATA_HEADER_SIZE {
            return false;
        }
        let number = u16::from_be_bytes([b[0], b[1]]);
        if !(MIN_CHANNEL_NUMBER..=MAX_CHANNEL_NUMBER).contains(&number) {
            return false;
        }
        let length = u16::from_be_bytes([b[2], b[3]]) as usize;
        b.len() >= CHANNEL_DATA_HEADER_SIZE + length
    }
}

fn nearest_padded_length(n: usize) -> usize {
    let mut m = PADDING * (n / PADDING);
    if m < n {
        m += PADDING;
    }
    m
}
