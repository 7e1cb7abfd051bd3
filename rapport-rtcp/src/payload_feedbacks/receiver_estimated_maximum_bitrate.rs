use bytes::{Buf, BufMut};
use shared::error::{Error, Result};
use shared::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::header::{Header, PacketType, FORMAT_REMB, HEADER_LENGTH};

const UNIQUE_IDENTIFIER: [u8; 4] = *b"REMB";

/// ReceiverEstimatedMaximumBitrate
/// (draft-alvestrand-rmcat-remb): an absolute bitrate estimate encoded as
/// 6-bit exponent + 18-bit mantissa, plus the SSRCs it applies to.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReceiverEstimatedMaximumBitrate {
    pub sender_ssrc: u32,
    /// Estimated bitrate in bits per second.
    pub bitrate: u64,
    pub ssrcs: Vec<u32>,
}

impl MarshalSize for ReceiverEstimatedMaximumBitrate {
    fn marshal_size(&self) -> usize {
        HEADER_LENGTH + 16 + self.ssrcs.len() * 4
    }
}

impl Marshal for ReceiverEstimatedMaximumBitrate {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        let size = self.marshal_size();
        if buf.len() < size {
            return Err(Error::ErrBufferTooSmall);
        }

        // Encode bitrate as mantissa * 2^exp with an 18-bit mantissa.
        let mut exp = 0u32;
        while (self.bitrate >> exp) >= (1 << 18) {
            exp += 1;
            if exp > 63 {
                return Err(Error::InvalidBitrate);
            }
        }
        let mantissa = (self.bitrate >> exp) as u32;

        let header = Header {
            padding: false,
            count: FORMAT_REMB,
            packet_type: PacketType::PayloadSpecificFeedback,
            length: ((size - HEADER_LENGTH) / 4) as u16,
        };
        let n = header.marshal_to(buf)?;
        buf = &mut buf[n..];
        buf.put_u32(self.sender_ssrc);
        // media SSRC is always 0 for REMB.
        buf.put_u32(0);
        buf.put_slice(&UNIQUE_IDENTIFIER);
        buf.put_u8(self.ssrcs.len() as u8);
        buf.put_u8(((exp << 2) as u8) | ((mantissa >> 16) as u8 & 0x03));
        buf.put_u16(mantissa as u16);
        for ssrc in &self.ssrcs {
            buf.put_u32(*ssrc);
        }
        Ok(size)
    }
}

impl Unmarshal for ReceiverEstimatedMaximumBitrate {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let header = Header::unmarshal(raw_packet)?;
        if header.packet_type != PacketType::PayloadSpecificFeedback || header.count != FORMAT_REMB
        {
            return Err(Error::WrongType);
        }
        if raw_packet.remaining() < 16 {
            return Err(Error::PacketTooShort);
        }
        let sender_ssrc = raw_packet.get_u32();
        let media_ssrc = raw_packet.get_u32();
        if media_ssrc != 0 {
            return Err(Error::SsrcMustBeZero);
        }
        let mut identifier = [0u8; 4];
        raw_packet.copy_to_slice(&mut identifier);
        if identifier != UNIQUE_IDENTIFIER {
            return Err(Error::MissingRembIdentifier);
        }
        let num_ssrcs = raw_packet.get_u8() as usize;
        let b = raw_packet.get_u8();
        let exp = (b >> 2) as u32;
        let mantissa = ((u32::from(b) & 0x03) << 16) | u32::from(raw_packet.get_u16());
        let bitrate = u64::from(mantissa) << exp;

        if raw_packet.remaining() < num_ssrcs * 4 {
            return Err(Error::SsrcNumAndLengthMismatch);
        }
        let mut ssrcs = Vec::with_capacity(num_ssrcs);
        for _ in 0..num_ssrcs {
            ssrcs.push(raw_packet.get_u32());
        }
        Ok(ReceiverEstimatedMaximumBitrate {
            sender_ssrc,
            bitrate,
            ssrcs,
        })
    }
}
