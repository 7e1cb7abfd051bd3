use bytes::{Buf, BufMut};
use shared::error::{Error, Result};
use shared::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::header::{Header, PacketType, COUNT_MAX, HEADER_LENGTH};

pub const RECEPTION_REPORT_LENGTH: usize = 24;

/// One reception report block (RFC 3550 Section 6.4.1).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReceptionReport {
    pub ssrc: u32,
    /// Fraction of packets lost since the last report, fixed point /256.
    pub fraction_lost: u8,
    /// Cumulative packets lost, 24 bits.
    pub total_lost: u32,
    /// Extended highest sequence number received (cycles << 16 | seq).
    pub last_sequence_number: u32,
    /// Interarrival jitter in timestamp units.
    pub jitter: u32,
    /// Middle 32 bits of the last SR NTP timestamp.
    pub last_sender_report: u32,
    /// Delay since last SR in 1/65536 seconds.
    pub delay: u32,
}

impl ReceptionReport {
    pub(crate) fn marshal_into(&self, buf: &mut &mut [u8]) -> Result<()> {
        if self.total_lost >= (1 << 25) {
            return Err(Error::InvalidTotalLost);
        }
        buf.put_u32(self.ssrc);
        buf.put_u32((u32::from(self.fraction_lost) << 24) | self.total_lost);
        buf.put_u32(self.last_sequence_number);
        buf.put_u32(self.jitter);
        buf.put_u32(self.last_sender_report);
        buf.put_u32(self.delay);
        Ok(())
    }

    pub(crate) fn unmarshal_from<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < RECEPTION_REPORT_LENGTH {
            return Err(Error::PacketTooShort);
        }
        let ssrc = buf.get_u32();
        let word = buf.get_u32();
        Ok(ReceptionReport {
            ssrc,
            fraction_lost: (word >> 24) as u8,
            total_lost: word & 0x00FF_FFFF,
            last_sequence_number: buf.get_u32(),
            jitter: buf.get_u32(),
            last_sender_report: buf.get_u32(),
            delay: buf.get_u32(),
        })
    }
}

/// ReceiverReport (RFC 3550 Section 6.4.2).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReceiverReport {
    pub ssrc: u32,
    pub reports: Vec<ReceptionReport>,
}

impl MarshalSize for ReceiverReport {
    fn marshal_size(&self) -> usize {
        HEADER_LENGTH + 4 + self.reports.len() * RECEPTION_REPORT_LENGTH
    }
}

impl Marshal for ReceiverReport {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        if self.reports.len() > COUNT_MAX as usize {
            return Err(Error::TooManyReports);
        }
        let size = self.marshal_size();
        if buf.len() < size {
            return Err(Error::ErrBufferTooSmall);
        }
        let header = Header {
            padding: false,
            count: self.reports.len() as u8,
            packet_type: PacketType::ReceiverReport,
            length: ((size - HEADER_LENGTH) / 4) as u16,
        };
        let n = header.marshal_to(buf)?;
        buf = &mut buf[n..];
        buf.put_u32(self.ssrc);
        for report in &self.reports {
            report.marshal_into(&mut buf)?;
        }
        Ok(size)
    }
}

impl Unmarshal for ReceiverReport {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let header = Header::unmarshal(raw_packet)?;
        if header.packet_type != PacketType::ReceiverReport {
            return Err(Error::WrongType);
        }
        if raw_packet.remaining() < 4 {
            return Err(Error::PacketTooShort);
        }
        let ssrc = raw_packet.get_u32();
        let mut reports = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            reports.push(ReceptionReport::unmarshal_from(raw_packet)?);
        }
        Ok(ReceiverReport { ssrc, reports })
    }
}
