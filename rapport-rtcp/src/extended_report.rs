use bytes::{Buf, BufMut};
use shared::error::{Error, Result};
use shared::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::header::{Header, PacketType, HEADER_LENGTH};

pub const BLOCK_TYPE_RRTR: u8 = 4;
pub const BLOCK_TYPE_DLRR: u8 = 5;
pub const BLOCK_TYPE_STATISTICS_SUMMARY: u8 = 6;

/// Receiver Reference Time block (RFC 3611 Section 4.4).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RrtrBlock {
    pub ntp_timestamp: u64,
}

/// One DLRR sub-report (RFC 3611 Section 4.5).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DlrrReport {
    pub ssrc: u32,
    pub last_rr: u32,
    pub dlrr: u32,
}

/// Statistics Summary block (RFC 3611 Section 4.6).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsSummaryBlock {
    pub ssrc: u32,
    pub begin_seq: u16,
    pub end_seq: u16,
    pub lost_packets: u32,
    pub dup_packets: u32,
    pub min_jitter: u32,
    pub max_jitter: u32,
    pub mean_jitter: u32,
    pub dev_jitter: u32,
    pub min_ttl_or_hl: u8,
    pub max_ttl_or_hl: u8,
    pub mean_ttl_or_hl: u8,
    pub dev_ttl_or_hl: u8,
}

/// One XR report block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XrBlock {
    ReceiverReferenceTime(RrtrBlock),
    Dlrr(Vec<DlrrReport>),
    StatisticsSummary(StatisticsSummaryBlock),
    Unknown { block_type: u8, data: Vec<u8> },
}

impl XrBlock {
    fn body_len(&self) -> usize {
        match self {
            XrBlock::ReceiverReferenceTime(_) => 8,
            XrBlock::Dlrr(reports) => reports.len() * 12,
            XrBlock::StatisticsSummary(_) => 36,
            XrBlock::Unknown { data, .. } => data.len(),
        }
    }

    fn block_type(&self) -> u8 {
        match self {
            XrBlock::ReceiverReferenceTime(_) => BLOCK_TYPE_RRTR,
            XrBlock::Dlrr(_) => BLOCK_TYPE_DLRR,
            XrBlock::StatisticsSummary(_) => BLOCK_TYPE_STATISTICS_SUMMARY,
            XrBlock::Unknown { block_type, .. } => *block_type,
        }
    }

    fn marshal_into(&self, buf: &mut &mut [u8]) -> Result<()> {
        buf.put_u8(self.block_type());
        buf.put_u8(0); // type-specific
        buf.put_u16((self.body_len() / 4) as u16);
        match self {
            XrBlock::ReceiverReferenceTime(b) => buf.put_u64(b.ntp_timestamp),
            XrBlock::Dlrr(reports) => {
                for r in reports {
                    buf.put_u32(r.ssrc);
                    buf.put_u32(r.last_rr);
                    buf.put_u32(r.dlrr);
                }
            }
            XrBlock::StatisticsSummary(b) => {
                buf.put_u32(b.ssrc);
                buf.put_u16(b.begin_seq);
                buf.put_u16(b.end_seq);
                buf.put_u32(b.lost_packets);
                buf.put_u32(b.dup_packets);
                buf.put_u32(b.min_jitter);
                buf.put_u32(b.max_jitter);
                buf.put_u32(b.mean_jitter);
                buf.put_u32(b.dev_jitter);
                buf.put_u8(b.min_ttl_or_hl);
                buf.put_u8(b.max_ttl_or_hl);
                buf.put_u8(b.mean_ttl_or_hl);
                buf.put_u8(b.dev_ttl_or_hl);
            }
            XrBlock::Unknown { data, .. } => buf.put_slice(data),
        }
        Ok(())
    }

    fn unmarshal_from<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(Error::PacketTooShort);
        }
        let block_type = buf.get_u8();
        let _type_specific = buf.get_u8();
        let body_len = buf.get_u16() as usize * 4;
        if buf.remaining() < body_len {
            return Err(Error::InvalidBlockSize);
        }
        Ok(match block_type {
            BLOCK_TYPE_RRTR => {
                if body_len != 8 {
                    return Err(Error::InvalidBlockSize);
                }
                XrBlock::ReceiverReferenceTime(RrtrBlock {
                    ntp_timestamp: buf.get_u64(),
                })
            }
            BLOCK_TYPE_DLRR => {
                if body_len % 12 != 0 {
                    return Err(Error::InvalidBlockSize);
                }
                let mut reports = vec![];
                for _ in 0..body_len / 12 {
                    reports.push(DlrrReport {
                        ssrc: buf.get_u32(),
                        last_rr: buf.get_u32(),
                        dlrr: buf.get_u32(),
                    });
                }
                XrBlock::Dlrr(reports)
            }
            BLOCK_TYPE_STATISTICS_SUMMARY => {
                if body_len != 36 {
                    return Err(Error::InvalidBlockSize);
                }
                XrBlock::StatisticsSummary(StatisticsSummaryBlock {
                    ssrc: buf.get_u32(),
                    begin_seq: buf.get_u16(),
                    end_seq: buf.get_u16(),
                    lost_packets: buf.get_u32(),
                    dup_packets: buf.get_u32(),
                    min_jitter: buf.get_u32(),
                    max_jitter: buf.get_u32(),
                    mean_jitter: buf.get_u32(),
                    dev_jitter: buf.get_u32(),
                    min_ttl_or_hl: buf.get_u8(),
                    max_ttl_or_hl: buf.get_u8(),
                    mean_ttl_or_hl: buf.get_u8(),
                    dev_ttl_or_hl: buf.get_u8(),
                })
            }
            block_type => {
                let mut data = vec![0u8; body_len];
                buf.copy_to_slice(&mut data);
                XrBlock::Unknown { block_type, data }
            }
        })
    }
}

/// ExtendedReport (RFC 3611, PT 207).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtendedReport {
    pub sender_ssrc: u32,
    pub blocks: Vec<XrBlock>,
}

impl MarshalSize for ExtendedReport {
    fn marshal_size(&self) -> usize {
        HEADER_LENGTH + 4 + self.blocks.iter().map(|b| 4 + b.body_len()).sum::<usize>()
    }
}

impl Marshal for ExtendedReport {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        let size = self.marshal_size();
        if buf.len() < size {
            return Err(Error::ErrBufferTooSmall);
        }
        let header = Header {
            padding: false,
            count: 0,
            packet_type: PacketType::ExtendedReport,
            length: ((size - HEADER_LENGTH) / 4) as u16,
        };
        let n = header.marshal_to(buf)?;
        buf = &mut buf[n..];
        buf.put_u32(self.sender_ssrc);
        for block in &self.blocks {
            block.marshal_into(&mut buf)?;
        }
        Ok(size)
    }
}

impl Unmarshal for ExtendedReport {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let header = Header::unmarshal(raw_packet)?;
        if header.packet_type != PacketType::ExtendedReport {
            return Err(Error::WrongType);
        }
        if raw_packet.remaining() < 4 {
            return Err(Error::PacketTooShort);
        }
        let sender_ssrc = raw_packet.get_u32();
        let mut remaining = header.length as usize * 4 - 4;
        let mut blocks = vec![];
        while remaining >= 4 {
            let before = raw_packet.remaining();
            blocks.push(XrBlock::unmarshal_from(raw_packet)?);
            remaining -= before - raw_packet.remaining();
        }
        Ok(ExtendedReport {
            sender_ssrc,
            blocks,
        })
    }
}
