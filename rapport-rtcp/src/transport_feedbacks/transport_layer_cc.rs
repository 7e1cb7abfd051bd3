use bytes::{Buf, BufMut};
use shared::error::{Error, Result};
use shared::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::header::{Header, PacketType, FORMAT_TCC, HEADER_LENGTH};

/// Per-packet status symbol
/// (draft-holmer-rmcat-transport-wide-cc-extensions-01).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SymbolTypeTcc {
    #[default]
    PacketNotReceived = 0,
    /// Delta fits one unsigned byte of 250us ticks.
    PacketReceivedSmallDelta = 1,
    /// Delta needs two signed bytes of 250us ticks.
    PacketReceivedLargeDelta = 2,
    PacketReceivedWithoutDelta = 3,
}

impl From<u16> for SymbolTypeTcc {
    fn from(v: u16) -> Self {
        match v & 0x03 {
            1 => SymbolTypeTcc::PacketReceivedSmallDelta,
            2 => SymbolTypeTcc::PacketReceivedLargeDelta,
            3 => SymbolTypeTcc::PacketReceivedWithoutDelta,
            _ => SymbolTypeTcc::PacketNotReceived,
        }
    }
}

/// One packet status chunk, either run-length or status-vector encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketStatusChunk {
    /// 0 | S(2 bits) | run length(13 bits)
    RunLengthChunk {
        type_tcc: SymbolTypeTcc,
        run_length: u16,
    },
    /// 1 | S(1 bit) | 14 one-bit or 7 two-bit symbols
    StatusVectorChunk {
        /// false: one-bit symbols, true: two-bit symbols.
        two_bit: bool,
        symbol_list: Vec<SymbolTypeTcc>,
    },
}

impl PacketStatusChunk {
    pub fn symbols(&self) -> Vec<SymbolTypeTcc> {
        match self {
            PacketStatusChunk::RunLengthChunk {
                type_tcc,
                run_length,
            } => vec![*type_tcc; *run_length as usize],
            PacketStatusChunk::StatusVectorChunk { symbol_list, .. } => symbol_list.clone(),
        }
    }

    fn encode(&self) -> Result<u16> {
        match self {
            PacketStatusChunk::RunLengthChunk {
                type_tcc,
                run_length,
            } => {
                if *run_length > 0x1FFF {
                    return Err(Error::PacketStatusChunkLength);
                }
                Ok(((*type_tcc as u16) << 13) | *run_length)
            }
            PacketStatusChunk::StatusVectorChunk {
                two_bit,
                symbol_list,
            } => {
                let mut v: u16 = 1 << 15;
                if *two_bit {
                    if symbol_list.len() != 7 {
                        return Err(Error::PacketStatusChunkLength);
                    }
                    v |= 1 << 14;
                    for (i, s) in symbol_list.iter().enumerate() {
                        v |= (*s as u16) << (12 - 2 * i);
                    }
                } else {
                    if symbol_list.len() != 14 {
                        return Err(Error::PacketStatusChunkLength);
                    }
                    for (i, s) in symbol_list.iter().enumerate() {
                        let bit = match s {
                            SymbolTypeTcc::PacketNotReceived => 0u16,
                            _ => 1,
                        };
                        v |= bit << (13 - i);
                    }
                }
                Ok(v)
            }
        }
    }

    fn decode(v: u16) -> Self {
        if v & 0x8000 == 0 {
            PacketStatusChunk::RunLengthChunk {
                type_tcc: SymbolTypeTcc::from(v >> 13),
                run_length: v & 0x1FFF,
            }
        } else if v & 0x4000 != 0 {
            let symbol_list = (0..7)
                .map(|i| SymbolTypeTcc::from(v >> (12 - 2 * i)))
                .collect();
            PacketStatusChunk::StatusVectorChunk {
                two_bit: true,
                symbol_list,
            }
        } else {
            let symbol_list = (0..14)
                .map(|i| {
                    if v >> (13 - i) & 1 != 0 {
                        SymbolTypeTcc::PacketReceivedSmallDelta
                    } else {
                        SymbolTypeTcc::PacketNotReceived
                    }
                })
                .collect();
            PacketStatusChunk::StatusVectorChunk {
                two_bit: false,
                symbol_list,
            }
        }
    }
}

/// One receive delta in microseconds (multiples of 250).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecvDelta {
    pub type_tcc_packet: SymbolTypeTcc,
    pub delta_us: i64,
}

impl RecvDelta {
    fn byte_len(&self) -> usize {
        match self.type_tcc_packet {
            SymbolTypeTcc::PacketReceivedSmallDelta => 1,
            SymbolTypeTcc::PacketReceivedLargeDelta => 2,
            _ => 0,
        }
    }
}

/// TransportLayerCc: transport-wide congestion control feedback
/// (PT 205, FMT 15).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransportLayerCc {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    pub base_sequence_number: u16,
    pub packet_status_count: u16,
    /// 24-bit timestamp in 64ms units.
    pub reference_time: u32,
    pub fb_pkt_count: u8,
    pub packet_chunks: Vec<PacketStatusChunk>,
    pub recv_deltas: Vec<RecvDelta>,
}

impl TransportLayerCc {
    fn payload_len(&self) -> usize {
        let deltas: usize = self.recv_deltas.iter().map(|d| d.byte_len()).sum();
        8 + 8 + self.packet_chunks.len() * 2 + deltas
    }
}

impl MarshalSize for TransportLayerCc {
    fn marshal_size(&self) -> usize {
        let len = HEADER_LENGTH + self.payload_len();
        (len + 3) / 4 * 4
    }
}

impl Marshal for TransportLayerCc {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        let size = self.marshal_size();
        if buf.len() < size {
            return Err(Error::ErrBufferTooSmall);
        }
        let padding = size - HEADER_LENGTH - self.payload_len();
        let header = Header {
            padding: padding > 0,
            count: FORMAT_TCC,
            packet_type: PacketType::TransportSpecificFeedback,
            length: ((size - HEADER_LENGTH) / 4) as u16,
        };
        let n = header.marshal_to(buf)?;
        buf = &mut buf[n..];
        buf.put_u32(self.sender_ssrc);
        buf.put_u32(self.media_ssrc);
        buf.put_u16(self.base_sequence_number);
        buf.put_u16(self.packet_status_count);
        buf.put_uint(u64::from(self.reference_time), 3);
        buf.put_u8(self.fb_pkt_count);
        for chunk in &self.packet_chunks {
            buf.put_u16(chunk.encode()?);
        }
        for delta in &self.recv_deltas {
            let ticks = delta.delta_us / 250;
            match delta.type_tcc_packet {
                SymbolTypeTcc::PacketReceivedSmallDelta => {
                    if !(0..=255).contains(&ticks) {
                        return Err(Error::DeltaExceedLimit);
                    }
                    buf.put_u8(ticks as u8);
                }
                SymbolTypeTcc::PacketReceivedLargeDelta => {
                    if !(i64::from(i16::MIN)..=i64::from(i16::MAX)).contains(&ticks) {
                        return Err(Error::DeltaExceedLimit);
                    }
                    buf.put_i16(ticks as i16);
                }
                _ => {}
            }
        }
        for _ in 0..padding {
            buf.put_u8(0);
        }
        Ok(size)
    }
}

impl Unmarshal for TransportLayerCc {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let header = Header::unmarshal(raw_packet)?;
        if header.packet_type != PacketType::TransportSpecificFeedback
            || header.count != FORMAT_TCC
        {
            return Err(Error::WrongType);
        }
        let total = header.length as usize * 4;
        if raw_packet.remaining() < total || total < 16 {
            return Err(Error::PacketTooShort);
        }

        let sender_ssrc = raw_packet.get_u32();
        let media_ssrc = raw_packet.get_u32();
        let base_sequence_number = raw_packet.get_u16();
        let packet_status_count = raw_packet.get_u16();
        let reference_time = raw_packet.get_uint(3) as u32;
        let fb_pkt_count = raw_packet.get_u8();
        let mut consumed = 16;

        let mut packet_chunks = vec![];
        let mut statuses: Vec<SymbolTypeTcc> = vec![];
        while statuses.len() < packet_status_count as usize {
            if raw_packet.remaining() < 2 {
                return Err(Error::PacketTooShort);
            }
            let chunk = PacketStatusChunk::decode(raw_packet.get_u16());
            consumed += 2;
            statuses.extend(chunk.symbols());
            packet_chunks.push(chunk);
        }
        statuses.truncate(packet_status_count as usize);

        let mut recv_deltas = vec![];
        for status in &statuses {
            match status {
                SymbolTypeTcc::PacketReceivedSmallDelta => {
                    if raw_packet.remaining() < 1 {
                        return Err(Error::PacketTooShort);
                    }
                    recv_deltas.push(RecvDelta {
                        type_tcc_packet: *status,
                        delta_us: i64::from(raw_packet.get_u8()) * 250,
                    });
                    consumed += 1;
                }
                SymbolTypeTcc::PacketReceivedLargeDelta => {
                    if raw_packet.remaining() < 2 {
                        return Err(Error::PacketTooShort);
                    }
                    recv_deltas.push(RecvDelta {
                        type_tcc_packet: *status,
                        delta_us: i64::from(raw_packet.get_i16()) * 250,
                    });
                    consumed += 2;
                }
                _ => {}
            }
        }

        // Skip padding up to the declared length.
        while consumed < total {
            if raw_packet.remaining() < 1 {
                return Err(Error::PacketTooShort);
            }
            raw_packet.get_u8();
            consumed += 1;
        }

        Ok(TransportLayerCc {
            sender_ssrc,
            media_ssrc,
            base_sequence_number,
            packet_status_count,
            reference_time,
            fb_pkt_count,
            packet_chunks,
            recv_deltas,
        })
    }
}
