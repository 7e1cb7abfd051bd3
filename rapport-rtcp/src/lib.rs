#![warn(rust_2018_idioms)]

#[cfg(test)]
mod rtcp_test;

pub mod compound_packet;
pub mod extended_report;
pub mod feedback;
pub mod goodbye;
pub mod header;
pub mod payload_feedbacks;
pub mod receiver_report;
pub mod sender_report;
pub mod source_description;
pub mod transport_feedbacks;

use bytes::Buf;
use shared::error::{Error, Result};
use shared::marshal::{Marshal, MarshalSize, Unmarshal};

use extended_report::ExtendedReport;
use goodbye::Goodbye;
use header::{
    Header, PacketType, FORMAT_PLI, FORMAT_REMB, FORMAT_TCC, FORMAT_TLN, HEADER_LENGTH,
};
use payload_feedbacks::picture_loss_indication::PictureLossIndication;
use payload_feedbacks::receiver_estimated_maximum_bitrate::ReceiverEstimatedMaximumBitrate;
use receiver_report::ReceiverReport;
use sender_report::SenderReport;
use source_description::SourceDescription;
use transport_feedbacks::transport_layer_cc::TransportLayerCc;
use transport_feedbacks::transport_layer_nack::TransportLayerNack;

/// The RTCP packet union. Feedback formats are distinguished by the
/// (packet type, count/format) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    SenderReport(SenderReport),
    ReceiverReport(ReceiverReport),
    SourceDescription(SourceDescription),
    Goodbye(Goodbye),
    TransportLayerNack(TransportLayerNack),
    TransportLayerCc(TransportLayerCc),
    PictureLossIndication(PictureLossIndication),
    ReceiverEstimatedMaximumBitrate(ReceiverEstimatedMaximumBitrate),
    ExtendedReport(ExtendedReport),
    /// Unrecognized but well-formed packet, kept as raw bytes.
    Raw(Vec<u8>),
}

impl MarshalSize for Packet {
    fn marshal_size(&self) -> usize {
        match self {
            Packet::SenderReport(p) => p.marshal_size(),
            Packet::ReceiverReport(p) => p.marshal_size(),
            Packet::SourceDescription(p) => p.marshal_size(),
            Packet::Goodbye(p) => p.marshal_size(),
            Packet::TransportLayerNack(p) => p.marshal_size(),
            Packet::TransportLayerCc(p) => p.marshal_size(),
            Packet::PictureLossIndication(p) => p.marshal_size(),
            Packet::ReceiverEstimatedMaximumBitrate(p) => p.marshal_size(),
            Packet::ExtendedReport(p) => p.marshal_size(),
            Packet::Raw(raw) => raw.len(),
        }
    }
}

impl Marshal for Packet {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Packet::SenderReport(p) => p.marshal_to(buf),
            Packet::ReceiverReport(p) => p.marshal_to(buf),
            Packet::SourceDescription(p) => p.marshal_to(buf),
            Packet::Goodbye(p) => p.marshal_to(buf),
            Packet::TransportLayerNack(p) => p.marshal_to(buf),
            Packet::TransportLayerCc(p) => p.marshal_to(buf),
            Packet::PictureLossIndication(p) => p.marshal_to(buf),
            Packet::ReceiverEstimatedMaximumBitrate(p) => p.marshal_to(buf),
            Packet::ExtendedReport(p) => p.marshal_to(buf),
            Packet::Raw(raw) => {
                if buf.len() < raw.len() {
                    return Err(Error::ErrBufferTooSmall);
                }
                buf[..raw.len()].copy_from_slice(raw);
                Ok(raw.len())
            }
        }
    }
}

/// Parses one RTCP packet from its raw bytes (header included).
fn unmarshal_one(raw: &[u8], header: &Header) -> Result<Packet> {
    let mut buf = raw;
    Ok(match header.packet_type {
        PacketType::SenderReport => Packet::SenderReport(SenderReport::unmarshal(&mut buf)?),
        PacketType::ReceiverReport => Packet::ReceiverReport(ReceiverReport::unmarshal(&mut buf)?),
        PacketType::SourceDescription => {
            Packet::SourceDescription(SourceDescription::unmarshal(&mut buf)?)
        }
        PacketType::Goodbye => Packet::Goodbye(Goodbye::unmarshal(&mut buf)?),
        PacketType::TransportSpecificFeedback => match header.count {
            FORMAT_TLN => Packet::TransportLayerNack(TransportLayerNack::unmarshal(&mut buf)?),
            FORMAT_TCC => Packet::TransportLayerCc(TransportLayerCc::unmarshal(&mut buf)?),
            _ => Packet::Raw(raw.to_vec()),
        },
        PacketType::PayloadSpecificFeedback => match header.count {
            FORMAT_PLI => {
                Packet::PictureLossIndication(PictureLossIndication::unmarshal(&mut buf)?)
            }
            FORMAT_REMB => Packet::ReceiverEstimatedMaximumBitrate(
                ReceiverEstimatedMaximumBitrate::unmarshal(&mut buf)?,
            ),
            _ => Packet::Raw(raw.to_vec()),
        },
        PacketType::ExtendedReport => Packet::ExtendedReport(ExtendedReport::unmarshal(&mut buf)?),
        _ => Packet::Raw(raw.to_vec()),
    })
}

/// Parses a (possibly compound) RTCP datagram into its packets.
pub fn unmarshal<B: Buf>(raw_data: &mut B) -> Result<Vec<Packet>> {
    let mut packets = vec![];
    let mut raw = vec![0u8; raw_data.remaining()];
    raw_data.copy_to_slice(&mut raw);

    let mut offset = 0;
    while offset < raw.len() {
        let mut cursor = &raw[offset..];
        let header = Header::unmarshal(&mut cursor)?;
        let total = HEADER_LENGTH + header.length as usize * 4;
        if offset + total > raw.len() {
            return Err(Error::PacketTooShort);
        }
        packets.push(unmarshal_one(&raw[offset..offset + total], &header)?);
        offset += total;
    }
    if packets.is_empty() {
        return Err(Error::InvalidHeader);
    }
    Ok(packets)
}

/// Serializes a list of packets back to back.
pub fn marshal(packets: &[Packet]) -> Result<Vec<u8>> {
    let mut out = vec![];
    for p in packets {
        out.extend_from_slice(&p.marshal()?);
    }
    Ok(out)
}
