use shared::marshal::{Marshal, Unmarshal};

use super::*;
use crate::compound_packet::CompoundPacket;
use crate::extended_report::{DlrrReport, RrtrBlock, StatisticsSummaryBlock, XrBlock};
use crate::goodbye::Goodbye;
use crate::receiver_report::{ReceptionReport, ReceiverReport};
use crate::sender_report::SenderReport;
use crate::source_description::SourceDescription;
use crate::transport_feedbacks::transport_layer_cc::{
    PacketStatusChunk, RecvDelta, SymbolTypeTcc, TransportLayerCc,
};
use crate::transport_feedbacks::transport_layer_nack::{
    nack_pairs_from_sequence_numbers, NackPair, TransportLayerNack,
};

fn round_trip(packet: Packet) {
    let raw = packet.marshal().unwrap();
    assert_eq!(raw.len() % 4, 0, "padded to word boundary");
    let mut buf = &raw[..];
    let parsed = unmarshal(&mut buf).unwrap();
    assert_eq!(parsed, vec![packet]);
}

fn reception_report() -> ReceptionReport {
    ReceptionReport {
        ssrc: 0x9021_00E3,
        fraction_lost: 12,
        total_lost: 5000,
        last_sequence_number: 0x0004_6C0F,
        jitter: 273,
        last_sender_report: 0x4502_4A51,
        delay: 150137,
    }
}

#[test]
fn test_sender_report_round_trip() {
    round_trip(Packet::SenderReport(SenderReport {
        ssrc: 0x902F_9E2E,
        ntp_time: 0xDA8B_D1FC_DDDD_A05A,
        rtp_time: 0x00AA_F4ED,
        packet_count: 1831,
        octet_count: 261194,
        reports: vec![reception_report()],
    }));
}

#[test]
fn test_receiver_report_round_trip() {
    round_trip(Packet::ReceiverReport(ReceiverReport {
        ssrc: 0x902F_9E2E,
        reports: vec![reception_report(), ReceptionReport::default()],
    }));
}

#[test]
fn test_source_description_round_trip() {
    round_trip(Packet::SourceDescription(SourceDescription::cname(
        0x902F_9E2E,
        "endpoint@rapport",
    )));
}

#[test]
fn test_goodbye_round_trip() {
    round_trip(Packet::Goodbye(Goodbye {
        sources: vec![0x902F_9E2E, 0x1234],
        reason: "shutting down".to_owned(),
    }));
}

#[test]
fn test_pli_round_trip() {
    round_trip(Packet::PictureLossIndication(
        payload_feedbacks::picture_loss_indication::PictureLossIndication {
            sender_ssrc: 1,
            media_ssrc: 2,
        },
    ));
}

#[test]
fn test_remb_round_trip() {
    let packet =
        payload_feedbacks::receiver_estimated_maximum_bitrate::ReceiverEstimatedMaximumBitrate {
            sender_ssrc: 1,
            bitrate: 8927168,
            ssrcs: vec![0x1234_5678],
        };
    // Bitrate survives the mantissa/exponent encoding exactly when it fits.
    let raw = Marshal::marshal(&packet).unwrap();
    let mut buf = &raw[..];
    let parsed =
        payload_feedbacks::receiver_estimated_maximum_bitrate::ReceiverEstimatedMaximumBitrate::unmarshal(
            &mut buf,
        )
        .unwrap();
    assert_eq!(parsed.bitrate, 8927168);
    round_trip(Packet::ReceiverEstimatedMaximumBitrate(parsed));
}

#[test]
fn test_nack_round_trip_and_packet_list() {
    let nack = TransportLayerNack {
        sender_ssrc: 1,
        media_ssrc: 2,
        nacks: vec![NackPair {
            packet_id: 100,
            lost_packets: 0b0000_0000_0000_0101,
        }],
    };
    assert_eq!(nack.nacks[0].packet_list(), vec![100, 101, 103]);
    round_trip(Packet::TransportLayerNack(nack));
}

#[test]
fn test_nack_pair_packing() {
    let pairs = nack_pairs_from_sequence_numbers(&[1, 2, 3, 20, 37]);
    assert_eq!(pairs.len(), 3);
    assert_eq!(pairs[0].packet_id, 1);
    assert_eq!(pairs[0].lost_packets, 0b11);
    assert_eq!(pairs[1].packet_id, 20);
    // 37 is 17 ahead of 20, outside the 16-bit BLP range, so it opens its
    // own pair.
    assert_eq!(pairs[2].packet_id, 37);

    // 16 ahead still fits in the bitmask.
    let pairs = nack_pairs_from_sequence_numbers(&[20, 36]);
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].lost_packets, 1 << 15);
}

#[test]
fn test_twcc_round_trip() {
    let twcc = TransportLayerCc {
        sender_ssrc: 1,
        media_ssrc: 2,
        base_sequence_number: 500,
        packet_status_count: 4,
        reference_time: 0x123456,
        fb_pkt_count: 3,
        packet_chunks: vec![PacketStatusChunk::RunLengthChunk {
            type_tcc: SymbolTypeTcc::PacketReceivedSmallDelta,
            run_length: 4,
        }],
        recv_deltas: vec![
            RecvDelta {
                type_tcc_packet: SymbolTypeTcc::PacketReceivedSmallDelta,
                delta_us: 1000,
            };
            4
        ],
    };
    round_trip(Packet::TransportLayerCc(twcc));
}

#[test]
fn test_twcc_status_vector_round_trip() {
    let twcc = TransportLayerCc {
        sender_ssrc: 1,
        media_ssrc: 2,
        base_sequence_number: 1000,
        packet_status_count: 7,
        reference_time: 1,
        fb_pkt_count: 0,
        packet_chunks: vec![PacketStatusChunk::StatusVectorChunk {
            two_bit: true,
            symbol_list: vec![
                SymbolTypeTcc::PacketReceivedSmallDelta,
                SymbolTypeTcc::PacketNotReceived,
                SymbolTypeTcc::PacketReceivedLargeDelta,
                SymbolTypeTcc::PacketNotReceived,
                SymbolTypeTcc::PacketReceivedSmallDelta,
                SymbolTypeTcc::PacketNotReceived,
                SymbolTypeTcc::PacketNotReceived,
            ],
        }],
        recv_deltas: vec![
            RecvDelta {
                type_tcc_packet: SymbolTypeTcc::PacketReceivedSmallDelta,
                delta_us: 250,
            },
            RecvDelta {
                type_tcc_packet: SymbolTypeTcc::PacketReceivedLargeDelta,
                delta_us: -1000,
            },
            RecvDelta {
                type_tcc_packet: SymbolTypeTcc::PacketReceivedSmallDelta,
                delta_us: 500,
            },
        ],
    };
    round_trip(Packet::TransportLayerCc(twcc));
}

#[test]
fn test_xr_round_trip() {
    round_trip(Packet::ExtendedReport(extended_report::ExtendedReport {
        sender_ssrc: 0x0102_0304,
        blocks: vec![
            XrBlock::ReceiverReferenceTime(RrtrBlock {
                ntp_timestamp: 0x0102_0304_0506_0708,
            }),
            XrBlock::Dlrr(vec![DlrrReport {
                ssrc: 1,
                last_rr: 2,
                dlrr: 3,
            }]),
            XrBlock::StatisticsSummary(StatisticsSummaryBlock {
                ssrc: 9,
                begin_seq: 1,
                end_seq: 100,
                lost_packets: 4,
                dup_packets: 0,
                min_jitter: 1,
                max_jitter: 10,
                mean_jitter: 4,
                dev_jitter: 2,
                min_ttl_or_hl: 60,
                max_ttl_or_hl: 64,
                mean_ttl_or_hl: 62,
                dev_ttl_or_hl: 1,
            }),
        ],
    }));
}

#[test]
fn test_compound_first_packet_must_be_report() {
    let bad = CompoundPacket(vec![Packet::Goodbye(Goodbye::default())]);
    assert_eq!(bad.validate(), Err(shared::error::Error::BadFirstPacket));

    let good = CompoundPacket(vec![
        Packet::ReceiverReport(ReceiverReport::default()),
        Packet::SourceDescription(SourceDescription::cname(1, "x")),
    ]);
    good.validate().unwrap();

    // A serialized compound parses back into the same packet list.
    let raw = good.marshal().unwrap();
    let mut buf = &raw[..];
    let parsed = unmarshal(&mut buf).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0], good.0[0]);
    assert_eq!(parsed[1], good.0[1]);
}

#[test]
fn test_compound_parse_of_sr_and_nack() {
    let packets = vec![
        Packet::SenderReport(SenderReport {
            ssrc: 7,
            ..Default::default()
        }),
        Packet::TransportLayerNack(TransportLayerNack {
            sender_ssrc: 7,
            media_ssrc: 8,
            nacks: vec![NackPair {
                packet_id: 5,
                lost_packets: 0,
            }],
        }),
    ];
    let raw = marshal(&packets).unwrap();
    let mut buf = &raw[..];
    assert_eq!(unmarshal(&mut buf).unwrap(), packets);
}

#[test]
fn test_unmarshal_rejects_garbage() {
    let mut buf = &[0u8, 1, 2][..];
    assert!(unmarshal(&mut buf).is_err());
    let mut empty = &[][..];
    assert!(unmarshal(&mut empty).is_err());
}
