use bytes::Bytes;

use super::*;
use crate::chunk::chunk_payload_data::{ChunkPayloadData, PayloadProtocolIdentifier};

fn data_chunk() -> Chunk {
    Chunk::PayloadData(ChunkPayloadData {
        beginning_fragment: true,
        ending_fragment: true,
        tsn: 1,
        stream_identifier: 0,
        stream_sequence_number: 0,
        payload_type: PayloadProtocolIdentifier::Binary,
        user_data: Bytes::from_static(&[0xAA, 0xBB]),
        ..Default::default()
    })
}

#[test]
fn test_packet_round_trip_with_checksum() {
    let packet = Packet {
        source_port: 5000,
        destination_port: 5000,
        verification_tag: 0x0102_0304,
        chunks: vec![data_chunk()],
    };
    let raw = packet.marshal();
    let parsed = Packet::unmarshal(&raw).unwrap();
    assert_eq!(parsed, packet);
}

#[test]
fn test_corrupted_checksum_rejected() {
    let packet = Packet {
        source_port: 5000,
        destination_port: 5000,
        verification_tag: 1,
        chunks: vec![data_chunk()],
    };
    let mut raw = packet.marshal();
    let last = raw.len() - 1;
    raw[last] ^= 0xFF;
    assert_eq!(
        Packet::unmarshal(&raw),
        Err(shared::error::Error::ErrChecksumMismatch)
    );
}

#[test]
fn test_zero_ports_rejected() {
    let packet = Packet {
        source_port: 0,
        destination_port: 5000,
        verification_tag: 1,
        chunks: vec![],
    };
    let raw = packet.marshal();
    assert!(Packet::unmarshal(&raw).is_err());
}

#[test]
fn test_short_packet_rejected() {
    assert!(Packet::unmarshal(&[0u8; 5]).is_err());
}
