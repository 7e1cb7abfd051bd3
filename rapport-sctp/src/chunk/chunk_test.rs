use bytes::{Bytes, BytesMut};

use super::chunk_forward_tsn::{ChunkForwardTsn, ChunkForwardTsnStream};
use super::chunk_init::ChunkInit;
use super::chunk_misc::{ChunkHeartbeat, ChunkShutdown};
use super::chunk_payload_data::{ChunkPayloadData, PayloadProtocolIdentifier};
use super::chunk_reconfig::ChunkReconfig;
use super::chunk_selective_ack::{ChunkSelectiveAck, GapAckBlock};
use super::*;
use crate::param::Param;

fn round_trip(chunk: Chunk) {
    let mut out = BytesMut::new();
    chunk.marshal_to(&mut out);
    assert_eq!(out.len() % 4, 0, "chunks are padded to a word boundary");
    let mut buf = &out[..];
    let parsed = Chunk::unmarshal(&mut buf).unwrap();
    assert_eq!(parsed, chunk);
}

#[test]
fn test_init_round_trip() {
    round_trip(Chunk::Init(ChunkInit {
        initiate_tag: 0xDEADBEEF,
        advertised_receiver_window_credit: 1024 * 1024,
        num_outbound_streams: 1024,
        num_inbound_streams: 2048,
        initial_tsn: 12345,
        params: vec![Param::ForwardTsnSupported],
    }));
}

#[test]
fn test_init_ack_carries_cookie() {
    let init_ack = ChunkInit {
        initiate_tag: 1,
        advertised_receiver_window_credit: 128 * 1024,
        num_outbound_streams: 1,
        num_inbound_streams: 1,
        initial_tsn: 7,
        params: vec![Param::StateCookie(vec![1, 2, 3, 4, 5])],
    };
    assert_eq!(init_ack.state_cookie(), Some(&[1u8, 2, 3, 4, 5][..]));
    round_trip(Chunk::InitAck(init_ack));
}

#[test]
fn test_payload_data_round_trip() {
    round_trip(Chunk::PayloadData(ChunkPayloadData {
        unordered: false,
        beginning_fragment: true,
        ending_fragment: false,
        immediate_sack: false,
        tsn: 42,
        stream_identifier: 3,
        stream_sequence_number: 9,
        payload_type: PayloadProtocolIdentifier::Binary,
        user_data: Bytes::from_static(&[1, 2, 3, 4, 5, 6, 7]),
    }));
}

#[test]
fn test_sack_round_trip() {
    round_trip(Chunk::SelectiveAck(ChunkSelectiveAck {
        cumulative_tsn_ack: 1000,
        advertised_receiver_window_credit: 65536,
        gap_ack_blocks: vec![
            GapAckBlock { start: 2, end: 4 },
            GapAckBlock { start: 7, end: 7 },
        ],
        duplicate_tsns: vec![999, 998],
    }));
}

#[test]
fn test_forward_tsn_round_trip() {
    round_trip(Chunk::ForwardTsn(ChunkForwardTsn {
        new_cumulative_tsn: 55,
        streams: vec![ChunkForwardTsnStream {
            identifier: 1,
            sequence: 4,
        }],
    }));
}

#[test]
fn test_reconfig_round_trip() {
    round_trip(Chunk::Reconfig(ChunkReconfig {
        param_a: Some(Param::OutgoingSsnResetRequest {
            reconfig_request_sequence_number: 10,
            reconfig_response_sequence_number: 0,
            sender_last_tsn: 99,
            stream_identifiers: vec![1, 2],
        }),
        param_b: None,
    }));
}

#[test]
fn test_misc_chunks_round_trip() {
    round_trip(Chunk::Heartbeat(ChunkHeartbeat {
        info: vec![9; 8],
    }));
    round_trip(Chunk::Shutdown(ChunkShutdown {
        cumulative_tsn_ack: 77,
    }));
    round_trip(Chunk::ShutdownAck(
        super::chunk_misc::ChunkShutdownAck,
    ));
    round_trip(Chunk::CookieAck(super::chunk_misc::ChunkCookieAck));
}

#[test]
fn test_unknown_chunk_type_rejected() {
    let raw = [99u8, 0, 0, 4];
    let mut buf = &raw[..];
    assert!(Chunk::unmarshal(&mut buf).is_err());
}
