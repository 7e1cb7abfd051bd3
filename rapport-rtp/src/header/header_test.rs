use bytes::Bytes;
use shared::marshal::{Marshal, Unmarshal};

use super::*;
use crate::packet::Packet;

#[test]
fn test_basic_header_round_trip() {
    let header = Header {
        version: 2,
        marker: true,
        payload_type: 96,
        sequence_number: 27023,
        timestamp: 3653407706,
        ssrc: 476325762,
        csrc: vec![17, 21],
        ..Default::default()
    };
    let raw = header.marshal().unwrap();
    assert_eq!(raw.len(), 12 + 8);

    let mut buf = &raw[..];
    let parsed = Header::unmarshal(&mut buf).unwrap();
    assert_eq!(parsed, header);
}

#[test]
fn test_packet_round_trip_byte_exact() {
    let packet = Packet {
        header: Header {
            version: 2,
            payload_type: 111,
            sequence_number: 100,
            timestamp: 480,
            ssrc: 0xDEADBEEF,
            ..Default::default()
        },
        payload: Bytes::from_static(&[0x98, 0x36, 0xbe, 0x88, 0x9e]),
    };
    let raw = packet.marshal().unwrap();

    let mut buf = &raw[..];
    let parsed = Packet::unmarshal(&mut buf).unwrap();
    assert_eq!(parsed, packet);

    // Canonical encoding: marshal of the parse equals the original bytes.
    assert_eq!(parsed.marshal().unwrap(), raw);
}

#[test]
fn test_one_byte_extension_round_trip() {
    let mut header = Header {
        version: 2,
        payload_type: 96,
        sequence_number: 1,
        ssrc: 7,
        ..Default::default()
    };
    header.set_extension(5, vec![0xAA, 0xBB]).unwrap();
    header.set_extension(3, vec![0x01]).unwrap();
    assert_eq!(header.extension_profile, EXTENSION_PROFILE_ONE_BYTE);

    let raw = header.marshal().unwrap();
    let mut buf = &raw[..];
    let parsed = Header::unmarshal(&mut buf).unwrap();
    assert_eq!(parsed.get_extension(5), Some(&[0xAA, 0xBB][..]));
    assert_eq!(parsed.get_extension(3), Some(&[0x01][..]));
}

#[test]
fn test_one_byte_extension_limits() {
    let mut header = Header::default();
    header.set_extension(1, vec![0u8; 2]).unwrap();
    assert!(header.set_extension(15, vec![0]).is_err());
    assert!(header.set_extension(2, vec![0u8; 17]).is_err());
}

#[test]
fn test_two_byte_extension_round_trip() {
    let mut header = Header {
        version: 2,
        extension: true,
        extension_profile: EXTENSION_PROFILE_TWO_BYTE,
        ..Default::default()
    };
    header.set_extension(200, vec![0u8; 30]).unwrap();

    let raw = header.marshal().unwrap();
    let mut buf = &raw[..];
    let parsed = Header::unmarshal(&mut buf).unwrap();
    assert_eq!(parsed.get_extension(200).map(|p| p.len()), Some(30));
}

#[test]
fn test_padding_is_stripped() {
    // Version 2, padding set, PT 96, seq 1, ts 0, ssrc 2, payload [1,2] + 2
    // padding bytes, final byte = padding count.
    let raw: Vec<u8> = vec![
        0xA0, 0x60, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01, 0x02, 0x00,
        0x02,
    ];
    let mut buf = &raw[..];
    let parsed = Packet::unmarshal(&mut buf).unwrap();
    assert!(parsed.header.padding);
    assert_eq!(&parsed.payload[..], &[0x01, 0x02]);
}

#[test]
fn test_truncated_header_rejected() {
    let raw = [0x80u8, 0x60, 0x00];
    let mut buf = &raw[..];
    assert!(Header::unmarshal(&mut buf).is_err());
}

#[test]
fn test_del_extension() {
    let mut header = Header::default();
    header.set_extension(1, vec![0xFF]).unwrap();
    header.del_extension(1).unwrap();
    assert!(header.get_extension(1).is_none());
    assert!(header.del_extension(1).is_err());
}
