use bytes::Bytes;

use super::*;

#[test]
fn test_vp8_payload_fragments_with_s_bit() {
    let mut payloader = Vp8Payloader::default();
    let frame = Bytes::from(vec![0xAAu8; 25]);
    let payloads = payloader.payload(11, &frame).unwrap();

    // 10 bytes of fragment per packet (1 descriptor byte).
    assert_eq!(payloads.len(), 3);
    assert_eq!(payloads[0][0] & 0x10, 0x10, "first fragment carries S");
    assert_eq!(payloads[1][0] & 0x10, 0, "later fragments do not");
    assert_eq!(payloads[2][0] & 0x10, 0);

    let total: usize = payloads.iter().map(|p| p.len() - 1).sum();
    assert_eq!(total, 25);
}

#[test]
fn test_vp8_round_trip_with_picture_id() {
    let mut payloader = Vp8Payloader {
        enable_picture_id: true,
        ..Default::default()
    };
    let frame = Bytes::from(vec![0x9D, 0x01, 0x2A, 0x10, 0x00]);
    let payloads = payloader.payload(1200, &frame).unwrap();
    assert_eq!(payloads.len(), 1);

    let mut depacketizer = Vp8Packet::default();
    let out = depacketizer.depacketize(&payloads[0]).unwrap();
    assert_eq!(out, frame);
    assert_eq!(depacketizer.s, 1);
    assert!(depacketizer.is_partition_head(&payloads[0]));
}

#[test]
fn test_vp8_depacketize_rejects_short() {
    let mut depacketizer = Vp8Packet::default();
    assert!(depacketizer.depacketize(&Bytes::from_static(&[0x00])).is_err());
    // Descriptor consuming the whole payload is an error.
    assert!(depacketizer
        .depacketize(&Bytes::from_static(&[0x80, 0x80, 0x81, 0x01]))
        .is_err());
}
