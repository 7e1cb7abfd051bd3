use bytes::Bytes;

use super::*;

#[test]
fn test_single_nalu_round_trip() {
    let mut payloader = H264Payloader;
    // One annex-b NAL: start code + IDR slice header byte + payload.
    let frame = Bytes::from_static(&[0x00, 0x00, 0x00, 0x01, 0x65, 0xAB, 0xCD]);
    let payloads = payloader.payload(1200, &frame).unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(&payloads[0][..], &[0x65, 0xAB, 0xCD]);

    let mut depacketizer = H264Packet::default();
    let out = depacketizer.depacketize(&payloads[0]).unwrap();
    assert_eq!(&out[..], &[0x00, 0x00, 0x00, 0x01, 0x65, 0xAB, 0xCD]);
}

#[test]
fn test_multiple_nalus_split() {
    let mut payloader = H264Payloader;
    let frame = Bytes::from_static(&[
        0x00, 0x00, 0x01, 0x67, 0x42, // SPS
        0x00, 0x00, 0x01, 0x68, 0xCE, // PPS
    ]);
    let payloads = payloader.payload(1200, &frame).unwrap();
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0][0] & NALU_TYPE_BITMASK, 7);
    assert_eq!(payloads[1][0] & NALU_TYPE_BITMASK, 8);
}

#[test]
fn test_fua_fragmentation_and_reassembly() {
    let mut payloader = H264Payloader;
    let mut nalu = vec![0x00, 0x00, 0x00, 0x01, 0x65];
    let body: Vec<u8> = (0..50u8).collect();
    nalu.extend_from_slice(&body);
    let frame = Bytes::from(nalu);

    // mtu 20 forces FU-A: fragments of 18 codec bytes each.
    let payloads = payloader.payload(20, &frame).unwrap();
    assert!(payloads.len() > 1);
    assert_eq!(payloads[0][0] & NALU_TYPE_BITMASK, FUA_NALU_TYPE);
    assert_ne!(payloads[0][1] & FU_START_BITMASK, 0);
    assert_ne!(payloads.last().unwrap()[1] & FU_END_BITMASK, 0);

    // Reassembly emits nothing until the end fragment, then one whole NAL.
    let mut depacketizer = H264Packet::default();
    let mut outputs = vec![];
    for p in &payloads {
        let out = depacketizer.depacketize(p).unwrap();
        if !out.is_empty() {
            outputs.push(out);
        }
    }
    assert_eq!(outputs.len(), 1, "exactly one reassembled NAL");
    let mut expected = vec![0x00, 0x00, 0x00, 0x01, 0x65];
    expected.extend_from_slice(&body);
    assert_eq!(&outputs[0][..], &expected[..]);
}

#[test]
fn test_stapa_unpacks_all_nalus() {
    // STAP-A with SPS (2 bytes) and PPS (2 bytes).
    let stapa = Bytes::from_static(&[
        STAPA_NALU_TYPE,
        0x00, 0x02, 0x67, 0x42,
        0x00, 0x02, 0x68, 0xCE,
    ]);
    let mut depacketizer = H264Packet::default();
    let out = depacketizer.depacketize(&stapa).unwrap();
    assert_eq!(
        &out[..],
        &[
            0x00, 0x00, 0x00, 0x01, 0x67, 0x42,
            0x00, 0x00, 0x00, 0x01, 0x68, 0xCE,
        ]
    );
}

#[test]
fn test_depacketize_rejects_unknown_and_short() {
    let mut depacketizer = H264Packet::default();
    assert!(depacketizer.depacketize(&Bytes::from_static(&[0x65])).is_err());
    assert_eq!(
        depacketizer.depacketize(&Bytes::from_static(&[30, 0x00, 0x00])),
        Err(shared::error::Error::NaluTypeIsNotHandled(30))
    );
}
