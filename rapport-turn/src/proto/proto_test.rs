use std::time::Duration;

use super::chandata::ChannelData;
use super::*;
use stun::attributes::{Getter, Setter};
use stun::message::{Message, TransactionId, BINDING_REQUEST};

#[test]
fn test_channel_number_validity() {
    assert!(!ChannelNumber(0x3FFF).is_valid());
    assert!(ChannelNumber(0x4000).is_valid());
    assert!(ChannelNumber(0x7FFF).is_valid());
    assert!(!ChannelNumber(0x8000).is_valid());

    let mut m = Message::new();
    m.build(&[Box::new(BINDING_REQUEST), Box::new(TransactionId::new())])
        .unwrap();
    assert!(ChannelNumber(0x1234).add_to(&mut m).is_err());
    ChannelNumber(0x4001).add_to(&mut m).unwrap();

    let mut got = ChannelNumber::default();
    got.get_from(&m).unwrap();
    assert_eq!(got.0, 0x4001);
}

#[test]
fn test_lifetime_round_trip() {
    let mut m = Message::new();
    m.build(&[Box::new(BINDING_REQUEST), Box::new(TransactionId::new())])
        .unwrap();
    Lifetime(Duration::from_secs(600)).add_to(&mut m).unwrap();

    let mut got = Lifetime::default();
    got.get_from(&m).unwrap();
    assert_eq!(got.0, Duration::from_secs(600));
}

#[test]
fn test_requested_transport_udp() {
    let mut m = Message::new();
    m.build(&[Box::new(BINDING_REQUEST), Box::new(TransactionId::new())])
        .unwrap();
    RequestedTransport::default().add_to(&mut m).unwrap();

    let mut got = RequestedTransport { protocol: 0 };
    got.get_from(&m).unwrap();
    assert_eq!(got.protocol, PROTO_UDP);
}

#[test]
fn test_channel_data_round_trip() {
    let cd = ChannelData {
        number: 0x4000,
        data: vec![1, 2, 3, 4, 5],
    };
    let raw = cd.encode();
    // Padded to 4-byte boundary: header(4) + 5 data + 3 padding.
    assert_eq!(raw.len(), 12);
    assert!(ChannelData::is_channel_data(&raw));

    let decoded = ChannelData::decode(&raw).unwrap();
    assert_eq!(decoded, cd);
}

#[test]
fn test_channel_data_rejects_bad_number() {
    let mut raw = ChannelData {
        number: 0x4000,
        data: vec![0; 4],
    }
    .encode();
    raw[0] = 0x10; // out of the channel range
    assert!(ChannelData::decode(&raw).is_err());
    assert!(!ChannelData::is_channel_data(&raw));
}
