use shared::marshal::{Marshal, Unmarshal};

use super::message_channel_open::{ChannelType, DataChannelOpen};
use super::*;

#[test]
fn test_open_round_trip() {
    let open = Message::DataChannelOpen(DataChannelOpen {
        channel_type: ChannelType::PartialReliableRexmit,
        priority: 256,
        reliability_parameter: 5,
        label: b"chat".to_vec(),
        protocol: b"json".to_vec(),
    });
    let raw = open.marshal().unwrap();
    // type(1) + header(11-1) + label(4) + protocol(4)
    assert_eq!(raw.len(), 1 + 11 + 8);
    assert_eq!(raw[0], 0x03);

    let mut buf = &raw[..];
    let parsed = Message::unmarshal(&mut buf).unwrap();
    assert_eq!(parsed, open);
}

#[test]
fn test_ack_round_trip() {
    let ack = Message::DataChannelAck(message_channel_ack::DataChannelAck);
    let raw = ack.marshal().unwrap();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0], 0x02);

    let mut buf = &raw[..];
    assert_eq!(Message::unmarshal(&mut buf).unwrap(), ack);
}

#[test]
fn test_channel_type_ordering_flag() {
    assert!(ChannelType::Reliable.is_ordered());
    assert!(ChannelType::PartialReliableTimed.is_ordered());
    assert!(!ChannelType::ReliableUnordered.is_ordered());
    assert!(!ChannelType::PartialReliableRexmitUnordered.is_ordered());
}

#[test]
fn test_unknown_message_type_rejected() {
    let mut buf = &[0x07u8][..];
    assert_eq!(
        Message::unmarshal(&mut buf),
        Err(shared::error::Error::InvalidMessageType(0x07))
    );
}

#[test]
fn test_truncated_open_rejected() {
    let mut buf = &[0x03u8, 0x00, 0x00][..];
    assert!(Message::unmarshal(&mut buf).is_err());
}
