use std::net::{IpAddr, Ipv4Addr};

use super::*;
use crate::attributes::{ATTR_SOFTWARE, ATTR_USERNAME};
use crate::fingerprint::FINGERPRINT;
use crate::integrity::MessageIntegrity;
use crate::textattrs::{Software, Username};
use crate::xoraddr::XorMappedAddress;

#[test]
fn test_message_type_value_round_trip() {
    let types = [
        MessageType::new(Method::Binding, MessageClass::Request),
        MessageType::new(Method::Binding, MessageClass::SuccessResponse),
        MessageType::new(Method::Binding, MessageClass::ErrorResponse),
        MessageType::new(Method::Allocate, MessageClass::Request),
        MessageType::new(Method::Refresh, MessageClass::Request),
        MessageType::new(Method::CreatePermission, MessageClass::Request),
        MessageType::new(Method::ChannelBind, MessageClass::Request),
        MessageType::new(Method::Send, MessageClass::Indication),
        MessageType::new(Method::Data, MessageClass::Indication),
    ];
    for t in types {
        assert_eq!(MessageType::from_value(t.value()), t, "{t}");
    }
}

#[test]
fn test_message_type_known_values() {
    // RFC 5389: Binding request = 0x0001, response = 0x0101, error = 0x0111.
    assert_eq!(BINDING_REQUEST.value(), 0x0001);
    assert_eq!(BINDING_SUCCESS.value(), 0x0101);
    assert_eq!(BINDING_ERROR.value(), 0x0111);
    // RFC 5766: Allocate request = 0x0003, Send indication = 0x0016.
    assert_eq!(
        MessageType::new(Method::Allocate, MessageClass::Request).value(),
        0x0003
    );
    assert_eq!(
        MessageType::new(Method::Send, MessageClass::Indication).value(),
        0x0016
    );
}

#[test]
fn test_message_encode_decode() {
    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(Software::new("rapport test".to_owned())),
    ])
    .unwrap();

    let raw = m.marshal_binary().unwrap();
    let mut decoded = Message::new();
    decoded.unmarshal_binary(&raw).unwrap();

    assert_eq!(decoded, m);
    assert_eq!(decoded.get(ATTR_SOFTWARE).unwrap(), b"rapport test");
    assert!(crate::is_message(&raw));
}

#[test]
fn test_xor_mapped_address_round_trip() {
    let mut m = Message::new();
    m.build(&[Box::new(BINDING_SUCCESS), Box::new(TransactionId::new())])
        .unwrap();

    let addr = XorMappedAddress {
        ip: IpAddr::V4(Ipv4Addr::new(203, 0, 113, 50)),
        port: 54321,
    };
    addr.add_to(&mut m).unwrap();

    let raw = m.marshal_binary().unwrap();
    let mut decoded = Message::new();
    decoded.unmarshal_binary(&raw).unwrap();

    let mut got = XorMappedAddress::default();
    got.get_from(&decoded).unwrap();
    assert_eq!(got.ip, addr.ip);
    assert_eq!(got.port, addr.port);

    // The wire form must not contain the plain port.
    let attr = decoded.attributes.get(crate::attributes::ATTR_XORMAPPED_ADDRESS).unwrap();
    assert_ne!(
        u16::from_be_bytes([attr.value[2], attr.value[3]]),
        addr.port
    );
}

#[test]
fn test_message_integrity_check() {
    let i = MessageIntegrity::new_short_term_integrity("pwd".to_owned());

    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(Username::new("user".to_owned())),
    ])
    .unwrap();
    i.add_to(&mut m).unwrap();

    let raw = m.marshal_binary().unwrap();
    let mut decoded = Message::new();
    decoded.unmarshal_binary(&raw).unwrap();
    i.check(&mut decoded).unwrap();

    // Flipping a covered byte must break the check.
    let mut tampered_raw = raw.clone();
    let username_off = decoded.attr_offset(ATTR_USERNAME).unwrap();
    tampered_raw[username_off + 4] ^= 0xff;
    let mut tampered = Message::new();
    tampered.unmarshal_binary(&tampered_raw).unwrap();
    assert!(i.check(&mut tampered).is_err());

    // Wrong key must fail too.
    let wrong = MessageIntegrity::new_short_term_integrity("other".to_owned());
    let mut decoded2 = Message::new();
    decoded2.unmarshal_binary(&raw).unwrap();
    assert!(wrong.check(&mut decoded2).is_err());
}

#[test]
fn test_long_term_integrity_key() {
    // Key = MD5(username ":" realm ":" password), RFC 5389 Section 15.4.
    let i = MessageIntegrity::new_long_term_integrity("user", "realm", "pass");
    assert_eq!(i.0.len(), 16);
}

#[test]
fn test_fingerprint_is_last_and_checks() {
    let mut m = Message::new();
    m.build(&[Box::new(BINDING_REQUEST), Box::new(TransactionId::new())])
        .unwrap();

    let i = MessageIntegrity::new_short_term_integrity("pwd".to_owned());
    i.add_to(&mut m).unwrap();
    FINGERPRINT.add_to(&mut m).unwrap();

    // Integrity may not be added after fingerprint.
    assert!(i.add_to(&mut m).is_err());

    let raw = m.marshal_binary().unwrap();
    let mut decoded = Message::new();
    decoded.unmarshal_binary(&raw).unwrap();
    FINGERPRINT.check(&decoded).unwrap();
    i.check(&mut decoded).unwrap();

    let mut tampered_raw = raw;
    tampered_raw[1] ^= 0x01;
    let mut tampered = Message::new();
    tampered.unmarshal_binary(&tampered_raw).unwrap();
    assert!(FINGERPRINT.check(&tampered).is_err());
}

#[test]
fn test_decode_rejects_bad_cookie() {
    let mut m = Message::new();
    m.build(&[Box::new(BINDING_REQUEST), Box::new(TransactionId::new())])
        .unwrap();
    let mut raw = m.marshal_binary().unwrap();
    raw[4] = 0;

    let mut decoded = Message::new();
    assert_eq!(
        decoded.unmarshal_binary(&raw),
        Err(shared::error::Error::ErrInvalidMagicCookie)
    );
}
