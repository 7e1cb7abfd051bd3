use std::net::SocketAddr;
use std::time::Instant;

use super::*;
use crate::proto::chandata::ChannelData;
use crate::proto::{Lifetime, MIN_CHANNEL_NUMBER};
use crate::DEFAULT_LIFETIME;
use shared::error::Error;
use stun::attributes::{Setter, ATTR_DATA, ATTR_XOR_RELAYED_ADDRESS};
use stun::message::{Message, MessageClass, MessageType, Method};
use stun::textattrs::{Nonce, Realm};
use stun::xoraddr::XorMappedAddress;

fn server_addr() -> SocketAddr {
    "198.51.100.7:3478".parse().unwrap()
}

fn new_client() -> Client {
    Client::new(ClientConfig {
        server_addr: server_addr(),
        username: "user".to_owned(),
        password: "pass".to_owned(),
        software: None,
    })
}

/// Builds a response to `request_raw` with the same transaction id.
fn respond(
    request_raw: &[u8],
    class: MessageClass,
    extra: &[&dyn Setter],
) -> Vec<u8> {
    let mut req = Message::new();
    req.unmarshal_binary(request_raw).unwrap();

    let mut resp = Message::new();
    resp.build(&[
        Box::new(MessageType::new(req.typ.method, class)) as Box<dyn Setter>,
        Box::new(req.transaction_id),
    ])
    .unwrap();
    for s in extra {
        s.add_to(&mut resp).unwrap();
    }
    resp.raw
}

fn run_allocation(client: &mut Client, now: Instant) -> SocketAddr {
    client.allocate(now).unwrap();
    let first = client.poll_transmit().expect("initial allocate sent");
    assert_eq!(first.to, server_addr());

    // Server demands authentication.
    let unauthorized = respond(
        &first.payload,
        MessageClass::ErrorResponse,
        &[
            &stun::error_code::CODE_UNAUTHORIZED,
            &Realm::new("rapport.test".to_owned()),
            &Nonce::new("nonce123".to_owned()),
        ],
    );
    client.recv(&unauthorized, now).unwrap();

    // Authenticated retry carries USERNAME and MESSAGE-INTEGRITY.
    let retry = client.poll_transmit().expect("authenticated allocate sent");
    let mut retry_msg = Message::new();
    retry_msg.unmarshal_binary(&retry.payload).unwrap();
    assert!(retry_msg.contains(stun::attributes::ATTR_USERNAME));
    assert!(retry_msg.contains(stun::attributes::ATTR_MESSAGE_INTEGRITY));

    let relayed: SocketAddr = "198.51.100.7:49152".parse().unwrap();
    let success = respond(
        &retry.payload,
        MessageClass::SuccessResponse,
        &[&RelayedSetter(relayed), &Lifetime(DEFAULT_LIFETIME)],
    );
    client.recv(&success, now).unwrap();

    match client.poll_event() {
        Some(ClientEvent::Allocated { relayed_addr, .. }) => {
            assert_eq!(relayed_addr, relayed);
        }
        other => panic!("expected allocation, got {other:?}"),
    }
    relayed
}

struct RelayedSetter(SocketAddr);

impl Setter for RelayedSetter {
    fn add_to(&self, m: &mut Message) -> shared::error::Result<()> {
        XorMappedAddress {
            ip: self.0.ip(),
            port: self.0.port(),
        }
        .add_to_as(m, ATTR_XOR_RELAYED_ADDRESS)
    }
}

#[test]
fn test_allocate_with_long_term_credentials() {
    let mut client = new_client();
    let now = Instant::now();
    let relayed = run_allocation(&mut client, now);
    assert_eq!(client.relayed_addr(), Some(relayed));
    // A second allocate on the same client must be refused.
    assert_eq!(client.allocate(now), Err(Error::ErrAlreadyAllocated));
}

#[test]
fn test_permission_then_send_indication() {
    let mut client = new_client();
    let now = Instant::now();
    run_allocation(&mut client, now);

    let peer: SocketAddr = "192.0.2.10:4000".parse().unwrap();
    // Sending without a permission is refused.
    assert_eq!(client.send_to(b"hi", peer), Err(Error::ErrNoPermission));

    client.create_permission(peer, now).unwrap();
    let req = client.poll_transmit().unwrap();
    let ok = respond(&req.payload, MessageClass::SuccessResponse, &[]);
    client.recv(&ok, now).unwrap();
    match client.poll_event() {
        Some(ClientEvent::PermissionCreated(ip)) => assert_eq!(ip, peer.ip()),
        other => panic!("expected permission, got {other:?}"),
    }

    // Before a channel is bound, data goes out as a Send indication.
    client.send_to(b"hello", peer).unwrap();
    let tx = client.poll_transmit().unwrap();
    let mut msg = Message::new();
    msg.unmarshal_binary(&tx.payload).unwrap();
    assert_eq!(
        msg.typ,
        MessageType::new(Method::Send, MessageClass::Indication)
    );
    assert_eq!(msg.get(ATTR_DATA).unwrap(), b"hello");
}

#[test]
fn test_channel_bind_switches_to_channel_data() {
    let mut client = new_client();
    let now = Instant::now();
    run_allocation(&mut client, now);

    let peer: SocketAddr = "192.0.2.10:4000".parse().unwrap();
    client.channel_bind(peer, now).unwrap();
    let req = client.poll_transmit().unwrap();
    let ok = respond(&req.payload, MessageClass::SuccessResponse, &[]);
    client.recv(&ok, now).unwrap();
    match client.poll_event() {
        Some(ClientEvent::ChannelBound(addr, number)) => {
            assert_eq!(addr, peer);
            assert_eq!(number, MIN_CHANNEL_NUMBER);
        }
        other => panic!("expected channel bound, got {other:?}"),
    }

    client.send_to(b"fast path", peer).unwrap();
    let tx = client.poll_transmit().unwrap();
    let cd = ChannelData::decode(&tx.payload).unwrap();
    assert_eq!(cd.number, MIN_CHANNEL_NUMBER);
    assert_eq!(cd.data, b"fast path");

    // Inbound ChannelData maps back to the peer.
    let inbound = ChannelData {
        number: MIN_CHANNEL_NUMBER,
        data: b"reply".to_vec(),
    }
    .encode();
    client.recv(&inbound, now).unwrap();
    match client.poll_event() {
        Some(ClientEvent::DataFromPeer(addr, data)) => {
            assert_eq!(addr, peer);
            assert_eq!(data, b"reply");
        }
        other => panic!("expected peer data, got {other:?}"),
    }
}
