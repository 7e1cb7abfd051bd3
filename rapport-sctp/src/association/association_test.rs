use std::time::{Duration, Instant};

use bytes::Bytes;

use super::*;
use crate::chunk::chunk_payload_data::PayloadProtocolIdentifier;

fn pump(a: &mut Association, b: &mut Association, now: Instant) {
    loop {
        let mut moved = false;
        while let Some(datagram) = a.poll_transmit() {
            moved = true;
            let _ = b.handle_read(&datagram, now);
        }
        while let Some(datagram) = b.poll_transmit() {
            moved = true;
            let _ = a.handle_read(&datagram, now);
        }
        if !moved {
            break;
        }
    }
}

fn connected_pair() -> (Association, Association, Instant) {
    let now = Instant::now();
    let mut client = Association::new(AssociationConfig {
        is_client: true,
        ..Default::default()
    });
    let mut server = Association::new(AssociationConfig::default());

    client.connect(now);
    pump(&mut client, &mut server, now);

    assert!(client.is_established(), "client established");
    assert!(server.is_established(), "server established");
    (client, server, now)
}

fn drain_data(a: &mut Association) -> Vec<(u16, Bytes)> {
    let mut out = vec![];
    while let Some(ev) = a.poll_event() {
        if let AssociationEvent::DataReceived {
            stream_id, payload, ..
        } = ev
        {
            out.push((stream_id, payload));
        }
    }
    out
}

#[test]
fn test_four_way_handshake() {
    let (mut client, mut server, _) = connected_pair();
    let client_connected = std::iter::from_fn(|| client.poll_event())
        .any(|e| matches!(e, AssociationEvent::Connected));
    let server_connected = std::iter::from_fn(|| server.poll_event())
        .any(|e| matches!(e, AssociationEvent::Connected));
    assert!(client_connected);
    assert!(server_connected);
}

#[test]
fn test_ordered_delivery_in_ssn_order() {
    let (mut client, mut server, now) = connected_pair();
    drain_data(&mut server);

    for i in 0..5u8 {
        client
            .send(
                1,
                PayloadProtocolIdentifier::Binary,
                Bytes::from(vec![i]),
                true,
                ReliabilityType::Reliable,
                now,
            )
            .unwrap();
    }
    pump(&mut client, &mut server, now);

    let received = drain_data(&mut server);
    let payloads: Vec<u8> = received.iter().map(|(_, p)| p[0]).collect();
    assert_eq!(payloads, vec![0, 1, 2, 3, 4], "strict SSN order");
}

#[test]
fn test_unordered_delivery_multiset() {
    let (mut client, mut server, now) = connected_pair();
    drain_data(&mut server);

    let sent: Vec<Vec<u8>> = (0..4u8).map(|i| vec![i, i]).collect();
    for payload in &sent {
        client
            .send(
                2,
                PayloadProtocolIdentifier::Binary,
                Bytes::from(payload.clone()),
                false,
                ReliabilityType::Reliable,
                now,
            )
            .unwrap();
    }
    pump(&mut client, &mut server, now);

    let mut received: Vec<Vec<u8>> = drain_data(&mut server)
        .into_iter()
        .map(|(_, p)| p.to_vec())
        .collect();
    let mut expected = sent;
    received.sort();
    expected.sort();
    assert_eq!(received, expected, "multiset equality");
}

#[test]
fn test_large_message_fragmentation_round_trip() {
    let (mut client, mut server, now) = connected_pair();
    drain_data(&mut server);

    // Larger than one MTU: must be fragmented and reassembled.
    let big: Vec<u8> = (0..4000u32).map(|i| i as u8).collect();
    client
        .send(
            3,
            PayloadProtocolIdentifier::Binary,
            Bytes::from(big.clone()),
            true,
            ReliabilityType::Reliable,
            now,
        )
        .unwrap();
    pump(&mut client, &mut server, now);

    let received = drain_data(&mut server);
    assert_eq!(received.len(), 1, "one reassembled message");
    assert_eq!(received[0].1.to_vec(), big);
}

#[test]
fn test_message_too_large_rejected() {
    let (mut client, _server, now) = connected_pair();
    let too_big = Bytes::from(vec![0u8; 100_000]);
    assert_eq!(
        client.send(
            0,
            PayloadProtocolIdentifier::Binary,
            too_big,
            true,
            ReliabilityType::Reliable,
            now,
        ),
        Err(Error::ErrOutboundPacketTooLarge)
    );
}

#[test]
fn test_stream_reset_round_trip() {
    let (mut client, mut server, now) = connected_pair();
    drain_data(&mut server);

    client.reset_stream(4).unwrap();
    pump(&mut client, &mut server, now);

    let mut reset = None;
    while let Some(ev) = server.poll_event() {
        if let AssociationEvent::StreamsReset(ids) = ev {
            reset = Some(ids);
        }
    }
    assert_eq!(reset, Some(vec![4]));
}

#[test]
fn test_graceful_shutdown() {
    let (mut client, mut server, now) = connected_pair();
    client.shutdown().unwrap();
    pump(&mut client, &mut server, now);

    assert_eq!(client.state(), AssociationState::Closed);
    assert_eq!(server.state(), AssociationState::Closed);

    let client_closed = std::iter::from_fn(|| client.poll_event())
        .any(|e| matches!(e, AssociationEvent::Closed));
    assert!(client_closed);
}

#[test]
fn test_lost_data_is_retransmitted() {
    let (mut client, mut server, mut now) = connected_pair();
    drain_data(&mut server);

    client
        .send(
            0,
            PayloadProtocolIdentifier::Binary,
            Bytes::from_static(b"will be lost"),
            true,
            ReliabilityType::Reliable,
            now,
        )
        .unwrap();
    // Drop the datagram on the floor.
    while client.poll_transmit().is_some() {}

    // T3 fires and the chunk is retransmitted.
    let deadline = client.poll_timeout().expect("t3 armed");
    now = deadline + Duration::from_millis(1);
    client.handle_timeout(now);
    pump(&mut client, &mut server, now);

    let received = drain_data(&mut server);
    assert_eq!(received.len(), 1);
    assert_eq!(&received[0].1[..], b"will be lost");
}

#[test]
fn test_partial_reliability_abandons_after_rexmit_limit() {
    let (mut client, mut server, mut now) = connected_pair();
    drain_data(&mut server);

    client
        .send(
            0,
            PayloadProtocolIdentifier::Binary,
            Bytes::from_static(b"fragile"),
            true,
            ReliabilityType::Rexmit(0),
            now,
        )
        .unwrap();
    while client.poll_transmit().is_some() {}

    // First timeout exceeds the zero-retransmit budget: the message is
    // abandoned and FORWARD-TSN advances the peer.
    let deadline = client.poll_timeout().expect("t3 armed");
    now = deadline + Duration::from_millis(1);
    client.handle_timeout(now);
    pump(&mut client, &mut server, now);

    assert!(drain_data(&mut server).is_empty(), "message abandoned");

    // A later reliable message still arrives and delivery resumes.
    client
        .send(
            0,
            PayloadProtocolIdentifier::Binary,
            Bytes::from_static(b"durable"),
            true,
            ReliabilityType::Reliable,
            now,
        )
        .unwrap();
    pump(&mut client, &mut server, now);
    let received = drain_data(&mut server);
    assert_eq!(received.len(), 1);
    assert_eq!(&received[0].1[..], b"durable");
}
