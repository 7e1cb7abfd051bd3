use std::time::{Duration, Instant};

use super::*;
use crate::config::{Config, DtlsRole};
use crate::crypto::DtlsIdentity;

fn new_pair(pin_fingerprints: bool) -> (Endpoint, Endpoint) {
    let client_identity = DtlsIdentity::generate_self_signed("client").unwrap();
    let server_identity = DtlsIdentity::generate_self_signed("server").unwrap();

    let mut client_config = Config::new(DtlsRole::Client, client_identity.clone());
    let mut server_config = Config::new(DtlsRole::Server, server_identity.clone());
    if pin_fingerprints {
        client_config.remote_fingerprint = Some(server_identity.fingerprint());
        server_config.remote_fingerprint = Some(client_identity.fingerprint());
    }
    (Endpoint::new(client_config), Endpoint::new(server_config))
}

/// Shuttles datagrams until both endpoints go quiet.
fn pump(client: &mut Endpoint, server: &mut Endpoint, now: Instant) {
    loop {
        let mut moved = false;
        while let Some(datagram) = client.poll_transmit() {
            moved = true;
            let _ = server.handle_read(&datagram, now);
        }
        while let Some(datagram) = server.poll_transmit() {
            moved = true;
            let _ = client.handle_read(&datagram, now);
        }
        if !moved {
            break;
        }
    }
}

fn run_handshake(client: &mut Endpoint, server: &mut Endpoint) {
    let now = Instant::now();
    client.start_handshake(now).unwrap();
    server.start_handshake(now).unwrap();
    pump(client, server, now);
}

#[test]
fn test_full_handshake_completes() {
    let (mut client, mut server) = new_pair(true);
    run_handshake(&mut client, &mut server);

    assert!(client.is_established());
    assert!(server.is_established());
    assert_eq!(client.srtp_profile(), SrtpProtectionProfile::AeadAes128Gcm);
    assert_eq!(server.srtp_profile(), SrtpProtectionProfile::AeadAes128Gcm);

    let mut client_complete = false;
    while let Some(ev) = client.poll_event() {
        if matches!(ev, EndpointEvent::HandshakeComplete { .. }) {
            client_complete = true;
        }
    }
    assert!(client_complete);
}

#[test]
fn test_application_data_round_trip() {
    let (mut client, mut server) = new_pair(true);
    run_handshake(&mut client, &mut server);
    let now = Instant::now();

    client.write(b"hello over dtls").unwrap();
    pump(&mut client, &mut server, now);

    let mut received = None;
    while let Some(ev) = server.poll_event() {
        if let EndpointEvent::ApplicationData(data) = ev {
            received = Some(data);
        }
    }
    assert_eq!(received.as_deref(), Some(&b"hello over dtls"[..]));

    server.write(b"echo").unwrap();
    pump(&mut client, &mut server, now);
    let mut echoed = None;
    while let Some(ev) = client.poll_event() {
        if let EndpointEvent::ApplicationData(data) = ev {
            echoed = Some(data);
        }
    }
    assert_eq!(echoed.as_deref(), Some(&b"echo"[..]));
}

#[test]
fn test_exported_keying_material_matches() {
    let (mut client, mut server) = new_pair(true);
    run_handshake(&mut client, &mut server);

    // 2 * (key 16 + salt 14) for the AES-CM profile.
    let client_material = client
        .export_keying_material(EXTRACTOR_DTLS_SRTP, &[], 60)
        .unwrap();
    let server_material = server
        .export_keying_material(EXTRACTOR_DTLS_SRTP, &[], 60)
        .unwrap();
    assert_eq!(client_material.len(), 60);
    assert_eq!(client_material, server_material);
}

#[test]
fn test_export_requires_established() {
    let (client, _server) = new_pair(true);
    assert_eq!(
        client.export_keying_material(EXTRACTOR_DTLS_SRTP, &[], 60),
        Err(Error::HandshakeInProgress)
    );
}

#[test]
fn test_fingerprint_mismatch_is_fatal() {
    let client_identity = DtlsIdentity::generate_self_signed("client").unwrap();
    let server_identity = DtlsIdentity::generate_self_signed("server").unwrap();
    let unrelated = DtlsIdentity::generate_self_signed("mallory").unwrap();

    let mut client_config = Config::new(DtlsRole::Client, client_identity.clone());
    // The client pins a fingerprint that will not match the server's cert.
    client_config.remote_fingerprint = Some(unrelated.fingerprint());
    let mut server_config = Config::new(DtlsRole::Server, server_identity);
    server_config.remote_fingerprint = Some(client_identity.fingerprint());

    let mut client = Endpoint::new(client_config);
    let mut server = Endpoint::new(server_config);
    let now = Instant::now();
    client.start_handshake(now).unwrap();
    pump(&mut client, &mut server, now);

    assert!(!client.is_established());
    let mut failed = false;
    while let Some(ev) = client.poll_event() {
        if matches!(ev, EndpointEvent::HandshakeFailed(_)) {
            failed = true;
        }
    }
    assert!(failed, "client must fail on fingerprint mismatch");
}

#[test]
fn test_flight_retransmission_on_loss() {
    let (mut client, mut server) = new_pair(true);
    let mut now = Instant::now();
    client.start_handshake(now).unwrap();

    // Drop the first ClientHello on the floor.
    let lost = client.poll_transmit().expect("flight 1 sent");
    assert!(client.poll_transmit().is_none());
    drop(lost);

    // After the 1s initial RTO the client retransmits the same flight.
    now += Duration::from_secs(1);
    client.handle_timeout(now);
    let retransmitted = client.poll_transmit().expect("flight 1 retransmitted");
    assert!(!retransmitted.is_empty());

    // Handshake still completes afterwards.
    let _ = server.handle_read(&retransmitted, now);
    pump(&mut client, &mut server, now);
    assert!(client.is_established());
    assert!(server.is_established());
}

#[test]
fn test_handshake_gives_up_after_max_retries() {
    let (mut client, _server) = new_pair(true);
    let mut now = Instant::now();
    client.start_handshake(now).unwrap();
    let _ = client.poll_transmit();

    // 6 retries with doubling backoff, then failure.
    for _ in 0..7 {
        let deadline = client.poll_timeout().expect("timer armed");
        now = deadline.max(now) + Duration::from_millis(1);
        client.handle_timeout(now);
        while client.poll_transmit().is_some() {}
    }

    let mut failed = false;
    while let Some(ev) = client.poll_event() {
        if matches!(ev, EndpointEvent::HandshakeFailed(Error::ErrHandshakeTimeout)) {
            failed = true;
        }
    }
    assert!(failed);
    assert!(client.poll_timeout().is_none());
}

#[test]
fn test_close_notify_reaches_peer() {
    let (mut client, mut server) = new_pair(true);
    run_handshake(&mut client, &mut server);
    let now = Instant::now();

    client.close();
    pump(&mut client, &mut server, now);

    let mut closed = false;
    while let Some(ev) = server.poll_event() {
        if matches!(ev, EndpointEvent::PeerClosed) {
            closed = true;
        }
    }
    assert!(closed);
    // Writes after close are refused.
    assert!(client.write(b"nope").is_err());
}
