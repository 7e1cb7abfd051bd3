use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use datachannel::data_channel::{DataChannelConfig, DataChannelEvent, DataChannelState};
use ice::connection_state::GatheringState;

use super::*;

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

fn new_pc() -> RTCPeerConnection {
    RTCPeerConnection::new(RTCConfiguration::default().with_default_codecs()).unwrap()
}

/// Shuttles queued datagrams between the two connections.
fn pump(pc1: &mut RTCPeerConnection, pc2: &mut RTCPeerConnection, now: Instant) {
    loop {
        let mut moved = false;
        while let Some(t) = pc1.poll_transmit() {
            moved = true;
            let _ = pc2.handle_read(t.remote, t.local, &t.message, now);
        }
        while let Some(t) = pc2.poll_transmit() {
            moved = true;
            let _ = pc1.handle_read(t.remote, t.local, &t.message, now);
        }
        if !moved {
            break;
        }
    }
}

fn drain(pc: &mut RTCPeerConnection) -> Vec<RTCPeerConnectionEvent> {
    let mut events = vec![];
    while let Some(ev) = pc.poll_event() {
        events.push(ev);
    }
    events
}

fn candidate_strings(events: &[RTCPeerConnectionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|ev| match ev {
            RTCPeerConnectionEvent::OnIceCandidate(c) => Some(c.marshal()),
            _ => None,
        })
        .collect()
}

/// Runs a full offer/answer + ICE + DTLS + SCTP bring-up with one data
/// channel created by pc1.
fn connect_pair() -> (RTCPeerConnection, RTCPeerConnection, u16, Instant) {
    let mut now = Instant::now();
    let mut pc1 = new_pc();
    let mut pc2 = new_pc();

    pc1.start_gathering(&[addr("10.0.0.1:40000")], now).unwrap();
    pc2.start_gathering(&[addr("10.0.0.2:40001")], now).unwrap();
    assert_eq!(pc1.ice_gathering_state(), GatheringState::Complete);

    let channel_id = pc1
        .create_data_channel(DataChannelConfig {
            label: "benchmark".to_owned(),
            ordered: true,
            ..Default::default()
        })
        .unwrap();

    let offer = pc1.create_offer().unwrap();
    pc1.set_local_description(offer.clone(), now).unwrap();
    pc2.set_remote_description(offer, now).unwrap();
    let answer = pc2.create_answer().unwrap();
    pc2.set_local_description(answer.clone(), now).unwrap();
    pc1.set_remote_description(answer, now).unwrap();

    // Trickle the host candidates across.
    let pc1_events = drain(&mut pc1);
    let pc2_events = drain(&mut pc2);
    for c in candidate_strings(&pc1_events) {
        pc2.add_ice_candidate(&c).unwrap();
    }
    for c in candidate_strings(&pc2_events) {
        pc1.add_ice_candidate(&c).unwrap();
    }

    for _ in 0..60 {
        now += Duration::from_millis(50);
        pc1.handle_timeout(now);
        pc2.handle_timeout(now);
        pump(&mut pc1, &mut pc2, now);
        if pc1.connection_state() == RTCPeerConnectionState::Connected
            && pc2.connection_state() == RTCPeerConnectionState::Connected
        {
            break;
        }
    }
    assert_eq!(pc1.connection_state(), RTCPeerConnectionState::Connected);
    assert_eq!(pc2.connection_state(), RTCPeerConnectionState::Connected);

    // A few more rounds for DCEP to settle.
    for _ in 0..5 {
        now += Duration::from_millis(50);
        pc1.handle_timeout(now);
        pc2.handle_timeout(now);
        pump(&mut pc1, &mut pc2, now);
    }

    // The channel id on pc1 was re-homed when the DTLS role was pinned.
    let channel_id = if pc1.data_channel(channel_id).is_some() {
        channel_id
    } else {
        *pc1_channel_ids(&pc1).first().expect("channel exists")
    };
    (pc1, pc2, channel_id, now)
}

fn pc1_channel_ids(pc: &RTCPeerConnection) -> Vec<u16> {
    let mut ids: Vec<u16> = (0..16u16).filter(|id| pc.data_channel(*id).is_some()).collect();
    ids.sort_unstable();
    ids
}

#[test]
fn test_offer_contains_required_attributes() {
    let mut pc = new_pc();
    pc.create_data_channel(DataChannelConfig {
        label: "x".to_owned(),
        ordered: true,
        ..Default::default()
    })
    .unwrap();
    let offer = pc.create_offer().unwrap();

    assert!(offer.sdp.contains("a=group:BUNDLE"));
    assert!(offer.sdp.contains("a=ice-ufrag:"));
    assert!(offer.sdp.contains("a=ice-pwd:"));
    assert!(offer.sdp.contains("a=fingerprint:sha-256 "));
    assert!(offer.sdp.contains("a=setup:actpass"));
    assert!(offer.sdp.contains("m=application 9 UDP/DTLS/SCTP webrtc-datachannel"));
    assert!(offer.sdp.contains("a=sctp-port:5000"));
    assert!(offer.sdp.contains("a=max-message-size:"));
}

#[test]
fn test_media_offer_lists_codecs_deterministically() {
    let mut pc = new_pc();
    pc.add_transceiver(
        RTCRtpTransceiverKind::Audio,
        RTCRtpTransceiverDirection::Sendrecv,
    )
    .unwrap();
    pc.add_transceiver(
        RTCRtpTransceiverKind::Video,
        RTCRtpTransceiverDirection::Sendonly,
    )
    .unwrap();
    let offer = pc.create_offer().unwrap();

    assert!(offer.sdp.contains("m=audio 9 UDP/TLS/RTP/SAVPF 96"));
    assert!(offer.sdp.contains("a=rtpmap:96 opus/48000/2"));
    assert!(offer.sdp.contains("m=video 9 UDP/TLS/RTP/SAVPF 97 98 99"));
    assert!(offer.sdp.contains("a=rtpmap:97 VP8/90000"));
    assert!(offer.sdp.contains("a=rtcp-mux"));
    assert!(offer.sdp.contains("a=mid:0"));
    assert!(offer.sdp.contains("a=mid:1"));
    assert!(offer.sdp.contains("a=sendonly"));
}

#[test]
fn test_negotiation_needed_coalesces() {
    let mut pc = new_pc();
    for _ in 0..3 {
        pc.add_transceiver(
            RTCRtpTransceiverKind::Audio,
            RTCRtpTransceiverDirection::Sendrecv,
        )
        .unwrap();
    }
    let events = drain(&mut pc);
    let count = events
        .iter()
        .filter(|e| matches!(e, RTCPeerConnectionEvent::OnNegotiationNeeded))
        .count();
    assert_eq!(count, 1, "three dirties coalesce into one event");
}

#[test]
fn test_negotiation_needed_suppressed_while_unstable() {
    let mut pc = new_pc();
    pc.create_data_channel(DataChannelConfig {
        label: "x".to_owned(),
        ordered: true,
        ..Default::default()
    })
    .unwrap();
    let offer = pc.create_offer().unwrap();
    pc.set_local_description(offer, Instant::now()).unwrap();
    drain(&mut pc);

    // Dirty while have-local-offer: no event.
    pc.add_transceiver(
        RTCRtpTransceiverKind::Video,
        RTCRtpTransceiverDirection::Sendrecv,
    )
    .unwrap();
    let events = drain(&mut pc);
    assert!(!events
        .iter()
        .any(|e| matches!(e, RTCPeerConnectionEvent::OnNegotiationNeeded)));
}

#[test]
fn test_invalid_state_operations() {
    let mut pc = new_pc();
    // Answer without a remote offer.
    assert!(pc.create_answer().is_err());
    // Remote candidate before any remote description.
    assert_eq!(
        pc.add_ice_candidate("1 1 udp 1 10.0.0.9 4000 typ host"),
        Err(Error::ErrNoRemoteDescription)
    );
}

#[test]
fn test_remote_description_requires_fingerprint() {
    let mut pc = new_pc();
    let sdp = "v=0\r\no=- 1 2 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n\
m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
a=mid:0\r\na=setup:actpass\r\na=ice-ufrag:abcd\r\na=ice-pwd:0123456789012345678901\r\n";
    let desc = RTCSessionDescription::offer(sdp.to_owned());
    assert_eq!(
        pc.set_remote_description(desc, Instant::now()),
        Err(Error::ErrSessionDescriptionNoFingerprint)
    );
}

#[test]
fn test_data_channel_round_trip() {
    let (mut pc1, mut pc2, channel_id, mut now) = connect_pair();

    // pc2 saw the announced channel.
    let pc2_events = drain(&mut pc2);
    let announced = pc2_events.iter().find_map(|e| match e {
        RTCPeerConnectionEvent::OnDataChannel { stream_id, label } => {
            Some((*stream_id, label.clone()))
        }
        _ => None,
    });
    let (remote_id, label) = announced.expect("OnDataChannel fired");
    assert_eq!(label, "benchmark");

    // Both sides observed connecting -> open.
    let open_trace: Vec<DataChannelState> = pc2_events
        .iter()
        .filter_map(|e| match e {
            RTCPeerConnectionEvent::OnDataChannelEvent {
                event: DataChannelEvent::StateChange(s),
                ..
            } => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(open_trace, vec![DataChannelState::Open]);

    // 4000 random-ish bytes over, echoed back identical.
    let payload: Vec<u8> = (0..4000u32).map(|i| (i * 7 + 13) as u8).collect();
    pc1.send_binary(channel_id, Bytes::from(payload.clone()))
        .unwrap();
    for _ in 0..10 {
        now += Duration::from_millis(50);
        pc1.handle_timeout(now);
        pc2.handle_timeout(now);
        pump(&mut pc1, &mut pc2, now);
    }

    let received = drain(&mut pc2).into_iter().find_map(|e| match e {
        RTCPeerConnectionEvent::OnDataChannelEvent {
            event: DataChannelEvent::MessageBinary(data),
            ..
        } => Some(data),
        _ => None,
    });
    let received = received.expect("message delivered");
    assert_eq!(received.len(), 4000);
    assert_eq!(&received[..], &payload[..]);

    // Echo.
    pc2.send_binary(remote_id, received).unwrap();
    for _ in 0..10 {
        now += Duration::from_millis(50);
        pc1.handle_timeout(now);
        pc2.handle_timeout(now);
        pump(&mut pc1, &mut pc2, now);
    }
    let echoed = drain(&mut pc1).into_iter().find_map(|e| match e {
        RTCPeerConnectionEvent::OnDataChannelEvent {
            event: DataChannelEvent::MessageBinary(data),
            ..
        } => Some(data),
        _ => None,
    });
    assert_eq!(&echoed.expect("echo delivered")[..], &payload[..]);
}

#[test]
fn test_graceful_data_channel_close_keeps_connection() {
    let (mut pc1, mut pc2, channel_id, mut now) = connect_pair();
    drain(&mut pc1);
    drain(&mut pc2);

    pc1.close_data_channel(channel_id).unwrap();
    for _ in 0..5 {
        now += Duration::from_millis(50);
        pc1.handle_timeout(now);
        pc2.handle_timeout(now);
        pump(&mut pc1, &mut pc2, now);
    }

    let trace1: Vec<DataChannelState> = drain(&mut pc1)
        .into_iter()
        .filter_map(|e| match e {
            RTCPeerConnectionEvent::OnDataChannelEvent {
                event: DataChannelEvent::StateChange(s),
                ..
            } => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(
        trace1,
        vec![DataChannelState::Closing, DataChannelState::Closed]
    );

    let trace2: Vec<DataChannelState> = drain(&mut pc2)
        .into_iter()
        .filter_map(|e| match e {
            RTCPeerConnectionEvent::OnDataChannelEvent {
                event: DataChannelEvent::StateChange(s),
                ..
            } => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(
        trace2,
        vec![DataChannelState::Closing, DataChannelState::Closed]
    );

    // The peer connection itself stays up.
    assert_eq!(pc1.connection_state(), RTCPeerConnectionState::Connected);
    assert_eq!(pc2.connection_state(), RTCPeerConnectionState::Connected);
}

#[test]
fn test_close_cascade() {
    let (mut pc1, mut pc2, _channel_id, mut now) = connect_pair();
    drain(&mut pc1);
    drain(&mut pc2);

    pc1.close();
    assert_eq!(pc1.signaling_state(), RTCSignalingState::Closed);
    assert_eq!(pc1.connection_state(), RTCPeerConnectionState::Closed);

    let pc1_events = drain(&mut pc1);
    let dc_closed = pc1_events.iter().any(|e| {
        matches!(
            e,
            RTCPeerConnectionEvent::OnDataChannelEvent {
                event: DataChannelEvent::StateChange(DataChannelState::Closed),
                ..
            }
        )
    });
    assert!(dc_closed, "local channels close during the cascade");

    // pc2 observes the teardown: disconnected, then closed.
    for _ in 0..5 {
        now += Duration::from_millis(50);
        pc2.handle_timeout(now);
        pump(&mut pc1, &mut pc2, now);
    }
    let pc2_states: Vec<RTCPeerConnectionState> = drain(&mut pc2)
        .into_iter()
        .filter_map(|e| match e {
            RTCPeerConnectionEvent::OnConnectionStateChange(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(
        pc2_states,
        vec![
            RTCPeerConnectionState::Disconnected,
            RTCPeerConnectionState::Closed,
        ]
    );

    // Everything after close is refused.
    assert_eq!(pc1.create_offer(), Err(Error::ErrConnectionClosed));
    assert!(pc1
        .create_data_channel(DataChannelConfig::default())
        .is_err());
}

#[test]
fn test_ice_restart_changes_credentials() {
    let (mut pc1, mut pc2, _channel_id, now) = connect_pair();
    let _ = &mut pc2;
    drain(&mut pc1);

    let offer_before = pc1.local_description().unwrap().sdp.clone();
    let ufrag_before = extract_attr(&offer_before, "a=ice-ufrag:");
    let pwd_before = extract_attr(&offer_before, "a=ice-pwd:");
    assert_eq!(pc1.ice_generation(), 0);

    pc1.restart_ice().unwrap();
    assert_eq!(pc1.ice_generation(), 1);
    let events = drain(&mut pc1);
    assert!(events
        .iter()
        .any(|e| matches!(e, RTCPeerConnectionEvent::OnNegotiationNeeded)));

    let offer = pc1.create_offer().unwrap();
    let ufrag_after = extract_attr(&offer.sdp, "a=ice-ufrag:");
    let pwd_after = extract_attr(&offer.sdp, "a=ice-pwd:");
    assert_ne!(ufrag_before, ufrag_after);
    assert_ne!(pwd_before, pwd_after);

    // New gathering round carries the incremented generation.
    pc1.start_gathering(&[addr("10.0.0.1:40002")], now).unwrap();
    let candidates = candidate_strings(&drain(&mut pc1));
    assert!(!candidates.is_empty());
    assert!(candidates[0].contains("generation 1"));
}

fn extract_attr(sdp: &str, prefix: &str) -> String {
    sdp.lines()
        .find_map(|l| l.strip_prefix(prefix))
        .unwrap_or_default()
        .to_owned()
}

#[test]
fn test_rollback_restores_stable() {
    let mut pc = new_pc();
    pc.create_data_channel(DataChannelConfig {
        label: "x".to_owned(),
        ordered: true,
        ..Default::default()
    })
    .unwrap();
    let now = Instant::now();
    let offer = pc.create_offer().unwrap();
    pc.set_local_description(offer, now).unwrap();
    assert_eq!(pc.signaling_state(), RTCSignalingState::HaveLocalOffer);

    pc.set_local_description(RTCSessionDescription::rollback(), now)
        .unwrap();
    assert_eq!(pc.signaling_state(), RTCSignalingState::Stable);
    assert!(pc.local_description().is_none());
}
