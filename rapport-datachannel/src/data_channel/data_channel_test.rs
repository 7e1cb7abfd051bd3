use bytes::Bytes;
use sctp::chunk::chunk_payload_data::PayloadProtocolIdentifier;

use super::*;
use crate::message::message_channel_open::DataChannelOpen;
use shared::marshal::Unmarshal;

fn config(label: &str) -> DataChannelConfig {
    DataChannelConfig {
        label: label.to_owned(),
        ordered: true,
        ..Default::default()
    }
}

fn state_trace(channel: &mut DataChannel) -> Vec<DataChannelState> {
    let mut states = vec![];
    while let Some(ev) = channel.poll_event() {
        if let DataChannelEvent::StateChange(s) = ev {
            states.push(s);
        }
    }
    states
}

/// Drives the DCEP exchange between a dialing and an accepting channel.
fn open_pair(label: &str) -> (DataChannel, DataChannel) {
    let mut dialer = DataChannel::dial(config(label), 1).unwrap();

    let open_msg = dialer.poll_outbound().expect("OPEN queued");
    assert_eq!(open_msg.ppi, PayloadProtocolIdentifier::Dcep);

    let mut buf = &open_msg.payload[..];
    let parsed = Message::unmarshal(&mut buf).unwrap();
    let Message::DataChannelOpen(open) = parsed else {
        panic!("expected DATA_CHANNEL_OPEN");
    };
    let mut acceptor = DataChannel::accept(1, open).unwrap();

    let ack_msg = acceptor.poll_outbound().expect("ACK queued");
    dialer
        .handle_inbound(PayloadProtocolIdentifier::Dcep, &ack_msg.payload)
        .unwrap();

    (dialer, acceptor)
}

#[test]
fn test_dcep_open_handshake() {
    let (mut dialer, mut acceptor) = open_pair("benchmark");

    assert_eq!(dialer.state(), DataChannelState::Open);
    assert_eq!(acceptor.state(), DataChannelState::Open);
    assert_eq!(acceptor.label(), "benchmark");

    // Both sides observed connecting -> open.
    assert_eq!(state_trace(&mut dialer), vec![DataChannelState::Open]);
    assert_eq!(state_trace(&mut acceptor), vec![DataChannelState::Open]);
}

#[test]
fn test_negotiated_channel_skips_dcep() {
    let mut cfg = config("negotiated");
    cfg.negotiated = Some(7);
    let mut channel = DataChannel::dial(cfg, 7).unwrap();
    assert_eq!(channel.state(), DataChannelState::Open);
    assert!(channel.poll_outbound().is_none(), "no OPEN for negotiated");
}

#[test]
fn test_binary_message_round_trip() {
    let (mut dialer, mut acceptor) = open_pair("data");
    state_trace(&mut dialer);
    state_trace(&mut acceptor);

    let payload = Bytes::from((0..255u8).collect::<Vec<u8>>());
    dialer.send_binary(payload.clone()).unwrap();
    let out = dialer.poll_outbound().unwrap();
    assert_eq!(out.ppi, PayloadProtocolIdentifier::Binary);

    acceptor.handle_inbound(out.ppi, &out.payload).unwrap();
    match acceptor.poll_event() {
        Some(DataChannelEvent::MessageBinary(got)) => assert_eq!(got, payload),
        other => panic!("expected binary message, got {other:?}"),
    }
}

#[test]
fn test_string_and_empty_messages() {
    let (mut dialer, mut acceptor) = open_pair("text");
    state_trace(&mut dialer);
    state_trace(&mut acceptor);

    dialer.send_text("hello").unwrap();
    dialer.send_text("").unwrap();
    dialer.send_binary(Bytes::new()).unwrap();

    let mut events = vec![];
    while let Some(out) = dialer.poll_outbound() {
        acceptor.handle_inbound(out.ppi, &out.payload).unwrap();
    }
    while let Some(ev) = acceptor.poll_event() {
        events.push(ev);
    }
    assert_eq!(
        events,
        vec![
            DataChannelEvent::MessageString("hello".to_owned()),
            DataChannelEvent::MessageString(String::new()),
            DataChannelEvent::MessageBinary(Bytes::new()),
        ]
    );
}

#[test]
fn test_send_requires_open() {
    let mut channel = DataChannel::dial(config("early"), 2).unwrap();
    let _ = channel.poll_outbound();
    assert_eq!(
        channel.send_text("nope"),
        Err(shared::error::Error::ErrDataChannelNotOpen)
    );
}

#[test]
fn test_close_sequence_local_then_reset() {
    let (mut dialer, _acceptor) = open_pair("closing");
    state_trace(&mut dialer);

    dialer.close();
    dialer.on_stream_reset();
    assert_eq!(
        state_trace(&mut dialer),
        vec![DataChannelState::Closing, DataChannelState::Closed]
    );
}

#[test]
fn test_remote_reset_passes_through_closing() {
    let (_dialer, mut acceptor) = open_pair("remote-close");
    state_trace(&mut acceptor);

    acceptor.on_stream_reset();
    assert_eq!(
        state_trace(&mut acceptor),
        vec![DataChannelState::Closing, DataChannelState::Closed]
    );
}

#[test]
fn test_buffered_amount_low() {
    let (mut dialer, _acceptor) = open_pair("buffered");
    state_trace(&mut dialer);
    dialer.set_buffered_amount_low_threshold(4);

    dialer.send_binary(Bytes::from(vec![0u8; 10])).unwrap();
    assert_eq!(dialer.buffered_amount(), 10);
    dialer.on_buffered_amount_sent(10);
    assert_eq!(dialer.buffered_amount(), 0);
    assert!(matches!(
        dialer.poll_event(),
        Some(DataChannelEvent::BufferedAmountLow)
    ));
}

#[test]
fn test_config_validation() {
    let bad = DataChannelConfig {
        max_packet_life_time: Some(100),
        max_retransmits: Some(3),
        ..Default::default()
    };
    assert_eq!(
        bad.validate(),
        Err(shared::error::Error::ErrRetransmitsOrPacketLifeTime)
    );
}
