use std::time::{Duration, Instant};

use super::*;

#[test]
fn test_nack_waits_for_gap_to_persist() {
    let mut generator = NackGenerator::new(1, 2);
    let now = Instant::now();

    generator.update_missing(&[100, 101], now);
    // The gap is fresh; no NACK yet.
    assert!(generator.poll_nack(now).is_none());

    let later = now + DEFAULT_NACK_DELAY;
    generator.update_missing(&[100, 101], later);
    let nack = generator.poll_nack(later).expect("gap persisted");
    assert_eq!(nack.media_ssrc, 2);
    let mut lost: Vec<u16> = nack
        .nacks
        .iter()
        .flat_map(|p| p.packet_list())
        .collect();
    lost.sort_unstable();
    assert_eq!(lost, vec![100, 101]);
}

#[test]
fn test_nack_suppression_window() {
    let mut generator = NackGenerator::new(1, 2);
    let mut now = Instant::now();

    generator.update_missing(&[50], now);
    now += DEFAULT_NACK_DELAY;
    generator.update_missing(&[50], now);
    assert!(generator.poll_nack(now).is_some());

    // Still missing shortly after: suppressed.
    now += Duration::from_millis(100);
    generator.update_missing(&[50], now);
    assert!(generator.poll_nack(now).is_none());

    // After the suppression window it may be asked for again.
    now += NACK_SUPPRESSION;
    generator.update_missing(&[50], now);
    assert!(generator.poll_nack(now).is_some());
}

#[test]
fn test_nack_cleared_when_packet_arrives() {
    let mut generator = NackGenerator::new(1, 2);
    let now = Instant::now();
    generator.update_missing(&[7], now);
    // The packet showed up (no longer missing) before the delay elapsed.
    generator.update_missing(&[], now + Duration::from_millis(5));
    assert!(generator
        .poll_nack(now + DEFAULT_NACK_DELAY)
        .is_none());
}

#[test]
fn test_twcc_recorder_builds_feedback() {
    let epoch = Instant::now();
    let mut recorder = TwccRecorder::new(9, 10, epoch);

    let base = epoch + Duration::from_millis(640);
    recorder.record(200, base);
    recorder.record(201, base + Duration::from_millis(1));
    // 202 lost
    recorder.record(203, base + Duration::from_millis(3));

    let feedback = recorder.poll_feedback().expect("feedback pending");
    assert_eq!(feedback.base_sequence_number, 200);
    assert_eq!(feedback.packet_status_count, 4);
    assert_eq!(feedback.fb_pkt_count, 0);
    assert_eq!(feedback.reference_time, 10, "640ms / 64ms units");
    assert_eq!(feedback.recv_deltas.len(), 3);

    let symbols: Vec<_> = feedback
        .packet_chunks
        .iter()
        .flat_map(|c| c.symbols())
        .take(4)
        .collect();
    use crate::transport_feedbacks::transport_layer_cc::SymbolTypeTcc::*;
    assert_eq!(
        symbols,
        vec![
            PacketReceivedSmallDelta,
            PacketReceivedSmallDelta,
            PacketNotReceived,
            PacketReceivedSmallDelta,
        ]
    );

    // fb_pkt_count increments per feedback.
    recorder.record(204, base + Duration::from_millis(5));
    let next = recorder.poll_feedback().unwrap();
    assert_eq!(next.fb_pkt_count, 1);
    assert_eq!(next.base_sequence_number, 204);
}

#[test]
fn test_twcc_recorder_empty_poll() {
    let mut recorder = TwccRecorder::new(1, 2, Instant::now());
    assert!(recorder.poll_feedback().is_none());
}
