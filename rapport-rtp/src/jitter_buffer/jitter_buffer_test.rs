use std::time::{Duration, Instant};

use bytes::Bytes;

use super::*;
use crate::header::Header;

fn packet(seq: u16) -> Packet {
    Packet {
        header: Header {
            version: 2,
            sequence_number: seq,
            ssrc: 0x1234,
            ..Default::default()
        },
        payload: Bytes::from(vec![seq as u8]),
    }
}

#[test]
fn test_in_order_delivery() {
    let mut jb = JitterBuffer::default();
    let now = Instant::now();
    for seq in [10u16, 11, 12] {
        jb.push(packet(seq), now);
    }
    for seq in [10u16, 11, 12] {
        assert_eq!(jb.pop(now).unwrap().header.sequence_number, seq);
    }
    assert!(jb.pop(now).is_none());
}

#[test]
fn test_reorder_before_delivery() {
    let mut jb = JitterBuffer::default();
    let now = Instant::now();
    jb.push(packet(10), now);
    jb.push(packet(12), now);
    jb.push(packet(11), now);

    assert_eq!(jb.pop(now).unwrap().header.sequence_number, 10);
    assert_eq!(jb.pop(now).unwrap().header.sequence_number, 11);
    assert_eq!(jb.pop(now).unwrap().header.sequence_number, 12);
}

#[test]
fn test_gap_stalls_then_skips_after_timeout() {
    let mut jb = JitterBuffer::new(DEFAULT_CAPACITY, Duration::from_millis(100));
    let mut now = Instant::now();
    jb.push(packet(10), now);
    assert_eq!(jb.pop(now).unwrap().header.sequence_number, 10);

    // 11 is missing; 12 must wait.
    jb.push(packet(12), now);
    assert!(jb.pop(now).is_none());
    assert_eq!(jb.missing(), vec![11]);
    assert!(jb.poll_timeout().is_some());

    now += Duration::from_millis(101);
    assert_eq!(jb.pop(now).unwrap().header.sequence_number, 12);
    assert!(jb.missing().is_empty());
}

#[test]
fn test_late_packet_fills_gap_in_time() {
    let mut jb = JitterBuffer::new(DEFAULT_CAPACITY, Duration::from_millis(100));
    let now = Instant::now();
    jb.push(packet(20), now);
    assert_eq!(jb.pop(now).unwrap().header.sequence_number, 20);

    jb.push(packet(22), now);
    assert!(jb.pop(now).is_none());
    jb.push(packet(21), now);
    assert_eq!(jb.pop(now).unwrap().header.sequence_number, 21);
    assert_eq!(jb.pop(now).unwrap().header.sequence_number, 22);
}

#[test]
fn test_stale_and_duplicate_dropped() {
    let mut jb = JitterBuffer::default();
    let now = Instant::now();
    jb.push(packet(10), now);
    assert_eq!(jb.pop(now).unwrap().header.sequence_number, 10);

    // Already delivered.
    jb.push(packet(10), now);
    assert!(jb.is_empty());

    jb.push(packet(11), now);
    jb.push(packet(11), now);
    assert_eq!(jb.len(), 1);
}

#[test]
fn test_wraparound_ordering() {
    let mut jb = JitterBuffer::default();
    let now = Instant::now();
    jb.push(packet(65535), now);
    jb.push(packet(0), now);
    jb.push(packet(1), now);

    assert_eq!(jb.pop(now).unwrap().header.sequence_number, 65535);
    assert_eq!(jb.pop(now).unwrap().header.sequence_number, 0);
    assert_eq!(jb.pop(now).unwrap().header.sequence_number, 1);
}
