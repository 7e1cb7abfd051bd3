use super::*;

struct Case {
    name: &'static str,
    window_size: usize,
    max_seq: u64,
    input: &'static [u64],
    valid: &'static [bool],
    expected: &'static [u64],
}

#[test]
fn test_replay_detector() {
    const LARGE_SEQ: u64 = 0x100000000000u64;
    let cases = vec![
        Case {
            name: "in order",
            window_size: 16,
            max_seq: (1 << 48) - 1,
            input: &[0, 1, 2, 3, 4, 5],
            valid: &[true, true, true, true, true, true],
            expected: &[0, 1, 2, 3, 4, 5],
        },
        Case {
            name: "out of order within window accepted exactly once",
            window_size: 64,
            max_seq: (1 << 48) - 1,
            input: &[10, 8, 9, 10, 8, 11],
            valid: &[true, true, true, true, true, true],
            expected: &[10, 8, 9, 11],
        },
        Case {
            name: "stale packets outside the window rejected",
            window_size: 8,
            max_seq: (1 << 48) - 1,
            input: &[100, 90, 99, 101],
            valid: &[true, true, true, true],
            expected: &[100, 99, 101],
        },
        Case {
            name: "out of range sequence rejected",
            window_size: 16,
            max_seq: 100,
            input: &[1, 200, 2],
            valid: &[true, true, true],
            expected: &[1, 2],
        },
        Case {
            name: "large jump",
            window_size: 128,
            max_seq: (1 << 48) - 1,
            input: &[0, 1, LARGE_SEQ, LARGE_SEQ + 1, LARGE_SEQ - 1],
            valid: &[true, true, true, true, true],
            expected: &[0, 1, LARGE_SEQ, LARGE_SEQ + 1, LARGE_SEQ - 1],
        },
    ];

    for c in cases {
        let mut detector = SlidingWindowDetector::new(c.window_size, c.max_seq);
        let mut accepted = Vec::new();
        for (seq, _valid) in c.input.iter().zip(c.valid.iter()) {
            if detector.check(*seq) {
                detector.accept();
                accepted.push(*seq);
            }
        }
        assert_eq!(accepted, c.expected, "{}", c.name);
    }
}

#[test]
fn test_replay_window_boundary() {
    // With the SRTP window of 128, indices at or below highest-128 are stale.
    let mut detector = SlidingWindowDetector::new(128, (1 << 48) - 1);
    assert!(detector.check(1000));
    detector.accept();

    assert!(!detector.check(1000 - 128), "index at window edge must be stale");
    assert!(detector.check(1000 - 127), "index just inside window accepted");
    detector.accept();
    assert!(!detector.check(1000 - 127), "duplicate within window rejected");
}
