use super::*;

#[test]
fn test_pair_priority_formula() {
    // G = 2130706431 (controlling), D = 1694498815 (controlled):
    // 2^32 * 1694498815 + 2 * 2130706431 + 1.
    let pair = CandidatePair::new(0, 0, 2130706431, 1694498815, true);
    assert_eq!(pair.priority(), 7277816997797167103);

    // Swapping the role swaps G and D; with the same values the min/max terms
    // are unchanged but the G>D bonus flips.
    let flipped = CandidatePair::new(0, 0, 2130706431, 1694498815, false);
    assert_eq!(flipped.priority(), 7277816997797167102);
}

#[test]
fn test_pair_priority_symmetry() {
    // Both agents must compute the same priority for the same pair seen from
    // opposite roles.
    let controlling = CandidatePair::new(0, 0, 123456, 654321, true);
    let controlled = CandidatePair::new(0, 0, 654321, 123456, false);
    assert_eq!(controlling.priority(), controlled.priority());
}

#[test]
fn test_pair_priority_saturates() {
    let pair = CandidatePair::new(0, 0, u32::MAX, u32::MAX, true);
    assert_eq!(pair.priority(), u64::MAX);
}

#[test]
fn test_pair_initial_state() {
    let pair = CandidatePair::new(0, 0, 1, 2, true);
    assert_eq!(pair.state(), CandidatePairState::Frozen);
    assert!(!pair.nominated());
}
