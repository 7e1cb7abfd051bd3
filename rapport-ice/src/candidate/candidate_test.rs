use super::*;

#[test]
fn test_candidate_parse_host_with_extensions() {
    let raw = "6815297761 1 udp 2130706431 192.168.1.100 31102 typ host generation 0 ufrag b7l3";
    let c = unmarshal_candidate(raw).unwrap();

    assert_eq!(c.foundation(), "6815297761");
    assert_eq!(c.component(), 1);
    assert_eq!(c.transport(), "udp");
    assert_eq!(c.priority(), 2130706431);
    assert_eq!(c.address(), "192.168.1.100");
    assert_eq!(c.port(), 31102);
    assert_eq!(c.candidate_type(), CandidateType::Host);
    assert_eq!(c.generation(), 0);
    assert_eq!(c.ufrag(), "b7l3");

    // Round trip must reproduce the identical string.
    assert_eq!(c.marshal(), raw);
}

#[test]
fn test_candidate_parse_with_prefix() {
    let raw = "candidate:6815297761 1 udp 2130706431 192.168.1.100 31102 typ host generation 0";
    let c = unmarshal_candidate(raw).unwrap();
    assert_eq!(c.candidate_type(), CandidateType::Host);
}

#[test]
fn test_candidate_parse_server_reflexive() {
    let raw =
        "1 1 udp 1694498815 203.0.113.50 54321 typ srflx raddr 192.168.1.100 rport 31102 generation 0";
    let c = unmarshal_candidate(raw).unwrap();
    assert_eq!(c.candidate_type(), CandidateType::ServerReflexive);
    let related = c.related_address().unwrap();
    assert_eq!(related.address, "192.168.1.100");
    assert_eq!(related.port, 31102);
    assert_eq!(c.marshal(), raw);
}

#[test]
fn test_candidate_parse_errors() {
    assert!(unmarshal_candidate("1 1 udp").is_err());
    assert!(unmarshal_candidate("1 x udp 1 1.2.3.4 5 typ host").is_err());
    assert!(unmarshal_candidate("1 1 udp 1 1.2.3.4 5 nottyp host").is_err());
    assert!(unmarshal_candidate("1 1 udp 1 1.2.3.4 5 typ wat").is_err());
}

#[test]
fn test_type_preference_ordering() {
    // host=126, prflx=110, srflx=100, relay=0.
    assert_eq!(CandidateType::Host.preference(), 126);
    assert_eq!(CandidateType::PeerReflexive.preference(), 110);
    assert_eq!(CandidateType::ServerReflexive.preference(), 100);
    assert_eq!(CandidateType::Relay.preference(), 0);
}

#[test]
fn test_priority_top_octet_by_type() {
    for (typ, top) in [
        (CandidateType::Host, 126u32),
        (CandidateType::ServerReflexive, 100),
        (CandidateType::Relay, 0),
    ] {
        let p = compute_priority(typ, DEFAULT_LOCAL_PREFERENCE, 1);
        assert_eq!(p >> 24, top, "{typ}");
    }

    // Given fixed local preference, priority is monotone by type preference.
    let host = compute_priority(CandidateType::Host, 1000, 1);
    let prflx = compute_priority(CandidateType::PeerReflexive, 1000, 1);
    let srflx = compute_priority(CandidateType::ServerReflexive, 1000, 1);
    let relay = compute_priority(CandidateType::Relay, 1000, 1);
    assert!(host > prflx && prflx > srflx && srflx > relay);
}

#[test]
fn test_host_candidate_priority_value() {
    // 126 << 24 | 65535 << 8 | 255 = 2130706431, the familiar host value.
    assert_eq!(
        compute_priority(CandidateType::Host, DEFAULT_LOCAL_PREFERENCE, 1),
        2130706431
    );
}

#[test]
fn test_new_candidate_defaults() {
    let c = CandidateConfig {
        address: "10.0.0.1".to_owned(),
        port: 5000,
        typ: CandidateType::Host,
        ..Default::default()
    }
    .new_candidate()
    .unwrap();

    assert_eq!(c.transport(), "udp");
    assert_eq!(c.component(), COMPONENT_RTP);
    assert_eq!(c.priority(), 2130706431);
    assert!(!c.foundation().is_empty());

    // Same type/base/transport produces the same foundation.
    let c2 = CandidateConfig {
        address: "10.0.0.1".to_owned(),
        port: 6000,
        typ: CandidateType::Host,
        ..Default::default()
    }
    .new_candidate()
    .unwrap();
    assert_eq!(c.foundation(), c2.foundation());
}
