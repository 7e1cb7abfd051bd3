use super::*;

const CANONICAL: &str = "v=0\r\n\
o=- 123456789 2 IN IP4 0.0.0.0\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0 1\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:0\r\n\
a=ice-ufrag:b7l3\r\n\
a=ice-pwd:Q5sJxyeehJqhiXrrvhV6Pnmb\r\n\
a=fingerprint:sha-256 AA:BB:CC:DD:EE:FF:00:11:22:33:44:55:66:77:88:99:AA:BB:CC:DD:EE:FF:00:11:22:33:44:55:66:77:88:99\r\n\
a=setup:actpass\r\n\
a=rtcp-mux\r\n\
a=sendrecv\r\n\
a=rtpmap:111 opus/48000/2\r\n\
m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:1\r\n\
a=sctp-port:5000\r\n\
a=max-message-size:65536\r\n";

#[test]
fn test_parse_canonical_offer() {
    let sd = SessionDescription::unmarshal(CANONICAL).unwrap();
    assert_eq!(sd.origin.session_id, 123456789);
    assert_eq!(sd.media_descriptions.len(), 2);
    assert_eq!(sd.bundle_group(), vec!["0", "1"]);

    let audio = &sd.media_descriptions[0];
    assert_eq!(audio.media, "audio");
    assert_eq!(audio.protos, vec!["UDP", "TLS", "RTP", "SAVPF"]);
    assert_eq!(audio.formats, vec!["111"]);
    assert_eq!(audio.mid(), Some("0"));
    assert_eq!(audio.attribute("ice-ufrag").flatten(), Some("b7l3"));
    assert_eq!(audio.attribute("rtcp-mux"), Some(None));

    let app = &sd.media_descriptions[1];
    assert_eq!(app.media, "application");
    assert_eq!(app.formats, vec!["webrtc-datachannel"]);
    assert_eq!(app.attribute("sctp-port").flatten(), Some("5000"));
}

#[test]
fn test_marshal_round_trip_preserves_order() {
    let sd = SessionDescription::unmarshal(CANONICAL).unwrap();
    assert_eq!(sd.marshal(), CANONICAL);
}

#[test]
fn test_lenient_on_lf_only_input() {
    let lf_only = CANONICAL.replace("\r\n", "\n");
    let sd = SessionDescription::unmarshal(&lf_only).unwrap();
    assert_eq!(sd.media_descriptions.len(), 2);
    // Output is always CRLF.
    assert_eq!(sd.marshal(), CANONICAL);
}

#[test]
fn test_repeated_attributes_kept_in_order() {
    let raw = "v=0\r\no=- 1 2 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96 97\r\n\
a=candidate:1 1 udp 2130706431 192.168.1.100 31102 typ host\r\n\
a=candidate:2 1 udp 1694498815 203.0.113.50 54321 typ srflx\r\n\
a=rid:hi send\r\n\
a=rid:lo send\r\n";
    let sd = SessionDescription::unmarshal(raw).unwrap();
    let video = &sd.media_descriptions[0];
    let candidates = video.attributes_of("candidate");
    assert_eq!(candidates.len(), 2);
    assert!(candidates[0].starts_with("1 1 udp"));
    assert_eq!(video.attributes_of("rid"), vec!["hi send", "lo send"]);
}

#[test]
fn test_invalid_input_rejected() {
    assert!(SessionDescription::unmarshal("v=1\r\n").is_err());
    assert!(SessionDescription::unmarshal("nonsense\r\n").is_err());
    assert!(SessionDescription::unmarshal("v=0\r\no=not enough fields\r\n").is_err());
}

#[test]
fn test_build_and_render() {
    let mut sd = SessionDescription {
        origin: Origin {
            session_id: 42,
            session_version: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    sd.attributes
        .push(Attribute::new("group", Some("BUNDLE 0".to_owned())));
    sd.media_descriptions.push(
        MediaDescription::new(
            "application",
            vec!["UDP", "DTLS", "SCTP"],
            vec!["webrtc-datachannel".to_owned()],
        )
        .with_attribute("mid", Some("0".to_owned()))
        .with_attribute("sctp-port", Some("5000".to_owned())),
    );

    let rendered = sd.marshal();
    assert!(rendered.contains("m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n"));
    let parsed = SessionDescription::unmarshal(&rendered).unwrap();
    assert_eq!(parsed.bundle_group(), vec!["0"]);
    assert_eq!(parsed.media_descriptions[0].mid(), Some("0"));
}
