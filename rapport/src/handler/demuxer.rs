use bytes::BytesMut;
use log::debug;

use crate::messages::{DTLSMessageEvent, RTCMessageEvent, RTPMessageEvent, STUNMessageEvent};

/// match_range accepts packets with the first byte in [lower..=upper].
fn match_range(lower: u8, upper: u8, buf: &[u8]) -> bool {
    if buf.is_empty() {
        return false;
    }
    let b = buf[0];
    b >= lower && b <= upper
}

/// MatchFuncs as described in RFC 7983
/// <https://tools.ietf.org/html/rfc7983>
///              +----------------+
///              |        [0..3] -+--> forward to STUN
///              |                |
///              |      [16..19] -+--> forward to ZRTP
///              |                |
///  packet -->  |      [20..63] -+--> forward to DTLS
///              |                |
///              |      [64..79] -+--> forward to TURN Channel
///              |                |
///              |    [128..191] -+--> forward to RTP/RTCP
///              +----------------+
fn match_dtls(b: &[u8]) -> bool {
    match_range(20, 63, b)
}

fn match_channel_data(b: &[u8]) -> bool {
    match_range(64, 79, b)
}

fn match_srtp_or_srtcp(b: &[u8]) -> bool {
    match_range(128, 191, b)
}

/// Whether an RTP-range packet is actually RTCP, judged by the payload type
/// octet (RFC 5761 Section 4).
pub fn is_rtcp(buf: &[u8]) -> bool {
    if buf.len() < 2 {
        return false;
    }
    let pt = buf[1] & 0x7F;
    (64..=95).contains(&pt)
}

/// Classifies one datagram from the shared UDP flow.
pub fn demux(message: BytesMut) -> Option<RTCMessageEvent> {
    if message.is_empty() {
        debug!("drop invalid packet due to zero length");
        None
    } else if match_dtls(&message) {
        Some(RTCMessageEvent::Dtls(DTLSMessageEvent::Raw(message)))
    } else if match_channel_data(&message) {
        Some(RTCMessageEvent::ChannelData(message))
    } else if match_srtp_or_srtcp(&message) {
        Some(RTCMessageEvent::Rtp(RTPMessageEvent::Raw(message)))
    } else if match_range(0, 3, &message) {
        Some(RTCMessageEvent::Stun(STUNMessageEvent::Raw(message)))
    } else {
        debug!("drop unclassifiable packet with first byte {}", message[0]);
        None
    }
}
