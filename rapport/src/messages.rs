use bytes::BytesMut;

/// What the demuxer decided a datagram is, before the protocol layers parse
/// it.
#[derive(Debug)]
pub enum STUNMessageEvent {
    Raw(BytesMut),
    Stun(stun::message::Message),
}

#[derive(Debug)]
pub enum DTLSMessageEvent {
    Raw(BytesMut),
}

#[derive(Debug)]
pub enum RTPMessageEvent {
    Raw(BytesMut),
    Rtp(rtp::packet::Packet),
    Rtcp(Vec<rtcp::Packet>),
}

/// The first-byte classification of one inbound datagram (RFC 7983).
#[derive(Debug)]
pub enum RTCMessageEvent {
    Raw(BytesMut),
    Stun(STUNMessageEvent),
    Dtls(DTLSMessageEvent),
    /// TURN ChannelData framing from a relay.
    ChannelData(BytesMut),
    Rtp(RTPMessageEvent),
}
