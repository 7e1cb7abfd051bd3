use datachannel::data_channel::DataChannelEvent;
use ice::candidate::Candidate;
use ice::connection_state::{ConnectionState, GatheringState};

use crate::media::TrackId;
use crate::peer_connection::state::{RTCPeerConnectionState, RTCSignalingState};

/// Everything a peer connection can tell the application, drained with
/// [`poll_event`](crate::RTCPeerConnection::poll_event). Values are plain
/// data; fan-out to multiple listeners is the embedder's concern.
#[derive(Debug)]
pub enum RTCPeerConnectionEvent {
    /// A local candidate is ready for trickle signaling.
    OnIceCandidate(Candidate),
    OnIceGatheringStateChange(GatheringState),
    OnIceConnectionStateChange(ConnectionState),
    OnConnectionStateChange(RTCPeerConnectionState),
    OnSignalingStateChange(RTCSignalingState),
    /// Renegotiation is required; coalesced per stable-state batch.
    OnNegotiationNeeded,
    /// First packet of a new inbound (mid, rid) track.
    OnTrack { track: TrackId, ssrc: u32 },
    /// One parsed RTP packet for an established track.
    OnTrackRtp {
        track: TrackId,
        packet: rtp::packet::Packet,
    },
    /// Parsed inbound RTCP.
    OnRtcp(Vec<rtcp::Packet>),
    /// The remote side opened a channel via DCEP.
    OnDataChannel { stream_id: u16, label: String },
    /// State/message/buffered-amount event of one channel.
    OnDataChannelEvent {
        stream_id: u16,
        event: DataChannelEvent,
    },
}
