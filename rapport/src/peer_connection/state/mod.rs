
use std::fmt;

use shared::error::{Error, Result};

use super::sdp_type::RTCSdpType;

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum StateChangeOp {
    #[default]
    SetLocal,
    SetRemote,
}

/// Indicates the state of the SDP offer/answer negotiation (RFC 3264 via
/// the W3C signaling state machine).
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCSignalingState {
    /// No exchange in progress; descriptions are absent or agreed.
    #[default]
    Stable,
    /// A local offer was applied.
    HaveLocalOffer,
    /// A remote offer was applied.
    HaveRemoteOffer,
    /// A local provisional answer was applied.
    HaveLocalPranswer,
    /// A remote provisional answer was applied.
    HaveRemotePranswer,
    /// The connection was closed.
    Closed,
}

impl fmt::Display for RTCSignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCSignalingState::Stable => "stable",
            RTCSignalingState::HaveLocalOffer => "have-local-offer",
            RTCSignalingState::HaveRemoteOffer => "have-remote-offer",
            RTCSignalingState::HaveLocalPranswer => "have-local-pranswer",
            RTCSignalingState::HaveRemotePranswer => "have-remote-pranswer",
            RTCSignalingState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Computes the next signaling state for a description application,
/// rejecting illegal transitions (W3C webrtc-pc Section 4.3.1).
pub(crate) fn check_next_signaling_state(
    current: RTCSignalingState,
    op: StateChangeOp,
    sdp_type: RTCSdpType,
) -> Result<RTCSignalingState> {
    use RTCSignalingState::*;

    // Rollback is only possible from a non-stable offer state.
    if sdp_type == RTCSdpType::Rollback {
        return match current {
            HaveLocalOffer | HaveRemoteOffer | HaveLocalPranswer | HaveRemotePranswer => Ok(Stable),
            _ => Err(Error::ErrIncorrectSignalingState),
        };
    }

    match (current, op, sdp_type) {
        (Stable, StateChangeOp::SetLocal, RTCSdpType::Offer) => Ok(HaveLocalOffer),
        (Stable, StateChangeOp::SetRemote, RTCSdpType::Offer) => Ok(HaveRemoteOffer),

        (HaveLocalOffer, StateChangeOp::SetRemote, RTCSdpType::Answer) => Ok(Stable),
        (HaveLocalOffer, StateChangeOp::SetRemote, RTCSdpType::Pranswer) => Ok(HaveRemotePranswer),
        (HaveRemotePranswer, StateChangeOp::SetRemote, RTCSdpType::Answer) => Ok(Stable),
        (HaveRemotePranswer, StateChangeOp::SetRemote, RTCSdpType::Pranswer) => {
            Ok(HaveRemotePranswer)
        }

        (HaveRemoteOffer, StateChangeOp::SetLocal, RTCSdpType::Answer) => Ok(Stable),
        (HaveRemoteOffer, StateChangeOp::SetLocal, RTCSdpType::Pranswer) => Ok(HaveLocalPranswer),
        (HaveLocalPranswer, StateChangeOp::SetLocal, RTCSdpType::Answer) => Ok(Stable),
        (HaveLocalPranswer, StateChangeOp::SetLocal, RTCSdpType::Pranswer) => Ok(HaveLocalPranswer),

        // Re-applying the same offer is allowed.
        (HaveLocalOffer, StateChangeOp::SetLocal, RTCSdpType::Offer) => Ok(HaveLocalOffer),
        (HaveRemoteOffer, StateChangeOp::SetRemote, RTCSdpType::Offer) => Ok(HaveRemoteOffer),

        _ => Err(Error::ErrIncorrectSignalingState),
    }
}

/// Overall peer connection state, the aggregate of ICE and DTLS.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCPeerConnectionState {
    #[default]
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl fmt::Display for RTCPeerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCPeerConnectionState::New => "new",
            RTCPeerConnectionState::Connecting => "connecting",
            RTCPeerConnectionState::Connected => "connected",
            RTCPeerConnectionState::Disconnected => "disconnected",
            RTCPeerConnectionState::Failed => "failed",
            RTCPeerConnectionState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}
