use std::fmt;

/// Which media kind a transceiver carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RTCRtpTransceiverKind {
    Audio,
    Video,
}

impl fmt::Display for RTCRtpTransceiverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RTCRtpTransceiverKind::Audio => write!(f, "audio"),
            RTCRtpTransceiverKind::Video => write!(f, "video"),
        }
    }
}

/// Transceiver direction (RFC 8829 Section 5.3).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RTCRtpTransceiverDirection {
    #[default]
    Sendrecv,
    Sendonly,
    Recvonly,
    Inactive,
}

impl RTCRtpTransceiverDirection {
    /// The direction the answerer uses to mirror an offer.
    pub fn reverse(self) -> Self {
        match self {
            RTCRtpTransceiverDirection::Sendonly => RTCRtpTransceiverDirection::Recvonly,
            RTCRtpTransceiverDirection::Recvonly => RTCRtpTransceiverDirection::Sendonly,
            other => other,
        }
    }
}

impl fmt::Display for RTCRtpTransceiverDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RTCRtpTransceiverDirection::Sendrecv => "sendrecv",
            RTCRtpTransceiverDirection::Sendonly => "sendonly",
            RTCRtpTransceiverDirection::Recvonly => "recvonly",
            RTCRtpTransceiverDirection::Inactive => "inactive",
        };
        write!(f, "{s}")
    }
}

impl From<&str> for RTCRtpTransceiverDirection {
    fn from(raw: &str) -> Self {
        match raw {
            "sendonly" => RTCRtpTransceiverDirection::Sendonly,
            "recvonly" => RTCRtpTransceiverDirection::Recvonly,
            "inactive" => RTCRtpTransceiverDirection::Inactive,
            _ => RTCRtpTransceiverDirection::Sendrecv,
        }
    }
}

/// One m-section worth of media state. The mid is assigned by the first
/// successful offer/answer and never changes afterwards.
#[derive(Debug, Clone)]
pub struct RTCRtpTransceiver {
    pub(crate) mid: Option<String>,
    pub kind: RTCRtpTransceiverKind,
    pub direction: RTCRtpTransceiverDirection,
    pub current_direction: Option<RTCRtpTransceiverDirection>,
    /// SSRC this side sends with.
    pub sender_ssrc: u32,
    /// Simulcast layers offered for receiving, by rid.
    pub recv_rids: Vec<String>,
    pub stopped: bool,
}

impl RTCRtpTransceiver {
    pub fn new(kind: RTCRtpTransceiverKind, direction: RTCRtpTransceiverDirection) -> Self {
        RTCRtpTransceiver {
            mid: None,
            kind,
            direction,
            current_direction: None,
            sender_ssrc: rand::random::<u32>(),
            recv_rids: vec![],
            stopped: false,
        }
    }

    pub fn mid(&self) -> Option<&str> {
        self.mid.as_deref()
    }

    pub(crate) fn set_mid(&mut self, mid: String) -> bool {
        match &self.mid {
            Some(existing) => *existing == mid,
            None => {
                self.mid = Some(mid);
                true
            }
        }
    }

    pub fn stop(&mut self) {
        self.stopped = true;
        self.direction = RTCRtpTransceiverDirection::Inactive;
    }
}
