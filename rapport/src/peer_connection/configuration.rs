use std::collections::HashMap;
use std::net::SocketAddr;

use super::certificate::RTCCertificate;
use super::policy::{RTCBundlePolicy, RTCIceTransportPolicy};

/// One STUN/TURN server entry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RTCIceServer {
    /// `stun:`/`turn:` URLs; resolved addresses may be supplied alongside
    /// since the sans-IO core does not do DNS.
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
    /// Pre-resolved server addresses matching `urls`.
    pub resolved: Vec<SocketAddr>,
}

/// An RTP codec entry of the static configuration. Dynamic payload types
/// are assigned from 96 in configuration order when unset.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RTCRtpCodecParameters {
    /// e.g. "audio/opus", "video/VP8", "video/H264".
    pub mime_type: String,
    pub clock_rate: u32,
    pub channels: u16,
    pub payload_type: u8,
    /// e.g. ["nack", "nack pli", "goog-remb", "transport-cc"].
    pub rtcp_feedback: Vec<String>,
    /// fmtp parameters.
    pub parameters: HashMap<String, String>,
}

/// Which AEAD backend the SRTP layer should prefer. The default is resolved
/// by the embedder (typically from an environment variable) and passed in;
/// the core holds no process-wide selector.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CryptoBackend {
    /// Use a platform-native AES-GCM when one is linked in.
    #[default]
    NativeIfAvailable,
    /// Always the pure-Rust implementation.
    Rust,
}

/// Static configuration of a peer connection.
#[derive(Default, Clone)]
pub struct RTCConfiguration {
    pub ice_servers: Vec<RTCIceServer>,
    pub ice_transport_policy: RTCIceTransportPolicy,
    pub bundle_policy: RTCBundlePolicy,
    pub audio_codecs: Vec<RTCRtpCodecParameters>,
    pub video_codecs: Vec<RTCRtpCodecParameters>,
    /// User-provided DTLS identity; generated when absent.
    pub certificate: Option<RTCCertificate>,
    pub crypto_backend: CryptoBackend,
}

impl RTCConfiguration {
    /// The default codec set: Opus, VP8, H.264 and RED, in that order.
    pub fn with_default_codecs(mut self) -> Self {
        self.audio_codecs = vec![RTCRtpCodecParameters {
            mime_type: "audio/opus".to_owned(),
            clock_rate: 48000,
            channels: 2,
            ..Default::default()
        }];
        self.video_codecs = vec![
            RTCRtpCodecParameters {
                mime_type: "video/VP8".to_owned(),
                clock_rate: 90000,
                rtcp_feedback: vec![
                    "nack".to_owned(),
                    "nack pli".to_owned(),
                    "transport-cc".to_owned(),
                ],
                ..Default::default()
            },
            RTCRtpCodecParameters {
                mime_type: "video/H264".to_owned(),
                clock_rate: 90000,
                rtcp_feedback: vec!["nack".to_owned(), "nack pli".to_owned()],
                ..Default::default()
            },
            RTCRtpCodecParameters {
                mime_type: "video/red".to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
        ];
        self
    }

    /// Assigns dynamic payload types starting at 96, keeping configured
    /// explicit values and avoiding conflicts.
    pub fn assign_payload_types(&mut self) {
        let mut used: Vec<u8> = self
            .audio_codecs
            .iter()
            .chain(self.video_codecs.iter())
            .map(|c| c.payload_type)
            .filter(|pt| *pt != 0)
            .collect();
        let mut next = 96u8;
        for codec in self.audio_codecs.iter_mut().chain(self.video_codecs.iter_mut()) {
            if codec.payload_type != 0 {
                continue;
            }
            while used.contains(&next) {
                next += 1;
            }
            codec.payload_type = next;
            used.push(next);
            next += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_type_assignment_is_deterministic() {
        let mut config = RTCConfiguration::default().with_default_codecs();
        config.assign_payload_types();
        assert_eq!(config.audio_codecs[0].payload_type, 96);
        assert_eq!(config.video_codecs[0].payload_type, 97);
        assert_eq!(config.video_codecs[1].payload_type, 98);
        assert_eq!(config.video_codecs[2].payload_type, 99);
    }

    #[test]
    fn test_explicit_payload_types_kept_and_avoided() {
        let mut config = RTCConfiguration::default().with_default_codecs();
        config.video_codecs[0].payload_type = 96;
        config.assign_payload_types();
        assert_eq!(config.video_codecs[0].payload_type, 96);
        assert_eq!(config.audio_codecs[0].payload_type, 97);
        assert_eq!(config.video_codecs[1].payload_type, 98);
    }
}
