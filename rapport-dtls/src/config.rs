use std::time::Duration;

use crate::crypto::DtlsIdentity;
use crate::SrtpProtectionProfile;

/// Which side of the handshake this endpoint plays. In WebRTC the role
/// comes from the SDP `a=setup` negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtlsRole {
    Client,
    Server,
}

/// Endpoint configuration.
pub struct Config {
    pub role: DtlsRole,
    pub identity: DtlsIdentity,
    /// SRTP profiles offered (client) or accepted (server), in preference
    /// order.
    pub srtp_profiles: Vec<SrtpProtectionProfile>,
    /// Expected SHA-256 fingerprint of the peer certificate, colon-hex, as
    /// signaled in SDP. Verified against the peer's Certificate message;
    /// a mismatch is fatal.
    pub remote_fingerprint: Option<String>,
    /// Initial flight retransmission timeout; doubles up to `max_rto`.
    pub initial_rto: Duration,
    pub max_rto: Duration,
    /// Retransmissions per flight before the handshake fails.
    pub max_retransmits: u8,
}

impl Config {
    pub fn new(role: DtlsRole, identity: DtlsIdentity) -> Self {
        Config {
            role,
            identity,
            srtp_profiles: vec![
                SrtpProtectionProfile::AeadAes128Gcm,
                SrtpProtectionProfile::Aes128CmHmacSha1_80,
            ],
            remote_fingerprint: None,
            initial_rto: Duration::from_secs(1),
            max_rto: Duration::from_secs(60),
            max_retransmits: 6,
        }
    }
}
