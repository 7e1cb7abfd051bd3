use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

pub const HANDSHAKE_RANDOM_LENGTH: usize = 32;

/// The 32-byte hello random: 4 bytes of gmt_unix_time plus 28 random bytes
/// (RFC 5246 Section 7.4.1.2).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HandshakeRandom(pub [u8; HANDSHAKE_RANDOM_LENGTH]);

impl HandshakeRandom {
    pub fn generate() -> Self {
        let mut bytes = [0u8; HANDSHAKE_RANDOM_LENGTH];
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        rand::thread_rng().fill(&mut bytes[4..]);
        HandshakeRandom(bytes)
    }
}
