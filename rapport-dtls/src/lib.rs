#![warn(rust_2018_idioms)]

pub mod alert;
pub mod cipher_suite;
pub mod config;
pub mod crypto;
pub mod curve;
pub mod endpoint;
pub mod flight;
pub mod fragment_buffer;
pub mod handshake;
pub mod prf;
pub mod record;

/// DTLS 1.2 on the wire (RFC 6347 encodes 1.2 as {254, 253}).
pub const PROTOCOL_VERSION: u16 = 0xFEFD;

/// DTLS 1.0, sent in the record layer of the first flights for
/// interoperability.
pub const PROTOCOL_VERSION_1_0: u16 = 0xFEFF;

/// Negotiable SRTP protection profiles (RFC 5764 / RFC 7714).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SrtpProtectionProfile {
    #[default]
    Unsupported = 0x0000,
    Aes128CmHmacSha1_80 = 0x0001,
    AeadAes128Gcm = 0x0007,
}

impl From<u16> for SrtpProtectionProfile {
    fn from(v: u16) -> Self {
        match v {
            0x0001 => SrtpProtectionProfile::Aes128CmHmacSha1_80,
            0x0007 => SrtpProtectionProfile::AeadAes128Gcm,
            _ => SrtpProtectionProfile::Unsupported,
        }
    }
}

/// RFC 5705 exporter label for DTLS-SRTP keying material.
pub const EXTRACTOR_DTLS_SRTP: &str = "EXTRACTOR-dtls_srtp";
