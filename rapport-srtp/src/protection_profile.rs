/// Negotiated SRTP protection profile (the DTLS use_srtp values).
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ProtectionProfile {
    /// AES-CM with 80-bit HMAC-SHA1 tags (RFC 3711).
    #[default]
    Aes128CmHmacSha1_80 = 0x0001,
    /// AEAD AES-128-GCM (RFC 7714).
    AeadAes128Gcm = 0x0007,
}

impl ProtectionProfile {
    pub fn key_len(&self) -> usize {
        16
    }

    pub fn salt_len(&self) -> usize {
        match self {
            ProtectionProfile::Aes128CmHmacSha1_80 => 14,
            ProtectionProfile::AeadAes128Gcm => 12,
        }
    }

    pub fn auth_key_len(&self) -> usize {
        match self {
            ProtectionProfile::Aes128CmHmacSha1_80 => 20,
            ProtectionProfile::AeadAes128Gcm => 0,
        }
    }

    pub fn auth_tag_len(&self) -> usize {
        match self {
            ProtectionProfile::Aes128CmHmacSha1_80 => 10,
            ProtectionProfile::AeadAes128Gcm => 16,
        }
    }

    /// Bytes of DTLS exported keying material this profile needs:
    /// 2 * (key + salt).
    pub fn keying_material_len(&self) -> usize {
        2 * (self.key_len() + self.salt_len())
    }
}
