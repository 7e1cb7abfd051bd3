use md5::{Digest, Md5};
use ring::hmac;
use subtle::ConstantTimeEq;

use shared::error::{Error, Result};

use crate::attributes::{Setter, ATTR_FINGERPRINT, ATTR_MESSAGE_INTEGRITY};
use crate::message::Message;
use crate::{ATTRIBUTE_HEADER_SIZE, MESSAGE_HEADER_SIZE};

/// HMAC-SHA1 output size.
pub const MESSAGE_INTEGRITY_SIZE: usize = 20;

/// MESSAGE-INTEGRITY attribute (RFC 5389 Section 15.4).
///
/// The HMAC covers the serialized message up to (but not including) the
/// integrity attribute, with the header length field adjusted as if the
/// integrity attribute were already appended.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MessageIntegrity(pub Vec<u8>);

impl MessageIntegrity {
    /// Long-term credential key: MD5(username ":" realm ":" password).
    pub fn new_long_term_integrity(username: &str, realm: &str, password: &str) -> Self {
        let mut h = Md5::new();
        h.update(format!("{username}:{realm}:{password}").as_bytes());
        MessageIntegrity(h.finalize().to_vec())
    }

    /// Short-term credential key: the password itself as UTF-8.
    pub fn new_short_term_integrity(password: String) -> Self {
        MessageIntegrity(password.into_bytes())
    }

    fn hmac_sha1(key: &[u8], message: &[u8]) -> Vec<u8> {
        let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key);
        hmac::sign(&key, message).as_ref().to_vec()
    }

    /// Verifies the MESSAGE-INTEGRITY attribute of a decoded message.
    pub fn check(&self, m: &mut Message) -> Result<()> {
        let attr_value = m.get(ATTR_MESSAGE_INTEGRITY)?;
        let offset = m
            .attr_offset(ATTR_MESSAGE_INTEGRITY)
            .ok_or(Error::ErrAttributeNotFound)?;

        // The HMAC input is the message prefix with the length field patched
        // to cover through the integrity attribute itself.
        let mut prefix = m.raw[..offset].to_vec();
        let adjusted_len =
            offset - MESSAGE_HEADER_SIZE + ATTRIBUTE_HEADER_SIZE + MESSAGE_INTEGRITY_SIZE;
        prefix[2..4].copy_from_slice(&(adjusted_len as u16).to_be_bytes());

        let expected = Self::hmac_sha1(&self.0, &prefix);
        if expected.as_slice().ct_eq(attr_value.as_slice()).unwrap_u8() != 1 {
            return Err(Error::ErrIntegrityMismatch);
        }
        Ok(())
    }
}

impl Setter for MessageIntegrity {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        // FINGERPRINT must remain the last attribute.
        if m.contains(ATTR_FINGERPRINT) {
            return Err(Error::ErrFingerprintBeforeIntegrity);
        }

        let length = m.length;
        // Pretend the integrity attribute is already present for the HMAC.
        m.length += (ATTRIBUTE_HEADER_SIZE + MESSAGE_INTEGRITY_SIZE) as u32;
        m.write_length();
        let v = Self::hmac_sha1(&self.0, &m.raw);
        m.length = length;
        m.write_length();

        m.add(ATTR_MESSAGE_INTEGRITY, &v);
        Ok(())
    }
}
