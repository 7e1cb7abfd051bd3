use crc::{Crc, CRC_32_ISO_HDLC};

use shared::error::{Error, Result};

use crate::attributes::{Setter, ATTR_FINGERPRINT};
use crate::message::Message;
use crate::{ATTRIBUTE_HEADER_SIZE, MESSAGE_HEADER_SIZE};

/// FINGERPRINT XOR value (RFC 5389 Section 15.5), ASCII "STUN".
pub const FINGERPRINT_XOR_VALUE: u32 = 0x5354_554e;
pub const FINGERPRINT_SIZE: usize = 4;

const ISO_HDLC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

fn fingerprint_value(b: &[u8]) -> u32 {
    ISO_HDLC.checksum(b) ^ FINGERPRINT_XOR_VALUE
}

/// FINGERPRINT attribute. Must be the last attribute of the message; the
/// CRC-32 covers everything before it with the length field adjusted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintAttr;

pub const FINGERPRINT: FingerprintAttr = FingerprintAttr;

impl FingerprintAttr {
    /// Verifies the FINGERPRINT attribute of a decoded message.
    pub fn check(&self, m: &Message) -> Result<()> {
        let attr_value = m.get(ATTR_FINGERPRINT)?;
        if attr_value.len() != FINGERPRINT_SIZE {
            return Err(Error::ErrAttributeSizeInvalid);
        }
        let val = u32::from_be_bytes([attr_value[0], attr_value[1], attr_value[2], attr_value[3]]);
        let offset = m
            .attr_offset(ATTR_FINGERPRINT)
            .ok_or(Error::ErrAttributeNotFound)?;

        let mut prefix = m.raw[..offset].to_vec();
        let adjusted_len = offset - MESSAGE_HEADER_SIZE + ATTRIBUTE_HEADER_SIZE + FINGERPRINT_SIZE;
        prefix[2..4].copy_from_slice(&(adjusted_len as u16).to_be_bytes());

        if fingerprint_value(&prefix) != val {
            return Err(Error::ErrFingerprintMismatch);
        }
        Ok(())
    }
}

impl Setter for FingerprintAttr {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let length = m.length;
        // Adjust the length as if the fingerprint attribute were present.
        m.length += (ATTRIBUTE_HEADER_SIZE + FINGERPRINT_SIZE) as u32;
        m.write_length();
        let val = fingerprint_value(&m.raw);
        m.length = length;
        m.write_length();

        m.add(ATTR_FINGERPRINT, &val.to_be_bytes());
        Ok(())
    }
}
