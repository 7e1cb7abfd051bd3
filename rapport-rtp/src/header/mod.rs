#[cfg(test)]
mod header_test;

use bytes::{Buf, BufMut};
use shared::error::{Error, Result};
use shared::marshal::{Marshal, MarshalSize, Unmarshal};

pub const HEADER_LENGTH: usize = 4;
pub const VERSION_SHIFT: u8 = 6;
pub const VERSION_MASK: u8 = 0x3;
pub const PADDING_SHIFT: u8 = 5;
pub const PADDING_MASK: u8 = 0x1;
pub const EXTENSION_SHIFT: u8 = 4;
pub const EXTENSION_MASK: u8 = 0x1;
pub const EXTENSION_PROFILE_ONE_BYTE: u16 = 0xBEDE;
pub const EXTENSION_PROFILE_TWO_BYTE: u16 = 0x1000;
pub const EXTENSION_ID_RESERVED: u8 = 0xF;
pub const CC_MASK: u8 = 0xF;
pub const MARKER_SHIFT: u8 = 7;
pub const MARKER_MASK: u8 = 0x1;
pub const PT_MASK: u8 = 0x7F;
pub const SEQ_NUM_OFFSET: usize = 2;
pub const TIMESTAMP_OFFSET: usize = 4;
pub const SSRC_OFFSET: usize = 8;
pub const CSRC_OFFSET: usize = 12;
pub const CSRC_LENGTH: usize = 4;

/// One RFC 8285 header extension element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extension {
    pub id: u8,
    pub payload: Vec<u8>,
}

/// An RTP header (RFC 3550 Section 5.1) with RFC 8285 extensions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    pub extension_profile: u16,
    pub extensions: Vec<Extension>,
}

impl Unmarshal for Header {
    /// Parses an RTP header, leaving `raw_packet` positioned at the payload.
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let raw_packet_len = raw_packet.remaining();
        if raw_packet_len < CSRC_OFFSET {
            return Err(Error::ErrHeaderSizeInsufficient);
        }

        let b0 = raw_packet.get_u8();
        let version = b0 >> VERSION_SHIFT & VERSION_MASK;
        let padding = (b0 >> PADDING_SHIFT & PADDING_MASK) > 0;
        let extension = (b0 >> EXTENSION_SHIFT & EXTENSION_MASK) > 0;
        let cc = (b0 & CC_MASK) as usize;

        let b1 = raw_packet.get_u8();
        let marker = (b1 >> MARKER_SHIFT & MARKER_MASK) > 0;
        let payload_type = b1 & PT_MASK;

        let sequence_number = raw_packet.get_u16();
        let timestamp = raw_packet.get_u32();
        let ssrc = raw_packet.get_u32();

        if raw_packet_len < CSRC_OFFSET + cc * CSRC_LENGTH {
            return Err(Error::ErrHeaderSizeInsufficient);
        }
        let mut csrc = Vec::with_capacity(cc);
        for _ in 0..cc {
            csrc.push(raw_packet.get_u32());
        }

        let (extension_profile, extensions) = if extension {
            if raw_packet.remaining() < 4 {
                return Err(Error::ErrHeaderSizeInsufficientForExtension);
            }
            let extension_profile = raw_packet.get_u16();
            let extension_length = raw_packet.get_u16() as usize * 4;
            if raw_packet.remaining() < extension_length {
                return Err(Error::ErrHeaderSizeInsufficientForExtension);
            }

            let mut extensions = vec![];
            match extension_profile {
                // RFC 8285 one-byte extensions.
                EXTENSION_PROFILE_ONE_BYTE => {
                    let mut remaining = extension_length;
                    while remaining > 0 {
                        let b = raw_packet.get_u8();
                        remaining -= 1;
                        if b == 0x00 {
                            // padding
                            continue;
                        }
                        let id = b >> 4;
                        let len = (b as usize & !0xF0) + 1;
                        if id == EXTENSION_ID_RESERVED {
                            break;
                        }
                        if remaining < len {
                            return Err(Error::ErrHeaderSizeInsufficientForExtension);
                        }
                        let mut payload = vec![0u8; len];
                        raw_packet.copy_to_slice(&mut payload);
                        remaining -= len;
                        extensions.push(Extension { id, payload });
                    }
                }
                // RFC 8285 two-byte extensions.
                EXTENSION_PROFILE_TWO_BYTE => {
                    let mut remaining = extension_length;
                    while remaining > 1 {
                        let id = raw_packet.get_u8();
                        remaining -= 1;
                        if id == 0x00 {
                            continue;
                        }
                        let len = raw_packet.get_u8() as usize;
                        remaining -= 1;
                        if remaining < len {
                            return Err(Error::ErrHeaderSizeInsufficientForExtension);
                        }
                        let mut payload = vec![0u8; len];
                        raw_packet.copy_to_slice(&mut payload);
                        remaining -= len;
                        extensions.push(Extension { id, payload });
                    }
                }
                // RFC 3550 Section 5.3.1: one opaque extension, id 0.
                _ => {
                    let mut payload = vec![0u8; extension_length];
                    raw_packet.copy_to_slice(&mut payload);
                    extensions.push(Extension { id: 0, payload });
                }
            };

            (extension_profile, extensions)
        } else {
            (0, vec![])
        };

        Ok(Header {
            version,
            padding,
            extension,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc,
            extension_profile,
            extensions,
        })
    }
}

impl MarshalSize for Header {
    fn marshal_size(&self) -> usize {
        let mut head_size = 12 + (self.csrc.len() * CSRC_LENGTH);
        if self.extension {
            let extension_payload_len = self.get_extension_payload_len();
            let extension_payload_size = (extension_payload_len + 3) / 4;
            head_size += 4 + extension_payload_size * 4;
        }
        head_size
    }
}

impl Marshal for Header {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        let size = self.marshal_size();
        if size > buf.len() {
            return Err(Error::ErrBufferTooSmall);
        }

        let mut b0 = (self.version << VERSION_SHIFT) | self.csrc.len() as u8;
        if self.padding {
            b0 |= 1 << PADDING_SHIFT;
        }
        if self.extension {
            b0 |= 1 << EXTENSION_SHIFT;
        }
        buf.put_u8(b0);

        let mut b1 = self.payload_type;
        if self.marker {
            b1 |= 1 << MARKER_SHIFT;
        }
        buf.put_u8(b1);

        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        for csrc in &self.csrc {
            buf.put_u32(*csrc);
        }

        if self.extension {
            buf.put_u16(self.extension_profile);
            let extension_payload_len = self.get_extension_payload_len();
            if self.extension_profile != EXTENSION_PROFILE_ONE_BYTE
                && self.extension_profile != EXTENSION_PROFILE_TWO_BYTE
                && extension_payload_len % 4 != 0
            {
                return Err(Error::ErrRfc3550HeaderIdRange);
            }
            let extension_payload_size = (extension_payload_len as u16 + 3) / 4;
            buf.put_u16(extension_payload_size);

            match self.extension_profile {
                EXTENSION_PROFILE_ONE_BYTE => {
                    for extension in &self.extensions {
                        buf.put_u8((extension.id << 4) | (extension.payload.len() as u8 - 1));
                        buf.put_slice(&extension.payload);
                    }
                }
                EXTENSION_PROFILE_TWO_BYTE => {
                    for extension in &self.extensions {
                        buf.put_u8(extension.id);
                        buf.put_u8(extension.payload.len() as u8);
                        buf.put_slice(&extension.payload);
                    }
                }
                _ => {
                    for extension in &self.extensions {
                        buf.put_slice(&extension.payload);
                    }
                }
            };

            // Pad the extension block out to a word boundary.
            for _ in extension_payload_len..extension_payload_size as usize * 4 {
                buf.put_u8(0);
            }
        }

        Ok(size)
    }
}

impl Header {
    fn get_extension_payload_len(&self) -> usize {
        let payload_len: usize = self
            .extensions
            .iter()
            .map(|extension| extension.payload.len())
            .sum();
        let profile_len = match self.extension_profile {
            EXTENSION_PROFILE_ONE_BYTE => self.extensions.len(),
            EXTENSION_PROFILE_TWO_BYTE => self.extensions.len() * 2,
            _ => 0,
        };
        payload_len + profile_len
    }

    /// Sets an RFC 8285 extension, choosing the one-byte profile when none
    /// is set yet.
    pub fn set_extension(&mut self, id: u8, payload: Vec<u8>) -> Result<()> {
        if self.extension {
            match self.extension_profile {
                EXTENSION_PROFILE_ONE_BYTE => {
                    if !(1..=14).contains(&id) {
                        return Err(Error::ErrRfc8285OneByteHeaderIdRange);
                    }
                    if payload.len() > 16 {
                        return Err(Error::ErrRfc8285OneByteHeaderSize);
                    }
                }
                EXTENSION_PROFILE_TWO_BYTE => {
                    if id < 1 {
                        return Err(Error::ErrRfc8285TwoByteHeaderIdRange);
                    }
                    if payload.len() > 255 {
                        return Err(Error::ErrRfc8285TwoByteHeaderSize);
                    }
                }
                _ => {
                    if id != 0 {
                        return Err(Error::ErrRfc3550HeaderIdRange);
                    }
                }
            };

            if let Some(extension) = self.extensions.iter_mut().find(|e| e.id == id) {
                extension.payload = payload;
            } else {
                self.extensions.push(Extension { id, payload });
            }
            return Ok(());
        }

        self.extension = true;
        self.extension_profile = EXTENSION_PROFILE_ONE_BYTE;
        if !(1..=14).contains(&id) {
            return Err(Error::ErrRfc8285OneByteHeaderIdRange);
        }
        if payload.len() > 16 {
            return Err(Error::ErrRfc8285OneByteHeaderSize);
        }
        self.extensions.push(Extension { id, payload });
        Ok(())
    }

    pub fn get_extension(&self, id: u8) -> Option<&[u8]> {
        if !self.extension {
            return None;
        }
        self.extensions
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.payload.as_slice())
    }

    pub fn del_extension(&mut self, id: u8) -> Result<()> {
        if !self.extension {
            return Err(Error::ErrHeaderExtensionsNotEnabled);
        }
        let index = self
            .extensions
            .iter()
            .position(|e| e.id == id)
            .ok_or(Error::ErrHeaderExtensionNotFound)?;
        self.extensions.remove(index);
        Ok(())
    }
}
