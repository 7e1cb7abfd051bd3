use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

use super::extension::{unmarshal_extensions, Extension};
use super::random::{HandshakeRandom, HANDSHAKE_RANDOM_LENGTH};
use crate::PROTOCOL_VERSION;

/// ClientHello (RFC 6347 Section 4.2.2, with the DTLS cookie field).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub version: u16,
    pub random: HandshakeRandom,
    pub session_id: Vec<u8>,
    pub cookie: Vec<u8>,
    pub cipher_suites: Vec<u16>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl ClientHello {
    pub fn new(random: HandshakeRandom, cipher_suites: Vec<u16>, extensions: Vec<Extension>) -> Self {
        ClientHello {
            version: PROTOCOL_VERSION,
            random,
            session_id: vec![],
            cookie: vec![],
            cipher_suites,
            compression_methods: vec![0],
            extensions,
        }
    }

    pub fn marshal_to(&self, out: &mut BytesMut) {
        out.put_u16(self.version);
        out.extend_from_slice(&self.random.0);
        out.put_u8(self.session_id.len() as u8);
        out.extend_from_slice(&self.session_id);
        out.put_u8(self.cookie.len() as u8);
        out.extend_from_slice(&self.cookie);
        out.put_u16((self.cipher_suites.len() * 2) as u16);
        for suite in &self.cipher_suites {
            out.put_u16(*suite);
        }
        out.put_u8(self.compression_methods.len() as u8);
        out.extend_from_slice(&self.compression_methods);
        super::extension::marshal_extensions(&self.extensions, out);
    }

    pub fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 2 + HANDSHAKE_RANDOM_LENGTH + 2 {
            return Err(Error::ErrBufferShort);
        }
        let version = buf.get_u16();
        let mut random = HandshakeRandom::default();
        buf.copy_to_slice(&mut random.0);

        let session_len = buf.get_u8() as usize;
        if buf.remaining() < session_len {
            return Err(Error::ErrBufferShort);
        }
        let mut session_id = vec![0u8; session_len];
        buf.copy_to_slice(&mut session_id);

        if buf.remaining() < 1 {
            return Err(Error::ErrBufferShort);
        }
        let cookie_len = buf.get_u8() as usize;
        if buf.remaining() < cookie_len {
            return Err(Error::ErrBufferShort);
        }
        let mut cookie = vec![0u8; cookie_len];
        buf.copy_to_slice(&mut cookie);

        if buf.remaining() < 2 {
            return Err(Error::ErrBufferShort);
        }
        let suites_len = buf.get_u16() as usize / 2;
        let mut cipher_suites = Vec::with_capacity(suites_len);
        for _ in 0..suites_len {
            if buf.remaining() < 2 {
                return Err(Error::ErrBufferShort);
            }
            cipher_suites.push(buf.get_u16());
        }

        if buf.remaining() < 1 {
            return Err(Error::ErrBufferShort);
        }
        let compression_len = buf.get_u8() as usize;
        if buf.remaining() < compression_len {
            return Err(Error::ErrBufferShort);
        }
        let mut compression_methods = vec![0u8; compression_len];
        buf.copy_to_slice(&mut compression_methods);

        let extensions = unmarshal_extensions(buf)?;

        Ok(ClientHello {
            version,
            random,
            session_id,
            cookie,
            cipher_suites,
            compression_methods,
            extensions,
        })
    }
}
