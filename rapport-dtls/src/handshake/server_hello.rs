use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

use super::extension::{unmarshal_extensions, Extension};
use super::random::{HandshakeRandom, HANDSHAKE_RANDOM_LENGTH};
use crate::PROTOCOL_VERSION;

/// ServerHello (RFC 5246 Section 7.4.1.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub version: u16,
    pub random: HandshakeRandom,
    pub session_id: Vec<u8>,
    pub cipher_suite: u16,
    pub compression_method: u8,
    pub extensions: Vec<Extension>,
}

impl ServerHello {
    pub fn new(random: HandshakeRandom, cipher_suite: u16, extensions: Vec<Extension>) -> Self {
        ServerHello {
            version: PROTOCOL_VERSION,
            random,
            session_id: vec![],
            cipher_suite,
            compression_method: 0,
            extensions,
        }
    }

    pub fn marshal_to(&self, out: &mut BytesMut) {
        out.put_u16(self.version);
        out.extend_from_slice(&self.random.0);
        out.put_u8(self.session_id.len() as u8);
        out.extend_from_slice(&self.session_id);
        out.put_u16(self.cipher_suite);
        out.put_u8(self.compression_method);
        super::extension::marshal_extensions(&self.extensions, out);
    }

    pub fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 2 + HANDSHAKE_RANDOM_LENGTH + 1 {
            return Err(Error::ErrBufferShort);
        }
        let version = buf.get_u16();
        let mut random = HandshakeRandom::default();
        buf.copy_to_slice(&mut random.0);

        let session_len = buf.get_u8() as usize;
        if buf.remaining() < session_len + 3 {
            return Err(Error::ErrBufferShort);
        }
        let mut session_id = vec![0u8; session_len];
        buf.copy_to_slice(&mut session_id);

        let cipher_suite = buf.get_u16();
        let compression_method = buf.get_u8();
        let extensions = unmarshal_extensions(buf)?;

        Ok(ServerHello {
            version,
            random,
            session_id,
            cipher_suite,
            compression_method,
            extensions,
        })
    }
}

/// HelloVerifyRequest carrying the stateless cookie (RFC 6347 Section 4.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    pub version: u16,
    pub cookie: Vec<u8>,
}

impl HelloVerifyRequest {
    pub fn new(cookie: Vec<u8>) -> Self {
        HelloVerifyRequest {
            version: PROTOCOL_VERSION,
            cookie,
        }
    }

    pub fn marshal_to(&self, out: &mut BytesMut) {
        out.put_u16(self.version);
        out.put_u8(self.cookie.len() as u8);
        out.extend_from_slice(&self.cookie);
    }

    pub fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 3 {
            return Err(Error::ErrBufferShort);
        }
        let version = buf.get_u16();
        let cookie_len = buf.get_u8() as usize;
        if buf.remaining() < cookie_len {
            return Err(Error::ErrBufferShort);
        }
        let mut cookie = vec![0u8; cookie_len];
        buf.copy_to_slice(&mut cookie);
        Ok(HelloVerifyRequest { version, cookie })
    }
}

/// ServerHelloDone, an empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerHelloDone;
