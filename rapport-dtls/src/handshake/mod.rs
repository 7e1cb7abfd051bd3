#[cfg(test)]
mod handshake_test;

pub mod certificate;
pub mod client_hello;
pub mod extension;
pub mod finished;
pub mod key_exchange;
pub mod random;
pub mod server_hello;

use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

use certificate::{CertificateMsg, CertificateRequest, CertificateVerify};
use client_hello::ClientHello;
use finished::Finished;
use key_exchange::{ClientKeyExchange, ServerKeyExchange};
use server_hello::{HelloVerifyRequest, ServerHello, ServerHelloDone};

/// Handshake message types (RFC 5246 Section 7.4 + RFC 6347).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandshakeType {
    ClientHello = 1,
    ServerHello = 2,
    HelloVerifyRequest = 3,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Result<Self> {
        Ok(match v {
            1 => HandshakeType::ClientHello,
            2 => HandshakeType::ServerHello,
            3 => HandshakeType::HelloVerifyRequest,
            11 => HandshakeType::Certificate,
            12 => HandshakeType::ServerKeyExchange,
            13 => HandshakeType::CertificateRequest,
            14 => HandshakeType::ServerHelloDone,
            15 => HandshakeType::CertificateVerify,
            16 => HandshakeType::ClientKeyExchange,
            20 => HandshakeType::Finished,
            _ => return Err(Error::ErrInvalidContentType),
        })
    }
}

/// Fixed handshake header size: type(1) + length(3) + message_seq(2) +
/// fragment_offset(3) + fragment_length(3).
pub const HANDSHAKE_HEADER_SIZE: usize = 12;

/// DTLS handshake header (RFC 6347 Section 4.2.2). `message_seq` counts
/// logical messages; fragments of one message share it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeHeader {
    pub typ: u8,
    pub length: u32,
    pub message_seq: u16,
    pub fragment_offset: u32,
    pub fragment_length: u32,
}

impl HandshakeHeader {
    pub fn marshal_to(&self, out: &mut BytesMut) {
        out.put_u8(self.typ);
        out.put_uint(u64::from(self.length), 3);
        out.put_u16(self.message_seq);
        out.put_uint(u64::from(self.fragment_offset), 3);
        out.put_uint(u64::from(self.fragment_length), 3);
    }

    pub fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < HANDSHAKE_HEADER_SIZE {
            return Err(Error::ErrBufferShort);
        }
        Ok(HandshakeHeader {
            typ: buf.get_u8(),
            length: buf.get_uint(3) as u32,
            message_seq: buf.get_u16(),
            fragment_offset: buf.get_uint(3) as u32,
            fragment_length: buf.get_uint(3) as u32,
        })
    }
}

/// A parsed handshake message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeMessage {
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    HelloVerifyRequest(HelloVerifyRequest),
    Certificate(CertificateMsg),
    ServerKeyExchange(ServerKeyExchange),
    CertificateRequest(CertificateRequest),
    ServerHelloDone(ServerHelloDone),
    CertificateVerify(CertificateVerify),
    ClientKeyExchange(ClientKeyExchange),
    Finished(Finished),
}

impl HandshakeMessage {
    pub fn typ(&self) -> HandshakeType {
        match self {
            HandshakeMessage::ClientHello(_) => HandshakeType::ClientHello,
            HandshakeMessage::ServerHello(_) => HandshakeType::ServerHello,
            HandshakeMessage::HelloVerifyRequest(_) => HandshakeType::HelloVerifyRequest,
            HandshakeMessage::Certificate(_) => HandshakeType::Certificate,
            HandshakeMessage::ServerKeyExchange(_) => HandshakeType::ServerKeyExchange,
            HandshakeMessage::CertificateRequest(_) => HandshakeType::CertificateRequest,
            HandshakeMessage::ServerHelloDone(_) => HandshakeType::ServerHelloDone,
            HandshakeMessage::CertificateVerify(_) => HandshakeType::CertificateVerify,
            HandshakeMessage::ClientKeyExchange(_) => HandshakeType::ClientKeyExchange,
            HandshakeMessage::Finished(_) => HandshakeType::Finished,
        }
    }

    pub fn marshal_body(&self) -> Vec<u8> {
        let mut out = BytesMut::new();
        match self {
            HandshakeMessage::ClientHello(m) => m.marshal_to(&mut out),
            HandshakeMessage::ServerHello(m) => m.marshal_to(&mut out),
            HandshakeMessage::HelloVerifyRequest(m) => m.marshal_to(&mut out),
            HandshakeMessage::Certificate(m) => m.marshal_to(&mut out),
            HandshakeMessage::ServerKeyExchange(m) => m.marshal_to(&mut out),
            HandshakeMessage::CertificateRequest(m) => m.marshal_to(&mut out),
            HandshakeMessage::ServerHelloDone(_) => {}
            HandshakeMessage::CertificateVerify(m) => m.marshal_to(&mut out),
            HandshakeMessage::ClientKeyExchange(m) => m.marshal_to(&mut out),
            HandshakeMessage::Finished(m) => m.marshal_to(&mut out),
        }
        out.to_vec()
    }

    pub fn unmarshal_body(typ: HandshakeType, body: &[u8]) -> Result<Self> {
        let mut buf = body;
        Ok(match typ {
            HandshakeType::ClientHello => {
                HandshakeMessage::ClientHello(ClientHello::unmarshal(&mut buf)?)
            }
            HandshakeType::ServerHello => {
                HandshakeMessage::ServerHello(ServerHello::unmarshal(&mut buf)?)
            }
            HandshakeType::HelloVerifyRequest => {
                HandshakeMessage::HelloVerifyRequest(HelloVerifyRequest::unmarshal(&mut buf)?)
            }
            HandshakeType::Certificate => {
                HandshakeMessage::Certificate(CertificateMsg::unmarshal(&mut buf)?)
            }
            HandshakeType::ServerKeyExchange => {
                HandshakeMessage::ServerKeyExchange(ServerKeyExchange::unmarshal(&mut buf)?)
            }
            HandshakeType::CertificateRequest => {
                HandshakeMessage::CertificateRequest(CertificateRequest::unmarshal(&mut buf)?)
            }
            HandshakeType::ServerHelloDone => HandshakeMessage::ServerHelloDone(ServerHelloDone),
            HandshakeType::CertificateVerify => {
                HandshakeMessage::CertificateVerify(CertificateVerify::unmarshal(&mut buf)?)
            }
            HandshakeType::ClientKeyExchange => {
                HandshakeMessage::ClientKeyExchange(ClientKeyExchange::unmarshal(&mut buf)?)
            }
            HandshakeType::Finished => HandshakeMessage::Finished(Finished::unmarshal(&mut buf)?),
        })
    }

    /// Serializes body plus unfragmented DTLS handshake header; this is also
    /// the transcript form of the message.
    pub fn marshal_with_header(&self, message_seq: u16) -> Vec<u8> {
        let body = self.marshal_body();
        let header = HandshakeHeader {
            typ: self.typ() as u8,
            length: body.len() as u32,
            message_seq,
            fragment_offset: 0,
            fragment_length: body.len() as u32,
        };
        let mut out = BytesMut::with_capacity(HANDSHAKE_HEADER_SIZE + body.len());
        header.marshal_to(&mut out);
        out.extend_from_slice(&body);
        out.to_vec()
    }
}
