use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

use crate::curve::{NamedCurve, ELLIPTIC_CURVE_TYPE_NAMED_CURVE};

/// ServerKeyExchange for ECDHE_ECDSA (RFC 8422 Section 5.4): curve params,
/// the ephemeral public point, and a signature over randoms + params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyExchange {
    pub named_curve: NamedCurve,
    pub public_key: Vec<u8>,
    pub hash_algorithm: u8,
    pub signature_algorithm: u8,
    pub signature: Vec<u8>,
}

impl ServerKeyExchange {
    /// The `ServerECDHParams` bytes the signature covers.
    pub fn params_bytes(&self) -> Vec<u8> {
        let mut out = BytesMut::new();
        out.put_u8(ELLIPTIC_CURVE_TYPE_NAMED_CURVE);
        out.put_u16(self.named_curve as u16);
        out.put_u8(self.public_key.len() as u8);
        out.extend_from_slice(&self.public_key);
        out.to_vec()
    }

    pub fn marshal_to(&self, out: &mut BytesMut) {
        out.extend_from_slice(&self.params_bytes());
        out.put_u8(self.hash_algorithm);
        out.put_u8(self.signature_algorithm);
        out.put_u16(self.signature.len() as u16);
        out.extend_from_slice(&self.signature);
    }

    pub fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(Error::ErrBufferShort);
        }
        let curve_type = buf.get_u8();
        if curve_type != ELLIPTIC_CURVE_TYPE_NAMED_CURVE {
            return Err(Error::ErrInvalidEllipticCurveType);
        }
        let named_curve = NamedCurve::from(buf.get_u16());
        if named_curve == NamedCurve::Unsupported {
            return Err(Error::ErrInvalidNamedCurve);
        }
        let key_len = buf.get_u8() as usize;
        if buf.remaining() < key_len + 4 {
            return Err(Error::ErrBufferShort);
        }
        let mut public_key = vec![0u8; key_len];
        buf.copy_to_slice(&mut public_key);

        let hash_algorithm = buf.get_u8();
        let signature_algorithm = buf.get_u8();
        let sig_len = buf.get_u16() as usize;
        if buf.remaining() < sig_len {
            return Err(Error::ErrBufferShort);
        }
        let mut signature = vec![0u8; sig_len];
        buf.copy_to_slice(&mut signature);

        Ok(ServerKeyExchange {
            named_curve,
            public_key,
            hash_algorithm,
            signature_algorithm,
            signature,
        })
    }
}

/// ClientKeyExchange carrying the client's ephemeral ECDH point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKeyExchange {
    pub public_key: Vec<u8>,
}

impl ClientKeyExchange {
    pub fn marshal_to(&self, out: &mut BytesMut) {
        out.put_u8(self.public_key.len() as u8);
        out.extend_from_slice(&self.public_key);
    }

    pub fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 1 {
            return Err(Error::ErrBufferShort);
        }
        let key_len = buf.get_u8() as usize;
        if key_len == 0 || buf.remaining() < key_len {
            return Err(Error::ErrInvalidClientKeyExchange);
        }
        let mut public_key = vec![0u8; key_len];
        buf.copy_to_slice(&mut public_key);
        Ok(ClientKeyExchange { public_key })
    }
}
