use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

/// Certificate message: a chain of DER certificates, each with a 24-bit
/// length, inside a 24-bit total length (RFC 5246 Section 7.4.2).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CertificateMsg {
    pub certificates: Vec<Vec<u8>>,
}

impl CertificateMsg {
    pub fn marshal_to(&self, out: &mut BytesMut) {
        let total: usize = self.certificates.iter().map(|c| 3 + c.len()).sum();
        out.put_uint(total as u64, 3);
        for cert in &self.certificates {
            out.put_uint(cert.len() as u64, 3);
            out.extend_from_slice(cert);
        }
    }

    pub fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 3 {
            return Err(Error::ErrBufferShort);
        }
        let mut total = buf.get_uint(3) as usize;
        if buf.remaining() < total {
            return Err(Error::ErrLengthMismatch);
        }
        let mut certificates = vec![];
        while total >= 3 {
            let len = buf.get_uint(3) as usize;
            if buf.remaining() < len || total < 3 + len {
                return Err(Error::ErrLengthMismatch);
            }
            let mut cert = vec![0u8; len];
            buf.copy_to_slice(&mut cert);
            certificates.push(cert);
            total -= 3 + len;
        }
        Ok(CertificateMsg { certificates })
    }
}

/// CertificateRequest; certificate authorities are left empty, WebRTC trust
/// is anchored in the SDP fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub certificate_types: Vec<u8>,
    pub signature_hash_algorithms: Vec<(u8, u8)>,
}

/// ecdsa_sign certificate type (RFC 8422 Section 5.5).
pub const CERTIFICATE_TYPE_ECDSA_SIGN: u8 = 64;

impl Default for CertificateRequest {
    fn default() -> Self {
        CertificateRequest {
            certificate_types: vec![CERTIFICATE_TYPE_ECDSA_SIGN],
            signature_hash_algorithms: vec![(
                super::extension::HASH_SHA256,
                super::extension::SIGNATURE_ECDSA,
            )],
        }
    }
}

impl CertificateRequest {
    pub fn marshal_to(&self, out: &mut BytesMut) {
        out.put_u8(self.certificate_types.len() as u8);
        out.extend_from_slice(&self.certificate_types);
        out.put_u16((self.signature_hash_algorithms.len() * 2) as u16);
        for (hash, sig) in &self.signature_hash_algorithms {
            out.put_u8(*hash);
            out.put_u8(*sig);
        }
        // Zero-length certificate_authorities.
        out.put_u16(0);
    }

    pub fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 1 {
            return Err(Error::ErrBufferShort);
        }
        let types_len = buf.get_u8() as usize;
        if buf.remaining() < types_len {
            return Err(Error::ErrBufferShort);
        }
        let mut certificate_types = vec![0u8; types_len];
        buf.copy_to_slice(&mut certificate_types);

        if buf.remaining() < 2 {
            return Err(Error::ErrBufferShort);
        }
        let algs_len = buf.get_u16() as usize / 2;
        let mut signature_hash_algorithms = Vec::with_capacity(algs_len);
        for _ in 0..algs_len {
            if buf.remaining() < 2 {
                return Err(Error::ErrBufferShort);
            }
            signature_hash_algorithms.push((buf.get_u8(), buf.get_u8()));
        }

        if buf.remaining() >= 2 {
            let cas_len = buf.get_u16() as usize;
            if buf.remaining() < cas_len {
                return Err(Error::ErrBufferShort);
            }
            buf.advance(cas_len);
        }

        Ok(CertificateRequest {
            certificate_types,
            signature_hash_algorithms,
        })
    }
}

/// CertificateVerify: the client's signature over the handshake transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    pub hash_algorithm: u8,
    pub signature_algorithm: u8,
    pub signature: Vec<u8>,
}

impl CertificateVerify {
    pub fn marshal_to(&self, out: &mut BytesMut) {
        out.put_u8(self.hash_algorithm);
        out.put_u8(self.signature_algorithm);
        out.put_u16(self.signature.len() as u16);
        out.extend_from_slice(&self.signature);
    }

    pub fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(Error::ErrBufferShort);
        }
        let hash_algorithm = buf.get_u8();
        let signature_algorithm = buf.get_u8();
        let sig_len = buf.get_u16() as usize;
        if buf.remaining() < sig_len {
            return Err(Error::ErrBufferShort);
        }
        let mut signature = vec![0u8; sig_len];
        buf.copy_to_slice(&mut signature);
        Ok(CertificateVerify {
            hash_algorithm,
            signature_algorithm,
            signature,
        })
    }
}
