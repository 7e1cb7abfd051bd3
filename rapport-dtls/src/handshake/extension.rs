use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

use crate::SrtpProtectionProfile;

pub const EXTENSION_SUPPORTED_GROUPS: u16 = 10;
pub const EXTENSION_EC_POINT_FORMATS: u16 = 11;
pub const EXTENSION_SIGNATURE_ALGORITHMS: u16 = 13;
pub const EXTENSION_USE_SRTP: u16 = 14;

/// hash(4=sha256) + signature(3=ecdsa), RFC 5246 Section 7.4.1.4.1.
pub const HASH_SHA256: u8 = 4;
pub const SIGNATURE_ECDSA: u8 = 3;

/// Hello extensions; only the ones this stack negotiates, everything else
/// is carried opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    /// Named groups the peer accepts (RFC 8422).
    SupportedGroups(Vec<u16>),
    /// Point formats; only uncompressed (0) is ever offered.
    EcPointFormats(Vec<u8>),
    /// (hash, signature) pairs.
    SignatureAlgorithms(Vec<(u8, u8)>),
    /// SRTP protection profiles (RFC 5764), empty MKI.
    UseSrtp(Vec<SrtpProtectionProfile>),
    Unknown { typ: u16, data: Vec<u8> },
}

impl Extension {
    pub fn typ(&self) -> u16 {
        match self {
            Extension::SupportedGroups(_) => EXTENSION_SUPPORTED_GROUPS,
            Extension::EcPointFormats(_) => EXTENSION_EC_POINT_FORMATS,
            Extension::SignatureAlgorithms(_) => EXTENSION_SIGNATURE_ALGORITHMS,
            Extension::UseSrtp(_) => EXTENSION_USE_SRTP,
            Extension::Unknown { typ, .. } => *typ,
        }
    }

    fn body(&self) -> Vec<u8> {
        let mut out = BytesMut::new();
        match self {
            Extension::SupportedGroups(groups) => {
                out.put_u16((groups.len() * 2) as u16);
                for g in groups {
                    out.put_u16(*g);
                }
            }
            Extension::EcPointFormats(formats) => {
                out.put_u8(formats.len() as u8);
                out.extend_from_slice(formats);
            }
            Extension::SignatureAlgorithms(algs) => {
                out.put_u16((algs.len() * 2) as u16);
                for (hash, sig) in algs {
                    out.put_u8(*hash);
                    out.put_u8(*sig);
                }
            }
            Extension::UseSrtp(profiles) => {
                out.put_u16((profiles.len() * 2) as u16);
                for p in profiles {
                    out.put_u16(*p as u16);
                }
                // srtp_mki length, always empty here.
                out.put_u8(0);
            }
            Extension::Unknown { data, .. } => out.extend_from_slice(data),
        }
        out.to_vec()
    }

    pub fn marshal_to(&self, out: &mut BytesMut) {
        let body = self.body();
        out.put_u16(self.typ());
        out.put_u16(body.len() as u16);
        out.extend_from_slice(&body);
    }

    fn parse(typ: u16, data: &[u8]) -> Result<Self> {
        let mut buf = data;
        Ok(match typ {
            EXTENSION_SUPPORTED_GROUPS => {
                if buf.remaining() < 2 {
                    return Err(Error::ErrBufferShort);
                }
                let n = buf.get_u16() as usize / 2;
                let mut groups = Vec::with_capacity(n);
                for _ in 0..n {
                    if buf.remaining() < 2 {
                        return Err(Error::ErrBufferShort);
                    }
                    groups.push(buf.get_u16());
                }
                Extension::SupportedGroups(groups)
            }
            EXTENSION_EC_POINT_FORMATS => {
                if buf.remaining() < 1 {
                    return Err(Error::ErrBufferShort);
                }
                let n = buf.get_u8() as usize;
                if buf.remaining() < n {
                    return Err(Error::ErrBufferShort);
                }
                Extension::EcPointFormats(buf[..n].to_vec())
            }
            EXTENSION_SIGNATURE_ALGORITHMS => {
                if buf.remaining() < 2 {
                    return Err(Error::ErrBufferShort);
                }
                let n = buf.get_u16() as usize / 2;
                let mut algs = Vec::with_capacity(n);
                for _ in 0..n {
                    if buf.remaining() < 2 {
                        return Err(Error::ErrBufferShort);
                    }
                    algs.push((buf.get_u8(), buf.get_u8()));
                }
                Extension::SignatureAlgorithms(algs)
            }
            EXTENSION_USE_SRTP => {
                if buf.remaining() < 2 {
                    return Err(Error::ErrBufferShort);
                }
                let n = buf.get_u16() as usize / 2;
                let mut profiles = Vec::with_capacity(n);
                for _ in 0..n {
                    if buf.remaining() < 2 {
                        return Err(Error::ErrBufferShort);
                    }
                    profiles.push(SrtpProtectionProfile::from(buf.get_u16()));
                }
                Extension::UseSrtp(profiles)
            }
            typ => Extension::Unknown {
                typ,
                data: data.to_vec(),
            },
        })
    }
}

/// Marshals an extension block: u16 total length then each extension.
pub fn marshal_extensions(extensions: &[Extension], out: &mut BytesMut) {
    let mut block = BytesMut::new();
    for ext in extensions {
        ext.marshal_to(&mut block);
    }
    out.put_u16(block.len() as u16);
    out.extend_from_slice(&block);
}

/// Parses an extension block if present; a hello without extensions is valid.
pub fn unmarshal_extensions<B: Buf>(buf: &mut B) -> Result<Vec<Extension>> {
    if buf.remaining() == 0 {
        return Ok(vec![]);
    }
    if buf.remaining() < 2 {
        return Err(Error::ErrBufferShort);
    }
    let mut total = buf.get_u16() as usize;
    if buf.remaining() < total {
        return Err(Error::ErrBufferShort);
    }
    let mut extensions = vec![];
    while total >= 4 {
        let typ = buf.get_u16();
        let len = buf.get_u16() as usize;
        if buf.remaining() < len || total < 4 + len {
            return Err(Error::ErrBufferShort);
        }
        let mut data = vec![0u8; len];
        buf.copy_to_slice(&mut data);
        extensions.push(Extension::parse(typ, &data)?);
        total -= 4 + len;
    }
    Ok(extensions)
}
