use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

pub const PARAM_STATE_COOKIE: u16 = 7;
pub const PARAM_SUPPORTED_EXTENSIONS: u16 = 0x8008;
pub const PARAM_FORWARD_TSN_SUPPORTED: u16 = 0xC000;
pub const PARAM_OUTGOING_SSN_RESET_REQUEST: u16 = 13;
pub const PARAM_RECONFIG_RESPONSE: u16 = 16;

/// Optional/variable-length chunk parameters, TLV encoded and padded to a
/// 4-byte boundary (RFC 4960 Section 3.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    StateCookie(Vec<u8>),
    /// Chunk types the sender supports beyond the base protocol.
    SupportedExtensions(Vec<u8>),
    ForwardTsnSupported,
    /// RFC 6525 Section 4.1.
    OutgoingSsnResetRequest {
        reconfig_request_sequence_number: u32,
        reconfig_response_sequence_number: u32,
        sender_last_tsn: u32,
        stream_identifiers: Vec<u16>,
    },
    /// RFC 6525 Section 4.4; result 1 = performed.
    ReconfigResponse {
        reconfig_response_sequence_number: u32,
        result: u32,
    },
    Unknown {
        typ: u16,
        value: Vec<u8>,
    },
}

impl Param {
    pub fn typ(&self) -> u16 {
        match self {
            Param::StateCookie(_) => PARAM_STATE_COOKIE,
            Param::SupportedExtensions(_) => PARAM_SUPPORTED_EXTENSIONS,
            Param::ForwardTsnSupported => PARAM_FORWARD_TSN_SUPPORTED,
            Param::OutgoingSsnResetRequest { .. } => PARAM_OUTGOING_SSN_RESET_REQUEST,
            Param::ReconfigResponse { .. } => PARAM_RECONFIG_RESPONSE,
            Param::Unknown { typ, .. } => *typ,
        }
    }

    fn value(&self) -> Vec<u8> {
        let mut out = BytesMut::new();
        match self {
            Param::StateCookie(cookie) => out.extend_from_slice(cookie),
            Param::SupportedExtensions(types) => out.extend_from_slice(types),
            Param::ForwardTsnSupported => {}
            Param::OutgoingSsnResetRequest {
                reconfig_request_sequence_number,
                reconfig_response_sequence_number,
                sender_last_tsn,
                stream_identifiers,
            } => {
                out.put_u32(*reconfig_request_sequence_number);
                out.put_u32(*reconfig_response_sequence_number);
                out.put_u32(*sender_last_tsn);
                for sid in stream_identifiers {
                    out.put_u16(*sid);
                }
            }
            Param::ReconfigResponse {
                reconfig_response_sequence_number,
                result,
            } => {
                out.put_u32(*reconfig_response_sequence_number);
                out.put_u32(*result);
            }
            Param::Unknown { value, .. } => out.extend_from_slice(value),
        }
        out.to_vec()
    }

    pub fn marshal_to(&self, out: &mut BytesMut) {
        let value = self.value();
        out.put_u16(self.typ());
        out.put_u16((4 + value.len()) as u16);
        out.extend_from_slice(&value);
        // Pad to a word boundary; padding is not counted in the length.
        let padding = (4 - value.len() % 4) % 4;
        for _ in 0..padding {
            out.put_u8(0);
        }
    }

    pub fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(Error::ErrParamHeaderTooShort);
        }
        let typ = buf.get_u16();
        let length = buf.get_u16() as usize;
        if length < 4 {
            return Err(Error::ErrParamHeaderSelfReportedLengthShorter);
        }
        let value_len = length - 4;
        if buf.remaining() < value_len {
            return Err(Error::ErrParamHeaderSelfReportedLengthLonger);
        }
        let mut value = vec![0u8; value_len];
        buf.copy_to_slice(&mut value);
        let padding = (4 - value_len % 4) % 4;
        for _ in 0..padding.min(buf.remaining()) {
            buf.get_u8();
        }

        Ok(match typ {
            PARAM_STATE_COOKIE => Param::StateCookie(value),
            PARAM_SUPPORTED_EXTENSIONS => Param::SupportedExtensions(value),
            PARAM_FORWARD_TSN_SUPPORTED => Param::ForwardTsnSupported,
            PARAM_OUTGOING_SSN_RESET_REQUEST => {
                if value.len() < 12 {
                    return Err(Error::ErrSsnResetRequestParamTooShort);
                }
                let mut v = &value[..];
                let reconfig_request_sequence_number = v.get_u32();
                let reconfig_response_sequence_number = v.get_u32();
                let sender_last_tsn = v.get_u32();
                let mut stream_identifiers = vec![];
                while v.remaining() >= 2 {
                    stream_identifiers.push(v.get_u16());
                }
                Param::OutgoingSsnResetRequest {
                    reconfig_request_sequence_number,
                    reconfig_response_sequence_number,
                    sender_last_tsn,
                    stream_identifiers,
                }
            }
            PARAM_RECONFIG_RESPONSE => {
                if value.len() < 8 {
                    return Err(Error::ErrReconfigRespParamTooShort);
                }
                let mut v = &value[..];
                Param::ReconfigResponse {
                    reconfig_response_sequence_number: v.get_u32(),
                    result: v.get_u32(),
                }
            }
            typ => Param::Unknown { typ, value },
        })
    }
}
