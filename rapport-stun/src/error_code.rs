use shared::error::{Error, Result};

use crate::attributes::{Getter, Setter, ATTR_ERROR_CODE};
use crate::message::Message;

/// ERROR-CODE attribute (RFC 5389 Section 15.6).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub u16);

pub const CODE_TRY_ALTERNATE: ErrorCode = ErrorCode(300);
pub const CODE_BAD_REQUEST: ErrorCode = ErrorCode(400);
pub const CODE_UNAUTHORIZED: ErrorCode = ErrorCode(401);
pub const CODE_UNKNOWN_ATTRIBUTE: ErrorCode = ErrorCode(420);
pub const CODE_STALE_NONCE: ErrorCode = ErrorCode(438);
pub const CODE_ROLE_CONFLICT: ErrorCode = ErrorCode(487);
pub const CODE_SERVER_ERROR: ErrorCode = ErrorCode(500);

// RFC 5766 TURN codes.
pub const CODE_FORBIDDEN: ErrorCode = ErrorCode(403);
pub const CODE_ALLOC_MISMATCH: ErrorCode = ErrorCode(437);
pub const CODE_WRONG_CREDENTIALS: ErrorCode = ErrorCode(441);
pub const CODE_UNSUPPORTED_TRANS_PROTO: ErrorCode = ErrorCode(442);
pub const CODE_ALLOC_QUOTA_REACHED: ErrorCode = ErrorCode(486);
pub const CODE_INSUFFICIENT_CAPACITY: ErrorCode = ErrorCode(508);

impl ErrorCode {
    fn default_reason(self) -> Result<&'static str> {
        let reason = match self {
            CODE_TRY_ALTERNATE => "Try Alternate",
            CODE_BAD_REQUEST => "Bad Request",
            CODE_UNAUTHORIZED => "Unauthorized",
            CODE_UNKNOWN_ATTRIBUTE => "Unknown Attribute",
            CODE_STALE_NONCE => "Stale Nonce",
            CODE_ROLE_CONFLICT => "Role Conflict",
            CODE_SERVER_ERROR => "Server Error",
            CODE_FORBIDDEN => "Forbidden",
            CODE_ALLOC_MISMATCH => "Allocation Mismatch",
            CODE_WRONG_CREDENTIALS => "Wrong Credentials",
            CODE_UNSUPPORTED_TRANS_PROTO => "Unsupported Transport Protocol",
            CODE_ALLOC_QUOTA_REACHED => "Allocation Quota Reached",
            CODE_INSUFFICIENT_CAPACITY => "Insufficient Capacity",
            _ => return Err(Error::ErrNoDefaultReason),
        };
        Ok(reason)
    }
}

impl Setter for ErrorCode {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let reason = self.default_reason()?;
        let attr = ErrorCodeAttribute {
            code: *self,
            reason: reason.as_bytes().to_vec(),
        };
        attr.add_to(m)
    }
}

/// ERROR-CODE with an explicit reason phrase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorCodeAttribute {
    pub code: ErrorCode,
    pub reason: Vec<u8>,
}

const ERROR_CODE_CLASS_BYTE: usize = 2;
const ERROR_CODE_NUMBER_BYTE: usize = 3;
const ERROR_CODE_REASON_START: usize = 4;
const ERROR_CODE_REASON_MAX_B: usize = 763;
const ERROR_CODE_MODULO: u16 = 100;

impl Setter for ErrorCodeAttribute {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        if self.reason.len() > ERROR_CODE_REASON_MAX_B {
            return Err(Error::ErrAttributeSizeInvalid);
        }

        let mut value: Vec<u8> = vec![0; ERROR_CODE_REASON_START];
        let number = (self.code.0 % ERROR_CODE_MODULO) as u8;
        let class = (self.code.0 / ERROR_CODE_MODULO) as u8;
        value[ERROR_CODE_CLASS_BYTE] = class;
        value[ERROR_CODE_NUMBER_BYTE] = number;
        value.extend_from_slice(&self.reason);

        m.add(ATTR_ERROR_CODE, &value);
        Ok(())
    }
}

impl Getter for ErrorCodeAttribute {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_ERROR_CODE)?;
        if v.len() < ERROR_CODE_REASON_START {
            return Err(Error::ErrUnexpectedEof);
        }

        let class = v[ERROR_CODE_CLASS_BYTE] as u16;
        let number = v[ERROR_CODE_NUMBER_BYTE] as u16;
        self.code = ErrorCode(class * ERROR_CODE_MODULO + number);
        self.reason = v[ERROR_CODE_REASON_START..].to_vec();

        Ok(())
    }
}
