use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

use crate::prf::VERIFY_DATA_LENGTH;

/// Finished message: 12 bytes of PRF output over the transcript hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: Vec<u8>,
}

impl Finished {
    pub fn marshal_to(&self, out: &mut BytesMut) {
        out.extend_from_slice(&self.verify_data);
    }

    pub fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < VERIFY_DATA_LENGTH {
            return Err(Error::ErrBufferShort);
        }
        let mut verify_data = vec![0u8; buf.remaining()];
        buf.copy_to_slice(&mut verify_data);
        Ok(Finished { verify_data })
    }
}
