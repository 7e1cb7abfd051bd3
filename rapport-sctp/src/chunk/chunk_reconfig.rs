use bytes::{Buf, BytesMut};
use shared::error::Result;

use crate::param::Param;

/// RE-CONFIG chunk (RFC 6525 Section 3.1); carries one or two reconfig
/// parameters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkReconfig {
    pub param_a: Option<Param>,
    pub param_b: Option<Param>,
}

impl ChunkReconfig {
    pub(crate) fn marshal_value(&self, out: &mut BytesMut) {
        if let Some(param) = &self.param_a {
            param.marshal_to(out);
        }
        if let Some(param) = &self.param_b {
            param.marshal_to(out);
        }
    }

    pub(crate) fn unmarshal_value<B: Buf>(buf: &mut B) -> Result<Self> {
        let param_a = if buf.remaining() >= 4 {
            Some(Param::unmarshal(buf)?)
        } else {
            None
        };
        let param_b = if buf.remaining() >= 4 {
            Some(Param::unmarshal(buf)?)
        } else {
            None
        };
        Ok(ChunkReconfig { param_a, param_b })
    }
}
