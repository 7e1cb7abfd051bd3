use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

use crate::param::Param;

/// INIT and INIT-ACK share this layout (RFC 4960 Sections 3.3.2/3.3.3);
/// the INIT-ACK carries the state cookie as a parameter.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkInit {
    pub initiate_tag: u32,
    pub advertised_receiver_window_credit: u32,
    pub num_outbound_streams: u16,
    pub num_inbound_streams: u16,
    pub initial_tsn: u32,
    pub params: Vec<Param>,
}

impl ChunkInit {
    pub(crate) fn marshal_value(&self, out: &mut BytesMut) {
        out.put_u32(self.initiate_tag);
        out.put_u32(self.advertised_receiver_window_credit);
        out.put_u16(self.num_outbound_streams);
        out.put_u16(self.num_inbound_streams);
        out.put_u32(self.initial_tsn);
        for param in &self.params {
            param.marshal_to(out);
        }
    }

    pub(crate) fn unmarshal_value<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 16 {
            return Err(Error::ErrChunkTooShort);
        }
        let initiate_tag = buf.get_u32();
        let advertised_receiver_window_credit = buf.get_u32();
        let num_outbound_streams = buf.get_u16();
        let num_inbound_streams = buf.get_u16();
        let initial_tsn = buf.get_u32();

        let mut params = vec![];
        while buf.remaining() >= 4 {
            params.push(Param::unmarshal(buf)?);
        }

        Ok(ChunkInit {
            initiate_tag,
            advertised_receiver_window_credit,
            num_outbound_streams,
            num_inbound_streams,
            initial_tsn,
            params,
        })
    }

    pub fn state_cookie(&self) -> Option<&[u8]> {
        self.params.iter().find_map(|p| match p {
            Param::StateCookie(cookie) => Some(cookie.as_slice()),
            _ => None,
        })
    }

    pub fn supports_forward_tsn(&self) -> bool {
        self.params.iter().any(|p| {
            matches!(p, Param::ForwardTsnSupported)
                || matches!(p, Param::SupportedExtensions(types) if types.contains(&192))
        })
    }
}
