use shared::error::Result;
use shared::marshal::{Marshal, MarshalSize};

/// DATA_CHANNEL_ACK, a bodyless confirmation (RFC 8832 Section 5.2).
#[derive(Eq, PartialEq, Copy, Clone, Debug, Default)]
pub struct DataChannelAck;

impl MarshalSize for DataChannelAck {
    fn marshal_size(&self) -> usize {
        0
    }
}

impl Marshal for DataChannelAck {
    fn marshal_to(&self, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }
}
