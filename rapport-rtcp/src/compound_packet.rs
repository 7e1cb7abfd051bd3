use shared::error::{Error, Result};
use shared::marshal::{Marshal, MarshalSize};

use crate::Packet;

/// A compound RTCP packet (RFC 3550 Section 6.1): the first packet must be
/// a SenderReport or ReceiverReport.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CompoundPacket(pub Vec<Packet>);

impl CompoundPacket {
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(Error::EmptyCompound);
        }
        match &self.0[0] {
            Packet::SenderReport(_) | Packet::ReceiverReport(_) => Ok(()),
            _ => Err(Error::BadFirstPacket),
        }
    }

    pub fn marshal(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut out = vec![];
        for p in &self.0 {
            out.extend_from_slice(&Marshal::marshal(p)?);
        }
        Ok(out)
    }

    pub fn marshal_size(&self) -> usize {
        self.0.iter().map(|p| p.marshal_size()).sum()
    }
}
