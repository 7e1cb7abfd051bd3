use shared::error::{Error, Result};

use crate::attributes::{AttrType, Getter, Setter, ATTR_UNKNOWN_ATTRIBUTES};
use crate::message::Message;

/// UNKNOWN-ATTRIBUTES attribute (RFC 5389 Section 15.9).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnknownAttributes(pub Vec<AttrType>);

// Each unknown attribute is a 16-bit type.
const ATTR_TYPE_SIZE: usize = 2;

impl Setter for UnknownAttributes {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let mut v = Vec::with_capacity(self.0.len() * ATTR_TYPE_SIZE);
        for t in &self.0 {
            v.extend_from_slice(&t.value().to_be_bytes());
        }
        m.add(ATTR_UNKNOWN_ATTRIBUTES, &v);
        Ok(())
    }
}

impl Getter for UnknownAttributes {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_UNKNOWN_ATTRIBUTES)?;
        if v.len() % ATTR_TYPE_SIZE != 0 {
            return Err(Error::ErrBadUnknownAttrsSize);
        }
        self.0.clear();
        for chunk in v.chunks_exact(ATTR_TYPE_SIZE) {
            self.0.push(AttrType(u16::from_be_bytes([chunk[0], chunk[1]])));
        }
        Ok(())
    }
}
