use std::fmt;

use shared::error::{Error, Result};

use crate::attributes::{
    AttrType, Getter, Setter, ATTR_NONCE, ATTR_REALM, ATTR_SOFTWARE, ATTR_USERNAME,
};
use crate::message::Message;

const MAX_USERNAME_B: usize = 513;
const MAX_REALM_B: usize = 763;
const MAX_SOFTWARE_B: usize = 763;
const MAX_NONCE_B: usize = 763;

/// A UTF-8 string attribute (USERNAME, REALM, NONCE, SOFTWARE).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TextAttribute {
    pub attr: AttrType,
    pub text: String,
}

impl fmt::Display for TextAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl TextAttribute {
    pub fn new(attr: AttrType, text: String) -> Self {
        TextAttribute { attr, text }
    }

    pub fn get_from_as(m: &Message, attr: AttrType) -> Result<Self> {
        let a = m.get(attr)?;
        let text = String::from_utf8(a)?;
        Ok(TextAttribute { attr, text })
    }
}

impl Setter for TextAttribute {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let max_len = match self.attr {
            ATTR_USERNAME => MAX_USERNAME_B,
            ATTR_REALM => MAX_REALM_B,
            ATTR_SOFTWARE => MAX_SOFTWARE_B,
            ATTR_NONCE => MAX_NONCE_B,
            _ => return Err(Error::ErrAttributeNotFound),
        };
        if self.text.len() > max_len {
            return Err(Error::ErrAttributeSizeInvalid);
        }
        m.add(self.attr, self.text.as_bytes());
        Ok(())
    }
}

impl Getter for TextAttribute {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let a = m.get(self.attr)?;
        self.text = String::from_utf8(a)?;
        Ok(())
    }
}

/// USERNAME attribute helper.
pub struct Username;

impl Username {
    pub fn new(text: String) -> TextAttribute {
        TextAttribute::new(ATTR_USERNAME, text)
    }
}

/// REALM attribute helper.
pub struct Realm;

impl Realm {
    pub fn new(text: String) -> TextAttribute {
        TextAttribute::new(ATTR_REALM, text)
    }
}

/// NONCE attribute helper.
pub struct Nonce;

impl Nonce {
    pub fn new(text: String) -> TextAttribute {
        TextAttribute::new(ATTR_NONCE, text)
    }
}

/// SOFTWARE attribute helper.
pub struct Software;

impl Software {
    pub fn new(text: String) -> TextAttribute {
        TextAttribute::new(ATTR_SOFTWARE, text)
    }
}
