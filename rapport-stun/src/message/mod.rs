#[cfg(test)]
mod message_test;

use std::fmt;

use rand::Rng;
use shared::error::{Error, Result};

use crate::attributes::{AttrType, Attributes, Getter, RawAttribute, Setter};
use crate::{ATTRIBUTE_HEADER_SIZE, MAGIC_COOKIE, MESSAGE_HEADER_SIZE, TRANSACTION_ID_SIZE};

// Bit layout helpers for packing method+class into the 14-bit type field
// (RFC 5389 Section 6).
const METHOD_ABITS: u16 = 0xf; // 0b0000000000001111
const METHOD_BBITS: u16 = 0x70; // 0b0000000001110000
const METHOD_DBITS: u16 = 0xf80; // 0b0000111110000000
const METHOD_BSHIFT: u16 = 1;
const METHOD_DSHIFT: u16 = 2;
const FIRST_BIT: u16 = 0x1;
const SECOND_BIT: u16 = 0x2;
const C0BIT: u16 = FIRST_BIT;
const C1BIT: u16 = SECOND_BIT;
const CLASS_C0SHIFT: u16 = 4;
const CLASS_C1SHIFT: u16 = 7;

/// The class of a STUN message.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MessageClass {
    /// 0b00
    #[default]
    Request,
    /// 0b01
    Indication,
    /// 0b10
    SuccessResponse,
    /// 0b11
    ErrorResponse,
}

impl MessageClass {
    const fn value(self) -> u16 {
        match self {
            MessageClass::Request => 0x00,
            MessageClass::Indication => 0x01,
            MessageClass::SuccessResponse => 0x02,
            MessageClass::ErrorResponse => 0x03,
        }
    }

    fn from_value(v: u16) -> Self {
        match v {
            0x01 => MessageClass::Indication,
            0x02 => MessageClass::SuccessResponse,
            0x03 => MessageClass::ErrorResponse,
            _ => MessageClass::Request,
        }
    }
}

impl fmt::Display for MessageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            MessageClass::Request => "request",
            MessageClass::Indication => "indication",
            MessageClass::SuccessResponse => "success response",
            MessageClass::ErrorResponse => "error response",
        };
        write!(f, "{s}")
    }
}

/// The method of a STUN message (RFC 5389 plus the TURN methods of RFC 5766).
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Binding,
    Allocate,
    Refresh,
    Send,
    Data,
    CreatePermission,
    ChannelBind,
    Unknown(u16),
}

impl Method {
    const fn value(self) -> u16 {
        match self {
            Method::Binding => 0x001,
            Method::Allocate => 0x003,
            Method::Refresh => 0x004,
            Method::Send => 0x006,
            Method::Data => 0x007,
            Method::CreatePermission => 0x008,
            Method::ChannelBind => 0x009,
            Method::Unknown(v) => v,
        }
    }

    fn from_value(v: u16) -> Self {
        match v {
            0x001 => Method::Binding,
            0x003 => Method::Allocate,
            0x004 => Method::Refresh,
            0x006 => Method::Send,
            0x007 => Method::Data,
            0x008 => Method::CreatePermission,
            0x009 => Method::ChannelBind,
            _ => Method::Unknown(v),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Method::Binding => "Binding",
            Method::Allocate => "Allocate",
            Method::Refresh => "Refresh",
            Method::Send => "Send",
            Method::Data => "Data",
            Method::CreatePermission => "CreatePermission",
            Method::ChannelBind => "ChannelBind",
            Method::Unknown(v) => return write!(f, "0x{v:x}"),
        };
        write!(f, "{s}")
    }
}

/// Message type: class plus method.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MessageType {
    pub method: Method,
    pub class: MessageClass,
}

pub const BINDING_REQUEST: MessageType = MessageType {
    method: Method::Binding,
    class: MessageClass::Request,
};
pub const BINDING_SUCCESS: MessageType = MessageType {
    method: Method::Binding,
    class: MessageClass::SuccessResponse,
};
pub const BINDING_ERROR: MessageType = MessageType {
    method: Method::Binding,
    class: MessageClass::ErrorResponse,
};

impl MessageType {
    pub const fn new(method: Method, class: MessageClass) -> Self {
        MessageType { method, class }
    }

    /// Packs the type into its 14-bit wire value, interleaving the class bits
    /// at positions 4 and 8.
    pub fn value(&self) -> u16 {
        let m = self.method.value();
        let a = m & METHOD_ABITS;
        let b = m & METHOD_BBITS;
        let d = m & METHOD_DBITS;
        let m = a + (b << METHOD_BSHIFT) + (d << METHOD_DSHIFT);

        let c = self.class.value();
        let c0 = (c & C0BIT) << CLASS_C0SHIFT;
        let c1 = (c & C1BIT) << CLASS_C1SHIFT;

        m + c0 + c1
    }

    pub fn from_value(v: u16) -> Self {
        let c0 = (v >> CLASS_C0SHIFT) & C0BIT;
        let c1 = (v >> CLASS_C1SHIFT) & C1BIT;
        let class = MessageClass::from_value(c0 + c1);

        let a = v & METHOD_ABITS;
        let b = (v >> METHOD_BSHIFT) & METHOD_BBITS;
        let d = (v >> METHOD_DSHIFT) & METHOD_DBITS;
        let method = Method::from_value(a + b + d);

        MessageType { method, class }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.class)
    }
}

impl Setter for MessageType {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.set_type(*self);
        Ok(())
    }
}

/// The 96-bit transaction ID.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(pub [u8; TRANSACTION_ID_SIZE]);

impl TransactionId {
    /// Creates a cryptographically random transaction ID.
    pub fn new() -> Self {
        let mut b = TransactionId([0u8; TRANSACTION_ID_SIZE]);
        rand::thread_rng().fill(&mut b.0);
        b
    }
}

impl Setter for TransactionId {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.transaction_id = *self;
        m.write_transaction_id();
        Ok(())
    }
}

/// A STUN message, kept in both parsed (`typ`, `attributes`) and raw form.
///
/// `raw` is authoritative for MESSAGE-INTEGRITY and FINGERPRINT computation,
/// which cover the serialized prefix of the message.
#[derive(Default, Debug, Clone)]
pub struct Message {
    pub typ: MessageType,
    pub length: u32,
    pub transaction_id: TransactionId,
    pub attributes: Attributes,
    pub raw: Vec<u8>,
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.typ == other.typ
            && self.length == other.length
            && self.transaction_id == other.transaction_id
            && self.attributes == other.attributes
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} l={} attrs={} id={:?}",
            self.typ,
            self.length,
            self.attributes.0.len(),
            self.transaction_id.0,
        )
    }
}

impl Message {
    pub fn new() -> Self {
        Message {
            raw: vec![0u8; MESSAGE_HEADER_SIZE],
            ..Default::default()
        }
    }

    /// Applies the given setters in order; used to build requests in one
    /// expression.
    pub fn build(&mut self, setters: &[Box<dyn Setter>]) -> Result<()> {
        self.reset();
        self.write_header();
        for s in setters {
            s.add_to(self)?;
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.raw.clear();
        self.raw.resize(MESSAGE_HEADER_SIZE, 0);
        self.length = 0;
        self.attributes.0.clear();
    }

    pub fn set_type(&mut self, t: MessageType) {
        self.typ = t;
        self.write_type();
    }

    /// Serializes the header fields into the first 20 bytes of `raw`.
    pub fn write_header(&mut self) {
        if self.raw.len() < MESSAGE_HEADER_SIZE {
            self.raw.resize(MESSAGE_HEADER_SIZE, 0);
        }
        self.write_type();
        self.write_length();
        self.raw[4..8].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
        self.write_transaction_id();
    }

    pub fn write_type(&mut self) {
        let v = self.typ.value();
        self.raw[0..2].copy_from_slice(&v.to_be_bytes());
    }

    pub fn write_length(&mut self) {
        let l = self.length as u16;
        self.raw[2..4].copy_from_slice(&l.to_be_bytes());
    }

    pub fn write_transaction_id(&mut self) {
        self.raw[8..MESSAGE_HEADER_SIZE].copy_from_slice(&self.transaction_id.0);
    }

    /// Sets a new random transaction ID.
    pub fn new_transaction_id(&mut self) {
        self.transaction_id = TransactionId::new();
        self.write_transaction_id();
    }

    /// Appends an attribute in raw form, updating the length field.
    pub fn add(&mut self, t: AttrType, v: &[u8]) {
        // Value length before padding.
        let alloc_size = crate::attributes::nearest_padded_value_length(v.len());
        let first = MESSAGE_HEADER_SIZE + self.length as usize;
        let last = first + ATTRIBUTE_HEADER_SIZE + alloc_size;
        self.grow(last, true);
        self.length += (ATTRIBUTE_HEADER_SIZE + alloc_size) as u32;

        let attr = RawAttribute {
            typ: t,
            length: v.len() as u16,
            value: v.to_vec(),
        };

        self.raw[first..first + 2].copy_from_slice(&attr.typ.value().to_be_bytes());
        self.raw[first + 2..first + 4].copy_from_slice(&attr.length.to_be_bytes());
        self.raw[first + 4..first + 4 + v.len()].copy_from_slice(v);
        // Padding bytes stay zero.

        self.attributes.0.push(attr);
        self.write_length();
    }

    pub fn get(&self, t: AttrType) -> Result<Vec<u8>> {
        let v = self.attributes.get(t)?;
        Ok(v.value)
    }

    pub fn contains(&self, t: AttrType) -> bool {
        self.attributes.contains(t)
    }

    fn grow(&mut self, v: usize, resize: bool) {
        if self.raw.len() < v || resize {
            self.raw.resize(v, 0);
        }
    }

    /// Serialized wire form.
    pub fn marshal_binary(&self) -> Result<Vec<u8>> {
        Ok(self.raw.clone())
    }

    /// Parses `data` as a full STUN message.
    pub fn unmarshal_binary(&mut self, data: &[u8]) -> Result<()> {
        self.raw = data.to_vec();
        self.decode()
    }

    /// Re-parses `typ`, `length`, `transaction_id` and `attributes` from `raw`.
    pub fn decode(&mut self) -> Result<()> {
        let buf = &self.raw;
        if buf.len() < MESSAGE_HEADER_SIZE {
            return Err(Error::ErrUnexpectedHeaderEof);
        }

        let t = u16::from_be_bytes([buf[0], buf[1]]);
        let size = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        let cookie = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let full_size = MESSAGE_HEADER_SIZE + size;

        if cookie != MAGIC_COOKIE {
            return Err(Error::ErrInvalidMagicCookie);
        }
        if buf.len() < full_size {
            return Err(Error::ErrUnexpectedEof);
        }

        self.typ = MessageType::from_value(t);
        self.length = size as u32;
        self.transaction_id
            .0
            .copy_from_slice(&buf[8..MESSAGE_HEADER_SIZE]);
        self.attributes.0.clear();

        let mut offset = 0;
        let b = &buf[MESSAGE_HEADER_SIZE..full_size];
        while offset < size {
            if size - offset < ATTRIBUTE_HEADER_SIZE {
                return Err(Error::ErrBufferShort);
            }
            let a_typ = AttrType(u16::from_be_bytes([b[offset], b[offset + 1]]));
            let a_len = u16::from_be_bytes([b[offset + 2], b[offset + 3]]) as usize;
            let a_buff_len = crate::attributes::nearest_padded_value_length(a_len);
            offset += ATTRIBUTE_HEADER_SIZE;

            if a_buff_len > size - offset {
                return Err(Error::ErrAttributeSizeOverflow);
            }
            let value = b[offset..offset + a_len].to_vec();
            offset += a_buff_len;

            self.attributes.0.push(RawAttribute {
                typ: a_typ,
                length: a_len as u16,
                value,
            });
        }

        Ok(())
    }

    /// Byte offset in `raw` where the attribute of type `t` begins, if any.
    pub(crate) fn attr_offset(&self, t: AttrType) -> Option<usize> {
        let mut offset = MESSAGE_HEADER_SIZE;
        for a in &self.attributes.0 {
            if a.typ == t {
                return Some(offset);
            }
            offset += ATTRIBUTE_HEADER_SIZE
                + crate::attributes::nearest_padded_value_length(a.length as usize);
        }
        None
    }

    pub fn apply<G: Getter>(&self, getter: &mut G) -> Result<()> {
        getter.get_from(self)
    }
}
