use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use shared::error::{Error, Result};

use crate::addr::{FAMILY_IPV4, FAMILY_IPV6, IPV4LEN, IPV6LEN};
use crate::attributes::{AttrType, Getter, Setter, ATTR_XORMAPPED_ADDRESS};
use crate::message::Message;
use crate::MAGIC_COOKIE;

/// XOR-MAPPED-ADDRESS attribute (RFC 5389 Section 15.2).
///
/// The port is XOR'd with the upper 16 bits of the magic cookie; an IPv4
/// address with the magic cookie, an IPv6 address with magic cookie followed
/// by the transaction ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorMappedAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for XorMappedAddress {
    fn default() -> Self {
        XorMappedAddress {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }
}

impl fmt::Display for XorMappedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{}:{}", ip, self.port),
            IpAddr::V6(ip) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}

impl From<SocketAddr> for XorMappedAddress {
    fn from(addr: SocketAddr) -> Self {
        XorMappedAddress {
            ip: addr.ip(),
            port: addr.port(),
        }
    }
}

fn xor_bytes(dst: &mut [u8], a: &[u8], b: &[u8]) {
    for i in 0..dst.len() {
        dst[i] = a[i] ^ b[i];
    }
}

impl XorMappedAddress {
    pub fn add_to_as(&self, m: &mut Message, t: AttrType) -> Result<()> {
        let (family, ip_len) = match self.ip {
            IpAddr::V4(_) => (FAMILY_IPV4, IPV4LEN),
            IpAddr::V6(_) => (FAMILY_IPV6, IPV6LEN),
        };

        let mut value = vec![0u8; 4 + ip_len];
        value[0..2].copy_from_slice(&family.to_be_bytes());
        value[2..4].copy_from_slice(&(self.port ^ (MAGIC_COOKIE >> 16) as u16).to_be_bytes());

        let mut xor_value = vec![0u8; IPV6LEN];
        xor_value[..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
        xor_value[4..].copy_from_slice(&m.transaction_id.0);

        match self.ip {
            IpAddr::V4(ip) => xor_bytes(&mut value[4..], &ip.octets(), &xor_value),
            IpAddr::V6(ip) => xor_bytes(&mut value[4..], &ip.octets(), &xor_value),
        }

        m.add(t, &value);
        Ok(())
    }

    pub fn get_from_as(&mut self, m: &Message, t: AttrType) -> Result<()> {
        let v = m.get(t)?;
        if v.len() <= 4 {
            return Err(Error::ErrUnexpectedEof);
        }

        let family = u16::from_be_bytes([v[0], v[1]]);
        if family != FAMILY_IPV4 && family != FAMILY_IPV6 {
            return Err(Error::ErrAttributeSizeInvalid);
        }

        self.port = u16::from_be_bytes([v[2], v[3]]) ^ (MAGIC_COOKIE >> 16) as u16;

        let mut xor_value = vec![0u8; IPV6LEN];
        xor_value[..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
        xor_value[4..].copy_from_slice(&m.transaction_id.0);

        if family == FAMILY_IPV6 {
            if v.len() < 4 + IPV6LEN {
                return Err(Error::ErrBadIpLength);
            }
            let mut ip = [0u8; IPV6LEN];
            xor_bytes(&mut ip, &v[4..], &xor_value);
            self.ip = IpAddr::V6(Ipv6Addr::from(ip));
        } else {
            if v.len() < 4 + IPV4LEN {
                return Err(Error::ErrBadIpLength);
            }
            let mut ip = [0u8; IPV4LEN];
            xor_bytes(&mut ip, &v[4..], &xor_value);
            self.ip = IpAddr::V4(Ipv4Addr::from(ip));
        }

        Ok(())
    }
}

impl Setter for XorMappedAddress {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        self.add_to_as(m, ATTR_XORMAPPED_ADDRESS)
    }
}

impl Getter for XorMappedAddress {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.get_from_as(m, ATTR_XORMAPPED_ADDRESS)
    }
}
