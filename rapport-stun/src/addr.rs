use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use shared::error::{Error, Result};

use crate::attributes::{AttrType, Getter, Setter, ATTR_MAPPED_ADDRESS};
use crate::message::Message;

pub(crate) const FAMILY_IPV4: u16 = 0x01;
pub(crate) const FAMILY_IPV6: u16 = 0x02;
pub(crate) const IPV4LEN: usize = 4;
pub(crate) const IPV6LEN: usize = 16;

/// MAPPED-ADDRESS attribute (RFC 5389 Section 15.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl fmt::Display for MappedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{}:{}", ip, self.port),
            IpAddr::V6(ip) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}

impl Default for MappedAddress {
    fn default() -> Self {
        MappedAddress {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }
}

impl MappedAddress {
    pub fn get_from_as(&mut self, m: &Message, t: AttrType) -> Result<()> {
        let v = m.get(t)?;
        if v.len() <= 4 {
            return Err(Error::ErrUnexpectedEof);
        }

        let family = u16::from_be_bytes([v[0], v[1]]);
        if family != FAMILY_IPV4 && family != FAMILY_IPV6 {
            return Err(Error::ErrAttributeSizeInvalid);
        }
        self.port = u16::from_be_bytes([v[2], v[3]]);

        if family == FAMILY_IPV6 {
            if v.len() < 4 + IPV6LEN {
                return Err(Error::ErrBadIpLength);
            }
            let mut ip = [0u8; IPV6LEN];
            ip.copy_from_slice(&v[4..4 + IPV6LEN]);
            self.ip = IpAddr::V6(Ipv6Addr::from(ip));
        } else {
            if v.len() < 4 + IPV4LEN {
                return Err(Error::ErrBadIpLength);
            }
            let mut ip = [0u8; IPV4LEN];
            ip.copy_from_slice(&v[4..4 + IPV4LEN]);
            self.ip = IpAddr::V4(Ipv4Addr::from(ip));
        }

        Ok(())
    }

    pub fn add_to_as(&self, m: &mut Message, t: AttrType) -> Result<()> {
        let mut value = vec![0u8; 4];
        match self.ip {
            IpAddr::V4(ip) => {
                value[0..2].copy_from_slice(&FAMILY_IPV4.to_be_bytes());
                value[2..4].copy_from_slice(&self.port.to_be_bytes());
                value.extend_from_slice(&ip.octets());
            }
            IpAddr::V6(ip) => {
                value[0..2].copy_from_slice(&FAMILY_IPV6.to_be_bytes());
                value[2..4].copy_from_slice(&self.port.to_be_bytes());
                value.extend_from_slice(&ip.octets());
            }
        }
        m.add(t, &value);
        Ok(())
    }
}

impl From<SocketAddr> for MappedAddress {
    fn from(addr: SocketAddr) -> Self {
        MappedAddress {
            ip: addr.ip(),
            port: addr.port(),
        }
    }
}

impl Setter for MappedAddress {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        self.add_to_as(m, ATTR_MAPPED_ADDRESS)
    }
}

impl Getter for MappedAddress {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.get_from_as(m, ATTR_MAPPED_ADDRESS)
    }
}

/// ALTERNATE-SERVER attribute (RFC 5389 Section 15.11).
pub type AlternateServer = MappedAddress;
