#[cfg(test)]
mod candidate_test;

pub mod candidate_pair;

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crc::{Crc, CRC_32_ISO_HDLC};
use serde::Serialize;
use shared::error::{Error, Result};

pub(crate) const DEFAULT_LOCAL_PREFERENCE: u16 = 65535;

/// Indicates that the candidate is used for RTP.
pub const COMPONENT_RTP: u16 = 1;

/// Represents the type of an ICE candidate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum CandidateType {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,
    #[serde(rename = "host")]
    Host,
    #[serde(rename = "srflx")]
    ServerReflexive,
    #[serde(rename = "prflx")]
    PeerReflexive,
    #[serde(rename = "relay")]
    Relay,
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            CandidateType::Host => "host",
            CandidateType::ServerReflexive => "srflx",
            CandidateType::PeerReflexive => "prflx",
            CandidateType::Relay => "relay",
            CandidateType::Unspecified => "Unknown candidate type",
        };
        write!(f, "{s}")
    }
}

impl CandidateType {
    /// Returns the recommended type preference (RFC 8445 Section 5.1.2.2):
    /// 126 for host, 110 for peer-reflexive, 100 for server-reflexive and 0
    /// for relayed candidates.
    #[must_use]
    pub const fn preference(self) -> u16 {
        match self {
            Self::Host => 126,
            Self::PeerReflexive => 110,
            Self::ServerReflexive => 100,
            Self::Relay | Self::Unspecified => 0,
        }
    }
}

/// Transport address related to a candidate, useful for diagnostics.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct CandidateRelatedAddress {
    pub address: String,
    pub port: u16,
}

impl fmt::Display for CandidateRelatedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " related {}:{}", self.address, self.port)
    }
}

/// An ICE candidate: a transport address plus the metadata the pairing and
/// prioritization logic needs. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    foundation: String,
    component: u16,
    transport: String,
    priority: u32,
    address: String,
    port: u16,
    typ: CandidateType,
    related_address: Option<CandidateRelatedAddress>,
    tcp_type: Option<String>,
    generation: u32,
    ufrag: String,
}

/// Common configuration for building candidates of any type.
#[derive(Default)]
pub struct CandidateConfig {
    pub transport: String,
    pub address: String,
    pub port: u16,
    pub component: u16,
    /// 0 means "compute from type preference".
    pub priority: u32,
    /// Empty means "compute from type, base and transport".
    pub foundation: String,
    pub typ: CandidateType,
    pub related_address: Option<CandidateRelatedAddress>,
    pub generation: u32,
    pub ufrag: String,
}

impl CandidateConfig {
    pub fn new_candidate(mut self) -> Result<Candidate> {
        if self.transport.is_empty() {
            self.transport = "udp".to_owned();
        }
        if self.component == 0 {
            self.component = COMPONENT_RTP;
        }
        if self.typ == CandidateType::Unspecified {
            return Err(Error::ErrUnknownCandidateType);
        }
        let priority = if self.priority == 0 {
            compute_priority(self.typ, DEFAULT_LOCAL_PREFERENCE, self.component)
        } else {
            self.priority
        };
        let foundation = if self.foundation.is_empty() {
            compute_foundation(self.typ, &self.address, &self.transport)
        } else {
            self.foundation
        };
        Ok(Candidate {
            foundation,
            component: self.component,
            transport: self.transport,
            priority,
            address: self.address,
            port: self.port,
            typ: self.typ,
            related_address: self.related_address,
            tcp_type: None,
            generation: self.generation,
            ufrag: self.ufrag,
        })
    }
}

/// `priority = (2^24)*(type preference) + (2^8)*(local preference) +
/// (256 - component ID)` per RFC 8445 Section 5.1.2.1.
pub fn compute_priority(typ: CandidateType, local_preference: u16, component: u16) -> u32 {
    (1 << 24) * u32::from(typ.preference())
        + (1 << 8) * u32::from(local_preference)
        + (256 - u32::from(component))
}

/// Foundation groups candidates that share type, base address and transport
/// (RFC 8445 Section 5.1.1.3).
fn compute_foundation(typ: CandidateType, address: &str, transport: &str) -> String {
    const ISO_HDLC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
    let input = format!("{typ}{address}{transport}");
    ISO_HDLC.checksum(input.as_bytes()).to_string()
}

impl Candidate {
    pub fn foundation(&self) -> &str {
        &self.foundation
    }

    pub fn component(&self) -> u16 {
        self.component
    }

    pub fn transport(&self) -> &str {
        &self.transport
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn candidate_type(&self) -> CandidateType {
        self.typ
    }

    pub fn related_address(&self) -> Option<&CandidateRelatedAddress> {
        self.related_address.as_ref()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn ufrag(&self) -> &str {
        &self.ufrag
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .address
            .parse()
            .map_err(|_| Error::ErrAddressParseFailed)?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Whether both candidates belong to the same address family.
    pub fn same_family(&self, other: &Candidate) -> bool {
        let a = self.address.parse::<IpAddr>();
        let b = other.address.parse::<IpAddr>();
        matches!(
            (a, b),
            (Ok(IpAddr::V4(_)), Ok(IpAddr::V4(_))) | (Ok(IpAddr::V6(_)), Ok(IpAddr::V6(_)))
        )
    }

    /// Serializes to the SDP `candidate:` attribute value grammar
    /// (RFC 8839 Section 5.1).
    pub fn marshal(&self) -> String {
        let mut s = format!(
            "{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component,
            self.transport,
            self.priority,
            self.address,
            self.port,
            self.typ,
        );
        if let Some(related) = &self.related_address {
            s.push_str(&format!(" raddr {} rport {}", related.address, related.port));
        }
        if let Some(tcp_type) = &self.tcp_type {
            s.push_str(&format!(" tcptype {tcp_type}"));
        }
        s.push_str(&format!(" generation {}", self.generation));
        if !self.ufrag.is_empty() {
            s.push_str(&format!(" ufrag {}", self.ufrag));
        }
        s
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}{}",
            self.typ,
            self.priority,
            self.address,
            self.port,
            self.related_address
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_default(),
        )
    }
}

/// Parses the SDP `candidate:` attribute value grammar. Accepts the value
/// with or without the leading "candidate:" prefix.
pub fn unmarshal_candidate(raw: &str) -> Result<Candidate> {
    let raw = raw.strip_prefix("candidate:").unwrap_or(raw);
    let split: Vec<&str> = raw.split_whitespace().collect();
    if split.len() < 8 {
        return Err(Error::ErrAttributeTooShortIceCandidate);
    }

    let foundation = split[0].to_owned();
    let component: u16 = split[1].parse().map_err(|_| Error::ErrParseComponent)?;
    let transport = split[2].to_lowercase();
    let priority: u32 = split[3].parse().map_err(|_| Error::ErrParsePriority)?;
    let address = split[4].to_owned();
    let port: u16 = split[5].parse().map_err(|_| Error::ErrParsePort)?;

    if split[6] != "typ" {
        return Err(Error::ErrParseType);
    }
    let typ = match split[7] {
        "host" => CandidateType::Host,
        "srflx" => CandidateType::ServerReflexive,
        "prflx" => CandidateType::PeerReflexive,
        "relay" => CandidateType::Relay,
        _ => return Err(Error::ErrUnknownCandidateType),
    };

    let mut related_address = None;
    let mut tcp_type = None;
    let mut generation = 0u32;
    let mut ufrag = String::new();

    let mut i = 8;
    while i < split.len() {
        match split[i] {
            "raddr" => {
                if i + 3 >= split.len() || split[i + 2] != "rport" {
                    return Err(Error::ErrParseRelatedAddr);
                }
                let rport: u16 = split[i + 3].parse().map_err(|_| Error::ErrParsePort)?;
                related_address = Some(CandidateRelatedAddress {
                    address: split[i + 1].to_owned(),
                    port: rport,
                });
                i += 4;
            }
            "tcptype" => {
                if i + 1 >= split.len() {
                    return Err(Error::ErrParseType);
                }
                tcp_type = Some(split[i + 1].to_owned());
                i += 2;
            }
            "generation" => {
                if i + 1 >= split.len() {
                    return Err(Error::ErrAttributeTooShortIceCandidate);
                }
                generation = split[i + 1].parse().unwrap_or(0);
                i += 2;
            }
            "ufrag" => {
                if i + 1 >= split.len() {
                    return Err(Error::ErrAttributeTooShortIceCandidate);
                }
                ufrag = split[i + 1].to_owned();
                i += 2;
            }
            _ => {
                // Unknown extension key/value, skip the pair.
                i += 2;
            }
        }
    }

    Ok(Candidate {
        foundation,
        component,
        transport,
        priority,
        address,
        port,
        typ,
        related_address,
        tcp_type,
        generation,
        ufrag,
    })
}
