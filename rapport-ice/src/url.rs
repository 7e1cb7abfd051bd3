use std::fmt;

use shared::error::{Error, Result};

/// The scheme of an ICE server URL.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SchemeType {
    #[default]
    Stun,
    Stuns,
    Turn,
    Turns,
}

impl SchemeType {
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "stun" => Ok(SchemeType::Stun),
            "stuns" => Ok(SchemeType::Stuns),
            "turn" => Ok(SchemeType::Turn),
            "turns" => Ok(SchemeType::Turns),
            _ => Err(Error::ErrSchemeType),
        }
    }
}

impl fmt::Display for SchemeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            SchemeType::Stun => "stun",
            SchemeType::Stuns => "stuns",
            SchemeType::Turn => "turn",
            SchemeType::Turns => "turns",
        };
        write!(f, "{s}")
    }
}

/// A parsed `stun:`/`turn:` server URL (RFC 7064 / RFC 7065).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Url {
    pub scheme: SchemeType,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Url {
    /// Parses a URL of the form `scheme:host[:port][?transport=udp]`.
    pub fn parse_url(raw: &str) -> Result<Self> {
        // stun/turn URLs carry no authority slashes, which trips generic URL
        // parsers; normalize before handing off.
        let (scheme_str, rest) = raw.split_once(':').ok_or(Error::ErrInvalidUrl)?;
        let scheme = SchemeType::from_str(scheme_str)?;

        let rest = match rest.split_once('?') {
            Some((host_port, query)) => {
                if matches!(scheme, SchemeType::Stun | SchemeType::Stuns) {
                    return Err(Error::ErrStunQuery);
                }
                if !query.starts_with("transport=") {
                    return Err(Error::ErrInvalidUrl);
                }
                host_port
            }
            None => rest,
        };

        let (host, port) = match rest.rsplit_once(':') {
            // Bracketed IPv6 literals keep their colons.
            Some((h, p)) if !h.is_empty() && !p.contains(']') => {
                (h.to_owned(), p.parse::<u16>().map_err(|_| Error::ErrParsePort)?)
            }
            _ => {
                let default_port = match scheme {
                    SchemeType::Stun | SchemeType::Turn => 3478,
                    SchemeType::Stuns | SchemeType::Turns => 5349,
                };
                (rest.to_owned(), default_port)
            }
        };
        if host.is_empty() {
            return Err(Error::ErrHost);
        }

        Ok(Url {
            scheme,
            host: host.trim_start_matches('[').trim_end_matches(']').to_owned(),
            port,
            username: String::new(),
            password: String::new(),
        })
    }

    pub fn is_turn(&self) -> bool {
        matches!(self.scheme, SchemeType::Turn | SchemeType::Turns)
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.scheme, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url() {
        let u = Url::parse_url("stun:stun.l.google.com:19302").unwrap();
        assert_eq!(u.scheme, SchemeType::Stun);
        assert_eq!(u.host, "stun.l.google.com");
        assert_eq!(u.port, 19302);

        let u = Url::parse_url("turn:turn.example.org").unwrap();
        assert_eq!(u.scheme, SchemeType::Turn);
        assert_eq!(u.port, 3478);

        let u = Url::parse_url("turns:turn.example.org?transport=udp").unwrap();
        assert_eq!(u.scheme, SchemeType::Turns);
        assert_eq!(u.port, 5349);

        assert!(Url::parse_url("stun:server?transport=udp").is_err());
        assert!(Url::parse_url("http:server").is_err());
        assert!(Url::parse_url("stun:").is_err());
    }
}
