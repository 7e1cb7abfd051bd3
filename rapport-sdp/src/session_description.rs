use std::fmt;

use rand::Rng;
use shared::error::{Error, Result};

use crate::media_description::MediaDescription;

/// One `a=` line: a key with an optional value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Attribute {
            key: key.into(),
            value,
        }
    }

    pub fn property(key: impl Into<String>) -> Self {
        Attribute {
            key: key.into(),
            value: None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}:{}", self.key, value),
            None => write!(f, "{}", self.key),
        }
    }
}

/// The `o=` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub username: String,
    pub session_id: u64,
    pub session_version: u64,
    pub network_type: String,
    pub address_type: String,
    pub unicast_address: String,
}

impl Default for Origin {
    fn default() -> Self {
        let mut rng = rand::thread_rng();
        Origin {
            username: "-".to_owned(),
            session_id: rng.gen::<u64>() >> 2,
            session_version: 2,
            network_type: "IN".to_owned(),
            address_type: "IP4".to_owned(),
            unicast_address: "0.0.0.0".to_owned(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.username,
            self.session_id,
            self.session_version,
            self.network_type,
            self.address_type,
            self.unicast_address,
        )
    }
}

/// A parsed session description (RFC 8866). Line order within each media
/// section is preserved across parse/marshal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub origin: Origin,
    pub session_name: String,
    pub timing: String,
    pub attributes: Vec<Attribute>,
    pub media_descriptions: Vec<MediaDescription>,
}

impl Default for SessionDescription {
    fn default() -> Self {
        SessionDescription {
            origin: Origin::default(),
            session_name: "-".to_owned(),
            timing: "0 0".to_owned(),
            attributes: vec![],
            media_descriptions: vec![],
        }
    }
}

impl SessionDescription {
    /// Renders the description with CRLF line endings.
    pub fn marshal(&self) -> String {
        let mut out = String::new();
        out.push_str("v=0\r\n");
        out.push_str(&format!("o={}\r\n", self.origin));
        out.push_str(&format!("s={}\r\n", self.session_name));
        out.push_str(&format!("t={}\r\n", self.timing));
        for attribute in &self.attributes {
            out.push_str(&format!("a={attribute}\r\n"));
        }
        for media in &self.media_descriptions {
            out.push_str(&media.marshal());
        }
        out
    }

    /// Parses an SDP blob. CRLF per the RFC, but lenient on bare LF.
    pub fn unmarshal(raw: &str) -> Result<Self> {
        let mut sd = SessionDescription {
            origin: Origin {
                username: String::new(),
                session_id: 0,
                session_version: 0,
                network_type: String::new(),
                address_type: String::new(),
                unicast_address: String::new(),
            },
            session_name: String::new(),
            timing: String::new(),
            attributes: vec![],
            media_descriptions: vec![],
        };

        for line in raw.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let (typ, value) = line
                .split_once('=')
                .ok_or_else(|| Error::SdpInvalidSyntax(line.to_owned()))?;

            match typ {
                "v" => {
                    if value != "0" {
                        return Err(Error::SdpInvalidValue(value.to_owned()));
                    }
                }
                "o" => {
                    let parts: Vec<&str> = value.split_whitespace().collect();
                    if parts.len() != 6 {
                        return Err(Error::SdpInvalidValue(value.to_owned()));
                    }
                    sd.origin = Origin {
                        username: parts[0].to_owned(),
                        session_id: parts[1]
                            .parse()
                            .map_err(|_| Error::SdpInvalidValue(value.to_owned()))?,
                        session_version: parts[2]
                            .parse()
                            .map_err(|_| Error::SdpInvalidValue(value.to_owned()))?,
                        network_type: parts[3].to_owned(),
                        address_type: parts[4].to_owned(),
                        unicast_address: parts[5].to_owned(),
                    };
                }
                "s" => sd.session_name = value.to_owned(),
                "t" => sd.timing = value.to_owned(),
                "m" => {
                    let media = MediaDescription::from_m_line(value)?;
                    sd.media_descriptions.push(media);
                }
                "a" => {
                    let attribute = match value.split_once(':') {
                        Some((key, v)) => Attribute::new(key, Some(v.to_owned())),
                        None => Attribute::property(value),
                    };
                    match sd.media_descriptions.last_mut() {
                        Some(media) => media.attributes.push(attribute),
                        None => sd.attributes.push(attribute),
                    }
                }
                "c" => {
                    if let Some(media) = sd.media_descriptions.last_mut() {
                        media.connection = Some(value.to_owned());
                    }
                }
                // b=, k=, i=, u=, e=, p=, r=, z= are tolerated and dropped.
                _ => {}
            }
        }

        Ok(sd)
    }

    /// First value of a session-level attribute.
    pub fn attribute(&self, key: &str) -> Option<Option<&str>> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_deref())
    }

    /// The mids of the `a=group:BUNDLE` line, in order.
    pub fn bundle_group(&self) -> Vec<String> {
        self.attribute("group")
            .flatten()
            .and_then(|v| v.strip_prefix("BUNDLE").map(|rest| rest.trim().to_owned()))
            .map(|rest| {
                rest.split_whitespace()
                    .map(|s| s.to_owned())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
    }
}
