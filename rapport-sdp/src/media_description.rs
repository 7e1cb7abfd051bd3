use shared::error::{Error, Result};

use crate::session_description::Attribute;

/// One `m=` section with its connection line and attributes, order
/// preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescription {
    /// "audio", "video" or "application".
    pub media: String,
    pub port: u16,
    /// Protocol stack, e.g. ["UDP", "TLS", "RTP", "SAVPF"].
    pub protos: Vec<String>,
    /// Payload types or the application format ("webrtc-datachannel").
    pub formats: Vec<String>,
    pub connection: Option<String>,
    pub attributes: Vec<Attribute>,
}

impl MediaDescription {
    pub fn new(media: impl Into<String>, protos: Vec<&str>, formats: Vec<String>) -> Self {
        MediaDescription {
            media: media.into(),
            port: 9,
            protos: protos.into_iter().map(|p| p.to_owned()).collect(),
            formats,
            connection: Some("IN IP4 0.0.0.0".to_owned()),
            attributes: vec![],
        }
    }

    pub(crate) fn from_m_line(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(Error::SdpInvalidValue(value.to_owned()));
        }
        Ok(MediaDescription {
            media: parts[0].to_owned(),
            port: parts[1]
                .parse()
                .map_err(|_| Error::SdpInvalidValue(value.to_owned()))?,
            protos: parts[2].split('/').map(|p| p.to_owned()).collect(),
            formats: parts[3..].iter().map(|f| (*f).to_owned()).collect(),
            connection: None,
            attributes: vec![],
        })
    }

    pub fn marshal(&self) -> String {
        let mut out = format!(
            "m={} {} {} {}\r\n",
            self.media,
            self.port,
            self.protos.join("/"),
            self.formats.join(" "),
        );
        if let Some(connection) = &self.connection {
            out.push_str(&format!("c={connection}\r\n"));
        }
        for attribute in &self.attributes {
            out.push_str(&format!("a={attribute}\r\n"));
        }
        out
    }

    /// First value of an attribute in this section.
    pub fn attribute(&self, key: &str) -> Option<Option<&str>> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_deref())
    }

    /// All values of a repeated attribute (e.g. `a=candidate`, `a=rid`).
    pub fn attributes_of(&self, key: &str) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|a| a.key == key)
            .filter_map(|a| a.value.as_deref())
            .collect()
    }

    pub fn mid(&self) -> Option<&str> {
        self.attribute("mid").flatten()
    }

    pub fn with_attribute(mut self, key: &str, value: Option<String>) -> Self {
        self.attributes.push(Attribute::new(key, value));
        self
    }
}
