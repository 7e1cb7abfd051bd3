use sdp::media_description::MediaDescription;
use sdp::session_description::{Attribute, SessionDescription};
use shared::error::{Error, Result};

use crate::media::{
    EXT_ID_MID, EXT_ID_REPAIRED_RID, EXT_ID_RID, EXT_URI_MID, EXT_URI_REPAIRED_RID, EXT_URI_RID,
};
use crate::peer_connection::configuration::RTCRtpCodecParameters;
use crate::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverKind};

/// The DTLS role offered/selected in `a=setup` (RFC 4145 / RFC 5763).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupRole {
    Actpass,
    Active,
    Passive,
}

impl SetupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupRole::Actpass => "actpass",
            SetupRole::Active => "active",
            SetupRole::Passive => "passive",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "actpass" => Ok(SetupRole::Actpass),
            "active" => Ok(SetupRole::Active),
            "passive" => Ok(SetupRole::Passive),
            other => Err(Error::SdpInvalidValue(other.to_owned())),
        }
    }
}

/// Everything the transport setup needs out of a remote description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTransportParams {
    pub ice_ufrag: String,
    pub ice_pwd: String,
    pub fingerprint: String,
    pub setup: SetupRole,
    pub sctp_port: Option<u16>,
    pub max_message_size: Option<u32>,
}

/// Validates the transport-level invariants of a remote description and
/// extracts its parameters (first media section; BUNDLE shares one
/// transport).
pub fn extract_transport_params(parsed: &SessionDescription) -> Result<RemoteTransportParams> {
    let session_attr = |key: &str| parsed.attribute(key).flatten().map(|s| s.to_owned());
    let media_attr = |key: &str| {
        parsed
            .media_descriptions
            .iter()
            .find_map(|m| m.attribute(key).flatten())
            .map(|s| s.to_owned())
    };

    let ice_ufrag = media_attr("ice-ufrag")
        .or_else(|| session_attr("ice-ufrag"))
        .ok_or(Error::ErrSessionDescriptionMissingIceUfrag)?;
    let ice_pwd = media_attr("ice-pwd")
        .or_else(|| session_attr("ice-pwd"))
        .ok_or(Error::ErrSessionDescriptionMissingIcePwd)?;

    let fingerprint_line = media_attr("fingerprint")
        .or_else(|| session_attr("fingerprint"))
        .ok_or(Error::ErrSessionDescriptionNoFingerprint)?;
    let fingerprint = match fingerprint_line.split_once(' ') {
        Some(("sha-256", value)) => value.to_owned(),
        _ => return Err(Error::ErrSessionDescriptionInvalidFingerprint),
    };

    let setup_raw = media_attr("setup")
        .or_else(|| session_attr("setup"))
        .ok_or_else(|| Error::SdpInvalidValue("missing a=setup".to_owned()))?;
    let setup = SetupRole::parse(&setup_raw)?;

    let sctp_port = parsed
        .media_descriptions
        .iter()
        .find(|m| m.media == "application")
        .and_then(|m| m.attribute("sctp-port").flatten())
        .and_then(|v| v.parse::<u16>().ok());
    let max_message_size = parsed
        .media_descriptions
        .iter()
        .find_map(|m| m.attribute("max-message-size").flatten())
        .and_then(|v| v.parse::<u32>().ok());

    // Every m-section must carry a mid and be a BUNDLE member.
    let bundle = parsed.bundle_group();
    for media in &parsed.media_descriptions {
        let mid = media
            .mid()
            .ok_or(Error::ErrSessionDescriptionMissingMid)?;
        if !bundle.is_empty() && !bundle.iter().any(|m| m == mid) {
            return Err(Error::ErrSessionDescriptionUnknownBundleMid);
        }
    }

    Ok(RemoteTransportParams {
        ice_ufrag,
        ice_pwd,
        fingerprint,
        setup,
        sctp_port,
        max_message_size,
    })
}

pub struct TransportDetails<'a> {
    pub ice_ufrag: &'a str,
    pub ice_pwd: &'a str,
    pub fingerprint: &'a str,
    pub setup: SetupRole,
}

fn push_transport_attributes(media: &mut MediaDescription, t: &TransportDetails<'_>) {
    media
        .attributes
        .push(Attribute::new("ice-ufrag", Some(t.ice_ufrag.to_owned())));
    media
        .attributes
        .push(Attribute::new("ice-pwd", Some(t.ice_pwd.to_owned())));
    media.attributes.push(Attribute::new(
        "fingerprint",
        Some(format!("sha-256 {}", t.fingerprint)),
    ));
    media
        .attributes
        .push(Attribute::new("setup", Some(t.setup.as_str().to_owned())));
}

/// Builds the m-section for one transceiver.
pub fn build_media_section(
    mid: &str,
    transceiver: &RTCRtpTransceiver,
    codecs: &[RTCRtpCodecParameters],
    transport: &TransportDetails<'_>,
    cname: &str,
) -> MediaDescription {
    let kind = match transceiver.kind {
        RTCRtpTransceiverKind::Audio => "audio",
        RTCRtpTransceiverKind::Video => "video",
    };
    let formats: Vec<String> = codecs.iter().map(|c| c.payload_type.to_string()).collect();
    let mut media = MediaDescription::new(kind, vec!["UDP", "TLS", "RTP", "SAVPF"], formats);
    media
        .attributes
        .push(Attribute::new("mid", Some(mid.to_owned())));
    push_transport_attributes(&mut media, transport);
    media.attributes.push(Attribute::property("rtcp-mux"));
    media.attributes.push(Attribute::new(
        "extmap",
        Some(format!("{EXT_ID_MID} {EXT_URI_MID}")),
    ));
    media.attributes.push(Attribute::new(
        "extmap",
        Some(format!("{EXT_ID_RID} {EXT_URI_RID}")),
    ));
    media.attributes.push(Attribute::new(
        "extmap",
        Some(format!("{EXT_ID_REPAIRED_RID} {EXT_URI_REPAIRED_RID}")),
    ));
    media
        .attributes
        .push(Attribute::property(&*transceiver.direction.to_string()));

    for codec in codecs {
        let encoding = codec
            .mime_type
            .split_once('/')
            .map(|(_, e)| e)
            .unwrap_or(&codec.mime_type);
        let mut rtpmap = format!("{} {}/{}", codec.payload_type, encoding, codec.clock_rate);
        if codec.channels > 0 {
            rtpmap.push_str(&format!("/{}", codec.channels));
        }
        media
            .attributes
            .push(Attribute::new("rtpmap", Some(rtpmap)));
        for feedback in &codec.rtcp_feedback {
            media.attributes.push(Attribute::new(
                "rtcp-fb",
                Some(format!("{} {feedback}", codec.payload_type)),
            ));
        }
        if !codec.parameters.is_empty() {
            let mut params: Vec<String> = codec
                .parameters
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            params.sort();
            media.attributes.push(Attribute::new(
                "fmtp",
                Some(format!("{} {}", codec.payload_type, params.join(";"))),
            ));
        }
    }

    // Simulcast receive layers.
    if !transceiver.recv_rids.is_empty() {
        for rid in &transceiver.recv_rids {
            media
                .attributes
                .push(Attribute::new("rid", Some(format!("{rid} recv"))));
        }
        media.attributes.push(Attribute::new(
            "simulcast",
            Some(format!("recv {}", transceiver.recv_rids.join(";"))),
        ));
    }

    media.attributes.push(Attribute::new(
        "ssrc",
        Some(format!("{} cname:{cname}", transceiver.sender_ssrc)),
    ));
    media
}

/// Builds the `application` m-section for the SCTP transport.
pub fn build_application_section(
    mid: &str,
    transport: &TransportDetails<'_>,
    sctp_port: u16,
    max_message_size: u32,
) -> MediaDescription {
    let mut media = MediaDescription::new(
        "application",
        vec!["UDP", "DTLS", "SCTP"],
        vec!["webrtc-datachannel".to_owned()],
    );
    media
        .attributes
        .push(Attribute::new("mid", Some(mid.to_owned())));
    push_transport_attributes(&mut media, transport);
    media
        .attributes
        .push(Attribute::new("sctp-port", Some(sctp_port.to_string())));
    media.attributes.push(Attribute::new(
        "max-message-size",
        Some(max_message_size.to_string()),
    ));
    media
}
