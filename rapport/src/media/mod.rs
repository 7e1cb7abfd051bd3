
use std::collections::HashMap;

use log::trace;
use rtp::packet::Packet;

/// Default header extension ids this stack negotiates
/// (`a=extmap` lines in every offer).
pub const EXT_ID_MID: u8 = 4;
pub const EXT_ID_RID: u8 = 10;
pub const EXT_ID_REPAIRED_RID: u8 = 11;

pub const EXT_URI_MID: &str = "urn:ietf:params:rtp-hdrext:sdes:mid";
pub const EXT_URI_RID: &str = "urn:ietf:params:rtp-hdrext:sdes:rtp-stream-id";
pub const EXT_URI_REPAIRED_RID: &str = "urn:ietf:params:rtp-hdrext:sdes:repaired-rtp-stream-id";

/// Identity of one inbound RTP stream after demultiplexing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackId {
    pub mid: String,
    /// Simulcast layer; empty for non-simulcast tracks.
    pub rid: String,
}

/// Where a routed packet belongs, plus whether it arrived via RTX repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedPacket {
    pub track: TrackId,
    pub packet: Packet,
    pub repaired: bool,
}

/// Demultiplexes inbound RTP into virtual tracks keyed by (mid, rid).
///
/// Bindings are learned from the MID/RID header extensions on first sight
/// of an SSRC and remembered afterwards, since many packets omit the
/// extensions once the binding is established. RTX streams are recognized
/// by payload type and unwrapped back onto the repaired track.
pub struct RtpRouter {
    /// rtx payload type -> original payload type.
    rtx_payload_types: HashMap<u8, u8>,
    /// learned ssrc -> track binding.
    bindings: HashMap<u32, TrackId>,
    /// learned rtx ssrc -> original ssrc.
    rtx_ssrcs: HashMap<u32, u32>,
}

impl RtpRouter {
    pub fn new() -> Self {
        RtpRouter {
            rtx_payload_types: HashMap::new(),
            bindings: HashMap::new(),
            rtx_ssrcs: HashMap::new(),
        }
    }

    /// Registers an RTX association: `apt` is the payload type being
    /// repaired, `rtx_pt` the one carrying retransmissions.
    pub fn set_rtx_payload_type(&mut self, rtx_pt: u8, apt: u8) {
        self.rtx_payload_types.insert(rtx_pt, apt);
    }

    fn extension_str(packet: &Packet, id: u8) -> Option<String> {
        packet
            .header
            .get_extension(id)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// Routes one parsed RTP packet; returns None until the stream can be
    /// attributed to a track.
    pub fn route(&mut self, packet: Packet) -> Option<RoutedPacket> {
        let ssrc = packet.header.ssrc;

        // RTX path: restore the original packet first.
        if let Some(&apt) = self.rtx_payload_types.get(&packet.header.payload_type) {
            let original_ssrc = match self.rtx_ssrcs.get(&ssrc) {
                Some(s) => *s,
                None => {
                    // repaired-rtp-stream-id tells us which track this
                    // repair stream belongs to.
                    let repaired_rid =
                        Self::extension_str(&packet, EXT_ID_REPAIRED_RID).unwrap_or_default();
                    let mid = Self::extension_str(&packet, EXT_ID_MID).unwrap_or_default();
                    let original = self
                        .bindings
                        .iter()
                        .find(|(_, t)| {
                            (mid.is_empty() || t.mid == mid)
                                && (repaired_rid.is_empty() || t.rid == repaired_rid)
                        })
                        .map(|(s, _)| *s)?;
                    self.rtx_ssrcs.insert(ssrc, original);
                    original
                }
            };

            let restored = rtp::rtx::unwrap_rtx(&packet, original_ssrc, apt).ok()?;
            let track = self.bindings.get(&original_ssrc)?.clone();
            return Some(RoutedPacket {
                track,
                packet: restored,
                repaired: true,
            });
        }

        if let Some(track) = self.bindings.get(&ssrc) {
            return Some(RoutedPacket {
                track: track.clone(),
                packet,
                repaired: false,
            });
        }

        // Learn the binding from header extensions.
        let mid = Self::extension_str(&packet, EXT_ID_MID)?;
        let rid = Self::extension_str(&packet, EXT_ID_RID).unwrap_or_default();
        let track = TrackId { mid, rid };
        trace!("learned rtp binding ssrc={ssrc} -> {track:?}");
        self.bindings.insert(ssrc, track.clone());
        Some(RoutedPacket {
            track,
            packet,
            repaired: false,
        })
    }

    /// Pre-seeds a binding from SDP `a=ssrc` signaling.
    pub fn bind_ssrc(&mut self, ssrc: u32, mid: String, rid: String) {
        self.bindings.insert(ssrc, TrackId { mid, rid });
    }
}

impl Default for RtpRouter {
    fn default() -> Self {
        RtpRouter::new()
    }
}

/// Convenience for tests and senders: stamps MID/RID extensions on an
/// outbound packet.
pub fn stamp_extensions(
    packet: &mut Packet,
    mid: &str,
    rid: Option<&str>,
) -> shared::error::Result<()> {
    packet
        .header
        .set_extension(EXT_ID_MID, mid.as_bytes().to_vec())?;
    if let Some(rid) = rid {
        packet
            .header
            .set_extension(EXT_ID_RID, rid.as_bytes().to_vec())?;
    }
    Ok(())
}
