#[cfg(test)]
mod peer_connection_test;

pub mod certificate;
pub mod configuration;
pub mod event;
pub mod policy;
pub mod sdp;
pub mod sdp_type;
pub mod state;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use log::{debug, trace, warn};

use datachannel::data_channel::{DataChannel, DataChannelConfig, DataChannelEvent};
use dtls::config::{Config as DtlsConfig, DtlsRole};
use dtls::endpoint::{Endpoint as DtlsEndpoint, EndpointEvent as DtlsEvent};
use ice::agent::agent_config::AgentConfig as IceAgentConfig;
use ice::agent::{Agent as IceAgent, AgentEvent as IceEvent};
use ice::candidate::unmarshal_candidate;
use ice::connection_state::{ConnectionState as IceConnectionState, GatheringState};
use sctp::association::{Association, AssociationConfig, AssociationEvent};
use sctp::chunk::chunk_payload_data::PayloadProtocolIdentifier;
use ::sdp::session_description::{Attribute, SessionDescription};
use shared::crypto::KeyingMaterialExporter;
use shared::error::{Error, Result};
use srtp::{Context as SrtpContext, ProtectionProfile};

use crate::handler::demuxer::{demux, is_rtcp};
use crate::media::RtpRouter;
use crate::messages::{DTLSMessageEvent, RTCMessageEvent, RTPMessageEvent, STUNMessageEvent};
use crate::rtp_transceiver::{
    RTCRtpTransceiver, RTCRtpTransceiverDirection, RTCRtpTransceiverKind,
};

use certificate::RTCCertificate;
use configuration::RTCConfiguration;
use event::RTCPeerConnectionEvent;
use self::sdp::{
    build_application_section, build_media_section, extract_transport_params, SetupRole,
    TransportDetails,
};
use sdp_type::{RTCSdpType, RTCSessionDescription};
use state::{
    check_next_signaling_state, RTCPeerConnectionState, RTCSignalingState, StateChangeOp,
};

const UNASSIGNED_STREAM_ID: u16 = u16::MAX;

/// One datagram to put on the wire from `local` towards `remote`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    pub local: SocketAddr,
    pub remote: SocketAddr,
    pub message: Vec<u8>,
}

/// A sans-IO WebRTC peer connection: one ICE agent, one DTLS transport
/// carrying SRTP keys and the SCTP association, the transceiver and data
/// channel collections, and the offer/answer controller on top.
///
/// The embedder owns sockets and the clock: it feeds datagrams to
/// [`handle_read`](RTCPeerConnection::handle_read), flushes
/// [`poll_transmit`](RTCPeerConnection::poll_transmit), drives
/// [`handle_timeout`](RTCPeerConnection::handle_timeout) and drains
/// [`poll_event`](RTCPeerConnection::poll_event).
pub struct RTCPeerConnection {
    configuration: RTCConfiguration,
    certificate: RTCCertificate,
    cname: String,

    signaling_state: RTCSignalingState,
    connection_state: RTCPeerConnectionState,

    ice_agent: IceAgent,
    dtls: Option<DtlsEndpoint>,
    dtls_role: Option<DtlsRole>,
    dtls_started: bool,
    sctp: Option<Association>,
    srtp_tx: Option<SrtpContext>,
    srtp_rx: Option<SrtpContext>,
    router: RtpRouter,

    transceivers: Vec<RTCRtpTransceiver>,
    transceiver_mids_snapshot: Option<Vec<Option<String>>>,
    data_channels: HashMap<u16, DataChannel>,
    next_stream_id: Option<u16>,

    current_local_description: Option<RTCSessionDescription>,
    current_remote_description: Option<RTCSessionDescription>,
    pending_local_description: Option<RTCSessionDescription>,
    pending_remote_description: Option<RTCSessionDescription>,
    remote_fingerprint: Option<String>,
    remote_sctp_port: u16,

    negotiation_needed: bool,
    negotiation_event_pending: bool,

    selected_pair: Option<(SocketAddr, SocketAddr)>,
    seen_ssrc_list: Vec<u32>,
    transmits: std::collections::VecDeque<Transmit>,
    events: std::collections::VecDeque<RTCPeerConnectionEvent>,
    closed: bool,
}

impl RTCPeerConnection {
    pub fn new(mut configuration: RTCConfiguration) -> Result<Self> {
        configuration.assign_payload_types();
        let certificate = match configuration.certificate.clone() {
            Some(certificate) => certificate,
            None => RTCCertificate::generate()?,
        };

        let mut stun_servers = vec![];
        for server in &configuration.ice_servers {
            stun_servers.extend(server.resolved.iter().copied());
        }
        let ice_agent = IceAgent::new(IceAgentConfig {
            stun_servers,
            ..Default::default()
        });

        Ok(RTCPeerConnection {
            configuration,
            certificate,
            cname: shared::util::generate_rand_string(16),
            signaling_state: RTCSignalingState::Stable,
            connection_state: RTCPeerConnectionState::New,
            ice_agent,
            dtls: None,
            dtls_role: None,
            dtls_started: false,
            sctp: None,
            srtp_tx: None,
            srtp_rx: None,
            router: RtpRouter::new(),
            transceivers: vec![],
            transceiver_mids_snapshot: None,
            data_channels: HashMap::new(),
            next_stream_id: None,
            current_local_description: None,
            current_remote_description: None,
            pending_local_description: None,
            pending_remote_description: None,
            remote_fingerprint: None,
            remote_sctp_port: sctp::DEFAULT_SCTP_PORT,
            negotiation_needed: false,
            negotiation_event_pending: false,
            selected_pair: None,
            seen_ssrc_list: vec![],
            transmits: std::collections::VecDeque::new(),
            events: std::collections::VecDeque::new(),
            closed: false,
        })
    }

    // --- accessors -------------------------------------------------------

    pub fn signaling_state(&self) -> RTCSignalingState {
        self.signaling_state
    }

    pub fn connection_state(&self) -> RTCPeerConnectionState {
        self.connection_state
    }

    pub fn ice_connection_state(&self) -> IceConnectionState {
        self.ice_agent.connection_state()
    }

    pub fn ice_gathering_state(&self) -> GatheringState {
        self.ice_agent.gathering_state()
    }

    /// Candidate generation, incremented by every ICE restart.
    pub fn ice_generation(&self) -> u32 {
        self.ice_agent.generation()
    }

    pub fn get_configuration(&self) -> &RTCConfiguration {
        &self.configuration
    }

    /// Replaces the configuration; only codec/server fields may change after
    /// construction.
    pub fn set_configuration(&mut self, configuration: RTCConfiguration) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        self.configuration = configuration;
        self.configuration.assign_payload_types();
        Ok(())
    }

    pub fn local_description(&self) -> Option<&RTCSessionDescription> {
        self.pending_local_description
            .as_ref()
            .or(self.current_local_description.as_ref())
    }

    pub fn remote_description(&self) -> Option<&RTCSessionDescription> {
        self.pending_remote_description
            .as_ref()
            .or(self.current_remote_description.as_ref())
    }

    pub fn transceivers(&self) -> &[RTCRtpTransceiver] {
        &self.transceivers
    }

    pub fn data_channel(&self, stream_id: u16) -> Option<&DataChannel> {
        self.data_channels.get(&stream_id)
    }

    // --- surface operations ----------------------------------------------

    /// Feeds bound local socket addresses and starts candidate gathering.
    pub fn start_gathering(&mut self, local_addrs: &[SocketAddr], now: Instant) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        self.ice_agent.gather_candidates(local_addrs, now)?;
        self.pump_ice_events(now);
        Ok(())
    }

    pub fn add_transceiver(
        &mut self,
        kind: RTCRtpTransceiverKind,
        direction: RTCRtpTransceiverDirection,
    ) -> Result<usize> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        self.transceivers
            .push(RTCRtpTransceiver::new(kind, direction));
        self.mark_negotiation_needed();
        Ok(self.transceivers.len() - 1)
    }

    /// Declares inbound simulcast layers for a transceiver.
    pub fn set_recv_rids(&mut self, index: usize, rids: Vec<String>) -> Result<()> {
        let transceiver = self
            .transceivers
            .get_mut(index)
            .ok_or(Error::ErrCodecNotFound)?;
        transceiver.recv_rids = rids;
        self.mark_negotiation_needed();
        Ok(())
    }

    /// Creates a data channel, returning the handle used with
    /// `send_text`/`send_binary`. The SCTP stream id is assigned once the
    /// DTLS role is known (odd for the DTLS client side).
    pub fn create_data_channel(&mut self, config: DataChannelConfig) -> Result<u16> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        config.validate()?;

        let stream_id = match config.negotiated {
            Some(id) => id,
            None => self.allocate_stream_id()?,
        };
        let channel = DataChannel::dial(config, stream_id)?;
        let first = self.data_channels.is_empty();
        self.data_channels.insert(stream_id, channel);
        if first {
            self.mark_negotiation_needed();
        }
        self.flush_data_channels();
        Ok(stream_id)
    }

    pub fn send_text(&mut self, stream_id: u16, text: &str) -> Result<()> {
        let channel = self
            .data_channels
            .get_mut(&stream_id)
            .ok_or(Error::ErrDataChannelNotOpen)?;
        channel.send_text(text)?;
        self.flush_data_channels();
        Ok(())
    }

    pub fn send_binary(&mut self, stream_id: u16, data: Bytes) -> Result<()> {
        let channel = self
            .data_channels
            .get_mut(&stream_id)
            .ok_or(Error::ErrDataChannelNotOpen)?;
        channel.send_binary(data)?;
        self.flush_data_channels();
        Ok(())
    }

    /// Gracefully closes one data channel; the peer connection stays up.
    pub fn close_data_channel(&mut self, stream_id: u16) -> Result<()> {
        let channel = self
            .data_channels
            .get_mut(&stream_id)
            .ok_or(Error::ErrDataChannelNotOpen)?;
        channel.close();
        if let Some(sctp) = &mut self.sctp {
            let _ = sctp.reset_stream(stream_id);
        }
        channel.on_stream_reset();
        self.pump_data_channel_events();
        self.pump_transports(Instant::now());
        Ok(())
    }

    /// Produces an SDP offer covering every transceiver plus the data
    /// channel transport. Mids are allocated here and never change once
    /// negotiated.
    pub fn create_offer(&mut self) -> Result<RTCSessionDescription> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        self.assign_mids();
        let sdp = self.build_session_description(SetupRole::Actpass, None)?;
        Ok(RTCSessionDescription::offer(sdp.marshal()))
    }

    /// Produces an answer to the pending remote offer, mirroring its
    /// m-section order.
    pub fn create_answer(&mut self) -> Result<RTCSessionDescription> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        if self.signaling_state != RTCSignalingState::HaveRemoteOffer
            && self.signaling_state != RTCSignalingState::HaveLocalPranswer
        {
            return Err(Error::ErrNoRemoteDescription);
        }
        let remote = self
            .remote_description()
            .cloned()
            .ok_or(Error::ErrNoRemoteDescription)?;
        let remote_parsed = SessionDescription::unmarshal(&remote.sdp)?;
        let sdp = self.build_session_description(SetupRole::Active, Some(&remote_parsed))?;
        Ok(RTCSessionDescription::answer(sdp.marshal()))
    }

    pub fn set_local_description(
        &mut self,
        description: RTCSessionDescription,
        now: Instant,
    ) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        if description.sdp_type == RTCSdpType::Rollback {
            return self.rollback(StateChangeOp::SetLocal);
        }

        let next = check_next_signaling_state(
            self.signaling_state,
            StateChangeOp::SetLocal,
            description.sdp_type,
        )?;

        match description.sdp_type {
            RTCSdpType::Offer => {
                self.snapshot_mids();
                self.pending_local_description = Some(description);
            }
            RTCSdpType::Answer => {
                self.current_local_description = Some(description);
                self.current_remote_description = self.pending_remote_description.take();
                self.pending_local_description = None;
            }
            RTCSdpType::Pranswer => {
                self.pending_local_description = Some(description);
            }
            RTCSdpType::Rollback => unreachable!("handled above"),
        }

        self.set_signaling_state(next);
        if self.signaling_state == RTCSignalingState::Stable {
            self.on_negotiation_complete(now)?;
        }
        self.maybe_emit_negotiation_needed();
        Ok(())
    }

    pub fn set_remote_description(
        &mut self,
        description: RTCSessionDescription,
        now: Instant,
    ) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        if description.sdp_type == RTCSdpType::Rollback {
            return self.rollback(StateChangeOp::SetRemote);
        }

        let next = check_next_signaling_state(
            self.signaling_state,
            StateChangeOp::SetRemote,
            description.sdp_type,
        )?;

        let parsed = SessionDescription::unmarshal(&description.sdp)?;
        let params = extract_transport_params(&parsed)?;

        self.ice_agent
            .set_remote_credentials(params.ice_ufrag.clone(), params.ice_pwd.clone())?;
        self.remote_fingerprint = Some(params.fingerprint.clone());
        if let Some(port) = params.sctp_port {
            self.remote_sctp_port = port;
        }

        // Remote candidates may ride along in the SDP.
        for media in &parsed.media_descriptions {
            for raw in media.attributes_of("candidate") {
                if let Ok(candidate) = unmarshal_candidate(raw) {
                    self.ice_agent.add_remote_candidate(candidate);
                }
            }
        }

        // Mirror remote media sections into transceivers.
        if description.sdp_type == RTCSdpType::Offer {
            self.snapshot_mids();
            for media in &parsed.media_descriptions {
                let Some(mid) = media.mid() else { continue };
                if media.media == "application" {
                    continue;
                }
                let known = self
                    .transceivers
                    .iter()
                    .any(|t| t.mid() == Some(mid));
                if !known {
                    let kind = if media.media == "audio" {
                        RTCRtpTransceiverKind::Audio
                    } else {
                        RTCRtpTransceiverKind::Video
                    };
                    let remote_direction: RTCRtpTransceiverDirection = media
                        .attributes
                        .iter()
                        .find_map(|a| match a.key.as_str() {
                            "sendrecv" | "sendonly" | "recvonly" | "inactive" => {
                                Some(a.key.as_str().into())
                            }
                            _ => None,
                        })
                        .unwrap_or_default();
                    let mut transceiver = RTCRtpTransceiver::new(kind, remote_direction.reverse());
                    transceiver.set_mid(mid.to_owned());
                    self.transceivers.push(transceiver);
                }
            }
        }

        // The remote's answer decides our DTLS role; its offer lets us pick.
        match (description.sdp_type, params.setup) {
            (RTCSdpType::Answer, SetupRole::Active) => {
                self.dtls_role = Some(DtlsRole::Server);
            }
            (RTCSdpType::Answer, SetupRole::Passive) => {
                self.dtls_role = Some(DtlsRole::Client);
            }
            (RTCSdpType::Offer, _) => {
                // We will answer "active" and play DTLS client.
                self.dtls_role = Some(DtlsRole::Client);
            }
            _ => {}
        }

        match description.sdp_type {
            RTCSdpType::Offer | RTCSdpType::Pranswer => {
                self.pending_remote_description = Some(description);
            }
            RTCSdpType::Answer => {
                self.current_remote_description = Some(description);
                self.current_local_description = self.pending_local_description.take();
                self.pending_remote_description = None;
            }
            RTCSdpType::Rollback => unreachable!("handled above"),
        }

        self.set_signaling_state(next);
        if self.signaling_state == RTCSignalingState::Stable {
            self.on_negotiation_complete(now)?;
        }
        self.maybe_emit_negotiation_needed();
        Ok(())
    }

    /// Adds one remote ICE candidate from trickle signaling.
    pub fn add_ice_candidate(&mut self, candidate: &str) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        if self.remote_description().is_none() {
            return Err(Error::ErrNoRemoteDescription);
        }
        let candidate = unmarshal_candidate(candidate)?;
        self.ice_agent.add_remote_candidate(candidate);
        Ok(())
    }

    /// Regenerates ICE credentials; the next offer carries them (E6).
    pub fn restart_ice(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        self.ice_agent.restart()?;
        self.selected_pair = None;
        self.mark_negotiation_needed();
        self.maybe_emit_negotiation_needed();
        Ok(())
    }

    /// Tears everything down in reverse dependency order: channels, SCTP,
    /// DTLS, ICE. Once closed every operation fails with
    /// [`Error::ErrConnectionClosed`].
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        for transceiver in &mut self.transceivers {
            transceiver.stop();
        }

        let stream_ids: Vec<u16> = self.data_channels.keys().copied().collect();
        for stream_id in stream_ids {
            if let Some(channel) = self.data_channels.get_mut(&stream_id) {
                channel.close();
                if let Some(sctp) = &mut self.sctp {
                    let _ = sctp.reset_stream(stream_id);
                }
                channel.on_stream_reset();
            }
        }
        self.pump_data_channel_events();

        if let Some(sctp) = &mut self.sctp {
            let _ = sctp.shutdown();
        }
        self.pump_transports(Instant::now());

        if let Some(dtls) = &mut self.dtls {
            dtls.close();
        }
        self.forward_dtls_transmits();

        self.ice_agent.close();

        self.set_signaling_state(RTCSignalingState::Closed);
        self.set_connection_state(RTCPeerConnectionState::Closed);
    }

    // --- sans-IO pump ----------------------------------------------------

    /// Feeds one datagram from the single UDP flow.
    pub fn handle_read(
        &mut self,
        local: SocketAddr,
        remote: SocketAddr,
        data: &[u8],
        now: Instant,
    ) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let Some(message) = demux(BytesMut::from(data)) else {
            return Ok(());
        };
        match message {
            RTCMessageEvent::Stun(STUNMessageEvent::Raw(raw)) => {
                if let Err(err) = self.ice_agent.handle_read(local, remote, &raw, now) {
                    debug!("dropping stun packet: {err}");
                }
                self.pump_ice_events(now);
            }
            RTCMessageEvent::Dtls(DTLSMessageEvent::Raw(raw)) => {
                if let Some(dtls) = &mut self.dtls {
                    if let Err(err) = dtls.handle_read(&raw, now) {
                        debug!("dtls error: {err}");
                    }
                }
                self.pump_transports(now);
            }
            RTCMessageEvent::ChannelData(raw) => {
                // Relay traffic is unwrapped by the embedder's TURN client;
                // a direct arrival means misrouted data.
                trace!("ignoring {} bytes of ChannelData", raw.len());
            }
            RTCMessageEvent::Rtp(RTPMessageEvent::Raw(raw)) => {
                self.handle_protected_rtp(&raw);
            }
            _ => {}
        }
        self.pump(now);
        Ok(())
    }

    pub fn handle_timeout(&mut self, now: Instant) {
        if self.closed {
            return;
        }
        self.ice_agent.handle_timeout(now);
        self.pump_ice_events(now);
        if let Some(dtls) = &mut self.dtls {
            dtls.handle_timeout(now);
        }
        if let Some(sctp) = &mut self.sctp {
            sctp.handle_timeout(now);
        }
        self.pump(now);
    }

    pub fn poll_timeout(&mut self) -> Option<Instant> {
        let mut deadline = self.ice_agent.poll_timeout();
        if let Some(dtls) = &self.dtls {
            deadline = min_instant(deadline, dtls.poll_timeout());
        }
        if let Some(sctp) = &self.sctp {
            deadline = min_instant(deadline, sctp.poll_timeout());
        }
        deadline
    }

    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.transmits.pop_front()
    }

    pub fn poll_event(&mut self) -> Option<RTCPeerConnectionEvent> {
        self.events.pop_front()
    }

    /// Protects and queues one outbound RTP packet.
    pub fn send_rtp(&mut self, packet: &rtp::packet::Packet) -> Result<()> {
        let raw = shared::marshal::Marshal::marshal(packet)?;
        let srtp = self.srtp_tx.as_mut().ok_or(Error::ErrHandshakeInProgress)?;
        let protected = srtp.encrypt_rtp(&raw)?;
        self.queue_to_selected_pair(protected.to_vec())
    }

    /// Protects and queues outbound RTCP.
    pub fn send_rtcp(&mut self, packets: &[rtcp::Packet]) -> Result<()> {
        let raw = rtcp::marshal(packets)?;
        let srtp = self.srtp_tx.as_mut().ok_or(Error::ErrHandshakeInProgress)?;
        let protected = srtp.encrypt_rtcp(&raw)?;
        self.queue_to_selected_pair(protected.to_vec())
    }

    // --- internals -------------------------------------------------------

    fn allocate_stream_id(&mut self) -> Result<u16> {
        // Odd ids for the side that sends the DTLS ClientHello, even for
        // the server; before the role is known ids stay provisional.
        let base = match self.dtls_role {
            Some(DtlsRole::Client) => 1,
            Some(DtlsRole::Server) => 0,
            None => return Ok(self.provisional_stream_id()),
        };
        let next = match self.next_stream_id {
            Some(id) => id,
            None => base,
        };
        if next == UNASSIGNED_STREAM_ID {
            return Err(Error::ErrMaxDataChannelId);
        }
        self.next_stream_id = Some(next + 2);
        Ok(next)
    }

    fn provisional_stream_id(&self) -> u16 {
        let mut id = UNASSIGNED_STREAM_ID;
        while self.data_channels.contains_key(&id) {
            id -= 1;
        }
        id
    }

    /// Re-homes provisionally numbered channels once the DTLS role is known.
    fn fix_stream_ids(&mut self) {
        let Some(role) = self.dtls_role else { return };
        let base = if role == DtlsRole::Client { 1 } else { 0 };
        let mut next = match self.next_stream_id {
            Some(id) if id % 2 == base % 2 => id,
            _ => base,
        };
        let provisional: Vec<u16> = self
            .data_channels
            .keys()
            .copied()
            .filter(|id| *id > UNASSIGNED_STREAM_ID - 1024)
            .collect();
        for old_id in provisional {
            if let Some(mut channel) = self.data_channels.remove(&old_id) {
                channel.stream_id = next;
                self.data_channels.insert(next, channel);
                next += 2;
            }
        }
        self.next_stream_id = Some(next);
    }

    fn assign_mids(&mut self) {
        let mut used: Vec<String> = self
            .transceivers
            .iter()
            .filter_map(|t| t.mid().map(|m| m.to_owned()))
            .collect();
        let mut next = 0usize;
        for transceiver in &mut self.transceivers {
            if transceiver.mid().is_some() {
                continue;
            }
            let mut mid = next.to_string();
            while used.contains(&mid) {
                next += 1;
                mid = next.to_string();
            }
            transceiver.set_mid(mid.clone());
            used.push(mid);
            next += 1;
        }
    }

    fn data_channel_mid(&self) -> String {
        let mut n = self.transceivers.len();
        let used: Vec<&str> = self
            .transceivers
            .iter()
            .filter_map(|t| t.mid())
            .collect();
        loop {
            let candidate = n.to_string();
            if !used.contains(&candidate.as_str()) {
                return candidate;
            }
            n += 1;
        }
    }

    fn build_session_description(
        &mut self,
        setup: SetupRole,
        remote: Option<&SessionDescription>,
    ) -> Result<SessionDescription> {
        let (ufrag, pwd) = {
            let (u, p) = self.ice_agent.local_credentials();
            (u.to_owned(), p.to_owned())
        };
        let fingerprint = self.certificate.fingerprint();
        let transport = TransportDetails {
            ice_ufrag: &ufrag,
            ice_pwd: &pwd,
            fingerprint: &fingerprint,
            setup,
        };

        let mut session = SessionDescription::default();
        let mut mids: Vec<String> = vec![];
        let mut sections = vec![];

        match remote {
            Some(remote) => {
                // Answer: mirror the remote m-section order exactly.
                for media in &remote.media_descriptions {
                    let mid = media
                        .mid()
                        .ok_or(Error::ErrSessionDescriptionMissingMid)?
                        .to_owned();
                    if media.media == "application" {
                        sections.push(build_application_section(
                            &mid,
                            &transport,
                            sctp::DEFAULT_SCTP_PORT,
                            self.max_message_size(),
                        ));
                    } else {
                        let transceiver = self
                            .transceivers
                            .iter()
                            .find(|t| t.mid() == Some(mid.as_str()))
                            .ok_or(Error::ErrSessionDescriptionMissingMid)?;
                        let codecs = self.codecs_for(transceiver.kind);
                        sections.push(build_media_section(
                            &mid,
                            transceiver,
                            codecs,
                            &transport,
                            &self.cname,
                        ));
                    }
                    mids.push(mid);
                }
            }
            None => {
                for transceiver in &self.transceivers {
                    let mid = transceiver
                        .mid()
                        .ok_or(Error::ErrSessionDescriptionMissingMid)?
                        .to_owned();
                    let codecs = self.codecs_for(transceiver.kind);
                    sections.push(build_media_section(
                        &mid,
                        transceiver,
                        codecs,
                        &transport,
                        &self.cname,
                    ));
                    mids.push(mid);
                }
                if !self.data_channels.is_empty() {
                    let mid = self.data_channel_mid();
                    sections.push(build_application_section(
                        &mid,
                        &transport,
                        sctp::DEFAULT_SCTP_PORT,
                        self.max_message_size(),
                    ));
                    mids.push(mid);
                }
            }
        }

        if mids.is_empty() {
            // Data-channel-less, media-less descriptions still need one
            // section for the transport; offer a datachannel section.
            let mid = "0".to_owned();
            sections.push(build_application_section(
                &mid,
                &transport,
                sctp::DEFAULT_SCTP_PORT,
                self.max_message_size(),
            ));
            mids.push(mid);
        }

        session.attributes.push(Attribute::new(
            "group",
            Some(format!("BUNDLE {}", mids.join(" "))),
        ));
        session
            .attributes
            .push(Attribute::property("msid-semantic: WMS"));
        session.media_descriptions = sections;
        Ok(session)
    }

    fn codecs_for(&self, kind: RTCRtpTransceiverKind) -> &[configuration::RTCRtpCodecParameters] {
        match kind {
            RTCRtpTransceiverKind::Audio => &self.configuration.audio_codecs,
            RTCRtpTransceiverKind::Video => &self.configuration.video_codecs,
        }
    }

    fn max_message_size(&self) -> u32 {
        65536
    }

    fn snapshot_mids(&mut self) {
        if self.transceiver_mids_snapshot.is_none() {
            self.transceiver_mids_snapshot =
                Some(self.transceivers.iter().map(|t| t.mid.clone()).collect());
        }
    }

    fn rollback(&mut self, op: StateChangeOp) -> Result<()> {
        let next =
            check_next_signaling_state(self.signaling_state, op, RTCSdpType::Rollback)?;
        self.pending_local_description = None;
        self.pending_remote_description = None;
        if let Some(snapshot) = self.transceiver_mids_snapshot.take() {
            // Transceivers created by the rolled-back remote offer go away;
            // pre-existing ones get their previous mids back.
            let keep = snapshot.len();
            for (transceiver, mid) in self.transceivers.iter_mut().zip(snapshot) {
                transceiver.mid = mid;
            }
            self.transceivers.truncate(keep);
        }
        self.set_signaling_state(next);
        self.maybe_emit_negotiation_needed();
        Ok(())
    }

    /// Runs when an offer/answer exchange lands back in stable: pins the
    /// DTLS role, spins up transports, finalizes directions and mids.
    fn on_negotiation_complete(&mut self, now: Instant) -> Result<()> {
        self.transceiver_mids_snapshot = None;
        for transceiver in &mut self.transceivers {
            transceiver.current_direction = Some(transceiver.direction);
        }

        let role = self.dtls_role.unwrap_or(DtlsRole::Server);
        self.fix_stream_ids();

        if self.dtls.is_none() {
            let mut config = DtlsConfig::new(role, self.certificate.identity());
            config.remote_fingerprint = self.remote_fingerprint.clone();
            self.dtls = Some(DtlsEndpoint::new(config));
            self.set_connection_state(RTCPeerConnectionState::Connecting);
        }

        if self.sctp.is_none() {
            self.sctp = Some(Association::new(AssociationConfig {
                is_client: role == DtlsRole::Client,
                remote_port: self.remote_sctp_port,
                ..Default::default()
            }));
        }

        // Checks can start as soon as both credential sets are known; the
        // offerer controls (RFC 8445 Section 6.1.1).
        let is_controlling = matches!(
            self.current_local_description.as_ref().map(|d| d.sdp_type),
            Some(RTCSdpType::Offer)
        );
        let _ = self.ice_agent.start_checks(is_controlling, now);
        self.pump_ice_events(now);
        self.pump(now);
        Ok(())
    }

    fn mark_negotiation_needed(&mut self) {
        if self.signaling_state == RTCSignalingState::Stable {
            self.negotiation_needed = true;
        }
        self.maybe_emit_negotiation_needed();
    }

    /// Emits at most one coalesced negotiation-needed event per batch of
    /// dirtying operations, and only in stable state.
    fn maybe_emit_negotiation_needed(&mut self) {
        if self.negotiation_needed
            && !self.negotiation_event_pending
            && self.signaling_state == RTCSignalingState::Stable
            && !self.closed
        {
            self.negotiation_event_pending = true;
            self.negotiation_needed = false;
            self.events
                .push_back(RTCPeerConnectionEvent::OnNegotiationNeeded);
        }
    }

    /// The application acknowledges the pending negotiation-needed event,
    /// re-arming coalescing for the next batch.
    pub fn ack_negotiation_needed(&mut self) {
        self.negotiation_event_pending = false;
    }

    fn set_signaling_state(&mut self, state: RTCSignalingState) {
        if self.signaling_state != state {
            self.signaling_state = state;
            self.events
                .push_back(RTCPeerConnectionEvent::OnSignalingStateChange(state));
        }
    }

    fn set_connection_state(&mut self, state: RTCPeerConnectionState) {
        if self.connection_state != state {
            self.connection_state = state;
            self.events
                .push_back(RTCPeerConnectionEvent::OnConnectionStateChange(state));
        }
    }

    fn queue_to_selected_pair(&mut self, message: Vec<u8>) -> Result<()> {
        let (local, remote) = self
            .selected_pair
            .ok_or(Error::ErrNoCandidatePairs)?;
        self.transmits.push_back(Transmit {
            local,
            remote,
            message,
        });
        Ok(())
    }

    fn pump_ice_events(&mut self, now: Instant) {
        while let Some(event) = self.ice_agent.poll_event() {
            match event {
                IceEvent::CandidateGathered(candidate) => {
                    self.events
                        .push_back(RTCPeerConnectionEvent::OnIceCandidate(candidate));
                }
                IceEvent::GatheringStateChange(state) => {
                    self.events
                        .push_back(RTCPeerConnectionEvent::OnIceGatheringStateChange(state));
                }
                IceEvent::ConnectionStateChange(state) => {
                    self.events
                        .push_back(RTCPeerConnectionEvent::OnIceConnectionStateChange(state));
                    match state {
                        IceConnectionState::Failed => {
                            self.set_connection_state(RTCPeerConnectionState::Failed);
                        }
                        IceConnectionState::Disconnected => {
                            self.set_connection_state(RTCPeerConnectionState::Disconnected);
                        }
                        _ => {}
                    }
                }
                IceEvent::SelectedPairChange(pair) => {
                    let (local, remote) = *pair;
                    if let (Ok(l), Ok(r)) = (local.addr(), remote.addr()) {
                        self.selected_pair = Some((l, r));
                    }
                    self.start_dtls_if_ready(now);
                }
            }
        }
        while let Some(t) = self.ice_agent.poll_transmit() {
            self.transmits.push_back(Transmit {
                local: t.local,
                remote: t.remote,
                message: t.message,
            });
        }
    }

    fn start_dtls_if_ready(&mut self, now: Instant) {
        if self.dtls_started || self.selected_pair.is_none() {
            return;
        }
        if let Some(dtls) = &mut self.dtls {
            self.dtls_started = true;
            if let Err(err) = dtls.start_handshake(now) {
                warn!("dtls start failed: {err}");
            }
        }
        self.forward_dtls_transmits();
    }

    /// Moves bytes between the layered transports and surfaces events.
    fn pump(&mut self, now: Instant) {
        self.start_dtls_if_ready(now);
        self.pump_transports(now);
        self.pump_data_channel_events();
    }

    fn pump_transports(&mut self, now: Instant) {
        // DTLS events: keys, app data, closure.
        let mut dtls_events = vec![];
        if let Some(dtls) = &mut self.dtls {
            while let Some(event) = dtls.poll_event() {
                dtls_events.push(event);
            }
        }
        for event in dtls_events {
            match event {
                DtlsEvent::HandshakeComplete { srtp_profile } => {
                    if let Err(err) = self.install_srtp_keys(srtp_profile) {
                        warn!("srtp key install failed: {err}");
                    }
                    self.set_connection_state(RTCPeerConnectionState::Connected);
                    if let Some(sctp) = &mut self.sctp {
                        if self.dtls_role == Some(DtlsRole::Client) {
                            sctp.connect(now);
                        }
                    }
                }
                DtlsEvent::ApplicationData(data) => {
                    if let Some(sctp) = &mut self.sctp {
                        if let Err(err) = sctp.handle_read(&data, now) {
                            debug!("sctp error: {err}");
                        }
                    }
                }
                DtlsEvent::PeerClosed => {
                    self.set_connection_state(RTCPeerConnectionState::Disconnected);
                    self.teardown_after_peer_close();
                }
                DtlsEvent::HandshakeFailed(err) => {
                    warn!("dtls handshake failed: {err}");
                    self.set_connection_state(RTCPeerConnectionState::Failed);
                }
            }
        }

        // SCTP events: connected, data, stream resets, closure.
        let mut sctp_events = vec![];
        if let Some(sctp) = &mut self.sctp {
            while let Some(event) = sctp.poll_event() {
                sctp_events.push(event);
            }
        }
        for event in sctp_events {
            match event {
                AssociationEvent::Connected => {
                    self.flush_data_channels();
                }
                AssociationEvent::DataReceived {
                    stream_id,
                    ppi,
                    payload,
                } => {
                    self.on_sctp_data(stream_id, ppi, payload);
                }
                AssociationEvent::StreamsReset(ids) => {
                    for stream_id in ids {
                        if let Some(channel) = self.data_channels.get_mut(&stream_id) {
                            channel.on_stream_reset();
                        }
                    }
                }
                AssociationEvent::Closed => {
                    for channel in self.data_channels.values_mut() {
                        channel.on_stream_reset();
                    }
                }
            }
        }

        self.flush_data_channels();

        // SCTP datagrams ride inside DTLS application data.
        let mut sctp_out = vec![];
        if let Some(sctp) = &mut self.sctp {
            while let Some(datagram) = sctp.poll_transmit() {
                sctp_out.push(datagram);
            }
        }
        if let Some(dtls) = &mut self.dtls {
            for datagram in sctp_out {
                if let Err(err) = dtls.write(&datagram) {
                    trace!("sctp datagram dropped, dtls not ready: {err}");
                }
            }
        }

        self.forward_dtls_transmits();
        self.pump_data_channel_events();
    }

    fn forward_dtls_transmits(&mut self) {
        let Some(dtls) = &mut self.dtls else { return };
        let Some((local, remote)) = self.selected_pair else {
            return;
        };
        while let Some(datagram) = dtls.poll_transmit() {
            self.transmits.push_back(Transmit {
                local,
                remote,
                message: datagram,
            });
        }
    }

    /// Moves queued channel messages into the association.
    fn flush_data_channels(&mut self) {
        let Some(sctp) = &mut self.sctp else { return };
        if !sctp.is_established() {
            return;
        }
        let now = Instant::now();
        for (stream_id, channel) in self.data_channels.iter_mut() {
            while let Some(out) = channel.poll_outbound() {
                let len = out.payload.len();
                if let Err(err) = sctp.send(
                    *stream_id,
                    out.ppi,
                    out.payload,
                    out.ordered,
                    out.reliability,
                    now,
                ) {
                    debug!("datachannel send failed: {err}");
                    break;
                }
                channel.on_buffered_amount_sent(len);
            }
        }
    }

    fn on_sctp_data(&mut self, stream_id: u16, ppi: PayloadProtocolIdentifier, payload: Bytes) {
        if ppi == PayloadProtocolIdentifier::Dcep && !self.data_channels.contains_key(&stream_id) {
            // Inbound DATA_CHANNEL_OPEN announces a new channel.
            let mut buf = &payload[..];
            match <datachannel::message::Message as shared::marshal::Unmarshal>::unmarshal(&mut buf)
            {
                Ok(datachannel::message::Message::DataChannelOpen(open)) => {
                    match DataChannel::accept(stream_id, open) {
                        Ok(channel) => {
                            self.events.push_back(RTCPeerConnectionEvent::OnDataChannel {
                                stream_id,
                                label: channel.label().to_owned(),
                            });
                            self.data_channels.insert(stream_id, channel);
                            self.flush_data_channels();
                        }
                        Err(err) => warn!("rejecting data channel: {err}"),
                    }
                }
                Ok(other) => debug!("unexpected dcep message {other:?}"),
                Err(err) => debug!("bad dcep message: {err}"),
            }
            return;
        }

        if let Some(channel) = self.data_channels.get_mut(&stream_id) {
            if let Err(err) = channel.handle_inbound(ppi, &payload) {
                debug!("channel {stream_id} dropped message: {err}");
            }
        }
    }

    fn pump_data_channel_events(&mut self) {
        let mut queued = vec![];
        for (stream_id, channel) in self.data_channels.iter_mut() {
            while let Some(event) = channel.poll_event() {
                queued.push((*stream_id, event));
            }
        }
        for (stream_id, event) in queued {
            self.events
                .push_back(RTCPeerConnectionEvent::OnDataChannelEvent { stream_id, event });
        }
    }

    fn install_srtp_keys(&mut self, profile: dtls::SrtpProtectionProfile) -> Result<()> {
        let profile = match profile {
            dtls::SrtpProtectionProfile::AeadAes128Gcm => ProtectionProfile::AeadAes128Gcm,
            dtls::SrtpProtectionProfile::Aes128CmHmacSha1_80 => {
                ProtectionProfile::Aes128CmHmacSha1_80
            }
            dtls::SrtpProtectionProfile::Unsupported => return Ok(()),
        };
        let dtls = self.dtls.as_ref().ok_or(Error::ErrHandshakeInProgress)?;
        let material = dtls.export_keying_material(
            dtls::EXTRACTOR_DTLS_SRTP,
            &[],
            profile.keying_material_len(),
        )?;
        let ((client_key, client_salt), (server_key, server_salt)) =
            SrtpContext::split_keying_material(profile, &material)?;

        let (tx_key, tx_salt, rx_key, rx_salt) = if self.dtls_role == Some(DtlsRole::Client) {
            (client_key, client_salt, server_key, server_salt)
        } else {
            (server_key, server_salt, client_key, client_salt)
        };
        self.srtp_tx = Some(SrtpContext::new(&tx_key, &tx_salt, profile)?);
        self.srtp_rx = Some(SrtpContext::new(&rx_key, &rx_salt, profile)?);
        Ok(())
    }

    fn handle_protected_rtp(&mut self, raw: &[u8]) {
        let Some(srtp) = self.srtp_rx.as_mut() else {
            trace!("dropping srtp before keys are ready");
            return;
        };
        if is_rtcp(raw) {
            match srtp.decrypt_rtcp(raw) {
                Ok(plain) => {
                    let mut buf = &plain[..];
                    match rtcp::unmarshal(&mut buf) {
                        Ok(packets) => self
                            .events
                            .push_back(RTCPeerConnectionEvent::OnRtcp(packets)),
                        Err(err) => debug!("bad rtcp: {err}"),
                    }
                }
                Err(err) => debug!("srtcp discarded: {err}"),
            }
            return;
        }
        match srtp.decrypt_rtp(raw) {
            Ok(plain) => {
                let mut buf = &plain[..];
                match <rtp::packet::Packet as shared::marshal::Unmarshal>::unmarshal(&mut buf) {
                    Ok(packet) => {
                        let known_ssrc = packet.header.ssrc;
                        if let Some(routed) = self.router.route(packet) {
                            if routed.repaired {
                                trace!("rtx repair for {:?}", routed.track);
                            }
                            if !self.seen_ssrc(known_ssrc) {
                                self.events.push_back(RTCPeerConnectionEvent::OnTrack {
                                    track: routed.track.clone(),
                                    ssrc: known_ssrc,
                                });
                            }
                            self.events.push_back(RTCPeerConnectionEvent::OnTrackRtp {
                                track: routed.track,
                                packet: routed.packet,
                            });
                        }
                    }
                    Err(err) => debug!("bad rtp: {err}"),
                }
            }
            Err(err) => debug!("srtp discarded: {err}"),
        }
    }

    /// Records the SSRC, reporting whether it was already known; drives the
    /// one-shot OnTrack event.
    fn seen_ssrc(&mut self, ssrc: u32) -> bool {
        if self.seen_ssrc_list.contains(&ssrc) {
            return true;
        }
        self.seen_ssrc_list.push(ssrc);
        false
    }

    fn teardown_after_peer_close(&mut self) {
        let stream_ids: Vec<u16> = self.data_channels.keys().copied().collect();
        for stream_id in stream_ids {
            if let Some(channel) = self.data_channels.get_mut(&stream_id) {
                channel.on_stream_reset();
            }
        }
        self.pump_data_channel_events();
        self.set_connection_state(RTCPeerConnectionState::Closed);
    }
}

fn min_instant(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
