#[cfg(test)]
mod association_test;

pub mod state;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use log::{debug, trace, warn};
use rand::Rng;
use shared::error::{Error, Result};

use crate::chunk::chunk_forward_tsn::{ChunkForwardTsn, ChunkForwardTsnStream};
use crate::chunk::chunk_init::ChunkInit;
use crate::chunk::chunk_misc::{
    ChunkAbort, ChunkCookieAck, ChunkCookieEcho, ChunkHeartbeatAck, ChunkShutdown,
    ChunkShutdownAck, ChunkShutdownComplete,
};
use crate::chunk::chunk_payload_data::{ChunkPayloadData, PayloadProtocolIdentifier};
use crate::chunk::chunk_reconfig::ChunkReconfig;
use crate::chunk::chunk_selective_ack::{ChunkSelectiveAck, GapAckBlock};
use crate::chunk::Chunk;
use crate::packet::Packet;
use crate::param::Param;
use crate::{ReliabilityType, DEFAULT_MTU, DEFAULT_SCTP_PORT};

use state::AssociationState;

const INITIAL_RTO: Duration = Duration::from_secs(3);
const MIN_RTO: Duration = Duration::from_secs(1);
const MAX_RTO: Duration = Duration::from_secs(60);
const MAX_INIT_RETRIES: u8 = 8;
const DEFAULT_ADVERTISED_RWND: u32 = 1024 * 1024;
const DEFAULT_MAX_MESSAGE_SIZE: u32 = 65536;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Serial number arithmetic (RFC 1982) for 32-bit TSNs.
fn sna32_gt(a: u32, b: u32) -> bool {
    (a < b && b - a > (1 << 31)) || (a > b && a - b < (1 << 31))
}

fn sna32_gte(a: u32, b: u32) -> bool {
    a == b || sna32_gt(a, b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociationConfig {
    pub local_port: u16,
    pub remote_port: u16,
    /// The side that opens the association sends INIT.
    pub is_client: bool,
    pub max_message_size: u32,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        AssociationConfig {
            local_port: DEFAULT_SCTP_PORT,
            remote_port: DEFAULT_SCTP_PORT,
            is_client: false,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Observable association events.
#[derive(Debug)]
pub enum AssociationEvent {
    Connected,
    /// One complete user message.
    DataReceived {
        stream_id: u16,
        ppi: PayloadProtocolIdentifier,
        payload: Bytes,
    },
    /// The peer reset these outgoing streams towards us.
    StreamsReset(Vec<u16>),
    Closed,
}

struct InflightChunk {
    chunk: ChunkPayloadData,
    sent_at: Instant,
    queued_at: Instant,
    retransmit_count: u32,
    acked: bool,
    abandoned: bool,
    reliability: ReliabilityType,
}

struct OrderedMessage {
    parts: Vec<Bytes>,
    ppi: PayloadProtocolIdentifier,
    complete: bool,
}

#[derive(Default)]
struct StreamIn {
    next_ssn: u16,
    ordered_pending: HashMap<u16, OrderedMessage>,
    unordered_buffer: Vec<Bytes>,
    unordered_ppi: PayloadProtocolIdentifier,
}

#[derive(Default)]
struct StreamOut {
    next_ssn: u16,
}

/// A sans-IO SCTP association tunneled over DTLS (RFC 4960, RFC 8261).
///
/// The embedder moves datagrams between this and the DTLS endpoint, drives
/// timers, and drains events.
pub struct Association {
    config: AssociationConfig,
    state: AssociationState,

    my_verification_tag: u32,
    peer_verification_tag: u32,

    next_tsn: u32,
    cumulative_tsn_ack_point: u32,
    peer_last_tsn: u32,

    // outbound
    pending_chunks: VecDeque<(ChunkPayloadData, ReliabilityType, Instant)>,
    inflight: BTreeMap<u64, InflightChunk>,
    inflight_base: Option<u32>,
    streams_out: HashMap<u16, StreamOut>,

    // inbound
    payload_queue_in: BTreeMap<u64, ChunkPayloadData>,
    streams_in: HashMap<u16, StreamIn>,
    duplicate_tsns: Vec<u32>,
    sack_needed: bool,

    // congestion control (RFC 4960 Section 7.2)
    cwnd: u32,
    ssthresh: u32,
    partial_bytes_acked: u32,
    peer_rwnd: u32,

    // timers
    rto: Duration,
    srtt: Option<Duration>,
    rttvar: Duration,
    t1_deadline: Option<Instant>,
    t1_retries: u8,
    t3_deadline: Option<Instant>,
    heartbeat_deadline: Option<Instant>,

    stored_handshake: Option<Packet>,
    my_cookie: Vec<u8>,
    forward_tsn_supported: bool,
    my_next_rsn: u32,

    transmits: VecDeque<Vec<u8>>,
    events: VecDeque<AssociationEvent>,
}

impl Association {
    pub fn new(config: AssociationConfig) -> Self {
        let mut rng = rand::thread_rng();
        let my_verification_tag: u32 = rng.gen_range(1..u32::MAX);
        let next_tsn: u32 = rng.gen();
        Association {
            config,
            state: AssociationState::Closed,
            my_verification_tag,
            peer_verification_tag: 0,
            next_tsn,
            cumulative_tsn_ack_point: next_tsn.wrapping_sub(1),
            peer_last_tsn: 0,
            pending_chunks: VecDeque::new(),
            inflight: BTreeMap::new(),
            inflight_base: None,
            streams_out: HashMap::new(),
            payload_queue_in: BTreeMap::new(),
            streams_in: HashMap::new(),
            duplicate_tsns: vec![],
            sack_needed: false,
            cwnd: 4 * DEFAULT_MTU as u32,
            ssthresh: DEFAULT_ADVERTISED_RWND,
            partial_bytes_acked: 0,
            peer_rwnd: DEFAULT_ADVERTISED_RWND,
            rto: INITIAL_RTO,
            srtt: None,
            rttvar: Duration::ZERO,
            t1_deadline: None,
            t1_retries: 0,
            t3_deadline: None,
            heartbeat_deadline: None,
            stored_handshake: None,
            my_cookie: vec![],
            forward_tsn_supported: false,
            my_next_rsn: 1,
            transmits: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    pub fn state(&self) -> AssociationState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == AssociationState::Established
    }

    /// Starts the 4-way handshake (client side).
    pub fn connect(&mut self, now: Instant) {
        if self.state != AssociationState::Closed {
            return;
        }
        let init = ChunkInit {
            initiate_tag: self.my_verification_tag,
            advertised_receiver_window_credit: DEFAULT_ADVERTISED_RWND,
            num_outbound_streams: u16::MAX,
            num_inbound_streams: u16::MAX,
            initial_tsn: self.next_tsn,
            params: vec![Param::ForwardTsnSupported],
        };
        // INIT is addressed with a zero verification tag.
        let packet = self.build_packet_with_tag(0, vec![Chunk::Init(init)]);
        self.stored_handshake = Some(packet.clone());
        self.transmits.push_back(packet.marshal());
        self.state = AssociationState::CookieWait;
        self.t1_deadline = Some(now + self.rto);
        trace!("sctp: sent INIT, entering CookieWait");
    }

    /// Queues one user message for delivery on `stream_id`.
    pub fn send(
        &mut self,
        stream_id: u16,
        ppi: PayloadProtocolIdentifier,
        payload: Bytes,
        ordered: bool,
        reliability: ReliabilityType,
        now: Instant,
    ) -> Result<()> {
        if payload.len() > self.config.max_message_size as usize {
            return Err(Error::ErrOutboundPacketTooLarge);
        }
        if matches!(
            self.state,
            AssociationState::ShutdownSent
                | AssociationState::ShutdownAckSent
                | AssociationState::ShutdownReceived
        ) {
            return Err(Error::ErrPayloadDataStateNotExist);
        }

        let stream = self.streams_out.entry(stream_id).or_default();
        let ssn = stream.next_ssn;
        if ordered {
            stream.next_ssn = stream.next_ssn.wrapping_add(1);
        }

        // Fragment into MTU-sized DATA chunks with B/E flags.
        let max_fragment = DEFAULT_MTU - 16 - 32;
        let mut offset = 0;
        let total = payload.len();
        loop {
            let end = (offset + max_fragment).min(total);
            let chunk = ChunkPayloadData {
                unordered: !ordered,
                beginning_fragment: offset == 0,
                ending_fragment: end == total,
                immediate_sack: false,
                tsn: 0, // assigned at flush time
                stream_identifier: stream_id,
                stream_sequence_number: ssn,
                payload_type: ppi,
                user_data: payload.slice(offset..end),
            };
            self.pending_chunks.push_back((chunk, reliability, now));
            if end == total {
                break;
            }
            offset = end;
        }

        if self.state == AssociationState::Established {
            self.flush(now);
        }
        Ok(())
    }

    /// Requests an outgoing reset of `stream_id` (used for DataChannel
    /// close, RFC 8831 Section 6.7).
    pub fn reset_stream(&mut self, stream_id: u16) -> Result<()> {
        if self.state != AssociationState::Established {
            return Err(Error::ErrShutdownNonEstablished);
        }
        let request = Param::OutgoingSsnResetRequest {
            reconfig_request_sequence_number: self.my_next_rsn,
            reconfig_response_sequence_number: 0,
            sender_last_tsn: self.next_tsn.wrapping_sub(1),
            stream_identifiers: vec![stream_id],
        };
        self.my_next_rsn = self.my_next_rsn.wrapping_add(1);
        let packet = self.build_packet(vec![Chunk::Reconfig(ChunkReconfig {
            param_a: Some(request),
            param_b: None,
        })]);
        self.transmits.push_back(packet.marshal());
        Ok(())
    }

    /// Starts a graceful shutdown.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.state != AssociationState::Established {
            return Err(Error::ErrShutdownNonEstablished);
        }
        self.state = AssociationState::ShutdownSent;
        let packet = self.build_packet(vec![Chunk::Shutdown(ChunkShutdown {
            cumulative_tsn_ack: self.peer_last_tsn,
        })]);
        self.transmits.push_back(packet.marshal());
        Ok(())
    }

    /// Hard-stops the association with ABORT.
    pub fn abort(&mut self) {
        if self.state != AssociationState::Closed && self.peer_verification_tag != 0 {
            let packet = self.build_packet(vec![Chunk::Abort(ChunkAbort::default())]);
            self.transmits.push_back(packet.marshal());
        }
        self.close_internal();
    }

    pub fn poll_transmit(&mut self) -> Option<Vec<u8>> {
        self.transmits.pop_front()
    }

    pub fn poll_event(&mut self) -> Option<AssociationEvent> {
        self.events.pop_front()
    }

    pub fn poll_timeout(&self) -> Option<Instant> {
        [self.t1_deadline, self.t3_deadline, self.heartbeat_deadline]
            .into_iter()
            .flatten()
            .min()
    }

    pub fn handle_timeout(&mut self, now: Instant) {
        if let Some(deadline) = self.t1_deadline {
            if deadline <= now {
                if self.t1_retries >= MAX_INIT_RETRIES {
                    warn!("sctp: handshake retries exhausted");
                    self.close_internal();
                    return;
                }
                self.t1_retries += 1;
                self.rto = (self.rto * 2).min(MAX_RTO);
                if let Some(packet) = &self.stored_handshake {
                    self.transmits.push_back(packet.marshal());
                }
                self.t1_deadline = Some(now + self.rto);
            }
        }

        if let Some(deadline) = self.t3_deadline {
            if deadline <= now {
                self.on_retransmission_timeout(now);
            }
        }

        if let Some(deadline) = self.heartbeat_deadline {
            if deadline <= now && self.state == AssociationState::Established {
                let packet = self.build_packet(vec![Chunk::Heartbeat(
                    crate::chunk::chunk_misc::ChunkHeartbeat {
                        info: now.elapsed().as_nanos().to_le_bytes()[..8].to_vec(),
                    },
                )]);
                self.transmits.push_back(packet.marshal());
                self.heartbeat_deadline = Some(now + HEARTBEAT_INTERVAL);
            }
        }
    }

    /// Feeds one datagram that arrived over DTLS.
    pub fn handle_read(&mut self, raw: &[u8], now: Instant) -> Result<()> {
        let packet = Packet::unmarshal(raw)?;

        // Verification: INIT carries tag 0, everything else must match ours.
        let has_init = packet.chunks.iter().any(|c| matches!(c, Chunk::Init(_)));
        if has_init {
            if packet.chunks.len() != 1 {
                return Err(Error::ErrInitChunkBundled);
            }
            if packet.verification_tag != 0 {
                return Err(Error::ErrInitChunkVerifyTagNotZero);
            }
        } else if packet.verification_tag != self.my_verification_tag {
            debug!("sctp: dropping packet with bad verification tag");
            return Err(Error::ErrSilentlyDiscard);
        }

        for chunk in packet.chunks {
            self.handle_chunk(chunk, now)?;
        }

        if self.sack_needed {
            self.send_sack();
        }
        Ok(())
    }

    fn handle_chunk(&mut self, chunk: Chunk, now: Instant) -> Result<()> {
        match chunk {
            Chunk::Init(init) => self.handle_init(init),
            Chunk::InitAck(init_ack) => self.handle_init_ack(init_ack, now),
            Chunk::CookieEcho(echo) => self.handle_cookie_echo(echo, now),
            Chunk::CookieAck(_) => self.handle_cookie_ack(now),
            Chunk::PayloadData(data) => {
                self.handle_payload_data(data);
                Ok(())
            }
            Chunk::SelectiveAck(sack) => {
                self.handle_sack(sack, now);
                Ok(())
            }
            Chunk::Heartbeat(hb) => {
                let packet = self.build_packet(vec![Chunk::HeartbeatAck(ChunkHeartbeatAck {
                    info: hb.info,
                })]);
                self.transmits.push_back(packet.marshal());
                Ok(())
            }
            Chunk::HeartbeatAck(_) => Ok(()),
            Chunk::Abort(abort) => {
                debug!("sctp: association aborted by peer");
                self.close_internal();
                let _ = abort;
                Ok(())
            }
            Chunk::Shutdown(_) => {
                self.state = AssociationState::ShutdownAckSent;
                let packet = self.build_packet(vec![Chunk::ShutdownAck(ChunkShutdownAck)]);
                self.transmits.push_back(packet.marshal());
                Ok(())
            }
            Chunk::ShutdownAck(_) => {
                let packet =
                    self.build_packet(vec![Chunk::ShutdownComplete(ChunkShutdownComplete)]);
                self.transmits.push_back(packet.marshal());
                self.close_internal();
                Ok(())
            }
            Chunk::ShutdownComplete(_) => {
                self.close_internal();
                Ok(())
            }
            Chunk::Reconfig(reconfig) => {
                self.handle_reconfig(reconfig);
                Ok(())
            }
            Chunk::ForwardTsn(forward) => {
                self.handle_forward_tsn(forward);
                Ok(())
            }
        }
    }

    // --- handshake -------------------------------------------------------

    fn handle_init(&mut self, init: ChunkInit) -> Result<()> {
        self.peer_verification_tag = init.initiate_tag;
        self.peer_last_tsn = init.initial_tsn.wrapping_sub(1);
        self.peer_rwnd = init.advertised_receiver_window_credit;
        self.forward_tsn_supported = init.supports_forward_tsn();

        let mut rng = rand::thread_rng();
        self.my_cookie = (0..32).map(|_| rng.gen::<u8>()).collect();

        let init_ack = ChunkInit {
            initiate_tag: self.my_verification_tag,
            advertised_receiver_window_credit: DEFAULT_ADVERTISED_RWND,
            num_outbound_streams: u16::MAX,
            num_inbound_streams: u16::MAX,
            initial_tsn: self.next_tsn,
            params: vec![
                Param::StateCookie(self.my_cookie.clone()),
                Param::ForwardTsnSupported,
            ],
        };
        let packet = self.build_packet(vec![Chunk::InitAck(init_ack)]);
        self.transmits.push_back(packet.marshal());
        Ok(())
    }

    fn handle_init_ack(&mut self, init_ack: ChunkInit, now: Instant) -> Result<()> {
        if self.state != AssociationState::CookieWait {
            return Ok(());
        }
        let cookie = init_ack
            .state_cookie()
            .ok_or(Error::ErrInitAckNoCookie)?
            .to_vec();
        self.peer_verification_tag = init_ack.initiate_tag;
        self.peer_last_tsn = init_ack.initial_tsn.wrapping_sub(1);
        self.peer_rwnd = init_ack.advertised_receiver_window_credit;
        self.forward_tsn_supported = init_ack.supports_forward_tsn();

        let packet = self.build_packet(vec![Chunk::CookieEcho(ChunkCookieEcho { cookie })]);
        self.stored_handshake = Some(packet.clone());
        self.transmits.push_back(packet.marshal());
        self.state = AssociationState::CookieEchoed;
        self.t1_retries = 0;
        self.t1_deadline = Some(now + self.rto);
        Ok(())
    }

    fn handle_cookie_echo(&mut self, echo: ChunkCookieEcho, now: Instant) -> Result<()> {
        if self.my_cookie.is_empty() || echo.cookie != self.my_cookie {
            return Err(Error::ErrHandshakeCookieEcho);
        }
        let packet = self.build_packet(vec![Chunk::CookieAck(ChunkCookieAck)]);
        self.transmits.push_back(packet.marshal());
        self.establish(now);
        Ok(())
    }

    fn handle_cookie_ack(&mut self, now: Instant) -> Result<()> {
        if self.state != AssociationState::CookieEchoed {
            return Ok(());
        }
        self.establish(now);
        Ok(())
    }

    fn establish(&mut self, now: Instant) {
        if self.state != AssociationState::Established {
            self.state = AssociationState::Established;
            self.t1_deadline = None;
            self.stored_handshake = None;
            self.rto = INITIAL_RTO;
            self.heartbeat_deadline = Some(now + HEARTBEAT_INTERVAL);
            self.events.push_back(AssociationEvent::Connected);
            self.flush(now);
        }
    }

    // --- inbound data ----------------------------------------------------

    fn tsn_order_key(&self, tsn: u32) -> u64 {
        // Key relative to the cumulative point, immune to 32-bit wrap.
        u64::from(tsn.wrapping_sub(self.peer_last_tsn))
    }

    fn handle_payload_data(&mut self, data: ChunkPayloadData) {
        self.sack_needed = true;

        if sna32_gte(self.peer_last_tsn, data.tsn) {
            self.duplicate_tsns.push(data.tsn);
            return;
        }
        let key = self.tsn_order_key(data.tsn);
        if self.payload_queue_in.insert(key, data).is_some() {
            // duplicate within the out-of-order queue
        }

        // Pop contiguous TSNs.
        loop {
            let next_key = 1u64;
            let ready = self
                .payload_queue_in
                .keys()
                .next()
                .map(|k| *k == next_key)
                .unwrap_or(false);
            if !ready {
                break;
            }
            let chunk = self
                .payload_queue_in
                .remove(&next_key)
                .expect("checked above");
            self.peer_last_tsn = self.peer_last_tsn.wrapping_add(1);
            // Re-key the remaining queue against the new cumulative point.
            let remaining: Vec<ChunkPayloadData> =
                self.payload_queue_in.split_off(&0).into_values().collect();
            for c in remaining {
                let k = self.tsn_order_key(c.tsn);
                self.payload_queue_in.insert(k, c);
            }
            self.deliver(chunk);
        }
    }

    fn deliver(&mut self, chunk: ChunkPayloadData) {
        let stream = self.streams_in.entry(chunk.stream_identifier).or_default();
        let stream_id = chunk.stream_identifier;

        if chunk.unordered {
            if chunk.beginning_fragment {
                stream.unordered_buffer.clear();
                stream.unordered_ppi = chunk.payload_type;
            }
            stream.unordered_buffer.push(chunk.user_data.clone());
            if chunk.ending_fragment {
                let payload = concat(&std::mem::take(&mut stream.unordered_buffer));
                let ppi = stream.unordered_ppi;
                self.events.push_back(AssociationEvent::DataReceived {
                    stream_id,
                    ppi,
                    payload,
                });
            }
            return;
        }

        let ssn = chunk.stream_sequence_number;
        let entry = stream.ordered_pending.entry(ssn).or_insert(OrderedMessage {
            parts: vec![],
            ppi: chunk.payload_type,
            complete: false,
        });
        entry.parts.push(chunk.user_data.clone());
        if chunk.ending_fragment {
            entry.complete = true;
        }

        // Deliver everything now in strict SSN order.
        self.drain_ordered(stream_id);
    }

    fn drain_ordered(&mut self, stream_id: u16) {
        loop {
            let Some(stream) = self.streams_in.get_mut(&stream_id) else {
                return;
            };
            let ready = stream
                .ordered_pending
                .get(&stream.next_ssn)
                .map(|m| m.complete)
                .unwrap_or(false);
            if !ready {
                return;
            }
            let message = stream
                .ordered_pending
                .remove(&stream.next_ssn)
                .expect("checked");
            stream.next_ssn = stream.next_ssn.wrapping_add(1);
            let payload = concat(&message.parts);
            self.events.push_back(AssociationEvent::DataReceived {
                stream_id,
                ppi: message.ppi,
                payload,
            });
        }
    }

    fn send_sack(&mut self) {
        self.sack_needed = false;

        // Gap blocks are offsets from the cumulative TSN.
        let mut gap_ack_blocks: Vec<GapAckBlock> = vec![];
        for key in self.payload_queue_in.keys() {
            let offset = *key as u16;
            match gap_ack_blocks.last_mut() {
                Some(block) if u32::from(block.end) + 1 == u32::from(offset) => {
                    block.end = offset;
                }
                _ => gap_ack_blocks.push(GapAckBlock {
                    start: offset,
                    end: offset,
                }),
            }
        }

        let sack = ChunkSelectiveAck {
            cumulative_tsn_ack: self.peer_last_tsn,
            advertised_receiver_window_credit: DEFAULT_ADVERTISED_RWND,
            gap_ack_blocks,
            duplicate_tsns: std::mem::take(&mut self.duplicate_tsns),
        };
        let packet = self.build_packet(vec![Chunk::SelectiveAck(sack)]);
        self.transmits.push_back(packet.marshal());
    }

    // --- outbound data ---------------------------------------------------

    fn inflight_key(&self, tsn: u32) -> u64 {
        u64::from(tsn.wrapping_sub(self.cumulative_tsn_ack_point))
    }

    fn outstanding_bytes(&self) -> u32 {
        self.inflight
            .values()
            .filter(|c| !c.acked && !c.abandoned)
            .map(|c| c.chunk.user_data.len() as u32)
            .sum()
    }

    /// Moves pending chunks into flight, respecting cwnd and the peer rwnd.
    fn flush(&mut self, now: Instant) {
        let mut bundle: Vec<Chunk> = vec![];
        let mut bundle_len = 0usize;
        while let Some((chunk, reliability, queued_at)) = self.pending_chunks.front().cloned() {
            let budget = self.cwnd.min(self.peer_rwnd);
            if self.outstanding_bytes() + chunk.user_data.len() as u32 > budget {
                break;
            }
            self.pending_chunks.pop_front();

            let mut chunk = chunk;
            chunk.tsn = self.next_tsn;
            self.next_tsn = self.next_tsn.wrapping_add(1);

            let key = self.inflight_key(chunk.tsn);
            self.inflight.insert(
                key,
                InflightChunk {
                    chunk: chunk.clone(),
                    sent_at: now,
                    queued_at,
                    retransmit_count: 0,
                    acked: false,
                    abandoned: false,
                    reliability,
                },
            );

            let chunk_len = 16 + chunk.user_data.len();
            if bundle_len + chunk_len > DEFAULT_MTU && !bundle.is_empty() {
                let packet = self.build_packet(std::mem::take(&mut bundle));
                self.transmits.push_back(packet.marshal());
                bundle_len = 0;
            }
            bundle_len += chunk_len;
            bundle.push(Chunk::PayloadData(chunk));
        }
        if !bundle.is_empty() {
            let packet = self.build_packet(bundle);
            self.transmits.push_back(packet.marshal());
        }
        if !self.inflight.is_empty() && self.t3_deadline.is_none() {
            self.t3_deadline = Some(now + self.rto);
        }
    }

    fn handle_sack(&mut self, sack: ChunkSelectiveAck, now: Instant) {
        let cum = sack.cumulative_tsn_ack;
        if !sna32_gte(cum, self.cumulative_tsn_ack_point) {
            return; // stale
        }
        self.peer_rwnd = sack.advertised_receiver_window_credit;

        // Advance the cumulative ack point, measuring RTT on the newest
        // acked chunk that was never retransmitted.
        let mut bytes_acked: u32 = 0;
        let mut rtt_sample: Option<Duration> = None;
        while sna32_gt(cum.wrapping_add(1), self.cumulative_tsn_ack_point.wrapping_add(1)) {
            let next = self.cumulative_tsn_ack_point.wrapping_add(1);
            let key = self.inflight_key(next);
            if let Some(chunk) = self.inflight.remove(&key) {
                bytes_acked += chunk.chunk.user_data.len() as u32;
                if chunk.retransmit_count == 0 {
                    rtt_sample = Some(now.saturating_duration_since(chunk.sent_at));
                }
            }
            self.cumulative_tsn_ack_point = next;
            // Re-key remaining inflight entries against the new ack point.
            let remaining: Vec<InflightChunk> =
                self.inflight.split_off(&0).into_values().collect();
            for c in remaining {
                let k = self.inflight_key(c.chunk.tsn);
                self.inflight.insert(k, c);
            }
        }

        // Gap ack blocks mark later chunks as received.
        for block in &sack.gap_ack_blocks {
            for offset in block.start..=block.end {
                let tsn = cum.wrapping_add(u32::from(offset));
                let key = self.inflight_key(tsn);
                if let Some(chunk) = self.inflight.get_mut(&key) {
                    chunk.acked = true;
                }
            }
        }

        if let Some(rtt) = rtt_sample {
            self.update_rto(rtt);
        }

        // Congestion control (RFC 4960 Section 7.2.1/7.2.2).
        if bytes_acked > 0 {
            if self.cwnd <= self.ssthresh {
                self.cwnd += bytes_acked.min(DEFAULT_MTU as u32);
            } else {
                self.partial_bytes_acked += bytes_acked;
                if self.partial_bytes_acked >= self.cwnd {
                    self.partial_bytes_acked -= self.cwnd;
                    self.cwnd += DEFAULT_MTU as u32;
                }
            }
        }

        if self.inflight.values().all(|c| c.acked || c.abandoned) && self.inflight.is_empty() {
            self.t3_deadline = None;
        } else if self.inflight.is_empty() {
            self.t3_deadline = None;
        } else {
            self.t3_deadline = Some(now + self.rto);
        }

        self.flush(now);
    }

    fn update_rto(&mut self, rtt: Duration) {
        // RFC 4960 Section 6.3.1 with alpha=1/8, beta=1/4.
        match self.srtt {
            None => {
                self.srtt = Some(rtt);
                self.rttvar = rtt / 2;
            }
            Some(srtt) => {
                let delta = if srtt > rtt { srtt - rtt } else { rtt - srtt };
                self.rttvar = (self.rttvar * 3 + delta) / 4;
                self.srtt = Some((srtt * 7 + rtt) / 8);
            }
        }
        let rto = self.srtt.unwrap_or(INITIAL_RTO) + 4 * self.rttvar;
        self.rto = rto.clamp(MIN_RTO, MAX_RTO);
    }

    fn on_retransmission_timeout(&mut self, now: Instant) {
        // RFC 4960 Section 6.3.3: back off, shrink cwnd, retransmit the
        // earliest outstanding data.
        self.ssthresh = (self.cwnd / 2).max(4 * DEFAULT_MTU as u32);
        self.cwnd = DEFAULT_MTU as u32;
        self.partial_bytes_acked = 0;
        self.rto = (self.rto * 2).min(MAX_RTO);

        let mut abandoned_any = false;
        let mut bundle = vec![];
        for chunk in self.inflight.values_mut() {
            if chunk.acked || chunk.abandoned {
                continue;
            }
            chunk.retransmit_count += 1;
            let abandon = match chunk.reliability {
                ReliabilityType::Reliable => false,
                ReliabilityType::Rexmit(max) => chunk.retransmit_count > max,
                ReliabilityType::Timed(ms) => {
                    now.saturating_duration_since(chunk.queued_at)
                        >= Duration::from_millis(u64::from(ms))
                }
            };
            if abandon {
                chunk.abandoned = true;
                abandoned_any = true;
                continue;
            }
            if bundle.is_empty() {
                chunk.sent_at = now;
                bundle.push(Chunk::PayloadData(chunk.chunk.clone()));
            }
        }
        if !bundle.is_empty() {
            let packet = self.build_packet(bundle);
            self.transmits.push_back(packet.marshal());
        }

        if abandoned_any && self.forward_tsn_supported {
            self.advance_past_abandoned();
        }

        self.t3_deadline = if self.inflight.is_empty() {
            None
        } else {
            Some(now + self.rto)
        };
    }

    /// Sends FORWARD-TSN covering the abandoned prefix (RFC 3758).
    fn advance_past_abandoned(&mut self) {
        let mut new_cumulative = self.cumulative_tsn_ack_point;
        let mut streams: Vec<ChunkForwardTsnStream> = vec![];
        loop {
            let key = self.inflight_key(new_cumulative.wrapping_add(1));
            match self.inflight.get(&key) {
                Some(chunk) if chunk.abandoned || chunk.acked => {
                    new_cumulative = new_cumulative.wrapping_add(1);
                    if !chunk.chunk.unordered {
                        let entry = ChunkForwardTsnStream {
                            identifier: chunk.chunk.stream_identifier,
                            sequence: chunk.chunk.stream_sequence_number,
                        };
                        match streams
                            .iter_mut()
                            .find(|s| s.identifier == entry.identifier)
                        {
                            Some(existing) => existing.sequence = entry.sequence,
                            None => streams.push(entry),
                        }
                    }
                }
                _ => break,
            }
        }
        if new_cumulative == self.cumulative_tsn_ack_point {
            return;
        }
        let packet = self.build_packet(vec![Chunk::ForwardTsn(ChunkForwardTsn {
            new_cumulative_tsn: new_cumulative,
            streams,
        })]);
        self.transmits.push_back(packet.marshal());
    }

    fn handle_forward_tsn(&mut self, forward: ChunkForwardTsn) {
        if !sna32_gt(forward.new_cumulative_tsn, self.peer_last_tsn) {
            self.sack_needed = true;
            return;
        }
        // Drop anything at or below the new cumulative point.
        while sna32_gt(forward.new_cumulative_tsn, self.peer_last_tsn) {
            self.peer_last_tsn = self.peer_last_tsn.wrapping_add(1);
            let remaining: Vec<ChunkPayloadData> =
                self.payload_queue_in.split_off(&0).into_values().collect();
            for c in remaining {
                if sna32_gt(c.tsn, self.peer_last_tsn) {
                    let k = self.tsn_order_key(c.tsn);
                    self.payload_queue_in.insert(k, c);
                }
            }
        }
        // Skip the abandoned stream sequence numbers.
        for stream in &forward.streams {
            let s = self.streams_in.entry(stream.identifier).or_default();
            if !sna16_gt(s.next_ssn, stream.sequence) {
                s.next_ssn = stream.sequence.wrapping_add(1);
            }
            s.ordered_pending.retain(|ssn, _| sna16_gt(*ssn, stream.sequence));
            self.drain_ordered(stream.identifier);
        }
        self.sack_needed = true;
    }

    fn handle_reconfig(&mut self, reconfig: ChunkReconfig) {
        for param in [reconfig.param_a, reconfig.param_b].into_iter().flatten() {
            match param {
                Param::OutgoingSsnResetRequest {
                    reconfig_request_sequence_number,
                    stream_identifiers,
                    ..
                } => {
                    for sid in &stream_identifiers {
                        let stream = self.streams_in.entry(*sid).or_default();
                        stream.next_ssn = 0;
                        stream.ordered_pending.clear();
                    }
                    let response = Param::ReconfigResponse {
                        reconfig_response_sequence_number: reconfig_request_sequence_number,
                        result: 1, // performed
                    };
                    let packet = self.build_packet(vec![Chunk::Reconfig(ChunkReconfig {
                        param_a: Some(response),
                        param_b: None,
                    })]);
                    self.transmits.push_back(packet.marshal());
                    self.events
                        .push_back(AssociationEvent::StreamsReset(stream_identifiers));
                }
                Param::ReconfigResponse { .. } => {
                    // Our outgoing reset was performed; local stream state
                    // was already reset at request time.
                }
                other => {
                    debug!("sctp: ignoring reconfig param {other:?}");
                }
            }
        }
    }

    // --- plumbing --------------------------------------------------------

    fn build_packet(&self, chunks: Vec<Chunk>) -> Packet {
        self.build_packet_with_tag(self.peer_verification_tag, chunks)
    }

    fn build_packet_with_tag(&self, verification_tag: u32, chunks: Vec<Chunk>) -> Packet {
        Packet {
            source_port: self.config.local_port,
            destination_port: self.config.remote_port,
            verification_tag,
            chunks,
        }
    }

    fn close_internal(&mut self) {
        if self.state != AssociationState::Closed {
            self.state = AssociationState::Closed;
            self.t1_deadline = None;
            self.t3_deadline = None;
            self.heartbeat_deadline = None;
            self.pending_chunks.clear();
            self.inflight.clear();
            self.events.push_back(AssociationEvent::Closed);
        }
    }
}

/// Serial number arithmetic for 16-bit SSNs.
fn sna16_gt(a: u16, b: u16) -> bool {
    (a < b && b - a > (1 << 15)) || (a > b && a - b < (1 << 15))
}

fn concat(parts: &[Bytes]) -> Bytes {
    let total: usize = parts.iter().map(|p| p.len()).sum();
    let mut out = BytesMut::with_capacity(total);
    for p in parts {
        out.extend_from_slice(p);
    }
    out.freeze()
}
