#[cfg(test)]
mod endpoint_test;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use rand::Rng;
use shared::crypto::KeyingMaterialExporter;
use shared::error::{Error, Result};

use crate::alert::{Alert, AlertDescription};
use crate::cipher_suite::{CipherSuiteAes128Gcm, TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256};
use crate::config::{Config, DtlsRole};
use crate::crypto::{fingerprint_of, fingerprints_match, verify_signature};
use crate::curve::EcdheKeypair;
use crate::flight::Flight;
use crate::fragment_buffer::FragmentBuffer;
use crate::handshake::certificate::{CertificateMsg, CertificateRequest, CertificateVerify};
use crate::handshake::client_hello::ClientHello;
use crate::handshake::extension::{Extension, HASH_SHA256, SIGNATURE_ECDSA};
use crate::handshake::finished::Finished;
use crate::handshake::key_exchange::{ClientKeyExchange, ServerKeyExchange};
use crate::handshake::random::HandshakeRandom;
use crate::handshake::server_hello::{HelloVerifyRequest, ServerHello, ServerHelloDone};
use crate::handshake::{
    HandshakeHeader, HandshakeMessage, HandshakeType, HANDSHAKE_HEADER_SIZE,
};
use crate::prf::{
    prf_encryption_keys, prf_export_keying_material, prf_master_secret, prf_verify_data,
};
use crate::record::{split_records, ContentType, Record, RecordHeader};
use crate::{SrtpProtectionProfile, EXTRACTOR_DTLS_SRTP, PROTOCOL_VERSION};

const COOKIE_LENGTH: usize = 20;
const SUPPORTED_GROUP_P256: u16 = 0x0017;
const EC_POINT_FORMAT_UNCOMPRESSED: u8 = 0;

/// Observable endpoint events.
#[derive(Debug)]
pub enum EndpointEvent {
    /// The handshake finished; SRTP keying material can now be exported.
    HandshakeComplete { srtp_profile: SrtpProtectionProfile },
    /// Decrypted application data (SCTP for WebRTC).
    ApplicationData(Vec<u8>),
    /// The peer sent close_notify or a fatal alert.
    PeerClosed,
    /// The handshake cannot make progress anymore.
    HandshakeFailed(Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Handshaking,
    Established,
    Closed,
    Failed,
}

/// One queued record of the current flight, kept for retransmission.
struct FlightMsg {
    content_type: ContentType,
    payload: Vec<u8>,
    epoch: u16,
}

/// A sans-IO DTLS 1.2 endpoint bound to one peer.
///
/// The embedder feeds datagrams to [`handle_read`](Endpoint::handle_read),
/// flushes [`poll_transmit`](Endpoint::poll_transmit), drives timers via
/// [`handle_timeout`](Endpoint::handle_timeout), and writes application data
/// with [`write`](Endpoint::write) once the handshake completed.
pub struct Endpoint {
    config: Config,
    state: State,
    is_client: bool,
    flight: Flight,

    local_epoch: u16,
    remote_epoch: u16,
    local_sequence_number: Vec<u64>,
    cipher: Option<CipherSuiteAes128Gcm>,

    handshake_send_seq: u16,
    handshake_recv_seq: u16,
    fragment_buffer: FragmentBuffer,
    transcript: Vec<u8>,

    local_random: HandshakeRandom,
    remote_random: HandshakeRandom,
    cookie: Vec<u8>,
    ecdhe: Option<EcdheKeypair>,
    master_secret: Vec<u8>,
    remote_certificate: Vec<u8>,
    srtp_profile: SrtpProtectionProfile,

    flight_msgs: Vec<FlightMsg>,
    retransmit_deadline: Option<Instant>,
    rto: Duration,
    retransmits: u8,

    transmits: VecDeque<Vec<u8>>,
    events: VecDeque<EndpointEvent>,
}

impl Endpoint {
    pub fn new(config: Config) -> Self {
        let is_client = config.role == DtlsRole::Client;
        let initial_rto = config.initial_rto;
        Endpoint {
            config,
            state: State::Handshaking,
            is_client,
            flight: if is_client { Flight::Flight1 } else { Flight::Flight0 },
            local_epoch: 0,
            remote_epoch: 0,
            local_sequence_number: vec![0, 0],
            cipher: None,
            handshake_send_seq: 0,
            handshake_recv_seq: 0,
            fragment_buffer: FragmentBuffer::new(),
            transcript: vec![],
            local_random: HandshakeRandom::generate(),
            remote_random: HandshakeRandom::default(),
            cookie: vec![],
            ecdhe: None,
            master_secret: vec![],
            remote_certificate: vec![],
            srtp_profile: SrtpProtectionProfile::Unsupported,
            flight_msgs: vec![],
            retransmit_deadline: None,
            rto: initial_rto,
            retransmits: 0,
            transmits: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    pub fn is_established(&self) -> bool {
        self.state == State::Established
    }

    pub fn srtp_profile(&self) -> SrtpProtectionProfile {
        self.srtp_profile
    }

    pub fn remote_certificate(&self) -> &[u8] {
        &self.remote_certificate
    }

    /// Local certificate fingerprint, for SDP.
    pub fn local_fingerprint(&self) -> String {
        self.config.identity.fingerprint()
    }

    /// Kicks off the handshake: the client sends flight 1, the server arms
    /// nothing and waits.
    pub fn start_handshake(&mut self, now: Instant) -> Result<()> {
        if self.is_client {
            self.send_client_hello(now)?;
        }
        Ok(())
    }

    /// Writes application data; only valid once established.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.state != State::Established {
            return Err(Error::ErrHandshakeInProgress);
        }
        let record = self.protect_record(ContentType::ApplicationData, data.to_vec())?;
        self.transmits.push_back(record);
        Ok(())
    }

    /// Sends close_notify and stops.
    pub fn close(&mut self) {
        if self.state == State::Closed {
            return;
        }
        let alert = Alert::close_notify().marshal();
        match self.protect_record(ContentType::Alert, alert) {
            Ok(record) => self.transmits.push_back(record),
            Err(err) => debug!("close_notify not sent: {err}"),
        }
        self.state = State::Closed;
        self.retransmit_deadline = None;
    }

    pub fn poll_transmit(&mut self) -> Option<Vec<u8>> {
        self.transmits.pop_front()
    }

    pub fn poll_event(&mut self) -> Option<EndpointEvent> {
        self.events.pop_front()
    }

    pub fn poll_timeout(&self) -> Option<Instant> {
        self.retransmit_deadline
    }

    pub fn handle_timeout(&mut self, now: Instant) {
        let Some(deadline) = self.retransmit_deadline else {
            return;
        };
        if deadline > now {
            return;
        }
        if self.retransmits >= self.config.max_retransmits {
            warn!("dtls handshake retries exhausted in {}", self.flight);
            self.fail(Error::ErrHandshakeTimeout);
            return;
        }
        self.retransmits += 1;
        self.rto = (self.rto * 2).min(self.config.max_rto);
        self.retransmit_deadline = Some(now + self.rto);
        debug!("retransmitting {} (attempt {})", self.flight, self.retransmits);
        self.flush_flight();
    }

    /// Feeds one datagram from the wire.
    pub fn handle_read(&mut self, datagram: &[u8], now: Instant) -> Result<()> {
        if self.state == State::Closed || self.state == State::Failed {
            return Ok(());
        }
        for (header, payload) in split_records(datagram)? {
            if let Err(err) = self.handle_record(header, payload, now) {
                match err {
                    // Per-record problems are dropped; handshake-fatal ones
                    // propagate after tearing down.
                    Error::ErrInvalidMac => {
                        debug!("dropping record with bad mac");
                    }
                    err => return Err(err),
                }
            }
        }
        Ok(())
    }

    fn handle_record(
        &mut self,
        header: RecordHeader,
        payload: Vec<u8>,
        now: Instant,
    ) -> Result<()> {
        // Accept the current epoch, plus the previous one while its
        // retransmissions may still be in flight.
        if header.epoch > self.remote_epoch {
            if header.epoch != self.remote_epoch + 1 {
                trace!("dropping record from future epoch {}", header.epoch);
                return Ok(());
            }
            // Epoch n+1 records can arrive slightly before the CCS when
            // datagrams reorder; the decrypt below acts as the gate.
        }

        let plaintext = if header.epoch > 0 {
            let Some(cipher) = &self.cipher else {
                trace!("dropping protected record before keys are ready");
                return Ok(());
            };
            cipher.decrypt(&header, &payload)?
        } else {
            payload
        };

        match header.content_type {
            ContentType::ChangeCipherSpec => {
                if plaintext.first() == Some(&1) {
                    self.remote_epoch = self.remote_epoch.max(1);
                }
                Ok(())
            }
            ContentType::Alert => {
                let alert = Alert::unmarshal(&plaintext)?;
                debug!("received alert {} {}", alert.level, alert.description);
                if alert.is_fatal_or_close() {
                    self.state = State::Closed;
                    self.retransmit_deadline = None;
                    self.events.push_back(EndpointEvent::PeerClosed);
                }
                Ok(())
            }
            ContentType::Handshake => self.handle_handshake_record(&plaintext, now),
            ContentType::ApplicationData => {
                if header.epoch == 0 {
                    return Err(Error::ErrApplicationDataEpochZero);
                }
                if self.state == State::Established {
                    self.events
                        .push_back(EndpointEvent::ApplicationData(plaintext));
                }
                Ok(())
            }
            ContentType::Invalid => Err(Error::ErrInvalidContentType),
        }
    }

    fn handle_handshake_record(&mut self, mut buf: &[u8], now: Instant) -> Result<()> {
        while buf.len() >= HANDSHAKE_HEADER_SIZE {
            let mut cursor = buf;
            let header = HandshakeHeader::unmarshal(&mut cursor)?;
            let frag_len = header.fragment_length as usize;
            if cursor.len() < frag_len {
                return Err(Error::ErrLengthMismatch);
            }
            let fragment = &cursor[..frag_len];
            buf = &buf[HANDSHAKE_HEADER_SIZE + frag_len..];

            if header.message_seq < self.handshake_recv_seq {
                // Peer retransmission: answer with our current flight.
                trace!("duplicate handshake seq {}", header.message_seq);
                if !self.flight_msgs.is_empty() {
                    self.flush_flight();
                }
                continue;
            }

            if let Some(complete) = self.fragment_buffer.push(header, fragment)? {
                self.handshake_recv_seq = header.message_seq + 1;
                self.process_handshake(complete, now)?;
            }
        }
        Ok(())
    }

    fn process_handshake(&mut self, raw: Vec<u8>, now: Instant) -> Result<()> {
        let mut cursor = &raw[..];
        let header = HandshakeHeader::unmarshal(&mut cursor)?;
        let typ = HandshakeType::from_u8(header.typ)?;
        let msg = HandshakeMessage::unmarshal_body(typ, cursor)?;
        trace!("handshake {typ:?} seq {}", header.message_seq);

        let result = if self.is_client {
            self.client_handle(msg, &raw, now)
        } else {
            self.server_handle(msg, &raw, now)
        };
        if let Err(err) = result {
            self.send_fatal_alert(AlertDescription::HandshakeFailure);
            self.fail(Error::Other(err.to_string()));
            return Err(err);
        }
        Ok(())
    }

    // --- client side -----------------------------------------------------

    fn send_client_hello(&mut self, now: Instant) -> Result<()> {
        let hello = ClientHello {
            cookie: self.cookie.clone(),
            ..ClientHello::new(
                self.local_random.clone(),
                vec![TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256],
                vec![
                    Extension::SupportedGroups(vec![SUPPORTED_GROUP_P256]),
                    Extension::EcPointFormats(vec![EC_POINT_FORMAT_UNCOMPRESSED]),
                    Extension::SignatureAlgorithms(vec![(HASH_SHA256, SIGNATURE_ECDSA)]),
                    Extension::UseSrtp(self.config.srtp_profiles.clone()),
                ],
            )
        };
        // The retried ClientHello joins the transcript, the first does not.
        let to_transcript = !self.cookie.is_empty();
        self.begin_flight(if self.cookie.is_empty() {
            Flight::Flight1
        } else {
            Flight::Flight3
        });
        self.queue_handshake(HandshakeMessage::ClientHello(hello), to_transcript);
        self.send_flight(now);
        Ok(())
    }

    fn client_handle(&mut self, msg: HandshakeMessage, raw: &[u8], now: Instant) -> Result<()> {
        match msg {
            HandshakeMessage::HelloVerifyRequest(hvr) => {
                // Restart with the cookie; transcript starts over.
                self.cookie = hvr.cookie;
                self.transcript.clear();
                self.send_client_hello(now)
            }
            HandshakeMessage::ServerHello(sh) => {
                if sh.version != PROTOCOL_VERSION {
                    return Err(Error::ErrInvalidCipherSuite);
                }
                if sh.cipher_suite != TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 {
                    return Err(Error::ErrCipherSuiteNoIntersection);
                }
                for ext in &sh.extensions {
                    if let Extension::UseSrtp(profiles) = ext {
                        self.srtp_profile = profiles
                            .iter()
                            .copied()
                            .find(|p| self.config.srtp_profiles.contains(p))
                            .ok_or(Error::ErrClientNoMatchingSrtpProfile)?;
                    }
                }
                if self.srtp_profile == SrtpProtectionProfile::Unsupported
                    && !self.config.srtp_profiles.is_empty()
                {
                    return Err(Error::ErrRequestedButNoSrtpExtension);
                }
                self.remote_random = sh.random;
                self.transcript.extend_from_slice(raw);
                Ok(())
            }
            HandshakeMessage::Certificate(cert) => {
                self.transcript.extend_from_slice(raw);
                self.store_remote_certificate(cert)
            }
            HandshakeMessage::ServerKeyExchange(ske) => {
                // Signature covers client_random + server_random + params.
                let mut signed = self.local_random.0.to_vec();
                signed.extend_from_slice(&self.remote_random.0);
                signed.extend_from_slice(&ske.params_bytes());
                verify_signature(&self.remote_certificate, &signed, &ske.signature)?;

                let ecdhe = EcdheKeypair::generate();
                let pre_master_secret = ecdhe.diffie_hellman(&ske.public_key)?;
                self.master_secret = prf_master_secret(
                    &pre_master_secret,
                    &self.local_random.0,
                    &self.remote_random.0,
                );
                self.ecdhe = Some(ecdhe);
                self.transcript.extend_from_slice(raw);
                Ok(())
            }
            HandshakeMessage::CertificateRequest(_) => {
                self.transcript.extend_from_slice(raw);
                Ok(())
            }
            HandshakeMessage::ServerHelloDone(_) => {
                self.transcript.extend_from_slice(raw);
                self.send_client_second_flight(now)
            }
            HandshakeMessage::Finished(finished) => {
                let expected = prf_verify_data(&self.master_secret, &self.transcript, false)?;
                if expected != finished.verify_data {
                    return Err(Error::ErrVerifyDataMismatch);
                }
                self.transcript.extend_from_slice(raw);
                self.complete_handshake();
                Ok(())
            }
            other => {
                debug!("client ignoring unexpected {:?}", other.typ());
                Ok(())
            }
        }
    }

    fn send_client_second_flight(&mut self, now: Instant) -> Result<()> {
        self.begin_flight(Flight::Flight5);

        let certificate = CertificateMsg {
            certificates: vec![self.config.identity.certificate_der.clone()],
        };
        self.queue_handshake(HandshakeMessage::Certificate(certificate), true);

        let public_key = self
            .ecdhe
            .as_ref()
            .map(|e| e.public.clone())
            .ok_or(Error::ErrInvalidFsmTransition)?;
        self.queue_handshake(
            HandshakeMessage::ClientKeyExchange(ClientKeyExchange { public_key }),
            true,
        );

        // CertificateVerify signs the transcript so far.
        let signature = self.config.identity.sign(&self.transcript);
        self.queue_handshake(
            HandshakeMessage::CertificateVerify(CertificateVerify {
                hash_algorithm: HASH_SHA256,
                signature_algorithm: SIGNATURE_ECDSA,
                signature,
            }),
            true,
        );

        self.init_cipher()?;
        self.queue_change_cipher_spec();
        let verify_data = prf_verify_data(&self.master_secret, &self.transcript, true)?;
        self.queue_handshake(HandshakeMessage::Finished(Finished { verify_data }), true);

        self.send_flight(now);
        Ok(())
    }

    // --- server side -----------------------------------------------------

    fn server_handle(&mut self, msg: HandshakeMessage, raw: &[u8], now: Instant) -> Result<()> {
        match msg {
            HandshakeMessage::ClientHello(ch) => self.server_handle_client_hello(ch, raw, now),
            HandshakeMessage::Certificate(cert) => {
                // Verified against CertificateVerify below; the fingerprint
                // pin is enforced as soon as the certificate arrives.
                self.transcript.extend_from_slice(raw);
                self.store_remote_certificate(cert)
            }
            HandshakeMessage::ClientKeyExchange(cke) => {
                let ecdhe = self.ecdhe.as_ref().ok_or(Error::ErrInvalidFsmTransition)?;
                let pre_master_secret = ecdhe.diffie_hellman(&cke.public_key)?;
                self.master_secret = prf_master_secret(
                    &pre_master_secret,
                    &self.remote_random.0,
                    &self.local_random.0,
                );
                self.transcript.extend_from_slice(raw);
                self.init_cipher()?;
                Ok(())
            }
            HandshakeMessage::CertificateVerify(cv) => {
                // The signature covers every message before CertificateVerify.
                verify_signature(&self.remote_certificate, &self.transcript, &cv.signature)?;
                self.transcript.extend_from_slice(raw);
                Ok(())
            }
            HandshakeMessage::Finished(finished) => {
                let expected = prf_verify_data(&self.master_secret, &self.transcript, true)?;
                if expected != finished.verify_data {
                    return Err(Error::ErrVerifyDataMismatch);
                }
                self.transcript.extend_from_slice(raw);
                self.send_server_finished(now)
            }
            other => {
                debug!("server ignoring unexpected {:?}", other.typ());
                Ok(())
            }
        }
    }

    fn server_handle_client_hello(
        &mut self,
        ch: ClientHello,
        raw: &[u8],
        now: Instant,
    ) -> Result<()> {
        if ch.cookie.is_empty() || ch.cookie != self.cookie {
            // Stateless cookie round (RFC 6347 Section 4.2.1).
            if self.cookie.is_empty() {
                let mut cookie = vec![0u8; COOKIE_LENGTH];
                rand::thread_rng().fill(cookie.as_mut_slice());
                self.cookie = cookie;
            }
            self.begin_flight(Flight::Flight2);
            self.queue_handshake(
                HandshakeMessage::HelloVerifyRequest(HelloVerifyRequest::new(self.cookie.clone())),
                false,
            );
            self.send_flight(now);
            return Ok(());
        }

        if !ch
            .cipher_suites
            .contains(&TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256)
        {
            return Err(Error::ErrCipherSuiteNoIntersection);
        }
        let mut chosen_profile = SrtpProtectionProfile::Unsupported;
        for ext in &ch.extensions {
            if let Extension::UseSrtp(profiles) = ext {
                chosen_profile = self
                    .config
                    .srtp_profiles
                    .iter()
                    .copied()
                    .find(|p| profiles.contains(p))
                    .ok_or(Error::ErrServerNoMatchingSrtpProfile)?;
            }
        }
        self.srtp_profile = chosen_profile;
        self.remote_random = ch.random;
        self.transcript.extend_from_slice(raw);

        self.begin_flight(Flight::Flight4);
        let mut extensions = vec![Extension::EcPointFormats(vec![EC_POINT_FORMAT_UNCOMPRESSED])];
        if chosen_profile != SrtpProtectionProfile::Unsupported {
            extensions.push(Extension::UseSrtp(vec![chosen_profile]));
        }
        self.queue_handshake(
            HandshakeMessage::ServerHello(ServerHello::new(
                self.local_random.clone(),
                TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
                extensions,
            )),
            true,
        );

        self.queue_handshake(
            HandshakeMessage::Certificate(CertificateMsg {
                certificates: vec![self.config.identity.certificate_der.clone()],
            }),
            true,
        );

        let ecdhe = EcdheKeypair::generate();
        let mut ske = ServerKeyExchange {
            named_curve: crate::curve::NamedCurve::P256,
            public_key: ecdhe.public.clone(),
            hash_algorithm: HASH_SHA256,
            signature_algorithm: SIGNATURE_ECDSA,
            signature: vec![],
        };
        let mut signed = self.remote_random.0.to_vec();
        signed.extend_from_slice(&self.local_random.0);
        signed.extend_from_slice(&ske.params_bytes());
        ske.signature = self.config.identity.sign(&signed);
        self.ecdhe = Some(ecdhe);
        self.queue_handshake(HandshakeMessage::ServerKeyExchange(ske), true);

        self.queue_handshake(
            HandshakeMessage::CertificateRequest(CertificateRequest::default()),
            true,
        );
        self.queue_handshake(HandshakeMessage::ServerHelloDone(ServerHelloDone), true);
        self.send_flight(now);
        Ok(())
    }

    fn send_server_finished(&mut self, now: Instant) -> Result<()> {
        self.begin_flight(Flight::Flight6);
        self.queue_change_cipher_spec();
        let verify_data = prf_verify_data(&self.master_secret, &self.transcript, false)?;
        self.queue_handshake(HandshakeMessage::Finished(Finished { verify_data }), true);
        self.send_flight(now);
        self.complete_handshake();
        Ok(())
    }

    // --- shared helpers --------------------------------------------------

    fn store_remote_certificate(&mut self, cert: CertificateMsg) -> Result<()> {
        let leaf = cert
            .certificates
            .first()
            .ok_or(Error::ErrInvalidCertificate)?;
        if let Some(expected) = &self.config.remote_fingerprint {
            let actual = fingerprint_of(leaf);
            if !fingerprints_match(expected, &actual) {
                warn!("peer certificate fingerprint mismatch");
                return Err(Error::ErrCertificateFingerprintMismatch);
            }
        }
        self.remote_certificate = leaf.clone();
        Ok(())
    }

    fn init_cipher(&mut self) -> Result<()> {
        let (client_random, server_random) = if self.is_client {
            (&self.local_random.0, &self.remote_random.0)
        } else {
            (&self.remote_random.0, &self.local_random.0)
        };
        let keys = prf_encryption_keys(&self.master_secret, client_random, server_random, 16, 4);
        self.cipher = Some(CipherSuiteAes128Gcm::new(&keys, self.is_client)?);
        Ok(())
    }

    fn complete_handshake(&mut self) {
        if self.state == State::Handshaking {
            self.state = State::Established;
            // The final flight stays armed until the peer stops
            // retransmitting; duplicates re-trigger it explicitly.
            self.retransmit_deadline = None;
            self.events.push_back(EndpointEvent::HandshakeComplete {
                srtp_profile: self.srtp_profile,
            });
        }
    }

    fn begin_flight(&mut self, flight: Flight) {
        self.flight = flight;
        self.flight_msgs.clear();
        self.retransmits = 0;
        self.rto = self.config.initial_rto;
    }

    fn queue_handshake(&mut self, msg: HandshakeMessage, to_transcript: bool) {
        let raw = msg.marshal_with_header(self.handshake_send_seq);
        self.handshake_send_seq += 1;
        if to_transcript {
            self.transcript.extend_from_slice(&raw);
        }
        self.flight_msgs.push(FlightMsg {
            content_type: ContentType::Handshake,
            payload: raw,
            epoch: self.local_epoch,
        });
    }

    fn queue_change_cipher_spec(&mut self) {
        self.flight_msgs.push(FlightMsg {
            content_type: ContentType::ChangeCipherSpec,
            payload: vec![1],
            epoch: self.local_epoch,
        });
        // Everything after the CCS is protected under the new epoch.
        self.local_epoch = 1;
    }

    fn send_flight(&mut self, now: Instant) {
        self.retransmit_deadline = Some(now + self.rto);
        self.flush_flight();
    }

    /// Serializes the current flight into one datagram, assigning fresh
    /// record sequence numbers (retransmissions must not reuse them).
    fn flush_flight(&mut self) {
        let mut datagram = Vec::new();
        for i in 0..self.flight_msgs.len() {
            let (content_type, epoch, payload) = {
                let m = &self.flight_msgs[i];
                (m.content_type, m.epoch, m.payload.clone())
            };
            match self.build_record(content_type, epoch, payload) {
                Ok(bytes) => datagram.extend_from_slice(&bytes),
                Err(err) => {
                    warn!("failed to build record: {err}");
                    return;
                }
            }
        }
        if !datagram.is_empty() {
            self.transmits.push_back(datagram);
        }
    }

    fn next_sequence(&mut self, epoch: u16) -> Result<u64> {
        while self.local_sequence_number.len() <= epoch as usize {
            self.local_sequence_number.push(0);
        }
        let seq = self.local_sequence_number[epoch as usize];
        if seq >= (1 << 48) - 1 {
            return Err(Error::ErrSequenceNumberOverflow);
        }
        self.local_sequence_number[epoch as usize] += 1;
        Ok(seq)
    }

    fn build_record(
        &mut self,
        content_type: ContentType,
        epoch: u16,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let sequence_number = self.next_sequence(epoch)?;
        let record = Record::new(content_type, epoch, sequence_number, payload);
        if epoch > 0 {
            let cipher = self.cipher.as_ref().ok_or(Error::ErrCipherSuiteUnset)?;
            let protected = cipher.encrypt(&record.header, &record.payload)?;
            let mut r = record;
            r.payload = protected;
            Ok(r.marshal())
        } else {
            Ok(record.marshal())
        }
    }

    fn protect_record(&mut self, content_type: ContentType, payload: Vec<u8>) -> Result<Vec<u8>> {
        if self.local_epoch == 0 {
            return Err(Error::ErrHandshakeInProgress);
        }
        self.build_record(content_type, self.local_epoch, payload)
    }

    fn send_fatal_alert(&mut self, description: AlertDescription) {
        let payload = Alert::fatal(description).marshal();
        let epoch = self.local_epoch;
        if let Ok(bytes) = self.build_record(ContentType::Alert, epoch, payload) {
            self.transmits.push_back(bytes);
        }
    }

    fn fail(&mut self, err: Error) {
        if self.state != State::Failed {
            self.state = State::Failed;
            self.retransmit_deadline = None;
            self.events.push_back(EndpointEvent::HandshakeFailed(err));
        }
    }
}

impl KeyingMaterialExporter for Endpoint {
    /// Exports RFC 5705 keying material; for SRTP use the
    /// [`EXTRACTOR_DTLS_SRTP`] label.
    fn export_keying_material(
        &self,
        label: &str,
        context: &[u8],
        length: usize,
    ) -> Result<Vec<u8>> {
        if self.state != State::Established {
            return Err(Error::HandshakeInProgress);
        }
        if !context.is_empty() {
            return Err(Error::ContextUnsupported);
        }
        if label != EXTRACTOR_DTLS_SRTP {
            return Err(Error::ReservedExportKeyingMaterial);
        }
        let (client_random, server_random) = if self.is_client {
            (&self.local_random.0, &self.remote_random.0)
        } else {
            (&self.remote_random.0, &self.local_random.0)
        };
        Ok(prf_export_keying_material(
            &self.master_secret,
            label.as_bytes(),
            client_random,
            server_random,
            length,
        ))
    }
}
