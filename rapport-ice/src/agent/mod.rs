#[cfg(test)]
mod agent_test;

pub mod agent_config;
pub mod proto;

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::Instant;

use log::{debug, trace, warn};
use shared::error::{Error, Result};
use shared::util::generate_tie_breaker;
use stun::agent::TransactionEvent;
use stun::attributes::Getter;
use stun::error_code::{ErrorCodeAttribute, CODE_ROLE_CONFLICT};
use stun::fingerprint::FINGERPRINT;
use stun::integrity::MessageIntegrity;
use stun::message::{
    Message, MessageClass, Method, TransactionId, BINDING_ERROR, BINDING_REQUEST, BINDING_SUCCESS,
};
use stun::textattrs::Username;
use stun::xoraddr::XorMappedAddress;

use crate::candidate::candidate_pair::{CandidatePair, CandidatePairState};
use crate::candidate::{
    compute_priority, Candidate, CandidateConfig, CandidateRelatedAddress, CandidateType,
};
use crate::connection_state::{ConnectionState, GatheringState};
use crate::rand::{generate_pwd, generate_ufrag};

use agent_config::AgentConfig;
use proto::{AttrControlled, AttrControlling, PriorityAttr, UseCandidateAttr};

/// Datagram the embedder must put on the wire, from the socket bound to
/// `local` towards `remote`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    pub local: SocketAddr,
    pub remote: SocketAddr,
    pub message: Vec<u8>,
}

/// Observable agent events, drained with [`Agent::poll_event`].
#[derive(Debug, Clone)]
pub enum AgentEvent {
    CandidateGathered(Candidate),
    ConnectionStateChange(ConnectionState),
    GatheringStateChange(GatheringState),
    SelectedPairChange(Box<(Candidate, Candidate)>),
}

/// What an in-flight STUN transaction was sent for.
#[derive(Debug, Clone, Copy)]
enum CheckPurpose {
    /// Server-reflexive gathering against a STUN server.
    Gather { local_index: usize },
    /// Connectivity check for a pair.
    Check {
        pair_index: usize,
        nominate: bool,
    },
    /// Consent freshness probe on the selected pair.
    Consent,
}

/// A sans-IO ICE agent (RFC 8445).
///
/// The embedder owns the sockets: it feeds inbound datagrams to
/// [`handle_read`](Agent::handle_read), flushes [`poll_transmit`](Agent::poll_transmit)
/// to the wire, and calls [`handle_timeout`](Agent::handle_timeout) whenever
/// [`poll_timeout`](Agent::poll_timeout) expires.
pub struct Agent {
    config: AgentConfig,

    local_ufrag: String,
    local_pwd: String,
    remote_ufrag: String,
    remote_pwd: String,

    generation: u32,
    tie_breaker: u64,
    is_controlling: bool,

    local_candidates: Vec<Candidate>,
    remote_candidates: Vec<Candidate>,
    checklist: Vec<CandidatePair>,
    triggered_queue: VecDeque<(usize, bool)>,

    stun_agent: stun::agent::Agent,
    checks: HashMap<TransactionId, CheckPurpose>,
    // transaction id -> destination of the original request, for retransmits
    check_routes: HashMap<TransactionId, (SocketAddr, SocketAddr)>,

    connection_state: ConnectionState,
    gathering_state: GatheringState,
    gather_deadline: Option<Instant>,
    next_check_at: Option<Instant>,

    selected_pair: Option<usize>,
    nomination_sent: bool,
    consent_deadline: Option<Instant>,
    last_consent: Option<Instant>,

    transmits: VecDeque<Transmit>,
    events: VecDeque<AgentEvent>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Agent {
            config,
            local_ufrag: generate_ufrag(),
            local_pwd: generate_pwd(),
            remote_ufrag: String::new(),
            remote_pwd: String::new(),
            generation: 0,
            tie_breaker: generate_tie_breaker(),
            is_controlling: false,
            local_candidates: vec![],
            remote_candidates: vec![],
            checklist: vec![],
            triggered_queue: VecDeque::new(),
            stun_agent: stun::agent::Agent::new(),
            checks: HashMap::new(),
            check_routes: HashMap::new(),
            connection_state: ConnectionState::New,
            gathering_state: GatheringState::New,
            gather_deadline: None,
            next_check_at: None,
            selected_pair: None,
            nomination_sent: false,
            consent_deadline: None,
            last_consent: None,
            transmits: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    pub fn local_credentials(&self) -> (&str, &str) {
        (&self.local_ufrag, &self.local_pwd)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn gathering_state(&self) -> GatheringState {
        self.gathering_state
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_controlling(&self) -> bool {
        self.is_controlling
    }

    pub fn local_candidates(&self) -> &[Candidate] {
        &self.local_candidates
    }

    /// The selected pair, once one has been nominated.
    pub fn selected_pair(&self) -> Option<(Candidate, Candidate)> {
        self.selected_pair.map(|i| {
            let pair = &self.checklist[i];
            (
                self.local_candidates[pair.local_index].clone(),
                self.remote_candidates[pair.remote_index].clone(),
            )
        })
    }

    pub fn set_remote_credentials(&mut self, ufrag: String, pwd: String) -> Result<()> {
        if ufrag.is_empty() {
            return Err(Error::ErrRemoteUfragEmpty);
        }
        if pwd.is_empty() {
            return Err(Error::ErrRemotePwdEmpty);
        }
        self.remote_ufrag = ufrag;
        self.remote_pwd = pwd;
        Ok(())
    }

    /// Starts gathering. Host candidates are created from `local_addrs`
    /// (one per bound socket); server-reflexive gathering is kicked off
    /// against every configured STUN server.
    pub fn gather_candidates(&mut self, local_addrs: &[SocketAddr], now: Instant) -> Result<()> {
        if self.gathering_state == GatheringState::Gathering {
            return Err(Error::ErrMultipleGatherAttempted);
        }
        self.set_gathering_state(GatheringState::Gathering);
        self.gather_deadline = Some(now + self.config.gather_timeout);

        for addr in local_addrs {
            let candidate = CandidateConfig {
                address: addr.ip().to_string(),
                port: addr.port(),
                typ: CandidateType::Host,
                generation: self.generation,
                ufrag: self.local_ufrag.clone(),
                ..Default::default()
            }
            .new_candidate()?;
            self.add_local_candidate(candidate);
        }

        let servers = self.config.stun_servers.clone();
        for server in servers {
            for local_index in 0..self.local_candidates.len() {
                if self.local_candidates[local_index].candidate_type() != CandidateType::Host {
                    continue;
                }
                self.send_gather_request(local_index, server, now)?;
            }
        }

        if self.config.stun_servers.is_empty() {
            self.finish_gathering();
        }
        Ok(())
    }

    /// Adds a relayed candidate obtained from a TURN allocation driven by
    /// the embedder.
    pub fn add_relay_candidate(
        &mut self,
        relayed: SocketAddr,
        related: SocketAddr,
    ) -> Result<()> {
        let candidate = CandidateConfig {
            address: relayed.ip().to_string(),
            port: relayed.port(),
            typ: CandidateType::Relay,
            related_address: Some(CandidateRelatedAddress {
                address: related.ip().to_string(),
                port: related.port(),
            }),
            generation: self.generation,
            ufrag: self.local_ufrag.clone(),
            ..Default::default()
        }
        .new_candidate()?;
        self.add_local_candidate(candidate);
        Ok(())
    }

    pub fn add_remote_candidate(&mut self, candidate: Candidate) {
        if self
            .remote_candidates
            .iter()
            .any(|c| c.address() == candidate.address() && c.port() == candidate.port())
        {
            return;
        }
        self.remote_candidates.push(candidate);
        let remote_index = self.remote_candidates.len() - 1;
        for local_index in 0..self.local_candidates.len() {
            self.form_pair(local_index, remote_index);
        }
        self.reprioritize_checklist();
    }

    /// Starts connectivity checks with the given role.
    pub fn start_checks(&mut self, is_controlling: bool, now: Instant) -> Result<()> {
        if self.remote_ufrag.is_empty() {
            return Err(Error::ErrRemoteUfragEmpty);
        }
        self.is_controlling = is_controlling;
        self.set_connection_state(ConnectionState::Checking);
        self.next_check_at = Some(now);
        Ok(())
    }

    /// Regenerates credentials and discards candidates, pairs and in-flight
    /// checks. Sockets (and therefore the embedder's bindings) survive.
    pub fn restart(&mut self) -> Result<()> {
        if self.gathering_state == GatheringState::Gathering {
            return Err(Error::ErrRestartWhenGathering);
        }
        self.local_ufrag = generate_ufrag();
        self.local_pwd = generate_pwd();
        self.remote_ufrag = String::new();
        self.remote_pwd = String::new();
        self.generation += 1;
        self.tie_breaker = generate_tie_breaker();

        self.local_candidates.clear();
        self.remote_candidates.clear();
        self.checklist.clear();
        self.triggered_queue.clear();
        self.checks.clear();
        self.check_routes.clear();
        let _ = self.stun_agent.close();
        self.stun_agent = stun::agent::Agent::new();

        self.selected_pair = None;
        self.nomination_sent = false;
        self.consent_deadline = None;
        self.last_consent = None;
        self.next_check_at = None;
        self.gathering_state = GatheringState::New;
        self.set_connection_state(ConnectionState::New);
        Ok(())
    }

    pub fn close(&mut self) {
        let _ = self.stun_agent.close();
        self.triggered_queue.clear();
        self.checks.clear();
        self.set_connection_state(ConnectionState::Closed);
    }

    /// Feeds one inbound STUN datagram that arrived on `local` from `remote`.
    pub fn handle_read(
        &mut self,
        local: SocketAddr,
        remote: SocketAddr,
        data: &[u8],
        now: Instant,
    ) -> Result<()> {
        let mut msg = Message::new();
        msg.unmarshal_binary(data)?;

        if msg.typ.method != Method::Binding {
            return Err(Error::ErrUnexpectedResponse);
        }
        match msg.typ.class {
            MessageClass::Request => self.handle_binding_request(msg, local, remote, now),
            MessageClass::SuccessResponse | MessageClass::ErrorResponse => {
                self.stun_agent.process(msg)?;
                self.drain_stun_agent(now);
                Ok(())
            }
            MessageClass::Indication => Ok(()),
        }
    }

    pub fn handle_timeout(&mut self, now: Instant) {
        if self.connection_state == ConnectionState::Closed {
            return;
        }

        if let Some(deadline) = self.gather_deadline {
            if deadline <= now {
                self.finish_gathering();
            }
        }

        if let Some(at) = self.next_check_at {
            if at <= now && self.connection_state != ConnectionState::New {
                self.run_one_check(now);
                self.next_check_at = Some(now + self.config.check_pacing);
            }
        }

        if let Some(at) = self.consent_deadline {
            if at <= now {
                self.send_consent_check(now);
                self.consent_deadline = Some(now + self.config.consent_interval);
            }
        }

        if let Some(last) = self.last_consent {
            let elapsed = now.saturating_duration_since(last);
            if elapsed > self.config.consent_expiry {
                self.set_connection_state(ConnectionState::Failed);
                self.consent_deadline = None;
            } else if elapsed > self.config.consent_interval
                && self.connection_state == ConnectionState::Connected
                || elapsed > self.config.consent_interval
                    && self.connection_state == ConnectionState::Completed
            {
                self.set_connection_state(ConnectionState::Disconnected);
            }
        }

        self.stun_agent.handle_timeout(now);
        self.drain_stun_agent(now);
    }

    pub fn poll_timeout(&self) -> Option<Instant> {
        let mut deadline = self.stun_agent.poll_timeout();
        for d in [self.gather_deadline, self.next_check_at, self.consent_deadline] {
            deadline = match (deadline, d) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        deadline
    }

    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.transmits.pop_front()
    }

    pub fn poll_event(&mut self) -> Option<AgentEvent> {
        self.events.pop_front()
    }

    fn add_local_candidate(&mut self, candidate: Candidate) {
        self.local_candidates.push(candidate.clone());
        let local_index = self.local_candidates.len() - 1;
        for remote_index in 0..self.remote_candidates.len() {
            self.form_pair(local_index, remote_index);
        }
        self.reprioritize_checklist();
        self.events.push_back(AgentEvent::CandidateGathered(candidate));
    }

    fn form_pair(&mut self, local_index: usize, remote_index: usize) {
        let local = &self.local_candidates[local_index];
        let remote = &self.remote_candidates[remote_index];
        if local.component() != remote.component() || !local.same_family(remote) {
            return;
        }
        let pair = CandidatePair::new(
            local_index,
            remote_index,
            local.priority(),
            remote.priority(),
            self.is_controlling,
        );
        if self.checklist.iter().any(|p| *p == pair) {
            return;
        }
        self.checklist.push(pair);
    }

    /// Sorts by pair priority and derives initial states: the best pair of
    /// each foundation is waiting, the rest stay frozen (RFC 8445 6.1.2.6).
    fn reprioritize_checklist(&mut self) {
        for pair in &mut self.checklist {
            pair.ice_role_controlling = self.is_controlling;
        }
        self.checklist
            .sort_by(|a, b| b.priority().cmp(&a.priority()));
        self.triggered_queue.clear();

        let mut seen_foundations: Vec<String> = vec![];
        for i in 0..self.checklist.len() {
            let pair = self.checklist[i];
            if pair.state != CandidatePairState::Frozen {
                continue;
            }
            let foundation = format!(
                "{}/{}",
                self.local_candidates[pair.local_index].foundation(),
                self.remote_candidates[pair.remote_index].foundation()
            );
            if !seen_foundations.contains(&foundation) {
                seen_foundations.push(foundation);
                self.checklist[i].state = CandidatePairState::Waiting;
            }
        }
    }

    /// Unfreezes pairs sharing the foundation of a pair that just succeeded
    /// (RFC 8445 Section 7.2.5.3.3).
    fn unfreeze_foundation(&mut self, succeeded_index: usize) {
        let foundation = self.local_candidates[self.checklist[succeeded_index].local_index]
            .foundation()
            .to_owned();
        let locals = &self.local_candidates;
        for pair in &mut self.checklist {
            if pair.state == CandidatePairState::Frozen
                && locals[pair.local_index].foundation() == foundation
            {
                pair.state = CandidatePairState::Waiting;
            }
        }
    }

    fn run_one_check(&mut self, now: Instant) {
        // Triggered checks take precedence over ordinary ones.
        let next = self.triggered_queue.pop_front().or_else(|| {
            self.checklist
                .iter()
                .position(|p| p.state == CandidatePairState::Waiting)
                .map(|i| (i, false))
        });
        let Some((pair_index, nominate)) = next else {
            return;
        };
        if pair_index >= self.checklist.len() {
            return;
        }
        if self.checklist[pair_index].binding_request_count >= self.config.max_binding_requests {
            self.checklist[pair_index].state = CandidatePairState::Failed;
            self.check_for_failure();
            return;
        }
        if let Err(err) = self.send_check(pair_index, nominate, now) {
            warn!("failed to send check: {err}");
        }
    }

    fn send_check(
        &mut self,
        pair_index: usize,
        nominate: bool,
        now: Instant,
    ) -> Result<TransactionId> {
        let pair = self.checklist[pair_index];
        let local = &self.local_candidates[pair.local_index];
        let remote = &self.remote_candidates[pair.remote_index];

        let username = format!("{}:{}", self.remote_ufrag, self.local_ufrag);
        let prflx_priority = compute_priority(
            CandidateType::PeerReflexive,
            crate::candidate::DEFAULT_LOCAL_PREFERENCE,
            local.component(),
        );
        let use_candidate = nominate || (self.is_controlling && self.config.aggressive_nomination);

        let mut setters: Vec<Box<dyn stun::attributes::Setter>> = vec![
            Box::new(BINDING_REQUEST),
            Box::new(TransactionId::new()),
            Box::new(Username::new(username)),
            Box::new(PriorityAttr(prflx_priority)),
        ];
        if self.is_controlling {
            setters.push(Box::new(AttrControlling(self.tie_breaker)));
            if use_candidate {
                setters.push(Box::new(UseCandidateAttr));
            }
        } else {
            setters.push(Box::new(AttrControlled(self.tie_breaker)));
        }
        setters.push(Box::new(MessageIntegrity::new_short_term_integrity(
            self.remote_pwd.clone(),
        )));
        setters.push(Box::new(FINGERPRINT));

        let mut msg = Message::new();
        msg.build(&setters)?;

        let local_addr = local.addr()?;
        let remote_addr = remote.addr()?;
        self.stun_agent.start(msg.transaction_id, msg.raw.clone(), now)?;
        self.checks.insert(
            msg.transaction_id,
            CheckPurpose::Check {
                pair_index,
                nominate: use_candidate,
            },
        );
        self.check_routes
            .insert(msg.transaction_id, (local_addr, remote_addr));

        self.checklist[pair_index].state = CandidatePairState::InProgress;
        self.checklist[pair_index].binding_request_count += 1;
        trace!(
            "sending check for pair {:?} (nominate={use_candidate})",
            self.checklist[pair_index]
        );
        let id = msg.transaction_id;
        self.transmits.push_back(Transmit {
            local: local_addr,
            remote: remote_addr,
            message: msg.raw,
        });
        Ok(id)
    }

    fn send_gather_request(
        &mut self,
        local_index: usize,
        server: SocketAddr,
        now: Instant,
    ) -> Result<()> {
        let mut msg = Message::new();
        msg.build(&[Box::new(BINDING_REQUEST), Box::new(TransactionId::new())])?;
        let local_addr = self.local_candidates[local_index].addr()?;
        self.stun_agent.start(msg.transaction_id, msg.raw.clone(), now)?;
        self.checks
            .insert(msg.transaction_id, CheckPurpose::Gather { local_index });
        self.check_routes
            .insert(msg.transaction_id, (local_addr, server));
        self.transmits.push_back(Transmit {
            local: local_addr,
            remote: server,
            message: msg.raw,
        });
        Ok(())
    }

    fn send_consent_check(&mut self, now: Instant) {
        let Some(pair_index) = self.selected_pair else {
            return;
        };
        match self.send_check(pair_index, false, now) {
            Ok(id) => {
                // Consent probes do not alter pair state on success.
                self.checks.insert(id, CheckPurpose::Consent);
                self.checklist[pair_index].state = CandidatePairState::Succeeded;
            }
            Err(err) => warn!("consent check failed to send: {err}"),
        }
    }

    fn handle_binding_request(
        &mut self,
        msg: Message,
        local: SocketAddr,
        remote: SocketAddr,
        now: Instant,
    ) -> Result<()> {
        // USERNAME must be "local_ufrag:remote_ufrag" from our perspective.
        let username = String::from_utf8(msg.get(stun::attributes::ATTR_USERNAME)?)?;
        let expected = format!("{}:{}", self.local_ufrag, self.remote_ufrag);
        if !self.remote_ufrag.is_empty() && username != expected {
            return Err(Error::ErrMismatchUsername);
        }

        let integrity = MessageIntegrity::new_short_term_integrity(self.local_pwd.clone());
        {
            let mut msg = msg.clone();
            integrity.check(&mut msg)?;
        }

        // Role conflict resolution (RFC 8445 Section 7.3.1.1).
        let mut their_controlling = AttrControlling::default();
        let mut their_controlled = AttrControlled::default();
        if self.is_controlling && their_controlling.get_from(&msg).is_ok() {
            if self.tie_breaker >= their_controlling.0 {
                return self.send_role_conflict(msg, local, remote);
            }
            self.is_controlling = false;
            self.reprioritize_checklist();
        } else if !self.is_controlling && their_controlled.get_from(&msg).is_ok() {
            if self.tie_breaker >= their_controlled.0 {
                self.is_controlling = true;
                self.reprioritize_checklist();
            } else {
                return self.send_role_conflict(msg, local, remote);
            }
        }

        // Learn a peer-reflexive candidate if the source is unknown
        // (RFC 8445 Section 7.3.1.3).
        let mut their_priority = PriorityAttr::default();
        let _ = their_priority.get_from(&msg);
        let remote_index = match self
            .remote_candidates
            .iter()
            .position(|c| c.addr().map(|a| a == remote).unwrap_or(false))
        {
            Some(i) => i,
            None => {
                let prflx = CandidateConfig {
                    address: remote.ip().to_string(),
                    port: remote.port(),
                    typ: CandidateType::PeerReflexive,
                    priority: their_priority.0,
                    generation: self.generation,
                    ..Default::default()
                }
                .new_candidate()?;
                debug!("learned peer-reflexive candidate {prflx}");
                self.remote_candidates.push(prflx);
                let remote_index = self.remote_candidates.len() - 1;
                for local_index in 0..self.local_candidates.len() {
                    self.form_pair(local_index, remote_index);
                }
                remote_index
            }
        };

        // Send the success response before acting on USE-CANDIDATE.
        let mut response = Message::new();
        response.build(&[
            Box::new(BINDING_SUCCESS),
            Box::new(msg.transaction_id),
            Box::new(XorMappedAddress {
                ip: remote.ip(),
                port: remote.port(),
            }),
            Box::new(integrity),
            Box::new(FINGERPRINT),
        ])?;
        self.transmits.push_back(Transmit {
            local,
            remote,
            message: response.raw,
        });

        let Some(pair_index) = self.checklist.iter().position(|p| {
            p.remote_index == remote_index
                && self.local_candidates[p.local_index]
                    .addr()
                    .map(|a| a == local)
                    .unwrap_or(false)
        }) else {
            return Ok(());
        };

        if UseCandidateAttr::is_set(&msg) && !self.is_controlling {
            self.checklist[pair_index].nominated = true;
            if self.checklist[pair_index].state == CandidatePairState::Succeeded {
                self.select_pair(pair_index, now);
            }
        }

        // Schedule a triggered check back on this pair.
        if self.checklist[pair_index].state != CandidatePairState::Succeeded
            && !self
                .triggered_queue
                .iter()
                .any(|(i, _)| *i == pair_index)
        {
            self.triggered_queue.push_back((pair_index, false));
        }
        Ok(())
    }

    fn send_role_conflict(
        &mut self,
        msg: Message,
        local: SocketAddr,
        remote: SocketAddr,
    ) -> Result<()> {
        let mut response = Message::new();
        response.build(&[
            Box::new(BINDING_ERROR),
            Box::new(msg.transaction_id),
            Box::new(CODE_ROLE_CONFLICT),
            Box::new(MessageIntegrity::new_short_term_integrity(
                self.local_pwd.clone(),
            )),
            Box::new(FINGERPRINT),
        ])?;
        self.transmits.push_back(Transmit {
            local,
            remote,
            message: response.raw,
        });
        Ok(())
    }

    fn drain_stun_agent(&mut self, now: Instant) {
        while let Some(event) = self.stun_agent.poll_event() {
            match event {
                TransactionEvent::Response(msg) => self.on_stun_response(msg, now),
                TransactionEvent::Retransmit(id, raw) => {
                    if let Some((local, remote)) = self.check_routes.get(&id) {
                        self.transmits.push_back(Transmit {
                            local: *local,
                            remote: *remote,
                            message: raw,
                        });
                    }
                }
                TransactionEvent::TimedOut(id) => {
                    self.check_routes.remove(&id);
                    match self.checks.remove(&id) {
                        Some(CheckPurpose::Check { pair_index, .. }) => {
                            if pair_index < self.checklist.len() {
                                self.checklist[pair_index].state = CandidatePairState::Failed;
                            }
                            self.check_for_failure();
                        }
                        Some(CheckPurpose::Consent) => {
                            // Absence of consent is handled by the expiry
                            // clock in handle_timeout.
                        }
                        Some(CheckPurpose::Gather { .. }) | None => {}
                    }
                }
                TransactionEvent::Cancelled(id) => {
                    self.checks.remove(&id);
                    self.check_routes.remove(&id);
                }
            }
        }
    }

    fn on_stun_response(&mut self, msg: Message, now: Instant) {
        self.check_routes.remove(&msg.transaction_id);
        let Some(purpose) = self.checks.remove(&msg.transaction_id) else {
            debug!("response for unknown transaction");
            return;
        };

        match purpose {
            CheckPurpose::Gather { local_index } => {
                let mut mapped = XorMappedAddress::default();
                if mapped.get_from(&msg).is_err() {
                    return;
                }
                let base = &self.local_candidates[local_index];
                let related = CandidateRelatedAddress {
                    address: base.address().to_owned(),
                    port: base.port(),
                };
                let Ok(candidate) = (CandidateConfig {
                    address: mapped.ip.to_string(),
                    port: mapped.port,
                    typ: CandidateType::ServerReflexive,
                    related_address: Some(related),
                    generation: self.generation,
                    ufrag: self.local_ufrag.clone(),
                    ..Default::default()
                })
                .new_candidate() else {
                    return;
                };
                let duplicate = self
                    .local_candidates
                    .iter()
                    .any(|c| c.address() == candidate.address() && c.port() == candidate.port());
                if !duplicate {
                    self.add_local_candidate(candidate);
                }
                if self.checks.values().all(|p| !matches!(p, CheckPurpose::Gather { .. })) {
                    self.finish_gathering();
                }
            }
            CheckPurpose::Check { pair_index, nominate } => {
                if pair_index >= self.checklist.len() {
                    return;
                }
                if msg.typ.class == MessageClass::ErrorResponse {
                    let mut code = ErrorCodeAttribute::default();
                    if code.get_from(&msg).is_ok() && code.code == CODE_ROLE_CONFLICT {
                        // Switch role and retry (RFC 8445 Section 7.2.5.1).
                        self.is_controlling = !self.is_controlling;
                        self.tie_breaker = generate_tie_breaker();
                        self.reprioritize_checklist();
                        self.triggered_queue.push_back((pair_index, false));
                    } else {
                        self.checklist[pair_index].state = CandidatePairState::Failed;
                        self.check_for_failure();
                    }
                    return;
                }

                // Response integrity uses the same key as the request.
                let integrity =
                    MessageIntegrity::new_short_term_integrity(self.remote_pwd.clone());
                let mut verify = msg.clone();
                if integrity.check(&mut verify).is_err() {
                    warn!("dropping check response with bad integrity");
                    return;
                }

                self.checklist[pair_index].state = CandidatePairState::Succeeded;
                self.last_consent = Some(now);
                self.unfreeze_foundation(pair_index);

                if nominate || self.checklist[pair_index].nominated {
                    self.checklist[pair_index].nominated = true;
                    self.select_pair(pair_index, now);
                } else if self.is_controlling && !self.nomination_sent {
                    // Regular nomination: re-check the first succeeded pair
                    // with USE-CANDIDATE.
                    self.nomination_sent = true;
                    self.triggered_queue.push_front((pair_index, true));
                }
            }
            CheckPurpose::Consent => {
                self.last_consent = Some(now);
                if self.connection_state == ConnectionState::Disconnected {
                    self.set_connection_state(ConnectionState::Connected);
                }
            }
        }
    }

    fn select_pair(&mut self, pair_index: usize, now: Instant) {
        let previous = self.selected_pair;
        self.selected_pair = Some(pair_index);
        if previous != Some(pair_index) {
            let pair = &self.checklist[pair_index];
            self.events.push_back(AgentEvent::SelectedPairChange(Box::new((
                self.local_candidates[pair.local_index].clone(),
                self.remote_candidates[pair.remote_index].clone(),
            ))));
        }
        self.last_consent = Some(now);
        self.consent_deadline = Some(now + self.config.consent_interval);
        self.set_connection_state(ConnectionState::Connected);

        let all_done = self
            .checklist
            .iter()
            .all(|p| !matches!(p.state, CandidatePairState::Waiting | CandidatePairState::InProgress));
        if all_done {
            self.set_connection_state(ConnectionState::Completed);
        }
    }

    fn check_for_failure(&mut self) {
        if self.selected_pair.is_some() {
            return;
        }
        let all_failed = !self.checklist.is_empty()
            && self
                .checklist
                .iter()
                .all(|p| p.state == CandidatePairState::Failed);
        if all_failed {
            self.set_connection_state(ConnectionState::Failed);
        }
    }

    fn finish_gathering(&mut self) {
        if self.gathering_state != GatheringState::Complete {
            self.gather_deadline = None;
            self.set_gathering_state(GatheringState::Complete);
        }
    }

    fn set_connection_state(&mut self, state: ConnectionState) {
        if self.connection_state != state {
            debug!("ICE connection state {} -> {state}", self.connection_state);
            self.connection_state = state;
            self.events
                .push_back(AgentEvent::ConnectionStateChange(state));
        }
    }

    fn set_gathering_state(&mut self, state: GatheringState) {
        if self.gathering_state != state {
            self.gathering_state = state;
            self.events
                .push_back(AgentEvent::GatheringStateChange(state));
        }
    }
}
