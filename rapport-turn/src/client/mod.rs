#[cfg(test)]
mod client_test;

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use log::{debug, warn};
use shared::error::{Error, Result};
use stun::agent::{Agent, TransactionEvent};
use stun::attributes::{
    Getter, ATTR_DATA, ATTR_XOR_PEER_ADDRESS, ATTR_XOR_RELAYED_ADDRESS,
};
use stun::error_code::{ErrorCodeAttribute, CODE_UNAUTHORIZED};
use stun::integrity::MessageIntegrity;
use stun::message::{
    Message, MessageClass, MessageType, Method, TransactionId,
};
use stun::textattrs::{Nonce, Realm, TextAttribute, Username};
use stun::xoraddr::XorMappedAddress;
use stun::attributes::{ATTR_NONCE, ATTR_REALM};

use crate::proto::chandata::ChannelData;
use crate::proto::{ChannelNumber, Lifetime, RequestedTransport, MIN_CHANNEL_NUMBER};
use crate::DEFAULT_LIFETIME;

/// What a pending transaction was sent for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Purpose {
    AllocateInitial,
    Allocate,
    Refresh,
    CreatePermission(IpAddr),
    ChannelBind(SocketAddr, u16),
}

/// Datagram the embedder must put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    pub to: SocketAddr,
    pub payload: Vec<u8>,
}

/// Observable client events.
#[derive(Debug)]
pub enum ClientEvent {
    /// Allocation succeeded; the relayed transport address is usable.
    Allocated {
        relayed_addr: SocketAddr,
        lifetime: Duration,
    },
    AllocateFailed(Error),
    PermissionCreated(IpAddr),
    ChannelBound(SocketAddr, u16),
    /// Application data relayed from a peer.
    DataFromPeer(SocketAddr, Vec<u8>),
    RefreshFailed(Error),
}

pub struct ClientConfig {
    pub server_addr: SocketAddr,
    pub username: String,
    pub password: String,
    pub software: Option<String>,
}

/// Sans-IO TURN client (RFC 5766) speaking the long-term credential
/// mechanism. The embedder forwards datagrams from the server into `recv`,
/// drains `poll_transmit`/`poll_event`, and calls `handle_timeout`.
///
/// Once a channel is bound the client prefers ChannelData framing for
/// peer traffic; before that it falls back to Send indications.
pub struct Client {
    config: ClientConfig,
    agent: Agent,
    purposes: HashMap<TransactionId, Purpose>,

    realm: Option<String>,
    nonce: Option<String>,
    integrity: Option<MessageIntegrity>,

    relayed_addr: Option<SocketAddr>,
    lifetime: Duration,
    refresh_at: Option<Instant>,

    permissions: HashMap<IpAddr, bool>,
    // peer addr -> (channel number, bound)
    bindings: HashMap<SocketAddr, (u16, bool)>,
    next_channel_number: u16,

    transmits: VecDeque<Transmit>,
    events: VecDeque<ClientEvent>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Client {
            config,
            agent: Agent::new(),
            purposes: HashMap::new(),
            realm: None,
            nonce: None,
            integrity: None,
            relayed_addr: None,
            lifetime: DEFAULT_LIFETIME,
            refresh_at: None,
            permissions: HashMap::new(),
            bindings: HashMap::new(),
            next_channel_number: MIN_CHANNEL_NUMBER,
            transmits: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    pub fn relayed_addr(&self) -> Option<SocketAddr> {
        self.relayed_addr
    }

    /// Starts the Allocate transaction. The first request goes out without
    /// credentials; the expected 401 carries the realm and nonce used for
    /// the authenticated retry.
    pub fn allocate(&mut self, now: Instant) -> Result<()> {
        if self.relayed_addr.is_some() {
            return Err(Error::ErrAlreadyAllocated);
        }
        let msg = self.build_allocate(false)?;
        self.send_request(msg, Purpose::AllocateInitial, now)
    }

    /// Requests a permission for `peer`'s IP on the allocation.
    pub fn create_permission(&mut self, peer: SocketAddr, now: Instant) -> Result<()> {
        if self.relayed_addr.is_none() {
            return Err(Error::ErrNoAllocation);
        }
        let mut msg = Message::new();
        msg.build(&self.with_auth(vec![
            Box::new(MessageType::new(
                Method::CreatePermission,
                MessageClass::Request,
            )),
            Box::new(TransactionId::new()),
            Box::new(XorMappedAddressAs::peer(peer)),
        ])?)?;
        self.send_request(msg, Purpose::CreatePermission(peer.ip()), now)
    }

    /// Binds a channel to `peer`, enabling the 4-byte ChannelData framing.
    pub fn channel_bind(&mut self, peer: SocketAddr, now: Instant) -> Result<()> {
        if self.relayed_addr.is_none() {
            return Err(Error::ErrNoAllocation);
        }
        let number = match self.bindings.get(&peer) {
            Some((n, _)) => *n,
            None => {
                let n = self.next_channel_number;
                self.next_channel_number += 1;
                self.bindings.insert(peer, (n, false));
                n
            }
        };
        let mut msg = Message::new();
        msg.build(&self.with_auth(vec![
            Box::new(MessageType::new(Method::ChannelBind, MessageClass::Request)),
            Box::new(TransactionId::new()),
            Box::new(ChannelNumber(number)),
            Box::new(XorMappedAddressAs::peer(peer)),
        ])?)?;
        self.send_request(msg, Purpose::ChannelBind(peer, number), now)
    }

    /// Sends application data to `peer` through the relay.
    pub fn send_to(&mut self, data: &[u8], peer: SocketAddr) -> Result<()> {
        if self.relayed_addr.is_none() {
            return Err(Error::ErrNoAllocation);
        }
        if let Some((number, true)) = self.bindings.get(&peer).copied() {
            let cd = ChannelData {
                number,
                data: data.to_vec(),
            };
            self.transmits.push_back(Transmit {
                to: self.config.server_addr,
                payload: cd.encode(),
            });
            return Ok(());
        }
        if !self.permissions.get(&peer.ip()).copied().unwrap_or(false) {
            return Err(Error::ErrNoPermission);
        }
        let mut msg = Message::new();
        msg.build(&[
            Box::new(MessageType::new(Method::Send, MessageClass::Indication)),
            Box::new(TransactionId::new()),
            Box::new(XorMappedAddressAs::peer(peer)),
        ])?;
        msg.add(ATTR_DATA, data);
        self.transmits.push_back(Transmit {
            to: self.config.server_addr,
            payload: msg.raw,
        });
        Ok(())
    }

    /// Feeds a datagram received from the TURN server.
    pub fn recv(&mut self, raw: &[u8], now: Instant) -> Result<()> {
        if ChannelData::is_channel_data(raw) {
            let cd = ChannelData::decode(raw)?;
            let peer = self
                .bindings
                .iter()
                .find(|(_, (n, _))| *n == cd.number)
                .map(|(addr, _)| *addr);
            match peer {
                Some(addr) => self
                    .events
                    .push_back(ClientEvent::DataFromPeer(addr, cd.data)),
                None => return Err(Error::ErrChannelBindNotFound),
            }
            return Ok(());
        }

        let mut msg = Message::new();
        msg.unmarshal_binary(raw)?;

        if msg.typ == MessageType::new(Method::Data, MessageClass::Indication) {
            let mut peer = XorMappedAddress::default();
            peer.get_from_as(&msg, ATTR_XOR_PEER_ADDRESS)?;
            let data = msg.get(ATTR_DATA)?;
            self.events.push_back(ClientEvent::DataFromPeer(
                SocketAddr::new(peer.ip, peer.port),
                data,
            ));
            return Ok(());
        }

        self.agent.process(msg)?;
        self.drain_agent(now);
        Ok(())
    }

    pub fn handle_timeout(&mut self, now: Instant) {
        if let Some(at) = self.refresh_at {
            if at <= now && self.relayed_addr.is_some() {
                if let Err(err) = self.refresh(now) {
                    warn!("refresh failed to build: {err}");
                    self.events.push_back(ClientEvent::RefreshFailed(err));
                }
                self.refresh_at = Some(now + self.lifetime / 2);
            }
        }
        self.agent.handle_timeout(now);
        self.drain_agent(now);
    }

    pub fn poll_timeout(&self) -> Option<Instant> {
        match (self.agent.poll_timeout(), self.refresh_at) {
            (Some(a), Some(r)) => Some(a.min(r)),
            (Some(a), None) => Some(a),
            (None, r) => r,
        }
    }

    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.transmits.pop_front()
    }

    pub fn poll_event(&mut self) -> Option<ClientEvent> {
        self.events.pop_front()
    }

    pub fn close(&mut self) {
        let _ = self.agent.close();
        self.purposes.clear();
        self.relayed_addr = None;
        self.refresh_at = None;
    }

    fn refresh(&mut self, now: Instant) -> Result<()> {
        let mut msg = Message::new();
        msg.build(&self.with_auth(vec![
            Box::new(MessageType::new(Method::Refresh, MessageClass::Request)),
            Box::new(TransactionId::new()),
            Box::new(Lifetime(self.lifetime)),
        ])?)?;
        self.send_request(msg, Purpose::Refresh, now)
    }

    fn build_allocate(&self, with_auth: bool) -> Result<Message> {
        let mut setters: Vec<Box<dyn stun::attributes::Setter>> = vec![
            Box::new(MessageType::new(Method::Allocate, MessageClass::Request)),
            Box::new(TransactionId::new()),
            Box::new(RequestedTransport::default()),
            Box::new(Lifetime(DEFAULT_LIFETIME)),
        ];
        if let Some(software) = &self.config.software {
            setters.push(Box::new(stun::textattrs::Software::new(software.clone())));
        }
        let mut msg = Message::new();
        if with_auth {
            msg.build(&self.with_auth(setters)?)?;
        } else {
            msg.build(&setters)?;
        }
        Ok(msg)
    }

    /// Appends USERNAME/REALM/NONCE and MESSAGE-INTEGRITY to a setter list.
    fn with_auth(
        &self,
        mut setters: Vec<Box<dyn stun::attributes::Setter>>,
    ) -> Result<Vec<Box<dyn stun::attributes::Setter>>> {
        let realm = self.realm.clone().ok_or(Error::ErrNoTurnCredentials)?;
        let nonce = self.nonce.clone().ok_or(Error::ErrNoTurnCredentials)?;
        let integrity = self
            .integrity
            .clone()
            .ok_or(Error::ErrNoTurnCredentials)?;
        setters.push(Box::new(Username::new(self.config.username.clone())));
        setters.push(Box::new(Realm::new(realm)));
        setters.push(Box::new(Nonce::new(nonce)));
        setters.push(Box::new(integrity));
        Ok(setters)
    }

    fn send_request(&mut self, msg: Message, purpose: Purpose, now: Instant) -> Result<()> {
        self.agent.start(msg.transaction_id, msg.raw.clone(), now)?;
        self.purposes.insert(msg.transaction_id, purpose);
        self.transmits.push_back(Transmit {
            to: self.config.server_addr,
            payload: msg.raw,
        });
        Ok(())
    }

    fn drain_agent(&mut self, now: Instant) {
        while let Some(event) = self.agent.poll_event() {
            match event {
                TransactionEvent::Response(msg) => {
                    let Some(purpose) = self.purposes.remove(&msg.transaction_id) else {
                        debug!("response for unknown transaction {msg}");
                        continue;
                    };
                    self.on_response(purpose, msg, now);
                }
                TransactionEvent::Retransmit(_, raw) => {
                    self.transmits.push_back(Transmit {
                        to: self.config.server_addr,
                        payload: raw,
                    });
                }
                TransactionEvent::TimedOut(id) => {
                    let purpose = self.purposes.remove(&id);
                    match purpose {
                        Some(Purpose::AllocateInitial) | Some(Purpose::Allocate) => {
                            self.events
                                .push_back(ClientEvent::AllocateFailed(Error::ErrTimeout));
                        }
                        Some(Purpose::Refresh) => {
                            self.events
                                .push_back(ClientEvent::RefreshFailed(Error::ErrTimeout));
                        }
                        _ => debug!("transaction {id:?} timed out"),
                    }
                }
                TransactionEvent::Cancelled(_) => {}
            }
        }
    }

    fn on_response(&mut self, purpose: Purpose, msg: Message, now: Instant) {
        match purpose {
            Purpose::AllocateInitial => {
                if msg.typ.class == MessageClass::ErrorResponse {
                    let mut code = ErrorCodeAttribute::default();
                    let unauthorized = code.get_from(&msg).is_ok() && code.code == CODE_UNAUTHORIZED;
                    if unauthorized {
                        // Learn realm/nonce, derive the long-term key, retry.
                        let realm = TextAttribute::get_from_as(&msg, ATTR_REALM)
                            .map(|a| a.text)
                            .unwrap_or_default();
                        let nonce = TextAttribute::get_from_as(&msg, ATTR_NONCE)
                            .map(|a| a.text)
                            .unwrap_or_default();
                        self.integrity = Some(MessageIntegrity::new_long_term_integrity(
                            &self.config.username,
                            &realm,
                            &self.config.password,
                        ));
                        self.realm = Some(realm);
                        self.nonce = Some(nonce);
                        match self.build_allocate(true) {
                            Ok(retry) => {
                                if let Err(err) = self.send_request(retry, Purpose::Allocate, now) {
                                    self.events.push_back(ClientEvent::AllocateFailed(err));
                                }
                            }
                            Err(err) => {
                                self.events.push_back(ClientEvent::AllocateFailed(err))
                            }
                        }
                    } else {
                        self.events
                            .push_back(ClientEvent::AllocateFailed(Error::ErrUnexpectedResponse));
                    }
                } else {
                    // Some servers skip the 401 round.
                    self.on_allocate_success(msg, now);
                }
            }
            Purpose::Allocate => {
                if msg.typ.class == MessageClass::ErrorResponse {
                    self.events
                        .push_back(ClientEvent::AllocateFailed(Error::ErrUnexpectedResponse));
                } else {
                    self.on_allocate_success(msg, now);
                }
            }
            Purpose::Refresh => {
                if msg.typ.class == MessageClass::ErrorResponse {
                    self.events
                        .push_back(ClientEvent::RefreshFailed(Error::ErrFailedToRefreshAllocation));
                } else {
                    let mut lifetime = Lifetime::default();
                    if lifetime.get_from(&msg).is_ok() {
                        self.lifetime = lifetime.0;
                        self.refresh_at = Some(now + self.lifetime / 2);
                    }
                }
            }
            Purpose::CreatePermission(ip) => {
                if msg.typ.class != MessageClass::ErrorResponse {
                    self.permissions.insert(ip, true);
                    self.events.push_back(ClientEvent::PermissionCreated(ip));
                }
            }
            Purpose::ChannelBind(peer, number) => {
                if msg.typ.class != MessageClass::ErrorResponse {
                    self.bindings.insert(peer, (number, true));
                    self.events.push_back(ClientEvent::ChannelBound(peer, number));
                }
            }
        }
    }

    fn on_allocate_success(&mut self, msg: Message, now: Instant) {
        let mut relayed = XorMappedAddress::default();
        if let Err(err) = relayed.get_from_as(&msg, ATTR_XOR_RELAYED_ADDRESS) {
            self.events.push_back(ClientEvent::AllocateFailed(err));
            return;
        }
        let mut lifetime = Lifetime(DEFAULT_LIFETIME);
        let _ = lifetime.get_from(&msg);

        let addr = SocketAddr::new(relayed.ip, relayed.port);
        self.relayed_addr = Some(addr);
        self.lifetime = lifetime.0;
        self.refresh_at = Some(now + self.lifetime / 2);
        self.events.push_back(ClientEvent::Allocated {
            relayed_addr: addr,
            lifetime: lifetime.0,
        });
    }
}

/// Helper wrapping [`XorMappedAddress`] to target the XOR-PEER-ADDRESS
/// attribute from a setter list.
struct XorMappedAddressAs {
    inner: XorMappedAddress,
}

impl XorMappedAddressAs {
    fn peer(addr: SocketAddr) -> Self {
        XorMappedAddressAs {
            inner: XorMappedAddress {
                ip: addr.ip(),
                port: addr.port(),
            },
        }
    }
}

impl stun::attributes::Setter for XorMappedAddressAs {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        self.inner.add_to_as(m, ATTR_XOR_PEER_ADDRESS)
    }
}
