#[cfg(test)]
mod data_channel_test;

use std::collections::VecDeque;
use std::fmt;

use bytes::Bytes;
use log::debug;
use sctp::chunk::chunk_payload_data::PayloadProtocolIdentifier;
use sctp::ReliabilityType;
use shared::error::{Error, Result};

use crate::message::message_channel_ack::DataChannelAck;
use crate::message::message_channel_open::{ChannelType, DataChannelOpen};
use crate::message::Message;

/// DataChannel states mirroring the W3C surface.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DataChannelState {
    #[default]
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for DataChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            DataChannelState::Connecting => "connecting",
            DataChannelState::Open => "open",
            DataChannelState::Closing => "closing",
            DataChannelState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Creation-time options, the RTCDataChannelInit dictionary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DataChannelConfig {
    pub label: String,
    pub protocol: String,
    pub ordered: bool,
    pub max_packet_life_time: Option<u16>,
    pub max_retransmits: Option<u16>,
    /// Out-of-band negotiated channels skip DCEP and use this id.
    pub negotiated: Option<u16>,
    pub priority: u16,
}

impl DataChannelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.label.len() > u16::MAX as usize {
            return Err(Error::ErrStringSizeLimit);
        }
        if self.protocol.len() > u16::MAX as usize {
            return Err(Error::ErrProtocolTooLarge);
        }
        if self.max_packet_life_time.is_some() && self.max_retransmits.is_some() {
            return Err(Error::ErrRetransmitsOrPacketLifeTime);
        }
        Ok(())
    }

    fn channel_type(&self) -> ChannelType {
        match (self.ordered, self.max_retransmits, self.max_packet_life_time) {
            (true, None, None) => ChannelType::Reliable,
            (false, None, None) => ChannelType::ReliableUnordered,
            (true, Some(_), _) => ChannelType::PartialReliableRexmit,
            (false, Some(_), _) => ChannelType::PartialReliableRexmitUnordered,
            (true, None, Some(_)) => ChannelType::PartialReliableTimed,
            (false, None, Some(_)) => ChannelType::PartialReliableTimedUnordered,
        }
    }

    pub fn reliability(&self) -> ReliabilityType {
        if let Some(rexmit) = self.max_retransmits {
            ReliabilityType::Rexmit(u32::from(rexmit))
        } else if let Some(lifetime) = self.max_packet_life_time {
            ReliabilityType::Timed(u32::from(lifetime))
        } else {
            ReliabilityType::Reliable
        }
    }
}

/// Outbound SCTP message produced by the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub ppi: PayloadProtocolIdentifier,
    pub payload: Bytes,
    pub ordered: bool,
    pub reliability: ReliabilityType,
}

/// Channel events.
#[derive(Debug, Clone, PartialEq)]
pub enum DataChannelEvent {
    StateChange(DataChannelState),
    /// UTF-8 text message.
    MessageString(String),
    /// Binary message.
    MessageBinary(Bytes),
    BufferedAmountLow,
}

/// One WebRTC DataChannel bound to an SCTP stream (RFC 8831).
///
/// Sans-IO: the session layer moves [`OutboundMessage`]s into the SCTP
/// association and feeds inbound (PPID, payload) pairs back in.
pub struct DataChannel {
    pub stream_id: u16,
    pub config: DataChannelConfig,
    state: DataChannelState,

    buffered_amount: usize,
    buffered_amount_low_threshold: usize,

    outbound: VecDeque<OutboundMessage>,
    events: VecDeque<DataChannelEvent>,
}

impl DataChannel {
    /// Opens a channel actively: queues DATA_CHANNEL_OPEN unless the channel
    /// was negotiated out of band.
    pub fn dial(config: DataChannelConfig, stream_id: u16) -> Result<Self> {
        config.validate()?;
        let mut channel = DataChannel {
            stream_id,
            config,
            state: DataChannelState::Connecting,
            buffered_amount: 0,
            buffered_amount_low_threshold: 0,
            outbound: VecDeque::new(),
            events: VecDeque::new(),
        };

        if channel.config.negotiated.is_some() {
            // Negotiated channels are usable immediately.
            channel.set_state(DataChannelState::Open);
        } else {
            let open = DataChannelOpen {
                channel_type: channel.config.channel_type(),
                priority: channel.config.priority,
                reliability_parameter: match channel.config.reliability() {
                    ReliabilityType::Reliable => 0,
                    ReliabilityType::Rexmit(n) => n,
                    ReliabilityType::Timed(ms) => ms,
                },
                label: channel.config.label.clone().into_bytes(),
                protocol: channel.config.protocol.clone().into_bytes(),
            };
            let raw = shared::marshal::Marshal::marshal(&Message::DataChannelOpen(open))?;
            // DCEP always travels ordered and reliable on the stream.
            channel.outbound.push_back(OutboundMessage {
                ppi: PayloadProtocolIdentifier::Dcep,
                payload: Bytes::from(raw.to_vec()),
                ordered: true,
                reliability: ReliabilityType::Reliable,
            });
        }
        Ok(channel)
    }

    /// Accepts a channel from an inbound DATA_CHANNEL_OPEN: replies with the
    /// ACK and is immediately open.
    pub fn accept(stream_id: u16, open: DataChannelOpen) -> Result<Self> {
        let config = DataChannelConfig {
            label: String::from_utf8(open.label.clone())?,
            protocol: String::from_utf8(open.protocol.clone())?,
            ordered: open.channel_type.is_ordered(),
            max_retransmits: match open.channel_type {
                ChannelType::PartialReliableRexmit
                | ChannelType::PartialReliableRexmitUnordered => {
                    Some(open.reliability_parameter as u16)
                }
                _ => None,
            },
            max_packet_life_time: match open.channel_type {
                ChannelType::PartialReliableTimed
                | ChannelType::PartialReliableTimedUnordered => {
                    Some(open.reliability_parameter as u16)
                }
                _ => None,
            },
            negotiated: None,
            priority: open.priority,
        };

        let mut channel = DataChannel {
            stream_id,
            config,
            state: DataChannelState::Connecting,
            buffered_amount: 0,
            buffered_amount_low_threshold: 0,
            outbound: VecDeque::new(),
            events: VecDeque::new(),
        };

        let raw = shared::marshal::Marshal::marshal(&Message::DataChannelAck(DataChannelAck))?;
        channel.outbound.push_back(OutboundMessage {
            ppi: PayloadProtocolIdentifier::Dcep,
            payload: Bytes::from(raw.to_vec()),
            ordered: true,
            reliability: ReliabilityType::Reliable,
        });
        channel.set_state(DataChannelState::Open);
        Ok(channel)
    }

    pub fn state(&self) -> DataChannelState {
        self.state
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    pub fn buffered_amount(&self) -> usize {
        self.buffered_amount
    }

    pub fn set_buffered_amount_low_threshold(&mut self, threshold: usize) {
        self.buffered_amount_low_threshold = threshold;
    }

    /// Queues a UTF-8 text message.
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        let (ppi, payload) = if text.is_empty() {
            (PayloadProtocolIdentifier::StringEmpty, Bytes::from_static(&[0]))
        } else {
            (
                PayloadProtocolIdentifier::String,
                Bytes::from(text.as_bytes().to_vec()),
            )
        };
        self.send_raw(ppi, payload)
    }

    /// Queues a binary message.
    pub fn send_binary(&mut self, data: Bytes) -> Result<()> {
        let (ppi, payload) = if data.is_empty() {
            (PayloadProtocolIdentifier::BinaryEmpty, Bytes::from_static(&[0]))
        } else {
            (PayloadProtocolIdentifier::Binary, data)
        };
        self.send_raw(ppi, payload)
    }

    fn send_raw(&mut self, ppi: PayloadProtocolIdentifier, payload: Bytes) -> Result<()> {
        if self.state != DataChannelState::Open {
            return Err(Error::ErrDataChannelNotOpen);
        }
        self.buffered_amount += payload.len();
        self.outbound.push_back(OutboundMessage {
            ppi,
            payload,
            ordered: self.config.ordered,
            reliability: self.config.reliability(),
        });
        Ok(())
    }

    /// Acknowledges bytes handed to the SCTP association, driving the
    /// buffered-amount-low event.
    pub fn on_buffered_amount_sent(&mut self, sent: usize) {
        let before = self.buffered_amount;
        self.buffered_amount = self.buffered_amount.saturating_sub(sent);
        if before > self.buffered_amount_low_threshold
            && self.buffered_amount <= self.buffered_amount_low_threshold
        {
            self.events.push_back(DataChannelEvent::BufferedAmountLow);
        }
    }

    /// Feeds one SCTP message that arrived on this channel's stream.
    pub fn handle_inbound(
        &mut self,
        ppi: PayloadProtocolIdentifier,
        payload: &Bytes,
    ) -> Result<()> {
        match ppi {
            PayloadProtocolIdentifier::Dcep => {
                let mut buf = &payload[..];
                match <Message as shared::marshal::Unmarshal>::unmarshal(&mut buf)? {
                    Message::DataChannelAck(_) => {
                        if self.state == DataChannelState::Connecting {
                            self.set_state(DataChannelState::Open);
                        }
                    }
                    Message::DataChannelOpen(_) => {
                        debug!("unexpected DATA_CHANNEL_OPEN on established stream");
                    }
                }
            }
            PayloadProtocolIdentifier::String => {
                let text = String::from_utf8(payload.to_vec())?;
                self.events.push_back(DataChannelEvent::MessageString(text));
            }
            PayloadProtocolIdentifier::StringEmpty => {
                self.events
                    .push_back(DataChannelEvent::MessageString(String::new()));
            }
            PayloadProtocolIdentifier::Binary => {
                self.events
                    .push_back(DataChannelEvent::MessageBinary(payload.clone()));
            }
            PayloadProtocolIdentifier::BinaryEmpty => {
                self.events
                    .push_back(DataChannelEvent::MessageBinary(Bytes::new()));
            }
            PayloadProtocolIdentifier::Unknown => {
                return Err(Error::InvalidPayloadProtocolIdentifier(0));
            }
        }
        Ok(())
    }

    /// Begins closing; the session resets the SCTP stream and confirms with
    /// [`on_stream_reset`](DataChannel::on_stream_reset).
    pub fn close(&mut self) {
        if matches!(
            self.state,
            DataChannelState::Closing | DataChannelState::Closed
        ) {
            return;
        }
        self.set_state(DataChannelState::Closing);
    }

    /// The underlying SCTP stream was reset; the channel is gone.
    pub fn on_stream_reset(&mut self) {
        if self.state != DataChannelState::Closed {
            if self.state == DataChannelState::Open {
                // Remote-initiated close passes through closing first.
                self.set_state(DataChannelState::Closing);
            }
            self.set_state(DataChannelState::Closed);
        }
    }

    pub fn poll_outbound(&mut self) -> Option<OutboundMessage> {
        self.outbound.pop_front()
    }

    pub fn poll_event(&mut self) -> Option<DataChannelEvent> {
        self.events.pop_front()
    }

    fn set_state(&mut self, state: DataChannelState) {
        if self.state != state {
            self.state = state;
            self.events.push_back(DataChannelEvent::StateChange(state));
        }
    }
}
