#[cfg(test)]
mod agent_test;

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use shared::error::{Error, Result};

use crate::message::{Message, TransactionId};

/// Initial retransmission timeout (RFC 5389 Section 7.2.1).
pub const INITIAL_RTO: Duration = Duration::from_millis(500);
/// Maximum number of retransmissions; with the original send this is the
/// RFC 5389 Rc=7 transmission schedule.
pub const MAX_RETRANSMITS: u8 = 6;
/// Wait after the last retransmission, Rm * RTO (RFC 5389 Section 7.2.1).
/// Together the schedule is 0.5+1+2+4+8+16+8 = 39.5s.
pub const LAST_WAIT: Duration = Duration::from_millis(8000);

/// A transaction in progress. The raw request is retained so the agent can
/// hand it back for retransmission.
struct AgentTransaction {
    id: TransactionId,
    raw: Vec<u8>,
    deadline: Instant,
    rto: Duration,
    retries: u8,
}

/// Event delivered to the transaction owner.
#[derive(Debug)]
pub enum TransactionEvent {
    /// A response arrived and the transaction completed.
    Response(Message),
    /// The retransmission timer fired; the raw request should be re-sent.
    Retransmit(TransactionId, Vec<u8>),
    /// All retries are exhausted.
    TimedOut(TransactionId),
    /// The transaction was cancelled by `close` or `stop`.
    Cancelled(TransactionId),
}

/// Low-level abstraction over the list of in-flight STUN transactions:
/// registration, response matching, retransmission pacing and timeouts.
/// Sans-IO: the owner sends bytes and feeds responses/clock ticks back in.
#[derive(Default)]
pub struct Agent {
    transactions: HashMap<TransactionId, AgentTransaction>,
    events_queue: VecDeque<TransactionEvent>,
    closed: bool,
}

impl Agent {
    pub fn new() -> Self {
        Agent::default()
    }

    /// Registers a request that was just sent. The deadline for the first
    /// retransmission is `now + INITIAL_RTO`.
    pub fn start(&mut self, id: TransactionId, raw: Vec<u8>, now: Instant) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        if self.transactions.contains_key(&id) {
            return Err(Error::ErrTransactionExists);
        }
        self.transactions.insert(
            id,
            AgentTransaction {
                id,
                raw,
                deadline: now + INITIAL_RTO,
                rto: INITIAL_RTO,
                retries: 0,
            },
        );
        Ok(())
    }

    /// Forgets a transaction without emitting a timeout.
    pub fn stop(&mut self, id: TransactionId) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        self.transactions
            .remove(&id)
            .map(|t| {
                self.events_queue.push_back(TransactionEvent::Cancelled(t.id));
            })
            .ok_or(Error::ErrTransactionNotExists)
    }

    /// Matches an incoming decoded message against a pending transaction.
    /// Unmatched responses are delivered anyway so the owner can treat them
    /// as unsolicited (e.g. TURN Data indications).
    pub fn process(&mut self, message: Message) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        self.transactions.remove(&message.transaction_id);
        self.events_queue
            .push_back(TransactionEvent::Response(message));
        Ok(())
    }

    /// Advances retransmission timers.
    pub fn handle_timeout(&mut self, now: Instant) {
        let mut fired: Vec<TransactionId> = Vec::new();
        for t in self.transactions.values() {
            if t.deadline <= now {
                fired.push(t.id);
            }
        }

        for id in fired {
            let Some(t) = self.transactions.get_mut(&id) else {
                continue;
            };
            if t.retries >= MAX_RETRANSMITS {
                self.transactions.remove(&id);
                self.events_queue.push_back(TransactionEvent::TimedOut(id));
                continue;
            }
            t.retries += 1;
            t.deadline = if t.retries == MAX_RETRANSMITS {
                now + LAST_WAIT
            } else {
                t.rto *= 2;
                now + t.rto
            };
            let raw = t.raw.clone();
            self.events_queue
                .push_back(TransactionEvent::Retransmit(id, raw));
        }
    }

    /// Earliest deadline among pending transactions.
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.transactions.values().map(|t| t.deadline).min()
    }

    pub fn poll_event(&mut self) -> Option<TransactionEvent> {
        self.events_queue.pop_front()
    }

    /// Terminates every in-flight transaction with `Cancelled` and renders
    /// the agent unusable.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        for id in self.transactions.keys().copied().collect::<Vec<_>>() {
            self.transactions.remove(&id);
            self.events_queue.push_back(TransactionEvent::Cancelled(id));
        }
        self.closed = true;
        Ok(())
    }
}
