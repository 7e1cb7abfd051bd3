#[cfg(test)]
mod jitter_buffer_test;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::packet::Packet;
use crate::sequence::{seq_distance, seq_newer};

/// Default number of slots a buffer holds before the oldest is forced out.
pub const DEFAULT_CAPACITY: usize = 512;

/// Default time a gap may stall delivery before it is skipped.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(200);

/// Reorders packets of one SSRC by sequence number.
///
/// Packets pop strictly in order. A missing packet stalls the head of line
/// until it arrives or `max_wait` passes, after which the gap is skipped.
pub struct JitterBuffer {
    capacity: usize,
    max_wait: Duration,
    // extended-order key: distance from `head` at insert time
    packets: BTreeMap<i64, Packet>,
    next_seq: Option<u16>,
    extended_base: i64,
    last_pop: Option<Instant>,
}

impl Default for JitterBuffer {
    fn default() -> Self {
        JitterBuffer::new(DEFAULT_CAPACITY, DEFAULT_MAX_WAIT)
    }
}

impl JitterBuffer {
    pub fn new(capacity: usize, max_wait: Duration) -> Self {
        JitterBuffer {
            capacity: capacity.max(1),
            max_wait,
            packets: BTreeMap::new(),
            next_seq: None,
            extended_base: 0,
            last_pop: None,
        }
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Sequence numbers currently missing in front of buffered packets;
    /// input for the NACK generator.
    pub fn missing(&self) -> Vec<u16> {
        let Some(next) = self.next_seq else {
            return vec![];
        };
        let mut missing = vec![];
        let mut expected = next;
        for key in self.packets.keys() {
            let seq = (*key & 0xFFFF) as u16;
            while seq_newer(expected, seq) {
                missing.push(expected);
                expected = expected.wrapping_add(1);
            }
            expected = seq.wrapping_add(1);
        }
        missing
    }

    fn extended(&self, seq: u16) -> i64 {
        match self.next_seq {
            Some(next) => self.extended_base + i64::from(seq_distance(next, seq)),
            None => i64::from(seq),
        }
    }

    /// Inserts a packet. Stale packets (already delivered) and duplicates
    /// are dropped.
    pub fn push(&mut self, packet: Packet, now: Instant) {
        let seq = packet.header.sequence_number;
        if let Some(next) = self.next_seq {
            if seq_distance(next, seq) < 0 {
                // older than the next expected packet
                return;
            }
        } else {
            self.next_seq = Some(seq);
            self.extended_base = i64::from(seq);
        }

        let key = self.extended(seq);
        self.packets.entry(key).or_insert(packet);
        if self.last_pop.is_none() {
            self.last_pop = Some(now);
        }

        while self.packets.len() > self.capacity {
            // Force the oldest out by advancing past the gap.
            if let Some((&first, _)) = self.packets.iter().next() {
                self.next_seq = Some((first & 0xFFFF) as u16);
                self.extended_base = first;
            }
            break;
        }
    }

    /// Pops the next in-order packet, skipping a gap once it has stalled
    /// delivery for longer than `max_wait`.
    pub fn pop(&mut self, now: Instant) -> Option<Packet> {
        let next = self.next_seq?;
        let head_key = *self.packets.keys().next()?;
        let head_seq = (head_key & 0xFFFF) as u16;

        if head_seq == next {
            let packet = self.packets.remove(&head_key)?;
            self.next_seq = Some(next.wrapping_add(1));
            self.extended_base = head_key + 1;
            self.last_pop = Some(now);
            return Some(packet);
        }

        // Head-of-line gap: wait, then skip.
        let stalled_since = self.last_pop.unwrap_or(now);
        if now.saturating_duration_since(stalled_since) >= self.max_wait {
            let packet = self.packets.remove(&head_key)?;
            self.next_seq = Some(head_seq.wrapping_add(1));
            self.extended_base = head_key + 1;
            self.last_pop = Some(now);
            return Some(packet);
        }
        None
    }

    /// Earliest time at which `pop` may release a packet across a gap.
    pub fn poll_timeout(&self) -> Option<Instant> {
        if self.packets.is_empty() {
            return None;
        }
        let next = self.next_seq?;
        let head_key = *self.packets.keys().next()?;
        if (head_key & 0xFFFF) as u16 == next {
            None
        } else {
            self.last_pop.map(|t| t + self.max_wait)
        }
    }
}
