#[cfg(test)]
mod feedback_test;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::transport_feedbacks::transport_layer_cc::{
    PacketStatusChunk, RecvDelta, SymbolTypeTcc, TransportLayerCc,
};
use crate::transport_feedbacks::transport_layer_nack::{
    nack_pairs_from_sequence_numbers, TransportLayerNack,
};

/// How long a gap must persist before it is NACKed.
pub const DEFAULT_NACK_DELAY: Duration = Duration::from_millis(20);

/// A sequence number is not re-NACKed within this window.
pub const NACK_SUPPRESSION: Duration = Duration::from_millis(500);

/// Cap on sequence numbers carried in one feedback packet.
const MAX_NACKS_PER_PACKET: usize = 100;

/// Builds Generic NACK feedback from observed loss.
///
/// The caller reports missing sequence numbers (typically from the jitter
/// buffer) and polls for feedback; a gap is only NACKed once it has been
/// outstanding for `nack_delay` and is not repeated within the suppression
/// window.
pub struct NackGenerator {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    nack_delay: Duration,
    first_seen: HashMap<u16, Instant>,
    last_nacked: HashMap<u16, Instant>,
}

impl NackGenerator {
    pub fn new(sender_ssrc: u32, media_ssrc: u32) -> Self {
        NackGenerator {
            sender_ssrc,
            media_ssrc,
            nack_delay: DEFAULT_NACK_DELAY,
            first_seen: HashMap::new(),
            last_nacked: HashMap::new(),
        }
    }

    /// Updates the set of currently-missing sequence numbers.
    pub fn update_missing(&mut self, missing: &[u16], now: Instant) {
        self.first_seen.retain(|seq, _| missing.contains(seq));
        for &seq in missing {
            self.first_seen.entry(seq).or_insert(now);
        }
        self.last_nacked
            .retain(|_, at| now.saturating_duration_since(*at) < NACK_SUPPRESSION);
    }

    /// Produces a NACK packet when there is something worth asking for.
    pub fn poll_nack(&mut self, now: Instant) -> Option<TransportLayerNack> {
        let mut due: Vec<u16> = self
            .first_seen
            .iter()
            .filter(|(seq, first)| {
                now.saturating_duration_since(**first) >= self.nack_delay
                    && !self.last_nacked.contains_key(*seq)
            })
            .map(|(seq, _)| *seq)
            .collect();
        if due.is_empty() {
            return None;
        }
        due.sort_by_key(|&s| s.wrapping_sub(self.smallest_due()));
        due.truncate(MAX_NACKS_PER_PACKET);
        for &seq in &due {
            self.last_nacked.insert(seq, now);
        }

        Some(TransportLayerNack {
            sender_ssrc: self.sender_ssrc,
            media_ssrc: self.media_ssrc,
            nacks: nack_pairs_from_sequence_numbers(&due),
        })
    }

    fn smallest_due(&self) -> u16 {
        self.first_seen.keys().copied().min().unwrap_or(0)
    }
}

/// Reference time unit of the TWCC header, 64ms.
const REFERENCE_TIME_UNIT: Duration = Duration::from_millis(64);
/// Delta tick, 250us.
const DELTA_TICK_US: i64 = 250;

/// Records transport-wide sequence arrivals and assembles TransportLayerCc
/// feedback packets.
pub struct TwccRecorder {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    epoch: Instant,
    fb_pkt_count: u8,
    // (transport-wide seq, arrival), pending feedback
    arrivals: Vec<(u16, Instant)>,
    next_expected: Option<u16>,
}

impl TwccRecorder {
    pub fn new(sender_ssrc: u32, media_ssrc: u32, epoch: Instant) -> Self {
        TwccRecorder {
            sender_ssrc,
            media_ssrc,
            epoch,
            fb_pkt_count: 0,
            arrivals: Vec::new(),
            next_expected: None,
        }
    }

    pub fn record(&mut self, sequence_number: u16, arrival: Instant) {
        self.arrivals.push((sequence_number, arrival));
    }

    /// Builds feedback covering everything recorded so far.
    pub fn poll_feedback(&mut self) -> Option<TransportLayerCc> {
        if self.arrivals.is_empty() {
            return None;
        }
        let mut arrivals = std::mem::take(&mut self.arrivals);
        arrivals.sort_by_key(|(seq, _)| *seq);
        arrivals.dedup_by_key(|(seq, _)| *seq);

        let base_seq = self.next_expected.unwrap_or(arrivals[0].0).min(arrivals[0].0);
        let last_seq = arrivals.last().expect("non-empty").0;
        let status_count = last_seq.wrapping_sub(base_seq) + 1;

        let first_arrival = arrivals[0].1;
        let since_epoch = first_arrival.saturating_duration_since(self.epoch);
        let reference_time =
            (since_epoch.as_millis() / REFERENCE_TIME_UNIT.as_millis()) as u32 & 0x00FF_FFFF;
        let reference_instant = self.epoch
            + REFERENCE_TIME_UNIT * (since_epoch.as_millis() / REFERENCE_TIME_UNIT.as_millis()) as u32;

        // Classify each status; deltas are relative to the running arrival
        // time starting at the reference time.
        let mut symbols = Vec::with_capacity(status_count as usize);
        let mut deltas = Vec::new();
        let mut previous = reference_instant;
        let mut it = arrivals.iter().peekable();
        for offset in 0..status_count {
            let seq = base_seq.wrapping_add(offset);
            match it.peek() {
                Some((s, arrival)) if *s == seq => {
                    let delta_us = arrival.saturating_duration_since(previous).as_micros() as i64;
                    let ticks = delta_us / DELTA_TICK_US;
                    let symbol = if (0..=255).contains(&ticks) {
                        SymbolTypeTcc::PacketReceivedSmallDelta
                    } else {
                        SymbolTypeTcc::PacketReceivedLargeDelta
                    };
                    symbols.push(symbol);
                    deltas.push(RecvDelta {
                        type_tcc_packet: symbol,
                        delta_us: ticks * DELTA_TICK_US,
                    });
                    previous = *arrival;
                    it.next();
                }
                _ => symbols.push(SymbolTypeTcc::PacketNotReceived),
            }
        }

        // Encode the symbol sequence as run-length chunks of equal symbols,
        // falling back to two-bit status vectors for mixed stretches.
        let mut packet_chunks = Vec::new();
        let mut i = 0;
        while i < symbols.len() {
            let symbol = symbols[i];
            let mut run = 1;
            while i + run < symbols.len() && symbols[i + run] == symbol {
                run += 1;
            }
            if run >= 7 || i + run == symbols.len() {
                packet_chunks.push(PacketStatusChunk::RunLengthChunk {
                    type_tcc: symbol,
                    run_length: run as u16,
                });
                i += run;
            } else {
                let mut symbol_list: Vec<SymbolTypeTcc> =
                    symbols[i..(i + 7).min(symbols.len())].to_vec();
                while symbol_list.len() < 7 {
                    symbol_list.push(SymbolTypeTcc::PacketNotReceived);
                }
                i = (i + 7).min(symbols.len());
                packet_chunks.push(PacketStatusChunk::StatusVectorChunk {
                    two_bit: true,
                    symbol_list,
                });
            }
        }

        let feedback = TransportLayerCc {
            sender_ssrc: self.sender_ssrc,
            media_ssrc: self.media_ssrc,
            base_sequence_number: base_seq,
            packet_status_count: status_count,
            reference_time,
            fb_pkt_count: self.fb_pkt_count,
            packet_chunks,
            recv_deltas: deltas,
        };
        self.fb_pkt_count = self.fb_pkt_count.wrapping_add(1);
        self.next_expected = Some(last_seq.wrapping_add(1));
        Some(feedback)
    }
}
