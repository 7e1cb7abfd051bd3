use bytes::Bytes;
use shared::error::Result;

use crate::header::Header;
use crate::packet::Packet;
use crate::sequence::Sequencer;

/// Splits one encoded frame into MTU-sized RTP payloads.
pub trait Payloader {
    fn payload(&mut self, mtu: usize, data: &Bytes) -> Result<Vec<Bytes>>;
}

/// Reverses a payload format back to codec bytes.
pub trait Depacketizer {
    /// Returns codec bytes ready for the decoder; an empty return means the
    /// packet only advanced internal reassembly state (e.g. an FU-A middle
    /// fragment).
    fn depacketize(&mut self, packet: &Bytes) -> Result<Bytes>;

    /// Whether this packet can start a decodable unit.
    fn is_partition_head(&self, payload: &[u8]) -> bool;
}

/// Turns frames into RTP packets with consistent SSRC/PT/sequence/timestamp.
pub struct Packetizer {
    pub mtu: usize,
    pub payload_type: u8,
    pub ssrc: u32,
    pub payloader: Box<dyn Payloader + Send>,
    pub sequencer: Sequencer,
    pub timestamp: u32,
    pub clock_rate: u32,
}

impl Packetizer {
    pub fn new(
        mtu: usize,
        payload_type: u8,
        ssrc: u32,
        payloader: Box<dyn Payloader + Send>,
        clock_rate: u32,
    ) -> Self {
        Packetizer {
            mtu,
            payload_type,
            ssrc,
            payloader,
            sequencer: Sequencer::random(),
            timestamp: rand::random::<u32>(),
            clock_rate,
        }
    }

    /// Packetizes one frame worth of codec data; `samples` advances the RTP
    /// timestamp afterwards.
    pub fn packetize(&mut self, payload: &Bytes, samples: u32) -> Result<Vec<Packet>> {
        let payloads = self.payloader.payload(self.mtu - 12, payload)?;
        let len = payloads.len();
        let mut packets = Vec::with_capacity(len);
        for (i, pp) in payloads.into_iter().enumerate() {
            packets.push(Packet {
                header: Header {
                    version: 2,
                    marker: i == len - 1,
                    payload_type: self.payload_type,
                    sequence_number: self.sequencer.next_sequence_number(),
                    timestamp: self.timestamp,
                    ssrc: self.ssrc,
                    ..Default::default()
                },
                payload: pp,
            });
        }
        self.timestamp = self.timestamp.wrapping_add(samples);
        Ok(packets)
    }
}
