use bytes::Bytes;
use shared::error::{Error, Result};

use crate::packetizer::{Depacketizer, Payloader};

/// Opus frames map 1:1 onto RTP payloads (RFC 7587 Section 4.2).
#[derive(Default, Debug, Clone)]
pub struct OpusPayloader;

impl Payloader for OpusPayloader {
    fn payload(&mut self, _mtu: usize, data: &Bytes) -> Result<Vec<Bytes>> {
        if data.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![data.clone()])
    }
}

#[derive(Default, Debug, Clone)]
pub struct OpusPacket;

impl Depacketizer for OpusPacket {
    fn depacketize(&mut self, packet: &Bytes) -> Result<Bytes> {
        if packet.is_empty() {
            Err(Error::ErrShortPacket)
        } else {
            Ok(packet.clone())
        }
    }

    fn is_partition_head(&self, _payload: &[u8]) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opus_payload_passthrough() {
        let mut p = OpusPayloader;
        let frame = Bytes::from_static(&[0x78, 0x01, 0x02]);
        assert_eq!(p.payload(1200, &frame).unwrap(), vec![frame.clone()]);
        assert!(p.payload(1200, &Bytes::new()).unwrap().is_empty());

        let mut d = OpusPacket;
        assert_eq!(d.depacketize(&frame).unwrap(), frame);
        assert!(d.depacketize(&Bytes::new()).is_err());
    }
}
