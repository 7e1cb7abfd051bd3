use bytes::{Bytes, BytesMut};
use shared::error::{Error, Result};

use crate::packet::Packet;

/// Wraps a packet for retransmission (RFC 4588): the RTX payload is the
/// original sequence number followed by the original payload. The caller
/// rewrites SSRC, payload type and sequence number for the RTX stream.
pub fn wrap_rtx(original: &Packet, rtx_ssrc: u32, rtx_payload_type: u8, rtx_sequence: u16) -> Packet {
    let mut payload = BytesMut::with_capacity(2 + original.payload.len());
    payload.extend_from_slice(&original.header.sequence_number.to_be_bytes());
    payload.extend_from_slice(&original.payload);

    let mut header = original.header.clone();
    header.ssrc = rtx_ssrc;
    header.payload_type = rtx_payload_type;
    header.sequence_number = rtx_sequence;

    Packet {
        header,
        payload: payload.freeze(),
    }
}

/// Restores the original packet from an RTX packet.
pub fn unwrap_rtx(rtx: &Packet, original_ssrc: u32, original_payload_type: u8) -> Result<Packet> {
    if rtx.payload.len() < 2 {
        return Err(Error::ErrShortPacket);
    }
    let original_sequence = u16::from_be_bytes([rtx.payload[0], rtx.payload[1]]);

    let mut header = rtx.header.clone();
    header.ssrc = original_ssrc;
    header.payload_type = original_payload_type;
    header.sequence_number = original_sequence;

    Ok(Packet {
        header,
        payload: Bytes::from(rtx.payload.slice(2..)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;

    #[test]
    fn test_rtx_wrap_unwrap_round_trip() {
        let original = Packet {
            header: Header {
                version: 2,
                payload_type: 96,
                sequence_number: 1234,
                timestamp: 7777,
                ssrc: 0xAABB,
                ..Default::default()
            },
            payload: Bytes::from_static(&[1, 2, 3, 4]),
        };

        let rtx = wrap_rtx(&original, 0xCCDD, 97, 10);
        assert_eq!(rtx.header.ssrc, 0xCCDD);
        assert_eq!(rtx.header.payload_type, 97);
        assert_eq!(rtx.header.sequence_number, 10);
        assert_eq!(&rtx.payload[..2], &1234u16.to_be_bytes());

        let restored = unwrap_rtx(&rtx, 0xAABB, 96).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_unwrap_requires_osn() {
        let rtx = Packet {
            header: Header::default(),
            payload: Bytes::from_static(&[0x01]),
        };
        assert!(unwrap_rtx(&rtx, 0, 0).is_err());
    }
}
