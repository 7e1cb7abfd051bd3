use std::collections::HashMap;

use shared::error::{Error, Result};

use crate::handshake::{HandshakeHeader, HANDSHAKE_HEADER_SIZE};

/// Upper bound on buffered fragment bytes; a peer must not make us hold
/// unbounded partial messages.
const MAX_BUFFERED: usize = 1 << 20;

/// Reassembles fragmented handshake messages, keyed by
/// `(msg_type, message_seq)` (RFC 6347 Section 4.2.3).
///
/// Complete messages are returned in their canonical unfragmented wire form
/// (header with fragment_offset 0) so callers can append them to the
/// handshake transcript verbatim.
#[derive(Default)]
pub struct FragmentBuffer {
    fragments: HashMap<(u8, u16), PartialMessage>,
    buffered: usize,
}

struct PartialMessage {
    header: HandshakeHeader,
    body: Vec<u8>,
    received: Vec<bool>,
}

impl FragmentBuffer {
    pub fn new() -> Self {
        FragmentBuffer::default()
    }

    /// Feeds one handshake fragment (header + fragment body). Returns the
    /// full reassembled message once every byte is present.
    pub fn push(&mut self, header: HandshakeHeader, fragment: &[u8]) -> Result<Option<Vec<u8>>> {
        if fragment.len() != header.fragment_length as usize {
            return Err(Error::ErrLengthMismatch);
        }
        if header.fragment_length == 0 && header.length != 0 {
            return Err(Error::ErrEmptyFragment);
        }
        let end = header.fragment_offset as usize + fragment.len();
        if end > header.length as usize {
            return Err(Error::ErrLengthMismatch);
        }
        if self.buffered + fragment.len() > MAX_BUFFERED {
            return Err(Error::ErrFragmentBufferOverflow {
                new_size: self.buffered + fragment.len(),
                max_size: MAX_BUFFERED,
            });
        }

        let key = (header.typ, header.message_seq);
        self.buffered += fragment.len();
        let partial = self.fragments.entry(key).or_insert_with(|| PartialMessage {
            header,
            body: vec![0u8; header.length as usize],
            received: vec![false; header.length as usize],
        });
        if partial.header.length != header.length {
            return Err(Error::ErrLengthMismatch);
        }

        let offset = header.fragment_offset as usize;
        partial.body[offset..end].copy_from_slice(fragment);
        for r in &mut partial.received[offset..end] {
            *r = true;
        }
        let complete = partial.received.iter().all(|r| *r);

        if complete {
            let partial = self.fragments.remove(&key).expect("entry just inserted");
            self.buffered = self.buffered.saturating_sub(partial.body.len());

            let canonical = HandshakeHeader {
                typ: partial.header.typ,
                length: partial.header.length,
                message_seq: partial.header.message_seq,
                fragment_offset: 0,
                fragment_length: partial.header.length,
            };
            let mut out = Vec::with_capacity(HANDSHAKE_HEADER_SIZE + partial.body.len());
            let mut header_buf = bytes::BytesMut::new();
            canonical.marshal_to(&mut header_buf);
            out.extend_from_slice(&header_buf);
            out.extend_from_slice(&partial.body);
            return Ok(Some(out));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(typ: u8, seq: u16, length: u32, offset: u32, frag_len: u32) -> HandshakeHeader {
        HandshakeHeader {
            typ,
            length,
            message_seq: seq,
            fragment_offset: offset,
            fragment_length: frag_len,
        }
    }

    #[test]
    fn test_unfragmented_message_passes_through() {
        let mut buf = FragmentBuffer::new();
        let body = b"hello handshake";
        let out = buf
            .push(header(1, 0, body.len() as u32, 0, body.len() as u32), body)
            .unwrap()
            .expect("complete");
        assert_eq!(&out[HANDSHAKE_HEADER_SIZE..], body);
    }

    #[test]
    fn test_two_fragments_reassemble_out_of_order() {
        let mut buf = FragmentBuffer::new();
        let body = b"0123456789";
        // Second half first.
        assert!(buf
            .push(header(11, 3, 10, 5, 5), &body[5..])
            .unwrap()
            .is_none());
        let out = buf
            .push(header(11, 3, 10, 0, 5), &body[..5])
            .unwrap()
            .expect("complete");
        assert_eq!(&out[HANDSHAKE_HEADER_SIZE..], body);
        // Canonical header: offset 0, fragment_length == length.
        assert_eq!(out[6..9], [0, 0, 0]);
        assert_eq!(out[9..12], [0, 0, 10]);
    }

    #[test]
    fn test_messages_keyed_by_type_and_seq() {
        let mut buf = FragmentBuffer::new();
        assert!(buf.push(header(1, 0, 4, 0, 2), b"ab").unwrap().is_none());
        // Different message_seq does not complete the first one.
        assert!(buf.push(header(1, 1, 4, 2, 2), b"cd").unwrap().is_none());
        assert!(buf.push(header(1, 0, 4, 2, 2), b"cd").unwrap().is_some());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut buf = FragmentBuffer::new();
        assert!(buf.push(header(1, 0, 4, 0, 3), b"ab").is_err());
        assert!(buf.push(header(1, 0, 4, 3, 2), b"ab").is_err());
    }
}
