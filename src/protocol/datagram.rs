//! Datagram layer: a session/type view over a frame payload.
//!
//! Payload layout (session little-endian):
//!
//! ```text
//! ┌───────────┬─────────┬──────────┐
//! │ session:2 │ type: 1 │ body ... │
//! └───────────┴─────────┴──────────┘
//! ```
//!
//! The top bit of the session number is the origin bit; see the endpoint
//! layer for how the two peers keep their session spaces disjoint.

use bytes::Bytes;

use super::checksum::ChecksumKind;
use super::framing::{ByteWriter, FrameParser};
use crate::error::{Result, SbmpError};

/// Datagram header length: 2 B session + 1 B type.
pub const DATAGRAM_HEADER_LEN: u16 = 3;

/// Reserved datagram type codes.
///
/// Everything not listed here is application-defined and opaque to the
/// endpoint layer.
pub mod dg_type {
    /// Handshake request (origin-bit arbitration).
    pub const HSK_START: u8 = 0x00;
    /// Handshake acceptance, sent in the requester's session.
    pub const HSK_ACCEPT: u8 = 0x01;
    /// Handshake rejection after simultaneous requests.
    pub const HSK_CONFLICT: u8 = 0x02;

    /// Reserved for the bulk-transfer extension.
    pub const BULK_OFFER: u8 = 0x03;
    /// Reserved for the bulk-transfer extension.
    pub const BULK_REQUEST: u8 = 0x04;
    /// Reserved for the bulk-transfer extension.
    pub const BULK_DATA: u8 = 0x05;
    /// Reserved for the bulk-transfer extension.
    pub const BULK_ABORT: u8 = 0x06;

    /// Whether a type code belongs to the handshake exchange.
    #[inline]
    pub fn is_handshake(kind: u8) -> bool {
        matches!(kind, HSK_START | HSK_ACCEPT | HSK_CONFLICT)
    }
}

/// A parsed datagram.
///
/// `payload` is a zero-copy slice of the frame payload it was parsed from;
/// listeners that need the bytes past their callback can clone it cheaply.
#[derive(Debug, Clone)]
pub struct Datagram {
    /// Session number; bit 15 is the sender's origin bit.
    pub session: u16,
    /// Datagram type code.
    pub kind: u8,
    /// Message body.
    pub payload: Bytes,
}

impl Datagram {
    /// Parse a frame payload into a datagram.
    ///
    /// Returns `None` (logged at error level) for payloads shorter than the
    /// datagram header.
    pub fn parse(frame_payload: Bytes) -> Option<Self> {
        if frame_payload.len() < usize::from(DATAGRAM_HEADER_LEN) {
            tracing::error!(
                len = frame_payload.len(),
                "frame payload shorter than datagram header, dropping"
            );
            return None;
        }
        Some(Self {
            session: u16::from_le_bytes([frame_payload[0], frame_payload[1]]),
            kind: frame_payload[2],
            payload: frame_payload.slice(usize::from(DATAGRAM_HEADER_LEN)..),
        })
    }

    /// Body length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the body is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The origin bit of the sending endpoint.
    #[inline]
    pub fn origin_bit(&self) -> bool {
        self.session & 0x8000 != 0
    }
}

/// Open a datagram on the frame layer: starts a frame of `body_len + 3`
/// bytes and writes the session and type header. Body bytes follow through
/// the frame-layer send calls.
pub fn start_datagram<W: ByteWriter>(
    frm: &mut FrameParser<W>,
    cksum: ChecksumKind,
    session: u16,
    kind: u8,
    body_len: u16,
) -> Result<()> {
    let total = body_len
        .checked_add(DATAGRAM_HEADER_LEN)
        .ok_or(SbmpError::MessageTooLong {
            length: usize::from(body_len),
            max: u16::MAX - DATAGRAM_HEADER_LEN,
        })?;
    frm.start(cksum, total)?;
    let [lo, hi] = session.to_le_bytes();
    frm.send_byte(lo)?;
    frm.send_byte(hi)?;
    frm.send_byte(kind)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_parse_extracts_fields() {
        let payload = Bytes::from_static(&[0x34, 0x12, 0x20, 0xAA, 0xBB]);
        let dg = Datagram::parse(payload).unwrap();
        assert_eq!(dg.session, 0x1234);
        assert_eq!(dg.kind, 0x20);
        assert_eq!(&dg.payload[..], &[0xAA, 0xBB]);
        assert_eq!(dg.len(), 2);
        assert!(!dg.origin_bit());
    }

    #[test]
    fn test_parse_header_only_is_empty_body() {
        let dg = Datagram::parse(Bytes::from_static(&[0x05, 0x80, 0x42])).unwrap();
        assert_eq!(dg.session, 0x8005);
        assert!(dg.is_empty());
        assert!(dg.origin_bit());
    }

    #[test]
    fn test_parse_too_short_fails() {
        assert!(Datagram::parse(Bytes::from_static(&[0x05, 0x00])).is_none());
        assert!(Datagram::parse(Bytes::new()).is_none());
    }

    #[test]
    fn test_start_datagram_wire_layout() {
        let wire = Rc::new(RefCell::new(Vec::new()));
        let sink = wire.clone();
        let mut frm = FrameParser::new(64, move |byte: u8| sink.borrow_mut().push(byte));

        start_datagram(&mut frm, ChecksumKind::Xor, 0x8001, 0x20, 2).unwrap();
        assert_eq!(frm.send_buffer(&[0xAA, 0xBB]), 2);

        // SOF, XOR, len=5 LE, session LE, type, body, xor trailer.
        let expected_xor = 0x01 ^ 0x80 ^ 0x20 ^ 0xAA ^ 0xBB;
        assert_eq!(
            &wire.borrow()[..],
            &[0x01, 0x01, 0x05, 0x00, 0x01, 0x80, 0x20, 0xAA, 0xBB, expected_xor]
        );
    }

    #[test]
    fn test_start_datagram_roundtrip() {
        let wire = Rc::new(RefCell::new(Vec::new()));
        let sink = wire.clone();
        let mut frm = FrameParser::new(64, move |byte: u8| sink.borrow_mut().push(byte));

        start_datagram(&mut frm, ChecksumKind::None, 0x0042, 0x77, 3).unwrap();
        frm.send_buffer(b"abc");

        let mut rx = FrameParser::new(64, |_: u8| {});
        let payloads = rx.receive_all(&wire.borrow());
        assert_eq!(payloads.len(), 1);

        let dg = Datagram::parse(payloads[0].clone()).unwrap();
        assert_eq!(dg.session, 0x0042);
        assert_eq!(dg.kind, 0x77);
        assert_eq!(&dg.payload[..], b"abc");
    }

    #[test]
    fn test_start_datagram_body_len_overflow() {
        let mut frm = FrameParser::new(64, |_: u8| {});
        let result = start_datagram(&mut frm, ChecksumKind::None, 1, 0x20, u16::MAX);
        assert!(matches!(result, Err(SbmpError::MessageTooLong { .. })));
    }

    #[test]
    fn test_handshake_type_predicate() {
        assert!(dg_type::is_handshake(dg_type::HSK_START));
        assert!(dg_type::is_handshake(dg_type::HSK_ACCEPT));
        assert!(dg_type::is_handshake(dg_type::HSK_CONFLICT));
        assert!(!dg_type::is_handshake(dg_type::BULK_DATA));
        assert!(!dg_type::is_handshake(0x20));
    }
}
