//! Handshake: origin-bit arbitration and peer parameter exchange.
//!
//! Either peer may send `HSK_START` carrying its preferred checksum and
//! receive capacity. An idle receiver takes the complement of the
//! requester's origin bit, answers `HSK_ACCEPT` in the requester's session,
//! and both sides are up. If both peers request at once, each answers
//! `HSK_CONFLICT` and the application retries (ideally after un-synchronized
//! delays).

use super::Endpoint;
use crate::error::Result;
use crate::protocol::{dg_type, ByteWriter, ChecksumKind, Datagram};

/// Handshake payload length: 1 B checksum preference + 2 B buffer size.
pub(crate) const HSK_PAYLOAD_LEN: usize = 3;

/// State of the origin-bit handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// No handshake attempted since init/reset/abort.
    NotStarted,
    /// We sent `HSK_START` and are waiting for the peer's verdict.
    AwaitReply,
    /// Origin bits arbitrated; peer parameters are known.
    Success,
    /// Simultaneous requests collided; retry after a delay.
    Conflict,
}

impl<W: ByteWriter> Endpoint<W> {
    /// Start a handshake: allocate a session, send `HSK_START` with our
    /// parameters, and await the reply. Any handshake already in flight is
    /// aborted first. On send failure the status reverts to `NotStarted`.
    pub fn start_handshake(&mut self) -> Result<()> {
        self.abort_handshake();

        let info = self.handshake_payload();
        self.hsk_status = HandshakeStatus::AwaitReply;

        match self.send_message(dg_type::HSK_START, &info) {
            Ok((sesn, _)) => {
                self.hsk_session = sesn;
                Ok(())
            }
            Err(err) => {
                self.hsk_status = HandshakeStatus::NotStarted;
                Err(err)
            }
        }
    }

    /// Abort the current handshake and discard its session.
    pub fn abort_handshake(&mut self) {
        self.hsk_session = 0;
        self.hsk_status = HandshakeStatus::NotStarted;
    }

    /// Current handshake state.
    #[inline]
    pub fn handshake_status(&self) -> HandshakeStatus {
        self.hsk_status
    }

    /// The 3-byte parameter payload we send in handshake datagrams:
    /// `[pref_cksum | buf_size_lsb | buf_size_msb]`.
    fn handshake_payload(&self) -> [u8; HSK_PAYLOAD_LEN] {
        let [lo, hi] = self.buffer_size.to_le_bytes();
        [self.pref_cksum as u8, lo, hi]
    }

    /// Learn the peer's parameters from a handshake payload.
    fn parse_peer_info(&mut self, payload: &[u8]) {
        self.peer_buffer_size = u16::from_le_bytes([payload[1], payload[2]]);

        self.peer_pref_cksum = match ChecksumKind::try_from(payload[0]) {
            Ok(kind) if kind.is_available() => kind,
            Ok(kind) => {
                tracing::error!(?kind, "peer prefers a checksum we lack, sending XOR");
                ChecksumKind::Xor
            }
            Err(()) => {
                tracing::warn!(kind = payload[0], "unknown peer checksum preference, sending XOR");
                ChecksumKind::Xor
            }
        };

        tracing::info!(
            peer_buffer = self.peer_buffer_size,
            peer_cksum = ?self.peer_pref_cksum,
            "handshake: peer parameters learned"
        );
    }

    /// Run the handshake transitions for a handshake-typed datagram.
    ///
    /// Called from dispatch; `dg.kind` is one of the three handshake codes.
    pub(crate) fn handle_handshake(&mut self, dg: &Datagram) {
        let our_info = self.handshake_payload();

        match dg.kind {
            dg_type::HSK_START => {
                tracing::info!(session = dg.session, "rx handshake request");

                if self.hsk_status == HandshakeStatus::AwaitReply {
                    // Simultaneous initiation; both sides back off.
                    let _ = self.send_response(dg_type::HSK_CONFLICT, &our_info, dg.session);
                    self.hsk_status = HandshakeStatus::Conflict;
                    tracing::error!("handshake conflict");
                } else {
                    // We are idle; take the complementary origin bit.
                    self.origin = !dg.origin_bit();
                    if dg.payload.len() >= HSK_PAYLOAD_LEN {
                        self.parse_peer_info(&dg.payload);
                    }
                    self.hsk_status = HandshakeStatus::Success;
                    let _ = self.send_response(dg_type::HSK_ACCEPT, &our_info, dg.session);
                }
            }

            dg_type::HSK_ACCEPT => {
                tracing::info!(session = dg.session, "rx handshake accept");

                if self.hsk_status != HandshakeStatus::AwaitReply || self.hsk_session != dg.session
                {
                    tracing::warn!("unexpected handshake accept, ignoring");
                } else {
                    if dg.payload.len() >= HSK_PAYLOAD_LEN {
                        self.parse_peer_info(&dg.payload);
                    }
                    self.hsk_status = HandshakeStatus::Success;
                }
            }

            dg_type::HSK_CONFLICT => {
                tracing::info!(session = dg.session, "rx handshake conflict");

                if self.hsk_status != HandshakeStatus::AwaitReply || self.hsk_session != dg.session
                {
                    tracing::warn!("unexpected handshake conflict, ignoring");
                } else {
                    self.frm.reset();
                    self.hsk_status = HandshakeStatus::Conflict;
                }
            }

            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointBuilder;

    #[test]
    fn test_start_handshake_enters_await_reply() {
        let mut ep = EndpointBuilder::new()
            .buffer_capacity(0x0123)
            .build(|_: u8| {});
        assert_eq!(ep.handshake_status(), HandshakeStatus::NotStarted);

        ep.start_handshake().unwrap();
        assert_eq!(ep.handshake_status(), HandshakeStatus::AwaitReply);
    }

    #[test]
    fn test_start_handshake_reverts_on_send_failure() {
        let mut ep = EndpointBuilder::new().build(|_: u8| {});
        ep.enable_tx(false);
        assert!(ep.start_handshake().is_err());
        assert_eq!(ep.handshake_status(), HandshakeStatus::NotStarted);
    }

    #[test]
    fn test_abort_handshake_resets_state() {
        let mut ep = EndpointBuilder::new().build(|_: u8| {});
        ep.start_handshake().unwrap();
        ep.abort_handshake();
        assert_eq!(ep.handshake_status(), HandshakeStatus::NotStarted);
    }

    #[test]
    fn test_unexpected_accept_is_ignored() {
        let mut ep = EndpointBuilder::new().build(|_: u8| {});

        // An HSK_ACCEPT nobody asked for, claiming a tiny peer buffer.
        let wire = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = wire.clone();
        let mut frm = crate::protocol::FrameParser::new(64, move |byte: u8| {
            sink.borrow_mut().push(byte)
        });
        crate::protocol::start_datagram(&mut frm, ChecksumKind::Xor, 0x0000, dg_type::HSK_ACCEPT, 3)
            .unwrap();
        frm.send_buffer(&[ChecksumKind::Xor as u8, 0x08, 0x00]);

        let bytes = wire.borrow().clone();
        ep.receive_all(&bytes);

        assert_eq!(ep.handshake_status(), HandshakeStatus::NotStarted);
        assert_eq!(ep.peer_buffer_size(), 0xFFFF, "peer info must not be taken");
    }

    #[test]
    fn test_handshake_payload_layout() {
        let wire = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = wire.clone();
        let mut ep = EndpointBuilder::new()
            .buffer_capacity(0x0180)
            .preferred_checksum(ChecksumKind::Xor)
            .build(move |byte| sink.borrow_mut().push(byte));

        ep.start_handshake().unwrap();
        let captured = wire.borrow().clone();

        // The frame carries a datagram whose 3-byte handshake payload is
        // [pref=1, 0x80, 0x01].
        let mut rx = crate::protocol::FrameParser::new(64, |_: u8| {});
        let payloads = rx.receive_all(&captured);
        assert_eq!(payloads.len(), 1);
        let dg = Datagram::parse(payloads[0].clone()).unwrap();
        assert_eq!(dg.kind, dg_type::HSK_START);
        assert_eq!(&dg.payload[..], &[ChecksumKind::Xor as u8, 0x80, 0x01]);
    }
}
