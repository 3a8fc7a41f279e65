//! Endpoint layer: session numbering, handshake, and datagram dispatch.
//!
//! An [`Endpoint`] owns one frame engine and multiplexes application
//! messages into numbered sessions. The top bit of every session number is
//! the endpoint's origin bit; after a successful handshake the two peers
//! hold complementary origin bits, so their 15-bit counters can never
//! allocate colliding session numbers.
//!
//! Receive path: bytes feed the frame parser, completed payloads parse into
//! datagrams, and each datagram is routed to the handshake state machine, a
//! matching session listener, or the default handler - synchronously, inside
//! the byte-feeding call that completed the frame.

mod builder;
mod handshake;

use std::sync::Arc;

use crate::error::{Result, SbmpError};
use crate::protocol::{
    dg_type, start_datagram, ByteWriter, ChecksumKind, Datagram, FrameParser, DATAGRAM_HEADER_LEN,
};

pub use builder::{EndpointBuilder, DEFAULT_BUFFER_CAPACITY, DEFAULT_LISTENER_SLOTS};
pub use handshake::HandshakeStatus;

/// Default handler for datagrams no listener consumed.
pub type DatagramHandler = Box<dyn Fn(&Datagram) + Send + Sync>;

/// Per-session callback. Receives the endpoint so it can reply or manage
/// listeners from inside the callback.
pub type SessionListener<W> = Arc<dyn Fn(&mut Endpoint<W>, &Datagram) + Send + Sync>;

/// One listener registration. The callback is the liveness marker; the
/// session number is meaningful only while a callback is present.
struct ListenerSlot<W> {
    session: u16,
    callback: Option<SessionListener<W>>,
}

/// A protocol endpoint: one side of a point-to-point link.
///
/// Built via [`EndpointBuilder`]. The `W` parameter is the host byte writer
/// (any `FnMut(u8)`) the transmit path emits through.
pub struct Endpoint<W> {
    frm: FrameParser<W>,
    /// 15-bit session counter; the origin bit is ORed in on allocation.
    next_session: u16,
    origin: bool,
    /// Our receive capacity, advertised during handshake.
    buffer_size: u16,
    /// Peer receive capacity; 0xFFFF until a handshake succeeds.
    peer_buffer_size: u16,
    pref_cksum: ChecksumKind,
    /// Checksum used for outbound messages, so the peer validates cheaply.
    peer_pref_cksum: ChecksumKind,
    hsk_status: HandshakeStatus,
    /// Session of the in-flight handshake while awaiting a reply.
    hsk_session: u16,
    listeners: Vec<ListenerSlot<W>>,
    rx_handler: DatagramHandler,
}

impl<W: ByteWriter> Endpoint<W> {
    /// Reset all protocol state: session counter, origin bit, handshake,
    /// peer buffer size, and the frame engine. Buffers and checksum
    /// preferences are kept.
    pub fn reset(&mut self) {
        self.next_session = 0;
        self.origin = false;
        self.hsk_session = 0;
        self.hsk_status = HandshakeStatus::NotStarted;
        self.peer_buffer_size = 0xFFFF;
        self.frm.reset();
    }

    // ---- Settings ----

    /// Seed the session counter (worth randomizing before the first
    /// message). The origin bit is masked off.
    pub fn seed_session(&mut self, sesn: u16) {
        self.next_session = sesn & 0x7FFF;
    }

    /// Set the origin bit directly, bypassing the handshake.
    pub fn set_origin(&mut self, bit: bool) {
        self.origin = bit;
    }

    /// Set the checksum kind we announce as preferred. A kind not compiled
    /// into this build downgrades to XOR with an error log.
    pub fn set_preferred_checksum(&mut self, mut kind: ChecksumKind) {
        if !kind.is_available() {
            tracing::error!(?kind, "checksum not available, using XOR instead");
            kind = ChecksumKind::Xor;
        }
        self.pref_cksum = kind;
    }

    /// Enable or disable receive in the backing frame engine.
    pub fn enable_rx(&mut self, enable: bool) {
        self.frm.enable_rx(enable);
    }

    /// Enable or disable transmit in the backing frame engine.
    pub fn enable_tx(&mut self, enable: bool) {
        self.frm.enable_tx(enable);
    }

    /// Enable or disable both directions.
    pub fn enable(&mut self, enable: bool) {
        self.frm.enable(enable);
    }

    // ---- Accessors ----

    /// Our origin bit.
    #[inline]
    pub fn origin(&self) -> bool {
        self.origin
    }

    /// Our receive capacity, as advertised to the peer.
    #[inline]
    pub fn buffer_capacity(&self) -> u16 {
        self.buffer_size
    }

    /// The peer's advertised receive capacity (0xFFFF before handshake).
    #[inline]
    pub fn peer_buffer_size(&self) -> u16 {
        self.peer_buffer_size
    }

    /// Our announced checksum preference.
    #[inline]
    pub fn preferred_checksum(&self) -> ChecksumKind {
        self.pref_cksum
    }

    /// The checksum kind the peer asked us to send with.
    #[inline]
    pub fn peer_preferred_checksum(&self) -> ChecksumKind {
        self.peer_pref_cksum
    }

    /// Whether receive is enabled.
    #[inline]
    pub fn is_rx_enabled(&self) -> bool {
        self.frm.is_rx_enabled()
    }

    /// Whether transmit is enabled.
    #[inline]
    pub fn is_tx_enabled(&self) -> bool {
        self.frm.is_tx_enabled()
    }

    // ---- Session numbering ----

    /// Allocate a session number: the 15-bit counter with our origin bit on
    /// top. Wraps back to zero past 0x7FFF, preserving the origin bit.
    fn alloc_session(&mut self) -> u16 {
        let sesn = self.next_session;
        self.next_session += 1;
        if self.next_session == 0x8000 {
            self.next_session = 0;
        }
        sesn | (u16::from(self.origin) << 15)
    }

    /// Largest message body the peer accepts (its buffer minus the
    /// datagram header).
    fn peer_accepts(&self) -> u16 {
        self.peer_buffer_size.saturating_sub(DATAGRAM_HEADER_LEN)
    }

    // ---- Receive path ----

    /// Feed one received byte. If it completes a frame, the resulting
    /// datagram is dispatched before this call returns.
    pub fn receive(&mut self, byte: u8) {
        if let Some(payload) = self.frm.receive(byte) {
            if let Some(dg) = Datagram::parse(payload) {
                self.dispatch(&dg);
            }
        }
    }

    /// Feed a chunk of received bytes.
    pub fn receive_all(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.receive(byte);
        }
    }

    /// Route a datagram: handshake first, then the listener table (first
    /// live slot with a matching session consumes it), then the default
    /// handler.
    fn dispatch(&mut self, dg: &Datagram) {
        if dg_type::is_handshake(dg.kind) {
            self.handle_handshake(dg);
            return;
        }

        let listener = self
            .listeners
            .iter()
            .find(|slot| slot.callback.is_some() && slot.session == dg.session)
            .and_then(|slot| slot.callback.clone());

        match listener {
            Some(callback) => callback(self, dg),
            None => (self.rx_handler)(dg),
        }
    }

    // ---- Header/body send calls ----

    /// Open a message in an existing session.
    ///
    /// Fails without writing when the body would not fit the peer's buffer.
    /// The message uses the peer's preferred checksum.
    pub fn start_response(&mut self, kind: u8, length: u16, sesn: u16) -> Result<()> {
        let peer_accepts = self.peer_accepts();
        if length > peer_accepts {
            tracing::error!(
                length,
                peer_accepts,
                "message too long for peer buffer, not sending"
            );
            return Err(SbmpError::MessageTooLong {
                length: usize::from(length),
                max: peer_accepts,
            });
        }
        start_datagram(&mut self.frm, self.peer_pref_cksum, sesn, kind, length)
    }

    /// Open a message in a freshly allocated session; returns the session
    /// number.
    pub fn start_session(&mut self, kind: u8, length: u16) -> Result<u16> {
        let sesn = self.alloc_session();
        self.start_response(kind, length, sesn)?;
        Ok(sesn)
    }

    /// Send one body byte of the open message.
    pub fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.frm.send_byte(byte)
    }

    /// Send body bytes of the open message; returns how many were accepted.
    pub fn send_buffer(&mut self, data: &[u8]) -> usize {
        self.frm.send_buffer(data)
    }

    // ---- All-in-one send calls ----

    /// Send a whole message in an existing session; returns the number of
    /// body bytes the transmit path accepted.
    pub fn send_response(&mut self, kind: u8, data: &[u8], sesn: u16) -> Result<usize> {
        let length = u16::try_from(data.len()).map_err(|_| SbmpError::MessageTooLong {
            length: data.len(),
            max: self.peer_accepts(),
        })?;
        self.start_response(kind, length, sesn)?;
        Ok(self.send_buffer(data))
    }

    /// Send a whole message in a new session; returns the session number
    /// and the number of body bytes accepted.
    ///
    /// The session counter advances even when the send fails, as a fresh
    /// number was already taken.
    pub fn send_message(&mut self, kind: u8, data: &[u8]) -> Result<(u16, usize)> {
        let sesn = self.alloc_session();
        let sent = self.send_response(kind, data, sesn)?;
        Ok((sesn, sent))
    }

    // ---- Session listeners ----

    /// Register a callback for a session. Fills the first free slot; fails
    /// when the table is full. Duplicate sessions are not rejected - the
    /// first matching slot wins on dispatch.
    pub fn add_listener<F>(&mut self, session: u16, callback: F) -> Result<()>
    where
        F: Fn(&mut Endpoint<W>, &Datagram) + Send + Sync + 'static,
    {
        for slot in &mut self.listeners {
            if slot.callback.is_none() {
                slot.session = session;
                slot.callback = Some(Arc::new(callback));
                return Ok(());
            }
        }
        Err(SbmpError::ListenerTableFull)
    }

    /// Remove the first listener registered for a session, if any.
    pub fn remove_listener(&mut self, session: u16) {
        for slot in &mut self.listeners {
            if slot.callback.is_some() && slot.session == session {
                slot.callback = None;
                return;
            }
        }
    }

    /// Number of free listener slots.
    pub fn free_listener_slots(&self) -> usize {
        self.listeners
            .iter()
            .filter(|slot| slot.callback.is_none())
            .count()
    }
}
