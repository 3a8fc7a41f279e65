//! Endpoint builder.
//!
//! Collects the configuration knobs - receive capacity, listener slot
//! count, checksum preference, default handler - and produces a ready
//! [`Endpoint`] once the host byte writer is supplied.

use super::handshake::HandshakeStatus;
use super::{DatagramHandler, Endpoint, ListenerSlot};
use crate::protocol::{ByteWriter, ChecksumKind, Datagram, FrameParser};

/// Default receive buffer capacity in bytes.
pub const DEFAULT_BUFFER_CAPACITY: u16 = 256;

/// Default number of session listener slots.
pub const DEFAULT_LISTENER_SLOTS: usize = 4;

/// Builder for configuring and creating an [`Endpoint`].
///
/// # Example
///
/// ```
/// use sbmp::{ChecksumKind, EndpointBuilder};
///
/// let mut ep = EndpointBuilder::new()
///     .buffer_capacity(128)
///     .listener_slots(8)
///     .preferred_checksum(ChecksumKind::Xor)
///     .on_datagram(|dg| println!("session {:#06x}: {} B", dg.session, dg.len()))
///     .build(|byte: u8| {
///         // hand `byte` to the serial driver
///         let _ = byte;
///     });
///
/// ep.start_handshake().unwrap();
/// ```
pub struct EndpointBuilder {
    buffer_capacity: u16,
    listener_slots: usize,
    pref_cksum: ChecksumKind,
    rx_handler: Option<DatagramHandler>,
}

impl EndpointBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            listener_slots: DEFAULT_LISTENER_SLOTS,
            pref_cksum: ChecksumKind::best_available(),
            rx_handler: None,
        }
    }

    /// Receive buffer capacity; also the size advertised to the peer
    /// during handshake.
    pub fn buffer_capacity(mut self, capacity: u16) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Number of session listener slots. The table is allocated once and
    /// scanned linearly; keep it small.
    pub fn listener_slots(mut self, slots: usize) -> Self {
        self.listener_slots = slots;
        self
    }

    /// Checksum kind to announce as preferred. Unavailable kinds downgrade
    /// to XOR at build time, with an error log.
    pub fn preferred_checksum(mut self, kind: ChecksumKind) -> Self {
        self.pref_cksum = kind;
        self
    }

    /// Default handler for datagrams no listener consumed.
    pub fn on_datagram<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Datagram) + Send + Sync + 'static,
    {
        self.rx_handler = Some(Box::new(handler));
        self
    }

    /// Build the endpoint around the host byte writer.
    pub fn build<W: ByteWriter>(self, writer: W) -> Endpoint<W> {
        let mut ep = Endpoint {
            frm: FrameParser::new(self.buffer_capacity, writer),
            next_session: 0,
            origin: false,
            buffer_size: self.buffer_capacity,
            peer_buffer_size: 0xFFFF,
            pref_cksum: ChecksumKind::best_available(),
            // Until the peer tells us otherwise, assume it shares our
            // strongest kind.
            peer_pref_cksum: ChecksumKind::best_available(),
            hsk_status: HandshakeStatus::NotStarted,
            hsk_session: 0,
            listeners: (0..self.listener_slots)
                .map(|_| ListenerSlot {
                    session: 0,
                    callback: None,
                })
                .collect(),
            rx_handler: self.rx_handler.unwrap_or_else(|| {
                Box::new(|dg: &Datagram| {
                    tracing::debug!(
                        session = dg.session,
                        kind = dg.kind,
                        "datagram with no listener or default handler"
                    );
                })
            }),
        };
        ep.set_preferred_checksum(self.pref_cksum);
        ep
    }
}

impl Default for EndpointBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let ep = EndpointBuilder::new().build(|_: u8| {});
        assert_eq!(ep.buffer_capacity(), DEFAULT_BUFFER_CAPACITY);
        assert_eq!(ep.free_listener_slots(), DEFAULT_LISTENER_SLOTS);
        assert_eq!(ep.peer_buffer_size(), 0xFFFF);
        assert_eq!(ep.preferred_checksum(), ChecksumKind::best_available());
        assert_eq!(ep.handshake_status(), HandshakeStatus::NotStarted);
        assert!(!ep.origin());
        assert!(ep.is_rx_enabled());
        assert!(ep.is_tx_enabled());
    }

    #[test]
    fn test_builder_custom_settings() {
        let ep = EndpointBuilder::new()
            .buffer_capacity(32)
            .listener_slots(1)
            .preferred_checksum(ChecksumKind::Xor)
            .build(|_: u8| {});
        assert_eq!(ep.buffer_capacity(), 32);
        assert_eq!(ep.free_listener_slots(), 1);
        assert_eq!(ep.preferred_checksum(), ChecksumKind::Xor);
    }

    #[test]
    fn test_builder_default_trait() {
        let builder = EndpointBuilder::default();
        let ep = builder.build(|_: u8| {});
        assert_eq!(ep.buffer_capacity(), DEFAULT_BUFFER_CAPACITY);
    }
}
