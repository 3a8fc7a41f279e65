//! Frame layer: per-byte receive state machine and streaming transmit engine.
//!
//! Wire format (multi-byte fields little-endian):
//!
//! ```text
//! ┌──────────┬────────────┬─────────┬─────────┬──────────────┬────────────┐
//! │ SOF 0x01 │ CKSUM_KIND │ LEN_LSB │ LEN_MSB │ payload[LEN] │ CKSUM[0|1|4] │
//! └──────────┴────────────┴─────────┴─────────┴──────────────┴────────────┘
//! ```
//!
//! The receiver consumes one byte per call and hands a validated payload
//! upstream when the trailer matches. The transmitter emits the header
//! eagerly, streams body bytes through the host writer, and flushes the
//! checksum trailer automatically on the last body byte.

use bytes::{BufMut, Bytes, BytesMut};

use super::checksum::{Checksum, ChecksumKind};
use crate::error::{Result, SbmpError};

/// Start-of-frame marker byte.
pub const SOF: u8 = 0x01;

/// Host-supplied synchronous byte writer.
///
/// Any `FnMut(u8)` is a `ByteWriter`, mirroring the function-pointer plug
/// point a serial driver exposes:
///
/// ```
/// use sbmp::protocol::FrameParser;
///
/// let mut frm = FrameParser::new(128, |byte: u8| {
///     // hand `byte` to the UART driver
///     let _ = byte;
/// });
/// frm.reset();
/// ```
pub trait ByteWriter {
    /// Emit one byte on the link. Must not block.
    fn write_byte(&mut self, byte: u8);
}

impl<F: FnMut(u8)> ByteWriter for F {
    #[inline]
    fn write_byte(&mut self, byte: u8) {
        self(byte)
    }
}

/// Receive state. Each transition consumes exactly one byte.
enum RxState {
    /// Hunting for SOF; anything else is discarded.
    Idle,
    /// SOF seen, expecting the checksum-kind byte.
    CksumKind,
    /// Expecting the low length byte.
    LenLow { kind: ChecksumKind },
    /// Expecting the high length byte.
    LenHigh { kind: ChecksumKind, low: u8 },
    /// Collecting payload bytes, checksum running alongside.
    Payload {
        kind: ChecksumKind,
        length: u16,
        cksum: Checksum,
    },
    /// Collecting trailer bytes for comparison against the computed value.
    Trailer {
        computed: u32,
        received: [u8; 4],
        count: u8,
        expected: u8,
    },
}

/// Transmit state for one open outbound frame.
struct TxState {
    kind: ChecksumKind,
    cksum: Checksum,
    remaining: u16,
}

/// Byte-oriented frame engine: one receive state machine and one transmit
/// engine sharing the host byte writer.
///
/// Exactly one `FrameParser` backs each endpoint; standalone use is fine for
/// hosts that only need framing.
pub struct FrameParser<W> {
    writer: W,
    /// Receive parser state.
    rx_state: RxState,
    /// Payload accumulation buffer; completed payloads are split off
    /// zero-copy, so the allocation cycles through `Bytes` handles.
    buf: BytesMut,
    /// Maximum accepted payload length.
    capacity: u16,
    /// Open outbound frame, if any.
    tx: Option<TxState>,
    rx_enabled: bool,
    tx_enabled: bool,
}

impl<W: ByteWriter> FrameParser<W> {
    /// Create a frame engine with the given payload capacity and byte writer.
    pub fn new(capacity: u16, writer: W) -> Self {
        Self {
            writer,
            rx_state: RxState::Idle,
            buf: BytesMut::with_capacity(capacity as usize),
            capacity,
            tx: None,
            rx_enabled: true,
            tx_enabled: true,
        }
    }

    /// Payload capacity this parser accepts.
    #[inline]
    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    /// Drop all parser state and any open outbound frame. Keeps the buffer.
    pub fn reset(&mut self) {
        self.rx_state = RxState::Idle;
        self.buf.clear();
        self.tx = None;
    }

    /// Enable or disable the receive side. Disabled receive discards bytes
    /// without touching parser state.
    pub fn enable_rx(&mut self, enable: bool) {
        self.rx_enabled = enable;
    }

    /// Enable or disable the transmit side.
    pub fn enable_tx(&mut self, enable: bool) {
        self.tx_enabled = enable;
    }

    /// Enable or disable both directions.
    pub fn enable(&mut self, enable: bool) {
        self.rx_enabled = enable;
        self.tx_enabled = enable;
    }

    /// Whether the receive side is enabled.
    #[inline]
    pub fn is_rx_enabled(&self) -> bool {
        self.rx_enabled
    }

    /// Whether the transmit side is enabled.
    #[inline]
    pub fn is_tx_enabled(&self) -> bool {
        self.tx_enabled
    }

    // ---- Receive path ----

    /// Feed one received byte into the parser.
    ///
    /// Returns the validated payload when this byte completes a frame.
    /// Malformed input never produces output: garbage outside a frame is
    /// discarded, unknown checksum kinds and trailer mismatches drop the
    /// frame, and an over-long payload resets the parser. All drops leave
    /// the parser hunting for the next SOF.
    pub fn receive(&mut self, byte: u8) -> Option<Bytes> {
        if !self.rx_enabled {
            return None;
        }
        let state = std::mem::replace(&mut self.rx_state, RxState::Idle);
        let (next, delivery) = self.advance(state, byte);
        self.rx_state = next;
        delivery
    }

    /// Feed a chunk of received bytes, returning any completed payloads.
    pub fn receive_all(&mut self, bytes: &[u8]) -> Vec<Bytes> {
        let mut payloads = Vec::new();
        for &byte in bytes {
            if let Some(payload) = self.receive(byte) {
                payloads.push(payload);
            }
        }
        payloads
    }

    fn advance(&mut self, state: RxState, byte: u8) -> (RxState, Option<Bytes>) {
        match state {
            RxState::Idle => {
                if byte == SOF {
                    (RxState::CksumKind, None)
                } else {
                    (RxState::Idle, None)
                }
            }

            RxState::CksumKind => match ChecksumKind::try_from(byte) {
                Ok(kind) if kind.is_available() => (RxState::LenLow { kind }, None),
                _ => {
                    tracing::trace!(kind = byte, "unusable checksum kind, dropping frame");
                    (RxState::Idle, None)
                }
            },

            RxState::LenLow { kind } => (RxState::LenHigh { kind, low: byte }, None),

            RxState::LenHigh { kind, low } => {
                let length = u16::from_le_bytes([low, byte]);
                self.buf.clear();
                if length == 0 {
                    self.enter_trailer(kind, Checksum::new(kind))
                } else {
                    self.buf
                        .reserve(usize::from(length).min(usize::from(self.capacity)));
                    (
                        RxState::Payload {
                            kind,
                            length,
                            cksum: Checksum::new(kind),
                        },
                        None,
                    )
                }
            }

            RxState::Payload {
                kind,
                length,
                mut cksum,
            } => {
                if self.buf.len() >= usize::from(self.capacity) {
                    tracing::debug!(length, capacity = self.capacity, "rx buffer overflow");
                    self.buf.clear();
                    return (RxState::Idle, None);
                }
                cksum.update(byte);
                self.buf.put_u8(byte);
                if self.buf.len() == usize::from(length) {
                    self.enter_trailer(kind, cksum)
                } else {
                    (
                        RxState::Payload {
                            kind,
                            length,
                            cksum,
                        },
                        None,
                    )
                }
            }

            RxState::Trailer {
                computed,
                mut received,
                mut count,
                expected,
            } => {
                received[usize::from(count)] = byte;
                count += 1;
                if count < expected {
                    return (
                        RxState::Trailer {
                            computed,
                            received,
                            count,
                            expected,
                        },
                        None,
                    );
                }
                let wire = match expected {
                    1 => u32::from(received[0]),
                    _ => u32::from_le_bytes(received),
                };
                if wire == computed {
                    (RxState::Idle, Some(self.buf.split().freeze()))
                } else {
                    tracing::debug!(wire, computed, "checksum mismatch, dropping frame");
                    self.buf.clear();
                    (RxState::Idle, None)
                }
            }
        }
    }

    /// Payload complete: deliver immediately for `NONE`, otherwise start
    /// collecting the trailer.
    fn enter_trailer(&mut self, kind: ChecksumKind, cksum: Checksum) -> (RxState, Option<Bytes>) {
        let expected = kind.trailer_len() as u8;
        if expected == 0 {
            return (RxState::Idle, Some(self.buf.split().freeze()));
        }
        (
            RxState::Trailer {
                computed: cksum.finalize(),
                received: [0; 4],
                count: 0,
                expected,
            },
            None,
        )
    }

    // ---- Transmit path ----

    /// Open an outbound frame: emit the header and prime the running
    /// checksum. The frame closes itself after `length` body bytes.
    ///
    /// Opening a new frame while one is still open abandons the old one;
    /// the receiver drops the truncated frame on checksum mismatch.
    pub fn start(&mut self, kind: ChecksumKind, length: u16) -> Result<()> {
        if !self.tx_enabled {
            return Err(SbmpError::TxDisabled);
        }
        if !kind.is_available() {
            return Err(SbmpError::ChecksumUnavailable(kind));
        }
        if self.tx.is_some() {
            tracing::debug!("abandoning unfinished outbound frame");
        }
        self.writer.write_byte(SOF);
        self.writer.write_byte(kind as u8);
        let [lo, hi] = length.to_le_bytes();
        self.writer.write_byte(lo);
        self.writer.write_byte(hi);

        if length == 0 {
            self.flush_trailer(kind, Checksum::new(kind));
            self.tx = None;
        } else {
            self.tx = Some(TxState {
                kind,
                cksum: Checksum::new(kind),
                remaining: length,
            });
        }
        Ok(())
    }

    /// Send one body byte of the open frame. The checksum trailer is
    /// flushed automatically when this is the last declared byte.
    pub fn send_byte(&mut self, byte: u8) -> Result<()> {
        if !self.tx_enabled {
            return Err(SbmpError::TxDisabled);
        }
        let Some(tx) = self.tx.as_mut() else {
            return Err(SbmpError::FrameNotOpen);
        };
        tx.cksum.update(byte);
        tx.remaining -= 1;
        self.writer.write_byte(byte);
        if let Some(tx) = self.tx.take_if(|tx| tx.remaining == 0) {
            self.flush_trailer(tx.kind, tx.cksum);
        }
        Ok(())
    }

    /// Send body bytes of the open frame; returns how many were accepted.
    ///
    /// Stops early when the frame closes (declared length reached) or the
    /// transmitter is disabled.
    pub fn send_buffer(&mut self, data: &[u8]) -> usize {
        let mut sent = 0;
        for &byte in data {
            if self.send_byte(byte).is_err() {
                break;
            }
            sent += 1;
        }
        sent
    }

    fn flush_trailer(&mut self, kind: ChecksumKind, cksum: Checksum) {
        match kind.trailer_len() {
            0 => {}
            1 => self.writer.write_byte(cksum.finalize() as u8),
            _ => {
                for byte in cksum.finalize().to_le_bytes() {
                    self.writer.write_byte(byte);
                }
            }
        }
    }

    /// Current receive state, for diagnostics.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.rx_state {
            RxState::Idle => "Idle",
            RxState::CksumKind => "CksumKind",
            RxState::LenLow { .. } => "LenLow",
            RxState::LenHigh { .. } => "LenHigh",
            RxState::Payload { .. } => "Payload",
            RxState::Trailer { .. } => "Trailer",
        }
    }
}
