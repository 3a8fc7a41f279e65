//! # sbmp
//!
//! Simple Binary Messaging Protocol: point-to-point framed messaging for
//! UART-like serial byte streams.
//!
//! ## Architecture
//!
//! Three layers compose bottom-up:
//!
//! - **Frame layer** ([`protocol::FrameParser`]): delimits and validates
//!   variable-length binary frames on a raw byte stream, one byte at a time.
//! - **Datagram layer** ([`protocol::Datagram`]): interprets a frame payload
//!   as `[session | type | body]`.
//! - **Endpoint layer** ([`Endpoint`]): owns session numbering with
//!   origin-bit arbitration, the parameter handshake, and per-session
//!   listener dispatch.
//!
//! Receive path: bytes → frame state machine → datagram parse → handshake /
//! listener / default handler. Transmit path: endpoint picks session and
//! checksum → datagram header → framed byte stream through the host writer.
//!
//! ## Example
//!
//! ```
//! use sbmp::EndpointBuilder;
//!
//! let mut ep = EndpointBuilder::new()
//!     .buffer_capacity(128)
//!     .on_datagram(|dg| println!("rx type {:#04x}, {} B", dg.kind, dg.len()))
//!     .build(|byte: u8| {
//!         // hand `byte` to the serial driver
//!         let _ = byte;
//!     });
//!
//! // Arbitrate origin bits and exchange buffer sizes with the peer,
//! // then talk. Received bytes go into `ep.receive_all(..)`.
//! ep.start_handshake().unwrap();
//! let (session, _sent) = ep.send_message(0x20, b"hello").unwrap();
//! assert_eq!(session & 0x8000, 0x8000 * u16::from(ep.origin()));
//! ```

pub mod endpoint;
pub mod error;
pub mod protocol;
#[cfg(feature = "transport")]
pub mod transport;

pub use endpoint::{Endpoint, EndpointBuilder, HandshakeStatus};
pub use error::SbmpError;
pub use protocol::{dg_type, ByteWriter, ChecksumKind, Datagram, FrameParser};
