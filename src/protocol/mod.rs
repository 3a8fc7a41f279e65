//! Protocol module - checksums, frame state machine, and the datagram view.
//!
//! This module implements the two lower layers of the stack:
//! - per-byte frame parsing and streaming frame transmission
//! - the `[session | type | body]` datagram view over a frame payload

mod checksum;
mod datagram;
mod framing;

pub use checksum::{Checksum, ChecksumKind};
pub use datagram::{dg_type, start_datagram, Datagram, DATAGRAM_HEADER_LEN};
pub use framing::{ByteWriter, FrameParser, SOF};
