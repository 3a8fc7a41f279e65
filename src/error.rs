//! Error types for sbmp.

use thiserror::Error;

use crate::protocol::ChecksumKind;

/// Main error type for all sbmp operations.
#[derive(Debug, Error)]
pub enum SbmpError {
    /// I/O error on the underlying byte link (transport helpers only).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The frame transmitter is disabled.
    #[error("transmitter is disabled")]
    TxDisabled,

    /// A body byte was offered with no outbound frame open.
    #[error("no outbound frame is open")]
    FrameNotOpen,

    /// The requested checksum kind is not compiled into this build.
    #[error("checksum kind {0:?} is not compiled in")]
    ChecksumUnavailable(ChecksumKind),

    /// Outbound message body exceeds what the peer's buffer can hold.
    #[error("message of {length} B exceeds peer limit of {max} B")]
    MessageTooLong { length: usize, max: u16 },

    /// Every listener slot is occupied.
    #[error("listener table is full")]
    ListenerTableFull,
}

/// Result type alias using SbmpError.
pub type Result<T> = std::result::Result<T, SbmpError>;
