//! Frame checksum kinds and the running accumulator.
//!
//! Both the receive and transmit paths fold payload bytes into a [`Checksum`]
//! one at a time; the accumulator covers the payload only, never the header.
//!
//! CRC-32 is the ISO polynomial 0xEDB88320 (reflected), initial value
//! 0xFFFFFFFF, final XOR 0xFFFFFFFF - exactly what `crc32fast` computes.
//! It travels little-endian on the wire.

use std::fmt;

/// Checksum kind carried in the frame header.
///
/// The discriminants are the wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChecksumKind {
    /// No trailer; every frame is accepted as-is.
    None = 0,
    /// Single-byte XOR of all payload bytes.
    Xor = 1,
    /// ISO CRC-32 of the payload, 4 bytes little-endian.
    Crc32 = 32,
}

impl ChecksumKind {
    /// Number of trailer bytes this kind appends after the payload.
    #[inline]
    pub fn trailer_len(self) -> usize {
        match self {
            ChecksumKind::None => 0,
            ChecksumKind::Xor => 1,
            ChecksumKind::Crc32 => 4,
        }
    }

    /// Whether this kind can be computed in the current build.
    ///
    /// CRC-32 requires the `crc32` cargo feature; the other kinds are
    /// always available.
    #[inline]
    pub fn is_available(self) -> bool {
        match self {
            ChecksumKind::Crc32 => cfg!(feature = "crc32"),
            _ => true,
        }
    }

    /// The strongest kind available in this build.
    ///
    /// Used as the default checksum preference for new endpoints.
    pub fn best_available() -> Self {
        if cfg!(feature = "crc32") {
            ChecksumKind::Crc32
        } else {
            ChecksumKind::Xor
        }
    }
}

impl TryFrom<u8> for ChecksumKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ChecksumKind::None),
            1 => Ok(ChecksumKind::Xor),
            32 => Ok(ChecksumKind::Crc32),
            _ => Err(()),
        }
    }
}

/// Running checksum over payload bytes.
pub enum Checksum {
    /// Accepts everything, produces nothing.
    None,
    /// XOR fold, initial value 0.
    Xor(u8),
    /// Incremental CRC-32 state.
    #[cfg(feature = "crc32")]
    Crc32(crc32fast::Hasher),
}

impl Checksum {
    /// Start an accumulator for the given kind.
    pub fn new(kind: ChecksumKind) -> Self {
        match kind {
            ChecksumKind::None => Checksum::None,
            ChecksumKind::Xor => Checksum::Xor(0),
            #[cfg(feature = "crc32")]
            ChecksumKind::Crc32 => Checksum::Crc32(crc32fast::Hasher::new()),
            // Callers reject CRC32 up front when the feature is off; an XOR
            // accumulator here keeps the match total without panicking.
            #[cfg(not(feature = "crc32"))]
            ChecksumKind::Crc32 => Checksum::Xor(0),
        }
    }

    /// Fold one payload byte into the accumulator.
    #[inline]
    pub fn update(&mut self, byte: u8) {
        match self {
            Checksum::None => {}
            Checksum::Xor(acc) => *acc ^= byte,
            #[cfg(feature = "crc32")]
            Checksum::Crc32(hasher) => hasher.update(&[byte]),
        }
    }

    /// Consume the accumulator and produce the checksum value.
    ///
    /// XOR values occupy the low 8 bits.
    pub fn finalize(self) -> u32 {
        match self {
            Checksum::None => 0,
            Checksum::Xor(acc) => u32::from(acc),
            #[cfg(feature = "crc32")]
            Checksum::Crc32(hasher) => hasher.finalize(),
        }
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checksum::None => f.write_str("Checksum::None"),
            Checksum::Xor(acc) => write!(f, "Checksum::Xor({:#04x})", acc),
            #[cfg(feature = "crc32")]
            Checksum::Crc32(_) => f.write_str("Checksum::Crc32(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        assert_eq!(ChecksumKind::None as u8, 0);
        assert_eq!(ChecksumKind::Xor as u8, 1);
        assert_eq!(ChecksumKind::Crc32 as u8, 32);
    }

    #[test]
    fn test_try_from_known_kinds() {
        assert_eq!(ChecksumKind::try_from(0), Ok(ChecksumKind::None));
        assert_eq!(ChecksumKind::try_from(1), Ok(ChecksumKind::Xor));
        assert_eq!(ChecksumKind::try_from(32), Ok(ChecksumKind::Crc32));
    }

    #[test]
    fn test_try_from_unknown_kind() {
        assert!(ChecksumKind::try_from(2).is_err());
        assert!(ChecksumKind::try_from(0xFF).is_err());
    }

    #[test]
    fn test_trailer_lengths() {
        assert_eq!(ChecksumKind::None.trailer_len(), 0);
        assert_eq!(ChecksumKind::Xor.trailer_len(), 1);
        assert_eq!(ChecksumKind::Crc32.trailer_len(), 4);
    }

    #[test]
    fn test_xor_fold() {
        let mut cksum = Checksum::new(ChecksumKind::Xor);
        for byte in [0xAA, 0xBB, 0xCC] {
            cksum.update(byte);
        }
        assert_eq!(cksum.finalize(), 0x15);
    }

    #[test]
    fn test_xor_empty_payload_is_zero() {
        assert_eq!(Checksum::new(ChecksumKind::Xor).finalize(), 0);
    }

    #[test]
    fn test_none_is_always_zero() {
        let mut cksum = Checksum::new(ChecksumKind::None);
        cksum.update(0x42);
        assert_eq!(cksum.finalize(), 0);
    }

    #[cfg(feature = "crc32")]
    #[test]
    fn test_crc32_known_vector() {
        // The standard CRC-32 check value.
        let mut cksum = Checksum::new(ChecksumKind::Crc32);
        for byte in b"123456789" {
            cksum.update(*byte);
        }
        assert_eq!(cksum.finalize(), 0xCBF4_3926);
    }

    #[cfg(feature = "crc32")]
    #[test]
    fn test_best_available_prefers_crc32() {
        assert_eq!(ChecksumKind::best_available(), ChecksumKind::Crc32);
        assert!(ChecksumKind::Crc32.is_available());
    }
}
