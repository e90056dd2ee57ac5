//! Error types for bitstream operations.

use thiserror::Error;

/// Result type for bitstream operations.
pub type BitResult<T> = Result<T, BitError>;

/// Errors that can occur during bit-level encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitError {
    /// Attempted to read past the end of the buffer.
    #[error("attempted to read {requested} bits but only {available} bits available")]
    UnexpectedEof {
        /// Number of bits requested.
        requested: usize,
        /// Number of bits available.
        available: usize,
    },

    /// Invalid bit count for the operation.
    #[error("invalid bit count {bits}, maximum allowed is {max_bits}")]
    InvalidBitCount {
        /// The invalid bit count provided.
        bits: u8,
        /// Maximum allowed bits for this operation.
        max_bits: u8,
    },

    /// A byte-aligned operation was attempted mid-byte.
    #[error("byte-aligned access at bit position {bit_position}")]
    MisalignedAccess {
        /// Bit position at the time of the access.
        bit_position: usize,
    },

    /// A packed fragment would exceed its fixed capacity.
    #[error("packed fragment of {len} bits cannot take {bits} more (capacity {capacity})")]
    PackedOverflow {
        /// Bits already held by the fragment.
        len: u8,
        /// Bits that were being appended.
        bits: u8,
        /// Fragment capacity in bits.
        capacity: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_end_of_buffer() {
        let err = BitError::UnexpectedEof {
            requested: 8,
            available: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("8 bits"), "should mention requested bits");
        assert!(msg.contains("3 bits"), "should mention available bits");
    }

    #[test]
    fn error_display_invalid_bit_count() {
        let err = BitError::InvalidBitCount {
            bits: 40,
            max_bits: 32,
        };
        let msg = err.to_string();
        assert!(msg.contains("40"));
        assert!(msg.contains("32"));
    }

    #[test]
    fn error_display_packed_overflow() {
        let err = BitError::PackedOverflow {
            len: 48,
            bits: 5,
            capacity: 50,
        };
        assert!(err.to_string().contains("capacity 50"));
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<BitError>();
    }
}
