//! Error types for wire-level encoding and decoding.

use thiserror::Error;

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors produced while building or parsing wire fragments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Bitstream error.
    #[error("bitstream error: {0}")]
    Bitstream(#[from] bitstream::BitError),

    /// Coordinate components outside the map.
    #[error("coordinate out of range: level {level}, x {x}, z {z}")]
    CoordOutOfRange {
        /// Requested level.
        level: i32,
        /// Requested x.
        x: i32,
        /// Requested z.
        z: i32,
    },

    /// Build area extends past the map.
    #[error("build area out of range: zone ({zone_x}, {zone_z}) size {width}x{length}")]
    BuildAreaOutOfRange {
        /// South-west zone x.
        zone_x: u16,
        /// South-west zone z.
        zone_z: u16,
        /// Width in zones.
        width: u16,
        /// Length in zones.
        length: u16,
    },

    /// Movement opcode that is not valid in this position.
    #[error("invalid movement opcode {opcode}")]
    InvalidOpcode {
        /// The opcode read from the stream.
        opcode: u32,
    },

    /// Direction code outside its table.
    #[error("invalid direction code {code}")]
    InvalidDirection {
        /// The code read from the stream.
        code: u32,
    },

    /// A delta that no movement opcode can express.
    #[error("delta ({dx}, {dz}) has no direction code")]
    UnencodableDelta {
        /// X delta.
        dx: i32,
        /// Z delta.
        dz: i32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_errors_convert() {
        let err: WireError = bitstream::BitError::InvalidBitCount {
            bits: 40,
            max_bits: 32,
        }
        .into();
        assert!(matches!(err, WireError::Bitstream(_)));
        assert!(err.to_string().starts_with("bitstream error"));
    }

    #[test]
    fn coord_error_mentions_values() {
        let err = WireError::CoordOutOfRange {
            level: 4,
            x: 1,
            z: 2,
        };
        assert!(err.to_string().contains("level 4"));
    }
}
