//! Error types for extended-info mutation and encoder registration.

use thiserror::Error;
use wire::InfoProtocol;

use crate::encoder::ClientType;
use crate::flags::BlockKind;

/// Result type for extended-info operations.
pub type ExtInfoResult<T> = Result<T, ExtInfoError>;

/// Rejected mutator input or registry misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtInfoError {
    /// A numeric field is outside its documented range.
    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: i64,
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },

    /// Text exceeds the protocol's character limit.
    #[error("{field} has {len} characters, limit is {max}")]
    TextTooLong {
        /// Field name.
        field: &'static str,
        /// Character count supplied.
        len: usize,
        /// Character limit.
        max: usize,
    },

    /// A list block holds more entries than its wire count can express.
    #[error("{field} has {len} entries, limit is {max}")]
    TooManyEntries {
        /// Field name.
        field: &'static str,
        /// Entry count after the insert.
        len: usize,
        /// Entry limit.
        max: usize,
    },

    /// The block is not part of this protocol.
    #[error("{kind:?} is not supported by the {protocol:?} protocol")]
    Unsupported {
        /// Block that was mutated.
        kind: BlockKind,
        /// Protocol of the owning set.
        protocol: InfoProtocol,
    },

    /// An encoder for this client type is already registered.
    #[error("encoder for {client:?} already registered")]
    DuplicateEncoder {
        /// Client type of the rejected encoder.
        client: ClientType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_display() {
        let err = ExtInfoError::OutOfRange {
            field: "hue",
            value: 300,
            min: 0,
            max: 255,
        };
        assert_eq!(err.to_string(), "hue = 300 is outside 0..=255");
    }

    #[test]
    fn unsupported_display() {
        let err = ExtInfoError::Unsupported {
            kind: BlockKind::Chat,
            protocol: InfoProtocol::Npc,
        };
        assert!(err.to_string().contains("Chat"));
        assert!(err.to_string().contains("Npc"));
    }
}
