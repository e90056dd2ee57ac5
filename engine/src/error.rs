//! Error types for the info engine.

use bitstream::BitError;
use extinfo::{BlockKind, ClientType, ExtInfoError};
use thiserror::Error;
use wire::WireError;

use crate::details::WorldId;
use crate::observer::ObserverId;

/// Result type for engine operations.
pub type InfoResult<T> = Result<T, InfoError>;

/// Errors raised by the engine.
///
/// Contract violations are returned at the call site. Failures while encoding
/// one observer are captured on that observer and surface as
/// [`InfoError::ObserverFailed`] when its packet is taken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InfoError {
    /// Bit-level write error.
    #[error("bitstream error: {0}")]
    Bitstream(#[from] BitError),

    /// Coordinate or movement error.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Rejected extended-info input.
    #[error("extended info error: {0}")]
    ExtendedInfo(#[from] ExtInfoError),

    /// Avatar index beyond the revision's capacity.
    #[error("index {index} is outside capacity {capacity}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Revision capacity.
        capacity: usize,
    },

    /// The avatar slot is already in use.
    #[error("avatar {index} is already allocated")]
    AvatarAlreadyAllocated {
        /// Avatar index.
        index: u16,
    },

    /// No avatar occupies the slot.
    #[error("avatar {index} is not allocated")]
    AvatarNotAllocated {
        /// Avatar index.
        index: u16,
    },

    /// An avatar reached the encode phase without a coordinate.
    #[error("avatar {index} has no coordinate")]
    CoordNotSet {
        /// Avatar index.
        index: u16,
    },

    /// The observer slot is already in use.
    #[error("observer {observer:?} is already allocated")]
    ObserverAlreadyAllocated {
        /// Observer id.
        observer: ObserverId,
    },

    /// No observer occupies the slot.
    #[error("observer {observer:?} is not allocated")]
    ObserverNotAllocated {
        /// Observer id.
        observer: ObserverId,
    },

    /// No encoder is registered for the observer's client.
    #[error("no encoder registered for {client:?}")]
    MissingEncoder {
        /// Client type without an encoder.
        client: ClientType,
    },

    /// The observer already tracks this world.
    #[error("world {world:?} is already allocated")]
    WorldAlreadyAllocated {
        /// World id.
        world: WorldId,
    },

    /// The observer does not track this world.
    #[error("world {world:?} is not allocated")]
    WorldNotAllocated {
        /// World id.
        world: WorldId,
    },

    /// The world id cannot be used for this operation.
    #[error("world {world:?} is not valid here")]
    InvalidWorld {
        /// World id.
        world: WorldId,
    },

    /// Engine configuration is inconsistent.
    #[error("invalid config: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: &'static str,
    },

    /// A queued block had no precomputed bytes; encode ran before prepare.
    #[error("avatar {index} has no precomputed {kind:?} block")]
    MissingPrecompute {
        /// Avatar index.
        index: u16,
        /// Block without a cache.
        kind: BlockKind,
    },

    /// A queued avatar disappeared mid-encode.
    #[error("queued avatar {index} is missing")]
    MissingAvatar {
        /// Avatar index.
        index: u16,
    },

    /// Encoding this observer failed earlier in the tick.
    #[error("observer {observer:?} failed: {source}")]
    ObserverFailed {
        /// Observer id.
        observer: ObserverId,
        /// The captured failure.
        #[source]
        source: Box<InfoError>,
    },
}
