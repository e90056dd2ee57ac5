//! Engine configuration.

use wire::{InfoProtocol, ProtocolRevision};

use crate::error::{InfoError, InfoResult};

/// Highest capacity addressable by a `u16` avatar index.
pub const MAX_CAPACITY: usize = 1 << 16;

/// Limits for pooled per-observer and per-avatar structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    /// World details kept for reuse after an observer or world is released.
    pub max_pooled_details: usize,
    /// Avatars kept for reuse after deallocation.
    pub max_pooled_avatars: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pooled_details: 256,
            max_pooled_avatars: 512,
        }
    }
}

/// Everything needed to build an [`InfoEngine`](crate::InfoEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    pub revision: ProtocolRevision,
    #[cfg_attr(feature = "serde", serde(default))]
    pub pool: PoolConfig,
}

impl EngineConfig {
    /// Default configuration for `protocol`.
    #[must_use]
    pub fn for_protocol(protocol: InfoProtocol) -> Self {
        Self {
            revision: ProtocolRevision::for_protocol(protocol),
            pool: PoolConfig::default(),
        }
    }

    #[must_use]
    pub fn player() -> Self {
        Self::for_protocol(InfoProtocol::Player)
    }

    #[must_use]
    pub fn npc() -> Self {
        Self::for_protocol(InfoProtocol::Npc)
    }

    #[must_use]
    pub fn world_entity() -> Self {
        Self::for_protocol(InfoProtocol::WorldEntity)
    }

    /// Small capacity and pools, suitable for testing.
    #[must_use]
    pub fn for_testing(protocol: InfoProtocol) -> Self {
        Self {
            revision: ProtocolRevision::for_testing(protocol),
            pool: PoolConfig {
                max_pooled_details: 8,
                max_pooled_avatars: 8,
            },
        }
    }

    /// Checks that the revision's limits are consistent.
    pub fn validate(&self) -> InfoResult<()> {
        let revision = &self.revision;
        let reason = if revision.capacity == 0 || revision.capacity > MAX_CAPACITY {
            Some("capacity must be between 1 and 65536")
        } else if revision.max_high_resolution > revision.capacity {
            Some("max_high_resolution exceeds capacity")
        } else if revision.max_packet_bytes == 0 {
            Some("max_packet_bytes must be positive")
        } else if revision.dynamic_resize && revision.resize_grow_delay == 0 {
            Some("resize_grow_delay must be positive when resizing")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(InfoError::InvalidConfig { reason }),
            None => Ok(()),
        }
    }
}
