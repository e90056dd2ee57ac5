//! Protocol revisions and their per-packet limits.

/// The three info protocols sharing the resolution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum InfoProtocol {
    /// Player-info: observers see other players.
    Player,
    /// NPC-info: observers see non-player characters.
    Npc,
    /// World-entity-info: observers see dynamic sub-map instances.
    WorldEntity,
}

/// High-resolution slot caps per priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TierCaps {
    /// Slots usable by low-priority candidates.
    pub low: usize,
    /// Slots usable by normal-priority candidates.
    pub normal: usize,
    /// Slots usable by high-priority candidates.
    pub high: usize,
}

impl TierCaps {
    /// Every tier may use every slot.
    #[must_use]
    pub const fn uniform(max: usize) -> Self {
        Self {
            low: max,
            normal: max,
            high: max,
        }
    }
}

/// Limits and behavioural switches for one protocol revision.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProtocolRevision {
    /// Which info protocol this revision encodes.
    pub protocol: InfoProtocol,
    /// Number of candidate indices (avatar slots).
    pub capacity: usize,
    /// Maximum high-resolution entities per observer per world, excluding the local player.
    pub max_high_resolution: usize,
    /// Maximum extended-info records queued per observer per world per tick.
    pub max_extended_info_per_tick: usize,
    /// Byte budget for one observer packet.
    pub max_packet_bytes: usize,
    /// View range (tiles) observers start with and grow back towards.
    pub preferred_range: u32,
    /// Shrink the view range while the high-resolution list is full.
    pub dynamic_resize: bool,
    /// Ticks below capacity before the view range grows by one.
    pub resize_grow_delay: u32,
    /// The first queued extended-info record is always written.
    pub never_defer_first: bool,
    /// Write a 16-bit all-ones marker before extended-info records.
    pub extended_info_terminator: bool,
    /// Per-tier high-resolution caps.
    pub tier_caps: TierCaps,
}

impl ProtocolRevision {
    /// Player-info revision.
    #[must_use]
    pub const fn player() -> Self {
        Self {
            protocol: InfoProtocol::Player,
            capacity: 2048,
            max_high_resolution: 250,
            max_extended_info_per_tick: 250,
            max_packet_bytes: 40_000,
            preferred_range: 15,
            dynamic_resize: true,
            resize_grow_delay: 10,
            never_defer_first: true,
            extended_info_terminator: true,
            tier_caps: TierCaps::uniform(250),
        }
    }

    /// NPC-info revision.
    #[must_use]
    pub const fn npc() -> Self {
        Self {
            protocol: InfoProtocol::Npc,
            capacity: 8192,
            max_high_resolution: 149,
            max_extended_info_per_tick: 149,
            max_packet_bytes: 40_000,
            preferred_range: 15,
            dynamic_resize: false,
            resize_grow_delay: 0,
            never_defer_first: false,
            extended_info_terminator: true,
            tier_caps: TierCaps {
                low: 100,
                normal: 149,
                high: 149,
            },
        }
    }

    /// World-entity-info revision.
    #[must_use]
    pub const fn world_entity() -> Self {
        Self {
            protocol: InfoProtocol::WorldEntity,
            capacity: 2048,
            max_high_resolution: 25,
            max_extended_info_per_tick: 25,
            max_packet_bytes: 40_000,
            preferred_range: 15,
            dynamic_resize: false,
            resize_grow_delay: 0,
            never_defer_first: false,
            extended_info_terminator: true,
            tier_caps: TierCaps::uniform(25),
        }
    }

    /// Default revision for a protocol.
    #[must_use]
    pub const fn for_protocol(protocol: InfoProtocol) -> Self {
        match protocol {
            InfoProtocol::Player => Self::player(),
            InfoProtocol::Npc => Self::npc(),
            InfoProtocol::WorldEntity => Self::world_entity(),
        }
    }

    /// Creates a revision with small capacity, suitable for testing.
    #[must_use]
    pub const fn for_testing(protocol: InfoProtocol) -> Self {
        let mut revision = Self::for_protocol(protocol);
        revision.capacity = 512;
        revision
    }
}
