//! Wire contract for the player, NPC and world-entity info packets.
//!
//! This crate owns everything whose bit layout a client depends on:
//! coordinates, movement opcodes, skip runs, and the per-revision limits
//! that shape a packet. It knows nothing about observers or avatars.
//!
//! # Design Principles
//!
//! - **Bit-exact** - Every layout here is a client contract, not a choice.
//! - **Validated inputs** - Coordinates are checked once at construction.
//! - **Decoders alongside encoders** - Tests and tooling walk emitted buffers
//!   with the same tables used to write them.

mod coord;
mod error;
mod movement;
mod revision;
mod skip;

pub use coord::{
    BuildArea, CoordFine, CoordGrid, LowResolutionPosition, FINE_SHIFT, LEVEL_COUNT,
    LOW_RES_SHIFT, MAP_SIZE, ZONE_SIZE,
};
pub use error::{WireError, WireResult};
pub use movement::{
    decode_high_res, decode_low_res, encode_high_res, encode_low_res, run_direction,
    walk_direction, MovementDelta, LARGE_TELEPORT_THRESHOLD, OPCODE_BITS, OPCODE_NONE,
    OPCODE_RUN, OPCODE_TELEPORT, OPCODE_WALK,
};
pub use revision::{InfoProtocol, ProtocolRevision, TierCaps};
pub use skip::{read_skip_run, skip_run_bits, write_skip_run, MAX_SKIP_RUN};

/// Bits of the absolute x and z written when an entity is promoted.
pub const PROMOTION_COORD_BITS: u8 = 13;
/// Marker written before extended-info records when the revision asks for it.
pub const EXTENDED_INFO_TERMINATOR: u32 = 0xFFFF;
