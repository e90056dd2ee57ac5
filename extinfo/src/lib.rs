//! Extended-info blocks for the infosync info packets.
//!
//! An avatar's extended info is the optional, per-tick attribute data layered
//! on top of its movement: appearance, animations, chat, hits and, for NPCs,
//! a family of persistent overrides. This crate owns:
//! - The block catalogue and its flag bits ([`BlockKind`], [`InfoFlags`])
//! - Validated block values ([`ExtendedInfo`])
//! - Per-client serialization ([`ExtendedInfoEncoder`], [`ClientEncoders`])
//! - The precompute cache shared by every observer of an avatar
//!
//! # Design Principles
//!
//! - **Validate at the mutator** - Encoders never fail.
//! - **Serialize once** - A block is encoded once per change per client type.
//! - **Observer blocks stay live** - Hits and tinting are written per observer.

mod blocks;
mod encoder;
mod error;
mod flags;
mod set;

pub use blocks::{
    Appearance, BaseAnimationSet, Chat, CombatLevel, ExactMove, FaceAngle, FacePathingEntity,
    HeadIcon, HeadIconSprite, Headbar, Hit, Hitsplat, ModelCustomisation, MoveSpeed, NameChange,
    Say, Sequence, SpotAnim, SpotAnimList, Tinting, Transformation, VisibleOps, BASE_ANIMATIONS,
    BODY_COLOURS, BODY_PARTS, HEAD_ICON_SLOTS, MAX_HITS, SPOTANIM_SLOTS,
};
pub use encoder::{
    read_flag_header, write_flag_header, BlockRef, ClientEncoders, ClientType,
    ExtendedInfoEncoder, ObserverBlock, RawTextCompressor, StandardEncoder, TextCompressor,
};
pub use error::{ExtInfoError, ExtInfoResult};
pub use flags::{header_len, BlockKind, InfoFlags, MAX_TEXT_CHARS};
pub use set::{validate_tinting, ExtendedInfo, MAX_ANGLE, MAX_NAME_CHARS};
