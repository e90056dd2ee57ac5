//! Extended-info flag bits and the block catalogue.

use bitflags::bitflags;
use wire::InfoProtocol;

bitflags! {
    /// One bit per extended-info block.
    ///
    /// The same bit set is used for an avatar's dirty flags, for an observer's
    /// per-target overlay and for the header of an encoded record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct InfoFlags: u32 {
        const APPEARANCE = 1 << 0;
        const MOVE_SPEED = 1 << 1;
        const SEQUENCE = 1 << 2;
        const FACE_PATHINGENTITY = 1 << 3;
        const FACE_ANGLE = 1 << 4;
        const SAY = 1 << 5;
        const CHAT = 1 << 6;
        const EXACT_MOVE = 1 << 7;
        const SPOTANIM = 1 << 8;
        const HIT = 1 << 9;
        const TINTING = 1 << 10;
        const TRANSFORMATION = 1 << 11;
        const BAS = 1 << 12;
        const VISIBLE_OPS = 1 << 13;
        const HEADICON = 1 << 14;
        const NAME_CHANGE = 1 << 15;
        const BODY_CUSTOM = 1 << 16;
        const HEAD_CUSTOM = 1 << 17;
        const COMBAT_LEVEL = 1 << 18;
    }
}

impl InfoFlags {
    /// Blocks written per observer instead of from a shared cache.
    pub const OBSERVER_DEPENDENT: Self = Self::HIT.union(Self::TINTING);

    /// Upper bound on the encoded size of a record carrying these flags,
    /// header included.
    #[must_use]
    pub fn worst_case_len(self) -> usize {
        let blocks: usize = BlockKind::ALL
            .iter()
            .filter(|kind| self.contains(kind.flag()))
            .map(|kind| kind.max_encoded_len())
            .sum();
        blocks + header_len(self)
    }
}

/// Bytes taken by the variable-length flag header.
#[must_use]
pub const fn header_len(flags: InfoFlags) -> usize {
    let bits = 32 - flags.bits().leading_zeros() as usize;
    if bits == 0 {
        1
    } else {
        bits.div_ceil(7)
    }
}

/// Longest text any protocol accepts, in characters.
pub const MAX_TEXT_CHARS: usize = 256;
/// Encoded size of the longest text: length prefix plus UTF-8 bytes.
const MAX_TEXT_LEN: usize = 2 + 4 * MAX_TEXT_CHARS;

/// Identifies one extended-info block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockKind {
    Appearance,
    MoveSpeed,
    Sequence,
    FacePathingEntity,
    FaceAngle,
    Say,
    Chat,
    ExactMove,
    SpotAnim,
    Hit,
    Tinting,
    Transformation,
    BaseAnimationSet,
    VisibleOps,
    HeadIcon,
    NameChange,
    BodyCustomisation,
    HeadCustomisation,
    CombatLevel,
}

impl BlockKind {
    /// Number of block kinds.
    pub const COUNT: usize = 19;

    /// Every block, in flag-bit order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Appearance,
        Self::MoveSpeed,
        Self::Sequence,
        Self::FacePathingEntity,
        Self::FaceAngle,
        Self::Say,
        Self::Chat,
        Self::ExactMove,
        Self::SpotAnim,
        Self::Hit,
        Self::Tinting,
        Self::Transformation,
        Self::BaseAnimationSet,
        Self::VisibleOps,
        Self::HeadIcon,
        Self::NameChange,
        Self::BodyCustomisation,
        Self::HeadCustomisation,
        Self::CombatLevel,
    ];

    /// Dense index, equal to the flag bit position.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The flag bit for this block.
    #[must_use]
    pub const fn flag(self) -> InfoFlags {
        InfoFlags::from_bits_retain(1 << self.index())
    }

    /// Blocks whose value persists across ticks and is resent to observers
    /// that have not seen it.
    #[must_use]
    pub const fn is_sticky(self) -> bool {
        matches!(
            self,
            Self::Appearance
                | Self::MoveSpeed
                | Self::FacePathingEntity
                | Self::FaceAngle
                | Self::Transformation
                | Self::BaseAnimationSet
                | Self::VisibleOps
                | Self::HeadIcon
                | Self::NameChange
                | Self::BodyCustomisation
                | Self::HeadCustomisation
                | Self::CombatLevel
        )
    }

    /// Blocks whose bytes depend on who is observing.
    #[must_use]
    pub const fn is_observer_dependent(self) -> bool {
        matches!(self, Self::Hit | Self::Tinting)
    }

    /// Returns `true` if `protocol` carries this block.
    #[must_use]
    pub const fn supported_by(self, protocol: InfoProtocol) -> bool {
        match protocol {
            InfoProtocol::Player => (self as usize) <= Self::Tinting as usize,
            InfoProtocol::Npc => !matches!(self, Self::Appearance | Self::MoveSpeed | Self::Chat),
            InfoProtocol::WorldEntity => matches!(self, Self::Sequence | Self::SpotAnim),
        }
    }

    /// Upper bound on the bytes any registered encoder writes for this block.
    #[must_use]
    pub const fn max_encoded_len(self) -> usize {
        match self {
            // icons, body parts, colours, animations, name, levels
            Self::Appearance => 3 + 12 * 2 + 5 + 7 * 2 + MAX_TEXT_LEN + 3,
            Self::MoveSpeed => 1,
            Self::Sequence => 4,
            Self::FacePathingEntity => 4,
            Self::FaceAngle => 3,
            Self::Say => MAX_TEXT_LEN,
            Self::Chat => 4 + MAX_TEXT_LEN,
            Self::ExactMove => 10,
            Self::SpotAnim => 2 + 256 * 7,
            Self::Hit => 2 + 255 * 6 + 255 * 8,
            Self::Tinting => 8,
            Self::Transformation => 2,
            Self::BaseAnimationSet => 1 + 7 * 2,
            Self::VisibleOps => 1,
            Self::HeadIcon => 1 + 8 * 6,
            Self::NameChange => MAX_TEXT_LEN,
            Self::BodyCustomisation | Self::HeadCustomisation => 2 + 255 * 2 + 255 * 4,
            Self::CombatLevel => 2,
        }
    }

    /// Every block carried by `protocol`, as a flag set.
    #[must_use]
    pub fn supported_flags(protocol: InfoProtocol) -> InfoFlags {
        Self::ALL
            .iter()
            .filter(|kind| kind.supported_by(protocol))
            .fold(InfoFlags::empty(), |acc, kind| acc | kind.flag())
    }
}
