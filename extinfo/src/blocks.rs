//! Raw values held by each extended-info block.
//!
//! Values are only written through the validating mutators on
//! [`ExtendedInfo`](crate::ExtendedInfo); encoders read them through
//! [`BlockRef`](crate::BlockRef).

/// Equipment slots carried by an appearance.
pub const BODY_PARTS: usize = 12;
/// Recolourable body parts.
pub const BODY_COLOURS: usize = 5;
/// Base animations (ready, turn, walk and so on).
pub const BASE_ANIMATIONS: usize = 7;
/// Head icon slots on an NPC.
pub const HEAD_ICON_SLOTS: usize = 8;
/// Hitsplats or headbars accepted per tick.
pub const MAX_HITS: usize = 255;
/// Spot animation slots.
pub const SPOTANIM_SLOTS: usize = 256;

/// Persistent look of a player.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Appearance {
    pub name: String,
    pub combat_level: u8,
    pub skill_level: u16,
    pub female: bool,
    pub hidden: bool,
    pub skull_icon: Option<u8>,
    pub overhead_icon: Option<u8>,
    pub transformed_npc: Option<u16>,
    pub body: [u16; BODY_PARTS],
    pub colours: [u8; BODY_COLOURS],
    pub animations: [u16; BASE_ANIMATIONS],
}

/// Movement speed shown by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MoveSpeed {
    Crawl = 0,
    #[default]
    Walk = 1,
    Run = 2,
    Teleport = 127,
}

/// Animation played by the avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    /// Animation id, `None` to stop the current one.
    pub id: Option<u16>,
    pub delay: u16,
}

impl Default for Sequence {
    fn default() -> Self {
        Self { id: None, delay: 0 }
    }
}

/// Entity the avatar keeps facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FacePathingEntity {
    /// Target index, `None` when unset.
    pub target: Option<u32>,
}

impl FacePathingEntity {
    /// Wire value written when no target is set.
    pub const UNSET: u32 = 0x00FF_FFFF;

    /// Value written on the wire.
    #[must_use]
    pub fn wire_value(self) -> u32 {
        self.target.unwrap_or(Self::UNSET)
    }
}

/// Fixed direction the avatar faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaceAngle {
    /// Angle in 2048ths of a turn, `None` when unset.
    pub angle: Option<u16>,
    pub instant: bool,
}

/// Overhead text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Say {
    pub text: String,
}

/// Public chat message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chat {
    pub colour: u8,
    pub effects: u8,
    pub mod_icon: u8,
    pub autotyper: bool,
    pub text: String,
}

/// Forced movement between two offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExactMove {
    pub first_dx: i8,
    pub first_dz: i8,
    pub first_delay: u16,
    pub second_dx: i8,
    pub second_dz: i8,
    pub second_delay: u16,
    pub direction: u16,
}

/// One graphic attached to the avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpotAnim {
    pub slot: u8,
    pub id: u16,
    pub delay: u16,
    pub height: u16,
}

/// Graphics set this tick, at most one per slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpotAnimList {
    pub entries: Vec<SpotAnim>,
}

/// A damage number shown over the avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hitsplat {
    /// Index of the avatar that dealt the hit, if any.
    pub source: Option<u32>,
    /// Type shown to the target and the source.
    pub self_type: u16,
    /// Type shown to everyone else.
    pub other_type: u16,
    pub value: u16,
    pub delay: u16,
}

/// A health bar update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Headbar {
    pub source: Option<u32>,
    pub self_type: u16,
    pub other_type: u16,
    pub start_fill: u8,
    pub end_fill: u8,
    pub start_time: u16,
    pub end_time: u16,
}

/// Hitsplats and headbars queued this tick.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hit {
    pub hitsplats: Vec<Hitsplat>,
    pub headbars: Vec<Headbar>,
}

impl Hit {
    /// Returns `true` if the observer sees the self variant of a hit from
    /// `source`. `observer` is the observer's own avatar index, if it has one,
    /// and `own_avatar` is set when the hit lands on that avatar.
    #[must_use]
    pub fn is_self_view(observer: Option<u32>, own_avatar: bool, source: Option<u32>) -> bool {
        own_avatar || (source.is_some() && source == observer)
    }
}

/// Colour overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tinting {
    pub start: u16,
    pub end: u16,
    pub hue: u8,
    pub saturation: u8,
    pub lightness: u8,
    pub weight: u8,
}

/// NPC type override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transformation {
    pub id: Option<u16>,
}

/// Base animation overrides, one per animation slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BaseAnimationSet {
    pub overrides: [Option<u16>; BASE_ANIMATIONS],
}

/// Right-click options shown for an NPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleOps {
    pub mask: u8,
}

impl VisibleOps {
    /// All five options visible.
    pub const ALL: u8 = 0b1_1111;
}

impl Default for VisibleOps {
    fn default() -> Self {
        Self { mask: Self::ALL }
    }
}

/// A custom head icon sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadIconSprite {
    pub group: u32,
    pub index: u16,
}

/// Head icon overrides per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeadIcon {
    pub slots: [Option<HeadIconSprite>; HEAD_ICON_SLOTS],
}

/// NPC name override.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameChange {
    pub name: Option<String>,
}

/// Model and recolour overrides for an NPC's body or head.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelCustomisation {
    pub models: Vec<u16>,
    pub recolours: Vec<(u16, u16)>,
}

impl ModelCustomisation {
    /// Returns `true` when nothing is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty() && self.recolours.is_empty()
    }
}

/// NPC combat level override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CombatLevel {
    pub level: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_defaults() {
        assert_eq!(MoveSpeed::default(), MoveSpeed::Walk);
        assert_eq!(FacePathingEntity::default().wire_value(), FacePathingEntity::UNSET);
        assert_eq!(VisibleOps::default().mask, VisibleOps::ALL);
        assert!(ModelCustomisation::default().is_empty());
    }

    #[test]
    fn hit_self_view() {
        assert!(Hit::is_self_view(Some(5), true, None));
        assert!(Hit::is_self_view(Some(7), false, Some(7)));
        assert!(!Hit::is_self_view(Some(8), false, Some(7)));
        assert!(!Hit::is_self_view(Some(8), false, None));
        assert!(!Hit::is_self_view(None, false, None));
    }
}
