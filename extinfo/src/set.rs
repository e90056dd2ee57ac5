//! Per-avatar extended-info block set.
//!
//! Each block carries a version that every successful mutation bumps. A
//! precompute cache entry is valid only for the version it was built from,
//! so a block is serialized at most once per change per client, no matter how
//! many observers copy it.

use wire::InfoProtocol;

use crate::blocks::{
    Appearance, BaseAnimationSet, Chat, CombatLevel, ExactMove, FaceAngle, FacePathingEntity,
    HeadIcon, HeadIconSprite, Headbar, Hit, Hitsplat, ModelCustomisation, MoveSpeed, NameChange,
    Say, Sequence, SpotAnim, SpotAnimList, Tinting, Transformation, VisibleOps, BASE_ANIMATIONS,
    HEAD_ICON_SLOTS, MAX_HITS,
};
use crate::encoder::{BlockRef, ClientEncoders};
use crate::error::{ExtInfoError, ExtInfoResult};
use crate::flags::{BlockKind, InfoFlags};

/// Longest player name.
pub const MAX_NAME_CHARS: usize = 12;
/// Largest angle, in 2048ths of a turn.
pub const MAX_ANGLE: i32 = 2047;

const MAX_MODELS: usize = 255;

fn check_range(field: &'static str, value: i32, min: i32, max: i32) -> ExtInfoResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ExtInfoError::OutOfRange {
            field,
            value: i64::from(value),
            min: i64::from(min),
            max: i64::from(max),
        })
    }
}

fn check_u8(field: &'static str, value: i32) -> ExtInfoResult<u8> {
    check_range(field, value, 0, 255)?;
    Ok(value as u8)
}

fn check_u16(field: &'static str, value: i32) -> ExtInfoResult<u16> {
    check_range(field, value, 0, 65_535)?;
    Ok(value as u16)
}

fn check_text(field: &'static str, text: &str, max: usize) -> ExtInfoResult<()> {
    let len = text.chars().count();
    if len > max {
        return Err(ExtInfoError::TextTooLong { field, len, max });
    }
    Ok(())
}

fn check_entries(field: &'static str, len: usize, max: usize) -> ExtInfoResult<()> {
    if len > max {
        return Err(ExtInfoError::TooManyEntries { field, len, max });
    }
    Ok(())
}

/// Current value of every block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Values {
    appearance: Appearance,
    move_speed: MoveSpeed,
    sequence: Sequence,
    face_pathing: FacePathingEntity,
    face_angle: FaceAngle,
    say: Say,
    chat: Chat,
    exact_move: ExactMove,
    spot_anims: SpotAnimList,
    hit: Hit,
    tinting: Tinting,
    transformation: Transformation,
    base_animations: BaseAnimationSet,
    visible_ops: VisibleOps,
    head_icon: HeadIcon,
    name_change: NameChange,
    body: ModelCustomisation,
    head: ModelCustomisation,
    combat_level: CombatLevel,
}

impl Values {
    fn block_ref(&self, kind: BlockKind) -> Option<BlockRef<'_>> {
        let block = match kind {
            BlockKind::Appearance => BlockRef::Appearance(&self.appearance),
            BlockKind::MoveSpeed => BlockRef::MoveSpeed(self.move_speed),
            BlockKind::Sequence => BlockRef::Sequence(self.sequence),
            BlockKind::FacePathingEntity => BlockRef::FacePathingEntity(self.face_pathing),
            BlockKind::FaceAngle => BlockRef::FaceAngle(self.face_angle),
            BlockKind::Say => BlockRef::Say(&self.say),
            BlockKind::Chat => BlockRef::Chat(&self.chat),
            BlockKind::ExactMove => BlockRef::ExactMove(self.exact_move),
            BlockKind::SpotAnim => BlockRef::SpotAnim(&self.spot_anims),
            BlockKind::Hit | BlockKind::Tinting => return None,
            BlockKind::Transformation => BlockRef::Transformation(self.transformation),
            BlockKind::BaseAnimationSet => BlockRef::BaseAnimationSet(self.base_animations),
            BlockKind::VisibleOps => BlockRef::VisibleOps(self.visible_ops),
            BlockKind::HeadIcon => BlockRef::HeadIcon(self.head_icon),
            BlockKind::NameChange => BlockRef::NameChange(&self.name_change),
            BlockKind::BodyCustomisation => BlockRef::BodyCustomisation(&self.body),
            BlockKind::HeadCustomisation => BlockRef::HeadCustomisation(&self.head),
            BlockKind::CombatLevel => BlockRef::CombatLevel(self.combat_level),
        };
        Some(block)
    }

    /// Returns `true` if a sticky block holds something other than its wire
    /// default. Appearance is tracked by its change counter instead.
    fn sticky_non_default(&self, kind: BlockKind) -> bool {
        match kind {
            BlockKind::MoveSpeed => self.move_speed != MoveSpeed::default(),
            BlockKind::FacePathingEntity => self.face_pathing.target.is_some(),
            BlockKind::FaceAngle => self.face_angle.angle.is_some(),
            BlockKind::Transformation => self.transformation.id.is_some(),
            BlockKind::BaseAnimationSet => {
                self.base_animations.overrides.iter().any(Option::is_some)
            }
            BlockKind::VisibleOps => self.visible_ops != VisibleOps::default(),
            BlockKind::HeadIcon => self.head_icon.slots.iter().any(Option::is_some),
            BlockKind::NameChange => self.name_change.name.is_some(),
            BlockKind::BodyCustomisation => !self.body.is_empty(),
            BlockKind::HeadCustomisation => !self.head.is_empty(),
            BlockKind::CombatLevel => self.combat_level.level.is_some(),
            _ => false,
        }
    }

    fn clear(&mut self, kind: BlockKind) {
        match kind {
            BlockKind::Sequence => self.sequence = Sequence::default(),
            BlockKind::Say => self.say.text.clear(),
            BlockKind::Chat => {
                let mut text = std::mem::take(&mut self.chat.text);
                text.clear();
                self.chat = Chat {
                    text,
                    ..Chat::default()
                };
            }
            BlockKind::ExactMove => self.exact_move = ExactMove::default(),
            BlockKind::SpotAnim => self.spot_anims.entries.clear(),
            BlockKind::Hit => {
                self.hit.hitsplats.clear();
                self.hit.headbars.clear();
            }
            BlockKind::Tinting => self.tinting = Tinting::default(),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CacheEntry {
    version: Option<u32>,
    bytes: Vec<u8>,
}

type ClientCache = [CacheEntry; BlockKind::COUNT];

/// Every extended-info block of one avatar, plus its precompute caches.
#[derive(Debug, Clone)]
pub struct ExtendedInfo {
    protocol: InfoProtocol,
    max_text_chars: usize,
    flags: InfoFlags,
    appearance_counter: u32,
    versions: [u32; BlockKind::COUNT],
    values: Values,
    caches: Vec<ClientCache>,
}

impl ExtendedInfo {
    /// Creates an empty set for `protocol`.
    #[must_use]
    pub fn new(protocol: InfoProtocol) -> Self {
        let max_text_chars = match protocol {
            InfoProtocol::Npc => 256,
            InfoProtocol::Player | InfoProtocol::WorldEntity => 80,
        };
        Self {
            protocol,
            max_text_chars,
            flags: InfoFlags::empty(),
            appearance_counter: 0,
            versions: [0; BlockKind::COUNT],
            values: Values::default(),
            caches: Vec::new(),
        }
    }

    #[must_use]
    pub const fn protocol(&self) -> InfoProtocol {
        self.protocol
    }

    /// Blocks changed this tick.
    #[must_use]
    pub const fn flags(&self) -> InfoFlags {
        self.flags
    }

    /// Number of appearance changes so far; 0 means never set.
    #[must_use]
    pub const fn appearance_change_counter(&self) -> u32 {
        self.appearance_counter
    }

    /// Version of a block, bumped on every mutation.
    #[must_use]
    pub const fn version(&self, kind: BlockKind) -> u32 {
        self.versions[kind.index()]
    }

    #[must_use]
    pub const fn appearance(&self) -> &Appearance {
        &self.values.appearance
    }

    #[must_use]
    pub const fn hit(&self) -> &Hit {
        &self.values.hit
    }

    #[must_use]
    pub const fn tinting(&self) -> &Tinting {
        &self.values.tinting
    }

    /// Borrowed view of an observer-independent block.
    #[must_use]
    pub fn block(&self, kind: BlockKind) -> Option<BlockRef<'_>> {
        self.values.block_ref(kind)
    }

    fn ensure_supported(&self, kind: BlockKind) -> ExtInfoResult<()> {
        if kind.supported_by(self.protocol) {
            Ok(())
        } else {
            Err(ExtInfoError::Unsupported {
                kind,
                protocol: self.protocol,
            })
        }
    }

    fn touch(&mut self, kind: BlockKind) {
        self.flags |= kind.flag();
        let version = &mut self.versions[kind.index()];
        *version = version.wrapping_add(1);
    }

    /// Replaces the appearance and bumps its change counter.
    pub fn set_appearance(&mut self, appearance: Appearance) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::Appearance)?;
        check_text("name", &appearance.name, MAX_NAME_CHARS)?;
        self.values.appearance = appearance;
        self.appearance_counter = self.appearance_counter.wrapping_add(1).max(1);
        self.touch(BlockKind::Appearance);
        Ok(())
    }

    pub fn set_move_speed(&mut self, speed: MoveSpeed) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::MoveSpeed)?;
        self.values.move_speed = speed;
        self.touch(BlockKind::MoveSpeed);
        Ok(())
    }

    /// Plays animation `id`, or stops the current one when `id` is -1.
    pub fn set_sequence(&mut self, id: i32, delay: i32) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::Sequence)?;
        check_range("sequence id", id, -1, 65_535)?;
        let delay = check_u16("sequence delay", delay)?;
        let id = u16::try_from(id).ok();
        self.values.sequence = Sequence { id, delay };
        self.touch(BlockKind::Sequence);
        Ok(())
    }

    /// Faces the avatar at `target`, or clears the facing with `None`.
    pub fn set_face_pathing_entity(&mut self, target: Option<u32>) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::FacePathingEntity)?;
        if let Some(index) = target {
            if index >= FacePathingEntity::UNSET {
                return Err(ExtInfoError::OutOfRange {
                    field: "face target",
                    value: i64::from(index),
                    min: 0,
                    max: i64::from(FacePathingEntity::UNSET - 1),
                });
            }
        }
        self.values.face_pathing = FacePathingEntity { target };
        self.touch(BlockKind::FacePathingEntity);
        Ok(())
    }

    pub fn set_face_angle(&mut self, angle: i32, instant: bool) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::FaceAngle)?;
        check_range("face angle", angle, 0, MAX_ANGLE)?;
        self.values.face_angle = FaceAngle {
            angle: Some(angle as u16),
            instant,
        };
        self.touch(BlockKind::FaceAngle);
        Ok(())
    }

    /// Resets the facing angle to its wire default.
    pub fn clear_face_angle(&mut self) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::FaceAngle)?;
        self.values.face_angle = FaceAngle::default();
        self.touch(BlockKind::FaceAngle);
        Ok(())
    }

    pub fn set_say(&mut self, text: &str) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::Say)?;
        check_text("say", text, self.max_text_chars)?;
        self.values.say.text.clear();
        self.values.say.text.push_str(text);
        self.touch(BlockKind::Say);
        Ok(())
    }

    pub fn set_chat(
        &mut self,
        colour: i32,
        effects: i32,
        mod_icon: i32,
        autotyper: bool,
        text: &str,
    ) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::Chat)?;
        let colour = check_u8("chat colour", colour)?;
        let effects = check_u8("chat effects", effects)?;
        let mod_icon = check_u8("mod icon", mod_icon)?;
        check_text("chat", text, self.max_text_chars)?;
        let chat = &mut self.values.chat;
        chat.colour = colour;
        chat.effects = effects;
        chat.mod_icon = mod_icon;
        chat.autotyper = autotyper;
        chat.text.clear();
        chat.text.push_str(text);
        self.touch(BlockKind::Chat);
        Ok(())
    }

    pub fn set_exact_move(&mut self, exact_move: ExactMove) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::ExactMove)?;
        check_range("exact move direction", i32::from(exact_move.direction), 0, MAX_ANGLE)?;
        self.values.exact_move = exact_move;
        self.touch(BlockKind::ExactMove);
        Ok(())
    }

    /// Sets the graphic in `slot`, replacing any set earlier this tick.
    pub fn set_spot_anim(
        &mut self,
        slot: i32,
        id: i32,
        delay: i32,
        height: i32,
    ) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::SpotAnim)?;
        let entry = SpotAnim {
            slot: check_u8("spotanim slot", slot)?,
            id: check_u16("spotanim id", id)?,
            delay: check_u16("spotanim delay", delay)?,
            height: check_u16("spotanim height", height)?,
        };
        let entries = &mut self.values.spot_anims.entries;
        match entries.iter_mut().find(|existing| existing.slot == entry.slot) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        self.touch(BlockKind::SpotAnim);
        Ok(())
    }

    pub fn add_hitsplat(&mut self, hitsplat: Hitsplat) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::Hit)?;
        check_entries("hitsplats", self.values.hit.hitsplats.len() + 1, MAX_HITS)?;
        self.values.hit.hitsplats.push(hitsplat);
        self.touch(BlockKind::Hit);
        Ok(())
    }

    pub fn add_headbar(&mut self, headbar: Headbar) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::Hit)?;
        check_entries("headbars", self.values.hit.headbars.len() + 1, MAX_HITS)?;
        self.values.hit.headbars.push(headbar);
        self.touch(BlockKind::Hit);
        Ok(())
    }

    /// Sets the tinting every observer sees unless it has its own override.
    pub fn set_tinting(
        &mut self,
        start: i32,
        end: i32,
        hue: i32,
        saturation: i32,
        lightness: i32,
        weight: i32,
    ) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::Tinting)?;
        self.values.tinting = validate_tinting(start, end, hue, saturation, lightness, weight)?;
        self.touch(BlockKind::Tinting);
        Ok(())
    }

    pub fn set_transformation(&mut self, id: Option<u16>) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::Transformation)?;
        self.values.transformation = Transformation { id };
        self.touch(BlockKind::Transformation);
        Ok(())
    }

    pub fn set_base_animation(&mut self, slot: usize, id: Option<u16>) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::BaseAnimationSet)?;
        check_entries("base animation slot", slot + 1, BASE_ANIMATIONS)?;
        self.values.base_animations.overrides[slot] = id;
        self.touch(BlockKind::BaseAnimationSet);
        Ok(())
    }

    pub fn set_visible_ops(&mut self, mask: u8) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::VisibleOps)?;
        check_range("visible ops", i32::from(mask), 0, i32::from(VisibleOps::ALL))?;
        self.values.visible_ops = VisibleOps { mask };
        self.touch(BlockKind::VisibleOps);
        Ok(())
    }

    pub fn set_head_icon(
        &mut self,
        slot: usize,
        sprite: Option<HeadIconSprite>,
    ) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::HeadIcon)?;
        check_entries("head icon slot", slot + 1, HEAD_ICON_SLOTS)?;
        self.values.head_icon.slots[slot] = sprite;
        self.touch(BlockKind::HeadIcon);
        Ok(())
    }

    pub fn set_name(&mut self, name: Option<&str>) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::NameChange)?;
        if let Some(name) = name {
            check_text("name", name, self.max_text_chars)?;
        }
        self.values.name_change.name = name.map(str::to_owned);
        self.touch(BlockKind::NameChange);
        Ok(())
    }

    pub fn set_body_customisation(&mut self, custom: ModelCustomisation) -> ExtInfoResult<()> {
        self.set_customisation(BlockKind::BodyCustomisation, custom)
    }

    pub fn set_head_customisation(&mut self, custom: ModelCustomisation) -> ExtInfoResult<()> {
        self.set_customisation(BlockKind::HeadCustomisation, custom)
    }

    fn set_customisation(
        &mut self,
        kind: BlockKind,
        custom: ModelCustomisation,
    ) -> ExtInfoResult<()> {
        self.ensure_supported(kind)?;
        check_entries("models", custom.models.len(), MAX_MODELS)?;
        check_entries("recolours", custom.recolours.len(), MAX_MODELS)?;
        if kind == BlockKind::BodyCustomisation {
            self.values.body = custom;
        } else {
            self.values.head = custom;
        }
        self.touch(kind);
        Ok(())
    }

    pub fn set_combat_level(&mut self, level: Option<u16>) -> ExtInfoResult<()> {
        self.ensure_supported(BlockKind::CombatLevel)?;
        self.values.combat_level = CombatLevel { level };
        self.touch(BlockKind::CombatLevel);
        Ok(())
    }

    /// Sticky blocks `observer` has not been told about.
    ///
    /// `seen_appearance` is the appearance counter the observer last received
    /// for this avatar. Every other sticky block is stale while it holds a
    /// non-default value. A transformation counts as stale for any id: ids
    /// the client could resolve from its own cache are not told apart.
    #[must_use]
    pub fn stale_flags(&self, seen_appearance: u32) -> InfoFlags {
        let mut stale = InfoFlags::empty();
        if self.appearance_counter > 0 && seen_appearance != self.appearance_counter {
            stale |= InfoFlags::APPEARANCE;
        }
        for kind in BlockKind::ALL {
            if kind.supported_by(self.protocol) && self.values.sticky_non_default(kind) {
                stale |= kind.flag();
            }
        }
        stale
    }

    fn needs_cache(&self, kind: BlockKind) -> bool {
        if kind.is_observer_dependent() || !kind.supported_by(self.protocol) {
            return false;
        }
        if self.flags.contains(kind.flag()) {
            return true;
        }
        match kind {
            BlockKind::Appearance => self.appearance_counter > 0,
            _ => kind.is_sticky() && self.values.sticky_non_default(kind),
        }
    }

    /// Serializes every changed or non-default block once per registered
    /// client. Blocks whose cache already matches their version are skipped.
    ///
    /// Returns the number of blocks serialized.
    pub fn precompute(&mut self, encoders: &ClientEncoders) -> usize {
        self.caches.resize_with(encoders.len(), Default::default);
        let mut serialized = 0;
        for kind in BlockKind::ALL {
            if !self.needs_cache(kind) {
                continue;
            }
            let version = self.versions[kind.index()];
            let Some(block) = self.values.block_ref(kind) else {
                continue;
            };
            for (cache, encoder) in self.caches.iter_mut().zip(encoders.iter()) {
                let entry = &mut cache[kind.index()];
                if entry.version == Some(version) {
                    continue;
                }
                entry.bytes.clear();
                encoder.encode_block(block, &mut entry.bytes);
                entry.version = Some(version);
                serialized += 1;
            }
        }
        serialized
    }

    /// Precomputed bytes of `kind` for the encoder in `slot`, if current.
    #[must_use]
    pub fn precomputed(&self, kind: BlockKind, slot: usize) -> Option<&[u8]> {
        let entry = &self.caches.get(slot)?[kind.index()];
        (entry.version == Some(self.versions[kind.index()])).then_some(entry.bytes.as_slice())
    }

    /// Ends the tick: drops transient values and their caches and clears the
    /// dirty flags. Sticky values and their caches survive.
    pub fn clear_transient(&mut self) {
        for kind in BlockKind::ALL {
            if kind.is_sticky() {
                continue;
            }
            self.values.clear(kind);
            for cache in &mut self.caches {
                let entry = &mut cache[kind.index()];
                entry.version = None;
                entry.bytes.clear();
            }
        }
        self.flags = InfoFlags::empty();
    }

    /// Returns the set to its freshly created state, keeping allocations.
    pub fn reset(&mut self) {
        self.flags = InfoFlags::empty();
        self.appearance_counter = 0;
        self.versions = [0; BlockKind::COUNT];
        self.values = Values::default();
        for cache in &mut self.caches {
            for entry in cache.iter_mut() {
                entry.version = None;
                entry.bytes.clear();
            }
        }
    }
}

/// Validates a tinting request.
pub fn validate_tinting(
    start: i32,
    end: i32,
    hue: i32,
    saturation: i32,
    lightness: i32,
    weight: i32,
) -> ExtInfoResult<Tinting> {
    let start = check_u16("tint start", start)?;
    let end = check_u16("tint end", end)?;
    check_range("tint end", i32::from(end), i32::from(start), 65_535)?;
    Ok(Tinting {
        start,
        end,
        hue: check_u8("hue", hue)?,
        saturation: check_u8("saturation", saturation)?,
        lightness: check_u8("lightness", lightness)?,
        weight: check_u8("weight", weight)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> ExtendedInfo {
        ExtendedInfo::new(InfoProtocol::Player)
    }

    #[test]
    fn mutators_set_flags_and_versions() {
        let mut info = player();
        info.set_sequence(808, 0).unwrap();
        info.set_say("hello").unwrap();
        assert_eq!(info.flags(), InfoFlags::SEQUENCE | InfoFlags::SAY);
        assert_eq!(info.version(BlockKind::Sequence), 1);
        assert_eq!(info.version(BlockKind::Appearance), 0);
    }

    #[test]
    fn rejected_input_leaves_state_untouched() {
        let mut info = player();
        assert!(matches!(
            info.set_sequence(70_000, 0),
            Err(ExtInfoError::OutOfRange { .. })
        ));
        assert!(matches!(
            info.set_say(&"a".repeat(81)),
            Err(ExtInfoError::TextTooLong { max: 80, .. })
        ));
        assert!(info.set_tinting(0, 10, 256, 0, 0, 0).is_err());
        assert!(info.set_tinting(10, 5, 0, 0, 0, 0).is_err());
        assert!(info.set_face_angle(2048, false).is_err());
        assert!(info.flags().is_empty());
    }

    #[test]
    fn sequence_minus_one_stops_animation() {
        let mut info = player();
        info.set_sequence(-1, 0).unwrap();
        let Some(BlockRef::Sequence(sequence)) = info.block(BlockKind::Sequence) else {
            panic!("sequence block");
        };
        assert_eq!(sequence.id, None);
        assert!(info.set_sequence(-2, 0).is_err());
    }

    #[test]
    fn npc_accepts_longer_text_but_not_chat() {
        let mut npc = ExtendedInfo::new(InfoProtocol::Npc);
        npc.set_say(&"a".repeat(256)).unwrap();
        assert!(npc.set_say(&"a".repeat(257)).is_err());
        assert!(matches!(
            npc.set_chat(0, 0, 0, false, "hi"),
            Err(ExtInfoError::Unsupported { .. })
        ));
        let mut world = ExtendedInfo::new(InfoProtocol::WorldEntity);
        assert!(world.set_say("hi").is_err());
        world.set_sequence(1, 0).unwrap();
    }

    #[test]
    fn spot_anims_replace_by_slot() {
        let mut info = player();
        info.set_spot_anim(1, 100, 0, 0).unwrap();
        info.set_spot_anim(1, 200, 0, 0).unwrap();
        info.set_spot_anim(2, 300, 0, 0).unwrap();
        let Some(BlockRef::SpotAnim(list)) = info.block(BlockKind::SpotAnim) else {
            panic!("spotanim block");
        };
        assert_eq!(list.entries.len(), 2);
        assert_eq!(list.entries[0].id, 200);
    }

    #[test]
    fn precompute_serializes_once_per_version() {
        let encoders = ClientEncoders::standard();
        let mut info = player();
        info.set_sequence(1, 0).unwrap();
        assert_eq!(info.precompute(&encoders), 2);
        assert_eq!(info.precompute(&encoders), 0);
        assert!(info.precomputed(BlockKind::Sequence, 0).is_some());
        assert!(info.precomputed(BlockKind::Sequence, 1).is_some());
        assert!(info.precomputed(BlockKind::Sequence, 2).is_none());
        assert!(info.precomputed(BlockKind::Say, 0).is_none());
    }

    #[test]
    fn observer_blocks_are_never_cached() {
        let encoders = ClientEncoders::standard();
        let mut info = player();
        info.set_tinting(0, 10, 1, 2, 3, 4).unwrap();
        assert_eq!(info.precompute(&encoders), 0);
        assert!(info.flags().contains(InfoFlags::TINTING));
    }

    #[test]
    fn sticky_caches_survive_tick_end() {
        let encoders = ClientEncoders::standard();
        let mut info = player();
        info.set_move_speed(MoveSpeed::Run).unwrap();
        info.set_say("bye").unwrap();
        info.precompute(&encoders);
        info.clear_transient();
        assert!(info.flags().is_empty());
        assert!(info.precomputed(BlockKind::MoveSpeed, 0).is_some());
        assert!(info.precomputed(BlockKind::Say, 0).is_none());
        // unchanged sticky value is not serialized again
        assert_eq!(info.precompute(&encoders), 0);
    }

    #[test]
    fn stale_flags_track_appearance_counter_and_defaults() {
        let mut info = player();
        assert!(info.stale_flags(0).is_empty());
        info.set_appearance(Appearance::default()).unwrap();
        assert_eq!(info.appearance_change_counter(), 1);
        assert_eq!(info.stale_flags(0), InfoFlags::APPEARANCE);
        assert!(info.stale_flags(1).is_empty());
        info.set_face_angle(512, false).unwrap();
        assert_eq!(info.stale_flags(1), InfoFlags::FACE_ANGLE);
        info.set_move_speed(MoveSpeed::Walk).unwrap();
        assert_eq!(info.stale_flags(1), InfoFlags::FACE_ANGLE);
    }

    #[test]
    fn npc_sticky_blocks_are_stale_when_set() {
        let mut npc = ExtendedInfo::new(InfoProtocol::Npc);
        npc.set_combat_level(Some(99)).unwrap();
        npc.set_visible_ops(0b1).unwrap();
        assert_eq!(
            npc.stale_flags(0),
            InfoFlags::COMBAT_LEVEL | InfoFlags::VISIBLE_OPS
        );
        assert!(npc.set_visible_ops(0xFF).is_err());
        assert!(npc.set_head_icon(HEAD_ICON_SLOTS, None).is_err());
    }

    #[test]
    fn any_transformation_is_stale_until_cleared() {
        let mut npc = ExtendedInfo::new(InfoProtocol::Npc);
        for id in [0, 1, u16::MAX] {
            npc.set_transformation(Some(id)).unwrap();
            assert_eq!(npc.stale_flags(0), InfoFlags::TRANSFORMATION);
        }
        npc.set_transformation(None).unwrap();
        assert!(npc.stale_flags(0).is_empty());
    }

    #[test]
    fn reset_forgets_everything() {
        let encoders = ClientEncoders::standard();
        let mut info = player();
        info.set_appearance(Appearance::default()).unwrap();
        info.precompute(&encoders);
        info.reset();
        assert_eq!(info.appearance_change_counter(), 0);
        assert!(info.flags().is_empty());
        assert!(info.precomputed(BlockKind::Appearance, 0).is_none());
    }

    #[test]
    fn hit_lists_are_bounded() {
        let mut info = player();
        let splat = Hitsplat {
            source: None,
            self_type: 0,
            other_type: 0,
            value: 1,
            delay: 0,
        };
        for _ in 0..MAX_HITS {
            info.add_hitsplat(splat).unwrap();
        }
        assert!(matches!(
            info.add_hitsplat(splat),
            Err(ExtInfoError::TooManyEntries { .. })
        ));
        info.clear_transient();
        assert!(info.hit().hitsplats.is_empty());
    }
}
