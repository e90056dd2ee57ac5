//! Client-specific block serialization.
//!
//! Client variants share semantics and differ only in byte order and the order
//! in which blocks follow the flag header. One [`ExtendedInfoEncoder`] is
//! registered per [`ClientType`] in a [`ClientEncoders`] registry; every
//! avatar keeps one precompute cache per registered encoder.

use std::fmt;
use std::sync::Arc;

use crate::blocks::{
    Appearance, BaseAnimationSet, Chat, CombatLevel, ExactMove, FaceAngle, FacePathingEntity,
    HeadIcon, Hit, ModelCustomisation, MoveSpeed, NameChange, Say, Sequence, SpotAnimList,
    Tinting, Transformation, VisibleOps,
};
use crate::error::{ExtInfoError, ExtInfoResult};
use crate::flags::{BlockKind, InfoFlags};

/// Client build an observer is connected with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ClientType {
    Desktop,
    Mobile,
}

/// Borrowed view of one observer-independent block.
#[derive(Debug, Clone, Copy)]
pub enum BlockRef<'a> {
    Appearance(&'a Appearance),
    MoveSpeed(MoveSpeed),
    Sequence(Sequence),
    FacePathingEntity(FacePathingEntity),
    FaceAngle(FaceAngle),
    Say(&'a Say),
    Chat(&'a Chat),
    ExactMove(ExactMove),
    SpotAnim(&'a SpotAnimList),
    Transformation(Transformation),
    BaseAnimationSet(BaseAnimationSet),
    VisibleOps(VisibleOps),
    HeadIcon(HeadIcon),
    NameChange(&'a NameChange),
    BodyCustomisation(&'a ModelCustomisation),
    HeadCustomisation(&'a ModelCustomisation),
    CombatLevel(CombatLevel),
}

impl BlockRef<'_> {
    /// The block this view belongs to.
    #[must_use]
    pub const fn kind(&self) -> BlockKind {
        match self {
            Self::Appearance(_) => BlockKind::Appearance,
            Self::MoveSpeed(_) => BlockKind::MoveSpeed,
            Self::Sequence(_) => BlockKind::Sequence,
            Self::FacePathingEntity(_) => BlockKind::FacePathingEntity,
            Self::FaceAngle(_) => BlockKind::FaceAngle,
            Self::Say(_) => BlockKind::Say,
            Self::Chat(_) => BlockKind::Chat,
            Self::ExactMove(_) => BlockKind::ExactMove,
            Self::SpotAnim(_) => BlockKind::SpotAnim,
            Self::Transformation(_) => BlockKind::Transformation,
            Self::BaseAnimationSet(_) => BlockKind::BaseAnimationSet,
            Self::VisibleOps(_) => BlockKind::VisibleOps,
            Self::HeadIcon(_) => BlockKind::HeadIcon,
            Self::NameChange(_) => BlockKind::NameChange,
            Self::BodyCustomisation(_) => BlockKind::BodyCustomisation,
            Self::HeadCustomisation(_) => BlockKind::HeadCustomisation,
            Self::CombatLevel(_) => BlockKind::CombatLevel,
        }
    }
}

/// Borrowed view of a block whose bytes depend on the observer.
#[derive(Debug, Clone, Copy)]
pub enum ObserverBlock<'a> {
    /// Hits on an avatar, as seen by one observer.
    Hit {
        hit: &'a Hit,
        /// The observer's own avatar index, if it has one.
        observer: Option<u32>,
        /// The hit avatar is the observer's own avatar.
        own_avatar: bool,
    },
    /// Tinting chosen for this observer.
    Tinting(&'a Tinting),
}

/// Huffman-style text compression, supplied by the game.
pub trait TextCompressor: Send + Sync {
    /// Appends the compressed form of `text` to `out`.
    fn compress(&self, text: &str, out: &mut Vec<u8>);
}

/// Stores text uncompressed behind a one or two byte length prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawTextCompressor;

impl TextCompressor for RawTextCompressor {
    fn compress(&self, text: &str, out: &mut Vec<u8>) {
        let bytes = text.as_bytes();
        let len = bytes.len().min(0x7FFF);
        if len < 0x80 {
            out.push(len as u8);
        } else {
            out.extend_from_slice(&(0x8000 | len as u16).to_be_bytes());
        }
        out.extend_from_slice(&bytes[..len]);
    }
}

/// Serializes extended-info records for one client type.
///
/// Encoding is infallible: every value reaching an encoder was validated by
/// the mutator that stored it.
pub trait ExtendedInfoEncoder: Send + Sync {
    /// Client type this encoder serves.
    fn client(&self) -> ClientType;

    /// Order in which blocks follow the flag header.
    fn block_order(&self) -> &[BlockKind];

    /// Writes the record header for `flags`.
    fn encode_flags(&self, flags: InfoFlags, out: &mut Vec<u8>);

    /// Writes one observer-independent block.
    fn encode_block(&self, block: BlockRef<'_>, out: &mut Vec<u8>);

    /// Writes one observer-dependent block.
    fn encode_observer_block(&self, block: ObserverBlock<'_>, out: &mut Vec<u8>);
}

/// Writes `flags` seven bits per byte, low bits first, with bit 7 set on every
/// byte but the last. A non-empty set never starts with a zero byte.
pub fn write_flag_header(flags: InfoFlags, out: &mut Vec<u8>) {
    let mut rest = flags.bits();
    loop {
        let byte = (rest & 0x7F) as u8;
        rest >>= 7;
        if rest == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Reads a header written by [`write_flag_header`].
///
/// Returns the flags and the number of bytes consumed, or `None` if `bytes`
/// ends mid-header.
#[must_use]
pub fn read_flag_header(bytes: &[u8]) -> Option<(InfoFlags, usize)> {
    let mut bits = 0u32;
    for (i, byte) in bytes.iter().enumerate().take(5) {
        bits |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((InfoFlags::from_bits_retain(bits), i + 1));
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Big,
    Little,
}

struct Sink<'a> {
    out: &'a mut Vec<u8>,
    order: ByteOrder,
}

impl Sink<'_> {
    fn u8(&mut self, value: u8) {
        self.out.push(value);
    }

    fn i8(&mut self, value: i8) {
        self.out.push(value as u8);
    }

    fn u16(&mut self, value: u16) {
        match self.order {
            ByteOrder::Big => self.out.extend_from_slice(&value.to_be_bytes()),
            ByteOrder::Little => self.out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    fn u24(&mut self, value: u32) {
        let bytes = value.to_be_bytes();
        match self.order {
            ByteOrder::Big => self.out.extend_from_slice(&bytes[1..]),
            ByteOrder::Little => self.out.extend_from_slice(&[bytes[3], bytes[2], bytes[1]]),
        }
    }

    fn u32(&mut self, value: u32) {
        match self.order {
            ByteOrder::Big => self.out.extend_from_slice(&value.to_be_bytes()),
            ByteOrder::Little => self.out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    fn opt_u16(&mut self, value: Option<u16>) {
        self.u16(value.unwrap_or(u16::MAX));
    }

    /// One-byte presence mask over `values`, then each present value.
    fn masked<T: Copy>(&mut self, values: &[Option<T>], mut write: impl FnMut(&mut Self, T)) {
        let mask = values
            .iter()
            .enumerate()
            .filter(|(_, value)| value.is_some())
            .fold(0u8, |acc, (i, _)| acc | (1 << i));
        self.u8(mask);
        for value in values.iter().flatten() {
            write(self, *value);
        }
    }
}

const DESKTOP_ORDER: [BlockKind; BlockKind::COUNT] = BlockKind::ALL;

const MOBILE_ORDER: [BlockKind; BlockKind::COUNT] = [
    BlockKind::Hit,
    BlockKind::Tinting,
    BlockKind::Sequence,
    BlockKind::SpotAnim,
    BlockKind::ExactMove,
    BlockKind::FacePathingEntity,
    BlockKind::FaceAngle,
    BlockKind::MoveSpeed,
    BlockKind::Appearance,
    BlockKind::Say,
    BlockKind::Chat,
    BlockKind::Transformation,
    BlockKind::CombatLevel,
    BlockKind::NameChange,
    BlockKind::VisibleOps,
    BlockKind::HeadIcon,
    BlockKind::BaseAnimationSet,
    BlockKind::BodyCustomisation,
    BlockKind::HeadCustomisation,
];

/// Encoder used by the stock desktop and mobile clients.
pub struct StandardEncoder {
    client: ClientType,
    order: &'static [BlockKind],
    byte_order: ByteOrder,
    text: Arc<dyn TextCompressor>,
}

impl fmt::Debug for StandardEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardEncoder")
            .field("client", &self.client)
            .field("byte_order", &self.byte_order)
            .finish_non_exhaustive()
    }
}

impl StandardEncoder {
    /// Desktop client: big-endian, blocks in flag order.
    #[must_use]
    pub fn desktop(text: Arc<dyn TextCompressor>) -> Self {
        Self {
            client: ClientType::Desktop,
            order: &DESKTOP_ORDER,
            byte_order: ByteOrder::Big,
            text,
        }
    }

    /// Mobile client: little-endian, observer blocks first.
    #[must_use]
    pub fn mobile(text: Arc<dyn TextCompressor>) -> Self {
        Self {
            client: ClientType::Mobile,
            order: &MOBILE_ORDER,
            byte_order: ByteOrder::Little,
            text,
        }
    }

    fn sink<'a>(&self, out: &'a mut Vec<u8>) -> Sink<'a> {
        Sink {
            out,
            order: self.byte_order,
        }
    }

    fn appearance(&self, value: &Appearance, out: &mut Vec<u8>) {
        let mut sink = self.sink(out);
        let mut bits = u8::from(value.female) | (u8::from(value.hidden) << 1);
        bits |= u8::from(value.skull_icon.is_some()) << 2;
        bits |= u8::from(value.overhead_icon.is_some()) << 3;
        bits |= u8::from(value.transformed_npc.is_some()) << 4;
        sink.u8(bits);
        if let Some(icon) = value.skull_icon {
            sink.u8(icon);
        }
        if let Some(icon) = value.overhead_icon {
            sink.u8(icon);
        }
        if let Some(npc) = value.transformed_npc {
            sink.u16(npc);
        } else {
            for part in value.body {
                sink.u16(part);
            }
        }
        for colour in value.colours {
            sink.u8(colour);
        }
        for animation in value.animations {
            sink.u16(animation);
        }
        self.text.compress(&value.name, out);
        let mut sink = self.sink(out);
        sink.u8(value.combat_level);
        sink.u16(value.skill_level);
    }

    fn customisation(&self, value: &ModelCustomisation, out: &mut Vec<u8>) {
        let mut sink = self.sink(out);
        sink.u8(value.models.len() as u8);
        for model in &value.models {
            sink.u16(*model);
        }
        sink.u8(value.recolours.len() as u8);
        for (from, to) in &value.recolours {
            sink.u16(*from);
            sink.u16(*to);
        }
    }

    fn exact_move(&self, value: ExactMove, out: &mut Vec<u8>) {
        let mut sink = self.sink(out);
        sink.i8(value.first_dx);
        sink.i8(value.first_dz);
        sink.i8(value.second_dx);
        sink.i8(value.second_dz);
        sink.u16(value.first_delay);
        sink.u16(value.second_delay);
        sink.u16(value.direction);
    }
}

impl ExtendedInfoEncoder for StandardEncoder {
    fn client(&self) -> ClientType {
        self.client
    }

    fn block_order(&self) -> &[BlockKind] {
        self.order
    }

    fn encode_flags(&self, flags: InfoFlags, out: &mut Vec<u8>) {
        write_flag_header(flags, out);
    }

    fn encode_block(&self, block: BlockRef<'_>, out: &mut Vec<u8>) {
        match block {
            BlockRef::Appearance(value) => self.appearance(value, out),
            BlockRef::MoveSpeed(value) => self.sink(out).u8(value as u8),
            BlockRef::Sequence(value) => {
                let mut sink = self.sink(out);
                sink.opt_u16(value.id);
                sink.u16(value.delay);
            }
            BlockRef::FacePathingEntity(value) => self.sink(out).u24(value.wire_value()),
            BlockRef::FaceAngle(value) => {
                let mut sink = self.sink(out);
                sink.opt_u16(value.angle);
                sink.u8(u8::from(value.instant));
            }
            BlockRef::Say(value) => self.text.compress(&value.text, out),
            BlockRef::Chat(value) => {
                let mut sink = self.sink(out);
                sink.u8(value.colour);
                sink.u8(value.effects);
                sink.u8(value.mod_icon);
                sink.u8(u8::from(value.autotyper));
                self.text.compress(&value.text, out);
            }
            BlockRef::ExactMove(value) => self.exact_move(value, out),
            BlockRef::SpotAnim(value) => {
                let mut sink = self.sink(out);
                sink.u16(value.entries.len() as u16);
                for entry in &value.entries {
                    sink.u8(entry.slot);
                    sink.u16(entry.id);
                    sink.u16(entry.delay);
                    sink.u16(entry.height);
                }
            }
            BlockRef::Transformation(value) => self.sink(out).opt_u16(value.id),
            BlockRef::BaseAnimationSet(value) => {
                self.sink(out).masked(&value.overrides, |sink, id| sink.u16(id));
            }
            BlockRef::VisibleOps(value) => self.sink(out).u8(value.mask),
            BlockRef::HeadIcon(value) => {
                self.sink(out).masked(&value.slots, |sink, sprite| {
                    sink.u32(sprite.group);
                    sink.u16(sprite.index);
                });
            }
            BlockRef::NameChange(value) => {
                self.text.compress(value.name.as_deref().unwrap_or_default(), out);
            }
            BlockRef::BodyCustomisation(value) | BlockRef::HeadCustomisation(value) => {
                self.customisation(value, out);
            }
            BlockRef::CombatLevel(value) => self.sink(out).opt_u16(value.level),
        }
    }

    fn encode_observer_block(&self, block: ObserverBlock<'_>, out: &mut Vec<u8>) {
        let mut sink = self.sink(out);
        match block {
            ObserverBlock::Hit {
                hit,
                observer,
                own_avatar,
            } => {
                sink.u8(hit.hitsplats.len() as u8);
                for splat in &hit.hitsplats {
                    let own = Hit::is_self_view(observer, own_avatar, splat.source);
                    sink.u16(if own { splat.self_type } else { splat.other_type });
                    sink.u16(splat.value);
                    sink.u16(splat.delay);
                }
                sink.u8(hit.headbars.len() as u8);
                for bar in &hit.headbars {
                    let own = Hit::is_self_view(observer, own_avatar, bar.source);
                    sink.u16(if own { bar.self_type } else { bar.other_type });
                    sink.u8(bar.start_fill);
                    sink.u8(bar.end_fill);
                    sink.u16(bar.start_time);
                    sink.u16(bar.end_time);
                }
            }
            ObserverBlock::Tinting(value) => {
                sink.u16(value.start);
                sink.u16(value.end);
                sink.u8(value.hue);
                sink.u8(value.saturation);
                sink.u8(value.lightness);
                sink.u8(value.weight);
            }
        }
    }
}

/// Registered encoders, one per client type.
///
/// The position of an encoder in the registry is its slot; avatars index their
/// precompute caches by slot.
#[derive(Clone, Default)]
pub struct ClientEncoders {
    encoders: Vec<Arc<dyn ExtendedInfoEncoder>>,
}

impl fmt::Debug for ClientEncoders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.encoders.iter().map(|encoder| encoder.client()))
            .finish()
    }
}

impl ClientEncoders {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Desktop and mobile encoders storing text uncompressed.
    #[must_use]
    pub fn standard() -> Self {
        let text: Arc<dyn TextCompressor> = Arc::new(RawTextCompressor);
        let desktop: Arc<dyn ExtendedInfoEncoder> =
            Arc::new(StandardEncoder::desktop(Arc::clone(&text)));
        let mobile: Arc<dyn ExtendedInfoEncoder> = Arc::new(StandardEncoder::mobile(text));
        Self {
            encoders: vec![desktop, mobile],
        }
    }

    /// Registers an encoder and returns its slot.
    pub fn register(&mut self, encoder: Arc<dyn ExtendedInfoEncoder>) -> ExtInfoResult<usize> {
        let client = encoder.client();
        if self.slot(client).is_some() {
            return Err(ExtInfoError::DuplicateEncoder { client });
        }
        self.encoders.push(encoder);
        Ok(self.encoders.len() - 1)
    }

    /// Slot of the encoder serving `client`.
    #[must_use]
    pub fn slot(&self, client: ClientType) -> Option<usize> {
        self.encoders
            .iter()
            .position(|encoder| encoder.client() == client)
    }

    /// Encoder in `slot`.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&dyn ExtendedInfoEncoder> {
        self.encoders.get(slot).map(AsRef::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }

    /// Iterates encoders in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn ExtendedInfoEncoder> {
        self.encoders.iter().map(AsRef::as_ref)
    }
}
