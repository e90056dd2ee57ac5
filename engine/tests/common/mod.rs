//! A client-side mirror of the info packet, used to walk encoded buffers.

#![allow(dead_code)]

use bitstream::BitReader;
use engine::{EngineConfig, InfoEngine, ObserverId, WorldId};
use extinfo::{read_flag_header, Appearance, BlockKind, ClientEncoders, ClientType, InfoFlags};
use wire::{
    decode_high_res, read_skip_run, InfoProtocol, MovementDelta, EXTENDED_INFO_TERMINATOR,
    PROMOTION_COORD_BITS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Moved {
        index: u16,
        delta: Option<MovementDelta>,
        extended: bool,
    },
    Removed {
        index: u16,
    },
    Promoted {
        index: u16,
        low_res_opcode: Option<u32>,
        x: u32,
        z: u32,
        extended: bool,
    },
    LowResMoved {
        index: u16,
        opcode: u32,
    },
}

/// One extended-info record: `None` flags for a deferred record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub index: u16,
    pub flags: Option<InfoFlags>,
    pub blocks: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Decoded {
    pub events: Vec<Event>,
    pub skipped: usize,
    pub records: Vec<Record>,
}

impl Decoded {
    pub fn promoted(&self) -> Vec<u16> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Promoted { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn removed(&self) -> Vec<u16> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Removed { index } => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn record(&self, index: u16) -> Option<&Record> {
        self.records.iter().find(|record| record.index == index)
    }
}

/// Tracks what a client knows: high-resolution membership and last tick's
/// stationary flags.
#[derive(Debug, Clone)]
pub struct ClientMirror {
    high_res: Vec<bool>,
    was_stationary: Vec<bool>,
    local: Option<u16>,
}

impl ClientMirror {
    pub fn new(capacity: usize, local: Option<u16>) -> Self {
        let mut high_res = vec![false; capacity];
        if let Some(index) = local {
            high_res[usize::from(index)] = true;
        }
        Self {
            high_res,
            was_stationary: vec![false; capacity],
            local,
        }
    }

    pub fn is_high_res(&self, index: u16) -> bool {
        self.high_res[usize::from(index)]
    }

    /// High-resolution entries, own avatar excluded.
    pub fn high_res_count(&self) -> usize {
        self.high_res
            .iter()
            .enumerate()
            .filter(|&(i, high)| *high && self.local != Some(i as u16))
            .count()
    }

    pub fn high_res_indices(&self) -> Vec<u16> {
        (0..self.high_res.len())
            .filter(|&i| self.high_res[i])
            .map(|i| i as u16)
            .collect()
    }

    pub fn decode(&mut self, packet: &[u8]) -> Decoded {
        let capacity = self.high_res.len();
        let high: Vec<u16> = (0..capacity)
            .filter(|&i| self.high_res[i])
            .map(|i| i as u16)
            .collect();
        let low: Vec<u16> = (0..capacity)
            .filter(|&i| !self.high_res[i] && self.local != Some(i as u16))
            .map(|i| i as u16)
            .collect();

        let mut reader = BitReader::new(packet);
        let mut skipped = vec![false; capacity];
        let mut decoded = Decoded::default();
        let mut queue = Vec::new();
        for stationary in [true, false] {
            self.high_pass(&mut reader, &high, stationary, &mut skipped, &mut decoded, &mut queue);
        }
        for stationary in [false, true] {
            self.low_pass(&mut reader, &low, stationary, &mut skipped, &mut decoded, &mut queue);
        }
        if !queue.is_empty() {
            assert_eq!(reader.read_bits(16).unwrap(), EXTENDED_INFO_TERMINATOR);
        }
        reader.align_to_byte().unwrap();

        let mut offset = reader.bit_position() / 8;
        for index in queue {
            let (flags, header) = read_flag_header(&packet[offset..]).expect("record header");
            if flags.is_empty() {
                decoded.records.push(Record {
                    index,
                    flags: None,
                    blocks: Vec::new(),
                });
                offset += header;
                continue;
            }
            let start = offset + header;
            let len = desktop_blocks_len(flags, &packet[start..]);
            decoded.records.push(Record {
                index,
                flags: Some(flags),
                blocks: packet[start..start + len].to_vec(),
            });
            offset = start + len;
        }
        assert_eq!(offset, packet.len(), "trailing bytes after records");
        self.was_stationary = skipped;
        decoded
    }

    /// Consumes one skip-run step. Returns `true` if `index` was skipped.
    fn skip(
        reader: &mut BitReader<'_>,
        run: &mut u32,
        index: u16,
        skipped: &mut [bool],
        decoded: &mut Decoded,
    ) -> bool {
        if *run == 0 {
            if reader.read_bool().unwrap() {
                return false;
            }
            *run = read_skip_run(reader).unwrap();
        }
        *run -= 1;
        skipped[usize::from(index)] = true;
        decoded.skipped += 1;
        true
    }

    fn high_pass(
        &mut self,
        reader: &mut BitReader<'_>,
        indices: &[u16],
        stationary: bool,
        skipped: &mut [bool],
        decoded: &mut Decoded,
        queue: &mut Vec<u16>,
    ) {
        let mut run = 0;
        for &index in indices {
            if self.was_stationary[usize::from(index)] != stationary {
                continue;
            }
            if Self::skip(reader, &mut run, index, skipped, decoded) {
                continue;
            }
            let extended = reader.read_bool().unwrap();
            let delta = decode_high_res(reader).unwrap();
            if !extended && delta.is_none() {
                assert!(!reader.read_bool().unwrap(), "low-res update after removal");
                self.high_res[usize::from(index)] = false;
                decoded.events.push(Event::Removed { index });
                continue;
            }
            if extended {
                queue.push(index);
            }
            decoded.events.push(Event::Moved {
                index,
                delta,
                extended,
            });
        }
        assert_eq!(run, 0, "skip run crossed a pass");
    }

    fn low_pass(
        &mut self,
        reader: &mut BitReader<'_>,
        indices: &[u16],
        stationary: bool,
        skipped: &mut [bool],
        decoded: &mut Decoded,
        queue: &mut Vec<u16>,
    ) {
        let mut run = 0;
        for &index in indices {
            if self.was_stationary[usize::from(index)] != stationary {
                continue;
            }
            if Self::skip(reader, &mut run, index, skipped, decoded) {
                continue;
            }
            let opcode = reader.read_bits(2).unwrap();
            if opcode != 0 {
                skip_low_res_body(reader, opcode);
                decoded.events.push(Event::LowResMoved { index, opcode });
                continue;
            }
            let low_res_opcode = reader.read_bool().unwrap().then(|| {
                let opcode = reader.read_bits(2).unwrap();
                skip_low_res_body(reader, opcode);
                opcode
            });
            let x = reader.read_bits(PROMOTION_COORD_BITS).unwrap();
            let z = reader.read_bits(PROMOTION_COORD_BITS).unwrap();
            let extended = reader.read_bool().unwrap();
            self.high_res[usize::from(index)] = true;
            if extended {
                queue.push(index);
            }
            decoded.events.push(Event::Promoted {
                index,
                low_res_opcode,
                x,
                z,
                extended,
            });
        }
        assert_eq!(run, 0, "skip run crossed a pass");
    }
}

fn skip_low_res_body(reader: &mut BitReader<'_>, opcode: u32) {
    reader.read_bits(2).unwrap();
    match opcode {
        1 => {}
        2 => {
            reader.read_bits(3).unwrap();
        }
        3 => {
            reader.read_bits(16).unwrap();
        }
        _ => panic!("invalid low-res opcode {opcode}"),
    }
}

fn text_len(bytes: &[u8]) -> usize {
    if bytes[0] < 0x80 {
        1 + usize::from(bytes[0])
    } else {
        2 + usize::from(u16::from_be_bytes([bytes[0], bytes[1]]) & 0x7FFF)
    }
}

/// Length of the desktop blocks following a record header. Covers the blocks
/// these tests send.
fn desktop_blocks_len(flags: InfoFlags, bytes: &[u8]) -> usize {
    let mut pos = 0;
    for kind in BlockKind::ALL {
        if !flags.contains(kind.flag()) {
            continue;
        }
        let rest = &bytes[pos..];
        pos += match kind {
            BlockKind::Appearance => {
                let bits = rest[0];
                let mut len = 1;
                len += usize::from(bits & 0x4 != 0) + usize::from(bits & 0x8 != 0);
                len += if bits & 0x10 != 0 { 2 } else { 24 };
                len += 5 + 14;
                len += text_len(&rest[len..]);
                len + 3
            }
            BlockKind::MoveSpeed | BlockKind::VisibleOps => 1,
            BlockKind::Sequence => 4,
            BlockKind::FacePathingEntity | BlockKind::FaceAngle => 3,
            BlockKind::Say | BlockKind::NameChange => text_len(rest),
            BlockKind::Chat => 4 + text_len(&rest[4..]),
            BlockKind::ExactMove => 10,
            BlockKind::SpotAnim => 2 + 7 * usize::from(u16::from_be_bytes([rest[0], rest[1]])),
            BlockKind::Hit => {
                let splats = 1 + 6 * usize::from(rest[0]);
                splats + 1 + 8 * usize::from(rest[splats])
            }
            BlockKind::Tinting => 8,
            BlockKind::Transformation | BlockKind::CombatLevel => 2,
            other => panic!("{other:?} is not decoded by the test mirror"),
        };
    }
    pos
}

pub fn engine(protocol: InfoProtocol) -> InfoEngine {
    engine_with(EngineConfig::for_testing(protocol))
}

pub fn engine_with(config: EngineConfig) -> InfoEngine {
    InfoEngine::new(config, ClientEncoders::standard()).unwrap()
}

pub fn spawn(engine: &mut InfoEngine, index: u16, x: i32, z: i32) {
    engine
        .allocate_avatar(index)
        .unwrap()
        .update_coord(0, x, z)
        .unwrap();
}

pub fn move_to(engine: &mut InfoEngine, index: u16, x: i32, z: i32) {
    engine
        .avatar_mut(index)
        .unwrap()
        .update_coord(0, x, z)
        .unwrap();
}

/// Gives `index` a new appearance named `name`.
pub fn dress(engine: &mut InfoEngine, index: u16, name: &str) {
    engine
        .avatar_mut(index)
        .unwrap()
        .extended_info_mut()
        .set_appearance(Appearance {
            name: name.to_owned(),
            combat_level: 3,
            ..Appearance::default()
        })
        .unwrap();
}

/// Allocates a desktop observer whose own avatar is `local`.
pub fn observe(engine: &mut InfoEngine, local: u16) -> (ObserverId, ClientMirror) {
    let id = ObserverId(u32::from(local));
    engine
        .allocate_observer(id, ClientType::Desktop, Some(local))
        .unwrap();
    let mirror = ClientMirror::new(engine.revision().capacity, Some(local));
    (id, mirror)
}

/// Runs a full tick and decodes the root packet of every observer.
pub fn tick(engine: &mut InfoEngine, observers: &mut [(ObserverId, &mut ClientMirror)]) -> Vec<Decoded> {
    engine.tick().unwrap();
    let decoded = observers
        .iter_mut()
        .map(|(id, mirror)| mirror.decode(engine.packet(*id, WorldId::ROOT).unwrap()))
        .collect();
    engine.post_update();
    decoded
}

/// Runs a full tick for one observer.
pub fn tick_one(engine: &mut InfoEngine, id: ObserverId, mirror: &mut ClientMirror) -> Decoded {
    tick(engine, &mut [(id, mirror)]).remove(0)
}
