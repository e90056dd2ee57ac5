//! High- and low-resolution movement opcodes.
//!
//! High resolution (per-tick tracking), after a 2-bit opcode:
//!
//! | opcode | meaning | payload |
//! |---|---|---|
//! | 0 | no movement | - |
//! | 1 | walk | 3-bit direction |
//! | 2 | run | 4-bit direction |
//! | 3 | teleport | 1-bit large flag, 2-bit level delta, 5+5 or 14+14 bit signed x/z |
//!
//! Low resolution (coarse tracking), after a 2-bit opcode:
//!
//! | opcode | meaning | payload |
//! |---|---|---|
//! | 1 | level change | 2-bit level delta |
//! | 2 | adjacent region | 2-bit level delta, 3-bit direction |
//! | 3 | arbitrary | 2-bit level delta, 8-bit x delta, 8-bit z delta |

use bitstream::{BitReader, PackedBits};

use crate::coord::{CoordGrid, LowResolutionPosition};
use crate::error::{WireError, WireResult};

/// Opcode for "no movement" (or, after a cleared extended-info bit, removal).
pub const OPCODE_NONE: u32 = 0;
/// Opcode for a single-tile step.
pub const OPCODE_WALK: u32 = 1;
/// Opcode for a two-tile step.
pub const OPCODE_RUN: u32 = 2;
/// Opcode for a teleport.
pub const OPCODE_TELEPORT: u32 = 3;

/// Bits used by every movement opcode.
pub const OPCODE_BITS: u8 = 2;
/// Absolute delta at or above which a teleport uses the large form.
pub const LARGE_TELEPORT_THRESHOLD: i32 = 16;

const WALK_DELTAS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

const RUN_DELTAS: [(i32, i32); 16] = [
    (-2, -2),
    (-1, -2),
    (0, -2),
    (1, -2),
    (2, -2),
    (-2, -1),
    (2, -1),
    (-2, 0),
    (2, 0),
    (-2, 1),
    (2, 1),
    (-2, 2),
    (-1, 2),
    (0, 2),
    (1, 2),
    (2, 2),
];

/// A decoded movement delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementDelta {
    /// Level delta (wraps mod 4 when applied).
    pub level: i32,
    /// X delta.
    pub x: i32,
    /// Z delta.
    pub z: i32,
}

impl MovementDelta {
    /// Applies the delta to a grid coordinate.
    #[must_use]
    pub const fn apply(self, coord: CoordGrid) -> CoordGrid {
        coord.translate_wrapping(self.level, self.x, self.z)
    }

    /// Applies the delta to a low-resolution position.
    #[must_use]
    pub const fn apply_low(self, position: LowResolutionPosition) -> LowResolutionPosition {
        position.translate_wrapping(self.level, self.x, self.z)
    }
}

/// Returns the 3-bit direction code for a single-tile step.
pub fn walk_direction(dx: i32, dz: i32) -> WireResult<u32> {
    WALK_DELTAS
        .iter()
        .position(|&d| d == (dx, dz))
        .map(|code| code as u32)
        .ok_or(WireError::UnencodableDelta { dx, dz })
}

/// Returns the 4-bit direction code for a two-tile step.
pub fn run_direction(dx: i32, dz: i32) -> WireResult<u32> {
    RUN_DELTAS
        .iter()
        .position(|&d| d == (dx, dz))
        .map(|code| code as u32)
        .ok_or(WireError::UnencodableDelta { dx, dz })
}

/// Encodes the high-resolution movement from `from` to `to`.
///
/// Returns `None` when the coordinate did not change.
pub fn encode_high_res(from: CoordGrid, to: CoordGrid) -> WireResult<Option<PackedBits>> {
    if from == to {
        return Ok(None);
    }
    let dl = i32::from(to.level()) - i32::from(from.level());
    let dx = i32::from(to.x()) - i32::from(from.x());
    let dz = i32::from(to.z()) - i32::from(from.z());

    let mut bits = PackedBits::new();
    if dl != 0 || dx.abs() > 2 || dz.abs() > 2 {
        bits.push(OPCODE_TELEPORT, OPCODE_BITS)?;
        let large =
            dx.abs() >= LARGE_TELEPORT_THRESHOLD || dz.abs() >= LARGE_TELEPORT_THRESHOLD;
        let width = if large { 14 } else { 5 };
        bits.push(u32::from(large), 1)?;
        bits.push(dl as u32, 2)?;
        bits.push(dx as u32, width)?;
        bits.push(dz as u32, width)?;
    } else if dx.abs() == 2 || dz.abs() == 2 {
        bits.push(OPCODE_RUN, OPCODE_BITS)?;
        bits.push(run_direction(dx, dz)?, 4)?;
    } else {
        bits.push(OPCODE_WALK, OPCODE_BITS)?;
        bits.push(walk_direction(dx, dz)?, 3)?;
    }
    Ok(Some(bits))
}

/// Decodes a high-resolution movement, opcode included.
///
/// Returns `None` for [`OPCODE_NONE`].
pub fn decode_high_res(reader: &mut BitReader<'_>) -> WireResult<Option<MovementDelta>> {
    let opcode = reader.read_bits(OPCODE_BITS)?;
    let delta = match opcode {
        OPCODE_NONE => return Ok(None),
        OPCODE_WALK => {
            let code = reader.read_bits(3)?;
            let (x, z) = WALK_DELTAS[code as usize];
            MovementDelta { level: 0, x, z }
        }
        OPCODE_RUN => {
            let code = reader.read_bits(4)?;
            let (x, z) = RUN_DELTAS[code as usize];
            MovementDelta { level: 0, x, z }
        }
        _ => {
            let large = reader.read_bool()?;
            let width = if large { 14 } else { 5 };
            let level = reader.read_bits(2)? as i32;
            let x = reader.read_signed_bits(width)?;
            let z = reader.read_signed_bits(width)?;
            MovementDelta { level, x, z }
        }
    };
    Ok(Some(delta))
}

/// Encodes the coarse movement from `from` to `to`.
///
/// Returns `None` when the position did not change.
pub fn encode_low_res(
    from: LowResolutionPosition,
    to: LowResolutionPosition,
) -> WireResult<Option<PackedBits>> {
    if from == to {
        return Ok(None);
    }
    let dl = i32::from(to.level()) - i32::from(from.level());
    let dx = i32::from(to.x()) - i32::from(from.x());
    let dz = i32::from(to.z()) - i32::from(from.z());

    let mut bits = PackedBits::new();
    if dx == 0 && dz == 0 {
        bits.push(1, OPCODE_BITS)?;
        bits.push(dl as u32, 2)?;
    } else if dx.abs() <= 1 && dz.abs() <= 1 {
        bits.push(2, OPCODE_BITS)?;
        bits.push(dl as u32, 2)?;
        bits.push(walk_direction(dx, dz)?, 3)?;
    } else {
        bits.push(3, OPCODE_BITS)?;
        bits.push(dl as u32, 2)?;
        bits.push(dx as u32, 8)?;
        bits.push(dz as u32, 8)?;
    }
    Ok(Some(bits))
}

/// Decodes a coarse movement, opcode included.
pub fn decode_low_res(reader: &mut BitReader<'_>) -> WireResult<MovementDelta> {
    let opcode = reader.read_bits(OPCODE_BITS)?;
    let level = reader.read_bits(2)? as i32;
    match opcode {
        1 => Ok(MovementDelta { level, x: 0, z: 0 }),
        2 => {
            let code = reader.read_bits(3)?;
            let (x, z) = WALK_DELTAS[code as usize];
            Ok(MovementDelta { level, x, z })
        }
        3 => {
            let x = reader.read_signed_bits(8)?;
            let z = reader.read_signed_bits(8)?;
            Ok(MovementDelta { level, x, z })
        }
        _ => Err(WireError::InvalidOpcode { opcode }),
    }
}

#[cfg(test)]
mod tests {
    use bitstream::BitWriter;

    use super::*;

    fn coord(level: i32, x: i32, z: i32) -> CoordGrid {
        CoordGrid::new(level, x, z).unwrap()
    }

    fn roundtrip(from: CoordGrid, to: CoordGrid) -> (Vec<u8>, usize, CoordGrid) {
        let packed = encode_high_res(from, to).unwrap().expect("moved");
        let mut writer = BitWriter::new();
        writer.write_packed(packed);
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        let delta = decode_high_res(&mut reader).unwrap().expect("movement");
        (bytes.clone(), packed.len() as usize, delta.apply(from))
    }

    #[test]
    fn unchanged_coord_emits_nothing() {
        let c = coord(0, 100, 100);
        assert_eq!(encode_high_res(c, c).unwrap(), None);
    }

    #[test]
    fn walk_east_uses_code_four() {
        let packed = encode_high_res(coord(0, 100, 100), coord(0, 101, 100))
            .unwrap()
            .unwrap();
        assert_eq!(packed.len(), 5);
        assert_eq!(packed.value(), (u64::from(OPCODE_WALK) << 3) | 4);
    }

    #[test]
    fn run_uses_four_bit_codes() {
        let packed = encode_high_res(coord(0, 100, 100), coord(0, 102, 101))
            .unwrap()
            .unwrap();
        assert_eq!(packed.len(), 6);
        assert_eq!(packed.value(), (u64::from(OPCODE_RUN) << 4) | 10);
    }

    #[test]
    fn large_teleport_layout() {
        let packed = encode_high_res(coord(0, 100, 100), coord(0, 100, 200))
            .unwrap()
            .unwrap();
        assert_eq!(packed.len(), 2 + 1 + 2 + 14 + 14);
        let expected = (3u64 << 31) | (1 << 30) | 100;
        assert_eq!(packed.value(), expected);
    }

    #[test]
    fn small_teleport_layout() {
        let packed = encode_high_res(coord(0, 100, 100), coord(1, 100, 100))
            .unwrap()
            .unwrap();
        assert_eq!(packed.len(), 2 + 1 + 2 + 5 + 5);
        assert_eq!(packed.value(), (3u64 << 13) | (1 << 10));
    }

    #[test]
    fn every_walk_and_run_delta_roundtrips() {
        let from = coord(0, 3200, 3200);
        for dx in -2..=2 {
            for dz in -2..=2 {
                if dx == 0 && dz == 0 {
                    continue;
                }
                let to = coord(0, 3200 + dx, 3200 + dz);
                let (_, len, decoded) = roundtrip(from, to);
                assert_eq!(decoded, to);
                let expected_len = if dx.abs() == 2 || dz.abs() == 2 { 6 } else { 5 };
                assert_eq!(len, expected_len, "delta ({dx}, {dz})");
            }
        }
    }

    #[test]
    fn teleport_boundaries_roundtrip() {
        let from = coord(1, 8192, 8192);
        for d in [3, -3, 15, -15, 16, -16, 8191, -8191] {
            for (dx, dz) in [(d, 0), (0, d), (d, d)] {
                for level in 0..4 {
                    let to = coord(level, 8192 + dx, 8192 + dz);
                    let (_, _, decoded) = roundtrip(from, to);
                    assert_eq!(decoded, to, "delta ({dx}, {dz}) level {level}");
                }
            }
        }
    }

    #[test]
    fn full_map_teleport_wraps() {
        let from = coord(0, 0, 16_383);
        let to = coord(3, 16_383, 0);
        let (_, _, decoded) = roundtrip(from, to);
        assert_eq!(decoded, to);
    }

    #[test]
    fn low_res_forms() {
        let a = coord(0, 3200, 3200).low_resolution();
        let level = coord(1, 3200, 3200).low_resolution();
        let adjacent = coord(0, 3264, 3136).low_resolution();
        let far = coord(2, 6400, 1000).low_resolution();

        assert_eq!(encode_low_res(a, a).unwrap(), None);
        assert_eq!(encode_low_res(a, level).unwrap().unwrap().len(), 4);
        assert_eq!(encode_low_res(a, adjacent).unwrap().unwrap().len(), 7);
        assert_eq!(encode_low_res(a, far).unwrap().unwrap().len(), 20);

        for to in [level, adjacent, far] {
            let packed = encode_low_res(a, to).unwrap().unwrap();
            let mut writer = BitWriter::new();
            writer.write_packed(packed);
            let bytes = writer.finish();
            let delta = decode_low_res(&mut BitReader::new(&bytes)).unwrap();
            assert_eq!(delta.apply_low(a), to);
        }
    }

    #[test]
    fn low_res_opcode_zero_is_rejected() {
        let bytes = [0u8; 1];
        assert!(matches!(
            decode_low_res(&mut BitReader::new(&bytes)),
            Err(WireError::InvalidOpcode { opcode: 0 })
        ));
    }

    #[test]
    fn direction_tables_reject_non_steps() {
        assert!(walk_direction(0, 0).is_err());
        assert!(walk_direction(2, 0).is_err());
        assert!(run_direction(1, 1).is_err());
    }
}
