//! Grid, fine and low-resolution coordinates.

use crate::error::{WireError, WireResult};

/// Number of levels (planes) in the map.
pub const LEVEL_COUNT: u8 = 4;
/// Width and length of the map in tiles.
pub const MAP_SIZE: u16 = 16_384;
/// Tiles per zone along each axis.
pub const ZONE_SIZE: u16 = 8;
/// Right shift applied to x/z when deriving a [`LowResolutionPosition`].
pub const LOW_RES_SHIFT: u32 = 6;
/// Sub-tile precision bits of a [`CoordFine`].
pub const FINE_SHIFT: u32 = 7;

const COORD_MASK: u32 = 0x3FFF;

/// Absolute tile position packed into 30 bits: `level << 28 | x << 14 | z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoordGrid(u32);

impl CoordGrid {
    /// Sentinel that no valid coordinate packs to.
    pub const INVALID: Self = Self(u32::MAX);

    /// Creates a coordinate, validating every component.
    pub fn new(level: i32, x: i32, z: i32) -> WireResult<Self> {
        let in_map = |v: i32| (0..i32::from(MAP_SIZE)).contains(&v);
        if !(0..i32::from(LEVEL_COUNT)).contains(&level) || !in_map(x) || !in_map(z) {
            return Err(WireError::CoordOutOfRange { level, x, z });
        }
        Ok(Self::pack(level as u32, x as u32, z as u32))
    }

    const fn pack(level: u32, x: u32, z: u32) -> Self {
        Self(((level & 0x3) << 28) | ((x & COORD_MASK) << 14) | (z & COORD_MASK))
    }

    /// Returns the packed representation.
    #[must_use]
    pub const fn packed(self) -> u32 {
        self.0
    }

    /// Returns `false` for [`CoordGrid::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    /// Returns the level.
    #[must_use]
    pub const fn level(self) -> u8 {
        ((self.0 >> 28) & 0x3) as u8
    }

    /// Returns the x tile.
    #[must_use]
    pub const fn x(self) -> u16 {
        ((self.0 >> 14) & COORD_MASK) as u16
    }

    /// Returns the z tile.
    #[must_use]
    pub const fn z(self) -> u16 {
        (self.0 & COORD_MASK) as u16
    }

    /// Chebyshev distance in tiles, ignoring level.
    #[must_use]
    pub fn chebyshev(self, other: Self) -> u32 {
        let dx = (i32::from(self.x()) - i32::from(other.x())).unsigned_abs();
        let dz = (i32::from(self.z()) - i32::from(other.z())).unsigned_abs();
        dx.max(dz)
    }

    /// Returns `true` if `other` is on the same level within `distance` tiles.
    #[must_use]
    pub fn in_distance(self, other: Self, distance: u32) -> bool {
        self.is_valid()
            && other.is_valid()
            && self.level() == other.level()
            && self.chebyshev(other) <= distance
    }

    /// Applies a delta the way a client does: level wraps mod 4, x/z mod 16384.
    #[must_use]
    pub const fn translate_wrapping(self, level: i32, x: i32, z: i32) -> Self {
        Self::pack(
            (self.level() as i32).wrapping_add(level) as u32,
            (self.x() as i32).wrapping_add(x) as u32,
            (self.z() as i32).wrapping_add(z) as u32,
        )
    }

    /// Coarse position used by low-resolution tracking.
    #[must_use]
    pub const fn low_resolution(self) -> LowResolutionPosition {
        LowResolutionPosition::pack(
            self.level() as u32,
            (self.x() as u32) >> LOW_RES_SHIFT,
            (self.z() as u32) >> LOW_RES_SHIFT,
        )
    }
}

impl std::fmt::Display for CoordGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "{}_{}_{}", self.level(), self.x(), self.z())
        } else {
            f.write_str("invalid")
        }
    }
}

/// Coarse position packed into 18 bits: `level << 16 | rx << 8 | rz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LowResolutionPosition(u32);

impl LowResolutionPosition {
    const fn pack(level: u32, x: u32, z: u32) -> Self {
        Self(((level & 0x3) << 16) | ((x & 0xFF) << 8) | (z & 0xFF))
    }

    /// Rebuilds a position from its packed form.
    #[must_use]
    pub const fn from_packed(packed: u32) -> Self {
        Self(packed & 0x3_FFFF)
    }

    /// Returns the packed representation.
    #[must_use]
    pub const fn packed(self) -> u32 {
        self.0
    }

    /// Returns the level.
    #[must_use]
    pub const fn level(self) -> u8 {
        ((self.0 >> 16) & 0x3) as u8
    }

    /// Returns the coarse x.
    #[must_use]
    pub const fn x(self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    /// Returns the coarse z.
    #[must_use]
    pub const fn z(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Applies a delta with client wrapping semantics.
    #[must_use]
    pub const fn translate_wrapping(self, level: i32, x: i32, z: i32) -> Self {
        Self::pack(
            (self.level() as i32).wrapping_add(level) as u32,
            (self.x() as i32).wrapping_add(x) as u32,
            (self.z() as i32).wrapping_add(z) as u32,
        )
    }
}

/// Sub-tile position used by world entities.
///
/// Each tile is split into `1 << FINE_SHIFT` units along x and z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoordFine {
    level: u8,
    x: u32,
    z: u32,
}

impl CoordFine {
    /// Creates a fine coordinate, validating that its tile lies on the map.
    pub fn new(level: i32, x: u32, z: u32) -> WireResult<Self> {
        let tile_x = (x >> FINE_SHIFT) as i32;
        let tile_z = (z >> FINE_SHIFT) as i32;
        CoordGrid::new(level, tile_x, tile_z)?;
        Ok(Self {
            level: level as u8,
            x,
            z,
        })
    }

    /// Returns the level.
    #[must_use]
    pub const fn level(self) -> u8 {
        self.level
    }

    /// Returns the fine x.
    #[must_use]
    pub const fn x(self) -> u32 {
        self.x
    }

    /// Returns the fine z.
    #[must_use]
    pub const fn z(self) -> u32 {
        self.z
    }

    /// Tile containing this position.
    #[must_use]
    pub const fn to_grid(self) -> CoordGrid {
        CoordGrid::pack(
            self.level as u32,
            self.x >> FINE_SHIFT,
            self.z >> FINE_SHIFT,
        )
    }
}

/// Rectangle of zones loaded for one world context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildArea {
    zone_x: u16,
    zone_z: u16,
    width: u16,
    length: u16,
}

impl BuildArea {
    /// Default width and length of a build area in zones.
    pub const DEFAULT_ZONES: u16 = 13;

    /// Creates a build area from its south-west zone and size in zones.
    pub fn new(zone_x: u16, zone_z: u16, width: u16, length: u16) -> WireResult<Self> {
        let zones = MAP_SIZE / ZONE_SIZE;
        if width == 0
            || length == 0
            || u32::from(zone_x) + u32::from(width) > u32::from(zones)
            || u32::from(zone_z) + u32::from(length) > u32::from(zones)
        {
            return Err(WireError::BuildAreaOutOfRange {
                zone_x,
                zone_z,
                width,
                length,
            });
        }
        Ok(Self {
            zone_x,
            zone_z,
            width,
            length,
        })
    }

    /// Returns `true` if the coordinate's zone lies inside the area.
    #[must_use]
    pub const fn contains(self, coord: CoordGrid) -> bool {
        let zx = coord.x() / ZONE_SIZE;
        let zz = coord.z() / ZONE_SIZE;
        zx >= self.zone_x
            && zx < self.zone_x + self.width
            && zz >= self.zone_z
            && zz < self.zone_z + self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_packs_components() {
        let coord = CoordGrid::new(3, 16_383, 1).unwrap();
        assert_eq!(coord.level(), 3);
        assert_eq!(coord.x(), 16_383);
        assert_eq!(coord.z(), 1);
        assert!(coord.packed() < (1 << 30));
        assert!(coord.is_valid());
    }

    #[test]
    fn coord_rejects_out_of_range() {
        assert!(CoordGrid::new(4, 0, 0).is_err());
        assert!(CoordGrid::new(-1, 0, 0).is_err());
        assert!(CoordGrid::new(0, 16_384, 0).is_err());
        assert!(CoordGrid::new(0, 0, -5).is_err());
    }

    #[test]
    fn invalid_is_never_in_distance() {
        let coord = CoordGrid::new(0, 10, 10).unwrap();
        assert!(!CoordGrid::INVALID.in_distance(coord, u32::MAX));
        assert!(!CoordGrid::INVALID.is_valid());
    }

    #[test]
    fn chebyshev_distance() {
        let a = CoordGrid::new(0, 100, 100).unwrap();
        let b = CoordGrid::new(0, 103, 115).unwrap();
        assert_eq!(a.chebyshev(b), 15);
        assert!(a.in_distance(b, 15));
        assert!(!a.in_distance(b, 14));
        let upstairs = CoordGrid::new(1, 100, 100).unwrap();
        assert!(!a.in_distance(upstairs, 15));
    }

    #[test]
    fn translate_wraps_like_client() {
        let coord = CoordGrid::new(0, 0, 16_383).unwrap();
        let moved = coord.translate_wrapping(-1, -1, 1);
        assert_eq!(moved.level(), 3);
        assert_eq!(moved.x(), 16_383);
        assert_eq!(moved.z(), 0);
    }

    #[test]
    fn low_resolution_is_region_granular() {
        let coord = CoordGrid::new(2, 3200, 3264).unwrap();
        let low = coord.low_resolution();
        assert_eq!(low.level(), 2);
        assert_eq!(low.x(), 50);
        assert_eq!(low.z(), 51);
        assert!(low.packed() < (1 << 18));
        assert_eq!(LowResolutionPosition::from_packed(low.packed()), low);
    }

    #[test]
    fn fine_coord_maps_to_tile() {
        let fine = CoordFine::new(1, 3200 * 128 + 64, 3201 * 128 + 127).unwrap();
        let grid = fine.to_grid();
        assert_eq!(grid, CoordGrid::new(1, 3200, 3201).unwrap());
        assert!(CoordFine::new(0, 16_384 * 128, 0).is_err());
    }

    #[test]
    fn build_area_containment() {
        let area = BuildArea::new(400, 400, 13, 13).unwrap();
        assert!(area.contains(CoordGrid::new(0, 3200, 3200).unwrap()));
        assert!(area.contains(CoordGrid::new(0, 3303, 3303).unwrap()));
        assert!(!area.contains(CoordGrid::new(0, 3304, 3200).unwrap()));
        assert!(!area.contains(CoordGrid::new(0, 3199, 3200).unwrap()));
        assert!(BuildArea::new(2040, 0, 13, 13).is_err());
        assert!(BuildArea::new(0, 0, 0, 13).is_err());
    }
}
