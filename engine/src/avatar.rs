//! Per-entity state read by every observer.

use bitstream::PackedBits;
use extinfo::{ClientEncoders, ExtendedInfo};
use wire::{encode_high_res, CoordFine, CoordGrid, InfoProtocol};

use crate::details::WorldId;
use crate::error::{InfoError, InfoResult};
use crate::policy::PriorityTier;
use crate::pool::Reset;

/// A player, NPC or world entity that observers may see.
#[derive(Debug, Clone)]
pub struct Avatar {
    index: u16,
    coord: CoordGrid,
    last_coord: CoordGrid,
    fine: Option<CoordFine>,
    world: WorldId,
    hidden: bool,
    priority: PriorityTier,
    allocate_cycle: u32,
    extended_info: ExtendedInfo,
    movement: Option<PackedBits>,
}

impl Avatar {
    pub(crate) fn new(protocol: InfoProtocol) -> Self {
        Self {
            index: 0,
            coord: CoordGrid::INVALID,
            last_coord: CoordGrid::INVALID,
            fine: None,
            world: WorldId::ROOT,
            hidden: false,
            priority: PriorityTier::default(),
            allocate_cycle: 0,
            extended_info: ExtendedInfo::new(protocol),
            movement: None,
        }
    }

    pub(crate) fn assign(&mut self, index: u16, cycle: u32) {
        self.index = index;
        self.allocate_cycle = cycle;
    }

    #[must_use]
    pub const fn index(&self) -> u16 {
        self.index
    }

    /// Tile position this tick.
    #[must_use]
    pub const fn coord(&self) -> CoordGrid {
        self.coord
    }

    /// Tile position at the end of the previous tick.
    #[must_use]
    pub const fn last_coord(&self) -> CoordGrid {
        self.last_coord
    }

    /// Sub-tile position, for world entities.
    #[must_use]
    pub const fn fine_coord(&self) -> Option<CoordFine> {
        self.fine
    }

    /// World the avatar currently stands in.
    #[must_use]
    pub const fn world(&self) -> WorldId {
        self.world
    }

    #[must_use]
    pub const fn is_hidden(&self) -> bool {
        self.hidden
    }

    #[must_use]
    pub const fn priority(&self) -> PriorityTier {
        self.priority
    }

    /// Cycle in which this avatar took its slot.
    #[must_use]
    pub const fn allocate_cycle(&self) -> u32 {
        self.allocate_cycle
    }

    #[must_use]
    pub const fn extended_info(&self) -> &ExtendedInfo {
        &self.extended_info
    }

    pub fn extended_info_mut(&mut self) -> &mut ExtendedInfo {
        &mut self.extended_info
    }

    /// High-resolution movement computed by the last prepare phase.
    #[must_use]
    pub const fn movement(&self) -> Option<PackedBits> {
        self.movement
    }

    /// Moves the avatar. Must be called before the first tick it takes part in.
    pub fn update_coord(&mut self, level: i32, x: i32, z: i32) -> InfoResult<()> {
        self.coord = CoordGrid::new(level, x, z)?;
        self.fine = None;
        Ok(())
    }

    /// Moves a world entity with sub-tile precision.
    pub fn update_coord_fine(&mut self, level: i32, x: u32, z: u32) -> InfoResult<()> {
        let fine = CoordFine::new(level, x, z)?;
        self.coord = fine.to_grid();
        self.fine = Some(fine);
        Ok(())
    }

    /// Hidden avatars are removed from, and never added to, any observer.
    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn set_priority(&mut self, priority: PriorityTier) {
        self.priority = priority;
    }

    pub fn set_world(&mut self, world: WorldId) {
        self.world = world;
    }

    /// Computes this tick's shared movement bits and extended-info caches.
    ///
    /// Returns the number of blocks serialized.
    pub(crate) fn prepare(&mut self, encoders: &ClientEncoders) -> InfoResult<usize> {
        if !self.coord.is_valid() {
            return Err(InfoError::CoordNotSet { index: self.index });
        }
        self.movement = if self.last_coord.is_valid() {
            encode_high_res(self.last_coord, self.coord)?
        } else {
            None
        };
        Ok(self.extended_info.precompute(encoders))
    }

    pub(crate) fn post_update(&mut self) {
        self.last_coord = self.coord;
        self.movement = None;
        self.extended_info.clear_transient();
    }
}

impl Reset for Avatar {
    fn reset(&mut self) {
        self.coord = CoordGrid::INVALID;
        self.last_coord = CoordGrid::INVALID;
        self.fine = None;
        self.world = WorldId::ROOT;
        self.hidden = false;
        self.priority = PriorityTier::default();
        self.movement = None;
        self.extended_info.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avatar() -> Avatar {
        Avatar::new(InfoProtocol::Player)
    }

    #[test]
    fn prepare_requires_coord() {
        let mut avatar = avatar();
        avatar.assign(7, 0);
        let encoders = ClientEncoders::standard();
        assert_eq!(
            avatar.prepare(&encoders),
            Err(InfoError::CoordNotSet { index: 7 })
        );
    }

    #[test]
    fn first_tick_has_no_movement() {
        let mut avatar = avatar();
        avatar.update_coord(0, 3200, 3200).unwrap();
        avatar.prepare(&ClientEncoders::standard()).unwrap();
        assert!(avatar.movement().is_none());
    }

    #[test]
    fn walk_is_encoded_against_last_coord() {
        let encoders = ClientEncoders::standard();
        let mut avatar = avatar();
        avatar.update_coord(0, 100, 100).unwrap();
        avatar.prepare(&encoders).unwrap();
        avatar.post_update();
        avatar.update_coord(0, 101, 100).unwrap();
        avatar.prepare(&encoders).unwrap();
        let movement = avatar.movement().unwrap();
        assert_eq!(movement.len(), 5);
        assert_eq!(movement.value(), (1 << 3) | 4);
    }

    #[test]
    fn rejects_out_of_map_coords() {
        let mut avatar = avatar();
        assert!(avatar.update_coord(4, 0, 0).is_err());
        assert!(avatar.update_coord(0, 16_384, 0).is_err());
        assert!(!avatar.coord().is_valid());
    }

    #[test]
    fn fine_coord_sets_tile() {
        let mut avatar = Avatar::new(InfoProtocol::WorldEntity);
        avatar.update_coord_fine(0, 3200 * 128 + 5, 3200 * 128).unwrap();
        assert_eq!(avatar.coord(), CoordGrid::new(0, 3200, 3200).unwrap());
        assert!(avatar.fine_coord().is_some());
    }

    #[test]
    fn reset_clears_state() {
        let mut avatar = avatar();
        avatar.update_coord(0, 1, 1).unwrap();
        avatar.set_hidden(true);
        avatar.reset();
        assert!(!avatar.coord().is_valid());
        assert!(!avatar.is_hidden());
    }
}
