//! Shared coarse positions of every avatar, double-buffered per tick.
//!
//! All observers see a far-away avatar through the same coarse position, so
//! its coarse movement is computed once per tick here and copied into every
//! root-world buffer that needs it.

use bitstream::PackedBits;
use wire::{encode_low_res, LowResolutionPosition};

use crate::error::InfoResult;
use crate::repository::AvatarRepository;

/// Marks a slot with no avatar. Zero is a valid packed position.
pub const UNUSED: u32 = u32::MAX;

/// Current and previous coarse positions plus this tick's coarse movement.
#[derive(Debug, Clone)]
pub struct LowResCache {
    current: Vec<u32>,
    previous: Vec<u32>,
    movements: Vec<Option<PackedBits>>,
}

impl LowResCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            current: vec![UNUSED; capacity],
            previous: vec![UNUSED; capacity],
            movements: vec![None; capacity],
        }
    }

    /// Records every avatar's coarse position and its movement since the
    /// previous tick. A slot that was unused last tick moves from position 0,
    /// the client's initial value.
    pub fn refresh(&mut self, repository: &AvatarRepository) -> InfoResult<()> {
        self.current.fill(UNUSED);
        self.movements.fill(None);
        for avatar in repository.iter() {
            let slot = usize::from(avatar.index());
            let position = avatar.coord().low_resolution();
            self.current[slot] = position.packed();
            let previous = match self.previous[slot] {
                UNUSED => LowResolutionPosition::from_packed(0),
                packed => LowResolutionPosition::from_packed(packed),
            };
            self.movements[slot] = encode_low_res(previous, position)?;
        }
        Ok(())
    }

    /// Coarse movement of `index` this tick.
    #[must_use]
    pub fn movement(&self, index: u16) -> Option<PackedBits> {
        self.movements.get(usize::from(index)).copied().flatten()
    }

    /// Coarse position of `index` this tick.
    #[must_use]
    pub fn current(&self, index: u16) -> Option<LowResolutionPosition> {
        match self.current.get(usize::from(index)).copied() {
            None | Some(UNUSED) => None,
            Some(packed) => Some(LowResolutionPosition::from_packed(packed)),
        }
    }

    /// Makes this tick's positions the baseline for the next one.
    pub fn swap(&mut self) {
        self.previous.copy_from_slice(&self.current);
    }
}
