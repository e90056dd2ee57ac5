//! Per-observer, per-world tracking state.

use bitvec::vec::BitVec;
use extinfo::InfoFlags;
use rustc_hash::FxHashMap;
use wire::{BuildArea, CoordGrid};

use crate::policy::PriorityTier;
use crate::pool::Reset;

/// Identifies the world an observer or avatar is in.
///
/// [`WorldId::ROOT`] is the main map; every other id names a dynamic world
/// (a ship, an instance) the observer can see into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldId(pub u16);

impl WorldId {
    /// The main map.
    pub const ROOT: Self = Self(u16::MAX);
    /// Dynamic world ids must be below this.
    pub const MAX_DYNAMIC: u16 = 2048;

    #[must_use]
    pub const fn is_root(self) -> bool {
        self.0 == Self::ROOT.0
    }

    /// Returns `true` for the root world and every in-range dynamic world.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.is_root() || self.0 < Self::MAX_DYNAMIC
    }
}

impl Default for WorldId {
    fn default() -> Self {
        Self::ROOT
    }
}

/// Was skipped last tick.
pub(crate) const WAS_STATIONARY: u8 = 0x1;
/// Skipped this tick.
pub(crate) const IS_STATIONARY: u8 = 0x2;

/// What one observer tracks in one world, plus that world's packet buffer.
#[derive(Debug, Clone)]
pub struct WorldDetails {
    pub(crate) world: WorldId,
    pub(crate) high_res: BitVec,
    pub(crate) ext_tracked: BitVec,
    pub(crate) promotions: BitVec,
    pub(crate) stationary: Vec<u8>,
    pub(crate) high_res_indices: Vec<u16>,
    pub(crate) low_res_indices: Vec<u16>,
    /// High-resolution entries, the observer's own avatar excluded.
    pub(crate) high_res_count: usize,
    pub(crate) tier_counts: [usize; 3],
    pub(crate) tiers: FxHashMap<u16, PriorityTier>,
    pub(crate) extended_info_queue: Vec<(u16, InfoFlags)>,
    pub(crate) buffer: Vec<u8>,
    pub(crate) render_coord: Option<CoordGrid>,
    pub(crate) build_area: Option<BuildArea>,
}

impl WorldDetails {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            world: WorldId::ROOT,
            high_res: BitVec::repeat(false, capacity),
            ext_tracked: BitVec::repeat(false, capacity),
            promotions: BitVec::repeat(false, capacity),
            stationary: vec![0; capacity],
            high_res_indices: Vec::new(),
            low_res_indices: Vec::new(),
            high_res_count: 0,
            tier_counts: [0; 3],
            tiers: FxHashMap::default(),
            extended_info_queue: Vec::new(),
            buffer: Vec::new(),
            render_coord: None,
            build_area: None,
        }
    }

    /// Prepares pooled details for `world`, optionally tracking the
    /// observer's own avatar from the start.
    pub(crate) fn assign(&mut self, world: WorldId, local: Option<u16>) {
        self.world = world;
        if let Some(index) = local {
            self.high_res.set(usize::from(index), true);
        }
    }

    #[must_use]
    pub const fn world(&self) -> WorldId {
        self.world
    }

    /// Encoded packet for the last tick.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of high-resolution entries, the observer's own avatar excluded.
    #[must_use]
    pub const fn high_resolution_count(&self) -> usize {
        self.high_res_count
    }

    #[must_use]
    pub fn is_high_resolution(&self, index: u16) -> bool {
        self.high_res
            .get(usize::from(index))
            .is_some_and(|bit| *bit)
    }

    /// Whether the observer has seen every sticky block of `index`.
    #[must_use]
    pub fn is_extended_info_tracked(&self, index: u16) -> bool {
        self.ext_tracked
            .get(usize::from(index))
            .is_some_and(|bit| *bit)
    }

    /// High-resolution indices in ascending order.
    pub fn high_resolution_indices(&self) -> impl Iterator<Item = u16> + '_ {
        self.high_res.iter_ones().map(|index| index as u16)
    }

    /// Records queued by the last tick, in the order they were written.
    #[must_use]
    pub fn extended_info_queue(&self) -> &[(u16, InfoFlags)] {
        &self.extended_info_queue
    }

    #[must_use]
    pub const fn render_coord(&self) -> Option<CoordGrid> {
        self.render_coord
    }

    #[must_use]
    pub const fn build_area(&self) -> Option<BuildArea> {
        self.build_area
    }

    pub(crate) fn is_stationary(&self, index: u16) -> bool {
        self.stationary[usize::from(index)] & WAS_STATIONARY != 0
    }

    pub(crate) fn mark_stationary(&mut self, index: u16) {
        self.stationary[usize::from(index)] |= IS_STATIONARY;
    }

    /// Splits the capacity into this tick's high- and low-resolution lists.
    pub(crate) fn rebuild_indices(&mut self, local: Option<u16>) {
        self.high_res_indices.clear();
        self.low_res_indices.clear();
        for (slot, high) in self.high_res.iter().by_vals().enumerate() {
            let index = slot as u16;
            if high {
                self.high_res_indices.push(index);
            } else if local != Some(index) {
                self.low_res_indices.push(index);
            }
        }
    }

    pub(crate) fn add_high_resolution(&mut self, index: u16, tier: PriorityTier) {
        self.high_res.set(usize::from(index), true);
        self.high_res_count += 1;
        self.tier_counts[tier.index()] += 1;
        self.tiers.insert(index, tier);
    }

    pub(crate) fn remove_high_resolution(&mut self, index: u16) {
        let slot = usize::from(index);
        self.high_res.set(slot, false);
        self.ext_tracked.set(slot, false);
        self.high_res_count = self.high_res_count.saturating_sub(1);
        if let Some(tier) = self.tiers.remove(&index) {
            let count = &mut self.tier_counts[tier.index()];
            *count = count.saturating_sub(1);
        }
    }

    pub(crate) fn post_update(&mut self) {
        for flags in &mut self.stationary {
            *flags >>= 1;
        }
        self.promotions.fill(false);
    }
}

impl Reset for WorldDetails {
    fn reset(&mut self) {
        self.world = WorldId::ROOT;
        self.high_res.fill(false);
        self.ext_tracked.fill(false);
        self.promotions.fill(false);
        self.stationary.fill(0);
        self.high_res_indices.clear();
        self.low_res_indices.clear();
        self.high_res_count = 0;
        self.tier_counts = [0; 3];
        self.tiers.clear();
        self.extended_info_queue.clear();
        self.buffer.clear();
        self.render_coord = None;
        self.build_area = None;
    }
}
