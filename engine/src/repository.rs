//! Index-addressed storage for every avatar of one protocol.
//!
//! Observers hold plain indices and look avatars up here each tick, so a
//! released slot resolves to `None` rather than to a stale avatar.

use extinfo::ClientEncoders;
use rayon::prelude::*;
use tracing::debug;
use wire::InfoProtocol;

use crate::avatar::Avatar;
use crate::error::{InfoError, InfoResult};
use crate::pool::Pool;

/// Avatar slots plus a pool of released avatars.
#[derive(Debug)]
pub struct AvatarRepository {
    protocol: InfoProtocol,
    slots: Vec<Option<Avatar>>,
    pool: Pool<Avatar>,
    allocated: usize,
}

impl AvatarRepository {
    #[must_use]
    pub fn new(protocol: InfoProtocol, capacity: usize, max_pooled: usize) -> Self {
        Self {
            protocol,
            slots: (0..capacity).map(|_| None).collect(),
            pool: Pool::new(max_pooled),
            allocated: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.allocated
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    fn slot_index(&self, index: u16) -> InfoResult<usize> {
        let slot = usize::from(index);
        if slot >= self.slots.len() {
            return Err(InfoError::IndexOutOfRange {
                index: slot,
                capacity: self.slots.len(),
            });
        }
        Ok(slot)
    }

    /// Claims slot `index` in `cycle`.
    pub fn allocate(&mut self, index: u16, cycle: u32) -> InfoResult<&mut Avatar> {
        let slot = self.slot_index(index)?;
        if self.slots[slot].is_some() {
            return Err(InfoError::AvatarAlreadyAllocated { index });
        }
        let protocol = self.protocol;
        let mut avatar = self.pool.acquire(|| Avatar::new(protocol));
        avatar.assign(index, cycle);
        self.allocated += 1;
        debug!(index, cycle, "avatar allocated");
        Ok(self.slots[slot].insert(avatar))
    }

    /// Releases slot `index` back to the pool.
    pub fn deallocate(&mut self, index: u16) -> InfoResult<()> {
        let slot = self.slot_index(index)?;
        let avatar = self.slots[slot]
            .take()
            .ok_or(InfoError::AvatarNotAllocated { index })?;
        self.pool.release(avatar);
        self.allocated -= 1;
        debug!(index, "avatar deallocated");
        Ok(())
    }

    #[must_use]
    pub fn get(&self, index: u16) -> Option<&Avatar> {
        self.slots.get(usize::from(index))?.as_ref()
    }

    pub fn get_mut(&mut self, index: u16) -> Option<&mut Avatar> {
        self.slots.get_mut(usize::from(index))?.as_mut()
    }

    /// Iterates occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Avatar> {
        self.slots.iter().flatten()
    }

    /// Runs the per-avatar prepare step in parallel.
    ///
    /// Returns the total number of blocks serialized.
    pub(crate) fn prepare(&mut self, encoders: &ClientEncoders) -> InfoResult<usize> {
        self.slots
            .par_iter_mut()
            .filter_map(Option::as_mut)
            .map(|avatar| avatar.prepare(encoders))
            .try_reduce(|| 0, |a, b| Ok(a + b))
    }

    pub(crate) fn post_update(&mut self) {
        self.slots
            .par_iter_mut()
            .filter_map(Option::as_mut)
            .for_each(Avatar::post_update);
    }

    /// Drops pooled avatars until at most `len` remain.
    pub fn shrink_pool(&mut self, len: usize) {
        self.pool.shrink_to(len);
    }
}
