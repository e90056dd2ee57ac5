//! One connected client and the worlds it can see.

use extinfo::{ClientType, InfoFlags, Tinting};
use rustc_hash::FxHashMap;
use wire::CoordGrid;

use crate::details::{WorldDetails, WorldId};
use crate::error::InfoError;

/// Identifies an observer. Usually the player index of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObserverId(pub u32);

/// Observer state shared by all of its worlds.
#[derive(Debug, Clone)]
pub(crate) struct ObserverView {
    pub(crate) id: ObserverId,
    pub(crate) client: ClientType,
    pub(crate) encoder_slot: usize,
    /// The observer's own avatar, always high resolution in its worlds.
    pub(crate) local: Option<u16>,
    pub(crate) coord: CoordGrid,
    pub(crate) active_world: WorldId,
    pub(crate) resize_range: u32,
    pub(crate) preferred_range: u32,
    pub(crate) resize_counter: u32,
    /// Appearance counter last written to this observer, per avatar.
    pub(crate) appearance_cycles: Vec<u32>,
    /// Extra flags to send per avatar this tick.
    pub(crate) overlay: FxHashMap<u16, InfoFlags>,
    /// Tinting shown only to this observer, per avatar.
    pub(crate) tinting: FxHashMap<u16, Tinting>,
}

impl ObserverView {
    pub(crate) fn overlay_flags(&self, index: u16) -> InfoFlags {
        self.overlay.get(&index).copied().unwrap_or_default()
    }

    pub(crate) fn add_overlay(&mut self, index: u16, flags: InfoFlags) {
        *self.overlay.entry(index).or_default() |= flags;
    }
}

/// A connected client: its view parameters, its worlds and any failure
/// captured while encoding it.
#[derive(Debug, Clone)]
pub struct Observer {
    pub(crate) view: ObserverView,
    pub(crate) worlds: FxHashMap<WorldId, WorldDetails>,
    pub(crate) error: Option<InfoError>,
}

impl Observer {
    pub(crate) fn new(
        id: ObserverId,
        client: ClientType,
        encoder_slot: usize,
        local: Option<u16>,
        preferred_range: u32,
        capacity: usize,
    ) -> Self {
        Self {
            view: ObserverView {
                id,
                client,
                encoder_slot,
                local,
                coord: CoordGrid::INVALID,
                active_world: WorldId::ROOT,
                resize_range: preferred_range,
                preferred_range,
                resize_counter: 0,
                appearance_cycles: vec![0; capacity],
                overlay: FxHashMap::default(),
                tinting: FxHashMap::default(),
            },
            worlds: FxHashMap::default(),
            error: None,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ObserverId {
        self.view.id
    }

    #[must_use]
    pub const fn client(&self) -> ClientType {
        self.view.client
    }

    #[must_use]
    pub const fn local_index(&self) -> Option<u16> {
        self.view.local
    }

    /// Position the root world is rendered around.
    #[must_use]
    pub const fn coord(&self) -> CoordGrid {
        self.view.coord
    }

    #[must_use]
    pub const fn active_world(&self) -> WorldId {
        self.view.active_world
    }

    /// Current view range, possibly shrunk below the preferred one.
    #[must_use]
    pub const fn view_range(&self) -> u32 {
        self.view.resize_range
    }

    #[must_use]
    pub const fn preferred_range(&self) -> u32 {
        self.view.preferred_range
    }

    /// A failed observer produces no packets until it is reallocated.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.error.is_some()
    }

    /// The failure captured while encoding this observer.
    #[must_use]
    pub const fn error(&self) -> Option<&InfoError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn world(&self, world: WorldId) -> Option<&WorldDetails> {
        self.worlds.get(&world)
    }

    /// Worlds this observer tracks, in no particular order.
    pub fn worlds(&self) -> impl Iterator<Item = WorldId> + '_ {
        self.worlds.keys().copied()
    }

    pub(crate) fn post_update(&mut self) {
        for details in self.worlds.values_mut() {
            details.post_update();
        }
        self.view.overlay.clear();
        self.view.tinting.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_preferred_range() {
        let observer = Observer::new(ObserverId(1), ClientType::Desktop, 0, Some(1), 15, 32);
        assert_eq!(observer.view_range(), 15);
        assert_eq!(observer.active_world(), WorldId::ROOT);
        assert!(!observer.is_destroyed());
        assert_eq!(observer.worlds().count(), 0);
    }

    #[test]
    fn overlay_accumulates_and_clears() {
        let mut observer = Observer::new(ObserverId(1), ClientType::Desktop, 0, None, 15, 32);
        observer.view.add_overlay(4, InfoFlags::APPEARANCE);
        observer.view.add_overlay(4, InfoFlags::TINTING);
        assert_eq!(
            observer.view.overlay_flags(4),
            InfoFlags::APPEARANCE | InfoFlags::TINTING
        );
        observer.post_update();
        assert!(observer.view.overlay_flags(4).is_empty());
    }
}
