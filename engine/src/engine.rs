//! The tick driver: avatars, observers and the two-phase tick.

use std::fmt;

use extinfo::{validate_tinting, BlockKind, ClientEncoders, ClientType, ExtInfoError, InfoFlags};
use rayon::prelude::*;
use tracing::{debug, trace, warn};
use wire::{BuildArea, CoordGrid, ProtocolRevision};

use crate::avatar::Avatar;
use crate::config::{EngineConfig, MAX_CAPACITY};
use crate::details::{WorldDetails, WorldId};
use crate::error::{InfoError, InfoResult};
use crate::filter::{AcceptAll, ExtendedInfoFilter, VisibilityFilter, WorstCaseFilter};
use crate::lowres_cache::LowResCache;
use crate::observer::{Observer, ObserverId};
use crate::policy::{DefaultPriorityPolicy, PriorityPolicy};
use crate::pool::Pool;
use crate::processor::{process_observer, TickContext};
use crate::repository::AvatarRepository;

/// Runs one info protocol for every observer.
///
/// A tick is [`prepare`](Self::prepare), then [`encode`](Self::encode), then
/// reading each observer's [`packet`](Self::packet), then
/// [`post_update`](Self::post_update). Avatars and observers are mutated only
/// between ticks.
pub struct InfoEngine {
    config: EngineConfig,
    encoders: ClientEncoders,
    repository: AvatarRepository,
    low_res: LowResCache,
    observers: Vec<Option<Observer>>,
    details_pool: Pool<WorldDetails>,
    visibility: Box<dyn VisibilityFilter>,
    extended_info_filter: Box<dyn ExtendedInfoFilter>,
    policy: Box<dyn PriorityPolicy>,
    cycle: u32,
}

impl fmt::Debug for InfoEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfoEngine")
            .field("protocol", &self.config.revision.protocol)
            .field("cycle", &self.cycle)
            .field("avatars", &self.repository.len())
            .field("observers", &self.observers.iter().flatten().count())
            .finish_non_exhaustive()
    }
}

impl InfoEngine {
    /// Creates an engine for `config`, encoding extended info with `encoders`.
    pub fn new(config: EngineConfig, encoders: ClientEncoders) -> InfoResult<Self> {
        config.validate()?;
        if encoders.is_empty() {
            return Err(InfoError::InvalidConfig {
                reason: "no client encoders registered",
            });
        }
        let revision = &config.revision;
        let repository = AvatarRepository::new(
            revision.protocol,
            revision.capacity,
            config.pool.max_pooled_avatars,
        );
        let low_res = LowResCache::new(revision.capacity);
        let details_pool = Pool::new(config.pool.max_pooled_details);
        Ok(Self {
            config,
            encoders,
            repository,
            low_res,
            observers: Vec::new(),
            details_pool,
            visibility: Box::new(AcceptAll),
            extended_info_filter: Box::new(WorstCaseFilter),
            policy: Box::new(DefaultPriorityPolicy),
            cycle: 0,
        })
    }

    #[must_use]
    pub fn with_visibility_filter(mut self, filter: impl VisibilityFilter + 'static) -> Self {
        self.visibility = Box::new(filter);
        self
    }

    #[must_use]
    pub fn with_extended_info_filter(mut self, filter: impl ExtendedInfoFilter + 'static) -> Self {
        self.extended_info_filter = Box::new(filter);
        self
    }

    #[must_use]
    pub fn with_priority_policy(mut self, policy: impl PriorityPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn revision(&self) -> &ProtocolRevision {
        &self.config.revision
    }

    /// Ticks completed so far.
    #[must_use]
    pub const fn cycle(&self) -> u32 {
        self.cycle
    }

    #[must_use]
    pub const fn encoders(&self) -> &ClientEncoders {
        &self.encoders
    }

    #[must_use]
    pub const fn avatars(&self) -> &AvatarRepository {
        &self.repository
    }

    /// Claims avatar slot `index`. The avatar needs a coordinate before the
    /// next tick.
    pub fn allocate_avatar(&mut self, index: u16) -> InfoResult<&mut Avatar> {
        self.repository.allocate(index, self.cycle)
    }

    /// Releases avatar slot `index`. Observers drop it on their next tick.
    pub fn deallocate_avatar(&mut self, index: u16) -> InfoResult<()> {
        self.repository.deallocate(index)
    }

    #[must_use]
    pub fn avatar(&self, index: u16) -> Option<&Avatar> {
        self.repository.get(index)
    }

    pub fn avatar_mut(&mut self, index: u16) -> Option<&mut Avatar> {
        self.repository.get_mut(index)
    }

    /// Registers an observer. `local` is the observer's own avatar in this
    /// protocol's index space, if it has one.
    pub fn allocate_observer(
        &mut self,
        id: ObserverId,
        client: ClientType,
        local: Option<u16>,
    ) -> InfoResult<()> {
        let slot = id.0 as usize;
        if slot >= MAX_CAPACITY {
            return Err(InfoError::IndexOutOfRange {
                index: slot,
                capacity: MAX_CAPACITY,
            });
        }
        let encoder_slot = self
            .encoders
            .slot(client)
            .ok_or(InfoError::MissingEncoder { client })?;
        let capacity = self.config.revision.capacity;
        if let Some(index) = local {
            if usize::from(index) >= capacity {
                return Err(InfoError::IndexOutOfRange {
                    index: usize::from(index),
                    capacity,
                });
            }
        }
        if self.observers.get(slot).is_some_and(Option::is_some) {
            return Err(InfoError::ObserverAlreadyAllocated { observer: id });
        }
        if self.observers.len() <= slot {
            self.observers.resize_with(slot + 1, || None);
        }

        let mut observer = Observer::new(
            id,
            client,
            encoder_slot,
            local,
            self.config.revision.preferred_range,
            capacity,
        );
        let mut root = self.details_pool.acquire(|| WorldDetails::new(capacity));
        root.assign(WorldId::ROOT, local);
        observer.worlds.insert(WorldId::ROOT, root);
        self.observers[slot] = Some(observer);
        debug!(observer = id.0, ?client, ?local, "observer allocated");
        Ok(())
    }

    /// Removes an observer, releasing its worlds to the pool. Also the way to
    /// recover an observer destroyed by a processing error.
    pub fn deallocate_observer(&mut self, id: ObserverId) -> InfoResult<()> {
        let observer = self
            .observers
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(InfoError::ObserverNotAllocated { observer: id })?;
        for (_, details) in observer.worlds {
            self.details_pool.release(details);
        }
        debug!(observer = id.0, "observer deallocated");
        Ok(())
    }

    #[must_use]
    pub fn observer(&self, id: ObserverId) -> Option<&Observer> {
        self.observers.get(id.0 as usize)?.as_ref()
    }

    /// The observer for a mutator, or `None` if it has been destroyed.
    fn live_observer_mut(&mut self, id: ObserverId) -> InfoResult<Option<&mut Observer>> {
        let observer = self
            .observers
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(InfoError::ObserverNotAllocated { observer: id })?;
        Ok((!observer.is_destroyed()).then_some(observer))
    }

    /// Sets the position the root world is rendered around, for observers
    /// without their own avatar.
    pub fn update_observer_coord(
        &mut self,
        id: ObserverId,
        level: i32,
        x: i32,
        z: i32,
    ) -> InfoResult<()> {
        let coord = CoordGrid::new(level, x, z)?;
        if let Some(observer) = self.live_observer_mut(id)? {
            observer.view.coord = coord;
        }
        Ok(())
    }

    /// Changes the observer's preferred view range. With dynamic resizing the
    /// current range walks towards it one tile at a time.
    pub fn set_preferred_range(&mut self, id: ObserverId, range: u32) -> InfoResult<()> {
        let dynamic = self.config.revision.dynamic_resize;
        if let Some(observer) = self.live_observer_mut(id)? {
            observer.view.preferred_range = range;
            if !dynamic || observer.view.resize_range > range {
                observer.view.resize_range = range;
            }
        }
        Ok(())
    }

    /// Starts tracking dynamic world `world` for an observer.
    pub fn allocate_world(&mut self, id: ObserverId, world: WorldId) -> InfoResult<()> {
        if world.is_root() || !world.is_valid() {
            return Err(InfoError::InvalidWorld { world });
        }
        let capacity = self.config.revision.capacity;
        let Some(observer) = self
            .observers
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
        else {
            return Err(InfoError::ObserverNotAllocated { observer: id });
        };
        if observer.is_destroyed() {
            return Ok(());
        }
        if observer.worlds.contains_key(&world) {
            return Err(InfoError::WorldAlreadyAllocated { world });
        }
        let mut details = self.details_pool.acquire(|| WorldDetails::new(capacity));
        details.assign(world, observer.view.local);
        observer.worlds.insert(world, details);
        debug!(observer = id.0, world = world.0, "world allocated");
        Ok(())
    }

    /// Stops tracking a dynamic world. The root world cannot be destroyed.
    pub fn destroy_world(&mut self, id: ObserverId, world: WorldId) -> InfoResult<()> {
        if world.is_root() {
            return Err(InfoError::InvalidWorld { world });
        }
        let Some(observer) = self
            .observers
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
        else {
            return Err(InfoError::ObserverNotAllocated { observer: id });
        };
        if observer.is_destroyed() {
            return Ok(());
        }
        let details = observer
            .worlds
            .remove(&world)
            .ok_or(InfoError::WorldNotAllocated { world })?;
        if observer.view.active_world == world {
            observer.view.active_world = WorldId::ROOT;
        }
        for index in details.high_resolution_indices() {
            if observer.view.local != Some(index) {
                observer.view.appearance_cycles[usize::from(index)] = 0;
            }
        }
        self.details_pool.release(details);
        debug!(observer = id.0, world = world.0, "world destroyed");
        Ok(())
    }

    fn live_world_mut(
        &mut self,
        id: ObserverId,
        world: WorldId,
    ) -> InfoResult<Option<&mut WorldDetails>> {
        match self.live_observer_mut(id)? {
            Some(observer) => observer
                .worlds
                .get_mut(&world)
                .map(Some)
                .ok_or(InfoError::WorldNotAllocated { world }),
            None => Ok(None),
        }
    }

    /// Restricts which zones of `world` the observer has loaded. `None` lifts
    /// the restriction.
    pub fn update_build_area(
        &mut self,
        id: ObserverId,
        world: WorldId,
        area: Option<BuildArea>,
    ) -> InfoResult<()> {
        if let Some(details) = self.live_world_mut(id, world)? {
            details.build_area = area;
        }
        Ok(())
    }

    /// Sets the coordinate `world` is rendered around for the observer.
    pub fn update_render_coord(
        &mut self,
        id: ObserverId,
        world: WorldId,
        level: i32,
        x: i32,
        z: i32,
    ) -> InfoResult<()> {
        let coord = CoordGrid::new(level, x, z)?;
        if let Some(details) = self.live_world_mut(id, world)? {
            details.render_coord = Some(coord);
        }
        Ok(())
    }

    /// Selects the world whose packet carries the observer's own extended info.
    pub fn set_active_world(&mut self, id: ObserverId, world: WorldId) -> InfoResult<()> {
        if let Some(observer) = self.live_observer_mut(id)? {
            if !observer.worlds.contains_key(&world) {
                return Err(InfoError::WorldNotAllocated { world });
            }
            observer.view.active_world = world;
        }
        Ok(())
    }

    /// Shows `target` tinted to this observer only, for this tick.
    #[allow(clippy::too_many_arguments)]
    pub fn set_observer_tinting(
        &mut self,
        id: ObserverId,
        target: u16,
        start: i32,
        end: i32,
        hue: i32,
        saturation: i32,
        lightness: i32,
        weight: i32,
    ) -> InfoResult<()> {
        let protocol = self.config.revision.protocol;
        if !BlockKind::Tinting.supported_by(protocol) {
            return Err(ExtInfoError::Unsupported {
                kind: BlockKind::Tinting,
                protocol,
            }
            .into());
        }
        let capacity = self.config.revision.capacity;
        if usize::from(target) >= capacity {
            return Err(InfoError::IndexOutOfRange {
                index: usize::from(target),
                capacity,
            });
        }
        let tinting = validate_tinting(start, end, hue, saturation, lightness, weight)?;
        if let Some(observer) = self.live_observer_mut(id)? {
            observer.view.tinting.insert(target, tinting);
            observer.view.add_overlay(target, InfoFlags::TINTING);
        }
        Ok(())
    }

    /// First phase: movement, coarse positions and extended-info caches for
    /// every avatar. Must complete before [`encode`](Self::encode).
    pub fn prepare(&mut self) -> InfoResult<()> {
        let serialized = self.repository.prepare(&self.encoders)?;
        self.low_res.refresh(&self.repository)?;
        for observer in self.observers.iter_mut().flatten() {
            if let Some(avatar) = observer.view.local.and_then(|i| self.repository.get(i)) {
                observer.view.coord = avatar.coord();
            }
        }
        trace!(
            cycle = self.cycle,
            avatars = self.repository.len(),
            serialized,
            "prepared"
        );
        Ok(())
    }

    /// Second phase: builds every live observer's packets in parallel.
    ///
    /// A failure destroys only the observer it happened in; it is reported
    /// by [`packet`](Self::packet).
    pub fn encode(&mut self) {
        let ctx = TickContext {
            cycle: self.cycle,
            revision: &self.config.revision,
            repository: &self.repository,
            low_res: &self.low_res,
            encoders: &self.encoders,
            visibility: self.visibility.as_ref(),
            extended_info_filter: self.extended_info_filter.as_ref(),
            policy: self.policy.as_ref(),
        };
        let failed: usize = self
            .observers
            .par_iter_mut()
            .filter_map(Option::as_mut)
            .filter(|observer| !observer.is_destroyed())
            .map(|observer| match process_observer(&ctx, observer) {
                Ok(()) => 0,
                Err(err) => {
                    warn!(observer = observer.id().0, error = %err, "observer destroyed");
                    observer.error = Some(err);
                    1
                }
            })
            .sum();
        trace!(cycle = self.cycle, failed, "encoded");
    }

    /// Runs [`prepare`](Self::prepare) and [`encode`](Self::encode).
    pub fn tick(&mut self) -> InfoResult<()> {
        self.prepare()?;
        self.encode();
        Ok(())
    }

    /// The packet built for `world` by the last encode.
    pub fn packet(&self, id: ObserverId, world: WorldId) -> InfoResult<&[u8]> {
        let observer = self
            .observer(id)
            .ok_or(InfoError::ObserverNotAllocated { observer: id })?;
        if let Some(err) = observer.error() {
            return Err(InfoError::ObserverFailed {
                observer: id,
                source: Box::new(err.clone()),
            });
        }
        observer
            .world(world)
            .map(WorldDetails::buffer)
            .ok_or(InfoError::WorldNotAllocated { world })
    }

    /// Ends the tick: rolls coordinates forward, drops transient extended
    /// info and per-tick observer state, and advances the cycle.
    pub fn post_update(&mut self) {
        self.repository.post_update();
        self.low_res.swap();
        self.observers
            .par_iter_mut()
            .filter_map(Option::as_mut)
            .for_each(Observer::post_update);
        self.cycle = self.cycle.wrapping_add(1);
    }

    /// Drops pooled world details and avatars until at most `len` of each
    /// remain.
    pub fn shrink_pools(&mut self, len: usize) {
        self.details_pool.shrink_to(len);
        self.repository.shrink_pool(len);
        debug!(len, "pools shrunk");
    }

    /// World details available for reuse.
    #[must_use]
    pub fn pooled_details(&self) -> usize {
        self.details_pool.pooled()
    }
}
