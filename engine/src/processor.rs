//! Per-observer encoding: visibility, the four resolution passes and the
//! extended-info tail.
//!
//! Every pass walks its indices in ascending order and writes one record per
//! index that changed, folding runs of unchanged indices into skip runs:
//!
//! 1. high resolution, skipped last tick
//! 2. high resolution, written last tick
//! 3. low resolution, written last tick
//! 4. low resolution, skipped last tick
//!
//! The bit section is padded to a byte boundary and followed by the
//! extended-info records queued by the passes, in queue order.

use bitstream::{BitWriter, PackedBits, ScopedBitWriter};
use extinfo::{BlockKind, ClientEncoders, ExtendedInfoEncoder, InfoFlags, ObserverBlock};
use wire::{
    write_skip_run, CoordGrid, ProtocolRevision, EXTENDED_INFO_TERMINATOR, OPCODE_BITS,
    OPCODE_NONE, PROMOTION_COORD_BITS,
};

use crate::avatar::Avatar;
use crate::details::{WorldDetails, WorldId};
use crate::error::{InfoError, InfoResult};
use crate::filter::{ExtendedInfoFilter, VisibilityFilter};
use crate::lowres_cache::LowResCache;
use crate::observer::{Observer, ObserverView};
use crate::policy::{PriorityPolicy, PriorityTier};
use crate::repository::AvatarRepository;

const PROMOTION_COORD_MASK: u32 = (1 << PROMOTION_COORD_BITS) - 1;

/// Read-only state shared by every observer during one encode phase.
pub(crate) struct TickContext<'a> {
    pub(crate) cycle: u32,
    pub(crate) revision: &'a ProtocolRevision,
    pub(crate) repository: &'a AvatarRepository,
    pub(crate) low_res: &'a LowResCache,
    pub(crate) encoders: &'a ClientEncoders,
    pub(crate) visibility: &'a dyn VisibilityFilter,
    pub(crate) extended_info_filter: &'a dyn ExtendedInfoFilter,
    pub(crate) policy: &'a dyn PriorityPolicy,
}

/// Encodes every world of `observer` and adjusts its view range.
pub(crate) fn process_observer(ctx: &TickContext<'_>, observer: &mut Observer) -> InfoResult<()> {
    let Observer { view, worlds, .. } = observer;
    for details in worlds.values_mut() {
        WorldPass::new(ctx, view, details).run()?;
    }
    if ctx.revision.dynamic_resize {
        if let Some(root) = worlds.get(&WorldId::ROOT) {
            resize(ctx.revision, view, root.high_res_count);
        }
    }
    Ok(())
}

/// Shrinks the view range while the high-resolution list is full and grows it
/// back one tile per `resize_grow_delay` ticks below capacity.
pub(crate) fn resize(revision: &ProtocolRevision, view: &mut ObserverView, high_res_count: usize) {
    if high_res_count >= revision.max_high_resolution {
        view.resize_range = view.resize_range.saturating_sub(1);
        view.resize_counter = 0;
    } else if view.resize_range < view.preferred_range {
        view.resize_counter += 1;
        if view.resize_counter >= revision.resize_grow_delay {
            view.resize_range += 1;
            view.resize_counter = 0;
        }
    } else {
        view.resize_counter = 0;
    }
}

/// Encodes one world of one observer.
struct WorldPass<'t, 'v> {
    ctx: &'t TickContext<'t>,
    view: &'v mut ObserverView,
    details: &'v mut WorldDetails,
    skips: u32,
}

impl<'t, 'v> WorldPass<'t, 'v> {
    fn new(
        ctx: &'t TickContext<'t>,
        view: &'v mut ObserverView,
        details: &'v mut WorldDetails,
    ) -> Self {
        Self {
            ctx,
            view,
            details,
            skips: 0,
        }
    }

    fn run(mut self) -> InfoResult<()> {
        self.details.extended_info_queue.clear();
        self.details.rebuild_indices(self.view.local);

        let mut buffer = std::mem::take(&mut self.details.buffer);
        buffer.clear();
        let result = self.encode(&mut buffer);
        self.details.buffer = buffer;
        result
    }

    fn encode(&mut self, buffer: &mut Vec<u8>) -> InfoResult<()> {
        {
            let mut bits = ScopedBitWriter::new(buffer);
            self.high_resolution(&mut bits, true)?;
            self.high_resolution(&mut bits, false)?;
            self.select_promotions();
            self.low_resolution(&mut bits, false)?;
            self.low_resolution(&mut bits, true)?;
            if !self.details.extended_info_queue.is_empty()
                && self.ctx.revision.extended_info_terminator
            {
                bits.write_bits(EXTENDED_INFO_TERMINATOR, 16)?;
            }
        }
        self.extended_info(buffer)
    }

    /// Coordinate the world is rendered around. The root world falls back to
    /// the observer's own position.
    fn render_coord(&self) -> Option<CoordGrid> {
        match self.details.render_coord {
            Some(coord) => Some(coord),
            None if self.details.world.is_root() && self.view.coord.is_valid() => {
                Some(self.view.coord)
            }
            None => None,
        }
    }

    /// Built-in checks followed by the pluggable filter.
    fn is_visible(&self, avatar: &Avatar, render: Option<CoordGrid>) -> bool {
        if avatar.is_hidden() || avatar.world() != self.details.world {
            return false;
        }
        let coord = avatar.coord();
        if self
            .details
            .build_area
            .is_some_and(|area| !area.contains(coord))
        {
            return false;
        }
        let Some(render) = render else {
            return false;
        };
        let range = self.ctx.policy.view_range(
            avatar.priority(),
            self.view.resize_range,
            self.view.preferred_range,
        );
        render.in_distance(coord, range)
            && self.ctx.visibility.accept(self.view.id.0, avatar.index())
    }

    /// Picks this tick's promotions: highest tier first, then nearest, then
    /// lowest index, bounded by the slots left after this tick's removals and
    /// by per-tier caps.
    fn select_promotions(&mut self) {
        let free = self
            .ctx
            .revision
            .max_high_resolution
            .saturating_sub(self.details.high_res_count);
        if free == 0 {
            return;
        }
        let Some(render) = self.render_coord() else {
            return;
        };
        let mut candidates: Vec<(PriorityTier, u32, u16)> = self
            .details
            .low_res_indices
            .iter()
            .filter_map(|&index| self.ctx.repository.get(index))
            .filter(|avatar| self.is_visible(avatar, Some(render)))
            .map(|avatar| (avatar.priority(), render.chebyshev(avatar.coord()), avatar.index()))
            .collect();
        candidates.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let caps = &self.ctx.revision.tier_caps;
        let mut counts = self.details.tier_counts;
        let mut remaining = free;
        for (tier, _, index) in candidates {
            if remaining == 0 {
                break;
            }
            let cap = match tier {
                PriorityTier::Low => caps.low,
                PriorityTier::Normal => caps.normal,
                PriorityTier::High => caps.high,
            };
            if counts[tier.index()] >= cap {
                continue;
            }
            counts[tier.index()] += 1;
            remaining -= 1;
            self.details.promotions.set(usize::from(index), true);
        }
    }

    fn flush_skips(&mut self, bits: &mut BitWriter) -> InfoResult<()> {
        if self.skips > 0 {
            write_skip_run(bits, self.skips)?;
            self.skips = 0;
        }
        Ok(())
    }

    fn skip(&mut self, index: u16) {
        self.skips += 1;
        self.details.mark_stationary(index);
    }

    /// Flags to send for `avatar` this tick: its own plus this observer's
    /// overlay. The observer's own avatar sends nothing outside the active
    /// world.
    fn pending_flags(&self, avatar: &Avatar) -> InfoFlags {
        let index = avatar.index();
        if self.view.local == Some(index) && self.details.world != self.view.active_world {
            return InfoFlags::empty();
        }
        avatar.extended_info().flags() | self.view.overlay_flags(index)
    }

    /// Queues `flags` if there is room. Returns whether it was queued.
    ///
    /// A full queue untracks the avatar so its sticky blocks are resent on a
    /// later tick.
    fn queue_extended_info(&mut self, index: u16, flags: InfoFlags) -> bool {
        if flags.is_empty() {
            return false;
        }
        if self.details.extended_info_queue.len()
            >= self.ctx.revision.max_extended_info_per_tick
        {
            self.details.ext_tracked.set(usize::from(index), false);
            return false;
        }
        self.details.extended_info_queue.push((index, flags));
        true
    }

    /// Resends sticky blocks the observer has not seen.
    fn refresh_stale(&mut self, avatar: &Avatar) {
        let index = avatar.index();
        let seen = self.view.appearance_cycles[usize::from(index)];
        let stale = avatar.extended_info().stale_flags(seen);
        if stale.is_empty() {
            self.details.ext_tracked.set(usize::from(index), true);
        } else {
            self.view.add_overlay(index, stale);
        }
    }

    fn high_resolution(&mut self, bits: &mut BitWriter, stationary: bool) -> InfoResult<()> {
        let repository = self.ctx.repository;
        for i in 0..self.details.high_res_indices.len() {
            let index = self.details.high_res_indices[i];
            if self.details.is_stationary(index) != stationary {
                continue;
            }
            let is_local = self.view.local == Some(index);
            let avatar = repository.get(index);
            let keep = match avatar {
                Some(avatar) if is_local => Some(avatar),
                Some(avatar)
                    if avatar.allocate_cycle() != self.ctx.cycle
                        && self.is_visible(avatar, self.render_coord()) =>
                {
                    Some(avatar)
                }
                None if is_local => return Err(InfoError::MissingAvatar { index }),
                _ => None,
            };
            let Some(avatar) = keep else {
                self.flush_skips(bits)?;
                bits.write_bool(true);
                bits.write_bool(false);
                bits.write_bits(OPCODE_NONE, OPCODE_BITS)?;
                // no low-resolution update follows
                bits.write_bool(false);
                self.details.remove_high_resolution(index);
                // a later occupant of the slot restarts its appearance counter
                self.view.appearance_cycles[usize::from(index)] = 0;
                continue;
            };

            if !self.details.is_extended_info_tracked(index) {
                self.refresh_stale(avatar);
            }
            let flags = self.pending_flags(avatar);
            let movement = avatar.movement();
            let queued = self.queue_extended_info(index, flags);
            if movement.is_none() && !queued {
                self.skip(index);
                continue;
            }
            self.flush_skips(bits)?;
            bits.write_bool(true);
            bits.write_bool(queued);
            match movement {
                Some(movement) => bits.write_packed(movement),
                None => bits.write_bits(OPCODE_NONE, OPCODE_BITS)?,
            }
        }
        self.flush_skips(bits)
    }

    fn low_resolution(&mut self, bits: &mut BitWriter, stationary: bool) -> InfoResult<()> {
        let repository = self.ctx.repository;
        let root = self.details.world.is_root();
        for i in 0..self.details.low_res_indices.len() {
            let index = self.details.low_res_indices[i];
            if self.details.is_stationary(index) != stationary {
                continue;
            }
            let movement = if root {
                self.ctx.low_res.movement(index)
            } else {
                None
            };
            if self.details.promotions[usize::from(index)] {
                let avatar = repository
                    .get(index)
                    .ok_or(InfoError::MissingAvatar { index })?;
                self.flush_skips(bits)?;
                self.promote(bits, avatar, movement)?;
            } else if let Some(movement) = movement {
                self.flush_skips(bits)?;
                bits.write_bool(true);
                bits.write_packed(movement);
            } else {
                self.skip(index);
            }
        }
        self.flush_skips(bits)
    }

    fn promote(
        &mut self,
        bits: &mut BitWriter,
        avatar: &Avatar,
        movement: Option<PackedBits>,
    ) -> InfoResult<()> {
        let index = avatar.index();
        bits.write_bool(true);
        bits.write_bits(OPCODE_NONE, OPCODE_BITS)?;
        match movement {
            Some(movement) => {
                bits.write_bool(true);
                bits.write_packed(movement);
            }
            None => bits.write_bool(false),
        }
        let coord = avatar.coord();
        bits.write_bits(u32::from(coord.x()) & PROMOTION_COORD_MASK, PROMOTION_COORD_BITS)?;
        bits.write_bits(u32::from(coord.z()) & PROMOTION_COORD_MASK, PROMOTION_COORD_BITS)?;

        self.details.add_high_resolution(index, avatar.priority());
        self.refresh_stale(avatar);
        let flags = self.pending_flags(avatar);
        bits.write_bool(self.queue_extended_info(index, flags));
        Ok(())
    }

    /// Writes queued records after the bit section, deferring those that do
    /// not fit the packet budget.
    fn extended_info(&mut self, buffer: &mut Vec<u8>) -> InfoResult<()> {
        let ctx = self.ctx;
        let client = self.view.client;
        let encoder = ctx
            .encoders
            .get(self.view.encoder_slot)
            .ok_or(InfoError::MissingEncoder { client })?;
        let queue = std::mem::take(&mut self.details.extended_info_queue);
        let result = self.write_records(encoder, &queue, buffer);
        self.details.extended_info_queue = queue;
        result
    }

    fn write_records(
        &mut self,
        encoder: &dyn ExtendedInfoEncoder,
        queue: &[(u16, InfoFlags)],
        buffer: &mut Vec<u8>,
    ) -> InfoResult<()> {
        let ctx = self.ctx;
        let revision = ctx.revision;
        for (i, &(index, flags)) in queue.iter().enumerate() {
            let slot = usize::from(index);
            let avatar = ctx
                .repository
                .get(index)
                .ok_or(InfoError::MissingAvatar { index })?;
            let remaining_avatars = queue.len() - i - 1;
            let remaining_bytes = revision.max_packet_bytes.saturating_sub(buffer.len());
            let forced = i == 0 && revision.never_defer_first;
            let previously_observed = self.details.ext_tracked[slot];

            if !forced
                && !ctx.extended_info_filter.accept(
                    remaining_bytes,
                    flags,
                    remaining_avatars,
                    previously_observed,
                )
            {
                buffer.push(0);
                self.details.ext_tracked.set(slot, false);
                continue;
            }

            let start = buffer.len();
            self.write_record(encoder, avatar, flags, buffer)?;
            if !forced && buffer.len() - start > remaining_bytes.saturating_sub(remaining_avatars) {
                buffer.truncate(start);
                buffer.push(0);
                self.details.ext_tracked.set(slot, false);
                continue;
            }

            self.details.ext_tracked.set(slot, true);
            if flags.contains(InfoFlags::APPEARANCE) {
                self.view.appearance_cycles[slot] =
                    avatar.extended_info().appearance_change_counter();
            }
        }
        Ok(())
    }

    fn write_record(
        &self,
        encoder: &dyn ExtendedInfoEncoder,
        avatar: &Avatar,
        flags: InfoFlags,
        buffer: &mut Vec<u8>,
    ) -> InfoResult<()> {
        let index = avatar.index();
        let info = avatar.extended_info();
        encoder.encode_flags(flags, buffer);
        for &kind in encoder.block_order() {
            if !flags.contains(kind.flag()) {
                continue;
            }
            match kind {
                BlockKind::Hit => encoder.encode_observer_block(
                    ObserverBlock::Hit {
                        hit: info.hit(),
                        observer: self.view.local.map(u32::from),
                        own_avatar: self.view.local == Some(index),
                    },
                    buffer,
                ),
                BlockKind::Tinting => {
                    let tinting = self.view.tinting.get(&index).unwrap_or(info.tinting());
                    encoder.encode_observer_block(ObserverBlock::Tinting(tinting), buffer);
                }
                _ => {
                    let bytes = info
                        .precomputed(kind, self.view.encoder_slot)
                        .ok_or(InfoError::MissingPrecompute { index, kind })?;
                    buffer.extend_from_slice(bytes);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use extinfo::ClientType;

    use super::*;
    use crate::observer::ObserverId;

    fn view(range: u32) -> ObserverView {
        Observer::new(ObserverId(0), ClientType::Desktop, 0, None, range, 8).view
    }

    #[test]
    fn resize_shrinks_at_capacity() {
        let revision = ProtocolRevision::player();
        let mut view = view(15);
        resize(&revision, &mut view, revision.max_high_resolution);
        assert_eq!(view.resize_range, 14);
        resize(&revision, &mut view, revision.max_high_resolution);
        assert_eq!(view.resize_range, 13);
    }

    #[test]
    fn resize_grows_after_delay() {
        let revision = ProtocolRevision::player();
        let mut view = view(15);
        view.resize_range = 10;
        for _ in 0..revision.resize_grow_delay - 1 {
            resize(&revision, &mut view, 0);
        }
        assert_eq!(view.resize_range, 10);
        resize(&revision, &mut view, 0);
        assert_eq!(view.resize_range, 11);
        assert_eq!(view.resize_counter, 0);
    }

    #[test]
    fn resize_never_exceeds_preferred() {
        let revision = ProtocolRevision::player();
        let mut view = view(15);
        for _ in 0..100 {
            resize(&revision, &mut view, 0);
        }
        assert_eq!(view.resize_range, 15);
    }

    #[test]
    fn resize_saturates_at_zero() {
        let revision = ProtocolRevision::player();
        let mut view = view(1);
        for _ in 0..3 {
            resize(&revision, &mut view, revision.max_high_resolution);
        }
        assert_eq!(view.resize_range, 0);
    }
}
