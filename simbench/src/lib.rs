//! Deterministic simulation of a crowd watched by many observers.
//!
//! A [`Simulation`] drives an [`InfoEngine`] with seeded random walks and
//! extended-info traffic, and reports packet sizes and tick timings as a
//! serializable [`Summary`].
//!
//! # Design Principles
//!
//! - **Reproducible** - The same [`SimConfig`] always produces the same packets.
//! - **Protocol-aware** - Only blocks the simulated protocol carries are set.
//! - **Measurable** - Output format suitable for CI regression tracking.

use std::time::Instant;

use engine::{EngineConfig, InfoEngine, InfoResult, ObserverId, WorldId};
use extinfo::{Appearance, BlockKind, ClientEncoders, ClientType, Hitsplat};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wire::InfoProtocol;

/// Tiles around the centre avatars are spawned in.
const SPAWN_SPREAD: i32 = 48;
const CENTRE: i32 = 3200;

/// What to simulate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub protocol: InfoProtocol,
    /// Avatars in the world, observers' own avatars included.
    pub avatars: u16,
    pub observers: u16,
    pub ticks: u32,
    pub seed: u64,
    /// Percentage of avatars that move each tick.
    pub move_percent: u32,
    /// Ticks between appearance changes of every avatar, where supported.
    pub appearance_every: Option<u32>,
    /// Engine configuration; the protocol's defaults when absent.
    pub engine: Option<EngineConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            protocol: InfoProtocol::Player,
            avatars: 500,
            observers: 100,
            ticks: 100,
            seed: 1,
            move_percent: 60,
            appearance_every: Some(50),
            engine: None,
        }
    }
}

impl SimConfig {
    fn engine_config(&self) -> EngineConfig {
        self.engine
            .clone()
            .unwrap_or_else(|| EngineConfig::for_protocol(self.protocol))
    }
}

/// Linear congruential generator; deterministic across platforms.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1);
        (self.state >> 32) as u32
    }

    /// Uniform value in `min..=max`.
    pub fn range_i32(&mut self, min: i32, max: i32) -> i32 {
        let span = max.abs_diff(min) + 1;
        min + (self.next_u32() % span) as i32
    }
}

/// Aggregated results of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub protocol: Option<InfoProtocol>,
    pub avatars: u16,
    pub observers: u16,
    pub ticks: u32,
    pub seed: u64,
    pub packets: u64,
    pub packet_bytes_total: u64,
    pub avg_packet_bytes: u64,
    pub p95_packet_bytes: u64,
    pub max_packet_bytes: u64,
    pub avg_high_resolution: u64,
    pub failed_observers: u32,
    pub avg_tick_us: u64,
    pub p95_tick_us: u64,
    #[serde(skip)]
    packet_sizes: Vec<u64>,
    #[serde(skip)]
    tick_us: Vec<u64>,
    #[serde(skip)]
    high_resolution_total: u64,
}

impl Summary {
    fn new(config: &SimConfig) -> Self {
        Self {
            protocol: Some(config.protocol),
            avatars: config.avatars,
            observers: config.observers,
            ticks: config.ticks,
            seed: config.seed,
            ..Self::default()
        }
    }

    fn finalize(&mut self) {
        if self.packets > 0 {
            self.avg_packet_bytes = self.packet_bytes_total / self.packets;
            self.avg_high_resolution = self.high_resolution_total / self.packets;
            self.p95_packet_bytes = p95(&mut self.packet_sizes);
            self.max_packet_bytes = self.packet_sizes.last().copied().unwrap_or_default();
        }
        if !self.tick_us.is_empty() {
            let total: u64 = self.tick_us.iter().sum();
            self.avg_tick_us = total / self.tick_us.len() as u64;
            self.p95_tick_us = p95(&mut self.tick_us);
        }
    }
}

fn p95(values: &mut [u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    let idx = (values.len() * 95).div_ceil(100);
    values[idx.saturating_sub(1).min(values.len() - 1)]
}

/// An engine plus the scripted crowd driving it.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    engine: InfoEngine,
    rng: Rng,
    observers: Vec<ObserverId>,
    tick: u32,
}

impl Simulation {
    /// Spawns the crowd and registers the observers. On the player protocol
    /// the first `observers` avatars are the observers' own; on the others
    /// observers watch from a fixed point.
    pub fn new(config: SimConfig) -> InfoResult<Self> {
        let mut engine = InfoEngine::new(config.engine_config(), ClientEncoders::standard())?;
        let mut rng = Rng::new(config.seed);
        let protocol = engine.revision().protocol;

        for index in 0..config.avatars {
            let x = CENTRE + rng.range_i32(-SPAWN_SPREAD, SPAWN_SPREAD);
            let z = CENTRE + rng.range_i32(-SPAWN_SPREAD, SPAWN_SPREAD);
            engine.allocate_avatar(index)?.update_coord(0, x, z)?;
        }

        let mut observers = Vec::with_capacity(usize::from(config.observers));
        for n in 0..config.observers {
            let id = ObserverId(u32::from(n));
            let client = if n % 4 == 3 {
                ClientType::Mobile
            } else {
                ClientType::Desktop
            };
            let local = (protocol == InfoProtocol::Player && n < config.avatars).then_some(n);
            engine.allocate_observer(id, client, local)?;
            if local.is_none() {
                let x = CENTRE + rng.range_i32(-SPAWN_SPREAD, SPAWN_SPREAD);
                let z = CENTRE + rng.range_i32(-SPAWN_SPREAD, SPAWN_SPREAD);
                engine.update_observer_coord(id, 0, x, z)?;
            }
            observers.push(id);
        }
        debug!(
            ?protocol,
            avatars = config.avatars,
            observers = observers.len(),
            "simulation ready"
        );
        Ok(Self {
            config,
            engine,
            rng,
            observers,
            tick: 0,
        })
    }

    #[must_use]
    pub const fn engine(&self) -> &InfoEngine {
        &self.engine
    }

    /// Moves avatars and queues this tick's extended info.
    pub fn step(&mut self) -> InfoResult<()> {
        self.tick += 1;
        let protocol = self.engine.revision().protocol;
        let dress = self
            .config
            .appearance_every
            .is_some_and(|every| every > 0 && (self.tick - 1) % every == 0)
            && BlockKind::Appearance.supported_by(protocol);

        for index in 0..self.config.avatars {
            let roll = self.rng.next_u32() % 100;
            let step = (self.rng.range_i32(-1, 1), self.rng.range_i32(-1, 1));
            let Some(avatar) = self.engine.avatar_mut(index) else {
                continue;
            };
            if roll < self.config.move_percent {
                let coord = avatar.coord();
                let x = (i32::from(coord.x()) + step.0).clamp(CENTRE - 64, CENTRE + 64);
                let z = (i32::from(coord.z()) + step.1).clamp(CENTRE - 64, CENTRE + 64);
                avatar.update_coord(0, x, z)?;
            }

            let info = avatar.extended_info_mut();
            if dress {
                info.set_appearance(Appearance {
                    name: format!("sim{index}"),
                    combat_level: (roll % 126) as u8 + 3,
                    ..Appearance::default()
                })?;
            }
            match roll % 20 {
                0 => info.set_sequence(808 + (roll as i32), 0)?,
                1 if BlockKind::Hit.supported_by(protocol) => info.add_hitsplat(Hitsplat {
                    source: Some(u32::from(index.wrapping_add(1) % self.config.avatars.max(1))),
                    self_type: 1,
                    other_type: 2,
                    value: (roll % 40) as u16,
                    delay: 0,
                })?,
                2 if BlockKind::Say.supported_by(protocol) => info.set_say("Buying gf")?,
                3 if BlockKind::SpotAnim.supported_by(protocol) => {
                    info.set_spot_anim(0, 86, 0, 92)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Runs one full tick and records it into `summary`.
    fn tick_into(&mut self, summary: &mut Summary) -> InfoResult<()> {
        self.step()?;
        let start = Instant::now();
        self.engine.tick()?;
        summary
            .tick_us
            .push(u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX));

        for &id in &self.observers {
            let Ok(packet) = self.engine.packet(id, WorldId::ROOT) else {
                summary.failed_observers += 1;
                continue;
            };
            let len = packet.len() as u64;
            summary.packets += 1;
            summary.packet_bytes_total += len;
            summary.packet_sizes.push(len);
            if let Some(details) = self
                .engine
                .observer(id)
                .and_then(|observer| observer.world(WorldId::ROOT))
            {
                summary.high_resolution_total += details.high_resolution_count() as u64;
            }
        }
        self.engine.post_update();
        Ok(())
    }

    /// Runs every configured tick.
    pub fn run(&mut self) -> InfoResult<Summary> {
        let mut summary = Summary::new(&self.config);
        for _ in 0..self.config.ticks {
            self.tick_into(&mut summary)?;
        }
        summary.finalize();
        info!(
            ticks = summary.ticks,
            avg_packet_bytes = summary.avg_packet_bytes,
            avg_tick_us = summary.avg_tick_us,
            "simulation finished"
        );
        Ok(summary)
    }
}
