//! Per-tick visibility and delta encoding for the infosync info packets.
//!
//! An [`InfoEngine`] owns every avatar of one info protocol (players, NPCs or
//! world entities) and every observer watching them. Each tick it decides,
//! per observer, which avatars are tracked at high resolution, which are
//! promoted or dropped, and encodes the result into one packet per observer
//! per world.
//!
//! # Tick phases
//!
//! 1. [`InfoEngine::prepare`] computes, once per avatar, its movement bits,
//!    its coarse position and its extended-info caches. Parallel over avatars.
//! 2. [`InfoEngine::encode`] builds every observer's packets from that shared
//!    state. Parallel over observers, no locks.
//! 3. [`InfoEngine::packet`] hands out the packets; a failure captured for one
//!    observer surfaces here as [`InfoError::ObserverFailed`].
//! 4. [`InfoEngine::post_update`] rolls per-tick state forward.
//!
//! # Design Principles
//!
//! - **Observers hold indices** - Avatars are looked up afresh each tick.
//! - **Serialize once** - Observers copy shared bytes and write only the
//!   blocks that depend on who is watching.
//! - **Isolate failures** - One broken observer never aborts the tick.

mod avatar;
mod config;
mod details;
mod engine;
mod error;
mod filter;
mod lowres_cache;
mod observer;
mod policy;
mod pool;
mod processor;
mod repository;

pub use avatar::Avatar;
pub use config::{EngineConfig, PoolConfig, MAX_CAPACITY};
pub use details::{WorldDetails, WorldId};
pub use engine::InfoEngine;
pub use error::{InfoError, InfoResult};
pub use filter::{AcceptAll, ExtendedInfoFilter, VisibilityFilter, WorstCaseFilter};
pub use lowres_cache::{LowResCache, UNUSED};
pub use observer::{Observer, ObserverId};
pub use policy::{DefaultPriorityPolicy, PriorityPolicy, PriorityTier};
pub use pool::{Pool, Reset};
pub use repository::AvatarRepository;

#[cfg(test)]
mod tests {
    use super::*;
    use extinfo::ClientEncoders;

    #[test]
    fn public_api_exports() {
        let _ = EngineConfig::player();
        let _ = WorldId::ROOT;
        let _ = ObserverId(0);
        let _ = PriorityTier::default();
        let _: InfoResult<()> = Ok(());
    }

    #[test]
    fn engine_builds_for_every_protocol() {
        for config in [
            EngineConfig::player(),
            EngineConfig::npc(),
            EngineConfig::world_entity(),
        ] {
            let engine = InfoEngine::new(config, ClientEncoders::standard()).unwrap();
            assert_eq!(engine.cycle(), 0);
        }
    }
}
