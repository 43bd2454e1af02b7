//! Per-level entity activation.
//!
//! [`EntityManager`] decides, every frame, which entities of a level take
//! part in simulation and rendering. Entities are routed at spawn time:
//! awake and detached ones go to an always-on container, the debug-mode
//! object to the debug container, and every other entity to the leaf of the
//! entity tree covering its position, where it is only processed while the
//! leaf intersects the region of interest.
//!
//! # Invariants
//! - Every registered entity lives in exactly one container at a time.
//! - A gated entity is never selected while outside the region of interest;
//!   awake and detached entities are selected regardless of it.
//! - Setting the same region of interest twice without intervening spawns,
//!   moves or world resizes does not refresh the partition.
//! - Spawned entities are retained by the [`ReferenceGuard`] until the guard
//!   is cleared, so rebalancing never lets them be collected.
//! - Entity ids round-trip through their textual form.

mod config;
mod error;
mod guard;
mod manager;

pub use config::ActivationConfig;
pub use error::{ConfigError, SpawnError};
pub use guard::ReferenceGuard;
pub use manager::{DEBUG_MODE_OBJECT, EntityManager, MSG_EXIT, MSG_LATE_UPDATE, ManagerStats};

pub fn crate_info() -> &'static str {
    "trellis-level v0.1.0"
}
