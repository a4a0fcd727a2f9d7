//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed per-tick motion, independent of frame timing
//! - Seeded RNG only, owned by each run
//! - Stable iteration order (spawn order)
//! - No rendering or platform dependencies

pub mod collision;
pub mod instance;
pub mod observe;
pub mod spawn;
pub mod state;
pub mod tick;

pub use collision::Rect;
pub use instance::{RunStatus, Simulation, StepOutcome, TerminationReason};
pub use observe::{OBSERVATION_LEN, Observation, encode, nearest_items};
pub use spawn::maybe_spawn;
pub use state::{Item, ItemKind, Payoff, Player, SimulationState};
pub use tick::{Action, TickOutcome, advance};
