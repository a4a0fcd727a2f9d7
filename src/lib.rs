//! Fruit Catch - a catch-the-falling-items arcade game and its trainer
//!
//! Core modules:
//! - `sim`: Deterministic simulation (motion, collisions, spawning, observations)
//! - `harness`: Parallel fitness evaluation over a worker pool
//! - `controller`: Controller interface and the feed-forward network controller
//! - `evolve`: Population-based optimizer driving the harness
//! - `session`: Interactive/watch sessions and the rendering boundary
//! - `persistence`: Winner and checkpoint save/load

pub mod config;
pub mod controller;
pub mod error;
pub mod evolve;
pub mod harness;
pub mod persistence;
pub mod platform;
pub mod session;
pub mod sim;
pub mod stats;

pub use config::{BombPlacement, Mode, SimConfig, SpawnTiming, TrainingConfig};
pub use controller::{Controller, FnController, Genome, Network};
pub use error::{ConfigError, EpisodeError, HarnessError, PersistenceError, SimError, TrainError};
pub use evolve::{Checkpoint, Population};
pub use harness::Evaluator;
pub use stats::Statistics;

/// Game configuration constants
pub mod consts {
    /// Logical world dimensions (independent of any rendering resolution)
    pub const WORLD_WIDTH: f32 = 800.0;
    pub const WORLD_HEIGHT: f32 = 600.0;

    /// Player box size
    pub const PLAYER_WIDTH: f32 = 100.0;
    pub const PLAYER_HEIGHT: f32 = 100.0;
    /// Horizontal displacement per acting tick
    pub const PLAYER_SPEED: f32 = 10.0;

    /// Falling item box size
    pub const ITEM_SIZE: f32 = 30.0;
    /// Per-tick fall speed range (inclusive), in world units
    pub const MIN_ITEM_VELOCITY: u8 = 4;
    pub const MAX_ITEM_VELOCITY: u8 = 10;
    /// Number of cosmetic fruit sprites
    pub const FRUIT_VARIANTS: u8 = 5;
    /// Probability that a spawned item is a fruit
    pub const FRUIT_PROBABILITY: f64 = 0.8;

    /// Milliseconds between spawns
    pub const SPAWN_RATE_MS: u32 = 500;
    /// Nominal tick length (60 steps per second)
    pub const TICK_MS: u32 = 16;
    /// Training episodes stop after this many ticks
    pub const TRAINING_STEP_LIMIT: u32 = 2000;

    /// Interactive score per fruit
    pub const FRUIT_SCORE: u32 = 1;
    /// Training fitness per fruit
    pub const FRUIT_REWARD: f64 = 100.0;
    /// Training fitness lost on a bomb hit
    pub const BOMB_PENALTY: f64 = 1000.0;
    /// Training fitness per tick survived
    pub const SURVIVAL_REWARD: f64 = 0.1;
    /// Fitness assigned to a run that faulted (same as a bomb on the first tick)
    pub const MIN_FITNESS: f64 = -BOMB_PENALTY;

    /// Velocity normalizer used by the observation encoder
    pub const VELOCITY_SCALE: f32 = 10.0;
}

/// Board diagonal, the universal distance normalizer
#[inline]
pub fn max_distance(width: f32, height: f32) -> f32 {
    (width * width + height * height).sqrt()
}
