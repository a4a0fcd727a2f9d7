//! Simulation and training configuration
//!
//! Both configs are plain serde data. They are validated once, at
//! construction of whatever consumes them, and never patched up silently.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{ConfigError, PersistenceError};

/// Which rule set a simulation scores with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Mode {
    /// Human/watch play: integer score, run ends on a bomb
    Interactive,
    /// Fitness evaluation: survival and fruit rewards, bomb penalty, step limit
    #[default]
    Training,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Interactive => "interactive",
            Mode::Training => "training",
        }
    }
}

/// Where bombs appear horizontally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BombPlacement {
    /// Uniformly random x, like fruit
    Random,
    /// Directly above the player's current x
    AtPlayer,
}

/// What happens to the spawn timer when it passes the spawn rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SpawnTiming {
    /// Reset to zero, dropping any overshoot
    #[default]
    Reset,
    /// Subtract the spawn rate, keeping the overshoot
    Carry,
}

/// Rules and dimensions for one simulation run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub mode: Mode,
    pub width: f32,
    pub height: f32,
    /// Milliseconds between item spawns
    pub spawn_rate_ms: u32,
    /// Milliseconds fed to the spawn timer per headless tick
    pub tick_ms: u32,
    /// Ticks after which the run ends with `StepLimitReached`
    pub step_limit: Option<u32>,
    pub bomb_placement: BombPlacement,
    pub spawn_timing: SpawnTiming,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::training()
    }
}

impl SimConfig {
    /// Rules used when scoring controllers
    pub fn training() -> Self {
        Self {
            mode: Mode::Training,
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
            spawn_rate_ms: SPAWN_RATE_MS,
            tick_ms: TICK_MS,
            step_limit: Some(TRAINING_STEP_LIMIT),
            bomb_placement: BombPlacement::AtPlayer,
            spawn_timing: SpawnTiming::Reset,
        }
    }

    /// Rules used for human play and for watching a trained controller
    pub fn interactive() -> Self {
        Self {
            mode: Mode::Interactive,
            step_limit: None,
            bomb_placement: BombPlacement::Random,
            ..Self::training()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Written so NaN fails too
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(ConfigError::NonPositiveWorld {
                width: self.width,
                height: self.height,
            });
        }
        if self.width < PLAYER_WIDTH.max(ITEM_SIZE) || self.height < PLAYER_HEIGHT {
            return Err(ConfigError::WorldTooSmall {
                width: self.width,
                height: self.height,
                player_width: PLAYER_WIDTH,
                player_height: PLAYER_HEIGHT,
            });
        }
        if self.spawn_rate_ms == 0 {
            return Err(ConfigError::ZeroSpawnRate);
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroTickLength);
        }
        if self.step_limit == Some(0) {
            return Err(ConfigError::ZeroStepLimit);
        }
        Ok(())
    }
}

/// Knobs for a training session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub population_size: usize,
    pub generations: u32,
    /// Worker threads; `None` leaves one core for the orchestrator
    pub workers: Option<usize>,
    /// Write a checkpoint every this many generations (0 disables)
    pub checkpoint_interval: u32,
    pub hidden_nodes: usize,
    /// Per-weight mutation probability
    pub mutation_rate: f32,
    /// Maximum absolute weight perturbation
    pub mutation_power: f32,
    /// Best genomes copied unchanged into the next generation
    pub elitism: usize,
    pub tournament_size: usize,
    /// Master seed for population init, breeding and episode seeds
    pub seed: u64,
    /// Where checkpoints and the winner are written
    pub output_dir: PathBuf,
    pub sim: SimConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            generations: 50,
            workers: None,
            checkpoint_interval: 10,
            hidden_nodes: 6,
            mutation_rate: 0.1,
            mutation_power: 0.5,
            elitism: 2,
            tournament_size: 3,
            seed: 0x5EED_F00D,
            output_dir: PathBuf::from("."),
            sim: SimConfig::training(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::PopulationTooSmall {
                min: 2,
                actual: self.population_size,
            });
        }
        if self.generations == 0 {
            return Err(ConfigError::ZeroGenerations);
        }
        if self.workers == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::OutOfUnitRange {
                field: "mutation_rate",
                value: self.mutation_rate,
            });
        }
        if !self.mutation_power.is_finite() || self.mutation_power < 0.0 {
            return Err(ConfigError::MutationPower(self.mutation_power));
        }
        if self.tournament_size == 0 || self.tournament_size > self.population_size {
            return Err(ConfigError::TournamentSize {
                size: self.tournament_size,
                population: self.population_size,
            });
        }
        self.sim.validate()
    }

    /// Worker pool size: configured, or available parallelism minus one
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_worker_count)
    }

    /// Load a config from a JSON file; missing fields take defaults
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        let text = fs::read_to_string(path).map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| PersistenceError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded training config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| PersistenceError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Available parallelism minus one, never below one
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}
