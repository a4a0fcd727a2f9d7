//! One simulation run
//!
//! Owns a world, its RNG and its run status. A run goes `Running` ->
//! `Terminated(reason)` exactly once; a new instance is needed to play again.

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::observe::{Observation, encode};
use super::spawn::maybe_spawn;
use super::state::{Item, SimulationState};
use super::tick::{Action, TickOutcome, advance};
use crate::config::{Mode, SimConfig};
use crate::consts::SURVIVAL_REWARD;
use crate::error::{ConfigError, SimError};

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationReason {
    BombHit,
    StepLimitReached,
    UserQuit,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::BombHit => "bomb_hit",
            TerminationReason::StepLimitReached => "step_limit",
            TerminationReason::UserQuit => "user_quit",
        }
    }
}

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Terminated(TerminationReason),
}

impl RunStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, RunStatus::Running)
    }
}

/// Result of a single `step`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub tick: TickOutcome,
    /// Item spawned at the end of the step, if any
    pub spawned: Option<Item>,
    pub status: RunStatus,
}

/// A self-contained run: world, RNG, rules and status
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimConfig,
    state: SimulationState,
    rng: Pcg32,
    seed: u64,
    status: RunStatus,
}

impl Simulation {
    /// Start a run; invalid configuration is rejected here
    pub fn new(config: SimConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: SimulationState::new(&config),
            rng: Pcg32::seed_from_u64(seed),
            config,
            seed,
            status: RunStatus::Running,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Read-only view for renderers and tests
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Mutable access for setting up scenarios
    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn fitness(&self) -> f64 {
        self.state.fitness
    }

    pub fn score(&self) -> u32 {
        self.state.score
    }

    pub fn observe(&self) -> Observation {
        encode(&self.state)
    }

    /// Step with the configured tick length
    pub fn step(&mut self, action: Action) -> Result<StepOutcome, SimError> {
        self.step_with_dt(action, self.config.tick_ms)
    }

    /// Advance, then spawn, then apply the step limit.
    ///
    /// A bomb hit ends the run before spawning. Training runs earn the
    /// survival reward for each tick that did not end in a bomb hit.
    pub fn step_with_dt(&mut self, action: Action, dt_ms: u32) -> Result<StepOutcome, SimError> {
        if let RunStatus::Terminated(reason) = self.status {
            return Err(SimError::Terminated(reason));
        }

        let tick = advance(&mut self.state, action, self.config.mode, dt_ms);
        if tick.bomb_hit {
            self.status = RunStatus::Terminated(TerminationReason::BombHit);
            return Ok(StepOutcome {
                tick,
                spawned: None,
                status: self.status,
            });
        }

        if self.config.mode == Mode::Training {
            self.state.fitness += SURVIVAL_REWARD;
        }

        let spawned = maybe_spawn(&mut self.state, &mut self.rng, &self.config, dt_ms);

        if let Some(limit) = self.config.step_limit {
            if self.state.time_ticks >= u64::from(limit) {
                self.status = RunStatus::Terminated(TerminationReason::StepLimitReached);
            }
        }

        Ok(StepOutcome {
            tick,
            spawned,
            status: self.status,
        })
    }

    /// End the run at the player's request
    pub fn quit(&mut self) {
        if self.is_running() {
            self.status = RunStatus::Terminated(TerminationReason::UserQuit);
        }
    }
}
