//! Library error types

use std::path::PathBuf;

use thiserror::Error;

use crate::sim::TerminationReason;

/// Rejected configuration, reported at construction time
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("world dimensions must be positive, got {width}x{height}")]
    NonPositiveWorld { width: f32, height: f32 },
    #[error("world {width}x{height} is too small for a {player_width}x{player_height} player")]
    WorldTooSmall {
        width: f32,
        height: f32,
        player_width: f32,
        player_height: f32,
    },
    #[error("spawn rate must be positive")]
    ZeroSpawnRate,
    #[error("tick length must be positive")]
    ZeroTickLength,
    #[error("step limit must be positive when set")]
    ZeroStepLimit,
    #[error("population must contain at least {min} genomes, got {actual}")]
    PopulationTooSmall { min: usize, actual: usize },
    #[error("generations must be positive")]
    ZeroGenerations,
    #[error("worker pool must have at least one thread")]
    ZeroWorkers,
    #[error("{field} must be in [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f32 },
    #[error("tournament size must be between 1 and the population size ({population}), got {size}")]
    TournamentSize { size: usize, population: usize },
    #[error("mutation power must be finite and non-negative, got {0}")]
    MutationPower(f32),
}

/// Errors raised while stepping a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("simulation already terminated ({0:?})")]
    Terminated(TerminationReason),
}

/// Errors raised while saving or loading winners and checkpoints
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} has format version {found}, expected {expected}")]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
    #[error("{path} holds a {found} record, expected {expected}")]
    KindMismatch {
        path: PathBuf,
        found: String,
        expected: &'static str,
    },
}

/// Why a single episode could not produce a fitness
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EpisodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error("episode panicked: {0}")]
    Panicked(String),
}

/// Errors building the evaluation harness
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Errors ending a training run
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("population is empty")]
    EmptyPopulation,
}
