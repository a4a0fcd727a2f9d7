//! Parallel fitness evaluation
//!
//! Each controller gets its own `Simulation` with its own RNG, run to
//! completion on a fixed-size rayon pool. `evaluate` returns only once every
//! episode of the batch has finished, in input order.

use std::panic::{AssertUnwindSafe, catch_unwind};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{SimConfig, default_worker_count};
use crate::consts::MIN_FITNESS;
use crate::controller::Controller;
use crate::error::{ConfigError, EpisodeError, HarnessError};
use crate::sim::{RunStatus, Simulation, TerminationReason};

/// Caller-chosen identity of a controller within a batch
pub type ControllerId = u64;

/// Summary of one finished episode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub seed: u64,
    pub fitness: f64,
    pub score: u32,
    pub ticks: u64,
    pub fruits_caught: u32,
    pub reason: TerminationReason,
}

/// Per-controller result; `episode` is `None` when the run faulted
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub id: ControllerId,
    pub seed: u64,
    pub fitness: f64,
    pub episode: Option<Episode>,
}

impl Evaluation {
    pub fn faulted(&self) -> bool {
        self.episode.is_none()
    }
}

/// Run one controller until its simulation terminates.
///
/// Each iteration is observe, decide, then step (advance + spawn).
pub fn run_episode<C: Controller + ?Sized>(
    controller: &C,
    config: SimConfig,
    seed: u64,
) -> Result<Episode, EpisodeError> {
    let mut sim = Simulation::new(config, seed)?;
    let reason = loop {
        match sim.status() {
            RunStatus::Running => {
                let action = controller.act(&sim.observe());
                sim.step(action)?;
            }
            RunStatus::Terminated(reason) => break reason,
        }
    };

    let state = sim.state();
    Ok(Episode {
        seed,
        fitness: state.fitness,
        score: state.score,
        ticks: state.time_ticks,
        fruits_caught: state.fruits_caught,
        reason,
    })
}

/// Derive an independent episode seed from a batch seed and a controller id
pub fn episode_seed(batch_seed: u64, id: ControllerId) -> u64 {
    // splitmix64 finalizer
    let mut z = batch_seed ^ id.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Fixed-size worker pool evaluating controllers against one rule set
pub struct Evaluator {
    config: SimConfig,
    pool: rayon::ThreadPool,
}

impl Evaluator {
    pub fn new(config: SimConfig, workers: usize) -> Result<Self, HarnessError> {
        config.validate()?;
        if workers == 0 {
            return Err(ConfigError::ZeroWorkers.into());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("eval-{index}"))
            .build()?;
        log::info!("Evaluator ready with {workers} worker(s)");
        Ok(Self { config, pool })
    }

    /// Pool sized to available parallelism minus one
    pub fn with_default_workers(config: SimConfig) -> Result<Self, HarnessError> {
        Self::new(config, default_worker_count())
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Fitness per controller, in input order
    pub fn evaluate<C: Controller>(
        &self,
        controllers: &[(ControllerId, C)],
        batch_seed: u64,
    ) -> Vec<(ControllerId, f64)> {
        self.evaluate_detailed(controllers, batch_seed)
            .into_iter()
            .map(|evaluation| (evaluation.id, evaluation.fitness))
            .collect()
    }

    /// Full results per controller, in input order.
    ///
    /// A run that panics or errors scores `MIN_FITNESS` and is logged; it
    /// never aborts the batch.
    pub fn evaluate_detailed<C: Controller>(
        &self,
        controllers: &[(ControllerId, C)],
        batch_seed: u64,
    ) -> Vec<Evaluation> {
        let config = self.config;
        self.pool.install(|| {
            controllers
                .par_iter()
                .map(|(id, controller)| {
                    let seed = episode_seed(batch_seed, *id);
                    evaluate_one(*id, controller, config, seed)
                })
                .collect()
        })
    }

    /// Run a single controller over many seeds in parallel
    pub fn evaluate_seeds<C: Controller + ?Sized>(
        &self,
        controller: &C,
        seeds: &[u64],
    ) -> Vec<Evaluation> {
        let config = self.config;
        self.pool.install(|| {
            seeds
                .par_iter()
                .enumerate()
                .map(|(index, &seed)| evaluate_one(index as ControllerId, controller, config, seed))
                .collect()
        })
    }
}

fn evaluate_one<C: Controller + ?Sized>(
    id: ControllerId,
    controller: &C,
    config: SimConfig,
    seed: u64,
) -> Evaluation {
    let result = catch_unwind(AssertUnwindSafe(|| run_episode(controller, config, seed)))
        .unwrap_or_else(|payload| Err(EpisodeError::Panicked(panic_message(payload.as_ref()))));

    match result {
        Ok(episode) => {
            log::debug!(
                "controller {id} seed {seed:#018x}: fitness {:.1} after {} ticks ({})",
                episode.fitness,
                episode.ticks,
                episode.reason.as_str()
            );
            Evaluation {
                id,
                seed,
                fitness: episode.fitness,
                episode: Some(episode),
            }
        }
        Err(err) => {
            log::warn!("controller {id} seed {seed:#018x} faulted: {err}");
            Evaluation {
                id,
                seed,
                fitness: MIN_FITNESS,
                episode: None,
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::controller::{CONTROL_LEN, FnController, Genome};
    use crate::sim::Observation;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::collections::HashSet;

    fn evaluator(workers: usize) -> Evaluator {
        Evaluator::new(SimConfig::training(), workers).unwrap()
    }

    /// Runs right for a while, then holds still
    struct Fidget;

    impl Controller for Fidget {
        fn decide(&self, observation: &Observation) -> [f32; CONTROL_LEN] {
            if observation.player_x() < 0.8 {
                [1.0, 1.0]
            } else {
                [0.0, 0.0]
            }
        }
    }

    /// Panics once a bomb is in view
    struct Fragile;

    impl Controller for Fragile {
        fn decide(&self, observation: &Observation) -> [f32; CONTROL_LEN] {
            assert!(observation.bomb()[3] == 0.0, "bomb in view");
            [0.5, 0.0]
        }
    }

    #[test]
    fn test_episode_fitness_accounts_for_every_tick() {
        let pacer = FnController(|observation: &Observation| {
            let right = observation.player_x() < 0.5;
            [if right { 1.0 } else { 0.0 }, 1.0]
        });
        for seed in [17, 18, 19] {
            let episode = run_episode(&pacer, SimConfig::training(), seed).unwrap();
            assert!(episode.ticks <= u64::from(TRAINING_STEP_LIMIT));
            let caught = f64::from(episode.fruits_caught) * FRUIT_REWARD;
            let expected = match episode.reason {
                TerminationReason::StepLimitReached => {
                    assert_eq!(episode.ticks, u64::from(TRAINING_STEP_LIMIT));
                    episode.ticks as f64 * SURVIVAL_REWARD + caught
                }
                TerminationReason::BombHit => {
                    (episode.ticks - 1) as f64 * SURVIVAL_REWARD + caught - BOMB_PENALTY
                }
                TerminationReason::UserQuit => panic!("harness never quits"),
            };
            assert!((episode.fitness - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_returns_one_result_per_controller_in_order() {
        let mut rng = Pcg32::seed_from_u64(3);
        let controllers: Vec<(ControllerId, _)> = (0..37)
            .map(|i| {
                let id = 1000 - i * 7;
                (id, Genome::random(id, 4, &mut rng).network())
            })
            .collect();

        let results = evaluator(4).evaluate(&controllers, 0xABCD);
        assert_eq!(results.len(), controllers.len());
        for ((id, _), (result_id, fitness)) in controllers.iter().zip(&results) {
            assert_eq!(id, result_id);
            assert!(fitness.is_finite());
        }
        let unique: HashSet<_> = results.iter().map(|(id, _)| *id).collect();
        assert_eq!(unique.len(), controllers.len());
    }

    #[test]
    fn test_results_do_not_depend_on_worker_count() {
        let mut rng = Pcg32::seed_from_u64(5);
        let controllers: Vec<(ControllerId, _)> = (0..16)
            .map(|id| (id, Genome::random(id, 3, &mut rng).network()))
            .collect();

        let serial = evaluator(1).evaluate(&controllers, 77);
        let parallel = evaluator(4).evaluate(&controllers, 77);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_faulted_run_scores_minimum_without_stalling_batch() {
        let controllers: Vec<(ControllerId, Box<dyn Controller>)> = vec![
            (1, Box::new(Fidget)),
            (2, Box::new(Fragile)),
            (3, Box::new(Fidget)),
        ];
        let results = evaluator(2).evaluate_detailed(&controllers, 9);
        assert_eq!(results.len(), 3);
        assert!(!results[0].faulted());
        assert!(results[1].faulted());
        assert_eq!(results[1].fitness, MIN_FITNESS);
        assert!(!results[2].faulted());
        assert_eq!(results.iter().map(|r| r.id).collect::<Vec<_>>(), [1, 2, 3]);
    }

    #[test]
    fn test_order_kept_when_first_controller_finishes_last() {
        // Only the first controller sleeps, so it completes after the rest
        let slow = FnController(|_: &Observation| {
            std::thread::sleep(std::time::Duration::from_millis(1));
            [0.5, 0.0]
        });
        let controllers: Vec<(ControllerId, Box<dyn Controller>)> = vec![
            (0, Box::new(slow)),
            (1, Box::new(Fidget)),
            (2, Box::new(Fidget)),
            (3, Box::new(Fidget)),
        ];

        let results = evaluator(4).evaluate_detailed(&controllers, 31);
        let ids: Vec<ControllerId> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, [0, 1, 2, 3]);
        assert!(results.iter().all(|r| !r.faulted()));
        for (result, (id, _)) in results.iter().zip(&controllers) {
            assert_eq!(result.seed, episode_seed(31, *id));
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            Evaluator::new(SimConfig::training(), 0),
            Err(HarnessError::Config(ConfigError::ZeroWorkers))
        ));
    }

    #[test]
    fn test_episode_seeds_are_distinct() {
        let seeds: HashSet<u64> = (0..1000).map(|id| episode_seed(42, id)).collect();
        assert_eq!(seeds.len(), 1000);
        assert_ne!(episode_seed(1, 5), episode_seed(2, 5));
    }

    #[test]
    fn test_evaluate_seeds() {
        let results = evaluator(3).evaluate_seeds(&Fidget, &[1, 2, 3, 4]);
        assert_eq!(results.len(), 4);
        for (result, seed) in results.iter().zip([1, 2, 3, 4]) {
            assert_eq!(result.seed, seed);
            let episode = result.episode.unwrap();
            assert_eq!(episode.fitness, result.fitness);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimConfig {
            width: -1.0,
            ..SimConfig::training()
        };
        assert!(matches!(
            Evaluator::new(config, 2),
            Err(HarnessError::Config(_))
        ));
    }
}
