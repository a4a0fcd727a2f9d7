//! Population-based optimizer
//!
//! Generational loop: evaluate every genome on the harness (a barrier),
//! report statistics, checkpoint, then breed the next generation by
//! elitism + tournament selection + one-point crossover + mutation.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::consts::MIN_FITNESS;
use crate::controller::{Genome, Network};
use crate::error::TrainError;
use crate::harness::{ControllerId, Evaluator, episode_seed};
use crate::persistence;
use crate::stats::{GenerationStats, Statistics};

/// Mutated weights are clamped to `[-WEIGHT_LIMIT, WEIGHT_LIMIT]`
pub const WEIGHT_LIMIT: f32 = 5.0;

const BREED_SALT: u64 = 0xB4EE_D000_0000_0001;

/// Reproduction parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breeding {
    pub mutation_rate: f32,
    pub mutation_power: f32,
    pub elitism: usize,
    pub tournament_size: usize,
}

impl From<&TrainingConfig> for Breeding {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            mutation_rate: config.mutation_rate,
            mutation_power: config.mutation_power,
            elitism: config.elitism,
            tournament_size: config.tournament_size,
        }
    }
}

/// One generation of genomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population {
    genomes: Vec<Genome>,
    generation: u32,
    next_id: u64,
    hidden: usize,
    breeding: Breeding,
}

impl Population {
    /// Generation 0 with uniform random weights
    pub fn random<R: Rng + ?Sized>(config: &TrainingConfig, rng: &mut R) -> Self {
        let genomes: Vec<Genome> = (0..config.population_size as u64)
            .map(|id| Genome::random(id, config.hidden_nodes, rng))
            .collect();
        Self {
            next_id: genomes.len() as u64,
            genomes,
            generation: 0,
            hidden: config.hidden_nodes,
            breeding: Breeding::from(config),
        }
    }

    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }

    /// Runnable controllers keyed by genome id, in population order
    pub fn controllers(&self) -> Vec<(ControllerId, Network)> {
        self.genomes
            .iter()
            .map(|genome| (genome.id, genome.network()))
            .collect()
    }

    /// Store evaluation results; genomes missing from `results` score `MIN_FITNESS`
    pub fn assign_fitness(&mut self, results: &[(ControllerId, f64)]) {
        let by_id: HashMap<ControllerId, f64> = results.iter().copied().collect();
        for genome in &mut self.genomes {
            genome.fitness = Some(by_id.get(&genome.id).copied().unwrap_or(MIN_FITNESS));
        }
    }

    /// Fittest evaluated genome; earliest wins ties
    pub fn best(&self) -> Option<&Genome> {
        self.genomes
            .iter()
            .filter(|genome| genome.fitness.is_some())
            .reduce(|best, genome| {
                if fitness_of(genome) > fitness_of(best) {
                    genome
                } else {
                    best
                }
            })
    }

    /// Replace the population with its offspring and advance the generation
    pub fn next_generation<R: Rng + ?Sized>(&mut self, fitnesses: &[(ControllerId, f64)], rng: &mut R) {
        self.assign_fitness(fitnesses);
        let size = self.genomes.len();

        let mut ranked: Vec<&Genome> = self.genomes.iter().collect();
        ranked.sort_by(|a, b| fitness_of(b).total_cmp(&fitness_of(a)));

        let mut offspring: Vec<Genome> = ranked
            .iter()
            .take(self.breeding.elitism.min(size))
            .map(|genome| Genome {
                fitness: None,
                ..(*genome).clone()
            })
            .collect();

        while offspring.len() < size {
            let mother = self.tournament_select(rng);
            let father = self.tournament_select(rng);
            let mut weights = crossover(&mother.weights, &father.weights, rng);
            mutate(
                &mut weights,
                self.breeding.mutation_rate,
                self.breeding.mutation_power,
                rng,
            );
            offspring.push(Genome {
                id: self.next_id,
                hidden: self.hidden,
                weights,
                fitness: None,
            });
            self.next_id += 1;
        }

        self.genomes = offspring;
        self.generation += 1;
    }

    /// Best of `tournament_size` genomes drawn with replacement
    pub fn tournament_select<R: Rng + ?Sized>(&self, rng: &mut R) -> &Genome {
        let mut best = &self.genomes[rng.random_range(0..self.genomes.len())];
        for _ in 1..self.breeding.tournament_size {
            let challenger = &self.genomes[rng.random_range(0..self.genomes.len())];
            if fitness_of(challenger) > fitness_of(best) {
                best = challenger;
            }
        }
        best
    }
}

fn fitness_of(genome: &Genome) -> f64 {
    genome.fitness.unwrap_or(f64::NEG_INFINITY)
}

/// One-point crossover: `a` up to the cut, `b` after it
pub fn crossover<R: Rng + ?Sized>(a: &[f32], b: &[f32], rng: &mut R) -> Vec<f32> {
    let len = a.len().min(b.len());
    let cut = rng.random_range(0..=len);
    a[..cut].iter().chain(&b[cut..len]).copied().collect()
}

/// Perturb each weight with probability `rate` by up to `power`
pub fn mutate<R: Rng + ?Sized>(weights: &mut [f32], rate: f32, power: f32, rng: &mut R) {
    if power <= 0.0 {
        return;
    }
    for weight in weights.iter_mut() {
        if rng.random::<f32>() < rate {
            *weight = (*weight + rng.random_range(-power..=power)).clamp(-WEIGHT_LIMIT, WEIGHT_LIMIT);
        }
    }
}

/// Everything needed to continue a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub population: Population,
    pub statistics: Statistics,
    /// Fittest genome seen in any generation so far
    pub champion: Option<Genome>,
    pub config: TrainingConfig,
}

impl Checkpoint {
    /// Fresh run at generation 0
    pub fn new(config: TrainingConfig) -> Result<Self, TrainError> {
        config.validate()?;
        let mut rng = Pcg32::seed_from_u64(config.seed);
        Ok(Self {
            population: Population::random(&config, &mut rng),
            statistics: Statistics::new(),
            champion: None,
            config,
        })
    }

    fn update_champion(&mut self) {
        let Some(best) = self.population.best() else {
            return;
        };
        let improved = match &self.champion {
            Some(champion) => fitness_of(best) > fitness_of(champion),
            None => true,
        };
        if improved {
            self.champion = Some(best.clone());
        }
    }
}

/// Seed shared by every episode of one generation
pub fn batch_seed(master_seed: u64, generation: u32) -> u64 {
    episode_seed(master_seed, u64::from(generation))
}

fn breeding_rng(master_seed: u64, generation: u32) -> Pcg32 {
    Pcg32::seed_from_u64(episode_seed(master_seed ^ BREED_SALT, u64::from(generation)))
}

/// Run generations until `config.generations` is reached; returns the champion.
///
/// Randomness is derived from the master seed and the generation number,
/// so a run resumed from a checkpoint continues exactly as an uninterrupted one.
pub fn train(
    run: &mut Checkpoint,
    evaluator: &Evaluator,
    checkpoints: Option<&Path>,
) -> Result<Genome, TrainError> {
    run.config.validate()?;
    if run.population.is_empty() {
        return Err(TrainError::EmptyPopulation);
    }
    let seed = run.config.seed;
    let interval = run.config.checkpoint_interval;

    log::info!(
        "Training {} genomes from generation {} to {} on {} worker(s)",
        run.population.len(),
        run.population.generation(),
        run.config.generations,
        evaluator.workers()
    );

    while run.population.generation() < run.config.generations {
        let generation = run.population.generation();
        let started = Instant::now();
        let controllers = run.population.controllers();
        let results = evaluator.evaluate(&controllers, batch_seed(seed, generation));
        let elapsed_ms = started.elapsed().as_millis() as u64;

        run.population.assign_fitness(&results);
        if let Some(stats) = GenerationStats::from_results(generation, &results, elapsed_ms) {
            run.statistics.record(stats);
        }
        run.update_champion();

        run.population
            .next_generation(&results, &mut breeding_rng(seed, generation));

        if let Some(dir) = checkpoints {
            if interval > 0 && run.population.generation() % interval == 0 {
                persistence::save_checkpoint(dir, run)?;
            }
        }
    }

    let champion = run.champion.clone().ok_or(TrainError::EmptyPopulation)?;
    log::info!(
        "Training finished: champion #{} with fitness {:.1}",
        champion.id,
        fitness_of(&champion)
    );
    Ok(champion)
}
