//! Fruit Catch command line: train, resume, watch and evaluate controllers

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use fruit_catch::evolve::{self, Checkpoint};
use fruit_catch::harness::episode_seed;
use fruit_catch::persistence::{self, WINNER_FILE};
use fruit_catch::platform::{FixedClock, FrameClock, SystemClock};
use fruit_catch::session::{ControllerInput, LogSink, Session};
use fruit_catch::sim::TerminationReason;
use fruit_catch::{Evaluator, Genome, SimConfig, TrainingConfig};

#[derive(Parser)]
#[command(
    name = "fruit-catch",
    about = "Catch-the-falling-fruit arcade game with a neuroevolution trainer"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a new population from scratch
    Train {
        /// Training config file (JSON); defaults are used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for checkpoints and the winner
        #[arg(long)]
        out: Option<PathBuf>,

        /// Override the number of generations
        #[arg(long)]
        generations: Option<u32>,

        /// Worker threads (default: all cores but one)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Continue from the latest checkpoint in a directory
    Resume {
        /// Directory holding checkpoint-<N>.json files
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Override the target number of generations
        #[arg(long)]
        generations: Option<u32>,

        /// Worker threads (default: all cores but one)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Watch the saved winner play under interactive rules
    Watch {
        /// Winner file
        #[arg(long, default_value = WINNER_FILE)]
        winner: PathBuf,

        /// Game seed (default: time based)
        #[arg(long)]
        seed: Option<u64>,

        /// Pace the game at 60 FPS instead of running headless
        #[arg(long)]
        realtime: bool,

        /// Stop after this many ticks
        #[arg(long)]
        max_ticks: Option<u32>,
    },

    /// Score the saved winner over many training episodes in parallel
    Evaluate {
        /// Winner file
        #[arg(long, default_value = WINNER_FILE)]
        winner: PathBuf,

        /// Number of episodes
        #[arg(long, default_value = "32")]
        episodes: u64,

        /// Seed the episode seeds are derived from
        #[arg(long, default_value = "1")]
        base_seed: u64,

        /// Worker threads (default: all cores but one)
        #[arg(long)]
        workers: Option<usize>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Train {
            config,
            out,
            generations,
            workers,
        } => {
            let mut config = match config {
                Some(path) => TrainingConfig::load(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => TrainingConfig::default(),
            };
            if let Some(out) = out {
                config.output_dir = out;
            }
            apply_overrides(&mut config, generations, workers);
            let run = Checkpoint::new(config).context("invalid training config")?;
            run_training(run)
        }

        Command::Resume {
            out,
            generations,
            workers,
        } => {
            let checkpoint = match persistence::latest_checkpoint(&out)? {
                Some(path) => persistence::load_checkpoint(&path)
                    .with_context(|| format!("failed to load checkpoint {}", path.display()))?,
                None => None,
            };
            let mut run = match checkpoint {
                Some(run) => run,
                None => {
                    log::warn!(
                        "No checkpoint found in {}, starting new training",
                        out.display()
                    );
                    Checkpoint::new(TrainingConfig::default()).context("invalid training config")?
                }
            };
            run.config.output_dir = out;
            apply_overrides(&mut run.config, generations, workers);
            run_training(run)
        }

        Command::Watch {
            winner,
            seed,
            realtime,
            max_ticks,
        } => {
            let Some(genome) = load_winner(&winner)? else {
                return Ok(());
            };
            let config = SimConfig {
                step_limit: max_ticks,
                ..SimConfig::interactive()
            };
            let seed = seed.unwrap_or_else(time_seed);
            if realtime {
                watch(&genome, config, seed, SystemClock::default())
            } else {
                watch(&genome, config, seed, FixedClock::default())
            }
        }

        Command::Evaluate {
            winner,
            episodes,
            base_seed,
            workers,
        } => {
            let Some(genome) = load_winner(&winner)? else {
                return Ok(());
            };
            evaluate(&genome, episodes, base_seed, workers)
        }
    }
}

fn apply_overrides(config: &mut TrainingConfig, generations: Option<u32>, workers: Option<usize>) {
    if let Some(generations) = generations {
        config.generations = generations;
    }
    if workers.is_some() {
        config.workers = workers;
    }
}

fn run_training(mut run: Checkpoint) -> Result<()> {
    let evaluator = Evaluator::new(run.config.sim, run.config.worker_count())
        .context("failed to start evaluator")?;
    let out = run.config.output_dir.clone();
    std::fs::create_dir_all(&out)
        .with_context(|| format!("failed to create {}", out.display()))?;

    let winner = evolve::train(&mut run, &evaluator, Some(&out)).context("training failed")?;
    let path = out.join(WINNER_FILE);
    persistence::save_winner(&path, &winner)?;

    println!(
        "Best genome #{} (fitness {:.1}) saved to {}",
        winner.id,
        winner.fitness.unwrap_or_default(),
        path.display()
    );
    Ok(())
}

/// `None` (after telling the user) when nothing has been trained yet
fn load_winner(path: &Path) -> Result<Option<Genome>> {
    let winner = persistence::load_winner(path)
        .with_context(|| format!("failed to load winner {}", path.display()))?;
    if winner.is_none() {
        println!("no trained controller found at {}", path.display());
    }
    Ok(winner)
}

fn watch<K: FrameClock>(genome: &Genome, config: SimConfig, seed: u64, clock: K) -> Result<()> {
    let input = ControllerInput(genome.network());
    let session = Session::new(config, seed, input, LogSink::default(), clock)
        .context("invalid session config")?;
    let summary = session.run()?;
    println!(
        "Final score: {} ({} ticks, {})",
        summary.score,
        summary.ticks,
        summary.reason.as_str()
    );
    Ok(())
}

fn evaluate(genome: &Genome, episodes: u64, base_seed: u64, workers: Option<usize>) -> Result<()> {
    let config = SimConfig::training();
    let evaluator = match workers {
        Some(workers) => Evaluator::new(config, workers),
        None => Evaluator::with_default_workers(config),
    }
    .context("failed to start evaluator")?;

    let seeds: Vec<u64> = (0..episodes).map(|i| episode_seed(base_seed, i)).collect();
    let network = genome.network();
    let results = evaluator.evaluate_seeds(&network, &seeds);
    if results.is_empty() {
        println!("no episodes to run");
        return Ok(());
    }

    let fitnesses: Vec<f64> = results.iter().map(|r| r.fitness).collect();
    let mean = fitnesses.iter().sum::<f64>() / fitnesses.len() as f64;
    let best = fitnesses.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let worst = fitnesses.iter().copied().fold(f64::INFINITY, f64::min);
    let survived = results
        .iter()
        .filter_map(|r| r.episode)
        .filter(|e| e.reason == TerminationReason::StepLimitReached)
        .count();
    let faulted = results.iter().filter(|r| r.faulted()).count();

    println!("Genome #{} over {} episodes:", genome.id, results.len());
    println!("  mean fitness  {mean:>10.1}");
    println!("  best fitness  {best:>10.1}");
    println!("  worst fitness {worst:>10.1}");
    println!("  survived      {survived:>10}");
    if faulted > 0 {
        println!("  faulted       {faulted:>10}");
    }
    Ok(())
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
