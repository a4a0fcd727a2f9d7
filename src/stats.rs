//! Per-generation fitness statistics
//!
//! Kept across the whole run (and in checkpoints) so a resumed run reports
//! the same history.

use serde::{Deserialize, Serialize};

use crate::harness::ControllerId;

/// Summary of one evaluated generation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: u32,
    /// Highest fitness in the generation
    pub best: f64,
    pub mean: f64,
    /// Population standard deviation
    pub stdev: f64,
    /// Controller that scored `best` (first one on ties)
    pub best_id: ControllerId,
    /// Wall time spent evaluating the generation
    pub elapsed_ms: u64,
}

impl GenerationStats {
    /// Summarize a batch of `(id, fitness)` results; `None` for an empty batch
    pub fn from_results(
        generation: u32,
        results: &[(ControllerId, f64)],
        elapsed_ms: u64,
    ) -> Option<Self> {
        let (&(first_id, first_fitness), rest) = results.split_first()?;
        let (best_id, best) = rest.iter().fold(
            (first_id, first_fitness),
            |(best_id, best), &(id, fitness)| {
                if fitness > best {
                    (id, fitness)
                } else {
                    (best_id, best)
                }
            },
        );

        let n = results.len() as f64;
        let mean = results.iter().map(|(_, f)| f).sum::<f64>() / n;
        let variance = results.iter().map(|(_, f)| (f - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            generation,
            best,
            mean,
            stdev: variance.sqrt(),
            best_id,
            elapsed_ms,
        })
    }
}

/// Fitness history reporter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    history: Vec<GenerationStats>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a generation and log its summary line
    pub fn record(&mut self, stats: GenerationStats) {
        log::info!(
            "generation {:>4}: best {:>9.1} (#{}), mean {:>9.1}, stdev {:>8.1}, {} ms",
            stats.generation,
            stats.best,
            stats.best_id,
            stats.mean,
            stats.stdev,
            stats.elapsed_ms
        );
        if let Some(previous) = self.best_ever() {
            if stats.best > previous.best {
                log::info!("new best fitness {:.1} (was {:.1})", stats.best, previous.best);
            }
        }
        self.history.push(stats);
    }

    pub fn history(&self) -> &[GenerationStats] {
        &self.history
    }

    pub fn latest(&self) -> Option<&GenerationStats> {
        self.history.last()
    }

    /// Generation with the highest best fitness; earliest wins ties
    pub fn best_ever(&self) -> Option<&GenerationStats> {
        self.history.iter().fold(None, |best, stats| match best {
            Some(b) if b.best >= stats.best => Some(b),
            _ => Some(stats),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }
}
