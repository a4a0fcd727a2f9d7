//! Controllers: anything that maps an observation to the two control signals
//!
//! The harness only sees the `Controller` trait. `Network` is the evolved
//! feed-forward controller built from a `Genome`.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::sim::{Action, OBSERVATION_LEN, Observation};

/// Number of control signals a controller produces
pub const CONTROL_LEN: usize = 2;

/// Decision function evaluated (never trained) during a run.
///
/// `decide` takes `&self`: a controller is shared read-only between the
/// worker that runs it and the optimizer that owns it.
pub trait Controller: Send + Sync {
    /// Returns `[move_signal, act_signal]`, roughly in `[0, 1]`
    fn decide(&self, observation: &Observation) -> [f32; CONTROL_LEN];

    /// Decode `decide` into an action
    fn act(&self, observation: &Observation) -> Action {
        let [move_signal, act_signal] = self.decide(observation);
        Action::from_signals(move_signal, act_signal)
    }
}

/// Adapts a plain function or closure into a controller
#[derive(Debug, Clone, Copy)]
pub struct FnController<F>(pub F);

impl<F> Controller for FnController<F>
where
    F: Fn(&Observation) -> [f32; CONTROL_LEN] + Send + Sync,
{
    fn decide(&self, observation: &Observation) -> [f32; CONTROL_LEN] {
        (self.0)(observation)
    }
}

impl<C: Controller + ?Sized> Controller for Box<C> {
    fn decide(&self, observation: &Observation) -> [f32; CONTROL_LEN] {
        (**self).decide(observation)
    }
}

impl<C: Controller + ?Sized> Controller for std::sync::Arc<C> {
    fn decide(&self, observation: &Observation) -> [f32; CONTROL_LEN] {
        (**self).decide(observation)
    }
}

/// Steepened logistic used by NEAT-style networks
#[inline]
pub fn sigmoid(z: f32) -> f32 {
    let z = (5.0 * z).clamp(-60.0, 60.0);
    1.0 / (1.0 + (-z).exp())
}

/// Flat weight encoding of a fully connected `9 -> hidden -> 2` network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub id: u64,
    /// Hidden layer width; 0 connects inputs straight to outputs
    pub hidden: usize,
    /// Layer-major weights, each neuron's bias last
    pub weights: Vec<f32>,
    /// Fitness from the most recent evaluation
    #[serde(default)]
    pub fitness: Option<f64>,
}

impl Genome {
    /// Weights needed for the given hidden width (biases included)
    pub fn weight_count(hidden: usize) -> usize {
        if hidden == 0 {
            (OBSERVATION_LEN + 1) * CONTROL_LEN
        } else {
            (OBSERVATION_LEN + 1) * hidden + (hidden + 1) * CONTROL_LEN
        }
    }

    /// Genome with uniform random weights in `[-1, 1]`
    pub fn random<R: Rng + ?Sized>(id: u64, hidden: usize, rng: &mut R) -> Self {
        let weights = (0..Self::weight_count(hidden))
            .map(|_| rng.random_range(-1.0..=1.0))
            .collect();
        Self {
            id,
            hidden,
            weights,
            fitness: None,
        }
    }

    /// Build the runnable controller for this genome
    pub fn network(&self) -> Network {
        Network::new(self.hidden, self.weights.clone())
    }
}

/// Feed-forward network controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    hidden: usize,
    weights: Vec<f32>,
}

impl Network {
    /// Missing weights read as zero, extra weights are ignored
    pub fn new(hidden: usize, mut weights: Vec<f32>) -> Self {
        weights.resize(Genome::weight_count(hidden), 0.0);
        Self { hidden, weights }
    }

    /// Forward pass
    pub fn activate(&self, inputs: &[f32; OBSERVATION_LEN]) -> [f32; CONTROL_LEN] {
        if self.hidden == 0 {
            return dense::<OBSERVATION_LEN, CONTROL_LEN>(inputs, &self.weights);
        }

        let split = (OBSERVATION_LEN + 1) * self.hidden;
        let (input_layer, output_layer) = self.weights.split_at(split);

        let hidden: Vec<f32> = input_layer
            .chunks_exact(OBSERVATION_LEN + 1)
            .map(|neuron| neuron_output(inputs, neuron))
            .collect();

        let mut outputs = [0.0; CONTROL_LEN];
        for (out, neuron) in outputs
            .iter_mut()
            .zip(output_layer.chunks_exact(self.hidden + 1))
        {
            *out = neuron_output(&hidden, neuron);
        }
        outputs
    }
}

impl Controller for Network {
    fn decide(&self, observation: &Observation) -> [f32; CONTROL_LEN] {
        self.activate(&observation.0)
    }
}

fn dense<const I: usize, const O: usize>(inputs: &[f32; I], weights: &[f32]) -> [f32; O] {
    let mut outputs = [0.0; O];
    for (out, neuron) in outputs.iter_mut().zip(weights.chunks_exact(I + 1)) {
        *out = neuron_output(inputs, neuron);
    }
    outputs
}

/// `neuron` holds one weight per input followed by the bias
fn neuron_output(inputs: &[f32], neuron: &[f32]) -> f32 {
    let (weights, bias) = neuron.split_at(inputs.len());
    let sum: f32 = inputs.iter().zip(weights).map(|(x, w)| x * w).sum();
    sigmoid(sum + bias[0])
}
