//! Interactive and watch sessions
//!
//! A `Session` drives one interactive-rules `Simulation` from an input
//! source, feeds it the clock's frame time and shows each frame to a sink.
//! The session owns the sink; presentation resources are released when the
//! session is dropped.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::controller::Controller;
use crate::error::{ConfigError, SimError};
use crate::platform::{FrameClock, KeyState};
use crate::sim::{Action, Observation, RunStatus, Simulation, SimulationState, TerminationReason};

/// Per-frame decision source; `None` means the user asked to quit
pub trait InputSource {
    fn poll(&mut self, observation: &Observation) -> Option<Action>;
}

/// Lets a trained controller play
#[derive(Debug, Clone)]
pub struct ControllerInput<C>(pub C);

impl<C: Controller> InputSource for ControllerInput<C> {
    fn poll(&mut self, observation: &Observation) -> Option<Action> {
        Some(self.0.act(observation))
    }
}

/// Replays recorded key states; quits when a quit key is seen or the script ends
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    keys: VecDeque<KeyState>,
}

impl ScriptedInput {
    pub fn new(keys: impl IntoIterator<Item = KeyState>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self, _observation: &Observation) -> Option<Action> {
        let keys = self.keys.pop_front()?;
        if keys.quit {
            None
        } else {
            Some(keys.action())
        }
    }
}

/// Read-only presentation of each frame
pub trait FrameSink {
    fn present(&mut self, state: &SimulationState, status: RunStatus);
}

/// Discards frames
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _state: &SimulationState, _status: RunStatus) {}
}

/// Logs the score every `every` ticks and once when the run ends
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    every: u64,
    last_score: u32,
}

impl LogSink {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            last_score: 0,
        }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(60)
    }
}

impl FrameSink for LogSink {
    fn present(&mut self, state: &SimulationState, status: RunStatus) {
        if let RunStatus::Terminated(reason) = status {
            log::info!(
                "Game over ({}): score {} after {} ticks",
                reason.as_str(),
                state.score,
                state.time_ticks
            );
            return;
        }
        if state.score != self.last_score {
            log::debug!("Score: {}", state.score);
            self.last_score = state.score;
        }
        if state.time_ticks % self.every == 0 {
            log::info!(
                "t={} score={} items={} player_x={:.0}",
                state.time_ticks,
                state.score,
                state.items.len(),
                state.player.pos.x
            );
        }
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn present(&mut self, state: &SimulationState, status: RunStatus) {
        (**self).present(state, status)
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub score: u32,
    pub fitness: f64,
    pub ticks: u64,
    pub reason: TerminationReason,
}

/// One playthrough from first frame to termination
pub struct Session<I, S, K> {
    sim: Simulation,
    input: I,
    sink: S,
    clock: K,
}

impl<I: InputSource, S: FrameSink, K: FrameClock> Session<I, S, K> {
    pub fn new(config: SimConfig, seed: u64, input: I, sink: S, clock: K) -> Result<Self, ConfigError> {
        Ok(Self {
            sim: Simulation::new(config, seed)?,
            input,
            sink,
            clock,
        })
    }

    /// Play until the run terminates
    pub fn run(mut self) -> Result<SessionSummary, SimError> {
        log::info!(
            "Session started ({} rules, seed {:#x})",
            self.sim.config().mode.as_str(),
            self.sim.seed()
        );
        self.sink.present(self.sim.state(), self.sim.status());

        let reason = loop {
            if let RunStatus::Terminated(reason) = self.sim.status() {
                break reason;
            }
            match self.input.poll(&self.sim.observe()) {
                Some(action) => {
                    let dt_ms = self.clock.tick();
                    self.sim.step_with_dt(action, dt_ms)?;
                }
                None => self.sim.quit(),
            }
            self.sink.present(self.sim.state(), self.sim.status());
        };

        let state = self.sim.state();
        let summary = SessionSummary {
            score: state.score,
            fitness: state.fitness,
            ticks: state.time_ticks,
            reason,
        };
        log::info!(
            "Session ended ({}): score {}, {} ticks",
            reason.as_str(),
            summary.score,
            summary.ticks
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::FnController;
    use crate::platform::FixedClock;
    use crate::sim::ItemKind;

    /// Records every frame it is shown
    #[derive(Default)]
    struct Recorder {
        frames: Vec<(u64, f32, RunStatus)>,
    }

    impl FrameSink for &mut Recorder {
        fn present(&mut self, state: &SimulationState, status: RunStatus) {
            self.frames.push((state.time_ticks, state.player.pos.x, status));
        }
    }

    #[test]
    fn test_scripted_keys_move_player_and_quit() {
        let mut recorder = Recorder::default();
        let script = ScriptedInput::new([
            KeyState::RIGHT,
            KeyState::RIGHT,
            KeyState::NONE,
            KeyState::LEFT,
            KeyState::QUIT,
            KeyState::RIGHT,
        ]);
        let session = Session::new(
            SimConfig::interactive(),
            1,
            script,
            &mut recorder,
            FixedClock::default(),
        )
        .unwrap();
        let summary = session.run().unwrap();

        assert_eq!(summary.reason, TerminationReason::UserQuit);
        assert_eq!(summary.ticks, 4);
        let xs: Vec<f32> = recorder.frames.iter().map(|(_, x, _)| *x).collect();
        assert_eq!(xs, [350.0, 360.0, 370.0, 370.0, 360.0, 360.0]);
        assert_eq!(
            recorder.frames.last().map(|(_, _, status)| *status),
            Some(RunStatus::Terminated(TerminationReason::UserQuit))
        );
    }

    #[test]
    fn test_script_end_quits() {
        let session = Session::new(
            SimConfig::interactive(),
            2,
            ScriptedInput::default(),
            NullSink,
            FixedClock::default(),
        )
        .unwrap();
        let summary = session.run().unwrap();
        assert_eq!(summary.reason, TerminationReason::UserQuit);
        assert_eq!(summary.ticks, 0);
    }

    #[test]
    fn test_controller_session_ends_on_bomb() {
        let mut session = Session::new(
            SimConfig::interactive(),
            3,
            ControllerInput(FnController(|_: &Observation| [0.0, 0.0])),
            LogSink::new(30),
            FixedClock::default(),
        )
        .unwrap();
        // Bomb just above the idle player
        let state = session.sim.state_mut();
        state.push_item(ItemKind::Bomb, 360.0, 10, 0);
        state.items[0].pos.y = 400.0;

        let summary = session.run().unwrap();
        assert_eq!(summary.reason, TerminationReason::BombHit);
        assert_eq!(summary.fitness, 0.0);
        assert!(summary.ticks <= 10);
    }

    #[test]
    fn test_step_limit_honoured_in_session() {
        let config = SimConfig {
            step_limit: Some(25),
            ..SimConfig::interactive()
        };
        let always_left = ControllerInput(FnController(|_: &Observation| [0.0, 1.0]));
        let session = Session::new(config, 4, always_left, NullSink, FixedClock(16)).unwrap();
        let summary = session.run().unwrap();
        // A random bomb may still land first
        assert!(summary.ticks <= 25);
        if summary.reason == TerminationReason::StepLimitReached {
            assert_eq!(summary.ticks, 25);
        }
    }

    #[test]
    fn test_invalid_config() {
        let config = SimConfig {
            tick_ms: 0,
            ..SimConfig::interactive()
        };
        assert!(Session::new(config, 0, ScriptedInput::default(), NullSink, FixedClock(16)).is_err());
    }
}
