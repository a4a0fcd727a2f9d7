//! Platform abstraction layer
//!
//! Handles the pieces that differ between a real terminal/window and a
//! headless run:
//! - Input (held keys to actions)
//! - Time (frame length fed to the simulation)

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::consts::TICK_MS;
use crate::sim::Action;

/// Keys held during one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyState {
    pub left: bool,
    pub right: bool,
    pub quit: bool,
}

impl KeyState {
    pub const NONE: Self = Self {
        left: false,
        right: false,
        quit: false,
    };
    pub const LEFT: Self = Self {
        left: true,
        ..Self::NONE
    };
    pub const RIGHT: Self = Self {
        right: true,
        ..Self::NONE
    };
    pub const QUIT: Self = Self {
        quit: true,
        ..Self::NONE
    };

    /// A single held direction acts; none or both is idle.
    ///
    /// Quit is handled by the caller, not mapped to an action.
    pub fn action(&self) -> Action {
        match (self.left, self.right) {
            (true, false) => Action::LEFT,
            (false, true) => Action::RIGHT,
            _ => Action::IDLE,
        }
    }
}

/// Source of per-frame elapsed time
pub trait FrameClock {
    /// Milliseconds since the previous frame
    fn tick(&mut self) -> u32;
}

/// Constant frame length, for headless runs and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub u32);

impl Default for FixedClock {
    fn default() -> Self {
        Self(TICK_MS)
    }
}

impl FrameClock for FixedClock {
    fn tick(&mut self) -> u32 {
        self.0
    }
}

/// Wall clock capped at a target frame rate
#[derive(Debug, Clone)]
pub struct SystemClock {
    frame: Duration,
    last: Instant,
}

impl SystemClock {
    pub const DEFAULT_FPS: u32 = 60;

    pub fn new(fps: u32) -> Self {
        Self {
            frame: Duration::from_secs(1) / fps.max(1),
            last: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FPS)
    }
}

impl FrameClock for SystemClock {
    /// Sleeps out the rest of the frame, then reports the real elapsed time
    fn tick(&mut self) -> u32 {
        let spent = self.last.elapsed();
        if spent < self.frame {
            thread::sleep(self.frame - spent);
        }
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        u32::try_from(elapsed.as_millis()).unwrap_or(u32::MAX)
    }
}
