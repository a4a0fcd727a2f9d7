//! Game state and entity types
//!
//! Everything a run needs to be replayed lives here, except the RNG which is
//! owned by the simulation instance.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::Rect;
use crate::config::{Mode, SimConfig};
use crate::consts::*;

/// Falling item kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Fruit,
    Bomb,
}

impl ItemKind {
    /// What catching this item is worth under the given rules
    pub fn payoff(self, mode: Mode) -> Payoff {
        let kind = match self {
            ItemKind::Fruit => 0,
            ItemKind::Bomb => 1,
        };
        let mode = match mode {
            Mode::Interactive => 0,
            Mode::Training => 1,
        };
        PAYOFF_TABLE[kind][mode]
    }
}

/// Effect of a player/item collision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payoff {
    /// Added to the interactive score
    pub score: u32,
    /// Added to the training fitness
    pub fitness: f64,
    /// Whether the run terminates
    pub ends_run: bool,
}

/// Indexed by `[item kind][mode]`, fruit/bomb and interactive/training
const PAYOFF_TABLE: [[Payoff; 2]; 2] = [
    [
        Payoff {
            score: FRUIT_SCORE,
            fitness: 0.0,
            ends_run: false,
        },
        Payoff {
            score: 0,
            fitness: FRUIT_REWARD,
            ends_run: false,
        },
    ],
    [
        Payoff {
            score: 0,
            fitness: 0.0,
            ends_run: true,
        },
        Payoff {
            score: 0,
            fitness: -BOMB_PENALTY,
            ends_run: true,
        },
    ],
];

/// The catcher at the bottom of the screen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Top-left corner; y never changes
    pub pos: Vec2,
    pub size: Vec2,
    /// Horizontal displacement per acting tick
    pub speed: f32,
}

impl Player {
    /// Player centered horizontally, resting on the floor
    pub fn spawn(width: f32, height: f32) -> Self {
        Self {
            pos: Vec2::new(((width - PLAYER_WIDTH) / 2.0).floor(), height - PLAYER_HEIGHT),
            size: Vec2::new(PLAYER_WIDTH, PLAYER_HEIGHT),
            speed: PLAYER_SPEED,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.pos, self.size)
    }

    /// Shift one step left or right, staying inside `[0, width - player width]`
    pub fn shift(&mut self, right: bool, width: f32) {
        let dx = if right { self.speed } else { -self.speed };
        self.pos.x = (self.pos.x + dx).clamp(0.0, width - self.size.x);
    }
}

/// A fruit or bomb
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u32,
    pub kind: ItemKind,
    /// Top-left corner
    pub pos: Vec2,
    pub size: Vec2,
    /// Fall speed in world units per tick, fixed at spawn
    pub velocity: u8,
    /// Sprite index (cosmetic, fruit only)
    pub variant: u8,
}

impl Item {
    pub fn new(id: u32, kind: ItemKind, x: f32, velocity: u8, variant: u8) -> Self {
        Self {
            id,
            kind,
            pos: Vec2::new(x, 0.0),
            size: Vec2::splat(ITEM_SIZE),
            velocity,
            variant,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.pos, self.size)
    }

    /// Fall by one tick's worth of velocity
    pub fn fall(&mut self) {
        self.pos.y += f32::from(self.velocity);
    }
}

/// Complete world state for one run (deterministic, serializable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub width: f32,
    pub height: f32,
    pub player: Player,
    /// Live items in spawn order
    pub items: Vec<Item>,
    /// Interactive score
    pub score: u32,
    /// Training fitness
    pub fitness: f64,
    /// Milliseconds accumulated since the last spawn
    pub spawn_timer_ms: u32,
    pub spawn_rate_ms: u32,
    /// Ticks advanced so far
    pub time_ticks: u64,
    /// Game time advanced so far
    pub elapsed_ms: u64,
    /// Fruits caught so far (both modes)
    pub fruits_caught: u32,
    /// Next item ID
    next_id: u32,
}

impl SimulationState {
    /// Fresh world: player centered, no items, zeroed counters
    pub fn new(config: &SimConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            player: Player::spawn(config.width, config.height),
            items: Vec::new(),
            score: 0,
            fitness: 0.0,
            spawn_timer_ms: 0,
            spawn_rate_ms: config.spawn_rate_ms,
            time_ticks: 0,
            elapsed_ms: 0,
            fruits_caught: 0,
            next_id: 1,
        }
    }

    /// Allocate a new item ID
    pub fn next_item_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Place an item in the world, assigning it a fresh ID
    pub fn push_item(&mut self, kind: ItemKind, x: f32, velocity: u8, variant: u8) -> Item {
        let item = Item::new(self.next_item_id(), kind, x, velocity, variant);
        self.items.push(item);
        item
    }

    pub fn count(&self, kind: ItemKind) -> usize {
        self.items.iter().filter(|item| item.kind == kind).count()
    }
}
