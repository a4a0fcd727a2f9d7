//! Sensor encoding
//!
//! Turns the world into the fixed-length input vector controllers see.

use serde::{Deserialize, Serialize};

use super::state::{Item, ItemKind, SimulationState};
use crate::consts::VELOCITY_SCALE;

/// Number of values in an observation
pub const OBSERVATION_LEN: usize = 9;

/// Normalized sensor vector.
///
/// Layout: player x, then `(x, y, distance, velocity)` for the nearest fruit,
/// then the same for the nearest bomb. Missing items encode as zeros.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation(pub [f32; OBSERVATION_LEN]);

impl Observation {
    pub fn player_x(&self) -> f32 {
        self.0[0]
    }

    pub fn fruit(&self) -> [f32; 4] {
        [self.0[1], self.0[2], self.0[3], self.0[4]]
    }

    pub fn bomb(&self) -> [f32; 4] {
        [self.0[5], self.0[6], self.0[7], self.0[8]]
    }
}

/// Encode the world relative to the player
pub fn encode(state: &SimulationState) -> Observation {
    let max_dist = crate::max_distance(state.width, state.height);
    let (fruit, bomb) = nearest_items(state);

    let mut values = [0.0; OBSERVATION_LEN];
    values[0] = state.player.pos.x / state.width;
    values[1..5].copy_from_slice(&item_features(state, fruit, max_dist));
    values[5..9].copy_from_slice(&item_features(state, bomb, max_dist));
    Observation(values)
}

/// Nearest fruit and nearest bomb by distance from the player's corner.
///
/// Ties keep the item encountered first.
pub fn nearest_items(state: &SimulationState) -> (Option<&Item>, Option<&Item>) {
    let mut fruit: Option<(&Item, f32)> = None;
    let mut bomb: Option<(&Item, f32)> = None;

    for item in &state.items {
        let dist = item.pos.distance(state.player.pos);
        let slot = match item.kind {
            ItemKind::Fruit => &mut fruit,
            ItemKind::Bomb => &mut bomb,
        };
        if slot.is_none_or(|(_, best)| dist < best) {
            *slot = Some((item, dist));
        }
    }

    (fruit.map(|(item, _)| item), bomb.map(|(item, _)| item))
}

fn item_features(state: &SimulationState, item: Option<&Item>, max_dist: f32) -> [f32; 4] {
    match item {
        Some(item) => [
            item.pos.x / state.width,
            item.pos.y / state.height,
            item.pos.distance(state.player.pos) / max_dist,
            f32::from(item.velocity) / VELOCITY_SCALE,
        ],
        None => [0.0; 4],
    }
}
