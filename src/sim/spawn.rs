//! Timer-driven item spawning
//!
//! The only source of randomness in a run. Callers pass the run's own RNG so
//! concurrent runs never share random state.

use rand::Rng;

use super::state::{Item, ItemKind, SimulationState};
use crate::config::{BombPlacement, SimConfig, SpawnTiming};
use crate::consts::*;

/// Accumulate `dt_ms` and spawn at most one item once the spawn rate is reached.
///
/// The new item is pushed onto `state.items` and a copy is returned.
pub fn maybe_spawn<R: Rng + ?Sized>(
    state: &mut SimulationState,
    rng: &mut R,
    config: &SimConfig,
    dt_ms: u32,
) -> Option<Item> {
    state.spawn_timer_ms = state.spawn_timer_ms.saturating_add(dt_ms);
    if state.spawn_timer_ms < state.spawn_rate_ms {
        return None;
    }

    state.spawn_timer_ms = match config.spawn_timing {
        SpawnTiming::Reset => 0,
        SpawnTiming::Carry => state.spawn_timer_ms - state.spawn_rate_ms,
    };

    let max_x = (state.width - ITEM_SIZE).max(0.0) as u32;
    let item = if rng.random::<f64>() < FRUIT_PROBABILITY {
        let x = rng.random_range(0..=max_x) as f32;
        let variant = rng.random_range(0..FRUIT_VARIANTS);
        let velocity = random_velocity(rng);
        state.push_item(ItemKind::Fruit, x, velocity, variant)
    } else {
        let x = match config.bomb_placement {
            BombPlacement::Random => rng.random_range(0..=max_x) as f32,
            BombPlacement::AtPlayer => state.player.pos.x,
        };
        let velocity = random_velocity(rng);
        state.push_item(ItemKind::Bomb, x, velocity, 0)
    };

    log::trace!(
        "Spawned {:?} #{} at x={} v={}",
        item.kind,
        item.id,
        item.pos.x,
        item.velocity
    );
    Some(item)
}

fn random_velocity<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.random_range(MIN_ITEM_VELOCITY..=MAX_ITEM_VELOCITY)
}
