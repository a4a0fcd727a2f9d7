//! Fixed timestep simulation tick
//!
//! Moves the player and every item by one tick, then resolves collisions in
//! item order. Shared by the interactive session and the training harness.

use serde::{Deserialize, Serialize};

use super::state::{ItemKind, SimulationState};
use crate::config::Mode;

/// Player command for a single tick (deterministic)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Action {
    /// Direction of the move: right if set, left otherwise
    pub move_right: bool,
    /// The move is only applied when this is set
    pub should_act: bool,
}

impl Action {
    /// Do nothing this tick
    pub const IDLE: Action = Action {
        move_right: false,
        should_act: false,
    };
    pub const LEFT: Action = Action {
        move_right: false,
        should_act: true,
    };
    pub const RIGHT: Action = Action {
        move_right: true,
        should_act: true,
    };

    /// Decode the two controller outputs.
    ///
    /// The first output picks the direction (`>= 0.5` is right), the second
    /// gates the move (`> 0.5` acts).
    pub fn from_signals(move_signal: f32, act_signal: f32) -> Self {
        Self {
            move_right: move_signal >= 0.5,
            should_act: act_signal > 0.5,
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickOutcome {
    pub fruits_caught: u32,
    /// Items that fell past the bottom edge
    pub items_dropped: u32,
    /// A bomb hit the player; the run is over
    pub bomb_hit: bool,
    pub score_delta: u32,
    pub fitness_delta: f64,
}

/// Advance the world by one tick.
///
/// Each item falls, then is either removed past the bottom edge or checked
/// against the player. A bomb collision stops the tick immediately: items
/// later in the list neither move nor collide.
pub fn advance(
    state: &mut SimulationState,
    action: Action,
    mode: Mode,
    dt_ms: u32,
) -> TickOutcome {
    let mut outcome = TickOutcome::default();

    state.time_ticks += 1;
    state.elapsed_ms += u64::from(dt_ms);

    if action.should_act {
        state.player.shift(action.move_right, state.width);
    }

    let player = state.player.rect();
    let mut index = 0;
    while index < state.items.len() {
        let item = &mut state.items[index];
        item.fall();

        if item.pos.y > state.height {
            state.items.remove(index);
            outcome.items_dropped += 1;
            continue;
        }

        if !item.rect().overlaps(&player) {
            index += 1;
            continue;
        }

        let item = state.items.remove(index);
        let payoff = item.kind.payoff(mode);
        state.score += payoff.score;
        state.fitness += payoff.fitness;
        outcome.score_delta += payoff.score;
        outcome.fitness_delta += payoff.fitness;

        if item.kind == ItemKind::Fruit {
            state.fruits_caught += 1;
            outcome.fruits_caught += 1;
        }

        if payoff.ends_run {
            log::trace!("Bomb {} hit the player at tick {}", item.id, state.time_ticks);
            outcome.bomb_hit = true;
            return outcome;
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::consts::*;
    use glam::Vec2;
    use proptest::prelude::*;

    fn empty_state() -> SimulationState {
        SimulationState::new(&SimConfig::training())
    }

    #[test]
    fn test_action_from_signals() {
        assert_eq!(Action::from_signals(0.5, 0.51), Action::RIGHT);
        assert_eq!(Action::from_signals(0.49, 0.9), Action::LEFT);
        // Act threshold is strict
        assert!(!Action::from_signals(1.0, 0.5).should_act);
    }

    #[test]
    fn test_move_right_five_ticks() {
        let mut state = empty_state();
        assert_eq!(state.player.pos.x, 350.0);
        for _ in 0..5 {
            advance(&mut state, Action::RIGHT, Mode::Training, TICK_MS);
        }
        assert_eq!(state.player.pos.x, 400.0);
        assert_eq!(state.time_ticks, 5);
        assert_eq!(state.elapsed_ms, 80);
    }

    #[test]
    fn test_idle_does_not_move() {
        let mut state = empty_state();
        let idle_right = Action {
            move_right: true,
            should_act: false,
        };
        advance(&mut state, idle_right, Mode::Training, TICK_MS);
        assert_eq!(state.player.pos.x, 350.0);
    }

    #[test]
    fn test_fruit_catch_training() {
        let mut state = empty_state();
        state.push_item(ItemKind::Fruit, 360.0, 4, 0);
        state.items[0].pos.y = 560.0;
        let before = state.fitness;

        let outcome = advance(&mut state, Action::IDLE, Mode::Training, TICK_MS);
        assert!(state.items.is_empty());
        assert_eq!(outcome.fruits_caught, 1);
        assert_eq!(state.fitness - before, 100.0);
        assert_eq!(outcome.fitness_delta, 100.0);
        assert_eq!(state.score, 0);
        assert!(!outcome.bomb_hit);
    }

    #[test]
    fn test_fruit_catch_interactive() {
        let mut state = empty_state();
        state.push_item(ItemKind::Fruit, 360.0, 4, 0);
        state.items[0].pos.y = 560.0;

        let outcome = advance(&mut state, Action::IDLE, Mode::Interactive, TICK_MS);
        assert!(state.items.is_empty());
        assert_eq!(state.score, 1);
        assert_eq!(outcome.score_delta, 1);
        assert_eq!(state.fitness, 0.0);
    }

    #[test]
    fn test_bomb_hit_stops_tick() {
        let mut state = empty_state();
        state.fitness = 42.5;
        state.push_item(ItemKind::Bomb, 360.0, 4, 0);
        state.items[0].pos.y = 520.0;
        // Queued after the bomb: must not move this tick
        state.push_item(ItemKind::Fruit, 10.0, 7, 0);

        let outcome = advance(&mut state, Action::IDLE, Mode::Training, TICK_MS);
        assert!(outcome.bomb_hit);
        assert_eq!(state.fitness, 42.5 - 1000.0);
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.items[0].kind, ItemKind::Fruit);
        assert_eq!(state.items[0].pos.y, 0.0);
    }

    #[test]
    fn test_off_screen_item_removed_without_reward() {
        let mut state = empty_state();
        state.push_item(ItemKind::Fruit, 10.0, 10, 0);
        state.items[0].pos.y = 595.0;

        let outcome = advance(&mut state, Action::IDLE, Mode::Training, TICK_MS);
        assert!(state.items.is_empty());
        assert_eq!(outcome.items_dropped, 1);
        assert_eq!(state.fitness, 0.0);
    }

    #[test]
    fn test_item_at_bottom_edge_stays() {
        let mut state = empty_state();
        state.push_item(ItemKind::Bomb, 10.0, 5, 0);
        state.items[0].pos.y = 595.0;

        advance(&mut state, Action::IDLE, Mode::Training, TICK_MS);
        // y == height is not past the edge yet
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.items[0].pos, Vec2::new(10.0, 600.0));
    }

    #[test]
    fn test_determinism() {
        let build = || {
            let mut state = empty_state();
            state.push_item(ItemKind::Fruit, 300.0, 6, 1);
            state.push_item(ItemKind::Bomb, 600.0, 9, 0);
            state.push_item(ItemKind::Fruit, 420.0, 4, 2);
            state
        };
        let actions = [Action::RIGHT, Action::LEFT, Action::IDLE, Action::RIGHT];

        let mut state1 = build();
        let mut state2 = build();
        for _ in 0..40 {
            for action in actions {
                let a = advance(&mut state1, action, Mode::Training, TICK_MS);
                let b = advance(&mut state2, action, Mode::Training, TICK_MS);
                assert_eq!(a, b);
            }
        }
        assert_eq!(state1, state2);
    }

    fn arb_action() -> impl Strategy<Value = Action> {
        (any::<bool>(), any::<bool>()).prop_map(|(move_right, should_act)| Action {
            move_right,
            should_act,
        })
    }

    fn arb_items() -> impl Strategy<Value = Vec<(bool, f32, f32, u8)>> {
        prop::collection::vec(
            (
                any::<bool>(),
                0.0f32..770.0,
                0.0f32..600.0,
                MIN_ITEM_VELOCITY..=MAX_ITEM_VELOCITY,
            ),
            0..12,
        )
    }

    fn seeded_state(items: &[(bool, f32, f32, u8)]) -> SimulationState {
        let mut state = empty_state();
        for &(fruit, x, y, velocity) in items {
            let kind = if fruit { ItemKind::Fruit } else { ItemKind::Bomb };
            let item = state.push_item(kind, x, velocity, 0);
            if let Some(last) = state.items.iter_mut().find(|i| i.id == item.id) {
                last.pos.y = y;
            }
        }
        state
    }

    proptest! {
        #[test]
        fn player_stays_in_bounds(actions in prop::collection::vec(arb_action(), 0..300)) {
            let mut state = empty_state();
            for action in actions {
                advance(&mut state, action, Mode::Training, TICK_MS);
                prop_assert!(state.player.pos.x >= 0.0);
                prop_assert!(state.player.pos.x <= WORLD_WIDTH - PLAYER_WIDTH);
                prop_assert_eq!(state.player.pos.y, WORLD_HEIGHT - PLAYER_HEIGHT);
            }
        }

        #[test]
        fn no_act_means_no_move(
            start in 0.0f32..700.0,
            move_right in any::<bool>(),
            items in arb_items(),
        ) {
            let mut state = seeded_state(&items);
            state.player.pos.x = start;
            let action = Action { move_right, should_act: false };
            advance(&mut state, action, Mode::Training, TICK_MS);
            prop_assert_eq!(state.player.pos.x, start);
        }

        #[test]
        fn items_fall_monotonically_and_never_leak(
            items in arb_items(),
            actions in prop::collection::vec(arb_action(), 1..150),
        ) {
            let mut state = seeded_state(&items);
            for action in actions {
                let before: Vec<(u32, f32)> =
                    state.items.iter().map(|i| (i.id, i.pos.y)).collect();
                let outcome = advance(&mut state, action, Mode::Training, TICK_MS);

                for item in &state.items {
                    if let Some(&(_, y)) = before.iter().find(|(id, _)| *id == item.id) {
                        prop_assert!(item.pos.y >= y);
                    }
                    if !outcome.bomb_hit {
                        prop_assert!(item.pos.y <= WORLD_HEIGHT);
                    }
                }
                if outcome.bomb_hit {
                    break;
                }
            }
        }
    }
}
