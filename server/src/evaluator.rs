//! The round evaluator: runs once per tick after every player has taken
//! its physics step, and decides round transitions (reset, death, win).
//!
//! Order matters here: a stale `dead` round is reset before anything
//! else runs, so a single tick never observes both a reset and a death
//! signal for different reasons.

use crate::world::{clone_runtime, WorldRuntime};
use shared::{GameStatus, PlayerState};
use std::collections::HashMap;

pub struct RoundEvaluation<'a> {
    pub players: &'a mut HashMap<String, PlayerState>,
    pub world: &'a mut WorldRuntime,
    pub key_collected: &'a mut bool,
    pub players_at_door: &'a mut Vec<u8>,
    pub status: &'a mut GameStatus,
    pub dead_until: &'a mut u64,
    pub player_order: &'a [(u8, String)],
    pub world_id: u8,
    pub world2_base_y: i32,
}

/// Runs the evaluator for one tick. `now_ms` and `respawn_delay_ms` drive
/// the dead->playing reset; `present_player_count` is the lobby roster
/// size used for the win check (everyone present must be at the door).
pub fn evaluate_round(eval: RoundEvaluation<'_>, now_ms: u64, respawn_delay_ms: u64, present_player_count: usize) {
    let RoundEvaluation {
        players,
        world,
        key_collected,
        players_at_door,
        status,
        dead_until,
        player_order,
        world_id,
        world2_base_y,
    } = eval;

    if *status == GameStatus::Dead {
        if now_ms >= *dead_until {
            reset_round(players, world, key_collected, players_at_door, status, dead_until, player_order, world_id, world2_base_y);
        }
        return;
    }

    for (_, player) in players.iter() {
        if player.dead {
            continue;
        }
        if player.bounds().intersects(&world.key) {
            *key_collected = true;
            break;
        }
    }

    if world.id == 2 {
        let hit_hazard = players
            .values()
            .any(|p| !p.dead && world.danger_buttons.iter().any(|btn| p.bounds().intersects(btn)));
        if hit_hazard {
            *status = GameStatus::Dead;
            *dead_until = now_ms + respawn_delay_ms;
            return;
        }
    }

    if *key_collected {
        players_at_door.clear();
        players_at_door.extend(
            players
                .values()
                .filter(|p| !p.dead && p.bounds().intersects(&world.door))
                .map(|p| p.id),
        );
        if players_at_door.len() == present_player_count && present_player_count > 0 {
            *status = GameStatus::Won;
            return;
        }
    }

    *status = GameStatus::Playing;
}

#[allow(clippy::too_many_arguments)]
fn reset_round(
    players: &mut HashMap<String, PlayerState>,
    world: &mut WorldRuntime,
    key_collected: &mut bool,
    players_at_door: &mut Vec<u8>,
    status: &mut GameStatus,
    dead_until: &mut u64,
    player_order: &[(u8, String)],
    world_id: u8,
    world2_base_y: i32,
) {
    *world = clone_runtime(world_id, world2_base_y);
    *key_collected = false;
    players_at_door.clear();
    *status = GameStatus::Playing;
    *dead_until = 0;

    for (slot, client_player_id) in player_order.iter() {
        let (x, y) = world.spawn_for_slot(*slot);
        if let Some(existing) = players.get_mut(client_player_id) {
            let hero = existing.hero.clone();
            let name = existing.name.clone();
            *existing = PlayerState::spawn(*slot, client_player_id.clone(), hero, name, x, y);
        }
    }
}

/// Marks a player dead and arms the room-wide respawn deadline. Called by
/// the tick scheduler when a player's physics step reports a fall-out
/// (spec.md §4.3 step 9), which is not itself a round-evaluator concern
/// since it can happen on any player's step, not just at evaluation time.
pub fn mark_player_dead(status: &mut GameStatus, dead_until: &mut u64, now_ms: u64, respawn_delay_ms: u64) {
    *status = GameStatus::Dead;
    *dead_until = now_ms + respawn_delay_ms;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players_with(ids: &[&str], world: &WorldRuntime) -> (HashMap<String, PlayerState>, Vec<(u8, String)>) {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for (i, id) in ids.iter().enumerate() {
            let slot = (i + 1) as u8;
            let (x, y) = world.spawn_for_slot(slot);
            map.insert(id.to_string(), PlayerState::spawn(slot, id.to_string(), None, format!("Player {slot}"), x, y));
            order.push((slot, id.to_string()));
        }
        (map, order)
    }

    #[test]
    fn key_pickup_latches_and_persists() {
        let mut world = clone_runtime(1, 820);
        let (mut players, order) = players_with(&["a"], &world);
        players.get_mut("a").unwrap().x = world.key.x;
        players.get_mut("a").unwrap().y = world.key.y;

        let mut key_collected = false;
        let mut players_at_door = Vec::new();
        let mut status = GameStatus::Playing;
        let mut dead_until = 0u64;

        evaluate_round(
            RoundEvaluation {
                players: &mut players,
                world: &mut world,
                key_collected: &mut key_collected,
                players_at_door: &mut players_at_door,
                status: &mut status,
                dead_until: &mut dead_until,
                player_order: &order,
                world_id: 1,
                world2_base_y: 820,
            },
            0,
            1800,
            1,
        );

        assert!(key_collected);
    }

    #[test]
    fn win_requires_every_present_player_at_door() {
        let mut world = clone_runtime(1, 820);
        let (mut players, order) = players_with(&["a", "b"], &world);
        for p in players.values_mut() {
            p.x = world.door.x;
            p.y = world.door.y;
        }

        let mut key_collected = true;
        let mut players_at_door = Vec::new();
        let mut status = GameStatus::Playing;
        let mut dead_until = 0u64;

        evaluate_round(
            RoundEvaluation {
                players: &mut players,
                world: &mut world,
                key_collected: &mut key_collected,
                players_at_door: &mut players_at_door,
                status: &mut status,
                dead_until: &mut dead_until,
                player_order: &order,
                world_id: 1,
                world2_base_y: 820,
            },
            0,
            1800,
            2,
        );

        assert_eq!(status, GameStatus::Won);
        assert_eq!(players_at_door.len(), 2);
    }

    #[test]
    fn world2_hazard_contact_kills_and_arms_respawn() {
        let mut world = clone_runtime(2, 820);
        let (mut players, order) = players_with(&["a"], &world);
        let hazard = world.danger_buttons[0];
        players.get_mut("a").unwrap().x = hazard.x;
        players.get_mut("a").unwrap().y = hazard.y;

        let mut key_collected = false;
        let mut players_at_door = Vec::new();
        let mut status = GameStatus::Playing;
        let mut dead_until = 0u64;

        evaluate_round(
            RoundEvaluation {
                players: &mut players,
                world: &mut world,
                key_collected: &mut key_collected,
                players_at_door: &mut players_at_door,
                status: &mut status,
                dead_until: &mut dead_until,
                player_order: &order,
                world_id: 2,
                world2_base_y: 820,
            },
            1_000,
            1_800,
            1,
        );

        assert_eq!(status, GameStatus::Dead);
        assert_eq!(dead_until, 2_800);
    }

    #[test]
    fn dead_round_resets_after_respawn_delay_elapses() {
        let mut world = clone_runtime(2, 820);
        let (mut players, order) = players_with(&["a"], &world);

        let mut key_collected = true;
        let mut players_at_door = vec![1];
        let mut status = GameStatus::Dead;
        let mut dead_until = 1_000u64;

        evaluate_round(
            RoundEvaluation {
                players: &mut players,
                world: &mut world,
                key_collected: &mut key_collected,
                players_at_door: &mut players_at_door,
                status: &mut status,
                dead_until: &mut dead_until,
                player_order: &order,
                world_id: 2,
                world2_base_y: 820,
            },
            1_000,
            1_800,
            1,
        );

        assert_eq!(status, GameStatus::Playing);
        assert!(!key_collected);
        assert!(players_at_door.is_empty());
        assert_eq!(dead_until, 0);
    }
}
