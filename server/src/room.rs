//! A single room's lobby state, world runtime, and per-tick simulation.
//!
//! A `Room` is owned exclusively by the task that drives its tick loop
//! (see `scheduler`); every method here assumes single-threaded access,
//! matching the "no two events for the same room may mutate its state
//! concurrently" rule.

use crate::error::ServerError;
use crate::evaluator::{evaluate_round, RoundEvaluation};
use crate::physics;
use crate::world::{clone_runtime, WorldRuntime};
use shared::{sanitize_name, GameStatus, InputFrame, LobbyPlayer, PlayerState, RoomStatePayload, Snapshot};
use std::collections::HashMap;

pub struct Room {
    pub room_code: String,
    pub max_players: u8,
    pub host_id: String,
    pub started: bool,
    pub world_id: u8,
    pub world2_base_y: i32,
    /// Slot table: index `i` holds the player occupying slot `i + 1`, or
    /// `None` once that slot's occupant has left. Never compacted, so a
    /// departure never renumbers the players who remain.
    pub player_order: Vec<Option<String>>,
    pub players: HashMap<String, LobbyPlayer>,
    pub world_runtime: Option<WorldRuntime>,
    pub player_states: HashMap<String, PlayerState>,
    pub key_collected: bool,
    pub players_at_door: Vec<u8>,
    pub game_status: GameStatus,
    pub inputs: HashMap<String, InputFrame>,
    pub last_step_at: Option<u64>,
    pub dead_until: u64,
}

impl Room {
    pub fn create(
        room_code: String,
        max_players: u8,
        host_id: String,
        host_name: Option<String>,
        world: u8,
        default_world2_base_y: i32,
    ) -> Result<Self, ServerError> {
        if !(1..=4).contains(&max_players) {
            return Err(ServerError::Validation("maxPlayers must be between 1 and 4".into()));
        }

        let mut players = HashMap::new();
        players.insert(
            host_id.clone(),
            LobbyPlayer::new(host_name.unwrap_or_else(|| "Player 1".to_string())),
        );

        Ok(Self {
            room_code,
            max_players,
            host_id: host_id.clone(),
            started: false,
            world_id: world,
            world2_base_y: default_world2_base_y,
            player_order: vec![Some(host_id)],
            players,
            world_runtime: None,
            player_states: HashMap::new(),
            key_collected: false,
            players_at_door: Vec::new(),
            game_status: GameStatus::Waiting,
            inputs: HashMap::new(),
            last_step_at: None,
            dead_until: 0,
        })
    }

    pub fn slot_of(&self, player_id: &str) -> Option<u8> {
        self.player_order.iter().position(|p| p.as_deref() == Some(player_id)).map(|i| (i + 1) as u8)
    }

    /// First unoccupied slot, 1-indexed. Assumes the caller already
    /// checked `self.players.len() < self.max_players`.
    fn next_free_slot(&self) -> u8 {
        for i in 0..self.max_players as usize {
            if !matches!(self.player_order.get(i), Some(Some(_))) {
                return (i + 1) as u8;
            }
        }
        self.max_players
    }

    pub fn join(&mut self, player_id: &str, name: Option<String>) -> Result<u8, ServerError> {
        if self.players.contains_key(player_id) {
            return self.slot_of(player_id).ok_or(ServerError::PreconditionMiss);
        }
        if self.started {
            return Err(ServerError::Validation("Game already started".into()));
        }
        if self.players.len() >= self.max_players as usize {
            return Err(ServerError::Validation("Room is full".into()));
        }

        let slot = self.next_free_slot();
        let default_name = format!("Player {slot}");
        self.players
            .insert(player_id.to_string(), LobbyPlayer::new(name.unwrap_or(default_name)));
        if slot as usize <= self.player_order.len() {
            self.player_order[slot as usize - 1] = Some(player_id.to_string());
        } else {
            self.player_order.push(Some(player_id.to_string()));
        }
        Ok(slot)
    }

    pub fn set_world(&mut self, caller: &str, world: u8) -> Result<(), ServerError> {
        if caller != self.host_id {
            return Err(ServerError::Validation("Only the host can change the world".into()));
        }
        if self.started {
            return Err(ServerError::PreconditionMiss);
        }
        self.world_id = world;
        self.world_runtime = Some(clone_runtime(world, self.world2_base_y));
        self.key_collected = false;
        self.players_at_door.clear();
        self.inputs.clear();
        self.game_status = GameStatus::Waiting;
        Ok(())
    }

    pub fn set_player_name(&mut self, player_id: &str, name: &str) {
        let clean = sanitize_name(name);
        if clean.is_empty() {
            return;
        }
        if let Some(lp) = self.players.get_mut(player_id) {
            lp.name = clean.clone();
        }
        if let Some(ps) = self.player_states.get_mut(player_id) {
            ps.name = clean;
        }
    }

    pub fn select_hero(&mut self, player_id: &str, hero: &str) -> Result<(), ServerError> {
        let hero = hero.trim().to_string();
        let taken = self
            .players
            .iter()
            .any(|(pid, lp)| pid != player_id && lp.hero.as_deref() == Some(hero.as_str()));
        if taken {
            return Err(ServerError::Validation("Hero already taken".into()));
        }
        let lp = self.players.get_mut(player_id).ok_or(ServerError::PreconditionMiss)?;
        lp.hero = Some(hero);
        lp.ready = false;
        Ok(())
    }

    pub fn set_ready(&mut self, player_id: &str, ready: bool) -> Result<(), ServerError> {
        let lp = self.players.get_mut(player_id).ok_or(ServerError::PreconditionMiss)?;
        if lp.hero.is_none() {
            return Err(ServerError::Validation("Pick a hero before readying up".into()));
        }
        lp.ready = ready;
        Ok(())
    }

    pub fn start_game_now(&mut self, caller: &str) -> Result<(), ServerError> {
        if caller != self.host_id {
            return Err(ServerError::Validation("Only the host can start the game".into()));
        }
        if self.started {
            return Err(ServerError::Validation("Game already started".into()));
        }
        if self.players.values().any(|p| p.hero.is_none()) {
            return Err(ServerError::Validation("Everyone must pick a hero".into()));
        }
        if self.players.values().any(|p| !p.ready) {
            return Err(ServerError::Validation("Everyone must be ready".into()));
        }

        self.started = true;
        let world = clone_runtime(self.world_id, self.world2_base_y);
        self.key_collected = false;
        self.players_at_door.clear();
        self.game_status = GameStatus::Playing;
        self.dead_until = 0;
        self.last_step_at = None;
        self.inputs.clear();
        self.player_states.clear();

        for (i, slot_entry) in self.player_order.iter().enumerate() {
            let Some(pid) = slot_entry else { continue };
            let slot = (i + 1) as u8;
            let (x, y) = world.spawn_for_slot(slot);
            let lp = &self.players[pid];
            self.player_states
                .insert(pid.clone(), PlayerState::spawn(slot, pid.clone(), lp.hero.clone(), lp.name.clone(), x, y));
        }
        self.world_runtime = Some(world);
        Ok(())
    }

    pub fn apply_input(&mut self, player_id: &str, input: InputFrame) {
        if !self.started {
            return;
        }
        self.inputs.insert(player_id.to_string(), input);
    }

    /// Dynamic W2 ground sync (spec.md §4.6): rebuilds the World 2 runtime
    /// at the reported height and translates every living player so they
    /// stay planted, but only when the computed base moved enough to
    /// matter.
    pub fn report_canvas_height(&mut self, canvas_height: f32) {
        if self.world_id != 2 {
            return;
        }
        let new_base = crate::world::clamp_world2_base_y(canvas_height.round() as i32 - 80);
        if (new_base - self.world2_base_y).abs() < 2 {
            return;
        }
        let delta = (new_base - self.world2_base_y) as f32;
        self.world2_base_y = new_base;
        if let Some(world) = self.world_runtime.as_ref() {
            if world.id == 2 {
                self.world_runtime = Some(clone_runtime(2, new_base));
            }
        }
        for ps in self.player_states.values_mut() {
            ps.y += delta;
            ps.prev_y += delta;
        }
    }

    /// Removes a player entirely (grace period expiry). The vacated slot
    /// is left `None`, not reassigned, so the remaining players' slots
    /// never shift. Returns `true` if the room is now empty and should
    /// be destroyed.
    pub fn remove_player(&mut self, player_id: &str) -> bool {
        self.players.remove(player_id);
        if let Some(slot_entry) = self.player_order.iter_mut().find(|p| p.as_deref() == Some(player_id)) {
            *slot_entry = None;
        }
        self.player_states.remove(player_id);
        self.inputs.remove(player_id);

        if self.host_id == player_id {
            if let Some(new_host) = self.player_order.iter().flatten().next() {
                self.host_id = new_host.clone();
            }
        }

        self.players.is_empty()
    }

    fn ensure_player_state(&mut self, player_id: &str, world: &WorldRuntime) -> &mut PlayerState {
        let slot = self.slot_of(player_id).unwrap_or(1);
        let (sx, sy) = world.spawn_for_slot(slot);
        let hero = self.players.get(player_id).and_then(|p| p.hero.clone());
        let name = self.players.get(player_id).map(|p| p.name.clone()).unwrap_or_default();

        let entry = self
            .player_states
            .entry(player_id.to_string())
            .or_insert_with(|| PlayerState::spawn(slot, player_id.to_string(), hero, name, sx, sy));

        if !entry.x.is_finite() || !entry.y.is_finite() || !entry.vx.is_finite() || !entry.vy.is_finite() {
            let fault = ServerError::SimulationFault(format!("player {player_id} had non-finite state"));
            log::warn!("room {}: {fault}", self.room_code);
            entry.x = sx;
            entry.y = sy;
            entry.vx = 0.0;
            entry.vy = 0.0;
        }

        entry
    }

    /// Runs one tick (spec.md §4.7). Returns the new snapshot, or `None`
    /// if the room hasn't started yet.
    pub fn tick(&mut self, now_ms: u64, tick_rate: u32, respawn_delay_ms: u64) -> Option<Snapshot> {
        if !self.started {
            return None;
        }

        let nominal_interval = 1000 / tick_rate.max(1) as u64;
        let elapsed_ms = match self.last_step_at {
            Some(last) => now_ms.saturating_sub(last),
            None => nominal_interval,
        };
        self.last_step_at = Some(now_ms);
        let dt_scale = (elapsed_ms as f32 * tick_rate as f32 / 1000.0).clamp(0.5, 2.5);

        // Taken out of `self` for the duration of the tick so the player
        // loop can hold a mutable borrow of `world` alongside a mutable
        // borrow of `self.player_states` without aliasing `self` twice.
        let mut world = self.world_runtime.take()?;
        physics::advance_world(&mut world, dt_scale);

        let slots: Vec<(u8, String)> = self
            .player_order
            .iter()
            .enumerate()
            .filter_map(|(i, slot_entry)| slot_entry.as_ref().map(|pid| ((i + 1) as u8, pid.clone())))
            .collect();

        for (_, pid) in &slots {
            let input = self.inputs.get(pid).copied().unwrap_or_default();
            let fell = {
                let player = self.ensure_player_state(pid, &world);
                physics::step_player(player, input, &mut world, dt_scale)
            };
            if fell {
                if let Some(player) = self.player_states.get_mut(pid) {
                    player.dead = true;
                }
                crate::evaluator::mark_player_dead(&mut self.game_status, &mut self.dead_until, now_ms, respawn_delay_ms);
            }
        }

        let mut ordered: Vec<PlayerState> = slots.iter().filter_map(|(_, pid)| self.player_states.get(pid).cloned()).collect();
        physics::resolve_stacking(&mut ordered, world.width);
        for ((_, pid), ps) in slots.iter().zip(ordered) {
            self.player_states.insert(pid.clone(), ps);
        }

        let present_player_count = self.players.len();
        evaluate_round(
            RoundEvaluation {
                players: &mut self.player_states,
                world: &mut world,
                key_collected: &mut self.key_collected,
                players_at_door: &mut self.players_at_door,
                status: &mut self.game_status,
                dead_until: &mut self.dead_until,
                player_order: &slots,
                world_id: self.world_id,
                world2_base_y: self.world2_base_y,
            },
            now_ms,
            respawn_delay_ms,
            present_player_count,
        );

        self.world_runtime = Some(world);
        Some(self.to_snapshot())
    }

    pub fn to_room_state_payload(&self) -> RoomStatePayload {
        RoomStatePayload {
            room_code: self.room_code.clone(),
            max_players: self.max_players,
            host_id: self.host_id.clone(),
            started: self.started,
            world: self.world_id,
            players: self.players.clone(),
        }
    }

    pub fn to_snapshot(&self) -> Snapshot {
        let world = self.world_runtime.as_ref();
        Snapshot {
            players: self.player_states.clone(),
            key_collected: self.key_collected,
            players_at_door: self.players_at_door.clone(),
            game_status: self.game_status,
            world: self.world_id,
            key: world.map(|w| w.key).unwrap_or(shared::Aabb::new(0.0, 0.0, 0.0, 0.0)),
            door: world.map(|w| w.door).unwrap_or(shared::Aabb::new(0.0, 0.0, 0.0, 0.0)),
            danger_buttons: world.map(|w| w.danger_buttons.clone()).unwrap_or_default(),
            moving_platforms: world.map(|w| w.moving_platforms.iter().map(|m| m.aabb).collect()).unwrap_or_default(),
            falling_platforms: world.map(|w| w.falling_platforms.iter().map(|f| f.aabb).collect()).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_room_seeds_host_as_sole_player() {
        let room = Room::create("ABCD".into(), 2, "host".into(), None, 1, 820).unwrap();
        assert_eq!(room.host_id, "host");
        assert_eq!(room.players.len(), 1);
        assert_eq!(room.slot_of("host"), Some(1));
    }

    #[test]
    fn create_room_rejects_bad_max_players() {
        assert!(Room::create("ABCD".into(), 0, "host".into(), None, 1, 820).is_err());
        assert!(Room::create("ABCD".into(), 5, "host".into(), None, 1, 820).is_err());
    }

    #[test]
    fn join_fills_slots_in_order_and_rejects_when_full() {
        let mut room = Room::create("ABCD".into(), 2, "host".into(), None, 1, 820).unwrap();
        assert_eq!(room.join("b", None).unwrap(), 2);
        assert!(room.join("c", None).is_err());
    }

    #[test]
    fn rejoin_same_player_id_is_idempotent() {
        let mut room = Room::create("ABCD".into(), 2, "host".into(), None, 1, 820).unwrap();
        let first = room.join("host", None).unwrap();
        assert_eq!(first, 1);
        assert_eq!(room.players.len(), 1);
    }

    #[test]
    fn hero_uniqueness_is_enforced() {
        let mut room = Room::create("ABCD".into(), 2, "a".into(), None, 1, 820).unwrap();
        room.join("b", None).unwrap();
        room.select_hero("a", "knight").unwrap();
        assert!(room.select_hero("b", "knight").is_err());
    }

    #[test]
    fn selecting_hero_clears_ready() {
        let mut room = Room::create("ABCD".into(), 2, "a".into(), None, 1, 820).unwrap();
        room.select_hero("a", "knight").unwrap();
        room.set_ready("a", true).unwrap();
        room.select_hero("a", "mage").unwrap();
        assert!(!room.players["a"].ready);
    }

    #[test]
    fn start_requires_heroes_then_ready() {
        let mut room = Room::create("ABCD".into(), 2, "a".into(), None, 1, 820).unwrap();
        room.join("b", None).unwrap();
        assert!(room.start_game_now("a").is_err());

        room.select_hero("a", "knight").unwrap();
        room.select_hero("b", "mage").unwrap();
        assert!(room.start_game_now("a").is_err());

        room.set_ready("a", true).unwrap();
        room.set_ready("b", true).unwrap();
        assert!(room.start_game_now("a").is_ok());
        assert!(room.started);
        assert_eq!(room.game_status, GameStatus::Playing);
        assert_eq!(room.player_states.len(), 2);
    }

    #[test]
    fn only_host_can_start() {
        let mut room = Room::create("ABCD".into(), 2, "a".into(), None, 1, 820).unwrap();
        room.join("b", None).unwrap();
        room.select_hero("a", "knight").unwrap();
        room.select_hero("b", "mage").unwrap();
        room.set_ready("a", true).unwrap();
        room.set_ready("b", true).unwrap();
        assert!(room.start_game_now("b").is_err());
    }

    #[test]
    fn host_re_election_on_departure() {
        let mut room = Room::create("ABCD".into(), 2, "a".into(), None, 1, 820).unwrap();
        room.join("b", None).unwrap();
        let emptied = room.remove_player("a");
        assert!(!emptied);
        assert_eq!(room.host_id, "b");
    }

    #[test]
    fn removing_last_player_reports_room_empty() {
        let mut room = Room::create("ABCD".into(), 2, "a".into(), None, 1, 820).unwrap();
        assert!(room.remove_player("a"));
    }

    #[test]
    fn tick_advances_simulation_once_started() {
        let mut room = Room::create("ABCD".into(), 1, "a".into(), None, 1, 820).unwrap();
        room.select_hero("a", "knight").unwrap();
        room.set_ready("a", true).unwrap();
        room.start_game_now("a").unwrap();

        let snapshot = room.tick(16, 60, 1800).unwrap();
        assert_eq!(snapshot.game_status, GameStatus::Playing);
    }

    #[test]
    fn canvas_height_rebuilds_world2_and_translates_players() {
        let mut room = Room::create("ABCD".into(), 1, "a".into(), None, 2, 820).unwrap();
        room.select_hero("a", "knight").unwrap();
        room.set_ready("a", true).unwrap();
        room.start_game_now("a").unwrap();
        let before_y = room.player_states["a"].y;

        room.report_canvas_height(1000.0);
        assert_eq!(room.world2_base_y, 920);
        assert!(room.player_states["a"].y > before_y);
    }
}
