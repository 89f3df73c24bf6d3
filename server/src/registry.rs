//! The global coordinator: the `rooms` table, the `playerId -> roomCode`
//! binding, and the disconnect-grace timers (spec.md §5, §9).
//!
//! Everything here is reached only for create/lookup/delete; once a
//! connection is bound to a room, all further mutation goes straight to
//! that room's owning task and never touches this table again.

use crate::config::Config;
use crate::error::ServerError;
use crate::room::Room;
use crate::scheduler::{spawn_room, RoomHandle, RoomMessage, RoomSettings};
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Duration;

pub struct Registry {
    rooms: RwLock<HashMap<String, Arc<RoomHandle>>>,
    player_rooms: RwLock<HashMap<String, String>>,
    disconnect_generations: RwLock<HashMap<String, u64>>,
    config: Config,
}

impl Registry {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            rooms: RwLock::new(HashMap::new()),
            player_rooms: RwLock::new(HashMap::new()),
            disconnect_generations: RwLock::new(HashMap::new()),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn player_count(&self) -> usize {
        self.player_rooms.read().await.len()
    }

    pub async fn room_for_player(&self, player_id: &str) -> Option<String> {
        self.player_rooms.read().await.get(player_id).cloned()
    }

    pub async fn get_room(&self, room_code: &str) -> Option<Arc<RoomHandle>> {
        self.rooms.read().await.get(room_code).cloned()
    }

    pub async fn create_room(
        self: &Arc<Self>,
        room_code: String,
        max_players: u8,
        host_id: String,
        host_name: Option<String>,
        world: u8,
        canvas_height: Option<f32>,
    ) -> Result<(Arc<RoomHandle>, shared::RoomStatePayload), ServerError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room_code) {
            return Err(ServerError::Validation("Room already exists".into()));
        }

        let mut room = Room::create(room_code.clone(), max_players, host_id.clone(), host_name, world, self.config.world2_base_y)?;
        if let Some(height) = canvas_height {
            room.report_canvas_height(height);
        }
        let room_state = room.to_room_state_payload();

        let settings = RoomSettings {
            tick_rate: self.config.tick_rate,
            respawn_delay_ms: self.config.respawn_delay_ms,
            disconnect_grace_ms: self.config.disconnect_grace_ms,
        };

        let (empty_tx, mut empty_rx) = mpsc::unbounded_channel::<String>();
        let handle = Arc::new(spawn_room(room, settings, empty_tx));
        rooms.insert(room_code.clone(), handle.clone());
        drop(rooms);

        self.player_rooms.write().await.insert(host_id, room_code.clone());

        let registry = self.clone();
        tokio::spawn(async move {
            if let Some(code) = empty_rx.recv().await {
                registry.rooms.write().await.remove(&code);
                info!("room {code} removed from registry");
            }
        });

        Ok((handle, room_state))
    }

    /// Binds `player_id` to `room_code` and cancels any pending
    /// disconnect-grace timer for that player, e.g. a reconnect arriving
    /// from `joinRoom` or any new connection bound to the same playerId.
    pub async fn bind_player(&self, player_id: &str, room_code: &str) {
        self.player_rooms.write().await.insert(player_id.to_string(), room_code.to_string());
        self.cancel_disconnect(player_id).await;
    }

    async fn cancel_disconnect(&self, player_id: &str) {
        let mut gens = self.disconnect_generations.write().await;
        let next = gens.get(player_id).copied().unwrap_or(0) + 1;
        gens.insert(player_id.to_string(), next);
    }

    /// Arms the grace timer for a player whose last live connection just
    /// dropped. Idempotent: arming again simply bumps the generation, so
    /// an earlier timer's expiry check silently no-ops.
    pub async fn schedule_disconnect(self: &Arc<Self>, player_id: &str, room_code: &str) {
        let generation = {
            let mut gens = self.disconnect_generations.write().await;
            let next = gens.get(player_id).copied().unwrap_or(0) + 1;
            gens.insert(player_id.to_string(), next);
            next
        };

        let registry = self.clone();
        let player_id = player_id.to_string();
        let room_code = room_code.to_string();
        let grace_ms = self.config.disconnect_grace_ms;

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(grace_ms)).await;

            let still_current = registry.disconnect_generations.read().await.get(&player_id).copied() == Some(generation);
            if !still_current {
                return;
            }

            if let Some(handle) = registry.rooms.read().await.get(&room_code).cloned() {
                let _ = handle.command_tx.send(RoomMessage::PlayerDisconnected { player_id: player_id.clone() });
            }
            registry.player_rooms.write().await.remove(&player_id);
        });
    }
}
