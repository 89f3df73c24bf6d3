//! The per-room data model shared between the simulation and the wire
//! protocol: lobby players, input frames, simulation player state, and the
//! outbound snapshot.

use serde::{Deserialize, Serialize};

/// Fixed player collider size (pixels). Every `PlayerState` uses this size;
/// it never changes per-hero or per-world.
pub const PLAYER_WIDTH: f32 = 45.0;
pub const PLAYER_HEIGHT: f32 = 55.0;

/// Hard cap on room size (spec.md §1 "more than four players per room" is
/// explicitly out of scope).
pub const MAX_PLAYERS: usize = 4;

/// Deterministic per-slot color, assigned by slot index (1..=4) and never
/// re-derived from anything the client sends.
pub const SLOT_COLORS: [&str; MAX_PLAYERS] = ["#e74c3c", "#3498db", "#2ecc71", "#f1c40f"];

pub fn color_for_slot(slot: u8) -> Color {
    let idx = (slot.saturating_sub(1) as usize).min(SLOT_COLORS.len() - 1);
    Color(SLOT_COLORS[idx].to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Color(pub String);

/// Trims a player-supplied name and truncates it to 20 characters.
///
/// Idempotent: `sanitize_name(sanitize_name(x)) == sanitize_name(x)`.
pub fn sanitize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let truncated: String = trimmed.chars().take(20).collect();
    truncated.trim().to_string()
}

/// A player's lobby-visible state: hero pick, ready flag, display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPlayer {
    pub hero: Option<String>,
    pub ready: bool,
    pub name: String,
}

impl LobbyPlayer {
    pub fn new(default_name: String) -> Self {
        Self {
            hero: None,
            ready: false,
            name: sanitize_name(&default_name),
        }
    }
}

/// A single frame of player intent. Last-write-wins per player; clients
/// repeat intent every frame as long as a key is held.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InputFrame {
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub jump: bool,
}

/// Per-tick simulation entity for one player.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Slot number 1..=4, stable for the room's lifetime.
    pub id: u8,
    pub client_player_id: String,
    pub hero: Option<String>,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    #[serde(skip)]
    pub width: f32,
    #[serde(skip)]
    pub height: f32,
    pub on_ground: bool,
    pub facing_right: bool,
    pub anim_frame: u8,
    pub color: Color,
    pub dead: bool,
    pub standing_on_player: Option<u8>,
    /// Vertical-resolution scratch: the player's `y` before the current
    /// tick's vertical step. Not broadcast; recomputed every tick.
    #[serde(skip)]
    pub prev_y: f32,
}

impl PlayerState {
    pub fn spawn(slot: u8, client_player_id: String, hero: Option<String>, name: String, x: f32, y: f32) -> Self {
        Self {
            id: slot,
            client_player_id,
            hero,
            name,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            width: PLAYER_WIDTH,
            height: PLAYER_HEIGHT,
            on_ground: true,
            facing_right: true,
            anim_frame: 0,
            color: color_for_slot(slot),
            dead: false,
            standing_on_player: None,
            prev_y: y,
        }
    }

    pub fn bounds(&self) -> shared_aabb::Aabb {
        shared_aabb::Aabb::new(self.x, self.y, self.width, self.height)
    }
}

/// Re-exported under a distinct path to avoid a circular `use super::*`
/// inside `bounds()` while keeping the geometry type's name unqualified
/// at call sites elsewhere in the crate.
mod shared_aabb {
    pub use crate::geometry::Aabb;
}

/// Game status as broadcast in `gameState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Playing,
    Dead,
    Won,
}

/// The full simulation snapshot broadcast after every tick and after any
/// command that visibly changes the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub players: std::collections::HashMap<String, PlayerState>,
    pub key_collected: bool,
    pub players_at_door: Vec<u8>,
    pub game_status: GameStatus,
    pub world: u8,
    pub key: crate::geometry::Aabb,
    pub door: crate::geometry::Aabb,
    pub danger_buttons: Vec<crate::geometry::Aabb>,
    pub moving_platforms: Vec<crate::geometry::Aabb>,
    pub falling_platforms: Vec<crate::geometry::Aabb>,
}
