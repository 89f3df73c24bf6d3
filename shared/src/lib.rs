//! # Shared Room-Server Library
//!
//! Types shared between the room server binary and its test harnesses:
//! geometry primitives, the simulation data model (players, worlds,
//! snapshots), and the JSON wire protocol exchanged with clients over the
//! WebSocket transport.
//!
//! ## Module Organization
//!
//! ### Geometry (`geometry`)
//! Axis-aligned bounding boxes and the strict-overlap intersection test
//! used throughout collision resolution.
//!
//! ### Model (`model`)
//! The per-room data model: lobby players, input frames, simulation
//! player state, and the outbound snapshot shape.
//!
//! ### Protocol (`protocol`)
//! The tagged client->server command enum and server->client event enum,
//! plus the JSON envelope both are carried in.
//!
//! ## Design Philosophy
//!
//! ### Deterministic Simulation
//! All physics-relevant fields use `f32` so the server's authoritative
//! simulation produces identical results regardless of host platform.
//!
//! ### Serialization
//! Wire types implement `Serialize`/`Deserialize` via `serde` and are
//! encoded as JSON text frames (`serde_json`) rather than a binary
//! format, since the wire protocol is a named-event envelope intended to
//! be readable by thin client implementations.

pub mod geometry;
pub mod model;
pub mod protocol;

pub use geometry::Aabb;
pub use model::{
    color_for_slot, sanitize_name, Color, GameStatus, InputFrame, LobbyPlayer, PlayerState,
    Snapshot, MAX_PLAYERS, PLAYER_HEIGHT, PLAYER_WIDTH,
};
pub use protocol::{
    parse_canvas_height, parse_input_frame, ClientCommand, Envelope, RoomStatePayload, ServerEvent,
};
