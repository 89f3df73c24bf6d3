//! # Room Server Library
//!
//! The authoritative server for a cooperative 2D platformer: room
//! lifecycle, a fixed-rate deterministic physics simulation, and a
//! pub/sub broadcast layer over a WebSocket transport.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the definitive version of the platformer physics and
//! round state. Clients send intent (`playerInput`); the server decides
//! position, collision, death, and win outcomes and broadcasts the
//! result as `gameState`.
//!
//! ### Room Lifecycle
//! Handles the complete lifecycle of a room: creation, join/reconnect
//! with a disconnect-grace window, host election, and destruction once
//! the last player's grace period expires.
//!
//! ## Architecture Design
//!
//! ### Per-Room Owning Task
//! Each room runs on its own task that multiplexes a tick timer against
//! an inbound command channel (see [`scheduler`]). No two events for the
//! same room ever mutate its state concurrently; different rooms step
//! independently.
//!
//! ### Coordinator-Owned Registry
//! The room table and the `playerId -> roomCode` binding are owned by a
//! coordinator ([`registry`]) reached only for create/lookup/delete.
//! Once a connection is bound to a room, every further command goes
//! straight to that room's task.
//!
//! ## Module Organization
//!
//! - [`config`]: environment-driven runtime configuration.
//! - [`error`]: the server's error taxonomy.
//! - [`world`]: the two level blueprints and the mutable per-round runtime.
//! - [`physics`]: the per-tick player and platform simulation.
//! - [`evaluator`]: round transitions (reset, death, win).
//! - [`room`]: lobby state, membership, and the `tick` entry point.
//! - [`scheduler`]: the per-room owning task and command dispatch.
//! - [`registry`]: the room table, player binding, and disconnect timers.
//! - [`transport`]: the HTTP/WebSocket surface.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod physics;
pub mod registry;
pub mod room;
pub mod scheduler;
pub mod transport;
pub mod world;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wallclock time in milliseconds since the Unix epoch, the
/// server's sole notion of "now" for tick timing, respawn deadlines, and
/// disconnect-grace expiry.
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}
