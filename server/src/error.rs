//! The error taxonomy for the room server.
//!
//! Every failure mode a room's owning task can hit is one of these five
//! kinds. None of them ever panics the task or the process; the policy is
//! "recover locally wherever the room remains usable, abort the command
//! only".

use std::fmt;

#[derive(Debug)]
pub enum ServerError {
    /// Bad params, room-code collision, room full, already-started,
    /// hero taken, not-host, not-ready. Surfaced to the originating
    /// connection as a `*Denied` message; never affects room state.
    Validation(String),
    /// Command arrived without a bound room/player, or the room is gone.
    /// Silently ignored.
    PreconditionMiss,
    /// Non-finite coordinates or velocities. Repaired in place on the
    /// next `ensure_player_state` call; never propagated to clients.
    SimulationFault(String),
    /// Socket bind or accept failure. Logged and fatal to the listener
    /// task, but never panics.
    Transport(std::io::Error),
    /// Invariant violation. Logged with room/player context; the
    /// offending command is aborted but the room and tick loop continue.
    Invariant(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Validation(msg) => write!(f, "validation error: {msg}"),
            ServerError::PreconditionMiss => write!(f, "precondition miss"),
            ServerError::SimulationFault(msg) => write!(f, "simulation fault: {msg}"),
            ServerError::Transport(e) => write!(f, "transport error: {e}"),
            ServerError::Invariant(msg) => write!(f, "invariant violation: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {}
