//! The per-room tick scheduler: one task per room, multiplexing the tick
//! timer against the room's inbound command channel (spec.md §5, §9).
//!
//! A tick is never interrupted by a command, and a command is always
//! processed between ticks. `tokio::select!` polls both arms but only
//! one future resolves per loop iteration, which already gives us that
//! ordering for free.

use crate::error::ServerError;
use crate::room::Room;
use log::{debug, error, info, warn};
use shared::{ClientCommand, Envelope, InputFrame, ServerEvent, Snapshot};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration};

/// One inbound message for a room's owning task. `reply_tx` carries a
/// direct, unicast response (`joinSuccess`, a `*Denied`) back to the
/// originating connection only. Broadcasts go out over `broadcast_tx`
/// to every subscriber instead.
pub enum RoomMessage {
    Command {
        player_id: String,
        command: ClientCommand,
        reply_tx: mpsc::UnboundedSender<String>,
    },
    PlayerDisconnected {
        player_id: String,
    },
}

pub struct RoomHandle {
    pub room_code: String,
    pub command_tx: mpsc::UnboundedSender<RoomMessage>,
    pub broadcast_tx: broadcast::Sender<String>,
}

pub struct RoomSettings {
    pub tick_rate: u32,
    pub respawn_delay_ms: u64,
    pub disconnect_grace_ms: u64,
}

pub(crate) fn encode(event: &ServerEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|e| {
        warn!("failed to encode server event: {e}");
        "{}".to_string()
    })
}

fn room_state_frame(room: &Room) -> String {
    encode(&ServerEvent::RoomState(room.to_room_state_payload()))
}

fn game_state_frame(snapshot: &Snapshot) -> String {
    encode(&ServerEvent::GameState(snapshot.clone()))
}

/// Spawns the owning task for a freshly created room and returns a handle
/// the transport/command layer can forward messages through.
pub fn spawn_room(mut room: Room, settings: RoomSettings, on_empty: mpsc::UnboundedSender<String>) -> RoomHandle {
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<RoomMessage>();
    let (broadcast_tx, _) = broadcast::channel::<String>(256);
    let handle = RoomHandle {
        room_code: room.room_code.clone(),
        command_tx,
        broadcast_tx: broadcast_tx.clone(),
    };

    tokio::spawn(async move {
        let mut tick_interval = interval(Duration::from_millis((1000 / settings.tick_rate.max(1) as u64).max(10)));
        info!("room {} owning task started", room.room_code);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    if !room.started {
                        continue;
                    }
                    let now_ms = crate::now_ms();
                    if let Some(snapshot) = room.tick(now_ms, settings.tick_rate, settings.respawn_delay_ms) {
                        let _ = broadcast_tx.send(game_state_frame(&snapshot));
                    }
                }
                msg = command_rx.recv() => {
                    match msg {
                        Some(RoomMessage::Command { player_id, command, reply_tx }) => {
                            handle_command(&mut room, &player_id, command, &reply_tx, &broadcast_tx);
                        }
                        Some(RoomMessage::PlayerDisconnected { player_id }) => {
                            debug!("room {}: removing player {player_id} after grace expiry", room.room_code);
                            let emptied = room.remove_player(&player_id);
                            let _ = broadcast_tx.send(room_state_frame(&room));
                            if emptied {
                                info!("room {} emptied, stopping owning task", room.room_code);
                                let _ = on_empty.send(room.room_code.clone());
                                break;
                            }
                        }
                        None => {
                            warn!("room {}: command channel closed unexpectedly", room.room_code);
                            break;
                        }
                    }
                }
            }
        }
    });

    handle
}

fn send_denied(reply_tx: &mpsc::UnboundedSender<String>, event: ServerEvent) {
    let _ = reply_tx.send(encode(&event));
}

fn handle_command(
    room: &mut Room,
    player_id: &str,
    command: ClientCommand,
    reply_tx: &mpsc::UnboundedSender<String>,
    broadcast_tx: &broadcast::Sender<String>,
) {
    match command {
        ClientCommand::CreateRoom { .. } => {
            // Room creation is handled by the registry before a room task
            // exists, so a CreateRoom reaching an existing room's task is
            // a stray duplicate, not a client mistake.
            let err = ServerError::Invariant(format!("stray CreateRoom reached room {}", room.room_code));
            error!("room {}: {err}", room.room_code);
        }
        ClientCommand::JoinRoom { player_id: joining_id, name, .. } => {
            match room.join(&joining_id, name) {
                Ok(slot) => {
                    let _ = reply_tx.send(encode(&ServerEvent::JoinSuccess {
                        room_code: room.room_code.clone(),
                        player_id: joining_id,
                        player_index: slot,
                        message: "joined".to_string(),
                    }));
                    let _ = broadcast_tx.send(room_state_frame(room));
                }
                Err(ServerError::Validation(message)) => send_denied(reply_tx, ServerEvent::JoinDenied { message }),
                Err(_) => {}
            }
        }
        ClientCommand::SetPlayerName { name } => {
            room.set_player_name(player_id, &name);
            let _ = broadcast_tx.send(room_state_frame(room));
        }
        ClientCommand::SetWorld { world } => match room.set_world(player_id, world) {
            Ok(()) => {
                let _ = broadcast_tx.send(room_state_frame(room));
                let _ = broadcast_tx.send(game_state_frame(&room.to_snapshot()));
            }
            Err(_) => {
                // Denied silently, per spec.md §9 open-question (b).
            }
        },
        ClientCommand::SelectHero { hero } => match room.select_hero(player_id, &hero) {
            Ok(()) => {
                let _ = broadcast_tx.send(room_state_frame(room));
            }
            Err(ServerError::Validation(message)) => send_denied(reply_tx, ServerEvent::HeroDenied { message }),
            Err(_) => {}
        },
        ClientCommand::SetReady { ready } => match room.set_ready(player_id, ready) {
            Ok(()) => {
                let _ = broadcast_tx.send(room_state_frame(room));
            }
            Err(ServerError::Validation(message)) => send_denied(reply_tx, ServerEvent::ReadyDenied { message }),
            Err(_) => {}
        },
        ClientCommand::StartGameNow => match room.start_game_now(player_id) {
            Ok(()) => {
                let _ = reply_tx.send(encode(&ServerEvent::StartGame));
                let _ = broadcast_tx.send(encode(&ServerEvent::StartGame));
                let _ = broadcast_tx.send(room_state_frame(room));
                let _ = broadcast_tx.send(game_state_frame(&room.to_snapshot()));
            }
            Err(ServerError::Validation(message)) => send_denied(reply_tx, ServerEvent::StartDenied { message }),
            Err(_) => {}
        },
        ClientCommand::PlayerInput { input, canvas_height } => {
            apply_player_input(room, player_id, input, canvas_height);
        }
        ClientCommand::Disconnect => {
            // Transport-level disconnect is handled by the registry's
            // grace timer, not here; a room task never removes a player
            // on its own initiative.
        }
    }
}

fn apply_player_input(room: &mut Room, player_id: &str, input: InputFrame, canvas_height: Option<f32>) {
    room.apply_input(player_id, input);
    if let Some(height) = canvas_height {
        room.report_canvas_height(height);
    }
}

/// Parses one inbound text frame into a typed command, translating parse
/// failures into the `PreconditionMiss`/Validation policy of spec.md §7
/// rather than ever panicking the connection task.
pub fn parse_command(raw: &str) -> Result<ClientCommand, String> {
    let envelope: Envelope = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    ClientCommand::from_envelope(&envelope)
}
