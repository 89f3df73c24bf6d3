//! The JSON wire protocol: the envelope every frame is carried in, the
//! client->server command set, and the server->client event set.
//!
//! Client frames are matched on the `event` name with the `data` payload
//! parsed tolerantly where the spec requires it (`playerInput` accepts
//! three different shapes for the same three booleans). Server frames are
//! a plain tagged enum since the server controls their shape.

use crate::model::{InputFrame, LobbyPlayer, Snapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The raw shape every client->server frame arrives as before it is
/// matched into a [`ClientCommand`].
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// A world selector as it may arrive on the wire: a bare number, a numeric
/// string, or one of the `"map1"`/`"world1"`-style aliases.
fn normalize_world(v: &Value) -> u8 {
    match v {
        Value::Number(n) => {
            if n.as_u64() == Some(2) {
                2
            } else {
                1
            }
        }
        Value::String(s) => {
            let lower = s.to_lowercase();
            if lower == "2" || lower == "map2" || lower == "world2" {
                2
            } else {
                1
            }
        }
        _ => 1,
    }
}

/// Parses an `InputFrame` out of any of the three tolerated shapes:
/// `{input:{left,right,jump}}`, `{keys:{left,right,jump}}`, or a flat
/// `{left,right,jump}` object. All three yield an identical `InputFrame`.
pub fn parse_input_frame(data: &Value) -> InputFrame {
    let obj = data
        .get("input")
        .or_else(|| data.get("keys"))
        .unwrap_or(data);

    InputFrame {
        left: obj.get("left").and_then(Value::as_bool).unwrap_or(false),
        right: obj.get("right").and_then(Value::as_bool).unwrap_or(false),
        jump: obj.get("jump").and_then(Value::as_bool).unwrap_or(false),
    }
}

/// Extracts a reported canvas/viewport height, tolerating any of the three
/// field name aliases the client may send.
pub fn parse_canvas_height(data: &Value) -> Option<f32> {
    data.get("canvasHeight")
        .or_else(|| data.get("viewportHeight"))
        .or_else(|| data.get("height"))
        .and_then(Value::as_f64)
        .map(|v| v as f32)
}

/// A fully parsed, strongly typed client command, ready for the room's
/// owning task to match on.
#[derive(Debug, Clone)]
pub enum ClientCommand {
    CreateRoom {
        room_code: String,
        max_players: u8,
        host_id: String,
        player_name: Option<String>,
        world: u8,
        canvas_height: Option<f32>,
    },
    JoinRoom {
        room_code: String,
        player_id: String,
        name: Option<String>,
    },
    SetPlayerName {
        name: String,
    },
    SetWorld {
        world: u8,
    },
    SelectHero {
        hero: String,
    },
    SetReady {
        ready: bool,
    },
    StartGameNow,
    PlayerInput {
        input: InputFrame,
        canvas_height: Option<f32>,
    },
    Disconnect,
}

impl ClientCommand {
    /// Matches an [`Envelope`] into a [`ClientCommand`]. Returns `Err` with
    /// a human-readable reason for unknown events or missing required
    /// fields; callers treat this as a Validation error (spec.md §7) and
    /// never let it affect room state.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, String> {
        let d = &envelope.data;
        match envelope.event.as_str() {
            "createRoom" => {
                let room_code = d
                    .get("roomCode")
                    .and_then(Value::as_str)
                    .ok_or("createRoom requires roomCode")?
                    .to_uppercase();
                let max_players = d
                    .get("maxPlayers")
                    .and_then(Value::as_u64)
                    .unwrap_or(4)
                    .clamp(1, 4) as u8;
                let host_id = d
                    .get("hostId")
                    .and_then(Value::as_str)
                    .ok_or("createRoom requires hostId")?
                    .to_string();
                let player_name = d.get("playerName").and_then(Value::as_str).map(str::to_string);
                let world = d
                    .get("world")
                    .or_else(|| d.get("level"))
                    .map(normalize_world)
                    .unwrap_or(1);
                Ok(ClientCommand::CreateRoom {
                    room_code,
                    max_players,
                    host_id,
                    player_name,
                    world,
                    canvas_height: parse_canvas_height(d),
                })
            }
            "joinRoom" => Ok(ClientCommand::JoinRoom {
                room_code: d
                    .get("roomCode")
                    .and_then(Value::as_str)
                    .ok_or("joinRoom requires roomCode")?
                    .to_uppercase(),
                player_id: d
                    .get("playerId")
                    .and_then(Value::as_str)
                    .ok_or("joinRoom requires playerId")?
                    .to_string(),
                name: d.get("name").and_then(Value::as_str).map(str::to_string),
            }),
            "setPlayerName" => Ok(ClientCommand::SetPlayerName {
                name: d.get("name").and_then(Value::as_str).unwrap_or("").to_string(),
            }),
            "setWorld" => Ok(ClientCommand::SetWorld {
                world: normalize_world(d.get("world").unwrap_or(&Value::Null)),
            }),
            "setLevel" => Ok(ClientCommand::SetWorld {
                world: normalize_world(d.get("level").unwrap_or(&Value::Null)),
            }),
            "selectHero" => Ok(ClientCommand::SelectHero {
                hero: d
                    .get("hero")
                    .and_then(Value::as_str)
                    .ok_or("selectHero requires hero")?
                    .to_string(),
            }),
            "setReady" => Ok(ClientCommand::SetReady {
                ready: d.get("ready").and_then(Value::as_bool).unwrap_or(false),
            }),
            "startGameNow" => Ok(ClientCommand::StartGameNow),
            "playerInput" | "playerMove" => Ok(ClientCommand::PlayerInput {
                input: parse_input_frame(d),
                canvas_height: parse_canvas_height(d),
            }),
            "disconnect" => Ok(ClientCommand::Disconnect),
            other => Err(format!("unknown event \"{other}\"")),
        }
    }
}

/// The lobby-visible view of a room, broadcast as `roomState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatePayload {
    pub room_code: String,
    pub max_players: u8,
    pub host_id: String,
    pub started: bool,
    pub world: u8,
    pub players: HashMap<String, LobbyPlayer>,
}

/// Every server->client frame, tagged by `event` with its payload under
/// `data`, the mirror image of [`Envelope`] on the way out.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    JoinSuccess {
        room_code: String,
        player_id: String,
        player_index: u8,
        message: String,
    },
    CreateDenied {
        message: String,
    },
    JoinDenied {
        message: String,
    },
    HeroDenied {
        message: String,
    },
    ReadyDenied {
        message: String,
    },
    StartDenied {
        message: String,
    },
    StartGame,
    RoomState(RoomStatePayload),
    GameState(Snapshot),
}
