//! The HTTP/WebSocket surface (spec.md §6): the plain HTTP health routes
//! and the `/ws` upgrade that drives one connection's lifecycle.
//!
//! A connection starts unbound. `createRoom`/`joinRoom` binds it to a
//! `{roomCode, playerId}` pair and subscribes it to that room's
//! broadcast channel; every later frame is forwarded straight to the
//! room's owning task.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};

use crate::config::{Config, Mode};
use crate::error::ServerError;
use crate::registry::Registry;
use crate::scheduler::{encode, parse_command, RoomMessage};
use shared::ClientCommand;
use shared::ServerEvent;

pub struct AppState {
    pub registry: Arc<Registry>,
    pub started_at: Instant,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(state.registry.config().clone());
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
        .layer(cors)
}

async fn root() -> impl IntoResponse {
    axum::Json(json!({ "message": "Game Server Running" }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cfg = state.registry.config();
    axum::Json(json!({
        "status": "ok",
        "env": match cfg.mode { Mode::Development => "development", Mode::Production => "production" },
        "uptime": state.started_at.elapsed().as_secs(),
        "timestamp": crate::now_ms(),
        "rooms": state.registry.room_count().await,
        "players": state.registry.player_count().await,
        "tickRate": cfg.tick_rate,
        "allowedOrigins": cfg.allowed_origins,
    }))
}

/// CORS policy (spec.md §6): allow requests carrying no `Origin` header,
/// allow everything in development, otherwise allow exact matches in the
/// configured allow-list plus any `*.vercel.app` origin.
fn build_cors_layer(cfg: Config) -> tower_http::cors::CorsLayer {
    use tower_http::cors::{AllowOrigin, CorsLayer};

    let is_development = cfg.mode == Mode::Development;
    let allowed: Vec<String> = cfg.allowed_origins.clone();

    CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            if is_development {
                return true;
            }
            let Ok(origin) = origin.to_str() else { return false };
            if allowed.iter().any(|a| a == origin) {
                return true;
            }
            origin
                .strip_prefix("https://")
                .map(|rest| rest.ends_with(".vercel.app"))
                .unwrap_or(false)
        }))
}

async fn ws_upgrade(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

struct ConnState {
    player_id: Option<String>,
    room_code: Option<String>,
    broadcast_rx: Option<broadcast::Receiver<String>>,
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<String>();
    let mut conn = ConnState { player_id: None, room_code: None, broadcast_rx: None };

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_incoming_frame(&state, &text, &mut conn, &reply_tx).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!("websocket error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
            Some(direct) = reply_rx.recv() => {
                if sink.send(Message::Text(direct)).await.is_err() {
                    break;
                }
            }
            Ok(frame) = async { conn.broadcast_rx.as_mut().unwrap().recv().await }, if conn.broadcast_rx.is_some() => {
                if sink.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
        }
    }

    if let (Some(player_id), Some(room_code)) = (conn.player_id, conn.room_code) {
        state.registry.schedule_disconnect(&player_id, &room_code).await;
    }
}

fn send_event(reply_tx: &mpsc::UnboundedSender<String>, event: ServerEvent) {
    let _ = reply_tx.send(encode(&event));
}

async fn handle_incoming_frame(state: &Arc<AppState>, text: &str, conn: &mut ConnState, reply_tx: &mpsc::UnboundedSender<String>) {
    let command = match parse_command(text) {
        Ok(command) => command,
        Err(reason) => {
            debug!("dropping malformed frame: {reason}");
            return;
        }
    };

    match command {
        ClientCommand::CreateRoom { room_code, max_players, host_id, player_name, world, canvas_height } => {
            match state.registry.create_room(room_code.clone(), max_players, host_id.clone(), player_name, world, canvas_height).await {
                Ok((handle, room_state)) => {
                    conn.player_id = Some(host_id.clone());
                    conn.room_code = Some(room_code.clone());
                    conn.broadcast_rx = Some(handle.broadcast_tx.subscribe());
                    send_event(
                        reply_tx,
                        ServerEvent::JoinSuccess {
                            room_code: room_code.clone(),
                            player_id: host_id,
                            player_index: 1,
                            message: "room created".to_string(),
                        },
                    );
                    let _ = handle.broadcast_tx.send(encode(&ServerEvent::RoomState(room_state)));
                }
                Err(ServerError::Validation(message)) => send_event(reply_tx, ServerEvent::CreateDenied { message }),
                Err(_) => {}
            }
        }
        ClientCommand::JoinRoom { room_code, player_id, name } => match state.registry.get_room(&room_code).await {
            Some(handle) => {
                conn.player_id = Some(player_id.clone());
                conn.room_code = Some(room_code.clone());
                conn.broadcast_rx = Some(handle.broadcast_tx.subscribe());
                state.registry.bind_player(&player_id, &room_code).await;
                let _ = handle.command_tx.send(RoomMessage::Command {
                    player_id: player_id.clone(),
                    command: ClientCommand::JoinRoom { room_code, player_id, name },
                    reply_tx: reply_tx.clone(),
                });
            }
            None => send_event(reply_tx, ServerEvent::JoinDenied { message: "Room not found".to_string() }),
        },
        ClientCommand::Disconnect => {
            if let (Some(player_id), Some(room_code)) = (conn.player_id.clone(), conn.room_code.clone()) {
                state.registry.schedule_disconnect(&player_id, &room_code).await;
            }
        }
        other => forward_bound_command(state, conn, other, reply_tx).await,
    }
}

async fn forward_bound_command(state: &Arc<AppState>, conn: &ConnState, command: ClientCommand, reply_tx: &mpsc::UnboundedSender<String>) {
    let (Some(player_id), Some(room_code)) = (conn.player_id.clone(), conn.room_code.clone()) else {
        return; // precondition miss: command without a bound room/player (spec.md §7)
    };
    let Some(handle) = state.registry.get_room(&room_code).await else {
        return; // precondition miss: room gone
    };
    let _ = handle.command_tx.send(RoomMessage::Command { player_id, command, reply_tx: reply_tx.clone() });
}
