//! Room lifecycle, game start, and reaction relay (spec.md §6).
//!
//! `RoomRegistry` only mutates `MemoryStore` — it never touches the event
//! bus — so every handler here that changes roster or room state is
//! responsible for the matching broadcast itself.

use axum::extract::{Path, State};
use axum::Json;
use partyhub_core::room::GameCode;
use partyhub_core::{CoreError, RoomId};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResponse, ApiResult, AppState};
use partyhub_core::bus::Event;

fn parse_game_code(raw: &str) -> Result<GameCode, ApiError> {
    match raw {
        "marble" => Ok(GameCode::Marble),
        "mafia" => Ok(GameCode::Mafia),
        "liar" => Ok(GameCode::Liar),
        "quiz" => Ok(GameCode::Quiz),
        "truth" => Ok(GameCode::Truth),
        other => Err(ApiError(CoreError::invalid_argument(format!("unknown game code {other}")))),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    room_id: String,
    host_session_token: String,
}

pub async fn create_room(State(state): State<AppState>) -> ApiResult<CreateRoomResponse> {
    let created = state.ctx.registry.create_room().await?;
    Ok(ApiResponse::ok(CreateRoomResponse {
        room_id: created.room_id.to_string(),
        host_session_token: created.host_session_token.to_string(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    room_id: String,
    nickname: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomResponse {
    device_id: String,
    nickname: String,
}

pub async fn join_room(State(state): State<AppState>, Json(req): Json<JoinRoomRequest>) -> ApiResult<JoinRoomResponse> {
    let room_id: RoomId = req.room_id.as_str().into();
    let player = state.ctx.registry.join(&room_id, &req.nickname).await?;
    state
        .ctx
        .bus
        .broadcast_host(
            &room_id,
            Event::new(
                "PLAYER_JOINED",
                serde_json::json!({ "deviceId": player.device_id, "nickname": player.nickname }),
            ),
        )
        .await;
    Ok(ApiResponse::ok(JoinRoomResponse {
        device_id: player.device_id.to_string(),
        nickname: player.nickname,
    }))
}

pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> ApiResult<partyhub_core::room::RoomInfo> {
    let room_id: RoomId = room_id.as_str().into();
    let info = state
        .ctx
        .registry
        .info(&room_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))?;
    Ok(ApiResponse::ok(info))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameRequest {
    room_id: String,
    game_code: String,
}

pub async fn start_game(State(state): State<AppState>, Json(req): Json<StartGameRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let game = parse_game_code(&req.game_code)?;
    let info = state.ctx.registry.start_game(&room_id, game).await?;
    state
        .ctx
        .bus
        .broadcast_all(&room_id, Event::new("GAME_STARTED", serde_json::json!({ "gameCode": info.current_game })))
        .await;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    room_id: String,
    device_id: String,
    #[serde(rename = "type")]
    kind: String,
}

const REACTION_KINDS: &[&str] = &["firework", "boo", "laugh", "angry"];

pub async fn reaction(State(state): State<AppState>, Json(req): Json<ReactionRequest>) -> ApiResult<()> {
    if !REACTION_KINDS.contains(&req.kind.as_str()) {
        return Err(CoreError::invalid_argument(format!("unknown reaction type {}", req.kind)).into());
    }
    let room_id: RoomId = req.room_id.as_str().into();
    state
        .ctx
        .bus
        .broadcast_host(
            &room_id,
            Event::new("REACTION", serde_json::json!({ "deviceId": req.device_id, "type": req.kind })),
        )
        .await;
    Ok(ApiResponse::ok(()))
}
