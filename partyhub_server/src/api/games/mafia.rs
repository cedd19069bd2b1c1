//! Mafia action routes (spec.md §4.5.2).

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use partyhub_core::game::mafia::{self, ChatMessage, Role};
use partyhub_core::RoomId;
use serde::Deserialize;

use crate::api::{ApiResponse, ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/init", post(init))
        .route("/role", post(role))
        .route("/kill", post(kill))
        .route("/save", post(save))
        .route("/investigate", post(investigate))
        .route("/chat", post(chat))
        .route("/chat/read", post(read_chat))
        .route("/vote", post(vote))
        .route("/final-vote", post(final_vote))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOnly {
    room_id: String,
}

async fn init(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    mafia::initialize(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    room_id: String,
    device_id: String,
}

async fn role(State(state): State<AppState>, Json(req): Json<DeviceRequest>) -> ApiResult<Role> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    let role = mafia::player_role(&state.ctx, &room_id, &device_id).await?;
    Ok(ApiResponse::ok(role))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRequest {
    room_id: String,
    device_id: String,
    target: String,
}

async fn kill(State(state): State<AppState>, Json(req): Json<TargetRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    let target = req.target.as_str().into();
    mafia::mafia_kill(&state.ctx, &room_id, &device_id, &target).await?;
    Ok(ApiResponse::ok(()))
}

async fn save(State(state): State<AppState>, Json(req): Json<TargetRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    let target = req.target.as_str().into();
    mafia::doctor_save(&state.ctx, &room_id, &device_id, &target).await?;
    Ok(ApiResponse::ok(()))
}

async fn investigate(State(state): State<AppState>, Json(req): Json<TargetRequest>) -> ApiResult<bool> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    let target = req.target.as_str().into();
    let is_mafia = mafia::police_investigate(&state.ctx, &room_id, &device_id, &target).await?;
    Ok(ApiResponse::ok(is_mafia))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    room_id: String,
    device_id: String,
    text: String,
}

async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    mafia::mafia_chat(&state.ctx, &room_id, &device_id, req.text).await?;
    Ok(ApiResponse::ok(()))
}

async fn read_chat(State(state): State<AppState>, Json(req): Json<DeviceRequest>) -> ApiResult<Vec<ChatMessage>> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    let messages = mafia::read_mafia_chat(&state.ctx, &room_id, &device_id).await?;
    Ok(ApiResponse::ok(messages))
}

async fn vote(State(state): State<AppState>, Json(req): Json<TargetRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let voter = req.device_id.as_str().into();
    let target = req.target.as_str().into();
    mafia::vote(&state.ctx, &room_id, &voter, &target).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalVoteRequest {
    room_id: String,
    device_id: String,
    kill: bool,
}

async fn final_vote(State(state): State<AppState>, Json(req): Json<FinalVoteRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let voter = req.device_id.as_str().into();
    mafia::final_vote(&state.ctx, &room_id, &voter, req.kill).await?;
    Ok(ApiResponse::ok(()))
}
