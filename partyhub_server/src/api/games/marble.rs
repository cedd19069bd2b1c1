//! Marble action routes (spec.md §4.5.1).

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use partyhub_core::game::marble::{self, Mode};
use partyhub_core::RoomId;
use serde::Deserialize;

use crate::api::{ApiResponse, ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/init", post(init))
        .route("/penalty", post(submit_penalty))
        .route("/vote", post(toggle_vote))
        .route("/close-voting", post(close_voting))
        .route("/mode", post(select_mode))
        .route("/board", post(generate_board))
        .route("/roll", post(roll))
        .route("/end", post(end))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOnly {
    room_id: String,
}

async fn init(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    marble::initialize(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyRequest {
    room_id: String,
    device_id: String,
    text: String,
}

async fn submit_penalty(State(state): State<AppState>, Json(req): Json<PenaltyRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    marble::submit_penalty(&state.ctx, &room_id, &device_id, req.text).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    room_id: String,
    device_id: String,
    penalty_id: String,
}

async fn toggle_vote(State(state): State<AppState>, Json(req): Json<VoteRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    marble::toggle_vote(&state.ctx, &room_id, &device_id, &req.penalty_id).await?;
    Ok(ApiResponse::ok(()))
}

async fn close_voting(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    marble::close_voting(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectModeRequest {
    room_id: String,
    mode: Mode,
}

async fn select_mode(State(state): State<AppState>, Json(req): Json<SelectModeRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    marble::select_mode(&state.ctx, &room_id, req.mode).await?;
    Ok(ApiResponse::ok(()))
}

async fn generate_board(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    marble::generate_board(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollRequest {
    room_id: String,
    roller_key: String,
}

async fn roll(State(state): State<AppState>, Json(req): Json<RollRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    marble::roll(&state.ctx, &room_id, &req.roller_key).await?;
    Ok(ApiResponse::ok(()))
}

async fn end(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    marble::end_game(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}
