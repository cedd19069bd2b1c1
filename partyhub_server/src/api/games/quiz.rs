//! Quiz action routes (spec.md §4.5.4).

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use partyhub_core::game::quiz;
use partyhub_core::RoomId;
use serde::Deserialize;

use crate::api::{ApiResponse, ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/init", post(init))
        .route("/start-round", post(start_round))
        .route("/correct", post(correct))
        .route("/pass", post(pass))
        .route("/next-team", post(next_team))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    room_id: String,
    category_id: String,
    round_time_seconds: Option<u32>,
}

async fn init(State(state): State<AppState>, Json(req): Json<InitRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    quiz::initialize(&state.ctx, &room_id, &req.category_id, req.round_time_seconds).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOnly {
    room_id: String,
}

async fn start_round(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    quiz::start_round(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}

async fn correct(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    quiz::correct(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}

async fn pass(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    quiz::pass(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}

async fn next_team(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    quiz::next_team(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}
