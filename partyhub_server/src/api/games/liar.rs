//! Liar action routes (spec.md §4.5.3).

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use partyhub_core::game::liar::{self, RoleView};
use partyhub_core::RoomId;
use serde::Deserialize;

use crate::api::{ApiResponse, ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/init", post(init))
        .route("/role", post(role))
        .route("/vote-more-round", post(vote_more_round))
        .route("/start-pointing-vote", post(start_pointing_vote))
        .route("/pointing-vote", post(vote_pointing))
        .route("/guess", post(submit_guess))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    room_id: String,
    category_id: String,
}

async fn init(State(state): State<AppState>, Json(req): Json<InitRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    liar::initialize(&state.ctx, &room_id, &req.category_id).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    room_id: String,
    device_id: String,
}

async fn role(State(state): State<AppState>, Json(req): Json<DeviceRequest>) -> ApiResult<RoleView> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    let view = liar::player_role(&state.ctx, &room_id, &device_id).await?;
    Ok(ApiResponse::ok(view))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteMoreRoundRequest {
    room_id: String,
    device_id: String,
    want_more: bool,
}

async fn vote_more_round(State(state): State<AppState>, Json(req): Json<VoteMoreRoundRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    liar::vote_more_round(&state.ctx, &room_id, &device_id, req.want_more).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOnly {
    room_id: String,
}

async fn start_pointing_vote(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    liar::start_pointing_vote(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointingVoteRequest {
    room_id: String,
    device_id: String,
    target: String,
}

async fn vote_pointing(State(state): State<AppState>, Json(req): Json<PointingVoteRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let voter = req.device_id.as_str().into();
    let target = req.target.as_str().into();
    liar::vote_pointing(&state.ctx, &room_id, &voter, &target).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessRequest {
    room_id: String,
    device_id: String,
    guess: Option<String>,
}

async fn submit_guess(State(state): State<AppState>, Json(req): Json<GuessRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    liar::submit_guess(&state.ctx, &room_id, &device_id, req.guess).await?;
    Ok(ApiResponse::ok(()))
}
