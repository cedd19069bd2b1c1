//! Team assignment routes (spec.md §4.3, §6).
//!
//! As in `rooms.rs`, `RoomRegistry`'s team methods only touch the store —
//! the broadcast is this layer's job.

use axum::extract::{Path, State};
use axum::Json;
use partyhub_core::bus::Event;
use partyhub_core::RoomId;
use serde::{Deserialize, Serialize};

use super::{ApiResponse, ApiResult, AppState};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRandomRequest {
    room_id: String,
    team_count: usize,
}

pub async fn assign_random(State(state): State<AppState>, Json(req): Json<AssignRandomRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let info = state.ctx.registry.assign_random_teams(&room_id, req.team_count).await?;
    let roster: Vec<_> = info
        .players
        .iter()
        .map(|p| serde_json::json!({ "deviceId": p.device_id, "team": p.team }))
        .collect();
    state
        .ctx
        .bus
        .broadcast_all(&room_id, Event::new("TEAM_ASSIGNED", serde_json::json!({ "players": roster })))
        .await;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectTeamRequest {
    room_id: String,
    device_id: String,
    tag: String,
    team_count: usize,
}

pub async fn select_team(State(state): State<AppState>, Json(req): Json<SelectTeamRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    state.ctx.registry.select_team(&room_id, &device_id, &req.tag, req.team_count).await?;
    state
        .ctx
        .bus
        .broadcast_all(
            &room_id,
            Event::new("PLAYER_TEAM_SELECTED", serde_json::json!({ "deviceId": req.device_id, "tag": req.tag })),
        )
        .await;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetTeamsRequest {
    room_id: String,
}

pub async fn reset_teams(State(state): State<AppState>, Json(req): Json<ResetTeamsRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    state.ctx.registry.reset_teams(&room_id).await?;
    state.ctx.bus.broadcast_all(&room_id, Event::new("TEAM_MANUAL_START", ())).await;
    Ok(ApiResponse::ok(()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStatusEntry {
    device_id: String,
    nickname: String,
    team: Option<String>,
}

pub async fn team_status(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> ApiResult<Vec<TeamStatusEntry>> {
    let room_id: RoomId = room_id.as_str().into();
    let info = state
        .ctx
        .registry
        .info(&room_id)
        .await?
        .ok_or_else(|| partyhub_core::CoreError::not_found(format!("room {room_id}")))?;
    let entries = info
        .players
        .into_iter()
        .map(|p| TeamStatusEntry { device_id: p.device_id.to_string(), nickname: p.nickname, team: p.team })
        .collect();
    Ok(ApiResponse::ok(entries))
}
