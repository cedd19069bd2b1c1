//! Host and player event streams (spec.md §6).
//!
//! Wraps the bus's `mpsc::Receiver<Event>` in a `ReceiverStream` and maps
//! each frame into an `axum::response::sse::Event`, the same
//! receiver-to-SSE shape used throughout the retrieval pack wherever a
//! broadcast channel is exposed over HTTP.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures_util::stream::Stream;
use partyhub_core::RoomId;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use super::{ApiError, AppState};

fn to_sse(event: partyhub_core::bus::Event) -> Result<SseEvent, Infallible> {
    Ok(SseEvent::default().event(event.name).data(event.data.to_string()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConnectQuery {
    room_id: String,
    session_id: String,
}

pub async fn connect_host(
    State(state): State<AppState>,
    Query(query): Query<HostConnectQuery>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let room_id: RoomId = query.room_id.as_str().into();
    let rx = state.ctx.bus.open_host(&state.ctx.registry, &room_id, &query.session_id).await?;
    let stream = ReceiverStream::new(rx).map(to_sse);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConnectQuery {
    room_id: String,
    device_id: String,
}

pub async fn connect_player(
    State(state): State<AppState>,
    Query(query): Query<PlayerConnectQuery>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let room_id: RoomId = query.room_id.as_str().into();
    let device_id = query.device_id.as_str().into();
    let rx = state.ctx.bus.open_player(&state.ctx.registry, &room_id, &device_id).await?;
    let stream = ReceiverStream::new(rx).map(to_sse);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
