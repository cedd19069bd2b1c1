//! Event bus (C2).
//!
//! Holds the open one-way event streams for a room's host and its players,
//! and the per-room broadcast primitives. Streams are backed by `mpsc`
//! channels; the SSE endpoint in `partyhub_server` wraps the receiving half
//! in a `ReceiverStream` and serializes each `Event` to a `text/event-stream`
//! frame (the pattern is grounded on the `axum::response::sse` demo stream
//! found in the retrieval pack).
//!
//! Concurrent access: the per-room maps are guarded by a single `RwLock`
//! per room kind (host / players), matching the `RwLock<HashMap<...>>`
//! the teacher uses for its table registry — there is no finer-grained
//! locking because opening/broadcasting on a stream map is cheap and rare
//! compared to game-state mutation.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};

use crate::error::{CoreError, CoreResult};
use crate::room::{DeviceId, RoomId, RoomRegistry};

/// Idle timeout after which a stream is considered gone (spec.md §4.2).
pub const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Bounded channel capacity for a single stream. Generous enough that a
/// burst of ticks/broadcasts never blocks a handler; a full channel means
/// the client has stopped reading and the stream will be reaped instead.
const CHANNEL_CAPACITY: usize = 256;

/// One `{name, data}` frame, the exact shape spec.md §6 requires on the wire.
#[derive(Clone, Debug, Serialize)]
pub struct Event {
    pub name: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(name: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            name: name.into(),
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }

    /// The special `CONNECT` event sent on stream open (spec.md §6).
    pub fn connect() -> Self {
        Self::new("CONNECT", "connected")
    }
}

struct Stream {
    sender: mpsc::Sender<Event>,
    last_send: Instant,
}

impl Stream {
    fn is_idle(&self, now: Instant) -> bool {
        now.duration_since(self.last_send) >= STREAM_IDLE_TIMEOUT
    }
}

/// A subscription handle returned to the SSE endpoint: the receiving half
/// of the channel the bus will write to.
pub type EventReceiver = mpsc::Receiver<Event>;

#[derive(Default)]
struct RoomStreams {
    host: Option<Stream>,
    players: HashMap<DeviceId, Stream>,
}

/// Per-room host and player event streams, plus broadcast.
#[derive(Clone)]
pub struct EventBus {
    rooms: Arc<RwLock<HashMap<RoomId, RoomStreams>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn spawn_reaper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let bus = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                bus.reap_idle().await;
            }
        })
    }

    async fn reap_idle(&self) {
        let now = Instant::now();
        let mut guard = self.rooms.write().await;
        for streams in guard.values_mut() {
            if streams.host.as_ref().is_some_and(|s| s.is_idle(now)) {
                streams.host = None;
            }
            streams.players.retain(|_, s| !s.is_idle(now));
        }
        guard.retain(|_, streams| streams.host.is_some() || !streams.players.is_empty());
    }

    /// Open the host stream for `roomId`, authenticated by `sessionToken`.
    pub async fn open_host(
        &self,
        registry: &RoomRegistry,
        room_id: &RoomId,
        session_token: &str,
    ) -> CoreResult<EventReceiver> {
        let info = registry
            .info(room_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))?;
        if info.host_session_token != session_token {
            return Err(CoreError::unauthorized("host token mismatch"));
        }
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let _ = tx.send(Event::connect()).await;
        let mut guard = self.rooms.write().await;
        let streams = guard.entry(room_id.clone()).or_default();
        streams.host = Some(Stream {
            sender: tx,
            last_send: Instant::now(),
        });
        Ok(rx)
    }

    /// Open a player stream for `deviceId`, who must already be on the roster.
    pub async fn open_player(
        &self,
        registry: &RoomRegistry,
        room_id: &RoomId,
        device_id: &DeviceId,
    ) -> CoreResult<EventReceiver> {
        let info = registry
            .info(room_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))?;
        if !info.players.iter().any(|p| &p.device_id == device_id) {
            return Err(CoreError::not_found(format!("device {device_id}")));
        }
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let _ = tx.send(Event::connect()).await;
        let mut guard = self.rooms.write().await;
        let streams = guard.entry(room_id.clone()).or_default();
        streams.players.insert(
            device_id.clone(),
            Stream {
                sender: tx,
                last_send: Instant::now(),
            },
        );
        Ok(rx)
    }

    /// Deliver to the host stream if present; silently drops on failure.
    pub async fn broadcast_host(&self, room_id: &RoomId, event: Event) {
        let mut guard = self.rooms.write().await;
        if let Some(streams) = guard.get_mut(room_id) {
            if let Some(stream) = &mut streams.host {
                if stream.sender.try_send(event).is_err() {
                    streams.host = None;
                } else {
                    stream.last_send = Instant::now();
                }
            }
        }
    }

    /// Deliver to every live player stream of the room; drops failing ones.
    pub async fn broadcast_players(&self, room_id: &RoomId, event: Event) {
        let mut guard = self.rooms.write().await;
        if let Some(streams) = guard.get_mut(room_id) {
            streams.players.retain(|_, stream| {
                if stream.sender.try_send(event.clone()).is_err() {
                    false
                } else {
                    stream.last_send = Instant::now();
                    true
                }
            });
        }
    }

    /// Deliver to a single player stream, if present.
    pub async fn send_to_player(&self, room_id: &RoomId, device_id: &DeviceId, event: Event) {
        let mut guard = self.rooms.write().await;
        if let Some(streams) = guard.get_mut(room_id) {
            if let Some(stream) = streams.players.get_mut(device_id) {
                if stream.sender.try_send(event).is_err() {
                    streams.players.remove(device_id);
                } else if let Some(stream) = streams.players.get_mut(device_id) {
                    stream.last_send = Instant::now();
                }
            }
        }
    }

    /// Union of `broadcast_host` and `broadcast_players`.
    pub async fn broadcast_all(&self, room_id: &RoomId, event: Event) {
        self.broadcast_host(room_id, event.clone()).await;
        self.broadcast_players(room_id, event).await;
    }

    /// Release every stream for a room (called on game end / room teardown).
    pub async fn close_room(&self, room_id: &RoomId) {
        let mut guard = self.rooms.write().await;
        guard.remove(room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::RoomRegistry;
    use crate::store::MemoryStore;

    async fn registry() -> RoomRegistry {
        RoomRegistry::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn open_host_rejects_bad_token() {
        let registry = registry().await;
        let bus = EventBus::new();
        let created = registry.create_room().await.unwrap();
        let err = bus
            .open_host(&registry, &created.room_id, "wrong-token")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unauthorized");
    }

    #[tokio::test]
    async fn open_host_then_broadcast_delivers() {
        let registry = registry().await;
        let bus = EventBus::new();
        let created = registry.create_room().await.unwrap();
        let mut rx = bus
            .open_host(&registry, &created.room_id, &created.host_session_token)
            .await
            .unwrap();
        // CONNECT event arrives first.
        let connect = rx.recv().await.unwrap();
        assert_eq!(connect.name, "CONNECT");

        bus.broadcast_host(&created.room_id, Event::new("PING", 1))
            .await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, "PING");
    }

    #[tokio::test]
    async fn open_player_rejects_unknown_device() {
        let registry = registry().await;
        let bus = EventBus::new();
        let created = registry.create_room().await.unwrap();
        let err = bus
            .open_player(&registry, &created.room_id, &"ghost".into())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn broadcast_players_drops_full_channel() {
        let registry = registry().await;
        let bus = EventBus::new();
        let created = registry.create_room().await.unwrap();
        let player = registry.join(&created.room_id, "alice").await.unwrap();
        let mut rx = bus
            .open_player(&registry, &created.room_id, &player.device_id)
            .await
            .unwrap();
        let _ = rx.recv().await; // drain CONNECT

        drop(rx); // receiver gone, sender will fail fast
        bus.broadcast_players(&created.room_id, Event::new("X", 1))
            .await;

        let guard = bus.rooms.read().await;
        let streams = guard.get(&created.room_id).unwrap();
        assert!(streams.players.is_empty());
    }
}
