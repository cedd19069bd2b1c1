//! Room and presence layer (C3).
//!
//! Creates rooms, assigns opaque identifiers, admits players, tracks roster
//! and team assignments. `spec.md` §3–§4.3 unchanged.

mod ids;

pub use ids::{DeviceId, HostSessionToken, RoomId, ROOM_CODE_LENGTH};

use std::time::Duration;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::store::{MemoryStore, DEFAULT_TTL};

/// Maximum rejection-sampling attempts before giving up on a fresh room code.
/// At 32^4 ≈ 1.05M possible codes this is astronomically conservative.
const MAX_CODE_ATTEMPTS: usize = 64;

/// Room lifecycle status (spec.md §3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Ended,
}

/// Which game a room is currently running, if any (spec.md §3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameCode {
    Marble,
    Mafia,
    Liar,
    Quiz,
    Truth,
}

impl GameCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Marble => "marble",
            Self::Mafia => "mafia",
            Self::Liar => "liar",
            Self::Quiz => "quiz",
            Self::Truth => "truth",
        }
    }
}

/// A roster member (spec.md §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub device_id: DeviceId,
    pub nickname: String,
    pub team: Option<String>,
    pub role: Option<String>,
    pub alive: bool,
    pub profile: Option<serde_json::Value>,
}

impl Player {
    fn new(device_id: DeviceId, nickname: String) -> Self {
        Self {
            device_id,
            nickname,
            team: None,
            role: None,
            alive: true,
            profile: None,
        }
    }
}

/// Full room record (spec.md §3), the value behind `room:{id}:info`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub host_session_token: HostSessionToken,
    pub status: RoomStatus,
    pub current_game: Option<GameCode>,
    pub players: Vec<Player>,
}

/// Returned from `create_room`.
#[derive(Clone, Debug)]
pub struct CreatedRoom {
    pub room_id: RoomId,
    pub host_session_token: HostSessionToken,
}

fn info_key(room_id: &RoomId) -> String {
    format!("room:{room_id}:info")
}

/// Creates rooms, admits players, tracks roster and teams.
#[derive(Clone)]
pub struct RoomRegistry {
    store: MemoryStore,
}

impl RoomRegistry {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    /// Generate a fresh roomId and token; write the initial `RoomInfo`.
    pub async fn create_room(&self) -> CoreResult<CreatedRoom> {
        let room_id = self.fresh_room_id().await?;
        let host_session_token = HostSessionToken::generate();
        let info = RoomInfo {
            room_id: room_id.clone(),
            host_session_token: host_session_token.clone(),
            status: RoomStatus::Waiting,
            current_game: None,
            players: Vec::new(),
        };
        self.store
            .set(&info_key(&room_id), &info, DEFAULT_TTL)
            .await?;
        Ok(CreatedRoom {
            room_id,
            host_session_token,
        })
    }

    async fn fresh_room_id(&self) -> CoreResult<RoomId> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = RoomId::generate();
            if self
                .store
                .get::<RoomInfo>(&info_key(&candidate))
                .await?
                .is_none()
            {
                return Ok(candidate);
            }
        }
        Err(CoreError::Conflict(
            "exhausted room code attempts".to_string(),
        ))
    }

    pub async fn info(&self, room_id: &RoomId) -> CoreResult<Option<RoomInfo>> {
        self.store.get(&info_key(room_id)).await
    }

    async fn require_info(&self, room_id: &RoomId) -> CoreResult<RoomInfo> {
        self.info(room_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))
    }

    async fn save(&self, info: &RoomInfo) -> CoreResult<()> {
        self.store
            .set(&info_key(&info.room_id), info, DEFAULT_TTL)
            .await
    }

    /// Admit a player. Fails `notFound` if the room is absent, `conflict`
    /// if the nickname is taken, `invalidArgument` on a malformed nickname
    /// (1–8 chars, spec.md §6).
    pub async fn join(&self, room_id: &RoomId, nickname: &str) -> CoreResult<Player> {
        if nickname.is_empty() || nickname.chars().count() > 8 {
            return Err(CoreError::invalid_argument(
                "nickname must be 1-8 characters",
            ));
        }
        let mut info = self.require_info(room_id).await?;
        if info.players.iter().any(|p| p.nickname == nickname) {
            return Err(CoreError::conflict(format!("nickname {nickname} taken")));
        }
        let player = Player::new(DeviceId::generate(), nickname.to_string());
        info.players.push(player.clone());
        self.save(&info).await?;
        Ok(player)
    }

    /// Move a room from `waiting` to `playing` under the chosen game.
    pub async fn start_game(&self, room_id: &RoomId, game: GameCode) -> CoreResult<RoomInfo> {
        let mut info = self.require_info(room_id).await?;
        info.status = RoomStatus::Playing;
        info.current_game = Some(game);
        self.save(&info).await?;
        Ok(info)
    }

    /// Mark a room ended and clear its current game.
    pub async fn end_game(&self, room_id: &RoomId) -> CoreResult<RoomInfo> {
        let mut info = self.require_info(room_id).await?;
        info.status = RoomStatus::Ended;
        info.current_game = None;
        self.save(&info).await?;
        Ok(info)
    }

    pub async fn player(&self, room_id: &RoomId, device_id: &DeviceId) -> CoreResult<Player> {
        let info = self.require_info(room_id).await?;
        info.players
            .into_iter()
            .find(|p| &p.device_id == device_id)
            .ok_or_else(|| CoreError::not_found(format!("device {device_id}")))
    }

    pub async fn set_alive(
        &self,
        room_id: &RoomId,
        device_id: &DeviceId,
        alive: bool,
    ) -> CoreResult<()> {
        let mut info = self.require_info(room_id).await?;
        let player = info
            .players
            .iter_mut()
            .find(|p| &p.device_id == device_id)
            .ok_or_else(|| CoreError::not_found(format!("device {device_id}")))?;
        player.alive = alive;
        self.save(&info).await
    }

    pub async fn set_role(
        &self,
        room_id: &RoomId,
        device_id: &DeviceId,
        role: Option<String>,
    ) -> CoreResult<()> {
        let mut info = self.require_info(room_id).await?;
        let player = info
            .players
            .iter_mut()
            .find(|p| &p.device_id == device_id)
            .ok_or_else(|| CoreError::not_found(format!("device {device_id}")))?;
        player.role = role;
        self.save(&info).await
    }

    /// Shuffle the roster and assign team tags round-robin so bucket sizes
    /// differ by at most one (spec.md §4.3).
    pub async fn assign_random_teams(&self, room_id: &RoomId, k: usize) -> CoreResult<RoomInfo> {
        if k == 0 {
            return Err(CoreError::invalid_argument("team count must be >= 1"));
        }
        let mut info = self.require_info(room_id).await?;
        let mut order: Vec<usize> = (0..info.players.len()).collect();
        order.shuffle(&mut rand::rng());
        for (slot, player_idx) in order.into_iter().enumerate() {
            let tag = format!("team-{}", slot % k);
            info.players[player_idx].team = Some(tag);
        }
        self.save(&info).await?;
        Ok(info)
    }

    /// Player-side opt-in team selection; rejects once a bucket reaches its
    /// ceiling `ceil(n/k)` (spec.md §4.3).
    pub async fn select_team(
        &self,
        room_id: &RoomId,
        device_id: &DeviceId,
        tag: &str,
        k: usize,
    ) -> CoreResult<RoomInfo> {
        if k == 0 {
            return Err(CoreError::invalid_argument("team count must be >= 1"));
        }
        let mut info = self.require_info(room_id).await?;
        let total = info.players.len();
        let ceiling = total.div_ceil(k);
        let bucket_size = info
            .players
            .iter()
            .filter(|p| p.team.as_deref() == Some(tag))
            .count();
        let player = info
            .players
            .iter_mut()
            .find(|p| &p.device_id == device_id)
            .ok_or_else(|| CoreError::not_found(format!("device {device_id}")))?;
        if player.team.as_deref() == Some(tag) {
            return Ok(info);
        }
        if bucket_size >= ceiling {
            return Err(CoreError::conflict(format!("team {tag} is full")));
        }
        player.team = Some(tag.to_string());
        self.save(&info).await?;
        Ok(info)
    }

    /// Clear every team tag.
    pub async fn reset_teams(&self, room_id: &RoomId) -> CoreResult<RoomInfo> {
        let mut info = self.require_info(room_id).await?;
        for player in &mut info.players {
            player.team = None;
        }
        self.save(&info).await?;
        Ok(info)
    }

    pub async fn refresh_ttl(&self, room_id: &RoomId) {
        self.store.expire(&info_key(room_id), DEFAULT_TTL).await;
    }
}
