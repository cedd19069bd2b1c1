//! Mafia: social deduction with server-enforced deadlines and strict
//! information partitioning (spec.md §4.5.2).

use std::collections::HashMap;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::bus::Event;
use crate::error::{CoreError, CoreResult};
use crate::room::{DeviceId, GameCode, RoomId};
use crate::store::DEFAULT_TTL;

use super::{arm_phase_timer, GameContext};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Mafia,
    Doctor,
    Police,
    Civilian,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::Mafia => "mafia",
            Role::Doctor => "doctor",
            Role::Police => "police",
            Role::Civilian => "civilian",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Night,
    DayAnnouncement,
    DayDiscussion,
    Vote,
    VoteResult,
    FinalDefense,
    FinalVote,
    FinalVoteResult,
    GameEnd,
}

impl Phase {
    fn duration_sec(self) -> i64 {
        match self {
            Phase::Night => 30,
            Phase::DayAnnouncement => 10,
            Phase::DayDiscussion => 240,
            Phase::Vote => 60,
            Phase::VoteResult => 5,
            Phase::FinalDefense => 30,
            Phase::FinalVote => 30,
            Phase::FinalVoteResult => 5,
            Phase::GameEnd => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Citizen,
    Mafia,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MafiaState {
    pub phase: Phase,
    pub day_count: u32,
    pub roles: HashMap<DeviceId, Role>,
    pub mafia_target: Option<DeviceId>,
    pub doctor_target: Option<DeviceId>,
    pub police_target: Option<DeviceId>,
    pub votes: HashMap<DeviceId, DeviceId>,
    pub final_votes: HashMap<DeviceId, bool>,
    pub execution_target: Option<DeviceId>,
    pub last_night_killed: Option<DeviceId>,
    pub was_saved: bool,
    pub dead_players: Vec<DeviceId>,
    pub winner: Option<Winner>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub device_id: DeviceId,
    pub text: String,
}

fn state_key(room_id: &RoomId) -> String {
    format!("room:{room_id}:mafia:state")
}

fn chat_key(room_id: &RoomId) -> String {
    format!("room:{room_id}:mafia:chat")
}

async fn load(ctx: &GameContext, room_id: &RoomId) -> CoreResult<MafiaState> {
    ctx.store
        .get(&state_key(room_id))
        .await?
        .ok_or_else(|| CoreError::not_found(format!("mafia state for room {room_id}")))
}

async fn save(ctx: &GameContext, room_id: &RoomId, state: &MafiaState) -> CoreResult<()> {
    ctx.store.set(&state_key(room_id), state, DEFAULT_TTL).await
}

fn role_count(n: usize) -> (usize, bool, bool) {
    let mafia = if n <= 5 { 1 } else if n <= 8 { 2 } else { 3 };
    (mafia, n >= 6, n >= 7)
}

/// Shuffle the roster and assign Mafia/Doctor/Police/Civilian, arm the
/// first night timer.
pub async fn initialize(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let info = ctx
        .registry
        .info(room_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))?;
    if info.players.len() < 4 {
        return Err(CoreError::invalid_state("mafia requires at least 4 players"));
    }
    let (mafia_count, has_doctor, has_police) = role_count(info.players.len());

    let mut order: Vec<DeviceId> = info.players.iter().map(|p| p.device_id.clone()).collect();
    order.shuffle(&mut rand::rng());

    let mut roles = HashMap::new();
    let mut cursor = 0usize;
    for _ in 0..mafia_count {
        roles.insert(order[cursor].clone(), Role::Mafia);
        cursor += 1;
    }
    if has_doctor {
        roles.insert(order[cursor].clone(), Role::Doctor);
        cursor += 1;
    }
    if has_police {
        roles.insert(order[cursor].clone(), Role::Police);
        cursor += 1;
    }
    for device_id in &order[cursor..] {
        roles.insert(device_id.clone(), Role::Civilian);
    }

    for (device_id, role) in &roles {
        ctx.registry
            .set_role(room_id, device_id, Some(role.as_str().to_string()))
            .await?;
    }

    let state = MafiaState {
        phase: Phase::Night,
        day_count: 1,
        roles,
        mafia_target: None,
        doctor_target: None,
        police_target: None,
        votes: HashMap::new(),
        final_votes: HashMap::new(),
        execution_target: None,
        last_night_killed: None,
        was_saved: false,
        dead_players: Vec::new(),
        winner: None,
    };
    save(ctx, room_id, &state).await?;
    ctx.bus
        .broadcast_host(room_id, Event::new("MAFIA_GAME_START", serde_json::json!({ "dayCount": 1 })))
        .await;
    arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Mafia, Phase::Night.duration_sec(), "MAFIA_TIMER");
    Ok(())
}

/// The device's own private role, for the per-device role-fetch endpoint.
pub async fn player_role(ctx: &GameContext, room_id: &RoomId, device_id: &DeviceId) -> CoreResult<Role> {
    let state = load(ctx, room_id).await?;
    state
        .roles
        .get(device_id)
        .copied()
        .ok_or_else(|| CoreError::not_found(format!("device {device_id}")))
}

async fn require_role(
    ctx: &GameContext,
    room_id: &RoomId,
    device_id: &DeviceId,
    expect: Role,
) -> CoreResult<()> {
    let info = ctx
        .registry
        .info(room_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))?;
    let player = info
        .players
        .iter()
        .find(|p| &p.device_id == device_id)
        .ok_or_else(|| CoreError::not_found(format!("device {device_id}")))?;
    if !player.alive {
        return Err(CoreError::invalid_state("dead players cannot act"));
    }
    let state = load(ctx, room_id).await?;
    match state.roles.get(device_id) {
        Some(role) if *role == expect => Ok(()),
        _ => Err(CoreError::unauthorized(format!("{device_id} is not {}", expect.as_str()))),
    }
}

async fn require_alive(ctx: &GameContext, room_id: &RoomId, device_id: &DeviceId) -> CoreResult<()> {
    let info = ctx
        .registry
        .info(room_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))?;
    let alive = info
        .players
        .iter()
        .find(|p| &p.device_id == device_id)
        .map(|p| p.alive)
        .unwrap_or(false);
    if alive {
        Ok(())
    } else {
        Err(CoreError::invalid_state("target is not alive"))
    }
}

pub async fn mafia_kill(ctx: &GameContext, room_id: &RoomId, device_id: &DeviceId, target: &DeviceId) -> CoreResult<()> {
    require_role(ctx, room_id, device_id, Role::Mafia).await?;
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::Night {
        return Err(CoreError::invalid_state("not the night phase"));
    }
    require_alive(ctx, room_id, target).await?;
    state.mafia_target = Some(target.clone());
    save(ctx, room_id, &state).await?;
    check_night_complete(ctx, room_id).await
}

pub async fn doctor_save(ctx: &GameContext, room_id: &RoomId, device_id: &DeviceId, target: &DeviceId) -> CoreResult<()> {
    require_role(ctx, room_id, device_id, Role::Doctor).await?;
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::Night {
        return Err(CoreError::invalid_state("not the night phase"));
    }
    require_alive(ctx, room_id, target).await?;
    state.doctor_target = Some(target.clone());
    save(ctx, room_id, &state).await?;
    check_night_complete(ctx, room_id).await
}

/// Returns synchronously whether `target` is Mafia; delivered only to the
/// caller, never broadcast.
pub async fn police_investigate(
    ctx: &GameContext,
    room_id: &RoomId,
    device_id: &DeviceId,
    target: &DeviceId,
) -> CoreResult<bool> {
    require_role(ctx, room_id, device_id, Role::Police).await?;
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::Night {
        return Err(CoreError::invalid_state("not the night phase"));
    }
    require_alive(ctx, room_id, target).await?;
    state.police_target = Some(target.clone());
    let is_mafia = state.roles.get(target).copied() == Some(Role::Mafia);
    save(ctx, room_id, &state).await?;
    check_night_complete(ctx, room_id).await?;
    Ok(is_mafia)
}

pub async fn mafia_chat(ctx: &GameContext, room_id: &RoomId, device_id: &DeviceId, text: String) -> CoreResult<()> {
    require_role(ctx, room_id, device_id, Role::Mafia).await?;
    let message = ChatMessage { device_id: device_id.clone(), text };
    ctx.store.list_append(&chat_key(room_id), &message, DEFAULT_TTL).await?;
    let state = load(ctx, room_id).await?;
    for (candidate, role) in &state.roles {
        if *role == Role::Mafia {
            ctx.bus
                .send_to_player(room_id, candidate, Event::new("MAFIA_CHAT", &message))
                .await;
        }
    }
    Ok(())
}

pub async fn read_mafia_chat(ctx: &GameContext, room_id: &RoomId, device_id: &DeviceId) -> CoreResult<Vec<ChatMessage>> {
    require_role(ctx, room_id, device_id, Role::Mafia).await?;
    ctx.store.list_range(&chat_key(room_id)).await
}

fn alive_role_present(state: &MafiaState, alive: &[DeviceId], role: Role) -> bool {
    alive.iter().any(|d| state.roles.get(d).copied() == Some(role))
}

async fn check_night_complete(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let state = load(ctx, room_id).await?;
    if state.phase != Phase::Night {
        return Ok(());
    }
    let info = ctx
        .registry
        .info(room_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))?;
    let alive: Vec<DeviceId> = info.players.iter().filter(|p| p.alive).map(|p| p.device_id.clone()).collect();

    let mafia_done = !alive_role_present(&state, &alive, Role::Mafia) || state.mafia_target.is_some();
    let doctor_done = !alive_role_present(&state, &alive, Role::Doctor) || state.doctor_target.is_some();
    let police_done = !alive_role_present(&state, &alive, Role::Police) || state.police_target.is_some();

    if mafia_done && doctor_done && police_done {
        ctx.scheduler.cancel_timer(room_id);
        resolve_night(ctx, room_id).await?;
    }
    Ok(())
}

fn alive_counts(state: &MafiaState, alive: &[DeviceId]) -> (usize, usize) {
    let mafia_alive = alive.iter().filter(|d| state.roles.get(*d).copied() == Some(Role::Mafia)).count();
    (mafia_alive, alive.len() - mafia_alive)
}

async fn compute_winner(ctx: &GameContext, room_id: &RoomId, state: &MafiaState) -> CoreResult<Option<Winner>> {
    let info = ctx
        .registry
        .info(room_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))?;
    let alive: Vec<DeviceId> = info.players.iter().filter(|p| p.alive).map(|p| p.device_id.clone()).collect();
    let (mafia_alive, non_mafia_alive) = alive_counts(state, &alive);
    if mafia_alive == 0 {
        Ok(Some(Winner::Citizen))
    } else if mafia_alive >= non_mafia_alive {
        Ok(Some(Winner::Mafia))
    } else {
        Ok(None)
    }
}

async fn end_game(ctx: &GameContext, room_id: &RoomId, state: &mut MafiaState, winner: Winner) -> CoreResult<()> {
    state.phase = Phase::GameEnd;
    state.winner = Some(winner);
    save(ctx, room_id, state).await?;
    let info = ctx
        .registry
        .info(room_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))?;
    let roster: Vec<_> = info
        .players
        .iter()
        .map(|p| {
            serde_json::json!({
                "deviceId": p.device_id,
                "nickname": p.nickname,
                "alive": p.alive,
                "role": state.roles.get(&p.device_id).map(|r| r.as_str()),
            })
        })
        .collect();
    ctx.bus
        .broadcast_all(
            room_id,
            Event::new("MAFIA_GAME_END", serde_json::json!({ "winner": winner, "players": roster })),
        )
        .await;
    ctx.scheduler.cleanup(room_id);
    ctx.registry.end_game(room_id).await?;
    Ok(())
}

async fn resolve_night(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    state.was_saved = state.mafia_target.is_some() && state.mafia_target == state.doctor_target;
    state.last_night_killed = if state.was_saved { None } else { state.mafia_target.clone() };

    if let Some(dead) = state.last_night_killed.clone() {
        ctx.registry.set_alive(room_id, &dead, false).await?;
        state.dead_players.push(dead);
    }

    ctx.bus
        .broadcast_all(
            room_id,
            Event::new(
                "MAFIA_DAY_ANNOUNCEMENT",
                serde_json::json!({ "killedPlayer": state.last_night_killed, "wasSaved": state.was_saved }),
            ),
        )
        .await;

    if let Some(winner) = compute_winner(ctx, room_id, &state).await? {
        return end_game(ctx, room_id, &mut state, winner).await;
    }

    state.phase = Phase::DayAnnouncement;
    state.mafia_target = None;
    state.doctor_target = None;
    state.police_target = None;
    save(ctx, room_id, &state).await?;
    arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Mafia, Phase::DayAnnouncement.duration_sec(), "MAFIA_TIMER");
    Ok(())
}

pub async fn vote(ctx: &GameContext, room_id: &RoomId, voter: &DeviceId, target: &DeviceId) -> CoreResult<()> {
    require_alive(ctx, room_id, voter).await?;
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::Vote {
        return Err(CoreError::invalid_state("not the vote phase"));
    }
    state.votes.insert(voter.clone(), target.clone());
    save(ctx, room_id, &state).await?;
    ctx.bus
        .broadcast_host(room_id, Event::new("MAFIA_VOTE_CAST", serde_json::json!({ "voter": voter })))
        .await;
    Ok(())
}

/// Kill = true, save = false.
pub async fn final_vote(ctx: &GameContext, room_id: &RoomId, voter: &DeviceId, kill: bool) -> CoreResult<()> {
    require_alive(ctx, room_id, voter).await?;
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::FinalVote {
        return Err(CoreError::invalid_state("not the final vote phase"));
    }
    if state.execution_target.as_ref() == Some(voter) {
        return Err(CoreError::invalid_state("the accused cannot vote"));
    }
    state.final_votes.insert(voter.clone(), kill);
    save(ctx, room_id, &state).await?;
    Ok(())
}

fn plurality(votes: &HashMap<DeviceId, DeviceId>) -> Option<DeviceId> {
    let mut tally: HashMap<DeviceId, usize> = HashMap::new();
    for target in votes.values() {
        *tally.entry(target.clone()).or_insert(0) += 1;
    }
    let max = tally.values().copied().max()?;
    let mut leaders = tally.into_iter().filter(|(_, count)| *count == max);
    let first = leaders.next()?;
    if leaders.next().is_some() {
        None
    } else {
        Some(first.0)
    }
}

pub async fn on_phase_complete(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    match state.phase {
        Phase::Night => resolve_night(ctx, room_id).await,
        Phase::DayAnnouncement => {
            state.phase = Phase::DayDiscussion;
            save(ctx, room_id, &state).await?;
            arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Mafia, Phase::DayDiscussion.duration_sec(), "MAFIA_TIMER");
            Ok(())
        }
        Phase::DayDiscussion => {
            state.phase = Phase::Vote;
            state.votes.clear();
            save(ctx, room_id, &state).await?;
            arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Mafia, Phase::Vote.duration_sec(), "MAFIA_TIMER");
            Ok(())
        }
        Phase::Vote => {
            state.execution_target = plurality(&state.votes);
            ctx.bus
                .broadcast_all(
                    room_id,
                    Event::new("MAFIA_VOTE_RESULT", serde_json::json!({ "executionTarget": state.execution_target })),
                )
                .await;
            state.phase = Phase::VoteResult;
            save(ctx, room_id, &state).await?;
            arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Mafia, Phase::VoteResult.duration_sec(), "MAFIA_TIMER");
            Ok(())
        }
        Phase::VoteResult => {
            if state.execution_target.is_some() {
                state.phase = Phase::FinalDefense;
                state.final_votes.clear();
                save(ctx, room_id, &state).await?;
                arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Mafia, Phase::FinalDefense.duration_sec(), "MAFIA_TIMER");
            } else {
                start_new_night(ctx, room_id, &mut state).await?;
            }
            Ok(())
        }
        Phase::FinalDefense => {
            state.phase = Phase::FinalVote;
            save(ctx, room_id, &state).await?;
            arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Mafia, Phase::FinalVote.duration_sec(), "MAFIA_TIMER");
            Ok(())
        }
        Phase::FinalVote => {
            let kill_votes = state.final_votes.values().filter(|v| **v).count();
            let save_votes = state.final_votes.values().filter(|v| !**v).count();
            let passed = kill_votes > save_votes;
            ctx.bus
                .broadcast_all(
                    room_id,
                    Event::new("MAFIA_FINAL_VOTE_RESULT", serde_json::json!({ "passed": passed })),
                )
                .await;
            state.phase = Phase::FinalVoteResult;
            save(ctx, room_id, &state).await?;
            ctx.store.set(&format!("{}:passed", state_key(room_id)), &passed, DEFAULT_TTL).await?;
            arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Mafia, Phase::FinalVoteResult.duration_sec(), "MAFIA_TIMER");
            Ok(())
        }
        Phase::FinalVoteResult => {
            let passed: bool = ctx
                .store
                .get(&format!("{}:passed", state_key(room_id)))
                .await?
                .unwrap_or(false);
            if passed {
                if let Some(target) = state.execution_target.clone() {
                    ctx.registry.set_alive(room_id, &target, false).await?;
                    state.dead_players.push(target);
                }
                if let Some(winner) = compute_winner(ctx, room_id, &state).await? {
                    return end_game(ctx, room_id, &mut state, winner).await;
                }
            }
            start_new_night(ctx, room_id, &mut state).await
        }
        Phase::GameEnd => Ok(()),
    }
}

async fn start_new_night(ctx: &GameContext, room_id: &RoomId, state: &mut MafiaState) -> CoreResult<()> {
    state.phase = Phase::Night;
    state.day_count += 1;
    state.mafia_target = None;
    state.doctor_target = None;
    state.police_target = None;
    state.execution_target = None;
    save(ctx, room_id, state).await?;
    arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Mafia, Phase::Night.duration_sec(), "MAFIA_TIMER");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_counts_match_spec_table() {
        assert_eq!(role_count(4), (1, false, false));
        assert_eq!(role_count(5), (1, false, false));
        assert_eq!(role_count(6), (2, true, false));
        assert_eq!(role_count(7), (2, true, true));
        assert_eq!(role_count(8), (2, true, true));
        assert_eq!(role_count(9), (3, true, true));
        assert_eq!(role_count(20), (3, true, true));
    }

    #[test]
    fn plurality_picks_unique_winner() {
        let mut votes = HashMap::new();
        votes.insert(DeviceId::from("a"), DeviceId::from("x"));
        votes.insert(DeviceId::from("b"), DeviceId::from("x"));
        votes.insert(DeviceId::from("c"), DeviceId::from("y"));
        assert_eq!(plurality(&votes), Some(DeviceId::from("x")));
    }

    #[test]
    fn plurality_is_none_on_tie() {
        let mut votes = HashMap::new();
        votes.insert(DeviceId::from("a"), DeviceId::from("x"));
        votes.insert(DeviceId::from("b"), DeviceId::from("y"));
        assert_eq!(plurality(&votes), None);
    }
}
