//! Liar: one hidden liar must fake familiarity with a secret keyword
//! during round-robin explanations (spec.md §4.5.3).

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bus::Event;
use crate::error::{CoreError, CoreResult};
use crate::room::{DeviceId, GameCode, RoomId};
use crate::store::DEFAULT_TTL;

use super::{arm_phase_timer, GameContext};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    RoleReveal,
    Explanation,
    VoteMoreRound,
    Pointing,
    PointingVote,
    PointingResult,
    LiarGuess,
    GameEnd,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Liar,
    Citizen,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LiarState {
    pub phase: Phase,
    pub keyword: String,
    pub category_name: String,
    pub liar_device_id: DeviceId,
    pub explanation_order: Vec<DeviceId>,
    pub current_explainer_index: usize,
    pub round_count: u8,
    pub more_round_votes: HashMap<DeviceId, bool>,
    pub pointing_votes: HashMap<DeviceId, DeviceId>,
    pub pointed_device_id: Option<DeviceId>,
    pub liar_guess: Option<String>,
    pub winner: Option<Winner>,
}

fn state_key(room_id: &RoomId) -> String {
    format!("room:{room_id}:liar:state")
}

async fn load(ctx: &GameContext, room_id: &RoomId) -> CoreResult<LiarState> {
    ctx.store
        .get(&state_key(room_id))
        .await?
        .ok_or_else(|| CoreError::not_found(format!("liar state for room {room_id}")))
}

async fn save(ctx: &GameContext, room_id: &RoomId, state: &LiarState) -> CoreResult<()> {
    ctx.store.set(&state_key(room_id), state, DEFAULT_TTL).await
}

const EXPLANATION_DURATION_SEC: i64 = 20;

fn phase_duration(phase: Phase) -> i64 {
    match phase {
        Phase::RoleReveal => 30,
        Phase::Explanation => EXPLANATION_DURATION_SEC,
        Phase::VoteMoreRound => 15,
        Phase::Pointing => 0,
        Phase::PointingVote => 30,
        Phase::PointingResult => 5,
        Phase::LiarGuess => 30,
        Phase::GameEnd => 0,
    }
}

pub async fn initialize(ctx: &GameContext, room_id: &RoomId, category_id: &str) -> CoreResult<()> {
    let info = ctx
        .registry
        .info(room_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))?;
    if info.players.len() < 3 {
        return Err(CoreError::invalid_state("liar requires at least 3 players"));
    }
    let category = ctx
        .catalog
        .list_categories(GameCode::Liar)
        .into_iter()
        .find(|c| c.category_id == category_id)
        .ok_or_else(|| CoreError::invalid_argument(format!("unknown category {category_id}")))?;
    let keyword = ctx
        .catalog
        .random_words(category_id, 1)
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::invalid_state("category has no words"))?;

    let mut order: Vec<DeviceId> = info.players.iter().map(|p| p.device_id.clone()).collect();
    order.shuffle(&mut rand::rng());
    let liar_device_id = order[rand::rng().random_range(0..order.len())].clone();

    let state = LiarState {
        phase: Phase::RoleReveal,
        keyword,
        category_name: category.name,
        liar_device_id,
        explanation_order: order,
        current_explainer_index: 0,
        round_count: 1,
        more_round_votes: HashMap::new(),
        pointing_votes: HashMap::new(),
        pointed_device_id: None,
        liar_guess: None,
        winner: None,
    };
    save(ctx, room_id, &state).await?;
    ctx.bus
        .broadcast_host(room_id, Event::new("LIAR_INIT", serde_json::json!({ "categoryName": state.category_name })))
        .await;
    arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Liar, phase_duration(Phase::RoleReveal), "LIAR_TIMER");
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleView {
    pub is_liar: bool,
    pub keyword: Option<String>,
    pub category_name: String,
}

pub async fn player_role(ctx: &GameContext, room_id: &RoomId, device_id: &DeviceId) -> CoreResult<RoleView> {
    let state = load(ctx, room_id).await?;
    let is_liar = &state.liar_device_id == device_id;
    Ok(RoleView {
        is_liar,
        keyword: if is_liar { None } else { Some(state.keyword.clone()) },
        category_name: state.category_name,
    })
}

pub async fn vote_more_round(ctx: &GameContext, room_id: &RoomId, device_id: &DeviceId, want_more: bool) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::VoteMoreRound {
        return Err(CoreError::invalid_state("not the vote-more-round phase"));
    }
    state.more_round_votes.insert(device_id.clone(), want_more);
    save(ctx, room_id, &state).await
}

pub async fn start_pointing_vote(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::Pointing {
        return Err(CoreError::invalid_state("not the pointing phase"));
    }
    state.phase = Phase::PointingVote;
    state.pointing_votes.clear();
    save(ctx, room_id, &state).await?;
    arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Liar, phase_duration(Phase::PointingVote), "LIAR_TIMER");
    Ok(())
}

pub async fn vote_pointing(ctx: &GameContext, room_id: &RoomId, voter: &DeviceId, target: &DeviceId) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::PointingVote {
        return Err(CoreError::invalid_state("not the pointing-vote phase"));
    }
    state.pointing_votes.insert(voter.clone(), target.clone());
    save(ctx, room_id, &state).await
}

pub async fn submit_guess(ctx: &GameContext, room_id: &RoomId, device_id: &DeviceId, guess: Option<String>) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::LiarGuess {
        return Err(CoreError::invalid_state("not the liar-guess phase"));
    }
    if &state.liar_device_id != device_id {
        return Err(CoreError::unauthorized("only the liar may guess"));
    }
    ctx.scheduler.cancel_timer(room_id);
    state.liar_guess = guess.clone();
    let won = guess
        .map(|g| g.trim().to_lowercase() == state.keyword.trim().to_lowercase())
        .unwrap_or(false);
    let winner = if won { Winner::Liar } else { Winner::Citizen };
    finish_game(ctx, room_id, &mut state, winner).await
}

fn random_plurality(votes: &HashMap<DeviceId, DeviceId>) -> Option<DeviceId> {
    let mut tally: HashMap<DeviceId, usize> = HashMap::new();
    for target in votes.values() {
        *tally.entry(target.clone()).or_insert(0) += 1;
    }
    let max = *tally.values().max()?;
    let leaders: Vec<DeviceId> = tally.into_iter().filter(|(_, c)| *c == max).map(|(d, _)| d).collect();
    let idx = rand::rng().random_range(0..leaders.len());
    Some(leaders[idx].clone())
}

async fn finish_game(ctx: &GameContext, room_id: &RoomId, state: &mut LiarState, winner: Winner) -> CoreResult<()> {
    state.phase = Phase::GameEnd;
    state.winner = Some(winner);
    save(ctx, room_id, state).await?;
    ctx.bus
        .broadcast_all(
            room_id,
            Event::new(
                "LIAR_GAME_END",
                serde_json::json!({
                    "keyword": state.keyword,
                    "liarDeviceId": state.liar_device_id,
                    "pointedDeviceId": state.pointed_device_id,
                    "liarGuess": state.liar_guess,
                    "isGuessCorrect": matches!(winner, Winner::Liar) && state.liar_guess.is_some(),
                    "winner": winner,
                }),
            ),
        )
        .await;
    ctx.scheduler.cleanup(room_id);
    ctx.registry.end_game(room_id).await?;
    Ok(())
}

pub async fn on_phase_complete(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    match state.phase {
        Phase::RoleReveal => {
            state.phase = Phase::Explanation;
            state.current_explainer_index = 0;
            save(ctx, room_id, &state).await?;
            ctx.bus
                .broadcast_all(
                    room_id,
                    Event::new("LIAR_EXPLANATION_TURN", serde_json::json!({ "deviceId": state.explanation_order[0] })),
                )
                .await;
            arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Liar, phase_duration(Phase::Explanation), "LIAR_TIMER");
            Ok(())
        }
        Phase::Explanation => {
            state.current_explainer_index += 1;
            if state.current_explainer_index < state.explanation_order.len() {
                let next = state.explanation_order[state.current_explainer_index].clone();
                save(ctx, room_id, &state).await?;
                ctx.bus
                    .broadcast_all(room_id, Event::new("LIAR_EXPLANATION_TURN", serde_json::json!({ "deviceId": next })))
                    .await;
                arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Liar, phase_duration(Phase::Explanation), "LIAR_TIMER");
            } else if state.round_count < 2 {
                state.phase = Phase::VoteMoreRound;
                state.more_round_votes.clear();
                save(ctx, room_id, &state).await?;
                arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Liar, phase_duration(Phase::VoteMoreRound), "LIAR_TIMER");
            } else {
                state.phase = Phase::Pointing;
                save(ctx, room_id, &state).await?;
                ctx.bus.broadcast_host(room_id, Event::new("LIAR_POINTING_READY", ())).await;
            }
            Ok(())
        }
        Phase::VoteMoreRound => {
            let more = state.more_round_votes.values().filter(|v| **v).count();
            let stop = state.more_round_votes.values().filter(|v| !**v).count();
            if more > stop {
                state.round_count = 2;
                state.current_explainer_index = 0;
                save(ctx, room_id, &state).await?;
                let ctx2 = ctx.clone();
                let room_id2 = room_id.clone();
                ctx.scheduler.schedule_delayed(room_id.clone(), 2000, move || async move {
                    let mut state = match load(&ctx2, &room_id2).await {
                        Ok(s) => s,
                        Err(_) => return,
                    };
                    state.phase = Phase::Explanation;
                    if save(&ctx2, &room_id2, &state).await.is_err() {
                        return;
                    }
                    ctx2.bus
                        .broadcast_all(
                            &room_id2,
                            Event::new("LIAR_EXPLANATION_TURN", serde_json::json!({ "deviceId": state.explanation_order[0] })),
                        )
                        .await;
                    arm_phase_timer(ctx2.clone(), room_id2.clone(), GameCode::Liar, phase_duration(Phase::Explanation), "LIAR_TIMER");
                });
            } else {
                state.phase = Phase::Pointing;
                save(ctx, room_id, &state).await?;
                ctx.bus.broadcast_host(room_id, Event::new("LIAR_POINTING_READY", ())).await;
            }
            Ok(())
        }
        Phase::Pointing => Ok(()),
        Phase::PointingVote => {
            let pointed = random_plurality(&state.pointing_votes);
            state.pointed_device_id = pointed.clone();
            let is_liar_caught = pointed.as_ref() == Some(&state.liar_device_id);
            ctx.bus
                .broadcast_all(
                    room_id,
                    Event::new("LIAR_POINTING_RESULT", serde_json::json!({ "pointedDeviceId": pointed, "isLiarCaught": is_liar_caught })),
                )
                .await;
            if is_liar_caught {
                state.phase = Phase::PointingResult;
                save(ctx, room_id, &state).await?;
                arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Liar, phase_duration(Phase::PointingResult), "LIAR_TIMER");
                Ok(())
            } else {
                finish_game(ctx, room_id, &mut state, Winner::Citizen).await
            }
        }
        Phase::PointingResult => {
            state.phase = Phase::LiarGuess;
            save(ctx, room_id, &state).await?;
            arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Liar, phase_duration(Phase::LiarGuess), "LIAR_TIMER");
            Ok(())
        }
        Phase::LiarGuess => finish_game(ctx, room_id, &mut state, Winner::Citizen).await,
        Phase::GameEnd => Ok(()),
    }
}
