//! Quiz (Speed-Charades): teams take turns racing a word list against a
//! clock (spec.md §4.5.4).

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::bus::Event;
use crate::error::{CoreError, CoreResult};
use crate::room::{GameCode, RoomId};
use crate::store::DEFAULT_TTL;

use super::{arm_phase_timer, GameContext};

const ROUND_WORD_COUNT: usize = 50;
pub const DEFAULT_ROUND_TIME_SEC: u32 = 120;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Waiting,
    Playing,
    RoundEnd,
    Finished,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizState {
    pub teams: Vec<String>,
    pub current_team_index: usize,
    pub round_time_seconds: u32,
    pub team_scores: HashMap<String, u32>,
    pub completed_teams: HashSet<String>,
    pub phase: Phase,
    pub current_word: Option<String>,
    pub remaining_words: Vec<String>,
    pub current_round_score: u32,
    category_id: String,
}

fn state_key(room_id: &RoomId) -> String {
    format!("room:{room_id}:quiz:state")
}

async fn load(ctx: &GameContext, room_id: &RoomId) -> CoreResult<QuizState> {
    ctx.store
        .get(&state_key(room_id))
        .await?
        .ok_or_else(|| CoreError::not_found(format!("quiz state for room {room_id}")))
}

async fn save(ctx: &GameContext, room_id: &RoomId, state: &QuizState) -> CoreResult<()> {
    ctx.store.set(&state_key(room_id), state, DEFAULT_TTL).await
}

/// Requires teams already assigned on the roster (spec.md §4.5.4).
pub async fn initialize(
    ctx: &GameContext,
    room_id: &RoomId,
    category_id: &str,
    round_time_seconds: Option<u32>,
) -> CoreResult<()> {
    let info = ctx
        .registry
        .info(room_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))?;
    let mut teams: Vec<String> = info.players.iter().filter_map(|p| p.team.clone()).collect();
    teams.sort();
    teams.dedup();
    if teams.is_empty() {
        return Err(CoreError::invalid_state("quiz requires teams to be assigned first"));
    }

    let state = QuizState {
        teams: teams.clone(),
        current_team_index: 0,
        round_time_seconds: round_time_seconds.unwrap_or(DEFAULT_ROUND_TIME_SEC),
        team_scores: teams.iter().map(|t| (t.clone(), 0)).collect(),
        completed_teams: HashSet::new(),
        phase: Phase::Waiting,
        current_word: None,
        remaining_words: Vec::new(),
        current_round_score: 0,
        category_id: category_id.to_string(),
    };
    save(ctx, room_id, &state).await?;
    ctx.bus
        .broadcast_all(room_id, Event::new("QUIZ_INIT", serde_json::json!({ "teams": teams })))
        .await;
    Ok(())
}

/// Host starts the current team's round.
pub async fn start_round(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::Waiting {
        return Err(CoreError::invalid_state("a round is already in progress or the game is over"));
    }
    let mut words = ctx.catalog.random_words(&state.category_id, ROUND_WORD_COUNT);
    words.shuffle(&mut rand::rng());
    if words.is_empty() {
        return Err(CoreError::invalid_state("category has no words"));
    }
    let current = words.remove(0);
    state.current_word = Some(current.clone());
    state.remaining_words = words;
    state.current_round_score = 0;
    state.phase = Phase::Playing;
    save(ctx, room_id, &state).await?;
    ctx.bus
        .broadcast_all(
            room_id,
            Event::new(
                "QUIZ_ROUND_START",
                serde_json::json!({ "team": state.teams[state.current_team_index], "word": current }),
            ),
        )
        .await;
    arm_phase_timer(ctx.clone(), room_id.clone(), GameCode::Quiz, state.round_time_seconds as i64, "QUIZ_TIMER");
    Ok(())
}

pub async fn correct(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::Playing {
        return Err(CoreError::invalid_state("no round in progress"));
    }
    state.current_round_score += 1;
    if state.remaining_words.is_empty() {
        state.current_word = None;
        return end_round(ctx, room_id, &mut state).await;
    }
    let next = state.remaining_words.remove(0);
    state.current_word = Some(next.clone());
    save(ctx, room_id, &state).await?;
    ctx.bus
        .broadcast_all(
            room_id,
            Event::new("QUIZ_WORD_CHANGE", serde_json::json!({ "word": next, "score": state.current_round_score })),
        )
        .await;
    Ok(())
}

pub async fn pass(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::Playing {
        return Err(CoreError::invalid_state("no round in progress"));
    }
    if state.remaining_words.is_empty() {
        return Ok(());
    }
    if let Some(current) = state.current_word.take() {
        state.remaining_words.push(current);
    }
    let next = state.remaining_words.remove(0);
    state.current_word = Some(next.clone());
    save(ctx, room_id, &state).await?;
    ctx.bus
        .broadcast_all(room_id, Event::new("QUIZ_WORD_CHANGE", serde_json::json!({ "word": next, "score": state.current_round_score })))
        .await;
    Ok(())
}

async fn end_round(ctx: &GameContext, room_id: &RoomId, state: &mut QuizState) -> CoreResult<()> {
    ctx.scheduler.cancel_timer(room_id);
    let team = state.teams[state.current_team_index].clone();
    state.team_scores.insert(team.clone(), state.current_round_score);
    state.completed_teams.insert(team.clone());
    state.current_word = None;
    state.remaining_words.clear();
    state.phase = Phase::RoundEnd;
    save(ctx, room_id, state).await?;
    ctx.bus
        .broadcast_all(
            room_id,
            Event::new("QUIZ_ROUND_END", serde_json::json!({ "team": team, "score": state.current_round_score })),
        )
        .await;
    Ok(())
}

/// Advances the turn index to the next not-yet-completed team
/// (wrap-around), or finishes the game if all teams have played.
pub async fn next_team(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::RoundEnd {
        return Err(CoreError::invalid_state("no round result to advance from"));
    }
    if state.completed_teams.len() >= state.teams.len() {
        state.phase = Phase::Finished;
        save(ctx, room_id, &state).await?;
        let mut ranking: Vec<(String, u32)> =
            state.team_scores.iter().map(|(t, s)| (t.clone(), *s)).collect();
        ranking.sort_by(|a, b| b.1.cmp(&a.1));
        ctx.bus
            .broadcast_all(room_id, Event::new("QUIZ_GAME_END", serde_json::json!({ "ranking": ranking, "isComplete": true })))
            .await;
        ctx.scheduler.cleanup(room_id);
        ctx.registry.end_game(room_id).await?;
        return Ok(());
    }
    let n = state.teams.len();
    let mut next_index = (state.current_team_index + 1) % n;
    while state.completed_teams.contains(&state.teams[next_index]) {
        next_index = (next_index + 1) % n;
    }
    state.current_team_index = next_index;
    state.phase = Phase::Waiting;
    save(ctx, room_id, &state).await?;
    ctx.bus
        .broadcast_all(room_id, Event::new("QUIZ_NEXT_TEAM", serde_json::json!({ "team": state.teams[next_index] })))
        .await;
    Ok(())
}

pub async fn on_phase_complete(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase == Phase::Playing {
        end_round(ctx, room_id, &mut state).await
    } else {
        Ok(())
    }
}
