//! Marble: a 28-cell board game. Teams or solo players roll a die and race
//! around penalty cells (spec.md §4.5.1). No phase here carries a server
//! deadline — every transition is host- or roll-driven.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bus::Event;
use crate::catalog::{self, Catalog};
use crate::error::{CoreError, CoreResult};
use crate::room::{DeviceId, GameCode, RoomId};
use crate::store::DEFAULT_TTL;

use super::GameContext;

pub const BOARD_SIZE: usize = 28;
const SELECTED_COUNT: usize = 26;
const MAX_PENALTIES_PER_DEVICE: usize = 2;
const FIXED_INDICES: [usize; 3] = [0, 7, 21];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    Team,
    Solo,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellType {
    Start,
    UirijuFill,
    UirijuDrink,
    Penalty,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    pub text: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmittedPenalty {
    pub id: String,
    pub device_id: DeviceId,
    pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarbleState {
    pub mode: Option<Mode>,
    pub board: Vec<Cell>,
    pub turn_order: Vec<String>,
    pub current_turn_index: usize,
    pub positions: HashMap<String, usize>,
    pub last_dice: Option<u8>,
    pub voting_closed: bool,
}

fn state_key(room_id: &RoomId) -> String {
    format!("room:{room_id}:marble:state")
}

fn penalties_key(room_id: &RoomId) -> String {
    format!("room:{room_id}:marble:penalties")
}

fn votes_key(room_id: &RoomId) -> String {
    format!("room:{room_id}:marble:votes")
}

fn vote_done_key(room_id: &RoomId) -> String {
    format!("room:{room_id}:marble:vote_done")
}

fn selected_key(room_id: &RoomId) -> String {
    format!("room:{room_id}:marble:selected")
}

async fn load(ctx: &GameContext, room_id: &RoomId) -> CoreResult<MarbleState> {
    ctx.store
        .get(&state_key(room_id))
        .await?
        .ok_or_else(|| CoreError::not_found(format!("marble state for room {room_id}")))
}

async fn save(ctx: &GameContext, room_id: &RoomId, state: &MarbleState) -> CoreResult<()> {
    ctx.store.set(&state_key(room_id), state, DEFAULT_TTL).await
}

pub async fn initialize(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let state = MarbleState {
        mode: None,
        board: Vec::new(),
        turn_order: Vec::new(),
        current_turn_index: 0,
        positions: HashMap::new(),
        last_dice: None,
        voting_closed: false,
    };
    ctx.store.delete(&penalties_key(room_id)).await;
    ctx.store.delete(&votes_key(room_id)).await;
    ctx.store.delete(&vote_done_key(room_id)).await;
    ctx.store.delete(&selected_key(room_id)).await;
    save(ctx, room_id, &state).await
}

pub async fn submit_penalty(ctx: &GameContext, room_id: &RoomId, device_id: &DeviceId, text: String) -> CoreResult<()> {
    let state = load(ctx, room_id).await?;
    if state.voting_closed {
        return Err(CoreError::invalid_state("penalty submission is closed"));
    }
    let existing: Vec<SubmittedPenalty> = ctx.store.list_range(&penalties_key(room_id)).await?;
    let mine = existing.iter().filter(|p| &p.device_id == device_id).count();
    if mine >= MAX_PENALTIES_PER_DEVICE {
        return Err(CoreError::conflict("each device may submit at most 2 penalties"));
    }
    let entry = SubmittedPenalty {
        id: uuid::Uuid::new_v4().to_string(),
        device_id: device_id.clone(),
        text,
    };
    ctx.store.list_append(&penalties_key(room_id), &entry, DEFAULT_TTL).await?;

    let info = ctx
        .registry
        .info(room_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))?;
    let total_count = existing.len() + 1;
    let expected_count = info.players.len() * MAX_PENALTIES_PER_DEVICE;
    ctx.bus
        .broadcast_all(
            room_id,
            Event::new(
                "MARBLE_PENALTY_PROGRESS",
                serde_json::json!({
                    "totalCount": total_count,
                    "expectedCount": expected_count,
                    "isAllSubmitted": total_count >= expected_count,
                }),
            ),
        )
        .await;
    Ok(())
}

#[derive(Clone, Debug, Serialize)]
struct VoteStatusEntry {
    penalty_id: String,
    text: String,
    vote_count: usize,
}

async fn broadcast_vote_status(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let penalties: Vec<SubmittedPenalty> = ctx.store.list_range(&penalties_key(room_id)).await?;
    let votes: HashSet<String> = ctx.store.set_members(&votes_key(room_id)).await?;
    let mut tally: HashMap<String, usize> = HashMap::new();
    for pair in &votes {
        if let Some((_, penalty_id)) = pair.split_once('|') {
            *tally.entry(penalty_id.to_string()).or_insert(0) += 1;
        }
    }
    let mut snapshot: Vec<VoteStatusEntry> = penalties
        .iter()
        .map(|p| VoteStatusEntry {
            penalty_id: p.id.clone(),
            text: p.text.clone(),
            vote_count: *tally.get(&p.id).unwrap_or(&0),
        })
        .collect();
    snapshot.sort_by(|a, b| b.vote_count.cmp(&a.vote_count).then_with(|| a.penalty_id.cmp(&b.penalty_id)));
    ctx.bus.broadcast_all(room_id, Event::new("MARBLE_VOTE_STATUS", snapshot)).await;
    Ok(())
}

/// Toggles a `(deviceId, penaltyId)` vote pair; re-voting removes it.
pub async fn toggle_vote(ctx: &GameContext, room_id: &RoomId, device_id: &DeviceId, penalty_id: &str) -> CoreResult<()> {
    let state = load(ctx, room_id).await?;
    if state.voting_closed {
        return Err(CoreError::invalid_state("voting is closed"));
    }
    let pair = format!("{device_id}|{penalty_id}");
    if ctx.store.set_contains(&votes_key(room_id), &pair).await? {
        ctx.store.set_remove(&votes_key(room_id), &pair).await?;
    } else {
        ctx.store.set_add(&votes_key(room_id), &pair, DEFAULT_TTL).await?;
    }
    broadcast_vote_status(ctx, room_id).await
}

/// Selects the top 26 penalties by vote count (random tiebreak), falling
/// back to the catalog's penalty category and then the hard-coded list.
pub async fn close_voting(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.voting_closed {
        return Err(CoreError::invalid_state("voting is already closed"));
    }
    let penalties: Vec<SubmittedPenalty> = ctx.store.list_range(&penalties_key(room_id)).await?;
    let votes: HashSet<String> = ctx.store.set_members(&votes_key(room_id)).await?;
    let mut tally: HashMap<String, usize> = HashMap::new();
    for pair in &votes {
        if let Some((_, penalty_id)) = pair.split_once('|') {
            *tally.entry(penalty_id.to_string()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = penalties
        .iter()
        .map(|p| (p.text.clone(), *tally.get(&p.id).unwrap_or(&0)))
        .collect();
    ranked.shuffle(&mut rand::rng());
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let mut selected: Vec<String> = ranked.into_iter().take(SELECTED_COUNT).map(|(text, _)| text).collect();

    if selected.len() < SELECTED_COUNT {
        if let Some(category) = Catalog::global().find_one_penalty_category(GameCode::Marble) {
            let needed = SELECTED_COUNT - selected.len();
            let mut fill = Catalog::global().random_words(&category.category_id, needed);
            fill.retain(|w| !selected.contains(w));
            selected.extend(fill);
        }
    }
    if selected.len() < SELECTED_COUNT {
        let mut fallback: Vec<String> = catalog::FALLBACK_PENALTIES.iter().map(|s| s.to_string()).collect();
        fallback.shuffle(&mut rand::rng());
        for phrase in fallback {
            if selected.len() >= SELECTED_COUNT {
                break;
            }
            if !selected.contains(&phrase) {
                selected.push(phrase);
            }
        }
    }

    ctx.store.set(&selected_key(room_id), &selected, DEFAULT_TTL).await?;
    state.voting_closed = true;
    save(ctx, room_id, &state).await?;
    ctx.bus.broadcast_all(room_id, Event::new("MARBLE_VOTING_CLOSED", &selected)).await;
    Ok(())
}

/// Host chooses `team` or `solo`; initializes the turn order and zeroes
/// every participant's position.
pub async fn select_mode(ctx: &GameContext, room_id: &RoomId, mode: Mode) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if !state.voting_closed {
        return Err(CoreError::invalid_state("penalty voting has not closed yet"));
    }
    let info = ctx
        .registry
        .info(room_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))?;

    let turn_order: Vec<String> = match mode {
        Mode::Team => {
            let mut teams: Vec<String> = info.players.iter().filter_map(|p| p.team.clone()).collect();
            teams.sort();
            teams.dedup();
            if teams.is_empty() {
                return Err(CoreError::invalid_state("team mode requires teams to be assigned first"));
            }
            teams
        }
        Mode::Solo => {
            let mut order: Vec<String> = info.players.iter().map(|p| p.device_id.to_string()).collect();
            order.shuffle(&mut rand::rng());
            order
        }
    };

    state.mode = Some(mode);
    state.positions = turn_order.iter().map(|k| (k.clone(), 0)).collect();
    state.turn_order = turn_order;
    state.current_turn_index = 0;
    save(ctx, room_id, &state).await?;
    ctx.bus.broadcast_all(room_id, Event::new("MARBLE_MODE_SELECTED", serde_json::json!({ "mode": mode }))).await;
    Ok(())
}

/// Shuffles the 26 selected penalties into indices 1–6, 8–20, 22–27;
/// indices 0, 7, 21 carry fixed labels (spec.md §4.5.1 step 5).
pub async fn generate_board(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.mode.is_none() {
        return Err(CoreError::invalid_state("select a mode before generating the board"));
    }
    let mut selected: Vec<String> = ctx
        .store
        .get(&selected_key(room_id))
        .await?
        .ok_or_else(|| CoreError::invalid_state("no selected penalties to build a board from"))?;
    selected.shuffle(&mut rand::rng());

    let mut board = Vec::with_capacity(BOARD_SIZE);
    let mut penalty_iter = selected.into_iter();
    for index in 0..BOARD_SIZE {
        let cell = if index == 0 {
            Cell { cell_type: CellType::Start, text: None }
        } else if index == 7 {
            Cell { cell_type: CellType::UirijuFill, text: None }
        } else if index == 21 {
            Cell { cell_type: CellType::UirijuDrink, text: None }
        } else {
            Cell {
                cell_type: CellType::Penalty,
                text: penalty_iter.next(),
            }
        };
        board.push(cell);
    }
    state.board = board;
    save(ctx, room_id, &state).await?;
    ctx.bus.broadcast_all(room_id, Event::new("MARBLE_BOARD_GENERATED", &state.board)).await;
    Ok(())
}

fn current_turn_key(state: &MarbleState) -> Option<&str> {
    state.turn_order.get(state.current_turn_index).map(String::as_str)
}

/// Validates that `roller_key` (team tag in team mode, device id in solo
/// mode) matches the current turn holder.
pub async fn roll(ctx: &GameContext, room_id: &RoomId, roller_key: &str) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.board.is_empty() {
        return Err(CoreError::invalid_state("board has not been generated yet"));
    }
    match current_turn_key(&state) {
        Some(turn_key) if turn_key == roller_key => {}
        Some(turn_key) => {
            return Err(CoreError::invalid_state(format!("it is {turn_key}'s turn")));
        }
        None => return Err(CoreError::invalid_state("no active turn")),
    }

    let face = rand::rng().random_range(1..=6u8);
    let position = state.positions.entry(roller_key.to_string()).or_insert(0);
    *position = (*position + face as usize) % BOARD_SIZE;
    let landed_index = *position;
    let landed = state.board[landed_index].clone();
    state.last_dice = Some(face);
    let n = state.turn_order.len();
    state.current_turn_index = (state.current_turn_index + 1) % n;
    let next_turn = state.turn_order[state.current_turn_index].clone();
    save(ctx, room_id, &state).await?;

    ctx.bus
        .broadcast_all(
            room_id,
            Event::new(
                "MARBLE_DICE_ROLLED",
                serde_json::json!({
                    "turnKey": roller_key,
                    "face": face,
                    "landedIndex": landed_index,
                    "landedCell": landed,
                    "nextTurnKey": next_turn,
                }),
            ),
        )
        .await;
    ctx.bus
        .broadcast_players(room_id, Event::new("MARBLE_TURN_CHANGE", serde_json::json!({ "turnKey": next_turn })))
        .await;
    Ok(())
}

pub async fn end_game(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    ctx.store.delete(&state_key(room_id)).await;
    ctx.store.delete(&penalties_key(room_id)).await;
    ctx.store.delete(&votes_key(room_id)).await;
    ctx.store.delete(&vote_done_key(room_id)).await;
    ctx.store.delete(&selected_key(room_id)).await;
    ctx.bus.broadcast_all(room_id, Event::new("MARBLE_GAME_END", ())).await;
    ctx.registry.end_game(room_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_has_three_fixed_cells_and_twenty_five_penalties() {
        let mut selected: Vec<String> = (0..26).map(|i| format!("penalty-{i}")).collect();
        selected.shuffle(&mut rand::rng());
        let mut board = Vec::with_capacity(BOARD_SIZE);
        let mut iter = selected.into_iter();
        for index in 0..BOARD_SIZE {
            let cell = if FIXED_INDICES.contains(&index) {
                Cell { cell_type: CellType::Start, text: None }
            } else {
                Cell { cell_type: CellType::Penalty, text: iter.next() }
            };
            board.push(cell);
        }
        assert_eq!(board.len(), BOARD_SIZE);
        let penalty_cells = board.iter().filter(|c| matches!(c.cell_type, CellType::Penalty)).count();
        assert_eq!(penalty_cells, 25);
    }

    #[test]
    fn fixed_indices_are_zero_seven_twenty_one() {
        assert_eq!(FIXED_INDICES, [0, 7, 21]);
    }
}
