//! Truth (Interrogation): one answerer faces a question while the server
//! scores per-frame face-tracking samples for a deterministic lie/truth
//! verdict (spec.md §4.5.5). No phase in this game carries a server-side
//! deadline — every transition is host- or action-driven, so the scheduler
//! is never armed for it.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bus::Event;
use crate::error::{CoreError, CoreResult};
use crate::room::{DeviceId, RoomId};
use crate::store::DEFAULT_TTL;

use super::GameContext;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    SelectAnswerer,
    SubmitQuestions,
    SelectQuestion,
    Answering,
    Result,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedQuestion {
    pub author: DeviceId,
    pub text: String,
    pub is_used: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceTrackingSample {
    pub eye_blink_rate: f64,
    pub eye_movement: f64,
    pub facial_tremor: f64,
    pub nostril_movement: f64,
    pub stress_level: f64,
    pub micro_expression: Option<String>,
    pub timestamp: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TruthState {
    pub phase: Phase,
    pub round: u32,
    pub current_answerer: Option<DeviceId>,
    pub current_question: Option<String>,
    pub submitted_questions: Vec<SubmittedQuestion>,
    pub question_votes: HashMap<DeviceId, usize>,
    pub vote_done_devices: HashSet<DeviceId>,
}

fn state_key(room_id: &RoomId) -> String {
    format!("room:{room_id}:truth:state")
}

fn tracking_key(room_id: &RoomId) -> String {
    format!("room:{room_id}:truth:tracking")
}

async fn load(ctx: &GameContext, room_id: &RoomId) -> CoreResult<TruthState> {
    ctx.store
        .get(&state_key(room_id))
        .await?
        .ok_or_else(|| CoreError::not_found(format!("truth state for room {room_id}")))
}

async fn save(ctx: &GameContext, room_id: &RoomId, state: &TruthState) -> CoreResult<()> {
    ctx.store.set(&state_key(room_id), state, DEFAULT_TTL).await
}

pub async fn initialize(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let state = TruthState {
        phase: Phase::SelectAnswerer,
        round: 1,
        current_answerer: None,
        current_question: None,
        submitted_questions: Vec::new(),
        question_votes: HashMap::new(),
        vote_done_devices: HashSet::new(),
    };
    save(ctx, room_id, &state).await
}

/// `answerer = None` picks a random (alive) roster member.
pub async fn select_answerer(ctx: &GameContext, room_id: &RoomId, answerer: Option<DeviceId>) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::SelectAnswerer {
        return Err(CoreError::invalid_state("not the select-answerer phase"));
    }
    let info = ctx
        .registry
        .info(room_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("room {room_id}")))?;
    let chosen = match answerer {
        Some(device_id) => device_id,
        None => {
            let alive: Vec<_> = info.players.iter().filter(|p| p.alive).collect();
            if alive.is_empty() {
                return Err(CoreError::invalid_state("no eligible players"));
            }
            alive[rand::rng().random_range(0..alive.len())].device_id.clone()
        }
    };
    state.current_answerer = Some(chosen.clone());
    state.phase = Phase::SubmitQuestions;
    save(ctx, room_id, &state).await?;
    ctx.bus
        .broadcast_all(room_id, Event::new("TRUTH_ANSWERER_SELECTED", serde_json::json!({ "deviceId": chosen })))
        .await;
    Ok(())
}

pub async fn submit_question(ctx: &GameContext, room_id: &RoomId, device_id: &DeviceId, text: String) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::SubmitQuestions {
        return Err(CoreError::invalid_state("not the submit-questions phase"));
    }
    if state.current_answerer.as_ref() == Some(device_id) {
        return Err(CoreError::unauthorized("the answerer cannot submit a question"));
    }
    state
        .submitted_questions
        .push(SubmittedQuestion { author: device_id.clone(), text, is_used: false });
    save(ctx, room_id, &state).await
}

pub async fn finish_question_submission(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::SubmitQuestions {
        return Err(CoreError::invalid_state("not the submit-questions phase"));
    }
    if state.submitted_questions.is_empty() {
        return Err(CoreError::invalid_state("no questions were submitted"));
    }
    state.phase = Phase::SelectQuestion;
    save(ctx, room_id, &state).await?;
    ctx.bus
        .broadcast_host(room_id, Event::new("TRUTH_QUESTIONS_READY", serde_json::json!({ "count": state.submitted_questions.len() })))
        .await;
    Ok(())
}

fn unused_indices(state: &TruthState) -> Vec<usize> {
    state
        .submitted_questions
        .iter()
        .enumerate()
        .filter(|(_, q)| !q.is_used)
        .map(|(i, _)| i)
        .collect()
}

/// Host reroll-friendly random pick; does not consume the question until
/// `confirm_question` is called.
pub async fn select_random_question(ctx: &GameContext, room_id: &RoomId) -> CoreResult<SubmittedQuestion> {
    let state = load(ctx, room_id).await?;
    if state.phase != Phase::SelectQuestion {
        return Err(CoreError::invalid_state("not the select-question phase"));
    }
    let unused = unused_indices(&state);
    if unused.is_empty() {
        return Err(CoreError::invalid_state("no unused questions remain"));
    }
    let idx = unused[rand::rng().random_range(0..unused.len())];
    Ok(state.submitted_questions[idx].clone())
}

pub async fn confirm_question(ctx: &GameContext, room_id: &RoomId, text: &str) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::SelectQuestion {
        return Err(CoreError::invalid_state("not the select-question phase"));
    }
    let question = state
        .submitted_questions
        .iter_mut()
        .find(|q| !q.is_used && q.text == text)
        .ok_or_else(|| CoreError::invalid_argument("question not found or already used"))?;
    question.is_used = true;
    let confirmed = question.text.clone();
    state.current_question = Some(confirmed.clone());
    state.phase = Phase::Answering;
    ctx.store.delete(&tracking_key(room_id)).await;
    save(ctx, room_id, &state).await?;
    ctx.bus
        .broadcast_all(room_id, Event::new("TRUTH_QUESTION_SELECTED", serde_json::json!({ "question": confirmed })))
        .await;
    Ok(())
}

pub async fn toggle_question_vote(ctx: &GameContext, room_id: &RoomId, device_id: &DeviceId, index: usize) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::SelectQuestion {
        return Err(CoreError::invalid_state("not the select-question phase"));
    }
    if state.current_answerer.as_ref() == Some(device_id) {
        return Err(CoreError::unauthorized("the answerer cannot vote"));
    }
    if index >= state.submitted_questions.len() {
        return Err(CoreError::invalid_argument("question index out of range"));
    }
    if state.question_votes.get(device_id) == Some(&index) {
        state.question_votes.remove(device_id);
        state.vote_done_devices.remove(device_id);
    } else {
        state.question_votes.insert(device_id.clone(), index);
        state.vote_done_devices.insert(device_id.clone());
    }
    save(ctx, room_id, &state).await
}

pub async fn finish_question_vote(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let state = load(ctx, room_id).await?;
    if state.phase != Phase::SelectQuestion {
        return Err(CoreError::invalid_state("not the select-question phase"));
    }
    let unused = unused_indices(&state);
    if unused.is_empty() {
        return Err(CoreError::invalid_state("no unused questions remain"));
    }
    let chosen_index = if state.question_votes.is_empty() {
        unused[rand::rng().random_range(0..unused.len())]
    } else {
        let mut tally: HashMap<usize, usize> = HashMap::new();
        for idx in state.question_votes.values() {
            if unused.contains(idx) {
                *tally.entry(*idx).or_insert(0) += 1;
            }
        }
        if tally.is_empty() {
            unused[rand::rng().random_range(0..unused.len())]
        } else {
            let max = *tally.values().max().unwrap();
            let leaders: Vec<usize> = tally.into_iter().filter(|(_, c)| *c == max).map(|(i, _)| i).collect();
            leaders[rand::rng().random_range(0..leaders.len())]
        }
    };
    let text = state.submitted_questions[chosen_index].text.clone();
    confirm_question(ctx, room_id, &text).await
}

pub async fn submit_face_sample(
    ctx: &GameContext,
    room_id: &RoomId,
    device_id: &DeviceId,
    sample: FaceTrackingSample,
) -> CoreResult<()> {
    let state = load(ctx, room_id).await?;
    if state.phase != Phase::Answering {
        return Err(CoreError::invalid_state("not the answering phase"));
    }
    if state.current_answerer.as_ref() != Some(device_id) {
        return Err(CoreError::unauthorized("only the answerer submits tracking samples"));
    }
    ctx.store.list_append(&tracking_key(room_id), &sample, DEFAULT_TTL).await?;
    ctx.bus
        .broadcast_host(room_id, Event::new("TRUTH_FACE_DATA", &sample))
        .await;
    Ok(())
}

#[derive(Clone, Debug, Serialize)]
pub struct Analysis {
    pub is_lie: bool,
    pub confidence: u32,
    pub comment: String,
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn population_stddev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

fn clamp_round(value: f64, lo: i64, hi: i64) -> i64 {
    (value.round() as i64).clamp(lo, hi)
}

/// Deterministic lie-detection scoring over accumulated tracking samples
/// (spec.md §4.5.5).
pub fn analyze(samples: &[FaceTrackingSample]) -> Analysis {
    let n = samples.len();
    if n == 0 {
        return Analysis { is_lie: false, confidence: 0, comment: "수집된 데이터가 없습니다".to_string() };
    }
    if n < 5 {
        return Analysis { is_lie: false, confidence: 0, comment: "데이터가 충분하지 않습니다".to_string() };
    }

    let blink_values: Vec<f64> = samples.iter().map(|s| s.eye_blink_rate).collect();
    let eye_values: Vec<f64> = samples.iter().map(|s| s.eye_movement).collect();
    let tremor_values: Vec<f64> = samples.iter().map(|s| s.facial_tremor).collect();
    let nostril_values: Vec<f64> = samples.iter().map(|s| s.nostril_movement).collect();
    let stress_values: Vec<f64> = samples.iter().map(|s| s.stress_level).collect();

    let blink = clamp_round(median(&blink_values) / 3.0 * 100.0, 0, 100);
    let eye = clamp_round(median(&eye_values) * 300.0, 0, 100);
    let tremor = clamp_round(median(&tremor_values) * 300.0, 0, 100);
    let nostril = clamp_round(median(&nostril_values) * 300.0, 0, 100);

    let volatility = (clamp_round(population_stddev(&blink_values) * 100.0, 0, 30)
        + clamp_round(population_stddev(&eye_values) * 100.0, 0, 30)
        + clamp_round(population_stddev(&tremor_values) * 50.0, 0, 20)
        + clamp_round(population_stddev(&nostril_values) * 50.0, 0, 20)) as f64;

    let mid = n / 2;
    let first_half_avg = stress_values[..mid].iter().sum::<f64>() / mid as f64;
    let second_half_avg = stress_values[mid..].iter().sum::<f64>() / (n - mid) as f64;
    let trend = (second_half_avg - first_half_avg).max(0.0);

    let nervous_count = samples
        .iter()
        .filter(|s| s.micro_expression.as_deref() == Some("nervous"))
        .count();
    let micro_expr = (nervous_count as f64 / n as f64 * 30.0).round();

    let base = (blink as f64 * 0.25
        + eye as f64 * 0.25
        + tremor as f64 * 0.15
        + nostril as f64 * 0.15
        + volatility * 0.2
        + trend * 0.1
        + micro_expr * 0.1)
        .round() as i64;

    let high_channels = [blink, eye, tremor, nostril].iter().filter(|&&c| c >= 50).count();
    let bonus = if high_channels >= 3 {
        15
    } else if high_channels >= 2 {
        10
    } else {
        0
    };

    let overall = (base + bonus).clamp(0, 100) as u32;
    let is_lie = overall >= 7;

    let channels = [("눈 깜빡임", blink), ("시선 이동", eye), ("떨림", tremor), ("콧구멍 움직임", nostril)];
    let highest = channels.iter().max_by_key(|(_, score)| *score).unwrap().0;
    let comment = if overall >= 70 {
        format!("{highest} 지표가 강하게 반응했습니다 — 거짓일 가능성이 높습니다")
    } else if overall >= 7 {
        format!("{highest} 지표에서 의심스러운 변화가 감지되었습니다")
    } else {
        "특별한 동요가 감지되지 않았습니다".to_string()
    };

    Analysis { is_lie, confidence: overall, comment }
}

pub async fn finish_answering(ctx: &GameContext, room_id: &RoomId) -> CoreResult<Analysis> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::Answering {
        return Err(CoreError::invalid_state("not the answering phase"));
    }
    let samples: Vec<FaceTrackingSample> = ctx.store.list_range(&tracking_key(room_id)).await?;
    let analysis = analyze(&samples);
    state.phase = Phase::Result;
    save(ctx, room_id, &state).await?;
    ctx.bus
        .broadcast_all(room_id, Event::new("TRUTH_RESULT", &analysis))
        .await;
    Ok(analysis)
}

pub async fn start_next_round(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    let mut state = load(ctx, room_id).await?;
    if state.phase != Phase::Result {
        return Err(CoreError::invalid_state("not the result phase"));
    }
    state.round += 1;
    state.phase = Phase::SelectAnswerer;
    state.current_answerer = None;
    state.current_question = None;
    state.submitted_questions.clear();
    state.question_votes.clear();
    state.vote_done_devices.clear();
    ctx.store.delete(&tracking_key(room_id)).await;
    save(ctx, room_id, &state).await
}

pub async fn end_game(ctx: &GameContext, room_id: &RoomId) -> CoreResult<()> {
    ctx.bus.broadcast_all(room_id, Event::new("TRUTH_GAME_END", ())).await;
    ctx.scheduler.cleanup(room_id);
    ctx.registry.end_game(room_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(eye_movement: f64) -> FaceTrackingSample {
        FaceTrackingSample {
            eye_blink_rate: 0.0,
            eye_movement,
            facial_tremor: 0.02,
            nostril_movement: 0.02,
            stress_level: 0.0,
            micro_expression: None,
            timestamp: 0,
        }
    }

    #[test]
    fn empty_samples_is_not_a_lie_with_zero_confidence() {
        let analysis = analyze(&[]);
        assert!(!analysis.is_lie);
        assert_eq!(analysis.confidence, 0);
    }

    #[test]
    fn fewer_than_five_samples_is_insufficient() {
        let samples = vec![sample(0.02); 3];
        let analysis = analyze(&samples);
        assert!(!analysis.is_lie);
        assert_eq!(analysis.confidence, 0);
    }

    #[test]
    fn analysis_is_deterministic_for_equal_inputs() {
        let samples = vec![sample(0.02); 10];
        assert_eq!(analyze(&samples).confidence, analyze(&samples).confidence);
        assert_eq!(analyze(&samples).is_lie, analyze(&samples).is_lie);
    }

    #[test]
    fn elevated_eye_movement_crosses_the_lie_threshold() {
        let mut samples = vec![sample(0.02); 10];
        for s in samples.iter_mut().skip(5) {
            s.eye_movement = 0.10;
        }
        let analysis = analyze(&samples);
        assert!(analysis.is_lie);
        assert!(analysis.confidence >= 7);
    }

    #[test]
    fn all_zero_samples_never_reports_a_lie() {
        let samples = vec![sample(0.0); 10];
        assert!(!analyze(&samples).is_lie);
    }
}
