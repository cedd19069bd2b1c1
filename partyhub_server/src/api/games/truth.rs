//! Truth (Interrogation) action routes (spec.md §4.5.5).

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use partyhub_core::game::truth::{self, Analysis, FaceTrackingSample, SubmittedQuestion};
use partyhub_core::RoomId;
use serde::Deserialize;

use crate::api::{ApiResponse, ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/init", post(init))
        .route("/select-answerer", post(select_answerer))
        .route("/submit-question", post(submit_question))
        .route("/finish-submission", post(finish_question_submission))
        .route("/random-question", post(select_random_question))
        .route("/confirm-question", post(confirm_question))
        .route("/toggle-vote", post(toggle_question_vote))
        .route("/finish-vote", post(finish_question_vote))
        .route("/face-sample", post(submit_face_sample))
        .route("/finish-answering", post(finish_answering))
        .route("/next-round", post(next_round))
        .route("/end", post(end))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOnly {
    room_id: String,
}

async fn init(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    truth::initialize(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectAnswererRequest {
    room_id: String,
    answerer: Option<String>,
}

async fn select_answerer(State(state): State<AppState>, Json(req): Json<SelectAnswererRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let answerer = req.answerer.map(|a| a.as_str().into());
    truth::select_answerer(&state.ctx, &room_id, answerer).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuestionRequest {
    room_id: String,
    device_id: String,
    text: String,
}

async fn submit_question(State(state): State<AppState>, Json(req): Json<SubmitQuestionRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    truth::submit_question(&state.ctx, &room_id, &device_id, req.text).await?;
    Ok(ApiResponse::ok(()))
}

async fn finish_question_submission(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    truth::finish_question_submission(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}

async fn select_random_question(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<SubmittedQuestion> {
    let room_id: RoomId = req.room_id.as_str().into();
    let question = truth::select_random_question(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(question))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmQuestionRequest {
    room_id: String,
    text: String,
}

async fn confirm_question(State(state): State<AppState>, Json(req): Json<ConfirmQuestionRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    truth::confirm_question(&state.ctx, &room_id, &req.text).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleVoteRequest {
    room_id: String,
    device_id: String,
    index: usize,
}

async fn toggle_question_vote(State(state): State<AppState>, Json(req): Json<ToggleVoteRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    truth::toggle_question_vote(&state.ctx, &room_id, &device_id, req.index).await?;
    Ok(ApiResponse::ok(()))
}

async fn finish_question_vote(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    truth::finish_question_vote(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceSampleRequest {
    room_id: String,
    device_id: String,
    sample: FaceTrackingSample,
}

async fn submit_face_sample(State(state): State<AppState>, Json(req): Json<FaceSampleRequest>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    let device_id = req.device_id.as_str().into();
    truth::submit_face_sample(&state.ctx, &room_id, &device_id, req.sample).await?;
    Ok(ApiResponse::ok(()))
}

async fn finish_answering(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<Analysis> {
    let room_id: RoomId = req.room_id.as_str().into();
    let analysis = truth::finish_answering(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(analysis))
}

async fn next_round(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    truth::start_next_round(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}

async fn end(State(state): State<AppState>, Json(req): Json<RoomOnly>) -> ApiResult<()> {
    let room_id: RoomId = req.room_id.as_str().into();
    truth::end_game(&state.ctx, &room_id).await?;
    Ok(ApiResponse::ok(()))
}
