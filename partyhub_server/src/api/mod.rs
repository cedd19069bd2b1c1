//! HTTP/SSE surface for the party-game backend.
//!
//! Thin adapter: every handler here parses a request, calls straight into
//! `partyhub_core`, and serializes the result. No game logic lives in this
//! crate (spec.md §6).
//!
//! # Modules
//!
//! - [`games`]: per-game action routes (`/games/{game}/...`)
//! - [`rooms`]: room lifecycle, game start, reactions
//! - [`teams`]: team assignment
//! - [`sse`]: host/player event streams
//! - [`request_id`]: request correlation middleware
//!
//! # Endpoints
//!
//! ```text
//! POST /rooms                          - create a room
//! POST /rooms/join                     - join a room
//! GET  /rooms/{room_id}                - read room info
//! POST /games/start                    - start a game
//! POST /games/reaction                 - relay a reaction to the host
//! POST /teams/random                   - host-assigned random teams
//! POST /teams/select                   - player opt-in team selection
//! POST /teams/reset                    - clear team assignment
//! GET  /teams/status/{room_id}         - read roster team tags
//! GET  /sse/connect                    - host event stream
//! GET  /sse/player/connect             - player event stream
//! GET  /games/marble/...               - Marble action routes
//! GET  /games/mafia/...                - Mafia action routes
//! GET  /games/liar/...                 - Liar action routes
//! GET  /games/quiz/...                 - Quiz action routes
//! GET  /games/truth/...                - Truth action routes
//! GET  /health                         - health check
//! ```

pub mod games;
pub mod request_id;
pub mod rooms;
pub mod sse;
pub mod teams;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use partyhub_core::{CoreError, GameContext};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;

/// Shared application state: every handler operates over the same
/// `GameContext` bundle the core's game modules take (spec.md §6 — the
/// server has no state of its own beyond routing).
#[derive(Clone)]
pub struct AppState {
    pub ctx: GameContext,
    pub config: std::sync::Arc<ServerConfig>,
}

/// The `{success, data, error}` envelope every endpoint responds with
/// (spec.md §6).
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self { success: true, data: Some(data), error: None })
    }
}

/// Wraps `CoreError` for the HTTP mapping spec.md §7 specifies:
/// `invalidArgument`/`unauthorized` → 400, `notFound` → 404, `conflict` →
/// 409, `invalidState` → 409.
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0.kind() {
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            "invalid_state" => StatusCode::CONFLICT,
            "unauthorized" | "invalid_argument" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body: ApiResponse<Value> = ApiResponse { success: false, data: None, error: Some(self.0.to_string()) };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/rooms", post(rooms::create_room))
        .route("/rooms/join", post(rooms::join_room))
        .route("/rooms/{room_id}", get(rooms::get_room))
        .route("/games/start", post(rooms::start_game))
        .route("/games/reaction", post(rooms::reaction))
        .route("/teams/random", post(teams::assign_random))
        .route("/teams/select", post(teams::select_team))
        .route("/teams/reset", post(teams::reset_teams))
        .route("/teams/status/{room_id}", get(teams::team_status))
        .route("/sse/connect", get(sse::connect_host))
        .route("/sse/player/connect", get(sse::connect_player))
        .nest("/games/marble", games::marble::router())
        .nest("/games/mafia", games::mafia::router())
        .nest("/games/liar", games::liar::router())
        .nest("/games/quiz", games::quiz::router())
        .nest("/games/truth", games::truth::router())
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") }))
}
