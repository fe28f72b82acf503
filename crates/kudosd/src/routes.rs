//! API routes for kudosd

use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use kudos_common::progression::Title;
use kudos_common::{
    LevelProgress, MessageEvent, RewardError, RoundContext, RoundId, RoundXpSummary, VERSION,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Error body for every non-2xx answer
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn reject(err: RewardError) -> ApiError {
    let status = StatusCode::from_u16(err.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Reward Routes
// ============================================================================

pub fn reward_routes() -> Router<SharedState> {
    Router::new().route(
        "/v1/rounds/:round_id/reward",
        post(start_reward).get(reward_status),
    )
}

/// Progression inputs sent along with a trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionInput {
    #[serde(default)]
    pub messages: Vec<MessageEvent>,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub xp_before: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartRewardRequest {
    pub context: RoundContext,
    /// When present, XP is computed now and persisted with the reward
    #[serde(default)]
    pub progression: Option<ProgressionInput>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartRewardResponse {
    pub round_id: RoundId,
    pub accepted: bool,
    pub status_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<RoundXpSummary>,
}

async fn start_reward(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
    Json(req): Json<StartRewardRequest>,
) -> Result<(StatusCode, Json<StartRewardResponse>), ApiError> {
    let round_id = RoundId::parse(&raw_id).map_err(reject)?;
    let won = req.context.won;

    let handle = state
        .orchestrator
        .start(round_id.clone(), req.context)
        .await
        .map_err(|e| {
            warn!("  Rejected reward start for {}: {}", raw_id, e);
            reject(e)
        })?;

    let xp = req.progression.map(|input| {
        state
            .xp_engine
            .compute_round_xp(&input.messages, won, input.current_streak, input.xp_before)
    });

    if let (Some(summary), Some(applier)) = (xp.clone(), state.applier.clone()) {
        tokio::spawn(async move {
            if let Err(e) = applier.apply_when_ready(summary, handle).await {
                error!("  Failed to persist progression: {}", e);
            }
        });
    }

    info!("  Reward started for {}", round_id);
    Ok((
        StatusCode::ACCEPTED,
        Json(StartRewardResponse {
            status_url: format!("/v1/rounds/{}/reward", round_id),
            round_id,
            accepted: true,
            xp,
        }),
    ))
}

/// Unknown rounds are an explicit answer, not a failure
#[derive(Debug, Serialize, Deserialize)]
pub struct UnknownRound {
    pub round_id: String,
    pub status: String,
}

async fn reward_status(State(state): State<SharedState>, Path(raw_id): Path<String>) -> Response {
    let round_id = match RoundId::parse(&raw_id) {
        Ok(id) => id,
        Err(e) => return reject(e).into_response(),
    };

    match state.registry().get(&round_id).await {
        Ok(status) => Json(status).into_response(),
        Err(RewardError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(UnknownRound {
                round_id: raw_id,
                status: "unknown".to_string(),
            }),
        )
            .into_response(),
        Err(e) => reject(e).into_response(),
    }
}

// ============================================================================
// Progression Routes
// ============================================================================

pub fn progression_routes() -> Router<SharedState> {
    Router::new()
        .route("/v1/xp/compute", post(compute_xp))
        .route("/v1/levels/:xp", get(level_for_xp))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComputeXpRequest {
    #[serde(default)]
    pub messages: Vec<MessageEvent>,
    pub won: bool,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub xp_before: i64,
}

async fn compute_xp(
    State(state): State<SharedState>,
    Json(req): Json<ComputeXpRequest>,
) -> Json<RoundXpSummary> {
    Json(
        state
            .xp_engine
            .compute_round_xp(&req.messages, req.won, req.current_streak, req.xp_before),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LevelResponse {
    #[serde(flatten)]
    pub progress: LevelProgress,
    pub title: Title,
}

async fn level_for_xp(State(state): State<SharedState>, Path(xp): Path<u64>) -> Json<LevelResponse> {
    let progress = state.xp_engine.level_for_xp(xp);
    let title = progress.title();
    Json(LevelResponse { progress, title })
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<SharedState> {
    Router::new().route("/v1/health", get(health))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub version: String,
    pub uptime_secs: u64,
    pub rounds_tracked: usize,
}

async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        version: VERSION.to_string(),
        uptime_secs: state.uptime_secs(),
        rounds_tracked: state.registry().len().await,
    })
}
