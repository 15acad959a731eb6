//! REST endpoints that drive the onboarding wizard.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use super::manager::OnboardingManager;
use super::state::{OnboardingMode, OnboardingStep};
use crate::error::OnboardingError;
use crate::ingestion::ArchiveInput;
use crate::profile::ProfileUpdate;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub manager: Arc<OnboardingManager>,
}

#[derive(Debug, Deserialize)]
struct ModeRequest {
    mode: OnboardingMode,
}

#[derive(Debug, Deserialize)]
struct InviteRequest {
    code: String,
}

/// Map a wizard error to an HTTP response.
pub(crate) fn error_response(err: OnboardingError) -> Response {
    let status = match &err {
        OnboardingError::InvalidInviteCode { .. } | OnboardingError::Ingestion(_) => {
            StatusCode::BAD_REQUEST
        }
        OnboardingError::InvalidTransition { .. } | OnboardingError::FieldsNotEditable { .. } => {
            StatusCode::CONFLICT
        }
        OnboardingError::InviteResolutionFailed { .. } => StatusCode::NOT_FOUND,
        OnboardingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({"error": err.to_string()}))).into_response()
}

/// Respond with the full wizard status after a successful step change.
async fn step_response(
    state: &OnboardingRouteState,
    result: Result<OnboardingStep, OnboardingError>,
) -> Response {
    match result {
        Ok(_) => Json(state.manager.status().await).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/onboarding/status
async fn get_status(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.manager.status().await)
}

/// POST /api/onboarding/next
async fn post_next(State(state): State<OnboardingRouteState>) -> Response {
    let result = state.manager.next().await;
    step_response(&state, result).await
}

/// POST /api/onboarding/back
async fn post_back(State(state): State<OnboardingRouteState>) -> Response {
    let result = state.manager.back().await;
    step_response(&state, result).await
}

/// POST /api/onboarding/mode
async fn post_mode(
    State(state): State<OnboardingRouteState>,
    Json(req): Json<ModeRequest>,
) -> Response {
    let result = state.manager.choose_mode(req.mode).await;
    step_response(&state, result).await
}

/// POST /api/onboarding/identity
async fn post_identity(
    State(state): State<OnboardingRouteState>,
    Json(update): Json<ProfileUpdate>,
) -> Response {
    match state.manager.update_identity(update).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/onboarding/subject
async fn post_subject(
    State(state): State<OnboardingRouteState>,
    Json(update): Json<ProfileUpdate>,
) -> Response {
    match state.manager.update_subject(update).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/onboarding/invite
async fn post_invite(
    State(state): State<OnboardingRouteState>,
    Json(req): Json<InviteRequest>,
) -> Response {
    let result = state.manager.submit_invite(&req.code).await;
    step_response(&state, result).await
}

/// POST /api/onboarding/upload
///
/// Starts the archive import; progress is observable via the status endpoint
/// and the ingestion WebSocket.
async fn post_upload(
    State(state): State<OnboardingRouteState>,
    Json(input): Json<ArchiveInput>,
) -> Response {
    match state.manager.upload_archive(input) {
        Ok(rx) => {
            let snapshot = rx.borrow().clone();
            (StatusCode::ACCEPTED, Json(snapshot)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /api/onboarding/skip
async fn post_skip(State(state): State<OnboardingRouteState>) -> Response {
    let result = state.manager.skip_ingestion().await;
    step_response(&state, result).await
}

/// POST /api/onboarding/finish
async fn post_finish(State(state): State<OnboardingRouteState>) -> Response {
    let result = state.manager.finish().await;
    step_response(&state, result).await
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding/status", get(get_status))
        .route("/api/onboarding/next", post(post_next))
        .route("/api/onboarding/back", post(post_back))
        .route("/api/onboarding/mode", post(post_mode))
        .route("/api/onboarding/identity", post(post_identity))
        .route("/api/onboarding/subject", post(post_subject))
        .route("/api/onboarding/invite", post(post_invite))
        .route("/api/onboarding/upload", post(post_upload))
        .route("/api/onboarding/skip", post(post_skip))
        .route("/api/onboarding/finish", post(post_finish))
        .with_state(state)
}
