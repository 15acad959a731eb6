//! Host assembly. Wires the profile store, navigator, onboarding wizard and
//! document import screen into one axum router.

use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::error::Result;
use crate::ingestion::routes::DOCUMENTS_ORIGIN;
use crate::ingestion::{
    IngestionPipeline, IngestionRouteState, IngestionSnapshot, SnapshotSource, ingestion_routes,
};
use crate::navigation::{HostNavigator, Navigator};
use crate::onboarding::manager::INGESTION_ORIGIN;
use crate::onboarding::{InviteResolver, OnboardingManager, OnboardingRouteState, onboarding_routes};
use crate::profile::ProfileStore;
use crate::store::KeyValueStore;

/// Shared ingestion broadcast capacity.
const INGESTION_EVENT_CAPACITY: usize = 256;

/// Everything the host keeps alive for the lifetime of the process.
#[derive(Clone)]
pub struct AppContext {
    pub profile: Arc<ProfileStore>,
    pub navigator: Arc<HostNavigator>,
    pub onboarding: Arc<OnboardingManager>,
    pub documents: Arc<Mutex<IngestionPipeline>>,
    pub ingestion_events: broadcast::Sender<IngestionSnapshot>,
}

impl AppContext {
    /// Load the profile from `backend` and build the host components.
    pub async fn new(
        config: &AppConfig,
        backend: Arc<dyn KeyValueStore>,
        invites: Arc<dyn InviteResolver>,
    ) -> Result<Self> {
        let profile = Arc::new(ProfileStore::load(backend).await?);
        let navigator = Arc::new(HostNavigator::new(profile.subscribe()));
        let (ingestion_events, _rx) = broadcast::channel(INGESTION_EVENT_CAPACITY);

        let wizard_pipeline = IngestionPipeline::new(INGESTION_ORIGIN, config.ingestion.clone())
            .with_events(ingestion_events.clone());
        let onboarding = Arc::new(OnboardingManager::with_pipeline(
            Arc::clone(&profile),
            invites,
            Arc::clone(&navigator) as Arc<dyn Navigator>,
            wizard_pipeline,
        ));

        let documents = IngestionPipeline::new(DOCUMENTS_ORIGIN, config.ingestion.clone())
            .with_events(ingestion_events.clone());

        info!(location = %navigator.location(), "Host ready");

        Ok(Self {
            profile,
            navigator,
            onboarding,
            documents: Arc::new(Mutex::new(documents)),
            ingestion_events,
        })
    }

    /// Build the full router.
    pub fn router(&self) -> Router {
        let host = Router::new()
            .route("/health", get(health))
            .route("/api/navigate", get(navigate))
            .route("/api/profile", get(get_profile))
            .route("/api/profile/reset", post(reset_profile))
            .with_state(self.clone());

        host.merge(onboarding_routes(OnboardingRouteState {
            manager: Arc::clone(&self.onboarding),
        }))
        .merge(ingestion_routes(IngestionRouteState {
            pipeline: Arc::clone(&self.documents),
            events: self.ingestion_events.clone(),
            peers: vec![Arc::clone(&self.onboarding) as Arc<dyn SnapshotSource>],
        }))
        .layer(CorsLayer::permissive())
    }
}

#[derive(Debug, Deserialize)]
struct NavigateQuery {
    path: String,
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "case-companion"
    }))
}

/// GET /api/navigate?path=/timeline
///
/// Applies the onboarding guard and returns where the user lands.
async fn navigate(State(ctx): State<AppContext>, Query(q): Query<NavigateQuery>) -> impl IntoResponse {
    let location = ctx.navigator.navigate(&q.path);
    Json(serde_json::json!({
        "requested": q.path,
        "location": location,
    }))
}

/// GET /api/profile
async fn get_profile(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.profile.read().await)
}

/// POST /api/profile/reset
///
/// Clears the profile, restarts the wizard and re-applies the guard.
async fn reset_profile(State(ctx): State<AppContext>) -> Response {
    match ctx.profile.reset().await {
        Ok(profile) => {
            ctx.onboarding.restart();
            let current = ctx.navigator.location();
            ctx.navigator.redirect(&current);
            Json(profile).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::onboarding::LocalInviteResolver;
    use crate::store::MemoryStore;

    async fn context() -> AppContext {
        AppContext::new(
            &AppConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(LocalInviteResolver::demo()),
        )
        .await
        .unwrap()
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let ctx = context().await;
        let (status, json) = call(ctx.router(), "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn navigation_is_guarded_until_onboarded() {
        let ctx = context().await;
        let (_, json) = call(ctx.router(), "GET", "/api/navigate?path=/timeline").await;
        assert_eq!(json["location"], "/onboarding");

        ctx.profile.mark_onboarded().await.unwrap();
        let (_, json) = call(ctx.router(), "GET", "/api/navigate?path=/timeline").await;
        assert_eq!(json["location"], "/timeline");
        let (_, json) = call(ctx.router(), "GET", "/api/navigate?path=/onboarding").await;
        assert_eq!(json["location"], "/");
    }

    #[tokio::test]
    async fn reset_sends_user_back_to_onboarding() {
        let ctx = context().await;
        ctx.profile.mark_onboarded().await.unwrap();
        ctx.navigator.navigate("/journal");

        let (status, json) = call(ctx.router(), "POST", "/api/profile/reset").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["isOnboarded"], false);
        assert_eq!(json["holderName"], "");
        assert_eq!(ctx.navigator.location(), "/onboarding");
    }

    #[tokio::test]
    async fn import_status_is_404_before_any_upload() {
        let ctx = context().await;
        let (status, _) = call(ctx.router(), "GET", "/api/documents/import").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn profile_endpoint_returns_seed() {
        let ctx = context().await;
        let (status, json) = call(ctx.router(), "GET", "/api/profile").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["subjectFacility"], "Corcoran State Prison");
        assert_eq!(json["isOnboarded"], false);
    }
}
