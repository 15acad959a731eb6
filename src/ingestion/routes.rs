//! Standalone document import endpoints and the live ingestion WebSocket.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::pipeline::IngestionPipeline;
use super::types::{ArchiveInput, IngestionSnapshot};

/// Origin label on snapshots produced by the documents screen.
pub const DOCUMENTS_ORIGIN: &str = "documents";

/// Anything holding an ingestion run whose latest state a newly connected
/// stream client should see.
pub trait SnapshotSource: Send + Sync {
    fn current_snapshot(&self) -> Option<IngestionSnapshot>;
}

impl SnapshotSource for Mutex<IngestionPipeline> {
    fn current_snapshot(&self) -> Option<IngestionSnapshot> {
        lock_pipeline(self).snapshot()
    }
}

/// Shared state for the documents screen and the ingestion stream.
#[derive(Clone)]
pub struct IngestionRouteState {
    pub pipeline: Arc<Mutex<IngestionPipeline>>,
    /// Every pipeline in the host publishes here.
    pub events: broadcast::Sender<IngestionSnapshot>,
    /// Other publishers on `events`, replayed to clients on connect.
    pub peers: Vec<Arc<dyn SnapshotSource>>,
}

impl IngestionRouteState {
    fn pipeline(&self) -> MutexGuard<'_, IngestionPipeline> {
        lock_pipeline(&self.pipeline)
    }

    /// Latest snapshot of every run the stream carries.
    fn current_snapshots(&self) -> Vec<IngestionSnapshot> {
        std::iter::once(self.pipeline.current_snapshot())
            .chain(self.peers.iter().map(|peer| peer.current_snapshot()))
            .flatten()
            .collect()
    }
}

fn lock_pipeline(pipeline: &Mutex<IngestionPipeline>) -> MutexGuard<'_, IngestionPipeline> {
    pipeline
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Messages pushed to ingestion WebSocket clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngestionWsMessage {
    /// Latest state of one run.
    Snapshot { snapshot: IngestionSnapshot },
    /// The client fell behind and missed this many snapshots.
    Lagged { missed: u64 },
}

/// Body of GET /api/documents/import.
#[derive(Debug, Serialize)]
struct ImportStatus {
    #[serde(flatten)]
    snapshot: IngestionSnapshot,
    /// Status line for the upload card.
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
}

/// Build the document import + ingestion stream routes.
pub fn ingestion_routes(state: IngestionRouteState) -> Router {
    Router::new()
        .route("/api/documents/import", post(start_import).get(import_status))
        .route("/ws/ingestion", get(ws_handler))
        .with_state(state)
}

// ── REST ────────────────────────────────────────────────────────────────

/// POST /api/documents/import
async fn start_import(
    State(state): State<IngestionRouteState>,
    Json(input): Json<ArchiveInput>,
) -> Response {
    let result = state.pipeline().start(input, |report| {
        info!(
            run_id = %report.run_id,
            file = %report.file_name,
            documents = report.documents_processed,
            "Document import finished"
        );
    });
    match result {
        Ok(rx) => {
            let snapshot = rx.borrow().clone();
            (StatusCode::ACCEPTED, Json(snapshot)).into_response()
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": e.to_string(),
                "hint": "Please upload a .zip file containing your case documents."
            })),
        )
            .into_response(),
    }
}

/// GET /api/documents/import
async fn import_status(State(state): State<IngestionRouteState>) -> Response {
    match state.pipeline().snapshot() {
        Some(snapshot) => Json(ImportStatus {
            status: snapshot.phase.status_text(),
            snapshot,
        })
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "No import has been started"})),
        )
            .into_response(),
    }
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<IngestionRouteState>) -> impl IntoResponse {
    debug!("Ingestion WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn send_json(socket: &mut WebSocket, msg: &IngestionWsMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize ingestion message");
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, state: IngestionRouteState) {
    // Subscribe before the initial sync so nothing published in between is lost.
    let mut rx = state.events.subscribe();

    let current = state.current_snapshots();
    for snapshot in current {
        if !send_json(&mut socket, &IngestionWsMessage::Snapshot { snapshot }).await {
            return;
        }
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(snapshot) => {
                        if !send_json(&mut socket, &IngestionWsMessage::Snapshot { snapshot }).await {
                            debug!("Client disconnected during send");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Ingestion WS client lagged behind broadcast");
                        if !send_json(&mut socket, &IngestionWsMessage::Lagged { missed }).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(error = %e, "Ingestion WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    debug!("Ingestion WebSocket closed");
}
