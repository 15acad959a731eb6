//! Integration tests for the onboarding host.
//!
//! Each test spins up the full router on a random port with a JSON-file
//! profile store in a temp dir, then drives it over HTTP and WebSocket.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use case_companion::app::AppContext;
use case_companion::config::{AppConfig, IngestionConfig};
use case_companion::onboarding::LocalInviteResolver;
use case_companion::store::JsonFileStore;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

struct Host {
    base: String,
    port: u16,
    ctx: AppContext,
    client: reqwest::Client,
}

fn fast_timing() -> IngestionConfig {
    IngestionConfig {
        first_stage_delay: Duration::from_millis(10),
        stage_interval: Duration::from_millis(10),
    }
}

/// Start the host on a random port backed by the store in `dir`.
async fn start_host(dir: &TempDir) -> Host {
    start_host_with(dir, fast_timing()).await
}

async fn start_host_with(dir: &TempDir, ingestion: IngestionConfig) -> Host {
    let config = AppConfig {
        data_dir: dir.path().to_path_buf(),
        port: 0,
        ingestion,
    };
    let backend = JsonFileStore::open(config.profile_store_path()).await.unwrap();
    let ctx = AppContext::new(
        &config,
        Arc::new(backend),
        Arc::new(LocalInviteResolver::demo()),
    )
    .await
    .unwrap();
    let app = ctx.router();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    Host {
        base: format!("http://127.0.0.1:{port}"),
        port,
        ctx,
        client: reqwest::Client::new(),
    }
}

impl Host {
    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}{path}", self.base))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn post_empty(&self, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}{path}", self.base))
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(format!("{}{path}", self.base))
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn step(&self) -> String {
        let (_, status) = self.get("/api/onboarding/status").await;
        status["step"]["step"].as_str().unwrap().to_string()
    }
}

/// Parse a WS text frame into a serde_json::Value.
fn parse_ws_json(msg: &Message) -> Value {
    match msg {
        Message::Text(txt) => serde_json::from_str(txt).expect("invalid JSON from server"),
        other => panic!("expected Text frame, got {:?}", other),
    }
}

// ── Create branch ────────────────────────────────────────────────────

#[tokio::test]
async fn create_case_skipping_import_completes_onboarding() {
    timeout(TEST_TIMEOUT, async {
        let dir = TempDir::new().unwrap();
        let host = start_host(&dir).await;

        let (status, json) = host.get("/api/onboarding/status").await;
        assert_eq!(status, 200);
        assert_eq!(json["onboarding_completed"], false);
        assert_eq!(json["step"]["step"], "identity");
        assert_eq!(json["progress"], 1);
        assert!(
            json["relationship_options"]
                .as_array()
                .unwrap()
                .iter()
                .any(|r| r == "Mother/Guardian")
        );

        let (status, profile) = host
            .post(
                "/api/onboarding/identity",
                json!({"holderName": "Ana Lopez", "relationshipRole": "Sibling"}),
            )
            .await;
        assert_eq!(status, 200);
        assert_eq!(profile["holderName"], "Ana Lopez");

        host.post_empty("/api/onboarding/next").await;
        let (status, json) = host.post("/api/onboarding/mode", json!({"mode": "create"})).await;
        assert_eq!(status, 200);
        assert_eq!(json["step"]["step"], "subject_details");
        assert_eq!(json["mode"], "create");

        let (status, _) = host
            .post(
                "/api/onboarding/subject",
                json!({"subjectName": "Marco Lopez", "subjectId": "A-77", "subjectFacility": "Folsom"}),
            )
            .await;
        assert_eq!(status, 200);

        let (_, json) = host.post_empty("/api/onboarding/next").await;
        assert_eq!(json["step"]["step"], "ingestion");
        assert_eq!(json["progress"], 4);

        let (_, json) = host.post_empty("/api/onboarding/skip").await;
        assert_eq!(json["step"]["step"], "success");
        assert_eq!(json["step"]["mode"], "create");
        assert!(json["confirmation"].as_str().unwrap().contains("Marco Lopez"));

        let (status, json) = host.post_empty("/api/onboarding/finish").await;
        assert_eq!(status, 200);
        assert_eq!(json["onboarding_completed"], true);
        assert_eq!(host.ctx.navigator.location(), "/");

        let (_, profile) = host.get("/api/profile").await;
        assert_eq!(profile["isOnboarded"], true);
        assert_eq!(profile["subjectFacility"], "Folsom");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn upload_during_onboarding_advances_to_success() {
    timeout(TEST_TIMEOUT, async {
        let dir = TempDir::new().unwrap();
        let host = start_host(&dir).await;

        host.post_empty("/api/onboarding/next").await;
        host.post("/api/onboarding/mode", json!({"mode": "create"})).await;
        host.post_empty("/api/onboarding/next").await;

        let (status, json) = host
            .post(
                "/api/onboarding/upload",
                json!({"name": "notes.txt", "type": "text/plain", "size": 12}),
            )
            .await;
        assert_eq!(status, 400);
        assert!(json["error"].as_str().unwrap().contains("notes.txt"));
        assert_eq!(host.step().await, "ingestion");

        let (status, json) = host
            .post(
                "/api/onboarding/upload",
                json!({"name": "Case.ZIP", "type": "", "size": 1024}),
            )
            .await;
        assert_eq!(status, 202);
        assert_eq!(json["origin"], "onboarding");

        while host.step().await != "success" {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let (_, json) = host.get("/api/onboarding/status").await;
        assert_eq!(json["ingestion"]["phase"], "complete");
        assert_eq!(json["ingestion"]["percent"], 100);
        assert_eq!(json["ingestion_report"]["documents_processed"], 14);
    })
    .await
    .expect("test timed out");
}

// ── Join branch ──────────────────────────────────────────────────────

#[tokio::test]
async fn join_with_invite_code_applies_subject() {
    timeout(TEST_TIMEOUT, async {
        let dir = TempDir::new().unwrap();
        let host = start_host(&dir).await;

        host.post_empty("/api/onboarding/next").await;
        let (_, json) = host.post("/api/onboarding/mode", json!({"mode": "join"})).await;
        assert_eq!(json["step"]["step"], "invite_entry");

        let (status, _) = host.post("/api/onboarding/invite", json!({"code": "AB"})).await;
        assert_eq!(status, 400);
        assert_eq!(host.step().await, "invite_entry");

        let (status, json) = host.post("/api/onboarding/invite", json!({"code": "ABC-123"})).await;
        assert_eq!(status, 200);
        assert_eq!(json["step"]["step"], "success");
        assert_eq!(json["step"]["mode"], "join");
        assert_eq!(json["invite_code"], "ABC-123");
        assert_eq!(json["profile"]["subjectId"], "CDCR #T-12345");

        host.post_empty("/api/onboarding/finish").await;
        let (_, nav) = host.get("/api/navigate?path=/onboarding").await;
        assert_eq!(nav["location"], "/");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn out_of_order_events_are_conflicts() {
    timeout(TEST_TIMEOUT, async {
        let dir = TempDir::new().unwrap();
        let host = start_host(&dir).await;

        let (status, json) = host.post_empty("/api/onboarding/finish").await;
        assert_eq!(status, 409);
        assert!(json["error"].is_string());

        let (status, _) = host
            .post("/api/onboarding/subject", json!({"subjectName": "Nope"}))
            .await;
        assert_eq!(status, 409);
        assert_eq!(host.step().await, "identity");
    })
    .await
    .expect("test timed out");
}

// ── Guard + persistence ──────────────────────────────────────────────

#[tokio::test]
async fn guard_redirects_until_onboarded_and_survives_restart() {
    timeout(TEST_TIMEOUT, async {
        let dir = TempDir::new().unwrap();
        {
            let host = start_host(&dir).await;
            let (_, nav) = host.get("/api/navigate?path=/documents").await;
            assert_eq!(nav["location"], "/onboarding");

            host.post_empty("/api/onboarding/next").await;
            host.post("/api/onboarding/mode", json!({"mode": "join"})).await;
            host.post("/api/onboarding/invite", json!({"code": "XYZ"})).await;
            host.post_empty("/api/onboarding/finish").await;
        }

        let host = start_host(&dir).await;
        assert_eq!(host.ctx.navigator.location(), "/");
        let (_, nav) = host.get("/api/navigate?path=/documents").await;
        assert_eq!(nav["location"], "/documents");

        let (status, profile) = host.post_empty("/api/profile/reset").await;
        assert_eq!(status, 200);
        assert_eq!(profile["isOnboarded"], false);
        assert_eq!(host.ctx.navigator.location(), "/onboarding");
        assert_eq!(host.step().await, "identity");
    })
    .await
    .expect("test timed out");
}

// ── Document import + WebSocket ──────────────────────────────────────

#[tokio::test]
async fn ws_streams_document_import_to_completion() {
    timeout(TEST_TIMEOUT, async {
        let dir = TempDir::new().unwrap();
        let host = start_host(&dir).await;

        let (mut ws, _resp) = connect_async(format!("ws://127.0.0.1:{}/ws/ingestion", host.port))
            .await
            .expect("WS connect failed");
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (status, json) = host
            .post(
                "/api/documents/import",
                json!({"name": "records", "type": "application/x-zip-compressed", "size": 99}),
            )
            .await;
        assert_eq!(status, 202);
        assert_eq!(json["origin"], "documents");

        let mut last_percent = 0;
        loop {
            let msg = ws.next().await.unwrap().unwrap();
            let json = parse_ws_json(&msg);
            assert_eq!(json["type"], "snapshot");
            let percent = json["snapshot"]["percent"].as_u64().unwrap();
            assert!(percent >= last_percent);
            last_percent = percent;
            if json["snapshot"]["phase"] == "complete" {
                assert_eq!(percent, 100);
                assert_eq!(json["snapshot"]["log"].as_array().unwrap().len(), 6);
                break;
            }
        }

        let (status, json) = host.get("/api/documents/import").await;
        assert_eq!(status, 200);
        assert_eq!(json["phase"], "complete");
        assert_eq!(json["status"], "All files have been organized.");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_replays_onboarding_run_in_progress_on_connect() {
    timeout(TEST_TIMEOUT, async {
        let dir = TempDir::new().unwrap();
        let host = start_host_with(&dir, IngestionConfig::default()).await;

        host.post_empty("/api/onboarding/next").await;
        host.post("/api/onboarding/mode", json!({"mode": "create"})).await;
        host.post_empty("/api/onboarding/next").await;
        let (status, started) = host
            .post(
                "/api/onboarding/upload",
                json!({"name": "case.zip", "type": "application/zip", "size": 10}),
            )
            .await;
        assert_eq!(status, 202);

        let (mut ws, _resp) = connect_async(format!("ws://127.0.0.1:{}/ws/ingestion", host.port))
            .await
            .expect("WS connect failed");

        let msg = ws.next().await.unwrap().unwrap();
        let json = parse_ws_json(&msg);
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["snapshot"]["origin"], "onboarding");
        assert_eq!(json["snapshot"]["run_id"], started["run_id"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn document_import_rejects_non_archives() {
    timeout(TEST_TIMEOUT, async {
        let dir = TempDir::new().unwrap();
        let host = start_host(&dir).await;

        let (status, json) = host
            .post(
                "/api/documents/import",
                json!({"name": "scan.pdf", "type": "application/pdf", "size": 5}),
            )
            .await;
        assert_eq!(status, 400);
        assert!(json["hint"].as_str().unwrap().contains(".zip"));

        let (status, _) = host.get("/api/documents/import").await;
        assert_eq!(status, 404);
    })
    .await
    .expect("test timed out");
}
