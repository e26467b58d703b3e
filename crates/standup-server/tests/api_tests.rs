// End-to-end tests for the HTTP API, driven through the router with
// `tower::ServiceExt::oneshot` so no socket is bound.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use standup_core::config::Provider;
use standup_core::standup::Classification;
use standup_core::store::StandupStore;
use standup_llm::client::OllamaClient;
use standup_llm::pipeline::{Classifier, MockTranscriber, StandupPipeline, TextDiarizer};
use standup_server::routes::{build_app, AppState};

const MAX_UPLOAD: usize = 1024 * 1024;

/// Ollama client on a closed local port so probes fail fast.
fn unreachable_ollama() -> OllamaClient {
    OllamaClient::new("http://127.0.0.1:9", "llama3", 0.2, Duration::from_secs(2)).unwrap()
}

fn app_with(store: StandupStore, pipeline: StandupPipeline) -> Router {
    build_app(AppState::new(store, pipeline, unreachable_ollama()), MAX_UPLOAD)
}

fn seeded_app() -> Router {
    app_with(StandupStore::seeded(), StandupPipeline::mock())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_json(app: &Router, body: Value) -> (StatusCode, Value) {
    let request = Request::post("/api/process-standup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn multipart_request(fields: &[(&str, &str)], audio: Option<&[u8]>) -> Request<Body> {
    let boundary = "standup-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(audio) = audio {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"standup.webm\"\r\nContent-Type: audio/webm\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(audio);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Request::post("/api/process-standup")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

struct FailingClassifier;

#[async_trait]
impl Classifier for FailingClassifier {
    async fn classify(&self, _text: &str) -> Result<Classification> {
        Err(anyhow!("model offline"))
    }
}

// ---------------------------------------------------------------------------
// Teams and history
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lists_seeded_teams() {
    let app = seeded_app();
    let (status, body) = get_json(&app, "/api/teams").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 4);
    assert_eq!(
        body[0],
        json!({ "name": "Development", "path": "development", "meetingCount": 1 })
    );
    assert_eq!(body[1]["name"], "Qa Automation");
}

#[tokio::test]
async fn history_of_unknown_team_is_empty() {
    let app = seeded_app();
    let (status, body) = get_json(&app, "/api/teams/marketing/history").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn seeded_standup_is_retrievable() {
    let app = seeded_app();
    let (status, body) = get_json(&app, "/api/standups/dev-20250612").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["team"], "Development");
    assert_eq!(body["isToday"], true);
    assert_eq!(body["summary"][1]["speaker"], "Bob Chen");
    assert!(body["summary"][0]["rawContent"]
        .as_str()
        .unwrap()
        .starts_with("Yesterday I finished"));
}

#[tokio::test]
async fn missing_standup_is_404() {
    let app = seeded_app();
    let (status, body) = get_json(&app, "/api/standups/nope-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Standup not found" }));
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[tokio::test]
async fn export_returns_csv_attachment() {
    let app = seeded_app();
    let request = Request::get("/api/standups/dev-20250612/export")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Development_standup_summary_12-06-2025.csv\""
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "Speaker,Time,Yesterday,Today,Blockers");
    assert!(!csv.ends_with('\n'));
    assert!(lines[1].starts_with(r#""Alice Johnson","09:00-09:03","#));
}

#[tokio::test]
async fn export_of_missing_standup_is_404() {
    let app = seeded_app();
    let request = Request::get("/api/standups/nope-1/export")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submission_without_team_is_400() {
    let app = seeded_app();
    let (status, body) = post_json(&app, json!({ "transcript": "Alice: hi" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Team is required");
}

#[tokio::test]
async fn submission_without_input_is_400() {
    let app = seeded_app();
    let (status, body) = post_json(&app, json!({ "team": "ui" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No audio file or transcript provided");
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let app = seeded_app();
    let request = Request::post("/api/process-standup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, bytes) = send(&app, request).await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
async fn unrecognised_content_type_counts_as_empty_submission() {
    let app = seeded_app();
    let request = Request::post("/api/process-standup")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("team=ui&transcript=hello"))
        .unwrap();
    let (status, bytes) = send(&app, request).await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Team is required" }));
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let app = build_app(
        AppState::new(StandupStore::seeded(), StandupPipeline::mock(), unreachable_ollama()),
        256,
    );
    let audio = vec![b'x'; 4096];
    let (status, bytes) = send(&app, multipart_request(&[("team", "ui")], Some(&audio))).await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn transcript_submission_is_summarized_and_stored() {
    let app = seeded_app();
    let transcript = "Dana: Yesterday I fixed the deploy script. Today I will write docs.\n\
                      Eli: Finished the review. Blocked on VPN access.";
    let (status, standup) = post_json(&app, json!({ "team": "ui", "transcript": transcript })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(standup["team"], "Ui");
    assert!(standup["id"].as_str().unwrap().starts_with("ui-"));
    assert!(standup.get("isToday").is_none());

    let summary = standup["summary"].as_array().unwrap();
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0]["speaker"], "Dana");
    assert_eq!(summary[0]["initial"], "D");
    assert_eq!(summary[0]["blockers"], "None");
    assert_eq!(summary[1]["blockers"], "Blocked on VPN access.");

    let (_, history) = get_json(&app, "/api/teams/ui/history").await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["id"], standup["id"]);

    let id = standup["id"].as_str().unwrap();
    let (status, found) = get_json(&app, &format!("/api/standups/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found, standup);
}

#[tokio::test]
async fn submission_for_new_team_creates_bucket() {
    let app = seeded_app();
    let (status, _) = post_json(
        &app,
        json!({ "team": "platform", "transcript": "Yesterday I paired on the cache." }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, teams) = get_json(&app, "/api/teams").await;
    let teams = teams.as_array().unwrap();
    assert_eq!(teams.len(), 5);
    assert_eq!(
        teams[4],
        json!({ "name": "Platform", "path": "platform", "meetingCount": 1 })
    );
}

#[tokio::test]
async fn newest_standup_comes_first() {
    let app = seeded_app();
    let (_, standup) = post_json(
        &app,
        json!({ "team": "development", "transcript": "Today I will plan the sprint." }),
    )
    .await;

    let (_, history) = get_json(&app, "/api/teams/development/history").await;
    assert_eq!(history.as_array().unwrap().len(), 2);
    assert_eq!(history[0]["id"], standup["id"]);
    assert_eq!(history[1]["id"], "dev-20250612");
}

#[tokio::test]
async fn form_encoded_submission_is_accepted() {
    let app = seeded_app();
    let request = Request::post("/api/process-standup")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("team=devops&transcript=Today+I+will+rotate+the+keys."))
        .unwrap();
    let (status, bytes) = send(&app, request).await;
    let standup: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(standup["team"], "Devops");
}

#[tokio::test]
async fn audio_upload_runs_mock_pipeline() {
    let app = seeded_app();
    let (status, bytes) = send(&app, multipart_request(&[("team", "qa-automation")], Some(b"fake audio"))).await;
    let standup: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(standup["team"], "Qa-automation");
    let summary = standup["summary"].as_array().unwrap();
    assert_eq!(summary.len(), 3);
    assert_eq!(summary[0]["speaker"], "Alice");
    assert_eq!(summary[2]["speaker"], "Carol");
}

#[tokio::test]
async fn multipart_transcript_without_audio_is_accepted() {
    let app = seeded_app();
    let request = multipart_request(
        &[("team", "ui"), ("transcript", "Dana: Today I will write docs.\nEli: Finished the review.")],
        None,
    );
    let (status, bytes) = send(&app, request).await;
    let standup: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(standup["summary"][0]["speaker"], "Dana");
    assert_eq!(standup["summary"][1]["speaker"], "Eli");
}

#[tokio::test]
async fn multipart_audio_wins_over_transcript() {
    let app = seeded_app();
    let request = multipart_request(
        &[("team", "ui"), ("transcript", "Dana: ignored\nEli: ignored")],
        Some(b"fake audio"),
    );
    let (status, bytes) = send(&app, request).await;
    let standup: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(status, StatusCode::OK);
    let speakers: Vec<&str> = standup["summary"]
        .as_array()
        .unwrap()
        .iter()
        .map(|turn| turn["speaker"].as_str().unwrap())
        .collect();
    assert_eq!(speakers, vec!["Alice", "Bob", "Carol"]);
}

#[tokio::test]
async fn export_file_name_is_header_safe_for_odd_team_keys() {
    let app = seeded_app();
    let (status, standup) = post_json(
        &app,
        json!({ "team": "ops\nteam \"x\"", "transcript": "Today I will tidy the runbooks." }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let id = standup["id"]
        .as_str()
        .unwrap()
        .replace('\n', "%0A")
        .replace('"', "%22")
        .replace(' ', "%20");
    let request = Request::get(format!("/api/standups/{id}/export"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"Ops_team _x__standup_summary_"));
}

#[tokio::test]
async fn pipeline_failure_is_500_with_details() {
    let pipeline = StandupPipeline::new(
        Provider::Mock,
        Box::new(MockTranscriber),
        Box::new(TextDiarizer),
        Box::new(FailingClassifier),
    );
    let app = app_with(StandupStore::seeded(), pipeline);

    let (status, body) = post_json(&app, json!({ "team": "ui", "transcript": "Alice: hi\nBob: hey" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to process standup");
    assert!(body["details"].as_str().unwrap().contains("model offline"));

    let (_, history) = get_json(&app, "/api/teams/ui/history").await;
    assert_eq!(history, json!([]));
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_provider_and_counts() {
    let app = seeded_app();
    let (status, body) = get_json(&app, "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["provider"], "mock");
    assert_eq!(body["teams"], 4);
    assert_eq!(body["standups"], 1);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn ollama_health_is_503_when_unreachable() {
    let app = seeded_app();
    let (status, body) = get_json(&app, "/api/health/ollama").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");
    assert_eq!(body["url"], "http://127.0.0.1:9");
    assert!(body["error"].is_string());
}
