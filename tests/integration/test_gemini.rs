//! Integration tests for the Gemini client against a local mock service.
//!
//! The mock records each request and replies with a scripted status and
//! body, so the tests can check both what goes over the wire and how replies
//! are classified.

use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use forge_client::{
    Attachment, ClientError, GeminiClient, GeneratedSite, ModelErrorKind, RequestOptions,
    SiteGenerator,
};
use forge_orchestrator::{ForgeError, ProjectStore, Studio};
use serde_json::{json, Value};

/// A request as seen by the mock.
#[derive(Debug, Clone)]
struct Recorded {
    model_action: String,
    api_key: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct Mock {
    reply: (StatusCode, String),
    requests: Arc<Mutex<Vec<Recorded>>>,
}

async fn handle(
    State(mock): State<Mock>,
    Path(model_action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    mock.requests.lock().unwrap().push(Recorded {
        model_action,
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
    (
        mock.reply.0,
        [(header::CONTENT_TYPE, "application/json")],
        mock.reply.1.clone(),
    )
}

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Spawns the mock and returns the base URL and the request log.
async fn spawn_mock(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Vec<Recorded>>>) {
    spawn_mock_raw(status, reply.to_string()).await
}

/// Spawns a mock that answers with `body` verbatim.
async fn spawn_mock_raw(status: StatusCode, body: String) -> (String, Arc<Mutex<Vec<Recorded>>>) {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let mock = Mock {
        reply: (status, body),
        requests: Arc::clone(&requests),
    };
    let router = Router::new()
        .route("/models/*model_action", post(handle))
        .with_state(mock);

    let addr = format!("127.0.0.1:{}", find_available_port());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Mock failed");
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{addr}/models"), requests)
}

/// Wraps `text` the way the service returns a candidate.
fn candidate(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    { "text": "Planning the layout", "thought": true },
                    { "text": text }
                ]
            }
        }]
    })
}

fn site_json() -> String {
    json!({
        "html": "<div>P</div>",
        "css": "",
        "js": "",
        "metadata": { "title": "Portfolio", "description": "d" }
    })
    .to_string()
}

fn client(base_url: &str) -> GeminiClient {
    GeminiClient::new("test-key", "test-model").with_base_url(base_url)
}

#[tokio::test]
async fn test_generate_sends_contract_and_parses_site() {
    let (base_url, requests) = spawn_mock(StatusCode::OK, candidate(&site_json())).await;

    let attachment = Attachment {
        name: "logo.png".to_string(),
        data: "iVBORw==".to_string(),
        mime_type: "image/png".to_string(),
    };
    let site = client(&base_url)
        .generate("a portfolio site", None, &[attachment])
        .await
        .unwrap();
    assert_eq!(site, GeneratedSite::new("<div>P</div>", "", "", "Portfolio", "d"));

    let recorded = requests.lock().unwrap()[0].clone();
    assert_eq!(recorded.model_action, "test-model:generateContent");
    assert_eq!(recorded.api_key.as_deref(), Some("test-key"));

    let parts = recorded.body["contents"][0]["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0]["text"], "a portfolio site");
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
    assert_eq!(parts[1]["inlineData"]["data"], "iVBORw==");
    assert!(parts[2]["text"]
        .as_str()
        .unwrap()
        .starts_with("TASK: Create a new high-end project."));

    let config = &recorded.body["generationConfig"];
    assert_eq!(config["responseMimeType"], "application/json");
    assert_eq!(
        config["responseSchema"]["required"],
        json!(["html", "css", "js", "metadata"])
    );
    assert_eq!(config["thinkingConfig"]["thinkingBudget"], 32768);
    assert!(recorded.body["systemInstruction"]["parts"][0]["text"].is_string());
}

#[tokio::test]
async fn test_refinement_carries_current_site() {
    let (base_url, requests) = spawn_mock(StatusCode::OK, candidate(&site_json())).await;
    let prior = GeneratedSite::new("<main>Old</main>", "main{}", "init()", "Old", "o");

    client(&base_url)
        .with_options(RequestOptions {
            thinking_budget: None,
        })
        .generate("make it dark", Some(&prior), &[])
        .await
        .unwrap();

    let recorded = requests.lock().unwrap()[0].clone();
    let parts = recorded.body["contents"][0]["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 2);
    let framing = parts[1]["text"].as_str().unwrap();
    assert!(framing.contains("CURRENT HTML: <main>Old</main>"));
    assert!(framing.contains("CURRENT CSS: main{}"));
    assert!(framing.contains("CURRENT JS: init()"));
    assert!(framing.contains("REFINEMENT REQUEST: \"make it dark\""));
    assert!(recorded.body["generationConfig"].get("thinkingConfig").is_none());
}

#[tokio::test]
async fn test_fenced_reply_is_accepted() {
    let fenced = format!("```json\n{}\n```", site_json());
    let (base_url, _) = spawn_mock(StatusCode::OK, candidate(&fenced)).await;

    let site = client(&base_url).generate("a site", None, &[]).await.unwrap();
    assert_eq!(site.metadata.title, "Portfolio");
}

#[tokio::test]
async fn test_incomplete_reply_is_parse_error() {
    let reply = json!({ "html": "<div/>", "css": "" }).to_string();
    let (base_url, _) = spawn_mock(StatusCode::OK, candidate(&reply)).await;

    let err = client(&base_url).generate("a site", None, &[]).await.unwrap_err();
    assert!(err.is_parse_error());
    assert_eq!(
        err.user_message(),
        "Could not process the model's response. Please try again."
    );
}

#[tokio::test]
async fn test_non_json_envelope_is_parse_error_with_raw_body() {
    let body = "<html><body>upstream hiccup</body></html>".to_string();
    let (base_url, _) = spawn_mock_raw(StatusCode::OK, body.clone()).await;

    let err = client(&base_url).generate("a site", None, &[]).await.unwrap_err();
    assert!(err.is_parse_error());
    let ClientError::Parse { message, raw } = err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert!(message.contains("unexpected response envelope"));
    assert_eq!(raw, body);
}

#[tokio::test]
async fn test_expired_key_is_credential_error() {
    let (base_url, _) = spawn_mock(
        StatusCode::NOT_FOUND,
        json!({ "error": { "code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND" } }),
    )
    .await;

    let err = client(&base_url).generate("a site", None, &[]).await.unwrap_err();
    assert!(err.is_credential_error());
    assert!(matches!(
        err,
        ClientError::Model {
            kind: ModelErrorKind::Authentication,
            status: Some(404),
            ..
        }
    ));
}

#[tokio::test]
async fn test_server_error_is_classified() {
    let (base_url, _) = spawn_mock(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "error": { "code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE" } }),
    )
    .await;

    let err = client(&base_url).generate("a site", None, &[]).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Model {
            kind: ModelErrorKind::Server,
            ..
        }
    ));
    assert!(!err.is_credential_error());
}

/// Credential flow that reports a key and counts selector openings.
#[derive(Default)]
struct CountingCredentials {
    opened: std::sync::atomic::AtomicUsize,
}

#[async_trait::async_trait]
impl forge_orchestrator::CredentialFlow for CountingCredentials {
    fn has_valid_credential(&self) -> bool {
        true
    }

    async fn open_selector(&self) {
        self.opened
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_studio_reopens_selector_on_rejected_key() {
    let (base_url, _) = spawn_mock(
        StatusCode::NOT_FOUND,
        json!({ "error": { "code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND" } }),
    )
    .await;
    let credentials = Arc::new(CountingCredentials::default());
    let studio = Studio::new(
        Arc::new(client(&base_url)),
        Arc::clone(&credentials) as Arc<dyn forge_orchestrator::CredentialFlow>,
        ProjectStore::in_memory(),
    );

    let err = studio.request_generation("a site", false).await.unwrap_err();
    assert!(matches!(
        err,
        ForgeError::ModelError {
            kind: ModelErrorKind::Authentication,
            ..
        }
    ));

    let snapshot = studio.snapshot().await;
    assert!(!snapshot.has_valid_credential);
    assert_eq!(
        credentials
            .opened
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
    assert_eq!(snapshot.project_count, 0);
}
