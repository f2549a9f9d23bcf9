//! Integration tests for the studio HTTP API and WebSocket event stream.
//!
//! Each test spawns a real server on a free port and talks to it with
//! `reqwest` and `tokio-tungstenite`.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use forge_client::{Attachment, ClientError, GeneratedSite, ModelErrorKind, SiteGenerator};
use forge_orchestrator::{
    create_router, AppState, Config, GenerationOutcome, GenerationStatus, ProjectStore,
    ProjectSummary, SessionSnapshot, StaticCredentialFlow, Studio, StudioEvent,
};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::Message;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Generator that optionally waits for a signal before answering.
struct GatedGenerator {
    answer: Result<GeneratedSite, ClientError>,
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl SiteGenerator for GatedGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _prior: Option<&GeneratedSite>,
        _attachments: &[Attachment],
    ) -> Result<GeneratedSite, ClientError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.answer.clone()
    }
}

fn portfolio() -> GeneratedSite {
    GeneratedSite::new("<div>P</div>", "", "", "Portfolio", "d")
}

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Spawns the studio server and returns its base address.
async fn spawn_server(generator: GatedGenerator) -> String {
    let studio = Studio::new(
        Arc::new(generator),
        Arc::new(StaticCredentialFlow),
        ProjectStore::in_memory(),
    );
    let router = create_router(AppState::new(Config::default(), Arc::new(studio)));

    let addr = format!("127.0.0.1:{}", find_available_port());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

async fn connect_client(addr: &str) -> WsClient {
    let (ws_stream, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Receives the next studio event, answering pings along the way.
async fn receive_event(client: &mut WsClient) -> StudioEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            other => panic!("Unexpected message: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_generate_over_http_emits_events() {
    let addr = spawn_server(GatedGenerator {
        answer: Ok(portfolio()),
        gate: None,
    })
    .await;
    let mut ws = connect_client(&addr).await;

    let StudioEvent::Connected(connected) = receive_event(&mut ws).await else {
        panic!("first event should be connected");
    };
    assert_eq!(connected.state.status, GenerationStatus::Idle);

    let http = reqwest::Client::new();
    let outcome: GenerationOutcome = http
        .post(format!("http://{addr}/api/generate"))
        .json(&serde_json::json!({ "prompt": "a portfolio site" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = outcome.project_id().expect("a project id").to_string();

    let StudioEvent::GenerationStarted(started) = receive_event(&mut ws).await else {
        panic!("expected generation_started");
    };
    assert_eq!(started.prompt, "a portfolio site");
    assert!(!started.refine);

    let StudioEvent::GenerationCompleted(completed) = receive_event(&mut ws).await else {
        panic!("expected generation_completed");
    };
    assert_eq!(completed.project_id, id);
    assert_eq!(completed.title, "Portfolio");
    assert!(!completed.refined);

    let projects: Vec<ProjectSummary> = http
        .get(format!("http://{addr}/api/projects"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(projects.len(), 1);

    let preview = http
        .get(format!("http://{addr}/preview"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(preview.contains("<div>P</div>"));
}

#[tokio::test]
async fn test_second_generation_is_rejected_while_running() {
    let gate = Arc::new(Notify::new());
    let addr = spawn_server(GatedGenerator {
        answer: Ok(portfolio()),
        gate: Some(Arc::clone(&gate)),
    })
    .await;
    let mut ws = connect_client(&addr).await;
    receive_event(&mut ws).await;

    let http = reqwest::Client::new();
    let first = {
        let http = http.clone();
        let url = format!("http://{addr}/api/generate");
        tokio::spawn(async move {
            http.post(url)
                .json(&serde_json::json!({ "prompt": "first" }))
                .send()
                .await
                .unwrap()
                .status()
        })
    };

    // Wait until the first request is in flight.
    assert!(matches!(
        receive_event(&mut ws).await,
        StudioEvent::GenerationStarted(_)
    ));

    let status: SessionSnapshot = http
        .get(format!("http://{addr}/api/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status.status, GenerationStatus::Analyzing);

    let second = http
        .post(format!("http://{addr}/api/generate"))
        .json(&serde_json::json!({ "prompt": "second" }))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::CONFLICT);

    gate.notify_one();
    assert_eq!(first.await.unwrap(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn test_failed_generation_event() {
    let addr = spawn_server(GatedGenerator {
        answer: Err(ClientError::model(
            ModelErrorKind::RateLimit,
            Some(429),
            "RESOURCE_EXHAUSTED: quota exceeded",
        )),
        gate: None,
    })
    .await;
    let mut ws = connect_client(&addr).await;
    receive_event(&mut ws).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/generate"))
        .json(&serde_json::json!({ "prompt": "a site" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);

    receive_event(&mut ws).await;
    let StudioEvent::GenerationFailed(failed) = receive_event(&mut ws).await else {
        panic!("expected generation_failed");
    };
    assert_eq!(failed.kind, Some(ModelErrorKind::RateLimit));
    assert!(!failed.credential_rejected);
}

#[tokio::test]
async fn test_multiple_clients_receive_attachment_events() {
    let addr = spawn_server(GatedGenerator {
        answer: Ok(portfolio()),
        gate: None,
    })
    .await;
    let mut first = connect_client(&addr).await;
    let mut second = connect_client(&addr).await;
    receive_event(&mut first).await;
    receive_event(&mut second).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/attachments?name=notes.txt"))
        .header("content-type", "text/plain")
        .body("opening hours 9-5")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);

    for client in [&mut first, &mut second] {
        let StudioEvent::AttachmentAdded(added) = receive_event(client).await else {
            panic!("expected attachment_added");
        };
        assert_eq!(added.name, "notes.txt");
        assert_eq!(added.mime_type, "text/plain");
        assert_eq!(added.pending, 1);
    }
}
