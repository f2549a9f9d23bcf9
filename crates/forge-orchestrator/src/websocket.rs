//! WebSocket event types and broadcasting for live studio updates.
//!
//! The presentation layer listens on `/ws` to know when to re-render the
//! preview or refresh the library. Events are broadcast to all connected
//! clients as the studio changes.
//!
//! # Event Types
//!
//! - `connected` - Sent when a client connects, includes the session snapshot
//! - `generation_started` - A model call was sent
//! - `generation_completed` - A project was created or refined
//! - `generation_failed` - The model call failed
//! - `project_loaded` - A saved project is now on display
//! - `project_deleted` - A saved project was removed
//! - `attachment_added` - A file joined the pending attachments
//!
//! # Example
//!
//! ```no_run
//! use forge_orchestrator::websocket::{EventBroadcaster, StudioEvent};
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(StudioEvent::project_loaded("42", "Portfolio"));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {}", event.event_name());
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use forge_client::ModelErrorKind;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::studio::SessionSnapshot;

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// The session at connection time.
    pub state: SessionSnapshot,
}

/// Payload for the `generation_started` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStartedPayload {
    /// Prompt that was sent.
    pub prompt: String,
    /// Whether the current site was sent as context.
    pub refine: bool,
    /// Number of attachments sent.
    pub attachments: usize,
}

/// Payload for the `generation_completed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationCompletedPayload {
    /// Project that now holds the result.
    pub project_id: String,
    /// `true` if an existing project was updated.
    pub refined: bool,
    /// Title of the new site.
    pub title: String,
}

/// Payload for the `generation_failed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationFailedPayload {
    /// User-facing message.
    pub message: String,
    /// Failure category for model errors; absent for unusable responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ModelErrorKind>,
    /// Whether the credential was rejected.
    pub credential_rejected: bool,
}

/// Payload for the `project_loaded` and `project_deleted` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPayload {
    /// The project id.
    pub project_id: String,
    /// The project title.
    pub title: String,
}

/// Payload for the `attachment_added` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentAddedPayload {
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Number of attachments now pending.
    pub pending: usize,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Studio events pushed to WebSocket clients.
///
/// All events are serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum StudioEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// Sent when a model call starts.
    GenerationStarted(GenerationStartedPayload),
    /// Sent when a generation succeeds.
    GenerationCompleted(GenerationCompletedPayload),
    /// Sent when a generation fails.
    GenerationFailed(GenerationFailedPayload),
    /// Sent when a project is put on display.
    ProjectLoaded(ProjectPayload),
    /// Sent when a project is deleted.
    ProjectDeleted(ProjectPayload),
    /// Sent when an attachment is queued.
    AttachmentAdded(AttachmentAddedPayload),
}

impl StudioEvent {
    /// Creates a `Connected` event with the current session.
    #[must_use]
    pub const fn connected(state: SessionSnapshot) -> Self {
        Self::Connected(ConnectedPayload { state })
    }

    /// Creates a `GenerationStarted` event.
    #[must_use]
    pub fn generation_started(prompt: impl Into<String>, refine: bool, attachments: usize) -> Self {
        Self::GenerationStarted(GenerationStartedPayload {
            prompt: prompt.into(),
            refine,
            attachments,
        })
    }

    /// Creates a `GenerationCompleted` event.
    #[must_use]
    pub fn generation_completed(
        project_id: impl Into<String>,
        refined: bool,
        title: impl Into<String>,
    ) -> Self {
        Self::GenerationCompleted(GenerationCompletedPayload {
            project_id: project_id.into(),
            refined,
            title: title.into(),
        })
    }

    /// Creates a `GenerationFailed` event.
    #[must_use]
    pub fn generation_failed(
        message: impl Into<String>,
        kind: Option<ModelErrorKind>,
        credential_rejected: bool,
    ) -> Self {
        Self::GenerationFailed(GenerationFailedPayload {
            message: message.into(),
            kind,
            credential_rejected,
        })
    }

    /// Creates a `ProjectLoaded` event.
    #[must_use]
    pub fn project_loaded(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::ProjectLoaded(ProjectPayload {
            project_id: project_id.into(),
            title: title.into(),
        })
    }

    /// Creates a `ProjectDeleted` event.
    #[must_use]
    pub fn project_deleted(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::ProjectDeleted(ProjectPayload {
            project_id: project_id.into(),
            title: title.into(),
        })
    }

    /// Creates an `AttachmentAdded` event.
    #[must_use]
    pub fn attachment_added(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        pending: usize,
    ) -> Self {
        Self::AttachmentAdded(AttachmentAddedPayload {
            name: name.into(),
            mime_type: mime_type.into(),
            pending,
        })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::GenerationStarted(_) => "generation_started",
            Self::GenerationCompleted(_) => "generation_completed",
            Self::GenerationFailed(_) => "generation_failed",
            Self::ProjectLoaded(_) => "project_loaded",
            Self::ProjectDeleted(_) => "project_deleted",
            Self::AttachmentAdded(_) => "attachment_added",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Broadcasts studio events to all connected WebSocket clients.
///
/// Events are not kept for clients that connect later.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<StudioEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster whose subscribers each buffer `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls behind receives `Lagged` and misses events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event and returns how many subscribers will see it.
    pub fn send(&self, event: StudioEvent) -> usize {
        // Err only means nobody is listening
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// Heartbeat period.
const HEARTBEAT: Duration = Duration::from_secs(30);

/// Upgrades `/ws` requests and streams studio events to the client.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles a single WebSocket connection.
///
/// Sends `connected` first, then forwards broadcast events and pings every
/// 30 seconds, closing after 3 missed pongs.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so nothing falls in between
    let mut event_receiver = state.studio.broadcaster().subscribe();

    let connected = StudioEvent::connected(state.studio.snapshot().await);
    let connected_json = match serde_json::to_string(&connected) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize connected event");
            return;
        }
    };

    if sender.send(Message::Text(connected_json)).await.is_err() {
        debug!("Client disconnected before receiving connected event");
        return;
    }

    info!("WebSocket client connected, sent session snapshot");

    let mut heartbeat_interval = interval(HEARTBEAT);
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client requested close");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!("Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        debug!("Ignoring message from client");
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket error");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }

            event = event_receiver.recv() => {
                match event {
                    Ok(studio_event) => {
                        let json = match serde_json::to_string(&studio_event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!(error = %e, "Failed to serialize event");
                                continue;
                            }
                        };

                        if sender.send(Message::Text(json)).await.is_err() {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Client lagged behind the event stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcaster closed");
                        break;
                    }
                }
            }

            _ = heartbeat_interval.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    debug!("Failed to send ping, client disconnected");
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!(missed = MAX_MISSED_PONGS, "Client stopped answering pings, closing connection");
                    break;
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

// ============================================================================
// Tests
// ============================================================================
