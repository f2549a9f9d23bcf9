//! Generation session state for the Forge studio.
//!
//! This module defines the state machine types for tracking one studio
//! session: the generation status, which project a refinement targets, the
//! site currently on display, and the prompt and attachments waiting to be
//! sent.

use chrono::{DateTime, Utc};
use forge_client::{Attachment, GeneratedSite};
use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

// ============================================================================
// GenerationStatus
// ============================================================================

/// Current status of the generation state machine.
///
/// The status transitions through these states:
/// - `Idle` -> `Analyzing`
/// - `Analyzing` -> `Completed` | `Error`
/// - `Completed` | `Error` -> `Analyzing` (next request)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Nothing has been generated yet.
    #[default]
    Idle,
    /// A model call is in flight.
    Analyzing,
    /// The last generation succeeded.
    Completed,
    /// The last generation failed.
    Error,
}

impl GenerationStatus {
    /// Returns `true` while a generation is running.
    ///
    /// # Examples
    ///
    /// ```
    /// use forge_orchestrator::GenerationStatus;
    ///
    /// assert!(GenerationStatus::Analyzing.is_in_progress());
    /// assert!(!GenerationStatus::Completed.is_in_progress());
    /// ```
    #[must_use]
    pub const fn is_in_progress(&self) -> bool {
        matches!(self, Self::Analyzing)
    }

    /// Returns `true` if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle | Self::Completed | Self::Error, Self::Analyzing)
                | (Self::Analyzing, Self::Completed | Self::Error)
        )
    }

    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// GenerationSession
// ============================================================================

/// Transient state of one studio session. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSession {
    /// Current generation status.
    pub status: GenerationStatus,

    /// Project a refinement targets; `None` means the next success creates a
    /// new project.
    pub current_project_id: Option<String>,

    /// Site currently on display.
    pub displayed_site: Option<GeneratedSite>,

    /// Prompt text waiting to be sent.
    pub prompt: String,

    /// Attachments waiting to be sent.
    pub pending_attachments: Vec<Attachment>,

    /// User-facing message of the last failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Cached result of the last credential check.
    pub has_valid_credential: bool,

    /// When the session last changed.
    pub updated_at: DateTime<Utc>,
}

impl Default for GenerationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationSession {
    /// Creates an idle session with nothing on display.
    ///
    /// # Examples
    ///
    /// ```
    /// use forge_orchestrator::{GenerationSession, GenerationStatus};
    ///
    /// let session = GenerationSession::new();
    /// assert_eq!(session.status, GenerationStatus::Idle);
    /// assert!(session.current_project_id.is_none());
    /// assert!(session.pending_attachments.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: GenerationStatus::Idle,
            current_project_id: None,
            displayed_site: None,
            prompt: String::new(),
            pending_attachments: Vec::new(),
            last_error: None,
            has_valid_credential: false,
            updated_at: Utc::now(),
        }
    }

    /// Moves to `next`, rejecting transitions the state machine forbids.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::InvalidStateTransition` for illegal moves.
    pub fn transition_to(&mut self, next: GenerationStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ForgeError::invalid_transition(self.status, next));
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Returns `true` when there is nothing to send.
    #[must_use]
    pub fn is_empty_request(&self, prompt: &str) -> bool {
        prompt.trim().is_empty() && self.pending_attachments.is_empty()
    }

    /// Shows `site` and makes `id` the refinement target.
    pub fn display(&mut self, id: impl Into<String>, site: GeneratedSite) {
        self.current_project_id = Some(id.into());
        self.displayed_site = Some(site);
        self.touch();
    }

    /// Clears the display if it belongs to project `id`.
    ///
    /// Returns `true` if the display was cleared.
    pub fn forget_project(&mut self, id: &str) -> bool {
        if self.current_project_id.as_deref() != Some(id) {
            return false;
        }
        self.current_project_id = None;
        self.displayed_site = None;
        self.touch();
        true
    }

    /// Updates the `updated_at` timestamp to the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Tests
// ============================================================================
