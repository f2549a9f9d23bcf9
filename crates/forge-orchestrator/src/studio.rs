//! The generation orchestrator.
//!
//! [`Studio`] owns the session state machine and the project store behind one
//! lock and coordinates every change to them: generating or refining a site,
//! loading and deleting saved projects, and queueing attachments. The lock is
//! never held across the model call, so status and library reads stay
//! responsive while a generation runs; the reentrancy guard keeps at most one
//! generation in flight.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use forge_client::{Attachment, ClientError, GeneratedSite, SiteGenerator};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::attachment::{encode_file, AttachFailure, AttachReport};
use crate::credential::CredentialFlow;
use crate::error::{ForgeError, Result};
use crate::session::{GenerationSession, GenerationStatus};
use crate::store::{ProjectStore, SavedProject, REFINEMENT_PREFIX};
use crate::websocket::{EventBroadcaster, StudioEvent};

/// Default attachment size limit (20 MiB).
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 20 * 1024 * 1024;

/// Result of [`Studio::request_generation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// Nothing to send; no state changed.
    Skipped,
    /// A new project was created.
    Created {
        /// Id of the new project.
        id: String,
    },
    /// An existing project was updated in place.
    Refined {
        /// Id of the refined project.
        id: String,
    },
}

impl GenerationOutcome {
    /// Returns the affected project id, if any.
    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::Skipped => None,
            Self::Created { id } | Self::Refined { id } => Some(id),
        }
    }
}

/// Pending attachment without its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentSummary {
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Length of the base64 payload.
    pub encoded_len: usize,
}

impl From<&Attachment> for AttachmentSummary {
    fn from(attachment: &Attachment) -> Self {
        Self {
            name: attachment.name.clone(),
            mime_type: attachment.mime_type.clone(),
            encoded_len: attachment.data.len(),
        }
    }
}

/// Library entry without the site body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    /// Project id.
    pub id: String,
    /// Site title.
    pub title: String,
    /// Site description.
    pub description: String,
    /// Prompt label.
    pub prompt: String,
    /// Creation or last-refinement instant.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl From<&SavedProject> for ProjectSummary {
    fn from(project: &SavedProject) -> Self {
        Self {
            id: project.id.clone(),
            title: project.site.metadata.title.clone(),
            description: project.site.metadata.description.clone(),
            prompt: project.prompt.clone(),
            timestamp: project.timestamp,
        }
    }
}

/// Point-in-time view of the session for status endpoints and new clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Current generation status.
    pub status: GenerationStatus,
    /// Project a refinement would target.
    pub current_project_id: Option<String>,
    /// Site currently on display.
    pub displayed_site: Option<GeneratedSite>,
    /// Prompt kept for retry.
    pub prompt: String,
    /// Pending attachments.
    pub pending_attachments: Vec<AttachmentSummary>,
    /// Message of the last failure.
    pub last_error: Option<String>,
    /// Cached credential check.
    pub has_valid_credential: bool,
    /// Number of saved projects.
    pub project_count: usize,
    /// When the session last changed.
    pub updated_at: DateTime<Utc>,
}

struct StudioState {
    session: GenerationSession,
    store: ProjectStore,
}

/// The studio orchestrator.
pub struct Studio {
    state: Arc<Mutex<StudioState>>,
    generator: Arc<dyn SiteGenerator>,
    credentials: Arc<dyn CredentialFlow>,
    broadcaster: EventBroadcaster,
    max_attachment_bytes: u64,
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("max_attachment_bytes", &self.max_attachment_bytes)
            .field("subscribers", &self.broadcaster.receiver_count())
            .finish_non_exhaustive()
    }
}

impl Studio {
    /// Creates a studio over `store`, generating with `generator`.
    ///
    /// The credential flag starts from `credentials.has_valid_credential()`.
    #[must_use]
    pub fn new(
        generator: Arc<dyn SiteGenerator>,
        credentials: Arc<dyn CredentialFlow>,
        store: ProjectStore,
    ) -> Self {
        let mut session = GenerationSession::new();
        session.has_valid_credential = credentials.has_valid_credential();
        Self {
            state: Arc::new(Mutex::new(StudioState { session, store })),
            generator,
            credentials,
            broadcaster: EventBroadcaster::default(),
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }

    /// Replaces the event broadcaster.
    #[must_use]
    pub fn with_broadcaster(mut self, broadcaster: EventBroadcaster) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    /// Sets the largest file [`Studio::attach_files`] accepts.
    #[must_use]
    pub const fn with_max_attachment_bytes(mut self, max_bytes: u64) -> Self {
        self.max_attachment_bytes = max_bytes;
        self
    }

    /// Returns the event broadcaster.
    #[must_use]
    pub const fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    // ------------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------------

    /// Generates a new site, or refines the displayed one when `refine` is set.
    ///
    /// An empty prompt with no pending attachments is a no-op returning
    /// [`GenerationOutcome::Skipped`]. A refinement with nothing on display
    /// runs as a new generation. On failure the prompt and attachments stay
    /// pending for a retry.
    ///
    /// The model call and the bookkeeping after it run on their own task.
    /// Dropping the returned future stops waiting for the result but not the
    /// generation, which still saves its site or records its failure.
    ///
    /// # Errors
    ///
    /// - `ForgeError::GenerationInProgress` if a generation is already running
    /// - `ForgeError::ModelError` / `ForgeError::ParseError` if the model call
    ///   fails (status becomes `error`)
    /// - `ForgeError::GenerationAborted` if the generation task died without a
    ///   result (status becomes `error`)
    /// - `ForgeError::StoreWrite` if the result could not be saved to disk; the
    ///   in-memory library and session are still updated
    pub async fn request_generation(&self, prompt: &str, refine: bool) -> Result<GenerationOutcome> {
        let (prior, attachments, target) = {
            let mut state = self.state.lock().await;
            let session = &mut state.session;

            if session.status.is_in_progress() {
                warn!("Rejecting generation request, another one is in flight");
                return Err(ForgeError::GenerationInProgress);
            }
            if session.is_empty_request(prompt) {
                debug!("Empty prompt and no attachments, nothing to generate");
                return Ok(GenerationOutcome::Skipped);
            }

            let prior = if refine {
                session.displayed_site.clone()
            } else {
                None
            };
            if refine && prior.is_none() {
                info!("Nothing on display to refine, generating a new project");
            }
            let target = prior
                .as_ref()
                .and_then(|_| session.current_project_id.clone());

            session.transition_to(GenerationStatus::Analyzing)?;
            session.prompt = prompt.to_string();
            session.last_error = None;

            (prior, session.pending_attachments.clone(), target)
        };

        let refining = prior.is_some();
        info!(refine = refining, attachments = attachments.len(), "Generation started");
        self.broadcaster.send(StudioEvent::generation_started(
            prompt,
            refining,
            attachments.len(),
        ));

        let run = GenerationRun {
            state: Arc::clone(&self.state),
            generator: Arc::clone(&self.generator),
            credentials: Arc::clone(&self.credentials),
            broadcaster: self.broadcaster.clone(),
            prompt: prompt.to_string(),
            prior,
            attachments,
            target,
        };
        let state = Arc::clone(&self.state);
        let broadcaster = self.broadcaster.clone();
        let supervisor = tokio::spawn(async move {
            match tokio::spawn(run.run()).await {
                Ok(result) => result,
                Err(e) => Err(abort_generation(&state, &broadcaster, &e).await),
            }
        });

        supervisor
            .await
            .unwrap_or_else(|e| Err(ForgeError::generation_aborted(e.to_string())))
    }

    // ------------------------------------------------------------------------
    // Library
    // ------------------------------------------------------------------------

    /// Puts a saved project on display and makes it the refinement target.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::ProjectNotFound` for unknown ids.
    pub async fn load_project(&self, id: &str) -> Result<SavedProject> {
        let project = {
            let mut state = self.state.lock().await;
            let project = state
                .store
                .get(id)
                .cloned()
                .ok_or_else(|| ForgeError::project_not_found(id))?;
            state.session.display(&project.id, project.site.clone());
            project
        };

        info!(id = %project.id, title = %project.title(), "Project loaded");
        self.broadcaster
            .send(StudioEvent::project_loaded(&project.id, project.title()));
        Ok(project)
    }

    /// Deletes a saved project.
    ///
    /// Confirmation is the caller's job. If the project was on display, the
    /// display and refinement target are cleared. Returns `false` for unknown
    /// ids.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::StoreWrite` if the library could not be saved.
    pub async fn delete_project(&self, id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(removed) = state.store.remove(id) else {
            debug!(id = %id, "Delete requested for unknown project");
            return Ok(false);
        };
        let was_displayed = state.session.forget_project(id);
        let persisted = state.store.persist().await;
        drop(state);

        info!(id = %id, was_displayed, "Project deleted");
        self.broadcaster
            .send(StudioEvent::project_deleted(id, removed.title()));
        persisted.map(|()| true)
    }

    /// Returns all saved projects, most recent first.
    pub async fn projects(&self) -> Vec<SavedProject> {
        self.state.lock().await.store.projects().to_vec()
    }

    /// Returns library summaries, most recent first.
    pub async fn project_summaries(&self) -> Vec<ProjectSummary> {
        let state = self.state.lock().await;
        state.store.projects().iter().map(ProjectSummary::from).collect()
    }

    /// Returns one saved project.
    pub async fn project(&self, id: &str) -> Option<SavedProject> {
        self.state.lock().await.store.get(id).cloned()
    }

    /// Returns the site on display, if any.
    pub async fn displayed_site(&self) -> Option<GeneratedSite> {
        self.state.lock().await.session.displayed_site.clone()
    }

    /// Returns a snapshot of the session.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        let session = &state.session;
        SessionSnapshot {
            status: session.status,
            current_project_id: session.current_project_id.clone(),
            displayed_site: session.displayed_site.clone(),
            prompt: session.prompt.clone(),
            pending_attachments: session
                .pending_attachments
                .iter()
                .map(AttachmentSummary::from)
                .collect(),
            last_error: session.last_error.clone(),
            has_valid_credential: session.has_valid_credential,
            project_count: state.store.len(),
            updated_at: session.updated_at,
        }
    }

    // ------------------------------------------------------------------------
    // Prompt and attachments
    // ------------------------------------------------------------------------

    /// Replaces the pending prompt text.
    pub async fn set_prompt(&self, prompt: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.session.prompt = prompt.into();
        state.session.touch();
    }

    /// Appends an attachment to the pending set.
    pub async fn add_attachment(&self, attachment: Attachment) {
        let pending = {
            let mut state = self.state.lock().await;
            state.session.pending_attachments.push(attachment.clone());
            state.session.touch();
            state.session.pending_attachments.len()
        };
        debug!(name = %attachment.name, pending, "Attachment queued");
        self.broadcaster.send(StudioEvent::attachment_added(
            attachment.name,
            attachment.mime_type,
            pending,
        ));
    }

    /// Removes the first pending attachment named `name`.
    pub async fn remove_attachment(&self, name: &str) -> bool {
        let mut state = self.state.lock().await;
        let pending = &mut state.session.pending_attachments;
        let Some(index) = pending.iter().position(|a| a.name == name) else {
            return false;
        };
        pending.remove(index);
        state.session.touch();
        true
    }

    /// Drops all pending attachments and returns how many there were.
    pub async fn clear_attachments(&self) -> usize {
        let mut state = self.state.lock().await;
        let count = state.session.pending_attachments.len();
        state.session.pending_attachments.clear();
        state.session.touch();
        count
    }

    /// Encodes files and queues each one as soon as it is ready.
    ///
    /// Files are read concurrently, so attachments join the pending set in
    /// completion order. A file that cannot be read is logged, listed in the
    /// report and skipped; the rest of the batch still goes through.
    pub async fn attach_files(&self, paths: Vec<PathBuf>) -> AttachReport {
        let max_bytes = self.max_attachment_bytes;
        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::new();
        for path in paths {
            let handle = tasks.spawn({
                let path = path.clone();
                async move {
                    let result = encode_file(&path, max_bytes).await;
                    (path, result)
                }
            });
            spawned.insert(handle.id(), path);
        }

        let mut report = AttachReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(attachment))) => {
                    report.attached.push(attachment.name.clone());
                    self.add_attachment(attachment).await;
                }
                Ok((path, Err(e))) => {
                    warn!(path = %path.display(), error = %e, "Skipping attachment");
                    report.failed.push(AttachFailure {
                        path,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    let failure = lost_attachment(&spawned, &e);
                    warn!(path = %failure.path.display(), error = %e, "Attachment task did not finish");
                    report.failed.push(failure);
                }
            }
        }
        report
    }

    // ------------------------------------------------------------------------
    // Credential
    // ------------------------------------------------------------------------

    /// Re-checks the credential and caches the result.
    pub async fn refresh_credential(&self) -> bool {
        let valid = self.credentials.has_valid_credential();
        let mut state = self.state.lock().await;
        if state.session.has_valid_credential != valid {
            info!(valid, "Credential status changed");
            state.session.has_valid_credential = valid;
            state.session.touch();
        }
        valid
    }
}

/// A generation after it has been accepted, owning everything it needs to
/// finish on its own task.
struct GenerationRun {
    state: Arc<Mutex<StudioState>>,
    generator: Arc<dyn SiteGenerator>,
    credentials: Arc<dyn CredentialFlow>,
    broadcaster: EventBroadcaster,
    prompt: String,
    prior: Option<GeneratedSite>,
    attachments: Vec<Attachment>,
    target: Option<String>,
}

impl GenerationRun {
    async fn run(self) -> Result<GenerationOutcome> {
        let answer = self
            .generator
            .generate(&self.prompt, self.prior.as_ref(), &self.attachments)
            .await;
        match answer {
            Ok(site) => self.finish_success(site).await,
            Err(err) => Err(self.finish_failure(err).await),
        }
    }

    async fn finish_success(self, site: GeneratedSite) -> Result<GenerationOutcome> {
        let label = if self.prior.is_some() {
            format!("{REFINEMENT_PREFIX}{}", self.prompt)
        } else {
            self.prompt.clone()
        };
        let title = site.metadata.title.clone();

        let mut state = self.state.lock().await;
        let StudioState { session, store } = &mut *state;

        let (id, refined) = match self.target {
            Some(id) if store.update(&id, label.clone(), site.clone()) => (id, true),
            Some(id) => {
                warn!(id = %id, "Refinement target no longer exists, saving as a new project");
                (store.insert_new(label, site.clone()), false)
            }
            None => (store.insert_new(label, site.clone()), false),
        };
        let outcome = if refined {
            GenerationOutcome::Refined { id: id.clone() }
        } else {
            GenerationOutcome::Created { id: id.clone() }
        };

        session.display(id.clone(), site);
        session.prompt.clear();
        // Attachments queued during the call were appended after the sent ones.
        let sent = self.attachments.len().min(session.pending_attachments.len());
        session.pending_attachments.drain(..sent);
        session.transition_to(GenerationStatus::Completed)?;

        let persisted = store.persist().await;
        drop(state);

        info!(id = %id, refined, title = %title, "Generation completed");
        self.broadcaster
            .send(StudioEvent::generation_completed(&id, refined, title));

        if let Err(e) = persisted {
            error!(error = %e, "Generated site kept in memory but could not be saved");
            return Err(e);
        }
        Ok(outcome)
    }

    async fn finish_failure(self, err: ClientError) -> ForgeError {
        let credential_rejected = err.is_credential_error();
        let message = err.user_message();
        let kind = match &err {
            ClientError::Model { kind, .. } => Some(*kind),
            ClientError::Parse { .. } => None,
        };

        {
            let mut state = self.state.lock().await;
            let session = &mut state.session;
            if credential_rejected {
                session.has_valid_credential = false;
            }
            session.last_error = Some(message.clone());
            if let Err(e) = session.transition_to(GenerationStatus::Error) {
                warn!(error = %e, "Unexpected status while recording a failed generation");
            }
        }

        warn!(error = %err, credential_rejected, "Generation failed");
        self.broadcaster.send(StudioEvent::generation_failed(
            message,
            kind,
            credential_rejected,
        ));

        if credential_rejected {
            self.credentials.open_selector().await;
        }

        err.into()
    }
}

/// Moves a generation whose task died out of `analyzing`.
async fn abort_generation(
    state: &Mutex<StudioState>,
    broadcaster: &EventBroadcaster,
    err: &JoinError,
) -> ForgeError {
    let message = "Generation stopped unexpectedly. Please try again.";
    {
        let mut state = state.lock().await;
        let session = &mut state.session;
        session.last_error = Some(message.to_string());
        if let Err(e) = session.transition_to(GenerationStatus::Error) {
            warn!(error = %e, "Unexpected status while recording an aborted generation");
        }
    }

    error!(error = %err, "Generation task stopped without a result");
    broadcaster.send(StudioEvent::generation_failed(message, None, false));
    ForgeError::generation_aborted(err.to_string())
}

/// Failure entry for an encoding task that panicked or was cancelled.
fn lost_attachment(spawned: &HashMap<Id, PathBuf>, err: &JoinError) -> AttachFailure {
    AttachFailure {
        path: spawned.get(&err.id()).cloned().unwrap_or_default(),
        message: err.to_string(),
    }
}
