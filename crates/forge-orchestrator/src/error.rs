//! Error types for the Forge studio orchestrator.
//!
//! This module defines the error hierarchy for all orchestrator operations,
//! including configuration loading, generation, attachment encoding and
//! project persistence.

use std::path::PathBuf;

use forge_client::{ClientError, ModelErrorKind};

/// A specialized `Result` type for Forge orchestrator operations.
pub type Result<T> = std::result::Result<T, ForgeError>;

/// Errors that can occur while running the studio.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your forge.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Generation Errors
    // ========================================================================
    /// The model call failed (transport, credential or quota).
    #[error("Generation failed ({kind}): {message}\n\nSuggestion: {suggestion}")]
    ModelError {
        /// Failure category.
        kind: ModelErrorKind,
        /// Message reported by the model service.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The model answered with something that is not a valid site.
    #[error("Could not process the model's response: {message}\n\nSuggestion: Try again; the model occasionally returns malformed output")]
    ParseError {
        /// What was wrong with the response.
        message: String,
    },

    /// A generation is already running.
    #[error("A generation is already in progress\n\nSuggestion: Wait for the current generation to finish")]
    GenerationInProgress,

    /// The generation task stopped without reporting a result.
    #[error("Generation stopped unexpectedly: {message}\n\nSuggestion: Try again; run with --verbose if it keeps happening")]
    GenerationAborted {
        /// Why the task stopped.
        message: String,
    },

    // ========================================================================
    // Project Errors
    // ========================================================================
    /// No saved project has the given id.
    #[error("Project not found: '{id}'\n\nSuggestion: Run 'forge list' to see saved projects")]
    ProjectNotFound {
        /// The requested project id.
        id: String,
    },

    /// Writing the project store failed.
    #[error("Failed to save projects to '{path}': {message}\n\nSuggestion: Check write permissions and available disk space")]
    StoreWrite {
        /// Path of the store file.
        path: PathBuf,
        /// Description of the write failure.
        message: String,
    },

    // ========================================================================
    // Attachment Errors
    // ========================================================================
    /// An attachment could not be read.
    #[error("Failed to read attachment '{path}': {message}\n\nSuggestion: Check that the file exists and is readable")]
    AttachmentRead {
        /// Path of the file.
        path: PathBuf,
        /// Description of the read failure.
        message: String,
    },

    /// An attachment exceeds the configured size limit.
    #[error("Attachment '{name}' is {size} bytes, above the {limit} byte limit\n\nSuggestion: Attach a smaller file or raise maxAttachmentBytes in forge.json")]
    AttachmentTooLarge {
        /// File name.
        name: String,
        /// Actual size in bytes.
        size: u64,
        /// Configured limit in bytes.
        limit: u64,
    },

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// Invalid state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Returns a suggestion message for a model error kind.
const fn model_suggestion(kind: ModelErrorKind) -> &'static str {
    match kind {
        ModelErrorKind::Authentication => "Select a valid API key and try again",
        ModelErrorKind::RateLimit => "Wait and retry, or reduce request frequency",
        ModelErrorKind::Server => "Retry later; the model service may be experiencing issues",
        ModelErrorKind::Network => "Check your network connection",
        ModelErrorKind::Other => "Check the model service's status page",
    }
}

impl From<ClientError> for ForgeError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Model { kind, message, .. } => Self::model_error(kind, message),
            ClientError::Parse { message, .. } => Self::ParseError { message },
        }
    }
}

impl ForgeError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `ModelError` with automatic suggestion based on error kind.
    #[must_use]
    pub fn model_error(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self::ModelError {
            kind,
            message: message.into(),
            suggestion: model_suggestion(kind).to_string(),
        }
    }

    /// Creates a new `GenerationAborted` error.
    #[must_use]
    pub fn generation_aborted(message: impl Into<String>) -> Self {
        Self::GenerationAborted {
            message: message.into(),
        }
    }

    /// Creates a new `ProjectNotFound` error.
    #[must_use]
    pub fn project_not_found(id: impl Into<String>) -> Self {
        Self::ProjectNotFound { id: id.into() }
    }

    /// Creates a new `StoreWrite` error.
    #[must_use]
    pub fn store_write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StoreWrite {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `AttachmentRead` error.
    #[must_use]
    pub fn attachment_read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::AttachmentRead {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `AttachmentTooLarge` error.
    #[must_use]
    pub fn attachment_too_large(name: impl Into<String>, size: u64, limit: u64) -> Self {
        Self::AttachmentTooLarge {
            name: name.into(),
            size,
            limit,
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if the user may simply re-submit.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ModelError {
                kind: ModelErrorKind::RateLimit | ModelErrorKind::Server | ModelErrorKind::Network,
                ..
            } | Self::ParseError { .. }
                | Self::GenerationInProgress
        )
    }

    /// Returns `true` if this error prevents the studio from starting.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. } | Self::ConfigValidationError { .. }
        )
    }
}
