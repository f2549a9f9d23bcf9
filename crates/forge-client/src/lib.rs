//! Forge Generation Client
//!
//! This crate owns the contract between the studio and the hosted model:
//! the [`GeneratedSite`] shape the model must return, the [`Attachment`]
//! records sent alongside a prompt, the request builder, the response
//! validator, and the [`GeminiClient`] that performs the actual call.
//!
//! # Example
//!
//! ```no_run
//! use forge_client::{GeminiClient, SiteGenerator};
//!
//! # async fn example() -> Result<(), forge_client::ClientError> {
//! let client = GeminiClient::new("my-api-key", "gemini-3-pro-preview");
//! let site = client.generate("a portfolio site", None, &[]).await?;
//! println!("{}", site.metadata.title);
//! # Ok(())
//! # }
//! ```

pub mod gemini;
pub mod request;
pub mod response;

pub use gemini::{GeminiClient, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use request::{build_request, GenerateContentRequest, RequestOptions, SYSTEM_INSTRUCTION};
pub use response::parse_site;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upstream message the model service returns when the selected key is
/// invalid or has expired.
pub const INVALID_CREDENTIAL_MARKER: &str = "Requested entity was not found.";

// ============================================================================
// Site Contract
// ============================================================================

/// Title and description the model attaches to a generated site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteMetadata {
    /// Short human-readable title.
    pub title: String,
    /// One-line description of the site.
    pub description: String,
}

/// A generated website: the HTML/CSS/JS triple plus metadata.
///
/// Produced whole by the model and replaced whole on refinement; fields are
/// never merged individually.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSite {
    /// Body markup of the site.
    pub html: String,
    /// Custom styles applied on top of Tailwind.
    pub css: String,
    /// Client-side behavior.
    pub js: String,
    /// Title and description.
    pub metadata: SiteMetadata,
}

impl GeneratedSite {
    /// Creates a site from its parts.
    #[must_use]
    pub fn new(
        html: impl Into<String>,
        css: impl Into<String>,
        js: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            html: html.into(),
            css: css.into(),
            js: js.into(),
            metadata: SiteMetadata {
                title: title.into(),
                description: description.into(),
            },
        }
    }
}

/// A user-selected file, encoded for transport to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Original file name.
    pub name: String,
    /// Base64 payload (standard alphabet, padded).
    pub data: String,
    /// MIME type of the payload.
    pub mime_type: String,
}

// ============================================================================
// Errors
// ============================================================================

/// Categories of model-call failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelErrorKind {
    /// Invalid, missing or expired credential.
    Authentication,
    /// Quota or rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Errors produced by a generation call.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Transport, authentication or quota failure from the model service.
    #[error("model error ({kind}): {message}")]
    Model {
        /// Failure category.
        kind: ModelErrorKind,
        /// HTTP status, when the service answered.
        status: Option<u16>,
        /// Message reported by the service or transport.
        message: String,
    },

    /// The model answered, but not with a valid site.
    #[error("invalid model response: {message}")]
    Parse {
        /// What was wrong with the response.
        message: String,
        /// The offending text, kept for diagnosis.
        raw: String,
    },
}

impl ClientError {
    /// Creates a `Model` error.
    #[must_use]
    pub fn model(kind: ModelErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Model {
            kind,
            status,
            message: message.into(),
        }
    }

    /// Creates a `Parse` error.
    #[must_use]
    pub fn parse(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            raw: raw.into(),
        }
    }

    /// Returns `true` if the failure means the credential is invalid or expired.
    ///
    /// The caller is expected to drop its cached credential and ask the user
    /// to select a new one.
    #[must_use]
    pub fn is_credential_error(&self) -> bool {
        match self {
            Self::Model { kind, message, .. } => {
                *kind == ModelErrorKind::Authentication
                    || message.contains(INVALID_CREDENTIAL_MARKER)
            }
            Self::Parse { .. } => false,
        }
    }

    /// Returns `true` for a malformed model response.
    #[must_use]
    pub const fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Returns the message shown to the user.
    ///
    /// Parse failures get a generic retry prompt; model failures keep the
    /// upstream message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Model { message, .. } => message.clone(),
            Self::Parse { .. } => {
                "Could not process the model's response. Please try again.".to_string()
            }
        }
    }
}

// ============================================================================
// Generator Seam
// ============================================================================

/// Anything that can turn a prompt into a [`GeneratedSite`].
///
/// Implementations make at most one model call per invocation and never
/// retry on their own.
#[async_trait]
pub trait SiteGenerator: Send + Sync {
    /// Generates a new site, or refines `prior` when it is given.
    async fn generate(
        &self,
        prompt: &str,
        prior: Option<&GeneratedSite>,
        attachments: &[Attachment],
    ) -> Result<GeneratedSite, ClientError>;
}
