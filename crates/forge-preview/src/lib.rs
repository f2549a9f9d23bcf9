//! Forge Preview
//!
//! This crate turns a [`GeneratedSite`](forge_client::GeneratedSite) into
//! things a person can look at: a complete standalone HTML document, the same
//! document framed at a device width, a directory of source files, and
//! listings of the saved-project library as Markdown or JSON.
//!
//! # Types
//!
//! - [`PreviewDocument`] - Composes html/css/js into one isolated document
//! - [`Viewport`] - Desktop, tablet or mobile framing
//! - [`CodeExport`] - Writes the site's sources to a directory
//! - [`LibraryEntry`] - One saved project as shown in a listing
//!
//! # Generators
//!
//! - [`LibraryMarkdown`] - Human-readable library table
//! - [`json::LibraryJson`] - Library as JSON for scripts
//!
//! # Example
//!
//! ```rust
//! use forge_client::GeneratedSite;
//! use forge_preview::{PreviewDocument, Viewport};
//!
//! let site = GeneratedSite::new("<h1>Hi</h1>", "h1 { color: teal; }", "", "Hello", "A greeting");
//! let document = PreviewDocument::new(&site).render();
//! assert!(document.starts_with("<!DOCTYPE html>"));
//!
//! let framed = PreviewDocument::new(&site).render_frame(Viewport::Mobile);
//! assert!(framed.contains("max-width:390px"));
//! ```

mod document;
mod export;
pub mod json;
mod markdown;

pub use document::{
    escape_attribute, escape_text, PreviewDocument, PreviewOptions, Viewport, BASE_BODY_STYLE,
    FONT_AWESOME_CSS, TAILWIND_CDN,
};
pub use export::{CodeExport, ExportedFiles};
pub use json::LibraryJson;
pub use markdown::LibraryMarkdown;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while rendering or exporting.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// Failed to serialize to JSON.
    #[error("failed to serialize: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to write output files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown viewport name.
    #[error("unknown viewport '{0}': expected one of 'desktop', 'tablet', 'mobile'")]
    InvalidViewport(String),
}

/// Result type for preview operations.
pub type Result<T> = std::result::Result<T, PreviewError>;

// ============================================================================
// Library Entry
// ============================================================================

/// One saved project as shown in a library listing.
///
/// A local view type so this crate does not depend on the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    /// Project id.
    pub id: String,
    /// Site title.
    pub title: String,
    /// Site description.
    pub description: String,
    /// Prompt label.
    pub prompt: String,
    /// Creation or last-refinement instant.
    pub timestamp: DateTime<Utc>,
}

impl LibraryEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        prompt: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            prompt: prompt.into(),
            timestamp,
        }
    }
}
