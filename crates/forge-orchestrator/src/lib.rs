//! Forge Studio Orchestrator
//!
//! Owns the generation session, the saved-project library, and the HTTP and
//! WebSocket surface a front-end drives.

pub mod api;
pub mod attachment;
pub mod config;
pub mod credential;
pub mod error;
pub mod session;
pub mod store;
pub mod studio;
pub mod websocket;

pub use api::{
    create_router, AppState, ClearResponse, CredentialResponse, DeleteResponse, ErrorResponse,
    GenerateRequest,
};
pub use attachment::{encode_bytes, encode_file, guess_mime_type, AttachFailure, AttachReport};
pub use config::{Config, PreviewConfig, TextDirection};
pub use credential::{CredentialFlow, EnvCredentialFlow, StaticCredentialFlow};
pub use error::{ForgeError, Result};
pub use session::{GenerationSession, GenerationStatus};
pub use store::{ProjectStore, SavedProject, REFINEMENT_PREFIX};
pub use studio::{
    AttachmentSummary, GenerationOutcome, ProjectSummary, SessionSnapshot, Studio,
    DEFAULT_MAX_ATTACHMENT_BYTES,
};
pub use websocket::{EventBroadcaster, StudioEvent};
