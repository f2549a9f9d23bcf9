//! Request construction for site generation.
//!
//! Builds the `generateContent` payload: a fixed system instruction, the
//! ordered user parts (prompt, inline attachments, task framing) and the
//! structured-output schema that constrains the reply to a [`GeneratedSite`].

use serde::Serialize;
use serde_json::{json, Value};

use crate::{Attachment, GeneratedSite};

/// Default reasoning budget requested from the model.
pub const DEFAULT_THINKING_BUDGET: u32 = 32_768;

/// The fixed system instruction sent with every generation.
pub const SYSTEM_INSTRUCTION: &str = "You are WebForge, an elite full-stack AI engineer.
Your goal is to build fully-functional, visually stunning, high-performance web applications.

CORE REQUIREMENTS:
1. Professional logic: when the user asks for a feature such as login, cart or search, implement a complete UI/UX for it with realistic mock logic in JS.
2. Aesthetics: use high-end \"Linear\" or \"Apple\" style aesthetics. Smooth transitions, glassmorphism and premium typography.
3. Framework: use HTML5, Tailwind CSS (via CDN) and modern vanilla JavaScript (ES6+).
4. Contextual awareness: when updating existing code, keep the theme and structure unless told otherwise.
5. Interactivity: add subtle hover effects, loading states and smooth scrolling.
6. Assets: use FontAwesome 6 icons (CDN) and high-quality Unsplash placeholders.

RESPONSE RULES:
- Return ONLY a valid JSON object matching the provided schema.
- The HTML must be a complete snippet for the body.
- The CSS must be advanced custom styles beyond standard Tailwind.
- The JS must be modular and robust.";

/// Tunables that shape the request but not its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Reasoning token budget; `None` omits the thinking config.
    pub thinking_budget: Option<u32>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            thinking_budget: Some(DEFAULT_THINKING_BUDGET),
        }
    }
}

/// Body of a `generateContent` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation turns; a generation always sends exactly one user turn.
    pub contents: Vec<Content>,
    /// Fixed system instruction.
    pub system_instruction: Content,
    /// Output constraints.
    pub generation_config: GenerationConfig,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    /// Author of the turn; omitted for the system instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Ordered parts of the turn.
    pub parts: Vec<Part>,
}

/// A single content part: text or inline binary data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Part {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// Base64 file data.
    InlineData {
        /// The encoded payload.
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

/// Inline file payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type of `data`.
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
}

/// Structured-output settings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Always `application/json`.
    pub response_mime_type: String,
    /// Schema the reply must satisfy.
    pub response_schema: Value,
    /// Optional reasoning budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

/// Reasoning budget settings.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    /// Maximum reasoning tokens.
    pub thinking_budget: u32,
}

/// Returns the structured-output schema for a [`GeneratedSite`].
///
/// All five text fields are required.
#[must_use]
pub fn site_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "html": { "type": "STRING", "description": "Advanced HTML5 structure" },
            "css": { "type": "STRING", "description": "Professional CSS and Tailwind extensions" },
            "js": { "type": "STRING", "description": "Interactive JavaScript logic" },
            "metadata": {
                "type": "OBJECT",
                "properties": {
                    "title": { "type": "STRING" },
                    "description": { "type": "STRING" }
                },
                "required": ["title", "description"]
            }
        },
        "required": ["html", "css", "js", "metadata"]
    })
}

/// Builds the trailing task-framing text.
///
/// A refinement carries the full current site verbatim; a new build only
/// carries the request.
#[must_use]
pub fn task_framing(prompt: &str, prior: Option<&GeneratedSite>) -> String {
    match prior {
        Some(site) => format!(
            "TASK: Refine the existing build.\n\
             CURRENT HTML: {html}\n\
             CURRENT CSS: {css}\n\
             CURRENT JS: {js}\n\
             REFINEMENT REQUEST: \"{prompt}\"\n\
             Integrate these changes seamlessly while keeping the established theme and structure unless told otherwise.",
            html = site.html,
            css = site.css,
            js = site.js,
        ),
        None => format!(
            "TASK: Create a new high-end project.\n\
             REQUEST: \"{prompt}\"\n\
             Build it from scratch as a complete, multi-section professional application."
        ),
    }
}

/// Assembles the full generation request.
///
/// Parts are ordered: prompt text, one inline part per attachment, then the
/// task framing.
#[must_use]
pub fn build_request(
    prompt: &str,
    prior: Option<&GeneratedSite>,
    attachments: &[Attachment],
    options: RequestOptions,
) -> GenerateContentRequest {
    let mut parts = Vec::with_capacity(attachments.len() + 2);
    parts.push(Part::Text {
        text: prompt.to_string(),
    });
    parts.extend(attachments.iter().map(|attachment| Part::InlineData {
        inline_data: InlineData {
            mime_type: attachment.mime_type.clone(),
            data: attachment.data.clone(),
        },
    }));
    parts.push(Part::Text {
        text: task_framing(prompt, prior),
    });

    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts,
        }],
        system_instruction: Content {
            role: None,
            parts: vec![Part::Text {
                text: SYSTEM_INSTRUCTION.to_string(),
            }],
        },
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: site_schema(),
            thinking_config: options
                .thinking_budget
                .map(|thinking_budget| ThinkingConfig { thinking_budget }),
        },
    }
}
