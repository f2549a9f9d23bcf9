//! Validation of the model's structured reply.
//!
//! The request schema should already constrain the reply, but nothing here
//! trusts it: the text is parsed as JSON and every required field is checked
//! for presence and type before a [`GeneratedSite`] is built.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::error;

use crate::{ClientError, GeneratedSite, SiteMetadata};

/// Matches a reply wrapped in a single Markdown code fence.
static CODE_FENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)\A```[a-zA-Z]*\s*\n(.*?)\n?```\z").ok());

/// Removes one surrounding code fence, if present.
fn strip_code_fence(text: &str) -> &str {
    CODE_FENCE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str())
}

/// Reads a required string field from a JSON object.
fn required_str(object: &Map<String, Value>, field: &str, path: &str) -> Result<String, String> {
    match object.get(field) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(other) => Err(format!(
            "field '{path}' must be a string, found {}",
            type_name(other)
        )),
        None => Err(format!("missing required field '{path}'")),
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn validate(value: &Value) -> Result<GeneratedSite, String> {
    let Value::Object(root) = value else {
        return Err(format!("expected a JSON object, found {}", type_name(value)));
    };

    let html = required_str(root, "html", "html")?;
    let css = required_str(root, "css", "css")?;
    let js = required_str(root, "js", "js")?;

    let metadata = match root.get("metadata") {
        Some(Value::Object(metadata)) => metadata,
        Some(other) => {
            return Err(format!(
                "field 'metadata' must be an object, found {}",
                type_name(other)
            ))
        }
        None => return Err("missing required field 'metadata'".to_string()),
    };

    Ok(GeneratedSite {
        html,
        css,
        js,
        metadata: SiteMetadata {
            title: required_str(metadata, "title", "metadata.title")?,
            description: required_str(metadata, "description", "metadata.description")?,
        },
    })
}

/// Parses and validates raw model output into a [`GeneratedSite`].
///
/// # Errors
///
/// Returns [`ClientError::Parse`] when the text is not JSON or does not
/// carry all five required string fields. The raw text is logged.
pub fn parse_site(text: &str) -> Result<GeneratedSite, ClientError> {
    let trimmed = strip_code_fence(text.trim()).trim();

    let result = serde_json::from_str::<Value>(trimmed)
        .map_err(|e| format!("response is not valid JSON: {e}"))
        .and_then(|value| validate(&value));

    result.map_err(|message| {
        error!(error = %message, raw = %text, "Model returned an unusable response");
        ClientError::parse(message, text)
    })
}
