//! Configuration types for the Forge studio.
//!
//! This module provides the configuration structures that control the model
//! connection, project storage, the studio server and preview rendering.

use std::path::Path;
use std::time::Duration;

use forge_client::{RequestOptions, DEFAULT_BASE_URL, DEFAULT_MODEL};
use forge_preview::PreviewOptions;
use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "forge.json";

/// Default model used for generation.
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Default environment variable holding the API key.
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

/// Default REST endpoint prefix.
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Default reasoning budget.
const fn default_thinking_budget() -> u32 {
    forge_client::request::DEFAULT_THINKING_BUDGET
}

/// Default project store location.
fn default_store_file() -> String {
    ".forge/projects.json".to_string()
}

/// Default bind host for the studio server.
fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Default port for the studio server.
const fn default_port() -> u16 {
    4173
}

/// Default attachment size limit (20 MiB).
const fn default_max_attachment_bytes() -> u64 {
    20 * 1024 * 1024
}

/// Main configuration for the studio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Model used for generation.
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable that holds the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// REST endpoint prefix of the model service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Reasoning budget requested per generation (0 disables it).
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: u32,

    /// Optional whole-request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Path of the JSON file holding saved projects.
    #[serde(default = "default_store_file")]
    pub store_file: String,

    /// Host the studio server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the studio server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted attachment in bytes.
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,

    /// Preview document settings.
    #[serde(default)]
    pub preview: PreviewConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            thinking_budget: default_thinking_budget(),
            request_timeout_secs: None,
            store_file: default_store_file(),
            host: default_host(),
            port: default_port(),
            max_attachment_bytes: default_max_attachment_bytes(),
            preview: PreviewConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `forge.json` in the current directory. If not found, returns
    /// the default configuration.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            ForgeError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `forge.json` in a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the default configuration. The result is
    /// validated either way.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::ConfigParseError` for unreadable files or invalid
    /// JSON, and `ForgeError::ConfigValidationError` for invalid values.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(ForgeError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ForgeError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ForgeError::config_validation(
                "model must not be empty",
                "Set model to a model name such as \"gemini-3-pro-preview\" in your forge.json",
            ));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(ForgeError::config_validation(
                "apiKeyEnv must not be empty",
                "Set apiKeyEnv to the environment variable holding your key (default GEMINI_API_KEY)",
            ));
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ForgeError::config_validation(
                format!("baseUrl '{}' is not an http(s) URL", self.base_url),
                "Set baseUrl to an http:// or https:// endpoint in your forge.json",
            ));
        }

        if self.store_file.trim().is_empty() {
            return Err(ForgeError::config_validation(
                "storeFile must not be empty",
                "Provide a valid path for saved projects in your forge.json",
            ));
        }

        if self.port == 0 {
            return Err(ForgeError::config_validation(
                "port must be greater than 0",
                "Set port to a free TCP port in your forge.json",
            ));
        }

        if self.max_attachment_bytes == 0 {
            return Err(ForgeError::config_validation(
                "maxAttachmentBytes must be greater than 0",
                "Set maxAttachmentBytes to at least 1 in your forge.json",
            ));
        }

        if self.request_timeout_secs == Some(0) {
            return Err(ForgeError::config_validation(
                "requestTimeoutSecs must be greater than 0",
                "Remove requestTimeoutSecs to use transport defaults, or set it to at least 1",
            ));
        }

        Ok(())
    }

    /// Returns the request options derived from this configuration.
    #[must_use]
    pub const fn request_options(&self) -> RequestOptions {
        RequestOptions {
            thinking_budget: if self.thinking_budget == 0 {
                None
            } else {
                Some(self.thinking_budget)
            },
        }
    }

    /// Returns the request timeout, if one is configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Text direction of the preview document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextDirection {
    /// Left to right (default).
    #[default]
    Ltr,
    /// Right to left.
    Rtl,
}

impl TextDirection {
    /// Parses a string into a `TextDirection`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ltr" => Some(Self::Ltr),
            "rtl" => Some(Self::Rtl),
            _ => None,
        }
    }

    /// Returns the HTML `dir` attribute value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ltr => "ltr",
            Self::Rtl => "rtl",
        }
    }
}

impl<'de> Deserialize<'de> for TextDirection {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid text direction '{s}': expected one of 'ltr', 'rtl'"
            ))
        })
    }
}

impl Serialize for TextDirection {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

fn default_lang() -> String {
    "en".to_string()
}

/// Preview document settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewConfig {
    /// `lang` attribute of the preview document.
    #[serde(default = "default_lang")]
    pub lang: String,

    /// `dir` attribute of the preview document.
    #[serde(default)]
    pub dir: TextDirection,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            lang: default_lang(),
            dir: TextDirection::default(),
        }
    }
}

impl PreviewConfig {
    /// Converts to the renderer's options.
    #[must_use]
    pub fn to_options(&self) -> PreviewOptions {
        PreviewOptions {
            lang: self.lang.clone(),
            dir: self.dir.as_str().to_string(),
        }
    }
}
