//! Credential checks and the key-selection hook.

use async_trait::async_trait;
use tracing::warn;

/// Access to the user's model credential.
#[async_trait]
pub trait CredentialFlow: Send + Sync {
    /// Returns `true` if a usable credential is available.
    fn has_valid_credential(&self) -> bool;

    /// Asks the user to select a new credential and waits for them.
    async fn open_selector(&self);
}

/// Credential held in an environment variable.
#[derive(Debug, Clone)]
pub struct EnvCredentialFlow {
    var: String,
}

impl EnvCredentialFlow {
    /// Creates a flow reading the key from `var`.
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    /// Returns the environment variable name.
    #[must_use]
    pub fn var(&self) -> &str {
        &self.var
    }

    /// Returns the key, if set and non-blank.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[async_trait]
impl CredentialFlow for EnvCredentialFlow {
    fn has_valid_credential(&self) -> bool {
        self.api_key().is_some()
    }

    async fn open_selector(&self) {
        warn!(
            var = %self.var,
            "The model rejected the API key. Set {} to a valid key and restart the studio",
            self.var
        );
    }
}

/// A credential that is always considered valid. Useful for offline runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCredentialFlow;

#[async_trait]
impl CredentialFlow for StaticCredentialFlow {
    fn has_valid_credential(&self) -> bool {
        true
    }

    async fn open_selector(&self) {}
}
