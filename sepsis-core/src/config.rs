//! Runtime configuration.

use std::time::Duration;

/// Secret used when `SIM_SIGNATURE_SECRET` is unset. Development only.
pub const DEV_SIGNATURE_SECRET: &str = "dev-secret-change-me";

/// Longest accepted action text, in characters.
pub const MAX_ACTION_CHARS: usize = 280;

pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_millis(8000);

/// Configuration for an engine and its turn service.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Secret the state token key is derived from.
    pub signature_secret: String,

    /// Enables the AI collaborators when set.
    pub anthropic_api_key: Option<String>,

    /// Overrides the client's default model.
    pub model: Option<String>,

    /// Upper bound on each collaborator call.
    pub collaborator_timeout: Duration,

    /// Value of `Access-Control-Allow-Origin`.
    pub allowed_origin: String,

    pub max_action_chars: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            signature_secret: DEV_SIGNATURE_SECRET.to_string(),
            anthropic_api_key: None,
            model: None,
            collaborator_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
            allowed_origin: "*".to_string(),
            max_action_chars: MAX_ACTION_CHARS,
        }
    }
}

impl SimConfig {
    /// Read the configuration from environment variables.
    ///
    /// Blank values count as unset. A malformed `SIM_AI_TIMEOUT_MS` is
    /// ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        match get("SIM_SIGNATURE_SECRET") {
            Some(secret) => config.signature_secret = secret,
            None => log::warn!(
                "SIM_SIGNATURE_SECRET is not set; using the development secret. \
Tokens are forgeable by anyone who knows it."
            ),
        }

        config.anthropic_api_key = get("ANTHROPIC_API_KEY");
        config.model = get("SIM_MODEL");

        if let Some(raw) = get("SIM_AI_TIMEOUT_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.collaborator_timeout = Duration::from_millis(ms),
                Err(e) => log::warn!("Ignoring SIM_AI_TIMEOUT_MS={raw:?}: {e}"),
            }
        }

        if let Some(origin) = get("ALLOWED_ORIGIN") {
            config.allowed_origin = origin;
        }

        config
    }

    pub fn with_signature_secret(mut self, secret: impl Into<String>) -> Self {
        self.signature_secret = secret.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.anthropic_api_key = Some(api_key.into());
        self
    }

    /// Disable the AI collaborators regardless of the environment.
    pub fn without_api_key(mut self) -> Self {
        self.anthropic_api_key = None;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_collaborator_timeout(mut self, timeout: Duration) -> Self {
        self.collaborator_timeout = timeout;
        self
    }

    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = origin.into();
        self
    }

    pub fn with_max_action_chars(mut self, max: usize) -> Self {
        self.max_action_chars = max;
        self
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.signature_secret == DEV_SIGNATURE_SECRET
    }
}
