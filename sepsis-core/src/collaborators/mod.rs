//! Optional AI collaborators.
//!
//! The engine consults two injected capabilities each turn: an
//! [`IntentClassifier`] that maps free text to an [`ActionKind`], and a
//! [`Narrator`] that writes flavor text for the turn. Both are infallible
//! at the boundary. Implementations that talk to the network swallow
//! their own errors, log them, and return the deterministic fallback.

mod classifier;
mod narrator;
pub mod prompts;

pub use classifier::ClaudeClassifier;
pub use narrator::ClaudeNarrator;

use crate::actions::ActionKind;
use crate::config::SimConfig;
use crate::state::SimulationState;
use async_trait::async_trait;
use claude::Claude;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure inside a collaborator. Never crosses the trait boundary.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Claude API error: {0}")]
    Api(#[from] claude::Error),

    #[error("collaborator timed out after {0:?}")]
    Timeout(Duration),

    #[error("unusable model output: {0}")]
    Malformed(String),
}

/// Narrator output for one turn.
///
/// An empty `narration` asks the engine for its static sentence; empty
/// `notices` keep the handler's own notices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Narration {
    pub narration: String,
    pub notices: Vec<String>,
}

impl Narration {
    pub fn new(narration: impl Into<String>, notices: Vec<String>) -> Self {
        Self {
            narration: narration.into(),
            notices,
        }
    }

    /// The "nothing to add" value.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Maps raw operator text to a known action.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// `ActionKind::Unknown` means "no opinion"; the engine then falls
    /// back to keyword matching.
    async fn classify(&self, raw: &str) -> ActionKind;
}

/// Produces narration and notices for a resolved turn.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(
        &self,
        kind: ActionKind,
        raw: &str,
        state: &SimulationState,
        prior: &SimulationState,
    ) -> Narration;
}

/// Classifier that never has an opinion.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordOnly;

#[async_trait]
impl IntentClassifier for KeywordOnly {
    async fn classify(&self, _raw: &str) -> ActionKind {
        ActionKind::Unknown
    }
}

/// Narrator that always defers to the static fallbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNarrator;

#[async_trait]
impl Narrator for SilentNarrator {
    async fn narrate(
        &self,
        _kind: ActionKind,
        _raw: &str,
        _state: &SimulationState,
        _prior: &SimulationState,
    ) -> Narration {
        Narration::empty()
    }
}

/// The pair of collaborators an engine runs with.
#[derive(Clone)]
pub struct Collaborators {
    pub classifier: Arc<dyn IntentClassifier>,
    pub narrator: Arc<dyn Narrator>,
}

impl Collaborators {
    /// Keyword matching and static narration only.
    pub fn deterministic() -> Self {
        Self {
            classifier: Arc::new(KeywordOnly),
            narrator: Arc::new(SilentNarrator),
        }
    }

    /// Claude-backed collaborators sharing one client.
    pub fn claude(client: Claude, timeout: Duration) -> Self {
        Self {
            classifier: Arc::new(ClaudeClassifier::new(client.clone(), timeout)),
            narrator: Arc::new(ClaudeNarrator::new(client, timeout)),
        }
    }

    /// Claude-backed when an API key is configured, deterministic otherwise.
    pub fn from_config(config: &SimConfig) -> Self {
        let Some(api_key) = config.anthropic_api_key.as_deref() else {
            log::info!("No ANTHROPIC_API_KEY configured; using keyword matching and static narration");
            return Self::deterministic();
        };

        let mut client = Claude::new(api_key).with_timeout(config.collaborator_timeout);
        if let Some(model) = &config.model {
            client = client.with_model(model.clone());
        }
        log::info!(
            "AI collaborators enabled (model {}, timeout {:?})",
            client.model(),
            config.collaborator_timeout
        );
        Self::claude(client, config.collaborator_timeout)
    }

    pub fn with_classifier(mut self, classifier: impl IntentClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn with_narrator(mut self, narrator: impl Narrator + 'static) -> Self {
        self.narrator = Arc::new(narrator);
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::deterministic()
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Run `call` under `limit`, flattening the timeout into the error type.
async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| CollaboratorError::Timeout(limit))?
}
