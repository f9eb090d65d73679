//! The turn endpoint, independent of any transport.
//!
//! [`SimulationService::handle_json`] takes a raw request body and returns
//! either a [`TurnResponse`] or a [`ServiceError`] carrying the HTTP
//! status it maps to. Nothing is ever returned alongside an error.

use crate::config::SimConfig;
use crate::engine::Engine;
use crate::state::{LogEntry, PublicState, SimulationState};
use crate::token::{TokenCodec, TokenError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of a turn request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TurnRequest {
    pub action: Option<String>,
    pub token: Option<String>,
}

impl TurnRequest {
    pub fn new(action: Option<&str>, token: Option<&str>) -> Self {
        Self {
            action: action.map(str::to_string),
            token: token.map(str::to_string),
        }
    }
}

/// Body of a successful turn response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub state: PublicState,
    pub token: String,
    pub log_entry: LogEntry,
}

/// Errors surfaced to the caller of the turn endpoint.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid request: {reason}")]
    BadRequest { reason: String },

    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl ServiceError {
    fn bad_request(reason: impl Into<String>) -> Self {
        ServiceError::BadRequest {
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::BadRequest { .. } => 400,
            ServiceError::Internal { .. } => 500,
        }
    }

    /// Public message for the `{"error": ...}` body. Details stay in logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            ServiceError::BadRequest { .. } => "Invalid request",
            ServiceError::Internal { .. } => "Internal error",
        }
    }
}

impl From<TokenError> for ServiceError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Encode(_) | TokenError::Seal => ServiceError::Internal {
                reason: error.to_string(),
            },
            _ => ServiceError::bad_request(error.to_string()),
        }
    }
}

/// Decodes the caller's token, runs one turn, and seals the result.
#[derive(Debug, Clone)]
pub struct SimulationService {
    engine: Engine,
    codec: TokenCodec,
    max_action_chars: usize,
}

impl SimulationService {
    pub fn new(engine: Engine, codec: TokenCodec, max_action_chars: usize) -> Self {
        Self {
            engine,
            codec,
            max_action_chars,
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(
            Engine::from_config(config),
            TokenCodec::new(&config.signature_secret),
            config.max_action_chars,
        )
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Parse a raw body and handle it. A blank body counts as `{}`.
    pub async fn handle_json(&self, body: &str) -> Result<TurnResponse, ServiceError> {
        let body = if body.trim().is_empty() { "{}" } else { body };
        let request: TurnRequest = serde_json::from_str(body).map_err(|e| {
            log::warn!("Rejected turn request: {e}");
            ServiceError::bad_request(e.to_string())
        })?;
        self.handle(request).await
    }

    pub async fn handle(&self, request: TurnRequest) -> Result<TurnResponse, ServiceError> {
        let prior = self.validate(&request).inspect_err(|e| {
            log::warn!("Rejected turn request: {e}");
        })?;

        let result = self
            .engine
            .advance_turn(prior.as_ref(), request.action.as_deref())
            .await;

        let token = self.codec.encode(&result.state).map_err(|e| {
            log::error!("Failed to seal state token: {e}");
            ServiceError::from(e)
        })?;

        Ok(TurnResponse {
            state: result.state.public_view(),
            token,
            log_entry: result.log_entry,
        })
    }

    /// Check the action length and open the token, if any.
    fn validate(&self, request: &TurnRequest) -> Result<Option<SimulationState>, ServiceError> {
        if let Some(action) = &request.action {
            let chars = action.chars().count();
            if chars > self.max_action_chars {
                return Err(ServiceError::bad_request(format!(
                    "action is {chars} characters, limit is {}",
                    self.max_action_chars
                )));
            }
        }

        match request.token.as_deref() {
            None => Ok(None),
            Some(token) if token.trim().is_empty() => Ok(None),
            Some(token) => Ok(Some(self.codec.decode(token)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SimulationService {
        SimulationService::new(
            Engine::deterministic(),
            TokenCodec::new("service-test"),
            280,
        )
    }

    #[tokio::test]
    async fn test_empty_body_starts_fresh() {
        let response = service().handle_json("").await.unwrap();
        assert_eq!(response.state.elapsed_minutes, 0);
        assert_eq!(response.log_entry.action, "Handoff");
        assert!(!response.token.is_empty());
    }

    #[tokio::test]
    async fn test_token_threads_state() {
        let service = service();
        let first = service.handle(TurnRequest::default()).await.unwrap();
        let second = service
            .handle(TurnRequest::new(Some("hang zosyn"), Some(&first.token)))
            .await
            .unwrap();

        assert_eq!(second.state.elapsed_minutes, 6);
        assert!(second.state.infusions.antibiotic.active);
        let decoded = service.codec().decode(&second.token).unwrap();
        assert_eq!(decoded, second.state.clone().into_inner());
    }

    #[tokio::test]
    async fn test_action_length_limit() {
        let service = service();
        let at_limit = "a".repeat(280);
        assert!(service
            .handle(TurnRequest::new(Some(&at_limit), None))
            .await
            .is_ok());

        let too_long = "a".repeat(281);
        let err = service
            .handle(TurnRequest::new(Some(&too_long), None))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let err = service().handle_json("{not json").await.unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest { .. }));
        assert_eq!(err.public_message(), "Invalid request");

        let err = service()
            .handle_json(r#"{"action": 42}"#)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_bad_token_is_bad_request() {
        let err = service()
            .handle(TurnRequest::new(Some("wait"), Some("not-a-token")))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_seal_failures_are_internal() {
        assert_eq!(ServiceError::from(TokenError::Seal).status_code(), 500);
        assert_eq!(ServiceError::from(TokenError::Tampered).status_code(), 400);
    }

    #[tokio::test]
    async fn test_response_wire_format() {
        let response = service().handle_json("{}").await.unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert!(json["state"]["vitals"]["map"].is_number());
        assert!(json["token"].is_string());
        assert_eq!(json["logEntry"]["atMinute"], 0);
    }
}
