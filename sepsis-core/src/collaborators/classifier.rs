//! Claude-backed intent classification.

use super::{bounded, prompts, CollaboratorError, IntentClassifier};
use crate::actions::ActionKind;
use async_trait::async_trait;
use claude::{Claude, Message, Request, Tool};
use serde_json::{json, Value};
use std::time::Duration;

const SELECT_ACTION: &str = "select_action";

/// Asks Claude which action a free-text instruction means.
pub struct ClaudeClassifier {
    client: Claude,
    timeout: Duration,
}

impl ClaudeClassifier {
    pub fn new(client: Claude, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn try_classify(&self, raw: &str) -> Result<ActionKind, CollaboratorError> {
        let request = Request::new(vec![Message::user(raw)])
            .with_system(prompts::classifier_system())
            .with_temperature(0.0)
            .with_max_tokens(64);

        let input = bounded(self.timeout, async {
            self.client
                .complete_tool(request, select_action_tool())
                .await
                .map_err(CollaboratorError::from)
        })
        .await?;

        parse_selection(&input)
    }
}

#[async_trait]
impl IntentClassifier for ClaudeClassifier {
    async fn classify(&self, raw: &str) -> ActionKind {
        match self.try_classify(raw).await {
            Ok(kind) => {
                log::debug!("classifier picked {kind} for {raw:?}");
                kind
            }
            Err(e) => {
                log::warn!("intent classifier failed, falling back to keywords: {e}");
                ActionKind::Unknown
            }
        }
    }
}

fn select_action_tool() -> Tool {
    let ids: Vec<&str> = ActionKind::ALL.iter().map(|kind| kind.id()).collect();
    Tool::new(
        SELECT_ACTION,
        "Report the single action the nurse's input asks for.",
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ids,
                    "description": "Action identifier"
                }
            },
            "required": ["action"]
        }),
    )
}

/// Identifiers outside the known set map to `Unknown`; a missing field is
/// malformed.
fn parse_selection(input: &Value) -> Result<ActionKind, CollaboratorError> {
    let id = input
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| CollaboratorError::Malformed(format!("no action in {input}")))?;
    Ok(ActionKind::from_id(id.trim()).unwrap_or(ActionKind::Unknown))
}
