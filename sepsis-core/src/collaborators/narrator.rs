//! Claude-backed turn narration.

use super::{bounded, prompts, CollaboratorError, Narration, Narrator};
use crate::actions::ActionKind;
use crate::state::SimulationState;
use async_trait::async_trait;
use claude::{Claude, Message, Request, Tool};
use serde_json::{json, Value};
use std::time::Duration;

const RECORD_NARRATION: &str = "record_narration";

/// Used when the model answers without a narration.
const PLACEHOLDER_NARRATION: &str = "Intervention in progress.";

/// Writes narration and bedside notices with Claude.
pub struct ClaudeNarrator {
    client: Claude,
    timeout: Duration,
}

impl ClaudeNarrator {
    pub fn new(client: Claude, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn try_narrate(
        &self,
        kind: ActionKind,
        raw: &str,
        state: &SimulationState,
        prior: &SimulationState,
    ) -> Result<Narration, CollaboratorError> {
        let request = Request::new(vec![Message::user(prompts::narrator_user(kind, raw))])
            .with_system(prompts::narrator_system(state, prior))
            .with_temperature(0.7)
            .with_max_tokens(400);

        let input = bounded(self.timeout, async {
            self.client
                .complete_tool(request, record_narration_tool())
                .await
                .map_err(CollaboratorError::from)
        })
        .await?;

        Ok(parse_narration(&input))
    }
}

#[async_trait]
impl Narrator for ClaudeNarrator {
    async fn narrate(
        &self,
        kind: ActionKind,
        raw: &str,
        state: &SimulationState,
        prior: &SimulationState,
    ) -> Narration {
        match self.try_narrate(kind, raw, state, prior).await {
            Ok(narration) => narration,
            Err(e) => {
                log::warn!("narrator failed, using static narration: {e}");
                Narration::empty()
            }
        }
    }
}

fn record_narration_tool() -> Tool {
    Tool::new(
        RECORD_NARRATION,
        "Record the immediate clinical response to the nurse's action.",
        json!({
            "type": "object",
            "properties": {
                "narration": {
                    "type": "string",
                    "description": "One or two sentences describing what happens right now"
                },
                "notices": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Two or three monitor alerts or bedside observations"
                }
            },
            "required": ["narration", "notices"]
        }),
    )
}

/// Lenient: a blank narration becomes the placeholder, a non-array
/// `notices` yields none, and non-string notices are skipped.
fn parse_narration(input: &Value) -> Narration {
    let narration = input
        .get("narration")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(PLACEHOLDER_NARRATION);

    let notices: Vec<String> = input
        .get("notices")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Narration::new(narration, notices)
}
