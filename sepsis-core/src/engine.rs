//! Turn orchestration.
//!
//! [`Engine::advance_turn`] is the single entry point: given the prior
//! state (if any) and one line of operator text it resolves an action,
//! applies it, runs the clock, gathers narration, and appends one log
//! entry. The prior state is never touched; every turn works on a copy.

use crate::actions::{ActionContext, ActionKind, ActionRegistry};
use crate::clock;
use crate::collaborators::{Collaborators, Narration};
use crate::config::SimConfig;
use crate::state::{LogEntry, SimulationState};

/// Outcome of one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResult {
    pub state: SimulationState,
    /// The entry this turn produced, or the latest one if nothing changed.
    pub log_entry: LogEntry,
}

/// The simulation engine.
///
/// Holds the immutable action table and the injected collaborators. Cheap
/// to share behind an `Arc`; turns do not mutate it.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    registry: ActionRegistry,
    collaborators: Collaborators,
}

impl Engine {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            registry: ActionRegistry::standard(),
            collaborators,
        }
    }

    /// Keyword matching and static narration only.
    pub fn deterministic() -> Self {
        Self::new(Collaborators::deterministic())
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(Collaborators::from_config(config))
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// A fresh patient and the handoff entry.
    pub fn start(&self) -> TurnResult {
        let state = SimulationState::new();
        let log_entry = state.latest_entry().cloned().unwrap_or_else(LogEntry::handoff);
        TurnResult { state, log_entry }
    }

    /// Advance the simulation by one operator action.
    ///
    /// - No prior state: returns a fresh state; `action` is ignored.
    /// - Terminal prior state: returns it unchanged with its latest entry.
    /// - Otherwise resolves and applies the action, runs the clock for the
    ///   time it consumed, and appends one log entry.
    pub async fn advance_turn(
        &self,
        prior: Option<&SimulationState>,
        action: Option<&str>,
    ) -> TurnResult {
        let Some(prior) = prior else {
            return self.start();
        };

        if prior.is_terminal() {
            log::debug!("turn ignored: outcome is already {}", prior.outcome);
            return TurnResult {
                state: prior.clone(),
                log_entry: prior.latest_entry().cloned().unwrap_or_else(LogEntry::handoff),
            };
        }

        let before = prior.clone();
        let mut state = prior.clone();
        let mut ctx = ActionContext::new(action);

        let kind = self.resolve(&ctx).await;
        kind.execute(&mut state, &mut ctx);
        let time_notices = clock::advance(&mut state, ctx.minutes_consumed);

        let Narration { narration, notices } = self
            .collaborators
            .narrator
            .narrate(kind, &ctx.action_text, &state, &before)
            .await;

        // Narrator notices replace the handler's, refusals included.
        let mut entry_notices = if notices.is_empty() {
            ctx.notices
        } else {
            notices
        };
        entry_notices.extend(time_notices);

        let narration = if narration.trim().is_empty() {
            kind.fallback_narration().to_string()
        } else {
            narration
        };

        let mut log_entry = LogEntry {
            at_minute: state.elapsed_minutes,
            action: ctx.action_text,
            narration,
            notices: entry_notices,
        };
        if let Some(closing) = state.outcome.closing_notice() {
            log_entry.notices.push(closing.to_string());
        }
        state.log.push(log_entry.clone());

        log::debug!(
            "turn {kind} took {} min: now minute {}, severity {:.1}, MAP {}, outcome {}",
            ctx.minutes_consumed,
            state.elapsed_minutes,
            state.severity_score,
            state.vitals.map,
            state.outcome
        );

        TurnResult { state, log_entry }
    }

    /// Classifier first, then keywords, then `Unknown`.
    async fn resolve(&self, ctx: &ActionContext) -> ActionKind {
        if ctx.normalized.is_empty() {
            return ActionKind::Unknown;
        }

        let classified = self
            .collaborators
            .classifier
            .classify(&ctx.action_text)
            .await;
        if classified != ActionKind::Unknown {
            log::debug!("resolved {:?} to {classified} via classifier", ctx.action_text);
            return classified;
        }

        let matched = self.registry.resolve(&ctx.normalized);
        log::debug!("resolved {:?} to {matched} via keywords", ctx.action_text);
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Outcome;
    use crate::testing::{ScriptedClassifier, ScriptedNarrator};

    async fn turn(engine: &Engine, state: &SimulationState, action: &str) -> TurnResult {
        engine.advance_turn(Some(state), Some(action)).await
    }

    #[tokio::test]
    async fn test_no_prior_state_starts_fresh() {
        let engine = Engine::deterministic();
        let result = engine.advance_turn(None, Some("hang zosyn")).await;
        assert_eq!(result.state, SimulationState::new());
        assert_eq!(result.log_entry, LogEntry::handoff());
    }

    #[tokio::test]
    async fn test_turn_appends_one_entry() {
        let engine = Engine::deterministic();
        let fresh = SimulationState::new();
        let result = turn(&engine, &fresh, "start 1 liter crystalloid bolus").await;

        assert_eq!(result.state.log.len(), 2);
        assert_eq!(result.state.elapsed_minutes, 4);
        assert_eq!(result.log_entry.at_minute, 4);
        assert_eq!(result.log_entry.action, "start 1 liter crystalloid bolus");
        assert_eq!(
            result.log_entry.narration,
            "Crystalloid bolus chases the hypotension."
        );
        assert_eq!(
            result.log_entry.notices,
            vec!["1 L crystalloid bolus initiated wide open."]
        );
        assert_eq!(result.state.log.last(), Some(&result.log_entry));
        // The prior snapshot is untouched.
        assert_eq!(fresh, SimulationState::new());
    }

    #[tokio::test]
    async fn test_missing_action_is_unknown() {
        let engine = Engine::deterministic();
        let result = engine.advance_turn(Some(&SimulationState::new()), None).await;
        assert_eq!(result.log_entry.action, "...");
        assert_eq!(result.state.elapsed_minutes, 3);
        assert_eq!(
            result.log_entry.notices,
            vec!["Action not recognized; precious minutes slip by."]
        );
    }

    #[tokio::test]
    async fn test_classifier_overrides_keywords() {
        let classifier = ScriptedClassifier::new([ActionKind::Antibiotic]);
        let engine = Engine::new(Collaborators::deterministic().with_classifier(classifier));
        let result = turn(&engine, &SimulationState::new(), "start some fluids").await;
        assert!(result.state.infusions.antibiotic.active);
        assert!(!result.state.infusions.fluids.active);
    }

    #[tokio::test]
    async fn test_unknown_classification_falls_back_to_keywords() {
        let classifier = ScriptedClassifier::new([ActionKind::Unknown]);
        let engine = Engine::new(Collaborators::deterministic().with_classifier(classifier));
        let result = turn(&engine, &SimulationState::new(), "start some fluids").await;
        assert!(result.state.infusions.fluids.active);
    }

    #[tokio::test]
    async fn test_blank_text_skips_classifier() {
        let classifier = ScriptedClassifier::new([ActionKind::Antibiotic]);
        let probe = classifier.clone();
        let engine = Engine::new(Collaborators::deterministic().with_classifier(classifier));
        let result = turn(&engine, &SimulationState::new(), "   ").await;
        assert_eq!(result.log_entry.action, "...");
        assert!(!result.state.infusions.antibiotic.active);
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_narrator_notices_replace_handler_notices() {
        let narrator = ScriptedNarrator::new([Narration::new(
            "The monitor alarms as MAP sags.",
            vec!["MAP 67".to_string()],
        )]);
        let engine = Engine::new(Collaborators::deterministic().with_narrator(narrator));
        let result = turn(&engine, &SimulationState::new(), "start levophed").await;

        // The protocol refusal notice is dropped.
        assert!(!result.state.infusions.pressor.active);
        assert_eq!(result.log_entry.narration, "The monitor alarms as MAP sags.");
        assert_eq!(result.log_entry.notices, vec!["MAP 67"]);
    }

    #[tokio::test]
    async fn test_narration_without_notices_keeps_handler_notices() {
        let narrator = ScriptedNarrator::new([Narration::new("Bag hung.", Vec::new())]);
        let engine = Engine::new(Collaborators::deterministic().with_narrator(narrator));
        let result = turn(&engine, &SimulationState::new(), "hang zosyn").await;
        assert_eq!(result.log_entry.narration, "Bag hung.");
        assert_eq!(
            result.log_entry.notices,
            vec!["Broad-spectrum antibiotic started through the port."]
        );
    }

    #[tokio::test]
    async fn test_time_notices_follow_narrator_notices() {
        let narrator = ScriptedNarrator::new([Narration::new(
            "Cultures drawn.",
            vec!["Two bottles labeled".to_string()],
        )]);
        let engine = Engine::new(Collaborators::deterministic().with_narrator(narrator));
        let mut state = SimulationState::new();
        state.resources.prbc_eta_minutes = 5;

        let result = turn(&engine, &state, "draw blood cultures").await;
        assert_eq!(result.log_entry.notices.len(), 2);
        assert_eq!(result.log_entry.notices[0], "Two bottles labeled");
        assert!(result.log_entry.notices[1].contains("PRBC unit"));
    }

    #[tokio::test]
    async fn test_terminal_state_is_frozen() {
        let engine = Engine::deterministic();
        let mut state = SimulationState::new();
        state.outcome = Outcome::Died;

        let result = turn(&engine, &state, "hang zosyn").await;
        assert_eq!(result.state, state);
        assert_eq!(result.log_entry, state.log[0]);
    }

    #[tokio::test]
    async fn test_closing_notice_on_death() {
        let engine = Engine::deterministic();
        let mut state = SimulationState::new();
        state.severity_score = 94.0;
        state.elapsed_minutes = 90;

        let result = turn(&engine, &state, "wait").await;
        assert_eq!(result.state.outcome, Outcome::Died);
        assert_eq!(
            result.log_entry.notices.last().map(String::as_str),
            Outcome::Died.closing_notice()
        );
    }
}
