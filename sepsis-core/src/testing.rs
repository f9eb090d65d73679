//! Testing utilities for the simulation.
//!
//! This module provides tools for integration testing:
//! - `ScriptedClassifier` and `ScriptedNarrator` for deterministic
//!   collaborators without API calls
//! - `TurnHarness` for threading state through scripted turns
//! - Assertion helpers for verifying simulation state

use crate::actions::ActionKind;
use crate::collaborators::{Collaborators, IntentClassifier, Narration, Narrator};
use crate::engine::{Engine, TurnResult};
use crate::outcome::Outcome;
use crate::physiology::{
    DIASTOLIC_FLOOR, HEART_RATE_RANGE, LACTATE_RANGE, MAP_RANGE, RESPIRATORY_RATE_RANGE,
    SPO2_RANGE, TEMPERATURE_RANGE,
};
use crate::state::{InfusionKind, LogEntry, SimulationState, SEVERITY_MAX, SEVERITY_MIN};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A classifier that returns scripted answers in order.
///
/// Once the script runs out it answers `Unknown`. Clones share the script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedClassifier {
    inner: Arc<Mutex<Script<ActionKind>>>,
}

/// A narrator that returns scripted narrations in order.
///
/// Once the script runs out it returns an empty narration. Clones share
/// the script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedNarrator {
    inner: Arc<Mutex<Script<Narration>>>,
}

#[derive(Debug)]
struct Script<T> {
    queue: VecDeque<T>,
    calls: usize,
    inputs: Vec<String>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            calls: 0,
            inputs: Vec::new(),
        }
    }
}

impl<T> Script<T> {
    fn next(&mut self, input: &str) -> Option<T> {
        self.calls += 1;
        self.inputs.push(input.to_string());
        self.queue.pop_front()
    }
}

fn lock<T>(script: &Mutex<Script<T>>) -> std::sync::MutexGuard<'_, Script<T>> {
    script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedClassifier {
    pub fn new(answers: impl IntoIterator<Item = ActionKind>) -> Self {
        let classifier = Self::default();
        lock(&classifier.inner).queue.extend(answers);
        classifier
    }

    pub fn push(&self, answer: ActionKind) {
        lock(&self.inner).queue.push_back(answer);
    }

    /// Number of times `classify` was called.
    pub fn calls(&self) -> usize {
        lock(&self.inner).calls
    }

    /// Raw texts seen so far, in order.
    pub fn inputs(&self) -> Vec<String> {
        lock(&self.inner).inputs.clone()
    }
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify(&self, raw: &str) -> ActionKind {
        lock(&self.inner).next(raw).unwrap_or(ActionKind::Unknown)
    }
}

impl ScriptedNarrator {
    pub fn new(narrations: impl IntoIterator<Item = Narration>) -> Self {
        let narrator = Self::default();
        lock(&narrator.inner).queue.extend(narrations);
        narrator
    }

    pub fn push(&self, narration: Narration) {
        lock(&self.inner).queue.push_back(narration);
    }

    /// Number of times `narrate` was called.
    pub fn calls(&self) -> usize {
        lock(&self.inner).calls
    }
}

#[async_trait]
impl Narrator for ScriptedNarrator {
    async fn narrate(
        &self,
        _kind: ActionKind,
        raw: &str,
        _state: &SimulationState,
        _prior: &SimulationState,
    ) -> Narration {
        lock(&self.inner).next(raw).unwrap_or_default()
    }
}

/// Test harness for running turn sequences.
pub struct TurnHarness {
    /// The engine under test.
    pub engine: Engine,
    /// State after the most recent turn.
    pub state: SimulationState,
    /// Every turn result, oldest first.
    pub history: Vec<TurnResult>,
}

impl TurnHarness {
    /// A fresh patient with deterministic collaborators.
    pub fn new() -> Self {
        Self::with_engine(Engine::deterministic())
    }

    pub fn with_collaborators(collaborators: Collaborators) -> Self {
        Self::with_engine(Engine::new(collaborators))
    }

    pub fn with_engine(engine: Engine) -> Self {
        let state = engine.start().state;
        Self {
            engine,
            state,
            history: Vec::new(),
        }
    }

    /// Run one turn and keep the resulting state.
    pub async fn act(&mut self, action: &str) -> LogEntry {
        let result = self
            .engine
            .advance_turn(Some(&self.state), Some(action))
            .await;
        self.state = result.state.clone();
        let entry = result.log_entry.clone();
        self.history.push(result);
        entry
    }

    /// Run `action` until the outcome is terminal or `max_turns` is hit.
    /// Returns the number of turns taken.
    pub async fn repeat_until_terminal(&mut self, action: &str, max_turns: usize) -> usize {
        for turn in 1..=max_turns {
            self.act(action).await;
            if self.state.is_terminal() {
                return turn;
            }
        }
        max_turns
    }

    pub fn outcome(&self) -> Outcome {
        self.state.outcome
    }

    pub fn map(&self) -> f64 {
        self.state.vitals.map
    }

    pub fn is_active(&self, kind: InfusionKind) -> bool {
        self.state.infusions.is_active(kind)
    }

    /// Notices of the most recent entry.
    pub fn last_notices(&self) -> &[String] {
        self.state
            .latest_entry()
            .map(|entry| entry.notices.as_slice())
            .unwrap_or_default()
    }
}

impl Default for TurnHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert severity and every vital sit inside their clamp ranges.
#[track_caller]
pub fn assert_vitals_in_range(state: &SimulationState) {
    let v = &state.vitals;
    let within = |value: f64, (min, max): (f64, f64)| (min..=max).contains(&value);

    assert!(
        (SEVERITY_MIN..=SEVERITY_MAX).contains(&state.severity_score),
        "severity {} out of range",
        state.severity_score
    );
    assert!(within(v.map, MAP_RANGE), "MAP {} out of range", v.map);
    assert!(
        within(f64::from(v.heart_rate), HEART_RATE_RANGE),
        "HR {} out of range",
        v.heart_rate
    );
    assert!(
        within(v.temperature_c, TEMPERATURE_RANGE),
        "temperature {} out of range",
        v.temperature_c
    );
    assert!(
        within(f64::from(v.respiratory_rate), RESPIRATORY_RATE_RANGE),
        "RR {} out of range",
        v.respiratory_rate
    );
    assert!(within(v.spo2, SPO2_RANGE), "SpO2 {} out of range", v.spo2);
    assert!(
        within(v.lactate, LACTATE_RANGE),
        "lactate {} out of range",
        v.lactate
    );
    assert!(
        v.diastolic >= DIASTOLIC_FLOOR,
        "diastolic {} below floor",
        v.diastolic
    );
}

#[track_caller]
pub fn assert_outcome(state: &SimulationState, expected: Outcome) {
    assert_eq!(
        state.outcome, expected,
        "expected outcome {expected} at minute {} (severity {:.1})",
        state.elapsed_minutes, state.severity_score
    );
}

#[track_caller]
pub fn assert_infusion_active(state: &SimulationState, kind: InfusionKind) {
    assert!(
        state.infusions.is_active(kind),
        "expected {} to be running",
        kind.label()
    );
}

#[track_caller]
pub fn assert_infusion_inactive(state: &SimulationState, kind: InfusionKind) {
    assert!(
        !state.infusions.is_active(kind),
        "expected {} to be stopped",
        kind.label()
    );
}
