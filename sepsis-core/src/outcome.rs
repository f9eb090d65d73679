//! Terminal-outcome state machine.
//!
//! `Ongoing` moves at most once, to `Stabilized` or `Died`. Both are
//! terminal: the engine refuses to evolve a terminal state.

use crate::state::{Presentation, SimulationState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity at or above which the patient dies.
pub const FATAL_SEVERITY: f64 = 95.0;

/// MAP below which the patient dies.
pub const FATAL_MAP: f64 = 50.0;

/// Severity must be strictly below this to stabilize.
pub const STABLE_SEVERITY: f64 = 22.0;
pub const STABLE_MAP: f64 = 65.0;
pub const STABLE_LACTATE: f64 = 2.9;
pub const STABLE_HGB: f64 = 7.0;
pub const STABLE_PLATELETS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    Ongoing,
    Stabilized,
    Died,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Ongoing)
    }

    /// Presentation a terminal outcome pins in place.
    pub fn pinned_presentation(&self) -> Option<Presentation> {
        match self {
            Outcome::Ongoing => None,
            Outcome::Stabilized => Some(Presentation::STABLE),
            Outcome::Died => Some(Presentation::CRITICAL),
        }
    }

    /// Fixed notice closing the turn that reached this outcome.
    pub fn closing_notice(&self) -> Option<&'static str> {
        match self {
            Outcome::Ongoing => None,
            Outcome::Stabilized => {
                Some("Hemodynamics stabilize; patient prepared for ICU transfer.")
            }
            Outcome::Died => {
                Some("Patient progresses to pulseless electrical activity and expires.")
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ongoing => "ongoing",
            Outcome::Stabilized => "stabilized",
            Outcome::Died => "died",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apply at most one transition from `Ongoing`.
///
/// Death is checked first. Returns the new outcome when a transition
/// happened. On an already terminal state this only re-pins the terminal
/// presentation.
pub fn evaluate(state: &mut SimulationState) -> Option<Outcome> {
    if state.outcome.is_terminal() {
        if let Some(pinned) = state.outcome.pinned_presentation() {
            state.set_presentation(pinned);
        }
        return None;
    }

    let next = if is_fatal(state) {
        Outcome::Died
    } else if is_stable(state) {
        Outcome::Stabilized
    } else {
        return None;
    };

    state.outcome = next;
    if let Some(pinned) = next.pinned_presentation() {
        state.set_presentation(pinned);
    }
    log::info!(
        "outcome reached: {next} at minute {} (severity {:.1}, MAP {})",
        state.elapsed_minutes,
        state.severity_score,
        state.vitals.map
    );
    Some(next)
}

fn is_fatal(state: &SimulationState) -> bool {
    state.severity_score >= FATAL_SEVERITY || state.vitals.map < FATAL_MAP
}

fn is_stable(state: &SimulationState) -> bool {
    state.severity_score < STABLE_SEVERITY
        && state.infusions.antibiotic.active
        && state.vitals.map >= STABLE_MAP
        && state.vitals.lactate <= STABLE_LACTATE
        && state.labs.hgb >= STABLE_HGB
        && state.labs.platelets >= STABLE_PLATELETS
}
