//! Severity accumulation and vitals derivation.
//!
//! Severity is the single hidden driver. Vitals and presentation tiers are
//! recomputed wholesale from it every slice, never drifted incrementally,
//! so `derive_vitals` and `presentation_for` are pure.

use crate::state::{
    Infusions, Labs, Presentation, SimulationState, Vitals, SEVERITY_MAX, SEVERITY_MIN,
};

/// Clamp ranges for every derived vital, `(min, max)`.
pub const MAP_RANGE: (f64, f64) = (45.0, 85.0);
pub const HEART_RATE_RANGE: (f64, f64) = (80.0, 160.0);
pub const TEMPERATURE_RANGE: (f64, f64) = (36.3, 40.5);
pub const RESPIRATORY_RATE_RANGE: (f64, f64) = (16.0, 36.0);
pub const SPO2_RANGE: (f64, f64) = (88.0, 99.0);
pub const LACTATE_RANGE: (f64, f64) = (1.4, 6.1);
pub const DIASTOLIC_FLOOR: u32 = 38;

/// Elapsed minutes after which an antibiotic delay is penalised harder.
const ANTIBIOTIC_DELAY_MINUTES: u32 = 60;

/// Severity at or above which the patient is critical.
pub const CRITICAL_SEVERITY: f64 = 80.0;

/// Severity at or above which the patient is in shock.
pub const SHOCK_SEVERITY: f64 = 50.0;

/// Severity change for a slice of `minutes`.
///
/// Reads the infusion flags, labs and flags as they are now, and the MAP
/// derived at the end of the previous slice.
pub fn severity_delta(state: &SimulationState, minutes: u32) -> f64 {
    let m = f64::from(minutes);
    let infusions = &state.infusions;
    let fluids = infusions.fluids.active;
    let map = state.vitals.map;

    let mut rate = 0.18;

    if infusions.antibiotic.active {
        rate -= 0.55;
    } else if state.elapsed_minutes > ANTIBIOTIC_DELAY_MINUTES {
        rate += 0.35;
    } else {
        rate += 0.22;
    }

    if fluids {
        rate -= 0.25;
    } else if map < 60.0 {
        rate += 0.18;
    }

    if infusions.pressor.active {
        rate -= 0.15;
    } else if map < 55.0 && !fluids {
        rate += 0.25;
    }

    if state.labs.hgb < 6.5 {
        rate += 0.12;
    }
    if state.labs.platelets < 10 {
        rate += 0.05;
    }
    if state.flags.rapid_response_called {
        rate -= 0.05;
    }

    rate * m
}

/// Advance severity by one slice, clamped to `[0, 120]`.
pub fn update_severity(state: &mut SimulationState, minutes: u32) {
    let delta = severity_delta(state, minutes);
    state.severity_score = (state.severity_score + delta).clamp(SEVERITY_MIN, SEVERITY_MAX);
}

/// Vitals implied by `severity` under the given treatments and labs.
pub fn derive_vitals(severity: f64, infusions: &Infusions, labs: &Labs) -> Vitals {
    let s = severity;
    let fluids = infusions.fluids.active;
    let pressor = infusions.pressor.active;
    let antibiotic = infusions.antibiotic.active;

    let map = round1(clamp(
        76.0 - 0.2 * s + indicator(fluids, 8.0) + indicator(pressor, 15.0),
        MAP_RANGE,
    ));

    let heart_rate = clamp(
        100.0 + 0.7 * s
            - indicator(pressor, 10.0)
            - indicator(antibiotic, 8.0)
            - indicator(fluids, 5.0),
        HEART_RATE_RANGE,
    )
    .round();

    let temperature_c = round1(clamp(
        37.0 + 0.055 * s - indicator(antibiotic, 0.8),
        TEMPERATURE_RANGE,
    ));

    let respiratory_rate = clamp(18.0 + 0.15 * s, RESPIRATORY_RATE_RANGE).round();

    let oxygen_carrying = if labs.hgb >= 7.0 { 0.8 } else { -0.7 };
    let spo2 = round1(clamp(
        96.0 - 0.05 * s + indicator(fluids, 1.2) + oxygen_carrying,
        SPO2_RANGE,
    ));

    let clearance = if fluids { 0.12 * s.min(20.0) } else { 0.0 };
    let lactate = round1(clamp(1.8 + 0.05 * s - clearance, LACTATE_RANGE));

    Vitals {
        heart_rate: heart_rate as u32,
        map,
        systolic: (map + 16.0).round() as u32,
        diastolic: ((map - 10.0).round() as u32).max(DIASTOLIC_FLOOR),
        temperature_c,
        respiratory_rate: respiratory_rate as u32,
        spo2,
        lactate,
    }
}

/// Presentation tier implied by severity alone.
pub fn presentation_for(severity: f64) -> Presentation {
    if severity >= CRITICAL_SEVERITY {
        Presentation::CRITICAL
    } else if severity >= SHOCK_SEVERITY {
        Presentation::SHOCKED
    } else {
        Presentation::STABLE
    }
}

/// Overwrite vitals and presentation from the current severity.
pub fn refresh(state: &mut SimulationState) {
    state.vitals = derive_vitals(state.severity_score, &state.infusions, &state.labs);
    state.set_presentation(presentation_for(state.severity_score));
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn clamp(value: f64, (min, max): (f64, f64)) -> f64 {
    value.clamp(min, max)
}

fn indicator(on: bool, weight: f64) -> f64 {
    if on {
        weight
    } else {
        0.0
    }
}
