//! Discrete time advancement.
//!
//! Minutes are consumed in slices of at most `SLICE_MINUTES`. Each slice
//! runs, in order: clock, blood-bank delivery, infusion countdowns,
//! severity, derivation, outcome.

use crate::outcome;
use crate::physiology;
use crate::state::{InfusionKind, SimulationState};

/// Largest slice of simulated time applied atomically.
pub const SLICE_MINUTES: u32 = 5;

/// Hemoglobin gained from one PRBC unit, g/dL.
const PRBC_HGB_GAIN: f64 = 1.0;

/// Platelet count floor after one platelet unit, K/µL.
const PLATELET_FLOOR_AFTER_TRANSFUSION: u32 = 29;

/// Split `minutes` into slices: 17 becomes 5, 5, 5, 2.
pub fn slices(minutes: u32) -> impl Iterator<Item = u32> {
    let full = minutes / SLICE_MINUTES;
    let rest = minutes % SLICE_MINUTES;
    std::iter::repeat(SLICE_MINUTES)
        .take(full as usize)
        .chain((rest > 0).then_some(rest))
}

/// Run `minutes` of simulated time. Returns delivery and completion
/// notices in chronological order.
pub fn advance(state: &mut SimulationState, minutes: u32) -> Vec<String> {
    let mut notices = Vec::new();

    for slice in slices(minutes) {
        state.elapsed_minutes += slice;
        tick_blood_bank(state, slice, &mut notices);
        tick_infusions(state, slice, &mut notices);
        physiology::update_severity(state, slice);
        physiology::refresh(state);
        outcome::evaluate(state);
    }

    notices
}

fn tick_blood_bank(state: &mut SimulationState, slice: u32, notices: &mut Vec<String>) {
    let eta = &mut state.resources.prbc_eta_minutes;
    if *eta == 0 {
        return;
    }
    *eta = eta.saturating_sub(slice);
    if *eta == 0 {
        notices.push("Blood bank sends the PRBC unit to the nurses' station.".to_string());
    }
}

fn tick_infusions(state: &mut SimulationState, slice: u32, notices: &mut Vec<String>) {
    for kind in InfusionKind::ALL {
        let line = state.infusions.get_mut(kind);
        if !line.active {
            continue;
        }
        let Some(remaining) = line.remaining_minutes else {
            continue;
        };

        let remaining = remaining.saturating_sub(slice);
        if remaining > 0 {
            line.remaining_minutes = Some(remaining);
            continue;
        }

        line.remaining_minutes = None;
        if let Some(notice) = complete_infusion(state, kind) {
            notices.push(notice);
        }
    }
}

/// Apply the completion effect of a finished infusion.
fn complete_infusion(state: &mut SimulationState, kind: InfusionKind) -> Option<String> {
    match kind {
        // Levels persist after the bag runs dry; the line stays active.
        InfusionKind::Antibiotic => Some(
            "Antibiotic infusion completes; therapeutic levels remain on board.".to_string(),
        ),
        InfusionKind::Fluids => {
            state.infusions.fluids.active = false;
            Some("Fluid bolus is in. Blood pressure response pending.".to_string())
        }
        InfusionKind::Prbc => {
            state.infusions.prbc.active = false;
            state.labs.hgb = physiology::round1(state.labs.hgb + PRBC_HGB_GAIN);
            Some(format!(
                "PRBC transfusion completes; hemoglobin expected near {:.1} g/dL.",
                state.labs.hgb
            ))
        }
        InfusionKind::Platelets => {
            state.infusions.platelets.active = false;
            state.labs.platelets = state.labs.platelets.max(PLATELET_FLOOR_AFTER_TRANSFUSION);
            Some(format!(
                "Platelet transfusion finishes; repeat count expected ~{} K/µL.",
                state.labs.platelets
            ))
        }
        // Never started with a finite timer.
        InfusionKind::Pressor => None,
    }
}
