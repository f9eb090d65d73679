//! Prompt text for the Claude-backed collaborators.

use crate::actions::ActionKind;
use crate::state::{InfusionKind, SimulationState};

/// Order treatments are listed in the narrator prompt.
const TREATMENT_ORDER: [InfusionKind; 5] = [
    InfusionKind::Antibiotic,
    InfusionKind::Fluids,
    InfusionKind::Pressor,
    InfusionKind::Prbc,
    InfusionKind::Platelets,
];

/// One line per action the classifier may pick.
fn action_menu() -> String {
    ActionKind::ALL
        .iter()
        .map(|kind| format!("- {}: {}", kind.id(), describe(*kind)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Antibiotic => {
            "Start broad-spectrum antibiotics (zosyn, cefepime, meropenem, pip-tazo)"
        }
        ActionKind::Cultures => "Draw blood cultures",
        ActionKind::FluidBolus => "Give an IV fluid bolus (NS, lactated ringers, crystalloid)",
        ActionKind::Prbc => "Start a blood transfusion (packed red blood cells)",
        ActionKind::Platelets => "Start a platelet transfusion",
        ActionKind::Pressor => "Start a vasopressor (norepinephrine, levophed)",
        ActionKind::StopPressor => "Stop the running pressor",
        ActionKind::Oxygen => "Apply oxygen (nasal cannula, non-rebreather)",
        ActionKind::NeutropenicPrecautions => "Put neutropenic precautions or isolation in place",
        ActionKind::PageProvider => "Call or page the provider, oncologist or physician",
        ActionKind::RapidResponse => "Call the rapid response team, RRT or a code sepsis",
        ActionKind::CheckVitals => "Check vitals or reassess the patient",
        ActionKind::Wait => "Wait, observe or hold",
        ActionKind::Unknown => "The input matches none of the above",
    }
}

pub fn classifier_system() -> String {
    format!(
        "You are the command parser for a nursing simulation. Decide which single action the \
nurse's input asks for and report it with the select_action tool.\n\n\
Available actions:\n{}\n\n\
Pick UNKNOWN when nothing fits. Never invent new identifiers.",
        action_menu()
    )
}

/// Treatments currently running, comma separated, or "none".
pub fn active_treatments(state: &SimulationState) -> String {
    let active: Vec<&str> = TREATMENT_ORDER
        .into_iter()
        .filter(|kind| state.infusions.is_active(*kind))
        .map(|kind| kind.label())
        .collect();
    if active.is_empty() {
        return "none".to_string();
    }
    active.join(", ")
}

/// Notable changes between two snapshots, in plain words.
pub fn describe_vital_changes(current: &SimulationState, previous: &SimulationState) -> String {
    let mut changes = Vec::new();
    let now = &current.vitals;
    let before = &previous.vitals;

    let map_diff = now.map - before.map;
    if map_diff.abs() > 1.0 {
        changes.push(format!(
            "MAP {} {:.0} mmHg",
            if map_diff > 0.0 { "increased" } else { "decreased" },
            map_diff.abs()
        ));
    }

    let hr_diff = i64::from(now.heart_rate) - i64::from(before.heart_rate);
    if hr_diff.abs() > 3 {
        changes.push(format!(
            "HR {} {} bpm",
            if hr_diff > 0 { "increased" } else { "decreased" },
            hr_diff.abs()
        ));
    }

    let lactate_diff = now.lactate - before.lactate;
    if lactate_diff.abs() > 0.2 {
        changes.push(format!(
            "Lactate {} {:.1} mmol/L",
            if lactate_diff > 0.0 { "rose" } else { "fell" },
            lactate_diff.abs()
        ));
    }

    if current.neuro != previous.neuro {
        changes.push(format!(
            "Mental status changed from {} to {}",
            previous.neuro, current.neuro
        ));
    }
    if current.skin != previous.skin {
        changes.push(format!("Skin changed from {} to {}", previous.skin, current.skin));
    }

    if changes.is_empty() {
        "No significant vital changes yet".to_string()
    } else {
        changes.join(", ")
    }
}

pub fn narrator_system(state: &SimulationState, prior: &SimulationState) -> String {
    let v = &state.vitals;
    let labs = &state.labs;
    format!(
        "You are the clinical narrator for a nursing simulation. Describe the patient's \
immediate response to the nurse's intervention.\n\n\
Current patient state:\n\
- Vitals: MAP {map}, HR {hr}, Temp {temp}°C, SpO2 {spo2}%, Lactate {lactate}\n\
- Neuro: {neuro}, Skin: {skin}, Urine: {urine}\n\
- Labs: Hgb {hgb}, Platelets {platelets}, ANC {anc}\n\
- Active treatments: {treatments}\n\
- Time elapsed: {elapsed} minutes\n\n\
Vital changes since the last action:\n{changes}\n\n\
Record a short narration (one or two sentences) of what visibly happens right now, and two \
or three monitor alerts or bedside observations, using the record_narration tool.",
        map = v.map,
        hr = v.heart_rate,
        temp = v.temperature_c,
        spo2 = v.spo2,
        lactate = v.lactate,
        neuro = state.neuro,
        skin = state.skin,
        urine = state.urine_output_trend,
        hgb = labs.hgb,
        platelets = labs.platelets,
        anc = labs.anc,
        treatments = active_treatments(state),
        elapsed = state.elapsed_minutes,
        changes = describe_vital_changes(state, prior),
    )
}

pub fn narrator_user(kind: ActionKind, raw: &str) -> String {
    format!("Action performed: {raw}\nAction type: {kind}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Neuro, Skin};

    #[test]
    fn test_classifier_prompt_lists_every_action() {
        let prompt = classifier_system();
        for kind in ActionKind::ALL {
            assert!(prompt.contains(kind.id()), "missing {kind}");
        }
    }

    #[test]
    fn test_no_changes() {
        let state = SimulationState::new();
        assert_eq!(
            describe_vital_changes(&state, &state),
            "No significant vital changes yet"
        );
    }

    #[test]
    fn test_small_changes_are_ignored() {
        let before = SimulationState::new();
        let mut after = before.clone();
        after.vitals.map += 1.0;
        after.vitals.heart_rate += 3;
        after.vitals.lactate += 0.1;
        assert_eq!(
            describe_vital_changes(&after, &before),
            "No significant vital changes yet"
        );
    }

    #[test]
    fn test_lactate_threshold_boundary() {
        // 3.8 -> 4.0 lands just over the 0.2 threshold in floating point.
        let before = SimulationState::new();
        let mut after = before.clone();
        after.vitals.lactate = 4.0;
        assert_eq!(before.vitals.lactate, 3.8);
        assert_eq!(
            describe_vital_changes(&after, &before),
            "Lactate rose 0.2 mmol/L"
        );
    }

    #[test]
    fn test_changes_are_described() {
        let before = SimulationState::new();
        let mut after = before.clone();
        after.vitals.map = 76.6;
        after.vitals.heart_rate = 110;
        after.vitals.lactate = 1.4;
        after.neuro = Neuro::Alert;
        after.skin = Skin::Warm;

        let text = describe_vital_changes(&after, &before);
        assert_eq!(
            text,
            "MAP increased 9 mmHg, HR decreased 18 bpm, Lactate fell 2.4 mmol/L, \
Mental status changed from drowsy to alert, Skin changed from clammy to warm"
        );
    }

    #[test]
    fn test_active_treatments() {
        let mut state = SimulationState::new();
        assert_eq!(active_treatments(&state), "none");
        state.infusions.pressor.start(0, None);
        state.infusions.antibiotic.start(0, Some(30));
        assert_eq!(active_treatments(&state), "antibiotics, pressors");

        state.infusions.platelets.start(0, Some(30));
        state.infusions.prbc.start(0, Some(60));
        state.infusions.fluids.start(0, Some(20));
        assert_eq!(
            active_treatments(&state),
            "antibiotics, fluid bolus, pressors, blood transfusion, platelets"
        );
    }

    #[test]
    fn test_narrator_prompt_carries_state() {
        let state = SimulationState::new();
        let prompt = narrator_system(&state, &state);
        assert!(prompt.contains("MAP 68"));
        assert!(prompt.contains("Neuro: drowsy"));
        assert!(prompt.contains("Time elapsed: 0 minutes"));
        assert!(prompt.contains("No significant vital changes yet"));
        assert_eq!(
            narrator_user(ActionKind::FluidBolus, "start fluids"),
            "Action performed: start fluids\nAction type: FLUID_BOLUS"
        );
    }
}
