//! Nurse actions: matching free text to an action and executing it.
//!
//! The action set is closed. `ActionRegistry` holds the explicit matching
//! order; the first action whose keywords appear in the normalized text
//! wins, and `ActionKind::Unknown` catches everything else.
//!
//! Matching is plain substring containment, so the order is load-bearing.
//! "stop pressor" contains "pressor" and therefore resolves to
//! `Pressor`, not `StopPressor`; short keywords such as "ns" and "nc"
//! also match inside unrelated words. Keep `REGISTRATION_ORDER` as is
//! unless that tie-break is deliberately changed.

use crate::state::{InfusionKind, SimulationState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minutes charged when a handler does not set its own cost.
pub const DEFAULT_MINUTES: u32 = 3;

/// Placeholder logged when no action text was supplied.
pub const MISSING_ACTION_TEXT: &str = "...";

/// MAP at or above which pressors are refused without running fluids.
const PRESSOR_MAP_THRESHOLD: f64 = 60.0;

/// SpO2 floor after oxygen is applied.
const OXYGEN_SPO2_FLOOR: f64 = 97.0;

/// Every action a nurse can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Antibiotic,
    Cultures,
    FluidBolus,
    Prbc,
    Platelets,
    Pressor,
    StopPressor,
    Oxygen,
    NeutropenicPrecautions,
    PageProvider,
    RapidResponse,
    CheckVitals,
    Wait,
    Unknown,
}

/// Keyword matching order. First match wins.
pub const REGISTRATION_ORDER: [ActionKind; 13] = [
    ActionKind::Antibiotic,
    ActionKind::Cultures,
    ActionKind::FluidBolus,
    ActionKind::Prbc,
    ActionKind::Platelets,
    ActionKind::Pressor,
    ActionKind::StopPressor,
    ActionKind::Oxygen,
    ActionKind::NeutropenicPrecautions,
    ActionKind::PageProvider,
    ActionKind::RapidResponse,
    ActionKind::CheckVitals,
    ActionKind::Wait,
];

impl ActionKind {
    pub const ALL: [ActionKind; 14] = [
        ActionKind::Antibiotic,
        ActionKind::Cultures,
        ActionKind::FluidBolus,
        ActionKind::Prbc,
        ActionKind::Platelets,
        ActionKind::Pressor,
        ActionKind::StopPressor,
        ActionKind::Oxygen,
        ActionKind::NeutropenicPrecautions,
        ActionKind::PageProvider,
        ActionKind::RapidResponse,
        ActionKind::CheckVitals,
        ActionKind::Wait,
        ActionKind::Unknown,
    ];

    /// Stable identifier, as used on the wire and by the classifier.
    pub fn id(&self) -> &'static str {
        match self {
            ActionKind::Antibiotic => "ANTIBIOTIC",
            ActionKind::Cultures => "CULTURES",
            ActionKind::FluidBolus => "FLUID_BOLUS",
            ActionKind::Prbc => "PRBC",
            ActionKind::Platelets => "PLATELETS",
            ActionKind::Pressor => "PRESSOR",
            ActionKind::StopPressor => "STOP_PRESSOR",
            ActionKind::Oxygen => "OXYGEN",
            ActionKind::NeutropenicPrecautions => "NEUTROPENIC_PRECAUTIONS",
            ActionKind::PageProvider => "PAGE_PROVIDER",
            ActionKind::RapidResponse => "RAPID_RESPONSE",
            ActionKind::CheckVitals => "CHECK_VITALS",
            ActionKind::Wait => "WAIT",
            ActionKind::Unknown => "UNKNOWN",
        }
    }

    pub fn from_id(id: &str) -> Option<ActionKind> {
        ActionKind::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Phrases whose presence in normalized text selects this action.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            ActionKind::Antibiotic => &[
                "antibiot", "zosyn", "cefepime", "meropenem", "piptazo", "pip tazo", "pip-tazo",
            ],
            ActionKind::Cultures => &["culture", "blood draw"],
            ActionKind::FluidBolus => &["fluid", "bolus", "lactated", "ringer", "ns", "normal saline"],
            ActionKind::Prbc => &["prbc", "blood unit", "blood transfusion", "start blood"],
            ActionKind::Platelets => &["platelet"],
            ActionKind::Pressor => &["norepinephrine", "levophed", "pressor", "vasopressor"],
            ActionKind::StopPressor => &["stop pressor", "stop levophed", "stop norepi"],
            ActionKind::Oxygen => &["oxygen", "nasal cannula", "nonrebreather", "nc"],
            ActionKind::NeutropenicPrecautions => &["neutropenic", "isolation", "mask", "gown"],
            ActionKind::PageProvider => &[
                "page", "call provider", "call oncology", "call physician", "call doctor",
            ],
            ActionKind::RapidResponse => &["rapid response", "rrt", "code sepsis"],
            ActionKind::CheckVitals => &["check vitals", "reassess", "assess"],
            ActionKind::Wait => &["wait", "hold", "observe"],
            ActionKind::Unknown => &[],
        }
    }

    /// Whether `normalized` text selects this action. `Unknown` matches
    /// everything.
    pub fn matches(&self, normalized: &str) -> bool {
        match self {
            ActionKind::Unknown => true,
            _ => self.keywords().iter().any(|k| normalized.contains(k)),
        }
    }

    /// Static narration used when no narrator output is available.
    pub fn fallback_narration(&self) -> &'static str {
        match self {
            ActionKind::Antibiotic => "Broad antimicrobial coverage starts flowing.",
            ActionKind::FluidBolus => "Crystalloid bolus chases the hypotension.",
            ActionKind::Prbc => "Packed red cells begin to run.",
            ActionKind::Platelets => "Platelets infuse cautiously while you monitor for reactions.",
            ActionKind::Pressor => "Pressor initiated to maintain perfusion.",
            ActionKind::StopPressor => "Pressor tapered as pressures sustain.",
            ActionKind::Cultures => "Cultures obtained without delaying therapy.",
            ActionKind::RapidResponse => "Critical care backup is mobilized.",
            ActionKind::CheckVitals => "Focused reassessment performed.",
            ActionKind::Wait => "Moments pass while you observe the trend.",
            ActionKind::Unknown => {
                "Unclear intervention; clinical trajectory worsens with inaction."
            }
            ActionKind::Oxygen
            | ActionKind::NeutropenicPrecautions
            | ActionKind::PageProvider => "Intervention carried out.",
        }
    }

    /// Apply this action to `state`, recording notices and time cost in `ctx`.
    pub fn execute(&self, state: &mut SimulationState, ctx: &mut ActionContext) {
        match self {
            ActionKind::Antibiotic => start_antibiotic(state, ctx),
            ActionKind::Cultures => draw_cultures(state, ctx),
            ActionKind::FluidBolus => start_fluid_bolus(state, ctx),
            ActionKind::Prbc => start_prbc(state, ctx),
            ActionKind::Platelets => start_platelets(state, ctx),
            ActionKind::Pressor => start_pressor(state, ctx),
            ActionKind::StopPressor => stop_pressor(state, ctx),
            ActionKind::Oxygen => apply_oxygen(state, ctx),
            ActionKind::NeutropenicPrecautions => neutropenic_precautions(state, ctx),
            ActionKind::PageProvider => {
                ctx.spend(1);
                state.flags.provider_paged = true;
                ctx.notice("Primary provider paged with current vitals and interventions.");
            }
            ActionKind::RapidResponse => {
                ctx.spend(1);
                state.flags.rapid_response_called = true;
                ctx.notice("Rapid response activated; critical care team en route.");
            }
            ActionKind::CheckVitals => {
                ctx.spend(3);
                ctx.notice("Focused reassessment completed.");
            }
            ActionKind::Wait => {
                ctx.spend(5);
                ctx.notice("Time passes while the patient remains under observation.");
            }
            ActionKind::Unknown => {
                ctx.spend(DEFAULT_MINUTES);
                ctx.notice("Action not recognized; precious minutes slip by.");
            }
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ActionKind {
    type Err = UnknownActionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::from_id(s.trim()).ok_or_else(|| UnknownActionId(s.to_string()))
    }
}

/// Identifier outside the known action set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action identifier: {0}")]
pub struct UnknownActionId(pub String);

/// Trim and lower-case raw operator text.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

// ============================================================================
// Context
// ============================================================================

/// Per-turn scratch space a handler writes into.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub action_text: String,
    pub normalized: String,
    pub minutes_consumed: u32,
    pub notices: Vec<String>,
}

impl ActionContext {
    /// Blank text is treated the same as no text.
    pub fn new(action_text: Option<&str>) -> Self {
        let action_text = action_text.filter(|text| !text.trim().is_empty());
        Self {
            action_text: action_text.unwrap_or(MISSING_ACTION_TEXT).to_string(),
            normalized: action_text.map(normalize).unwrap_or_default(),
            minutes_consumed: DEFAULT_MINUTES,
            notices: Vec::new(),
        }
    }

    pub fn spend(&mut self, minutes: u32) {
        self.minutes_consumed = minutes;
    }

    pub fn notice(&mut self, text: impl Into<String>) {
        self.notices.push(text.into());
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Immutable, ordered keyword table. Built once and shared by reference.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    order: Vec<ActionKind>,
}

impl ActionRegistry {
    /// Registry in the standard matching order.
    pub fn standard() -> Self {
        Self {
            order: REGISTRATION_ORDER.to_vec(),
        }
    }

    /// Matching order, highest priority first.
    pub fn order(&self) -> &[ActionKind] {
        &self.order
    }

    /// First registered action matching `normalized`, else `Unknown`.
    pub fn resolve(&self, normalized: &str) -> ActionKind {
        if normalized.is_empty() {
            return ActionKind::Unknown;
        }
        self.order
            .iter()
            .copied()
            .find(|kind| kind.matches(normalized))
            .unwrap_or(ActionKind::Unknown)
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn start_antibiotic(state: &mut SimulationState, ctx: &mut ActionContext) {
    if !state.resources.antibiotic_available {
        if state.infusions.antibiotic.active {
            ctx.notice("Antibiotic is already infusing; focus on reassessment.");
        } else {
            ctx.notice("No antibiotic bag is available right now; call pharmacy.");
        }
        return;
    }
    ctx.spend(6);
    let now = state.elapsed_minutes;
    state.infusions.antibiotic.start(now, Some(30));
    state.resources.antibiotic_available = false;
    ctx.notice("Broad-spectrum antibiotic started through the port.");
}

fn draw_cultures(state: &mut SimulationState, ctx: &mut ActionContext) {
    ctx.spend(5);
    if state.flags.cultures_drawn {
        ctx.notice("Cultures already sent earlier.");
        return;
    }
    state.flags.cultures_drawn = true;
    ctx.notice("Two sets of blood cultures obtained from port and peripheral site.");
}

fn start_fluid_bolus(state: &mut SimulationState, ctx: &mut ActionContext) {
    ctx.spend(4);
    if state.infusions.fluids.active {
        ctx.notice("Fluid bolus already running.");
        return;
    }
    let now = state.elapsed_minutes;
    state.infusions.fluids.start(now, Some(20));
    ctx.notice("1 L crystalloid bolus initiated wide open.");
}

fn start_prbc(state: &mut SimulationState, ctx: &mut ActionContext) {
    ctx.spend(10);
    if state.infusions.prbc.active {
        ctx.notice("PRBCs are already infusing.");
        return;
    }
    if state.resources.prbc_eta_minutes > 0 {
        ctx.notice("Blood bank has not delivered the PRBC unit yet.");
        return;
    }
    let now = state.elapsed_minutes;
    state.infusions.prbc.start(now, Some(60));
    ctx.notice("PRBC transfusion started after dual verification.");
}

fn start_platelets(state: &mut SimulationState, ctx: &mut ActionContext) {
    ctx.spend(6);
    if state.infusions.platelets.active {
        ctx.notice("Platelets already infusing.");
        return;
    }
    if !state.resources.platelet_available {
        ctx.notice("No platelet product is present in the med room.");
        return;
    }
    let now = state.elapsed_minutes;
    state.infusions.platelets.start(now, Some(30));
    state.resources.platelet_available = false;
    ctx.notice("Platelet unit started via peripheral IV.");
}

fn start_pressor(state: &mut SimulationState, ctx: &mut ActionContext) {
    ctx.spend(3);
    if state.infusions.pressor.active {
        ctx.notice("Pressor already titrating to maintain MAP.");
        return;
    }
    // Fluids before pressors unless already hypotensive.
    if !state.infusions.fluids.active && state.vitals.map >= PRESSOR_MAP_THRESHOLD {
        ctx.notice("MAP is borderline; initiate fluids before pressors per protocol.");
        return;
    }
    let now = state.elapsed_minutes;
    state.infusions.pressor.start(now, None);
    ctx.notice("Norepinephrine started at 0.05 µg/kg/min via port.");
}

fn stop_pressor(state: &mut SimulationState, ctx: &mut ActionContext) {
    ctx.spend(1);
    if !state.infusions.pressor.active {
        ctx.notice("No pressor infusion to discontinue.");
        return;
    }
    state.infusions.get_mut(InfusionKind::Pressor).stop();
    ctx.notice("Pressor discontinued; continue close MAP monitoring.");
}

fn apply_oxygen(state: &mut SimulationState, ctx: &mut ActionContext) {
    ctx.spend(2);
    state.vitals.spo2 = state.vitals.spo2.max(OXYGEN_SPO2_FLOOR);
    ctx.notice("Oxygen applied at 2 L nasal cannula; saturation improves.");
}

fn neutropenic_precautions(state: &mut SimulationState, ctx: &mut ActionContext) {
    ctx.spend(2);
    if state.flags.neutropenic_precautions {
        ctx.notice("Neutropenic precautions already in place.");
        return;
    }
    state.flags.neutropenic_precautions = true;
    ctx.notice("Neutropenic precautions reinforced and signage updated.");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(kind: ActionKind, state: &mut SimulationState) -> ActionContext {
        let mut ctx = ActionContext::new(Some(kind.id()));
        kind.execute(state, &mut ctx);
        ctx
    }

    #[test]
    fn test_ids_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_id(kind.id()), Some(kind));
            assert_eq!(kind.id().parse::<ActionKind>(), Ok(kind));
        }
        assert!("BOGUS".parse::<ActionKind>().is_err());
        assert_eq!(
            serde_json::to_value(ActionKind::FluidBolus).unwrap(),
            "FLUID_BOLUS"
        );
    }

    #[test]
    fn test_resolve_common_phrases() {
        let registry = ActionRegistry::standard();
        let cases = [
            ("hang broad-spectrum antibiotic via port", ActionKind::Antibiotic),
            ("give pip-tazo", ActionKind::Antibiotic),
            ("draw blood cultures", ActionKind::Cultures),
            ("start 1 liter crystalloid bolus", ActionKind::FluidBolus),
            ("start prbc", ActionKind::Prbc),
            ("hang platelets", ActionKind::Platelets),
            ("start levophed", ActionKind::Pressor),
            ("apply oxygen", ActionKind::Oxygen),
            ("neutropenic isolation", ActionKind::NeutropenicPrecautions),
            ("page provider", ActionKind::PageProvider),
            ("code sepsis", ActionKind::RapidResponse),
            ("check vitals", ActionKind::CheckVitals),
            ("wait", ActionKind::Wait),
            ("juggle", ActionKind::Unknown),
            ("", ActionKind::Unknown),
        ];
        for (text, expected) in cases {
            assert_eq!(registry.resolve(&normalize(text)), expected, "{text}");
        }
    }

    #[test]
    fn test_first_registered_match_wins() {
        let registry = ActionRegistry::standard();
        // "pressor" is registered ahead of "stop pressor".
        assert_eq!(registry.resolve("stop pressor"), ActionKind::Pressor);
        assert_eq!(registry.resolve("stop norepi"), ActionKind::StopPressor);
        // Short keywords match inside other words.
        assert_eq!(registry.resolve("transfuse prbc"), ActionKind::FluidBolus);
        assert_eq!(registry.resolve("page oncology"), ActionKind::Oxygen);
        assert_eq!(registry.order(), &REGISTRATION_ORDER);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Hang ZOSYN \n"), "hang zosyn");
    }

    #[test]
    fn test_context_defaults() {
        let ctx = ActionContext::new(None);
        assert_eq!(ctx.action_text, MISSING_ACTION_TEXT);
        assert_eq!(ctx.normalized, "");
        assert_eq!(ctx.minutes_consumed, DEFAULT_MINUTES);

        let blank = ActionContext::new(Some("   "));
        assert_eq!(blank.action_text, MISSING_ACTION_TEXT);

        let raw = ActionContext::new(Some("  Start Fluids "));
        assert_eq!(raw.action_text, "  Start Fluids ");
        assert_eq!(raw.normalized, "start fluids");
    }

    #[test]
    fn test_antibiotic_consumes_bag() {
        let mut state = SimulationState::new();
        let ctx = run(ActionKind::Antibiotic, &mut state);
        assert_eq!(ctx.minutes_consumed, 6);
        assert!(state.infusions.antibiotic.active);
        assert_eq!(state.infusions.antibiotic.remaining_minutes, Some(30));
        assert!(!state.resources.antibiotic_available);

        let again = run(ActionKind::Antibiotic, &mut state);
        assert_eq!(again.minutes_consumed, DEFAULT_MINUTES);
        assert!(again.notices[0].contains("already infusing"));
    }

    #[test]
    fn test_antibiotic_without_bag() {
        let mut state = SimulationState::new();
        state.resources.antibiotic_available = false;
        let ctx = run(ActionKind::Antibiotic, &mut state);
        assert!(!state.infusions.antibiotic.active);
        assert!(ctx.notices[0].contains("call pharmacy"));
    }

    #[test]
    fn test_cultures_one_shot() {
        let mut state = SimulationState::new();
        run(ActionKind::Cultures, &mut state);
        assert!(state.flags.cultures_drawn);
        let again = run(ActionKind::Cultures, &mut state);
        assert_eq!(again.minutes_consumed, 5);
        assert_eq!(again.notices, vec!["Cultures already sent earlier."]);
    }

    #[test]
    fn test_fluid_bolus_refuses_when_running() {
        let mut state = SimulationState::new();
        let ctx = run(ActionKind::FluidBolus, &mut state);
        assert_eq!(ctx.minutes_consumed, 4);
        assert_eq!(state.infusions.fluids.remaining_minutes, Some(20));
        let again = run(ActionKind::FluidBolus, &mut state);
        assert_eq!(again.notices, vec!["Fluid bolus already running."]);
    }

    #[test]
    fn test_prbc_waits_for_blood_bank() {
        let mut state = SimulationState::new();
        let ctx = run(ActionKind::Prbc, &mut state);
        assert_eq!(ctx.minutes_consumed, 10);
        assert!(!state.infusions.prbc.active);
        assert!(ctx.notices[0].contains("not delivered"));

        state.resources.prbc_eta_minutes = 0;
        run(ActionKind::Prbc, &mut state);
        assert!(state.infusions.prbc.active);
        assert_eq!(state.infusions.prbc.remaining_minutes, Some(60));
    }

    #[test]
    fn test_platelets_consume_product() {
        let mut state = SimulationState::new();
        run(ActionKind::Platelets, &mut state);
        assert!(state.infusions.platelets.active);
        assert!(!state.resources.platelet_available);

        state.infusions.platelets.stop();
        let ctx = run(ActionKind::Platelets, &mut state);
        assert!(!state.infusions.platelets.active);
        assert!(ctx.notices[0].contains("No platelet product"));
    }

    #[test]
    fn test_pressor_requires_fluids_first() {
        let mut state = SimulationState::new();
        assert!(state.vitals.map >= 60.0);
        let ctx = run(ActionKind::Pressor, &mut state);
        assert!(!state.infusions.pressor.active);
        assert!(ctx.notices[0].contains("fluids before pressors"));

        state.infusions.fluids.start(0, Some(20));
        run(ActionKind::Pressor, &mut state);
        assert!(state.infusions.pressor.active);
        assert_eq!(state.infusions.pressor.remaining_minutes, None);
    }

    #[test]
    fn test_pressor_allowed_when_hypotensive() {
        let mut state = SimulationState::new();
        state.vitals.map = 58.0;
        run(ActionKind::Pressor, &mut state);
        assert!(state.infusions.pressor.active);
    }

    #[test]
    fn test_stop_pressor() {
        let mut state = SimulationState::new();
        let idle = run(ActionKind::StopPressor, &mut state);
        assert_eq!(idle.minutes_consumed, 1);
        assert!(idle.notices[0].contains("No pressor"));

        state.infusions.pressor.start(3, None);
        run(ActionKind::StopPressor, &mut state);
        assert!(!state.infusions.pressor.active);
        assert_eq!(state.infusions.pressor.started_at, None);
    }

    #[test]
    fn test_oxygen_sets_floor_only() {
        let mut state = SimulationState::new();
        run(ActionKind::Oxygen, &mut state);
        assert_eq!(state.vitals.spo2, 97.0);

        state.vitals.spo2 = 98.5;
        run(ActionKind::Oxygen, &mut state);
        assert_eq!(state.vitals.spo2, 98.5);
    }

    #[test]
    fn test_team_actions_set_flags() {
        let mut state = SimulationState::new();
        run(ActionKind::PageProvider, &mut state);
        run(ActionKind::RapidResponse, &mut state);
        run(ActionKind::NeutropenicPrecautions, &mut state);
        assert!(state.flags.provider_paged);
        assert!(state.flags.rapid_response_called);
        assert!(state.flags.neutropenic_precautions);
    }

    #[test]
    fn test_passive_actions_cost_time_only() {
        let before = SimulationState::new();
        let mut state = before.clone();
        assert_eq!(run(ActionKind::CheckVitals, &mut state).minutes_consumed, 3);
        assert_eq!(run(ActionKind::Wait, &mut state).minutes_consumed, 5);
        assert_eq!(run(ActionKind::Unknown, &mut state).minutes_consumed, 3);
        assert_eq!(state, before);
    }
}
