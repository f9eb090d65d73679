//! Patient state model.
//!
//! A `SimulationState` is one simulation instant. It is plain data: the
//! rules that move it forward live in `actions`, `clock`, `physiology`
//! and `outcome`.

use crate::outcome::Outcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Severity score of a freshly handed-off patient.
pub const INITIAL_SEVERITY: f64 = 40.0;

/// Lower bound of the severity score.
pub const SEVERITY_MIN: f64 = 0.0;

/// Upper bound of the severity score.
pub const SEVERITY_MAX: f64 = 120.0;

const HANDOFF_ACTION: &str = "Handoff";

const HANDOFF_NARRATION: &str = "61-year-old with AML day 10 post-induction, febrile and hypotensive. \
Antibiotic bag and platelets are on the unit; PRBCs ETA 15 minutes. No therapies have started yet.";

const HANDOFF_NOTICES: [&str; 2] = [
    "Monitor: drowsy but arousable, pale, clammy.",
    "Lines: Port-a-cath and 20G peripheral intact.",
];

// ============================================================================
// Vitals & Labs
// ============================================================================

/// Bedside vitals. Derived from severity each slice; see `physiology`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vitals {
    pub heart_rate: u32,
    /// Mean arterial pressure, mmHg.
    pub map: f64,
    pub systolic: u32,
    pub diastolic: u32,
    pub temperature_c: f64,
    pub respiratory_rate: u32,
    pub spo2: f64,
    /// Serum lactate, mmol/L.
    pub lactate: f64,
}

impl Vitals {
    fn handoff() -> Self {
        Self {
            heart_rate: 128,
            map: 68.0,
            systolic: 92,
            diastolic: 56,
            temperature_c: 39.2,
            respiratory_rate: 24,
            spo2: 94.0,
            lactate: 3.8,
        }
    }
}

/// Laboratory values. Only `hgb` and `platelets` ever change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Labs {
    /// Hemoglobin, g/dL.
    pub hgb: f64,
    /// Platelet count, K/µL.
    pub platelets: u32,
    /// Absolute neutrophil count, cells/µL.
    pub anc: u32,
    pub creatinine: f64,
}

impl Labs {
    fn handoff() -> Self {
        Self {
            hgb: 6.1,
            platelets: 8,
            anc: 160,
            creatinine: 1.4,
        }
    }
}

// ============================================================================
// Presentation tiers
// ============================================================================

/// Level of consciousness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Neuro {
    Alert,
    Drowsy,
    Obtunded,
}

/// Skin perfusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skin {
    Warm,
    Clammy,
    Mottled,
}

/// Urine output trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrineOutput {
    Adequate,
    Drop,
    Anuric,
}

impl Neuro {
    pub fn as_str(&self) -> &'static str {
        match self {
            Neuro::Alert => "alert",
            Neuro::Drowsy => "drowsy",
            Neuro::Obtunded => "obtunded",
        }
    }
}

impl Skin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Skin::Warm => "warm",
            Skin::Clammy => "clammy",
            Skin::Mottled => "mottled",
        }
    }
}

impl UrineOutput {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrineOutput::Adequate => "adequate",
            UrineOutput::Drop => "drop",
            UrineOutput::Anuric => "anuric",
        }
    }
}

impl fmt::Display for Neuro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Skin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for UrineOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three presentation tiers, always set together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub neuro: Neuro,
    pub skin: Skin,
    pub urine: UrineOutput,
}

impl Presentation {
    pub const STABLE: Presentation = Presentation {
        neuro: Neuro::Alert,
        skin: Skin::Warm,
        urine: UrineOutput::Adequate,
    };

    pub const SHOCKED: Presentation = Presentation {
        neuro: Neuro::Drowsy,
        skin: Skin::Clammy,
        urine: UrineOutput::Drop,
    };

    pub const CRITICAL: Presentation = Presentation {
        neuro: Neuro::Obtunded,
        skin: Skin::Mottled,
        urine: UrineOutput::Anuric,
    };
}

// ============================================================================
// Infusions
// ============================================================================

/// The five infusion lines, in the order they are processed each slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfusionKind {
    Antibiotic,
    Fluids,
    Prbc,
    Platelets,
    Pressor,
}

impl InfusionKind {
    pub const ALL: [InfusionKind; 5] = [
        InfusionKind::Antibiotic,
        InfusionKind::Fluids,
        InfusionKind::Prbc,
        InfusionKind::Platelets,
        InfusionKind::Pressor,
    ];

    /// Human-readable name used in prompts and the console.
    pub fn label(&self) -> &'static str {
        match self {
            InfusionKind::Antibiotic => "antibiotics",
            InfusionKind::Fluids => "fluid bolus",
            InfusionKind::Prbc => "blood transfusion",
            InfusionKind::Platelets => "platelets",
            InfusionKind::Pressor => "pressors",
        }
    }
}

/// A single infusion line.
///
/// `remaining_minutes == None` means the line is idle, or (pressor) runs
/// until explicitly stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfusionState {
    pub active: bool,
    pub started_at: Option<u32>,
    pub remaining_minutes: Option<u32>,
}

impl InfusionState {
    /// Start the line at `now`; `duration` of `None` runs until stopped.
    pub fn start(&mut self, now: u32, duration: Option<u32>) {
        self.active = true;
        self.started_at = Some(now);
        self.remaining_minutes = duration;
    }

    /// Deactivate and clear timers.
    pub fn stop(&mut self) {
        self.active = false;
        self.started_at = None;
        self.remaining_minutes = None;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Infusions {
    pub antibiotic: InfusionState,
    pub fluids: InfusionState,
    pub prbc: InfusionState,
    pub platelets: InfusionState,
    pub pressor: InfusionState,
}

impl Infusions {
    pub fn get(&self, kind: InfusionKind) -> &InfusionState {
        match kind {
            InfusionKind::Antibiotic => &self.antibiotic,
            InfusionKind::Fluids => &self.fluids,
            InfusionKind::Prbc => &self.prbc,
            InfusionKind::Platelets => &self.platelets,
            InfusionKind::Pressor => &self.pressor,
        }
    }

    pub fn get_mut(&mut self, kind: InfusionKind) -> &mut InfusionState {
        match kind {
            InfusionKind::Antibiotic => &mut self.antibiotic,
            InfusionKind::Fluids => &mut self.fluids,
            InfusionKind::Prbc => &mut self.prbc,
            InfusionKind::Platelets => &mut self.platelets,
            InfusionKind::Pressor => &mut self.pressor,
        }
    }

    pub fn is_active(&self, kind: InfusionKind) -> bool {
        self.get(kind).active
    }

    /// Kinds currently running, in processing order.
    pub fn active_kinds(&self) -> Vec<InfusionKind> {
        InfusionKind::ALL
            .into_iter()
            .filter(|kind| self.is_active(*kind))
            .collect()
    }
}

// ============================================================================
// Resources, flags, log
// ============================================================================

/// Consumables and blood-bank logistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub antibiotic_available: bool,
    pub platelet_available: bool,
    /// Minutes until the PRBC unit reaches the unit; 0 once delivered.
    pub prbc_eta_minutes: u32,
}

impl Resources {
    fn handoff() -> Self {
        Self {
            antibiotic_available: true,
            platelet_available: true,
            prbc_eta_minutes: 15,
        }
    }
}

/// One-shot team actions. Only ever flipped to `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientFlags {
    pub cultures_drawn: bool,
    pub neutropenic_precautions: bool,
    pub provider_paged: bool,
    pub rapid_response_called: bool,
}

/// One entry of the turn log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub at_minute: u32,
    pub action: String,
    pub narration: String,
    pub notices: Vec<String>,
}

impl LogEntry {
    /// The synthetic entry every run starts with.
    pub fn handoff() -> Self {
        Self {
            at_minute: 0,
            action: HANDOFF_ACTION.to_string(),
            narration: HANDOFF_NARRATION.to_string(),
            notices: HANDOFF_NOTICES.iter().map(|n| n.to_string()).collect(),
        }
    }
}

// ============================================================================
// SimulationState
// ============================================================================

/// The complete simulation state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub elapsed_minutes: u32,
    /// Latent severity accumulator in `[0, 120]`; drives every derived vital.
    pub severity_score: f64,
    pub vitals: Vitals,
    pub labs: Labs,
    pub urine_output_trend: UrineOutput,
    pub neuro: Neuro,
    pub skin: Skin,
    pub infusions: Infusions,
    pub resources: Resources,
    pub flags: PatientFlags,
    pub outcome: Outcome,
    pub log: Vec<LogEntry>,
}

impl SimulationState {
    /// Fresh patient at handoff.
    pub fn new() -> Self {
        Self {
            elapsed_minutes: 0,
            severity_score: INITIAL_SEVERITY,
            vitals: Vitals::handoff(),
            labs: Labs::handoff(),
            urine_output_trend: UrineOutput::Drop,
            neuro: Neuro::Drowsy,
            skin: Skin::Clammy,
            infusions: Infusions::default(),
            resources: Resources::handoff(),
            flags: PatientFlags::default(),
            outcome: Outcome::Ongoing,
            log: vec![LogEntry::handoff()],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }

    pub fn presentation(&self) -> Presentation {
        Presentation {
            neuro: self.neuro,
            skin: self.skin,
            urine: self.urine_output_trend,
        }
    }

    pub fn set_presentation(&mut self, presentation: Presentation) {
        self.neuro = presentation.neuro;
        self.skin = presentation.skin;
        self.urine_output_trend = presentation.urine;
    }

    /// Most recent log entry.
    pub fn latest_entry(&self) -> Option<&LogEntry> {
        self.log.last()
    }

    /// Read-only projection handed to callers outside the engine.
    pub fn public_view(&self) -> PublicState {
        PublicState(self.clone())
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only projection of a `SimulationState`.
///
/// Every field is operator-visible; the wrapper only withholds mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicState(SimulationState);

impl PublicState {
    pub fn into_inner(self) -> SimulationState {
        self.0
    }
}

impl Deref for PublicState {
    type Target = SimulationState;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&SimulationState> for PublicState {
    fn from(state: &SimulationState) -> Self {
        state.public_view()
    }
}
