//! Turn-based neutropenic sepsis simulation engine.
//!
//! This crate provides:
//! - A patient state model driven by a single latent severity score
//! - Free-text nurse actions resolved through an ordered keyword table
//! - Sliced time advancement with infusion timers and blood-bank delivery
//! - Optional Claude-backed intent classification and narration
//! - Sealed state tokens so a server can stay stateless
//!
//! # Quick Start
//!
//! ```ignore
//! use sepsis_core::{Engine, SimConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Engine::from_config(&SimConfig::from_env());
//!
//!     let start = engine.start();
//!     let turn = engine
//!         .advance_turn(Some(&start.state), Some("hang broad-spectrum antibiotic"))
//!         .await;
//!     println!("{}", turn.log_entry.narration);
//! }
//! ```

pub mod actions;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod outcome;
pub mod physiology;
pub mod service;
pub mod state;
pub mod testing;
pub mod token;

// Primary public API
pub use actions::{ActionKind, ActionRegistry};
pub use collaborators::{Collaborators, IntentClassifier, Narration, Narrator};
pub use config::SimConfig;
pub use engine::{Engine, TurnResult};
pub use outcome::Outcome;
pub use service::{ServiceError, SimulationService, TurnRequest, TurnResponse};
pub use state::{InfusionKind, LogEntry, PublicState, SimulationState};
pub use testing::{ScriptedClassifier, ScriptedNarrator, TurnHarness};
pub use token::{TokenCodec, TokenError};
