//! Advanced Router (spec §4.C) and Persona Router (spec §4.D).

pub mod advanced;
pub mod complexity;
pub mod context;
pub mod persona;

pub use advanced::{AdvancedRouter, ScoringWeights};
pub use complexity::classify_complexity;
pub use context::extract_context;
pub use persona::select_persona;
