//! `loadscope-workload`: workload capacity engine.
//!
//! Pure engine crate: receives pre-loaded work records and a weight snapshot, returns
//! per-person capacity summaries, data-quality issues and move simulations.
//! No CLI or file-system dependencies; loaders take already-read strings.

pub mod aggregate;
pub mod audit;
pub mod classify;
pub mod config;
pub mod effort;
pub mod engine;
pub mod error;
pub mod hours;
pub mod model;
pub mod simulate;

pub use aggregate::aggregate_person;
pub use audit::audit;
pub use config::{EngineConfig, WeightConfig};
pub use effort::classify_effort;
pub use engine::{compute, run_audit};
pub use error::EngineError;
pub use hours::calculate_hours;
pub use model::{ComputeOutput, DataQualityIssue, PersonCapacitySummary, WorkRecord};
pub use simulate::{rank_candidates, simulate_move};
