//! Library surface of the `codemetal-agrisense` backend service.
//!
//! The binary in `main.rs` only wires up tracing, configuration and the
//! listener; everything that can be tested lives here:
//! - `ml` – the four predictors and the numeric building blocks they share
//! - `analysis` – the aggregator that fans a reading out to every predictor
//! - `routes` – the axum gateway, one subrouter per concern
//!
//! This crate follows the Explicit Module Boundary Pattern (EMBP): sibling
//! modules reach each other only through the re-exports below, never through
//! each other's internals.

pub mod analysis;
pub mod config;
pub mod ml;
pub mod models;
pub mod routes;
pub mod state;

pub use analysis::{AgricultureSystem, AnalysisReport, Outcome, Priority, Recommendation};
pub use config::Config;
pub use models::{ReadingPatch, SensorReading, ValidationError};
pub use state::AppState;
