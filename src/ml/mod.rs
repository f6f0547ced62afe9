//! Predictors and the numeric building blocks they share.
//!
//! Gateway module (EMBP): the predictors are public, the fitting machinery
//! (`scaler`, `linear`, `forest`) stays crate-private and is reached through
//! the predictors only.

use thiserror::Error;

mod forest;
mod linear;
mod scaler;

pub mod anomaly;
pub mod crop_health;
pub mod irrigation;
pub mod yield_forecast;

pub use anomaly::{AnomalyDetector, AnomalyEvent, Channel, Severity};
pub use crop_health::{CropHealthClassifier, HealthPrediction, HealthProbabilities, HealthStatus};
pub use irrigation::{IrrigationPrediction, IrrigationPredictor, Urgency};
pub use yield_forecast::{YieldForecaster, YieldPrediction};

// ---

/// Errors raised while fitting or querying a model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    // ---
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not enough training data")]
    InsufficientData,

    #[error("feature dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("normal equations are singular")]
    SingularMatrix,

    #[error("model is not trained")]
    NotTrained,

    #[error("model state lock poisoned: {0}")]
    StatePoisoned(&'static str),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Lifecycle of a lazily trained model.
///
/// The only transition is `Untrained -> Trained`, made by
/// [`ModelState::ensure_trained`] while the caller holds the owning lock.
#[derive(Debug, Default)]
pub enum ModelState<M> {
    #[default]
    Untrained,
    Trained(M),
}

impl<M> ModelState<M> {
    // ---
    pub fn is_trained(&self) -> bool {
        matches!(self, ModelState::Trained(_))
    }

    /// Run `train` if no model exists yet, then hand out the trained model.
    pub fn ensure_trained<F>(&mut self, train: F) -> ModelResult<&mut M>
    where
        F: FnOnce() -> ModelResult<M>,
    {
        // ---
        if !self.is_trained() {
            *self = ModelState::Trained(train()?);
        }
        match self {
            ModelState::Trained(model) => Ok(model),
            ModelState::Untrained => Err(ModelError::NotTrained),
        }
    }
}

/// Reject NaN and infinities before they reach a model.
pub(crate) fn ensure_finite(inputs: &[(&'static str, f64)]) -> ModelResult<()> {
    // ---
    for (name, value) in inputs {
        if !value.is_finite() {
            return Err(ModelError::InvalidInput(format!(
                "{name} must be a finite number, got {value}"
            )));
        }
    }
    Ok(())
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Coefficient of determination of `predicted` against `actual`.
pub(crate) fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    // ---
    let n = actual.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    1.0 - ss_res / ss_tot
}
