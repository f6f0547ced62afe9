//! Crop health classification.
//!
//! A random forest labels a reading as Healthy, Moderate Stress or High
//! Stress. The textual advice is derived from raw thresholds on the inputs
//! and does not consult the forest, so the two can disagree.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use super::forest::{ForestConfig, RandomForest, Task};
use super::scaler::StandardScaler;
use super::{ensure_finite, ModelError, ModelResult, ModelState};

// ---

const TRAINING_SAMPLES: usize = 1000;

/// Class labels, in the index order the forest is trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    #[serde(rename = "High Stress")]
    HighStress,
    #[serde(rename = "Moderate Stress")]
    ModerateStress,
    #[serde(rename = "Healthy")]
    Healthy,
}

impl HealthStatus {
    const ALL: [HealthStatus; 3] = [
        HealthStatus::HighStress,
        HealthStatus::ModerateStress,
        HealthStatus::Healthy,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Label rule used to build the training set: ≥6 points is high stress,
    /// ≥3 moderate.
    pub fn from_stress_score(score: u32) -> Self {
        // ---
        match score {
            s if s >= 6 => HealthStatus::HighStress,
            s if s >= 3 => HealthStatus::ModerateStress,
            _ => HealthStatus::Healthy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthProbabilities {
    pub healthy: f64,
    pub moderate_stress: f64,
    pub high_stress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthPrediction {
    // ---
    pub health_status: HealthStatus,
    /// Probability of `health_status`.
    pub confidence: f64,
    pub probabilities: HealthProbabilities,
    pub recommendations: Vec<String>,
}

/// Additive stress points for one reading.
pub fn stress_score(moisture: f64, temperature: f64, humidity: f64, light: f64) -> u32 {
    // ---
    let mut score = 0;

    if moisture < 30.0 {
        score += 3;
    } else if moisture < 35.0 {
        score += 2;
    } else if moisture > 60.0 {
        score += 1;
    }

    if temperature > 35.0 {
        score += 3;
    } else if temperature > 30.0 || temperature < 18.0 {
        score += 2;
    }

    if !(35.0..=85.0).contains(&humidity) {
        score += 2;
    }

    if light < 200.0 {
        score += 2;
    }

    score
}

/// Advice derived straight from the raw readings.
pub fn recommendations(moisture: f64, temperature: f64, humidity: f64, light: f64) -> Vec<String> {
    // ---
    let mut advice = Vec::new();
    if moisture < 35.0 {
        advice.push("Increase irrigation frequency".to_string());
    }
    if temperature > 30.0 {
        advice.push("Provide shade or cooling during peak hours".to_string());
    }
    if humidity < 40.0 {
        advice.push("Consider misting to increase humidity".to_string());
    }
    if light < 300.0 {
        advice.push("Ensure adequate light exposure".to_string());
    }
    if advice.is_empty() {
        advice.push("Maintain current management practices".to_string());
    }
    advice
}

#[derive(Debug)]
struct TrainedHealth {
    scaler: StandardScaler,
    forest: RandomForest,
}

#[derive(Debug)]
pub struct CropHealthClassifier {
    // ---
    seed: u64,
    n_trees: usize,
    state: Mutex<ModelState<TrainedHealth>>,
}

impl CropHealthClassifier {
    // ---
    pub fn new(seed: u64, n_trees: usize) -> Self {
        // ---
        Self {
            seed,
            n_trees,
            state: Mutex::new(ModelState::Untrained),
        }
    }

    pub fn is_trained(&self) -> bool {
        self.state.lock().map(|s| s.is_trained()).unwrap_or(false)
    }

    pub fn train(&self) -> ModelResult<()> {
        // ---
        let mut state = self.lock()?;
        state.ensure_trained(|| fit(self.seed, self.n_trees))?;
        Ok(())
    }

    pub fn predict(
        &self,
        moisture: f64,
        temperature: f64,
        humidity: f64,
        light: f64,
    ) -> ModelResult<HealthPrediction> {
        // ---
        ensure_finite(&[
            ("moisture", moisture),
            ("temperature", temperature),
            ("humidity", humidity),
            ("light", light),
        ])?;

        let mut state = self.lock()?;
        let trained = state.ensure_trained(|| fit(self.seed, self.n_trees))?;

        let features = trained
            .scaler
            .transform(&[moisture, temperature, humidity, light])?;
        let probs = trained.forest.predict(&features)?;

        // First maximum wins, matching the class index order
        let status = HealthStatus::ALL
            .into_iter()
            .fold(HealthStatus::HighStress, |best, candidate| {
                if probs[candidate.index()] > probs[best.index()] {
                    candidate
                } else {
                    best
                }
            });

        debug!(?status, ?probs, "crop health prediction");

        Ok(HealthPrediction {
            health_status: status,
            confidence: probs[status.index()],
            probabilities: HealthProbabilities {
                healthy: probs[HealthStatus::Healthy.index()],
                moderate_stress: probs[HealthStatus::ModerateStress.index()],
                high_stress: probs[HealthStatus::HighStress.index()],
            },
            recommendations: recommendations(moisture, temperature, humidity, light),
        })
    }

    fn lock(&self) -> ModelResult<std::sync::MutexGuard<'_, ModelState<TrainedHealth>>> {
        self.state
            .lock()
            .map_err(|_| ModelError::StatePoisoned("crop_health"))
    }
}

fn generate_training_data(seed: u64, n_samples: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    // ---
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);

    for _ in 0..n_samples {
        let moisture: f64 = rng.gen_range(20.0..70.0);
        let temperature = rng.gen_range(15.0..40.0);
        let humidity = rng.gen_range(30.0..90.0);
        let light = rng.gen_range(100.0..1000.0);

        let label = HealthStatus::from_stress_score(stress_score(
            moisture,
            temperature,
            humidity,
            light,
        ));
        rows.push(vec![moisture, temperature, humidity, light]);
        labels.push(label.index() as f64);
    }
    (rows, labels)
}

fn fit(seed: u64, n_trees: usize) -> ModelResult<TrainedHealth> {
    // ---
    let (rows, labels) = generate_training_data(seed, TRAINING_SAMPLES);
    let scaler = StandardScaler::fit(&rows)?;
    let scaled = scaler.transform_all(&rows)?;
    let forest = RandomForest::fit(
        &scaled,
        &labels,
        Task::Classification {
            n_classes: HealthStatus::ALL.len(),
        },
        &ForestConfig::classifier(n_trees, seed),
    )?;

    let mut correct = 0usize;
    for (row, label) in scaled.iter().zip(&labels) {
        let probs = forest.predict(row)?;
        let predicted = probs
            .iter()
            .enumerate()
            .fold(0, |best, (i, p)| if *p > probs[best] { i } else { best });
        if predicted as f64 == *label {
            correct += 1;
        }
    }
    info!(
        "Crop health classification model trained: accuracy = {:.3}",
        correct as f64 / labels.len() as f64
    );

    Ok(TrainedHealth { scaler, forest })
}
