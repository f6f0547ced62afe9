//! Irrigation need regression.
//!
//! A ridge model over (moisture, temperature, humidity, rainfall last week)
//! trained on synthetic data, turned into a volume in L/m² and an urgency
//! tier.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use tracing::{debug, info};

use super::linear::RidgeRegression;
use super::scaler::StandardScaler;
use super::{ensure_finite, r2_score, round2, ModelError, ModelResult, ModelState};

// ---

const TRAINING_SAMPLES: usize = 1000;
const RIDGE_ALPHA: f64 = 1.0;
const MAX_VOLUME: f64 = 100.0;

/// Urgency tier derived from the predicted volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Moderate,
    Critical,
}

impl Urgency {
    /// `> 70` critical, `> 40` moderate, otherwise low.
    pub fn from_volume(liters: f64) -> Self {
        // ---
        if liters > 70.0 {
            Urgency::Critical
        } else if liters > 40.0 {
            Urgency::Moderate
        } else {
            Urgency::Low
        }
    }

    pub fn recommendation(self) -> &'static str {
        // ---
        match self {
            Urgency::Critical => "🚨 HIGH PRIORITY: Immediate irrigation needed",
            Urgency::Moderate => "⚡ MODERATE: Schedule irrigation within 6-12 hours",
            Urgency::Low => "✅ OPTIMAL: Soil moisture levels are adequate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrrigationPrediction {
    // ---
    pub irrigation_liters_per_sqm: f64,
    pub recommendation: String,
    pub urgency: Urgency,
    /// Synthetic value in `[0.85, 0.95)`; not a calibrated interval.
    pub confidence: f64,
}

/// Fitted scaler + ridge model, plus the RNG behind the confidence figure.
#[derive(Debug)]
struct TrainedIrrigation {
    scaler: StandardScaler,
    model: RidgeRegression,
    rng: StdRng,
}

#[derive(Debug)]
pub struct IrrigationPredictor {
    // ---
    seed: u64,
    state: Mutex<ModelState<TrainedIrrigation>>,
}

impl IrrigationPredictor {
    // ---
    pub fn new(seed: u64) -> Self {
        // ---
        Self {
            seed,
            state: Mutex::new(ModelState::Untrained),
        }
    }

    pub fn is_trained(&self) -> bool {
        self.state.lock().map(|s| s.is_trained()).unwrap_or(false)
    }

    /// Train now instead of on the first prediction. No-op once trained.
    pub fn train(&self) -> ModelResult<()> {
        // ---
        let mut state = self.lock()?;
        state.ensure_trained(|| fit(self.seed))?;
        Ok(())
    }

    pub fn predict(
        &self,
        moisture: f64,
        temperature: f64,
        humidity: f64,
        rainfall_last_week: f64,
    ) -> ModelResult<IrrigationPrediction> {
        // ---
        ensure_finite(&[
            ("moisture", moisture),
            ("temperature", temperature),
            ("humidity", humidity),
            ("rainfall_last_week", rainfall_last_week),
        ])?;

        let mut state = self.lock()?;
        let trained = state.ensure_trained(|| fit(self.seed))?;

        let features = trained
            .scaler
            .transform(&[moisture, temperature, humidity, rainfall_last_week])?;
        let raw = trained.model.predict(&features)?;
        let liters = raw.clamp(0.0, MAX_VOLUME);
        let urgency = Urgency::from_volume(liters);
        let confidence = trained.rng.gen_range(0.85..0.95);

        debug!(raw, liters, ?urgency, "irrigation prediction");

        Ok(IrrigationPrediction {
            irrigation_liters_per_sqm: round2(liters),
            recommendation: urgency.recommendation().to_string(),
            urgency,
            confidence,
        })
    }

    fn lock(&self) -> ModelResult<std::sync::MutexGuard<'_, ModelState<TrainedIrrigation>>> {
        self.state
            .lock()
            .map_err(|_| ModelError::StatePoisoned("irrigation"))
    }
}

/// Synthetic training set: need falls with moisture, humidity and rain and
/// rises with temperature, plus N(0, 5) noise, clipped to `[0, 100]`.
fn generate_training_data(seed: u64, n_samples: usize) -> ModelResult<(Vec<Vec<f64>>, Vec<f64>)> {
    // ---
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 5.0).map_err(|e| ModelError::InvalidInput(e.to_string()))?;

    let mut rows = Vec::with_capacity(n_samples);
    let mut targets = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let moisture: f64 = rng.gen_range(20.0..70.0);
        let temperature = rng.gen_range(15.0..40.0);
        let humidity = rng.gen_range(30.0..90.0);
        let rainfall = rng.gen_range(0.0..100.0);

        let need = 100.0 - moisture * 1.2 + temperature * 0.8 - humidity * 0.3 - rainfall * 0.4
            + noise.sample(&mut rng);

        rows.push(vec![moisture, temperature, humidity, rainfall]);
        targets.push(need.clamp(0.0, MAX_VOLUME));
    }
    Ok((rows, targets))
}

fn fit(seed: u64) -> ModelResult<TrainedIrrigation> {
    // ---
    let (rows, targets) = generate_training_data(seed, TRAINING_SAMPLES)?;
    let scaler = StandardScaler::fit(&rows)?;
    let scaled = scaler.transform_all(&rows)?;
    let model = RidgeRegression::fit(&scaled, &targets, RIDGE_ALPHA)?;

    let predicted = scaled
        .iter()
        .map(|r| model.predict(r))
        .collect::<ModelResult<Vec<f64>>>()?;
    info!(
        "Irrigation prediction model trained: R² = {:.3}",
        r2_score(&targets, &predicted)
    );

    Ok(TrainedIrrigation {
        scaler,
        model,
        rng: StdRng::seed_from_u64(seed),
    })
}
