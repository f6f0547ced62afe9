//! Yield forecasting and harvest timing.
//!
//! A random-forest regressor maps seasonal averages plus growing days to a
//! yield in kg/ha. The forecast re-queries it at a few future day counts and
//! takes the best one as the harvest point.

use std::sync::Mutex;

use chrono::{Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use tracing::{debug, info};

use super::forest::{ForestConfig, RandomForest, Task};
use super::scaler::StandardScaler;
use super::{ensure_finite, r2_score, round2, ModelError, ModelResult, ModelState};
use crate::models::SeasonalInputs;

// ---

const TRAINING_SAMPLES: usize = 500;
const BASE_YIELD: f64 = 5000.0;
const MIN_YIELD: f64 = 2000.0;
const MAX_YIELD: f64 = 8000.0;

/// Upper bound (exclusive) of the harvest sweep, in growing days.
pub const SEASON_LENGTH_DAYS: u32 = 120;
const SWEEP_HORIZON_DAYS: u32 = 30;
const SWEEP_STEP_DAYS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldPrediction {
    // ---
    pub predicted_yield_kg_per_ha: f64,
    /// `YYYY-MM-DD`
    pub optimal_harvest_date: String,
    pub days_to_harvest: u32,
    pub current_yield_estimate: f64,
    /// Synthetic value in `[0.82, 0.95)`.
    pub confidence: f64,
}

/// Candidate day counts to evaluate, starting at `current`.
///
/// Once `current` reaches the end of the season the sweep would be empty;
/// it falls back to `current` alone.
pub fn harvest_sweep(current: u32) -> Vec<u32> {
    // ---
    let end = (current.saturating_add(SWEEP_HORIZON_DAYS)).min(SEASON_LENGTH_DAYS);
    let days: Vec<u32> = (current..end).step_by(SWEEP_STEP_DAYS).collect();
    if days.is_empty() {
        vec![current]
    } else {
        days
    }
}

/// Agronomic yield rule behind the training set, before noise and clipping.
fn synthetic_yield(features: &[f64; 6], noise: f64) -> f64 {
    // ---
    let [moisture, temperature, _humidity, light, rainfall, days] = *features;

    let moisture_factor = (moisture - 35.0) / 20.0;
    let temp_factor = 1.0 - (temperature - 25.0).abs() / 10.0;
    let light_factor = (light - 400.0) / 400.0;
    let rainfall_factor = (rainfall - 300.0) / 500.0;
    let time_factor = (days / 90.0).min(1.0);

    let yield_kg = BASE_YIELD
        * (1.0
            + moisture_factor * 0.3
            + temp_factor * 0.25
            + light_factor * 0.2
            + rainfall_factor * 0.15
            + time_factor * 0.1
            + noise);
    yield_kg.clamp(MIN_YIELD, MAX_YIELD)
}

#[derive(Debug)]
struct TrainedYield {
    scaler: StandardScaler,
    forest: RandomForest,
    rng: StdRng,
}

impl TrainedYield {
    fn predict_yield(&self, row: &[f64]) -> ModelResult<f64> {
        // ---
        let features = self.scaler.transform(row)?;
        Ok(self.forest.predict_value(&features)?.clamp(MIN_YIELD, MAX_YIELD))
    }
}

#[derive(Debug)]
pub struct YieldForecaster {
    // ---
    seed: u64,
    n_trees: usize,
    state: Mutex<ModelState<TrainedYield>>,
}

impl YieldForecaster {
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

    /// Forecast with today's UTC date as the reference for the harvest date.
    ///
    /// Near midnight the UTC day can differ from the server's local day;
    /// callers that need a specific calendar use [`Self::predict_from`].
    pub fn predict(&self, inputs: &SeasonalInputs) -> ModelResult<YieldPrediction> {
        self.predict_from(inputs, Utc::now().date_naive())
    }

    pub fn predict_from(
        &self,
        inputs: &SeasonalInputs,
        today: NaiveDate,
    ) -> ModelResult<YieldPrediction> {
        // ---
        ensure_finite(&[
            ("avg_moisture", inputs.avg_moisture),
            ("avg_temperature", inputs.avg_temperature),
            ("avg_humidity", inputs.avg_humidity),
            ("avg_light", inputs.avg_light),
            ("rainfall_total", inputs.rainfall_total),
        ])?;

        let mut state = self.lock()?;
        let trained = state.ensure_trained(|| fit(self.seed, self.n_trees))?;

        let current = inputs.growing_days;
        let mut forecasts = Vec::new();
        for days in harvest_sweep(current) {
            let row = [
                inputs.avg_moisture,
                inputs.avg_temperature,
                inputs.avg_humidity,
                inputs.avg_light,
                inputs.rainfall_total,
                f64::from(days),
            ];
            forecasts.push((days, trained.predict_yield(&row)?));
        }

        // harvest_sweep never returns an empty list and starts at `current`
        let (_, current_estimate) = forecasts[0];
        let (optimal_days, max_yield) = forecasts
            .iter()
            .copied()
            .fold(forecasts[0], |best, f| if f.1 > best.1 { f } else { best });

        let days_to_harvest = optimal_days - current;
        let harvest_date = today + Duration::days(i64::from(days_to_harvest));
        let confidence = trained.rng.gen_range(0.82..0.95);

        debug!(current, optimal_days, max_yield, "yield forecast");

        Ok(YieldPrediction {
            predicted_yield_kg_per_ha: round2(max_yield),
            optimal_harvest_date: harvest_date.format("%Y-%m-%d").to_string(),
            days_to_harvest,
            current_yield_estimate: round2(current_estimate),
            confidence,
        })
    }

    fn lock(&self) -> ModelResult<std::sync::MutexGuard<'_, ModelState<TrainedYield>>> {
        self.state
            .lock()
            .map_err(|_| ModelError::StatePoisoned("yield"))
    }
}

fn generate_training_data(seed: u64, n_samples: usize) -> ModelResult<(Vec<Vec<f64>>, Vec<f64>)> {
    // ---
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.1).map_err(|e| ModelError::InvalidInput(e.to_string()))?;

    let mut rows = Vec::with_capacity(n_samples);
    let mut targets = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let features = [
            rng.gen_range(35.0..55.0),
            rng.gen_range(20.0..30.0),
            rng.gen_range(50.0..75.0),
            rng.gen_range(400.0..800.0),
            rng.gen_range(300.0..800.0),
            f64::from(rng.gen_range(60u32..120)),
        ];
        targets.push(synthetic_yield(&features, noise.sample(&mut rng)));
        rows.push(features.to_vec());
    }
    Ok((rows, targets))
}

fn fit(seed: u64, n_trees: usize) -> ModelResult<TrainedYield> {
    // ---
    let (rows, targets) = generate_training_data(seed, TRAINING_SAMPLES)?;
    let scaler = StandardScaler::fit(&rows)?;
    let scaled = scaler.transform_all(&rows)?;
    let forest = RandomForest::fit(
        &scaled,
        &targets,
        Task::Regression,
        &ForestConfig::regressor(n_trees, seed),
    )?;

    let predicted = scaled
        .iter()
        .map(|r| forest.predict_value(r))
        .collect::<ModelResult<Vec<f64>>>()?;
    info!(
        "Yield prediction model trained: R² = {:.3}",
        r2_score(&targets, &predicted)
    );

    Ok(TrainedYield {
        scaler,
        forest,
        rng: StdRng::seed_from_u64(seed),
    })
}
