//! Aggregator that fans one reading out to every predictor.
//!
//! `AgricultureSystem` owns the four predictors. `analyze` collects their
//! outputs into an [`AnalysisReport`] and ranks the findings with a fixed
//! cascade of rules. A predictor that fails is reported in its slot; the
//! rest of the report is still produced.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::ml::{
    AnomalyDetector, AnomalyEvent, CropHealthClassifier, HealthPrediction, HealthStatus,
    IrrigationPrediction, IrrigationPredictor, ModelResult, Severity, Urgency, YieldForecaster,
    YieldPrediction,
};
use crate::{Config, SensorReading};

// ---

/// Harvest this close (in days) earns a planning recommendation.
const HARVEST_PLANNING_WINDOW_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Critical,
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    // ---
    pub priority: Priority,
    pub category: String,
    pub message: String,
    pub action: String,
}

impl Recommendation {
    fn new(priority: Priority, category: &str, message: String, action: String) -> Self {
        Self {
            priority,
            category: category.to_string(),
            message,
            action,
        }
    }
}

/// Result of one predictor inside a report: its output, or why it failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    Ok(T),
    Failed { error: String },
}

impl<T> Outcome<T> {
    fn from_result(model: &str, result: ModelResult<T>) -> Self {
        // ---
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(e) => {
                error!("{} prediction failed: {}", model, e);
                Outcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    pub fn ok(&self) -> Option<&T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    // ---
    pub timestamp: DateTime<Utc>,
    pub sensor_readings: SensorReading,
    pub irrigation: Outcome<IrrigationPrediction>,
    pub crop_health: Outcome<HealthPrediction>,
    pub yield_prediction: Outcome<YieldPrediction>,
    pub anomalies: Outcome<Vec<AnomalyEvent>>,
    pub recommendations: Vec<Recommendation>,
}

/// All four predictors behind one facade.
#[derive(Debug)]
pub struct AgricultureSystem {
    // ---
    pub irrigation: IrrigationPredictor,
    pub crop_health: CropHealthClassifier,
    pub yield_forecast: YieldForecaster,
    pub anomalies: AnomalyDetector,
}

impl AgricultureSystem {
    // ---
    /// Build the predictors; with `eager_training` set, fit them now.
    pub fn new(config: &Config) -> ModelResult<Self> {
        // ---
        let n_trees = config.forest_trees as usize;
        let system = Self {
            irrigation: IrrigationPredictor::new(config.model_seed),
            crop_health: CropHealthClassifier::new(config.model_seed, n_trees),
            yield_forecast: YieldForecaster::new(config.model_seed, n_trees),
            anomalies: AnomalyDetector::new(config.history_capacity as usize),
        };

        if config.eager_training {
            info!("Training AI models...");
            system.train_all()?;
            info!("All models trained");
        }
        Ok(system)
    }

    pub fn train_all(&self) -> ModelResult<()> {
        // ---
        self.irrigation.train()?;
        self.crop_health.train()?;
        self.yield_forecast.train()?;
        Ok(())
    }

    pub fn is_trained(&self) -> bool {
        self.irrigation.is_trained()
            && self.crop_health.is_trained()
            && self.yield_forecast.is_trained()
    }

    pub fn predict_irrigation(&self, reading: &SensorReading) -> ModelResult<IrrigationPrediction> {
        // Live readings carry no weekly rainfall figure
        self.irrigation
            .predict(reading.moisture, reading.temperature, reading.humidity, 0.0)
    }

    pub fn predict_health(&self, reading: &SensorReading) -> ModelResult<HealthPrediction> {
        self.crop_health.predict(
            reading.moisture,
            reading.temperature,
            reading.humidity,
            reading.light,
        )
    }

    pub fn predict_yield(&self, reading: &SensorReading) -> ModelResult<YieldPrediction> {
        self.yield_forecast.predict(&reading.seasonal())
    }

    pub fn detect_anomalies(&self, reading: &SensorReading) -> ModelResult<Vec<AnomalyEvent>> {
        self.anomalies.detect(
            reading.moisture,
            reading.temperature,
            reading.humidity,
            reading.light,
        )
    }

    /// Run every predictor on `reading` and rank the combined findings.
    pub fn analyze(&self, reading: &SensorReading) -> AnalysisReport {
        // ---
        let irrigation = Outcome::from_result("irrigation", self.predict_irrigation(reading));
        let crop_health = Outcome::from_result("crop_health", self.predict_health(reading));
        let yield_prediction = Outcome::from_result("yield", self.predict_yield(reading));
        let anomalies = Outcome::from_result("anomaly", self.detect_anomalies(reading));

        let recommendations = generate_recommendations(
            anomalies.ok().map(Vec::as_slice),
            irrigation.ok(),
            crop_health.ok(),
            yield_prediction.ok(),
        );

        AnalysisReport {
            timestamp: Utc::now(),
            sensor_readings: reading.clone(),
            irrigation,
            crop_health,
            yield_prediction,
            anomalies,
            recommendations,
        }
    }
}

/// Fixed priority cascade. Output order is rule order; missing inputs skip
/// their rule.
pub fn generate_recommendations(
    anomalies: Option<&[AnomalyEvent]>,
    irrigation: Option<&IrrigationPrediction>,
    health: Option<&HealthPrediction>,
    harvest: Option<&YieldPrediction>,
) -> Vec<Recommendation> {
    // ---
    let mut recommendations = Vec::new();

    for anomaly in anomalies
        .unwrap_or_default()
        .iter()
        .filter(|a| a.severity == Severity::Critical)
    {
        recommendations.push(Recommendation::new(
            Priority::Critical,
            "Anomaly",
            anomaly.message.clone(),
            anomaly.action.clone(),
        ));
    }

    if let Some(irrigation) = irrigation.filter(|i| i.urgency == Urgency::Critical) {
        recommendations.push(Recommendation::new(
            Priority::High,
            "Irrigation",
            irrigation.recommendation.clone(),
            format!("Irrigate with {} L/m²", irrigation.irrigation_liters_per_sqm),
        ));
    }

    if let Some(health) = health.filter(|h| h.health_status == HealthStatus::HighStress) {
        for advice in &health.recommendations {
            recommendations.push(Recommendation::new(
                Priority::High,
                "Crop Health",
                "Crops under high stress".to_string(),
                advice.clone(),
            ));
        }
    }

    if let Some(harvest) =
        harvest.filter(|y| y.days_to_harvest <= HARVEST_PLANNING_WINDOW_DAYS)
    {
        recommendations.push(Recommendation::new(
            Priority::Medium,
            "Harvest Planning",
            format!("Optimal harvest in {} days", harvest.days_to_harvest),
            "Prepare for harvest operations".to_string(),
        ));
    }

    recommendations
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::ml::HealthProbabilities;

    fn test_config() -> Config {
        // ---
        Config {
            forest_trees: 10,
            eager_training: false,
            ..Config::default()
        }
    }

    fn sample_reading() -> SensorReading {
        // ---
        SensorReading {
            moisture: 32.5,
            temperature: 28.3,
            humidity: 62.0,
            light: 650.0,
            avg_moisture: Some(42.0),
            avg_temperature: Some(26.5),
            avg_humidity: Some(65.0),
            avg_light: Some(600.0),
            rainfall_total: Some(450.0),
            growing_days: Some(65),
        }
    }

    fn critical_anomaly(message: &str) -> AnomalyEvent {
        // ---
        AnomalyEvent {
            kind: "Sudden Moisture Loss".to_string(),
            severity: Severity::Critical,
            message: message.to_string(),
            timestamp: Utc::now(),
            action: "Check irrigation system for leaks or malfunctions".to_string(),
        }
    }

    fn irrigation(urgency: Urgency, liters: f64) -> IrrigationPrediction {
        // ---
        IrrigationPrediction {
            irrigation_liters_per_sqm: liters,
            recommendation: urgency.recommendation().to_string(),
            urgency,
            confidence: 0.9,
        }
    }

    fn health(status: HealthStatus, advice: &[&str]) -> HealthPrediction {
        // ---
        HealthPrediction {
            health_status: status,
            confidence: 1.0,
            probabilities: HealthProbabilities {
                healthy: 0.0,
                moderate_stress: 0.0,
                high_stress: 1.0,
            },
            recommendations: advice.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn harvest(days: u32) -> YieldPrediction {
        // ---
        YieldPrediction {
            predicted_yield_kg_per_ha: 6000.0,
            optimal_harvest_date: "2025-06-01".to_string(),
            days_to_harvest: days,
            current_yield_estimate: 5500.0,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_cascade_order() {
        // ---
        let mut info = critical_anomaly("ignored");
        info.severity = Severity::Info;
        let anomalies = vec![critical_anomaly("first"), info, critical_anomaly("second")];
        let irr = irrigation(Urgency::Critical, 88.5);
        let hp = health(
            HealthStatus::HighStress,
            &["Increase irrigation frequency", "Ensure adequate light exposure"],
        );
        let yp = harvest(5);

        let recs = generate_recommendations(
            Some(anomalies.as_slice()),
            Some(&irr),
            Some(&hp),
            Some(&yp),
        );

        let summary: Vec<(Priority, &str)> =
            recs.iter().map(|r| (r.priority, r.category.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (Priority::Critical, "Anomaly"),
                (Priority::Critical, "Anomaly"),
                (Priority::High, "Irrigation"),
                (Priority::High, "Crop Health"),
                (Priority::High, "Crop Health"),
                (Priority::Medium, "Harvest Planning"),
            ]
        );
        assert_eq!(recs[0].message, "first");
        assert_eq!(recs[1].message, "second");
        assert_eq!(recs[2].action, "Irrigate with 88.5 L/m²");
        assert_eq!(recs[4].action, "Ensure adequate light exposure");
        assert_eq!(recs[5].message, "Optimal harvest in 5 days");
    }

    #[test]
    fn test_quiet_conditions_produce_nothing() {
        // ---
        let irr = irrigation(Urgency::Moderate, 55.0);
        let hp = health(HealthStatus::ModerateStress, &["Increase irrigation frequency"]);
        let yp = harvest(8);

        let recs = generate_recommendations(Some(&[][..]), Some(&irr), Some(&hp), Some(&yp));
        assert!(recs.is_empty());
    }

    #[test]
    fn test_failed_predictors_skip_their_rules() {
        // ---
        let yp = harvest(0);
        let recs = generate_recommendations(None, None, None, Some(&yp));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].priority, Priority::Medium);
    }

    #[test]
    fn test_lazy_system_trains_on_first_analysis() {
        // ---
        let system = AgricultureSystem::new(&test_config()).unwrap();
        assert!(!system.is_trained());

        system.analyze(&sample_reading());
        assert!(system.is_trained());
    }

    #[test]
    fn test_end_to_end_sample_reading() {
        // ---
        let system = AgricultureSystem::new(&test_config()).unwrap();
        let report = system.analyze(&sample_reading());

        let health = report.crop_health.ok().unwrap();
        assert!(health
            .recommendations
            .contains(&"Increase irrigation frequency".to_string()));

        let yp = report.yield_prediction.ok().unwrap();
        assert!(yp.days_to_harvest <= 30);

        let irr = report.irrigation.ok().unwrap();
        assert!((0.0..=100.0).contains(&irr.irrigation_liters_per_sqm));

        // First reading: no previous value, nothing out of range
        assert!(report.anomalies.ok().unwrap().is_empty());
    }

    #[test]
    fn test_anomaly_recommendation_precedes_irrigation() {
        // ---
        let system = AgricultureSystem::new(&test_config()).unwrap();
        let mut reading = sample_reading();
        reading.moisture = 50.0;
        system.analyze(&reading);

        // Moisture crash on a hot, dry day
        reading.moisture = 20.0;
        reading.temperature = 40.0;
        reading.humidity = 30.0;
        let report = system.analyze(&reading);

        assert_eq!(report.irrigation.ok().unwrap().urgency, Urgency::Critical);
        assert!(report.recommendations.len() >= 2);
        assert_eq!(report.recommendations[0].priority, Priority::Critical);
        assert_eq!(report.recommendations[0].category, "Anomaly");
        assert_eq!(report.recommendations[1].priority, Priority::High);
        assert_eq!(report.recommendations[1].category, "Irrigation");
    }

    #[test]
    fn test_invalid_reading_is_reported_per_predictor() {
        // ---
        let system = AgricultureSystem::new(&test_config()).unwrap();
        let mut reading = sample_reading();
        reading.light = f64::NAN;

        let report = system.analyze(&reading);

        // Irrigation and yield never look at live light
        assert!(report.irrigation.ok().is_some());
        assert!(report.yield_prediction.ok().is_some());
        assert!(matches!(report.crop_health, Outcome::Failed { .. }));
        assert!(matches!(report.anomalies, Outcome::Failed { .. }));

        let json = serde_json::to_value(&report.crop_health).unwrap();
        assert!(json["error"].as_str().unwrap().contains("light"));
    }
}
