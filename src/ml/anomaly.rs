//! Rule-based and statistical anomaly detection over a rolling history.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::{ensure_finite, ModelError, ModelResult};

// ---

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Readings required (newest included) before z-scores are evaluated.
const MIN_STATISTICAL_READINGS: usize = 10;
const Z_SCORE_LIMIT: f64 = 3.0;

/// Fixed alert thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub moisture_sudden_drop: f64,
    pub temperature_high: f64,
    pub temperature_low: f64,
    pub humidity_high: f64,
    pub humidity_low: f64,
    pub light_low: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            moisture_sudden_drop: 15.0,
            temperature_high: 38.0,
            temperature_low: 10.0,
            humidity_high: 90.0,
            humidity_low: 25.0,
            light_low: 200.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Moisture,
    Temperature,
    Humidity,
    Light,
}

impl Channel {
    pub fn label(self) -> &'static str {
        // ---
        match self {
            Channel::Moisture => "Moisture",
            Channel::Temperature => "Temperature",
            Channel::Humidity => "Humidity",
            Channel::Light => "Light",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyEvent {
    // ---
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
}

impl AnomalyEvent {
    fn new(kind: impl Into<String>, severity: Severity, message: String, action: &str) -> Self {
        // ---
        Self {
            kind: kind.into(),
            severity,
            message,
            timestamp: Utc::now(),
            action: action.to_string(),
        }
    }
}

/// Fixed-capacity FIFO of the most recent values; pushing onto a full
/// window evicts the oldest value.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    // ---
    values: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    // ---
    pub fn new(capacity: usize) -> Self {
        // ---
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        // ---
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value `back` steps from the newest (`0` is the newest).
    pub fn recent(&self, back: usize) -> Option<f64> {
        // ---
        let len = self.values.len();
        back.checked_add(1)
            .and_then(|n| len.checked_sub(n))
            .and_then(|i| self.values.get(i).copied())
    }

    /// Population mean and standard deviation of everything but the newest.
    fn baseline(&self) -> Option<(f64, f64)> {
        // ---
        let n = self.values.len().checked_sub(1).filter(|&n| n > 0)?;
        let prior = self.values.iter().take(n);
        let mean = prior.clone().sum::<f64>() / n as f64;
        let var = prior.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        Some((mean, var.sqrt()))
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

/// One rolling window per channel.
#[derive(Debug, Clone)]
struct AnomalyHistory {
    windows: [RollingWindow; 4],
}

impl AnomalyHistory {
    fn new(capacity: usize) -> Self {
        Self {
            windows: std::array::from_fn(|_| RollingWindow::new(capacity)),
        }
    }

    fn push(&mut self, reading: [f64; 4]) {
        // ---
        for (window, value) in self.windows.iter_mut().zip(reading) {
            window.push(value);
        }
    }

    fn channel(&self, channel: Channel) -> &RollingWindow {
        &self.windows[channel.index()]
    }
}

#[derive(Debug)]
pub struct AnomalyDetector {
    // ---
    thresholds: Thresholds,
    history: Mutex<AnomalyHistory>,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl AnomalyDetector {
    // ---
    pub fn new(capacity: usize) -> Self {
        // ---
        Self {
            thresholds: Thresholds::default(),
            history: Mutex::new(AnomalyHistory::new(capacity)),
        }
    }

    /// Record the reading, then evaluate every rule against it.
    ///
    /// The reading is appended before any rule runs, so the sudden-drop rule
    /// compares the newest value with the one before it, and the z-score
    /// rules count the newest reading towards the minimum.
    pub fn detect(
        &self,
        moisture: f64,
        temperature: f64,
        humidity: f64,
        light: f64,
    ) -> ModelResult<Vec<AnomalyEvent>> {
        // ---
        ensure_finite(&[
            ("moisture", moisture),
            ("temperature", temperature),
            ("humidity", humidity),
            ("light", light),
        ])?;

        let mut history = self
            .history
            .lock()
            .map_err(|_| ModelError::StatePoisoned("anomaly_history"))?;
        history.push([moisture, temperature, humidity, light]);

        let t = &self.thresholds;
        let mut events = Vec::new();

        // 1. Sudden moisture loss
        if let Some(previous) = history.channel(Channel::Moisture).recent(1) {
            let drop = previous - moisture;
            if drop > t.moisture_sudden_drop {
                events.push(AnomalyEvent::new(
                    "Sudden Moisture Loss",
                    Severity::Critical,
                    format!(
                        "Soil moisture dropped {drop:.1}% from {previous:.1}% to {moisture:.1}%"
                    ),
                    "Check irrigation system for leaks or malfunctions",
                ));
            }
        }

        // 2. Temperature extremes
        if temperature > t.temperature_high {
            events.push(AnomalyEvent::new(
                "Extreme High Temperature",
                Severity::Warning,
                format!("Temperature reached {temperature:.1}°C - heat stress risk"),
                "Increase irrigation and provide shade if possible",
            ));
        }
        if temperature < t.temperature_low {
            events.push(AnomalyEvent::new(
                "Extreme Low Temperature",
                Severity::Warning,
                format!("Temperature dropped to {temperature:.1}°C - frost risk"),
                "Consider frost protection measures",
            ));
        }

        // 3. Humidity extremes
        if humidity > t.humidity_high {
            events.push(AnomalyEvent::new(
                "High Humidity",
                Severity::Warning,
                format!("Humidity at {humidity:.1}% - fungal disease risk increased"),
                "Improve ventilation and monitor for disease symptoms",
            ));
        }
        if humidity < t.humidity_low {
            events.push(AnomalyEvent::new(
                "Low Humidity",
                Severity::Info,
                format!("Humidity at {humidity:.1}% - water stress possible"),
                "Consider misting or increasing irrigation frequency",
            ));
        }

        // 4. Low light
        if light < t.light_low {
            events.push(AnomalyEvent::new(
                "Low Light Intensity",
                Severity::Info,
                format!("Light intensity at {light:.0} lux - may affect photosynthesis"),
                "Monitor plant growth; consider supplemental lighting",
            ));
        }

        // 5. Z-score against the prior readings; flat channels are skipped
        if history.channel(Channel::Moisture).len() >= MIN_STATISTICAL_READINGS {
            for channel in [Channel::Moisture, Channel::Temperature, Channel::Humidity] {
                let window = history.channel(channel);
                let (Some((mean, std)), Some(latest)) = (window.baseline(), window.recent(0))
                else {
                    continue;
                };
                if std <= 0.0 {
                    continue;
                }
                let z_score = ((latest - mean) / std).abs();
                if z_score > Z_SCORE_LIMIT {
                    events.push(AnomalyEvent::new(
                        format!("Statistical Anomaly - {}", channel.label()),
                        Severity::Info,
                        format!(
                            "{} value {latest:.1} is unusual (Z-score: {z_score:.2})",
                            channel.label()
                        ),
                        "Verify sensor calibration and reading accuracy",
                    ));
                }
            }
        }

        if events.iter().any(|e| e.severity == Severity::Critical) {
            warn!(count = events.len(), "critical anomaly detected");
        } else {
            debug!(count = events.len(), "anomaly detection complete");
        }
        Ok(events)
    }

    /// Snapshot of one channel's history, oldest first.
    pub fn history(&self, channel: Channel) -> ModelResult<Vec<f64>> {
        // ---
        let history = self
            .history
            .lock()
            .map_err(|_| ModelError::StatePoisoned("anomaly_history"))?;
        Ok(history.channel(channel).to_vec())
    }
}
