//! Simple data models for sensor readings and partial updates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---

/// Rainfall assumed when a reading carries no seasonal total (mm).
pub const DEFAULT_RAINFALL_TOTAL: f64 = 500.0;

/// Growing days assumed when a reading carries no planting age.
pub const DEFAULT_GROWING_DAYS: u32 = 45;

/// Errors raised while turning request bodies into readings.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    // ---
    #[error("No data provided")]
    EmptyPatch,

    #[error("malformed request body: {0}")]
    Malformed(String),
}

/// One snapshot of the field sensors plus optional seasonal aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    // ---
    pub moisture: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub light: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_moisture: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_light: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rainfall_total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growing_days: Option<u32>,
}

impl Default for SensorReading {
    /// The reading the service boots with before any sensor reports in.
    fn default() -> Self {
        // ---
        Self {
            moisture: 45.0,
            temperature: 25.0,
            humidity: 65.0,
            light: 600.0,
            avg_moisture: Some(42.0),
            avg_temperature: Some(26.5),
            avg_humidity: Some(65.0),
            avg_light: Some(600.0),
            rainfall_total: Some(450.0),
            growing_days: Some(65),
        }
    }
}

/// Seasonal inputs resolved against their fallbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonalInputs {
    pub avg_moisture: f64,
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    pub avg_light: f64,
    pub rainfall_total: f64,
    pub growing_days: u32,
}

impl SensorReading {
    // ---
    /// Seasonal averages fall back to the current values, rainfall and
    /// growing days to fixed defaults.
    pub fn seasonal(&self) -> SeasonalInputs {
        // ---
        SeasonalInputs {
            avg_moisture: self.avg_moisture.unwrap_or(self.moisture),
            avg_temperature: self.avg_temperature.unwrap_or(self.temperature),
            avg_humidity: self.avg_humidity.unwrap_or(self.humidity),
            avg_light: self.avg_light.unwrap_or(self.light),
            rainfall_total: self.rainfall_total.unwrap_or(DEFAULT_RAINFALL_TOTAL),
            growing_days: self.growing_days.unwrap_or(DEFAULT_GROWING_DAYS),
        }
    }

    /// Apply only the live sensor channels of `patch` (moisture, temperature,
    /// humidity, light). Returns an error when the patch touches none of them.
    pub fn apply_sensor_update(&mut self, patch: &ReadingPatch) -> Result<(), ValidationError> {
        // ---
        if patch.moisture.is_none()
            && patch.temperature.is_none()
            && patch.humidity.is_none()
            && patch.light.is_none()
        {
            return Err(ValidationError::EmptyPatch);
        }
        if let Some(v) = patch.moisture {
            self.moisture = v;
        }
        if let Some(v) = patch.temperature {
            self.temperature = v;
        }
        if let Some(v) = patch.humidity {
            self.humidity = v;
        }
        if let Some(v) = patch.light {
            self.light = v;
        }
        Ok(())
    }
}

/// Request body where every reading field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReadingPatch {
    // ---
    pub moisture: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub light: Option<f64>,
    pub avg_moisture: Option<f64>,
    pub avg_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_light: Option<f64>,
    pub rainfall_total: Option<f64>,
    pub growing_days: Option<u32>,
}

impl ReadingPatch {
    // ---
    /// Parse a raw request body. An empty body, or one that is only
    /// whitespace, yields `EmptyPatch`.
    pub fn from_body(body: &[u8]) -> Result<Self, ValidationError> {
        // ---
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ValidationError::EmptyPatch);
        }
        serde_json::from_slice(body).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    /// Overlay the fields present in this patch on top of `base`.
    pub fn merge_over(&self, base: &SensorReading) -> SensorReading {
        // ---
        SensorReading {
            moisture: self.moisture.unwrap_or(base.moisture),
            temperature: self.temperature.unwrap_or(base.temperature),
            humidity: self.humidity.unwrap_or(base.humidity),
            light: self.light.unwrap_or(base.light),
            avg_moisture: self.avg_moisture.or(base.avg_moisture),
            avg_temperature: self.avg_temperature.or(base.avg_temperature),
            avg_humidity: self.avg_humidity.or(base.avg_humidity),
            avg_light: self.avg_light.or(base.avg_light),
            rainfall_total: self.rainfall_total.or(base.rainfall_total),
            growing_days: self.growing_days.or(base.growing_days),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn bare_reading() -> SensorReading {
        // ---
        SensorReading {
            moisture: 30.0,
            temperature: 20.0,
            humidity: 50.0,
            light: 400.0,
            avg_moisture: None,
            avg_temperature: None,
            avg_humidity: None,
            avg_light: None,
            rainfall_total: None,
            growing_days: None,
        }
    }

    #[test]
    fn test_seasonal_defaults() {
        // ---
        let seasonal = bare_reading().seasonal();

        // Averages fall back to the live channels
        assert_eq!(seasonal.avg_moisture, 30.0);
        assert_eq!(seasonal.avg_temperature, 20.0);
        assert_eq!(seasonal.avg_humidity, 50.0);
        assert_eq!(seasonal.avg_light, 400.0);

        // Fixed fallbacks
        assert_eq!(seasonal.rainfall_total, 500.0);
        assert_eq!(seasonal.growing_days, 45);
    }

    #[test]
    fn test_sensor_update_only_touches_live_channels() {
        // ---
        let mut reading = SensorReading::default();
        let patch = ReadingPatch {
            moisture: Some(12.0),
            growing_days: Some(100),
            ..Default::default()
        };

        reading.apply_sensor_update(&patch).unwrap();

        assert_eq!(reading.moisture, 12.0);
        assert_eq!(reading.temperature, 25.0);
        assert_eq!(reading.growing_days, Some(65));
    }

    #[test]
    fn test_sensor_update_rejects_patch_without_channels() {
        // ---
        let mut reading = SensorReading::default();
        let patch = ReadingPatch {
            rainfall_total: Some(10.0),
            ..Default::default()
        };

        assert_eq!(
            reading.apply_sensor_update(&patch),
            Err(ValidationError::EmptyPatch)
        );
        assert_eq!(reading, SensorReading::default());
    }

    #[test]
    fn test_from_body() {
        // ---
        assert_eq!(ReadingPatch::from_body(b""), Err(ValidationError::EmptyPatch));
        assert_eq!(ReadingPatch::from_body(b"  \n"), Err(ValidationError::EmptyPatch));
        assert!(matches!(
            ReadingPatch::from_body(b"{not json"),
            Err(ValidationError::Malformed(_))
        ));
        assert!(matches!(
            ReadingPatch::from_body(b"42"),
            Err(ValidationError::Malformed(_))
        ));

        let patch = ReadingPatch::from_body(br#"{"light": 150, "growing_days": 70}"#).unwrap();
        assert_eq!(patch.light, Some(150.0));
        assert_eq!(patch.growing_days, Some(70));

        assert_eq!(ReadingPatch::from_body(b"{}").unwrap(), ReadingPatch::default());
    }

    #[test]
    fn test_merge_over_keeps_base_for_missing_fields() {
        // ---
        let base = SensorReading::default();
        let patch = ReadingPatch {
            temperature: Some(40.0),
            avg_light: Some(800.0),
            ..Default::default()
        };

        let merged = patch.merge_over(&base);
        assert_eq!(merged.temperature, 40.0);
        assert_eq!(merged.avg_light, Some(800.0));
        assert_eq!(merged.moisture, base.moisture);
        assert_eq!(merged.rainfall_total, base.rainfall_total);
    }
}
