//! Shared application state handed to every route.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::{AgricultureSystem, Config, SensorReading};

// ---

/// Cheap to clone: every field is behind an `Arc`.
#[derive(Debug, Clone)]
pub struct AppState {
    // ---
    pub system: Arc<AgricultureSystem>,
    current: Arc<Mutex<SensorReading>>,
}

impl AppState {
    // ---
    /// Build the predictors from `config` and seed the current reading.
    pub fn new(config: &Config) -> Result<Self> {
        // ---
        let system = AgricultureSystem::new(config)
            .map_err(|e| anyhow!("Failed to initialise models: {}", e))?;
        Ok(Self::with_system(system, SensorReading::default()))
    }

    pub fn with_system(system: AgricultureSystem, initial: SensorReading) -> Self {
        Self {
            system: Arc::new(system),
            current: Arc::new(Mutex::new(initial)),
        }
    }

    /// Copy of the current reading.
    pub fn snapshot(&self) -> SensorReading {
        // ---
        self.lock_current().clone()
    }

    /// Mutate the current reading in place and return the result.
    ///
    /// The closure runs under the lock; last write wins.
    pub fn update<F, E>(&self, apply: F) -> Result<SensorReading, E>
    where
        F: FnOnce(&mut SensorReading) -> Result<(), E>,
    {
        // ---
        let mut current = self.lock_current();
        apply(&mut current)?;
        Ok(current.clone())
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, SensorReading> {
        // A panic mid-update leaves a plain-data reading; keep serving it
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{ReadingPatch, ValidationError};

    fn lazy_state() -> AppState {
        // ---
        let config = Config {
            eager_training: false,
            ..Config::default()
        };
        AppState::new(&config).unwrap()
    }

    #[test]
    fn test_update_is_visible_to_later_snapshots() {
        // ---
        let state = lazy_state();
        let clone = state.clone();

        let updated = state
            .update(|r| {
                r.light = 150.0;
                Ok::<_, ValidationError>(())
            })
            .unwrap();

        assert_eq!(updated.light, 150.0);
        assert_eq!(clone.snapshot().light, 150.0);
    }

    #[test]
    fn test_failed_update_leaves_reading_untouched() {
        // ---
        let state = lazy_state();
        let result = state.update(|r| r.apply_sensor_update(&ReadingPatch::default()));

        assert_eq!(result, Err(ValidationError::EmptyPatch));
        assert_eq!(state.snapshot(), SensorReading::default());
    }
}
