//! Configuration loader for the `codemetal-agrisense` backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
use std::{env, net::SocketAddr};

use anyhow::{anyhow, Result};

/// Parse an optional unsigned integer environment variable with a default value.
macro_rules! parse_env_num {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Address the HTTP listener binds to.
    pub bind_addr: SocketAddr,

    /// Seed for every synthetic training set and model RNG.
    pub model_seed: u64,

    /// Number of trees in each random forest.
    pub forest_trees: u32,

    /// Readings kept per channel by the anomaly detector.
    pub history_capacity: u32,

    /// Train all models at startup instead of on first request.
    pub eager_training: bool,
}

impl Default for Config {
    fn default() -> Self {
        // ---
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            model_seed: 42,
            forest_trees: 100,
            history_capacity: 100,
            eager_training: true,
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `BIND_ADDR` – listen address (default: `0.0.0.0:5000`)
/// - `MODEL_SEED` – synthetic data seed (default: 42)
/// - `FOREST_TREES` – trees per random forest (default: 100)
/// - `HISTORY_CAPACITY` – anomaly history length (default: 100)
/// - `EAGER_TRAINING` – train at startup (default: true)
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let defaults = Config::default();

    let bind_addr = match env::var("BIND_ADDR") {
        Ok(v) => v
            .parse::<SocketAddr>()
            .map_err(|e| anyhow!("Invalid BIND_ADDR '{}': {}", v, e))?,
        Err(_) => defaults.bind_addr,
    };
    let model_seed = parse_env_num!("MODEL_SEED", u64, defaults.model_seed);
    let forest_trees = parse_env_num!("FOREST_TREES", u32, defaults.forest_trees);
    let history_capacity = parse_env_num!("HISTORY_CAPACITY", u32, defaults.history_capacity);
    let eager_training = match env::var("EAGER_TRAINING").ok().as_deref() {
        None => defaults.eager_training,
        Some(v) => parse_bool(v).ok_or_else(|| anyhow!("Invalid EAGER_TRAINING: {}", v))?,
    };

    if forest_trees == 0 {
        return Err(anyhow!("FOREST_TREES must be at least 1"));
    }
    if history_capacity < 2 {
        return Err(anyhow!("HISTORY_CAPACITY must be at least 2"));
    }

    Ok(Config {
        bind_addr,
        model_seed,
        forest_trees,
        history_capacity,
        eager_training,
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    // ---
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  BIND_ADDR        : {}", self.bind_addr);
        tracing::info!("  MODEL_SEED       : {}", self.model_seed);
        tracing::info!("  FOREST_TREES     : {}", self.forest_trees);
        tracing::info!("  HISTORY_CAPACITY : {}", self.history_capacity);
        tracing::info!("  EAGER_TRAINING   : {}", self.eager_training);
    }
}
