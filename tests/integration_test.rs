use std::net::SocketAddr;

use agrisense::{routes, AppState, Config};
use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct Recommendation {
    priority: String,
    category: String,
}

#[derive(Debug, Deserialize)]
struct YieldPrediction {
    predicted_yield_kg_per_ha: f64,
    days_to_harvest: u32,
}

#[derive(Debug, Deserialize)]
struct HealthProbabilities {
    healthy: f64,
    moderate_stress: f64,
    high_stress: f64,
}

#[derive(Debug, Deserialize)]
struct HealthPrediction {
    confidence: f64,
    probabilities: HealthProbabilities,
    recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AnalysisReport {
    crop_health: HealthPrediction,
    yield_prediction: YieldPrediction,
    anomalies: Vec<Value>,
    recommendations: Vec<Recommendation>,
}

/// Boot the full router on an ephemeral port and return its base URL.
async fn spawn_app() -> Result<String> {
    // ---
    let config = Config {
        forest_trees: 10,
        eager_training: false,
        ..Config::default()
    };
    let app = routes::router(AppState::new(&config)?);

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    Ok(format!("http://{}", addr))
}

#[tokio::test]
async fn sensors_update_round_trip() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();

    let body: Value = client
        .get(format!("{}/api/sensors", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["data"]["moisture"], 45.0);
    assert!(body["timestamp"].is_string());

    let response = client
        .post(format!("{}/api/sensors/update", base))
        .json(&json!({ "moisture": 30.5, "growing_days": 99 }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "success");
    assert_eq!(body["updated_data"]["moisture"], 30.5);

    // Only the live channels are writable through this endpoint
    assert_eq!(body["updated_data"]["growing_days"], 65);

    Ok(())
}

#[tokio::test]
async fn sensors_update_rejects_empty_body() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();
    let url = format!("{}/api/sensors/update", base);

    let empty = client.post(&url).send().await?;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    let body: Value = empty.json().await?;
    assert_eq!(body["error"], "No data provided");

    let no_fields = client.post(&url).json(&json!({})).send().await?;
    assert_eq!(no_fields.status(), StatusCode::BAD_REQUEST);

    let garbage = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn single_predictor_endpoints() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();

    let irrigation: Value = client
        .get(format!("{}/api/irrigation", base))
        .send()
        .await?
        .json()
        .await?;
    let liters = irrigation["prediction"]["irrigation_liters_per_sqm"]
        .as_f64()
        .unwrap();
    assert!((0.0..=100.0).contains(&liters));

    let health: Value = client
        .get(format!("{}/api/health", base))
        .send()
        .await?
        .json()
        .await?;
    assert!(health["health"]["health_status"].is_string());

    let forecast: Value = client
        .get(format!("{}/api/yield", base))
        .send()
        .await?
        .json()
        .await?;
    let kg = forecast["prediction"]["predicted_yield_kg_per_ha"]
        .as_f64()
        .unwrap();
    assert!((2000.0..=8000.0).contains(&kg));

    client
        .post(format!("{}/api/sensors/update", base))
        .json(&json!({ "light": 150 }))
        .send()
        .await?;
    let anomalies: Value = client
        .get(format!("{}/api/anomalies", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(anomalies["count"], 1);
    assert_eq!(anomalies["anomalies"][0]["type"], "Low Light Intensity");
    assert_eq!(anomalies["anomalies"][0]["severity"], "INFO");

    let liveness: Value = client
        .get(format!("{}/health", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(liveness["status"], "ok");
    assert_eq!(liveness["models_trained"], true);

    Ok(())
}

#[tokio::test]
async fn analyze_sample_reading() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();

    let sample = json!({
        "moisture": 32.5,
        "temperature": 28.3,
        "humidity": 62.0,
        "light": 650,
        "avg_moisture": 42.0,
        "avg_temperature": 26.5,
        "avg_humidity": 65.0,
        "avg_light": 600,
        "rainfall_total": 450,
        "growing_days": 65
    });
    let report: AnalysisReport = client
        .post(format!("{}/api/analyze", base))
        .json(&sample)
        .send()
        .await?
        .json()
        .await?;

    let health = &report.crop_health;
    let sum = health.probabilities.healthy
        + health.probabilities.moderate_stress
        + health.probabilities.high_stress;
    assert!((sum - 1.0).abs() < 1e-9);
    assert!(health.confidence > 0.0);
    assert!(health
        .recommendations
        .iter()
        .any(|r| r == "Increase irrigation frequency"));

    assert!(report.yield_prediction.days_to_harvest <= 30);
    assert!(report.yield_prediction.predicted_yield_kg_per_ha >= 2000.0);
    assert!(report.anomalies.is_empty());

    // The overlay is not stored
    let current: Value = client
        .get(format!("{}/api/sensors", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(current["data"]["moisture"], 45.0);

    Ok(())
}

#[tokio::test]
async fn critical_anomaly_ranks_first() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();
    let url = format!("{}/api/analyze", base);

    client.post(&url).json(&json!({ "moisture": 50.0 })).send().await?;
    let report: AnalysisReport = client
        .post(&url)
        .json(&json!({ "moisture": 20.0, "temperature": 40.0, "humidity": 30.0 }))
        .send()
        .await?
        .json()
        .await?;

    assert!(report.recommendations.len() >= 2);
    assert_eq!(report.recommendations[0].priority, "CRITICAL");
    assert_eq!(report.recommendations[0].category, "Anomaly");
    assert_eq!(report.recommendations[1].priority, "HIGH");
    assert_eq!(report.recommendations[1].category, "Irrigation");

    let recs: Value = client
        .get(format!("{}/api/recommendations", base))
        .send()
        .await?
        .json()
        .await?;
    assert!(recs["recommendations"].is_array());

    Ok(())
}

#[tokio::test]
async fn simulate_overwrites_live_channels() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();

    let body: Value = client
        .post(format!("{}/api/simulate", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["status"], "simulation_complete");

    let moisture = body["new_sensor_data"]["moisture"].as_f64().unwrap();
    let light = body["new_sensor_data"]["light"].as_f64().unwrap();
    assert!((30.0..60.0).contains(&moisture));
    assert!((300.0..800.0).contains(&light));
    assert!(body["analysis"]["recommendations"].is_array());

    let current: Value = client
        .get(format!("{}/api/sensors", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(current["data"]["moisture"].as_f64(), Some(moisture));

    Ok(())
}
