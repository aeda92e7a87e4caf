/// End-to-end tests for the price prediction service, driving the router
/// with the bundled model artifacts.
///
/// Run with: cargo test --test integration_tests -- --nocapture
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use price_predictor::{errors::ModelLoadError, load_artifacts, router, AppState, Config};
use serde_json::{json, Value};
use std::path::PathBuf;
use tower::ServiceExt;

const ENDPOINT: &str = "/api/price/";

fn artifact(rel: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(rel)
}

fn test_config() -> Config {
    Config {
        model_path: artifact("models/catboost/model.json"),
        pipeline_path: artifact("models/pipeline.json"),
        ..Config::default()
    }
}

fn app() -> (Router, AppState) {
    let state = AppState::new(&test_config()).expect("bundled artifacts load");
    (router(state.clone()), state)
}

fn listing() -> Value {
    json!({
        "floor": 3, "is_apartment": true, "kitchen_area": 8.0, "living_area": 40.0,
        "rooms": 2, "studio": false, "total_area": 60.0, "building_id": 101,
        "build_year": 2005, "building_type_int": 1, "latitude": 55.75,
        "longitude": 37.62, "ceiling_height": 2.7, "flats_count": 80,
        "floors_total": 12, "has_elevator": true
    })
}

async fn post(app: &Router, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn predict(app: &Router, user_id: &str, params: &Value) -> (StatusCode, Value) {
    let uri = format!("{ENDPOINT}?user_id={user_id}");
    post(app, &uri, serde_json::to_vec(params).unwrap()).await
}

#[tokio::test]
async fn test_successful_prediction() {
    println!("\n=== Test: Successful Prediction ===");
    let (app, state) = app();

    let (status, body) = predict(&app, "42", &listing()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "user_id": "42", "prediction": 6_600_000.0 }));
    assert_eq!(state.metrics.request_count(ENDPOINT), 1);
    assert_eq!(state.metrics.median(ENDPOINT), Some(6_600_000.0));
    println!("✓ prediction={}", body["prediction"]);
}

#[tokio::test]
async fn test_envelope_body_without_query() {
    println!("\n=== Test: Envelope Body ===");
    let (app, _) = app();

    let envelope = json!({ "user_id": "7", "model_params": listing() });
    let (status, body) = post(&app, ENDPOINT, serde_json::to_vec(&envelope).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "7");
    println!("✓ envelope accepted");
}

#[tokio::test]
async fn test_missing_rooms_is_rejected() {
    println!("\n=== Test: Missing Parameter ===");
    let (app, state) = app();

    let mut params = listing();
    params.as_object_mut().unwrap().remove("rooms");
    let (status, body) = predict(&app, "42", &params).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, json!({ "error": "Problem with parameters" }));
    // still counted, but no prediction reaches the median
    assert_eq!(state.metrics.request_count(ENDPOINT), 1);
    assert_eq!(state.metrics.duration_samples(ENDPOINT), 1);
    assert_eq!(state.metrics.median(ENDPOINT), None);
    println!("✓ rejected without touching the median");
}

#[tokio::test]
async fn test_malformed_bodies_are_parameter_problems() {
    println!("\n=== Test: Malformed Bodies ===");
    let (app, _) = app();

    for body in [b"not json".to_vec(), b"[1, 2, 3]".to_vec(), b"42".to_vec()] {
        let (status, payload) = post(&app, &format!("{ENDPOINT}?user_id=1"), body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(payload["error"], "Problem with parameters");
    }

    // body is the bare listing but user_id is missing from the query
    let (status, _) = post(&app, ENDPOINT, serde_json::to_vec(&listing()).unwrap()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    println!("✓ all malformed bodies rejected");
}

#[tokio::test]
async fn test_zero_total_area_completes() {
    println!("\n=== Test: Zero Total Area ===");
    let (app, _) = app();

    let mut params = listing();
    params["total_area"] = json!(0.0);
    let (status, body) = predict(&app, "9", &params).await;

    assert_eq!(status, StatusCode::OK);
    // room_density zero-filled, scaled to -5.0, same left branch as the baseline
    assert_eq!(body["prediction"], json!(6_600_000.0));
    println!("✓ degenerate denominator handled");
}

#[tokio::test]
async fn test_median_over_several_predictions() {
    println!("\n=== Test: Running Median ===");
    let (app, state) = app();

    let mut dense = listing();
    dense["rooms"] = json!(3);
    dense["total_area"] = json!(40.0);
    dense["is_apartment"] = json!(false);
    dense["building_type_int"] = json!(4);
    dense["building_id"] = json!(9000);

    let (_, a) = predict(&app, "1", &listing()).await;
    let (_, b) = predict(&app, "2", &dense).await;
    assert_eq!(a["prediction"], json!(6_600_000.0));
    assert_eq!(b["prediction"], json!(9_350_000.0));
    assert_eq!(state.metrics.median(ENDPOINT), Some(7_975_000.0));

    predict(&app, "3", &dense).await;
    assert_eq!(state.metrics.median(ENDPOINT), Some(9_350_000.0));
    assert_eq!(state.metrics.request_count(ENDPOINT), 3);
    println!("✓ median follows predictions");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_do_not_interfere() {
    println!("\n=== Test: Concurrent Requests ===");
    let (app, state) = app();

    let mut dense = listing();
    dense["rooms"] = json!(3);
    dense["total_area"] = json!(40.0);
    dense["is_apartment"] = json!(false);
    dense["building_type_int"] = json!(4);
    dense["building_id"] = json!(9000);

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let app = app.clone();
            let (params, expected) = if i % 2 == 0 {
                (listing(), 6_600_000.0)
            } else {
                (dense.clone(), 9_350_000.0)
            };
            tokio::spawn(async move {
                let (status, body) = predict(&app, &i.to_string(), &params).await;
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body["user_id"], i.to_string());
                assert_eq!(body["prediction"], json!(expected));
            })
        })
        .collect();
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(state.metrics.request_count(ENDPOINT), 64);
    assert_eq!(state.metrics.median(ENDPOINT), Some(7_975_000.0));
    // the exported gauge, not just the window, must agree
    let text = state.metrics.render().unwrap();
    assert!(text.contains("price_prediction_median{endpoint=\"/api/price/\"} 7975000\n"));
    println!("✓ 64 interleaved requests answered independently");
}

#[tokio::test]
async fn test_pipeline_failure_is_opaque_and_skips_median() {
    println!("\n=== Test: Pipeline Failure ===");
    let (app, state) = app();

    // room_density stays finite, but overflows once scaled
    let mut params = listing();
    params["rooms"] = json!(1e308);
    params["total_area"] = json!(1.0);
    let (status, body) = predict(&app, "13", &params).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Problem with request" }));
    assert_eq!(state.metrics.request_count(ENDPOINT), 1);
    assert_eq!(state.metrics.duration_samples(ENDPOINT), 1);
    assert_eq!(state.metrics.median(ENDPOINT), None);
    assert!(!state.metrics.render().unwrap().contains("price_prediction_median{"));
    println!("✓ failure surfaced without detail");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_measurements() {
    println!("\n=== Test: Metrics Endpoint ===");
    let (app, _) = app();
    predict(&app, "42", &listing()).await;

    let response = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();

    assert!(text.contains("price_prediction_requests_total{endpoint=\"/api/price/\"} 1"));
    assert!(text.contains("price_prediction_duration_seconds_count{endpoint=\"/api/price/\"} 1"));
    assert!(text.contains("price_prediction_median{endpoint=\"/api/price/\"} 6600000"));
    println!("✓ metrics rendered");
}

#[test]
fn test_missing_model_refuses_to_start() {
    println!("\n=== Test: Missing Model Artifact ===");
    let config = Config {
        model_path: artifact("models/catboost/absent.json"),
        ..test_config()
    };

    let err = AppState::new(&config).err().expect("startup must fail");
    let cause = err.downcast_ref::<ModelLoadError>().expect("model load error");
    assert!(matches!(cause, ModelLoadError::Io { what: "model", .. }));
    println!("✓ startup aborted: {err:#}");
}

#[test]
fn test_mismatched_pipeline_refuses_to_start() {
    println!("\n=== Test: Mismatched Pipeline ===");
    let dir = tempfile::tempdir().unwrap();
    let pipeline = dir.path().join("pipeline.json");
    std::fs::write(
        &pipeline,
        r#"{ "features": [ { "name": "floor", "mean": 0.0, "scale": 1.0 } ] }"#,
    )
    .unwrap();

    let config = Config {
        pipeline_path: pipeline,
        ..test_config()
    };
    assert!(matches!(load_artifacts(&config), Err(ModelLoadError::SchemaMismatch(_))));
    println!("✓ schema mismatch caught at startup");
}
