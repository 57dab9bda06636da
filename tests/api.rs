mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{body_from_pairs, router, scenario_body, scenario_pairs, training_ordering};

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_predict(body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

fn default_router(dir: &tempfile::TempDir) -> Router {
    router(dir.path(), &training_ordering(), true, false)
}

#[tokio::test]
async fn root_reports_liveness() {
    let dir = tempfile::tempdir().unwrap();
    let app = default_router(&dir);

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "API is up and running!" }));
}

#[tokio::test]
async fn predicts_for_complete_record() {
    let dir = tempfile::tempdir().unwrap();
    let app = default_router(&dir);

    let (status, body) = send(&app, post_predict(scenario_body())).await;

    assert_eq!(status, StatusCode::OK);
    let prediction = body["prediction"].as_f64().expect("prediction is a number");
    assert!(prediction.is_finite());
    assert_eq!(prediction, 8850.0);
}

#[tokio::test]
async fn field_order_does_not_change_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let app = default_router(&dir);

    let forward = scenario_pairs();
    let mut backward = forward.clone();
    backward.reverse();
    backward.swap(3, 17);

    let (_, a) = send(&app, post_predict(body_from_pairs(&forward))).await;
    let (_, b) = send(&app, post_predict(body_from_pairs(&backward))).await;

    let a = a["prediction"].as_f64().unwrap();
    let b = b["prediction"].as_f64().unwrap();
    assert_eq!(a.to_bits(), b.to_bits());
}

#[tokio::test]
async fn missing_class_is_a_validation_failure() {
    let dir = tempfile::tempdir().unwrap();
    let app = default_router(&dir);

    let pairs: Vec<_> = scenario_pairs()
        .into_iter()
        .filter(|(name, _)| name != "class")
        .collect();
    let (status, body) = send(&app, post_predict(body_from_pairs(&pairs))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("class"));
    assert!(body.get("prediction").is_none());
}

#[tokio::test]
async fn internal_field_name_is_not_accepted_on_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let app = default_router(&dir);

    let pairs: Vec<_> = scenario_pairs()
        .into_iter()
        .map(|(name, value)| {
            if name == "class" {
                ("cabin_class".to_string(), value)
            } else {
                (name, value)
            }
        })
        .collect();
    let (status, _) = send(&app, post_predict(body_from_pairs(&pairs))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn mistyped_and_malformed_bodies_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = default_router(&dir);

    let pairs: Vec<_> = scenario_pairs()
        .into_iter()
        .map(|(name, value)| {
            if name == "stops" {
                (name, json!("one"))
            } else {
                (name, value)
            }
        })
        .collect();
    let (status, _) = send(&app, post_predict(body_from_pairs(&pairs))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(&app, post_predict("{\"stops\": 1,")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .body(Body::from(scenario_body()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn unknown_ordering_column_yields_generic_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut ordering = training_ordering();
    ordering.push("seat_pitch".to_string());
    let app = router(dir.path(), &ordering, false, false);

    let (status, body) = send(&app, post_predict(scenario_body())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("seat_pitch"), "{message}");
}

#[tokio::test]
async fn overlapping_one_hot_groups_depend_on_strict_mode() {
    let pairs: Vec<_> = scenario_pairs()
        .into_iter()
        .map(|(name, value)| {
            if name == "airline_Vistara" {
                (name, json!(1))
            } else {
                (name, value)
            }
        })
        .collect();
    let body = body_from_pairs(&pairs);

    let dir = tempfile::tempdir().unwrap();
    let permissive = router(dir.path(), &training_ordering(), true, false);
    let (status, _) = send(&permissive, post_predict(body.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let dir = tempfile::tempdir().unwrap();
    let strict = router(dir.path(), &training_ordering(), true, true);
    let (status, response) = send(&strict, post_predict(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(
        response["detail"]
            .as_str()
            .unwrap()
            .contains("exactly one airline_* field must be 1, found 2")
    );
}

#[tokio::test]
async fn metadata_describes_loaded_model() {
    let dir = tempfile::tempdir().unwrap();
    let app = default_router(&dir);

    let request = Request::builder().uri("/metadata").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["num_trees"], json!(3));
    assert_eq!(body["num_features"], json!(34));
    assert_eq!(body["objective"], json!("reg:squarederror"));
    assert_eq!(body["feature_names"][0], json!("arrival_Night"));
}

#[tokio::test]
async fn cors_allows_only_the_configured_origin() {
    let dir = tempfile::tempdir().unwrap();
    let app = default_router(&dir);

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/predict")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(preflight).await.unwrap();
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");

    let foreign = Request::builder()
        .uri("/")
        .header(header::ORIGIN, "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(foreign).await.unwrap();
    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}
