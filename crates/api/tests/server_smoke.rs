use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use annsuraksha_api::server::build_app;
use annsuraksha_ledger::config::Config;

async fn app() -> (Router, TempDir) {
    let tmp = TempDir::new().expect("temp dir");
    let mut config = Config::default();
    config.database.url = format!("sqlite://{}", tmp.path().join("api.db").display());
    config.api.jwt_secret = "smoke-test-secret".to_string();

    let app = build_app(&config).await.expect("build app");
    (app, tmp)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response: Response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("json body")
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn register_form(name: &str, email: &str, role: &str, aadhar: &str) -> Request<Body> {
    let form = format!(
        "name={}&email={}&password=Password%40123&role={}&aadhar_number={}",
        name,
        email.replace('@', "%40"),
        role,
        aadhar
    );
    Request::builder()
        .method("POST")
        .uri("/register")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap()
}

#[tokio::test]
async fn test_empty_database_views() {
    let (app, _tmp) = app().await;

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));

    let (status, body) = send(&app, get("/trust_scores/overview")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert_eq!(body["min"], 0);
    assert_eq!(body["max"], 0);
    assert_eq!(body["average"].as_f64(), Some(0.0));

    for uri in [
        "/complaints",
        "/dashboard/recent_deliveries",
        "/dashboard/active_complaints",
        "/alerts/recent",
        "/timeline",
        "/fps",
    ] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(body, json!([]), "{}", uri);
    }

    let (status, body) = send(&app, get("/dashboard/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_deliveries"], 0);
    assert_eq!(body["total_complaints"], 0);
}

#[tokio::test]
async fn test_offline_delivery_lifecycle() {
    let (app, _tmp) = app().await;

    let (status, _) = send(
        &app,
        register_form("Ravi", "ravi@example.com", "beneficiary", "555566667777"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        register_form("Ravi", "ravi@example.com", "beneficiary", "555566667778"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Email already registered");

    let (status, body) = send(
        &app,
        post_json(
            "/api/login",
            json!({ "email": "ravi@example.com", "password": "nope" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, body) = send(
        &app,
        post_json(
            "/delivery",
            json!({
                "aadhar_number": "000000000000",
                "fps_code": "FPS009",
                "location": "Nagpur",
                "amount": 10,
                "items": []
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "User not found");

    let (status, body) = send(
        &app,
        post_json(
            "/delivery",
            json!({
                "aadhar_number": "555566667777",
                "fps_code": "FPS009",
                "location": "Nagpur",
                "amount": 10,
                "items": [{ "name": "wheat", "quantity": 5.0, "unit": "kg" }]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivery"]["status"], "Pending");
    assert!(body["delivery"]["tx_hash"].is_null());
    let id = body["delivery"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        post_json(&format!("/deliveries/{}/confirm", id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivery"]["status"], "Delivered");

    let (status, _) = send(
        &app,
        post_json(&format!("/deliveries/{}/confirm", id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, get("/trust_scores/555566667777")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trust_score"], 100);

    let (status, body) = send(&app, get("/dashboard/recent_deliveries?limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&app, get("/fps")).await;
    assert_eq!(body[0]["fps_code"], "FPS009");
    assert_eq!(body[0]["delivery_count"], 1);
}

#[tokio::test]
async fn test_resolve_requires_bearer_token() {
    let (app, _tmp) = app().await;

    let (status, body) = send(
        &app,
        post_json("/deliveries/1/resolve", json!({ "dealer_at_fault": false })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Missing bearer token");
}
