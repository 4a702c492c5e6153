use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use parcel_engine::api::rest::router;
use parcel_engine::config::EngineConfig;
use parcel_engine::engine::conversion::{Collaborators, OrderConversionService};
use parcel_engine::engine::distance::CoordinateResolver;
use parcel_engine::observability::metrics::Metrics;
use parcel_engine::state::AppState;
use parcel_engine::store::memory::{MemoryTable, StaticSettings};
use parcel_engine::store::schema::{PACKAGES, PENDING_ORDERS};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn setup() -> axum::Router {
    let metrics = Metrics::new();
    let collaborators = Collaborators {
        resolver: Arc::new(CoordinateResolver::default()),
        settings: Arc::new(StaticSettings::default()),
        pending_orders: Arc::new(MemoryTable::with_full_schema(&PENDING_ORDERS)),
        packages: Arc::new(MemoryTable::with_full_schema(&PACKAGES)),
    };
    let service =
        OrderConversionService::connect(EngineConfig::default(), collaborators, metrics.clone())
            .await;
    router(Arc::new(AppState::new(service, metrics)))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn draft() -> Value {
    json!({
        "sender": {
            "name": "Aung Aung",
            "phone": "09420001111",
            "address": "No.1, 72nd St, Mandalay"
        },
        "receiver": {
            "name": "Hla Hla",
            "phone": "09420002222",
            "address": "Bogyoke Rd, Yangon"
        },
        "package_type": "standard",
        "delivery_speed": "on_time"
    })
}

async fn create_session(app: &axum::Router) -> Value {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/sessions", json!({ "draft": draft() })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn hold_session(app: &axum::Router, session_id: &str) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/sessions/{session_id}/hold"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup().await;
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup().await;
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("tracking_id_collisions_total"));
}

#[tokio::test]
async fn create_session_returns_quote_with_fallback_distance() {
    let app = setup().await;
    let session = create_session(&app).await;

    assert_eq!(session["state"], "quoted");
    assert_eq!(session["quote"]["distance"]["rounded_km"], 5.0);
    assert_eq!(session["quote"]["distance"]["advisory"]["code"], "no_route");
    assert_eq!(session["quote"]["price"], 2500);
    assert!(session["hold"].is_null());
}

#[tokio::test]
async fn create_session_with_blank_address_returns_400() {
    let app = setup().await;
    let mut bad = draft();
    bad["sender"]["address"] = json!("  ");

    let response = app
        .oneshot(json_request("POST", "/sessions", json!({ "draft": bad })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "sender address is required");
}

#[tokio::test]
async fn unknown_session_returns_404() {
    let app = setup().await;
    let response = app
        .oneshot(get_request(
            "/sessions/00000000-0000-4000-8000-000000000000",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_order_flow() {
    let app = setup().await;
    let session = create_session(&app).await;
    let session_id = session["id"].as_str().unwrap().to_string();

    let held = hold_session(&app, &session_id).await;
    assert_eq!(held["state"], "pending_hold");
    assert_eq!(held["hold"]["path"], "durable");
    let tracking_id = held["hold"]["tracking_id"].as_str().unwrap().to_string();
    assert!(tracking_id.starts_with("MDY"));
    assert_eq!(tracking_id.len(), 17);

    let response = app
        .clone()
        .oneshot(get_request(&format!("/orders/{tracking_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let order = body_json(response).await;
    assert_eq!(order["kind"], "pending");
    assert_eq!(order["order"]["price"], 2500);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/sessions/{session_id}/confirm"),
            json!({ "payment_method": "cash" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let package = body_json(response).await;
    assert_eq!(package["id"], tracking_id);
    assert_eq!(package["status"], "awaiting_collection_payment");
    assert_eq!(package["price"], "2500 MMK");
    assert_eq!(package["courier"], "unassigned");

    let response = app
        .clone()
        .oneshot(get_request(&format!("/orders/{tracking_id}")))
        .await
        .unwrap();
    let order = body_json(response).await;
    assert_eq!(order["kind"], "package");

    let response = app
        .oneshot(get_request(&format!("/sessions/{session_id}")))
        .await
        .unwrap();
    let session = body_json(response).await;
    assert_eq!(session["state"], "committed");
}

#[tokio::test]
async fn qr_confirmation_returns_422() {
    let app = setup().await;
    let session = create_session(&app).await;
    let session_id = session["id"].as_str().unwrap().to_string();
    hold_session(&app, &session_id).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/sessions/{session_id}/confirm"),
            json!({ "payment_method": "qr" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn hold_twice_returns_409() {
    let app = setup().await;
    let session = create_session(&app).await;
    let session_id = session["id"].as_str().unwrap().to_string();
    hold_session(&app, &session_id).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/sessions/{session_id}/hold"),
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn requote_replaces_the_price() {
    let app = setup().await;
    let session = create_session(&app).await;
    let session_id = session["id"].as_str().unwrap().to_string();

    let mut urgent = draft();
    urgent["delivery_speed"] = json!("urgent");
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/sessions/{session_id}/quote"),
            urgent,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let session = body_json(response).await;
    assert_eq!(session["quote"]["price"], 3000);
}

#[tokio::test]
async fn abandon_session_forgets_it() {
    let app = setup().await;
    let session = create_session(&app).await;
    let session_id = session["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(delete_request(&format!("/sessions/{session_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["state"], "abandoned");

    let response = app
        .oneshot(get_request(&format!("/sessions/{session_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn commit_by_tracking_id_is_idempotent() {
    let app = setup().await;
    let session = create_session(&app).await;
    let session_id = session["id"].as_str().unwrap().to_string();
    let held = hold_session(&app, &session_id).await;
    let tracking_id = held["hold"]["tracking_id"].as_str().unwrap().to_string();

    let uri = format!("/orders/{tracking_id}/commit");
    let first = app
        .clone()
        .oneshot(json_request("POST", &uri, json!({})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_json(first).await;

    let second = app
        .oneshot(json_request("POST", &uri, json!({})))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_json(second).await, first);
}

#[tokio::test]
async fn malformed_tracking_id_returns_400() {
    let app = setup().await;
    let response = app.oneshot(get_request("/orders/not-an-id")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_tracking_id_returns_404() {
    let app = setup().await;
    let response = app
        .clone()
        .oneshot(get_request("/orders/YGN20250101003012"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(json_request(
            "POST",
            "/orders/YGN20250101003012/commit",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cash_on_delivery_requires_a_partner_or_vip_account() {
    let app = setup().await;
    let mut with_cod = draft();
    with_cod["cod_amount"] = json!(25000);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/sessions",
            json!({ "draft": with_cod.clone() }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(json_request(
            "POST",
            "/sessions",
            json!({
                "draft": with_cod,
                "customer": { "id": "p-1", "name": "Zegyo Mart", "email": null, "tier": "partner" }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session = body_json(response).await;
    assert_eq!(session["customer"]["tier"], "partner");
}
