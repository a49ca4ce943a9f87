//! HTTP API tests driven through the router

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::memory_store;
use ftl_backend::config::{Config, DatabaseConfig, JwtConfig, StoreBackend};
use ftl_backend::middleware::Claims;
use ftl_backend::{create_app, AppState};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use shared::ActorRole;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";

fn app() -> Router {
    let config = Config {
        environment: "test".to_string(),
        database: DatabaseConfig {
            backend: StoreBackend::Memory,
            ..Default::default()
        },
        jwt: JwtConfig {
            secret: SECRET.to_string(),
        },
        ..Default::default()
    };
    create_app(AppState::new(memory_store(), config))
}

fn token(sub: Uuid, role: ActorRole) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub,
        role,
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn call_json(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = call(app, method, uri, token, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn report_body() -> Value {
    json!({
        "period": "2024-03",
        "transactions": [
            {
                "counterparty": "Davao Fiber Trading",
                "grade": "JK",
                "quantity": "10",
                "unit_price": "100",
                "total_amount": "1000",
                "sale_date": "2024-03-04",
                "payment_method": "cash"
            },
            {
                "counterparty": "Mindanao Cordage",
                "grade": "S2",
                "quantity": "5",
                "unit_price": "100",
                "total_amount": "500",
                "sale_date": "2024-03-18",
                "payment_method": "bank_transfer"
            }
        ]
    })
}

#[tokio::test]
async fn test_health_is_public() {
    let app = app();
    for uri in ["/health", "/api/v1/health"] {
        let (status, body) = call_json(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store"], "connected");
    }
}

#[tokio::test]
async fn test_ledger_routes_need_a_token() {
    let app = app();
    let (status, body) = call_json(&app, Method::GET, "/api/v1/reports", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = call_json(&app, Method::GET, "/api/v1/reports", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_report_submit_review_and_analytics() {
    let app = app();
    let farmer = token(Uuid::new_v4(), ActorRole::Farmer);
    let reviewer = token(Uuid::new_v4(), ActorRole::Reviewer);

    let (status, report) = call_json(
        &app,
        Method::POST,
        "/api/v1/reports",
        Some(&farmer),
        Some(report_body()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["total_revenue"], "1500");
    assert_eq!(report["transaction_count"], 2);
    assert_eq!(report["status"], "pending");
    assert_eq!(report["period"], "2024-03");
    let id = report["id"].as_str().unwrap().to_string();

    let (status, detail) = call_json(
        &app,
        Method::GET,
        &format!("/api/v1/reports/{}", id),
        Some(&farmer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["lines"].as_array().unwrap().len(), 2);

    let (status, body) = call_json(
        &app,
        Method::POST,
        &format!("/api/v1/reports/{}/review", id),
        Some(&reviewer),
        Some(json!({ "decision": "rejected" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "rejection_reason");

    let (status, body) = call_json(
        &app,
        Method::POST,
        &format!("/api/v1/reports/{}/review", id),
        Some(&reviewer),
        Some(json!({ "decision": "approved" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    let (status, body) = call_json(
        &app,
        Method::POST,
        &format!("/api/v1/reports/{}/review", id),
        Some(&reviewer),
        Some(json!({ "decision": "rejected", "rejection_reason": "late" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    let (status, summary) = call_json(
        &app,
        Method::GET,
        "/api/v1/analytics?period=2024-03",
        Some(&reviewer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["producer_count"], 1);
    assert_eq!(summary["total_revenue"], "1500");

    let buyer = token(Uuid::new_v4(), ActorRole::Buyer);
    let (status, _) = call_json(&app, Method::GET, "/api/v1/analytics", Some(&buyer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_fields_are_rejected() {
    let app = app();
    let farmer = token(Uuid::new_v4(), ActorRole::Farmer);
    let mut body = report_body();
    body["total_revenue"] = json!("999999");

    let (status, response) =
        call_json(&app, Method::POST, "/api/v1/reports", Some(&farmer), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["code"], "VALIDATION_ERROR");

    let (_, list) = call_json(&app, Method::GET, "/api/v1/reports", Some(&farmer), None).await;
    assert!(list["reports"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_report_csv_export() {
    let app = app();
    let farmer = token(Uuid::new_v4(), ActorRole::Farmer);
    call_json(&app, Method::POST, "/api/v1/reports", Some(&farmer), Some(report_body())).await;

    let (status, bytes) = call(
        &app,
        Method::GET,
        "/api/v1/reports?format=csv&status=pending",
        Some(&farmer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(bytes).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains(",2024-03,pending,1500,15,2,"));
}

#[tokio::test]
async fn test_delivery_flow() {
    let app = app();
    let farmer_id = Uuid::new_v4();
    let buyer_id = Uuid::new_v4();
    let farmer = token(farmer_id, ActorRole::Farmer);
    let buyer = token(buyer_id, ActorRole::Buyer);

    let (status, lot) = call_json(
        &app,
        Method::POST,
        "/api/v1/lots",
        Some(&farmer),
        Some(json!({
            "variety": "Tangongon",
            "grade": "S2",
            "quantity_kg": "500",
            "harvest_date": "2024-02-20",
            "location": "Barangay Mabini"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let lot_id = lot["id"].as_str().unwrap().to_string();

    let delivery_body = json!({
        "lot_id": lot_id,
        "buyer_id": buyer_id,
        "quantity_kg": "200",
        "unit_price": "45",
        "scheduled_date": "2024-03-20",
        "scheduled_time": "08:30:00",
        "pickup_location": "Barangay Mabini warehouse",
        "dropoff_location": "Davao baling station",
        "producer_contact": "0917 123 4567",
        "buyer_contact": "+63 82 234 5678",
        "delivery_method": "farmer_delivery",
        "payment_method": "bank_transfer"
    });
    let (status, delivery) = call_json(
        &app,
        Method::POST,
        "/api/v1/deliveries",
        Some(&farmer),
        Some(delivery_body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(delivery["status"], "in_transit");
    assert_eq!(delivery["payment_status"], "unpaid");
    assert_eq!(delivery["total_amount"], "9000");
    let id = delivery["id"].as_str().unwrap().to_string();

    let (status, body) = call_json(
        &app,
        Method::POST,
        "/api/v1/deliveries",
        Some(&farmer),
        Some(delivery_body),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "LOT_ALREADY_CLAIMED");

    let (_, lots) = call_json(
        &app,
        Method::GET,
        "/api/v1/lots?available_only=true",
        Some(&farmer),
        None,
    )
    .await;
    assert!(lots["lots"].as_array().unwrap().is_empty());

    let (status, _) = call_json(
        &app,
        Method::POST,
        &format!("/api/v1/deliveries/{}/deliver", id),
        Some(&buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call_json(
        &app,
        Method::DELETE,
        &format!("/api/v1/deliveries/{}", id),
        Some(&farmer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    let (status, body) = call_json(
        &app,
        Method::POST,
        &format!("/api/v1/deliveries/{}/cancel", id),
        Some(&buyer),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "reason");

    let (status, body) = call_json(
        &app,
        Method::POST,
        &format!("/api/v1/deliveries/{}/cancel", id),
        Some(&buyer),
        Some(json!({ "reason": "moisture too high" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (_, lots) = call_json(
        &app,
        Method::GET,
        "/api/v1/lots?available_only=true",
        Some(&farmer),
        None,
    )
    .await;
    assert_eq!(lots["lots"].as_array().unwrap().len(), 1);

    let (status, list) = call_json(&app, Method::GET, "/api/v1/deliveries", Some(&buyer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["deliveries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_ids_are_validation_errors() {
    let app = app();
    let farmer = token(Uuid::new_v4(), ActorRole::Farmer);
    let reviewer = token(Uuid::new_v4(), ActorRole::Reviewer);

    for (method, uri, token, body) in [
        (Method::GET, "/api/v1/deliveries/not-a-uuid", &farmer, None),
        (Method::GET, "/api/v1/lots/42", &farmer, None),
        (Method::GET, "/api/v1/reports/not-a-uuid", &farmer, None),
        (
            Method::POST,
            "/api/v1/reports/not-a-uuid/review",
            &reviewer,
            Some(json!({ "decision": "approved" })),
        ),
    ] {
        let (status, response) = call_json(&app, method, uri, Some(token.as_str()), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(response["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(response["error"]["field"], "path");
    }
}

#[tokio::test]
async fn test_oversized_amounts_are_validation_errors() {
    let app = app();
    let farmer = token(Uuid::new_v4(), ActorRole::Farmer);
    let mut body = report_body();
    body["transactions"][0]["quantity"] = json!("100000000000000000");
    body["transactions"][0]["unit_price"] = json!("1000000000000000");

    let (status, response) =
        call_json(&app, Method::POST, "/api/v1/reports", Some(&farmer), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["field"], "transactions[0].quantity");
    assert_eq!(response["error"]["message"], "amount out of range");
}
