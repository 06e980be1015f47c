//! End-to-end HTTP tests for the payment lifecycle and reports.
//!
//! Runs the full router (auth, rate limiting, handlers) against in-memory
//! SQLite.

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use backoffice_hex::{PaymentService, inbound::HttpServer};
use backoffice_repo::SqliteRepo;

async fn create_app() -> Router {
    let repo = SqliteRepo::new("sqlite::memory:").await.unwrap();
    HttpServer::with_rate_limit(PaymentService::new(repo), 1_000).router()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    key: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("Authorization", format!("Bearer {}", key));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn bootstrap(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/bootstrap",
        None,
        Some(json!({ "name": "first-admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "ADMIN");
    body["api_key"].as_str().unwrap().to_string()
}

/// Issues a key for a fresh user with `role`, returning (key, user_id).
async fn issue_key(app: &Router, admin: &str, role: &str) -> (String, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/keys",
        Some(admin),
        Some(json!({ "name": format!("{}-key", role.to_lowercase()), "role": role })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (
        body["api_key"].as_str().unwrap().to_string(),
        body["user_id"].as_str().unwrap().to_string(),
    )
}

async fn create_payment(app: &Router, key: &str, amount: i64) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/payments",
        Some(key),
        Some(json!({ "amount": amount, "description": "Hotel booking" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_requests_without_key_are_rejected() {
    let app = create_app().await;

    let (status, body) = send(&app, Method::GET, "/api/payments", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 401);

    let (status, _) = send(&app, Method::GET, "/api/payments", Some("sk_nope"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bootstrap_only_once() {
    let app = create_app().await;
    bootstrap(&app).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/bootstrap",
        None,
        Some(json!({ "name": "second" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_openapi_document_is_public() {
    let app = create_app().await;

    let (status, body) = send(&app, Method::GET, "/api-docs/openapi.json", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/payments"].is_object());
}

#[tokio::test]
async fn test_payment_lifecycle_over_http() {
    let app = create_app().await;
    let admin = bootstrap(&app).await;
    let id = create_payment(&app, &admin, 15050).await;
    let uri = format!("/api/payments/{}", id);

    let (status, body) = send(&app, Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["amount"], 15050);
    assert!(body["paid_at"].is_null());

    let mark = format!("{}/mark-paid", uri);
    let (status, body) = send(
        &app,
        Method::POST,
        &mark,
        Some(&admin),
        Some(json!({ "payment_method": "pix" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PAID");
    assert_eq!(body["payment_method"], "pix");
    assert!(body["paid_at"].is_string());

    let (status, _) = send(&app, Method::POST, &mark, Some(&admin), Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&admin),
        Some(json!({ "amount": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Paid payments can still be cancelled through the generic update
    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&admin),
        Some(json!({ "status": "CANCELLED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

#[tokio::test]
async fn test_invalid_amounts_are_bad_requests() {
    let app = create_app().await;
    let admin = bootstrap(&app).await;

    for amount in [0, -5, 100_000_000] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/payments",
            Some(&admin),
            Some(json!({ "amount": amount })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "amount {}", amount);
    }
}

#[tokio::test]
async fn test_non_admins_are_scoped_to_their_payments() {
    let app = create_app().await;
    let admin = bootstrap(&app).await;
    let (supplier, supplier_id) = issue_key(&app, &admin, "SUPPLIER").await;
    let (agency, _) = issue_key(&app, &admin, "AGENCY").await;

    let own = create_payment(&app, &supplier, 1000).await;
    create_payment(&app, &admin, 2000).await;

    let (status, body) = send(&app, Method::GET, "/api/payments", Some(&supplier), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["user_id"], supplier_id.as_str());

    let (status, body) = send(&app, Method::GET, "/api/payments", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let uri = format!("/api/payments/{}", own);
    let (status, _) = send(&app, Method::GET, &uri, Some(&agency), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Only administrators settle payments, even their own
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("{}/mark-paid", uri),
        Some(&supplier),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/admin/financial-report",
        Some(&supplier),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/keys", Some(&agency), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_financial_reports() {
    let app = create_app().await;
    let admin = bootstrap(&app).await;

    for amount in [1000, 2000, 3333] {
        let id = create_payment(&app, &admin, amount).await;
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/payments/{}/mark-paid", id),
            Some(&admin),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    create_payment(&app, &admin, 500).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/admin/financial-report",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total_payments"], 4);
    assert_eq!(body["summary"]["paid_payments"], 3);
    assert_eq!(body["summary"]["paid_amount"], 63.33);
    assert_eq!(body["summary"]["total_amount"], 68.33);
    assert_eq!(body["monthly_revenue"][0]["count"], 3);
    assert_eq!(body["monthly_revenue"][0]["total_amount"], 6333);
    assert!(body.get("recent_payments").is_none());

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/payments/financial-report",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recent_payments"].as_array().unwrap().len(), 4);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/admin/financial-report?from=2024-05-01&to=2024-04-01",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_mark_paid_accepts_an_empty_body() {
    let app = create_app().await;
    let admin = bootstrap(&app).await;
    let id = create_payment(&app, &admin, 4200).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/payments/{}/mark-paid", id),
        Some(&admin),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PAID");
    assert!(body["payment_method"].is_null());
}
