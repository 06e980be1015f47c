//! Authentication middleware for API key validation.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use backoffice_types::Repository;

use super::handlers::AppState;

/// Paths reachable without a key.
const PUBLIC_PATHS: &[&str] = &["/health", "/api-docs/openapi.json"];

/// Extracts the API key from the Authorization header.
/// Expected format: "Bearer <api_key>" or just "<api_key>"
fn extract_api_key(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;
    Some(header.strip_prefix("Bearer ").unwrap_or(header).trim())
}

fn is_public(request: &Request<Body>) -> bool {
    let path = request.uri().path();
    PUBLIC_PATHS.contains(&path) || (path == "/api/bootstrap" && request.method() == Method::POST)
}

/// Authentication middleware that validates API keys.
///
/// This middleware:
/// 1. Extracts the API key from the Authorization header
/// 2. Hashes it using SHA-256
/// 3. Verifies the hash against the database
/// 4. Attaches the key's [`Caller`](backoffice_types::Caller) to the request
///    extensions, or returns 401 Unauthorized
///
/// Endpoints that bypass authentication:
/// - `/health` - Health check endpoint
/// - `/api-docs/openapi.json` - OpenAPI document
/// - `POST /api/bootstrap` - Creates the first API key (only works when no keys exist)
pub async fn auth_middleware<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if is_public(&request) {
        return next.run(request).await;
    }

    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let api_key = match extract_api_key(auth_header) {
        Some(key) if !key.is_empty() => key,
        _ => {
            return unauthorized_response("Missing or invalid Authorization header");
        }
    };

    let key_hash = backoffice_repo::security::hash_api_key(api_key);

    match state.service.repo().verify_api_key_hash(&key_hash).await {
        Ok(Some(api_key)) => {
            let caller = api_key.caller();
            tracing::debug!(user_id = %caller.user_id, role = %caller.role, "Authenticated");
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Ok(None) => unauthorized_response("Invalid API key"),
        Err(e) => {
            tracing::error!("API key verification failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Internal server error",
                    "code": 500
                })),
            )
                .into_response()
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": message,
            "code": 401
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_api_key_bearer() {
        assert_eq!(
            extract_api_key(Some("Bearer sk_test_123")),
            Some("sk_test_123")
        );
    }

    #[test]
    fn test_extract_api_key_raw() {
        assert_eq!(extract_api_key(Some("sk_test_123")), Some("sk_test_123"));
    }

    #[test]
    fn test_extract_api_key_none() {
        assert_eq!(extract_api_key(None), None);
    }

    #[test]
    fn test_bootstrap_is_public_only_for_post() {
        let post = Request::builder()
            .method(Method::POST)
            .uri("/api/bootstrap")
            .body(Body::empty())
            .unwrap();
        let get = Request::builder()
            .uri("/api/bootstrap")
            .body(Body::empty())
            .unwrap();
        let payments = Request::builder()
            .uri("/api/payments")
            .body(Body::empty())
            .unwrap();

        assert!(is_public(&post));
        assert!(!is_public(&get));
        assert!(!is_public(&payments));
    }
}
