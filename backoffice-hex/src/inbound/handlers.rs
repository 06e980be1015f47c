//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use utoipa::OpenApi;

use backoffice_types::{
    ApiKeyCreatedResponse, ApiKeyId, ApiKeyInfo, AppError, BootstrapRequest, Caller,
    CreateApiKeyRequest, CreatePaymentRequest, DomainError, MarkPaidRequest, PaymentId,
    PaymentQuery, Repository, Role, UpdatePaymentRequest,
};

use crate::PaymentService;
use crate::openapi::ApiDoc;

/// Application state shared across handlers.
pub struct AppState<R: Repository> {
    pub service: PaymentService<R>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError(err.into())
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::InvalidAmount(_)
        | DomainError::InvalidTransition { .. }
        | DomainError::InvalidDateRange(_)
        | DomainError::ValidationError(_) => StatusCode::BAD_REQUEST,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::ImmutableState(_)
        | DomainError::AlreadyProcessed(_)
        | DomainError::CannotDeletePaid(_) => StatusCode::CONFLICT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::Domain(e) => (domain_status(e), e.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

fn require_admin(caller: &Caller) -> Result<(), AppError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Administrator role required".into()))
    }
}

fn parse_payment_id(id: &str) -> Result<PaymentId, AppError> {
    id.parse()
        .map_err(|_| AppError::BadRequest("Invalid payment ID".into()))
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Serves the OpenAPI document.
pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ─────────────────────────────────────────────────────────────────────────────
// Payments
// ─────────────────────────────────────────────────────────────────────────────

/// Create a payment. Non-admins always pay for themselves.
#[tracing::instrument(skip(state), fields(user_id = %caller.user_id, amount = req.amount))]
pub async fn create_payment<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut req = req;
    if !caller.is_admin() {
        req.user_id = Some(caller.user_id);
    }

    let payment = state.service.create(req).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// List payments, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_payments<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<PaymentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut filter = query.filter()?;
    if !caller.is_admin() {
        filter.user_id = Some(caller.user_id);
    }

    let page = state.service.list(&filter, query.pagination()).await?;
    Ok(Json(page))
}

/// Get payment by ID.
#[tracing::instrument(skip(state), fields(payment_id = %id))]
pub async fn get_payment<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id = parse_payment_id(&id)?;

    let payment = state.service.get(payment_id).await?;
    if !caller.can_access(payment.user_id) {
        return Err(AppError::Forbidden("Not your payment".into()).into());
    }
    Ok(Json(payment))
}

/// Partially update a payment.
#[tracing::instrument(skip(state), fields(payment_id = %id))]
pub async fn update_payment<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(patch): Json<UpdatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id = parse_payment_id(&id)?;

    let payment = state.service.get(payment_id).await?;
    if !caller.can_access(payment.user_id) {
        return Err(AppError::Forbidden("Not your payment".into()).into());
    }

    let updated = state.service.update(payment_id, patch).await?;
    Ok(Json(updated))
}

/// Mark a payment as paid. The lifecycle checks the caller's role.
#[tracing::instrument(skip(state), fields(payment_id = %id, actor = %caller.user_id))]
pub async fn mark_paid<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    body: Option<Json<MarkPaidRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id = parse_payment_id(&id)?;
    // The body is optional; a bare POST settles without a method
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let payment = state
        .service
        .mark_paid(payment_id, caller.user_id, req.payment_method)
        .await?;
    Ok(Json(payment))
}

/// Delete an unpaid payment.
#[tracing::instrument(skip(state), fields(payment_id = %id))]
pub async fn delete_payment<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id = parse_payment_id(&id)?;

    let payment = state.service.get(payment_id).await?;
    if !caller.can_access(payment.user_id) {
        return Err(AppError::Forbidden("Not your payment".into()).into());
    }

    state.service.remove(payment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

/// Payment-scoped financial report with the ten most recent payments.
#[tracing::instrument(skip(state))]
pub async fn payment_financial_report<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<PaymentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut filter = query.filter()?;
    // Status slices are part of the report itself
    filter.status = None;
    if !caller.is_admin() {
        filter.user_id = Some(caller.user_id);
    }

    let report = state.service.payment_financial_report(&filter).await?;
    Ok(Json(report))
}

/// System-wide financial report (admin only).
#[tracing::instrument(skip(state))]
pub async fn admin_financial_report<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<PaymentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&caller)?;

    let report = state.service.financial_report(query.date_range()?).await?;
    Ok(Json(report))
}

// ─────────────────────────────────────────────────────────────────────────────
// API Key Management
// ─────────────────────────────────────────────────────────────────────────────

/// Bootstrap endpoint - creates the first API key.
///
/// This endpoint only works when there are NO existing API keys in the system.
/// The key belongs to a new administrator and is returned only once.
#[tracing::instrument(skip(state), fields(key_name = %req.name))]
pub async fn bootstrap<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<BootstrapRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let key_count = state.service.repo().count_api_keys().await.map_err(AppError::from)?;

    if key_count > 0 {
        return Err(AppError::BadRequest(
            "Bootstrap not allowed: API keys already exist. Use an existing key to create new ones.".into()
        ).into());
    }

    let (api_key, raw_key) = state
        .service
        .repo()
        .create_api_key(&req.name, Role::Admin, None)
        .await
        .map_err(AppError::from)?;

    tracing::info!(user_id = %api_key.user_id, "Bootstrapped first administrator key");

    Ok((
        StatusCode::CREATED,
        Json(ApiKeyCreatedResponse {
            api_key: raw_key,
            key_id: api_key.id,
            user_id: api_key.user_id,
            role: api_key.role,
            message: "First API key created. Save this key securely - it won't be shown again!"
                .into(),
        }),
    ))
}

/// Create a new API key (admin only).
#[tracing::instrument(skip(state), fields(key_name = %req.name, role = %req.role))]
pub async fn create_api_key<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&caller)?;

    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("API key name cannot be empty".into()).into());
    }

    let (api_key, raw_key) = state
        .service
        .repo()
        .create_api_key(&req.name, req.role, req.user_id)
        .await
        .map_err(AppError::from)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiKeyCreatedResponse {
            api_key: raw_key,
            key_id: api_key.id,
            user_id: api_key.user_id,
            role: api_key.role,
            message: "API key created. Save this key securely - it won't be shown again!".into(),
        }),
    ))
}

/// List all active API keys (without exposing raw keys).
#[tracing::instrument(skip(state))]
pub async fn list_api_keys<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&caller)?;

    let keys = state.service.repo().list_api_keys().await.map_err(AppError::from)?;

    let response: Vec<ApiKeyInfo> = keys.into_iter().map(ApiKeyInfo::from).collect();
    Ok(Json(response))
}

/// Delete (deactivate) an API key.
#[tracing::instrument(skip(state), fields(key_id = %id))]
pub async fn delete_api_key<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&caller)?;

    let key_id: ApiKeyId = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid API key ID".into()))?;

    let deleted = state
        .service
        .repo()
        .delete_api_key(key_id)
        .await
        .map_err(AppError::from)?;

    if deleted {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(AppError::NotFound("API key not found".into()).into())
    }
}
