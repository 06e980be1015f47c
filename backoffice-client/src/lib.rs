//! # Back Office Client SDK
//!
//! A typed Rust client for the marketplace back office API.

use backoffice_types::{
    ApiKeyCreatedResponse, ApiKeyId, ApiKeyInfo, BootstrapRequest, CreateApiKeyRequest,
    CreatePaymentRequest, FinancialReport, MarkPaidRequest, Page, Payment, PaymentId,
    PaymentPatch, PaymentQuery, Role, UserId,
};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Back office API client.
pub struct BackofficeClient {
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

impl BackofficeClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            http: Client::new(),
        }
    }

    /// Sets the API key sent as a Bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self.request(Method::GET, "/health").send().await?;
        Ok(resp.status().is_success())
    }

    // ── Payments ────────────────────────────────────────────────────────────

    /// Creates a pending payment.
    pub async fn create_payment(&self, req: &CreatePaymentRequest) -> Result<Payment, ClientError> {
        let resp = self.request(Method::POST, "/api/payments").json(req).send().await?;
        self.handle_response(resp).await
    }

    /// Lists payments, newest first.
    pub async fn list_payments(&self, query: &PaymentQuery) -> Result<Page<Payment>, ClientError> {
        let resp = self.request(Method::GET, "/api/payments").query(query).send().await?;
        self.handle_response(resp).await
    }

    /// Gets a payment by ID.
    pub async fn get_payment(&self, id: PaymentId) -> Result<Payment, ClientError> {
        self.get(&format!("/api/payments/{}", id)).await
    }

    /// Applies a partial update.
    pub async fn update_payment(
        &self,
        id: PaymentId,
        patch: &PaymentPatch,
    ) -> Result<Payment, ClientError> {
        self.send_json(Method::PATCH, &format!("/api/payments/{}", id), patch)
            .await
    }

    /// Settles a pending payment. Requires an administrator key.
    pub async fn mark_paid(
        &self,
        id: PaymentId,
        payment_method: Option<String>,
    ) -> Result<Payment, ClientError> {
        let req = MarkPaidRequest { payment_method };
        self.send_json(Method::POST, &format!("/api/payments/{}/mark-paid", id), &req)
            .await
    }

    /// Deletes an unpaid payment.
    pub async fn delete_payment(&self, id: PaymentId) -> Result<(), ClientError> {
        self.delete(&format!("/api/payments/{}", id)).await
    }

    // ── Reports ─────────────────────────────────────────────────────────────

    /// Report over the caller's visible payments, with the most recent attached.
    pub async fn payment_financial_report(
        &self,
        query: &PaymentQuery,
    ) -> Result<FinancialReport, ClientError> {
        let resp = self
            .request(Method::GET, "/api/payments/financial-report")
            .query(query)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// System-wide report. Requires an administrator key.
    pub async fn admin_financial_report(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<FinancialReport, ClientError> {
        let query = PaymentQuery {
            from: from.map(String::from),
            to: to.map(String::from),
            ..Default::default()
        };
        let resp = self
            .request(Method::GET, "/api/admin/financial-report")
            .query(&query)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    // ── API keys ────────────────────────────────────────────────────────────

    /// Creates the first administrator key. Only works on an empty key store.
    pub async fn bootstrap(&self, name: &str) -> Result<ApiKeyCreatedResponse, ClientError> {
        let req = BootstrapRequest {
            name: name.to_string(),
        };
        self.send_json(Method::POST, "/api/bootstrap", &req).await
    }

    /// Issues a key for a new or existing user.
    pub async fn create_api_key(
        &self,
        name: &str,
        role: Role,
        user_id: Option<UserId>,
    ) -> Result<ApiKeyCreatedResponse, ClientError> {
        let req = CreateApiKeyRequest {
            name: name.to_string(),
            role,
            user_id,
        };
        self.send_json(Method::POST, "/api/keys", &req).await
    }

    /// Lists key metadata.
    pub async fn list_api_keys(&self) -> Result<Vec<ApiKeyInfo>, ClientError> {
        self.get("/api/keys").await
    }

    /// Deactivates a key.
    pub async fn delete_api_key(&self, id: ApiKeyId) -> Result<(), ClientError> {
        self.delete(&format!("/api/keys/{}", id)).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.request(Method::GET, path).send().await?;
        self.handle_response(resp).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self.request(method, path).json(body).send().await?;
        self.handle_response(resp).await
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let resp = self.request(Method::DELETE, path).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::api_error(status, resp).await)
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            Err(Self::api_error(status, resp).await)
        }
    }

    async fn api_error(status: reqwest::StatusCode, resp: reqwest::Response) -> ClientError {
        let body = resp.text().await.unwrap_or_default();
        ClientError::Api {
            status: status.as_u16(),
            message: error_message(body),
        }
    }
}

/// Pulls `error` out of a JSON error body, falling back to the raw text.
fn error_message(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = BackofficeClient::new("http://localhost:3000");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_trailing_slash() {
        let client = BackofficeClient::new("http://localhost:3000/");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_api_key() {
        let client = BackofficeClient::new("http://localhost:3000").with_api_key("sk_test");
        assert_eq!(client.api_key, Some("sk_test".to_string()));
    }

    #[test]
    fn test_error_message_prefers_json_error_field() {
        let body = r#"{"error":"Payment already processed","code":409}"#.to_string();
        assert_eq!(error_message(body), "Payment already processed");
        assert_eq!(error_message("Bad Gateway".to_string()), "Bad Gateway");
    }
}
