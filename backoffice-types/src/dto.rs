//! Data Transfer Objects (DTOs) for requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    ApiKey, ApiKeyId, DateRange, FinancialAggregate, MonthlyBucket, Pagination, Payment,
    PaymentFilter, PaymentPatch, PaymentStatus, Role, UserId,
};
use crate::error::DomainError;

// ─────────────────────────────────────────────────────────────────────────────
// Payment DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a new payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    /// Amount in minor currency units (cents)
    #[schema(example = 15050)]
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Hotel booking, 2 nights")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "pix")]
    pub payment_method: Option<String>,
    /// Payer; defaults to the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

/// Partial update of a payment; omitted fields stay unchanged.
pub type UpdatePaymentRequest = PaymentPatch;

/// Request to settle a payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MarkPaidRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "pix")]
    pub payment_method: Option<String>,
}

/// Query-string filters shared by the listing and report endpoints.
///
/// Dates accept RFC 3339 timestamps or `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_by_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

impl PaymentQuery {
    pub fn date_range(&self) -> Result<DateRange, DomainError> {
        DateRange::parse(self.from.as_deref(), self.to.as_deref())
    }

    /// Builds the store filter once, at the boundary.
    pub fn filter(&self) -> Result<PaymentFilter, DomainError> {
        Ok(PaymentFilter {
            status: self.status,
            created: self.date_range()?,
            user_id: self.user_id,
            processed_by_id: self.processed_by_id,
        })
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Financial report DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Headline figures. Amounts are major units rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FinancialSummary {
    pub total_payments: u64,
    pub paid_payments: u64,
    pub pending_payments: u64,
    pub cancelled_payments: u64,
    #[schema(example = 1250.75)]
    pub total_amount: f64,
    pub paid_amount: f64,
    pub pending_amount: f64,
    pub cancelled_amount: f64,
    pub average_transaction_value: f64,
}

/// Paid revenue for one month of `paid_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`, or `unknown`
    #[schema(example = "2024-05")]
    pub month: String,
    pub count: u64,
    /// Exact sum in minor units
    #[schema(example = 6333)]
    pub total_amount: i64,
    /// `total_amount` in major units, rounded to two decimals
    #[schema(example = 63.33)]
    pub revenue: f64,
}

impl From<&MonthlyBucket> for MonthlyRevenue {
    fn from(bucket: &MonthlyBucket) -> Self {
        Self {
            month: bucket.month.clone(),
            count: bucket.totals.count,
            total_amount: bucket.totals.amount.minor_units(),
            revenue: bucket.totals.amount.to_display(),
        }
    }
}

/// Financial report as returned by both report endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FinancialReport {
    pub summary: FinancialSummary,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    /// Ten most recent matching payments (payment-scoped report only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_payments: Option<Vec<Payment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl FinancialReport {
    /// Converts an integer aggregate to display values. This is the only
    /// place report amounts are rounded.
    pub fn from_aggregate(aggregate: &FinancialAggregate, range: DateRange) -> Self {
        Self {
            summary: FinancialSummary {
                total_payments: aggregate.all.count,
                paid_payments: aggregate.paid.count,
                pending_payments: aggregate.pending.count,
                cancelled_payments: aggregate.cancelled.count,
                total_amount: aggregate.all.amount.to_display(),
                paid_amount: aggregate.paid.amount.to_display(),
                pending_amount: aggregate.pending.amount.to_display(),
                cancelled_amount: aggregate.cancelled.amount.to_display(),
                average_transaction_value: aggregate.average_transaction_value().to_display(),
            },
            monthly_revenue: aggregate
                .monthly_revenue
                .iter()
                .map(MonthlyRevenue::from)
                .collect(),
            recent_payments: None,
            from: range.from,
            to: range.to,
        }
    }

    pub fn with_recent_payments(mut self, payments: Vec<Payment>) -> Self {
        self.recent_payments = Some(payments);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API key DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to bootstrap the first (admin) API key.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BootstrapRequest {
    /// Name for the API key
    #[schema(example = "first-admin")]
    pub name: String,
}

/// Response carrying a freshly generated raw key.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyCreatedResponse {
    /// The generated API key (shown only once)
    #[schema(example = "sk_abc123xyz...")]
    pub api_key: String,
    pub key_id: ApiKeyId,
    pub user_id: UserId,
    pub role: Role,
    /// Informational message
    pub message: String,
}

/// Request to issue a new API key (admin only).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateApiKeyRequest {
    #[schema(example = "supplier-acme")]
    pub name: String,
    pub role: Role,
    /// Existing user to attach the key to; a new user id is minted if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

/// API key metadata (never the raw key).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyInfo {
    pub id: ApiKeyId,
    pub name: String,
    pub user_id: UserId,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<ApiKey> for ApiKeyInfo {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            name: key.name,
            user_id: key.user_id,
            role: key.role,
            is_active: key.is_active,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
        }
    }
}
