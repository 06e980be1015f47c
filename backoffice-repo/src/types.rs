//! Database row types for each adapter and their domain conversions.

use sqlx::FromRow;

use backoffice_types::{
    ApiKey, ApiKeyId, Money, Payment, PaymentId, PaymentStatus, RepoError, Role, UserId,
};

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

pub fn parse_status(s: &str) -> Result<PaymentStatus, RepoError> {
    s.parse().map_err(RepoError::Database)
}

pub fn parse_role(s: &str) -> Result<Role, RepoError> {
    s.parse().map_err(RepoError::Database)
}

fn parse_amount(amount: i64) -> Result<Money, RepoError> {
    Money::new(amount).map_err(RepoError::Domain)
}

/// Column list shared by every payment SELECT.
pub const PAYMENT_COLUMNS: &str = "id, amount, status, description, payment_method, paid_at, \
     processed_by_id, user_id, created_at, updated_at";

// ─────────────────────────────────────────────────────────────────────────────
// SQLite rows (UUIDs and timestamps stored as TEXT)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "sqlite")]
pub use sqlite_rows::*;

#[cfg(feature = "sqlite")]
mod sqlite_rows {
    use chrono::{DateTime, SecondsFormat, Utc};

    use super::*;

    /// Fixed-width UTC timestamp so TEXT comparison orders chronologically.
    pub fn ts(dt: DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn parse_ts(s: &str) -> Result<DateTime<Utc>, RepoError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepoError::Database(e.to_string()))
    }

    pub fn parse_uuid(s: &str) -> Result<uuid::Uuid, RepoError> {
        uuid::Uuid::parse_str(s).map_err(|e| RepoError::Database(e.to_string()))
    }

    /// Payment row from SQLite.
    #[derive(FromRow)]
    pub struct SqlitePaymentRow {
        pub id: String,
        pub amount: i64,
        pub status: String,
        pub description: Option<String>,
        pub payment_method: Option<String>,
        pub paid_at: Option<String>,
        pub processed_by_id: Option<String>,
        pub user_id: Option<String>,
        pub created_at: String,
        pub updated_at: String,
    }

    impl SqlitePaymentRow {
        /// Convert database row to domain Payment.
        pub fn into_domain(self) -> Result<Payment, RepoError> {
            let user = |s: Option<String>| {
                s.as_deref()
                    .map(parse_uuid)
                    .transpose()
                    .map(|u| u.map(UserId::from_uuid))
            };

            Ok(Payment::from_parts(
                PaymentId::from_uuid(parse_uuid(&self.id)?),
                parse_amount(self.amount)?,
                parse_status(&self.status)?,
                self.description,
                self.payment_method,
                self.paid_at.as_deref().map(parse_ts).transpose()?,
                user(self.processed_by_id)?,
                user(self.user_id)?,
                parse_ts(&self.created_at)?,
                parse_ts(&self.updated_at)?,
            ))
        }
    }

    /// API key row from SQLite, joined with the owning user's role.
    #[derive(FromRow)]
    pub struct SqliteApiKeyRow {
        pub id: String,
        pub name: String,
        pub key_hash: String,
        pub user_id: String,
        pub role: String,
        pub is_active: i64,
        pub created_at: String,
        pub last_used_at: Option<String>,
    }

    impl SqliteApiKeyRow {
        /// Convert database row to domain ApiKey.
        pub fn into_domain(self) -> Result<ApiKey, RepoError> {
            Ok(ApiKey {
                id: ApiKeyId::from_uuid(parse_uuid(&self.id)?),
                name: self.name,
                key_hash: self.key_hash,
                user_id: UserId::from_uuid(parse_uuid(&self.user_id)?),
                role: parse_role(&self.role)?,
                is_active: self.is_active != 0,
                created_at: parse_ts(&self.created_at)?,
                last_used_at: self.last_used_at.as_deref().map(parse_ts).transpose()?,
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL rows (native UUID and TIMESTAMPTZ)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "postgres")]
pub use pg_rows::*;

#[cfg(feature = "postgres")]
mod pg_rows {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use super::*;

    /// Payment row from PostgreSQL.
    #[derive(FromRow)]
    pub struct PgPaymentRow {
        pub id: Uuid,
        pub amount: i64,
        pub status: String,
        pub description: Option<String>,
        pub payment_method: Option<String>,
        pub paid_at: Option<DateTime<Utc>>,
        pub processed_by_id: Option<Uuid>,
        pub user_id: Option<Uuid>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl PgPaymentRow {
        /// Convert database row to domain Payment.
        pub fn into_domain(self) -> Result<Payment, RepoError> {
            Ok(Payment::from_parts(
                PaymentId::from_uuid(self.id),
                parse_amount(self.amount)?,
                parse_status(&self.status)?,
                self.description,
                self.payment_method,
                self.paid_at,
                self.processed_by_id.map(UserId::from_uuid),
                self.user_id.map(UserId::from_uuid),
                self.created_at,
                self.updated_at,
            ))
        }
    }

    /// API key row from PostgreSQL, joined with the owning user's role.
    #[derive(FromRow)]
    pub struct PgApiKeyRow {
        pub id: Uuid,
        pub name: String,
        pub key_hash: String,
        pub user_id: Uuid,
        pub role: String,
        pub is_active: bool,
        pub created_at: DateTime<Utc>,
        pub last_used_at: Option<DateTime<Utc>>,
    }

    impl PgApiKeyRow {
        /// Convert database row to domain ApiKey.
        pub fn into_domain(self) -> Result<ApiKey, RepoError> {
            Ok(ApiKey {
                id: ApiKeyId::from_uuid(self.id),
                name: self.name,
                key_hash: self.key_hash,
                user_id: UserId::from_uuid(self.user_id),
                role: parse_role(&self.role)?,
                is_active: self.is_active,
                created_at: self.created_at,
                last_used_at: self.last_used_at,
            })
        }
    }
}
