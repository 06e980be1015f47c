//! SQLite repository adapter.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;

use backoffice_types::domain::payment::now;
use backoffice_types::{
    ApiKey, ApiKeyId, ApiKeyRepository, Pagination, Payment, PaymentFilter, PaymentId,
    PaymentRepository, RepoError, Revision, Role, UserDirectory, UserId,
};

use crate::security::{generate_api_key, hash_api_key};
use crate::types::{PAYMENT_COLUMNS, SqliteApiKeyRow, SqlitePaymentRow, parse_role, ts};

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &SqlitePool, sql: &str, name: &str) -> anyhow::Result<()> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_payments.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_api_keys.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if !is_in_memory(database_url) {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is a separate database.
        let max_connections = if is_in_memory(database_url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;
        tracing::debug!("SQLite schema ready");

        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the database schema (for testing with existing pool).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        run_migrations(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))
    }
}

fn db_err(e: sqlx::Error) -> RepoError {
    RepoError::Database(e.to_string())
}

/// Appends the WHERE clause for `filter`.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PaymentFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.to_string());
    }
    if let Some(from) = filter.created.from {
        qb.push(" AND created_at >= ").push_bind(ts(from));
    }
    if let Some(to) = filter.created.to {
        qb.push(" AND created_at <= ").push_bind(ts(to));
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id.to_string());
    }
    if let Some(processed_by) = filter.processed_by_id {
        qb.push(" AND processed_by_id = ")
            .push_bind(processed_by.to_string());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment store
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentRepository for SqliteRepo {
    async fn create_payment(&self, payment: &Payment) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO payments (id, amount, status, description, payment_method, paid_at, processed_by_id, user_id, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(payment.id.to_string())
        .bind(payment.amount.minor_units())
        .bind(payment.status.to_string())
        .bind(&payment.description)
        .bind(&payment.payment_method)
        .bind(payment.paid_at.map(ts))
        .bind(payment.processed_by_id.map(|u| u.to_string()))
        .bind(payment.user_id.map(|u| u.to_string()))
        .bind(ts(payment.created_at))
        .bind(ts(payment.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn find_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepoError> {
        let row: Option<SqlitePaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE id = ?",
            PAYMENT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(SqlitePaymentRow::into_domain).transpose()
    }

    async fn find_payments(
        &self,
        filter: &PaymentFilter,
        page: Pagination,
    ) -> Result<Vec<Payment>, RepoError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM payments", PAYMENT_COLUMNS));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<SqlitePaymentRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(SqlitePaymentRow::into_domain).collect()
    }

    async fn count_payments(&self, filter: &PaymentFilter) -> Result<i64, RepoError> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM payments");
        push_filter(&mut qb, filter);

        let (count,): (i64,) = qb
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(count)
    }

    async fn fetch_all_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, RepoError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM payments", PAYMENT_COLUMNS));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at ASC, id ASC");

        let rows: Vec<SqlitePaymentRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(SqlitePaymentRow::into_domain).collect()
    }

    async fn update_payment(
        &self,
        payment: &Payment,
        expected: Revision,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE payments
               SET amount = ?, status = ?, description = ?, payment_method = ?,
                   paid_at = ?, processed_by_id = ?, updated_at = ?
               WHERE id = ? AND status = ? AND updated_at = ?"#,
        )
        .bind(payment.amount.minor_units())
        .bind(payment.status.to_string())
        .bind(&payment.description)
        .bind(&payment.payment_method)
        .bind(payment.paid_at.map(ts))
        .bind(payment.processed_by_id.map(|u| u.to_string()))
        .bind(ts(payment.updated_at))
        .bind(payment.id.to_string())
        .bind(expected.status.to_string())
        .bind(ts(expected.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_payment(&self, id: PaymentId) -> Result<bool, RepoError> {
        let result = sqlx::query(r#"DELETE FROM payments WHERE id = ? AND status <> 'PAID'"#)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users & API keys
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl UserDirectory for SqliteRepo {
    async fn role_of(&self, user_id: UserId) -> Result<Option<Role>, RepoError> {
        let row: Option<(String,)> = sqlx::query_as(r#"SELECT role FROM users WHERE id = ?"#)
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|(role,)| parse_role(&role)).transpose()
    }
}

const API_KEY_SELECT: &str = r#"SELECT k.id, k.name, k.key_hash, k.user_id, u.role, k.is_active, k.created_at, k.last_used_at
       FROM api_keys k JOIN users u ON u.id = k.user_id"#;

#[async_trait]
impl ApiKeyRepository for SqliteRepo {
    async fn verify_api_key_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, RepoError> {
        let row: Option<SqliteApiKeyRow> = sqlx::query_as(&format!(
            "{} WHERE k.key_hash = ? AND k.is_active = 1",
            API_KEY_SELECT
        ))
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let used_at = now();
        sqlx::query(r#"UPDATE api_keys SET last_used_at = ? WHERE id = ?"#)
            .bind(ts(used_at))
            .bind(&row.id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        let mut key = row.into_domain()?;
        key.last_used_at = Some(used_at);
        Ok(Some(key))
    }

    async fn create_api_key(
        &self,
        name: &str,
        role: Role,
        user_id: Option<UserId>,
    ) -> Result<(ApiKey, String), RepoError> {
        let raw_key = generate_api_key();
        let key = ApiKey::new(
            name.to_string(),
            hash_api_key(&raw_key),
            user_id.unwrap_or_default(),
            role,
        );

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        let existing: Option<(String,)> = sqlx::query_as(r#"SELECT role FROM users WHERE id = ?"#)
            .bind(key.user_id.to_string())
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(db_err)?;

        match existing {
            Some((stored,)) if parse_role(&stored)? != role => {
                return Err(RepoError::Conflict(format!(
                    "User {} already holds role {}",
                    key.user_id, stored
                )));
            }
            Some(_) => {}
            None => {
                sqlx::query(r#"INSERT INTO users (id, role, created_at) VALUES (?, ?, ?)"#)
                    .bind(key.user_id.to_string())
                    .bind(role.to_string())
                    .bind(ts(key.created_at))
                    .execute(&mut *db_tx)
                    .await
                    .map_err(db_err)?;
            }
        }

        sqlx::query(
            r#"INSERT INTO api_keys (id, name, key_hash, user_id, is_active, created_at)
               VALUES (?, ?, ?, ?, 1, ?)"#,
        )
        .bind(key.id.to_string())
        .bind(&key.name)
        .bind(&key.key_hash)
        .bind(key.user_id.to_string())
        .bind(ts(key.created_at))
        .execute(&mut *db_tx)
        .await
        .map_err(db_err)?;

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok((key, raw_key))
    }

    async fn count_api_keys(&self) -> Result<i64, RepoError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM api_keys WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.0)
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, RepoError> {
        let rows: Vec<SqliteApiKeyRow> = sqlx::query_as(&format!(
            "{} WHERE k.is_active = 1 ORDER BY k.created_at DESC",
            API_KEY_SELECT
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(SqliteApiKeyRow::into_domain).collect()
    }

    async fn delete_api_key(&self, id: ApiKeyId) -> Result<bool, RepoError> {
        let result =
            sqlx::query(r#"UPDATE api_keys SET is_active = 0 WHERE id = ? AND is_active = 1"#)
                .bind(id.to_string())
                .execute(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }
}
