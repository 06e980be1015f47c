//! PostgreSQL repository adapter.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use backoffice_types::domain::payment::now;
use backoffice_types::{
    ApiKey, ApiKeyId, ApiKeyRepository, Pagination, Payment, PaymentFilter, PaymentId,
    PaymentRepository, RepoError, Revision, Role, UserDirectory, UserId,
};

use crate::security::{generate_api_key, hash_api_key};
use crate::types::{PAYMENT_COLUMNS, PgApiKeyRow, PgPaymentRow, parse_role};

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository. Status-dependent writes are single conditional
/// statements, so no explicit row locks are taken.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
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
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_payments_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_api_keys_pg.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        tracing::debug!("PostgreSQL schema ready");
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
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
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &PaymentFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.to_string());
    }
    if let Some(from) = filter.created.from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.created.to {
        qb.push(" AND created_at <= ").push_bind(to);
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id.into_uuid());
    }
    if let Some(processed_by) = filter.processed_by_id {
        qb.push(" AND processed_by_id = ")
            .push_bind(processed_by.into_uuid());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment store
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentRepository for PostgresRepo {
    async fn create_payment(&self, payment: &Payment) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO payments (id, amount, status, description, payment_method, paid_at, processed_by_id, user_id, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(payment.id.into_uuid())
        .bind(payment.amount.minor_units())
        .bind(payment.status.to_string())
        .bind(&payment.description)
        .bind(&payment.payment_method)
        .bind(payment.paid_at)
        .bind(payment.processed_by_id.map(UserId::into_uuid))
        .bind(payment.user_id.map(UserId::into_uuid))
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn find_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepoError> {
        let row: Option<PgPaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(PgPaymentRow::into_domain).transpose()
    }

    async fn find_payments(
        &self,
        filter: &PaymentFilter,
        page: Pagination,
    ) -> Result<Vec<Payment>, RepoError> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM payments", PAYMENT_COLUMNS));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<PgPaymentRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(PgPaymentRow::into_domain).collect()
    }

    async fn count_payments(&self, filter: &PaymentFilter) -> Result<i64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM payments");
        push_filter(&mut qb, filter);

        let (count,): (i64,) = qb
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(count)
    }

    async fn fetch_all_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, RepoError> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM payments", PAYMENT_COLUMNS));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at ASC, id ASC");

        let rows: Vec<PgPaymentRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(PgPaymentRow::into_domain).collect()
    }

    async fn update_payment(
        &self,
        payment: &Payment,
        expected: Revision,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE payments
               SET amount = $1, status = $2, description = $3, payment_method = $4,
                   paid_at = $5, processed_by_id = $6, updated_at = $7
               WHERE id = $8 AND status = $9 AND updated_at = $10"#,
        )
        .bind(payment.amount.minor_units())
        .bind(payment.status.to_string())
        .bind(&payment.description)
        .bind(&payment.payment_method)
        .bind(payment.paid_at)
        .bind(payment.processed_by_id.map(UserId::into_uuid))
        .bind(payment.updated_at)
        .bind(payment.id.into_uuid())
        .bind(expected.status.to_string())
        .bind(expected.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_payment(&self, id: PaymentId) -> Result<bool, RepoError> {
        let result = sqlx::query(r#"DELETE FROM payments WHERE id = $1 AND status <> 'PAID'"#)
            .bind(id.into_uuid())
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
impl UserDirectory for PostgresRepo {
    async fn role_of(&self, user_id: UserId) -> Result<Option<Role>, RepoError> {
        let row: Option<(String,)> = sqlx::query_as(r#"SELECT role FROM users WHERE id = $1"#)
            .bind(user_id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|(role,)| parse_role(&role)).transpose()
    }
}

#[async_trait]
impl ApiKeyRepository for PostgresRepo {
    async fn verify_api_key_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, RepoError> {
        let row: Option<PgApiKeyRow> = sqlx::query_as(
            r#"
            UPDATE api_keys k
            SET last_used_at = $2
            FROM users u
            WHERE u.id = k.user_id AND k.key_hash = $1 AND k.is_active = TRUE
            RETURNING k.id, k.name, k.key_hash, k.user_id, u.role, k.is_active, k.created_at, k.last_used_at
            "#,
        )
        .bind(key_hash)
        .bind(now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(PgApiKeyRow::into_domain).transpose()
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

        // Lock the user row so a concurrent issuer cannot change its role
        let existing: Option<(String,)> =
            sqlx::query_as(r#"SELECT role FROM users WHERE id = $1 FOR UPDATE"#)
                .bind(key.user_id.into_uuid())
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
                sqlx::query(
                    r#"INSERT INTO users (id, role, created_at) VALUES ($1, $2, $3)
                       ON CONFLICT (id) DO NOTHING"#,
                )
                .bind(key.user_id.into_uuid())
                .bind(role.to_string())
                .bind(key.created_at)
                .execute(&mut *db_tx)
                .await
                .map_err(db_err)?;
            }
        }

        sqlx::query(
            r#"INSERT INTO api_keys (id, name, key_hash, user_id, is_active, created_at)
               VALUES ($1, $2, $3, $4, TRUE, $5)"#,
        )
        .bind(key.id.into_uuid())
        .bind(&key.name)
        .bind(&key.key_hash)
        .bind(key.user_id.into_uuid())
        .bind(key.created_at)
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
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM api_keys WHERE is_active = TRUE")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.0)
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, RepoError> {
        let rows: Vec<PgApiKeyRow> = sqlx::query_as(
            r#"
            SELECT k.id, k.name, k.key_hash, k.user_id, u.role, k.is_active, k.created_at, k.last_used_at
            FROM api_keys k JOIN users u ON u.id = k.user_id
            WHERE k.is_active = TRUE
            ORDER BY k.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(PgApiKeyRow::into_domain).collect()
    }

    async fn delete_api_key(&self, id: ApiKeyId) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE api_keys SET is_active = FALSE WHERE id = $1 AND is_active = TRUE"#,
        )
        .bind(id.into_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }
}
