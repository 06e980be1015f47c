//! Payment store port.
//!
//! This is the primary port in our hexagonal architecture.
//! Adapters (Postgres, SQLite, in-memory) implement this trait and are the
//! only components that talk to a database.

use crate::domain::{Pagination, Payment, PaymentFilter, PaymentId, Revision};
use crate::error::RepoError;

/// Persistence for payments.
///
/// Writes that depend on the current state are conditional on that state
/// in a single statement, so concurrent callers (possibly in other
/// processes) cannot both win a transition or overwrite each other's edits.
#[async_trait::async_trait]
pub trait PaymentRepository: Send + Sync + 'static {
    /// Inserts a new payment.
    async fn create_payment(&self, payment: &Payment) -> Result<(), RepoError>;

    /// Gets a payment by ID.
    async fn find_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepoError>;

    /// Lists one page of matching payments, newest first.
    async fn find_payments(
        &self,
        filter: &PaymentFilter,
        page: Pagination,
    ) -> Result<Vec<Payment>, RepoError>;

    /// Counts matching payments.
    async fn count_payments(&self, filter: &PaymentFilter) -> Result<i64, RepoError>;

    /// Returns every matching payment in creation order, for aggregation.
    async fn fetch_all_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, RepoError>;

    /// Overwrites the stored row with `payment`, but only while the stored
    /// status and `updated_at` still match `expected`. Returns `false` when
    /// nothing was written.
    async fn update_payment(&self, payment: &Payment, expected: Revision)
    -> Result<bool, RepoError>;

    /// Deletes a payment unless it is paid. Returns `false` when nothing
    /// was deleted.
    async fn delete_payment(&self, id: PaymentId) -> Result<bool, RepoError>;
}
