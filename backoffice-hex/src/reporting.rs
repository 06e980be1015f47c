//! Financial report facade.
//!
//! Filtering is pushed down to the store; the numbers come from the pure
//! aggregator in `backoffice-types`.

use backoffice_types::domain::aggregate;
use backoffice_types::{
    AppError, DateRange, FinancialReport, Pagination, PaymentFilter, Repository,
};

use crate::PaymentService;

/// How many payments the payment-scoped report attaches.
pub const RECENT_PAYMENTS: u32 = 10;

impl<R: Repository> PaymentService<R> {
    /// System-wide report over an optional `created_at` range.
    pub async fn financial_report(&self, range: DateRange) -> Result<FinancialReport, AppError> {
        let payments = self
            .repo()
            .fetch_all_payments(&PaymentFilter::in_range(range))
            .await?;

        let aggregate = aggregate(&payments, range);
        tracing::debug!(payments = payments.len(), "Financial report computed");
        Ok(FinancialReport::from_aggregate(&aggregate, range))
    }

    /// Report over payments matching `filter`, with the most recent ones
    /// attached.
    pub async fn payment_financial_report(
        &self,
        filter: &PaymentFilter,
    ) -> Result<FinancialReport, AppError> {
        let payments = self.repo().fetch_all_payments(filter).await?;
        let recent = self
            .repo()
            .find_payments(filter, Pagination::first(RECENT_PAYMENTS))
            .await?;

        let aggregate = aggregate(&payments, filter.created);
        Ok(FinancialReport::from_aggregate(&aggregate, filter.created).with_recent_payments(recent))
    }
}
