//! Payment Lifecycle Service
//!
//! Orchestrates the payment state machine through the repository port.
//! Contains NO infrastructure logic - pure business orchestration.

use backoffice_types::domain::payment::{now, validate_amount};
use backoffice_types::{
    AppError, CreatePaymentRequest, DEFAULT_MAX_AMOUNT, DomainError, Money, Page, Pagination,
    Payment, PaymentFilter, PaymentId, PaymentPatch, Repository, Role, UserId,
};

/// Application service for the payment lifecycle.
///
/// Generic over `R: Repository` - the adapter is injected at compile time.
/// This enables:
/// - Swapping repositories without code changes
/// - Testing with in-memory repo
/// - Compile-time checks for port implementation
pub struct PaymentService<R: Repository> {
    repo: R,
    max_amount: Money,
}

impl<R: Repository> PaymentService<R> {
    /// Creates a new payment service with the given repository.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            max_amount: DEFAULT_MAX_AMOUNT,
        }
    }

    /// Overrides the largest amount a payment may carry.
    pub fn with_max_amount(mut self, max_amount: Money) -> Self {
        self.max_amount = max_amount;
        self
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn max_amount(&self) -> Money {
        self.max_amount
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Lifecycle Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Creates a new pending payment.
    pub async fn create(&self, req: CreatePaymentRequest) -> Result<Payment, AppError> {
        let amount = validate_amount(req.amount, self.max_amount)?;
        let payment = Payment::new(amount, req.description, req.payment_method, req.user_id);

        self.repo.create_payment(&payment).await?;
        tracing::info!(payment_id = %payment.id, amount = %payment.amount, "Payment created");
        Ok(payment)
    }

    /// Gets a payment by ID.
    pub async fn get(&self, id: PaymentId) -> Result<Payment, AppError> {
        self.repo
            .find_payment(id)
            .await?
            .ok_or_else(|| DomainError::PaymentNotFound(id).into())
    }

    /// Lists one page of matching payments, newest first.
    pub async fn list(
        &self,
        filter: &PaymentFilter,
        pagination: Pagination,
    ) -> Result<Page<Payment>, AppError> {
        let items = self.repo.find_payments(filter, pagination).await?;
        let total = self.repo.count_payments(filter).await?;
        Ok(Page::new(items, total, pagination))
    }

    /// Applies a partial update.
    ///
    /// The whole record is written back in one write that only lands while
    /// the stored row is still the revision the patch was validated against.
    pub async fn update(&self, id: PaymentId, patch: PaymentPatch) -> Result<Payment, AppError> {
        let current = self.get(id).await?;
        let mut updated = current.clone();
        updated.apply_patch(patch.clone(), self.max_amount, now())?;

        if !self.repo.update_payment(&updated, current.revision()).await? {
            // Lost a race: re-classify against the fresh row
            let mut fresh = self.get(id).await?;
            fresh.apply_patch(patch, self.max_amount, now())?;
            return Err(concurrent_change(id));
        }

        if updated.status != current.status {
            tracing::info!(
                payment_id = %id,
                from = %current.status,
                to = %updated.status,
                "Payment status changed"
            );
        }
        Ok(updated)
    }

    /// Settles a pending payment on behalf of an administrator.
    ///
    /// Status, `paid_at` and `processed_by_id` land in a single conditional
    /// write, so only one of several concurrent callers can succeed, and an
    /// edit that landed in between is never overwritten by a stale snapshot.
    pub async fn mark_paid(
        &self,
        id: PaymentId,
        actor: UserId,
        payment_method: Option<String>,
    ) -> Result<Payment, AppError> {
        let current = self.get(id).await?;

        match self.repo.role_of(actor).await? {
            Some(Role::Admin) => {}
            _ => {
                tracing::warn!(payment_id = %id, actor = %actor, "Non-admin tried to mark payment paid");
                return Err(DomainError::Forbidden(
                    "only administrators can mark payments as paid".into(),
                )
                .into());
            }
        }

        let mut paid = current.clone();
        paid.mark_paid(actor, payment_method.clone(), now())?;

        if !self.repo.update_payment(&paid, current.revision()).await? {
            let mut fresh = self.get(id).await?;
            fresh.mark_paid(actor, payment_method, now())?;
            return Err(concurrent_change(id));
        }

        tracing::info!(payment_id = %id, processed_by = %actor, "Payment marked paid");
        Ok(paid)
    }

    /// Deletes a payment that has not been paid.
    pub async fn remove(&self, id: PaymentId) -> Result<(), AppError> {
        self.get(id).await?.ensure_deletable()?;

        if !self.repo.delete_payment(id).await? {
            // Either deleted or paid in the meantime
            self.get(id).await?.ensure_deletable()?;
            return Err(concurrent_change(id));
        }

        tracing::info!(payment_id = %id, "Payment deleted");
        Ok(())
    }
}

fn concurrent_change(id: PaymentId) -> AppError {
    AppError::Conflict(format!("Payment {} was modified concurrently, retry", id))
}
