//! Payment domain model and its lifecycle rules.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money::Money;
use super::user::UserId;
use crate::error::DomainError;

/// Current time truncated to the microsecond precision both stores keep.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Unique identifier for a Payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Creates a new random PaymentId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a PaymentId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the UUID value.
    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PaymentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle state of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Cancelled,
}

impl AsRef<str> for PaymentStatus {
    fn as_ref(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("Unknown payment status: {}", other)),
        }
    }
}

/// Validates a requested amount against the positive range and `max`.
pub fn validate_amount(minor_units: i64, max: Money) -> Result<Money, DomainError> {
    if minor_units <= 0 {
        return Err(DomainError::InvalidAmount(
            "amount must be a positive number of minor units".into(),
        ));
    }
    let amount = Money::new(minor_units)?;
    if amount > max {
        return Err(DomainError::InvalidAmount(format!(
            "amount {} exceeds the maximum of {}",
            amount, max
        )));
    }
    Ok(amount)
}

/// Partial update of a payment. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentPatch {
    /// New amount in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = 20000)]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "pix")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
}

impl PaymentPatch {
    /// True when the patch does nothing but ask for cancellation.
    pub fn is_cancellation_only(&self) -> bool {
        self.status == Some(PaymentStatus::Cancelled)
            && self.amount.is_none()
            && self.description.is_none()
            && self.payment_method.is_none()
    }
}
/// The stored state a conditional write is validated against. A write
/// lands only while the row still carries both values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    pub status: PaymentStatus,
    pub updated_at: DateTime<Utc>,
}

/// A monetary record moving through `PENDING -> {PAID, CANCELLED}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: PaymentId,
    /// Amount in minor units
    #[schema(value_type = i64, example = 15050)]
    pub amount: Money,
    pub status: PaymentStatus,
    pub description: Option<String>,
    pub payment_method: Option<String>,
    /// Set once, when the payment is marked paid
    pub paid_at: Option<DateTime<Utc>>,
    /// Administrator who marked the payment paid
    pub processed_by_id: Option<UserId>,
    /// Payer / counterparty
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new pending payment.
    pub fn new(
        amount: Money,
        description: Option<String>,
        payment_method: Option<String>,
        user_id: Option<UserId>,
    ) -> Self {
        let now = now();
        Self {
            id: PaymentId::new(),
            amount,
            status: PaymentStatus::Pending,
            description,
            payment_method,
            paid_at: None,
            processed_by_id: None,
            user_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// The revision a change to this snapshot must find in the store.
    pub fn revision(&self) -> Revision {
        Revision {
            status: self.status,
            updated_at: self.updated_at,
        }
    }

    /// Moves `updated_at` strictly forward so every write yields a new
    /// revision, even within one clock tick.
    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at.max(self.updated_at + Duration::microseconds(1));
    }

    /// Reconstructs a payment from stored fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: PaymentId,
        amount: Money,
        status: PaymentStatus,
        description: Option<String>,
        payment_method: Option<String>,
        paid_at: Option<DateTime<Utc>>,
        processed_by_id: Option<UserId>,
        user_id: Option<UserId>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            amount,
            status,
            description,
            payment_method,
            paid_at,
            processed_by_id,
            user_id,
            created_at,
            updated_at,
        }
    }

    /// Applies a partial update.
    ///
    /// A paid payment accepts exactly one patch: `{status: CANCELLED}`.
    /// A cancelled payment accepts none.
    pub fn apply_patch(
        &mut self,
        patch: PaymentPatch,
        max_amount: Money,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        match self.status {
            PaymentStatus::Cancelled => return Err(DomainError::ImmutableState(self.status)),
            PaymentStatus::Paid if !patch.is_cancellation_only() => {
                return Err(DomainError::ImmutableState(self.status));
            }
            _ => {}
        }

        let status = match patch.status {
            Some(PaymentStatus::Paid) => {
                return Err(DomainError::InvalidTransition {
                    from: self.status,
                    to: PaymentStatus::Paid,
                });
            }
            Some(status) => status,
            None => self.status,
        };
        let amount = match patch.amount {
            Some(minor_units) => validate_amount(minor_units, max_amount)?,
            None => self.amount,
        };

        self.amount = amount;
        self.status = status;
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(method) = patch.payment_method {
            self.payment_method = Some(method);
        }
        self.touch(at);
        Ok(())
    }

    /// Settles the payment. The only path that sets `paid_at` and
    /// `processed_by_id`.
    pub fn mark_paid(
        &mut self,
        actor: UserId,
        payment_method: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        match self.status {
            PaymentStatus::Paid => return Err(DomainError::AlreadyProcessed(self.id)),
            PaymentStatus::Cancelled => return Err(DomainError::ImmutableState(self.status)),
            PaymentStatus::Pending => {}
        }

        self.status = PaymentStatus::Paid;
        self.paid_at = Some(at);
        self.processed_by_id = Some(actor);
        if let Some(method) = payment_method {
            self.payment_method = Some(method);
        }
        self.touch(at);
        Ok(())
    }

    /// Checks that the payment may be removed.
    pub fn ensure_deletable(&self) -> Result<(), DomainError> {
        if self.status == PaymentStatus::Paid {
            return Err(DomainError::CannotDeletePaid(self.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::DEFAULT_MAX_AMOUNT;

    fn pending(amount: i64) -> Payment {
        Payment::new(Money::new(amount).unwrap(), None, None, None)
    }

    fn paid(amount: i64) -> Payment {
        let mut payment = pending(amount);
        payment.mark_paid(UserId::new(), None, now()).unwrap();
        payment
    }

    #[test]
    fn test_new_payment_is_pending() {
        let payment = pending(15050);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.paid_at.is_none());
        assert!(payment.processed_by_id.is_none());
        assert_eq!(payment.created_at, payment.updated_at);
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(1, DEFAULT_MAX_AMOUNT).is_ok());
        assert!(validate_amount(99_999_999, DEFAULT_MAX_AMOUNT).is_ok());
        assert!(matches!(
            validate_amount(0, DEFAULT_MAX_AMOUNT),
            Err(DomainError::InvalidAmount(_))
        ));
        assert!(matches!(
            validate_amount(-5, DEFAULT_MAX_AMOUNT),
            Err(DomainError::InvalidAmount(_))
        ));
        assert!(matches!(
            validate_amount(100_000_000, DEFAULT_MAX_AMOUNT),
            Err(DomainError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_mark_paid_sets_settlement_fields() {
        let mut payment = pending(15050);
        let admin = UserId::new();
        let at = now();

        payment.mark_paid(admin, Some("pix".into()), at).unwrap();

        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(payment.paid_at, Some(at));
        assert_eq!(payment.processed_by_id, Some(admin));
        assert_eq!(payment.payment_method.as_deref(), Some("pix"));
    }

    #[test]
    fn test_mark_paid_twice_is_rejected() {
        let mut payment = paid(100);
        let result = payment.mark_paid(UserId::new(), None, now());
        assert!(matches!(result, Err(DomainError::AlreadyProcessed(_))));
    }

    #[test]
    fn test_cancelled_payment_cannot_be_paid() {
        let mut payment = pending(100);
        payment
            .apply_patch(
                PaymentPatch {
                    status: Some(PaymentStatus::Cancelled),
                    ..Default::default()
                },
                DEFAULT_MAX_AMOUNT,
                now(),
            )
            .unwrap();

        let result = payment.mark_paid(UserId::new(), None, now());
        assert!(matches!(
            result,
            Err(DomainError::ImmutableState(PaymentStatus::Cancelled))
        ));
    }

    #[test]
    fn test_patch_pending_is_partial() {
        let mut payment = Payment::new(
            Money::new(100).unwrap(),
            Some("deposit".into()),
            None,
            None,
        );

        payment
            .apply_patch(
                PaymentPatch {
                    payment_method: Some("boleto".into()),
                    ..Default::default()
                },
                DEFAULT_MAX_AMOUNT,
                now(),
            )
            .unwrap();

        assert_eq!(payment.amount.minor_units(), 100);
        assert_eq!(payment.description.as_deref(), Some("deposit"));
        assert_eq!(payment.payment_method.as_deref(), Some("boleto"));
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[test]
    fn test_patch_paid_amount_is_rejected() {
        let mut payment = paid(100);
        let before = payment.clone();

        let result = payment.apply_patch(
            PaymentPatch {
                amount: Some(1),
                ..Default::default()
            },
            DEFAULT_MAX_AMOUNT,
            now(),
        );

        assert!(matches!(
            result,
            Err(DomainError::ImmutableState(PaymentStatus::Paid))
        ));
        assert_eq!(payment, before);
    }

    #[test]
    fn test_paid_payment_can_still_be_cancelled_through_update() {
        let mut payment = paid(100);
        let paid_at = payment.paid_at;

        payment
            .apply_patch(
                PaymentPatch {
                    status: Some(PaymentStatus::Cancelled),
                    ..Default::default()
                },
                DEFAULT_MAX_AMOUNT,
                now(),
            )
            .unwrap();

        assert_eq!(payment.status, PaymentStatus::Cancelled);
        assert_eq!(payment.paid_at, paid_at);
        assert_eq!(payment.amount.minor_units(), 100);
    }

    #[test]
    fn test_cancel_with_amount_change_on_paid_is_rejected() {
        let mut payment = paid(100);
        let result = payment.apply_patch(
            PaymentPatch {
                status: Some(PaymentStatus::Cancelled),
                amount: Some(50),
                ..Default::default()
            },
            DEFAULT_MAX_AMOUNT,
            now(),
        );
        assert!(matches!(result, Err(DomainError::ImmutableState(_))));
    }

    #[test]
    fn test_update_cannot_set_paid() {
        let mut payment = pending(100);
        let result = payment.apply_patch(
            PaymentPatch {
                status: Some(PaymentStatus::Paid),
                ..Default::default()
            },
            DEFAULT_MAX_AMOUNT,
            now(),
        );
        assert!(matches!(
            result,
            Err(DomainError::InvalidTransition {
                to: PaymentStatus::Paid,
                ..
            })
        ));
    }

    #[test]
    fn test_status_never_returns_to_pending() {
        let back_to_pending = PaymentPatch {
            status: Some(PaymentStatus::Pending),
            ..Default::default()
        };

        let mut settled = paid(100);
        let before = settled.clone();
        let result = settled.apply_patch(back_to_pending.clone(), DEFAULT_MAX_AMOUNT, now());
        assert!(matches!(
            result,
            Err(DomainError::ImmutableState(PaymentStatus::Paid))
        ));
        assert_eq!(settled, before);

        let mut cancelled = pending(100);
        cancelled
            .apply_patch(
                PaymentPatch {
                    status: Some(PaymentStatus::Cancelled),
                    ..Default::default()
                },
                DEFAULT_MAX_AMOUNT,
                now(),
            )
            .unwrap();
        let before = cancelled.clone();
        let result = cancelled.apply_patch(back_to_pending, DEFAULT_MAX_AMOUNT, now());
        assert!(matches!(
            result,
            Err(DomainError::ImmutableState(PaymentStatus::Cancelled))
        ));
        assert_eq!(cancelled, before);
    }

    #[test]
    fn test_every_change_moves_the_revision_forward() {
        let mut payment = pending(100);
        let created = payment.revision();
        let frozen_clock = payment.updated_at;

        payment
            .apply_patch(
                PaymentPatch {
                    description: Some("late edit".into()),
                    ..Default::default()
                },
                DEFAULT_MAX_AMOUNT,
                frozen_clock,
            )
            .unwrap();

        assert_eq!(payment.revision().status, created.status);
        assert!(payment.revision().updated_at > created.updated_at);
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let mut payment = pending(100);
        let cancel = PaymentPatch {
            status: Some(PaymentStatus::Cancelled),
            ..Default::default()
        };
        payment
            .apply_patch(cancel.clone(), DEFAULT_MAX_AMOUNT, now())
            .unwrap();

        let result = payment.apply_patch(cancel, DEFAULT_MAX_AMOUNT, now());
        assert!(matches!(
            result,
            Err(DomainError::ImmutableState(PaymentStatus::Cancelled))
        ));
    }

    #[test]
    fn test_patch_with_invalid_amount_changes_nothing() {
        let mut payment = pending(100);
        let before = payment.clone();

        let result = payment.apply_patch(
            PaymentPatch {
                amount: Some(0),
                description: Some("changed".into()),
                ..Default::default()
            },
            DEFAULT_MAX_AMOUNT,
            now(),
        );

        assert!(matches!(result, Err(DomainError::InvalidAmount(_))));
        assert_eq!(payment, before);
    }

    #[test]
    fn test_only_paid_payments_are_undeletable() {
        assert!(pending(100).ensure_deletable().is_ok());
        assert!(matches!(
            paid(100).ensure_deletable(),
            Err(DomainError::CannotDeletePaid(_))
        ));
    }
}
