//! Financial aggregation over a set of payments.
//!
//! Everything here is integer arithmetic on [`Money`]. Display rounding is
//! left to the report DTOs so that it happens exactly once.

use std::collections::HashMap;

use super::filter::DateRange;
use super::money::Money;
use super::payment::{Payment, PaymentStatus};

/// Bucket key for paid payments that somehow lack `paid_at`.
pub const UNKNOWN_MONTH: &str = "unknown";

/// Count and integer sum for one slice of the payment set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub count: u64,
    pub amount: Money,
}

impl Totals {
    fn record(&mut self, amount: Money) {
        self.count += 1;
        self.amount = self.amount + amount;
    }
}

/// Paid revenue for one calendar month (`YYYY-MM`) of `paid_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyBucket {
    pub month: String,
    pub totals: Totals,
}

/// Result of a single aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinancialAggregate {
    pub all: Totals,
    pub paid: Totals,
    pub pending: Totals,
    pub cancelled: Totals,
    /// Ordered by first occurrence in the input.
    pub monthly_revenue: Vec<MonthlyBucket>,
}

impl FinancialAggregate {
    /// Total amount over total count, rounded half-up to a minor unit.
    pub fn average_transaction_value(&self) -> Money {
        Money::average(self.all.amount, self.all.count)
    }
}

/// Single-pass accumulator behind [`aggregate`].
#[derive(Debug, Default)]
pub struct Aggregator {
    range: DateRange,
    result: FinancialAggregate,
    month_index: HashMap<String, usize>,
}

impl Aggregator {
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            ..Default::default()
        }
    }

    pub fn push(&mut self, payment: &Payment) {
        if !self.range.contains(payment.created_at) {
            return;
        }

        self.result.all.record(payment.amount);
        match payment.status {
            PaymentStatus::Pending => self.result.pending.record(payment.amount),
            PaymentStatus::Cancelled => self.result.cancelled.record(payment.amount),
            PaymentStatus::Paid => {
                self.result.paid.record(payment.amount);
                self.record_revenue(payment);
            }
        }
    }

    fn record_revenue(&mut self, payment: &Payment) {
        let month = payment
            .paid_at
            .map(|at| at.format("%Y-%m").to_string())
            .unwrap_or_else(|| UNKNOWN_MONTH.to_string());

        let buckets = &mut self.result.monthly_revenue;
        let index = *self.month_index.entry(month.clone()).or_insert_with(|| {
            buckets.push(MonthlyBucket {
                month,
                totals: Totals::default(),
            });
            buckets.len() - 1
        });
        buckets[index].totals.record(payment.amount);
    }

    pub fn finish(self) -> FinancialAggregate {
        self.result
    }
}

/// Aggregates the payments whose `created_at` falls inside `range`.
pub fn aggregate<'a, I>(payments: I, range: DateRange) -> FinancialAggregate
where
    I: IntoIterator<Item = &'a Payment>,
{
    let mut aggregator = Aggregator::new(range);
    for payment in payments {
        aggregator.push(payment);
    }
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentId;
    use crate::domain::user::UserId;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn payment(
        amount: i64,
        status: PaymentStatus,
        created_at: DateTime<Utc>,
        paid_at: Option<DateTime<Utc>>,
    ) -> Payment {
        Payment::from_parts(
            PaymentId::new(),
            Money::new(amount).unwrap(),
            status,
            None,
            None,
            paid_at,
            paid_at.map(|_| UserId::new()),
            None,
            created_at,
            created_at,
        )
    }

    fn paid_in(amount: i64, y: i32, m: u32) -> Payment {
        payment(amount, PaymentStatus::Paid, at(y, m, 1), Some(at(y, m, 2)))
    }

    #[test]
    fn test_empty_set() {
        let result = aggregate([], DateRange::default());
        assert_eq!(result, FinancialAggregate::default());
        assert_eq!(result.average_transaction_value(), Money::ZERO);
    }

    #[test]
    fn test_three_paid_payments_share_a_month() {
        let payments = [
            paid_in(1000, 2024, 5),
            paid_in(2000, 2024, 5),
            paid_in(3333, 2024, 5),
        ];

        let result = aggregate(&payments, DateRange::default());

        assert_eq!(result.monthly_revenue.len(), 1);
        let bucket = &result.monthly_revenue[0];
        assert_eq!(bucket.month, "2024-05");
        assert_eq!(bucket.totals.count, 3);
        assert_eq!(bucket.totals.amount.minor_units(), 6333);
        assert_eq!(bucket.totals.amount.to_display(), 63.33);
    }

    #[test]
    fn test_status_sums_partition_the_total() {
        let payments = [
            paid_in(1999, 2024, 1),
            payment(2501, PaymentStatus::Pending, at(2024, 1, 3), None),
            payment(333, PaymentStatus::Cancelled, at(2024, 2, 3), None),
            paid_in(7, 2024, 2),
            payment(10_001, PaymentStatus::Pending, at(2024, 3, 3), None),
        ];

        let result = aggregate(&payments, DateRange::default());

        assert_eq!(result.all.count, 5);
        assert_eq!(result.paid.count, 2);
        assert_eq!(result.pending.count, 2);
        assert_eq!(result.cancelled.count, 1);
        assert_eq!(
            result.paid.amount + result.pending.amount + result.cancelled.amount,
            result.all.amount
        );
        assert_eq!(result.all.amount.minor_units(), 14_841);
    }

    #[test]
    fn test_average_rounds_after_division() {
        let payments = [
            paid_in(1, 2024, 1),
            paid_in(1, 2024, 1),
            payment(2, PaymentStatus::Pending, at(2024, 1, 5), None),
        ];

        let result = aggregate(&payments, DateRange::default());

        // 4 / 3 = 1.33 minor units
        assert_eq!(result.average_transaction_value().minor_units(), 1);
        assert_eq!(result, aggregate(&payments, DateRange::default()));
    }

    #[test]
    fn test_buckets_keep_first_occurrence_order() {
        let payments = [
            paid_in(100, 2024, 3),
            paid_in(200, 2024, 1),
            paid_in(300, 2024, 3),
            paid_in(400, 2023, 12),
        ];

        let result = aggregate(&payments, DateRange::default());

        let months: Vec<_> = result
            .monthly_revenue
            .iter()
            .map(|b| b.month.as_str())
            .collect();
        assert_eq!(months, ["2024-03", "2024-01", "2023-12"]);
        assert_eq!(result.monthly_revenue[0].totals.amount.minor_units(), 400);
    }

    #[test]
    fn test_paid_without_paid_at_goes_to_unknown() {
        let payments = [
            payment(500, PaymentStatus::Paid, at(2024, 1, 1), None),
            paid_in(100, 2024, 1),
        ];

        let result = aggregate(&payments, DateRange::default());

        assert_eq!(result.monthly_revenue[0].month, UNKNOWN_MONTH);
        assert_eq!(result.monthly_revenue[0].totals.count, 1);
        assert_eq!(result.paid.amount.minor_units(), 600);
    }

    #[test]
    fn test_only_paid_payments_produce_revenue() {
        let payments = [
            payment(500, PaymentStatus::Pending, at(2024, 1, 1), None),
            payment(500, PaymentStatus::Cancelled, at(2024, 1, 1), None),
        ];

        let result = aggregate(&payments, DateRange::default());

        assert!(result.monthly_revenue.is_empty());
        assert_eq!(result.all.count, 2);
    }

    #[test]
    fn test_range_is_applied_to_created_at() {
        let payments = [
            payment(100, PaymentStatus::Pending, at(2024, 1, 10), None),
            payment(200, PaymentStatus::Pending, at(2024, 2, 10), None),
            payment(400, PaymentStatus::Pending, at(2024, 3, 10), None),
        ];
        let range = DateRange::new(Some(at(2024, 2, 10)), Some(at(2024, 3, 10))).unwrap();

        let result = aggregate(&payments, range);

        assert_eq!(result.all.count, 2);
        assert_eq!(result.all.amount.minor_units(), 600);
    }
}
