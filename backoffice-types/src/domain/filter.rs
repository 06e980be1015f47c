//! Query filters, date ranges and pagination for payment listings.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::payment::{Payment, PaymentStatus};
use super::user::UserId;
use crate::error::DomainError;

/// Inclusive `[from, to]` window over `created_at`. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Self, DomainError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(DomainError::InvalidDateRange(format!(
                    "`from` ({}) is after `to` ({})",
                    from.to_rfc3339(),
                    to.to_rfc3339()
                )));
            }
        }
        Ok(Self { from, to })
    }

    /// Builds a range from query-string bounds.
    ///
    /// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates. A plain date
    /// as `from` starts at midnight; as `to` it covers the whole day.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self, DomainError> {
        let from = from
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_bound(s, NaiveTime::MIN))
            .transpose()?;
        let to = to
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_bound(s, end_of_day()))
            .transpose()?;
        Self::new(from, to)
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN)
}

fn parse_bound(raw: &str, date_time: NaiveTime) -> Result<DateTime<Utc>, DomainError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(date_time).and_utc())
        .map_err(|_| {
            DomainError::InvalidDateRange(format!(
                "`{}` is neither an RFC 3339 timestamp nor a YYYY-MM-DD date",
                raw
            ))
        })
}

/// Named filter fields for payment queries, pushed down to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub created: DateRange,
    /// Payer / counterparty
    pub user_id: Option<UserId>,
    /// Administrator who settled the payment
    pub processed_by_id: Option<UserId>,
}

impl PaymentFilter {
    pub fn in_range(created: DateRange) -> Self {
        Self {
            created,
            ..Default::default()
        }
    }

    /// In-memory evaluation of the same predicate the stores run in SQL.
    pub fn matches(&self, payment: &Payment) -> bool {
        self.status.is_none_or(|s| payment.status == s)
            && self.created.contains(payment.created_at)
            && self.user_id.is_none_or(|u| payment.user_id == Some(u))
            && self
                .processed_by_id
                .is_none_or(|u| payment.processed_by_id == Some(u))
    }
}

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Pagination {
    /// Clamps raw values into a usable page request.
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(DEFAULT_PER_PAGE)
                .clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn first(per_page: u32) -> Self {
        Self::new(Some(1), Some(per_page))
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }
}

/// A page of results plus the total number of matching rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        // Fields are public, so a hand-built page size of zero is possible
        let per_page = i64::from(pagination.per_page.max(1));
        let total_pages = u32::try_from((total.max(0) + per_page - 1) / per_page).unwrap_or(0);
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_plain_dates_cover_whole_days() {
        let range = DateRange::parse(Some("2024-03-01"), Some("2024-03-31")).unwrap();

        assert_eq!(
            range.from,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        let late = Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap();
        assert!(range.contains(late));
        assert!(!range.contains(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_parse_rfc3339() {
        let range = DateRange::parse(Some("2024-03-01T12:00:00-03:00"), None).unwrap();
        assert_eq!(
            range.from,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap())
        );
        assert!(range.to.is_none());
    }

    #[test]
    fn test_parse_rejects_garbage_and_inverted_ranges() {
        assert!(matches!(
            DateRange::parse(Some("last tuesday"), None),
            Err(DomainError::InvalidDateRange(_))
        ));
        assert!(matches!(
            DateRange::parse(Some("2024-05-01"), Some("2024-04-01")),
            Err(DomainError::InvalidDateRange(_))
        ));
    }

    #[test]
    fn test_blank_bounds_are_open() {
        let range = DateRange::parse(Some(""), Some("  ")).unwrap();
        assert!(range.is_unbounded());
    }

    #[test]
    fn test_range_is_inclusive() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let range = DateRange::new(Some(at), Some(at)).unwrap();
        assert!(range.contains(at));
    }

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination::new(Some(0), Some(1000));
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, MAX_PER_PAGE);

        let p = Pagination::new(Some(3), Some(10));
        assert_eq!(p.offset(), 20);
        assert_eq!(p.limit(), 10);
    }

    #[test]
    fn test_page_counts_pages() {
        let page: Page<u8> = Page::new(vec![], 41, Pagination::new(None, Some(20)));
        assert_eq!(page.total_pages, 3);

        let empty: Page<u8> = Page::new(vec![], 0, Pagination::default());
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_hand_built_zero_pagination_does_not_panic() {
        let raw = Pagination {
            page: 0,
            per_page: 0,
        };

        assert_eq!(raw.offset(), 0);
        let page: Page<u8> = Page::new(vec![], 5, raw);
        assert_eq!(page.total_pages, 5);
    }
}
