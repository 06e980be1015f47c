//! Domain models for the back office payment core.

pub mod api_key;
pub mod filter;
pub mod money;
pub mod payment;
pub mod report;
pub mod user;

pub use api_key::{ApiKey, ApiKeyId};
pub use filter::{DateRange, Page, Pagination, PaymentFilter};
pub use money::{DEFAULT_MAX_AMOUNT, Money};
pub use payment::{Payment, PaymentId, PaymentPatch, PaymentStatus, Revision};
pub use report::{Aggregator, FinancialAggregate, MonthlyBucket, Totals, aggregate};
pub use user::{Caller, Role, UserId};
