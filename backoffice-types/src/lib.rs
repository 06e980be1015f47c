//! # Back Office Types
//!
//! Domain types and port traits for the marketplace back office payment core.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Money, Payment, filters) and the
//!   financial aggregator
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    ApiKey, ApiKeyId, Caller, DEFAULT_MAX_AMOUNT, DateRange, FinancialAggregate, Money, Page,
    Pagination, Payment, PaymentFilter, PaymentId, PaymentPatch, PaymentStatus, Revision, Role,
    UserId,
};
pub use dto::*;
pub use error::{AppError, DomainError, RepoError};
pub use ports::{ApiKeyRepository, PaymentRepository, Repository, UserDirectory};
