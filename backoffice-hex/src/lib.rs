//! # Back Office Hex
//!
//! Application service layer and HTTP adapter for the marketplace back office.
//!
//! ## Architecture
//!
//! - `service/` - Payment lifecycle service (orchestrates domain operations)
//! - `reporting/` - Financial report facade over the same service
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! The service is generic over `R: Repository`, allowing
//! different repository implementations to be injected.

pub mod inbound;
pub mod openapi;
pub mod reporting;
pub mod service;


pub use service::PaymentService;
