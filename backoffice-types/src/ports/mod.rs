//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The application layer depends on these traits, not concrete implementations.

mod api_keys;
mod directory;
mod repository;

pub use api_keys::ApiKeyRepository;
pub use directory::UserDirectory;
pub use repository::PaymentRepository;

/// Everything the application layer needs from a storage adapter.
pub trait Repository: PaymentRepository + UserDirectory + ApiKeyRepository {}

impl<T> Repository for T where T: PaymentRepository + UserDirectory + ApiKeyRepository {}
