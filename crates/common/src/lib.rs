//! Quote Table Common Library
//!
//! Core of the quote catalogue shared by the gateway:
//! - Entity models and repositories over a PostgREST-style table store
//! - Form validation with per-field messages
//! - Error types and handling
//! - Configuration management
//! - Password hashing and session storage
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod session;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{RepoSettings, Repositories};
pub use errors::{AppError, Result};
pub use store::TableStore;
pub use validation::Validator;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
