//! Shared configuration, errors, and auth claims for the credit ledger.
//!
//! This crate provides common types used across all other crates:
//! - Configuration management
//! - Application-wide error types
//! - JWT claims and verification
//! - Pagination for list endpoints

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod pagination;

pub use auth::Claims;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use jwt::{JwtError, JwtService};
pub use pagination::{PageRequest, PageResponse};
