//! Common error handling utilities for the Tamil Voice Gateway
//!
//! This crate provides the top-level error type used by the gateway binary,
//! the stable error codes carried in API error responses, and log
//! sanitization for vendor error bodies.
//!
//! # Error Categories
//!
//! - **NetworkError**: Socket binding and transport failures
//! - **ServerError**: HTTP server runtime failures
//! - **ConfigError**: Missing or malformed environment settings
//!
//! # Example
//!
//! ```rust
//! use error_common::{GatewayError, Result};
//!
//! fn require_secret(secret: Option<String>) -> Result<String> {
//!     secret.ok_or_else(|| GatewayError::ConfigError("JWT_SECRET is not set".to_string()))
//! }
//!
//! assert!(require_secret(None).is_err());
//! ```

pub mod types;
pub mod codes;
pub mod sanitization;

pub use types::*;
pub use codes::*;
pub use sanitization::*;
